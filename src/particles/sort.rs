use crate::config::ParticleConfig;

const EMPTY: u32 = 0;

/// Reusable scratch for the by-scale draw order.
///
/// Keys are small integers, so items are bucketed directly by key. Each bucket is a FIFO chain
/// threaded through `next`; `heads`/`tails` hold `item + 1` so zero means empty. Only buckets listed
/// in `used` are visited and every touched slot is zeroed again before the sort is released.
#[derive(Debug, Clone)]
pub struct SortScratch {
    heads: Vec<u32>,
    tails: Vec<u32>,
    next: Vec<u32>,
    used: Vec<u32>,
    key_scale: f32,
    max_key: u32,
}

impl SortScratch {
    pub fn new(key_scale: f32, max_key: u32) -> Self {
        let buckets = max_key as usize + 1;
        Self {
            heads: vec![EMPTY; buckets],
            tails: vec![EMPTY; buckets],
            next: Vec::new(),
            used: Vec::new(),
            key_scale,
            max_key,
        }
    }

    pub fn from_config(config: &ParticleConfig) -> Self {
        Self::new(config.sort_key_scale, config.sort_max_key)
    }

    pub fn max_key(&self) -> u32 {
        self.max_key
    }

    /// Integer sort key for a particle scale factor.
    pub fn key_for(&self, scale: f32) -> u32 {
        let scaled = (scale.abs() * self.key_scale).round();
        if !scaled.is_finite() {
            return self.max_key;
        }
        scaled.clamp(0.0, self.max_key as f32) as u32
    }

    pub fn begin(&mut self) -> BucketSort<'_> {
        BucketSort { scratch: self }
    }

    /// True when no bucket holds a stale entry.
    pub fn is_clean(&self) -> bool {
        self.used.is_empty()
            && self.heads.iter().all(|head| *head == EMPTY)
            && self.tails.iter().all(|tail| *tail == EMPTY)
    }

    fn release(&mut self) {
        for key in self.used.drain(..) {
            self.heads[key as usize] = EMPTY;
            self.tails[key as usize] = EMPTY;
        }
    }
}

impl Default for SortScratch {
    fn default() -> Self {
        Self::from_config(&ParticleConfig::default())
    }
}

/// One in-flight sort. Dropping it without draining still leaves the scratch clean.
pub struct BucketSort<'a> {
    scratch: &'a mut SortScratch,
}

impl BucketSort<'_> {
    pub fn key_for(&self, scale: f32) -> u32 {
        self.scratch.key_for(scale)
    }

    pub fn insert(&mut self, item: usize, key: u32) {
        let scratch = &mut *self.scratch;
        let key = key.min(scratch.max_key) as usize;
        let link = item as u32 + 1;
        if scratch.next.len() <= item {
            scratch.next.resize(item + 1, EMPTY);
        }
        scratch.next[item] = EMPTY;
        match scratch.tails[key] {
            EMPTY => {
                scratch.heads[key] = link;
                scratch.used.push(key as u32);
            }
            tail => scratch.next[tail as usize - 1] = link,
        }
        scratch.tails[key] = link;
    }

    /// Visits items by ascending key, preserving insertion order within a key.
    pub fn drain(self, mut visit: impl FnMut(usize)) {
        let scratch = &mut *self.scratch;
        scratch.used.sort_unstable();
        for &key in &scratch.used {
            let key = key as usize;
            let mut cursor = scratch.heads[key];
            while cursor != EMPTY {
                let item = cursor as usize - 1;
                visit(item);
                cursor = scratch.next[item];
                scratch.next[item] = EMPTY;
            }
            scratch.heads[key] = EMPTY;
            scratch.tails[key] = EMPTY;
        }
        scratch.used.clear();
    }
}

impl Drop for BucketSort<'_> {
    fn drop(&mut self) {
        self.scratch.release();
    }
}
