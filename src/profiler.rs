use std::collections::HashMap;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassTiming {
    pub name: &'static str,
    pub last_ms: f32,
    pub average_ms: f32,
    pub max_ms: f32,
    pub samples: u64,
}

#[derive(Default)]
struct Accumulator {
    last_ms: f32,
    total_ms: f32,
    max_ms: f32,
    samples: u64,
}

/// Wall-clock timings for the named passes of a tick (particle update, particle draw, ...).
#[derive(Default)]
pub struct PassProfiler {
    passes: HashMap<&'static str, Accumulator>,
}

impl PassProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Times until the returned guard drops.
    pub fn scope(&mut self, name: &'static str) -> PassScope<'_> {
        PassScope { name, profiler: self, start: Instant::now() }
    }

    pub fn record(&mut self, name: &'static str, elapsed_ms: f32) {
        let entry = self.passes.entry(name).or_default();
        entry.last_ms = elapsed_ms;
        entry.max_ms = entry.max_ms.max(elapsed_ms);
        entry.total_ms += elapsed_ms;
        entry.samples += 1;
    }

    pub fn timing(&self, name: &str) -> Option<PassTiming> {
        self.passes.get_key_value(name).map(|(&name, acc)| summarize(name, acc))
    }

    /// Every pass, slowest last-sample first.
    pub fn timings(&self) -> Vec<PassTiming> {
        let mut out: Vec<PassTiming> = self.passes.iter().map(|(&name, acc)| summarize(name, acc)).collect();
        out.sort_by(|a, b| b.last_ms.partial_cmp(&a.last_ms).unwrap_or(std::cmp::Ordering::Equal));
        out
    }

    pub fn reset(&mut self) {
        self.passes.clear();
    }
}

fn summarize(name: &'static str, acc: &Accumulator) -> PassTiming {
    let average_ms = if acc.samples == 0 { 0.0 } else { acc.total_ms / acc.samples as f32 };
    PassTiming { name, last_ms: acc.last_ms, average_ms, max_ms: acc.max_ms, samples: acc.samples }
}

pub struct PassScope<'a> {
    name: &'static str,
    profiler: &'a mut PassProfiler,
    start: Instant,
}

impl Drop for PassScope<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f32() * 1000.0;
        self.profiler.record(self.name, elapsed_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_accumulate_samples() {
        let mut profiler = PassProfiler::new();
        for _ in 0..3 {
            let _scope = profiler.scope("particles.update");
        }
        profiler.record("particles.draw", 2.0);
        profiler.record("particles.draw", 4.0);
        let draw = profiler.timing("particles.draw").expect("draw timing");
        assert_eq!(draw.samples, 2);
        assert_eq!(draw.average_ms, 3.0);
        assert_eq!(draw.max_ms, 4.0);
        assert_eq!(profiler.timing("particles.update").map(|t| t.samples), Some(3));
        assert_eq!(profiler.timings().len(), 2);
    }
}
