use super::element::{LayerCurves, ParticleElement};
use super::{EmitterPose, ParticleFrame};
use crate::assets::{ColorPolicy, DrawOrder, ParticleEffectDefinition, ParticleLayerDefinition, TextureInfo};
use crate::config::ParticleConfig;
use crate::easing::EasingService;
use crate::math::{self, Rect};
use crate::renderer::{
    pack_light_anchor, pack_params, pack_tint, write_quad, BatchRenderer, DrawTarget, LightMode, SpriteVertex,
};
use glam::Vec2;
use rand::Rng;
use std::sync::Arc;

/// Runtime for one layer of a particle effect.
///
/// Elements move between `active` and `pooled` but are never freed while the layer lives, so
/// `active.len() + pooled.len() == allocated` always holds and `allocated` never exceeds `capacity`.
pub struct ParticleLayer {
    effect: Arc<ParticleEffectDefinition>,
    index: usize,
    curves: LayerCurves,
    active: Vec<ParticleElement>,
    pooled: Vec<ParticleElement>,
    allocated: usize,
    capacity: usize,
    elapsed: f32,
    remaining: Option<u32>,
    total_spawned: u64,
}

impl ParticleLayer {
    pub fn new(
        effect: Arc<ParticleEffectDefinition>,
        index: usize,
        config: &ParticleConfig,
        easing: &dyn EasingService,
    ) -> Option<Self> {
        let def = effect.layers.get(index)?;
        let curves = resolve_curves(def, easing);
        let capacity = config.capacity.min(def.maximum) as usize;
        let remaining = def.count;
        Some(Self {
            effect,
            index,
            curves,
            active: Vec::new(),
            pooled: Vec::new(),
            allocated: 0,
            capacity,
            elapsed: 0.0,
            remaining,
            total_spawned: 0,
        })
    }

    pub fn definition(&self) -> &ParticleLayerDefinition {
        &self.effect.layers[self.index]
    }

    /// Accumulates `dt` milliseconds and spawns what is due. Returns the number spawned.
    pub fn emit<R: Rng + ?Sized>(&mut self, dt: f32, pose: &EmitterPose, frame: &ParticleFrame, rng: &mut R) -> u32 {
        let effect = Arc::clone(&self.effect);
        let def = &effect.layers[self.index];
        let due = self.due(dt, def.interval);
        if due == 0 {
            return 0;
        }
        let room = (def.maximum as usize).saturating_sub(self.active.len());
        let mut wanted = (due as usize).min(room);
        if let Some(remaining) = self.remaining {
            wanted = wanted.min(remaining as usize);
        }

        let mut spawned = 0u32;
        for _ in 0..wanted {
            if let Some(mut element) = self.pooled.pop() {
                element.initialize(def, &self.curves, pose, frame, rng);
                self.active.push(element);
            } else if self.allocated < self.capacity {
                self.allocated += 1;
                // Both lists can hold every allocated element, so moving between them never grows.
                self.active.reserve(self.allocated.saturating_sub(self.active.len()));
                self.pooled.reserve(self.allocated.saturating_sub(self.pooled.len()));
                self.active.push(ParticleElement::spawn(def, &self.curves, pose, frame, rng));
            } else {
                break;
            }
            spawned += 1;
        }

        if let Some(remaining) = &mut self.remaining {
            *remaining -= spawned;
        }
        self.total_spawned += u64::from(spawned);
        spawned
    }

    fn due(&mut self, dt: f32, interval: f32) -> u32 {
        if !interval.is_finite() {
            return 0;
        }
        if interval <= 0.0 {
            // A zero interval spawns everything the budget allows at once.
            self.elapsed = 0.0;
            return u32::MAX;
        }
        if !(dt > 0.0) {
            return 0;
        }
        self.elapsed += dt;
        let count = (self.elapsed / interval).floor();
        self.elapsed -= count * interval;
        count.min(u32::MAX as f32) as u32
    }

    /// Advances every active element and compacts survivors to the front. Returns the active count.
    pub fn update(&mut self, dt: f32, frame: &ParticleFrame) -> usize {
        let effect = Arc::clone(&self.effect);
        let def = &effect.layers[self.index];
        let mut write = 0;
        for read in 0..self.active.len() {
            if self.active[read].update(dt, def, frame) {
                self.active.swap(write, read);
                write += 1;
            }
        }
        self.pooled.extend(self.active.drain(write..));
        self.active.len()
    }

    pub fn translate(&mut self, delta: Vec2) {
        for element in &mut self.active {
            element.translate(delta);
        }
    }

    /// Returns every active element to the pool.
    pub fn clear(&mut self) {
        self.pooled.extend(self.active.drain(..));
    }

    /// Writes one quad per active element. Skips the whole layer while its texture is not loaded.
    pub fn draw(&self, target: &mut DrawTarget<'_>, opacity: f32, light: LightMode) -> usize {
        let def = self.definition();
        let Some(texture) = target.textures.get(&def.sprite.image) else {
            return 0;
        };
        let DrawTarget { batch, scratch, .. } = target;
        match def.sort {
            DrawOrder::YoungestInFront => {
                for element in &self.active {
                    write_element(&mut **batch, texture, def, element, opacity, light);
                }
            }
            DrawOrder::OldestInFront => {
                for element in self.active.iter().rev() {
                    write_element(&mut **batch, texture, def, element, opacity, light);
                }
            }
            DrawOrder::ByScale => {
                let mut sort = scratch.begin();
                for (item, element) in self.active.iter().enumerate() {
                    let key = sort.key_for(element.scale());
                    sort.insert(item, key);
                }
                sort.drain(|item| write_element(&mut **batch, texture, def, &self.active[item], opacity, light));
            }
        }
        self.active.len()
    }

    pub fn particles(&self) -> &[ParticleElement] {
        &self.active
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn pooled_count(&self) -> usize {
        self.pooled.len()
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn total_spawned(&self) -> u64 {
        self.total_spawned
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// True once a bounded layer has spawned its whole budget.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

fn resolve_curves(def: &ParticleLayerDefinition, easing: &dyn EasingService) -> LayerCurves {
    let ColorPolicy::Easing { easing: color, alpha_easing, .. } = &def.color else {
        return LayerCurves::default();
    };
    let lookup = |id: &str| {
        let curve = easing.get(id);
        if curve.is_none() {
            log::debug!("[particles] layer '{}' uses unknown easing '{id}', falling back to linear", def.name);
        }
        curve
    };
    LayerCurves { color: lookup(color), alpha: alpha_easing.as_deref().and_then(lookup) }
}

fn write_element(
    batch: &mut dyn BatchRenderer,
    texture: TextureInfo,
    def: &ParticleLayerDefinition,
    element: &ParticleElement,
    opacity: f32,
    light: LightMode,
) {
    let corners = math::quad_corners(&element.matrix(), Rect::UNIT_CENTERED);
    let [u0, v0, u1, v1] = def.sprite.cell_uv(element.sprite_cell(), texture.width, texture.height);
    let uvs = [[u0, v0], [u1, v0], [u1, v1], [u0, v1]];
    let [r, g, b, a] = element.rgba();
    let alpha = opacity * element.opacity() * f32::from(a) / 255.0;
    let params = pack_params(def.blend, light, 0, alpha);
    // Particle colors multiply down from white, expressed as a negative additive tint.
    let tint = pack_tint([i16::from(r) - 255, i16::from(g) - 255, i16::from(b) - 255, 0]);
    let light_anchor = pack_light_anchor(element.position().to_array());
    let quad: [SpriteVertex; 4] = std::array::from_fn(|corner| SpriteVertex {
        position: corners[corner].to_array(),
        uv: uvs[corner],
        params,
        tint,
        light_anchor,
    });
    write_quad(batch, texture.id, def.blend, quad);
}
