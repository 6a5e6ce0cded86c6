use crate::renderer::BlendMode;
use anyhow::{Context, Result};
use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// A randomized scalar: `mean ± deviation`, sampled uniformly.
///
/// Accepts a bare number, a `[mean, deviation]` pair or `{ "mean": .., "deviation": .. }`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(from = "RangeFile")]
pub struct Range {
    pub mean: f32,
    pub deviation: f32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RangeFile {
    Fixed(f32),
    Pair([f32; 2]),
    Map {
        mean: f32,
        #[serde(default)]
        deviation: f32,
    },
}

impl From<RangeFile> for Range {
    fn from(value: RangeFile) -> Self {
        match value {
            RangeFile::Fixed(mean) => Range::fixed(mean),
            RangeFile::Pair([mean, deviation]) => Range::new(mean, deviation),
            RangeFile::Map { mean, deviation } => Range::new(mean, deviation),
        }
    }
}

impl Range {
    pub const fn new(mean: f32, deviation: f32) -> Self {
        Self { mean, deviation }
    }

    pub const fn fixed(mean: f32) -> Self {
        Self { mean, deviation: 0.0 }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        let deviation = self.deviation.abs();
        if deviation == 0.0 || !deviation.is_finite() {
            return self.mean;
        }
        self.mean + rng.gen_range(-deviation..=deviation)
    }

    pub fn max(&self) -> f32 {
        self.mean + self.deviation.abs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum SpawnArea {
    #[default]
    Point,
    Rectangle {
        width: f32,
        height: f32,
    },
    Circle {
        radius: f32,
    },
    /// Spawn just outside the viewport on the border the particle is moving away from.
    Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    /// Live particles stay where they were spawned when the emitter moves.
    #[default]
    Absolute,
    /// Live particles follow emitter movement.
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Movement {
    /// Pixels per second.
    pub speed: Range,
    /// Radians, relative to the emitter angle.
    pub angle: Range,
    /// Pixels per second squared.
    pub acceleration: Range,
    pub acceleration_angle: Range,
}

/// Expansion and rotation around the spawn point, layered on top of linear movement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Orbit {
    pub radius_speed: Range,
    pub angular_speed: Range,
    pub angular_acceleration: Range,
}

impl Orbit {
    pub fn is_active(&self) -> bool {
        self.radius_speed != Range::default()
            || self.angular_speed != Range::default()
            || self.angular_acceleration != Range::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Spin {
    pub initial: Range,
    pub speed: Range,
    pub acceleration: Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Growth {
    pub initial: Range,
    pub speed: Range,
    pub acceleration: Range,
}

impl Default for Growth {
    fn default() -> Self {
        Self { initial: Range::fixed(1.0), speed: Range::default(), acceleration: Range::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ColorPolicy {
    Fixed {
        color: [u8; 4],
    },
    /// One random color per particle, chosen at spawn.
    Random {
        min: [u8; 4],
        max: [u8; 4],
    },
    /// Start and end colors sampled at spawn, interpolated over the lifetime through a curve.
    Easing {
        start_min: [u8; 4],
        start_max: [u8; 4],
        end_min: [u8; 4],
        end_max: [u8; 4],
        easing: String,
        #[serde(default)]
        alpha_easing: Option<String>,
    },
    /// A decoded one-row color texture sampled by normalized age.
    Texture {
        pixels: Vec<[u8; 4]>,
    },
}

impl Default for ColorPolicy {
    fn default() -> Self {
        ColorPolicy::Fixed { color: [255, 255, 255, 255] }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawOrder {
    #[default]
    YoungestInFront,
    OldestInFront,
    ByScale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellMode {
    #[default]
    First,
    Random,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParticleSprite {
    /// Texture cache key.
    pub image: String,
    pub cell_width: f32,
    pub cell_height: f32,
    #[serde(default = "ParticleSprite::default_grid")]
    pub columns: u32,
    #[serde(default = "ParticleSprite::default_grid")]
    pub rows: u32,
    #[serde(default)]
    pub cells: CellMode,
}

impl ParticleSprite {
    const fn default_grid() -> u32 {
        1
    }

    pub fn cell_count(&self) -> u32 {
        self.columns.max(1) * self.rows.max(1)
    }

    pub fn cell_uv(&self, cell: u32, texture_width: u32, texture_height: u32) -> [f32; 4] {
        super::grid_cell_uv(
            cell,
            (self.columns, self.rows),
            (self.cell_width, self.cell_height),
            (texture_width, texture_height),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParticleLayerDefinition {
    #[serde(default)]
    pub name: String,
    pub sprite: ParticleSprite,
    #[serde(default)]
    pub area: SpawnArea,
    #[serde(default)]
    pub position: PositionMode,
    #[serde(default)]
    pub movement: Movement,
    #[serde(default)]
    pub rotation: Spin,
    #[serde(default)]
    pub orbit: Orbit,
    #[serde(default)]
    pub scale: Growth,
    #[serde(default)]
    pub color: ColorPolicy,
    /// Milliseconds.
    pub lifetime: Range,
    /// Fade-out duration at the end of the lifetime, in milliseconds.
    #[serde(default)]
    pub fadeout: f32,
    /// Milliseconds between spawns.
    pub interval: f32,
    /// Total spawns over the layer's life; `None` is unbounded.
    #[serde(default)]
    pub count: Option<u32>,
    /// Concurrently active particles.
    #[serde(default = "ParticleLayerDefinition::default_maximum")]
    pub maximum: u32,
    #[serde(default)]
    pub sort: DrawOrder,
    #[serde(default)]
    pub blend: BlendMode,
}

impl ParticleLayerDefinition {
    const fn default_maximum() -> u32 {
        1_000
    }

    pub fn is_edge(&self) -> bool {
        matches!(self.area, SpawnArea::Edge)
    }

    /// Minimal layer spawning from a point; used by tests and tools.
    pub fn simple(image: impl Into<String>, interval: f32, lifetime: f32) -> Self {
        Self {
            name: String::new(),
            sprite: ParticleSprite {
                image: image.into(),
                cell_width: 8.0,
                cell_height: 8.0,
                columns: 1,
                rows: 1,
                cells: CellMode::First,
            },
            area: SpawnArea::Point,
            position: PositionMode::Absolute,
            movement: Movement::default(),
            rotation: Spin::default(),
            orbit: Orbit::default(),
            scale: Growth::default(),
            color: ColorPolicy::default(),
            lifetime: Range::fixed(lifetime),
            fadeout: 0.0,
            interval,
            count: None,
            maximum: Self::default_maximum(),
            sort: DrawOrder::YoungestInFront,
            blend: BlendMode::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParticleEffectDefinition {
    #[serde(default)]
    pub name: String,
    pub layers: Vec<ParticleLayerDefinition>,
}

impl ParticleEffectDefinition {
    pub fn new(name: impl Into<String>, layers: Vec<ParticleLayerDefinition>) -> Self {
        Self { name: name.into(), layers }
    }
}

/// Effects keyed by id, as produced by the asset loading stage.
#[derive(Default, Clone)]
pub struct ParticleLibrary {
    effects: HashMap<String, Arc<ParticleEffectDefinition>>,
}

impl ParticleLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let effects: HashMap<String, ParticleEffectDefinition> =
            serde_json::from_slice(bytes).context("Failed to parse particle effect table")?;
        let mut library = Self::new();
        for (id, mut effect) in effects {
            if effect.name.is_empty() {
                effect.name = id.clone();
            }
            library.insert(id, effect);
        }
        Ok(library)
    }

    pub fn insert(&mut self, id: impl Into<String>, effect: ParticleEffectDefinition) {
        self.effects.insert(id.into(), Arc::new(effect));
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ParticleEffectDefinition>> {
        self.effects.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.effects.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.effects.keys().map(String::as_str)
    }
}
