//! Particle simulation: emitters own layers, layers own pooled elements.

use crate::config::EngineConfig;
use crate::math::Rect;
use glam::{Affine2, Vec2};
use std::f32::consts::PI;

pub mod element;
pub mod emitter;
pub mod layer;
pub mod sort;
pub mod spawn;

pub use element::ParticleElement;
pub use emitter::{EmitterFlags, ParticleEmitter};
pub use layer::ParticleLayer;
pub use sort::{BucketSort, SortScratch};

/// Per-tick environment shared by every emitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleFrame {
    pub viewport: Rect,
    /// How long an edge particle may stay off-screen before it is recycled.
    pub edge_timeout_ms: f32,
}

impl ParticleFrame {
    pub fn new(viewport: Rect) -> Self {
        Self { viewport, edge_timeout_ms: 500.0 }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            viewport: Rect::from_size(config.viewport.width, config.viewport.height),
            edge_timeout_ms: config.particles.edge_offscreen_timeout_ms,
        }
    }
}

impl Default for ParticleFrame {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Where an emitter spawns from this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterPose {
    pub position: Vec2,
    /// Base direction for movement, orbit and local spawn offsets.
    pub angle: f32,
    pub scale: f32,
    /// Authored headings and offsets are reflected across the local y axis before `angle` applies.
    pub mirrored: bool,
    /// When set, spawn points are anchored at the matrix origin instead of `position`.
    pub matrix: Option<Affine2>,
}

impl Default for EmitterPose {
    fn default() -> Self {
        Self { position: Vec2::ZERO, angle: 0.0, scale: 1.0, mirrored: false, matrix: None }
    }
}

impl EmitterPose {
    /// The world point particles are spawned around.
    pub fn anchor(&self) -> Vec2 {
        match &self.matrix {
            Some(matrix) => matrix.transform_point2(Vec2::ZERO),
            None => self.position,
        }
    }

    /// World heading for an authored `local` heading.
    pub fn heading(&self, local: f32) -> f32 {
        if self.mirrored {
            self.angle + PI - local
        } else {
            self.angle + local
        }
    }

    /// Maps an authored local vector into world orientation. Scale is left to the caller.
    pub fn orient(&self, local: Vec2) -> Vec2 {
        let local = if self.mirrored { Vec2::new(-local.x, local.y) } else { local };
        Vec2::from_angle(self.angle).rotate(local)
    }
}
