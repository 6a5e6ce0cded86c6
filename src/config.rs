use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct AnimationConfig {
    #[serde(default = "AnimationConfig::default_frame_rate")]
    pub frame_rate: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticleConfig {
    #[serde(default = "ParticleConfig::default_capacity")]
    pub capacity: u32,
    #[serde(default = "ParticleConfig::default_edge_offscreen_timeout_ms")]
    pub edge_offscreen_timeout_ms: f32,
    #[serde(default = "ParticleConfig::default_sort_key_scale")]
    pub sort_key_scale: f32,
    #[serde(default = "ParticleConfig::default_sort_max_key")]
    pub sort_max_key: u32,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewportConfig {
    #[serde(default = "ViewportConfig::default_width")]
    pub width: f32,
    #[serde(default = "ViewportConfig::default_height")]
    pub height: f32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub particles: ParticleConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfigOverrides {
    pub frame_rate: Option<f32>,
    pub particle_capacity: Option<u32>,
    pub seed: Option<u64>,
}

impl AnimationConfig {
    const fn default_frame_rate() -> f32 {
        60.0
    }

    /// Milliseconds per animation frame. Non-positive or non-finite rates fall back to the default.
    pub fn step_ms(&self) -> f32 {
        let rate = if self.frame_rate.is_finite() && self.frame_rate > 0.0 {
            self.frame_rate
        } else {
            Self::default_frame_rate()
        };
        1000.0 / rate
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self { frame_rate: Self::default_frame_rate() }
    }
}

impl ParticleConfig {
    const fn default_capacity() -> u32 {
        1_000
    }

    const fn default_edge_offscreen_timeout_ms() -> f32 {
        500.0
    }

    const fn default_sort_key_scale() -> f32 {
        100.0
    }

    const fn default_sort_max_key() -> u32 {
        4_095
    }
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
            edge_offscreen_timeout_ms: Self::default_edge_offscreen_timeout_ms(),
            sort_key_scale: Self::default_sort_key_scale(),
            sort_max_key: Self::default_sort_max_key(),
            seed: None,
        }
    }
}

impl ViewportConfig {
    const fn default_width() -> f32 {
        1280.0
    }

    const fn default_height() -> f32 {
        720.0
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self { width: Self::default_width(), height: Self::default_height() }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("[config] load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &EngineConfigOverrides) {
        if let Some(frame_rate) = overrides.frame_rate {
            self.animation.frame_rate = frame_rate;
        }
        if let Some(capacity) = overrides.particle_capacity {
            self.particles.capacity = capacity;
        }
        if let Some(seed) = overrides.seed {
            self.particles.seed = Some(seed);
        }
    }
}

impl EngineConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.frame_rate.is_none() && self.particle_capacity.is_none() && self.seed.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.frame_rate.is_some() {
            fields.push("frame_rate");
        }
        if self.particle_capacity.is_some() {
            fields.push("particle_capacity");
        }
        if self.seed.is_some() {
            fields.push("seed");
        }
        fields
    }
}
