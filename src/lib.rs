#[cfg(feature = "alloc_profiler")]
pub mod alloc_profiler;
pub mod animation;
pub mod animation_validation;
pub mod assets;
pub mod audio;
pub mod config;
pub mod easing;
pub mod math;
pub mod particles;
pub mod profiler;
pub mod renderer;
pub mod scene;

pub use animation::{AnimationPlayer, EmitterOwner, MotionFinish, PlayerResources};
pub use config::{EngineConfig, EngineConfigOverrides};
pub use particles::ParticleEmitter;
pub use scene::EmitterRegistry;
