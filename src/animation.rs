//! Motion playback: direction selection, keyframe sampling and per-layer contexts.

pub mod context;
pub mod direction;
pub mod keyframe;
pub mod player;

pub use context::LayerContext;
pub use direction::{resolve_direction, DirectionEntry, DirectionTemplate};
pub use player::{
    AnimationPlayer, EmitterOwner, FinishReason, MotionFinish, PlayerResources, PlayerSnapshot,
};
