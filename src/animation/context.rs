use crate::assets::KeyTransform;
use crate::math;
use crate::renderer::BlendMode;
use crate::scene::SharedEmitter;
use glam::{Affine2, Vec2};

/// Per-instance state mirroring one flattened layer of the active direction case.
///
/// Slots are rebound rather than rebuilt when the layer tree changes.
pub struct LayerContext {
    pub node: usize,
    pub parent: Option<usize>,
    /// Keyframe matched this tick; `None` hides the layer.
    pub frame: Option<usize>,
    pub matrix: Affine2,
    pub opacity: f32,
    pub anchor: Vec2,
    pub pivot: Vec2,
    pub tint: Option<[i16; 4]>,
    pub cell: u32,
    pub uv: Option<[f32; 4]>,
    pub blend: BlendMode,
    pub emitter: Option<SharedEmitter>,
    /// The layer names a particle effect the library does not have.
    pub emitter_missing: bool,
    /// Occurrence stamp of the last sound trigger.
    pub sound_stamp: Option<i64>,
}

impl LayerContext {
    pub fn new(node: usize, parent: Option<usize>) -> Self {
        Self {
            node,
            parent,
            frame: None,
            matrix: Affine2::IDENTITY,
            opacity: 1.0,
            anchor: Vec2::splat(0.5),
            pivot: Vec2::ZERO,
            tint: None,
            cell: 0,
            uv: None,
            blend: BlendMode::Normal,
            emitter: None,
            emitter_missing: false,
            sound_stamp: None,
        }
    }

    pub fn rebind(&mut self, node: usize, parent: Option<usize>) {
        self.detach_emitter();
        *self = Self::new(node, parent);
    }

    /// Takes the parent's transform unchanged and hides the layer for this tick.
    pub fn inherit(&mut self, parent_matrix: Affine2, parent_opacity: f32) {
        self.frame = None;
        self.matrix = parent_matrix;
        self.opacity = parent_opacity;
    }

    /// Composes the keyframe transform onto the parent: translate, then rotate, then scale.
    pub fn apply(&mut self, parent_matrix: Affine2, parent_opacity: f32, keyframe: usize, transform: &KeyTransform) {
        let local = math::compose(
            Vec2::new(transform.x, transform.y),
            transform.rotation,
            Vec2::new(transform.scale_x, transform.scale_y),
        );
        self.frame = Some(keyframe);
        self.matrix = parent_matrix * local;
        self.opacity = parent_opacity * transform.opacity.clamp(0.0, 1.0);
    }

    pub fn is_drawn(&self) -> bool {
        self.frame.is_some() && self.opacity > 0.0
    }

    pub fn world_position(&self) -> Vec2 {
        self.matrix.translation
    }

    /// Stops the bound emitter and lets its particles drain in whichever list owns it.
    pub fn detach_emitter(&mut self) {
        if let Some(emitter) = self.emitter.take() {
            emitter.borrow_mut().detach();
        }
        self.emitter_missing = false;
    }
}

impl Drop for LayerContext {
    fn drop(&mut self) {
        self.detach_emitter();
    }
}
