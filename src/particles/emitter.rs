use super::{EmitterPose, ParticleFrame, ParticleLayer};
use crate::assets::{ParticleEffectDefinition, PositionMode};
use crate::config::ParticleConfig;
use crate::easing::EasingService;
use crate::math;
use crate::renderer::{DrawTarget, LightMode};
use bitflags::bitflags;
use glam::{Affine2, Vec2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct EmitterFlags: u32 {
        /// Cleared by `disable`; a disabled emitter never spawns again.
        const ENABLED            = 1 << 0;
        /// Spawning is requested this tick (a keyframe window is active).
        const EMITTING           = 1 << 1;
        const VISIBLE            = 1 << 2;
        /// Positioned through a matrix by a UI-owned player instead of a scene target.
        const UI_OWNED           = 1 << 3;
        const HAS_LIVE_PARTICLES = 1 << 4;
        /// No longer bound to a player context.
        const DETACHED           = 1 << 5;
        /// Disabled and drained; the owning registry drops it on its next sweep.
        const TEARDOWN_PENDING   = 1 << 6;
        /// Drawn by the player context it is bound to, not by its registry.
        const BOUND              = 1 << 7;
    }
}

/// A running particle effect: one [`ParticleLayer`] per layer definition.
pub struct ParticleEmitter {
    effect: Arc<ParticleEffectDefinition>,
    layers: Vec<ParticleLayer>,
    flags: EmitterFlags,
    pose: EmitterPose,
    target_position: Vec2,
    last_anchor: Option<Vec2>,
    speed: f32,
    opacity: f32,
    always_emit: bool,
    always_draw: bool,
    rng: StdRng,
}

impl ParticleEmitter {
    pub fn new(effect: Arc<ParticleEffectDefinition>, config: &ParticleConfig, easing: &dyn EasingService) -> Self {
        let layers: Vec<ParticleLayer> = (0..effect.layers.len())
            .filter_map(|index| ParticleLayer::new(Arc::clone(&effect), index, config, easing))
            .collect();
        // Edge layers cover the whole viewport, so they keep running whatever the owner's visibility.
        let edge = effect.layers.iter().any(|layer| layer.is_edge());
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            effect,
            layers,
            flags: EmitterFlags::ENABLED | EmitterFlags::EMITTING | EmitterFlags::VISIBLE,
            pose: EmitterPose::default(),
            target_position: Vec2::ZERO,
            last_anchor: None,
            speed: 1.0,
            opacity: 1.0,
            always_emit: edge,
            always_draw: edge,
            rng,
        }
    }

    pub fn effect(&self) -> &Arc<ParticleEffectDefinition> {
        &self.effect
    }

    pub fn layers(&self) -> &[ParticleLayer] {
        &self.layers
    }

    pub fn flags(&self) -> EmitterFlags {
        self.flags
    }

    pub fn pose(&self) -> &EmitterPose {
        &self.pose
    }

    fn can_emit(&self) -> bool {
        self.flags.contains(EmitterFlags::ENABLED | EmitterFlags::EMITTING)
            && (self.flags.contains(EmitterFlags::VISIBLE) || self.always_emit)
    }

    /// Spawns whatever is due on every layer. Returns the number spawned.
    pub fn emit(&mut self, dt: f32, frame: &ParticleFrame) -> u32 {
        if !self.can_emit() {
            return 0;
        }
        let pose = self.pose;
        self.layers.iter_mut().map(|layer| layer.emit(dt, &pose, frame, &mut self.rng)).sum()
    }

    /// Advances live particles without spawning. Returns the active count.
    pub fn update_particles(&mut self, dt: f32, frame: &ParticleFrame) -> usize {
        self.layers.iter_mut().map(|layer| layer.update(dt, frame)).sum()
    }

    /// Advances live particles, then spawns. Returns the active count.
    pub fn update(&mut self, dt: f32, frame: &ParticleFrame) -> usize {
        self.update_particles(dt, frame);
        self.emit(dt, frame);
        self.particle_count()
    }

    /// Per-tick driver used by registries and players.
    pub fn tick(&mut self, dt: f32, frame: &ParticleFrame) -> usize {
        if !self.flags.contains(EmitterFlags::UI_OWNED) && !self.flags.contains(EmitterFlags::DETACHED) {
            self.pose.position = self.target_position;
        }
        let anchor = self.pose.anchor();
        if let Some(last) = self.last_anchor {
            let delta = anchor - last;
            if delta != Vec2::ZERO {
                self.translate_relative(delta);
            }
        }
        self.last_anchor = Some(anchor);

        let count = self.update(dt * self.speed, frame);
        self.flags.set(EmitterFlags::HAS_LIVE_PARTICLES, count > 0);
        if count == 0 && !self.flags.contains(EmitterFlags::ENABLED) {
            self.flags.insert(EmitterFlags::TEARDOWN_PENDING);
        }
        count
    }

    /// Moves every live particle by `delta`.
    pub fn translate(&mut self, delta: Vec2) {
        for layer in &mut self.layers {
            layer.translate(delta);
        }
    }

    /// Moves live particles of relative-position layers only.
    pub fn translate_relative(&mut self, delta: Vec2) {
        for layer in &mut self.layers {
            if layer.definition().position == PositionMode::Relative {
                layer.translate(delta);
            }
        }
    }

    pub fn draw(&self, target: &mut DrawTarget<'_>, light: LightMode) -> usize {
        if !self.flags.contains(EmitterFlags::VISIBLE) && !self.always_draw {
            return 0;
        }
        self.layers.iter().map(|layer| layer.draw(target, self.opacity, light)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(ParticleLayer::is_empty)
    }

    pub fn particle_count(&self) -> usize {
        self.layers.iter().map(ParticleLayer::active_count).sum()
    }

    /// Elements allocated across all layers, live or pooled.
    pub fn allocated(&self) -> usize {
        self.layers.iter().map(ParticleLayer::allocated).sum()
    }

    pub fn has_live_particles(&self) -> bool {
        self.flags.contains(EmitterFlags::HAS_LIVE_PARTICLES)
    }

    pub fn teardown_pending(&self) -> bool {
        self.flags.contains(EmitterFlags::TEARDOWN_PENDING)
    }

    pub fn is_enabled(&self) -> bool {
        self.flags.contains(EmitterFlags::ENABLED)
    }

    /// Stops spawning for good; live particles finish their lifetime.
    pub fn disable(&mut self) {
        self.flags.remove(EmitterFlags::ENABLED | EmitterFlags::EMITTING);
    }

    /// Marks the emitter as driven and drawn by a player context.
    pub fn bind(&mut self) {
        self.flags.insert(EmitterFlags::BOUND);
    }

    /// Disables the emitter and marks it as no longer bound to an owner.
    pub fn detach(&mut self) {
        self.disable();
        self.flags.remove(EmitterFlags::BOUND);
        self.flags.insert(EmitterFlags::DETACHED);
    }

    /// Drops every live particle and schedules teardown immediately.
    pub fn destroy(&mut self) {
        for layer in &mut self.layers {
            layer.clear();
        }
        self.detach();
        self.flags.remove(EmitterFlags::HAS_LIVE_PARTICLES);
        self.flags.insert(EmitterFlags::TEARDOWN_PENDING);
    }

    pub fn set_ui_owned(&mut self, ui_owned: bool) {
        self.flags.set(EmitterFlags::UI_OWNED, ui_owned);
    }

    /// Places the emitter immediately.
    pub fn set_position(&mut self, position: Vec2) {
        self.target_position = position;
        self.pose.position = position;
    }

    /// Position the emitter moves to on its next tick.
    pub fn set_target_position(&mut self, position: Vec2) {
        self.target_position = position;
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.pose.angle = angle;
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.pose.scale = scale;
    }

    /// Reflects authored headings and spawn offsets across the local y axis.
    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.pose.mirrored = mirrored;
    }

    pub fn set_matrix(&mut self, matrix: Option<Affine2>) {
        self.pose.matrix = matrix;
    }

    /// Moves a standalone emitter through a full transform: the matrix anchors spawns and its
    /// rotation, mean scale and handedness orient them.
    pub fn set_transform(&mut self, matrix: Affine2) {
        let (angle, scale, mirrored) = math::orientation_of(&matrix);
        self.pose.angle = angle;
        self.pose.scale = (scale.x + scale.y) * 0.5;
        self.pose.mirrored = mirrored;
        self.set_matrix(Some(matrix));
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = if speed.is_finite() { speed.max(0.0) } else { 0.0 };
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn set_emitting(&mut self, emitting: bool) {
        self.flags.set(EmitterFlags::EMITTING, emitting && self.flags.contains(EmitterFlags::ENABLED));
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.flags.set(EmitterFlags::VISIBLE, visible);
    }

    pub fn always_emit(&self) -> bool {
        self.always_emit
    }

    pub fn always_draw(&self) -> bool {
        self.always_draw
    }
}
