use super::{spawn, EmitterPose, ParticleFrame};
use crate::assets::{CellMode, ColorPolicy, ParticleLayerDefinition, SpawnArea};
use crate::easing::EasingCurve;
use crate::math::{self, Rect};
use glam::{Affine2, Vec2};
use rand::Rng;
use std::f32::consts::PI;
use std::sync::Arc;

/// Curves a layer resolves once and hands to every element it spawns.
#[derive(Clone, Default)]
pub struct LayerCurves {
    pub color: Option<Arc<dyn EasingCurve>>,
    pub alpha: Option<Arc<dyn EasingCurve>>,
}

#[derive(Clone)]
enum ColorState {
    /// Fixed or random-once: `rgba` is written at spawn and never changes.
    Static,
    Eased {
        start: [f32; 4],
        end: [f32; 4],
        curve: Option<Arc<dyn EasingCurve>>,
        alpha: Option<Arc<dyn EasingCurve>>,
    },
    Sampled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PostProcess {
    Common,
    Edge { appeared: bool, offscreen_ms: f32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct OrbitState {
    base_angle: f32,
    mirrored: bool,
    radius: f32,
    radius_speed: f32,
    angle: f32,
    angular_speed: f32,
    angular_acceleration: f32,
    offset: Vec2,
}

/// One live (or pooled) particle. Distances are pixels, speeds are per second and ages are
/// milliseconds.
#[derive(Clone)]
pub struct ParticleElement {
    age: f32,
    lifetime: f32,
    fadeout_start: f32,
    position: Vec2,
    velocity: Vec2,
    acceleration: Vec2,
    orbit: Option<OrbitState>,
    rotation: f32,
    rotation_speed: f32,
    rotation_acceleration: f32,
    scale: f32,
    scale_speed: f32,
    scale_acceleration: f32,
    color: ColorState,
    rgba: [u8; 4],
    opacity: f32,
    sprite_cell: u32,
    size: Vec2,
    post: PostProcess,
}

impl ParticleElement {
    pub fn spawn<R: Rng + ?Sized>(
        def: &ParticleLayerDefinition,
        curves: &LayerCurves,
        pose: &EmitterPose,
        frame: &ParticleFrame,
        rng: &mut R,
    ) -> Self {
        let mut element = Self {
            age: 0.0,
            lifetime: 0.0,
            fadeout_start: 0.0,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            orbit: None,
            rotation: 0.0,
            rotation_speed: 0.0,
            rotation_acceleration: 0.0,
            scale: 1.0,
            scale_speed: 0.0,
            scale_acceleration: 0.0,
            color: ColorState::Static,
            rgba: [255; 4],
            opacity: 1.0,
            sprite_cell: 0,
            size: Vec2::ZERO,
            post: PostProcess::Common,
        };
        element.initialize(def, curves, pose, frame, rng);
        element
    }

    /// Re-arms a pooled element in place.
    pub fn initialize<R: Rng + ?Sized>(
        &mut self,
        def: &ParticleLayerDefinition,
        curves: &LayerCurves,
        pose: &EmitterPose,
        frame: &ParticleFrame,
        rng: &mut R,
    ) {
        self.age = 0.0;
        self.lifetime = def.lifetime.sample(rng).max(0.0);
        self.fadeout_start = (self.lifetime - def.fadeout.max(0.0)).max(0.0);
        self.opacity = 1.0;

        let heading = pose.heading(def.movement.angle.sample(rng));
        self.velocity = Vec2::from_angle(heading) * def.movement.speed.sample(rng) * pose.scale;
        let accel_heading = pose.heading(def.movement.acceleration_angle.sample(rng));
        self.acceleration = Vec2::from_angle(accel_heading) * def.movement.acceleration.sample(rng) * pose.scale;

        self.orbit = def.orbit.is_active().then(|| OrbitState {
            base_angle: pose.angle,
            mirrored: pose.mirrored,
            radius: 0.0,
            radius_speed: def.orbit.radius_speed.sample(rng) * pose.scale,
            angle: 0.0,
            angular_speed: def.orbit.angular_speed.sample(rng),
            angular_acceleration: def.orbit.angular_acceleration.sample(rng),
            offset: Vec2::ZERO,
        });

        self.rotation = def.rotation.initial.sample(rng);
        self.rotation_speed = def.rotation.speed.sample(rng);
        self.rotation_acceleration = def.rotation.acceleration.sample(rng);
        self.scale = def.scale.initial.sample(rng) * pose.scale;
        self.scale_speed = def.scale.speed.sample(rng) * pose.scale;
        self.scale_acceleration = def.scale.acceleration.sample(rng) * pose.scale;

        self.size = Vec2::new(def.sprite.cell_width, def.sprite.cell_height);
        self.sprite_cell = match def.sprite.cells {
            CellMode::First => 0,
            CellMode::Random => rng.gen_range(0..def.sprite.cell_count()),
        };

        self.color = match &def.color {
            ColorPolicy::Fixed { color } => {
                self.rgba = *color;
                ColorState::Static
            }
            ColorPolicy::Random { min, max } => {
                self.rgba = random_color(min, max, rng);
                ColorState::Static
            }
            ColorPolicy::Easing { start_min, start_max, end_min, end_max, .. } => {
                let start = to_float(random_color(start_min, start_max, rng));
                let end = to_float(random_color(end_min, end_max, rng));
                ColorState::Eased { start, end, curve: curves.color.clone(), alpha: curves.alpha.clone() }
            }
            ColorPolicy::Texture { .. } => ColorState::Sampled,
        };
        self.refresh_color(def);

        match def.area {
            SpawnArea::Edge => {
                let half = self.bounds_at(Vec2::ZERO).size() * 0.5;
                self.position = spawn::edge_position(&frame.viewport, self.velocity, half, rng);
                self.post = PostProcess::Edge { appeared: false, offscreen_ms: 0.0 };
            }
            _ => {
                let offset = spawn::local_offset(&def.area, rng);
                self.position = spawn::world_position(pose, offset);
                self.post = PostProcess::Common;
            }
        }
    }

    /// Advances the particle by `dt` milliseconds. Returns false once it should go back to the pool.
    pub fn update(&mut self, dt: f32, def: &ParticleLayerDefinition, frame: &ParticleFrame) -> bool {
        let secs = dt / 1000.0;
        self.age += dt;

        self.velocity += self.acceleration * secs;
        self.position += self.velocity * secs;
        if let Some(orbit) = &mut self.orbit {
            orbit.radius += orbit.radius_speed * secs;
            orbit.angular_speed += orbit.angular_acceleration * secs;
            orbit.angle += orbit.angular_speed * secs;
            let heading = if orbit.mirrored {
                orbit.base_angle + PI - orbit.angle
            } else {
                orbit.base_angle + orbit.angle
            };
            let offset = Vec2::from_angle(heading) * orbit.radius;
            // only the change in orbital offset is applied so orbiting stays additive to drift
            self.position += offset - orbit.offset;
            orbit.offset = offset;
        }
        self.rotation_speed += self.rotation_acceleration * secs;
        self.rotation += self.rotation_speed * secs;
        self.scale_speed += self.scale_acceleration * secs;
        self.scale += self.scale_speed * secs;

        self.refresh_color(def);
        self.opacity = if self.age > self.fadeout_start && self.lifetime > self.fadeout_start {
            ((self.lifetime - self.age) / (self.lifetime - self.fadeout_start)).clamp(0.0, 1.0)
        } else {
            1.0
        };

        let expired = self.age >= self.lifetime;
        match &mut self.post {
            PostProcess::Common => !expired,
            PostProcess::Edge { appeared, offscreen_ms } => {
                let bounds = math::transformed_bounds(&quad_matrix(self.position, self.rotation, self.size * self.scale), Rect::UNIT_CENTERED);
                if bounds.intersects(&frame.viewport) {
                    *appeared = true;
                    *offscreen_ms = 0.0;
                    !expired
                } else {
                    *offscreen_ms += dt;
                    !(expired || *appeared || *offscreen_ms >= frame.edge_timeout_ms)
                }
            }
        }
    }

    fn refresh_color(&mut self, def: &ParticleLayerDefinition) {
        let progress = if self.lifetime > 0.0 { (self.age / self.lifetime).clamp(0.0, 1.0) } else { 1.0 };
        match &self.color {
            ColorState::Static => {}
            ColorState::Eased { start, end, curve, alpha } => {
                let t = curve.as_ref().map_or(progress, |curve| curve.map(progress));
                let ta = alpha.as_ref().map_or(t, |curve| curve.map(progress));
                for channel in 0..3 {
                    self.rgba[channel] = clamp_byte(start[channel] + (end[channel] - start[channel]) * t);
                }
                self.rgba[3] = clamp_byte(start[3] + (end[3] - start[3]) * ta);
            }
            ColorState::Sampled => {
                if let ColorPolicy::Texture { pixels } = &def.color {
                    if let Some(last) = pixels.len().checked_sub(1) {
                        let index = ((progress * last as f32).round() as usize).min(last);
                        self.rgba = pixels[index];
                    }
                }
            }
        }
    }

    /// Translates the particle without re-simulating it.
    pub fn translate(&mut self, delta: Vec2) {
        self.position += delta;
    }

    pub fn matrix(&self) -> Affine2 {
        quad_matrix(self.position, self.rotation, self.size * self.scale)
    }

    /// World bounding box of the particle quad.
    pub fn bounds(&self) -> Rect {
        math::transformed_bounds(&self.matrix(), Rect::UNIT_CENTERED)
    }

    fn bounds_at(&self, position: Vec2) -> Rect {
        math::transformed_bounds(&quad_matrix(position, self.rotation, self.size * self.scale), Rect::UNIT_CENTERED)
    }

    pub fn age(&self) -> f32 {
        self.age
    }

    pub fn lifetime(&self) -> f32 {
        self.lifetime
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn rgba(&self) -> [u8; 4] {
        self.rgba
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn sprite_cell(&self) -> u32 {
        self.sprite_cell
    }

    pub fn has_appeared(&self) -> bool {
        match self.post {
            PostProcess::Common => true,
            PostProcess::Edge { appeared, .. } => appeared,
        }
    }
}

fn quad_matrix(position: Vec2, rotation: f32, size: Vec2) -> Affine2 {
    math::compose(position, rotation, size)
}

fn random_color<R: Rng + ?Sized>(min: &[u8; 4], max: &[u8; 4], rng: &mut R) -> [u8; 4] {
    let mut out = [0u8; 4];
    for channel in 0..4 {
        let (lo, hi) = if min[channel] <= max[channel] {
            (min[channel], max[channel])
        } else {
            (max[channel], min[channel])
        };
        out[channel] = rng.gen_range(lo..=hi);
    }
    out
}

fn to_float(color: [u8; 4]) -> [f32; 4] {
    color.map(f32::from)
}

fn clamp_byte(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
