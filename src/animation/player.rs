use super::context::LayerContext;
use super::direction::{self, DirectionTemplate};
use super::keyframe;
use crate::assets::{
    AnimationDefinition, DirectionCase, ImageOverrides, KeyParams, Keyframe, LayerKind, LayerNode, Motion,
    ParticleLibrary, TextureCache,
};
use crate::audio::{AudioService, SilentAudio};
use crate::config::EngineConfig;
use crate::easing::{EasingService, EasingTable};
use crate::math::{self, Rect};
use crate::particles::{ParticleEmitter, ParticleFrame};
use crate::renderer::{
    pack_light_anchor, pack_params, pack_tint, write_quad, DrawTarget, LightMode, SpriteVertex,
};
use crate::scene::{self, EmitterRegistry};
use glam::{Affine2, Vec2};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Shared, read-only inputs every player of one definition draws from.
#[derive(Clone)]
pub struct PlayerResources {
    pub definition: Arc<AnimationDefinition>,
    pub particles: Arc<ParticleLibrary>,
    pub easing: Arc<dyn EasingService>,
    pub audio: Rc<dyn AudioService>,
    pub config: EngineConfig,
}

impl PlayerResources {
    pub fn new(definition: Arc<AnimationDefinition>, config: EngineConfig) -> Self {
        Self {
            definition,
            particles: Arc::new(ParticleLibrary::new()),
            easing: Arc::new(EasingTable::with_builtins()),
            audio: Rc::new(SilentAudio),
            config,
        }
    }

    pub fn with_particles(mut self, particles: Arc<ParticleLibrary>) -> Self {
        self.particles = particles;
        self
    }

    pub fn with_easing(mut self, easing: Arc<dyn EasingService>) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_audio(mut self, audio: Rc<dyn AudioService>) -> Self {
        self.audio = audio;
        self
    }
}

/// Where a player's particle emitters are registered and advanced.
#[derive(Clone, Default)]
pub enum EmitterOwner {
    /// A scene registry ticks the emitters; the player only feeds them targets.
    Scene(Rc<RefCell<EmitterRegistry>>),
    /// The player keeps a private list and advances it in its own `update`.
    #[default]
    Ui,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// A non-looping motion reached its last frame.
    Completed,
    /// The motion or direction changed, or the player was destroyed, before completion.
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionFinish {
    pub motion: String,
    pub reason: FinishReason,
}

pub type FinishCallback = Box<dyn FnOnce(&MotionFinish)>;
pub type EndHook = Box<dyn FnMut(&MotionFinish)>;

/// Playback position that can be stored and re-applied.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub motion: Option<String>,
    pub angle: f32,
    pub direction: Option<usize>,
    pub index: f32,
    pub cycle_index: u32,
    pub ended: bool,
}

/// Plays motions of one [`AnimationDefinition`] for a single visual instance.
pub struct AnimationPlayer {
    resources: PlayerResources,
    step_ms: f32,
    motion: Option<Arc<Motion>>,
    template: &'static DirectionTemplate,
    case: Option<Arc<DirectionCase>>,
    direction: Option<usize>,
    mirror: bool,
    angle: f32,
    derived_rotation: f32,
    index: f32,
    loop_start: f32,
    cycle_index: u32,
    ended: bool,
    paused: bool,
    speed: f32,
    contexts: Vec<LayerContext>,
    context_count: usize,
    position: Vec2,
    scale: Vec2,
    rotation_offset: f32,
    opacity: f32,
    visible: bool,
    tints: SmallVec<[[i16; 4]; 2]>,
    images: ImageOverrides,
    finish_callbacks: SmallVec<[FinishCallback; 2]>,
    end_hook: Option<EndHook>,
    owner: EmitterOwner,
    ui_emitters: EmitterRegistry,
    particle_frame: ParticleFrame,
    destroyed: bool,
    root_dirty: bool,
}

impl AnimationPlayer {
    pub fn new(resources: PlayerResources) -> Self {
        let step_ms = resources.config.animation.step_ms();
        let particle_frame = ParticleFrame::from_config(&resources.config);
        Self {
            resources,
            step_ms,
            motion: None,
            template: direction::template_or_default(""),
            case: None,
            direction: None,
            mirror: false,
            angle: 0.0,
            derived_rotation: 0.0,
            index: 0.0,
            loop_start: 0.0,
            cycle_index: 0,
            ended: false,
            paused: false,
            speed: 1.0,
            contexts: Vec::new(),
            context_count: 0,
            position: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation_offset: 0.0,
            opacity: 1.0,
            visible: true,
            tints: SmallVec::new(),
            images: ImageOverrides::default(),
            finish_callbacks: SmallVec::new(),
            end_hook: None,
            owner: EmitterOwner::Ui,
            ui_emitters: EmitterRegistry::new(),
            particle_frame,
            destroyed: false,
            root_dirty: false,
        }
    }

    /// Binds the player to its emitter owner. Emitters created under a previous owner are detached
    /// and drain there.
    pub fn activate(&mut self, owner: EmitterOwner) {
        self.detach_emitters();
        self.owner = owner;
        self.root_dirty = true;
    }

    // ---------- Motion & direction ----------

    pub fn set_motion(&mut self, name: &str) -> bool {
        let Some(motion) = self.resources.definition.motion(name).cloned() else {
            log::debug!("[motion] unknown motion '{name}'");
            return false;
        };
        self.flush_finish(FinishReason::Interrupted);
        let template = direction::template(&motion.direction_mode).unwrap_or_else(|| {
            log::warn!("[motion] '{}' uses unknown direction mode '{}', using 1-dir", motion.name, motion.direction_mode);
            direction::template_or_default("1-dir")
        });
        let same_layout = self.motion.is_some() && template.name == self.template.name;
        self.motion = Some(motion);
        if same_layout && self.direction.is_some() {
            self.load_dir_case();
        } else {
            self.template = template;
            self.direction = None;
            if !self.set_angle(self.angle) {
                // no case for the current facing: drop the previous motion's tree
                self.mirror = false;
                self.load_dir_case();
            }
        }
        true
    }

    /// Faces the player toward `angle` radians. Returns whether the direction changed.
    pub fn set_angle(&mut self, angle: f32) -> bool {
        if !angle.is_finite() {
            return false;
        }
        self.angle = angle;
        let derived = if self.template.rotates { angle } else { 0.0 };
        if derived != self.derived_rotation {
            self.derived_rotation = derived;
            self.root_dirty = true;
        }
        match direction::resolve_direction(angle, self.template.count(), self.direction) {
            Some(direction) => self.set_direction(direction),
            None => false,
        }
    }

    pub fn set_direction(&mut self, direction: usize) -> bool {
        if self.direction == Some(direction) {
            return false;
        }
        let Some(entry) = self.template.entry(direction) else {
            return false;
        };
        let Some(motion) = &self.motion else {
            return false;
        };
        if motion.case(entry.case).is_none() {
            log::debug!("[motion] '{}' has no direction case {}", motion.name, entry.case);
            return false;
        }
        self.direction = Some(direction);
        self.mirror = entry.mirror;
        self.flush_finish(FinishReason::Interrupted);
        self.load_dir_case();
        true
    }

    fn load_dir_case(&mut self) {
        self.detach_emitters();
        let case = self
            .direction
            .and_then(|direction| self.template.entry(direction))
            .and_then(|entry| self.motion.as_ref()?.case(entry.case).cloned());
        let Some(case) = case else {
            self.case = None;
            self.context_count = 0;
            return;
        };
        for (slot, node) in case.nodes().iter().enumerate() {
            match self.contexts.get_mut(slot) {
                Some(ctx) => ctx.rebind(slot, node.parent),
                None => self.contexts.push(LayerContext::new(slot, node.parent)),
            }
        }
        self.context_count = case.layer_count();
        self.index = 0.0;
        self.loop_start = case.loop_start();
        self.cycle_index = 0;
        self.ended = false;
        self.case = Some(case);
        self.refresh();
    }

    fn detach_emitters(&mut self) {
        for ctx in &mut self.contexts {
            ctx.detach_emitter();
        }
    }

    // ---------- Playback ----------

    /// Advances playback by `dt` milliseconds, refreshes the layer contexts, then advances the
    /// player's own emitters.
    pub fn update(&mut self, dt: f32) {
        if !self.destroyed {
            let (advanced, completed) = self.advance(dt);
            if advanced || self.root_dirty {
                self.refresh();
            }
            if completed {
                self.flush_finish(FinishReason::Completed);
            }
        }
        if dt > 0.0 {
            self.ui_emitters.update(dt, &self.particle_frame);
        }
    }

    fn advance(&mut self, dt: f32) -> (bool, bool) {
        if self.paused || self.ended || !(dt > 0.0) {
            return (false, false);
        }
        let (Some(motion), Some(case)) = (&self.motion, &self.case) else {
            return (false, false);
        };
        let length = case.length() as f32;
        let mut step = dt * self.speed / self.step_ms;
        if !motion.skip {
            step = step.min(1.0);
        }
        if !(step > 0.0) {
            return (false, false);
        }
        self.index += step;
        if self.index < length {
            return (true, false);
        }
        if motion.looped {
            self.index = self.index % length + self.loop_start;
            if self.index >= length {
                self.index = self.loop_start;
            }
            self.cycle_index += 1;
            (true, false)
        } else {
            self.index = length - 1.0;
            self.ended = true;
            (true, true)
        }
    }

    /// Jumps to frame `index` and clears the ended state. Indices past the end land on the last frame.
    pub fn goto(&mut self, index: f32) {
        let Some(case) = &self.case else {
            return;
        };
        let length = case.length() as f32;
        self.index = match index {
            index if !index.is_finite() || index < 0.0 => 0.0,
            index if index < length => index,
            _ => length - 1.0,
        };
        self.ended = false;
        for ctx in &mut self.contexts[..self.context_count] {
            ctx.sound_stamp = None;
        }
        self.refresh();
    }

    pub fn restart(&mut self) {
        self.cycle_index = 0;
        self.goto(0.0);
    }

    /// Runs `callback` once the current motion finishes or is interrupted. Fires immediately when the
    /// motion already ended.
    pub fn on_finish(&mut self, callback: impl FnOnce(&MotionFinish) + 'static) {
        match (&self.motion, self.ended) {
            (Some(motion), true) => {
                callback(&MotionFinish { motion: motion.name.clone(), reason: FinishReason::Completed })
            }
            _ => self.finish_callbacks.push(Box::new(callback)),
        }
    }

    /// Called every time a non-looping motion completes.
    pub fn set_end_hook(&mut self, hook: impl FnMut(&MotionFinish) + 'static) {
        self.end_hook = Some(Box::new(hook));
    }

    pub fn clear_end_hook(&mut self) {
        self.end_hook = None;
    }

    fn flush_finish(&mut self, reason: FinishReason) {
        let Some(motion) = &self.motion else {
            return;
        };
        if self.finish_callbacks.is_empty() && (reason != FinishReason::Completed || self.end_hook.is_none()) {
            return;
        }
        let finish = MotionFinish { motion: motion.name.clone(), reason };
        for callback in self.finish_callbacks.drain(..) {
            callback(&finish);
        }
        if reason == FinishReason::Completed {
            if let Some(hook) = &mut self.end_hook {
                hook(&finish);
            }
        }
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.root_dirty = true;
        }
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.root_dirty = true;
        }
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = if speed.is_finite() { speed.max(0.0) } else { 0.0 };
        self.root_dirty = true;
    }

    /// Stops playback for good. Finish callbacks fire as interrupted; emitters stop spawning and
    /// their live particles are left to finish.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.flush_finish(FinishReason::Interrupted);
        self.detach_emitters();
        self.destroyed = true;
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            motion: self.motion.as_ref().map(|motion| motion.name.clone()),
            angle: self.angle,
            direction: self.direction,
            index: self.index,
            cycle_index: self.cycle_index,
            ended: self.ended,
        }
    }

    pub fn restore(&mut self, snapshot: &PlayerSnapshot) -> bool {
        let Some(name) = snapshot.motion.as_deref() else {
            return false;
        };
        if self.motion_name() != Some(name) && !self.set_motion(name) {
            return false;
        }
        self.set_angle(snapshot.angle);
        if let Some(direction) = snapshot.direction {
            self.set_direction(direction);
        }
        self.goto(snapshot.index);
        self.cycle_index = snapshot.cycle_index;
        self.ended = snapshot.ended;
        true
    }

    // ---------- Instance transform & appearance ----------

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.root_dirty = true;
    }

    pub fn set_scale(&mut self, scale: Vec2) {
        self.scale = scale;
        self.root_dirty = true;
    }

    pub fn set_rotation_offset(&mut self, radians: f32) {
        self.rotation_offset = radians;
        self.root_dirty = true;
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.root_dirty = true;
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.root_dirty = true;
    }

    /// Adds an instance-level tint applied on top of every sprite keyframe tint.
    pub fn push_tint(&mut self, tint: [i16; 4]) {
        self.tints.push(tint);
        self.root_dirty = true;
    }

    pub fn clear_tints(&mut self) {
        self.tints.clear();
        self.root_dirty = true;
    }

    pub fn push_image_overrides(&mut self, overrides: HashMap<usize, String>) {
        self.images.push(overrides);
    }

    pub fn pop_image_overrides(&mut self) -> Option<HashMap<usize, String>> {
        self.images.pop()
    }

    pub fn set_particle_frame(&mut self, frame: ParticleFrame) {
        self.particle_frame = frame;
    }

    /// Instance transform every root layer composes onto.
    pub fn root_matrix(&self) -> Affine2 {
        let mirror = if self.mirror { Vec2::new(-1.0, 1.0) } else { Vec2::ONE };
        math::compose(self.position, self.derived_rotation + self.rotation_offset, self.scale * mirror)
    }

    // ---------- Frame parameters ----------

    fn refresh(&mut self) {
        self.root_dirty = false;
        let Some(case) = self.case.clone() else {
            return;
        };
        let env = VisitEnv {
            resources: &self.resources,
            owner: &self.owner,
            tints: &self.tints,
            index: self.index,
            cycle_index: self.cycle_index,
            length: case.length(),
            paused: self.paused,
            speed: self.speed,
            visible: self.visible,
        };
        let root = (self.root_matrix(), self.opacity);
        let ui_emitters = &mut self.ui_emitters;
        let contexts = &mut self.contexts[..self.context_count];
        for (slot, node) in case.nodes().iter().enumerate() {
            let (before, rest) = contexts.split_at_mut(slot);
            let Some(ctx) = rest.first_mut() else {
                break;
            };
            let parent = node.parent.and_then(|parent| before.get(parent)).map_or(root, |p| (p.matrix, p.opacity));
            visit(&env, ui_emitters, ctx, node, parent);
        }
    }

    // ---------- Drawing ----------

    /// Draws sprite layers and bound emitters in layer order, then this player's detached emitters.
    /// Returns the number of quads written.
    pub fn draw(&mut self, light: LightMode, target: &mut DrawTarget<'_>) -> usize {
        let mut quads = 0;
        if let Some(case) = &self.case {
            for ctx in &self.contexts[..self.context_count] {
                let Some(node) = case.node(ctx.node) else {
                    continue;
                };
                match &node.kind {
                    LayerKind::Sprite { sprite, .. } => {
                        if self.visible && !self.destroyed && ctx.is_drawn() && self.draw_sprite(ctx, *sprite, light, target)
                        {
                            quads += 1;
                        }
                    }
                    LayerKind::Particle { .. } => {
                        if let Some(emitter) = &ctx.emitter {
                            quads += emitter.borrow().draw(target, light);
                        }
                    }
                    LayerKind::Joint { .. } | LayerKind::Sound { .. } => {}
                }
            }
        }
        quads + self.ui_emitters.draw(target, light)
    }

    fn draw_sprite(&self, ctx: &LayerContext, sprite: usize, light: LightMode, target: &mut DrawTarget<'_>) -> bool {
        let definition = &self.resources.definition;
        let Some(sheet) = definition.sprite(sprite) else {
            return false;
        };
        let Some(key) = self.images.resolve(sheet.image, &definition.images) else {
            return false;
        };
        let Some(texture) = target.textures.get(key) else {
            return false;
        };
        let size = Vec2::new(sheet.cell_width, sheet.cell_height);
        let min = -ctx.anchor * size + ctx.pivot;
        let corners = math::quad_corners(&ctx.matrix, Rect::new(min, min + size));
        let [u0, v0, u1, v1] = ctx.uv.unwrap_or_else(|| sheet.cell_uv(ctx.cell, texture.width, texture.height));
        let uvs = [[u0, v0], [u1, v0], [u1, v1], [u0, v1]];
        let params = pack_params(ctx.blend, light, 0, ctx.opacity);
        let tint = pack_tint(ctx.tint.unwrap_or_default());
        let light_anchor = pack_light_anchor(ctx.world_position().to_array());
        let quad: [SpriteVertex; 4] = std::array::from_fn(|corner| SpriteVertex {
            position: corners[corner].to_array(),
            uv: uvs[corner],
            params,
            tint,
            light_anchor,
        });
        write_quad(&mut *target.batch, texture.id, ctx.blend, quad);
        true
    }

    /// Requests every texture the active case and its particle effects draw with. Returns how many
    /// keys were requested for the first time.
    pub fn request_textures(&self, cache: &mut TextureCache) -> usize {
        let Some(case) = &self.case else {
            return 0;
        };
        let definition = &self.resources.definition;
        let mut requested = 0;
        for node in case.nodes() {
            match &node.kind {
                LayerKind::Sprite { sprite, .. } => {
                    let key = definition.sprite(*sprite).and_then(|sheet| self.images.resolve(sheet.image, &definition.images));
                    if let Some(key) = key {
                        requested += usize::from(cache.request(key));
                    }
                }
                LayerKind::Particle { effect, .. } => {
                    if let Some(effect) = self.resources.particles.get(effect) {
                        for layer in &effect.layers {
                            requested += usize::from(cache.request(&layer.sprite.image));
                        }
                    }
                }
                LayerKind::Joint { .. } | LayerKind::Sound { .. } => {}
            }
        }
        requested
    }

    // ---------- Accessors ----------

    pub fn motion_name(&self) -> Option<&str> {
        self.motion.as_ref().map(|motion| motion.name.as_str())
    }

    pub fn template(&self) -> &'static DirectionTemplate {
        self.template
    }

    pub fn direction(&self) -> Option<usize> {
        self.direction
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirror
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn derived_rotation(&self) -> f32 {
        self.derived_rotation
    }

    pub fn index(&self) -> f32 {
        self.index
    }

    pub fn frame(&self) -> u32 {
        self.index.max(0.0) as u32
    }

    pub fn loop_start(&self) -> f32 {
        self.loop_start
    }

    pub fn cycle_index(&self) -> u32 {
        self.cycle_index
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn step_ms(&self) -> f32 {
        self.step_ms
    }

    pub fn case(&self) -> Option<&Arc<DirectionCase>> {
        self.case.as_ref()
    }

    /// Contexts of the active case, in flattened layer order.
    pub fn contexts(&self) -> &[LayerContext] {
        &self.contexts[..self.context_count]
    }

    /// Allocated context slots, including ones unused by the active case.
    pub fn context_slots(&self) -> usize {
        self.contexts.len()
    }

    pub fn context(&self, layer_name: &str) -> Option<&LayerContext> {
        let case = self.case.as_ref()?;
        let slot = case.nodes().iter().position(|node| node.name == layer_name)?;
        self.contexts().get(slot)
    }

    pub fn ui_emitters(&self) -> &EmitterRegistry {
        &self.ui_emitters
    }
}

impl Drop for AnimationPlayer {
    fn drop(&mut self) {
        self.flush_finish(FinishReason::Interrupted);
    }
}

struct VisitEnv<'a> {
    resources: &'a PlayerResources,
    owner: &'a EmitterOwner,
    tints: &'a [[i16; 4]],
    index: f32,
    cycle_index: u32,
    length: u32,
    paused: bool,
    speed: f32,
    visible: bool,
}

fn visit(
    env: &VisitEnv<'_>,
    ui_emitters: &mut EmitterRegistry,
    ctx: &mut LayerContext,
    node: &LayerNode,
    parent: (Affine2, f32),
) {
    match &node.kind {
        LayerKind::Joint { keyframes, .. } => {
            sample_into(env, ctx, keyframes, parent);
        }
        LayerKind::Sprite { keyframes, .. } => match sample_into(env, ctx, keyframes, parent) {
            Some(params) => {
                ctx.anchor = Vec2::from(params.anchor);
                ctx.pivot = Vec2::from(params.pivot);
                ctx.cell = params.cell;
                ctx.uv = params.uv;
                ctx.blend = params.blend;
                ctx.tint = Some(combine_tints(params.tint, env.tints));
            }
            None => ctx.tint = None,
        },
        LayerKind::Particle { effect, keyframes } => {
            let params = sample_into(env, ctx, keyframes, parent);
            bind_emitter(env, ui_emitters, ctx, effect);
            let Some(emitter) = &ctx.emitter else {
                return;
            };
            let mut emitter = emitter.borrow_mut();
            match params {
                Some(params) => {
                    let (rotation, scale, mirrored) = math::orientation_of(&ctx.matrix);
                    emitter.set_angle(rotation);
                    emitter.set_scale(params.scale * (scale.x + scale.y) * 0.5);
                    emitter.set_mirrored(mirrored);
                    match env.owner {
                        EmitterOwner::Scene(_) => {
                            emitter.set_target_position(ctx.world_position());
                            emitter.set_matrix(None);
                        }
                        EmitterOwner::Ui => emitter.set_matrix(Some(ctx.matrix)),
                    }
                    let speed = if env.paused { 0.0 } else { params.speed * env.speed };
                    emitter.set_speed(speed);
                    emitter.set_opacity(ctx.opacity);
                    emitter.set_emitting(true);
                }
                None => emitter.set_emitting(false),
            }
            emitter.set_visible(env.visible);
        }
        LayerKind::Sound { clip, keyframes } => {
            let Some(params) = sample_into(env, ctx, keyframes, parent) else {
                return;
            };
            let Some(keyframe) = ctx.frame.and_then(|key| keyframes.get(key)) else {
                return;
            };
            if env.paused {
                return;
            }
            let stamp = i64::from(env.cycle_index) * i64::from(env.length) + keyframe.start.floor() as i64;
            if ctx.sound_stamp == Some(stamp) {
                return;
            }
            ctx.sound_stamp = Some(stamp);
            let audio = &env.resources.audio;
            if params.positional {
                audio.play_at(clip, ctx.world_position(), params.volume, params.speed);
            } else {
                audio.play(clip, params.volume, params.speed);
            }
        }
    }
}

/// Samples `keyframes` into `ctx`, or resets it to the parent when no window matches.
fn sample_into<P: KeyParams>(
    env: &VisitEnv<'_>,
    ctx: &mut LayerContext,
    keyframes: &[Keyframe<P>],
    (parent_matrix, parent_opacity): (Affine2, f32),
) -> Option<P> {
    match keyframe::sample(keyframes, env.index, &*env.resources.easing) {
        Some(sample) => {
            ctx.apply(parent_matrix, parent_opacity, sample.keyframe, &sample.transform);
            Some(sample.params)
        }
        None => {
            ctx.inherit(parent_matrix, parent_opacity);
            None
        }
    }
}

fn bind_emitter(env: &VisitEnv<'_>, ui_emitters: &mut EmitterRegistry, ctx: &mut LayerContext, effect_id: &str) {
    if ctx.emitter.is_some() || ctx.emitter_missing {
        return;
    }
    let Some(effect) = env.resources.particles.get(effect_id) else {
        log::warn!("[particles] unknown particle effect '{effect_id}'");
        ctx.emitter_missing = true;
        return;
    };
    let mut emitter =
        ParticleEmitter::new(Arc::clone(effect), &env.resources.config.particles, &*env.resources.easing);
    emitter.set_ui_owned(matches!(env.owner, EmitterOwner::Ui));
    emitter.bind();
    emitter.set_position(ctx.world_position());
    let shared = scene::share(emitter);
    match env.owner {
        EmitterOwner::Scene(registry) => registry.borrow_mut().append(Rc::clone(&shared)),
        EmitterOwner::Ui => ui_emitters.append(Rc::clone(&shared)),
    }
    ctx.emitter = Some(shared);
}

/// Keyframe tint plus every instance overlay; RGB clamped to `[-255, 255]`, gray to `[0, 255]`.
fn combine_tints(base: [i16; 4], overlays: &[[i16; 4]]) -> [i16; 4] {
    let mut sum = base.map(i32::from);
    for overlay in overlays {
        for (channel, value) in overlay.iter().enumerate() {
            sum[channel] += i32::from(*value);
        }
    }
    [
        sum[0].clamp(-255, 255) as i16,
        sum[1].clamp(-255, 255) as i16,
        sum[2].clamp(-255, 255) as i16,
        sum[3].clamp(0, 255) as i16,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tint_overlays_saturate() {
        assert_eq!(combine_tints([200, -200, 0, 200], &[[100, -100, 5, 100]]), [255, -255, 5, 255]);
        assert_eq!(combine_tints([0, 0, 0, 10], &[[0, 0, 0, -50]]), [0, 0, 0, 0]);
    }
}
