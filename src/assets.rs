//! Authored animation data in its normalized, ready-to-play form.
//!
//! Layer trees arrive nested (joints own their children) and are flattened here into a pre-order
//! node list with parent links, so a player can mirror them with a flat context array.

use crate::renderer::{BlendMode, TextureId};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

pub mod particle_defs;

pub use particle_defs::{
    CellMode, ColorPolicy, DrawOrder, Growth, Movement, Orbit, ParticleEffectDefinition, ParticleLayerDefinition,
    ParticleLibrary, ParticleSprite, PositionMode, Range, SpawnArea, Spin,
};

// ---------- Keyframes ----------

/// Per-class keyframe payload blended toward the next keyframe.
pub trait KeyParams: Clone + Default {
    fn blend(&self, next: &Self, t: f32) -> Self;
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct JointParams {}

impl KeyParams for JointParams {
    fn blend(&self, _next: &Self, _t: f32) -> Self {
        *self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpriteParams {
    /// Sprite-sheet cell index.
    pub cell: u32,
    /// Fraction of the cell placed on the layer origin.
    pub anchor: [f32; 2],
    /// Pixel offset applied after anchoring.
    pub pivot: [f32; 2],
    /// Additive tint: r, g, b in `[-255, 255]` and gray in `[0, 255]`.
    pub tint: [i16; 4],
    /// Explicit UV rectangle `[u0, v0, u1, v1]`, overriding the cell lookup.
    pub uv: Option<[f32; 4]>,
    pub blend: BlendMode,
}

impl Default for SpriteParams {
    fn default() -> Self {
        Self { cell: 0, anchor: [0.5, 0.5], pivot: [0.0, 0.0], tint: [0; 4], uv: None, blend: BlendMode::Normal }
    }
}

impl KeyParams for SpriteParams {
    fn blend(&self, next: &Self, t: f32) -> Self {
        let mut tint = [0i16; 4];
        for (channel, out) in tint.iter_mut().enumerate() {
            *out = lerp(self.tint[channel] as f32, next.tint[channel] as f32, t).round() as i16;
        }
        Self {
            cell: self.cell,
            anchor: [lerp(self.anchor[0], next.anchor[0], t), lerp(self.anchor[1], next.anchor[1], t)],
            pivot: [lerp(self.pivot[0], next.pivot[0], t), lerp(self.pivot[1], next.pivot[1], t)],
            tint,
            uv: self.uv,
            blend: self.blend,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParticleParams {
    /// Emitter scale.
    pub scale: f32,
    /// Emitter simulation speed multiplier.
    pub speed: f32,
}

impl Default for ParticleParams {
    fn default() -> Self {
        Self { scale: 1.0, speed: 1.0 }
    }
}

impl KeyParams for ParticleParams {
    fn blend(&self, next: &Self, t: f32) -> Self {
        Self { scale: lerp(self.scale, next.scale, t), speed: lerp(self.speed, next.speed, t) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SoundParams {
    pub volume: f32,
    pub speed: f32,
    /// Play at the layer's world position instead of globally.
    pub positional: bool,
}

impl Default for SoundParams {
    fn default() -> Self {
        Self { volume: 1.0, speed: 1.0, positional: false }
    }
}

impl KeyParams for SoundParams {
    fn blend(&self, _next: &Self, _t: f32) -> Self {
        *self
    }
}

/// Translation, rotation, scale and opacity shared by every layer class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyTransform {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub opacity: f32,
}

impl Default for KeyTransform {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, rotation: 0.0, scale_x: 1.0, scale_y: 1.0, opacity: 1.0 }
    }
}

impl KeyTransform {
    pub fn blend(&self, next: &KeyTransform, t: f32) -> KeyTransform {
        KeyTransform {
            x: lerp(self.x, next.x, t),
            y: lerp(self.y, next.y, t),
            rotation: lerp(self.rotation, next.rotation, t),
            scale_x: lerp(self.scale_x, next.scale_x, t),
            scale_y: lerp(self.scale_y, next.scale_y, t),
            opacity: lerp(self.opacity, next.opacity, t),
        }
    }
}

/// Parameters active over the frame window `[start, end)`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Keyframe<P> {
    pub start: f32,
    pub end: f32,
    /// Curve used to blend toward the next keyframe; `None` holds the values for the whole window.
    #[serde(default)]
    pub easing: Option<String>,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "one")]
    pub scale_x: f32,
    #[serde(default = "one")]
    pub scale_y: f32,
    #[serde(default = "one")]
    pub opacity: f32,
    #[serde(flatten)]
    pub params: P,
}

fn one() -> f32 {
    1.0
}

impl<P: KeyParams> Keyframe<P> {
    pub fn new(start: f32, end: f32) -> Self {
        let transform = KeyTransform::default();
        Self {
            start,
            end,
            easing: None,
            x: transform.x,
            y: transform.y,
            rotation: transform.rotation,
            scale_x: transform.scale_x,
            scale_y: transform.scale_y,
            opacity: transform.opacity,
            params: P::default(),
        }
    }

    pub fn with_easing(mut self, easing: impl Into<String>) -> Self {
        self.easing = Some(easing.into());
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale_x: f32, scale_y: f32) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_params(mut self, params: P) -> Self {
        self.params = params;
        self
    }

    pub fn contains(&self, index: f32) -> bool {
        index >= self.start && index < self.end
    }

    pub fn transform(&self) -> KeyTransform {
        KeyTransform {
            x: self.x,
            y: self.y,
            rotation: self.rotation,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            opacity: self.opacity,
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

// ---------- Layers ----------

/// Authored layer tree node.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    Joint {
        #[serde(default)]
        name: String,
        #[serde(default)]
        keyframes: Vec<Keyframe<JointParams>>,
        #[serde(default)]
        children: Vec<Layer>,
    },
    Sprite {
        #[serde(default)]
        name: String,
        sprite: usize,
        #[serde(default)]
        keyframes: Vec<Keyframe<SpriteParams>>,
    },
    Particle {
        #[serde(default)]
        name: String,
        effect: String,
        #[serde(default)]
        keyframes: Vec<Keyframe<ParticleParams>>,
    },
    Sound {
        #[serde(default)]
        name: String,
        clip: String,
        #[serde(default)]
        keyframes: Vec<Keyframe<SoundParams>>,
    },
}

/// Normalized layer payload. Joints refer to their children by node index.
#[derive(Debug, Clone)]
pub enum LayerKind {
    Joint { keyframes: Vec<Keyframe<JointParams>>, children: Vec<usize> },
    Sprite { sprite: usize, keyframes: Vec<Keyframe<SpriteParams>> },
    Particle { effect: String, keyframes: Vec<Keyframe<ParticleParams>> },
    Sound { clip: String, keyframes: Vec<Keyframe<SoundParams>> },
}

impl LayerKind {
    pub fn label(&self) -> &'static str {
        match self {
            LayerKind::Joint { .. } => "joint",
            LayerKind::Sprite { .. } => "sprite",
            LayerKind::Particle { .. } => "particle",
            LayerKind::Sound { .. } => "sound",
        }
    }

    /// `(start, end)` of every keyframe, in order.
    pub fn windows(&self) -> Vec<(f32, f32)> {
        fn collect<P>(keys: &[Keyframe<P>]) -> Vec<(f32, f32)> {
            keys.iter().map(|k| (k.start, k.end)).collect()
        }
        match self {
            LayerKind::Joint { keyframes, .. } => collect(keyframes),
            LayerKind::Sprite { keyframes, .. } => collect(keyframes),
            LayerKind::Particle { keyframes, .. } => collect(keyframes),
            LayerKind::Sound { keyframes, .. } => collect(keyframes),
        }
    }

    fn last_end(&self) -> f32 {
        self.windows().iter().map(|(_, end)| *end).fold(0.0, f32::max)
    }
}

#[derive(Debug, Clone)]
pub struct LayerNode {
    pub name: String,
    pub parent: Option<usize>,
    pub kind: LayerKind,
}

// ---------- Direction cases & motions ----------

/// One direction's flattened layer tree and timing.
#[derive(Debug, Clone)]
pub struct DirectionCase {
    nodes: Vec<LayerNode>,
    length: u32,
    loop_start: f32,
}

impl DirectionCase {
    /// Flattens `layers` in pre-order. A zero `length` is derived from the last keyframe end.
    pub fn new(layers: Vec<Layer>, length: u32, loop_start: f32) -> Self {
        let mut nodes = Vec::new();
        for layer in layers {
            flatten_layer(layer, None, &mut nodes);
        }
        let derived = nodes.iter().map(|node| node.kind.last_end()).fold(0.0, f32::max).ceil() as u32;
        let length = if length == 0 { derived } else { length }.max(1);
        let loop_start = if loop_start.is_finite() { loop_start.clamp(0.0, (length - 1) as f32) } else { 0.0 };
        Self { nodes, length, loop_start }
    }

    pub fn nodes(&self) -> &[LayerNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&LayerNode> {
        self.nodes.get(index)
    }

    pub fn layer_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn loop_start(&self) -> f32 {
        self.loop_start
    }
}

fn flatten_layer(layer: Layer, parent: Option<usize>, nodes: &mut Vec<LayerNode>) -> usize {
    let index = nodes.len();
    match layer {
        Layer::Joint { name, mut keyframes, children } => {
            sort_keyframes(&mut keyframes);
            nodes.push(LayerNode {
                name,
                parent,
                kind: LayerKind::Joint { keyframes, children: Vec::with_capacity(children.len()) },
            });
            for child in children {
                let child_index = flatten_layer(child, Some(index), nodes);
                if let LayerKind::Joint { children, .. } = &mut nodes[index].kind {
                    children.push(child_index);
                }
            }
        }
        Layer::Sprite { name, sprite, mut keyframes } => {
            sort_keyframes(&mut keyframes);
            nodes.push(LayerNode { name, parent, kind: LayerKind::Sprite { sprite, keyframes } });
        }
        Layer::Particle { name, effect, mut keyframes } => {
            sort_keyframes(&mut keyframes);
            nodes.push(LayerNode { name, parent, kind: LayerKind::Particle { effect, keyframes } });
        }
        Layer::Sound { name, clip, mut keyframes } => {
            sort_keyframes(&mut keyframes);
            nodes.push(LayerNode { name, parent, kind: LayerKind::Sound { clip, keyframes } });
        }
    }
    index
}

fn sort_keyframes<P>(keyframes: &mut [Keyframe<P>]) {
    keyframes.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
}

#[derive(Debug, Clone)]
pub struct Motion {
    pub name: String,
    /// Direction template id, e.g. `"4-dir"`.
    pub direction_mode: String,
    pub looped: bool,
    pub loop_start: f32,
    /// When false a single update never advances more than one frame.
    pub skip: bool,
    pub cases: Vec<Arc<DirectionCase>>,
}

impl Motion {
    pub fn new(name: impl Into<String>, direction_mode: impl Into<String>, cases: Vec<DirectionCase>) -> Self {
        Self {
            name: name.into(),
            direction_mode: direction_mode.into(),
            looped: false,
            loop_start: 0.0,
            skip: true,
            cases: cases.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn looping(mut self, loop_start: f32) -> Self {
        self.looped = true;
        self.loop_start = loop_start;
        self
    }

    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn case(&self, index: usize) -> Option<&Arc<DirectionCase>> {
        self.cases.get(index)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpriteSheet {
    /// Index into [`AnimationDefinition::images`].
    pub image: usize,
    pub cell_width: f32,
    pub cell_height: f32,
    #[serde(default = "SpriteSheet::default_grid")]
    pub columns: u32,
    #[serde(default = "SpriteSheet::default_grid")]
    pub rows: u32,
}

impl SpriteSheet {
    const fn default_grid() -> u32 {
        1
    }

    /// UV rectangle of `cell` for a texture of the given size.
    pub fn cell_uv(&self, cell: u32, texture_width: u32, texture_height: u32) -> [f32; 4] {
        grid_cell_uv(
            cell,
            (self.columns, self.rows),
            (self.cell_width, self.cell_height),
            (texture_width, texture_height),
        )
    }
}

/// UV rectangle `[u0, v0, u1, v1]` of a cell in a row-major grid. Out-of-range cells wrap.
pub fn grid_cell_uv(cell: u32, grid: (u32, u32), cell_size: (f32, f32), texture: (u32, u32)) -> [f32; 4] {
    let columns = grid.0.max(1);
    let cell = cell % (columns * grid.1.max(1));
    let col = (cell % columns) as f32;
    let row = (cell / columns) as f32;
    let tw = texture.0.max(1) as f32;
    let th = texture.1.max(1) as f32;
    let u0 = col * cell_size.0 / tw;
    let v0 = row * cell_size.1 / th;
    [u0, v0, u0 + cell_size.0 / tw, v0 + cell_size.1 / th]
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageSource {
    /// Texture cache key.
    pub key: String,
}

#[derive(Debug, Clone, Default)]
pub struct AnimationDefinition {
    pub images: Vec<ImageSource>,
    pub sprites: Vec<SpriteSheet>,
    motions: Vec<Arc<Motion>>,
    motion_index: HashMap<String, usize>,
}

impl AnimationDefinition {
    pub fn new(images: Vec<ImageSource>, sprites: Vec<SpriteSheet>, motions: Vec<Motion>) -> Self {
        let mut definition = Self { images, sprites, motions: Vec::new(), motion_index: HashMap::new() };
        for motion in motions {
            definition.push_motion(motion);
        }
        definition
    }

    pub fn push_motion(&mut self, motion: Motion) {
        let index = self.motions.len();
        self.motion_index.insert(motion.name.clone(), index);
        self.motions.push(Arc::new(motion));
    }

    pub fn motion(&self, name: &str) -> Option<&Arc<Motion>> {
        self.motion_index.get(name).and_then(|index| self.motions.get(*index))
    }

    pub fn motions(&self) -> &[Arc<Motion>] {
        &self.motions
    }

    pub fn sprite(&self, index: usize) -> Option<&SpriteSheet> {
        self.sprites.get(index)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let file: AnimationDefinitionFile =
            serde_json::from_slice(bytes).context("Failed to parse animation definition")?;
        file.try_into()
    }
}

#[derive(Deserialize)]
struct AnimationDefinitionFile {
    #[serde(default)]
    images: Vec<ImageSource>,
    #[serde(default)]
    sprites: Vec<SpriteSheet>,
    motions: Vec<MotionFile>,
}

#[derive(Deserialize)]
struct MotionFile {
    name: String,
    #[serde(default = "MotionFile::default_direction_mode")]
    direction_mode: String,
    #[serde(default, rename = "loop")]
    looped: bool,
    #[serde(default)]
    loop_start: f32,
    #[serde(default = "MotionFile::default_skip")]
    skip: bool,
    direction_cases: Vec<DirectionCaseFile>,
}

impl MotionFile {
    fn default_direction_mode() -> String {
        "1-dir".to_string()
    }

    const fn default_skip() -> bool {
        true
    }
}

#[derive(Deserialize)]
struct DirectionCaseFile {
    layers: Vec<Layer>,
    #[serde(default)]
    length: u32,
    #[serde(default)]
    loop_start: Option<f32>,
}

impl TryFrom<AnimationDefinitionFile> for AnimationDefinition {
    type Error = anyhow::Error;

    fn try_from(file: AnimationDefinitionFile) -> Result<Self> {
        let mut motions = Vec::with_capacity(file.motions.len());
        for motion in file.motions {
            if motion.direction_cases.is_empty() {
                return Err(anyhow!("Motion '{}' has no direction cases", motion.name));
            }
            let loop_start = motion.loop_start;
            let cases = motion
                .direction_cases
                .into_iter()
                .map(|case| DirectionCase::new(case.layers, case.length, case.loop_start.unwrap_or(loop_start)))
                .collect();
            let mut built = Motion::new(motion.name, motion.direction_mode, cases).with_skip(motion.skip);
            built.looped = motion.looped;
            built.loop_start = loop_start;
            motions.push(built);
        }
        for sprite in &file.sprites {
            if sprite.image >= file.images.len() {
                return Err(anyhow!("Sprite sheet refers to missing image {}", sprite.image));
            }
        }
        Ok(AnimationDefinition::new(file.images, file.sprites, motions))
    }
}

// ---------- Image overrides ----------

/// Per-instance image substitution: pushed override maps shadow the definition's base images.
#[derive(Debug, Clone, Default)]
pub struct ImageOverrides {
    stack: Vec<HashMap<usize, String>>,
}

impl ImageOverrides {
    pub fn push(&mut self, overrides: HashMap<usize, String>) {
        self.stack.push(overrides);
    }

    pub fn pop(&mut self) -> Option<HashMap<usize, String>> {
        self.stack.pop()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Texture key for `image`: the most recently pushed override, else the base image.
    pub fn resolve<'a>(&'a self, image: usize, base: &'a [ImageSource]) -> Option<&'a str> {
        self.stack
            .iter()
            .rev()
            .find_map(|layer| layer.get(&image))
            .map(String::as_str)
            .or_else(|| base.get(image).map(|source| source.key.as_str()))
    }
}

// ---------- Textures ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextureState {
    Pending,
    Ready(TextureInfo),
}

/// Textures resolve asynchronously: a key is `Pending` from `request` until the loader calls
/// `resolve`. Draw paths only ever see ready textures.
#[derive(Debug, Default)]
pub struct TextureCache {
    entries: HashMap<String, TextureState>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time a key is requested.
    pub fn request(&mut self, key: &str) -> bool {
        if self.entries.contains_key(key) {
            return false;
        }
        self.entries.insert(key.to_string(), TextureState::Pending);
        true
    }

    pub fn resolve(&mut self, key: impl Into<String>, info: TextureInfo) {
        self.entries.insert(key.into(), TextureState::Ready(info));
    }

    pub fn get(&self, key: &str) -> Option<TextureInfo> {
        match self.entries.get(key) {
            Some(TextureState::Ready(info)) => Some(*info),
            _ => None,
        }
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter(|(_, state)| **state == TextureState::Pending).map(|(key, _)| key.as_str())
    }
}
