//! Vertex layout and the batching seam.
//!
//! The engine never talks to the GPU. Draw paths ask a [`BatchRenderer`] for room for one quad and
//! write exactly four [`SpriteVertex`] values at the returned offset; blend switching, sampler
//! binding and submission belong to the renderer.

use crate::assets::TextureCache;
use crate::particles::SortScratch;
use half::f16;
use serde::Deserialize;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

impl BlendMode {
    pub fn code(self) -> u32 {
        match self {
            BlendMode::Normal => 0,
            BlendMode::Additive => 1,
            BlendMode::Multiply => 2,
            BlendMode::Screen => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightMode {
    #[default]
    Unlit,
    Lit,
    Emissive,
}

impl LightMode {
    pub fn code(self) -> u32 {
        match self {
            LightMode::Unlit => 0,
            LightMode::Lit => 1,
            LightMode::Emissive => 2,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    /// blend (4 bits) | light mode (4 bits) | sampler slot (8 bits) | unused (8 bits) | opacity (8 bits)
    pub params: u32,
    /// r | g | b offset bytes (signed tint remapped to 0..=255) | gray
    pub tint: u32,
    /// Two half floats: the world-space anchor used by the lighting pass.
    pub light_anchor: u32,
}

pub const VERTICES_PER_QUAD: usize = 4;

pub fn pack_params(blend: BlendMode, light: LightMode, sampler_slot: u32, opacity: f32) -> u32 {
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u32;
    (blend.code() & 0xF) | ((light.code() & 0xF) << 4) | ((sampler_slot & 0xFF) << 8) | (alpha << 24)
}

pub fn unpack_opacity(params: u32) -> f32 {
    (params >> 24) as f32 / 255.0
}

/// Packs an additive tint. RGB channels are signed in `[-255, 255]` and stored with a +255 bias
/// halved into one byte; gray is stored directly.
pub fn pack_tint(tint: [i16; 4]) -> u32 {
    let channel = |value: i16| -> u32 { ((value.clamp(-255, 255) as i32 + 255 + 1) / 2) as u32 };
    let gray = tint[3].clamp(0, 255) as u32;
    channel(tint[0]) | (channel(tint[1]) << 8) | (channel(tint[2]) << 16) | (gray << 24)
}

pub fn pack_light_anchor(anchor: [f32; 2]) -> u32 {
    let x = f16::from_f32(anchor[0]).to_bits() as u32;
    let y = f16::from_f32(anchor[1]).to_bits() as u32;
    x | (y << 16)
}

pub fn unpack_light_anchor(packed: u32) -> [f32; 2] {
    [f16::from_bits((packed & 0xFFFF) as u16).to_f32(), f16::from_bits((packed >> 16) as u16).to_f32()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSlot {
    pub vertex_offset: usize,
    pub sampler_slot: u32,
}

pub trait BatchRenderer {
    /// Reserves room for one quad drawn with `texture`.
    fn push(&mut self, texture: TextureId, blend: BlendMode) -> BatchSlot;
    fn vertices_mut(&mut self) -> &mut [SpriteVertex];
}

/// Reserves a quad and writes its four vertices, patching the sampler slot into `params`.
pub fn write_quad(
    batch: &mut dyn BatchRenderer,
    texture: TextureId,
    blend: BlendMode,
    mut quad: [SpriteVertex; VERTICES_PER_QUAD],
) {
    let slot = batch.push(texture, blend);
    for vertex in &mut quad {
        vertex.params = (vertex.params & !0xFF00) | ((slot.sampler_slot & 0xFF) << 8);
    }
    let vertices = batch.vertices_mut();
    let end = slot.vertex_offset + VERTICES_PER_QUAD;
    if end <= vertices.len() {
        vertices[slot.vertex_offset..end].copy_from_slice(&quad);
    }
}

/// Everything a draw path needs for one frame: the batch to write into, the textures resolved so
/// far and the shared particle sort scratch.
pub struct DrawTarget<'a> {
    pub batch: &'a mut dyn BatchRenderer,
    pub textures: &'a TextureCache,
    pub scratch: &'a mut SortScratch,
}

impl<'a> DrawTarget<'a> {
    pub fn new(batch: &'a mut dyn BatchRenderer, textures: &'a TextureCache, scratch: &'a mut SortScratch) -> Self {
        Self { batch, textures, scratch }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub blend: BlendMode,
    pub textures: SmallVec<[TextureId; 8]>,
    pub first_quad: usize,
    pub quad_count: usize,
}

/// CPU-side batch: one growable vertex buffer, split into draw calls whenever the blend mode
/// changes or the sampler slots run out.
pub struct QuadBatch {
    vertices: Vec<SpriteVertex>,
    calls: Vec<DrawCall>,
    max_samplers: usize,
}

impl QuadBatch {
    pub fn new(max_samplers: usize) -> Self {
        Self { vertices: Vec::new(), calls: Vec::new(), max_samplers: max_samplers.clamp(1, 8) }
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.calls.clear();
    }

    pub fn vertices(&self) -> &[SpriteVertex] {
        &self.vertices
    }

    pub fn quad_count(&self) -> usize {
        self.vertices.len() / VERTICES_PER_QUAD
    }

    pub fn quad(&self, index: usize) -> Option<&[SpriteVertex]> {
        let start = index * VERTICES_PER_QUAD;
        self.vertices.get(start..start + VERTICES_PER_QUAD)
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    fn slot_for(&mut self, texture: TextureId, blend: BlendMode) -> u32 {
        let quad_index = self.quad_count();
        if let Some(call) = self.calls.last_mut() {
            if call.blend == blend {
                if let Some(slot) = call.textures.iter().position(|t| *t == texture) {
                    call.quad_count += 1;
                    return slot as u32;
                }
                if call.textures.len() < self.max_samplers {
                    call.textures.push(texture);
                    call.quad_count += 1;
                    return (call.textures.len() - 1) as u32;
                }
            }
        }
        let mut textures = SmallVec::new();
        textures.push(texture);
        self.calls.push(DrawCall { blend, textures, first_quad: quad_index, quad_count: 1 });
        0
    }
}

impl Default for QuadBatch {
    fn default() -> Self {
        Self::new(8)
    }
}

impl BatchRenderer for QuadBatch {
    fn push(&mut self, texture: TextureId, blend: BlendMode) -> BatchSlot {
        let sampler_slot = self.slot_for(texture, blend);
        let vertex_offset = self.vertices.len();
        self.vertices.resize(vertex_offset + VERTICES_PER_QUAD, SpriteVertex::default());
        BatchSlot { vertex_offset, sampler_slot }
    }

    fn vertices_mut(&mut self) -> &mut [SpriteVertex] {
        &mut self.vertices
    }
}
