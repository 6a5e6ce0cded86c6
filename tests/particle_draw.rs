use glam::Vec2;
use kestrel_motion::assets::{
    ColorPolicy, DrawOrder, Growth, ParticleEffectDefinition, ParticleLayerDefinition, Range, SpawnArea, TextureCache,
    TextureInfo,
};
use kestrel_motion::config::ParticleConfig;
use kestrel_motion::easing::EasingTable;
use kestrel_motion::math;
use kestrel_motion::particles::{ParticleEmitter, ParticleFrame, SortScratch};
use kestrel_motion::renderer::{unpack_opacity, DrawTarget, LightMode, QuadBatch, SpriteVertex, TextureId};
use std::sync::Arc;

const SPARK: &str = "spark.png";

fn textures() -> TextureCache {
    let mut cache = TextureCache::new();
    cache.resolve(SPARK, TextureInfo { id: TextureId(3), width: 16, height: 16 });
    cache
}

fn burst(mut layer: ParticleLayerDefinition, count: u32) -> ParticleEmitter {
    layer.interval = 0.0;
    layer.maximum = count;
    let config = ParticleConfig { seed: Some(42), ..ParticleConfig::default() };
    let effect = Arc::new(ParticleEffectDefinition::new("fx", vec![layer]));
    let mut emitter = ParticleEmitter::new(effect, &config, &EasingTable::with_builtins());
    emitter.emit(1.0, &ParticleFrame::default());
    emitter
}

fn draw(emitter: &ParticleEmitter, cache: &TextureCache) -> QuadBatch {
    let mut batch = QuadBatch::default();
    let mut scratch = SortScratch::default();
    let mut target = DrawTarget::new(&mut batch, cache, &mut scratch);
    emitter.draw(&mut target, LightMode::Unlit);
    assert!(scratch.is_clean(), "draw must leave the sort scratch empty");
    batch
}

fn quad_center(quad: &[SpriteVertex]) -> Vec2 {
    (Vec2::from(quad[0].position) + Vec2::from(quad[2].position)) * 0.5
}

fn quad_width(quad: &[SpriteVertex]) -> f32 {
    (Vec2::from(quad[1].position) - Vec2::from(quad[0].position)).length()
}

fn scattered() -> ParticleLayerDefinition {
    let mut layer = ParticleLayerDefinition::simple(SPARK, 0.0, 10_000.0);
    layer.area = SpawnArea::Rectangle { width: 200.0, height: 200.0 };
    layer
}

#[test]
fn layers_wait_for_their_texture() {
    let emitter = burst(scattered(), 4);
    let batch = draw(&emitter, &TextureCache::new());
    assert_eq!(batch.quad_count(), 0);

    let mut pending = TextureCache::new();
    pending.request(SPARK);
    assert_eq!(draw(&emitter, &pending).quad_count(), 0, "pending textures are not drawable");
    assert_eq!(draw(&emitter, &textures()).quad_count(), 4);
}

#[test]
fn youngest_in_front_draws_in_spawn_order() {
    let emitter = burst(scattered(), 6);
    let batch = draw(&emitter, &textures());
    for (index, particle) in emitter.layers()[0].particles().iter().enumerate() {
        let quad = batch.quad(index).expect("quad");
        assert!((quad_center(quad) - particle.position()).length() < 1e-3);
    }
}

#[test]
fn oldest_in_front_reverses_the_order() {
    let mut layer = scattered();
    layer.sort = DrawOrder::OldestInFront;
    let emitter = burst(layer, 6);
    let batch = draw(&emitter, &textures());
    let particles = emitter.layers()[0].particles();
    for (index, particle) in particles.iter().rev().enumerate() {
        let quad = batch.quad(index).expect("quad");
        assert!((quad_center(quad) - particle.position()).length() < 1e-3);
    }
}

#[test]
fn by_scale_draws_small_particles_first() {
    let mut layer = scattered();
    layer.sort = DrawOrder::ByScale;
    layer.scale = Growth { initial: Range::new(1.0, 0.9), ..Growth::default() };
    let emitter = burst(layer, 48);
    let batch = draw(&emitter, &textures());
    assert_eq!(batch.quad_count(), 48);
    let widths: Vec<f32> = (0..48).map(|index| quad_width(batch.quad(index).expect("quad"))).collect();
    // Keys are quantized to 1/100 of a scale unit; 8px cells make that 0.08px.
    for pair in widths.windows(2) {
        assert!(pair[1] + 0.08 + 1e-3 >= pair[0], "widths out of order: {pair:?}");
    }
}

#[test]
fn by_scale_keeps_spawn_order_for_equal_keys() {
    let mut layer = scattered();
    layer.sort = DrawOrder::ByScale;
    let emitter = burst(layer, 12);
    let batch = draw(&emitter, &textures());
    for (index, particle) in emitter.layers()[0].particles().iter().enumerate() {
        let quad = batch.quad(index).expect("quad");
        assert!((quad_center(quad) - particle.position()).length() < 1e-3, "equal keys stay FIFO");
    }
}

#[test]
fn vertices_carry_color_opacity_and_cell_uv() {
    let mut layer = ParticleLayerDefinition::simple(SPARK, 0.0, 10_000.0);
    layer.color = ColorPolicy::Fixed { color: [255, 128, 0, 255] };
    let mut emitter = burst(layer, 1);
    emitter.set_opacity(0.5);
    let batch = draw(&emitter, &textures());
    let quad = batch.quad(0).expect("quad");
    assert_eq!(quad[0].uv, [0.0, 0.0]);
    assert_eq!(quad[2].uv, [0.5, 0.5], "an 8px cell covers half of a 16px texture");
    assert!((unpack_opacity(quad[0].params) - 0.5).abs() < 1.0 / 255.0);
    let tint = quad[0].tint;
    assert_eq!(tint & 0xFF, 128, "full red leaves the red channel untouched");
    assert_eq!((tint >> 8) & 0xFF, 64);
    assert_eq!((tint >> 16) & 0xFF, 0, "zero blue removes the channel entirely");
    assert_eq!(batch.calls()[0].textures.as_slice(), &[TextureId(3)]);
}

#[test]
fn drawn_quads_match_particle_bounds_exactly() {
    let mut layer = scattered();
    layer.rotation.initial = Range::new(0.0, 3.0);
    layer.scale = Growth { initial: Range::new(1.5, 1.0), ..Growth::default() };
    let emitter = burst(layer, 16);
    let batch = draw(&emitter, &textures());
    for (index, particle) in emitter.layers()[0].particles().iter().enumerate() {
        let quad = batch.quad(index).expect("quad");
        let corners: [Vec2; 4] = std::array::from_fn(|corner| Vec2::from(quad[corner].position));
        assert_eq!(math::bounds_of(&corners), particle.bounds(), "draw and bounds share one corner routine");
    }
}

#[test]
fn hidden_emitters_skip_drawing_unless_edge() {
    let mut emitter = burst(scattered(), 3);
    emitter.set_visible(false);
    assert_eq!(draw(&emitter, &textures()).quad_count(), 0);

    let mut edge = ParticleLayerDefinition::simple(SPARK, 0.0, 10_000.0);
    edge.area = SpawnArea::Edge;
    let mut emitter = burst(edge, 3);
    emitter.set_visible(false);
    assert_eq!(draw(&emitter, &textures()).quad_count(), 3);
}
