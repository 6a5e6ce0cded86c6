use glam::Vec2;
use kestrel_motion::animation::{AnimationPlayer, EmitterOwner, PlayerResources};
use kestrel_motion::assets::{
    AnimationDefinition, DirectionCase, ImageSource, Keyframe, Layer, Motion, Movement, ParticleEffectDefinition,
    ParticleLayerDefinition, ParticleLibrary, ParticleParams, Range, SpawnArea, SpriteSheet, TextureCache,
    TextureInfo,
};
use kestrel_motion::config::EngineConfig;
use kestrel_motion::math::Rect;
use kestrel_motion::particles::{EmitterFlags, ParticleFrame, SortScratch};
use kestrel_motion::renderer::{DrawTarget, LightMode, QuadBatch, TextureId};
use kestrel_motion::scene::EmitterRegistry;
use std::cell::RefCell;
use std::f32::consts::{FRAC_PI_4, PI};
use std::rc::Rc;
use std::sync::Arc;

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.animation.frame_rate = 100.0;
    config.particles.seed = Some(9);
    config
}

fn library() -> ParticleLibrary {
    let mut library = ParticleLibrary::new();
    let mut layer = ParticleLayerDefinition::simple("spark.png", 10.0, 100.0);
    layer.name = "sparks".to_string();
    library.insert("sparks", ParticleEffectDefinition::new("sparks", vec![layer]));
    library
}

fn effect_layer(effect: &str) -> Layer {
    Layer::Particle {
        name: "fx".to_string(),
        effect: effect.to_string(),
        keyframes: vec![Keyframe::new(0.0, 10.0).with_position(5.0, 0.0).with_params(ParticleParams::default())],
    }
}

fn body() -> Layer {
    Layer::Sprite { name: "body".to_string(), sprite: 0, keyframes: vec![Keyframe::new(0.0, 10.0)] }
}

fn definition() -> AnimationDefinition {
    AnimationDefinition::new(
        vec![ImageSource { key: "hero.png".to_string() }],
        vec![SpriteSheet { image: 0, cell_width: 16.0, cell_height: 16.0, columns: 1, rows: 1 }],
        vec![
            Motion::new("cast", "1-dir", vec![DirectionCase::new(vec![body(), effect_layer("sparks")], 10, 0.0)])
                .looping(0.0),
            Motion::new("fizzle", "1-dir", vec![DirectionCase::new(vec![effect_layer("missing")], 10, 0.0)]),
            Motion::new("idle", "1-dir", vec![DirectionCase::new(vec![body()], 10, 0.0)]).looping(0.0),
        ],
    )
}

fn player(owner: EmitterOwner) -> AnimationPlayer {
    let resources = PlayerResources::new(Arc::new(definition()), config()).with_particles(Arc::new(library()));
    let mut player = AnimationPlayer::new(resources);
    player.activate(owner);
    player
}

/// A player whose only motion plays a single effect layer.
fn effect_player(owner: EmitterOwner, mode: &str, layer: ParticleLayerDefinition) -> AnimationPlayer {
    let mut library = ParticleLibrary::new();
    library.insert("effect", ParticleEffectDefinition::new("effect", vec![layer]));
    let definition = AnimationDefinition::new(
        Vec::new(),
        Vec::new(),
        vec![Motion::new("play", mode, vec![DirectionCase::new(vec![effect_layer("effect")], 10, 0.0)]).looping(0.0)],
    );
    let resources = PlayerResources::new(Arc::new(definition), config()).with_particles(Arc::new(library));
    let mut player = AnimationPlayer::new(resources);
    player.activate(owner);
    player.set_motion("play");
    player
}

fn first_particle_velocity(player: &AnimationPlayer) -> Vec2 {
    let emitter = player.context("fx").and_then(|ctx| ctx.emitter.clone()).expect("bound emitter");
    let emitter = emitter.borrow();
    emitter.layers()[0].particles()[0].velocity()
}

fn textures() -> TextureCache {
    let mut cache = TextureCache::new();
    cache.resolve("hero.png", TextureInfo { id: TextureId(1), width: 16, height: 16 });
    cache.resolve("spark.png", TextureInfo { id: TextureId(2), width: 8, height: 8 });
    cache
}

#[test]
fn ui_players_advance_their_own_emitters() {
    let mut player = player(EmitterOwner::Ui);
    player.set_position(Vec2::new(40.0, 20.0));
    player.set_motion("cast");
    assert_eq!(player.ui_emitters().len(), 1, "bound on the first visit");

    player.update(10.0);
    assert_eq!(player.ui_emitters().live_particles(), 1);
    let emitter = player.context("fx").and_then(|ctx| ctx.emitter.clone()).expect("bound emitter");
    let emitter = emitter.borrow();
    assert!(emitter.flags().contains(EmitterFlags::UI_OWNED));
    assert!(emitter.pose().matrix.is_some(), "ui emitters spawn through the layer matrix");
    let spawned = emitter.layers()[0].particles()[0].position();
    assert!((spawned - Vec2::new(45.0, 20.0)).length() < 1e-4);
}

#[test]
fn scene_players_hand_emitters_to_the_registry() {
    let registry = Rc::new(RefCell::new(EmitterRegistry::new()));
    let mut player = player(EmitterOwner::Scene(Rc::clone(&registry)));
    player.set_position(Vec2::new(40.0, 20.0));
    player.set_motion("cast");
    assert_eq!(registry.borrow().len(), 1);
    assert!(player.ui_emitters().is_empty());

    player.update(10.0);
    assert_eq!(registry.borrow().live_particles(), 0, "the player never ticks scene emitters");
    let frame = ParticleFrame::default();
    assert_eq!(registry.borrow_mut().update(10.0, &frame), 1);
    let registry = registry.borrow();
    let emitter = registry.emitters()[0].borrow();
    assert!(!emitter.flags().contains(EmitterFlags::UI_OWNED));
    assert_eq!(emitter.pose().matrix, None);
    assert_eq!(emitter.pose().position, Vec2::new(45.0, 20.0), "synced to the layer on tick");
    assert!(emitter.has_live_particles());
}

#[test]
fn scene_emitters_follow_the_player_on_the_next_tick() {
    let registry = Rc::new(RefCell::new(EmitterRegistry::new()));
    let mut player = player(EmitterOwner::Scene(Rc::clone(&registry)));
    player.set_motion("cast");
    let frame = ParticleFrame::default();
    player.update(10.0);
    registry.borrow_mut().update(10.0, &frame);
    player.set_position(Vec2::new(100.0, 0.0));
    player.update(10.0);
    registry.borrow_mut().update(10.0, &frame);
    let registry = registry.borrow();
    let emitter = registry.emitters()[0].borrow();
    assert_eq!(emitter.pose().position, Vec2::new(105.0, 0.0));
    let newest = emitter.layers()[0].particles().last().expect("particle").position();
    assert_eq!(newest, Vec2::new(105.0, 0.0));
}

#[test]
fn changing_motion_detaches_and_drains_emitters() {
    let registry = Rc::new(RefCell::new(EmitterRegistry::new()));
    let mut player = player(EmitterOwner::Scene(Rc::clone(&registry)));
    player.set_motion("cast");
    let frame = ParticleFrame::default();
    player.update(10.0);
    registry.borrow_mut().update(10.0, &frame);
    assert_eq!(registry.borrow().live_particles(), 1);

    player.set_motion("idle");
    {
        let registry = registry.borrow();
        let emitter = registry.emitters()[0].borrow();
        assert!(emitter.flags().contains(EmitterFlags::DETACHED));
        assert!(!emitter.is_enabled());
    }
    registry.borrow_mut().update(50.0, &frame);
    assert_eq!(registry.borrow().len(), 1, "live particles keep the emitter around");
    registry.borrow_mut().update(50.0, &frame);
    assert!(registry.borrow().is_empty(), "drained emitters are released");
}

#[test]
fn missing_effects_are_flagged_once() {
    let registry = Rc::new(RefCell::new(EmitterRegistry::new()));
    let mut player = player(EmitterOwner::Scene(Rc::clone(&registry)));
    player.set_motion("fizzle");
    player.update(10.0);
    player.update(10.0);
    let ctx = player.context("fx").expect("fx context");
    assert!(ctx.emitter.is_none());
    assert!(ctx.emitter_missing);
    assert!(registry.borrow().is_empty());
}

#[test]
fn pausing_freezes_emitters_without_unbinding() {
    let mut player = player(EmitterOwner::Ui);
    player.set_motion("cast");
    player.update(10.0);
    player.pause();
    player.update(10.0);
    player.update(10.0);
    let emitter = player.context("fx").and_then(|ctx| ctx.emitter.clone()).expect("bound emitter");
    assert_eq!(emitter.borrow().speed(), 0.0);
    assert_eq!(emitter.borrow().particle_count(), 1, "no spawns while paused");
    let age = emitter.borrow().layers()[0].particles()[0].age();
    assert_eq!(age, 0.0, "live particles do not age either");
    player.resume();
    player.update(10.0);
    assert_eq!(emitter.borrow().speed(), 1.0);
}

#[test]
fn destroyed_ui_players_let_particles_drain() {
    let mut player = player(EmitterOwner::Ui);
    player.set_motion("cast");
    for _ in 0..3 {
        player.update(10.0);
    }
    assert_eq!(player.ui_emitters().live_particles(), 3);
    player.destroy();
    player.update(10.0);
    assert_eq!(player.ui_emitters().len(), 1, "detached emitters keep draining");
    assert_eq!(player.ui_emitters().live_particles(), 3, "no new spawns once destroyed");
    player.update(100.0);
    assert!(player.ui_emitters().is_empty());
}

#[test]
fn draw_interleaves_sprites_and_bound_emitters() {
    let mut player = player(EmitterOwner::Ui);
    player.set_motion("cast");
    player.update(10.0);
    player.update(10.0);
    let cache = textures();
    let mut batch = QuadBatch::default();
    let mut scratch = SortScratch::default();
    let quads = player.draw(LightMode::Lit, &mut DrawTarget::new(&mut batch, &cache, &mut scratch));
    assert_eq!(quads, 3, "one sprite and two particles");
    let calls = batch.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].textures.as_slice(), &[TextureId(1), TextureId(2)]);
    let sprite = batch.quad(0).expect("sprite quad");
    assert_eq!(sprite[0].position, [-8.0, -8.0], "centered anchor");
    assert_eq!(sprite[2].position, [8.0, 8.0]);
}

#[test]
fn invisible_players_skip_sprites_and_request_textures() {
    let mut player = player(EmitterOwner::Ui);
    player.set_motion("cast");
    let mut cache = TextureCache::new();
    assert_eq!(player.request_textures(&mut cache), 2);
    assert_eq!(player.request_textures(&mut cache), 0, "keys are only requested once");
    let mut pending: Vec<&str> = cache.pending().collect();
    pending.sort();
    assert_eq!(pending, vec!["hero.png", "spark.png"]);

    player.set_visible(false);
    player.update(10.0);
    let cache = textures();
    let mut batch = QuadBatch::default();
    let mut scratch = SortScratch::default();
    let quads = player.draw(LightMode::Unlit, &mut DrawTarget::new(&mut batch, &cache, &mut scratch));
    assert_eq!(quads, 0, "hidden players draw nothing and hidden emitters do not spawn");
}

#[test]
fn image_overrides_shadow_base_images() {
    let mut player = player(EmitterOwner::Ui);
    player.set_motion("idle");
    let mut cache = textures();
    cache.resolve("hero_red.png", TextureInfo { id: TextureId(7), width: 16, height: 16 });
    player.push_image_overrides([(0usize, "hero_red.png".to_string())].into_iter().collect());
    let mut batch = QuadBatch::default();
    let mut scratch = SortScratch::default();
    player.draw(LightMode::Unlit, &mut DrawTarget::new(&mut batch, &cache, &mut scratch));
    assert_eq!(batch.calls()[0].textures.as_slice(), &[TextureId(7)]);

    player.pop_image_overrides();
    batch.clear();
    player.draw(LightMode::Unlit, &mut DrawTarget::new(&mut batch, &cache, &mut scratch));
    assert_eq!(batch.calls()[0].textures.as_slice(), &[TextureId(1)]);
}

#[test]
fn mirrored_directions_reflect_emission_for_both_owners() {
    let mut updraft = ParticleLayerDefinition::simple("spark.png", 10.0, 1_000.0);
    updraft.movement = Movement { speed: Range::fixed(100.0), angle: Range::fixed(-FRAC_PI_4), ..Movement::default() };
    let rise = 100.0 * FRAC_PI_4.sin();
    for (facing, expected) in [(0.0, Vec2::new(rise, -rise)), (PI, Vec2::new(-rise, -rise))] {
        let registry = Rc::new(RefCell::new(EmitterRegistry::new()));
        let mut scene = effect_player(EmitterOwner::Scene(Rc::clone(&registry)), "2-dir", updraft.clone());
        scene.set_angle(facing);
        scene.update(10.0);
        registry.borrow_mut().update(10.0, &ParticleFrame::default());

        let mut ui = effect_player(EmitterOwner::Ui, "2-dir", updraft.clone());
        ui.set_angle(facing);
        ui.update(10.0);

        assert_eq!(scene.is_mirrored(), facing > 0.0);
        assert_eq!(ui.is_mirrored(), facing > 0.0);
        for (owner, player) in [("scene", &scene), ("ui", &ui)] {
            let velocity = first_particle_velocity(player);
            assert!(
                (velocity - expected).length() < 1e-3,
                "{owner} owner facing {facing}: expected {expected:?}, got {velocity:?}"
            );
        }
    }
}

#[test]
fn scene_registry_draw_leaves_bound_emitters_to_their_player() {
    let registry = Rc::new(RefCell::new(EmitterRegistry::new()));
    let mut player = player(EmitterOwner::Scene(Rc::clone(&registry)));
    player.set_motion("cast");
    player.update(10.0);
    registry.borrow_mut().update(10.0, &ParticleFrame::default());

    let cache = textures();
    let mut batch = QuadBatch::default();
    let mut scratch = SortScratch::default();
    let from_registry =
        registry.borrow_mut().draw(&mut DrawTarget::new(&mut batch, &cache, &mut scratch), LightMode::Unlit);
    assert_eq!(from_registry, 0, "bound emitters are drawn in layer order by their player");
    let from_player = player.draw(LightMode::Unlit, &mut DrawTarget::new(&mut batch, &cache, &mut scratch));
    assert_eq!(from_player, 2, "one sprite and one particle");
    assert_eq!(batch.quad_count(), 2, "nothing is drawn twice");

    player.set_motion("idle");
    batch.clear();
    let drained = registry.borrow_mut().draw(&mut DrawTarget::new(&mut batch, &cache, &mut scratch), LightMode::Unlit);
    assert_eq!(drained, 1, "detached emitters are drawn by the registry while they drain");
}

#[test]
fn edge_effects_spawn_around_the_player_viewport() {
    let mut rain = ParticleLayerDefinition::simple("spark.png", 10.0, 1_000.0);
    rain.area = SpawnArea::Edge;
    rain.movement = Movement { speed: Range::fixed(100.0), ..Movement::default() };
    let mut player = effect_player(EmitterOwner::Ui, "1-dir", rain);
    let viewport = Rect::new(Vec2::new(1_000.0, 0.0), Vec2::new(1_200.0, 100.0));
    player.set_particle_frame(ParticleFrame::new(viewport));
    player.update(10.0);

    let emitter = player.context("fx").and_then(|ctx| ctx.emitter.clone()).expect("bound emitter");
    let emitter = emitter.borrow();
    let particle = &emitter.layers()[0].particles()[0];
    assert!(particle.bounds().max.x <= viewport.min.x, "enters from the left of the custom viewport");
    assert!((viewport.min.y..=viewport.max.y).contains(&particle.position().y));
}
