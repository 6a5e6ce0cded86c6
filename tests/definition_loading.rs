use kestrel_motion::animation_validation::{has_errors, DefinitionValidator, Severity};
use kestrel_motion::assets::{
    AnimationDefinition, ColorPolicy, LayerKind, ParticleLibrary, PositionMode, Range, SpawnArea,
};
use kestrel_motion::config::{EngineConfig, EngineConfigOverrides};
use kestrel_motion::easing::EasingTable;
use std::io::Write;
use tempfile::NamedTempFile;

const HERO: &str = r#"{
    "images": [{ "key": "hero.png" }],
    "sprites": [{ "image": 0, "cell_width": 32, "cell_height": 48, "columns": 4, "rows": 2 }],
    "motions": [
        {
            "name": "walk",
            "direction_mode": "2-dir",
            "loop": true,
            "loop_start": 2,
            "direction_cases": [
                {
                    "layers": [
                        {
                            "type": "joint",
                            "name": "hip",
                            "keyframes": [{ "start": 0, "end": 8, "y": -4 }],
                            "children": [
                                {
                                    "type": "sprite",
                                    "name": "legs",
                                    "sprite": 0,
                                    "keyframes": [
                                        { "start": 4, "end": 8, "cell": 1, "tint": [10, 0, 0, 0] },
                                        { "start": 0, "end": 4, "cell": 0, "easing": "linear" }
                                    ]
                                },
                                { "type": "particle", "name": "dust", "effect": "dust", "keyframes": [{ "start": 0, "end": 8, "scale": 0.5 }] }
                            ]
                        },
                        { "type": "sound", "name": "step", "clip": "step.ogg", "keyframes": [{ "start": 2, "end": 3, "volume": 0.25 }] }
                    ]
                }
            ]
        }
    ]
}"#;

const EFFECTS: &str = r#"{
    "dust": {
        "layers": [
            {
                "sprite": { "image": "dust.png", "cell_width": 8, "cell_height": 8, "columns": 2, "cells": "random" },
                "area": { "shape": "circle", "radius": 6 },
                "position": "relative",
                "movement": { "speed": [40, 10], "angle": { "mean": -1.57, "deviation": 0.3 } },
                "color": { "mode": "easing", "start_min": [255, 255, 255, 255], "start_max": [255, 255, 255, 255],
                           "end_min": [120, 100, 80, 0], "end_max": [140, 110, 90, 0], "easing": "quad_out" },
                "lifetime": 400,
                "fadeout": 100,
                "interval": 50,
                "count": 12,
                "sort": "by_scale",
                "blend": "additive"
            }
        ]
    }
}"#;

fn temp_json(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

#[test]
fn animation_json_flattens_layer_trees() {
    let definition = AnimationDefinition::from_json_slice(HERO.as_bytes()).expect("parse hero");
    let walk = definition.motion("walk").expect("walk motion");
    assert!(walk.looped);
    assert_eq!(walk.direction_mode, "2-dir");
    assert!(walk.skip, "frame skipping defaults on");
    let case = walk.case(0).expect("case 0");
    assert_eq!(case.length(), 8, "length derives from the last keyframe end");
    assert_eq!(case.loop_start(), 2.0);

    let names: Vec<&str> = case.nodes().iter().map(|node| node.name.as_str()).collect();
    assert_eq!(names, vec!["hip", "legs", "dust", "step"], "pre-order flattening");
    let parents: Vec<Option<usize>> = case.nodes().iter().map(|node| node.parent).collect();
    assert_eq!(parents, vec![None, Some(0), Some(0), None]);
    match &case.nodes()[0].kind {
        LayerKind::Joint { children, .. } => assert_eq!(children, &vec![1, 2]),
        other => panic!("expected joint, got {}", other.label()),
    }
    match &case.nodes()[1].kind {
        LayerKind::Sprite { keyframes, .. } => {
            assert_eq!(keyframes[0].start, 0.0, "keyframes are sorted by start");
            assert_eq!(keyframes[1].params.tint, [10, 0, 0, 0]);
            assert_eq!(keyframes[1].params.anchor, [0.5, 0.5]);
        }
        other => panic!("expected sprite, got {}", other.label()),
    }
    assert_eq!(definition.sprite(0).map(|sheet| sheet.cell_uv(5, 128, 96)), Some([0.25, 0.5, 0.5, 1.0]));
}

#[test]
fn animation_json_rejects_broken_references() {
    let missing_cases = r#"{ "motions": [{ "name": "idle", "direction_cases": [] }] }"#;
    let err = AnimationDefinition::from_json_slice(missing_cases.as_bytes()).expect_err("no cases");
    assert!(err.to_string().contains("idle"));

    let bad_image = r#"{ "sprites": [{ "image": 3, "cell_width": 8, "cell_height": 8 }], "motions": [] }"#;
    assert!(AnimationDefinition::from_json_slice(bad_image.as_bytes()).is_err());
    assert!(AnimationDefinition::from_json_slice(b"not json").is_err());
}

#[test]
fn particle_json_accepts_every_range_form() {
    let library = ParticleLibrary::from_json_slice(EFFECTS.as_bytes()).expect("parse effects");
    let dust = library.get("dust").expect("dust effect");
    assert_eq!(dust.name, "dust", "ids name unnamed effects");
    let layer = &dust.layers[0];
    assert_eq!(layer.lifetime, Range::fixed(400.0));
    assert_eq!(layer.movement.speed, Range::new(40.0, 10.0));
    assert_eq!(layer.movement.angle, Range::new(-1.57, 0.3));
    assert_eq!(layer.area, SpawnArea::Circle { radius: 6.0 });
    assert_eq!(layer.position, PositionMode::Relative);
    assert_eq!(layer.count, Some(12));
    assert_eq!(layer.maximum, 1_000, "maximum defaults");
    assert_eq!(layer.sprite.cell_count(), 2);
    assert!(matches!(layer.color, ColorPolicy::Easing { ref easing, alpha_easing: None, .. } if easing == "quad_out"));
}

#[test]
fn validator_reads_files_and_cross_checks_effects() {
    let easing = EasingTable::with_builtins();
    let hero = temp_json(HERO);
    let issues = DefinitionValidator::new(&easing).validate_path(hero.path());
    assert!(issues.is_empty(), "hero is clean without a library: {issues:?}");

    let empty = ParticleLibrary::new();
    let issues = DefinitionValidator::new(&easing).with_particles(&empty).validate_path(hero.path());
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, Severity::Warning);
    assert!(issues[0].location.ends_with("particle 'dust'"));

    let effects = temp_json(EFFECTS);
    let issues = DefinitionValidator::new(&easing).validate_path(effects.path());
    assert!(issues.is_empty(), "effects are clean: {issues:?}");

    let broken = temp_json(r#"{ "motions": [{ "name": "idle", "direction_cases": [] }] }"#);
    assert!(has_errors(&DefinitionValidator::new(&easing).validate_path(broken.path())));
}

#[test]
fn config_loads_with_defaults_for_missing_sections() {
    let file = temp_json(r#"{ "animation": { "frame_rate": 30 }, "particles": { "capacity": 64, "seed": 7 } }"#);
    let config = EngineConfig::load(file.path()).expect("load config");
    assert!((config.animation.step_ms() - 1000.0 / 30.0).abs() < 1e-4);
    assert_eq!(config.particles.capacity, 64);
    assert_eq!(config.particles.seed, Some(7));
    assert_eq!(config.particles.edge_offscreen_timeout_ms, 500.0);
    assert_eq!(config.particles.sort_max_key, 4_095);
    assert_eq!(config.viewport.width, 1280.0);
}

#[test]
fn config_falls_back_on_missing_or_broken_files() {
    let config = EngineConfig::load_or_default("definitely/not/here.json");
    assert_eq!(config.particles.capacity, 1_000);
    let broken = temp_json("{ nope");
    assert!(EngineConfig::load(broken.path()).is_err());
    let config = EngineConfig::load_or_default(broken.path());
    assert_eq!(config.animation.frame_rate, 60.0);
}

#[test]
fn invalid_frame_rates_use_the_default_step() {
    let mut config = EngineConfig::default();
    for rate in [0.0, -5.0, f32::NAN] {
        config.animation.frame_rate = rate;
        assert!((config.animation.step_ms() - 1000.0 / 60.0).abs() < 1e-4);
    }
}

#[test]
fn overrides_apply_only_what_is_set() {
    let mut config = EngineConfig::default();
    let overrides = EngineConfigOverrides { particle_capacity: Some(32), seed: Some(3), ..Default::default() };
    assert!(!overrides.is_empty());
    assert_eq!(overrides.applied_fields(), vec!["particle_capacity", "seed"]);
    config.apply_overrides(&overrides);
    assert_eq!(config.particles.capacity, 32);
    assert_eq!(config.particles.seed, Some(3));
    assert_eq!(config.animation.frame_rate, 60.0);
    assert!(EngineConfigOverrides::default().is_empty());
}
