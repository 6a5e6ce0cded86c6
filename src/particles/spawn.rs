use super::EmitterPose;
use crate::assets::SpawnArea;
use crate::math::Rect;
use glam::Vec2;
use rand::Rng;
use std::f32::consts::TAU;

/// Unrotated, unscaled spawn offset for point, rectangle and circle areas.
pub fn local_offset<R: Rng + ?Sized>(area: &SpawnArea, rng: &mut R) -> Vec2 {
    match *area {
        SpawnArea::Point | SpawnArea::Edge => Vec2::ZERO,
        SpawnArea::Rectangle { width, height } => {
            let half = Vec2::new(width.abs(), height.abs()) * 0.5;
            Vec2::new(symmetric(rng, half.x), symmetric(rng, half.y))
        }
        SpawnArea::Circle { radius } => {
            // sqrt keeps the distribution uniform over the disc area
            let distance = radius.abs() * rng.gen::<f32>().sqrt();
            Vec2::from_angle(rng.gen::<f32>() * TAU) * distance
        }
    }
}

fn symmetric<R: Rng + ?Sized>(rng: &mut R, half: f32) -> f32 {
    if half > 0.0 {
        rng.gen_range(-half..=half)
    } else {
        0.0
    }
}

/// World spawn point: offset scaled by the emitter scale, oriented by the emitter angle and mirror,
/// then placed around the emitter anchor.
pub fn world_position(pose: &EmitterPose, offset: Vec2) -> Vec2 {
    pose.anchor() + pose.orient(offset * pose.scale)
}

/// Places an edge particle just outside the viewport on the border it will travel away from.
///
/// The border axis is chosen with probability proportional to the velocity component on that axis,
/// so a particle falling mostly downward enters from the top. `half_extent` is half the particle's
/// bounding box, keeping the whole quad outside the viewport.
pub fn edge_position<R: Rng + ?Sized>(viewport: &Rect, velocity: Vec2, half_extent: Vec2, rng: &mut R) -> Vec2 {
    let wx = velocity.x.abs();
    let wy = velocity.y.abs();
    let horizontal = if wx + wy > 0.0 { rng.gen::<f32>() * (wx + wy) < wx } else { rng.gen::<bool>() };
    if horizontal {
        let y = lerp(viewport.min.y, viewport.max.y, rng.gen::<f32>());
        let moving_right = if velocity.x != 0.0 { velocity.x > 0.0 } else { rng.gen::<bool>() };
        let x = if moving_right { viewport.min.x - half_extent.x } else { viewport.max.x + half_extent.x };
        Vec2::new(x, y)
    } else {
        let x = lerp(viewport.min.x, viewport.max.x, rng.gen::<f32>());
        let moving_down = if velocity.y != 0.0 { velocity.y > 0.0 } else { rng.gen::<bool>() };
        let y = if moving_down { viewport.min.y - half_extent.y } else { viewport.max.y + half_extent.y };
        Vec2::new(x, y)
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
