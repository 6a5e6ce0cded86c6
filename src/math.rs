use glam::{Affine2, Vec2};

/// Axis-aligned rectangle in world or local space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub const UNIT_CENTERED: Rect = Rect { min: Vec2::splat(-0.5), max: Vec2::splat(0.5) };

    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_size(width: f32, height: f32) -> Self {
        Self { min: Vec2::ZERO, max: Vec2::new(width, height) }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x < other.max.x && self.max.x > other.min.x && self.min.y < other.max.y && self.max.y > other.min.y
    }

    pub fn translated(&self, delta: Vec2) -> Rect {
        Rect { min: self.min + delta, max: self.max + delta }
    }
}

/// Transforms the four corners of `local` through `matrix`.
///
/// Corner order is top-left, top-right, bottom-right, bottom-left in local space. Sprite drawing,
/// particle drawing and the edge-spawn visibility test all go through this routine so the quad that
/// is drawn is exactly the quad that is tested against the viewport.
pub fn quad_corners(matrix: &Affine2, local: Rect) -> [Vec2; 4] {
    [
        matrix.transform_point2(Vec2::new(local.min.x, local.min.y)),
        matrix.transform_point2(Vec2::new(local.max.x, local.min.y)),
        matrix.transform_point2(Vec2::new(local.max.x, local.max.y)),
        matrix.transform_point2(Vec2::new(local.min.x, local.max.y)),
    ]
}

pub fn bounds_of(corners: &[Vec2; 4]) -> Rect {
    let mut min = corners[0];
    let mut max = corners[0];
    for corner in &corners[1..] {
        min = min.min(*corner);
        max = max.max(*corner);
    }
    Rect { min, max }
}

pub fn transformed_bounds(matrix: &Affine2, local: Rect) -> Rect {
    bounds_of(&quad_corners(matrix, local))
}

/// Translate, then rotate, then scale.
pub fn compose(translation: Vec2, rotation: f32, scale: Vec2) -> Affine2 {
    Affine2::from_scale_angle_translation(scale, rotation, translation)
}

pub fn rotation_of(matrix: &Affine2) -> f32 {
    let x_axis = matrix.matrix2.x_axis;
    x_axis.y.atan2(x_axis.x)
}

pub fn scale_of(matrix: &Affine2) -> Vec2 {
    Vec2::new(matrix.matrix2.x_axis.length(), matrix.matrix2.y_axis.length())
}

/// Splits the linear part of `matrix` into rotation, per-axis scale and a mirror flag.
///
/// A matrix that flips handedness reports the rotation of its unflipped part, so a mirror on x
/// does not read as a half turn.
pub fn orientation_of(matrix: &Affine2) -> (f32, Vec2, bool) {
    let mirrored = matrix.matrix2.determinant() < 0.0;
    let x_axis = if mirrored { -matrix.matrix2.x_axis } else { matrix.matrix2.x_axis };
    (x_axis.y.atan2(x_axis.x), scale_of(matrix), mirrored)
}

pub fn wrap_angle(mut radians: f32) -> f32 {
    let two_pi = 2.0 * std::f32::consts::PI;
    while radians > std::f32::consts::PI {
        radians -= two_pi;
    }
    while radians < -std::f32::consts::PI {
        radians += two_pi;
    }
    radians
}
