//! Easing curves consumed by keyframe blending and particle color ramps.
//!
//! The engine only ever asks for `map(t) -> t'`; where the curves come from is up to the host. The
//! built-in [`EasingTable`] covers the common named curves and accepts sampled lookup tables.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::sync::Arc;

pub trait EasingCurve {
    /// Maps normalized progress in `[0, 1]` to eased progress.
    fn map(&self, t: f32) -> f32;
}

pub trait EasingService {
    fn get(&self, id: &str) -> Option<Arc<dyn EasingCurve>>;
}

#[derive(Clone, Copy)]
pub struct FnCurve(pub fn(f32) -> f32);

impl EasingCurve for FnCurve {
    fn map(&self, t: f32) -> f32 {
        (self.0)(t.clamp(0.0, 1.0))
    }
}

/// Piecewise-linear lookup table sampled at evenly spaced `t`.
#[derive(Clone, Debug)]
pub struct SampledCurve {
    samples: Arc<[f32]>,
}

impl SampledCurve {
    pub fn new(samples: Vec<f32>) -> Self {
        let samples = if samples.is_empty() { vec![0.0, 1.0] } else { samples };
        Self { samples: Arc::from(samples.into_boxed_slice()) }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl EasingCurve for SampledCurve {
    fn map(&self, t: f32) -> f32 {
        let last = self.samples.len() - 1;
        if last == 0 {
            return self.samples[0];
        }
        let scaled = t.clamp(0.0, 1.0) * last as f32;
        let lower = (scaled.floor() as usize).min(last);
        let upper = (lower + 1).min(last);
        let frac = scaled - lower as f32;
        self.samples[lower] + (self.samples[upper] - self.samples[lower]) * frac
    }
}

pub fn linear(t: f32) -> f32 {
    t
}

pub fn step(t: f32) -> f32 {
    if t >= 1.0 {
        1.0
    } else {
        0.0
    }
}

pub fn quad_in(t: f32) -> f32 {
    t * t
}

pub fn quad_out(t: f32) -> f32 {
    t * (2.0 - t)
}

pub fn quad_in_out(t: f32) -> f32 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        -1.0 + (4.0 - 2.0 * t) * t
    }
}

pub fn cubic_in(t: f32) -> f32 {
    t * t * t
}

pub fn cubic_out(t: f32) -> f32 {
    let u = t - 1.0;
    u * u * u + 1.0
}

pub fn cubic_in_out(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let u = 2.0 * t - 2.0;
        0.5 * u * u * u + 1.0
    }
}

pub fn sine_in(t: f32) -> f32 {
    1.0 - (t * PI * 0.5).cos()
}

pub fn sine_out(t: f32) -> f32 {
    (t * PI * 0.5).sin()
}

pub fn sine_in_out(t: f32) -> f32 {
    0.5 * (1.0 - (t * PI).cos())
}

/// Named curve registry.
pub struct EasingTable {
    curves: HashMap<String, Arc<dyn EasingCurve>>,
}

impl EasingTable {
    pub fn empty() -> Self {
        Self { curves: HashMap::new() }
    }

    pub fn with_builtins() -> Self {
        let mut table = Self::empty();
        let builtins: [(&str, fn(f32) -> f32); 12] = [
            ("linear", linear),
            ("step", step),
            ("quad_in", quad_in),
            ("quad_out", quad_out),
            ("quad_in_out", quad_in_out),
            ("cubic_in", cubic_in),
            ("cubic_out", cubic_out),
            ("cubic_in_out", cubic_in_out),
            ("sine_in", sine_in),
            ("sine_out", sine_out),
            ("sine_in_out", sine_in_out),
            ("ease", sine_in_out),
        ];
        for (name, curve) in builtins {
            table.insert(name, FnCurve(curve));
        }
        table
    }

    pub fn insert(&mut self, id: impl Into<String>, curve: impl EasingCurve + 'static) {
        self.curves.insert(id.into(), Arc::new(curve));
    }

    pub fn insert_samples(&mut self, id: impl Into<String>, samples: Vec<f32>) {
        self.insert(id, SampledCurve::new(samples));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.curves.contains_key(id)
    }
}

impl Default for EasingTable {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl EasingService for EasingTable {
    fn get(&self, id: &str) -> Option<Arc<dyn EasingCurve>> {
        self.curves.get(id).cloned()
    }
}
