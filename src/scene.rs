//! Scene-level emitter registry.
//!
//! Players registered with a scene hand their emitters over here; the registry ticks them once per
//! frame and drops each one after it has been disabled and has drained.

use crate::particles::{EmitterFlags, ParticleEmitter, ParticleFrame};
use crate::profiler::PassProfiler;
use crate::renderer::{DrawTarget, LightMode};
use std::cell::RefCell;
use std::rc::Rc;

/// An emitter shared between its registry and the player context that drives it.
pub type SharedEmitter = Rc<RefCell<ParticleEmitter>>;

pub fn share(emitter: ParticleEmitter) -> SharedEmitter {
    Rc::new(RefCell::new(emitter))
}

#[derive(Default)]
pub struct EmitterRegistry {
    emitters: Vec<SharedEmitter>,
    profiler: PassProfiler,
}

impl EmitterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, emitter: SharedEmitter) {
        if self.emitters.iter().any(|existing| Rc::ptr_eq(existing, &emitter)) {
            return;
        }
        self.emitters.push(emitter);
    }

    /// Ticks every emitter, then drops those waiting for teardown. Returns the live particle count.
    pub fn update(&mut self, dt: f32, frame: &ParticleFrame) -> usize {
        let _scope = self.profiler.scope("particles.update");
        let mut live = 0;
        for emitter in &self.emitters {
            live += emitter.borrow_mut().tick(dt, frame);
        }
        let before = self.emitters.len();
        self.emitters.retain(|emitter| !emitter.borrow().teardown_pending());
        let dropped = before - self.emitters.len();
        if dropped > 0 {
            log::debug!("[particles] released {dropped} drained emitter(s)");
        }
        live
    }

    /// Draws every emitter not bound to a player: standalone emitters and detached ones still
    /// draining. Bound emitters are drawn by their player so they stay interleaved with its sprite
    /// layers.
    pub fn draw(&mut self, target: &mut DrawTarget<'_>, light: LightMode) -> usize {
        let _scope = self.profiler.scope("particles.draw");
        self.emitters
            .iter()
            .map(|emitter| emitter.borrow())
            .filter(|emitter| !emitter.flags().contains(EmitterFlags::BOUND))
            .map(|emitter| emitter.draw(target, light))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    pub fn live_particles(&self) -> usize {
        self.emitters.iter().map(|emitter| emitter.borrow().particle_count()).sum()
    }

    pub fn emitters(&self) -> &[SharedEmitter] {
        &self.emitters
    }

    /// Destroys every emitter immediately, live particles included.
    pub fn clear(&mut self) {
        for emitter in self.emitters.drain(..) {
            emitter.borrow_mut().destroy();
        }
    }

    pub fn profiler(&self) -> &PassProfiler {
        &self.profiler
    }
}
