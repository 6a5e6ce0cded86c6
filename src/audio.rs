use glam::Vec2;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// Fire-and-forget sound playback. Implementations own their interior mutability so a single
/// service can be shared by every player.
pub trait AudioService {
    fn play(&self, sound: &str, volume: f32, speed: f32);
    /// Distance-attenuated playback at a world position.
    fn play_at(&self, sound: &str, position: Vec2, volume: f32, speed: f32);
}

/// Audio sink that discards everything.
#[derive(Default, Clone, Copy)]
pub struct SilentAudio;

impl AudioService for SilentAudio {
    fn play(&self, _sound: &str, _volume: f32, _speed: f32) {}

    fn play_at(&self, _sound: &str, _position: Vec2, _volume: f32, _speed: f32) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrigger {
    pub sound: String,
    pub position: Option<Vec2>,
    pub volume: f32,
    pub speed: f32,
}

/// Bounded log of recent triggers; useful as a headless backend and in tests.
pub struct AudioLog {
    enabled: Cell<bool>,
    capacity: usize,
    triggers: RefCell<VecDeque<AudioTrigger>>,
}

impl AudioLog {
    pub fn new(capacity: usize) -> Self {
        Self { enabled: Cell::new(true), capacity: capacity.max(1), triggers: RefCell::new(VecDeque::new()) }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn clear(&self) {
        self.triggers.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.triggers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.borrow().is_empty()
    }

    pub fn recent_triggers(&self) -> Vec<AudioTrigger> {
        self.triggers.borrow().iter().cloned().collect()
    }

    fn push_trigger(&self, trigger: AudioTrigger) {
        if !self.enabled() {
            return;
        }
        let mut triggers = self.triggers.borrow_mut();
        if triggers.len() == self.capacity {
            triggers.pop_front();
        }
        triggers.push_back(trigger);
    }
}

impl AudioService for AudioLog {
    fn play(&self, sound: &str, volume: f32, speed: f32) {
        self.push_trigger(AudioTrigger { sound: sound.to_string(), position: None, volume, speed });
    }

    fn play_at(&self, sound: &str, position: Vec2, volume: f32, speed: f32) {
        self.push_trigger(AudioTrigger { sound: sound.to_string(), position: Some(position), volume, speed });
    }
}
