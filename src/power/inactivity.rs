//! No-movement timer.
//!
//! Starts on the first "not moving" observation, stops the instant motion
//! is seen, and reports elapsed once continuous stillness reaches the
//! timeout.  It stops itself when it fires so the next suspension needs a
//! fresh stillness window.

use crate::app::ports::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityTimer {
    timeout_ms: u64,
    started: Option<Instant>,
}

impl InactivityTimer {
    pub const fn new(timeout_ms: u32) -> Self {
        Self { timeout_ms: timeout_ms as u64, started: None }
    }

    /// Feed one motion sample.  Returns `true` exactly once per stillness
    /// window, when it reaches the timeout.
    pub fn observe(&mut self, moving: bool, now: Instant) -> bool {
        if moving {
            self.started = None;
            return false;
        }
        match self.started {
            None => {
                self.started = Some(now);
                false
            }
            Some(start) if now.millis_since(start) >= self.timeout_ms => {
                self.started = None;
                true
            }
            Some(_) => false,
        }
    }

    pub fn reset(&mut self) {
        self.started = None;
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Accumulated stillness, zero when not running.
    pub fn elapsed_ms(&self, now: Instant) -> u64 {
        self.started.map_or(0, |s| now.millis_since(s))
    }
}
