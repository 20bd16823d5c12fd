//! ESP32 clock adapter.
//!
//! Implements [`ClockPort`] on top of the monotonic esp_timer counter and
//! the one-shot slots in [`hw_timer`].
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` and real esp_timer
//!   one-shots whose callbacks feed the system event queue.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and in-memory
//!   deadlines fired from the simulated wait.

use log::debug;

use crate::app::ports::{AlarmHandle, AlarmTarget, ClockPort, Instant};
use crate::drivers::hw_timer;
use crate::error::AlarmError;

/// Longest alarm lead accepted (24 h).
pub const MAX_ALARM_LEAD_MS: u64 = 24 * 60 * 60 * 1_000;

const TARGETS: [AlarmTarget; 3] = [AlarmTarget::Wake, AlarmTarget::Dispatch, AlarmTarget::Blink];

fn index(target: AlarmTarget) -> usize {
    match target {
        AlarmTarget::Wake => 0,
        AlarmTarget::Dispatch => 1,
        AlarmTarget::Blink => 2,
    }
}

/// Clock adapter for the ESP32 platform.
pub struct Esp32Clock {
    /// Sequence number of the handle currently owning each slot.
    armed: [Option<u32>; TARGETS.len()],
    next_seq: u32,
}

impl Default for Esp32Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32Clock {
    pub fn new() -> Self {
        Self { armed: [None; TARGETS.len()], next_seq: 1 }
    }

    pub fn is_armed(&self, target: AlarmTarget) -> bool {
        self.armed[index(target)].is_some()
    }
}

impl ClockPort for Esp32Clock {
    fn now(&self) -> Instant {
        Instant::from_millis(hw_timer::now_us() / 1_000)
    }

    fn schedule_at(&mut self, at: Instant, target: AlarmTarget) -> Result<AlarmHandle, AlarmError> {
        let lead_ms = at.millis_since(self.now());
        if lead_ms > MAX_ALARM_LEAD_MS {
            return Err(AlarmError::OutOfRange);
        }
        hw_timer::arm(target, lead_ms * 1_000).map_err(|e| AlarmError::Platform(e.0))?;

        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1).max(1);
        self.armed[index(target)] = Some(seq);
        debug!("clock: {:?} armed +{} ms (seq {})", target, lead_ms, seq);
        Ok(AlarmHandle { target, seq })
    }

    fn cancel(&mut self, handle: AlarmHandle) {
        let slot = &mut self.armed[index(handle.target)];
        if *slot == Some(handle.seq) {
            hw_timer::disarm(handle.target);
            *slot = None;
        }
    }
}
