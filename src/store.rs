//! Single-slot holder for the most recent fused sensor reading.
//!
//! The power orchestrator's acquisition path is the only writer; the link
//! dispatcher and the attribute read handler only read.  The slot is
//! replaced whole under a critical-section mutex, so a reader always sees
//! one acquisition.  The dirty flag is published after the slot write with
//! `Release` and checked with `Acquire` before the slot is read.
//!
//! ```text
//!  acquisition ──publish()──▶ ┌───────────┐ ──pending()/mark_sent()──▶ dispatcher
//!                             │ Slot      │
//!                             │ dirty     │ ──latest()─────────────▶ ATT read
//!                             └───────────┘
//! ```

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::{Deserialize, Serialize};

use crate::app::ports::Instant;
use crate::sensors::{EnvReading, PmReading};

/// Encoded width of [`SensorSample`] on the wire.
pub const SAMPLE_WIRE_LEN: usize = 24;

/// One fused acquisition.  Field order is the wire order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorSample {
    /// °C
    pub temperature: f32,
    /// %RH
    pub humidity: f32,
    /// Pa
    pub pressure: f32,
    /// kΩ
    pub gas_resistance: f32,
    /// Estimated VOC concentration (ppm).
    pub voc_ppm: f32,
    /// Environmental PM2.5 (µg/m³).
    pub pm25: f32,
}

impl SensorSample {
    pub const ZERO: Self = Self {
        temperature: 0.0,
        humidity: 0.0,
        pressure: 0.0,
        gas_resistance: 0.0,
        voc_ppm: 0.0,
        pm25: 0.0,
    };

    /// Combine one environmental and one particulate reading.
    pub fn fuse(env: &EnvReading, pm: &PmReading) -> Self {
        Self {
            temperature: env.temperature_c,
            humidity: env.humidity_pct,
            pressure: env.pressure_pa,
            gas_resistance: env.gas_resistance_kohm,
            voc_ppm: env.voc_ppm,
            pm25: f32::from(pm.pm2_5_env),
        }
    }

    /// Six little-endian `f32`s.
    pub fn to_le_bytes(&self) -> [u8; SAMPLE_WIRE_LEN] {
        let mut out = [0u8; SAMPLE_WIRE_LEN];
        let fields = [
            self.temperature,
            self.humidity,
            self.pressure,
            self.gas_resistance,
            self.voc_ppm,
            self.pm25,
        ];
        for (chunk, v) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&v.to_le_bytes());
        }
        out
    }

    pub fn from_le_bytes(bytes: &[u8; SAMPLE_WIRE_LEN]) -> Self {
        let f = |i: usize| {
            f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]])
        };
        Self {
            temperature: f(0),
            humidity: f(4),
            pressure: f(8),
            gas_resistance: f(12),
            voc_ppm: f(16),
            pm25: f(20),
        }
    }
}

#[derive(Clone, Copy)]
struct Slot {
    sample: SensorSample,
    /// Bumped on every publish.
    generation: u32,
    last_send: Instant,
}

/// A dirty sample picked up for sending.  Hand it back to
/// [`SampleStore::mark_sent`] once the stack accepted it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSample {
    pub sample: SensorSample,
    generation: u32,
}

pub struct SampleStore {
    slot: Mutex<CriticalSectionRawMutex, Cell<Slot>>,
    dirty: AtomicBool,
}

impl SampleStore {
    /// Zeroed store, clean, last send at boot.
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(Slot {
                sample: SensorSample::ZERO,
                generation: 0,
                last_send: Instant::ZERO,
            })),
            dirty: AtomicBool::new(false),
        }
    }

    /// Replace the stored sample and mark it dirty.
    pub fn publish(&self, sample: SensorSample) {
        self.slot.lock(|cell| {
            let mut slot = cell.get();
            slot.sample = sample;
            slot.generation = slot.generation.wrapping_add(1);
            cell.set(slot);
            self.dirty.store(true, Ordering::Release);
        });
    }

    /// Current contents, dirty or not.
    pub fn latest(&self) -> SensorSample {
        self.slot.lock(|cell| cell.get().sample)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// The stored sample if it has not been delivered yet.
    pub fn pending(&self) -> Option<PendingSample> {
        if !self.is_dirty() {
            return None;
        }
        let slot = self.slot.lock(Cell::get);
        Some(PendingSample { sample: slot.sample, generation: slot.generation })
    }

    /// Record a successful send.  The dirty flag is cleared only if no newer
    /// sample was published since `sent` was taken; the timestamp is always
    /// recorded.  Returns whether the store is now clean.
    pub fn mark_sent(&self, sent: &PendingSample, at: Instant) -> bool {
        self.slot.lock(|cell| {
            let mut slot = cell.get();
            slot.last_send = at;
            cell.set(slot);
            if slot.generation == sent.generation {
                self.dirty.store(false, Ordering::Release);
                true
            } else {
                false
            }
        })
    }

    /// Drop the undelivered marker (the peer went away).
    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    pub fn last_send(&self) -> Instant {
        self.slot.lock(|cell| cell.get().last_send)
    }
}

impl Default for SampleStore {
    fn default() -> Self {
        Self::new()
    }
}
