//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PowerOrchestrator / Dispatcher (domain)
//! ```
//!
//! Board adapters (sensors, motion, clocks, alarms, indicator) and the
//! wireless stack adapter implement these traits.  The domain consumes them
//! through generics passed per call, so it never touches hardware directly
//! and every state machine runs against fakes in host tests.

use core::ops::Add;

use embedded_hal::delay::DelayNs;
use serde::{Deserialize, Serialize};

use crate::error::{AlarmError, LinkError, SensorError};
use crate::link::att::AttributeId;
use crate::sensors::{EnvReading, PmReading};

// ───────────────────────────────────────────────────────────────
// Time
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds since boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Instant(u64);

impl Instant {
    pub const ZERO: Self = Self(0);

    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Milliseconds from `earlier` to `self`, zero if `earlier` is later.
    pub const fn millis_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    pub const fn delayed_by(self, ms: u32) -> Self {
        Self(self.0.saturating_add(ms as u64))
    }
}

impl Add<u32> for Instant {
    type Output = Self;

    fn add(self, ms: u32) -> Self {
        self.delayed_by(ms)
    }
}

// ───────────────────────────────────────────────────────────────
// Clock / alarm port
// ───────────────────────────────────────────────────────────────

/// One-shot timer slots.  Each target has exactly one slot; arming a
/// target that is already pending replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmTarget {
    /// Staged pre-wake / full-wake alarm of the power orchestrator.
    Wake,
    /// Per-connection dispatch timer.
    Dispatch,
    /// Advertising indicator toggle.
    Blink,
}

/// Handle to an armed alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlarmHandle {
    pub target: AlarmTarget,
    pub seq: u32,
}

pub trait ClockPort {
    fn now(&self) -> Instant;

    /// Arm a one-shot alarm for `target` at the absolute instant `at`.
    fn schedule_at(&mut self, at: Instant, target: AlarmTarget) -> Result<AlarmHandle, AlarmError>;

    /// Disarm `handle`.  No-op if it already fired or was replaced.
    fn cancel(&mut self, handle: AlarmHandle);
}

// ───────────────────────────────────────────────────────────────
// Sensor ports (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

pub trait SensorPort {
    /// Initialise every acquisition sensor.
    fn init_sensors(&mut self) -> Result<(), SensorError>;

    /// Temperature, humidity, pressure, gas.
    fn read_environment(&mut self) -> Result<EnvReading, SensorError>;

    /// Particulate mass concentrations.
    fn read_particulate(&mut self) -> Result<PmReading, SensorError>;

    /// Gate the slow-warming particulate sensor.
    fn set_particulate_power(&mut self, on: bool);
}

/// Accelerometer as seen by the orchestrator.
pub trait MotionPort {
    /// Polled "moving now" check.
    fn is_moving(&mut self) -> bool;

    /// Unmask the edge-triggered motion interrupt (sensor and GPIO).
    fn arm_motion_interrupt(&mut self);

    /// Mask the motion interrupt at the sensor.
    fn disarm_motion_interrupt(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Power and indicator ports
// ───────────────────────────────────────────────────────────────

pub trait PowerPort {
    /// Drop non-essential clock domains; the link's domain stays up.
    fn reduce_clocks(&mut self);

    /// Back to full speed.
    fn restore_clocks(&mut self);

    /// Low-power wait until the next interrupt or alarm.
    fn wait_for_interrupt(&mut self);
}

/// Single status LED.
pub trait IndicatorPort {
    fn set_indicator(&mut self, on: bool);

    fn toggle_indicator(&mut self);
}

/// Everything the power orchestrator needs from the board.
pub trait Board: SensorPort + MotionPort + PowerPort + ClockPort + IndicatorPort + DelayNs {}

impl<T> Board for T where T: SensorPort + MotionPort + PowerPort + ClockPort + IndicatorPort + DelayNs {}

// ───────────────────────────────────────────────────────────────
// Link port (driven adapter: domain ↔ wireless stack)
// ───────────────────────────────────────────────────────────────

/// Stack-assigned connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnHandle(pub u16);

/// Advertising parameters handed to the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingParams {
    /// Interval in units of 0.625 ms (min == max).
    pub interval: u16,
    pub payload: heapless::Vec<u8, 31>,
    pub scan_response: heapless::Vec<u8, 31>,
}

/// Requested connection timing, in controller units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnParams {
    pub interval_min: u16,
    pub interval_max: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
}

/// Timing the controller settled on, in controller units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnParamsReport {
    pub interval: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
}

impl ConnParamsReport {
    /// Connection interval in microseconds (units × 1250).
    pub fn interval_us(&self) -> u32 {
        u32::from(self.interval) * 1_250
    }

    /// Supervision timeout in milliseconds (units × 10).
    pub fn supervision_timeout_ms(&self) -> u32 {
        u32::from(self.supervision_timeout) * 10
    }
}

/// Maximum CCCD / attribute write forwarded from the stack.
pub const MAX_WRITE_LEN: usize = 8;

/// Callbacks from the stack, queued by the adapter and drained by the run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    StackReady,
    Connected(ConnHandle),
    Disconnected,
    ParamsUpdated(ConnParamsReport),
    MtuExchanged(u16),
    Write {
        attribute: AttributeId,
        value: heapless::Vec<u8, MAX_WRITE_LEN>,
    },
}

pub trait LinkPort {
    fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), LinkError>;

    fn stop_advertising(&mut self) -> Result<(), LinkError>;

    fn request_conn_params(&mut self, handle: ConnHandle, params: &ConnParams) -> Result<(), LinkError>;

    /// Push `value` of `attribute` to the peer on `handle`.
    fn notify(&mut self, handle: ConnHandle, attribute: AttributeId, value: &[u8]) -> Result<(), LinkError>;

    fn disconnect(&mut self, handle: ConnHandle) -> Result<(), LinkError>;

    /// Next queued stack callback, if any.
    fn poll_event(&mut self) -> Option<LinkEvent>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`NodeEvent`](super::events::NodeEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::NodeEvent);
}
