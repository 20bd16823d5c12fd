//! Power orchestrator.  Suspends the node after a stillness window and
//! stages the particulate sensor's wake ahead of each health check.
//!
//! ```text
//!                 no movement for timeout
//!   ┌───────┐ ─────────────────────────────▶ ┌─────────┐
//!   │ Awake │                                │ PreWake │  PM off, alarm +pre_wake_lead
//!   └───────┘ ◀──────── motion ───────────── └─────────┘
//!     ▲   ▲                                       │ alarm: PM on, alarm +full_wake_lead
//!     │   │ motion                                ▼
//!     │   └────────────────────────────────── ┌──────────┐
//!     │        abnormal                       │ FullWake │
//!     └────────────────────── health check ◀─ └──────────┘ alarm: health requested
//!                                │ normal
//!                                └────────▶ PreWake again
//! ```
//!
//! Callbacks never decide anything: the motion ISR and the alarm callback
//! push events, [`PowerOrchestrator::on_motion_interrupt`] and
//! [`PowerOrchestrator::on_wake_alarm`] record requests, and
//! [`PowerOrchestrator::step`] acts on them.

pub mod health;
pub mod inactivity;
pub mod isr;

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::events::NodeEvent;
use crate::app::ports::{AlarmHandle, AlarmTarget, Board, EventSink, IndicatorPort, Instant};
use crate::config::NodeConfig;
use crate::store::{SampleStore, SensorSample};

pub use health::{HealthVerdict, run_health_check};
pub use inactivity::InactivityTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    Awake,
    /// Suspended, particulate sensor off, waiting for the pre-wake alarm.
    PreWake,
    /// Suspended, particulate sensor warming, waiting for the full-wake alarm.
    FullWake,
}

/// Why the node left suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WakeCause {
    Motion,
    HealthCheck,
    /// The full-wake alarm could not be armed.
    AlarmFault,
}

/// The armed stage of a suspension and the alarm that ends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingWake {
    PreWake(AlarmHandle),
    FullWake(AlarmHandle),
}

impl PendingWake {
    pub fn alarm(self) -> AlarmHandle {
        match self {
            Self::PreWake(h) | Self::FullWake(h) => h,
        }
    }
}

/// Next periodic deadline.  A deadline already in the past is re-based on
/// `now` instead of replaying the missed periods.
pub fn next_deadline(prev: Instant, now: Instant, period_ms: u32) -> Instant {
    let next = prev + period_ms;
    if next <= now { now + period_ms } else { next }
}

pub struct PowerOrchestrator {
    config: NodeConfig,
    state: PowerState,
    pending: Option<PendingWake>,
    motion_requested: bool,
    health_requested: bool,
    alarm_fault: bool,
    inactivity: InactivityTimer,
    next_acquire: Instant,
}

impl PowerOrchestrator {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            config: *config,
            state: PowerState::Awake,
            pending: None,
            motion_requested: false,
            health_requested: false,
            alarm_fault: false,
            inactivity: InactivityTimer::new(config.no_movement_timeout_ms),
            next_acquire: Instant::ZERO,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn is_suspended(&self) -> bool {
        self.state != PowerState::Awake
    }

    pub fn pending_wake(&self) -> Option<PendingWake> {
        self.pending
    }

    pub fn inactivity(&self) -> &InactivityTimer {
        &self.inactivity
    }

    pub fn next_acquisition(&self) -> Instant {
        self.next_acquire
    }

    /// A wake request is waiting for the next [`step`](Self::step).
    pub fn has_pending_request(&self) -> bool {
        self.motion_requested || self.health_requested || self.alarm_fault
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Boot: bring up sensors, let the particulate sensor warm, pulse the
    /// indicator.  The first acquisition is due immediately.
    pub fn start(&mut self, board: &mut impl Board) {
        if let Err(e) = board.init_sensors() {
            warn!("power: sensor init failed ({}), continuing", e);
        }
        board.disarm_motion_interrupt();
        board.set_particulate_power(true);
        if self.config.sensor_warmup_ms > 0 {
            info!("power: sensor warm-up {} ms", self.config.sensor_warmup_ms);
            board.delay_ms(self.config.sensor_warmup_ms);
        }
        self.pulse_indicator(board);
        self.next_acquire = board.now();
        self.inactivity.reset();
        info!("power: awake");
    }

    // ── Event intake (from the run loop's queue drain) ───────

    pub fn on_motion_interrupt(&mut self) {
        if self.is_suspended() {
            self.motion_requested = true;
        } else {
            debug!("power: motion interrupt while awake ignored");
        }
    }

    /// The armed wake alarm fired.  Pre-wake powers the particulate sensor
    /// and arms the full-wake stage; full-wake requests the health check.
    pub fn on_wake_alarm(&mut self, board: &mut impl Board, sink: &mut impl EventSink) {
        match self.pending.take() {
            None => debug!("power: stale wake alarm ignored"),
            Some(PendingWake::PreWake(_)) => {
                board.set_particulate_power(true);
                let at = board.now() + self.config.full_wake_lead_ms;
                match board.schedule_at(at, AlarmTarget::Wake) {
                    Ok(h) => {
                        self.pending = Some(PendingWake::FullWake(h));
                        self.set_state(PowerState::FullWake, sink);
                    }
                    Err(e) => {
                        error!("power: full-wake alarm failed ({}), resuming", e);
                        self.alarm_fault = true;
                        sink.emit(&NodeEvent::SuspendAborted(e));
                    }
                }
            }
            Some(PendingWake::FullWake(_)) => {
                self.health_requested = true;
            }
        }
    }

    // ── Per-step orchestration ────────────────────────────────

    pub fn step(&mut self, board: &mut impl Board, store: &SampleStore, sink: &mut impl EventSink) {
        match self.state {
            PowerState::Awake => self.step_awake(board, store, sink),
            PowerState::PreWake | PowerState::FullWake => self.step_suspended(board, store, sink),
        }
    }

    fn step_awake(&mut self, board: &mut impl Board, store: &SampleStore, sink: &mut impl EventSink) {
        let now = board.now();
        let moving = board.is_moving();
        if self.inactivity.observe(moving, now) {
            info!(
                "power: no movement for {} ms, suspending",
                self.config.no_movement_timeout_ms
            );
            self.enter_suspension(board, sink);
            return;
        }
        if now >= self.next_acquire {
            self.acquire(board, store, sink);
            self.next_acquire = next_deadline(self.next_acquire, now, self.config.acquisition_period_ms);
        }
    }

    fn step_suspended(&mut self, board: &mut impl Board, store: &SampleStore, sink: &mut impl EventSink) {
        if self.motion_requested {
            self.resume(board, WakeCause::Motion, sink);
        } else if self.alarm_fault {
            self.resume(board, WakeCause::AlarmFault, sink);
        } else if self.health_requested {
            self.resume(board, WakeCause::HealthCheck, sink);
            self.acquire(board, store, sink);
            let verdict = run_health_check(board, &self.config.health);
            sink.emit(&NodeEvent::HealthChecked(verdict));
            if verdict.is_abnormal() {
                info!(
                    "power: abnormal air ({}/{}), staying awake",
                    verdict.exceeded, verdict.samples
                );
            } else {
                self.enter_suspension(board, sink);
            }
        }
    }

    /// Awake → PreWake.  Stays Awake if no wake alarm could be armed.
    fn enter_suspension(&mut self, board: &mut impl Board, sink: &mut impl EventSink) {
        self.inactivity.reset();
        board.set_particulate_power(false);

        let at = board.now() + self.config.pre_wake_lead_ms;
        let handle = match board.schedule_at(at, AlarmTarget::Wake) {
            Ok(h) => h,
            Err(e) => {
                error!("power: pre-wake alarm failed ({}), staying awake", e);
                board.set_particulate_power(true);
                sink.emit(&NodeEvent::SuspendAborted(e));
                return;
            }
        };

        board.arm_motion_interrupt();
        board.reduce_clocks();
        self.pending = Some(PendingWake::PreWake(handle));
        self.motion_requested = false;
        self.health_requested = false;
        self.alarm_fault = false;
        self.set_state(PowerState::PreWake, sink);
    }

    fn resume(&mut self, board: &mut impl Board, cause: WakeCause, sink: &mut impl EventSink) {
        self.motion_requested = false;
        self.health_requested = false;
        self.alarm_fault = false;
        if let Some(p) = self.pending.take() {
            board.cancel(p.alarm());
        }
        board.disarm_motion_interrupt();
        board.restore_clocks();
        board.delay_ms(self.config.clock_settle_ms);
        board.set_particulate_power(true);
        self.pulse_indicator(board);

        self.next_acquire = board.now() + self.config.resume_acquisition_lead_ms;
        self.inactivity.reset();
        self.set_state(PowerState::Awake, sink);
        sink.emit(&NodeEvent::Resumed(cause));
    }

    fn acquire(&mut self, board: &mut impl Board, store: &SampleStore, sink: &mut impl EventSink) {
        let env = board.read_environment();
        let pm = board.read_particulate();
        match (env, pm) {
            (Ok(env), Ok(pm)) => {
                let sample = SensorSample::fuse(&env, &pm);
                store.publish(sample);
                sink.emit(&NodeEvent::SampleAcquired(sample));
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("power: acquisition skipped ({})", e);
                sink.emit(&NodeEvent::AcquisitionSkipped(e));
            }
        }
    }

    fn pulse_indicator(&self, board: &mut (impl IndicatorPort + DelayNs)) {
        for _ in 0..self.config.resume_pulse_count {
            board.set_indicator(true);
            board.delay_ms(self.config.resume_pulse_ms);
            board.set_indicator(false);
            board.delay_ms(self.config.resume_pulse_ms);
        }
    }

    fn set_state(&mut self, to: PowerState, sink: &mut impl EventSink) {
        if self.state != to {
            let from = self.state;
            self.state = to;
            info!("power: {:?} -> {:?}", from, to);
            sink.emit(&NodeEvent::PowerChanged { from, to });
        }
    }
}
