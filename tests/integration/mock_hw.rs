//! Mock board, link and sink for integration tests.
//!
//! `FakeBoard` runs on a virtual millisecond clock: delays advance it,
//! armed alarms fire into the shared [`EventQueue`] once it passes their
//! deadline, and `wait_for_interrupt` jumps straight to the next deadline.

use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use envnode::app::events::NodeEvent;
use envnode::app::ports::{
    AdvertisingParams, AlarmHandle, AlarmTarget, ClockPort, ConnHandle, ConnParams, EventSink,
    IndicatorPort, Instant, LinkEvent, LinkPort, MotionPort, PowerPort, SensorPort,
};
use envnode::error::{AlarmError, LinkError, SensorError};
use envnode::events::{Event, EventQueue};
use envnode::link::att::AttributeId;
use envnode::sensors::{EnvReading, PmReading};

const TARGETS: [AlarmTarget; 3] = [AlarmTarget::Wake, AlarmTarget::Dispatch, AlarmTarget::Blink];

fn slot(target: AlarmTarget) -> usize {
    match target {
        AlarmTarget::Wake => 0,
        AlarmTarget::Dispatch => 1,
        AlarmTarget::Blink => 2,
    }
}

fn event_for(target: AlarmTarget) -> Event {
    match target {
        AlarmTarget::Wake => Event::WakeAlarm,
        AlarmTarget::Dispatch => Event::DispatchTimer,
        AlarmTarget::Blink => Event::BlinkTimer,
    }
}

pub fn clean_env() -> EnvReading {
    EnvReading {
        temperature_c: 21.5,
        humidity_pct: 40.0,
        pressure_pa: 101_325.0,
        gas_resistance_kohm: 120.0,
        voc_ppm: 0.1,
    }
}

pub fn pm(pm2_5_env: u16) -> PmReading {
    PmReading { pm2_5_env, pm2_5_standard: pm2_5_env, ..PmReading::default() }
}

// ── FakeBoard ─────────────────────────────────────────────────

pub struct FakeBoard {
    pub now_ms: u64,
    events: Rc<EventQueue>,
    alarms: [Option<(u64, u32)>; 3],
    next_seq: u32,

    pub env: Result<EnvReading, SensorError>,
    pub particulate: Result<PmReading, SensorError>,
    pub env_reads: usize,
    pub moving: bool,

    pub particulate_powered: bool,
    pub motion_armed: bool,
    pub clocks_reduced: bool,
    pub indicator: bool,
    pub indicator_pulses: usize,
    pub toggles: usize,
    pub waits: usize,
    pub cancels: usize,

    /// Targets whose `schedule_at` fails.
    pub refuse: HashSet<AlarmTarget>,
}

#[allow(dead_code)]
impl FakeBoard {
    pub fn new(events: Rc<EventQueue>) -> Self {
        Self {
            now_ms: 0,
            events,
            alarms: [None; 3],
            next_seq: 1,
            env: Ok(clean_env()),
            particulate: Ok(pm(5)),
            env_reads: 0,
            moving: false,
            particulate_powered: false,
            motion_armed: false,
            clocks_reduced: false,
            indicator: false,
            indicator_pulses: 0,
            toggles: 0,
            waits: 0,
            cancels: 0,
            refuse: HashSet::new(),
        }
    }

    pub fn deadline(&self, target: AlarmTarget) -> Option<u64> {
        self.alarms[slot(target)].map(|(at, _)| at)
    }

    /// Move the clock forward, firing every alarm that comes due.
    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
        self.fire_due();
    }

    /// Jump to `target`'s deadline and fire it (plus anything due earlier).
    pub fn fire(&mut self, target: AlarmTarget) {
        if let Some(at) = self.deadline(target) {
            self.now_ms = self.now_ms.max(at);
            self.fire_due();
        }
    }

    /// Latch a motion interrupt the way the GPIO ISR would.
    pub fn raise_motion(&mut self) {
        assert!(self.motion_armed, "motion interrupt raised while masked");
        self.events.push(Event::MotionInterrupt);
    }

    fn fire_due(&mut self) {
        for target in TARGETS {
            let i = slot(target);
            if matches!(self.alarms[i], Some((at, _)) if at <= self.now_ms) {
                self.alarms[i] = None;
                self.events.push(event_for(target));
            }
        }
    }
}

impl SensorPort for FakeBoard {
    fn init_sensors(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn read_environment(&mut self) -> Result<EnvReading, SensorError> {
        self.env_reads += 1;
        self.env
    }

    fn read_particulate(&mut self) -> Result<PmReading, SensorError> {
        self.particulate
    }

    fn set_particulate_power(&mut self, on: bool) {
        self.particulate_powered = on;
    }
}

impl MotionPort for FakeBoard {
    fn is_moving(&mut self) -> bool {
        self.moving
    }

    fn arm_motion_interrupt(&mut self) {
        self.motion_armed = true;
    }

    fn disarm_motion_interrupt(&mut self) {
        self.motion_armed = false;
    }
}

impl PowerPort for FakeBoard {
    fn reduce_clocks(&mut self) {
        self.clocks_reduced = true;
    }

    fn restore_clocks(&mut self) {
        self.clocks_reduced = false;
    }

    fn wait_for_interrupt(&mut self) {
        self.waits += 1;
        match self.alarms.iter().flatten().map(|(at, _)| *at).min() {
            Some(at) => {
                self.now_ms = self.now_ms.max(at);
                self.fire_due();
            }
            None => self.advance(1_000),
        }
    }
}

impl ClockPort for FakeBoard {
    fn now(&self) -> Instant {
        Instant::from_millis(self.now_ms)
    }

    fn schedule_at(&mut self, at: Instant, target: AlarmTarget) -> Result<AlarmHandle, AlarmError> {
        if self.refuse.contains(&target) {
            return Err(AlarmError::Platform(-1));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.alarms[slot(target)] = Some((at.as_millis(), seq));
        Ok(AlarmHandle { target, seq })
    }

    fn cancel(&mut self, handle: AlarmHandle) {
        let i = slot(handle.target);
        if matches!(self.alarms[i], Some((_, seq)) if seq == handle.seq) {
            self.alarms[i] = None;
            self.cancels += 1;
        }
    }
}

impl IndicatorPort for FakeBoard {
    fn set_indicator(&mut self, on: bool) {
        if on && !self.indicator {
            self.indicator_pulses += 1;
        }
        self.indicator = on;
    }

    fn toggle_indicator(&mut self) {
        self.toggles += 1;
        self.indicator = !self.indicator;
    }
}

impl DelayNs for FakeBoard {
    fn delay_ns(&mut self, ns: u32) {
        self.advance(u64::from(ns.div_ceil(1_000_000)));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(u64::from(ms));
    }
}

// ── RecordingLink ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum LinkCall {
    StartAdvertising,
    StopAdvertising,
    RequestParams(ConnHandle),
    Notify(ConnHandle, Vec<u8>),
    Disconnect(ConnHandle),
}

#[derive(Default)]
pub struct RecordingLink {
    pub calls: Vec<LinkCall>,
    pub inbound: VecDeque<LinkEvent>,
    pub advertising: bool,
    /// Every notify fails with this while set.
    pub notify_error: Option<LinkError>,
    /// Every parameter request fails with this while set.
    pub params_error: Option<LinkError>,
}

#[allow(dead_code)]
impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, event: LinkEvent) {
        self.inbound.push_back(event);
    }

    pub fn count(&self, pred: impl Fn(&LinkCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn notifications(&self) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                LinkCall::Notify(_, bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }
}

impl LinkPort for RecordingLink {
    fn start_advertising(&mut self, _params: &AdvertisingParams) -> Result<(), LinkError> {
        self.calls.push(LinkCall::StartAdvertising);
        self.advertising = true;
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), LinkError> {
        self.calls.push(LinkCall::StopAdvertising);
        self.advertising = false;
        Ok(())
    }

    fn request_conn_params(&mut self, handle: ConnHandle, _params: &ConnParams) -> Result<(), LinkError> {
        self.calls.push(LinkCall::RequestParams(handle));
        self.params_error.map_or(Ok(()), Err)
    }

    fn notify(&mut self, handle: ConnHandle, attribute: AttributeId, value: &[u8]) -> Result<(), LinkError> {
        assert_eq!(attribute, AttributeId::SampleData);
        if let Some(e) = self.notify_error {
            return Err(e);
        }
        self.calls.push(LinkCall::Notify(handle, value.to_vec()));
        Ok(())
    }

    fn disconnect(&mut self, handle: ConnHandle) -> Result<(), LinkError> {
        self.calls.push(LinkCall::Disconnect(handle));
        Ok(())
    }

    fn poll_event(&mut self) -> Option<LinkEvent> {
        self.inbound.pop_front()
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<NodeEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&NodeEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &NodeEvent) {
        self.events.push(event.clone());
    }
}
