//! Integration tests for the power orchestrator's suspend / staged wake /
//! health check cycle against the virtual-clock board.

use std::rc::Rc;

use envnode::app::events::NodeEvent;
use envnode::app::ports::{AlarmTarget, ClockPort};
use envnode::config::NodeConfig;
use envnode::error::{AlarmError, SensorError};
use envnode::events::{Event, EventQueue};
use envnode::power::{PowerOrchestrator, PowerState, WakeCause};
use envnode::store::SampleStore;

use crate::mock_hw::{FakeBoard, RecordingSink, pm};

fn quick_config() -> NodeConfig {
    NodeConfig { no_movement_timeout_ms: 10_000, sensor_warmup_ms: 0, ..NodeConfig::default() }
}

struct Rig {
    orch: PowerOrchestrator,
    board: FakeBoard,
    sink: RecordingSink,
    events: Rc<EventQueue>,
    store: SampleStore,
}

impl Rig {
    fn boot(config: NodeConfig) -> Self {
        let events = Rc::new(EventQueue::new());
        let mut board = FakeBoard::new(Rc::clone(&events));
        let mut orch = PowerOrchestrator::new(&config);
        orch.start(&mut board);
        Self { orch, board, sink: RecordingSink::new(), events, store: SampleStore::new() }
    }

    fn step(&mut self) {
        self.orch.step(&mut self.board, &self.store, &mut self.sink);
    }

    /// Step every 100 ms until the node suspends.
    fn idle_until_suspended(&mut self) {
        for _ in 0..10_000 {
            self.step();
            if self.orch.is_suspended() {
                return;
            }
            self.board.advance(100);
        }
        panic!("node never suspended");
    }

    /// Fire the armed wake alarm and hand it to the orchestrator.
    fn fire_wake(&mut self) {
        self.board.fire(AlarmTarget::Wake);
        assert_eq!(self.events.pop(), Some(Event::WakeAlarm));
        self.orch.on_wake_alarm(&mut self.board, &mut self.sink);
    }

    fn resumed(&self, cause: WakeCause) -> usize {
        self.sink.count(|e| *e == NodeEvent::Resumed(cause))
    }
}

// ── Boot and awake cadence ───────────────────────────────────

#[test]
fn boot_warms_sensor_pulses_and_acquires_immediately() {
    let mut rig = Rig::boot(NodeConfig::default());

    // 180 s warm-up, then 5 × (200 on + 200 off).
    assert_eq!(rig.board.now_ms, 182_000);
    assert_eq!(rig.board.indicator_pulses, 5);
    assert!(!rig.board.indicator);
    assert!(rig.board.particulate_powered);
    assert!(!rig.board.motion_armed);

    rig.step();
    assert!(rig.store.is_dirty());
    assert_eq!(rig.sink.count(|e| matches!(e, NodeEvent::SampleAcquired(_))), 1);
    assert_eq!(rig.orch.next_acquisition().as_millis(), 189_000);
}

#[test]
fn acquires_every_period_while_moving() {
    let mut rig = Rig::boot(quick_config());
    rig.board.moving = true;

    // Steps at 2.0 s .. 32.0 s inclusive.
    for _ in 0..=300 {
        rig.step();
        rig.board.advance(100);
    }

    assert_eq!(rig.orch.state(), PowerState::Awake);
    assert_eq!(rig.sink.count(|e| matches!(e, NodeEvent::SampleAcquired(_))), 5);
}

#[test]
fn failed_acquisition_leaves_store_untouched() {
    let mut rig = Rig::boot(quick_config());
    rig.board.moving = true;
    rig.board.env = Err(SensorError::Bus);

    rig.step();

    assert!(!rig.store.is_dirty());
    assert_eq!(
        rig.sink.count(|e| *e == NodeEvent::AcquisitionSkipped(SensorError::Bus)),
        1
    );
}

#[test]
fn movement_restarts_the_stillness_window() {
    let mut rig = Rig::boot(quick_config());

    // 9 s still, one moving sample, then another 9 s still.
    for _ in 0..90 {
        rig.step();
        rig.board.advance(100);
    }
    rig.board.moving = true;
    rig.step();
    rig.board.advance(100);
    rig.board.moving = false;
    for _ in 0..90 {
        rig.step();
        rig.board.advance(100);
    }
    assert_eq!(rig.orch.state(), PowerState::Awake);

    rig.idle_until_suspended();
    assert_eq!(rig.orch.state(), PowerState::PreWake);
}

// ── Suspension and staged wake ───────────────────────────────

#[test]
fn stillness_timeout_enters_pre_wake() {
    let mut rig = Rig::boot(quick_config());
    rig.idle_until_suspended();

    // Timer started at the first step (2 s) and fires 10 s later.
    assert_eq!(rig.board.now_ms, 12_000);
    assert_eq!(rig.orch.state(), PowerState::PreWake);
    assert!(!rig.board.particulate_powered);
    assert!(rig.board.motion_armed);
    assert!(rig.board.clocks_reduced);
    assert_eq!(rig.board.deadline(AlarmTarget::Wake), Some(32_000));
    assert!(rig.sink.events.contains(&NodeEvent::PowerChanged {
        from: PowerState::Awake,
        to: PowerState::PreWake,
    }));
}

#[test]
fn pre_wake_alarm_powers_sensor_and_arms_full_wake() {
    let mut rig = Rig::boot(quick_config());
    rig.idle_until_suspended();

    rig.fire_wake();

    assert_eq!(rig.orch.state(), PowerState::FullWake);
    assert!(rig.board.particulate_powered);
    assert!(rig.board.clocks_reduced, "still suspended during warm-up");
    assert_eq!(rig.board.deadline(AlarmTarget::Wake), Some(32_000 + 15_000));
    assert!(!rig.orch.has_pending_request());
}

#[test]
fn normal_health_check_returns_to_pre_wake() {
    let mut rig = Rig::boot(quick_config());
    rig.idle_until_suspended();
    rig.fire_wake();
    rig.fire_wake();
    assert!(rig.orch.has_pending_request());
    let reads_before = rig.board.env_reads;

    rig.step();

    assert_eq!(rig.resumed(WakeCause::HealthCheck), 1);
    // One acquisition plus five check samples.
    assert_eq!(rig.board.env_reads - reads_before, 6);
    let verdict = rig.sink.events.iter().find_map(|e| match e {
        NodeEvent::HealthChecked(v) => Some(*v),
        _ => None,
    });
    let verdict = verdict.expect("health verdict emitted");
    assert_eq!((verdict.exceeded, verdict.samples), (0, 5));
    assert!(!verdict.is_abnormal());

    assert_eq!(rig.orch.state(), PowerState::PreWake);
    assert!(!rig.board.particulate_powered);
    assert!(rig.board.motion_armed);
    assert_eq!(
        rig.board.deadline(AlarmTarget::Wake),
        Some(rig.board.now().as_millis() + 20_000)
    );
    assert!(rig.store.is_dirty(), "the wake acquisition was published");
}

#[test]
fn abnormal_particulates_keep_node_awake() {
    let mut rig = Rig::boot(quick_config());
    rig.idle_until_suspended();
    rig.fire_wake();
    rig.board.particulate = Ok(pm(40));
    rig.fire_wake();

    rig.step();

    assert_eq!(rig.orch.state(), PowerState::Awake);
    assert!(rig.board.particulate_powered);
    assert!(!rig.board.motion_armed);
    assert!(!rig.board.clocks_reduced);
    assert_eq!(rig.board.deadline(AlarmTarget::Wake), None);
    assert!(rig.orch.next_acquisition() > rig.board.now());
    assert_eq!(
        rig.sink.count(|e| matches!(e, NodeEvent::HealthChecked(v) if v.exceeded == 5)),
        1
    );
}

#[test]
fn elevated_voc_alone_is_abnormal() {
    let mut rig = Rig::boot(quick_config());
    rig.idle_until_suspended();
    rig.fire_wake();
    if let Ok(env) = rig.board.env.as_mut() {
        env.voc_ppm = 0.9;
    }
    rig.fire_wake();

    rig.step();

    assert_eq!(rig.orch.state(), PowerState::Awake);
}

#[test]
fn failed_check_reads_count_as_normal() {
    let mut rig = Rig::boot(quick_config());
    rig.idle_until_suspended();
    rig.fire_wake();
    rig.board.particulate = Err(SensorError::Checksum);
    rig.fire_wake();

    rig.step();

    assert_eq!(
        rig.sink.count(|e| matches!(e, NodeEvent::HealthChecked(v) if v.failed_reads == 5 && v.exceeded == 0)),
        1
    );
    assert_eq!(rig.orch.state(), PowerState::PreWake);
}

// ── Motion wake ──────────────────────────────────────────────

#[test]
fn motion_during_pre_wake_resumes_and_cancels_alarm() {
    let mut rig = Rig::boot(quick_config());
    rig.idle_until_suspended();
    let pulses = rig.board.indicator_pulses;

    rig.board.raise_motion();
    assert_eq!(rig.events.pop(), Some(Event::MotionInterrupt));
    rig.orch.on_motion_interrupt();
    rig.step();

    assert_eq!(rig.orch.state(), PowerState::Awake);
    assert_eq!(rig.resumed(WakeCause::Motion), 1);
    assert_eq!(rig.board.deadline(AlarmTarget::Wake), None);
    assert_eq!(rig.board.cancels, 1);
    assert!(!rig.board.motion_armed);
    assert!(!rig.board.clocks_reduced);
    assert!(rig.board.particulate_powered);
    assert_eq!(rig.board.indicator_pulses - pulses, 5);
    assert_eq!(rig.orch.next_acquisition(), rig.board.now() + 7_000);
    assert!(!rig.orch.inactivity().is_running());
}

#[test]
fn motion_beats_a_pending_health_check() {
    let mut rig = Rig::boot(quick_config());
    rig.idle_until_suspended();
    rig.fire_wake();
    rig.fire_wake();
    rig.orch.on_motion_interrupt();

    rig.step();

    assert_eq!(rig.resumed(WakeCause::Motion), 1);
    assert_eq!(rig.resumed(WakeCause::HealthCheck), 0);
    assert_eq!(rig.sink.count(|e| matches!(e, NodeEvent::HealthChecked(_))), 0);
    assert_eq!(rig.orch.state(), PowerState::Awake);
}

#[test]
fn wake_alarm_after_motion_resume_is_ignored() {
    let mut rig = Rig::boot(quick_config());
    rig.idle_until_suspended();
    rig.orch.on_motion_interrupt();
    rig.step();
    let changes = rig.sink.count(|e| matches!(e, NodeEvent::PowerChanged { .. }));

    rig.orch.on_wake_alarm(&mut rig.board, &mut rig.sink);
    rig.step();

    assert_eq!(rig.orch.state(), PowerState::Awake);
    assert_eq!(rig.board.deadline(AlarmTarget::Wake), None);
    assert_eq!(rig.sink.count(|e| matches!(e, NodeEvent::PowerChanged { .. })), changes);
}

// ── Alarm faults ─────────────────────────────────────────────

#[test]
fn pre_wake_arm_failure_keeps_node_awake() {
    let mut rig = Rig::boot(quick_config());
    rig.board.refuse.insert(AlarmTarget::Wake);

    for _ in 0..=100 {
        rig.step();
        rig.board.advance(100);
    }

    assert_eq!(rig.orch.state(), PowerState::Awake);
    assert!(rig.board.particulate_powered);
    assert!(!rig.board.motion_armed);
    assert!(!rig.board.clocks_reduced);
    assert_eq!(
        rig.sink.count(|e| *e == NodeEvent::SuspendAborted(AlarmError::Platform(-1))),
        1
    );
}

#[test]
fn full_wake_arm_failure_resumes_with_alarm_fault() {
    let mut rig = Rig::boot(quick_config());
    rig.idle_until_suspended();
    rig.board.refuse.insert(AlarmTarget::Wake);

    rig.fire_wake();
    assert!(rig.orch.has_pending_request());
    rig.step();

    assert_eq!(rig.resumed(WakeCause::AlarmFault), 1);
    assert_eq!(rig.orch.state(), PowerState::Awake);
    assert!(!rig.board.motion_armed);
    assert!(rig.board.particulate_powered);
}

#[test]
fn re_suspend_arm_failure_after_normal_check_stays_awake() {
    let mut rig = Rig::boot(quick_config());
    rig.idle_until_suspended();
    rig.fire_wake();
    rig.fire_wake();
    rig.board.refuse.insert(AlarmTarget::Wake);

    rig.step();

    assert_eq!(rig.sink.count(|e| matches!(e, NodeEvent::HealthChecked(v) if !v.is_abnormal())), 1);
    assert_eq!(
        rig.sink.count(|e| *e == NodeEvent::SuspendAborted(AlarmError::Platform(-1))),
        1
    );
    assert_eq!(rig.orch.state(), PowerState::Awake);
    assert!(rig.board.particulate_powered);
    assert!(!rig.board.motion_armed);
    assert!(!rig.board.clocks_reduced);
}
