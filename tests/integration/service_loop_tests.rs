//! End-to-end tests of `NodeService::run_once` with the orchestrator and
//! the dispatcher sharing one store and one event queue.

use std::rc::Rc;

use envnode::app::events::NodeEvent;
use envnode::app::ports::{ConnHandle, LinkEvent};
use envnode::app::service::NodeService;
use envnode::config::NodeConfig;
use envnode::events::EventQueue;
use envnode::link::ConnectionState;
use envnode::link::att::AttributeId;
use envnode::power::{PowerState, WakeCause};
use envnode::store::SampleStore;

use crate::mock_hw::{FakeBoard, LinkCall, RecordingLink, RecordingSink};

fn no_warmup() -> NodeConfig {
    NodeConfig { sensor_warmup_ms: 0, ..NodeConfig::default() }
}

fn cccd_enable() -> LinkEvent {
    LinkEvent::Write {
        attribute: AttributeId::SampleDataConfig,
        value: heapless::Vec::from_slice(&[0x01, 0x00]).expect("short write"),
    }
}

#[test]
fn still_node_sleeps_through_the_staged_wake_cycle() {
    let events = Rc::new(EventQueue::new());
    let mut board = FakeBoard::new(Rc::clone(&events));
    let mut link = RecordingLink::new();
    let mut sink = RecordingSink::new();
    let store = SampleStore::new();
    let mut svc = NodeService::new(no_warmup(), &store, "envnode-test");

    svc.start(&mut board, &mut sink);
    assert_eq!(sink.events.first(), Some(&NodeEvent::Started));
    assert_eq!(board.now_ms, 2_000);

    while svc.power_state() == PowerState::Awake {
        svc.run_once(&mut board, &mut link, &events, &mut sink);
        assert!(svc.iterations() < 10_000, "never suspended");
    }
    // Suspended at 602 s; the idle wait ran straight to the pre-wake alarm.
    assert_eq!(svc.power_state(), PowerState::PreWake);
    assert_eq!(board.waits, 1);
    assert_eq!(board.now_ms, 622_000);

    svc.run_once(&mut board, &mut link, &events, &mut sink);
    assert_eq!(svc.power_state(), PowerState::FullWake);
    assert!(board.particulate_powered);
    assert_eq!(board.now_ms, 637_000);

    // Resume (100 ms settle, 2 s pulses), acquire, 2 s of check spacing,
    // then back to sleep and straight to the next pre-wake alarm.
    svc.run_once(&mut board, &mut link, &events, &mut sink);
    assert_eq!(svc.power_state(), PowerState::PreWake);
    assert_eq!(sink.count(|e| *e == NodeEvent::Resumed(WakeCause::HealthCheck)), 1);
    assert_eq!(board.now_ms, 661_100);
    assert_eq!(board.waits, 3);
}

#[test]
fn motion_interrupt_wakes_the_loop() {
    let events = Rc::new(EventQueue::new());
    let mut board = FakeBoard::new(Rc::clone(&events));
    let mut link = RecordingLink::new();
    let mut sink = RecordingSink::new();
    let store = SampleStore::new();
    let config = NodeConfig { no_movement_timeout_ms: 5_000, ..no_warmup() };
    let mut svc = NodeService::new(config, &store, "envnode-test");
    svc.start(&mut board, &mut sink);

    while svc.power_state() == PowerState::Awake {
        svc.run_once(&mut board, &mut link, &events, &mut sink);
    }
    // The pre-wake alarm is already queued; motion is pushed after it.
    board.raise_motion();
    board.moving = true;
    svc.run_once(&mut board, &mut link, &events, &mut sink);

    assert_eq!(svc.power_state(), PowerState::Awake);
    assert_eq!(sink.count(|e| *e == NodeEvent::Resumed(WakeCause::Motion)), 1);
    assert!(!board.motion_armed);
    assert!(!board.clocks_reduced);
}

#[test]
fn connected_peer_receives_fresh_samples() {
    let events = Rc::new(EventQueue::new());
    let mut board = FakeBoard::new(Rc::clone(&events));
    let mut link = RecordingLink::new();
    let mut sink = RecordingSink::new();
    let store = SampleStore::new();
    let mut svc = NodeService::new(no_warmup(), &store, "envnode-test");
    svc.start(&mut board, &mut sink);
    board.moving = true;

    link.inject(LinkEvent::StackReady);
    link.inject(LinkEvent::Connected(ConnHandle(1)));
    link.inject(cccd_enable());

    while board.now_ms < 13_000 {
        svc.run_once(&mut board, &mut link, &events, &mut sink);
    }

    assert_eq!(svc.link_state(), ConnectionState::Connected);
    assert_eq!(link.count(|c| matches!(c, LinkCall::RequestParams(_))), 1);
    // Acquisitions at 2 s and 9 s, delivered by the 3 s and 12 s ticks.
    let sent = link.notifications();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent.last(), Some(&store.latest().to_le_bytes().to_vec()));
    assert!(!store.is_dirty());
}

#[test]
fn link_shutdown_and_restart() {
    let events = Rc::new(EventQueue::new());
    let mut board = FakeBoard::new(Rc::clone(&events));
    let mut link = RecordingLink::new();
    let mut sink = RecordingSink::new();
    let store = SampleStore::new();
    let mut svc = NodeService::new(no_warmup(), &store, "envnode-test");
    svc.start(&mut board, &mut sink);
    board.moving = true;

    link.inject(LinkEvent::StackReady);
    link.inject(LinkEvent::Connected(ConnHandle(3)));
    svc.run_once(&mut board, &mut link, &events, &mut sink);

    svc.shutdown_link(&mut board, &mut link, &mut sink);
    assert!(link.calls.contains(&LinkCall::Disconnect(ConnHandle(3))));
    assert!(!svc.dispatcher().is_running());
    assert_eq!(svc.link_state(), ConnectionState::Advertising);

    svc.restart_link(&mut board, &mut link, &mut sink);
    assert!(svc.dispatcher().is_running());
    assert_eq!(link.count(|c| *c == LinkCall::StartAdvertising), 2);
}
