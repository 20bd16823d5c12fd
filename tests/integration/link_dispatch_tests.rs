//! Integration tests for the connectivity dispatcher: advertising, the
//! per-connection dispatch timer, notification gating and teardown.

use std::rc::Rc;

use envnode::app::events::NodeEvent;
use envnode::app::ports::{AlarmTarget, ConnHandle, ConnParamsReport, Instant, LinkEvent};
use envnode::config::LinkConfig;
use envnode::error::{AttError, LinkError};
use envnode::events::{Event, EventQueue};
use envnode::link::att::AttributeId;
use envnode::link::{ConnectionState, Dispatcher, SendOutcome};
use envnode::store::{SampleStore, SensorSample};

use crate::mock_hw::{FakeBoard, LinkCall, RecordingLink, RecordingSink};

const PEER: ConnHandle = ConnHandle(7);

fn sample(seed: f32) -> SensorSample {
    SensorSample {
        temperature: seed,
        humidity: seed * 2.0,
        pressure: 100_000.0 + seed,
        gas_resistance: 50.0,
        voc_ppm: 0.2,
        pm25: 8.0,
    }
}

struct Rig {
    dispatcher: Dispatcher,
    board: FakeBoard,
    link: RecordingLink,
    sink: RecordingSink,
    events: Rc<EventQueue>,
    store: SampleStore,
}

impl Rig {
    /// Stack ready at t = 10 s, advertising.
    fn ready() -> Self {
        let events = Rc::new(EventQueue::new());
        let mut board = FakeBoard::new(Rc::clone(&events));
        board.now_ms = 10_000;
        let mut rig = Self {
            dispatcher: Dispatcher::new(&LinkConfig::default(), "envnode-test"),
            board,
            link: RecordingLink::new(),
            sink: RecordingSink::new(),
            events,
            store: SampleStore::new(),
        };
        rig.deliver(LinkEvent::StackReady);
        rig
    }

    fn connected() -> Self {
        let mut rig = Self::ready();
        rig.deliver(LinkEvent::Connected(PEER));
        rig
    }

    fn subscribed() -> Self {
        let mut rig = Self::connected();
        rig.write_cccd(&[0x01, 0x00]);
        rig
    }

    fn deliver(&mut self, event: LinkEvent) {
        self.dispatcher
            .handle_link_event(event, &mut self.link, &mut self.board, &self.store, &mut self.sink);
    }

    fn write_cccd(&mut self, value: &[u8]) {
        let value = heapless::Vec::from_slice(value).expect("short write");
        self.deliver(LinkEvent::Write { attribute: AttributeId::SampleDataConfig, value });
    }

    /// Fire the dispatch timer and hand the tick to the dispatcher.
    fn tick(&mut self) -> Option<SendOutcome> {
        self.board.fire(AlarmTarget::Dispatch);
        assert_eq!(self.events.pop(), Some(Event::DispatchTimer));
        self.dispatcher
            .on_dispatch_timer(&mut self.link, &mut self.board, &self.store, &mut self.sink)
    }

    fn adv_starts(&self) -> usize {
        self.link.count(|c| *c == LinkCall::StartAdvertising)
    }

    fn param_requests(&self) -> usize {
        self.link.count(|c| matches!(c, LinkCall::RequestParams(_)))
    }
}

// ── Advertising ──────────────────────────────────────────────

#[test]
fn stack_ready_starts_advertising_and_blinking() {
    let mut rig = Rig::ready();

    assert!(rig.dispatcher.is_running());
    assert_eq!(rig.dispatcher.state(), ConnectionState::Advertising);
    assert_eq!(rig.adv_starts(), 1);
    assert_eq!(&rig.dispatcher.advertising_params().payload[..3], &[0x02, 0x01, 0x06]);
    assert_eq!(rig.board.deadline(AlarmTarget::Blink), Some(10_500));

    rig.board.fire(AlarmTarget::Blink);
    assert_eq!(rig.events.pop(), Some(Event::BlinkTimer));
    rig.dispatcher.on_blink_timer(&mut rig.board);

    assert_eq!(rig.board.toggles, 1);
    assert!(rig.board.indicator);
    assert_eq!(rig.board.deadline(AlarmTarget::Blink), Some(11_000));
}

#[test]
fn second_start_is_a_no_op() {
    let mut rig = Rig::ready();
    rig.dispatcher.start(&mut rig.link, &mut rig.board, &mut rig.sink);
    assert_eq!(rig.adv_starts(), 1);
}

// ── Connection setup ─────────────────────────────────────────

#[test]
fn connect_stops_blink_negotiates_and_arms_first_dispatch() {
    let mut rig = Rig::connected();

    assert_eq!(rig.dispatcher.state(), ConnectionState::Connected);
    assert_eq!(rig.dispatcher.peer(), Some(PEER));
    assert!(!rig.board.indicator);
    assert_eq!(rig.board.deadline(AlarmTarget::Blink), None);
    assert_eq!(rig.link.calls.last(), Some(&LinkCall::RequestParams(PEER)));
    assert!(rig.dispatcher.params_negotiated());
    assert_eq!(rig.board.deadline(AlarmTarget::Dispatch), Some(11_000));
    assert_eq!(rig.sink.count(|e| *e == NodeEvent::PeerConnected(PEER)), 1);
}

#[test]
fn blink_tick_racing_a_connect_is_dropped() {
    let mut rig = Rig::connected();
    rig.dispatcher.on_blink_timer(&mut rig.board);
    assert_eq!(rig.board.toggles, 0);
    assert_eq!(rig.board.deadline(AlarmTarget::Blink), None);
}

#[test]
fn parameters_are_negotiated_once_per_connection() {
    let mut rig = Rig::subscribed();
    for _ in 0..4 {
        rig.tick();
    }
    assert_eq!(rig.param_requests(), 1);
}

#[test]
fn rejected_parameter_request_is_retried_on_each_tick() {
    let mut rig = Rig::ready();
    rig.link.params_error = Some(LinkError::Rejected(4));
    rig.deliver(LinkEvent::Connected(PEER));
    assert!(!rig.dispatcher.params_negotiated());
    assert_eq!(rig.param_requests(), 1);

    rig.tick();
    assert_eq!(rig.param_requests(), 2);

    rig.link.params_error = None;
    rig.tick();
    rig.tick();
    assert_eq!(rig.param_requests(), 3);
    assert!(rig.dispatcher.params_negotiated());
}

#[test]
fn controller_update_is_reported() {
    let mut rig = Rig::connected();
    let report = ConnParamsReport { interval: 12, latency: 0, supervision_timeout: 50 };
    rig.deliver(LinkEvent::ParamsUpdated(report));
    assert_eq!(rig.sink.count(|e| *e == NodeEvent::ConnParamsUpdated(report)), 1);
    assert!(rig.dispatcher.params_negotiated());
}

// ── Dispatch gating ──────────────────────────────────────────

#[test]
fn nothing_is_sent_until_the_peer_subscribes() {
    let mut rig = Rig::connected();
    rig.store.publish(sample(1.0));

    assert_eq!(rig.tick(), Some(SendOutcome::NotSubscribed));
    assert!(rig.link.notifications().is_empty());
    assert!(rig.store.is_dirty());
    assert_eq!(rig.board.deadline(AlarmTarget::Dispatch), Some(14_000));

    rig.write_cccd(&[0x01, 0x00]);
    assert!(rig.dispatcher.notifications_enabled());
    assert_eq!(rig.tick(), Some(SendOutcome::Sent));
    assert_eq!(rig.link.notifications(), vec![sample(1.0).to_le_bytes().to_vec()]);
    assert!(!rig.store.is_dirty());
    assert_eq!(rig.store.last_send(), Instant::from_millis(14_000));

    assert_eq!(rig.tick(), Some(SendOutcome::NoNewData));
    assert_eq!(rig.link.notifications().len(), 1);
}

#[test]
fn sends_are_spaced_by_the_minimum_interval() {
    let mut rig = Rig::subscribed();
    rig.store.publish(sample(1.0));
    assert_eq!(rig.tick(), Some(SendOutcome::Sent));
    let sent_at = rig.store.last_send();

    rig.store.publish(sample(2.0));
    let early = rig.dispatcher.try_send(&mut rig.link, sent_at + 2_899, &rig.store, &mut rig.sink);
    assert_eq!(early, SendOutcome::TooSoon);
    assert!(rig.store.is_dirty());

    let on_time = rig.dispatcher.try_send(&mut rig.link, sent_at + 2_900, &rig.store, &mut rig.sink);
    assert_eq!(on_time, SendOutcome::Sent);
    assert_eq!(rig.link.notifications().len(), 2);
}

#[test]
fn failed_notify_keeps_sample_for_next_tick() {
    let mut rig = Rig::subscribed();
    rig.store.publish(sample(3.0));
    rig.link.notify_error = Some(LinkError::Congested);

    assert_eq!(rig.tick(), Some(SendOutcome::Failed(LinkError::Congested)));
    assert!(rig.store.is_dirty());
    assert!(rig.dispatcher.dispatch_armed());
    assert_eq!(rig.sink.count(|e| *e == NodeEvent::LinkFailed(LinkError::Congested)), 1);

    rig.link.notify_error = None;
    assert_eq!(rig.tick(), Some(SendOutcome::Sent));
    assert!(!rig.store.is_dirty());
}

#[test]
fn unsubscribe_stops_sending() {
    let mut rig = Rig::subscribed();
    rig.write_cccd(&[0x00, 0x00]);
    rig.store.publish(sample(4.0));

    assert_eq!(rig.tick(), Some(SendOutcome::NotSubscribed));
    assert_eq!(rig.sink.count(|e| *e == NodeEvent::NotificationsChanged(false)), 1);
}

// ── Teardown ─────────────────────────────────────────────────

#[test]
fn disconnect_drops_subscription_and_pending_sample() {
    let mut rig = Rig::subscribed();
    rig.store.publish(sample(5.0));

    rig.deliver(LinkEvent::Disconnected);

    assert_eq!(rig.dispatcher.state(), ConnectionState::Advertising);
    assert_eq!(rig.dispatcher.peer(), None);
    assert!(!rig.dispatcher.notifications_enabled());
    assert!(!rig.dispatcher.params_negotiated());
    assert!(!rig.store.is_dirty());
    assert_eq!(rig.store.latest(), sample(5.0));
    assert_eq!(rig.board.deadline(AlarmTarget::Dispatch), None);
    assert_eq!(rig.adv_starts(), 2);
    assert!(rig.board.deadline(AlarmTarget::Blink).is_some());

    // A tick that was already in flight is discarded.
    let outcome = rig
        .dispatcher
        .on_dispatch_timer(&mut rig.link, &mut rig.board, &rig.store, &mut rig.sink);
    assert_eq!(outcome, None);
}

#[test]
fn reconnect_negotiates_again() {
    let mut rig = Rig::connected();
    rig.deliver(LinkEvent::Disconnected);
    rig.deliver(LinkEvent::Connected(ConnHandle(8)));

    assert_eq!(rig.param_requests(), 2);
    assert_eq!(rig.link.calls.last(), Some(&LinkCall::RequestParams(ConnHandle(8))));
    assert!(rig.dispatcher.dispatch_armed());
}

#[test]
fn tick_from_previous_connection_does_not_drive_the_new_one() {
    let mut rig = Rig::subscribed();
    rig.store.publish(sample(3.0));

    // Connection 1's tick is queued before the link events are drained.
    rig.board.fire(AlarmTarget::Dispatch);
    assert_eq!(rig.board.now_ms, 11_000);
    rig.deliver(LinkEvent::Disconnected);
    rig.deliver(LinkEvent::Connected(ConnHandle(8)));
    rig.write_cccd(&[0x01, 0x00]);
    rig.store.publish(sample(4.0));
    assert_eq!(rig.board.deadline(AlarmTarget::Dispatch), Some(12_000));

    assert_eq!(rig.events.pop(), Some(Event::DispatchTimer));
    let outcome = rig
        .dispatcher
        .on_dispatch_timer(&mut rig.link, &mut rig.board, &rig.store, &mut rig.sink);

    assert_eq!(outcome, None);
    assert!(rig.link.notifications().is_empty());
    assert_eq!(rig.board.deadline(AlarmTarget::Dispatch), Some(12_000));
    assert!(rig.dispatcher.dispatch_armed());

    // The new connection's own first tick still lands on schedule.
    assert_eq!(rig.tick(), Some(SendOutcome::Sent));
    assert_eq!(rig.board.now_ms, 12_000);
    assert_eq!(rig.link.notifications(), vec![sample(4.0).to_le_bytes().to_vec()]);
}

#[test]
fn early_blink_tick_keeps_the_current_arming() {
    let mut rig = Rig::ready();
    rig.deliver(LinkEvent::Connected(PEER));
    rig.deliver(LinkEvent::Disconnected);
    let due = rig.board.deadline(AlarmTarget::Blink);
    assert_eq!(due, Some(10_500));

    rig.dispatcher.on_blink_timer(&mut rig.board);

    assert_eq!(rig.board.toggles, 0);
    assert_eq!(rig.board.deadline(AlarmTarget::Blink), due);
    rig.board.fire(AlarmTarget::Blink);
    assert_eq!(rig.events.pop(), Some(Event::BlinkTimer));
    rig.dispatcher.on_blink_timer(&mut rig.board);
    assert_eq!(rig.board.toggles, 1);
}

#[test]
fn shutdown_disconnects_and_stays_quiet_until_started() {
    let mut rig = Rig::subscribed();

    rig.dispatcher.shutdown(&mut rig.link, &mut rig.board, &rig.store, &mut rig.sink);

    assert!(!rig.dispatcher.is_running());
    assert!(rig.link.calls.contains(&LinkCall::StopAdvertising));
    assert!(rig.link.calls.contains(&LinkCall::Disconnect(PEER)));
    assert_eq!(rig.board.deadline(AlarmTarget::Dispatch), None);
    assert_eq!(rig.board.deadline(AlarmTarget::Blink), None);

    // The stack's own disconnect callback must not restart advertising.
    rig.deliver(LinkEvent::Disconnected);
    assert_eq!(rig.adv_starts(), 1);

    rig.dispatcher.start(&mut rig.link, &mut rig.board, &mut rig.sink);
    assert_eq!(rig.adv_starts(), 2);
    assert!(rig.dispatcher.is_running());
}

// ── Attribute access ─────────────────────────────────────────

#[test]
fn sample_reads_honour_offset_and_length() {
    let rig = Rig::connected();
    rig.store.publish(sample(6.0));
    let bytes = sample(6.0).to_le_bytes();
    let read = |offset, max| rig.dispatcher.on_att_read(AttributeId::SampleData, offset, max, &rig.store);

    assert_eq!(read(0, 22).as_deref(), Ok(&bytes[..22]));
    assert_eq!(read(22, 22).as_deref(), Ok(&bytes[22..]));
    assert_eq!(read(24, 22).map(|v| v.len()), Ok(0));
    assert_eq!(read(25, 22), Err(AttError::InvalidOffset));
    assert!(rig.store.is_dirty(), "reads do not consume the sample");
}

#[test]
fn cccd_read_reflects_subscription() {
    let rig = Rig::subscribed();
    let value = rig.dispatcher.on_att_read(AttributeId::SampleDataConfig, 0, 22, &rig.store);
    assert_eq!(value.as_deref(), Ok(&[0x01, 0x00][..]));
}

#[test]
fn malformed_writes_are_rejected() {
    let mut rig = Rig::connected();

    let data = rig.dispatcher.on_att_write(AttributeId::SampleData, &[1, 0], &mut rig.sink);
    assert_eq!(data, Err(AttError::WriteNotPermitted));

    let short = rig.dispatcher.on_att_write(AttributeId::SampleDataConfig, &[1], &mut rig.sink);
    assert_eq!(short, Err(AttError::InvalidAttributeValueLength));
    assert!(!rig.dispatcher.notifications_enabled());
}

#[test]
fn rejected_queued_write_leaves_subscription_untouched() {
    let mut rig = Rig::subscribed();
    let changes = rig.sink.count(|e| matches!(e, NodeEvent::NotificationsChanged(_)));

    rig.write_cccd(&[0x00]);
    let value = heapless::Vec::from_slice(&[0x00, 0x00]).expect("short write");
    rig.deliver(LinkEvent::Write { attribute: AttributeId::SampleData, value });

    assert!(rig.dispatcher.notifications_enabled());
    assert_eq!(rig.sink.count(|e| matches!(e, NodeEvent::NotificationsChanged(_))), changes);
}
