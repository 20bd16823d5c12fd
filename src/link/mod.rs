//! Connectivity dispatcher.  Advertises while idle and pushes the latest
//! sample on a fixed cadence once the peer has subscribed.
//!
//! ```text
//!   StackReady ──▶ Advertising ──connect──▶ Connected
//!                  (blink)     ◀─disconnect─ (dispatch timer)
//! ```
//!
//! The stack adapter queues callbacks as [`LinkEvent`]s; the run loop
//! hands them here together with the dispatch and blink timer events.
//! Nothing in this module blocks.

pub mod advert;
pub mod att;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::events::NodeEvent;
use crate::app::ports::{
    AdvertisingParams, AlarmHandle, AlarmTarget, ClockPort, ConnHandle, ConnParams,
    ConnParamsReport, EventSink, IndicatorPort, Instant, LinkEvent, LinkPort,
};
use crate::config::LinkConfig;
use crate::error::{AttError, LinkError};
use crate::store::SampleStore;

use att::{AttributeId, ReadValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Advertising,
    Connected,
}

/// Result of one send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Minimum send interval not yet elapsed.
    TooSoon,
    /// No peer, or the peer has not enabled notifications.
    NotSubscribed,
    /// Nothing new since the last delivery.
    NoNewData,
    /// Stack refused; the sample stays dirty.
    Failed(LinkError),
}

/// An armed one-shot and the instant it is due.  A tick that lands
/// before `due` belongs to an earlier arming of the same slot.
#[derive(Debug, Clone, Copy)]
struct ArmedTimer {
    handle: AlarmHandle,
    due: Instant,
}

impl ArmedTimer {
    fn is_due(&self, now: Instant) -> bool {
        now >= self.due
    }
}

pub struct Dispatcher {
    config: LinkConfig,
    advertising: AdvertisingParams,
    connection: ConnParams,
    state: ConnectionState,
    peer: Option<ConnHandle>,
    params_negotiated: bool,
    notifications_enabled: bool,
    dispatch_timer: Option<ArmedTimer>,
    blink_timer: Option<ArmedTimer>,
    running: bool,
}

impl Dispatcher {
    pub fn new(config: &LinkConfig, device_name: &str) -> Self {
        Self {
            config: *config,
            advertising: advert::advertising_params(config, device_name),
            connection: advert::connection_params(config),
            state: ConnectionState::Advertising,
            peer: None,
            params_negotiated: false,
            notifications_enabled: false,
            dispatch_timer: None,
            blink_timer: None,
            running: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn peer(&self) -> Option<ConnHandle> {
        self.peer
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }

    pub fn params_negotiated(&self) -> bool {
        self.params_negotiated
    }

    pub fn dispatch_armed(&self) -> bool {
        self.dispatch_timer.is_some()
    }

    pub fn advertising_params(&self) -> &AdvertisingParams {
        &self.advertising
    }

    /// Route one queued stack callback.
    pub fn handle_link_event(
        &mut self,
        event: LinkEvent,
        link: &mut impl LinkPort,
        board: &mut (impl ClockPort + IndicatorPort),
        store: &SampleStore,
        sink: &mut impl EventSink,
    ) {
        match event {
            LinkEvent::StackReady => self.on_stack_ready(link, board, sink),
            LinkEvent::Connected(handle) => self.on_connect(handle, link, board, sink),
            LinkEvent::Disconnected => self.on_disconnect(link, board, store, sink),
            LinkEvent::ParamsUpdated(report) => self.on_conn_params_updated(report, sink),
            LinkEvent::MtuExchanged(mtu) => self.on_mtu_exchanged(mtu),
            LinkEvent::Write { attribute, value } => {
                if let Err(e) = self.on_att_write(attribute, &value, sink) {
                    warn!("link: write to {:?} rejected ({:?})", attribute, e);
                }
            }
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn on_stack_ready(
        &mut self,
        link: &mut impl LinkPort,
        board: &mut (impl ClockPort + IndicatorPort),
        sink: &mut impl EventSink,
    ) {
        info!("link: stack ready");
        self.start(link, board, sink);
    }

    /// Begin (or resume after [`shutdown`](Self::shutdown)) advertising.
    pub fn start(
        &mut self,
        link: &mut impl LinkPort,
        board: &mut (impl ClockPort + IndicatorPort),
        sink: &mut impl EventSink,
    ) {
        if self.running {
            debug!("link: already running");
            return;
        }
        self.running = true;
        self.begin_advertising(link, board, sink);
    }

    /// Stop advertising, drop any peer and disarm both link timers.
    pub fn shutdown(
        &mut self,
        link: &mut impl LinkPort,
        board: &mut (impl ClockPort + IndicatorPort),
        store: &SampleStore,
        sink: &mut impl EventSink,
    ) {
        if !self.running {
            return;
        }
        self.running = false;
        self.stop_blink(board);
        self.cancel_dispatch(board);
        if let Err(e) = link.stop_advertising() {
            debug!("link: stop advertising: {}", e);
        }
        if let Some(handle) = self.peer.take() {
            if let Err(e) = link.disconnect(handle) {
                warn!("link: disconnect failed ({})", e);
            }
            self.reset_connection(store);
            self.set_state(ConnectionState::Advertising, sink);
        }
        info!("link: shut down");
    }

    // ── Connection callbacks ──────────────────────────────────

    pub fn on_connect(
        &mut self,
        handle: ConnHandle,
        link: &mut impl LinkPort,
        board: &mut (impl ClockPort + IndicatorPort),
        sink: &mut impl EventSink,
    ) {
        info!("link: peer connected (handle {})", handle.0);
        self.peer = Some(handle);
        self.stop_blink(board);
        self.set_state(ConnectionState::Connected, sink);
        sink.emit(&NodeEvent::PeerConnected(handle));

        if !self.params_negotiated {
            self.negotiate(link, sink);
        }
        if self.dispatch_timer.is_none() {
            let at = board.now() + self.config.first_dispatch_delay_ms;
            self.arm_dispatch(board, at);
        }
    }

    pub fn on_disconnect(
        &mut self,
        link: &mut impl LinkPort,
        board: &mut (impl ClockPort + IndicatorPort),
        store: &SampleStore,
        sink: &mut impl EventSink,
    ) {
        info!("link: peer disconnected");
        self.peer = None;
        self.reset_connection(store);
        self.cancel_dispatch(board);
        self.set_state(ConnectionState::Advertising, sink);
        if self.running {
            self.begin_advertising(link, board, sink);
        }
    }

    pub fn on_conn_params_updated(&mut self, report: ConnParamsReport, sink: &mut impl EventSink) {
        let us = report.interval_us();
        info!(
            "link: interval {}.{:02} ms, latency {}, timeout {} ms",
            us / 1_000,
            us % 1_000 / 10,
            report.latency,
            report.supervision_timeout_ms()
        );
        self.params_negotiated = true;
        sink.emit(&NodeEvent::ConnParamsUpdated(report));
    }

    pub fn on_mtu_exchanged(&mut self, mtu: u16) {
        info!("link: mtu {}", mtu);
    }

    // ── Attribute access ──────────────────────────────────────

    /// Apply a validated peer write.  Returns the ATT error to answer with
    /// on rejection.
    pub fn on_att_write(
        &mut self,
        attribute: AttributeId,
        value: &[u8],
        sink: &mut impl EventSink,
    ) -> Result<(), AttError> {
        let enabled = att::validate_write(attribute, value).map_err(|e| {
            warn!("link: write to {:?} rejected ({})", attribute, e);
            e
        })?;
        if enabled != self.notifications_enabled {
            self.notifications_enabled = enabled;
            info!("link: notifications {}", if enabled { "enabled" } else { "disabled" });
            sink.emit(&NodeEvent::NotificationsChanged(enabled));
        }
        Ok(())
    }

    pub fn on_att_read(
        &self,
        attribute: AttributeId,
        offset: usize,
        max_len: usize,
        store: &SampleStore,
    ) -> Result<ReadValue, AttError> {
        match attribute {
            AttributeId::SampleData => att::read_sample(store, offset, max_len),
            AttributeId::SampleDataConfig => att::read_cccd(self.notifications_enabled, offset, max_len),
        }
    }

    // ── Timers ────────────────────────────────────────────────

    /// Dispatch tick.  Retries parameter negotiation if it is still
    /// outstanding, attempts a send, then re-arms.  `None` for a stale or
    /// inactive timer.
    pub fn on_dispatch_timer(
        &mut self,
        link: &mut impl LinkPort,
        board: &mut (impl ClockPort + IndicatorPort),
        store: &SampleStore,
        sink: &mut impl EventSink,
    ) -> Option<SendOutcome> {
        let now = board.now();
        if !matches!(self.dispatch_timer, Some(t) if t.is_due(now)) || self.state != ConnectionState::Connected {
            debug!("link: stale dispatch tick");
            return None;
        }
        self.dispatch_timer = None;
        if !self.params_negotiated {
            self.negotiate(link, sink);
        }
        let outcome = self.try_send(link, now, store, sink);
        self.arm_dispatch(board, now + self.config.dispatch_period_ms);
        Some(outcome)
    }

    pub fn on_blink_timer(&mut self, board: &mut (impl ClockPort + IndicatorPort)) {
        if !matches!(self.blink_timer, Some(t) if t.is_due(board.now())) {
            return;
        }
        self.blink_timer = None;
        if self.running && self.state == ConnectionState::Advertising {
            board.toggle_indicator();
            self.arm_blink(board);
        }
    }

    // ── Send path ─────────────────────────────────────────────

    pub fn try_send(
        &mut self,
        link: &mut impl LinkPort,
        now: Instant,
        store: &SampleStore,
        sink: &mut impl EventSink,
    ) -> SendOutcome {
        if now.millis_since(store.last_send()) < u64::from(self.config.min_send_interval_ms) {
            return SendOutcome::TooSoon;
        }
        let handle = match self.peer {
            Some(h) if self.notifications_enabled => h,
            _ => return SendOutcome::NotSubscribed,
        };
        let Some(pending) = store.pending() else {
            return SendOutcome::NoNewData;
        };
        match link.notify(handle, AttributeId::SampleData, &pending.sample.to_le_bytes()) {
            Ok(()) => {
                store.mark_sent(&pending, now);
                debug!("link: sample sent");
                sink.emit(&NodeEvent::SampleNotified(pending.sample));
                SendOutcome::Sent
            }
            Err(e) => {
                warn!("link: notify failed ({}), will retry", e);
                sink.emit(&NodeEvent::LinkFailed(e));
                SendOutcome::Failed(e)
            }
        }
    }

    // ── Internals ─────────────────────────────────────────────

    fn negotiate(&mut self, link: &mut impl LinkPort, sink: &mut impl EventSink) {
        let Some(handle) = self.peer else { return };
        match link.request_conn_params(handle, &self.connection) {
            Ok(()) => self.params_negotiated = true,
            Err(e) => {
                warn!("link: connection parameter request failed ({})", e);
                sink.emit(&NodeEvent::LinkFailed(e));
            }
        }
    }

    fn begin_advertising(
        &mut self,
        link: &mut impl LinkPort,
        board: &mut (impl ClockPort + IndicatorPort),
        sink: &mut impl EventSink,
    ) {
        match link.start_advertising(&self.advertising) {
            Ok(()) => info!("link: advertising"),
            Err(e) => {
                warn!("link: advertising start failed ({})", e);
                sink.emit(&NodeEvent::LinkFailed(e));
            }
        }
        self.stop_blink(board);
        self.arm_blink(board);
    }

    fn reset_connection(&mut self, store: &SampleStore) {
        self.params_negotiated = false;
        self.notifications_enabled = false;
        store.clear_dirty();
    }

    fn arm_dispatch(&mut self, board: &mut impl ClockPort, at: Instant) {
        match board.schedule_at(at, AlarmTarget::Dispatch) {
            Ok(handle) => self.dispatch_timer = Some(ArmedTimer { handle, due: at }),
            Err(e) => warn!("link: dispatch timer arm failed ({})", e),
        }
    }

    fn cancel_dispatch(&mut self, board: &mut impl ClockPort) {
        if let Some(t) = self.dispatch_timer.take() {
            board.cancel(t.handle);
        }
    }

    fn arm_blink(&mut self, board: &mut impl ClockPort) {
        let at = board.now() + self.config.blink_period_ms;
        match board.schedule_at(at, AlarmTarget::Blink) {
            Ok(handle) => self.blink_timer = Some(ArmedTimer { handle, due: at }),
            Err(e) => warn!("link: blink timer arm failed ({})", e),
        }
    }

    fn stop_blink(&mut self, board: &mut (impl ClockPort + IndicatorPort)) {
        if let Some(t) = self.blink_timer.take() {
            board.cancel(t.handle);
        }
        board.set_indicator(false);
    }

    fn set_state(&mut self, to: ConnectionState, sink: &mut impl EventSink) {
        if self.state != to {
            let from = self.state;
            self.state = to;
            sink.emit(&NodeEvent::LinkChanged { from, to });
        }
    }
}
