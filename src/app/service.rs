//! Node service, the hexagonal core.
//!
//! [`NodeService`] owns the power orchestrator and the link dispatcher and
//! shares one [`SampleStore`] between them.  All I/O flows through port
//! traits passed at call sites, so the whole service runs against fakes.
//!
//! ```text
//!  EventQueue ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!  LinkPort   ◀─▶ │       NodeService         │
//!  Board      ◀── │ PowerOrchestrator · Link  │
//!                 └──────────────────────────┘
//! ```

use log::info;

use crate::config::NodeConfig;
use crate::events::{Event, EventQueue};
use crate::link::{ConnectionState, Dispatcher, SendOutcome};
use crate::power::{PowerOrchestrator, PowerState};
use crate::store::SampleStore;

use super::events::NodeEvent;
use super::ports::{Board, EventSink, LinkPort};

pub struct NodeService<'a> {
    orchestrator: PowerOrchestrator,
    dispatcher: Dispatcher,
    store: &'a SampleStore,
    config: NodeConfig,
    iterations: u64,
}

impl<'a> NodeService<'a> {
    /// Does **not** touch hardware; call [`start`](Self::start) next.
    pub fn new(config: NodeConfig, store: &'a SampleStore, device_name: &str) -> Self {
        Self {
            orchestrator: PowerOrchestrator::new(&config),
            dispatcher: Dispatcher::new(&config.link, device_name),
            store,
            config,
            iterations: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Boot the sensors.  Advertising starts once the stack reports ready.
    pub fn start(&mut self, board: &mut impl Board, sink: &mut impl EventSink) {
        self.orchestrator.start(board);
        sink.emit(&NodeEvent::Started);
        info!("NodeService started");
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// One pass of the run loop:
    ///
    /// 1. drain stack callbacks into the dispatcher
    /// 2. drain ISR / timer events
    /// 3. step the orchestrator
    /// 4. idle: low-power wait while suspended, short delay while awake
    pub fn run_once(
        &mut self,
        board: &mut impl Board,
        link: &mut impl LinkPort,
        events: &EventQueue,
        sink: &mut impl EventSink,
    ) {
        self.iterations += 1;

        while let Some(ev) = link.poll_event() {
            self.dispatcher.handle_link_event(ev, link, board, self.store, sink);
        }

        while let Some(ev) = events.pop() {
            self.handle_event(ev, board, link, sink);
        }

        self.orchestrator.step(board, self.store, sink);

        if self.orchestrator.is_suspended() {
            if !self.orchestrator.has_pending_request() && events.is_empty() {
                board.wait_for_interrupt();
            }
        } else {
            board.delay_ms(self.config.awake_poll_interval_ms);
        }
    }

    /// Route one queued event.  The dispatch outcome is returned for
    /// callers that want it.
    pub fn handle_event(
        &mut self,
        event: Event,
        board: &mut impl Board,
        link: &mut impl LinkPort,
        sink: &mut impl EventSink,
    ) -> Option<SendOutcome> {
        match event {
            Event::MotionInterrupt => {
                self.orchestrator.on_motion_interrupt();
                None
            }
            Event::WakeAlarm => {
                self.orchestrator.on_wake_alarm(board, sink);
                None
            }
            Event::DispatchTimer => self.dispatcher.on_dispatch_timer(link, board, self.store, sink),
            Event::BlinkTimer => {
                self.dispatcher.on_blink_timer(board);
                None
            }
        }
    }

    /// Stop all link activity (advertising, connection, timers).
    pub fn shutdown_link(&mut self, board: &mut impl Board, link: &mut impl LinkPort, sink: &mut impl EventSink) {
        self.dispatcher.shutdown(link, board, self.store, sink);
    }

    pub fn restart_link(&mut self, board: &mut impl Board, link: &mut impl LinkPort, sink: &mut impl EventSink) {
        self.dispatcher.start(link, board, sink);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn power_state(&self) -> PowerState {
        self.orchestrator.state()
    }

    pub fn link_state(&self) -> ConnectionState {
        self.dispatcher.state()
    }

    pub fn orchestrator(&self) -> &PowerOrchestrator {
        &self.orchestrator
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn store(&self) -> &SampleStore {
        self.store
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Run-loop passes since startup.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}
