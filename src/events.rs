//! Interrupt-driven event system.
//!
//! Events are produced by:
//! - the accelerometer GPIO ISR (motion while suspended)
//! - one-shot timer callbacks (staged wake alarms, link dispatch, blink)
//!
//! Events are consumed by the run loop, which drains them before each
//! orchestrator step.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Motion ISR  │────▶│  EventQueue  │────▶│  Run loop    │
//! │ Timer cb    │────▶│  (lock-free) │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

/// Capacity of each producer's ring.
/// Power of 2 for efficient ring buffer modulo.
const RING_CAP: usize = 16;

/// System event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    // ── Power ─────────────────────────────────────────────
    /// Accelerometer interrupt latched while suspended.
    MotionInterrupt = 0,
    /// The currently armed pre-wake or full-wake alarm fired.
    WakeAlarm       = 1,

    // ── Link ──────────────────────────────────────────────
    /// Per-connection dispatch timer fired.
    DispatchTimer   = 10,
    /// Advertising indicator toggle timer fired.
    BlinkTimer      = 11,
}

impl Event {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0  => Some(Self::MotionInterrupt),
            1  => Some(Self::WakeAlarm),
            10 => Some(Self::DispatchTimer),
            11 => Some(Self::BlinkTimer),
            _  => None,
        }
    }

    /// Only the motion GPIO ISR raises `MotionInterrupt`; every other
    /// event comes from the esp_timer task.
    fn raised_by_isr(self) -> bool {
        matches!(self, Self::MotionInterrupt)
    }
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// Slots are atomics so the queue can live in a `static` without `unsafe`.

struct Ring {
    head: AtomicU8,
    tail: AtomicU8,
    buf: [AtomicU8; RING_CAP],
}

impl Ring {
    const fn new() -> Self {
        Self {
            head: AtomicU8::new(0),
            tail: AtomicU8::new(0),
            buf: [const { AtomicU8::new(0) }; RING_CAP],
        }
    }

    fn push(&self, event: Event) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let next_head = (head + 1) % RING_CAP as u8;

        if next_head == tail {
            return false;
        }

        self.buf[head as usize].store(event as u8, Ordering::Relaxed);
        self.head.store(next_head, Ordering::Release);
        true
    }

    fn pop(&self) -> Option<Event> {
        loop {
            let tail = self.tail.load(Ordering::Relaxed);
            let head = self.head.load(Ordering::Acquire);

            if tail == head {
                return None;
            }

            let raw = self.buf[tail as usize].load(Ordering::Relaxed);
            self.tail.store((tail + 1) % RING_CAP as u8, Ordering::Release);

            // Unknown codes are skipped rather than ending the drain.
            if let Some(event) = Event::from_u8(raw) {
                return Some(event);
            }
        }
    }

    fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire) as usize;
        let tail = self.tail.load(Ordering::Relaxed) as usize;
        (head + RING_CAP - tail) % RING_CAP
    }
}

/// Run-loop inbox with one SPSC ring per producer context, so the motion
/// ISR and the timer task never share a head index.
pub struct EventQueue {
    isr: Ring,
    timers: Ring,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self { isr: Ring::new(), timers: Ring::new() }
    }

    /// Push an event onto its producer's ring.  Safe to call from ISR
    /// context (lock-free, O(1)).  Returns `false` if that ring is full
    /// (event dropped).
    pub fn push(&self, event: Event) -> bool {
        if event.raised_by_isr() { self.isr.push(event) } else { self.timers.push(event) }
    }

    /// Pop the next event.  Single consumer only.  Motion is delivered
    /// ahead of timer events already queued.
    pub fn pop(&self) -> Option<Event> {
        self.isr.pop().or_else(|| self.timers.pop())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.isr.len() + self.timers.len()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue feeding the board's ISR and timer callbacks into the run loop.
pub static SYSTEM_EVENTS: EventQueue = EventQueue::new();
