//! Interrupt-context entry points for the power subsystem.
//!
//! Handlers here are O(1): a few register toggles and one queue push.
//! Every decision (state change, alarm arming, I²C traffic) happens later
//! in the run loop when it drains the queue.

use crate::events::{Event, EventQueue};

/// Register-level view of the motion interrupt line, safe to drive from
/// ISR context.
pub trait MotionLine {
    /// Clear the pending edge at the GPIO controller.
    fn acknowledge(&mut self);

    /// Mask the GPIO so no further edges are delivered until re-armed.
    fn mask(&mut self);

    /// Raise the particulate sensor's power gate.
    fn particulate_power_on(&mut self);
}

/// Motion edge while suspended.  Returns `false` if the queue was full.
pub fn on_motion_interrupt(line: &mut impl MotionLine, events: &EventQueue) -> bool {
    line.acknowledge();
    line.mask();
    line.particulate_power_on();
    events.push(Event::MotionInterrupt)
}

/// Staged wake alarm callback.
pub fn on_wake_alarm(events: &EventQueue) -> bool {
    events.push(Event::WakeAlarm)
}
