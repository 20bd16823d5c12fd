//! Board drivers: one-shot peripheral init, one-shot timers, clock
//! management and the status LED.

pub mod clocks;
pub mod hw_init;
pub mod hw_timer;
pub mod status_led;
