//! One-shot alarm slots on top of ESP-IDF's esp_timer API.
//!
//! One slot per [`AlarmTarget`].  Arming a slot that is already running
//! restarts it with the new deadline.  Expiry pushes the matching event
//! into [`SYSTEM_EVENTS`] and wakes the main task.
//!
//! Callbacks execute in the esp_timer task context (not ISR), so pushing
//! to the lock-free queue is all they do.  On simulation targets the
//! deadlines are kept in memory and fired by [`sim_fire_due`].

use crate::app::ports::AlarmTarget;
use crate::events::{Event, SYSTEM_EVENTS};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

const SLOT_COUNT: usize = 3;

fn slot(target: AlarmTarget) -> usize {
    match target {
        AlarmTarget::Wake => 0,
        AlarmTarget::Dispatch => 1,
        AlarmTarget::Blink => 2,
    }
}

fn event_for_slot(index: usize) -> Option<Event> {
    match index {
        0 => Some(Event::WakeAlarm),
        1 => Some(Event::DispatchTimer),
        2 => Some(Event::BlinkTimer),
        _ => None,
    }
}

/// Push the expiry event for `index`.  Returns `false` if the queue was full.
fn fire(index: usize) -> bool {
    match event_for_slot(index) {
        Some(Event::WakeAlarm) => crate::power::isr::on_wake_alarm(&SYSTEM_EVENTS),
        Some(ev) => SYSTEM_EVENTS.push(ev),
        None => false,
    }
}

/// Error code of a failed esp_timer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerError(pub i32);

#[cfg(target_os = "espidf")]
static mut TIMERS: [esp_timer_handle_t; SLOT_COUNT] = [core::ptr::null_mut(); SLOT_COUNT];

/// SAFETY: TIMERS is written once in `init_timers()` before any arm call.
/// Only called from the single main task.
#[cfg(target_os = "espidf")]
unsafe fn timer(index: usize) -> esp_timer_handle_t {
    unsafe { (*(&raw const TIMERS))[index] }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn alarm_cb(arg: *mut core::ffi::c_void) {
    if fire(arg as usize) {
        crate::drivers::clocks::notify();
    }
}

/// Create the three one-shot timers.
#[cfg(target_os = "espidf")]
pub fn init_timers() -> Result<(), TimerError> {
    const NAMES: [&[u8]; SLOT_COUNT] = [b"wake\0", b"dispatch\0", b"blink\0"];
    // SAFETY: TIMERS is written here once at boot from the main task before
    // any callback can fire.
    unsafe {
        for (index, name) in NAMES.iter().enumerate() {
            let args = esp_timer_create_args_t {
                callback: Some(alarm_cb),
                arg: index as *mut core::ffi::c_void,
                dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
                name: name.as_ptr() as *const _,
                skip_unhandled_events: true,
            };
            let ret = esp_timer_create(&args, &raw mut TIMERS[index]);
            if ret != ESP_OK as i32 {
                return Err(TimerError(ret));
            }
        }
    }
    info!("hw_timer: {} one-shot slots ready", SLOT_COUNT);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_timers() -> Result<(), TimerError> {
    log::info!("hw_timer(sim): in-memory alarm slots");
    Ok(())
}

/// (Re)start the slot for `target` to expire `delay_us` from now.
#[cfg(target_os = "espidf")]
pub fn arm(target: AlarmTarget, delay_us: u64) -> Result<(), TimerError> {
    // SAFETY: timer() contract; esp_timer_stop on an idle timer only
    // returns ESP_ERR_INVALID_STATE.
    unsafe {
        let t = timer(slot(target));
        if t.is_null() {
            return Err(TimerError(ESP_ERR_INVALID_STATE as i32));
        }
        esp_timer_stop(t);
        let ret = esp_timer_start_once(t, delay_us);
        if ret != ESP_OK as i32 {
            return Err(TimerError(ret));
        }
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn disarm(target: AlarmTarget) {
    // SAFETY: timer() contract; null-check guards use before init.
    unsafe {
        let t = timer(slot(target));
        if !t.is_null() {
            esp_timer_stop(t);
        }
    }
}

/// Microseconds since boot.
#[cfg(target_os = "espidf")]
pub fn now_us() -> u64 {
    // SAFETY: read of the monotonic high-resolution timer.
    (unsafe { esp_timer_get_time() }) as u64
}

#[cfg(not(target_os = "espidf"))]
pub fn now_us() -> u64 {
    sim::epoch().elapsed().as_micros() as u64
}

#[cfg(not(target_os = "espidf"))]
pub fn arm(target: AlarmTarget, delay_us: u64) -> Result<(), TimerError> {
    sim::set(slot(target), Some(now_us().saturating_add(delay_us)));
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn disarm(target: AlarmTarget) {
    sim::set(slot(target), None);
}

/// Fire every slot whose deadline is at or before `now_us`.  Returns the
/// number of events pushed.
#[cfg(not(target_os = "espidf"))]
pub fn sim_fire_due(now_us: u64) -> usize {
    (0..SLOT_COUNT)
        .filter(|&i| sim::take_if_due(i, now_us))
        .filter(|&i| fire(i))
        .count()
}

/// Deadline of the slot for `target`, if armed.
#[cfg(not(target_os = "espidf"))]
pub fn sim_deadline(target: AlarmTarget) -> Option<u64> {
    sim::get(slot(target))
}

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::sync::{Mutex, OnceLock, PoisonError};
    use std::time::Instant;

    use super::SLOT_COUNT;

    static DEADLINES: Mutex<[Option<u64>; SLOT_COUNT]> = Mutex::new([None; SLOT_COUNT]);
    static EPOCH: OnceLock<Instant> = OnceLock::new();

    pub fn epoch() -> Instant {
        *EPOCH.get_or_init(Instant::now)
    }

    pub fn set(index: usize, deadline: Option<u64>) {
        DEADLINES.lock().unwrap_or_else(PoisonError::into_inner)[index] = deadline;
    }

    pub fn get(index: usize) -> Option<u64> {
        DEADLINES.lock().unwrap_or_else(PoisonError::into_inner)[index]
    }

    pub fn take_if_due(index: usize, now_us: u64) -> bool {
        let mut d = DEADLINES.lock().unwrap_or_else(PoisonError::into_inner);
        match d[index] {
            Some(at) if at <= now_us => {
                d[index] = None;
                true
            }
            _ => false,
        }
    }
}
