//! CPU clock scaling and the main-task wake primitive.
//!
//! - [`reduce`] caps the CPU frequency and enables automatic light sleep.
//!   The radio's clock domain is kept alive by the Bluetooth controller's
//!   own power-management lock, so the link survives suspension.
//! - [`restore`] returns to full speed with light sleep off.
//! - [`wait`] blocks the main task on its FreeRTOS notification until an
//!   ISR or timer callback calls [`notify`] / [`notify_from_isr`].
//!
//! Requires `CONFIG_PM_ENABLE=y` and `CONFIG_FREERTOS_USE_TICKLESS_IDLE=y`.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicPtr, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Full-speed CPU frequency (MHz).
pub const FULL_SPEED_MHZ: i32 = 160;
/// Ceiling while suspended (MHz).
pub const REDUCED_MHZ: i32 = 80;
/// Crystal frequency, the floor in both modes (MHz).
pub const XTAL_MHZ: i32 = 40;

#[cfg(target_os = "espidf")]
static MAIN_TASK: AtomicPtr<core::ffi::c_void> = AtomicPtr::new(core::ptr::null_mut());

/// Record the calling task as the one [`wait`] blocks.
#[cfg(target_os = "espidf")]
pub fn register_main_task() {
    // SAFETY: returns the handle of the running task.
    let handle = unsafe { xTaskGetCurrentTaskHandle() };
    MAIN_TASK.store(handle.cast(), Ordering::Release);
}

#[cfg(not(target_os = "espidf"))]
pub fn register_main_task() {}

#[cfg(target_os = "espidf")]
fn configure(max_mhz: i32, light_sleep: bool) -> bool {
    let cfg = esp_pm_config_t {
        max_freq_mhz: max_mhz,
        min_freq_mhz: XTAL_MHZ,
        light_sleep_enable: light_sleep,
    };
    // SAFETY: esp_pm_configure copies the struct.
    let ret = unsafe { esp_pm_configure((&raw const cfg).cast()) };
    if ret != ESP_OK as i32 {
        log::warn!("clocks: esp_pm_configure failed (rc={})", ret);
        return false;
    }
    true
}

#[cfg(target_os = "espidf")]
pub fn reduce() -> bool {
    configure(REDUCED_MHZ, true)
}

#[cfg(target_os = "espidf")]
pub fn restore() -> bool {
    configure(FULL_SPEED_MHZ, false)
}

#[cfg(not(target_os = "espidf"))]
pub fn reduce() -> bool {
    sim::set_reduced(true);
    true
}

#[cfg(not(target_os = "espidf"))]
pub fn restore() -> bool {
    sim::set_reduced(false);
    true
}

#[cfg(not(target_os = "espidf"))]
pub fn is_reduced() -> bool {
    sim::reduced()
}

/// Block until notified.  `timeout_ms` bounds the wait.
#[cfg(target_os = "espidf")]
pub fn wait(timeout_ms: u32) {
    let ticks = timeout_ms.saturating_mul(configTICK_RATE_HZ) / 1_000;
    // SAFETY: waits on notification index 0 of the calling task.
    unsafe {
        ulTaskGenericNotifyTake(0, 1, ticks.max(1));
    }
}

/// Host: sleep briefly, then fire any due simulated alarms.
#[cfg(not(target_os = "espidf"))]
pub fn wait(timeout_ms: u32) {
    std::thread::sleep(std::time::Duration::from_millis(u64::from(timeout_ms.clamp(1, 10))));
    super::hw_timer::sim_fire_due(super::hw_timer::now_us());
}

/// Wake the main task from task context.
#[cfg(target_os = "espidf")]
pub fn notify() {
    let task = MAIN_TASK.load(Ordering::Acquire);
    if task.is_null() {
        return;
    }
    // SAFETY: task handle recorded by register_main_task(); the task never exits.
    unsafe {
        xTaskGenericNotify(task.cast(), 0, 0, eNotifyAction_eIncrement, core::ptr::null_mut());
    }
}

/// Wake the main task from ISR context.
#[cfg(target_os = "espidf")]
pub fn notify_from_isr() {
    let task = MAIN_TASK.load(Ordering::Acquire);
    if task.is_null() {
        return;
    }
    // SAFETY: as notify(); the FromISR variant is interrupt-safe.
    unsafe {
        vTaskGenericNotifyGiveFromISR(task.cast(), 0, core::ptr::null_mut());
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn notify() {}

#[cfg(not(target_os = "espidf"))]
pub fn notify_from_isr() {}

#[cfg(not(target_os = "espidf"))]
mod sim {
    use core::sync::atomic::{AtomicBool, Ordering};

    static REDUCED: AtomicBool = AtomicBool::new(false);

    pub fn set_reduced(on: bool) {
        REDUCED.store(on, Ordering::Relaxed);
    }

    pub fn reduced() -> bool {
        REDUCED.load(Ordering::Relaxed)
    }
}
