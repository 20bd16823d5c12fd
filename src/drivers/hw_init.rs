//! One-shot hardware peripheral initialization.
//!
//! Configures the discrete GPIOs (particulate power gate, status LED,
//! accelerometer interrupt) using raw ESP-IDF sys calls and installs the
//! motion ISR.  Called once from `main()` before the run loop starts.
//! The two I²C buses are owned by `esp-idf-hal` drivers, not set up here.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::pins;
use crate::power::isr::MotionLine;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the run loop; single-threaded.
    unsafe {
        init_gpio_outputs()?;
        init_motion_input()?;
    }
    info!("hw_init: GPIO configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    for &pin in &[pins::PM_SET_GPIO, pins::LED_GPIO] {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
        unsafe { gpio_set_level(pin, 0) };
    }
    // Output levels must survive light sleep.
    unsafe { gpio_hold_en(pins::PM_SET_GPIO) };
    Ok(())
}

#[cfg(target_os = "espidf")]
unsafe fn init_motion_input() -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::ACCEL_INT1_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_ENABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_POSEDGE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
    unsafe { gpio_intr_disable(pins::ACCEL_INT1_GPIO) };
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: pin was configured as output in init_gpio_outputs(); the
    // hold latch is released around the write.
    unsafe {
        gpio_hold_dis(pin);
        gpio_set_level(pin, u32::from(high));
        if pin == pins::PM_SET_GPIO {
            gpio_hold_en(pin);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) {
    sim::write(pin, high);
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: register read on a configured pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(pin: i32) -> bool {
    sim::read(pin)
}

/// Host stand-in for the GPIO output latches.
#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::sync::Mutex;

    static LEVELS: Mutex<u64> = Mutex::new(0);

    pub fn write(pin: i32, high: bool) {
        let mut levels = LEVELS.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if high {
            *levels |= 1 << pin;
        } else {
            *levels &= !(1 << pin);
        }
    }

    pub fn read(pin: i32) -> bool {
        let levels = LEVELS.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *levels & (1 << pin) != 0
    }
}

// ── Motion interrupt line ─────────────────────────────────────

/// Motion GPIO as seen from ISR context.
pub struct IsrMotionLine;

#[cfg(target_os = "espidf")]
impl MotionLine for IsrMotionLine {
    fn acknowledge(&mut self) {
        // The ISR service clears the GPIO status bit before dispatching;
        // the latched INT1 source is read back by the run loop.
    }

    fn mask(&mut self) {
        // SAFETY: gpio_intr_disable is ISR-safe.
        unsafe { gpio_intr_disable(pins::ACCEL_INT1_GPIO) };
    }

    fn particulate_power_on(&mut self) {
        // SAFETY: plain register writes; ISR-safe.
        unsafe {
            gpio_hold_dis(pins::PM_SET_GPIO);
            gpio_set_level(pins::PM_SET_GPIO, 1);
            gpio_hold_en(pins::PM_SET_GPIO);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl MotionLine for IsrMotionLine {
    fn acknowledge(&mut self) {}

    fn mask(&mut self) {
        set_motion_gpio_enabled(false);
    }

    fn particulate_power_on(&mut self) {
        gpio_write(pins::PM_SET_GPIO, true);
    }
}

#[cfg(not(target_os = "espidf"))]
static SIM_MOTION_ENABLED: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(false);

/// Unmask or mask the motion GPIO edge interrupt.
#[cfg(target_os = "espidf")]
pub fn set_motion_gpio_enabled(enabled: bool) {
    // SAFETY: pin configured in init_motion_input(); ISR already registered.
    unsafe {
        if enabled {
            gpio_wakeup_enable(pins::ACCEL_INT1_GPIO, gpio_int_type_t_GPIO_INTR_HIGH_LEVEL);
            gpio_intr_enable(pins::ACCEL_INT1_GPIO);
        } else {
            gpio_intr_disable(pins::ACCEL_INT1_GPIO);
            gpio_wakeup_disable(pins::ACCEL_INT1_GPIO);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn set_motion_gpio_enabled(enabled: bool) {
    SIM_MOTION_ENABLED.store(enabled, core::sync::atomic::Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub fn motion_gpio_enabled() -> bool {
    SIM_MOTION_ENABLED.load(core::sync::atomic::Ordering::Relaxed)
}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn motion_gpio_isr(_arg: *mut core::ffi::c_void) {
    if crate::power::isr::on_motion_interrupt(&mut IsrMotionLine, &crate::events::SYSTEM_EVENTS) {
        crate::drivers::clocks::notify_from_isr();
    }
}

/// Install the per-pin GPIO ISR service and register the motion handler.
/// The edge stays masked until the orchestrator arms it.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: ESP_ERR_INVALID_STATE means the service is already installed.
    // The handler only toggles registers and pushes to the lock-free queue.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        gpio_isr_handler_add(pins::ACCEL_INT1_GPIO, Some(motion_gpio_isr), core::ptr::null_mut());
        gpio_intr_disable(pins::ACCEL_INT1_GPIO);
        esp_sleep_enable_gpio_wakeup();
    }
    info!("hw_init: motion ISR installed on GPIO{}", pins::ACCEL_INT1_GPIO);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
