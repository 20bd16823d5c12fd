//! BME68x environmental sensor.
//!
//! Compensation (temperature, humidity, pressure, gas) is done by the
//! vendor driver; this module only drives a forced-mode measurement and
//! derives the VOC estimate from gas resistance.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: calls the vendor C driver through a thin shim component.
//! On host/test: returns the measurement injected with
//! [`sim_set_measurement`], or `NotReady` when none is set.

use log::info;

use super::{EnvReading, Sensor};
use crate::error::SensorError;

pub const BME68X_ADDR: u8 = 0x77;

/// Heater profile used for every forced measurement.
pub const HEATER_TEMP_C: u16 = 320;
pub const HEATER_DURATION_MS: u16 = 150;

/// Output of one vendor forced-mode measurement.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawMeasurement {
    pub temperature_c: f32,
    pub pressure_pa: f32,
    pub humidity_pct: f32,
    pub gas_resistance_ohm: f32,
    /// Non-zero when the heater reached target and the gas value is valid.
    pub gas_valid: u8,
}

/// Piecewise VOC estimate (ppm) from gas resistance in kΩ.  Lower
/// resistance means more reducing gas on the heated plate.
pub fn estimate_voc_ppm(gas_kohm: f32) -> f32 {
    if gas_kohm >= 50.0 {
        0.0
    } else if gas_kohm >= 10.0 {
        (50.0 - gas_kohm) / 40.0
    } else if gas_kohm >= 5.0 {
        1.0 + (10.0 - gas_kohm)
    } else if gas_kohm >= 2.0 {
        6.0 + (5.0 - gas_kohm) * 4.0 / 3.0
    } else {
        10.0 + (2.0 - gas_kohm) * 20.0
    }
}

fn to_reading(raw: &RawMeasurement) -> Result<EnvReading, SensorError> {
    if raw.gas_valid == 0 {
        return Err(SensorError::NotReady);
    }
    let gas_resistance_kohm = raw.gas_resistance_ohm / 1_000.0;
    Ok(EnvReading {
        temperature_c: raw.temperature_c,
        humidity_pct: raw.humidity_pct,
        pressure_pa: raw.pressure_pa,
        gas_resistance_kohm,
        voc_ppm: estimate_voc_ppm(gas_resistance_kohm),
    })
}

pub struct Bme68x {
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    i2c_port: i32,
    ready: bool,
}

impl Bme68x {
    pub fn new(i2c_port: i32) -> Self {
        Self { i2c_port, ready: false }
    }
}

impl Sensor for Bme68x {
    type Reading = EnvReading;

    fn init(&mut self) -> Result<(), SensorError> {
        platform_init(self.i2c_port)?;
        self.ready = true;
        info!(
            "BME68x: online (heater {} °C / {} ms)",
            HEATER_TEMP_C, HEATER_DURATION_MS
        );
        Ok(())
    }

    fn read(&mut self) -> Result<EnvReading, SensorError> {
        if !self.ready {
            return Err(SensorError::NotReady);
        }
        let raw = platform_measure()?;
        to_reading(&raw)
    }
}

// ── ESP-IDF: vendor driver shim ───────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" {
    fn envnode_bme68x_init(i2c_port: i32, addr: u8, heater_temp_c: u16, heater_ms: u16) -> i8;
    fn envnode_bme68x_measure(out: *mut RawMeasurement) -> i8;
}

#[cfg(target_os = "espidf")]
fn platform_init(i2c_port: i32) -> Result<(), SensorError> {
    // SAFETY: the shim copies its arguments; called from the main task only.
    let rc = unsafe { envnode_bme68x_init(i2c_port, BME68X_ADDR, HEATER_TEMP_C, HEATER_DURATION_MS) };
    if rc == 0 { Ok(()) } else { Err(SensorError::Vendor(rc)) }
}

#[cfg(target_os = "espidf")]
fn platform_measure() -> Result<RawMeasurement, SensorError> {
    let mut raw = RawMeasurement::default();
    // SAFETY: `raw` is a valid, writable #[repr(C)] struct for the call.
    let rc = unsafe { envnode_bme68x_measure(&mut raw) };
    if rc == 0 { Ok(raw) } else { Err(SensorError::Vendor(rc)) }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
static SIM_MEASUREMENT: std::sync::Mutex<Option<RawMeasurement>> = std::sync::Mutex::new(None);

/// Simulation: set (or clear) the measurement returned by every read.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_measurement(raw: Option<RawMeasurement>) {
    if let Ok(mut m) = SIM_MEASUREMENT.lock() {
        *m = raw;
    }
}

#[cfg(not(target_os = "espidf"))]
fn platform_init(_i2c_port: i32) -> Result<(), SensorError> {
    log::info!("BME68x(sim): init");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn platform_measure() -> Result<RawMeasurement, SensorError> {
    SIM_MEASUREMENT
        .lock()
        .ok()
        .and_then(|m| *m)
        .ok_or(SensorError::NotReady)
}
