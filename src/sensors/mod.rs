//! Sensor subsystem: driver boundary for the acquisition sensors.
//!
//! | Driver        | Part      | Bus          | Reading        |
//! |---------------|-----------|--------------|----------------|
//! | `environment` | BME68x    | vendor API   | [`EnvReading`] |
//! | `particulate` | PMSA003I  | I²C `0x12`   | [`PmReading`]  |
//! | `accel`       | LIS3DH    | I²C `0x18`   | motion only    |
//!
//! Drivers are generic over `embedded_hal::i2c::I2c` so they run against
//! scripted buses on the host.

pub mod accel;
pub mod environment;
pub mod particulate;

use serde::{Deserialize, Serialize};

use crate::error::SensorError;

/// Common driver shape: one-time init, then repeated reads.
pub trait Sensor {
    type Reading;

    fn init(&mut self) -> Result<(), SensorError>;

    fn read(&mut self) -> Result<Self::Reading, SensorError>;
}

/// Compensated environmental reading.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub pressure_pa: f32,
    pub gas_resistance_kohm: f32,
    /// Estimated from gas resistance, see [`environment::estimate_voc_ppm`].
    pub voc_ppm: f32,
}

/// Particulate mass concentrations (µg/m³).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PmReading {
    pub pm1_0_standard: u16,
    pub pm2_5_standard: u16,
    pub pm10_standard: u16,
    pub pm1_0_env: u16,
    pub pm2_5_env: u16,
    pub pm10_env: u16,
}
