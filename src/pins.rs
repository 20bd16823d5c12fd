//! GPIO / peripheral pin assignments for the sensing node board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Accelerometer (LIS3DH) on I²C1
// ---------------------------------------------------------------------------

pub const ACCEL_SDA_GPIO: i32 = 4;
pub const ACCEL_SCL_GPIO: i32 = 5;
/// LIS3DH INT1, active-high latched.  Rising edge wakes the node.
pub const ACCEL_INT1_GPIO: i32 = 6;

// ---------------------------------------------------------------------------
// Acquisition sensors (PMSA003I, BME68x) on I²C0
// ---------------------------------------------------------------------------

pub const SENSOR_SDA_GPIO: i32 = 8;
pub const SENSOR_SCL_GPIO: i32 = 9;
/// I²C controller number shared with the BME68x vendor shim.
pub const SENSOR_I2C_PORT: i32 = 0;

/// PMSA003I SET line.  HIGH = fan and laser powered.
pub const PM_SET_GPIO: i32 = 10;

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

/// Discrete LED, active HIGH.
pub const LED_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// Bus timing
// ---------------------------------------------------------------------------

/// Both buses run standard mode; the PMSA003I does not support fast mode.
pub const I2C_BAUD_HZ: u32 = 100_000;
