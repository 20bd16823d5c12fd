//! LIS3DH accelerometer: polled motion check and the wake-on-motion
//! interrupt used while the node is suspended.
//!
//! The high-pass filter feeds both the output registers and the INT1 path,
//! so a node at rest reads close to 0 g and the magnitude check needs no
//! gravity compensation.

use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::error::SensorError;

pub const LIS3DH_ADDR: u8 = 0x18;

mod reg {
    pub const WHO_AM_I: u8 = 0x0F;
    pub const CTRL_REG1: u8 = 0x20;
    pub const CTRL_REG2: u8 = 0x21;
    pub const CTRL_REG3: u8 = 0x22;
    pub const OUT_X_L: u8 = 0x28;
    pub const INT1_CFG: u8 = 0x30;
    pub const INT1_SRC: u8 = 0x31;
    pub const INT1_THS: u8 = 0x32;
}

const WHO_AM_I_VALUE: u8 = 0x33;
/// Sub-address bit enabling register auto-increment.
const AUTO_INCREMENT: u8 = 0x80;

/// 1.344 kHz ODR, normal mode, X/Y/Z enabled.
const CTRL_REG1_NORMAL: u8 = 0x97;
/// High-pass filter on output data and the INT1 path.
const CTRL_REG2_HPF: u8 = 0x09;
/// IA1 interrupt routed to INT1 pad.
const CTRL_REG3_INT1_IA1: u8 = 0x40;
/// OR of X/Y/Z high events.
const INT1_CFG_HIGH_XYZ: u8 = 0x2A;
/// 16 LSB × 16 mg = 256 mg.
const INT1_THS_DEFAULT: u8 = 0x10;

/// g per LSB of the left-justified 16-bit output (4 mg/digit at 10 bit).
const G_PER_LSB: f32 = 0.004 / 64.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Axes {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Axes {
    pub fn from_raw(raw: &[u8; 6]) -> Self {
        let g = |lo: u8, hi: u8| f32::from(i16::from_le_bytes([lo, hi])) * G_PER_LSB;
        Self {
            x: g(raw[0], raw[1]),
            y: g(raw[2], raw[3]),
            z: g(raw[4], raw[5]),
        }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

pub struct Lis3dh<I2C> {
    i2c: I2C,
    threshold_g: f32,
}

impl<I2C: I2c> Lis3dh<I2C> {
    pub fn new(i2c: I2C, threshold_g: f32) -> Self {
        Self { i2c, threshold_g }
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(LIS3DH_ADDR, &[reg, value])
            .map_err(|_| SensorError::Bus)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, SensorError> {
        let mut v = [0u8; 1];
        self.i2c
            .write_read(LIS3DH_ADDR, &[reg], &mut v)
            .map_err(|_| SensorError::Bus)?;
        Ok(v[0])
    }

    pub fn init(&mut self) -> Result<(), SensorError> {
        let id = self.read_reg(reg::WHO_AM_I)?;
        if id != WHO_AM_I_VALUE {
            warn!("LIS3DH: unexpected WHO_AM_I 0x{:02X}", id);
            return Err(SensorError::NotReady);
        }
        self.write_reg(reg::CTRL_REG1, CTRL_REG1_NORMAL)?;
        self.write_reg(reg::CTRL_REG2, CTRL_REG2_HPF)?;
        self.write_reg(reg::CTRL_REG3, 0)?;
        self.write_reg(reg::INT1_THS, INT1_THS_DEFAULT)?;
        self.write_reg(reg::INT1_CFG, INT1_CFG_HIGH_XYZ)?;
        info!("LIS3DH: online, motion threshold {:.2} g", self.threshold_g);
        Ok(())
    }

    pub fn read_axes(&mut self) -> Result<Axes, SensorError> {
        let mut raw = [0u8; 6];
        self.i2c
            .write_read(LIS3DH_ADDR, &[reg::OUT_X_L | AUTO_INCREMENT], &mut raw)
            .map_err(|_| SensorError::Bus)?;
        Ok(Axes::from_raw(&raw))
    }

    /// A failed read counts as "not moving".
    pub fn is_moving(&mut self) -> bool {
        match self.read_axes() {
            Ok(axes) => axes.magnitude() > self.threshold_g,
            Err(e) => {
                warn!("LIS3DH: axis read failed ({})", e);
                false
            }
        }
    }

    pub fn enable_interrupt(&mut self) -> Result<(), SensorError> {
        // Clear any stale latch before unmasking.
        self.acknowledge_interrupt()?;
        self.write_reg(reg::CTRL_REG3, CTRL_REG3_INT1_IA1)
    }

    pub fn disable_interrupt(&mut self) -> Result<(), SensorError> {
        self.write_reg(reg::CTRL_REG3, 0)
    }

    /// Reading INT1_SRC releases the latched interrupt.
    pub fn acknowledge_interrupt(&mut self) -> Result<u8, SensorError> {
        self.read_reg(reg::INT1_SRC)
    }
}
