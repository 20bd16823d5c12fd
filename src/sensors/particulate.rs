//! PMSA003I particulate sensor over I²C.
//!
//! Every read returns one 32-byte frame:
//!
//! ```text
//!  0    2    4      6      8      10     12     14     16 ...  30   32
//!  ┌────┬────┬──────┬──────┬──────┬──────┬──────┬──────┬──────┬────┐
//!  │42 4D│len │PM1.0s│PM2.5s│PM10s │PM1.0e│PM2.5e│PM10e │counts│sum │
//!  └────┴────┴──────┴──────┴──────┴──────┴──────┴──────┴──────┴────┘
//! ```
//!
//! All fields are big-endian `u16`.  `sum` is the byte sum of 0..30.
//! The sensor's SET line (power gate) is driven by the board, not here.

use embedded_hal::i2c::I2c;
use log::{debug, info};

use super::{PmReading, Sensor};
use crate::error::SensorError;

pub const PMSA003I_ADDR: u8 = 0x12;
pub const FRAME_LEN: usize = 32;

const START_1: u8 = 0x42;
const START_2: u8 = 0x4D;
/// Payload length advertised in bytes 2..4: 13 data words + checksum.
const PAYLOAD_LEN: u16 = 28;

fn be_u16(frame: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([frame[at], frame[at + 1]])
}

/// Validate and decode one frame.
pub fn parse_frame(frame: &[u8]) -> Result<PmReading, SensorError> {
    if frame.len() != FRAME_LEN || frame[0] != START_1 || frame[1] != START_2 {
        return Err(SensorError::BadFrame);
    }
    if be_u16(frame, 2) != PAYLOAD_LEN {
        return Err(SensorError::BadFrame);
    }
    let sum = frame[..FRAME_LEN - 2]
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)));
    if sum != be_u16(frame, FRAME_LEN - 2) {
        return Err(SensorError::Checksum);
    }
    Ok(PmReading {
        pm1_0_standard: be_u16(frame, 4),
        pm2_5_standard: be_u16(frame, 6),
        pm10_standard: be_u16(frame, 8),
        pm1_0_env: be_u16(frame, 10),
        pm2_5_env: be_u16(frame, 12),
        pm10_env: be_u16(frame, 14),
    })
}

pub struct Pmsa003i<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> Pmsa003i<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> Sensor for Pmsa003i<I2C> {
    type Reading = PmReading;

    /// The part has no configuration registers; probe it with one frame.
    fn init(&mut self) -> Result<(), SensorError> {
        let r = self.read()?;
        info!("PMSA003I: online (PM2.5 env={} µg/m³)", r.pm2_5_env);
        Ok(())
    }

    fn read(&mut self) -> Result<PmReading, SensorError> {
        let mut frame = [0u8; FRAME_LEN];
        self.i2c
            .read(PMSA003I_ADDR, &mut frame)
            .map_err(|_| SensorError::Bus)?;
        let r = parse_frame(&frame)?;
        debug!("PMSA003I: pm1.0={} pm2.5={} pm10={} (env)", r.pm1_0_env, r.pm2_5_env, r.pm10_env);
        Ok(r)
    }
}

#[cfg(test)]
pub(crate) fn encode_frame(r: &PmReading) -> [u8; FRAME_LEN] {
    let mut f = [0u8; FRAME_LEN];
    f[0] = START_1;
    f[1] = START_2;
    f[2..4].copy_from_slice(&PAYLOAD_LEN.to_be_bytes());
    let words = [
        r.pm1_0_standard,
        r.pm2_5_standard,
        r.pm10_standard,
        r.pm1_0_env,
        r.pm2_5_env,
        r.pm10_env,
    ];
    for (i, w) in words.iter().enumerate() {
        f[4 + i * 2..6 + i * 2].copy_from_slice(&w.to_be_bytes());
    }
    let sum = f[..30].iter().fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)));
    f[30..32].copy_from_slice(&sum.to_be_bytes());
    f
}
