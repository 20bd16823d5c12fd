//! Unified error types for the envnode firmware.
//!
//! Each subsystem has its own small `Copy` enum so errors can travel through
//! the run loop and the structured event stream without allocation.  The
//! top-level [`Error`] collects them for bring-up paths that want a single
//! type.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be initialised or read.
    Sensor(SensorError),
    /// A wake alarm or timer could not be armed.
    Alarm(AlarmError),
    /// The wireless link rejected an operation.
    Link(LinkError),
    /// A peer attribute access was rejected.
    Att(AttError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Alarm(e) => write!(f, "alarm: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Att(e) => write!(f, "att: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// I²C transaction failed or was NACKed.
    Bus,
    /// Frame did not start with the expected header or had a bad length.
    BadFrame,
    /// Frame checksum mismatch.
    Checksum,
    /// Driver was not initialised or the measurement is not ready.
    NotReady,
    /// The vendor driver returned a non-zero status.
    Vendor(i8),
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => write!(f, "I2C bus error"),
            Self::BadFrame => write!(f, "malformed frame"),
            Self::Checksum => write!(f, "frame checksum mismatch"),
            Self::NotReady => write!(f, "sensor not ready"),
            Self::Vendor(rc) => write!(f, "vendor driver error (rc={rc})"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Alarm errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmError {
    /// No timer slot exists for the requested target.
    NoSlot,
    /// The requested instant is not representable by the platform timer.
    OutOfRange,
    /// The platform timer API returned an error code.
    Platform(i32),
}

impl fmt::Display for AlarmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSlot => write!(f, "no timer slot"),
            Self::OutOfRange => write!(f, "deadline out of range"),
            Self::Platform(rc) => write!(f, "timer API failed (rc={rc})"),
        }
    }
}

impl From<AlarmError> for Error {
    fn from(e: AlarmError) -> Self {
        Self::Alarm(e)
    }
}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// No peer is connected.
    NotConnected,
    /// Stack has no free buffers for the notification.
    Congested,
    /// The stack rejected the call with the given status.
    Rejected(i32),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "no peer connected"),
            Self::Congested => write!(f, "link congested"),
            Self::Rejected(rc) => write!(f, "stack rejected request (rc={rc})"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Attribute protocol errors
// ---------------------------------------------------------------------------

/// Errors returned to the peer for a rejected attribute access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttError {
    ReadNotPermitted,
    WriteNotPermitted,
    InvalidOffset,
    AttributeNotFound,
    InvalidAttributeValueLength,
}

impl AttError {
    /// ATT protocol error code (Bluetooth Core Vol 3, Part F, 3.4.1.1).
    pub const fn code(self) -> u8 {
        match self {
            Self::ReadNotPermitted => 0x02,
            Self::WriteNotPermitted => 0x03,
            Self::InvalidOffset => 0x07,
            Self::AttributeNotFound => 0x0A,
            Self::InvalidAttributeValueLength => 0x0D,
        }
    }
}

impl fmt::Display for AttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadNotPermitted => write!(f, "read not permitted"),
            Self::WriteNotPermitted => write!(f, "write not permitted"),
            Self::InvalidOffset => write!(f, "invalid offset"),
            Self::AttributeNotFound => write!(f, "attribute not found"),
            Self::InvalidAttributeValueLength => write!(f, "invalid attribute value length"),
        }
    }
}

impl From<AttError> for Error {
    fn from(e: AttError) -> Self {
        Self::Att(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, Error>;
