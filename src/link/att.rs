//! Attribute handlers for the two logical attributes the node exposes.
//!
//! | Attribute          | Access      | Value                               |
//! |--------------------|-------------|-------------------------------------|
//! | `SampleData`       | Read+Notify | 24 B, six LE `f32` ([`SensorSample`]) |
//! | `SampleDataConfig` | Read+Write  | CCCD, LE `u16`, `0x0001` = notify   |
//!
//! These functions are pure so the stack callback context can call them
//! directly (reads) or validate before queueing (writes).

use serde::{Deserialize, Serialize};

use crate::error::AttError;
use crate::store::{SAMPLE_WIRE_LEN, SampleStore, SensorSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeId {
    SampleData,
    SampleDataConfig,
}

/// Encoded width of a client characteristic configuration value.
pub const CCCD_LEN: usize = 2;
/// CCCD value enabling notifications.
pub const CCCD_NOTIFY: u16 = 0x0001;

/// Longest value any read can return.
pub const MAX_READ_LEN: usize = SAMPLE_WIRE_LEN;

pub type ReadValue = heapless::Vec<u8, MAX_READ_LEN>;

/// Decode a CCCD write.  Only the exact notify encoding enables; any other
/// value of sufficient width disables.
pub fn decode_cccd(value: &[u8]) -> Result<bool, AttError> {
    if value.len() < CCCD_LEN {
        return Err(AttError::InvalidAttributeValueLength);
    }
    Ok(u16::from_le_bytes([value[0], value[1]]) == CCCD_NOTIFY)
}

pub fn encode_cccd(enabled: bool) -> [u8; CCCD_LEN] {
    if enabled { CCCD_NOTIFY.to_le_bytes() } else { [0, 0] }
}

/// Validate a peer write.  `Ok(enabled)` is the new notification state.
pub fn validate_write(attribute: AttributeId, value: &[u8]) -> Result<bool, AttError> {
    match attribute {
        AttributeId::SampleData => Err(AttError::WriteNotPermitted),
        AttributeId::SampleDataConfig => decode_cccd(value),
    }
}

/// Blob-read slicing: `offset` past the end is an error, at the end is empty.
pub fn slice_value(value: &[u8], offset: usize, max_len: usize) -> Result<&[u8], AttError> {
    if offset > value.len() {
        return Err(AttError::InvalidOffset);
    }
    let end = offset.saturating_add(max_len).min(value.len());
    Ok(&value[offset..end])
}

fn to_read_value(bytes: &[u8]) -> ReadValue {
    let mut out = ReadValue::new();
    // Inputs are at most MAX_READ_LEN by construction.
    let _ = out.extend_from_slice(&bytes[..bytes.len().min(MAX_READ_LEN)]);
    out
}

/// Current sample bytes, sliced.  Independent of the dirty flag.
pub fn read_sample(store: &SampleStore, offset: usize, max_len: usize) -> Result<ReadValue, AttError> {
    read_sample_value(&store.latest(), offset, max_len)
}

pub fn read_sample_value(sample: &SensorSample, offset: usize, max_len: usize) -> Result<ReadValue, AttError> {
    let bytes = sample.to_le_bytes();
    slice_value(&bytes, offset, max_len).map(to_read_value)
}

pub fn read_cccd(enabled: bool, offset: usize, max_len: usize) -> Result<ReadValue, AttError> {
    let bytes = encode_cccd(enabled);
    slice_value(&bytes, offset, max_len).map(to_read_value)
}
