//! Fuzz target: peer attribute writes and blob reads
//!
//! The first byte picks the attribute and the read offset, the rest is the
//! written value.  Asserts that write validation and read slicing never
//! panic and never hand back more than was asked for.
//!
//! cargo fuzz run fuzz_att_write

#![no_main]

use envnode::error::AttError;
use envnode::link::att::{AttributeId, read_cccd, read_sample_value, validate_write};
use envnode::store::{SAMPLE_WIRE_LEN, SensorSample};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, value)) = data.split_first() else {
        return;
    };
    let attribute = if selector & 1 == 0 {
        AttributeId::SampleData
    } else {
        AttributeId::SampleDataConfig
    };

    match validate_write(attribute, value) {
        Ok(enabled) => {
            assert_eq!(attribute, AttributeId::SampleDataConfig);
            assert_eq!(enabled, value.starts_with(&[0x01, 0x00]));
            let offset = usize::from(selector >> 1) % 4;
            match read_cccd(enabled, offset, 22) {
                Ok(v) => assert!(offset + v.len() <= 2),
                Err(e) => assert_eq!(e, AttError::InvalidOffset),
            }
        }
        Err(AttError::WriteNotPermitted) => assert_eq!(attribute, AttributeId::SampleData),
        Err(e) => assert_eq!(e, AttError::InvalidAttributeValueLength),
    }

    let offset = usize::from(selector >> 1);
    let max_len = value.len();
    let sample = SensorSample { temperature: f32::from(selector), ..SensorSample::ZERO };
    match read_sample_value(&sample, offset, max_len) {
        Ok(v) => assert!(v.len() <= max_len && offset + v.len() <= SAMPLE_WIRE_LEN),
        Err(e) => {
            assert_eq!(e, AttError::InvalidOffset);
            assert!(offset > SAMPLE_WIRE_LEN);
        }
    }
});
