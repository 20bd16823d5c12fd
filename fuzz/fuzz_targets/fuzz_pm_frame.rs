//! Fuzz target: `parse_frame`
//!
//! Feeds arbitrary bytes to the PMSA003I frame parser and asserts that it
//! never panics and only accepts frames whose header and checksum hold.
//!
//! cargo fuzz run fuzz_pm_frame

#![no_main]

use envnode::sensors::particulate::{FRAME_LEN, parse_frame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(reading) = parse_frame(data) {
        assert_eq!(data.len(), FRAME_LEN);
        assert_eq!(&data[..2], &[0x42, 0x4D]);
        let sum = data[..FRAME_LEN - 2]
            .iter()
            .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)));
        assert_eq!(sum, u16::from_be_bytes([data[30], data[31]]));
        assert_eq!(reading.pm2_5_env, u16::from_be_bytes([data[12], data[13]]));
    }
});
