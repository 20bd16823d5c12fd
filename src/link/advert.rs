//! Advertising payload and link parameter builders.

use crate::app::ports::{AdvertisingParams, ConnParams};
use crate::config::LinkConfig;

/// Environmental sensing service.
pub const SERVICE_UUID: u128 = 0x8985ec22_ba8e_4009_8966_7c0d4f25460d;
/// Sample data characteristic (read + notify).
pub const SAMPLE_CHAR_UUID: u128 = 0x2ce00ed4_b48a_4f0f_9dc9_34a71b75526b;
/// Client characteristic configuration descriptor.
pub const CCCD_UUID16: u16 = 0x2902;

const MAX_AD_LEN: usize = 31;

const AD_TYPE_FLAGS: u8 = 0x01;
const AD_TYPE_COMPLETE_UUID128: u8 = 0x07;
const AD_TYPE_SHORT_NAME: u8 = 0x08;
const AD_TYPE_COMPLETE_NAME: u8 = 0x09;

/// LE General Discoverable, BR/EDR not supported.
const FLAGS_GENERAL_NO_BREDR: u8 = 0x06;

pub type AdPayload = heapless::Vec<u8, MAX_AD_LEN>;

/// Flags + complete 128-bit service UUID list (21 bytes).
pub fn advertising_payload() -> AdPayload {
    let mut p = AdPayload::new();
    let _ = p.extend_from_slice(&[0x02, AD_TYPE_FLAGS, FLAGS_GENERAL_NO_BREDR]);
    let _ = p.extend_from_slice(&[0x11, AD_TYPE_COMPLETE_UUID128]);
    let _ = p.extend_from_slice(&SERVICE_UUID.to_le_bytes());
    p
}

/// Local name; shortened to fit when longer than one AD structure allows.
pub fn scan_response(name: &str) -> AdPayload {
    let max = MAX_AD_LEN - 2;
    let bytes = name.as_bytes();
    let (ad_type, used) = if bytes.len() > max {
        (AD_TYPE_SHORT_NAME, &bytes[..max])
    } else {
        (AD_TYPE_COMPLETE_NAME, bytes)
    };
    let mut p = AdPayload::new();
    let _ = p.push(used.len() as u8 + 1);
    let _ = p.push(ad_type);
    let _ = p.extend_from_slice(used);
    p
}

pub fn advertising_params(cfg: &LinkConfig, name: &str) -> AdvertisingParams {
    AdvertisingParams {
        interval: cfg.adv_interval,
        payload: advertising_payload(),
        scan_response: scan_response(name),
    }
}

pub fn connection_params(cfg: &LinkConfig) -> ConnParams {
    ConnParams {
        interval_min: cfg.conn_interval_min,
        interval_max: cfg.conn_interval_max,
        latency: cfg.peripheral_latency,
        supervision_timeout: cfg.supervision_timeout,
    }
}
