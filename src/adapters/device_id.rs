//! Advertised local name.
//!
//! `envnode-xxyyzz` where `xxyyzz` is the tail of the Bluetooth MAC, the
//! address peers actually see in scan results.  The BT MAC is derived from
//! the eFuse base MAC, so the name is stable across reboots.

use core::fmt::Write;

pub type MacAddress = [u8; 6];

pub type DeviceName = heapless::String<24>;

const NAME_PREFIX: &str = "envnode-";

/// Bluetooth MAC.  Falls back to the raw eFuse base MAC if the derived
/// address cannot be read.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    use esp_idf_svc::sys::{ESP_OK, esp_efuse_mac_get_default, esp_mac_type_t_ESP_MAC_BT, esp_read_mac};

    let mut mac: MacAddress = [0u8; 6];
    let ret = unsafe { esp_read_mac(mac.as_mut_ptr(), esp_mac_type_t_ESP_MAC_BT) };
    if ret != ESP_OK as i32 {
        log::warn!("device_id: BT MAC read failed ({}), using base MAC", ret);
        unsafe {
            esp_efuse_mac_get_default(mac.as_mut_ptr());
        }
    }
    mac
}

#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn device_name(mac: &MacAddress) -> DeviceName {
    let mut name = DeviceName::new();
    let [.., a, b, c] = *mac;
    // 8 + 6 chars always fits.
    let _ = write!(name, "{NAME_PREFIX}{a:02x}{b:02x}{c:02x}");
    name
}
