//! Device identity derived from the ESP32 factory MAC address.
//!
//! The identity is the full station MAC as colon-separated uppercase hex
//! (`AA:BB:CC:DD:EE:FF`). It is stable across reboots (eFuse-burned) and is
//! what the authority keys the device on in `identify`, `heartbeat` and the
//! signed `state_update`.

use core::fmt::Write;

/// `AA:BB:CC:DD:EE:FF` is 17 bytes.
pub type DeviceIdString = heapless::String<32>;

pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: `mac` is a 6-byte buffer, the size the call writes.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn device_identity(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(
        id,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    id
}
