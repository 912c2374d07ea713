//! WiFi station-mode adapter.
//!
//! Implements [`LinkPort`], the lowest connectivity tier. `begin_link`
//! only starts an attempt; the connectivity machine polls `is_link_up`
//! and owns the retry cadence, so nothing here sleeps or loops.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi` in STA mode.
//! - **all other targets**: simulation stub for host-side tests.

use log::info;

use crate::app::ports::LinkPort;
use crate::error::CommsError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// 1 to 32 printable ASCII bytes.
pub fn validate_ssid(ssid: &str) -> Result<(), CommsError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(CommsError::WifiConnectFailed);
    }
    Ok(())
}

/// Empty for open networks, otherwise 8 to 64 bytes (WPA2).
pub fn validate_password(password: &str) -> Result<(), CommsError> {
    if password.is_empty() || (8..=64).contains(&password.len()) {
        return Ok(());
    }
    Err(CommsError::WifiConnectFailed)
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiLink {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    attempts: u32,
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(target_os = "espidf")]
    started: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_up: bool,
}

impl WifiLink {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: EspWifi<'static>, ssid: &str, password: &str) -> Result<Self, CommsError> {
        let mut link = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            attempts: 0,
            wifi,
            started: false,
        };
        link.set_credentials(ssid, password)?;
        Ok(link)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(ssid: &str, password: &str) -> Result<Self, CommsError> {
        let mut link = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            attempts: 0,
            sim_up: false,
        };
        link.set_credentials(ssid, password)?;
        Ok(link)
    }

    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), CommsError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| CommsError::WifiConnectFailed)?;
        self.password.clear();
        self.password
            .push_str(password)
            .map_err(|_| CommsError::WifiConnectFailed)?;
        info!("WiFi: credentials set (SSID='{}')", self.ssid);
        Ok(())
    }

    /// Link attempts since boot.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_begin(&mut self) -> Result<(), CommsError> {
        if !self.started {
            let auth_method = if self.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            };
            let config = Configuration::Client(ClientConfiguration {
                ssid: self.ssid.as_str().try_into().map_err(|_| CommsError::WifiConnectFailed)?,
                password: self
                    .password
                    .as_str()
                    .try_into()
                    .map_err(|_| CommsError::WifiConnectFailed)?,
                auth_method,
                ..Default::default()
            });
            self.wifi.set_configuration(&config).map_err(|e| {
                log::warn!("WiFi: configuration rejected: {}", e);
                CommsError::WifiConnectFailed
            })?;
            self.wifi.start().map_err(|e| {
                log::warn!("WiFi: start failed: {}", e);
                CommsError::WifiConnectFailed
            })?;
            self.started = true;
        }
        // Stale association from an earlier attempt; ignore "not connected".
        let _ = self.wifi.disconnect();
        self.wifi.connect().map_err(|e| {
            log::warn!("WiFi: connect request failed: {}", e);
            CommsError::WifiConnectFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_begin(&mut self) -> Result<(), CommsError> {
        self.sim_up = true;
        info!("WiFi(sim): associated with '{}'", self.ssid);
        Ok(())
    }

    /// Simulation hook: drop the link as if the AP went away.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop(&mut self) {
        self.sim_up = false;
    }
}

// ───────────────────────────────────────────────────────────────
// LinkPort
// ───────────────────────────────────────────────────────────────

impl LinkPort for WifiLink {
    #[cfg(target_os = "espidf")]
    fn is_link_up(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_link_up(&self) -> bool {
        self.sim_up
    }

    fn begin_link(&mut self) -> Result<(), CommsError> {
        self.attempts = self.attempts.wrapping_add(1);
        info!("WiFi: connecting to '{}' (attempt {})", self.ssid, self.attempts);
        self.platform_begin()
    }

    #[cfg(target_os = "espidf")]
    fn rssi(&self) -> Option<i8> {
        if !self.is_link_up() {
            return None;
        }
        let mut info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: out-pointer to a zeroed record owned by this frame.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut info) };
        (ret == esp_idf_svc::sys::ESP_OK).then_some(info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn rssi(&self) -> Option<i8> {
        self.sim_up.then_some(-60)
    }
}
