//! System configuration parameters
//!
//! All tunable parameters for the relay controller. Runtime values are
//! persisted through [`ConfigPort`](crate::app::ports::ConfigPort); the
//! capacities below are compiled in because they size static buffers.

use heapless::String;
use serde::{Deserialize, Serialize};

/// Maximum number of channels the registry can hold.
pub const MAX_CHANNELS: usize = 8;
/// Bounded command queue capacity.
pub const COMMAND_QUEUE_CAPACITY: usize = 16;
/// Upper bound for the per-cadence drain batch.
pub const MAX_DRAIN_BATCH: usize = 8;
/// Longest channel name kept; longer names are truncated.
pub const MAX_NAME_LEN: usize = 24;
/// Highest GPIO-like identifier accepted for relays and manual inputs.
pub const MAX_GPIO_ID: u8 = 48;

pub const SECRET_LEN: usize = 64;
pub const URI_LEN: usize = 96;
pub const SSID_LEN: usize = 32;
pub const PASSWORD_LEN: usize = 64;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Identity / network ---
    /// Shared secret presented in `identify` and used to sign state updates.
    pub device_secret: String<SECRET_LEN>,
    /// WebSocket endpoint of the remote authority.
    pub backend_uri: String<URI_LEN>,
    pub wifi_ssid: String<SSID_LEN>,
    pub wifi_password: String<PASSWORD_LEN>,

    // --- Hardware ---
    /// Relay modules switch on when the pin is driven LOW.
    pub relay_active_low: bool,

    // --- Debounce ---
    /// Hardware noise window for manual inputs (milliseconds)
    pub manual_debounce_ms: u32,
    /// Coalescing window for outbound state updates (milliseconds)
    pub state_debounce_ms: u32,

    // --- Command pipeline ---
    /// Cadence of the queue drain step (milliseconds)
    pub command_drain_interval_ms: u32,
    /// Commands applied per drain step
    pub command_drain_batch: u8,

    // --- Connectivity ---
    pub link_retry_interval_ms: u32,
    pub identify_retry_interval_ms: u32,
    pub heartbeat_interval_ms: u32,

    // --- Persistence ---
    /// Minimum spacing between two snapshot writes (milliseconds)
    pub min_save_interval_ms: u32,

    // --- Liveness / timing ---
    pub watchdog_timeout_ms: u32,
    pub status_report_interval_ms: u32,
    /// Control loop sleep between iterations (milliseconds)
    pub loop_interval_ms: u32,

    // --- Inbound rate guard ---
    pub inbound_rate_per_sec: u16,
    pub inbound_burst: u16,
}

impl SystemConfig {
    /// Drain batch clamped to the static bound.
    pub fn drain_batch(&self) -> usize {
        (self.command_drain_batch as usize).clamp(1, MAX_DRAIN_BATCH)
    }
}

fn from_env<const N: usize>(value: Option<&'static str>, fallback: &str) -> String<N> {
    let mut out = String::new();
    for c in value.unwrap_or(fallback).chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            device_secret: from_env(option_env!("RELAYNODE_DEVICE_SECRET"), ""),
            backend_uri: from_env(
                option_env!("RELAYNODE_BACKEND_URI"),
                "ws://192.168.1.10:3001/esp32-ws",
            ),
            wifi_ssid: from_env(option_env!("RELAYNODE_WIFI_SSID"), ""),
            wifi_password: from_env(option_env!("RELAYNODE_WIFI_PASSWORD"), ""),

            relay_active_low: true,

            manual_debounce_ms: 30,
            state_debounce_ms: 200,

            command_drain_interval_ms: 100,
            command_drain_batch: 4,

            link_retry_interval_ms: 30_000,
            identify_retry_interval_ms: 10_000,
            heartbeat_interval_ms: 30_000,

            min_save_interval_ms: 2_000,

            watchdog_timeout_ms: 10_000,
            status_report_interval_ms: 5_000,
            loop_interval_ms: 10,

            inbound_rate_per_sec: 20,
            inbound_burst: 32,
        }
    }
}
