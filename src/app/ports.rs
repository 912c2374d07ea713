//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ RelayController (domain)
//! ```
//!
//! Driven adapters (relay board, manual inputs, link, session transport,
//! event sinks, storage) implement these traits. The
//! [`RelayController`](super::service::RelayController) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! Every call is expected to return quickly. Any internal blocking is the
//! adapter's concern.

use embedded_hal::digital::PinState;

use crate::config::SystemConfig;
use crate::error::{ActuatorError, CommsError};
use crate::registry::ChannelId;

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for relay outputs.
pub trait RelayPort {
    /// Drive the relay for `channel` to the logical state `on`.
    /// Polarity (active-low modules) is the adapter's concern.
    fn drive(&mut self, channel: ChannelId, on: bool) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Manual input port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for manual switch inputs.
pub trait InputPort {
    /// Configure `input` with the pull matching its polarity.
    fn configure_input(&mut self, input: u8, active_low: bool);

    /// Raw electrical level of `input`.
    fn read_level(&mut self, input: u8) -> PinState;
}

// ───────────────────────────────────────────────────────────────
// Link port (driven adapter: domain ↔ Wi-Fi)
// ───────────────────────────────────────────────────────────────

/// The underlying network link.
pub trait LinkPort {
    fn is_link_up(&self) -> bool;

    /// Start a (non-blocking) link attempt.
    fn begin_link(&mut self) -> Result<(), CommsError>;

    /// Signal strength of the current link, if known.
    fn rssi(&self) -> Option<i8>;
}

// ───────────────────────────────────────────────────────────────
// Session transport (driven adapter: domain ↔ WebSocket)
// ───────────────────────────────────────────────────────────────

/// Message-oriented connection to the remote authority.
pub trait SessionTransport {
    fn is_open(&self) -> bool;

    /// Send one text frame.
    fn send_text(&mut self, text: &str) -> Result<(), CommsError>;

    /// Next inbound text frame, if any arrived.
    fn next_frame(&mut self) -> Option<String>;
}

// ───────────────────────────────────────────────────────────────
// Status indicator (driven adapter: domain → LED)
// ───────────────────────────────────────────────────────────────

pub trait StatusIndicator {
    fn set_indicator(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic; no partial writes on power loss.
///   The ESP-IDF NVS API guarantees this natively; in-memory simulation
///   achieves it trivially.
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
