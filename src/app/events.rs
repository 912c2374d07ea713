//! Outbound application events.
//!
//! The [`RelayController`](super::service::RelayController) emits these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters on the
//! other side decide what to do with them; on the device they become log
//! lines.

use crate::app::ports::StorageError;
use crate::error::{ActuatorError, CommsError};
use crate::fsm::ConnectivityState;
use crate::pipeline::{CommandSource, DropReason};
use crate::registry::{ChannelId, RegistrySource};
use crate::session::DecodeError;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Boot finished; carries where the channel map came from.
    Started { channels: usize, source: RegistrySource },

    /// A channel's state or override flag changed.
    ChannelChanged {
        channel: ChannelId,
        state: bool,
        override_flag: bool,
        source: CommandSource,
    },

    /// The bounded queue was full; the command was discarded.
    CommandDropped { channel: ChannelId, reason: DropReason },

    /// The channel id is not part of the current configuration.
    UnknownChannel(ChannelId),

    /// A remote command carried a sequence not newer than the last applied.
    StaleCommand { channel: ChannelId, seq: u64, last: u64 },

    /// The relay output could not be driven.
    ActuationFailed { channel: ChannelId, error: ActuatorError },

    /// The connectivity machine changed tier.
    ConnectivityChanged { from: ConnectivityState, to: ConnectivityState },

    /// A configuration payload replaced the channel map.
    ConfigReplaced { channels: usize, skipped: usize },

    /// A bulk command request was processed.
    BulkProcessed { processed: usize, total: usize },

    /// The authority acknowledged a state update.
    StateAcknowledged { changed: Option<u64> },

    /// An inbound frame could not be decoded.
    MalformedMessage(DecodeError),

    /// An inbound frame exceeded the rate budget.
    FrameThrottled,

    /// Sending to the authority failed.
    SendFailed { kind: &'static str, error: CommsError },

    /// The channel snapshot was written.
    Persisted { channels: usize },

    /// The channel snapshot could not be written; retried later.
    PersistFailed(StorageError),

    /// Periodic status report.
    Status(StatusReport),
}

/// A point-in-time status snapshot suitable for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub connectivity: ConnectivityState,
    pub identified: bool,
    pub channels: usize,
    pub channels_on: usize,
    pub queue_depth: usize,
    pub dropped_total: u32,
    pub throttled_total: u32,
    pub rssi: Option<i8>,
    pub uptime_secs: u64,
}
