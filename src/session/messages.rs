//! Session message types.
//!
//! Inbound frames are decoded once at the boundary into [`Inbound`];
//! everything past the codec matches on the enum. Outbound messages are
//! serialised straight from [`Outbound`] with serde's internal tagging, so
//! the `type` strings live only in attributes.

use heapless::String;
use serde::Serialize;

use crate::registry::{Channel, ChannelId, ChannelName, ChannelRegistry, ManualConfig};

// ───────────────────────────────────────────────────────────────
// Inbound
// ───────────────────────────────────────────────────────────────

/// One channel entry of a configuration payload, defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub id: ChannelId,
    pub state: bool,
    pub default: bool,
    pub manual: Option<ManualConfig>,
    pub name: ChannelName,
    pub override_flag: bool,
}

impl ChannelSpec {
    pub fn into_channel(self) -> Channel {
        Channel {
            id: self.id,
            logical_state: self.state,
            default_state: self.default,
            name: self.name,
            manual: self.manual,
            override_flag: self.override_flag,
        }
    }
}

/// Valid entries of a `switches` array plus how many were malformed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecList {
    pub specs: Vec<ChannelSpec>,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteCommand {
    pub channel: ChannelId,
    pub state: bool,
    pub seq: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Identify accepted. `switches` is `None` when the payload carried no
    /// configuration.
    Identified {
        mode: Option<std::string::String>,
        switches: Option<SpecList>,
    },
    ConfigUpdate {
        switches: Option<SpecList>,
    },
    SwitchCommand(RemoteCommand),
    /// Well-formed items only; `total` counts every item received.
    BulkSwitchCommand {
        commands: Vec<RemoteCommand>,
        total: usize,
    },
    StateAck {
        changed: Option<u64>,
    },
}

// ───────────────────────────────────────────────────────────────
// Outbound
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchReport {
    pub id: u8,
    pub state: bool,
    pub override_flag: bool,
}

/// Hex HMAC-SHA256 tag.
pub type Signature = String<64>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound<'a> {
    #[serde(rename_all = "camelCase")]
    Identify {
        device_identity: &'a str,
        secret: &'a str,
        offline_capable: bool,
    },
    StateUpdate {
        seq: u64,
        ts: u64,
        switches: Vec<SwitchReport>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sig: Option<Signature>,
    },
    #[serde(rename_all = "camelCase")]
    Heartbeat {
        identity: &'a str,
        uptime_seconds: u64,
        offline_mode: bool,
    },
    BulkSwitchResult {
        processed: usize,
        total: usize,
    },
}

impl<'a> Outbound<'a> {
    pub fn identify(identity: &'a str, secret: &'a str) -> Self {
        Self::Identify {
            device_identity: identity,
            secret,
            offline_capable: true,
        }
    }

    /// Snapshot every channel; signed when `secret` is non-empty.
    pub fn state_update(registry: &ChannelRegistry, identity: &str, secret: &str, seq: u64, ts: u64) -> Self {
        let switches = registry
            .iter()
            .map(|ch| SwitchReport {
                id: ch.id.get(),
                state: ch.logical_state,
                override_flag: ch.override_flag,
            })
            .collect();
        let sig = (!secret.is_empty()).then(|| super::codec::sign_state(secret, identity, seq, ts));
        Self::StateUpdate { seq, ts, switches, sig }
    }

    /// Whether this message may leave before the session is established.
    pub fn allowed_before_session(&self) -> bool {
        matches!(self, Self::Identify { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Identify { .. } => "identify",
            Self::StateUpdate { .. } => "state_update",
            Self::Heartbeat { .. } => "heartbeat",
            Self::BulkSwitchResult { .. } => "bulk_switch_result",
        }
    }
}
