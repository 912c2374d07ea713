//! Channel registry.
//!
//! Owns the set of actuation channels (relay output + optional manual input)
//! for the current configuration epoch. Pure data: hardware is touched by
//! the command pipeline, persistence by the gateway.
//!
//! ```text
//!   snapshot ──valid──► load ──┐
//!        └──absent/invalid──► factory defaults ──► (caller persists baseline)
//!   config payload ──► replace_all (previous channels discarded)
//! ```

use core::fmt;

use heapless::{String, Vec};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::{MAX_CHANNELS, MAX_GPIO_ID, MAX_NAME_LEN};
use crate::error::ChannelError;
use crate::persistence::{PersistedSnapshot, SnapshotError};
use crate::pins::FACTORY_CHANNELS;

// ── Identifiers ───────────────────────────────────────────────

/// GPIO-like channel identifier, validated to the board's pin range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(u8);

impl ChannelId {
    pub const fn new(raw: u8) -> Option<Self> {
        if raw <= MAX_GPIO_ID { Some(Self(raw)) } else { None }
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for ChannelId {
    type Error = ChannelError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        u8::try_from(raw)
            .ok()
            .and_then(Self::new)
            .ok_or(ChannelError::InvalidId(raw))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type ChannelName = String<MAX_NAME_LEN>;

/// Copy `name` into a bounded buffer, truncating at a char boundary.
pub fn bounded_name(name: &str) -> ChannelName {
    let mut out = ChannelName::new();
    for c in name.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

fn fallback_name(index: usize) -> ChannelName {
    let mut out = ChannelName::new();
    let _ = fmt::Write::write_fmt(&mut out, format_args!("Switch {}", index + 1));
    out
}

// ── Channel ───────────────────────────────────────────────────

/// Manual input wiring for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualConfig {
    pub input_id: u8,
    pub active_low: bool,
    pub momentary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    /// Mirrors the last successfully applied actuation.
    pub logical_state: bool,
    pub default_state: bool,
    pub name: ChannelName,
    pub manual: Option<ManualConfig>,
    pub override_flag: bool,
}

impl Channel {
    pub fn new(id: ChannelId, name: &str) -> Self {
        Self {
            id,
            logical_state: false,
            default_state: false,
            name: bounded_name(name),
            manual: None,
            override_flag: false,
        }
    }
}

/// Where the current registry contents came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrySource {
    Snapshot,
    /// No usable snapshot; the reason is kept for the boot log.
    FactoryDefaults(SnapshotError),
}

// ── Registry ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    channels: Vec<Channel, MAX_CHANNELS>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled factory map.
    pub fn factory_defaults() -> Self {
        let mut registry = Self::new();
        registry.replace_all(FACTORY_CHANNELS.iter().filter_map(|row| {
            let mut ch = Channel::new(ChannelId::new(row.relay_gpio)?, row.name);
            ch.manual = Some(ManualConfig {
                input_id: row.manual_gpio,
                active_low: true,
                momentary: false,
            });
            Some(ch)
        }));
        registry
    }

    /// Resolve boot precedence: a valid snapshot wins, anything else falls
    /// back to factory defaults. The caller persists the fallback.
    pub fn load(snapshot: Result<PersistedSnapshot, SnapshotError>) -> (Self, RegistrySource) {
        match snapshot.and_then(|s| s.into_channels()) {
            Ok(channels) => {
                let mut registry = Self::new();
                registry.replace_all(channels);
                (registry, RegistrySource::Snapshot)
            }
            Err(reason) => (Self::factory_defaults(), RegistrySource::FactoryDefaults(reason)),
        }
    }

    /// Discard every channel and start a new config epoch.
    ///
    /// Duplicate ids keep their first occurrence; entries past capacity are
    /// ignored. Empty names fall back to "Switch N". Returns the count kept.
    pub fn replace_all<I>(&mut self, channels: I) -> usize
    where
        I: IntoIterator<Item = Channel>,
    {
        self.channels.clear();
        for mut ch in channels {
            if self.get(ch.id).is_some() {
                warn!("registry: duplicate channel {} ignored", ch.id);
                continue;
            }
            if ch.name.is_empty() {
                ch.name = fallback_name(self.channels.len());
            }
            if self.channels.push(ch).is_err() {
                warn!("registry: more than {} channels, rest ignored", MAX_CHANNELS);
                break;
            }
        }
        self.channels.len()
    }

    pub fn get(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn for_each(&self, f: impl FnMut(&Channel)) {
        self.channels.iter().for_each(f);
    }

    /// Set the logical state. `Ok(true)` when the state actually changed.
    pub fn apply_state(&mut self, id: ChannelId, state: bool) -> Result<bool, ChannelError> {
        let ch = self.get_mut(id).ok_or(ChannelError::Unknown(id))?;
        let changed = ch.logical_state != state;
        ch.logical_state = state;
        Ok(changed)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
