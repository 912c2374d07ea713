//! Persistence gateway.
//!
//! Rate-limited durable store for the channel registry. Mutations only set a
//! dirty flag; [`PersistenceGateway::maybe_flush`] writes the whole snapshot
//! at most once per `min_save_interval_ms`, so rapid toggling costs one
//! flash write per interval rather than one per toggle.
//!
//! The snapshot is a single postcard blob written with one storage call,
//! so a save is all-or-nothing at the storage layer.

use core::fmt;

use heapless::Vec;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{StorageError, StoragePort};
use crate::config::MAX_CHANNELS;
use crate::registry::{Channel, ChannelId, ChannelName, ChannelRegistry, ManualConfig};

/// NVS namespace holding the channel snapshot.
pub const SNAPSHOT_NAMESPACE: &str = "switchcfg";
pub const SNAPSHOT_KEY: &str = "snapshot";
pub const SNAPSHOT_VERSION: u8 = 1;
/// Upper bound for an encoded snapshot.
pub const SNAPSHOT_MAX_BYTES: usize = 512;

// ── Snapshot format ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedChannel {
    pub id: u8,
    pub state: bool,
    pub default: bool,
    pub manual_enabled: bool,
    pub manual_input_id: u8,
    pub active_low: bool,
    pub momentary: bool,
    pub name: ChannelName,
    pub override_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub version: u8,
    pub count: u8,
    pub channels: Vec<PersistedChannel, MAX_CHANNELS>,
}

/// Why a snapshot could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotError {
    /// Nothing stored yet.
    Absent,
    /// Stored bytes do not decode.
    Corrupted,
    /// Decoded but violates a registry invariant.
    Invalid(&'static str),
    /// Storage backend failed.
    Storage(StorageError),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "no snapshot stored"),
            Self::Corrupted => write!(f, "snapshot corrupted"),
            Self::Invalid(why) => write!(f, "snapshot invalid: {why}"),
            Self::Storage(e) => write!(f, "snapshot storage: {e}"),
        }
    }
}

impl PersistedSnapshot {
    pub fn from_registry(registry: &ChannelRegistry) -> Self {
        let mut channels = Vec::new();
        for ch in registry.iter() {
            let manual = ch.manual;
            // Registry capacity equals snapshot capacity.
            let _ = channels.push(PersistedChannel {
                id: ch.id.get(),
                state: ch.logical_state,
                default: ch.default_state,
                manual_enabled: manual.is_some(),
                manual_input_id: manual.map_or(0, |m| m.input_id),
                active_low: manual.is_none_or(|m| m.active_low),
                momentary: manual.is_some_and(|m| m.momentary),
                name: ch.name.clone(),
                override_flag: ch.override_flag,
            });
        }
        Self {
            version: SNAPSHOT_VERSION,
            count: channels.len() as u8,
            channels,
        }
    }

    /// Validate and convert back into registry channels. Never yields a
    /// partial result.
    pub fn into_channels(self) -> Result<Vec<Channel, MAX_CHANNELS>, SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Invalid("version mismatch"));
        }
        if self.count as usize != self.channels.len() {
            return Err(SnapshotError::Invalid("count mismatch"));
        }
        let mut out: Vec<Channel, MAX_CHANNELS> = Vec::new();
        for p in self.channels {
            let id = ChannelId::new(p.id).ok_or(SnapshotError::Invalid("channel id out of range"))?;
            if out.iter().any(|c| c.id == id) {
                return Err(SnapshotError::Invalid("duplicate channel id"));
            }
            let manual = if p.manual_enabled {
                ChannelId::new(p.manual_input_id)
                    .ok_or(SnapshotError::Invalid("manual input out of range"))?;
                Some(ManualConfig {
                    input_id: p.manual_input_id,
                    active_low: p.active_low,
                    momentary: p.momentary,
                })
            } else {
                None
            };
            let _ = out.push(Channel {
                id,
                logical_state: p.state,
                default_state: p.default,
                name: p.name,
                manual,
                override_flag: p.override_flag,
            });
        }
        Ok(out)
    }

    pub fn encode(&self) -> Result<std::vec::Vec<u8>, StorageError> {
        postcard::to_allocvec(self).map_err(|_| StorageError::IoError)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        postcard::from_bytes(bytes).map_err(|_| SnapshotError::Corrupted)
    }
}

// ── Gateway ───────────────────────────────────────────────────

/// Result of a [`PersistenceGateway::maybe_flush`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing to write.
    Clean,
    /// Dirty, but the minimum interval has not elapsed.
    Deferred,
    Saved,
    /// Write failed; still dirty, retried after the interval.
    Failed(StorageError),
}

#[derive(Debug, Clone)]
pub struct PersistenceGateway {
    dirty: bool,
    last_flush_ms: Option<u64>,
    min_interval_ms: u64,
    saves: u32,
}

impl PersistenceGateway {
    pub fn new(min_interval_ms: u32) -> Self {
        Self {
            dirty: false,
            last_flush_ms: None,
            min_interval_ms: u64::from(min_interval_ms),
            saves: 0,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of successful writes since boot.
    pub fn save_count(&self) -> u32 {
        self.saves
    }

    /// Flush if dirty and the minimum interval has elapsed since the last
    /// attempt.
    pub fn maybe_flush(
        &mut self,
        now_ms: u64,
        registry: &ChannelRegistry,
        storage: &mut impl StoragePort,
    ) -> FlushOutcome {
        if !self.dirty {
            return FlushOutcome::Clean;
        }
        if let Some(last) = self.last_flush_ms {
            if now_ms.saturating_sub(last) < self.min_interval_ms {
                return FlushOutcome::Deferred;
            }
        }
        match self.save(now_ms, registry, storage) {
            Ok(()) => FlushOutcome::Saved,
            Err(e) => FlushOutcome::Failed(e),
        }
    }

    /// Write the full snapshot now, bypassing the interval.
    pub fn save(
        &mut self,
        now_ms: u64,
        registry: &ChannelRegistry,
        storage: &mut impl StoragePort,
    ) -> Result<(), StorageError> {
        self.last_flush_ms = Some(now_ms);
        let bytes = PersistedSnapshot::from_registry(registry).encode()?;
        match storage.write(SNAPSHOT_NAMESPACE, SNAPSHOT_KEY, &bytes) {
            Ok(()) => {
                self.dirty = false;
                self.saves = self.saves.wrapping_add(1);
                info!("persistence: saved {} channels ({} bytes)", registry.len(), bytes.len());
                Ok(())
            }
            Err(e) => {
                warn!("persistence: save failed: {:?}", e);
                Err(e)
            }
        }
    }

    /// Read the stored snapshot: a decoded snapshot or an explicit reason
    /// it is unusable.
    pub fn load(storage: &impl StoragePort) -> Result<PersistedSnapshot, SnapshotError> {
        let mut buf = [0u8; SNAPSHOT_MAX_BYTES];
        match storage.read(SNAPSHOT_NAMESPACE, SNAPSHOT_KEY, &mut buf) {
            Ok(len) => PersistedSnapshot::decode(&buf[..len]),
            Err(StorageError::NotFound) => Err(SnapshotError::Absent),
            Err(e) => Err(SnapshotError::Storage(e)),
        }
    }
}
