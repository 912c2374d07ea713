//! Command pipeline.
//!
//! The single code path that mutates channel state. Remote commands and
//! manual-input requests both enter through [`CommandPipeline::enqueue`];
//! the drain step applies them in FIFO order on a fixed cadence, a small
//! batch at a time.
//!
//! ```text
//!  enqueue ──► [bounded queue, N=16] ──► drain (every interval, ≤ batch)
//!     │ full → Dropped(QueueFull)              │
//!     ▼                                        ▼
//!  caller reports                    apply: superseded? stale? unknown?
//!                                           drive → state → mark dirty
//!                                           → request broadcast
//! ```
//!
//! Every command is stamped with the sequence space it arrived in. A fresh
//! identify or config payload starts a new space, so remote commands still
//! queued from the old one are dropped instead of re-seeding the tracker.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::{FnvIndexMap, Vec};
use log::{debug, warn};

use crate::app::ports::RelayPort;
use crate::config::{COMMAND_QUEUE_CAPACITY, MAX_CHANNELS, MAX_DRAIN_BATCH};
use crate::debounce::StateBroadcastDebouncer;
use crate::error::{ActuatorError, ChannelError};
use crate::persistence::PersistenceGateway;
use crate::registry::{ChannelId, ChannelRegistry};

pub type CommandQueue = Channel<CriticalSectionRawMutex, Command, COMMAND_QUEUE_CAPACITY>;

// ── Commands ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    Remote,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub channel: ChannelId,
    pub desired: bool,
    pub enqueued_ms: u64,
    pub seq: Option<u64>,
    pub source: CommandSource,
    /// Sequence space at enqueue time; set by [`CommandPipeline::enqueue`].
    pub space: u32,
}

impl Command {
    pub fn remote(channel: ChannelId, desired: bool, seq: Option<u64>, now_ms: u64) -> Self {
        Self { channel, desired, enqueued_ms: now_ms, seq, source: CommandSource::Remote, space: 0 }
    }

    pub fn manual(channel: ChannelId, desired: bool, now_ms: u64) -> Self {
        Self { channel, desired, enqueued_ms: now_ms, seq: None, source: CommandSource::Manual, space: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    QueueFull,
    /// Remote command from before the latest identify or config payload.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Accepted,
    Dropped(DropReason),
}

/// What happened to one dequeued command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Applied. `changed` is false for a repeat of the current state.
    Applied { command: Command, changed: bool },
    /// Sequence not newer than the last applied one; no effect.
    Stale { command: Command, last: u64 },
    /// Remote command queued before the current sequence space began.
    Superseded { command: Command },
    /// Channel id not in the current config epoch.
    Rejected { command: Command, error: ChannelError },
    /// Output could not be driven; logical state untouched.
    ActuationFailed { command: Command, error: ActuatorError },
}

// ── Sequence tracking ─────────────────────────────────────────

/// Last applied remote sequence per channel. Capacity is the next power of
/// two above the channel count.
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    last: FnvIndexMap<ChannelId, u64, { MAX_CHANNELS * 2 }>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_applied(&self, channel: ChannelId) -> Option<u64> {
        self.last.get(&channel).copied()
    }

    /// `Some(last)` when `seq` is not newer than the recorded one.
    pub fn check_stale(&self, channel: ChannelId, seq: u64) -> Option<u64> {
        self.last_applied(channel).filter(|&last| seq <= last)
    }

    pub fn record(&mut self, channel: ChannelId, seq: u64) {
        if self.last.insert(channel, seq).is_err() {
            // Map only fills up with ids from old epochs; start over.
            self.last.clear();
            let _ = self.last.insert(channel, seq);
        }
    }

    pub fn clear(&mut self) {
        self.last.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

// ── Pipeline ──────────────────────────────────────────────────

pub struct CommandPipeline {
    queue: CommandQueue,
    sequences: SequenceTracker,
    space: u32,
    drain_interval_ms: u64,
    batch: usize,
    last_drain_ms: Option<u64>,
    dropped_total: u32,
}

impl CommandPipeline {
    pub fn new(drain_interval_ms: u32, batch: usize) -> Self {
        Self {
            queue: Channel::new(),
            sequences: SequenceTracker::new(),
            space: 0,
            drain_interval_ms: u64::from(drain_interval_ms),
            batch: batch.clamp(1, MAX_DRAIN_BATCH),
            last_drain_ms: None,
            dropped_total: 0,
        }
    }

    /// Never blocks. On overflow the new command is dropped.
    pub fn enqueue(&mut self, command: Command) -> Enqueue {
        let command = Command { space: self.space, ..command };
        match self.queue.try_send(command) {
            Ok(()) => Enqueue::Accepted,
            Err(_) => {
                self.dropped_total = self.dropped_total.saturating_add(1);
                warn!("pipeline: queue full, dropped command for channel {}", command.channel);
                Enqueue::Dropped(DropReason::QueueFull)
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn dropped_total(&self) -> u32 {
        self.dropped_total
    }

    pub fn sequences(&self) -> &SequenceTracker {
        &self.sequences
    }

    /// Fresh session or config epoch: the authority may reuse sequence
    /// numbers. Remote commands still queued from before are superseded.
    pub fn start_sequence_space(&mut self) {
        self.sequences.clear();
        self.space = self.space.wrapping_add(1);
    }

    /// Whether the drain cadence has elapsed.
    pub fn drain_due(&self, now_ms: u64) -> bool {
        self.last_drain_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.drain_interval_ms)
    }

    /// Apply at most one batch if the cadence has elapsed.
    pub fn drain(
        &mut self,
        now_ms: u64,
        registry: &mut ChannelRegistry,
        relays: &mut impl RelayPort,
        persistence: &mut PersistenceGateway,
        broadcast: &mut StateBroadcastDebouncer,
    ) -> Vec<ApplyOutcome, MAX_DRAIN_BATCH> {
        let mut outcomes = Vec::new();
        if !self.drain_due(now_ms) {
            return outcomes;
        }
        self.last_drain_ms = Some(now_ms);
        for _ in 0..self.batch {
            let Ok(command) = self.queue.try_receive() else { break };
            let _ = outcomes.push(self.apply(command, registry, relays, persistence, broadcast));
        }
        outcomes
    }

    /// Apply one command: space and staleness filters, lookup, drive, then
    /// record.
    pub fn apply(
        &mut self,
        command: Command,
        registry: &mut ChannelRegistry,
        relays: &mut impl RelayPort,
        persistence: &mut PersistenceGateway,
        broadcast: &mut StateBroadcastDebouncer,
    ) -> ApplyOutcome {
        if command.source == CommandSource::Remote && command.space != self.space {
            debug!("pipeline: command for channel {} predates sequence space {}", command.channel, self.space);
            return ApplyOutcome::Superseded { command };
        }

        if let Some(seq) = command.seq {
            if let Some(last) = self.sequences.check_stale(command.channel, seq) {
                debug!("pipeline: stale seq {} <= {} on channel {}", seq, last, command.channel);
                return ApplyOutcome::Stale { command, last };
            }
        }

        let Some(channel) = registry.get_mut(command.channel) else {
            return ApplyOutcome::Rejected {
                command,
                error: ChannelError::Unknown(command.channel),
            };
        };

        let state_changed = channel.logical_state != command.desired;
        if state_changed {
            if let Err(error) = relays.drive(command.channel, command.desired) {
                return ApplyOutcome::ActuationFailed { command, error };
            }
            channel.logical_state = command.desired;
        }

        let override_changed =
            command.source == CommandSource::Manual && !channel.override_flag;
        if override_changed {
            channel.override_flag = true;
        }

        if let Some(seq) = command.seq {
            self.sequences.record(command.channel, seq);
        }

        let changed = state_changed || override_changed;
        if changed {
            persistence.mark_dirty();
            broadcast.request();
        }
        ApplyOutcome::Applied { command, changed }
    }
}
