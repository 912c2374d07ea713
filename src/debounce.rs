//! Debounce engine.
//!
//! Two independent windows live here and never share a timer:
//!
//! - [`DebounceTracker`] filters hardware noise on manual inputs (short
//!   window, ~30 ms) and turns raw samples into stable transitions.
//! - [`StateBroadcastDebouncer`] coalesces outbound state updates (longer
//!   window, ~200 ms).
//!
//! ```text
//!  raw level ──► DebounceTracker ──► StableTransition ──► resolve() ──► ManualRequest
//!                 (per input)                             (momentary / maintained)
//! ```

use embedded_hal::digital::PinState;
use heapless::Vec;

use crate::app::ports::InputPort;
use crate::config::MAX_CHANNELS;
use crate::registry::{ChannelId, ChannelRegistry, ManualConfig};

// ── Per-input tracker ─────────────────────────────────────────

/// A committed level change, expressed in logical terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StableTransition {
    /// Debounced input is now active.
    pub active: bool,
    /// Active flag before this commit.
    pub was_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTracker {
    last_raw: PinState,
    last_raw_change_ms: u64,
    stable: PinState,
    last_stable_active: bool,
    active_low: bool,
}

fn is_active(level: PinState, active_low: bool) -> bool {
    if active_low { level == PinState::Low } else { level == PinState::High }
}

impl DebounceTracker {
    /// Seed from the current raw level so boot never reports an edge.
    pub fn seeded(level: PinState, active_low: bool, now_ms: u64) -> Self {
        Self {
            last_raw: level,
            last_raw_change_ms: now_ms,
            stable: level,
            last_stable_active: is_active(level, active_low),
            active_low,
        }
    }

    /// Feed one raw sample. Returns a transition once `raw` has held a new
    /// level for `window_ms`.
    pub fn sample(&mut self, raw: PinState, now_ms: u64, window_ms: u32) -> Option<StableTransition> {
        if raw != self.last_raw {
            self.last_raw = raw;
            self.last_raw_change_ms = now_ms;
        }
        if raw == self.stable || now_ms.saturating_sub(self.last_raw_change_ms) < u64::from(window_ms) {
            return None;
        }
        self.stable = raw;
        let active = is_active(raw, self.active_low);
        let was_active = self.last_stable_active;
        self.last_stable_active = active;
        Some(StableTransition { active, was_active })
    }

    pub fn is_stable_active(&self) -> bool {
        self.last_stable_active
    }
}

/// Map a stable transition to the desired channel state, if any.
///
/// Momentary inputs toggle on the rising edge into active. Maintained
/// inputs follow the debounced level whenever it differs from the
/// channel's current state.
pub fn resolve(transition: StableTransition, momentary: bool, current_state: bool) -> Option<bool> {
    if momentary {
        (transition.active && !transition.was_active).then_some(!current_state)
    } else {
        (transition.active != current_state).then_some(transition.active)
    }
}

// ── Manual inputs ─────────────────────────────────────────────

/// A command synthesised from a manual input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualRequest {
    pub channel: ChannelId,
    pub desired: bool,
}

struct Slot {
    channel: ChannelId,
    config: ManualConfig,
    tracker: DebounceTracker,
}

/// Trackers for every channel with a manual input, rebuilt per config epoch.
pub struct ManualInputs {
    window_ms: u32,
    slots: Vec<Slot, MAX_CHANNELS>,
}

impl ManualInputs {
    pub fn new(window_ms: u32) -> Self {
        Self {
            window_ms,
            slots: Vec::new(),
        }
    }

    /// Drop every tracker and seed fresh ones from `registry`.
    pub fn reseed(&mut self, registry: &ChannelRegistry, inputs: &mut impl InputPort, now_ms: u64) {
        self.slots.clear();
        for ch in registry.iter() {
            let Some(config) = ch.manual else { continue };
            inputs.configure_input(config.input_id, config.active_low);
            let level = inputs.read_level(config.input_id);
            let _ = self.slots.push(Slot {
                channel: ch.id,
                config,
                tracker: DebounceTracker::seeded(level, config.active_low, now_ms),
            });
        }
    }

    /// Sample every input once and collect the resulting requests.
    pub fn poll(
        &mut self,
        now_ms: u64,
        registry: &ChannelRegistry,
        inputs: &mut impl InputPort,
    ) -> Vec<ManualRequest, MAX_CHANNELS> {
        let mut out = Vec::new();
        for slot in &mut self.slots {
            let raw = inputs.read_level(slot.config.input_id);
            let Some(transition) = slot.tracker.sample(raw, now_ms, self.window_ms) else {
                continue;
            };
            let Some(ch) = registry.get(slot.channel) else { continue };
            if let Some(desired) = resolve(transition, slot.config.momentary, ch.logical_state) {
                let _ = out.push(ManualRequest { channel: slot.channel, desired });
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// ── Outbound state coalescing ─────────────────────────────────

/// Collapses bursts of state changes into one broadcast per window. A
/// pending flag guarantees the last change is eventually sent.
#[derive(Debug, Clone)]
pub struct StateBroadcastDebouncer {
    window_ms: u64,
    last_sent_ms: Option<u64>,
    pending: bool,
    forced: bool,
}

impl StateBroadcastDebouncer {
    pub fn new(window_ms: u32) -> Self {
        Self {
            window_ms: u64::from(window_ms),
            last_sent_ms: None,
            pending: false,
            forced: false,
        }
    }

    pub fn request(&mut self) {
        self.pending = true;
    }

    /// Next [`take_due`](Self::take_due) fires regardless of the window.
    pub fn force(&mut self) {
        self.pending = true;
        self.forced = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// `true` exactly when a broadcast should go out now.
    pub fn take_due(&mut self, now_ms: u64) -> bool {
        if !self.pending {
            return false;
        }
        let window_open = self
            .last_sent_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.window_ms);
        if !(window_open || self.forced) {
            return false;
        }
        self.pending = false;
        self.forced = false;
        self.last_sent_ms = Some(now_ms);
        true
    }
}
