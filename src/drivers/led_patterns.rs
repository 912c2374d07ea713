//! Connectivity blink patterns for the status LED.
//!
//! The operator reads the link tier off a single LED:
//!
//! | State                | On     | Off    |
//! |----------------------|--------|--------|
//! | `Disconnected`       | 250 ms | 250 ms |
//! | `LinkOnly`           | 500 ms | 500 ms |
//! | `SessionEstablished` | 1 s    | 1 s    |
//!
//! The phase restarts with the LED on whenever the state changes, so a
//! tier change is visible immediately.

use crate::fsm::ConnectivityState;

/// Half-period of the square wave for each tier.
pub const fn half_period_ms(state: ConnectivityState) -> u64 {
    match state {
        ConnectivityState::Disconnected => 250,
        ConnectivityState::LinkOnly => 500,
        ConnectivityState::SessionEstablished => 1000,
    }
}

/// Square-wave generator keyed on connectivity state. Stack-only.
pub struct StatusPattern {
    state: Option<ConnectivityState>,
    phase_start_ms: u64,
    level: bool,
}

impl Default for StatusPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusPattern {
    pub fn new() -> Self {
        Self {
            state: None,
            phase_start_ms: 0,
            level: false,
        }
    }

    /// Level the LED should show at `now_ms`.
    pub fn level_at(&self, state: ConnectivityState, now_ms: u64) -> bool {
        if self.state != Some(state) {
            return true;
        }
        let elapsed = now_ms.saturating_sub(self.phase_start_ms);
        (elapsed / half_period_ms(state)) % 2 == 0
    }

    /// Advance the pattern. Returns the new level only when it changed.
    pub fn update(&mut self, state: ConnectivityState, now_ms: u64) -> Option<bool> {
        let level = self.level_at(state, now_ms);
        if self.state != Some(state) {
            self.state = Some(state);
            self.phase_start_ms = now_ms;
        }
        if level == self.level {
            return None;
        }
        self.level = level;
        Some(level)
    }
}
