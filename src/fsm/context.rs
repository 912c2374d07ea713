//! Shared mutable context threaded through every connectivity handler.
//!
//! `LinkContext` is the blackboard: the control loop writes link
//! observations before each update, handlers write requests that the loop
//! carries out afterwards.

use crate::config::SystemConfig;

/// Actions the control loop should perform after an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkRequests {
    /// Start a link attempt.
    pub retry_link: bool,
    /// Send `identify` over the open transport.
    pub send_identify: bool,
    /// Mark persistence dirty; the authority may be unreachable from now on.
    pub persist: bool,
}

pub struct LinkContext {
    // -- Observations --
    pub now_ms: u64,
    pub link_up: bool,
    pub transport_open: bool,
    /// Set when `identified` arrives on an open transport; cleared when the
    /// transport closes or the machine falls below `SessionEstablished`.
    pub identified: bool,

    // -- Timing --
    pub link_retry_interval_ms: u64,
    pub identify_retry_interval_ms: u64,
    pub last_link_attempt_ms: Option<u64>,
    pub last_identify_ms: Option<u64>,

    // -- Outputs --
    pub requests: LinkRequests,
}

impl LinkContext {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            now_ms: 0,
            link_up: false,
            transport_open: false,
            identified: false,
            link_retry_interval_ms: u64::from(config.link_retry_interval_ms),
            identify_retry_interval_ms: u64::from(config.identify_retry_interval_ms),
            last_link_attempt_ms: None,
            last_identify_ms: None,
            requests: LinkRequests::default(),
        }
    }

    /// `true` when `last` is unset or at least `interval` ago.
    pub fn due(&self, last: Option<u64>, interval: u64) -> bool {
        last.is_none_or(|t| self.now_ms.saturating_sub(t) >= interval)
    }
}
