//! Inbound frame rate guard.
//!
//! Token bucket in front of the decoder so a misbehaving peer cannot
//! flood the command pipeline faster than the drain cadence can pace it.

use burster::Limiter;
use core::time::Duration;
use log::warn;

pub struct InboundGuard {
    bucket: burster::TokenBucket<fn() -> Duration>,
    throttled: u32,
}

impl InboundGuard {
    /// `rate` frames per second sustained, `burst` frames back to back.
    pub fn new(rate: u16, burst: u16) -> Self {
        Self {
            bucket: burster::TokenBucket::new_with_time_provider(
                rate.into(),
                burst.into(),
                platform_now as fn() -> Duration,
            ),
            throttled: 0,
        }
    }

    /// Consume one token; `false` means drop the frame.
    pub fn admit(&mut self) -> bool {
        if self.bucket.try_consume(1).is_ok() {
            return true;
        }
        self.throttled = self.throttled.saturating_add(1);
        if self.throttled.is_power_of_two() {
            warn!("guard: inbound frames throttled ({} so far)", self.throttled);
        }
        false
    }

    /// Frames dropped since boot.
    pub fn throttled(&self) -> u32 {
        self.throttled
    }
}

// ── Platform time for the token bucket ───────────────────────

#[cfg(target_os = "espidf")]
fn platform_now() -> Duration {
    // SAFETY: esp_timer_get_time has no preconditions once the timer
    // service is up, which ESP-IDF guarantees before app_main.
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

#[cfg(not(target_os = "espidf"))]
fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}
