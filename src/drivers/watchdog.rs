//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if the control loop
//! stalls for longer than `watchdog_timeout_ms`. A stuck loop is the one
//! fatal condition; the restart is the recovery.
//!
//! The loop must call `feed()` once per iteration. The deadline is also
//! tracked in memory so a slow iteration can be noticed before the reset
//! and pending state saved ([`Watchdog::is_near_deadline`]).

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

pub struct Watchdog {
    timeout_ms: u32,
    last_feed_ms: u64,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Watchdog {
    /// Configure the TWDT and subscribe the calling task.
    pub fn new(timeout_ms: u32, now_ms: u64) -> Self {
        #[cfg(target_os = "espidf")]
        {
            let cfg = esp_task_wdt_config_t {
                timeout_ms,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            // SAFETY: plain FFI calls with a valid config; main task only.
            let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
            if ret != ESP_OK {
                log::warn!("TWDT reconfigure returned {} (may already be configured)", ret);
            }
            let ret = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
            let subscribed = ret == ESP_OK;
            if subscribed {
                info!("Watchdog: subscribed ({} ms timeout, panic on trigger)", timeout_ms);
            } else {
                log::warn!("Watchdog: failed to subscribe ({})", ret);
            }
            Self {
                timeout_ms,
                last_feed_ms: now_ms,
                subscribed,
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): {} ms timeout", timeout_ms);
            Self {
                timeout_ms,
                last_feed_ms: now_ms,
            }
        }
    }

    pub fn feed(&mut self, now_ms: u64) {
        self.last_feed_ms = now_ms;
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: the current task subscribed in `new`.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }

    /// Whether at least half the timeout has passed since the last feed.
    pub fn is_near_deadline(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_feed_ms) * 2 >= u64::from(self.timeout_ms)
    }
}
