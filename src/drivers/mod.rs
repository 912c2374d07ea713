//! Peripheral drivers: raw GPIO access, the status LED and its blink
//! patterns, and the task watchdog.

pub mod gpio;
pub mod led_patterns;
pub mod status_led;
pub mod watchdog;
