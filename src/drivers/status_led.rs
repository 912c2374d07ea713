//! Single-colour status LED on [`STATUS_LED_GPIO`].
//!
//! On ESP-IDF: a plain push-pull output. On host/test: tracks the level
//! in memory only.

use log::warn;

use crate::app::ports::StatusIndicator;
use crate::drivers::gpio;
use crate::pins::STATUS_LED_GPIO;

pub struct StatusLed {
    on: bool,
}

impl Default for StatusLed {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusLed {
    pub fn new() -> Self {
        if let Err(e) = gpio::configure_output(STATUS_LED_GPIO) {
            warn!("StatusLed: {}", e);
        }
        let mut led = Self { on: true };
        led.set(false);
        led
    }

    pub fn set(&mut self, on: bool) {
        if on == self.on {
            return;
        }
        if let Err(e) = gpio::write(STATUS_LED_GPIO, on) {
            warn!("StatusLed: {}", e);
        }
        self.on = on;
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl StatusIndicator for StatusLed {
    fn set_indicator(&mut self, on: bool) {
        self.set(on);
    }
}
