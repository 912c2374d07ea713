//! Hardware adapter: bridges the relay board to domain port traits.
//!
//! Owns relay outputs and manual switch inputs and exposes them through
//! [`RelayPort`] and [`InputPort`]. Pins are configured lazily the first
//! time a channel uses them, because the pin map arrives with the channel
//! configuration. On non-espidf targets the GPIO driver is a simulation
//! stub and the adapter remembers the written levels.

use embedded_hal::digital::PinState;
use log::{debug, warn};

use crate::app::ports::{InputPort, RelayPort};
use crate::drivers::gpio::{self, Pull};
use crate::error::ActuatorError;
use crate::pins::{INPUT_ONLY_GPIO, lacks_internal_pull};
use crate::registry::ChannelId;

fn bit(pin: u8) -> u64 {
    1u64.checked_shl(u32::from(pin)).unwrap_or(0)
}

/// Relay outputs and manual inputs of the switch board.
pub struct RelayBoard {
    relay_active_low: bool,
    outputs: u64,
    inputs: u64,
    levels: u64,
}

impl RelayBoard {
    pub fn new(relay_active_low: bool) -> Self {
        Self {
            relay_active_low,
            outputs: 0,
            inputs: 0,
            levels: 0,
        }
    }

    /// Electrical level for a logical relay state.
    pub fn pin_level(&self, on: bool) -> bool {
        on != self.relay_active_low
    }

    /// Last level written to `pin`.
    pub fn output_level(&self, pin: u8) -> Option<bool> {
        let mask = bit(pin);
        (self.outputs & mask != 0).then_some(self.levels & mask != 0)
    }

    pub fn is_input_configured(&self, pin: u8) -> bool {
        self.inputs & (bit(pin)) != 0
    }

    fn ensure_output(&mut self, pin: u8) -> Result<(), ActuatorError> {
        let mask = bit(pin);
        if self.outputs & mask != 0 {
            return Ok(());
        }
        if INPUT_ONLY_GPIO.contains(&pin) {
            warn!("RelayBoard: GPIO {} is input-only, cannot drive a relay", pin);
            return Err(ActuatorError::InvalidPin);
        }
        gpio::configure_output(pin).map_err(|e| {
            warn!("RelayBoard: GPIO {}: {}", pin, e);
            ActuatorError::InvalidPin
        })?;
        self.outputs |= mask;
        Ok(())
    }
}

impl RelayPort for RelayBoard {
    fn drive(&mut self, channel: ChannelId, on: bool) -> Result<(), ActuatorError> {
        let pin = channel.get();
        self.ensure_output(pin)?;
        let high = self.pin_level(on);
        gpio::write(pin, high).map_err(|e| {
            warn!("RelayBoard: GPIO {} write: {}", pin, e);
            ActuatorError::GpioWriteFailed
        })?;
        let mask = bit(pin);
        if high {
            self.levels |= mask;
        } else {
            self.levels &= !mask;
        }
        debug!("RelayBoard: relay {} -> {} (pin {})", pin, if on { "ON" } else { "OFF" }, u8::from(high));
        Ok(())
    }
}

impl InputPort for RelayBoard {
    fn configure_input(&mut self, input: u8, active_low: bool) {
        let pull = if lacks_internal_pull(input) {
            warn!("RelayBoard: GPIO {} has no internal pull, external resistor required", input);
            Pull::Floating
        } else if active_low {
            Pull::Up
        } else {
            Pull::Down
        };
        match gpio::configure_input(input, pull) {
            Ok(()) => self.inputs |= bit(input),
            Err(e) => warn!("RelayBoard: GPIO {} input: {}", input, e),
        }
    }

    fn read_level(&mut self, input: u8) -> PinState {
        PinState::from(gpio::read(input))
    }
}
