//! GPIO assignments for the relay controller board.
//!
//! Single source of truth for the fixed pins and the factory channel map.
//! Channel pins are otherwise data: the remote authority may replace the
//! whole map at runtime.

// ---------------------------------------------------------------------------
// Status indicator
// ---------------------------------------------------------------------------

/// On-board status LED (active HIGH).
pub const STATUS_LED_GPIO: u8 = 2;

// ---------------------------------------------------------------------------
// Input-only pins
// ---------------------------------------------------------------------------

/// GPIO 34..=39 are input-only and have no internal pull resistors.
pub const INPUT_ONLY_GPIO: core::ops::RangeInclusive<u8> = 34..=39;

/// Whether `gpio` needs an external pull resistor when used as an input.
pub const fn lacks_internal_pull(gpio: u8) -> bool {
    gpio >= *INPUT_ONLY_GPIO.start() && gpio <= *INPUT_ONLY_GPIO.end()
}

// ---------------------------------------------------------------------------
// Factory channel map
// ---------------------------------------------------------------------------

/// One row of the compiled factory defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactoryChannel {
    pub relay_gpio: u8,
    pub manual_gpio: u8,
    pub name: &'static str,
}

/// Used when no valid snapshot exists. All maintained, manual input
/// enabled, active-low, off.
pub const FACTORY_CHANNELS: [FactoryChannel; 8] = [
    FactoryChannel { relay_gpio: 4, manual_gpio: 25, name: "Fan1" },
    FactoryChannel { relay_gpio: 16, manual_gpio: 27, name: "Fan2" },
    FactoryChannel { relay_gpio: 17, manual_gpio: 32, name: "Light1" },
    FactoryChannel { relay_gpio: 5, manual_gpio: 33, name: "Light2" },
    FactoryChannel { relay_gpio: 19, manual_gpio: 12, name: "Projector" },
    FactoryChannel { relay_gpio: 18, manual_gpio: 14, name: "NComputing" },
    FactoryChannel { relay_gpio: 21, manual_gpio: 13, name: "AC Unit" },
    FactoryChannel { relay_gpio: 22, manual_gpio: 15, name: "Printer" },
];
