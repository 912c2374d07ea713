//! Raw GPIO configuration and level access.
//!
//! Channel pins are only known at runtime (they arrive in configuration
//! payloads), so pins are configured by number through the ESP-IDF sys
//! calls rather than typed `PinDriver`s. On the host every call is a no-op
//! and reads return a released (high) level.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Internal bias for an input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Up,
    Down,
    Floating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioConfigError(pub i32);

impl core::fmt::Display for GpioConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "gpio_config failed (rc={})", self.0)
    }
}

// ── Outputs ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn configure_output(pin: u8) -> Result<(), GpioConfigError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    // SAFETY: gpio_config only touches the pin named in the mask; called
    // from the main loop.
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(GpioConfigError(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn configure_output(_pin: u8) -> Result<(), GpioConfigError> {
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn write(pin: u8, high: bool) -> Result<(), GpioConfigError> {
    // SAFETY: pin was configured as an output; main-loop only.
    let ret = unsafe { gpio_set_level(i32::from(pin), u32::from(high)) };
    if ret != ESP_OK as i32 {
        return Err(GpioConfigError(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn write(_pin: u8, _high: bool) -> Result<(), GpioConfigError> {
    Ok(())
}

// ── Inputs ────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn configure_input(pin: u8, pull: Pull) -> Result<(), GpioConfigError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: if pull == Pull::Up {
            gpio_pullup_t_GPIO_PULLUP_ENABLE
        } else {
            gpio_pullup_t_GPIO_PULLUP_DISABLE
        },
        pull_down_en: if pull == Pull::Down {
            gpio_pulldown_t_GPIO_PULLDOWN_ENABLE
        } else {
            gpio_pulldown_t_GPIO_PULLDOWN_DISABLE
        },
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    // SAFETY: see configure_output.
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(GpioConfigError(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn configure_input(_pin: u8, _pull: Pull) -> Result<(), GpioConfigError> {
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn read(pin: u8) -> bool {
    // SAFETY: read-only register access on a configured input.
    (unsafe { gpio_get_level(i32::from(pin)) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn read(_pin: u8) -> bool {
    true
}
