//! Relay node firmware library.
//!
//! Exposes the pure-logic modules for integration testing. All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module, with host simulation stubs alongside.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod debounce;
pub mod error;
pub mod fsm;
pub mod persistence;
pub mod pins;
pub mod pipeline;
pub mod registry;
pub mod session;

pub mod adapters;
pub mod drivers;
