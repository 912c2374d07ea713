//! Application core: pure domain logic, zero I/O.
//!
//! The [`service::RelayController`] ties the channel registry, debounce
//! engine, command pipeline, connectivity machine, session codec and
//! persistence gateway together. All interaction with hardware and the
//! network happens through **port traits** defined in [`ports`], keeping
//! this layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
