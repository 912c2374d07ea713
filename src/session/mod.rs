//! Session protocol with the remote authority.
//!
//! JSON text frames over a persistent WebSocket:
//!
//! ```text
//!  device                                  authority
//!    │── identify {deviceIdentity, secret} ──▶│
//!    │◀── identified {mode, switches[]} ──────│   replace config, reset seqs
//!    │── state_update {seq, ts, switches, sig}▶│
//!    │◀── switch_command / bulk_switch_command│
//!    │── bulk_switch_result {processed,total} ▶│
//!    │◀── config_update {switches[]} ─────────│
//!    │── heartbeat (every 30 s) ─────────────▶│
//!    │◀── state_ack {changed} ────────────────│
//! ```
//!
//! - [`codec`]: decode inbound frames into [`messages::Inbound`], encode
//!   [`messages::Outbound`], sign state updates.
//! - [`guard`]: inbound rate limiting.
//! - [`channels`]: transport task → control loop handoff.

pub mod channels;
pub mod codec;
pub mod guard;
pub mod messages;

pub use codec::{DecodeError, decode, encode};
pub use messages::{ChannelSpec, Inbound, Outbound, RemoteCommand};
