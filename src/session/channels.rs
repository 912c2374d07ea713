//! Inter-context channels for the session transport.
//!
//! The WebSocket client delivers frames from its own event task; these
//! static `embassy-sync` channels hand them to the synchronous control
//! loop without heap-allocated queues.
//!
//! ```text
//! ┌──────────────┐  InboundFrame  ┌──────────────┐
//! │  WS event    │──────────────▶│ Control Loop │
//! │  task        │  LinkEvent     │  (sync)      │
//! │              │──────────────▶│              │
//! └──────────────┘                └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::String;
use log::warn;

/// Largest inbound text frame accepted.
pub const MAX_FRAME_LEN: usize = 2048;

/// One inbound text frame.
pub struct InboundFrame {
    pub text: String<MAX_FRAME_LEN>,
}

/// Transport lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Closed,
}

const FRAME_DEPTH: usize = 8;
const EVENT_DEPTH: usize = 4;

/// Inbound frames: transport task → control loop.
pub static FRAME_CHANNEL: Channel<CriticalSectionRawMutex, InboundFrame, FRAME_DEPTH> = Channel::new();

/// Open/close notifications: transport task → control loop.
pub static EVENT_CHANNEL: Channel<CriticalSectionRawMutex, TransportEvent, EVENT_DEPTH> = Channel::new();

/// Push a frame from the transport context. Oversized or overflowing
/// frames are dropped.
pub fn push_frame(text: &str) -> bool {
    let mut frame = InboundFrame { text: String::new() };
    if frame.text.push_str(text).is_err() {
        warn!("session: {}-byte frame exceeds {} bytes, dropped", text.len(), MAX_FRAME_LEN);
        return false;
    }
    if FRAME_CHANNEL.try_send(frame).is_err() {
        warn!("session: inbound frame channel full, frame dropped");
        return false;
    }
    true
}

pub fn next_frame() -> Option<InboundFrame> {
    FRAME_CHANNEL.try_receive().ok()
}

/// Drop every buffered frame. Returns how many were discarded.
pub fn discard_frames() -> usize {
    let mut dropped = 0;
    while FRAME_CHANNEL.try_receive().is_ok() {
        dropped += 1;
    }
    dropped
}

pub fn push_event(event: TransportEvent) {
    if EVENT_CHANNEL.try_send(event).is_err() {
        warn!("session: transport event channel full, {:?} dropped", event);
    }
}

pub fn next_event() -> Option<TransportEvent> {
    EVENT_CHANNEL.try_receive().ok()
}
