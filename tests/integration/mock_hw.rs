//! Mock adapters for integration tests.
//!
//! Every port is backed by a recording mock so tests can assert on the
//! full history of relay drives, outbound frames and emitted events
//! without touching real GPIO or sockets.

use std::collections::{HashMap, HashSet, VecDeque};

use embedded_hal::digital::PinState;
use relaynode::app::events::AppEvent;
use relaynode::app::ports::{
    EventSink, InputPort, LinkPort, RelayPort, SessionTransport, StatusIndicator, StorageError, StoragePort,
};
use relaynode::error::{ActuatorError, CommsError};
use relaynode::registry::ChannelId;

// ── MockBoard ─────────────────────────────────────────────────

/// Relay outputs and manual inputs.
#[derive(Default)]
pub struct MockBoard {
    pub drives: Vec<(u8, bool)>,
    pub inputs: HashMap<u8, PinState>,
    pub configured: Vec<(u8, bool)>,
    pub failing: HashSet<u8>,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input(&mut self, input: u8, level: PinState) {
        self.inputs.insert(input, level);
    }

    pub fn last_drive(&self, relay: u8) -> Option<bool> {
        self.drives.iter().rev().find(|(r, _)| *r == relay).map(|&(_, on)| on)
    }

    pub fn drives_of(&self, relay: u8) -> usize {
        self.drives.iter().filter(|(r, _)| *r == relay).count()
    }
}

impl RelayPort for MockBoard {
    fn drive(&mut self, channel: ChannelId, on: bool) -> Result<(), ActuatorError> {
        if self.failing.contains(&channel.get()) {
            return Err(ActuatorError::GpioWriteFailed);
        }
        self.drives.push((channel.get(), on));
        Ok(())
    }
}

impl InputPort for MockBoard {
    fn configure_input(&mut self, input: u8, active_low: bool) {
        self.configured.push((input, active_low));
    }

    fn read_level(&mut self, input: u8) -> PinState {
        // Active-low switches idle high through the pull-up.
        self.inputs.get(&input).copied().unwrap_or(PinState::High)
    }
}

// ── MockNet ───────────────────────────────────────────────────

/// Wi-Fi link plus WebSocket session.
#[derive(Default)]
pub struct MockNet {
    pub link_up: bool,
    pub open: bool,
    pub link_attempts: u32,
    pub inbox: VecDeque<String>,
    pub sent: Vec<String>,
    pub fail_sends: bool,
}

#[allow(dead_code)]
impl MockNet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, frame: &str) {
        self.inbox.push_back(frame.to_owned());
    }

    /// Sent frames parsed as JSON.
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent
            .iter()
            .map(|s| serde_json::from_str(s).expect("outbound frames are JSON"))
            .collect()
    }

    pub fn sent_of_type(&self, kind: &str) -> Vec<serde_json::Value> {
        self.sent_json()
            .into_iter()
            .filter(|v| v["type"] == kind)
            .collect()
    }
}

impl LinkPort for MockNet {
    fn is_link_up(&self) -> bool {
        self.link_up
    }

    fn begin_link(&mut self) -> Result<(), CommsError> {
        self.link_attempts += 1;
        Ok(())
    }

    fn rssi(&self) -> Option<i8> {
        self.link_up.then_some(-55)
    }
}

impl SessionTransport for MockNet {
    fn is_open(&self) -> bool {
        self.open
    }

    fn send_text(&mut self, text: &str) -> Result<(), CommsError> {
        if self.fail_sends || !self.open {
            return Err(CommsError::SendFailed);
        }
        self.sent.push(text.to_owned());
        Ok(())
    }

    fn next_frame(&mut self) -> Option<String> {
        self.inbox.pop_front()
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    pub writes: usize,
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, namespace: &str, key: &str) -> Option<&Vec<u8>> {
        self.store.get(&format!("{}::{}", namespace, key))
    }

    pub fn put_raw(&mut self, namespace: &str, key: &str, data: &[u8]) {
        self.store.insert(format!("{}::{}", namespace, key), data.to_vec());
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.raw(namespace, key) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.writes += 1;
        self.store.insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{}::{}", namespace, key))
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MockLed ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockLed {
    pub levels: Vec<bool>,
}

impl StatusIndicator for MockLed {
    fn set_indicator(&mut self, on: bool) {
        self.levels.push(on);
    }
}
