//! WebSocket session transport.
//!
//! Implements [`SessionTransport`] over a persistent WebSocket to the
//! remote authority.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspWebSocketClient`. Its event callback
//!   runs on the client task and only pushes into the static
//!   [`session::channels`](crate::session::channels); the control loop
//!   drains them. The client reconnects on its own.
//! - **all other targets**: in-memory loopback with hooks to open/close
//!   the session and inject frames.

use core::cell::Cell;

use log::info;

use crate::app::ports::SessionTransport;
use crate::error::CommsError;

#[cfg(target_os = "espidf")]
use crate::session::channels::{self, TransportEvent};

#[cfg(target_os = "espidf")]
use esp_idf_svc::ws::FrameType;
#[cfg(target_os = "espidf")]
use esp_idf_svc::ws::client::{EspWebSocketClient, EspWebSocketClientConfig, WebSocketEventType};

#[cfg(target_os = "espidf")]
const RECONNECT_TIMEOUT_MS: u64 = 5_000;
#[cfg(target_os = "espidf")]
const SEND_TIMEOUT_MS: u64 = 1_000;

pub struct WebSocketTransport {
    open: Cell<bool>,
    #[cfg(target_os = "espidf")]
    client: EspWebSocketClient<'static>,
    #[cfg(not(target_os = "espidf"))]
    inbox: std::collections::VecDeque<String>,
    #[cfg(not(target_os = "espidf"))]
    outbox: Vec<String>,
}

impl WebSocketTransport {
    #[cfg(target_os = "espidf")]
    pub fn connect(uri: &str) -> Result<Self, CommsError> {
        use core::time::Duration;

        let config = EspWebSocketClientConfig {
            reconnect_timeout_ms: Duration::from_millis(RECONNECT_TIMEOUT_MS),
            ..Default::default()
        };
        let client = EspWebSocketClient::new(uri, &config, Duration::from_millis(SEND_TIMEOUT_MS), |event| {
            let Ok(event) = event else {
                return;
            };
            match event.event_type {
                WebSocketEventType::Connected => channels::push_event(TransportEvent::Opened),
                WebSocketEventType::Disconnected | WebSocketEventType::Closed => {
                    channels::push_event(TransportEvent::Closed)
                }
                WebSocketEventType::Text(text) => {
                    channels::push_frame(text);
                }
                _ => {}
            }
        })
        .map_err(|e| {
            log::warn!("WebSocket: client init failed: {}", e);
            CommsError::TransportClosed
        })?;
        info!("WebSocket: client started for {}", uri);
        Ok(Self {
            open: Cell::new(false),
            client,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn connect(uri: &str) -> Result<Self, CommsError> {
        info!("WebSocket(sim): loopback for {}", uri);
        Ok(Self {
            open: Cell::new(false),
            inbox: std::collections::VecDeque::new(),
            outbox: Vec::new(),
        })
    }

    /// Fold pending open/close notifications into the cached flag. Frames
    /// still buffered from a closed connection are discarded.
    #[cfg(target_os = "espidf")]
    fn refresh(&self) {
        while let Some(event) = channels::next_event() {
            let open = event == TransportEvent::Opened;
            if open != self.open.get() {
                info!("WebSocket: {:?}", event);
            }
            if event == TransportEvent::Closed {
                let stale = channels::discard_frames();
                if stale > 0 {
                    info!("WebSocket: {} frames from the closed connection discarded", stale);
                }
            }
            self.open.set(open);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn refresh(&self) {}

    // ── Simulation hooks ──────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_open(&mut self) {
        self.open.set(true);
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_close(&mut self) {
        self.open.set(false);
        self.inbox.clear();
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_inject(&mut self, text: &str) {
        self.inbox.push_back(text.to_owned());
    }

    /// Frames sent so far, oldest first.
    #[cfg(not(target_os = "espidf"))]
    pub fn sent(&self) -> &[String] {
        &self.outbox
    }
}

impl SessionTransport for WebSocketTransport {
    fn is_open(&self) -> bool {
        self.refresh();
        self.open.get()
    }

    fn send_text(&mut self, text: &str) -> Result<(), CommsError> {
        if !self.is_open() {
            return Err(CommsError::TransportClosed);
        }
        #[cfg(target_os = "espidf")]
        {
            self.client.send(FrameType::Text(false), text.as_bytes()).map_err(|e| {
                log::warn!("WebSocket: send failed: {}", e);
                CommsError::SendFailed
            })
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.outbox.push(text.to_owned());
            Ok(())
        }
    }

    fn next_frame(&mut self) -> Option<String> {
        #[cfg(target_os = "espidf")]
        {
            channels::next_frame().map(|frame| frame.text.as_str().to_owned())
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.inbox.pop_front()
        }
    }
}
