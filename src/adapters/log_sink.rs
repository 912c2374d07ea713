//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by rendering each [`AppEvent`] as one line on
//! the ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::registry::RegistrySource;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { channels, source } => match source {
                RegistrySource::Snapshot => info!("START | {} channels from snapshot", channels),
                RegistrySource::FactoryDefaults(why) => {
                    info!("START | {} factory channels ({})", channels, why)
                }
            },
            AppEvent::ChannelChanged {
                channel,
                state,
                override_flag,
                source,
            } => {
                info!(
                    "RELAY | {} -> {} | override={} | via {:?}",
                    channel,
                    if *state { "ON" } else { "OFF" },
                    override_flag,
                    source
                );
            }
            AppEvent::CommandDropped { channel, reason } => {
                warn!("QUEUE | command for {} dropped: {:?}", channel, reason);
            }
            AppEvent::UnknownChannel(channel) => {
                warn!("CMD   | unknown channel {}", channel);
            }
            AppEvent::StaleCommand { channel, seq, last } => {
                info!("CMD   | stale seq {} on {} (last {})", seq, channel, last);
            }
            AppEvent::ActuationFailed { channel, error } => {
                warn!("RELAY | {} actuation failed: {}", channel, error);
            }
            AppEvent::ConnectivityChanged { from, to } => {
                info!("LINK  | {:?} -> {:?}", from, to);
            }
            AppEvent::ConfigReplaced { channels, skipped } => {
                info!("CFG   | {} channels applied, {} skipped", channels, skipped);
            }
            AppEvent::BulkProcessed { processed, total } => {
                info!("BULK  | {}/{} accepted", processed, total);
            }
            AppEvent::StateAcknowledged { changed } => match changed {
                Some(n) => info!("ACK   | state_ack changed={}", n),
                None => info!("ACK   | state_ack"),
            },
            AppEvent::MalformedMessage(e) => {
                warn!("RX    | malformed message: {}", e);
            }
            AppEvent::FrameThrottled => {
                warn!("RX    | frame throttled");
            }
            AppEvent::SendFailed { kind, error } => {
                warn!("TX    | {} not sent: {}", kind, error);
            }
            AppEvent::Persisted { channels } => {
                info!("NVS   | snapshot saved ({} channels)", channels);
            }
            AppEvent::PersistFailed(e) => {
                warn!("NVS   | snapshot save failed: {} (will retry)", e);
            }
            AppEvent::Status(s) => {
                info!(
                    "STATUS | {:?} identified={} | channels={} on={} | queue={} dropped={} throttled={} | \
                     rssi={:?} | up={}s",
                    s.connectivity,
                    s.identified,
                    s.channels,
                    s.channels_on,
                    s.queue_depth,
                    s.dropped_total,
                    s.throttled_total,
                    s.rssi,
                    s.uptime_secs,
                );
            }
        }
    }
}
