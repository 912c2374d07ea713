//! Relay node firmware entry point.
//!
//! Hexagonal architecture around a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  RelayBoard        LogEventSink   NvsAdapter   MonotonicClock  │
//! │  (Relay+Input)     (EventSink)    (Config+NVS)                 │
//! │  WifiLink          WebSocketTransport          StatusLed       │
//! │  (LinkPort)        (SessionTransport)          (Indicator)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              RelayController (pure logic)              │    │
//! │  │  Registry · Debounce · Pipeline · FSM · Codec · NVS    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Task watchdog fed once per iteration; a slow iteration        │
//! │  force-saves the snapshot ahead of a possible reset            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;

use relaynode::adapters::device_id;
use relaynode::adapters::hardware::RelayBoard;
use relaynode::adapters::log_sink::LogEventSink;
use relaynode::adapters::nvs::NvsAdapter;
use relaynode::adapters::time::MonotonicClock;
use relaynode::adapters::websocket::WebSocketTransport;
use relaynode::adapters::wifi::WifiLink;
use relaynode::app::ports::{ConfigPort, LinkPort, SessionTransport};
use relaynode::app::service::RelayController;
use relaynode::config::SystemConfig;
use relaynode::drivers::status_led::StatusLed;
use relaynode::drivers::watchdog::Watchdog;

/// Wi-Fi link and WebSocket session bundled as the network side of the
/// controller.
struct Network {
    link: WifiLink,
    session: WebSocketTransport,
}

impl LinkPort for Network {
    fn is_link_up(&self) -> bool {
        self.link.is_link_up()
    }

    fn begin_link(&mut self) -> Result<(), relaynode::error::CommsError> {
        self.link.begin_link()
    }

    fn rssi(&self) -> Option<i8> {
        self.link.rssi()
    }
}

impl SessionTransport for Network {
    fn is_open(&self) -> bool {
        self.session.is_open()
    }

    fn send_text(&mut self, text: &str) -> Result<(), relaynode::error::CommsError> {
        self.session.send_text(text)
    }

    fn next_frame(&mut self) -> Option<String> {
        self.session.next_frame()
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  RelayNode v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let clock = MonotonicClock::new();

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init failed: {}", e))?;
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    let mut watchdog = Watchdog::new(config.watchdog_timeout_ms, clock.now_ms());

    // ── 3. Device identity ────────────────────────────────────
    let identity = device_id::device_identity(&device_id::read_mac());
    info!("Device identity: {}", identity);

    // ── 4. Construct adapters ─────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let wifi = EspWifi::new(peripherals.modem, sysloop, Some(nvs_partition))?;

    let mut board = RelayBoard::new(config.relay_active_low);
    let mut led = StatusLed::new();
    let mut sink = LogEventSink::new();
    let mut net = Network {
        link: WifiLink::new(wifi, &config.wifi_ssid, &config.wifi_password)
            .map_err(|e| anyhow::anyhow!("WiFi credentials: {}", e))?,
        session: WebSocketTransport::connect(&config.backend_uri)
            .map_err(|e| anyhow::anyhow!("WebSocket: {}", e))?,
    };

    // ── 5. Boot the controller ────────────────────────────────
    let loop_interval = core::time::Duration::from_millis(u64::from(config.loop_interval_ms));
    let mut controller = RelayController::boot(config, &identity, clock.now_ms(), &mut board, &mut nvs, &mut sink);

    // ── 6. Control loop ───────────────────────────────────────
    loop {
        let now = clock.now_ms();
        watchdog.feed(now);
        controller.tick(now, &mut board, &mut net, &mut nvs, &mut sink);
        controller.update_indicator(now, &mut led);

        let done = clock.now_ms();
        if watchdog.is_near_deadline(done) {
            warn!("Loop: iteration took {} ms, saving ahead of watchdog", done.saturating_sub(now));
            controller.force_save_if_dirty(done, &mut nvs);
        }
        std::thread::sleep(loop_interval);
    }
}
