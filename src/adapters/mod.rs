//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements            | Connects to               |
//! |-------------|-----------------------|---------------------------|
//! | `hardware`  | RelayPort, InputPort  | ESP32 GPIO relay board    |
//! | `log_sink`  | EventSink             | Serial log output         |
//! | `nvs`       | ConfigPort            | NVS / in-memory store     |
//! |             | StoragePort           |                           |
//! | `time`      | -                     | ESP32 system timer        |
//! | `device_id` | -                     | eFuse MAC                 |
//! | `websocket` | SessionTransport      | ESP-IDF WebSocket client  |
//! | `wifi`      | LinkPort              | ESP-IDF WiFi STA          |

pub mod device_id;
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod websocket;
pub mod wifi;
