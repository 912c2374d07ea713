//! Session protocol codec.
//!
//! Decoding is tolerant at item granularity: a malformed entry inside a
//! `switches` or `commands` array is skipped and counted, never fatal to
//! the message. A malformed message is fatal only to itself.
//!
//! Identifier aliases are resolved here, first present field wins:
//!
//! | Field          | Keys tried, in order                          |
//! |----------------|-----------------------------------------------|
//! | channel id     | `id` / `channelId`, `relayGpio`, `gpio`       |
//! | manual enabled | `manualEnabled`, `manualSwitchEnabled`        |
//! | manual input   | `manualInputId`, `manualSwitchGpio`           |
//! | active low     | `activeLow`, `manualActiveLow`                |

use core::fmt::{self, Write as _};

use log::warn;
use serde_json::{Map, Value};

use super::messages::{ChannelSpec, Inbound, Outbound, RemoteCommand, Signature, SpecList};
use crate::registry::{ChannelId, ManualConfig, bounded_name};

const SPEC_ID_KEYS: &[&str] = &["id", "relayGpio", "gpio"];
const COMMAND_ID_KEYS: &[&str] = &["channelId", "relayGpio", "gpio"];
const MANUAL_ENABLED_KEYS: &[&str] = &["manualEnabled", "manualSwitchEnabled"];
const MANUAL_INPUT_KEYS: &[&str] = &["manualInputId", "manualSwitchGpio"];
const ACTIVE_LOW_KEYS: &[&str] = &["activeLow", "manualActiveLow"];

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    InvalidJson,
    NotAnObject,
    MissingType,
    UnknownType(heapless::String<32>),
    MissingField(&'static str),
    InvalidField(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson => write!(f, "invalid JSON"),
            Self::NotAnObject => write!(f, "message is not an object"),
            Self::MissingType => write!(f, "missing message type"),
            Self::UnknownType(t) => write!(f, "unknown message type '{t}'"),
            Self::MissingField(k) => write!(f, "missing field '{k}'"),
            Self::InvalidField(k) => write!(f, "invalid field '{k}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeError;

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "message encoding failed")
    }
}

// ── Decode ────────────────────────────────────────────────────

/// Decode one inbound text frame.
pub fn decode(text: &str) -> Result<Inbound, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(|_| DecodeError::InvalidJson)?;
    let obj = value.as_object().ok_or(DecodeError::NotAnObject)?;
    let kind = obj.get("type").and_then(Value::as_str).ok_or(DecodeError::MissingType)?;

    match kind {
        "identified" => Ok(Inbound::Identified {
            mode: obj.get("mode").and_then(Value::as_str).map(Into::into),
            switches: spec_list(obj.get("switches")),
        }),
        "config_update" => Ok(Inbound::ConfigUpdate {
            switches: spec_list(obj.get("switches")),
        }),
        "switch_command" => parse_command(obj).map(Inbound::SwitchCommand),
        "bulk_switch_command" => {
            let items = obj
                .get("commands")
                .and_then(Value::as_array)
                .ok_or(DecodeError::MissingField("commands"))?;
            let commands = items
                .iter()
                .filter_map(|item| {
                    let parsed = item.as_object().ok_or(DecodeError::NotAnObject).and_then(parse_command);
                    parsed.map_err(|e| warn!("codec: bulk item skipped: {e}")).ok()
                })
                .collect();
            Ok(Inbound::BulkSwitchCommand { commands, total: items.len() })
        }
        "state_ack" => Ok(Inbound::StateAck {
            changed: obj.get("changed").and_then(Value::as_u64),
        }),
        other => {
            let mut name = heapless::String::new();
            for c in other.chars() {
                if name.push(c).is_err() {
                    break;
                }
            }
            Err(DecodeError::UnknownType(name))
        }
    }
}

fn spec_list(value: Option<&Value>) -> Option<SpecList> {
    let items = value?.as_array()?;
    let mut list = SpecList::default();
    for item in items {
        match item.as_object().ok_or(DecodeError::NotAnObject).and_then(parse_spec) {
            Ok(spec) => list.specs.push(spec),
            Err(e) => {
                warn!("codec: channel spec skipped: {e}");
                list.skipped += 1;
            }
        }
    }
    Some(list)
}

fn parse_command(obj: &Map<String, Value>) -> Result<RemoteCommand, DecodeError> {
    let channel = id_field(obj, COMMAND_ID_KEYS)?.ok_or(DecodeError::MissingField("channelId"))?;
    let state = bool_field(obj, &["state"])?.ok_or(DecodeError::MissingField("state"))?;
    let seq = match obj.get("seq") {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.as_u64().ok_or(DecodeError::InvalidField("seq"))?),
    };
    Ok(RemoteCommand { channel, state, seq })
}

fn parse_spec(obj: &Map<String, Value>) -> Result<ChannelSpec, DecodeError> {
    let id = id_field(obj, SPEC_ID_KEYS)?.ok_or(DecodeError::MissingField("id"))?;
    let state = bool_field(obj, &["state"])?.unwrap_or(false);
    let default = bool_field(obj, &["default"])?.unwrap_or(state);

    let manual_enabled = bool_field(obj, MANUAL_ENABLED_KEYS)?.unwrap_or(false);
    let active_low = bool_field(obj, ACTIVE_LOW_KEYS)?.unwrap_or(true);
    let momentary = bool_field(obj, &["momentary"])?.unwrap_or(false)
        || obj.get("manualMode").and_then(Value::as_str) == Some("momentary");
    let manual = if manual_enabled {
        match id_field(obj, MANUAL_INPUT_KEYS) {
            Ok(Some(input)) => Some(ManualConfig {
                input_id: input.get(),
                active_low,
                momentary,
            }),
            _ => {
                warn!("codec: channel {id} has manual enabled without a valid input, disabled");
                None
            }
        }
    } else {
        None
    };

    let name = match obj.get("name") {
        Some(Value::String(s)) => bounded_name(s),
        _ => bounded_name(""),
    };
    let override_flag = bool_field(obj, &["overrideFlag"])?.unwrap_or(false);

    Ok(ChannelSpec { id, state, default, manual, name, override_flag })
}

/// First present key wins. A present but malformed value is an error,
/// not a fall-through to the next alias.
fn id_field(obj: &Map<String, Value>, keys: &[&'static str]) -> Result<Option<ChannelId>, DecodeError> {
    for &key in keys {
        match obj.get(key) {
            None | Some(Value::Null) => {}
            Some(v) => {
                let raw = v.as_i64().ok_or(DecodeError::InvalidField(key))?;
                return ChannelId::try_from(raw)
                    .map(Some)
                    .map_err(|_| DecodeError::InvalidField(key));
            }
        }
    }
    Ok(None)
}

fn bool_field(obj: &Map<String, Value>, keys: &[&'static str]) -> Result<Option<bool>, DecodeError> {
    for &key in keys {
        match obj.get(key) {
            None | Some(Value::Null) => {}
            Some(v) => return v.as_bool().map(Some).ok_or(DecodeError::InvalidField(key)),
        }
    }
    Ok(None)
}

// ── Encode ────────────────────────────────────────────────────

pub fn encode(message: &Outbound<'_>) -> Result<String, EncodeError> {
    serde_json::to_string(message).map_err(|_| EncodeError)
}

/// Lowercase hex HMAC-SHA256 over `identity|seq|ts`, keyed by `secret`.
pub fn sign_state(secret: &str, identity: &str, seq: u64, ts: u64) -> Signature {
    let mut payload = String::new();
    let _ = write!(payload, "{identity}|{seq}|{ts}");
    let tag = hmac_sha256::HMAC::mac(payload.as_bytes(), secret.as_bytes());
    let mut out = Signature::new();
    for byte in tag {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
