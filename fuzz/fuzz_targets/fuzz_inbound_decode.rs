//! Fuzz target: `session::codec::decode`
//!
//! Arbitrary text must decode to a message or a `DecodeError`, never a
//! panic. Decoded configuration payloads must respect the registry bounds.
//!
//! cargo fuzz run fuzz_inbound_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use relaynode::config::{MAX_GPIO_ID, MAX_NAME_LEN};
use relaynode::session::{Inbound, decode};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    match decode(text) {
        Ok(Inbound::Identified { switches: Some(list), .. } | Inbound::ConfigUpdate { switches: Some(list) }) => {
            for spec in &list.specs {
                assert!(spec.id.get() <= MAX_GPIO_ID);
                assert!(spec.name.len() <= MAX_NAME_LEN);
            }
        }
        Ok(Inbound::BulkSwitchCommand { commands, total }) => {
            assert!(commands.len() <= total);
        }
        _ => {}
    }
});
