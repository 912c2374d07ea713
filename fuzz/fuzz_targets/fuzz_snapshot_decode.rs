//! Fuzz target: `PersistedSnapshot::decode` + registry load
//!
//! Whatever bytes sit in flash, boot must end with a registry that holds
//! unique ids and at most `MAX_CHANNELS` entries.
//!
//! cargo fuzz run fuzz_snapshot_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use relaynode::config::MAX_CHANNELS;
use relaynode::persistence::PersistedSnapshot;
use relaynode::registry::ChannelRegistry;

fuzz_target!(|data: &[u8]| {
    let (registry, _source) = ChannelRegistry::load(PersistedSnapshot::decode(data));
    assert!(registry.len() <= MAX_CHANNELS);

    let mut seen = 0u64;
    for ch in registry.iter() {
        let bit = 1u64 << ch.id.get();
        assert_eq!(seen & bit, 0, "duplicate channel id {}", ch.id);
        seen |= bit;
    }
});
