//! Boot precedence and the rate-limited snapshot writer.

use embedded_hal::digital::PinState;
use relaynode::app::events::AppEvent;
use relaynode::app::ports::StorageError;
use relaynode::config::SystemConfig;
use relaynode::persistence::{PersistenceGateway, SnapshotError, SNAPSHOT_KEY, SNAPSHOT_NAMESPACE};
use relaynode::registry::{ChannelRegistry, RegistrySource};

use crate::mock_hw::MockNvs;
use crate::rig::{ch, Rig};

/// Hold the input for channel 16 at `level` long enough to be applied.
fn hold_fan_switch(rig: &mut Rig, level: PinState) {
    rig.board.set_input(27, level);
    rig.run_for(200, 10);
}

#[test]
fn first_boot_persists_factory_defaults() {
    let rig = Rig::boot();
    assert_eq!(rig.nvs.writes, 1);
    assert!(rig.nvs.raw(SNAPSHOT_NAMESPACE, SNAPSHOT_KEY).is_some());
    assert_eq!(
        rig.sink.count(|e| *e
            == AppEvent::Started {
                channels: 8,
                source: RegistrySource::FactoryDefaults(SnapshotError::Absent),
            }),
        1
    );
    assert!(!rig.ctl.is_persistence_dirty());
    // Every output is driven to its restored state at boot.
    assert_eq!(rig.board.drives.len(), 8);
    assert!(rig.board.drives.iter().all(|&(_, on)| !on));
}

#[test]
fn snapshot_survives_reboot() {
    let mut rig = Rig::boot();
    hold_fan_switch(&mut rig, PinState::Low);
    rig.run_for(2_500, 100);
    assert!(rig.sink.count(|e| matches!(e, AppEvent::Persisted { .. })) >= 1);

    let Rig { nvs, .. } = rig;
    let rebooted = Rig::boot_with(SystemConfig::default(), nvs);

    assert_eq!(
        rebooted
            .sink
            .count(|e| *e == AppEvent::Started { channels: 8, source: RegistrySource::Snapshot }),
        1
    );
    assert_eq!(rebooted.state_of(16), Some(true));
    assert_eq!(rebooted.override_of(16), Some(true));
    assert_eq!(rebooted.board.last_drive(16), Some(true));
    // No rewrite when a valid snapshot was loaded.
    assert_eq!(rebooted.nvs.writes, 2);
}

#[test]
fn corrupted_snapshot_falls_back_and_is_rewritten() {
    let mut nvs = MockNvs::new();
    nvs.put_raw(SNAPSHOT_NAMESPACE, SNAPSHOT_KEY, &[0xFF; 7]);
    let rig = Rig::boot_with(SystemConfig::default(), nvs);

    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            AppEvent::Started { source: RegistrySource::FactoryDefaults(_), .. }
        )),
        1
    );
    assert_eq!(rig.ctl.registry().len(), 8);
    assert_eq!(rig.nvs.writes, 1);
    let (reloaded, source) = ChannelRegistry::load(PersistenceGateway::load(&rig.nvs));
    assert_eq!(source, RegistrySource::Snapshot);
    assert_eq!(reloaded.len(), 8);
}

#[test]
fn writes_are_rate_limited() {
    let mut rig = Rig::boot();
    for _ in 0..3 {
        hold_fan_switch(&mut rig, PinState::Low);
        hold_fan_switch(&mut rig, PinState::High);
    }
    assert_eq!(rig.changed_events(), 6);
    rig.run_for(5_000, 100);

    // Boot baseline plus one coalesced write.
    assert_eq!(rig.nvs.writes, 2);
    assert!(!rig.ctl.is_persistence_dirty());

    let (reloaded, _) = ChannelRegistry::load(PersistenceGateway::load(&rig.nvs));
    let fan = reloaded.get(ch(16)).expect("channel 16 persisted");
    assert!(!fan.logical_state);
    assert!(fan.override_flag);
}

#[test]
fn failed_save_is_retried() {
    let mut rig = Rig::boot();
    rig.nvs.fail_writes = true;
    hold_fan_switch(&mut rig, PinState::Low);
    rig.run_for(2_000, 100);

    assert_eq!(
        rig.sink.count(|e| *e == AppEvent::PersistFailed(StorageError::IoError)),
        1
    );
    assert!(rig.ctl.is_persistence_dirty());

    rig.nvs.fail_writes = false;
    rig.run_for(2_000, 100);
    assert!(rig.sink.count(|e| matches!(e, AppEvent::Persisted { .. })) >= 1);
    assert!(!rig.ctl.is_persistence_dirty());
    assert_eq!(rig.nvs.writes, 2);
}

#[test]
fn failed_baseline_write_is_retried_later() {
    let mut nvs = MockNvs::new();
    nvs.fail_writes = true;
    let mut rig = Rig::boot_with(SystemConfig::default(), nvs);

    assert_eq!(
        rig.sink.count(|e| *e == AppEvent::PersistFailed(StorageError::IoError)),
        1
    );
    assert!(rig.ctl.is_persistence_dirty());

    rig.nvs.fail_writes = false;
    rig.run_for(2_500, 100);
    assert_eq!(rig.nvs.writes, 1);
    assert!(!rig.ctl.is_persistence_dirty());
}

#[test]
fn force_save_bypasses_interval() {
    let mut rig = Rig::boot();
    hold_fan_switch(&mut rig, PinState::Low);
    assert!(rig.ctl.is_persistence_dirty());

    rig.ctl.force_save_if_dirty(rig.now, &mut rig.nvs);
    assert_eq!(rig.nvs.writes, 2);
    assert!(!rig.ctl.is_persistence_dirty());

    // Nothing pending, nothing written.
    rig.ctl.force_save_if_dirty(rig.now, &mut rig.nvs);
    assert_eq!(rig.nvs.writes, 2);
}

#[test]
fn config_replace_is_persisted() {
    let mut rig = Rig::boot();
    rig.establish(Some(r#"[{"id":23,"state":true,"name":"Pump"}]"#));
    rig.run_for(2_500, 100);

    let (reloaded, _) = ChannelRegistry::load(PersistenceGateway::load(&rig.nvs));
    assert_eq!(reloaded.len(), 1);
    let pump = reloaded.get(ch(23)).expect("channel 23 persisted");
    assert!(pump.logical_state);
    assert_eq!(pump.name.as_str(), "Pump");
}
