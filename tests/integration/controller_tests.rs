//! Manual inputs, the command pipeline and the status surfaces driven
//! through the full controller.

use embedded_hal::digital::PinState;
use relaynode::app::events::AppEvent;
use relaynode::fsm::ConnectivityState;
use relaynode::pipeline::DropReason;

use crate::mock_hw::MockLed;
use crate::rig::{ch, switch_command, Rig};

const MOMENTARY_LAMP: &str = r#"[{"id":4,"state":false,"manualEnabled":true,"manualInputId":25,"activeLow":true,"momentary":true,"name":"Lamp"}]"#;
const MAINTAINED_ON: &str =
    r#"[{"id":4,"state":true,"manualEnabled":true,"manualInputId":25,"activeLow":true,"name":"Heater"}]"#;

/// Relay ids of the compiled factory map, in order.
const FACTORY_RELAYS: [u8; 8] = [4, 16, 17, 5, 19, 18, 21, 22];

// ── Manual inputs ─────────────────────────────────────────────

#[test]
fn momentary_press_toggles_exactly_once() {
    let mut rig = Rig::boot();
    rig.establish(Some(MOMENTARY_LAMP));
    assert_eq!(rig.ctl.registry().len(), 1);
    let before = rig.changed_events();

    rig.board.set_input(25, PinState::Low);
    rig.run_for(300, 10);
    assert_eq!(rig.state_of(4), Some(true));
    assert_eq!(rig.override_of(4), Some(true));
    assert_eq!(rig.board.last_drive(4), Some(true));
    assert_eq!(rig.changed_events(), before + 1);

    // Release is not an edge for a momentary input.
    rig.board.set_input(25, PinState::High);
    rig.run_for(300, 10);
    assert_eq!(rig.state_of(4), Some(true));
    assert_eq!(rig.changed_events(), before + 1);

    rig.board.set_input(25, PinState::Low);
    rig.run_for(300, 10);
    assert_eq!(rig.state_of(4), Some(false));
    assert_eq!(rig.changed_events(), before + 2);
}

#[test]
fn momentary_toggle_is_broadcast_with_override() {
    let mut rig = Rig::boot();
    rig.establish(Some(MOMENTARY_LAMP));
    rig.board.set_input(25, PinState::Low);
    rig.run_for(500, 10);

    let updates = rig.net.sent_of_type("state_update");
    let last = updates.last().expect("a state update after the toggle");
    assert_eq!(last["switches"][0]["id"], 4);
    assert_eq!(last["switches"][0]["state"], true);
    assert_eq!(last["switches"][0]["overrideFlag"], true);
}

#[test]
fn glitch_shorter_than_window_is_ignored() {
    let mut rig = Rig::boot();
    rig.establish(Some(MOMENTARY_LAMP));
    let before = rig.changed_events();

    rig.board.set_input(25, PinState::Low);
    rig.advance(10);
    rig.board.set_input(25, PinState::High);
    rig.run_for(300, 10);

    assert_eq!(rig.state_of(4), Some(false));
    assert_eq!(rig.changed_events(), before);
}

#[test]
fn maintained_input_matching_state_sends_nothing() {
    let mut rig = Rig::boot();
    rig.establish(Some(MAINTAINED_ON));
    assert_eq!(rig.state_of(4), Some(true));
    let drives = rig.board.drives.len();
    let before = rig.changed_events();

    rig.board.set_input(25, PinState::Low);
    rig.run_for(300, 10);
    assert_eq!(rig.board.drives.len(), drives);
    assert_eq!(rig.changed_events(), before);
    assert_eq!(rig.ctl.pending_commands(), 0);
    assert_eq!(rig.override_of(4), Some(false));

    // Switching it back off does act.
    rig.board.set_input(25, PinState::High);
    rig.run_for(300, 10);
    assert_eq!(rig.state_of(4), Some(false));
    assert_eq!(rig.override_of(4), Some(true));
    assert_eq!(rig.board.last_drive(4), Some(false));
}

#[test]
fn manual_control_works_offline() {
    let mut rig = Rig::boot();
    rig.board.set_input(27, PinState::Low);
    rig.run_for(300, 10);

    assert_eq!(rig.ctl.connectivity(), ConnectivityState::Disconnected);
    assert_eq!(rig.state_of(16), Some(true));
    assert_eq!(rig.board.last_drive(16), Some(true));
    assert!(rig.net.sent.is_empty());

    // The first update after identify carries the offline change.
    rig.establish(None);
    let updates = rig.net.sent_of_type("state_update");
    assert_eq!(updates.len(), 1);
    let switches = updates[0]["switches"].as_array().expect("switch list");
    let fan = switches.iter().find(|s| s["id"] == 16).expect("channel 16 reported");
    assert_eq!(fan["state"], true);
    assert_eq!(fan["overrideFlag"], true);
}

// ── Remote commands ───────────────────────────────────────────

#[test]
fn config_update_removing_channel_rejects_later_commands() {
    let mut rig = Rig::boot();
    rig.establish(None);
    rig.deliver(r#"{"type":"config_update","switches":[{"id":4},{"id":17}]}"#);
    assert_eq!(rig.ctl.registry().len(), 2);
    assert_eq!(
        rig.sink.count(|e| *e == AppEvent::ConfigReplaced { channels: 2, skipped: 0 }),
        1
    );

    let drives_16 = rig.board.drives_of(16);
    rig.deliver(&switch_command(16, true, None));
    rig.run_for(200, 10);

    assert_eq!(rig.sink.count(|e| *e == AppEvent::UnknownChannel(ch(16))), 1);
    assert_eq!(rig.board.drives_of(16), drives_16);
    assert_eq!(rig.state_of(16), None);
}

#[test]
fn bulk_overflow_keeps_first_sixteen_in_order() {
    let mut rig = Rig::boot();
    rig.establish(None);

    let commands: Vec<String> = (0..20u64)
        .map(|i| {
            let relay = FACTORY_RELAYS[(i % 8) as usize];
            let on = !(8..16).contains(&i);
            format!(r#"{{"channelId":{},"state":{},"seq":{}}}"#, relay, on, i + 1)
        })
        .collect();
    let frame = format!(r#"{{"type":"bulk_switch_command","commands":[{}]}}"#, commands.join(","));

    let drives_before = rig.board.drives.len();
    rig.deliver(&frame);

    let results = rig.net.sent_of_type("bulk_switch_result");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["processed"], 16);
    assert_eq!(results[0]["total"], 20);
    assert_eq!(rig.ctl.dropped_commands(), 4);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::CommandDropped { reason: DropReason::QueueFull, .. })),
        4
    );
    assert_eq!(
        rig.sink.count(|e| *e == AppEvent::BulkProcessed { processed: 16, total: 20 }),
        1
    );

    rig.run_for(1000, 10);
    let expected: Vec<(u8, bool)> = FACTORY_RELAYS
        .iter()
        .map(|&r| (r, true))
        .chain(FACTORY_RELAYS.iter().map(|&r| (r, false)))
        .collect();
    assert_eq!(rig.board.drives[drives_before..], expected[..]);
    assert_eq!(rig.ctl.pending_commands(), 0);
}

#[test]
fn drain_is_paced_in_batches() {
    let mut rig = Rig::boot();
    rig.establish(None);
    rig.run_for(100, 10);

    let commands: Vec<String> = FACTORY_RELAYS
        .iter()
        .map(|r| format!(r#"{{"channelId":{},"state":true}}"#, r))
        .collect();
    let frame = format!(r#"{{"type":"bulk_switch_command","commands":[{}]}}"#, commands.join(","));
    let drives_before = rig.board.drives.len();
    rig.net.inject(&frame);

    // One tick drains at most one batch.
    rig.advance(10);
    assert!(rig.board.drives.len() - drives_before <= 4);

    rig.run_for(300, 10);
    assert_eq!(rig.board.drives.len() - drives_before, 8);
}

#[test]
fn actuation_failure_leaves_state_and_sequence_untouched() {
    let mut rig = Rig::boot();
    rig.establish(None);
    rig.board.failing.insert(4);

    rig.deliver(&switch_command(4, true, Some(1)));
    rig.run_for(200, 10);
    assert_eq!(rig.state_of(4), Some(false));
    assert_eq!(rig.ctl.sequences().last_applied(ch(4)), None);
    assert!(rig.sink.count(|e| matches!(e, AppEvent::ActuationFailed { .. })) >= 1);

    // The same sequence is accepted once the output works again.
    rig.board.failing.remove(&4);
    rig.deliver(&switch_command(4, true, Some(1)));
    rig.run_for(200, 10);
    assert_eq!(rig.state_of(4), Some(true));
    assert_eq!(rig.ctl.sequences().last_applied(ch(4)), Some(1));
}

#[test]
fn repeated_command_is_idempotent() {
    let mut rig = Rig::boot();
    rig.establish(None);
    rig.deliver(&switch_command(5, true, None));
    rig.run_for(200, 10);
    let drives = rig.board.drives_of(5);
    let changed = rig.changed_events();

    rig.deliver(&switch_command(5, true, None));
    rig.run_for(200, 10);
    assert_eq!(rig.board.drives_of(5), drives);
    assert_eq!(rig.changed_events(), changed);
}

// ── Status surfaces ───────────────────────────────────────────

#[test]
fn status_report_on_interval() {
    let mut rig = Rig::boot();
    rig.run_for(15_000, 1_000);

    let reports: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Status(r) => Some(*r),
            _ => None,
        })
        .collect();
    assert_eq!(reports.len(), 3);
    let last = reports[2];
    assert_eq!(last.connectivity, ConnectivityState::Disconnected);
    assert!(!last.identified);
    assert_eq!(last.channels, 8);
    assert_eq!(last.channels_on, 0);
    assert_eq!(last.rssi, None);
    assert_eq!(last.uptime_secs, 15);
}

#[test]
fn status_report_reflects_session() {
    let mut rig = Rig::boot();
    rig.establish(None);
    let report = rig.ctl.status_report(rig.now, Some(-55));
    assert_eq!(report.connectivity, ConnectivityState::SessionEstablished);
    assert!(report.identified);
    assert_eq!(report.queue_depth, 0);
}

#[test]
fn indicator_follows_connectivity_tier() {
    let mut rig = Rig::boot();
    let mut led = MockLed::default();

    rig.ctl.update_indicator(0, &mut led);
    rig.ctl.update_indicator(100, &mut led);
    rig.ctl.update_indicator(250, &mut led);
    assert_eq!(led.levels, vec![true, false]);

    rig.now = 500;
    rig.establish(None);
    led.levels.clear();
    // State change restarts the phase lit.
    rig.ctl.update_indicator(rig.now, &mut led);
    rig.ctl.update_indicator(rig.now + 500, &mut led);
    assert_eq!(led.levels, vec![true]);
    rig.ctl.update_indicator(rig.now + 1_000, &mut led);
    assert_eq!(led.levels, vec![true, false]);
}
