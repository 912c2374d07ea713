//! Connectivity tiers, the identify handshake and outbound gating.

use relaynode::app::events::AppEvent;
use relaynode::config::SystemConfig;
use relaynode::fsm::ConnectivityState::{Disconnected, LinkOnly, SessionEstablished};
use relaynode::pipeline::DropReason;

use crate::mock_hw::MockNvs;
use crate::rig::{ch, identified, switch_command, Rig, IDENTITY};

// ── Handshake ─────────────────────────────────────────────────

#[test]
fn link_retried_on_interval_while_disconnected() {
    let mut rig = Rig::boot();
    rig.tick();
    assert_eq!(rig.net.link_attempts, 1);

    rig.run_for(65_000, 1_000);
    assert_eq!(rig.net.link_attempts, 3);
    assert_eq!(rig.ctl.connectivity(), Disconnected);
}

#[test]
fn identify_retried_until_identified() {
    let mut rig = Rig::boot();
    rig.net.link_up = true;
    rig.net.open = true;
    rig.run_for(25_000, 1_000);

    let identifies = rig.net.sent_of_type("identify");
    assert_eq!(identifies.len(), 3);
    assert_eq!(identifies[0]["deviceIdentity"], IDENTITY);
    assert_eq!(identifies[0]["offlineCapable"], true);
    assert_eq!(rig.ctl.connectivity(), LinkOnly);
    // No retries once the link is up.
    assert_eq!(rig.net.link_attempts, 0);
}

#[test]
fn identify_waits_for_open_transport() {
    let mut rig = Rig::boot();
    rig.net.link_up = true;
    rig.run_for(1_000, 100);
    assert_eq!(rig.ctl.connectivity(), LinkOnly);
    assert!(rig.net.sent.is_empty());

    rig.net.open = true;
    rig.advance(10);
    assert_eq!(rig.net.sent_of_type("identify").len(), 1);
}

#[test]
fn identified_establishes_session_and_forces_state_update() {
    let mut rig = Rig::boot();
    rig.establish(None);

    assert_eq!(
        rig.sink.count(|e| *e == AppEvent::ConnectivityChanged { from: LinkOnly, to: SessionEstablished }),
        1
    );
    let updates = rig.net.sent_of_type("state_update");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["switches"].as_array().map(Vec::len), Some(8));
    assert_eq!(updates[0]["seq"], 1);
}

#[test]
fn identified_from_closed_connection_does_not_skip_handshake() {
    let mut rig = Rig::boot();
    rig.net.link_up = true;
    rig.net.open = true;
    rig.advance(10);
    assert_eq!(rig.net.sent_of_type("identify").len(), 1);

    // Reply arrives after the connection it answered has closed.
    rig.net.open = false;
    rig.net.inject(&identified(None));
    rig.advance(10);
    assert_eq!(rig.ctl.connectivity(), LinkOnly);

    rig.net.open = true;
    rig.advance(10);
    assert_eq!(rig.ctl.connectivity(), LinkOnly);
    assert_eq!(rig.net.sent_of_type("identify").len(), 2);
    assert!(rig.net.sent_of_type("state_update").is_empty());

    rig.net.inject(&identified(None));
    rig.advance(10);
    assert_eq!(rig.ctl.connectivity(), SessionEstablished);
}

// ── Outbound gating ───────────────────────────────────────────

#[test]
fn only_identify_leaves_before_session() {
    let mut rig = Rig::boot();
    rig.net.link_up = true;
    rig.net.open = true;
    rig.advance(10);

    rig.deliver(&switch_command(4, true, None));
    rig.run_for(40_000, 500);

    assert_eq!(rig.state_of(4), Some(true));
    let kinds: Vec<String> = rig
        .net
        .sent_json()
        .iter()
        .map(|v| v["type"].as_str().unwrap_or_default().to_owned())
        .collect();
    assert!(!kinds.is_empty());
    assert!(kinds.iter().all(|k| k == "identify"), "sent {:?}", kinds);
}

#[test]
fn heartbeat_on_interval_once_established() {
    let mut rig = Rig::boot();
    rig.establish(None);
    rig.run_for(61_000, 1_000);

    let beats = rig.net.sent_of_type("heartbeat");
    assert_eq!(beats.len(), 2);
    assert_eq!(beats[0]["identity"], IDENTITY);
    assert_eq!(beats[0]["uptimeSeconds"], 30);
    assert_eq!(beats[0]["offlineMode"], false);
}

#[test]
fn state_updates_signed_when_secret_configured() {
    let mut cfg = SystemConfig::default();
    cfg.device_secret.clear();
    cfg.device_secret.push_str("s3cret").expect("secret fits");
    let mut rig = Rig::boot_with(cfg, MockNvs::new());
    rig.establish(None);

    assert_eq!(rig.net.sent_of_type("identify")[0]["secret"], "s3cret");
    let updates = rig.net.sent_of_type("state_update");
    let sig = updates[0]["sig"].as_str().expect("signed update");
    assert_eq!(sig.len(), 64);
    assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn state_updates_unsigned_without_secret() {
    let mut cfg = SystemConfig::default();
    cfg.device_secret.clear();
    let mut rig = Rig::boot_with(cfg, MockNvs::new());
    rig.establish(None);

    let updates = rig.net.sent_of_type("state_update");
    assert!(updates[0].get("sig").is_none());
}

#[test]
fn state_updates_coalesce_within_window() {
    let mut rig = Rig::boot();
    rig.establish(None);
    rig.run_for(500, 10);
    let before = rig.net.sent_of_type("state_update").len();

    for relay in [4, 16, 17] {
        rig.deliver(&switch_command(relay, true, None));
    }
    rig.run_for(150, 10);
    rig.run_for(500, 10);

    let updates = rig.net.sent_of_type("state_update");
    assert!(updates.len() - before <= 2);
    let last = updates.last().expect("at least one update");
    let on = last["switches"]
        .as_array()
        .expect("switch list")
        .iter()
        .filter(|s| s["state"] == true)
        .count();
    assert_eq!(on, 3);
}

#[test]
fn send_failure_is_reported() {
    let mut rig = Rig::boot();
    rig.establish(None);
    rig.net.fail_sends = true;
    rig.deliver(&switch_command(4, true, None));
    rig.run_for(500, 10);

    assert!(rig.sink.count(|e| matches!(e, AppEvent::SendFailed { kind: "state_update", .. })) >= 1);
    assert_eq!(rig.state_of(4), Some(true));
}

// ── Inbound robustness ────────────────────────────────────────

#[test]
fn malformed_frames_do_not_break_session() {
    let mut rig = Rig::boot();
    rig.establish(None);
    rig.deliver("not json at all");
    rig.deliver(r#"{"type":"reboot"}"#);
    rig.deliver(r#"{"type":"switch_command","channelId":4,"state":true,"seq":"x"}"#);

    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::MalformedMessage(_))), 3);
    assert_eq!(rig.ctl.connectivity(), SessionEstablished);

    rig.deliver(&switch_command(4, true, Some(1)));
    rig.run_for(200, 10);
    assert_eq!(rig.state_of(4), Some(true));
}

#[test]
fn flood_is_throttled() {
    let mut rig = Rig::boot();
    rig.establish(None);
    for _ in 0..64 {
        rig.net.inject(r#"{"type":"state_ack","changed":1}"#);
    }
    rig.run_for(100, 10);

    let acked = rig.sink.count(|e| matches!(e, AppEvent::StateAcknowledged { .. }));
    let throttled = rig.sink.count(|e| *e == AppEvent::FrameThrottled);
    assert_eq!(acked + throttled, 64);
    assert!(throttled >= 1);
}

#[test]
fn state_ack_is_surfaced() {
    let mut rig = Rig::boot();
    rig.establish(None);
    rig.deliver(r#"{"type":"state_ack","changed":2}"#);
    assert_eq!(
        rig.sink.count(|e| *e == AppEvent::StateAcknowledged { changed: Some(2) }),
        1
    );
}

// ── Sequences across sessions ─────────────────────────────────

#[test]
fn stale_sequence_dropped_until_reidentify() {
    let mut rig = Rig::boot();
    rig.establish(None);

    rig.deliver(&switch_command(4, true, Some(10)));
    rig.run_for(200, 10);
    assert_eq!(rig.state_of(4), Some(true));
    assert_eq!(rig.ctl.sequences().last_applied(ch(4)), Some(10));

    rig.deliver(&switch_command(4, false, Some(5)));
    rig.run_for(200, 10);
    assert_eq!(rig.state_of(4), Some(true));
    assert_eq!(
        rig.sink.count(|e| *e == AppEvent::StaleCommand { channel: ch(4), seq: 5, last: 10 }),
        1
    );

    // A session drop alone keeps the tracker.
    rig.net.open = false;
    rig.advance(10);
    assert_eq!(rig.ctl.connectivity(), LinkOnly);
    assert!(!rig.ctl.sequences().is_empty());

    rig.net.open = true;
    rig.advance(10);
    assert_eq!(rig.net.sent_of_type("identify").len(), 2);
    rig.net.inject(&identified(None));
    rig.advance(10);
    assert_eq!(rig.ctl.connectivity(), SessionEstablished);
    assert!(rig.ctl.sequences().is_empty());

    rig.deliver(&switch_command(4, false, Some(5)));
    rig.run_for(200, 10);
    assert_eq!(rig.state_of(4), Some(false));
}

#[test]
fn config_update_resets_sequences() {
    let mut rig = Rig::boot();
    rig.establish(None);
    rig.deliver(&switch_command(4, true, Some(10)));
    rig.run_for(200, 10);

    rig.deliver(r#"{"type":"config_update","switches":[{"id":4,"state":true}]}"#);
    assert!(rig.ctl.sequences().is_empty());
    rig.deliver(&switch_command(4, false, Some(1)));
    rig.run_for(200, 10);
    assert_eq!(rig.state_of(4), Some(false));
}

#[test]
fn commands_queued_before_reidentify_do_not_poison_sequences() {
    let mut rig = Rig::boot();
    rig.establish(None);

    rig.net.inject(&switch_command(4, true, Some(10)));
    rig.net.inject(&identified(None));
    rig.advance(10);
    rig.run_for(200, 10);

    assert!(rig.ctl.sequences().is_empty());
    assert_eq!(rig.state_of(4), Some(false));
    assert_eq!(
        rig.sink.count(|e| *e
            == AppEvent::CommandDropped { channel: ch(4), reason: DropReason::Superseded }),
        1
    );

    rig.deliver(&switch_command(4, true, Some(5)));
    rig.run_for(200, 10);
    assert_eq!(rig.state_of(4), Some(true));
    assert_eq!(rig.ctl.sequences().last_applied(ch(4)), Some(5));
}

#[test]
fn commands_queued_before_config_update_are_superseded() {
    let mut rig = Rig::boot();
    rig.establish(None);

    rig.net.inject(&switch_command(4, true, Some(10)));
    rig.net.inject(r#"{"type":"config_update","switches":[{"id":4}]}"#);
    rig.advance(10);
    rig.run_for(200, 10);

    assert_eq!(rig.state_of(4), Some(false));
    assert_eq!(rig.ctl.sequences().last_applied(ch(4)), None);

    rig.deliver(&switch_command(4, true, Some(1)));
    rig.run_for(200, 10);
    assert_eq!(rig.state_of(4), Some(true));
}

// ── Losing the session ────────────────────────────────────────

#[test]
fn session_drop_flushes_snapshot() {
    let mut rig = Rig::boot();
    rig.establish(None);
    rig.run_for(3_000, 100);
    assert!(!rig.ctl.is_persistence_dirty());
    let writes = rig.nvs.writes;

    rig.net.open = false;
    rig.advance(10);

    assert_eq!(
        rig.sink.count(|e| *e == AppEvent::ConnectivityChanged { from: SessionEstablished, to: LinkOnly }),
        1
    );
    assert_eq!(rig.nvs.writes, writes + 1);
}

#[test]
fn link_loss_falls_straight_to_disconnected() {
    let mut rig = Rig::boot();
    rig.establish(None);
    rig.net.link_up = false;
    rig.net.open = false;
    rig.advance(10);

    assert_eq!(rig.ctl.connectivity(), Disconnected);
    assert_eq!(
        rig.sink.count(|e| *e == AppEvent::ConnectivityChanged { from: SessionEstablished, to: Disconnected }),
        1
    );

    // Nothing but identify is sent again until a new handshake.
    let sent = rig.net.sent.len();
    rig.deliver(&switch_command(4, true, None));
    rig.run_for(1_000, 100);
    assert_eq!(rig.net.sent.len(), sent);
}
