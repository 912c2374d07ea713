//! Application service, the hexagonal core.
//!
//! [`RelayController`] is the one context struct owned by the control loop.
//! It holds every core component; nothing lives in hidden statics. All I/O
//! flows through port traits injected at call sites, so the whole
//! controller runs on the host against mocks.
//!
//! ```text
//!  InputPort ──▶ ┌──────────────────────────────────────┐ ──▶ EventSink
//!                │          RelayController              │
//!  Session   ◀──▶│ Registry · Debounce · Pipeline        │ ──▶ RelayPort
//!  Transport     │ Connectivity FSM · Persistence · Codec│ ◀─▶ StoragePort
//!                └──────────────────────────────────────┘
//! ```
//!
//! One [`tick`](RelayController::tick) is one loop iteration:
//! connectivity → inbound frames → manual inputs → paced drain →
//! state broadcast → heartbeat → status → persistence.

use heapless::String;
use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::debounce::{ManualInputs, StateBroadcastDebouncer};
use crate::drivers::led_patterns::StatusPattern;
use crate::fsm::{ConnectivityMachine, ConnectivityState, Transition};
use crate::persistence::{FlushOutcome, PersistenceGateway};
use crate::pipeline::{ApplyOutcome, Command, CommandPipeline, DropReason, Enqueue, SequenceTracker};
use crate::registry::{ChannelRegistry, RegistrySource};
use crate::session::codec;
use crate::session::guard::InboundGuard;
use crate::session::messages::{ChannelSpec, Inbound, Outbound, RemoteCommand, SpecList};

use super::events::{AppEvent, StatusReport};
use super::ports::{
    EventSink, InputPort, LinkPort, RelayPort, SessionTransport, StatusIndicator, StoragePort,
};

/// Inbound frames handled per loop iteration.
const MAX_FRAMES_PER_TICK: usize = 8;

pub type DeviceIdentity = String<32>;

// ───────────────────────────────────────────────────────────────
// RelayController
// ───────────────────────────────────────────────────────────────

pub struct RelayController {
    config: SystemConfig,
    identity: DeviceIdentity,
    registry: ChannelRegistry,
    inputs: ManualInputs,
    pipeline: CommandPipeline,
    persistence: PersistenceGateway,
    link: ConnectivityMachine,
    broadcast: StateBroadcastDebouncer,
    guard: InboundGuard,
    indicator: StatusPattern,
    boot_ms: u64,
    state_seq: u64,
    last_heartbeat_ms: Option<u64>,
    last_status_ms: u64,
}

impl RelayController {
    /// Load the channel map (snapshot, else factory defaults persisted as
    /// the new baseline), drive every output and seed the input trackers.
    pub fn boot(
        config: SystemConfig,
        identity: &str,
        now_ms: u64,
        hw: &mut (impl RelayPort + InputPort),
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> Self {
        let (registry, source) = ChannelRegistry::load(PersistenceGateway::load(&*storage));
        let mut persistence = PersistenceGateway::new(config.min_save_interval_ms);

        if let RegistrySource::FactoryDefaults(reason) = source {
            info!("Boot: {}, using factory defaults", reason);
            if let Err(e) = persistence.save(now_ms, &registry, storage) {
                persistence.mark_dirty();
                sink.emit(&AppEvent::PersistFailed(e));
            }
        }

        let mut id = DeviceIdentity::new();
        for c in identity.chars() {
            if id.push(c).is_err() {
                break;
            }
        }

        let mut controller = Self {
            inputs: ManualInputs::new(config.manual_debounce_ms),
            pipeline: CommandPipeline::new(config.command_drain_interval_ms, config.drain_batch()),
            persistence,
            link: ConnectivityMachine::new(&config, now_ms),
            broadcast: StateBroadcastDebouncer::new(config.state_debounce_ms),
            guard: InboundGuard::new(config.inbound_rate_per_sec, config.inbound_burst),
            indicator: StatusPattern::new(),
            identity: id,
            registry,
            config,
            boot_ms: now_ms,
            state_seq: 0,
            last_heartbeat_ms: None,
            last_status_ms: now_ms,
        };
        controller.drive_all(hw, sink);
        controller.inputs.reseed(&controller.registry, hw, now_ms);

        info!(
            "RelayController started: {} channels, {} manual inputs",
            controller.registry.len(),
            controller.inputs.len()
        );
        sink.emit(&AppEvent::Started {
            channels: controller.registry.len(),
            source,
        });
        controller
    }

    /// One full control loop iteration.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut (impl RelayPort + InputPort),
        net: &mut (impl LinkPort + SessionTransport),
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        self.poll_connectivity(now_ms, net, sink);

        for _ in 0..MAX_FRAMES_PER_TICK {
            let Some(frame) = net.next_frame() else { break };
            self.handle_frame(&frame, now_ms, hw, net, sink);
        }

        self.poll_manual_inputs(now_ms, hw, sink);
        self.drain_commands(now_ms, hw, sink);
        self.flush_broadcast(now_ms, net, sink);
        self.send_heartbeat(now_ms, net, sink);
        self.report_status(now_ms, &*net, sink);
        self.flush_persistence(now_ms, storage, sink);
    }

    // ── Connectivity ─────────────────────────────────────────

    fn poll_connectivity(
        &mut self,
        now_ms: u64,
        net: &mut (impl LinkPort + SessionTransport),
        sink: &mut impl EventSink,
    ) {
        let link_up = net.is_link_up();
        let open = link_up && net.is_open();
        if let Some(t) = self.link.update(now_ms, link_up, open) {
            self.on_transition(t, now_ms, sink);
        }

        let requests = self.link.take_requests();
        if requests.persist {
            self.persistence.mark_dirty();
        }
        if requests.retry_link {
            info!("Link: attempting connection");
            if let Err(e) = net.begin_link() {
                warn!("Link: attempt failed: {}", e);
            }
        }
        if requests.send_identify {
            let msg = Outbound::identify(&self.identity, &self.config.device_secret);
            if self.send(&msg, net, sink) {
                info!("Session: identify sent as {}", self.identity);
            }
        }
    }

    fn on_transition(&mut self, t: Transition, now_ms: u64, sink: &mut impl EventSink) {
        if t.to == ConnectivityState::SessionEstablished {
            self.last_heartbeat_ms = Some(now_ms);
        }
        sink.emit(&AppEvent::ConnectivityChanged { from: t.from, to: t.to });
    }

    // ── Inbound ──────────────────────────────────────────────

    /// Decode and act on one inbound frame. A bad frame only affects itself.
    pub fn handle_frame(
        &mut self,
        text: &str,
        now_ms: u64,
        hw: &mut (impl RelayPort + InputPort),
        net: &mut (impl LinkPort + SessionTransport),
        sink: &mut impl EventSink,
    ) {
        if !self.guard.admit() {
            sink.emit(&AppEvent::FrameThrottled);
            return;
        }
        match codec::decode(text) {
            Ok(message) => self.dispatch(message, now_ms, hw, net, sink),
            Err(e) => {
                warn!("Session: dropped frame: {}", e);
                sink.emit(&AppEvent::MalformedMessage(e));
            }
        }
    }

    fn dispatch(
        &mut self,
        message: Inbound,
        now_ms: u64,
        hw: &mut (impl RelayPort + InputPort),
        net: &mut (impl LinkPort + SessionTransport),
        sink: &mut impl EventSink,
    ) {
        match message {
            Inbound::Identified { .. } if !self.link.accepts_identified() => {
                warn!("Session: identified without an open transport ignored");
            }
            Inbound::Identified { mode, switches } => {
                info!("Session: identified (mode {})", mode.as_deref().unwrap_or("unspecified"));
                self.pipeline.start_sequence_space();
                match switches {
                    Some(list) => self.apply_config(list, now_ms, hw, sink),
                    None => info!("Session: identified without switches, keeping current map"),
                }
                if let Some(t) = self.link.mark_identified(now_ms) {
                    self.on_transition(t, now_ms, sink);
                }
                self.broadcast.force();
            }
            Inbound::ConfigUpdate { switches: Some(list) } => {
                self.pipeline.start_sequence_space();
                self.apply_config(list, now_ms, hw, sink);
                self.broadcast.force();
            }
            Inbound::ConfigUpdate { switches: None } => {
                warn!("Session: config_update without switches ignored");
            }
            Inbound::SwitchCommand(command) => {
                self.submit_remote(command, now_ms, sink);
            }
            Inbound::BulkSwitchCommand { commands, total } => {
                let processed = commands
                    .into_iter()
                    .filter(|&c| self.submit_remote(c, now_ms, sink) == Enqueue::Accepted)
                    .count();
                info!("Session: bulk command {}/{} accepted", processed, total);
                self.send(&Outbound::BulkSwitchResult { processed, total }, net, sink);
                sink.emit(&AppEvent::BulkProcessed { processed, total });
            }
            Inbound::StateAck { changed } => {
                sink.emit(&AppEvent::StateAcknowledged { changed });
            }
        }
    }

    /// Enqueue a remote command. Unknown ids are rejected at apply time,
    /// after any config replace already queued ahead of them.
    pub fn submit_remote(&mut self, command: RemoteCommand, now_ms: u64, sink: &mut impl EventSink) -> Enqueue {
        let cmd = Command::remote(command.channel, command.state, command.seq, now_ms);
        let result = self.pipeline.enqueue(cmd);
        if let Enqueue::Dropped(reason) = result {
            sink.emit(&AppEvent::CommandDropped { channel: command.channel, reason });
        }
        result
    }

    /// Start a new config epoch: replace channels, drive outputs, reseed
    /// trackers, persist.
    fn apply_config(
        &mut self,
        list: SpecList,
        now_ms: u64,
        hw: &mut (impl RelayPort + InputPort),
        sink: &mut impl EventSink,
    ) {
        let channels = self
            .registry
            .replace_all(list.specs.into_iter().map(ChannelSpec::into_channel));
        self.drive_all(hw, sink);
        self.inputs.reseed(&self.registry, hw, now_ms);
        self.persistence.mark_dirty();
        info!("Config: {} channels loaded ({} skipped)", channels, list.skipped);
        sink.emit(&AppEvent::ConfigReplaced { channels, skipped: list.skipped });
    }

    fn drive_all(&self, relays: &mut impl RelayPort, sink: &mut impl EventSink) {
        for ch in self.registry.iter() {
            if let Err(error) = relays.drive(ch.id, ch.logical_state) {
                warn!("Relay {}: drive failed: {}", ch.id, error);
                sink.emit(&AppEvent::ActuationFailed { channel: ch.id, error });
            }
        }
    }

    // ── Manual inputs & pipeline ─────────────────────────────

    fn poll_manual_inputs(&mut self, now_ms: u64, inputs: &mut impl InputPort, sink: &mut impl EventSink) {
        for request in self.inputs.poll(now_ms, &self.registry, inputs) {
            debug!("Manual: channel {} -> {}", request.channel, request.desired);
            let cmd = Command::manual(request.channel, request.desired, now_ms);
            if let Enqueue::Dropped(reason) = self.pipeline.enqueue(cmd) {
                sink.emit(&AppEvent::CommandDropped { channel: request.channel, reason });
            }
        }
    }

    fn drain_commands(&mut self, now_ms: u64, relays: &mut impl RelayPort, sink: &mut impl EventSink) {
        let outcomes = self.pipeline.drain(
            now_ms,
            &mut self.registry,
            relays,
            &mut self.persistence,
            &mut self.broadcast,
        );
        for outcome in outcomes {
            let event = match outcome {
                ApplyOutcome::Applied { changed: false, .. } => continue,
                ApplyOutcome::Applied { command, changed: true } => {
                    let Some(ch) = self.registry.get(command.channel) else { continue };
                    AppEvent::ChannelChanged {
                        channel: ch.id,
                        state: ch.logical_state,
                        override_flag: ch.override_flag,
                        source: command.source,
                    }
                }
                ApplyOutcome::Stale { command, last } => AppEvent::StaleCommand {
                    channel: command.channel,
                    seq: command.seq.unwrap_or_default(),
                    last,
                },
                ApplyOutcome::Superseded { command } => AppEvent::CommandDropped {
                    channel: command.channel,
                    reason: DropReason::Superseded,
                },
                ApplyOutcome::Rejected { command, .. } => AppEvent::UnknownChannel(command.channel),
                ApplyOutcome::ActuationFailed { command, error } => AppEvent::ActuationFailed {
                    channel: command.channel,
                    error,
                },
            };
            sink.emit(&event);
        }
    }

    // ── Outbound ─────────────────────────────────────────────

    /// Send if the session allows it. Everything except identify is
    /// swallowed below `SessionEstablished`.
    fn send(
        &self,
        message: &Outbound<'_>,
        net: &mut impl SessionTransport,
        sink: &mut impl EventSink,
    ) -> bool {
        if !self.link.state().is_established() && !message.allowed_before_session() {
            debug!("Session: {} swallowed while {:?}", message.kind(), self.link.state());
            return false;
        }
        let text = match codec::encode(message) {
            Ok(text) => text,
            Err(_) => {
                sink.emit(&AppEvent::SendFailed {
                    kind: message.kind(),
                    error: crate::error::CommsError::EncodeFailed,
                });
                return false;
            }
        };
        match net.send_text(&text) {
            Ok(()) => true,
            Err(error) => {
                sink.emit(&AppEvent::SendFailed { kind: message.kind(), error });
                false
            }
        }
    }

    fn flush_broadcast(&mut self, now_ms: u64, net: &mut impl SessionTransport, sink: &mut impl EventSink) {
        if !self.broadcast.take_due(now_ms) {
            return;
        }
        if !self.link.state().is_established() {
            debug!("Session: state update swallowed while offline");
            return;
        }
        self.state_seq += 1;
        let msg = Outbound::state_update(
            &self.registry,
            &self.identity,
            &self.config.device_secret,
            self.state_seq,
            now_ms,
        );
        self.send(&msg, net, sink);
    }

    fn send_heartbeat(&mut self, now_ms: u64, net: &mut impl SessionTransport, sink: &mut impl EventSink) {
        if !self.link.state().is_established() {
            return;
        }
        let interval = u64::from(self.config.heartbeat_interval_ms);
        if self
            .last_heartbeat_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < interval)
        {
            return;
        }
        self.last_heartbeat_ms = Some(now_ms);
        let msg = Outbound::Heartbeat {
            identity: &self.identity,
            uptime_seconds: self.uptime_secs(now_ms),
            offline_mode: false,
        };
        self.send(&msg, net, sink);
    }

    fn report_status(&mut self, now_ms: u64, link: &impl LinkPort, sink: &mut impl EventSink) {
        if now_ms.saturating_sub(self.last_status_ms) < u64::from(self.config.status_report_interval_ms) {
            return;
        }
        self.last_status_ms = now_ms;
        sink.emit(&AppEvent::Status(self.status_report(now_ms, link.rssi())));
    }

    pub fn status_report(&self, now_ms: u64, rssi: Option<i8>) -> StatusReport {
        StatusReport {
            connectivity: self.link.state(),
            identified: self.link.is_identified(),
            channels: self.registry.len(),
            channels_on: self.registry.iter().filter(|c| c.logical_state).count(),
            queue_depth: self.pipeline.pending(),
            dropped_total: self.pipeline.dropped_total(),
            throttled_total: self.guard.throttled(),
            rssi,
            uptime_secs: self.uptime_secs(now_ms),
        }
    }

    // ── Persistence ──────────────────────────────────────────

    fn flush_persistence(&mut self, now_ms: u64, storage: &mut impl StoragePort, sink: &mut impl EventSink) {
        match self.persistence.maybe_flush(now_ms, &self.registry, storage) {
            FlushOutcome::Saved => sink.emit(&AppEvent::Persisted { channels: self.registry.len() }),
            FlushOutcome::Failed(e) => sink.emit(&AppEvent::PersistFailed(e)),
            FlushOutcome::Clean | FlushOutcome::Deferred => {}
        }
    }

    /// Write immediately if anything is pending (e.g. before a restart).
    pub fn force_save_if_dirty(&mut self, now_ms: u64, storage: &mut impl StoragePort) {
        if !self.persistence.is_dirty() {
            return;
        }
        match self.persistence.save(now_ms, &self.registry, storage) {
            Ok(()) => info!("Snapshot force-saved"),
            Err(e) => warn!("Snapshot force-save failed: {}", e),
        }
    }

    // ── Indicator ────────────────────────────────────────────

    /// Blink the status LED according to the connectivity tier.
    pub fn update_indicator(&mut self, now_ms: u64, led: &mut impl StatusIndicator) {
        if let Some(on) = self.indicator.update(self.link.state(), now_ms) {
            led.set_indicator(on);
        }
    }

    // ── Accessors ────────────────────────────────────────────

    pub fn connectivity(&self) -> ConnectivityState {
        self.link.state()
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn sequences(&self) -> &SequenceTracker {
        self.pipeline.sequences()
    }

    pub fn pending_commands(&self) -> usize {
        self.pipeline.pending()
    }

    pub fn dropped_commands(&self) -> u32 {
        self.pipeline.dropped_total()
    }

    pub fn is_persistence_dirty(&self) -> bool {
        self.persistence.is_dirty()
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn uptime_secs(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.boot_ms) / 1000
    }
}
