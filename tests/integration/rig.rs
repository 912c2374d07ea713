//! Test rig: one controller wired to a full set of mocks plus a manual
//! clock.

use relaynode::app::events::AppEvent;
use relaynode::app::service::RelayController;
use relaynode::config::SystemConfig;
use relaynode::fsm::ConnectivityState;
use relaynode::registry::ChannelId;

use crate::mock_hw::{MockBoard, MockNet, MockNvs, RecordingSink};

pub const IDENTITY: &str = "DE:AD:BE:EF:CA:FE";

pub struct Rig {
    pub ctl: RelayController,
    pub board: MockBoard,
    pub net: MockNet,
    pub nvs: MockNvs,
    pub sink: RecordingSink,
    pub now: u64,
}

#[allow(dead_code)]
impl Rig {
    pub fn boot() -> Self {
        Self::boot_with(SystemConfig::default(), MockNvs::new())
    }

    pub fn boot_with(config: SystemConfig, mut nvs: MockNvs) -> Self {
        let mut board = MockBoard::new();
        let mut sink = RecordingSink::new();
        let ctl = RelayController::boot(config, IDENTITY, 0, &mut board, &mut nvs, &mut sink);
        Self {
            ctl,
            board,
            net: MockNet::new(),
            nvs,
            sink,
            now: 0,
        }
    }

    pub fn tick(&mut self) {
        self.ctl
            .tick(self.now, &mut self.board, &mut self.net, &mut self.nvs, &mut self.sink);
    }

    pub fn advance(&mut self, ms: u64) {
        self.now += ms;
        self.tick();
    }

    /// Tick every `step` ms for `total` ms.
    pub fn run_for(&mut self, total: u64, step: u64) {
        let end = self.now + total;
        while self.now < end {
            self.advance(step);
        }
    }

    /// Bring link and transport up, answer the identify, and settle.
    pub fn establish(&mut self, switches: Option<&str>) {
        self.net.link_up = true;
        self.net.open = true;
        self.advance(10);
        assert!(
            !self.net.sent_of_type("identify").is_empty(),
            "identify must go out once the transport is open"
        );
        self.net.inject(&identified(switches));
        self.advance(10);
        assert_eq!(self.ctl.connectivity(), ConnectivityState::SessionEstablished);
    }

    /// Deliver one frame and process it.
    pub fn deliver(&mut self, frame: &str) {
        self.net.inject(frame);
        self.advance(10);
    }

    pub fn state_of(&self, id: u8) -> Option<bool> {
        self.ctl.registry().get(ch(id)).map(|c| c.logical_state)
    }

    pub fn override_of(&self, id: u8) -> Option<bool> {
        self.ctl.registry().get(ch(id)).map(|c| c.override_flag)
    }

    pub fn changed_events(&self) -> usize {
        self.sink.count(|e| matches!(e, AppEvent::ChannelChanged { .. }))
    }
}

pub fn ch(id: u8) -> ChannelId {
    ChannelId::new(id).expect("test channel ids are valid")
}

pub fn identified(switches: Option<&str>) -> String {
    match switches {
        Some(list) => format!(r#"{{"type":"identified","mode":"online","switches":{}}}"#, list),
        None => r#"{"type":"identified","mode":"online"}"#.to_owned(),
    }
}

pub fn switch_command(channel: u8, state: bool, seq: Option<u64>) -> String {
    match seq {
        Some(seq) => format!(
            r#"{{"type":"switch_command","channelId":{},"state":{},"seq":{}}}"#,
            channel, state, seq
        ),
        None => format!(r#"{{"type":"switch_command","channelId":{},"state":{}}}"#, channel, state),
    }
}
