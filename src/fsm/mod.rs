//! Connectivity state machine on a function-pointer FSM engine.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                      │
//! │  ┌────────────────────┬───────────┬──────────┬─────────────────┐ │
//! │  │ ConnectivityState  │ on_enter  │ on_exit  │ on_update       │ │
//! │  ├────────────────────┼───────────┼──────────┼─────────────────┤ │
//! │  │ Disconnected       │ fn(ctx)   │    -     │ fn(ctx)->Option │ │
//! │  │ LinkOnly           │ fn(ctx)   │    -     │ fn(ctx)->Option │ │
//! │  │ SessionEstablished │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option │ │
//! │  └────────────────────┴───────────┴──────────┴─────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each update the engine calls `on_update` for the **current** state.
//! If it returns `Some(next)`, the engine runs `on_exit` for the current
//! state, then `on_enter` for the next. Handlers never perform I/O: they
//! read link inputs from [`LinkContext`] and leave requests (retry the
//! link, send identify, persist now) for the control loop to act on.
//!
//! The machine is the only writer of [`ConnectivityState`].

pub mod context;
pub mod states;

use context::{LinkContext, LinkRequests};
use log::info;

use crate::config::SystemConfig;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Link tier, ordered from least to most connected.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectivityState {
    Disconnected = 0,
    LinkOnly = 1,
    SessionEstablished = 2,
}

impl ConnectivityState {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 3;

    /// Convert an index back to a state. Out-of-range falls back to
    /// `Disconnected`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            1 => Self::LinkOnly,
            2 => Self::SessionEstablished,
            0 => Self::Disconnected,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Disconnected
            }
        }
    }

    pub fn is_established(self) -> bool {
        self == Self::SessionEstablished
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut LinkContext);

/// Per-update handler. Returns `Some(next)` to trigger a transition.
pub type StateUpdateFn = fn(&mut LinkContext) -> Option<ConnectivityState>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct StateDescriptor {
    pub id: ConnectivityState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

/// A completed state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectivityState,
    pub to: ConnectivityState,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Fixed-size table indexed by `ConnectivityState as usize`.
    table: [StateDescriptor; ConnectivityState::COUNT],
    current: usize,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; ConnectivityState::COUNT], initial: ConnectivityState) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter`. Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut LinkContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Evaluate the current state once; at most one transition.
    pub fn tick(&mut self, ctx: &mut LinkContext) -> Option<Transition> {
        let next = (self.table[self.current].on_update)(ctx)?;
        let from = self.current_state();
        if next == from {
            return None;
        }
        self.transition(next, ctx);
        Some(Transition { from, to: next })
    }

    pub fn current_state(&self) -> ConnectivityState {
        ConnectivityState::from_index(self.current)
    }

    fn transition(&mut self, next_id: ConnectivityState, ctx: &mut LinkContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

// ---------------------------------------------------------------------------
// Connectivity machine (engine + context)
// ---------------------------------------------------------------------------

/// Owns the engine and its context; the control loop feeds it link
/// observations and drains the resulting requests.
pub struct ConnectivityMachine {
    fsm: Fsm,
    ctx: LinkContext,
}

impl ConnectivityMachine {
    pub fn new(config: &SystemConfig, now_ms: u64) -> Self {
        let mut fsm = Fsm::new(states::build_state_table(), ConnectivityState::Disconnected);
        let mut ctx = LinkContext::new(config);
        ctx.now_ms = now_ms;
        fsm.start(&mut ctx);
        Self { fsm, ctx }
    }

    /// Feed the latest link observations and settle the machine. Multiple
    /// hops (e.g. link and session lost together) resolve in one call.
    pub fn update(&mut self, now_ms: u64, link_up: bool, transport_open: bool) -> Option<Transition> {
        self.ctx.now_ms = now_ms;
        self.ctx.link_up = link_up;
        self.ctx.transport_open = transport_open;
        self.settle()
    }

    /// The identify handshake completed. Ignored unless the link is up and
    /// the transport that carried the identify is still open.
    pub fn mark_identified(&mut self, now_ms: u64) -> Option<Transition> {
        if !self.accepts_identified() {
            return None;
        }
        self.ctx.now_ms = now_ms;
        self.ctx.identified = true;
        self.settle()
    }

    /// Whether an `identified` reply belongs to the current connection.
    pub fn accepts_identified(&self) -> bool {
        self.ctx.link_up && self.ctx.transport_open && self.state() != ConnectivityState::Disconnected
    }

    fn settle(&mut self) -> Option<Transition> {
        let first = self.fsm.tick(&mut self.ctx)?;
        let mut last = first;
        for _ in 0..ConnectivityState::COUNT {
            match self.fsm.tick(&mut self.ctx) {
                Some(t) => last = t,
                None => break,
            }
        }
        Some(Transition { from: first.from, to: last.to })
    }

    pub fn state(&self) -> ConnectivityState {
        self.fsm.current_state()
    }

    pub fn is_identified(&self) -> bool {
        self.ctx.identified
    }

    /// Requests raised since the last call.
    pub fn take_requests(&mut self) -> LinkRequests {
        core::mem::take(&mut self.ctx.requests)
    }
}
