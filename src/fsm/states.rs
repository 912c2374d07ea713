//! Concrete state handler functions and table builder.
//!
//! Each state is three plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!  DISCONNECTED ──[link up]──▶ LINK_ONLY ──[identified]──▶ SESSION_ESTABLISHED
//!       ▲                        ▲   │                            │
//!       │                        │   └─[transport open] identify  │
//!       │                        └────────[session drop]──────────┘
//!       │                                                 (persist request)
//!  Any state ──[link lost]──▶ DISCONNECTED ──[every link_retry]──▶ retry link
//! ```

use super::ConnectivityState;
use super::StateDescriptor;
use super::context::LinkContext;
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table. Called once at startup.
pub fn build_state_table() -> [StateDescriptor; ConnectivityState::COUNT] {
    [
        // Index 0: Disconnected
        StateDescriptor {
            id: ConnectivityState::Disconnected,
            name: "Disconnected",
            on_enter: Some(disconnected_enter),
            on_exit: None,
            on_update: disconnected_update,
        },
        // Index 1: LinkOnly
        StateDescriptor {
            id: ConnectivityState::LinkOnly,
            name: "LinkOnly",
            on_enter: Some(link_only_enter),
            on_exit: None,
            on_update: link_only_update,
        },
        // Index 2: SessionEstablished
        StateDescriptor {
            id: ConnectivityState::SessionEstablished,
            name: "SessionEstablished",
            on_enter: Some(session_enter),
            on_exit: Some(session_exit),
            on_update: session_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  DISCONNECTED: no link; retry on a fixed interval
// ═══════════════════════════════════════════════════════════════════════════

fn disconnected_enter(ctx: &mut LinkContext) {
    ctx.identified = false;
    ctx.last_identify_ms = None;
    warn!("DISCONNECTED: link down, offline mode");
}

fn disconnected_update(ctx: &mut LinkContext) -> Option<ConnectivityState> {
    if ctx.link_up {
        return Some(ConnectivityState::LinkOnly);
    }
    if ctx.due(ctx.last_link_attempt_ms, ctx.link_retry_interval_ms) {
        ctx.last_link_attempt_ms = Some(ctx.now_ms);
        ctx.requests.retry_link = true;
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  LINK_ONLY: linked, waiting for the identify handshake
// ═══════════════════════════════════════════════════════════════════════════

fn link_only_enter(ctx: &mut LinkContext) {
    ctx.identified = false;
    ctx.last_identify_ms = None;
    info!("LINK_ONLY: link up, awaiting session");
}

fn link_only_update(ctx: &mut LinkContext) -> Option<ConnectivityState> {
    if !ctx.link_up {
        return Some(ConnectivityState::Disconnected);
    }
    if !ctx.transport_open {
        // A new connection needs its own handshake; identify goes out as
        // soon as it opens.
        ctx.identified = false;
        ctx.last_identify_ms = None;
        return None;
    }
    if ctx.identified {
        return Some(ConnectivityState::SessionEstablished);
    }
    if ctx.due(ctx.last_identify_ms, ctx.identify_retry_interval_ms) {
        ctx.last_identify_ms = Some(ctx.now_ms);
        ctx.requests.send_identify = true;
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  SESSION_ESTABLISHED: identified; outbound traffic allowed
// ═══════════════════════════════════════════════════════════════════════════

fn session_enter(_ctx: &mut LinkContext) {
    info!("SESSION_ESTABLISHED: authority accepted identify");
}

fn session_exit(ctx: &mut LinkContext) {
    // Sequence tracking is left alone; only a fresh identify resets it.
    ctx.requests.persist = true;
    warn!("SESSION_ESTABLISHED: session lost");
}

fn session_update(ctx: &mut LinkContext) -> Option<ConnectivityState> {
    if !ctx.link_up {
        return Some(ConnectivityState::Disconnected);
    }
    if !ctx.transport_open || !ctx.identified {
        return Some(ConnectivityState::LinkOnly);
    }
    None
}
