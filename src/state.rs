//! State machine types for labwm.
//!
//! This module formalizes the client lifecycle and the transitions the
//! tracer records.

use serde::{Deserialize, Serialize};

/// Client lifecycle states
///
/// ```text
///              MapRequest / startup scan
///                         │
///                         ▼
///                  ┌────────────┐
///                  │ Unmanaged  │
///                  └─────┬──────┘
///                        │ create()
///          ┌─────────────┴──────────────┐
///          │ initial state Normal       │ initial state Iconic
///          ▼                            ▼
///     ┌─────────┐   hide()         ┌─────────┐
///     │ Normal  │ ────────────────►│ Hidden  │
///     │         │◄──────────────── │         │
///     └──┬───▲──┘   unhide()       └────┬────┘
///        │   │                          │
///        │   │ toggle_fullscreen()      │
///        ▼   │                          │
///   ┌────────┴───┐                      │
///   │ Fullscreen │                      │
///   └─────┬──────┘                      │
///         │                             │
///         └──────────────┬──────────────┘
///                        │ remove()
///                        ▼
///                  ┌────────────┐
///                  │ Withdrawn  │
///                  └────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientState {
    /// Mapped with decorations
    Normal,
    /// Iconified; only reachable through the taskbar
    Hidden,
    /// Occupying the fullscreen slot
    Fullscreen,
}

/// How a client leaves management
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveMode {
    /// The client is going away: mark it Withdrawn
    Withdraw,
    /// The manager is exiting: map the window so it survives us
    Remap,
}

/// State transition events that can be traced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum StateTransition {
    /// Window was reparented into a frame
    ClientManaged {
        window: u32,
        frame: u32,
        iconic: bool,
    },
    /// Window was removed from management
    ClientRemoved {
        window: u32,
        reason: RemoveReason,
    },
    /// Focus changed to a different window
    FocusChanged {
        from: Option<u32>,
        to: Option<u32>,
    },
    ClientHidden {
        window: u32,
    },
    ClientUnhidden {
        window: u32,
    },
    FullscreenEntered {
        window: u32,
    },
    FullscreenLeft {
        window: u32,
    },
    /// An interactive move or resize finished
    ClientMoved {
        window: u32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
}

/// Reason a window was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveReason {
    /// Client unmapped the window
    ClientUnmapped,
    /// Client destroyed the window
    ClientDestroyed,
    /// A request on the window failed
    XError,
    /// The window manager is shutting down
    Shutdown,
}

impl RemoveReason {
    pub fn mode(self) -> RemoveMode {
        match self {
            RemoveReason::Shutdown => RemoveMode::Remap,
            _ => RemoveMode::Withdraw,
        }
    }
}
