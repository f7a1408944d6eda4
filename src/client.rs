//! Per-window client record.

use x11rb::protocol::xproto::{Colormap, Window};

use crate::types::{Rect, SizeHints};

slotmap::new_key_type! {
    /// Generation-checked handle to a registered client
    pub struct ClientId;
}

/// Number of UnmapNotify events the manager caused itself and must not
/// treat as the client withdrawing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IgnoreUnmap(u32);

impl IgnoreUnmap {
    /// Record that the manager is about to unmap the client window.
    pub fn expect_unmap(&mut self) {
        self.0 += 1;
    }

    /// Consume one expected unmap. Returns false when none was pending,
    /// meaning the unmap came from the client.
    pub fn consume(&mut self) -> bool {
        if self.0 == 0 {
            return false;
        }
        self.0 -= 1;
        true
    }

    pub fn pending(&self) -> u32 {
        self.0
    }
}

/// A managed top-level window.
#[derive(Debug, Clone)]
pub struct Client {
    /// The application's window
    pub window: Window,
    /// Decoration window the application window is reparented into
    pub frame: Window,
    /// Owner, for dialog-like windows
    pub transient_for: Option<Window>,
    /// Inner-window geometry
    pub rect: Rect,
    pub hints: SizeHints,
    pub title: Option<String>,
    pub colormap: Colormap,
    /// Whether a non-rectangular shape has been applied to the frame
    pub shaped: bool,
    pub hidden: bool,
    /// Hidden state captured at the start of a taskbar drag
    pub was_hidden: bool,
    pub ignore_unmap: IgnoreUnmap,
    /// Value of the registry's focus counter when this client last got focus
    pub focus_order: u64,
}

impl Client {
    pub fn new(window: Window, rect: Rect) -> Self {
        Self {
            window,
            frame: x11rb::NONE,
            transient_for: None,
            rect,
            hints: SizeHints::default(),
            title: None,
            colormap: x11rb::NONE,
            shaped: false,
            hidden: false,
            was_hidden: false,
            ignore_unmap: IgnoreUnmap::default(),
            focus_order: 0,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.transient_for.is_some()
    }

    /// Title to show, falling back to the window id
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("0x{:x}", self.window))
    }
}
