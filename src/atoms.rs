//! ICCCM atom management.
//!
//! The handful of atoms the window manager needs beyond the predefined
//! ones (WM_NAME, WM_NORMAL_HINTS, WM_HINTS, WM_TRANSIENT_FOR).

use anyhow::Result;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Atom, ConnectionExt};

/// ICCCM atoms used by the window manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atoms {
    pub wm_state: Atom,
    pub wm_change_state: Atom,
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
}

impl Atoms {
    /// Create and intern all required atoms
    pub fn new(conn: &impl Connection) -> Result<Self> {
        Ok(Self {
            wm_state: Self::intern(conn, b"WM_STATE")?,
            wm_change_state: Self::intern(conn, b"WM_CHANGE_STATE")?,
            wm_protocols: Self::intern(conn, b"WM_PROTOCOLS")?,
            wm_delete_window: Self::intern(conn, b"WM_DELETE_WINDOW")?,
        })
    }

    /// Intern an atom name
    fn intern(conn: &impl Connection, name: &[u8]) -> Result<Atom> {
        Ok(conn.intern_atom(false, name)?.reply()?.atom)
    }
}
