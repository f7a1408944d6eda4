//! Window property query functions.
//!
//! Stateless functions for reading and writing the ICCCM properties of a
//! client window. Readers treat a missing or malformed property as absent
//! since the client may have vanished or never set it.

use anyhow::Result;
use x11rb::connection::Connection;
use x11rb::properties::{WmHints, WmHintsState, WmSizeHints};
use x11rb::protocol::xproto::*;
use x11rb::wrapper::ConnectionExt as _;

use crate::atoms::Atoms;
use crate::types::{Gravity, Rect, SizeHints, WmState};

/// Get the window title from WM_NAME.
pub fn get_window_title(conn: &impl Connection, window: Window) -> Option<String> {
    let reply = conn
        .get_property(false, window, AtomEnum::WM_NAME, AtomEnum::ANY, 0, 1024)
        .ok()?
        .reply()
        .ok()?;
    if reply.value.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(&reply.value).into_owned())
}

/// Read WM_TRANSIENT_FOR.
pub fn get_transient_for(conn: &impl Connection, window: Window) -> Option<Window> {
    let reply = conn
        .get_property(
            false,
            window,
            AtomEnum::WM_TRANSIENT_FOR,
            AtomEnum::WINDOW,
            0,
            1,
        )
        .ok()?
        .reply()
        .ok()?;
    reply
        .value32()
        .and_then(|mut values| values.next())
        .filter(|&owner| owner != x11rb::NONE)
}

/// Read WM_NORMAL_HINTS, returning empty hints when the client set none.
pub fn get_size_hints(conn: &impl Connection, window: Window) -> SizeHints {
    let hints = WmSizeHints::get_normal_hints(conn, window)
        .ok()
        .and_then(|cookie| cookie.reply().ok())
        .flatten();

    match hints {
        Some(hints) => SizeHints {
            min_size: hints.min_size,
            max_size: hints.max_size,
            size_increment: hints.size_increment,
            base_size: hints.base_size,
            gravity: hints.win_gravity.and_then(convert_gravity),
        },
        None => SizeHints::default(),
    }
}

fn convert_gravity(gravity: x11rb::protocol::xproto::Gravity) -> Option<Gravity> {
    Some(match u32::from(gravity) {
        1 => Gravity::NorthWest,
        2 => Gravity::North,
        3 => Gravity::NorthEast,
        4 => Gravity::West,
        5 => Gravity::Center,
        6 => Gravity::East,
        7 => Gravity::SouthWest,
        8 => Gravity::South,
        9 => Gravity::SouthEast,
        10 => Gravity::Static,
        _ => return None,
    })
}

/// Initial state requested through WM_HINTS, if any.
pub fn get_initial_state(conn: &impl Connection, window: Window) -> Option<WmState> {
    let hints = WmHints::get(conn, window).ok()?.reply().ok()??;
    hints.initial_state.map(|state| match state {
        WmHintsState::Iconic => WmState::Iconic,
        WmHintsState::Normal => WmState::Normal,
    })
}

/// Write WM_STATE. The icon field is always None.
pub fn set_wm_state(
    conn: &impl Connection,
    atoms: &Atoms,
    window: Window,
    state: WmState,
) -> Result<()> {
    conn.change_property32(
        PropMode::REPLACE,
        window,
        atoms.wm_state,
        atoms.wm_state,
        &[state.as_u32(), x11rb::NONE],
    )?;
    Ok(())
}

/// Check if a window supports the WM_DELETE_WINDOW protocol.
pub fn supports_delete_protocol(conn: &impl Connection, atoms: &Atoms, window: Window) -> bool {
    // Get WM_PROTOCOLS property
    if let Ok(cookie) = conn.get_property(
        false,
        window,
        atoms.wm_protocols,
        AtomEnum::ATOM,
        0,
        32,
    ) {
        if let Ok(reply) = cookie.reply() {
            if let Some(mut protocol_atoms) = reply.value32() {
                return protocol_atoms.any(|a| a == atoms.wm_delete_window);
            }
        }
    }
    false
}

/// Send WM_DELETE_WINDOW client message to request graceful close.
pub fn send_delete_window(conn: &impl Connection, atoms: &Atoms, window: Window) -> Result<()> {
    let data = ClientMessageData::from([
        atoms.wm_delete_window,
        x11rb::CURRENT_TIME,
        0u32,
        0u32,
        0u32,
    ]);
    let event = ClientMessageEvent {
        response_type: CLIENT_MESSAGE_EVENT,
        format: 32,
        sequence: 0,
        window,
        type_: atoms.wm_protocols,
        data,
    };
    conn.send_event(false, window, EventMask::NO_EVENT, event)?;
    Ok(())
}

/// Tell a reparented client where it actually is in root coordinates.
pub fn send_configure_notify(conn: &impl Connection, window: Window, rect: Rect) -> Result<()> {
    let event = ConfigureNotifyEvent {
        response_type: CONFIGURE_NOTIFY_EVENT,
        sequence: 0,
        event: window,
        window,
        above_sibling: x11rb::NONE,
        x: rect.x as i16,
        y: rect.y as i16,
        width: rect.width.max(1) as u16,
        height: rect.height.max(1) as u16,
        border_width: 0,
        override_redirect: false,
    };
    conn.send_event(false, window, EventMask::STRUCTURE_NOTIFY, event)?;
    Ok(())
}
