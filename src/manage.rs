//! Client lifecycle: taking windows under management, releasing them, and
//! the hide, stacking, fullscreen and focus transitions in between.
//!
//! The registry records the outcome of each transition; the functions here
//! issue the matching server requests.

use std::rc::Rc;

use anyhow::Result;
use x11rb::protocol::xproto::Window;

use crate::client::{Client, ClientId};
use crate::errors::ErrorGuard;
use crate::geometry::{fix_position, fullscreen_placement, gravitate};
use crate::registry::FullscreenSlot;
use crate::state::{RemoveMode, RemoveReason, StateTransition};
use crate::types::{Rect, SizeHints, WmState};
use crate::wm::Wm;
use crate::xconn::{ShapeKind, WindowStyle, XConn};

impl<X: XConn> Wm<X> {
    /// Take a top-level window under management.
    ///
    /// Windows that vanish while being set up are skipped; the resulting
    /// DestroyNotify finds nothing to clean up.
    pub(crate) fn create(&mut self, window: Window) -> Result<()> {
        let conn = Rc::clone(&self.conn);
        let guard = ErrorGuard::engage(conn.as_ref())?;

        let Some(attrs) = conn.window_attributes(window)? else {
            log::debug!("Window 0x{:x} vanished before it could be managed", window);
            return Ok(());
        };

        let mut client = Client::new(window, attrs.rect);
        client.transient_for = conn.transient_for(window);
        client.title = conn.fetch_name(window);
        client.colormap = attrs.colormap;
        client.hints = conn.size_hints(window);

        let mut iconic = false;
        if attrs.viewable {
            // Reparenting a mapped window unmaps it
            client.ignore_unmap.expect_unmap();
        } else {
            client.rect = self.init_position(client.rect, &client.hints)?;
            iconic = conn.initial_state(window) == Some(WmState::Iconic);
        }

        client.rect = fix_position(client.rect, false, &self.metrics);
        client.rect = gravitate(client.rect, &client.hints, 1, &self.metrics);

        let id = self.registry.insert(client);
        let frame = self.reparent(id)?;

        if iconic {
            if let Some(client) = self.registry.get_mut(id) {
                client.hidden = true;
            }
            conn.set_wm_state(window, WmState::Iconic)?;
        } else {
            conn.map_window(window)?;
            conn.map_raised(frame)?;
            self.registry.set_topmost(Some(id));
            conn.set_wm_state(window, WmState::Normal)?;
        }

        self.tracer.trace_transition(&StateTransition::ClientManaged {
            window,
            frame,
            iconic,
        });
        log::info!(
            "Managing 0x{:x} in frame 0x{:x}{}",
            window,
            frame,
            if iconic { " (iconic)" } else { "" }
        );

        if self.registry.focused().is_none() && !iconic {
            self.check_focus(Some(id))?;
        }

        drop(guard);
        self.redraw_taskbar()
    }

    /// Pick a position for a window that was never mapped. A window at the
    /// origin is placed at the pointer.
    fn init_position(&self, rect: Rect, hints: &SizeHints) -> Result<Rect> {
        let bar = self.metrics.bar_height;
        let mut r = rect;
        r.width = r.width.max(bar * 4);
        r.height = r.height.max(bar);

        if r.x == 0 && r.y == 0 {
            let (x, y) = self.conn.query_pointer()?;
            r.x = x;
            r.y = y + bar;
            r = gravitate(r, hints, -1, &self.metrics);
        }
        Ok(r)
    }

    /// Create the frame for a registered client and move its window inside.
    fn reparent(&mut self, id: ClientId) -> Result<Window> {
        let Some(client) = self.registry.get(id) else {
            return Ok(x11rb::NONE);
        };
        let window = client.window;
        let r = client.rect;
        let m = self.metrics;
        let palette = &self.settings.palette;

        let frame = self.conn.create_frame(
            Rect::new(r.x, r.y - m.bar_height, r.width, r.height + m.bar_height),
            WindowStyle {
                border_width: m.border_width,
                border: palette.border,
                background: palette.empty,
            },
        )?;
        if let Some(client) = self.registry.get_mut(id) {
            client.frame = frame;
        }

        self.conn.select_client_input(window)?;
        self.set_shape(id)?;
        self.conn.add_to_save_set(window)?;
        self.conn.set_border_width(window, 0)?;
        self.conn.resize_window(window, r.width, r.height)?;
        self.conn.reparent(window, frame, 0, m.bar_height)?;
        self.send_config(id)?;
        Ok(frame)
    }

    /// Release a client.
    ///
    /// Runs under an [`ErrorGuard`]: the window may already be gone, and
    /// every request against it is allowed to fail.
    pub(crate) fn remove(&mut self, id: ClientId, reason: RemoveReason) -> Result<()> {
        let Some(client) = self.registry.get(id).cloned() else {
            return Ok(());
        };
        let conn = Rc::clone(&self.conn);
        let guard = ErrorGuard::engage(conn.as_ref())?;

        match reason.mode() {
            RemoveMode::Withdraw => conn.set_wm_state(client.window, WmState::Withdrawn)?,
            RemoveMode::Remap => conn.map_window(client.window)?,
        }

        let rect = gravitate(client.rect, &client.hints, -1, &self.metrics);
        conn.reparent(client.window, conn.root(), rect.x, rect.y)?;
        conn.set_border_width(client.window, 1)?;
        conn.remove_from_save_set(client.window)?;
        conn.destroy_window(client.frame)?;

        let was_focused = self.registry.focused() == Some(id);
        if self.registry.is_fullscreen(id) {
            self.taskbar.showing = true;
        }
        self.registry.unlink(id);
        self.tracer.trace_transition(&StateTransition::ClientRemoved {
            window: client.window,
            reason,
        });
        log::info!(
            "Released 0x{:x} ({:?}), {} clients left",
            client.window,
            reason,
            self.registry.len()
        );

        if was_focused {
            self.check_focus(self.registry.previous_focused())?;
        }

        drop(guard);
        self.redraw_taskbar()
    }

    /// Iconify a client. Hiding a hidden client does nothing.
    pub(crate) fn hide(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.registry.get_mut(id) else {
            return Ok(());
        };
        if client.hidden {
            return Ok(());
        }
        client.ignore_unmap.expect_unmap();
        client.hidden = true;
        let (window, frame) = (client.window, client.frame);

        if self.registry.topmost() == Some(id) {
            self.registry.set_topmost(None);
        }
        self.conn.unmap_window(frame)?;
        self.conn.unmap_window(window)?;
        self.conn.set_wm_state(window, WmState::Iconic)?;
        self.tracer
            .trace_transition(&StateTransition::ClientHidden { window });

        self.check_focus(self.registry.previous_focused())
    }

    /// Restore an iconified client on top. Unhiding a visible client does
    /// nothing.
    pub(crate) fn unhide(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.registry.get_mut(id) else {
            return Ok(());
        };
        if !client.hidden {
            return Ok(());
        }
        client.hidden = false;
        let (window, frame) = (client.window, client.frame);

        self.registry.set_topmost(Some(id));
        self.conn.map_window(window)?;
        self.conn.map_raised(frame)?;
        self.conn.set_wm_state(window, WmState::Normal)?;
        self.tracer
            .trace_transition(&StateTransition::ClientUnhidden { window });
        Ok(())
    }

    /// Raise the client, or lower it if it was the last one raised.
    pub(crate) fn raise_lower(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        // A hidden client cannot hold the topmost token
        if client.hidden {
            return Ok(());
        }
        let frame = client.frame;

        if self.registry.topmost() == Some(id) {
            self.conn.lower_window(frame)?;
            self.registry.set_topmost(None);
        } else {
            self.conn.raise_window(frame)?;
            self.registry.set_topmost(Some(id));
        }
        Ok(())
    }

    /// Toggle fullscreen for the focused client. Transient clients are
    /// left alone.
    pub(crate) fn toggle_fullscreen(&mut self) -> Result<()> {
        let Some(id) = self.registry.focused() else {
            return Ok(());
        };
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        if client.is_transient() {
            return Ok(());
        }
        let (window, frame, rect, hints) = (client.window, client.frame, client.rect, client.hints);

        if self.registry.is_fullscreen(id) {
            if let Some(slot) = self.registry.take_fullscreen() {
                self.restore_from_fullscreen(slot)?;
            }
            self.taskbar.showing = true;
            self.tracer
                .trace_transition(&StateTransition::FullscreenLeft { window });
            log::info!("0x{:x} left fullscreen", window);
        } else {
            if let Some(slot) = self.registry.take_fullscreen() {
                self.restore_from_fullscreen(slot)?;
                if let Some(previous) = self.window_of(Some(slot.client)) {
                    self.tracer
                        .trace_transition(&StateTransition::FullscreenLeft { window: previous });
                }
            }

            let placement = fullscreen_placement(&hints, &self.metrics);
            self.registry.set_fullscreen(id, rect);
            if let Some(client) = self.registry.get_mut(id) {
                client.rect = placement.client_rect();
            }
            self.conn.move_resize(frame, placement.frame)?;
            self.conn.move_resize(window, placement.window)?;
            self.send_config(id)?;
            self.taskbar.showing = self.taskbar.inside;
            self.tracer
                .trace_transition(&StateTransition::FullscreenEntered { window });
            log::info!("0x{:x} entered fullscreen", window);
        }

        self.redraw_taskbar()
    }

    /// Put a client that just lost the fullscreen slot back where it was.
    fn restore_from_fullscreen(&mut self, slot: FullscreenSlot) -> Result<()> {
        let Some(client) = self.registry.get_mut(slot.client) else {
            return Ok(());
        };
        client.rect = slot.restore;
        let (window, frame) = (client.window, client.frame);
        let r = slot.restore;
        let bar = self.metrics.bar_height;

        self.conn
            .move_resize(frame, Rect::new(r.x, r.y - bar, r.width, r.height + bar))?;
        self.conn
            .move_resize(window, Rect::new(0, bar, r.width, r.height))?;
        self.send_config(slot.client)
    }

    /// Give focus to `candidate`, falling back to nobody when it is stale.
    /// Nothing happens when it already has focus.
    pub(crate) fn check_focus(&mut self, candidate: Option<ClientId>) -> Result<()> {
        let candidate = candidate.filter(|&id| self.registry.contains(id));
        if candidate == self.registry.focused() {
            return Ok(());
        }

        if let Some(client) = candidate.and_then(|id| self.registry.get(id)) {
            self.conn.set_input_focus(client.window)?;
            self.conn.install_colormap(client.colormap)?;
        }

        let Some(previous) = self.registry.transfer_focus(candidate) else {
            return Ok(());
        };
        self.tracer.trace_transition(&StateTransition::FocusChanged {
            from: self.window_of(previous),
            to: self.window_of(candidate),
        });
        log::debug!(
            "Focus 0x{:x} -> 0x{:x}",
            self.window_of(previous).unwrap_or(0),
            self.window_of(candidate).unwrap_or(0)
        );

        if let Some(id) = candidate {
            self.redraw_client(id)?;
        }
        if let Some(id) = previous {
            self.redraw_client(id)?;
        }
        self.redraw_taskbar()
    }

    /// Make the frame's shape follow a shaped client window, with the
    /// title bar added on top.
    pub(crate) fn set_shape(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        let (window, frame, r, shaped) = (client.window, client.frame, client.rect, client.shaped);
        let bar = self.metrics.bar_height;
        let bw = self.metrics.border_width;

        if self.conn.bounding_shape_rects(window)? > 1 {
            self.conn.shape_from_window(frame, window, bar)?;
            self.conn.shape_union(
                frame,
                ShapeKind::Bounding,
                (0, 0),
                Rect::new(-bw, -bw, r.width + 2 * bw, bar + bw),
            )?;
            // The clip keeps the title bar's border painted
            self.conn.shape_union(
                frame,
                ShapeKind::Clip,
                (0, bar),
                Rect::new(0, 0, r.width, bar - bw),
            )?;
            if let Some(client) = self.registry.get_mut(id) {
                client.shaped = true;
            }
        } else if shaped {
            self.conn.shape_reset(
                frame,
                Rect::new(-bw, -bw, r.width + 2 * bw, r.height + bar + 2 * bw),
            )?;
            if let Some(client) = self.registry.get_mut(id) {
                client.shaped = false;
            }
        }
        Ok(())
    }

    /// Tell the client where it is, as ICCCM asks after a move.
    pub(crate) fn send_config(&self, id: ClientId) -> Result<()> {
        match self.registry.get(id) {
            Some(client) => self.conn.send_configure_notify(client.window, client.rect),
            None => Ok(()),
        }
    }

    /// Ask a client to close, killing it when it does not speak
    /// WM_DELETE_WINDOW.
    pub(crate) fn close_client(&self, id: ClientId) -> Result<()> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        if self.conn.supports_delete(client.window) {
            log::info!("Asking 0x{:x} to close", client.window);
            self.conn.send_delete(client.window)
        } else {
            log::info!("Killing 0x{:x}", client.window);
            self.conn.kill_client(client.window)
        }
    }
}
