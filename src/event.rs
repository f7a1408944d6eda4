//! Event handling for X11 events.
//!
//! Routes each server event to the lifecycle, taskbar and interaction code.
//! Handlers look clients up by window or frame and quietly ignore events
//! for windows that are no longer managed.

use anyhow::Result;
use x11rb::protocol::shape::NotifyEvent as ShapeNotifyEvent;
use x11rb::protocol::xproto::*;
use x11rb::protocol::{ErrorKind, Event};

use crate::geometry::{gravitate, refix_position};
use crate::registry::Lookup;
use crate::state::RemoveReason;
use crate::types::WmState;
use crate::wm::Wm;
use crate::xconn::XConn;

fn has(mask: u16, bit: ConfigWindow) -> bool {
    mask & u16::from(bit) != 0
}

impl<X: XConn> Wm<X> {
    /// Dispatch one event
    pub(crate) fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::KeyPress(e) => self.handle_key_press(e),
            Event::ButtonPress(e) => self.handle_button_press(e),
            Event::ConfigureRequest(e) => self.handle_configure_request(e),
            Event::MapRequest(e) => self.handle_map_request(e),
            Event::UnmapNotify(e) => self.handle_unmap_notify(e),
            Event::DestroyNotify(e) => self.handle_destroy_notify(e),
            Event::ClientMessage(e) => self.handle_client_message(e),
            Event::ColormapNotify(e) => self.handle_colormap_notify(e),
            Event::PropertyNotify(e) => self.handle_property_notify(e),
            Event::EnterNotify(e) => self.handle_enter_notify(e),
            Event::Expose(e) => self.handle_expose(e),
            Event::ShapeNotify(e) => self.handle_shape_notify(e),
            _ => Ok(()),
        }
    }

    /// Handle an asynchronous protocol error.
    ///
    /// BadAccess on the root means another window manager owns the display
    /// and is fatal. Any other error naming a managed window withdraws it.
    pub(crate) fn handle_x_error(
        &mut self,
        kind: ErrorKind,
        bad_value: u32,
        request: Option<&str>,
    ) -> Result<()> {
        if matches!(kind, ErrorKind::Access) && bad_value == self.conn.root() {
            anyhow::bail!("root window unavailable (maybe another window manager is running?)");
        }

        log::warn!(
            "X error {:?} on 0x{:x} from {}",
            kind,
            bad_value,
            request.unwrap_or("unknown request")
        );
        self.tracer
            .trace_x11_event("Error", Some(bad_value), &format!("{:?}", kind));

        if let Some(id) = self.registry.find(bad_value, Lookup::Window) {
            self.remove(id, RemoveReason::XError)?;
        }
        Ok(())
    }

    fn handle_key_press(&mut self, event: KeyPressEvent) -> Result<()> {
        let Some(keysym) = self.conn.keycode_to_keysym(event.detail) else {
            return Ok(());
        };
        self.tracer
            .trace_x11_event("KeyPress", None, &format!("keysym=0x{:x}", keysym));
        let keys = self.settings.keys;

        if keysym == keys.cycle_prev {
            self.cycle_previous()
        } else if keysym == keys.cycle_next {
            self.cycle_next()
        } else if keysym == keys.fullscreen {
            self.toggle_fullscreen()
        } else if keysym == keys.toggle_z {
            match self.registry.focused() {
                Some(id) => self.raise_lower(id),
                None => Ok(()),
            }
        } else {
            Ok(())
        }
    }

    fn handle_button_press(&mut self, event: ButtonPressEvent) -> Result<()> {
        self.tracer.trace_x11_event(
            "ButtonPress",
            Some(event.event),
            &format!("button={} x={} y={}", event.detail, event.event_x, event.event_y),
        );
        let modifier = self.settings.keys.modifier;

        if modifier != 0 && u16::from(event.state) & modifier != 0 {
            let target = self
                .registry
                .focused()
                .filter(|&id| !self.registry.is_fullscreen(id));
            return match target {
                Some(id) => self.resize_client(id, (event.root_x as i32, event.root_y as i32)),
                None => self.conn.replay_pointer(),
            };
        }

        if event.event == self.conn.root() {
            self.dump_state();
            if event.detail == 3 {
                self.root_right_click()?;
            }
        } else if event.event == self.taskbar.window {
            let x = event.event_x as i32;
            match event.detail {
                1 => self.taskbar_left_click(x)?,
                3 => self.taskbar_right_click(x)?,
                4 => self.cycle_previous()?,
                5 => self.cycle_next()?,
                _ => {}
            }
        } else {
            self.conn.replay_pointer()?;
            match event.detail {
                1 => {
                    if let Some(id) = self.registry.find(event.event, Lookup::Frame) {
                        self.check_focus(Some(id))?;
                        if (event.event_y as i32) < self.metrics.bar_height
                            && !self.registry.is_fullscreen(id)
                        {
                            self.titlebar_click(id, &event)?;
                        }
                    }
                }
                3 => self.root_right_click()?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Managed clients are kept on screen below the taskbar; a fullscreen
    /// client's request is remembered for when it leaves fullscreen;
    /// anything else is passed through untouched.
    fn handle_configure_request(&mut self, event: ConfigureRequestEvent) -> Result<()> {
        let mask = u16::from(event.value_mask);
        self.tracer.trace_x11_event(
            "ConfigureRequest",
            Some(event.window),
            &format!(
                "{}x{}+{}+{} mask=0x{:x}",
                event.width, event.height, event.x, event.y, mask
            ),
        );

        let Some(id) = self.registry.find(event.window, Lookup::Window) else {
            let aux = ConfigureWindowAux::from_configure_request(&event);
            return self.conn.configure_window(event.window, &aux);
        };

        if self.registry.is_fullscreen(id) {
            if let Some(restore) = self.registry.fullscreen_restore_mut() {
                if has(mask, ConfigWindow::X) {
                    restore.x = event.x as i32;
                }
                if has(mask, ConfigWindow::Y) {
                    restore.y = event.y as i32;
                }
                if has(mask, ConfigWindow::WIDTH) {
                    restore.width = event.width as i32;
                }
                if has(mask, ConfigWindow::HEIGHT) {
                    restore.height = event.height as i32;
                }
            }
            return Ok(());
        }

        let m = self.metrics;
        let Some(client) = self.registry.get_mut(id) else {
            return Ok(());
        };

        // Back to the client's own coordinates before applying the request
        let mut rect = gravitate(client.rect, &client.hints, -1, &m);
        rect.x += m.border_width;
        rect.y += m.border_width;
        if has(mask, ConfigWindow::X) {
            rect.x = event.x as i32;
        }
        if has(mask, ConfigWindow::Y) {
            rect.y = event.y as i32;
        }
        if has(mask, ConfigWindow::WIDTH) {
            rect.width = event.width as i32;
        }
        if has(mask, ConfigWindow::HEIGHT) {
            rect.height = event.height as i32;
        }

        let (fixed, changed) = refix_position(rect, false, &m);
        let rect = gravitate(fixed, &client.hints, 1, &m);
        client.rect = rect;
        let (window, frame) = (client.window, client.frame);
        let mask = mask | u16::from(changed);

        let mut frame_aux = ConfigureWindowAux::new();
        let mut window_aux = ConfigureWindowAux::new();
        if has(mask, ConfigWindow::X) {
            frame_aux = frame_aux.x(rect.x);
            window_aux = window_aux.x(0);
        }
        if has(mask, ConfigWindow::Y) {
            frame_aux = frame_aux.y(rect.y - m.bar_height);
            window_aux = window_aux.y(m.bar_height);
        }
        if has(mask, ConfigWindow::WIDTH) {
            frame_aux = frame_aux.width(rect.width.max(1) as u32);
            window_aux = window_aux.width(rect.width.max(1) as u32);
        }
        if has(mask, ConfigWindow::HEIGHT) {
            frame_aux = frame_aux.height((rect.height + m.bar_height).max(1) as u32);
            window_aux = window_aux.height(rect.height.max(1) as u32);
        }
        if has(mask, ConfigWindow::BORDER_WIDTH) {
            frame_aux = frame_aux.border_width(m.border_width.max(0) as u32);
        }

        self.conn.configure_window(frame, &frame_aux)?;
        if has(mask, ConfigWindow::WIDTH) || has(mask, ConfigWindow::HEIGHT) {
            self.set_shape(id)?;
        }
        self.send_config(id)?;
        self.conn.configure_window(window, &window_aux)
    }

    fn handle_map_request(&mut self, event: MapRequestEvent) -> Result<()> {
        self.tracer
            .trace_x11_event("MapRequest", Some(event.window), "");
        match self.registry.find(event.window, Lookup::Window) {
            Some(id) => self.unhide(id),
            None => self.create(event.window),
        }
    }

    /// Unmaps the manager caused itself are counted off; any other unmap
    /// means the client withdrew the window.
    fn handle_unmap_notify(&mut self, event: UnmapNotifyEvent) -> Result<()> {
        let Some(id) = self.registry.find(event.window, Lookup::Window) else {
            return Ok(());
        };
        let Some(client) = self.registry.get_mut(id) else {
            return Ok(());
        };
        if client.ignore_unmap.consume() {
            self.tracer
                .trace_x11_event("UnmapNotify", Some(event.window), "ignored");
            return Ok(());
        }
        self.tracer
            .trace_x11_event("UnmapNotify", Some(event.window), "withdrawn");
        self.remove(id, RemoveReason::ClientUnmapped)
    }

    /// Iconified clients never send UnmapNotify before going away
    fn handle_destroy_notify(&mut self, event: DestroyNotifyEvent) -> Result<()> {
        self.tracer
            .trace_x11_event("DestroyNotify", Some(event.window), "");
        match self.registry.find(event.window, Lookup::Window) {
            Some(id) => self.remove(id, RemoveReason::ClientDestroyed),
            None => Ok(()),
        }
    }

    /// WM_CHANGE_STATE asking for IconicState hides the client
    fn handle_client_message(&mut self, event: ClientMessageEvent) -> Result<()> {
        self.tracer.trace_x11_event(
            "ClientMessage",
            Some(event.window),
            &format!("type={}", event.type_),
        );
        let Some(id) = self.registry.find(event.window, Lookup::Window) else {
            return Ok(());
        };
        if event.type_ == self.conn.atoms().wm_change_state
            && event.format == 32
            && event.data.as_data32()[0] == WmState::Iconic.as_u32()
        {
            self.hide(id)?;
        }
        Ok(())
    }

    fn handle_colormap_notify(&mut self, event: ColormapNotifyEvent) -> Result<()> {
        if !event.new {
            return Ok(());
        }
        let Some(id) = self.registry.find(event.window, Lookup::Window) else {
            return Ok(());
        };
        if let Some(client) = self.registry.get_mut(id) {
            client.colormap = event.colormap;
        }
        self.conn.install_colormap(event.colormap)
    }

    /// Only the title and the size hints are cached
    fn handle_property_notify(&mut self, event: PropertyNotifyEvent) -> Result<()> {
        let Some(id) = self.registry.find(event.window, Lookup::Window) else {
            return Ok(());
        };

        if event.atom == Atom::from(AtomEnum::WM_NAME) {
            let title = self.conn.fetch_name(event.window);
            self.tracer.trace_x11_event(
                "PropertyNotify",
                Some(event.window),
                &format!("WM_NAME={:?}", title),
            );
            if let Some(client) = self.registry.get_mut(id) {
                client.title = title;
            }
            self.redraw_client(id)?;
            self.redraw_taskbar()?;
        } else if event.atom == Atom::from(AtomEnum::WM_NORMAL_HINTS) {
            let hints = self.conn.size_hints(event.window);
            if let Some(client) = self.registry.get_mut(id) {
                client.hints = hints;
            }
        }
        Ok(())
    }

    /// Show the taskbar when the pointer enters it, and keep it hidden
    /// elsewhere while a client is fullscreen. Entering a frame re-grabs
    /// its buttons so click-to-focus keeps working.
    fn handle_enter_notify(&mut self, event: EnterNotifyEvent) -> Result<()> {
        if event.event == self.taskbar.window {
            self.taskbar.inside = true;
            if !self.taskbar.showing {
                self.taskbar.showing = true;
                self.redraw_taskbar()?;
            }
            return Ok(());
        }

        self.taskbar.inside = false;
        let show = self.registry.fullscreen().is_none();
        if self.taskbar.showing != show {
            self.taskbar.showing = show;
            self.redraw_taskbar()?;
        }

        if let Some(id) = self.registry.find(event.event, Lookup::Frame) {
            if let Some(client) = self.registry.get(id) {
                self.conn.grab_buttons(client.frame)?;
            }
        }
        Ok(())
    }

    /// Redraw once the last of a batch of exposures arrives
    fn handle_expose(&mut self, event: ExposeEvent) -> Result<()> {
        if event.count != 0 {
            return Ok(());
        }
        if event.window == self.taskbar.window {
            return self.redraw_taskbar();
        }
        self.redraw_exposed_frame(event.window)
    }

    fn handle_shape_notify(&mut self, event: ShapeNotifyEvent) -> Result<()> {
        match self.registry.find(event.affected_window, Lookup::Window) {
            Some(id) => self.set_shape(id),
            None => Ok(()),
        }
    }
}
