//! The taskbar across the top of the screen.
//!
//! One button per client in registration order. Left click (and drag)
//! activates clients, right click opens the launcher menu in the bar, the
//! wheel cycles through clients.

use anyhow::Result;
use x11rb::protocol::xproto::Window;
use x11rb::protocol::Event;

use crate::client::ClientId;
use crate::config::Palette;
use crate::geometry::{taskbar_button_at, taskbar_button_width, Metrics, SPACE};
use crate::menu;
use crate::types::Rect;
use crate::wm::Wm;
use crate::xconn::{GrabCursor, WindowStyle, XConn};

#[derive(Debug, Clone, Copy)]
pub struct Taskbar {
    pub window: Window,
    /// Whether buttons are drawn; cleared while a fullscreen client is active
    pub showing: bool,
    /// Whether the pointer last entered the bar itself
    pub inside: bool,
}

impl Taskbar {
    pub fn create<X: XConn>(conn: &X, palette: &Palette, m: &Metrics) -> Result<Self> {
        let bw = m.border_width;
        let window = conn.create_overlay(
            conn.root(),
            Rect::new(-bw, -bw, m.screen_width, m.bar_height - bw),
            WindowStyle {
                border_width: bw,
                border: palette.border,
                background: palette.empty,
            },
        )?;
        conn.map_window(window)?;
        Ok(Self {
            window,
            showing: true,
            inside: false,
        })
    }
}

impl<X: XConn> Wm<X> {
    pub(crate) fn redraw_taskbar(&self) -> Result<()> {
        let win = self.taskbar.window;
        self.conn.clear_window(win)?;
        if !self.taskbar.showing {
            return Ok(());
        }

        let m = &self.metrics;
        let palette = &self.settings.palette;
        let (ascent, _) = self.conn.font_extents();
        let width = taskbar_button_width(self.registry.len(), m);
        let height = m.bar_height - m.border_width;

        for (i, (id, client)) in self.registry.iter().enumerate() {
            let start = (i as f32 * width) as i32;
            let inner_width = ((i + 1) as f32 * width) as i32 - start;
            if start != 0 {
                self.conn
                    .draw_line(win, palette.border, (start - 1, 0), (start - 1, height))?;
            }
            let background = if self.registry.focused() == Some(id) {
                palette.active
            } else {
                palette.inactive
            };
            self.conn
                .fill_rect(win, background, Rect::new(start, 0, inner_width, height))?;
            if let (false, Some(title)) = (client.is_transient(), &client.title) {
                self.conn
                    .draw_text(win, palette.text, background, start + SPACE, SPACE + ascent, title)?;
            }
        }
        Ok(())
    }

    /// Activate a client from the taskbar: restore it if hidden, re-hide
    /// it if it was hidden before the current drag began, otherwise toggle
    /// its stacking. `previous` is the client the drag just left.
    pub(crate) fn activate(&mut self, previous: Option<ClientId>, id: ClientId) -> Result<()> {
        if let Some(old) = previous {
            if self.registry.get(old).is_some_and(|c| c.was_hidden) {
                self.hide(old)?;
            }
        }

        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        if client.hidden {
            self.unhide(id)?;
        } else if client.was_hidden {
            self.hide(id)?;
        } else {
            self.raise_lower(id)?;
        }
        self.check_focus(Some(id))
    }

    pub(crate) fn cycle_previous(&mut self) -> Result<()> {
        match self.registry.cycle_previous_target() {
            Some(id) => self.activate(None, id),
            None => Ok(()),
        }
    }

    pub(crate) fn cycle_next(&mut self) -> Result<()> {
        match self.registry.cycle_next_target() {
            Some(id) => self.activate(None, id),
            None => Ok(()),
        }
    }

    /// Left click on the taskbar. Dragging across the bar activates each
    /// button passed over; buttons that were hidden when the drag started
    /// are hidden again once the pointer leaves them.
    pub(crate) fn taskbar_left_click(&mut self, x: i32) -> Result<()> {
        if self.registry.is_empty() {
            return Ok(());
        }
        self.registry.remember_hidden();

        let m = self.metrics;
        let constraint = self
            .conn
            .create_input_window(Rect::new(0, 0, m.screen_width, m.bar_height))?;
        self.conn.map_window(constraint)?;
        if !self.conn.grab_pointer(Some(constraint), GrabCursor::Inherit)? {
            self.conn.destroy_window(constraint)?;
            self.registry.forget_hidden();
            return Ok(());
        }

        let mut deferred = Vec::new();
        let result = self.track_taskbar_drag(x, &mut deferred);

        self.conn.destroy_window(constraint)?;
        self.conn.ungrab_pointer()?;
        self.registry.forget_hidden();
        self.conn.requeue(deferred);
        result
    }

    fn track_taskbar_drag(&mut self, x: i32, deferred: &mut Vec<Event>) -> Result<()> {
        let ids = self.registry.ids().to_vec();
        let m = self.metrics;
        let mut button = taskbar_button_at(x, ids.len(), &m);
        let mut current = button.map(|i| ids[i]);
        if let Some(id) = current {
            self.activate(None, id)?;
        }

        loop {
            match self.next_modal_event()? {
                Event::Expose(e) => self.redraw_exposed_frame(e.window)?,
                Event::MotionNotify(e) => {
                    let under = taskbar_button_at(e.root_x as i32, ids.len(), &m);
                    if let Some(index) = under.filter(|_| under != button) {
                        let previous = current;
                        button = under;
                        current = Some(ids[index]);
                        self.activate(previous, ids[index])?;
                    }
                }
                Event::ButtonPress(_) | Event::ButtonRelease(_) => return Ok(()),
                Event::KeyPress(e) => {
                    deferred.push(Event::KeyPress(e));
                    return Ok(());
                }
                other => deferred.push(other),
            }
        }
    }

    /// Right click on the taskbar: show the menu in the bar and launch the
    /// item under the pointer when the button is released.
    pub(crate) fn taskbar_right_click(&mut self, x: i32) -> Result<()> {
        let m = self.metrics;
        let constraint = self
            .conn
            .create_input_window(Rect::new(0, 0, m.screen_width, m.bar_height))?;
        self.conn.map_window(constraint)?;
        if !self.conn.grab_pointer(Some(constraint), GrabCursor::Inherit)? {
            self.conn.destroy_window(constraint)?;
            return Ok(());
        }

        let mut deferred = Vec::new();
        let result = self.track_menu(x, &mut deferred);

        self.redraw_taskbar()?;
        self.conn.destroy_window(constraint)?;
        self.conn.ungrab_pointer()?;
        self.conn.requeue(deferred);
        result
    }

    fn track_menu(&mut self, x: i32, deferred: &mut Vec<Event>) -> Result<()> {
        self.draw_menubar()?;
        let mut current = self.update_menu_highlight(None, x)?;

        loop {
            match self.next_modal_event()? {
                Event::MotionNotify(e) => {
                    current = self.update_menu_highlight(current, e.root_x as i32)?;
                }
                Event::ButtonRelease(_) => {
                    if let Some(item) = current.and_then(|i| self.menu.get(i)) {
                        menu::spawn(item);
                    }
                    return Ok(());
                }
                Event::ButtonPress(_) => return Ok(()),
                Event::KeyPress(e) => {
                    deferred.push(Event::KeyPress(e));
                    return Ok(());
                }
                other => deferred.push(other),
            }
        }
    }

    /// Right click on the root: show the menu, and switch to the taskbar
    /// menu once the pointer reaches the bar.
    pub(crate) fn root_right_click(&mut self) -> Result<()> {
        if !self.conn.grab_pointer(None, GrabCursor::Inherit)? {
            return Ok(());
        }
        self.draw_menubar()?;

        let mut deferred = Vec::new();
        loop {
            let event = match self.next_modal_event() {
                Ok(event) => event,
                Err(e) => {
                    self.conn.ungrab_pointer()?;
                    self.conn.requeue(deferred);
                    return Err(e);
                }
            };
            match event {
                Event::MotionNotify(e) if (e.root_y as i32) < self.metrics.bar_height => {
                    self.conn.ungrab_pointer()?;
                    self.conn.requeue(deferred);
                    return self.taskbar_right_click(e.root_x as i32);
                }
                Event::MotionNotify(_) | Event::ButtonPress(_) => {}
                Event::ButtonRelease(_) => break,
                Event::KeyPress(e) => {
                    deferred.push(Event::KeyPress(e));
                    break;
                }
                other => deferred.push(other),
            }
        }

        self.redraw_taskbar()?;
        self.conn.ungrab_pointer()?;
        self.conn.requeue(deferred);
        Ok(())
    }

    fn draw_menubar(&self) -> Result<()> {
        let m = &self.metrics;
        let palette = &self.settings.palette;
        let (ascent, _) = self.conn.font_extents();
        self.conn.fill_rect(
            self.taskbar.window,
            palette.menu,
            Rect::new(0, 0, m.screen_width, m.bar_height - m.border_width),
        )?;
        for item in self.menu.items() {
            self.conn.draw_text(
                self.taskbar.window,
                palette.text,
                palette.menu,
                item.x + SPACE * 2,
                ascent + SPACE,
                &item.label,
            )?;
        }
        Ok(())
    }

    fn draw_menu_item(&self, index: usize, selected: bool) -> Result<()> {
        let Some(item) = self.menu.get(index) else {
            return Ok(());
        };
        let palette = &self.settings.palette;
        let background = if selected { palette.selected } else { palette.menu };
        let (ascent, _) = self.conn.font_extents();
        self.conn.fill_rect(
            self.taskbar.window,
            background,
            Rect::new(item.x, 0, item.width, self.metrics.bar_height - self.metrics.border_width),
        )?;
        self.conn.draw_text(
            self.taskbar.window,
            palette.text,
            background,
            item.x + SPACE * 2,
            ascent + SPACE,
            &item.label,
        )
    }

    /// Move the menu highlight to the item under `x`, redrawing only the
    /// items that changed. Returns the highlighted item.
    fn update_menu_highlight(&self, last: Option<usize>, x: i32) -> Result<Option<usize>> {
        let item = self.menu.item_at(x);
        if item != last {
            if let Some(old) = last {
                self.draw_menu_item(old, false)?;
            }
            if let Some(new) = item {
                self.draw_menu_item(new, true)?;
            }
        }
        Ok(item)
    }
}
