//! Pointer-driven interaction: moving and resizing clients and pressing
//! title-bar buttons.
//!
//! Each interaction grabs the pointer and runs its own event loop until the
//! button is released. Events the loop has no use for are held back and
//! handed to the main loop once the grab ends.

use anyhow::Result;
use x11rb::protocol::xproto::{ButtonPressEvent, Window};
use x11rb::protocol::Event;

use crate::client::ClientId;
use crate::geometry::{box_clicked, classify_drag, move_bounds, ResizeDrag, TitleBarHit, SPACE};
use crate::registry::Lookup;
use crate::state::StateTransition;
use crate::types::Rect;
use crate::wm::Wm;
use crate::xconn::{GrabCursor, WindowStyle, XConn};

impl<X: XConn> Wm<X> {
    /// Next event for a modal loop. Signal interruptions are skipped, so a
    /// shutdown request waits until the interaction ends.
    pub(crate) fn next_modal_event(&self) -> Result<Event> {
        loop {
            if let Some(event) = self.conn.next_event()? {
                return Ok(event);
            }
        }
    }

    /// Repaint whatever manager-owned window an Expose names
    pub(crate) fn redraw_exposed_frame(&self, window: Window) -> Result<()> {
        if window == self.taskbar.window {
            return self.redraw_taskbar();
        }
        match self.registry.find(window, Lookup::Frame) {
            Some(id) => self.redraw_client(id),
            None => Ok(()),
        }
    }

    /// Drag a client by its title bar until the button is released.
    pub(crate) fn move_client(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        let start = client.rect;
        let pointer = self.conn.query_pointer()?;

        let bounds = move_bounds(pointer, start, &self.metrics);
        let constraint = self.conn.create_input_window(bounds)?;
        self.conn.map_window(constraint)?;
        if !self.conn.grab_pointer(Some(constraint), GrabCursor::Inherit)? {
            self.conn.destroy_window(constraint)?;
            return Ok(());
        }

        let mut deferred = Vec::new();
        let result = self.track_move(id, start, pointer, &mut deferred);

        log_cleanup("release the pointer", self.conn.ungrab_pointer());
        log_cleanup("destroy the move constraint", self.conn.destroy_window(constraint));
        self.conn.requeue(deferred);
        self.trace_moved(id);
        result
    }

    fn track_move(
        &mut self,
        id: ClientId,
        start: Rect,
        pointer: (i32, i32),
        deferred: &mut Vec<Event>,
    ) -> Result<()> {
        let bar = self.metrics.bar_height;
        loop {
            match self.next_modal_event()? {
                Event::Expose(e) => self.redraw_exposed_frame(e.window)?,
                Event::MotionNotify(e) => {
                    let x = start.x + (e.root_x as i32 - pointer.0);
                    let y = start.y + (e.root_y as i32 - pointer.1);
                    let Some(client) = self.registry.get_mut(id) else {
                        return Ok(());
                    };
                    client.rect.x = x;
                    client.rect.y = y;
                    let frame = client.frame;
                    self.conn.move_window(frame, x, y - bar)?;
                    self.send_config(id)?;
                }
                Event::ButtonRelease(_) => return Ok(()),
                Event::ButtonPress(_) => {}
                other => deferred.push(other),
            }
        }
    }

    /// Resize a client from a modifier click at `press` (root coordinates).
    ///
    /// Clicking inside the client drags whichever edge the pointer crosses
    /// outwards; clicking outside pulls the nearest edge in. The client's
    /// frame is hidden behind an outline until the button is released.
    pub(crate) fn resize_client(&mut self, id: ClientId, press: (i32, i32)) -> Result<()> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        let m = self.metrics;
        let palette = self.settings.palette;
        let (window, frame, start) = (client.window, client.frame, client.rect);
        let mut drag = ResizeDrag::new(classify_drag(press, start, &m), start, &m);

        let constraint = self
            .conn
            .create_input_window(Rect::new(0, 0, m.screen_width, m.screen_height))?;
        self.conn.map_window(constraint)?;
        if !self.conn.grab_pointer(Some(constraint), GrabCursor::Resize)? {
            self.conn.destroy_window(constraint)?;
            return Ok(());
        }

        let outline = self.conn.create_overlay(
            self.conn.root(),
            drag.frame_rect(),
            WindowStyle {
                border_width: m.border_width,
                border: palette.border,
                background: palette.menu,
            },
        )?;
        self.conn.map_raised(outline)?;
        let outline_bar = self.conn.create_overlay(
            outline,
            Rect::new(
                -m.border_width,
                -m.border_width,
                drag.frame_rect().width,
                m.bar_height - m.border_width,
            ),
            WindowStyle {
                border_width: m.border_width,
                border: palette.border,
                background: palette.active,
            },
        )?;
        self.conn.map_raised(outline_bar)?;
        self.conn.unmap_window(frame)?;

        let mut deferred = Vec::new();
        let result = self.track_resize(id, &mut drag, constraint, (outline, outline_bar), &mut deferred);

        log_cleanup("release the pointer", self.conn.ungrab_pointer());
        let committed = self.commit_resize(id, drag.client_rect(&m), frame, window);
        for overlay in [constraint, outline_bar, outline] {
            log_cleanup("destroy a resize overlay", self.conn.destroy_window(overlay));
        }
        self.conn.requeue(deferred);
        self.trace_moved(id);
        result.and(committed)
    }

    /// Give the client the outline's geometry and show its frame again
    fn commit_resize(&mut self, id: ClientId, rect: Rect, frame: Window, window: Window) -> Result<()> {
        let bar = self.metrics.bar_height;
        if let Some(client) = self.registry.get_mut(id) {
            client.rect = rect;
        }
        self.conn
            .move_resize(frame, Rect::new(rect.x, rect.y - bar, rect.width, rect.height + bar))?;
        self.conn.resize_window(window, rect.width, rect.height)?;
        self.conn.map_window(frame)?;
        self.conn.set_input_focus(window)?;
        self.send_config(id)
    }

    fn track_resize(
        &mut self,
        id: ClientId,
        drag: &mut ResizeDrag,
        constraint: Window,
        (outline, outline_bar): (Window, Window),
        deferred: &mut Vec<Event>,
    ) -> Result<()> {
        let m = self.metrics;
        let hints = match self.registry.get(id) {
            Some(client) => client.hints,
            None => return Ok(()),
        };
        let mut left_taskbar = false;

        loop {
            match self.next_modal_event()? {
                Event::Expose(e) if e.window == outline_bar => self.draw_outline_title(id, outline_bar)?,
                Event::Expose(e) => self.redraw_exposed_frame(e.window)?,
                Event::MotionNotify(e) => {
                    let (px, py) = (e.root_x as i32, e.root_y as i32);
                    if py < m.bar_height {
                        continue;
                    }
                    // Keep the pointer off the taskbar from now on
                    if !left_taskbar {
                        left_taskbar = true;
                        self.conn.move_resize(
                            constraint,
                            Rect::new(0, m.bar_height, m.screen_width, m.screen_height - m.bar_height),
                        )?;
                    }
                    if let Some(rect) = drag.motion(px, py, &hints, &m) {
                        self.conn.move_resize(outline, rect)?;
                        self.conn
                            .resize_window(outline_bar, rect.width, m.bar_height - m.border_width)?;
                    }
                }
                Event::ButtonRelease(_) => return Ok(()),
                Event::ButtonPress(_) => {}
                other => deferred.push(other),
            }
        }
    }

    fn draw_outline_title(&self, id: ClientId, outline_bar: Window) -> Result<()> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        let Some(title) = client.title.as_deref().filter(|_| !client.is_transient()) else {
            return Ok(());
        };
        let palette = &self.settings.palette;
        let (ascent, _) = self.conn.font_extents();
        self.conn
            .draw_text(outline_bar, palette.text, palette.active, SPACE, SPACE + ascent, title)
    }

    /// Left click on a title bar.
    ///
    /// On a button, track the pointer until release and act only when it
    /// is released over the button it went down on. Anywhere else starts a
    /// move; a second click on the same title within the double-click time
    /// toggles the stacking first.
    pub(crate) fn titlebar_click(&mut self, id: ClientId, press: &ButtonPressEvent) -> Result<()> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        let (frame, width) = (client.frame, client.rect.width);
        let Some(hit) = box_clicked(width, press.event_x as i32, &self.metrics) else {
            return Ok(());
        };

        if hit == TitleBarHit::Title {
            let double = matches!(
                self.last_title_click,
                Some((last, time))
                    if last == id && press.time.wrapping_sub(time) < self.settings.double_click_ms
            );
            if double {
                self.raise_lower(id)?;
                self.last_title_click = None;
            } else {
                self.last_title_click = Some((id, press.time));
            }
            return self.move_client(id);
        }

        if !self.conn.grab_pointer(None, GrabCursor::Inherit)? {
            return Ok(());
        }
        self.conn.grab_server()?;
        let palette = self.settings.palette;
        self.draw_button(frame, width, hit, palette.depressed)?;

        let mut deferred = Vec::new();
        let result = self.track_button(id, hit, &mut deferred);

        log_cleanup("redraw the title-bar button", self.draw_button(frame, width, hit, palette.active));
        log_cleanup("ungrab the server", self.conn.ungrab_server());
        log_cleanup("release the pointer", self.conn.ungrab_pointer());
        self.conn.requeue(deferred);

        if result? {
            match hit {
                TitleBarHit::Close => self.close_client(id)?,
                TitleBarHit::ToggleDepth => self.raise_lower(id)?,
                TitleBarHit::Hide => self.hide(id)?,
                TitleBarHit::Title => {}
            }
        }
        Ok(())
    }

    /// Returns whether the button was released over `hit`
    fn track_button(&mut self, id: ClientId, hit: TitleBarHit, deferred: &mut Vec<Event>) -> Result<bool> {
        let m = self.metrics;
        let palette = self.settings.palette;
        let over_button = |wm: &Self, x: i32, y: i32| {
            let Some(client) = wm.registry.get(id) else {
                return false;
            };
            let win_y = y - client.rect.y + m.bar_height;
            (m.border_width..=m.bar_height).contains(&win_y)
                && box_clicked(client.rect.width, x - (client.rect.x + m.border_width), &m) == Some(hit)
        };

        let mut inside = true;
        loop {
            match self.next_modal_event()? {
                Event::MotionNotify(e) => {
                    inside = over_button(&*self, e.root_x as i32, e.root_y as i32);
                    let Some(client) = self.registry.get(id) else {
                        return Ok(false);
                    };
                    let background = if inside { palette.depressed } else { palette.active };
                    self.draw_button(client.frame, client.rect.width, hit, background)?;
                }
                Event::ButtonRelease(e) => {
                    return Ok(inside && over_button(&*self, e.root_x as i32, e.root_y as i32));
                }
                Event::ButtonPress(_) => {}
                other => deferred.push(other),
            }
        }
    }

    fn trace_moved(&mut self, id: ClientId) {
        let Some(client) = self.registry.get(id) else {
            return;
        };
        let r = client.rect;
        self.tracer.trace_transition(&StateTransition::ClientMoved {
            window: client.window,
            x: r.x,
            y: r.y,
            width: r.width,
            height: r.height,
        });
        log::debug!("0x{:x} now at {:?}", client.window, r);
    }
}

/// Log a failed teardown step. Callers still return the interaction's result.
fn log_cleanup(step: &str, outcome: Result<()>) {
    if let Err(e) = outcome {
        log::warn!("Failed to {} after pointer interaction: {}", step, e);
    }
}
