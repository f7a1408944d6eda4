//! The window manager context.
//!
//! `Wm` owns the connection, the client registry, the taskbar and the menu.
//! The lifecycle, dispatch, interaction and drawing code are spread over
//! `manage`, `event`, `moveresize`, `decor` and `taskbar` as further
//! `impl` blocks on this type.

use std::rc::Rc;

use anyhow::Result;
use x11rb::protocol::xproto::{ModMask, Timestamp, Window};
use x11rb::protocol::Event;

use crate::client::ClientId;
use crate::config::Settings;
use crate::geometry::{Metrics, SPACE};
use crate::menu::Menu;
use crate::registry::{ClientRegistry, Lookup};
use crate::signals;
use crate::state::{ClientState, RemoveReason};
use crate::taskbar::Taskbar;
use crate::tracing::EventTracer;
use crate::xconn::XConn;

/// The main window manager state
pub struct Wm<X: XConn> {
    pub(crate) conn: Rc<X>,
    pub(crate) settings: Settings,
    pub(crate) metrics: Metrics,
    pub(crate) registry: ClientRegistry,
    pub(crate) taskbar: Taskbar,
    pub(crate) menu: Menu,
    /// Event tracer for debugging
    pub(crate) tracer: EventTracer,
    /// Client and server time of the last click on a title, for double clicks
    pub(crate) last_title_click: Option<(ClientId, Timestamp)>,
}

impl<X: XConn> Wm<X> {
    pub fn new(conn: X, settings: Settings) -> Result<Self> {
        let conn = Rc::new(conn);
        let (screen_width, screen_height) = conn.screen_size();
        let (ascent, descent) = conn.font_extents();
        let metrics = Metrics {
            screen_width,
            screen_height,
            bar_height: settings
                .bar_height
                .unwrap_or(ascent + descent + 2 * SPACE + 2),
            border_width: settings.border_width,
        };

        let taskbar = Taskbar::create(conn.as_ref(), &settings.palette, &metrics)?;
        let menu = Menu::load(settings.menu_file.as_deref(), |text| conn.text_width(text));

        log::info!(
            "Screen {}x{}, bar height {}, border width {}",
            screen_width,
            screen_height,
            metrics.bar_height,
            metrics.border_width
        );

        Ok(Self {
            conn,
            settings,
            metrics,
            registry: ClientRegistry::new(),
            taskbar,
            menu,
            tracer: EventTracer::new(),
            last_title_click: None,
        })
    }

    /// Grab the global shortcuts on the root window, once for every
    /// combination of CapsLock and NumLock so they work in any lock state
    pub fn grab_keys(&self) -> Result<()> {
        let keys = self.settings.keys;
        for locks in lock_combinations(self.conn.numlock_mask()) {
            self.conn.grab_keys(keys.modifier | locks, &keys.keysyms())?;
        }
        Ok(())
    }

    /// Manage windows that were mapped before we started
    pub fn scan_existing_windows(&mut self) -> Result<()> {
        let windows = self.conn.top_level_windows()?;
        log::info!("Found {} existing top-level windows", windows.len());

        for window in windows {
            if window == self.taskbar.window {
                continue;
            }
            let Some(attrs) = self.conn.window_attributes(window)? else {
                continue;
            };
            if !attrs.override_redirect && attrs.viewable {
                self.create(window)?;
            }
        }
        Ok(())
    }

    /// Main event loop
    pub fn run(&mut self) -> Result<()> {
        log::info!("Entering event loop");

        loop {
            if signals::shutdown_requested() {
                break;
            }
            if signals::take_menu_reload() {
                self.reload_menu();
            }

            // None means a signal interrupted the wait; loop to check flags
            let Some(event) = self.conn.next_event()? else {
                continue;
            };

            if let Event::Error(e) = &event {
                self.handle_x_error(e.error_kind, e.bad_value, e.request_name)?;
                continue;
            }
            if let Err(e) = self.handle_event(event) {
                log::error!("Error handling event: {}", e);
            }
        }

        self.shutdown()
    }

    /// Release every client back to the root and hand the display back.
    pub fn shutdown(&mut self) -> Result<()> {
        log::info!("Shutting down, releasing {} clients", self.registry.len());

        // Bottom to top, so the remapped windows keep their stacking
        for window in self.conn.top_level_windows()? {
            if let Some(id) = self.registry.find(window, Lookup::Frame) {
                self.remove(id, RemoveReason::Shutdown)?;
            }
        }
        for id in self.registry.ids().to_vec() {
            self.remove(id, RemoveReason::Shutdown)?;
        }

        self.conn.destroy_window(self.taskbar.window)?;
        self.conn.install_default_colormap()?;
        self.conn.focus_pointer_root()?;
        self.conn.flush()?;
        log::info!("Exiting window manager");
        Ok(())
    }

    pub(crate) fn reload_menu(&mut self) {
        let conn = Rc::clone(&self.conn);
        self.menu = Menu::load(self.settings.menu_file.as_deref(), |text| conn.text_width(text));
    }

    /// Log every client, invariant violations and recent trace entries.
    /// Only does anything with debug logging enabled.
    pub(crate) fn dump_state(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        log::debug!(
            "{} clients, focused {:?}, topmost {:?}, fullscreen {:?}",
            self.registry.len(),
            self.window_of(self.registry.focused()),
            self.window_of(self.registry.topmost()),
            self.window_of(self.registry.fullscreen()),
        );
        for (id, client) in self.registry.iter() {
            log::debug!(
                "  0x{:x} frame 0x{:x} {:?} {:?} ignore_unmap={} focus_order={} '{}'",
                client.window,
                client.frame,
                client.rect,
                self.registry.state_of(id).unwrap_or(ClientState::Normal),
                client.ignore_unmap.pending(),
                client.focus_order,
                client.display_title()
            );
        }
        for violation in self.registry.validate() {
            log::warn!("Invariant violated: {}", violation);
        }
        for entry in self.tracer.get_last(20) {
            if let Ok(json) = serde_json::to_string(&entry) {
                log::debug!("  {}", json);
            }
        }
    }

    pub(crate) fn window_of(&self, id: Option<ClientId>) -> Option<Window> {
        id.and_then(|id| self.registry.get(id)).map(|c| c.window)
    }
}

fn lock_combinations(numlock: u16) -> Vec<u16> {
    let caps = u16::from(ModMask::LOCK);
    let mut masks = vec![0, caps, numlock, numlock | caps];
    masks.sort_unstable();
    masks.dedup();
    masks
}
