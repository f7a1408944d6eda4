//! The window manager's view of the X server.
//!
//! Everything the manager does to the server goes through [`XConn`]. The
//! production implementation, [`X11Conn`], wraps an x11rb
//! `RustConnection`; tests drive the same manager code through a
//! recording fake.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::os::unix::io::AsRawFd;

use anyhow::{Context, Result};
use x11rb::connection::{Connection, RequestConnection as _};
use x11rb::cursor::Handle as CursorHandle;
use x11rb::protocol::shape::{self, ConnectionExt as _, SK, SO};
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;
use x11rb::resource_manager;
use x11rb::rust_connection::RustConnection;

use crate::atoms::Atoms;
use crate::types::{Rect, SizeHints, WindowAttributes, WmState};
use crate::window_query;

/// The PointerRoot focus target
const POINTER_ROOT: Window = 1;

const NUM_LOCK_KEYSYM: u32 = 0xff7f;

/// Pointer shape to show for the duration of a grab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabCursor {
    /// Keep whatever cursor the pointer currently shows
    Inherit,
    Resize,
}

/// Which shape of the frame a shape operation affects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Bounding,
    Clip,
}

/// Border and background of a manager-created window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStyle {
    pub border_width: i32,
    pub border: u32,
    pub background: u32,
}

/// Operations the window manager performs against the X server.
///
/// Requests that only queue work return `Result<()>`; protocol errors they
/// cause arrive later as [`Event::Error`] unless error suppression is on.
pub trait XConn {
    fn root(&self) -> Window;
    fn screen_size(&self) -> (i32, i32);
    /// Ascent and descent of the configured font
    fn font_extents(&self) -> (i32, i32);
    fn atoms(&self) -> &Atoms;

    /// Wait for the next event. Returns `Ok(None)` when a signal
    /// interrupted the wait.
    fn next_event(&self) -> Result<Option<Event>>;
    /// Push events back so the next calls to `next_event` return them first,
    /// in order.
    fn requeue(&self, events: Vec<Event>);
    fn flush(&self) -> Result<()>;

    fn grab_server(&self) -> Result<()>;
    fn ungrab_server(&self) -> Result<()>;
    /// Start discarding protocol errors. Nests.
    fn suppress_errors(&self);
    /// Undo one `suppress_errors`. The outermost call syncs with the
    /// server and drops every error produced while suppressed.
    fn restore_errors(&self) -> Result<()>;

    fn query_pointer(&self) -> Result<(i32, i32)>;
    /// `None` when the window no longer exists
    fn window_attributes(&self, window: Window) -> Result<Option<WindowAttributes>>;
    /// Children of the root, bottom to top
    fn top_level_windows(&self) -> Result<Vec<Window>>;
    fn transient_for(&self, window: Window) -> Option<Window>;
    fn fetch_name(&self, window: Window) -> Option<String>;
    fn size_hints(&self, window: Window) -> SizeHints;
    fn initial_state(&self, window: Window) -> Option<WmState>;
    fn supports_delete(&self, window: Window) -> bool;
    fn keycode_to_keysym(&self, keycode: Keycode) -> Option<u32>;

    fn set_wm_state(&self, window: Window, state: WmState) -> Result<()>;
    fn send_delete(&self, window: Window) -> Result<()>;
    fn kill_client(&self, window: Window) -> Result<()>;
    fn send_configure_notify(&self, window: Window, rect: Rect) -> Result<()>;

    /// Create a decoration frame: override-redirect, selecting child,
    /// button, exposure and enter events.
    fn create_frame(&self, rect: Rect, style: WindowStyle) -> Result<Window>;
    /// Create an unmapped input-only window, used to confine the pointer
    fn create_input_window(&self, rect: Rect) -> Result<Window>;
    /// Create an override-redirect window that only draws
    fn create_overlay(&self, parent: Window, rect: Rect, style: WindowStyle) -> Result<Window>;
    fn destroy_window(&self, window: Window) -> Result<()>;

    fn map_window(&self, window: Window) -> Result<()>;
    fn map_raised(&self, window: Window) -> Result<()>;
    fn unmap_window(&self, window: Window) -> Result<()>;
    fn raise_window(&self, window: Window) -> Result<()>;
    fn lower_window(&self, window: Window) -> Result<()>;
    fn move_window(&self, window: Window, x: i32, y: i32) -> Result<()>;
    fn resize_window(&self, window: Window, width: i32, height: i32) -> Result<()>;
    fn move_resize(&self, window: Window, rect: Rect) -> Result<()>;
    fn configure_window(&self, window: Window, aux: &ConfigureWindowAux) -> Result<()>;
    fn reparent(&self, window: Window, parent: Window, x: i32, y: i32) -> Result<()>;
    fn set_border_width(&self, window: Window, width: i32) -> Result<()>;
    fn add_to_save_set(&self, window: Window) -> Result<()>;
    fn remove_from_save_set(&self, window: Window) -> Result<()>;
    /// Select colormap, property and shape notifications on a client
    fn select_client_input(&self, window: Window) -> Result<()>;

    fn set_input_focus(&self, window: Window) -> Result<()>;
    fn focus_pointer_root(&self) -> Result<()>;
    fn install_colormap(&self, colormap: Colormap) -> Result<()>;
    fn install_default_colormap(&self) -> Result<()>;

    /// Synchronously grab every button on a frame, so clicks reach the
    /// manager before the client
    fn grab_buttons(&self, frame: Window) -> Result<()>;
    /// Release a synchronously grabbed click to the client
    fn replay_pointer(&self) -> Result<()>;
    /// Actively grab the pointer on the root. Returns false when the grab
    /// was refused.
    fn grab_pointer(&self, confine_to: Option<Window>, cursor: GrabCursor) -> Result<bool>;
    fn ungrab_pointer(&self) -> Result<()>;
    /// Modifier mask NumLock is bound to, or 0 if it is not bound
    fn numlock_mask(&self) -> u16;
    /// Grab each keysym on the root under exactly `modifiers`
    fn grab_keys(&self, modifiers: u16, keysyms: &[u32]) -> Result<()>;

    /// Number of rectangles in the window's bounding shape, 0 without the
    /// shape extension
    fn bounding_shape_rects(&self, window: Window) -> Result<usize>;
    /// Set the frame's bounding shape to the window's, offset by `y`
    fn shape_from_window(&self, frame: Window, window: Window, y: i32) -> Result<()>;
    fn shape_union(&self, frame: Window, kind: ShapeKind, offset: (i32, i32), rect: Rect) -> Result<()>;
    fn shape_reset(&self, frame: Window, rect: Rect) -> Result<()>;

    fn clear_window(&self, window: Window) -> Result<()>;
    fn fill_rect(&self, window: Window, color: u32, rect: Rect) -> Result<()>;
    fn draw_rect(&self, window: Window, color: u32, rect: Rect) -> Result<()>;
    fn draw_line(&self, window: Window, color: u32, from: (i32, i32), to: (i32, i32)) -> Result<()>;
    /// Draw text with its baseline at `y`, over a `background` box
    fn draw_text(&self, window: Window, fg: u32, background: u32, x: i32, y: i32, text: &str) -> Result<()>;
    fn text_width(&self, text: &str) -> i32;
}

/// Keysyms indexed by keycode, as returned by GetKeyboardMapping
struct KeyboardMap {
    min_keycode: Keycode,
    keysyms_per_keycode: usize,
    keysyms: Vec<u32>,
}

impl KeyboardMap {
    fn keysym(&self, keycode: Keycode) -> Option<u32> {
        let index = keycode.checked_sub(self.min_keycode)? as usize * self.keysyms_per_keycode;
        self.keysyms.get(index).copied().filter(|&sym| sym != 0)
    }

    fn keycodes(&self) -> HashMap<u32, Keycode> {
        let mut keysym_to_keycode = HashMap::new();
        for (i, chunk) in self.keysyms.chunks(self.keysyms_per_keycode.max(1)).enumerate() {
            for keysym in chunk {
                if *keysym != 0 {
                    keysym_to_keycode
                        .entry(*keysym)
                        .or_insert(self.min_keycode + i as u8);
                }
            }
        }
        keysym_to_keycode
    }

    /// Mask of the modifier whose row in a GetModifierMapping table holds
    /// the NumLock key. The table has eight rows of `per_modifier` keycodes.
    fn numlock_mask(&self, modifier_keycodes: &[Keycode], per_modifier: usize) -> u16 {
        let Some(&numlock) = self.keycodes().get(&NUM_LOCK_KEYSYM) else {
            return 0;
        };
        modifier_keycodes
            .chunks(per_modifier.max(1))
            .take(8)
            .position(|row| row.contains(&numlock))
            .map_or(0, |row| 1 << row)
    }
}

/// [`XConn`] over a live x11rb connection
pub struct X11Conn {
    conn: RustConnection,
    screen_num: usize,
    root: Window,
    atoms: Atoms,
    gc: Gcontext,
    font: Font,
    font_ascent: i32,
    font_descent: i32,
    resize_cursor: Cursor,
    has_shape: bool,
    keymap: KeyboardMap,
    numlock_mask: u16,
    /// Events read ahead of their consumer
    pending: RefCell<VecDeque<Event>>,
    suppress_depth: Cell<u32>,
    /// Sequence number of the marker request sent when suppression began
    suppress_from: Cell<Option<u16>>,
}

impl X11Conn {
    /// Connect to `display` (or `$DISPLAY`) and load `font_name`, falling
    /// back to the server's "fixed" font.
    pub fn connect(display: Option<&str>, font_name: &str) -> Result<Self> {
        let (conn, screen_num) =
            RustConnection::connect(display).context("Failed to connect to X11 server")?;

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;

        log::info!(
            "Connected to X11, screen {}, root window 0x{:x}, {}x{}",
            screen_num,
            root,
            screen.width_in_pixels,
            screen.height_in_pixels
        );

        let atoms = Atoms::new(&conn)?;

        let font = conn.generate_id()?;
        if let Err(e) = conn.open_font(font, font_name.as_bytes())?.check() {
            log::warn!("Font '{}' not found ({}), using 'fixed'", font_name, e);
            conn.open_font(font, b"fixed")?
                .check()
                .context("Failed to open the 'fixed' font")?;
        }
        let info = conn.query_font(font)?.reply()?;

        let gc = conn.generate_id()?;
        conn.create_gc(
            gc,
            root,
            &CreateGCAux::new()
                .foreground(screen.black_pixel)
                .background(screen.white_pixel)
                .font(font),
        )?;

        let database = resource_manager::new_from_default(&conn)?;
        let cursors = CursorHandle::new(&conn, screen_num, &database)?.reply()?;
        let resize_cursor = cursors.load_cursor(&conn, "fleur")?;

        let has_shape = conn
            .extension_information(shape::X11_EXTENSION_NAME)?
            .is_some();
        if !has_shape {
            log::warn!("Shape extension not available");
        }

        let setup = conn.setup();
        let min_keycode = setup.min_keycode;
        let mapping = conn
            .get_keyboard_mapping(min_keycode, setup.max_keycode - min_keycode + 1)?
            .reply()?;
        let keymap = KeyboardMap {
            min_keycode,
            keysyms_per_keycode: mapping.keysyms_per_keycode as usize,
            keysyms: mapping.keysyms,
        };
        let modifiers = conn.get_modifier_mapping()?.reply()?;
        let numlock_mask =
            keymap.numlock_mask(&modifiers.keycodes, modifiers.keycodes_per_modifier() as usize);
        log::debug!("NumLock modifier mask 0x{:x}", numlock_mask);

        Ok(Self {
            conn,
            screen_num,
            root,
            atoms,
            gc,
            font,
            font_ascent: info.font_ascent as i32,
            font_descent: info.font_descent as i32,
            resize_cursor,
            has_shape,
            keymap,
            numlock_mask,
            pending: RefCell::new(VecDeque::new()),
            suppress_depth: Cell::new(0),
            suppress_from: Cell::new(None),
        })
    }

    fn screen(&self) -> &Screen {
        &self.conn.setup().roots[self.screen_num]
    }

    /// Become the window manager by requesting SubstructureRedirect on root
    pub fn become_wm(&self) -> Result<()> {
        let event_mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::BUTTON_PRESS
            | EventMask::ENTER_WINDOW
            | EventMask::COLOR_MAP_CHANGE
            | EventMask::PROPERTY_CHANGE;

        let result = self.conn.change_window_attributes(
            self.root,
            &ChangeWindowAttributesAux::new().event_mask(event_mask),
        );

        self.conn.flush()?;

        if let Err(e) = result?.check() {
            anyhow::bail!("Another window manager is already running! Error: {}", e);
        }

        log::info!("Successfully became the window manager");
        Ok(())
    }

    /// Block until the connection is readable or a signal arrives.
    fn wait_readable(&self) -> Result<bool> {
        let mut fds = [libc::pollfd {
            fd: self.conn.stream().as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        }];
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), 1, -1) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err.into());
        }
        Ok(true)
    }

    fn set_color(&self, color: u32, background: Option<u32>) -> Result<()> {
        let mut aux = ChangeGCAux::new().foreground(color);
        if let Some(bg) = background {
            aux = aux.background(bg);
        }
        self.conn.change_gc(self.gc, &aux)?;
        Ok(())
    }
}

/// Whether the request numbered `sequence` was sent after the one
/// numbered `marker`, allowing for 16-bit wraparound.
fn issued_since(sequence: u16, marker: u16) -> bool {
    (sequence.wrapping_sub(marker) as i16) > 0
}

fn to_rectangle(rect: Rect) -> Rectangle {
    Rectangle {
        x: rect.x as i16,
        y: rect.y as i16,
        width: rect.width.max(0) as u16,
        height: rect.height.max(0) as u16,
    }
}

impl XConn for X11Conn {
    fn root(&self) -> Window {
        self.root
    }

    fn screen_size(&self) -> (i32, i32) {
        let screen = self.screen();
        (
            screen.width_in_pixels as i32,
            screen.height_in_pixels as i32,
        )
    }

    fn font_extents(&self) -> (i32, i32) {
        (self.font_ascent, self.font_descent)
    }

    fn atoms(&self) -> &Atoms {
        &self.atoms
    }

    fn next_event(&self) -> Result<Option<Event>> {
        loop {
            if let Some(event) = self.pending.borrow_mut().pop_front() {
                return Ok(Some(event));
            }
            if let Some(event) = self.conn.poll_for_event()? {
                return Ok(Some(event));
            }
            self.conn.flush()?;
            if !self.wait_readable()? {
                return Ok(None);
            }
        }
    }

    fn requeue(&self, events: Vec<Event>) {
        let mut pending = self.pending.borrow_mut();
        for event in events.into_iter().rev() {
            pending.push_front(event);
        }
    }

    fn flush(&self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }

    fn grab_server(&self) -> Result<()> {
        self.conn.grab_server()?;
        Ok(())
    }

    fn ungrab_server(&self) -> Result<()> {
        self.conn.ungrab_server()?;
        self.conn.flush()?;
        Ok(())
    }

    fn suppress_errors(&self) {
        let depth = self.suppress_depth.get();
        self.suppress_depth.set(depth + 1);
        if depth > 0 {
            return;
        }
        // Errors are tagged with the low 16 bits of the request sequence
        let marker = match self.conn.no_operation() {
            Ok(cookie) => Some(cookie.sequence_number() as u16),
            Err(e) => {
                log::warn!("Could not mark the start of error suppression: {}", e);
                None
            }
        };
        self.suppress_from.set(marker);
    }

    fn restore_errors(&self) -> Result<()> {
        let depth = self.suppress_depth.get().saturating_sub(1);
        self.suppress_depth.set(depth);
        if depth > 0 {
            return Ok(());
        }

        // Every error caused before this round trip is queued once it returns
        let from = self.suppress_from.take();
        self.conn.get_input_focus()?.reply()?;
        let mut pending = self.pending.borrow_mut();
        while let Some(event) = self.conn.poll_for_event()? {
            match event {
                Event::Error(e) if from.map_or(true, |from| issued_since(e.sequence, from)) => {
                    log::debug!("Suppressed X error: {:?}", e)
                }
                other => pending.push_back(other),
            }
        }
        Ok(())
    }

    fn query_pointer(&self) -> Result<(i32, i32)> {
        let reply = self.conn.query_pointer(self.root)?.reply()?;
        Ok((reply.root_x as i32, reply.root_y as i32))
    }

    fn window_attributes(&self, window: Window) -> Result<Option<WindowAttributes>> {
        let attrs = match self.conn.get_window_attributes(window)?.reply() {
            Ok(attrs) => attrs,
            Err(_) => return Ok(None),
        };
        let geometry = match self.conn.get_geometry(window)?.reply() {
            Ok(geometry) => geometry,
            Err(_) => return Ok(None),
        };
        Ok(Some(WindowAttributes {
            rect: Rect::new(
                geometry.x as i32,
                geometry.y as i32,
                geometry.width as i32,
                geometry.height as i32,
            ),
            viewable: attrs.map_state == MapState::VIEWABLE,
            override_redirect: attrs.override_redirect,
            colormap: attrs.colormap,
        }))
    }

    fn top_level_windows(&self) -> Result<Vec<Window>> {
        Ok(self.conn.query_tree(self.root)?.reply()?.children)
    }

    fn transient_for(&self, window: Window) -> Option<Window> {
        window_query::get_transient_for(&self.conn, window)
    }

    fn fetch_name(&self, window: Window) -> Option<String> {
        window_query::get_window_title(&self.conn, window)
    }

    fn size_hints(&self, window: Window) -> SizeHints {
        window_query::get_size_hints(&self.conn, window)
    }

    fn initial_state(&self, window: Window) -> Option<WmState> {
        window_query::get_initial_state(&self.conn, window)
    }

    fn supports_delete(&self, window: Window) -> bool {
        window_query::supports_delete_protocol(&self.conn, &self.atoms, window)
    }

    fn keycode_to_keysym(&self, keycode: Keycode) -> Option<u32> {
        self.keymap.keysym(keycode)
    }

    fn set_wm_state(&self, window: Window, state: WmState) -> Result<()> {
        window_query::set_wm_state(&self.conn, &self.atoms, window, state)
    }

    fn send_delete(&self, window: Window) -> Result<()> {
        window_query::send_delete_window(&self.conn, &self.atoms, window)
    }

    fn kill_client(&self, window: Window) -> Result<()> {
        self.conn.kill_client(window)?;
        Ok(())
    }

    fn send_configure_notify(&self, window: Window, rect: Rect) -> Result<()> {
        window_query::send_configure_notify(&self.conn, window, rect)
    }

    fn create_frame(&self, rect: Rect, style: WindowStyle) -> Result<Window> {
        let mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::BUTTON_PRESS
            | EventMask::EXPOSURE
            | EventMask::ENTER_WINDOW;
        self.create_overlay_with_mask(self.root, rect, style, mask)
    }

    fn create_input_window(&self, rect: Rect) -> Result<Window> {
        let window = self.conn.generate_id()?;
        self.conn.create_window(
            0,
            window,
            self.root,
            rect.x as i16,
            rect.y as i16,
            rect.width.max(1) as u16,
            rect.height.max(1) as u16,
            0,
            WindowClass::INPUT_ONLY,
            0,
            &CreateWindowAux::new(),
        )?;
        Ok(window)
    }

    fn create_overlay(&self, parent: Window, rect: Rect, style: WindowStyle) -> Result<Window> {
        let mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::BUTTON_PRESS
            | EventMask::EXPOSURE
            | EventMask::ENTER_WINDOW;
        self.create_overlay_with_mask(parent, rect, style, mask)
    }

    fn destroy_window(&self, window: Window) -> Result<()> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn map_window(&self, window: Window) -> Result<()> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn map_raised(&self, window: Window) -> Result<()> {
        self.raise_window(window)?;
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap_window(&self, window: Window) -> Result<()> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn raise_window(&self, window: Window) -> Result<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        )?;
        Ok(())
    }

    fn lower_window(&self, window: Window) -> Result<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new().stack_mode(StackMode::BELOW),
        )?;
        Ok(())
    }

    fn move_window(&self, window: Window, x: i32, y: i32) -> Result<()> {
        self.conn
            .configure_window(window, &ConfigureWindowAux::new().x(x).y(y))?;
        Ok(())
    }

    fn resize_window(&self, window: Window, width: i32, height: i32) -> Result<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new()
                .width(width.max(1) as u32)
                .height(height.max(1) as u32),
        )?;
        Ok(())
    }

    fn move_resize(&self, window: Window, rect: Rect) -> Result<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new()
                .x(rect.x)
                .y(rect.y)
                .width(rect.width.max(1) as u32)
                .height(rect.height.max(1) as u32),
        )?;
        Ok(())
    }

    fn configure_window(&self, window: Window, aux: &ConfigureWindowAux) -> Result<()> {
        self.conn.configure_window(window, aux)?;
        Ok(())
    }

    fn reparent(&self, window: Window, parent: Window, x: i32, y: i32) -> Result<()> {
        self.conn.reparent_window(window, parent, x as i16, y as i16)?;
        Ok(())
    }

    fn set_border_width(&self, window: Window, width: i32) -> Result<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new().border_width(width.max(0) as u32),
        )?;
        Ok(())
    }

    fn add_to_save_set(&self, window: Window) -> Result<()> {
        self.conn.change_save_set(SetMode::INSERT, window)?;
        Ok(())
    }

    fn remove_from_save_set(&self, window: Window) -> Result<()> {
        self.conn.change_save_set(SetMode::DELETE, window)?;
        Ok(())
    }

    fn select_client_input(&self, window: Window) -> Result<()> {
        self.conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new()
                .event_mask(EventMask::COLOR_MAP_CHANGE | EventMask::PROPERTY_CHANGE),
        )?;
        if self.has_shape {
            self.conn.shape_select_input(window, true)?;
        }
        Ok(())
    }

    fn set_input_focus(&self, window: Window) -> Result<()> {
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, window, x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn focus_pointer_root(&self) -> Result<()> {
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, POINTER_ROOT, x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn install_colormap(&self, colormap: Colormap) -> Result<()> {
        if colormap != x11rb::NONE {
            self.conn.install_colormap(colormap)?;
        }
        Ok(())
    }

    fn install_default_colormap(&self) -> Result<()> {
        self.conn.install_colormap(self.screen().default_colormap)?;
        Ok(())
    }

    fn grab_buttons(&self, frame: Window) -> Result<()> {
        let mask = EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE;
        self.conn.grab_button(
            false,
            frame,
            mask,
            GrabMode::SYNC,
            GrabMode::SYNC,
            x11rb::NONE,
            x11rb::NONE,
            ButtonIndex::ANY,
            ModMask::ANY,
        )?;
        Ok(())
    }

    fn replay_pointer(&self) -> Result<()> {
        self.conn
            .allow_events(Allow::REPLAY_POINTER, x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn grab_pointer(&self, confine_to: Option<Window>, cursor: GrabCursor) -> Result<bool> {
        let mask = EventMask::BUTTON_PRESS
            | EventMask::BUTTON_RELEASE
            | EventMask::POINTER_MOTION;
        let cursor = match cursor {
            GrabCursor::Inherit => x11rb::NONE,
            GrabCursor::Resize => self.resize_cursor,
        };
        let reply = self
            .conn
            .grab_pointer(
                false,
                self.root,
                mask,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                confine_to.unwrap_or(x11rb::NONE),
                cursor,
                x11rb::CURRENT_TIME,
            )?
            .reply()?;
        Ok(reply.status == GrabStatus::SUCCESS)
    }

    fn ungrab_pointer(&self) -> Result<()> {
        self.conn.ungrab_pointer(x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn numlock_mask(&self) -> u16 {
        self.numlock_mask
    }

    fn grab_keys(&self, modifiers: u16, keysyms: &[u32]) -> Result<()> {
        let keysym_to_keycode = self.keymap.keycodes();
        let modifiers = ModMask::from(modifiers);

        for &keysym in keysyms {
            let Some(&keycode) = keysym_to_keycode.get(&keysym) else {
                log::warn!("Could not find keycode for keysym 0x{:x}", keysym);
                continue;
            };
            self.conn.grab_key(
                false,
                self.root,
                modifiers,
                keycode,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            )?;
            log::debug!(
                "Grabbed keysym 0x{:x} (keycode {}) with modifiers 0x{:x}",
                keysym,
                keycode,
                u16::from(modifiers)
            );
        }

        self.conn.flush()?;
        Ok(())
    }

    fn bounding_shape_rects(&self, window: Window) -> Result<usize> {
        if !self.has_shape {
            return Ok(0);
        }
        match self.conn.shape_get_rectangles(window, SK::BOUNDING)?.reply() {
            Ok(reply) => Ok(reply.rectangles.len()),
            Err(_) => Ok(0),
        }
    }

    fn shape_from_window(&self, frame: Window, window: Window, y: i32) -> Result<()> {
        if self.has_shape {
            self.conn.shape_combine(
                SO::SET,
                SK::BOUNDING,
                SK::BOUNDING,
                frame,
                0,
                y as i16,
                window,
            )?;
        }
        Ok(())
    }

    fn shape_union(&self, frame: Window, kind: ShapeKind, offset: (i32, i32), rect: Rect) -> Result<()> {
        if self.has_shape {
            let kind = match kind {
                ShapeKind::Bounding => SK::BOUNDING,
                ShapeKind::Clip => SK::CLIP,
            };
            self.conn.shape_rectangles(
                SO::UNION,
                kind,
                ClipOrdering::YX_BANDED,
                frame,
                offset.0 as i16,
                offset.1 as i16,
                &[to_rectangle(rect)],
            )?;
        }
        Ok(())
    }

    fn shape_reset(&self, frame: Window, rect: Rect) -> Result<()> {
        if self.has_shape {
            self.conn.shape_rectangles(
                SO::SET,
                SK::BOUNDING,
                ClipOrdering::YX_BANDED,
                frame,
                0,
                0,
                &[to_rectangle(rect)],
            )?;
        }
        Ok(())
    }

    fn clear_window(&self, window: Window) -> Result<()> {
        self.conn.clear_area(false, window, 0, 0, 0, 0)?;
        Ok(())
    }

    fn fill_rect(&self, window: Window, color: u32, rect: Rect) -> Result<()> {
        self.set_color(color, None)?;
        self.conn
            .poly_fill_rectangle(window, self.gc, &[to_rectangle(rect)])?;
        Ok(())
    }

    fn draw_rect(&self, window: Window, color: u32, rect: Rect) -> Result<()> {
        self.set_color(color, None)?;
        self.conn
            .poly_rectangle(window, self.gc, &[to_rectangle(rect)])?;
        Ok(())
    }

    fn draw_line(&self, window: Window, color: u32, from: (i32, i32), to: (i32, i32)) -> Result<()> {
        self.set_color(color, None)?;
        self.conn.poly_line(
            CoordMode::ORIGIN,
            window,
            self.gc,
            &[
                Point { x: from.0 as i16, y: from.1 as i16 },
                Point { x: to.0 as i16, y: to.1 as i16 },
            ],
        )?;
        Ok(())
    }

    fn draw_text(&self, window: Window, fg: u32, background: u32, x: i32, y: i32, text: &str) -> Result<()> {
        self.set_color(fg, Some(background))?;
        let bytes = text.as_bytes();
        let bytes = &bytes[..bytes.len().min(255)];
        self.conn
            .image_text8(window, self.gc, x as i16, y as i16, bytes)?;
        Ok(())
    }

    fn text_width(&self, text: &str) -> i32 {
        let chars: Vec<Char2b> = text
            .bytes()
            .map(|byte| Char2b { byte1: 0, byte2: byte })
            .collect();
        self.conn
            .query_text_extents(self.font, &chars)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .map(|reply| reply.overall_width)
            .unwrap_or(0)
    }
}

impl X11Conn {
    fn create_overlay_with_mask(
        &self,
        parent: Window,
        rect: Rect,
        style: WindowStyle,
        mask: EventMask,
    ) -> Result<Window> {
        let window = self.conn.generate_id()?;
        self.conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            parent,
            rect.x as i16,
            rect.y as i16,
            rect.width.max(1) as u16,
            rect.height.max(1) as u16,
            style.border_width.max(0) as u16,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new()
                .override_redirect(1)
                .background_pixel(style.background)
                .border_pixel(style.border)
                .event_mask(mask),
        )?;
        Ok(window)
    }
}
