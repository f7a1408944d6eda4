//! Recording stand-in for the X server, used by unit tests.
//!
//! `FakeConn` keeps a small model of the windows it was told about and
//! logs every request as a short string, so tests can assert both on the
//! resulting state and on the exact request sequence.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use anyhow::Result;
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;

use crate::atoms::Atoms;
use crate::config::Settings;
use crate::menu::Menu;
use crate::types::{Rect, SizeHints, WindowAttributes, WmState};
use crate::wm::Wm;
use crate::xconn::{GrabCursor, ShapeKind, WindowStyle, XConn};

pub const ROOT: Window = 0x100;

/// Everything the fake knows about one window
#[derive(Debug, Clone, Default)]
pub struct FakeWindow {
    pub rect: Rect,
    pub mapped: bool,
    pub override_redirect: bool,
    pub colormap: Colormap,
    pub parent: Window,
    pub title: Option<String>,
    pub transient_for: Option<Window>,
    pub hints: SizeHints,
    pub initial_state: Option<WmState>,
    pub wm_state: Option<WmState>,
    pub supports_delete: bool,
    pub shape_rects: usize,
    pub border_width: i32,
}

pub struct FakeConn {
    atoms: Atoms,
    screen: (i32, i32),
    next_id: Cell<Window>,
    windows: RefCell<HashMap<Window, FakeWindow>>,
    /// Children of the root, bottom to top
    stacking: RefCell<Vec<Window>>,
    calls: RefCell<Vec<String>>,
    draws: RefCell<Vec<String>>,
    /// Scripted events; `None` stands for a wait interrupted by a signal
    events: RefCell<VecDeque<Option<Event>>>,
    pointer: Cell<(i32, i32)>,
    refuse_grabs: Cell<bool>,
    fail_ungrabs: Cell<bool>,
    numlock_mask: Cell<u16>,
    keymap: HashMap<Keycode, u32>,
}

impl FakeConn {
    pub fn new() -> Self {
        Self {
            atoms: Atoms {
                wm_state: 301,
                wm_change_state: 302,
                wm_protocols: 303,
                wm_delete_window: 304,
            },
            screen: (1920, 1080),
            next_id: Cell::new(0x1000),
            windows: RefCell::new(HashMap::new()),
            stacking: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            draws: RefCell::new(Vec::new()),
            events: RefCell::new(VecDeque::new()),
            pointer: Cell::new((0, 0)),
            refuse_grabs: Cell::new(false),
            fail_ungrabs: Cell::new(false),
            numlock_mask: Cell::new(0x10),
            keymap: HashMap::from([(23, 0xff09), (24, 0x71), (95, 0xffc8), (96, 0xffc9)]),
        }
    }

    /// Register a client-owned top-level window
    pub fn add_window(&self, window: Window, rect: Rect, mapped: bool) {
        self.windows.borrow_mut().insert(
            window,
            FakeWindow {
                rect,
                mapped,
                parent: ROOT,
                ..Default::default()
            },
        );
        self.stacking.borrow_mut().push(window);
    }

    pub fn with_window<R>(&self, window: Window, f: impl FnOnce(&mut FakeWindow) -> R) -> R {
        let mut windows = self.windows.borrow_mut();
        let entry = windows
            .get_mut(&window)
            .unwrap_or_else(|| panic!("unknown window 0x{:x}", window));
        f(entry)
    }

    /// Forget a window, as if its client had destroyed it
    pub fn vanish(&self, window: Window) {
        self.windows.borrow_mut().remove(&window);
        self.stacking.borrow_mut().retain(|&w| w != window);
    }

    pub fn window(&self, window: Window) -> Option<FakeWindow> {
        self.windows.borrow().get(&window).cloned()
    }

    pub fn wm_state(&self, window: Window) -> Option<WmState> {
        self.window(window).and_then(|w| w.wm_state)
    }

    pub fn is_mapped(&self, window: Window) -> bool {
        self.window(window).map(|w| w.mapped).unwrap_or(false)
    }

    pub fn rect_of(&self, window: Window) -> Option<Rect> {
        self.window(window).map(|w| w.rect)
    }

    pub fn set_pointer(&self, x: i32, y: i32) {
        self.pointer.set((x, y));
    }

    pub fn refuse_grabs(&self) {
        self.refuse_grabs.set(true);
    }

    /// Make every pointer ungrab fail, as on a dead connection
    pub fn fail_ungrabs(&self) {
        self.fail_ungrabs.set(true);
    }

    pub fn set_numlock_mask(&self, mask: u16) {
        self.numlock_mask.set(mask);
    }

    pub fn push_event(&self, event: Event) {
        self.events.borrow_mut().push_back(Some(event));
    }

    pub fn push_interrupt(&self) {
        self.events.borrow_mut().push_back(None);
    }

    pub fn pending_events(&self) -> usize {
        self.events.borrow().len()
    }

    /// Drain the request log
    pub fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    /// Drain the drawing log
    pub fn take_draws(&self) -> Vec<String> {
        std::mem::take(&mut *self.draws.borrow_mut())
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn draw(&self, call: String) {
        self.draws.borrow_mut().push(call);
    }

    fn update(&self, window: Window, f: impl FnOnce(&mut FakeWindow)) {
        if let Some(entry) = self.windows.borrow_mut().get_mut(&window) {
            f(entry);
        }
    }

    fn allocate(&self, rect: Rect, parent: Window, border_width: i32) -> Window {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.windows.borrow_mut().insert(
            id,
            FakeWindow {
                rect,
                parent,
                override_redirect: true,
                border_width,
                ..Default::default()
            },
        );
        if parent == ROOT {
            self.stacking.borrow_mut().push(id);
        }
        id
    }

    fn restack(&self, window: Window, top: bool) {
        let mut stacking = self.stacking.borrow_mut();
        if let Some(pos) = stacking.iter().position(|&w| w == window) {
            stacking.remove(pos);
            if top {
                stacking.push(window);
            } else {
                stacking.insert(0, window);
            }
        }
    }
}

/// A window manager over a fresh fake with default settings and a
/// one-item menu, with the setup requests already drained.
pub fn test_wm() -> Wm<FakeConn> {
    let mut wm = Wm::new(FakeConn::new(), Settings::default()).unwrap();
    wm.menu = Menu::from_entries(
        vec![("Term".to_string(), "xterm".to_string())],
        |text| wm.conn.text_width(text),
    );
    wm.conn.take_calls();
    wm.conn.take_draws();
    wm
}

// Test helpers for building events

pub fn map_request(window: Window) -> Event {
    Event::MapRequest(MapRequestEvent {
        parent: ROOT,
        window,
        ..Default::default()
    })
}

pub fn unmap_notify(window: Window) -> Event {
    Event::UnmapNotify(UnmapNotifyEvent {
        event: window,
        window,
        ..Default::default()
    })
}

pub fn destroy_notify(window: Window) -> Event {
    Event::DestroyNotify(DestroyNotifyEvent {
        event: window,
        window,
        ..Default::default()
    })
}

pub fn button_press(event: Window, button: u8, root: (i32, i32), local: (i32, i32), state: u16) -> Event {
    Event::ButtonPress(ButtonPressEvent {
        detail: button,
        root: ROOT,
        event,
        root_x: root.0 as i16,
        root_y: root.1 as i16,
        event_x: local.0 as i16,
        event_y: local.1 as i16,
        state: KeyButMask::from(state),
        same_screen: true,
        ..Default::default()
    })
}

pub fn button_release(root: (i32, i32)) -> Event {
    Event::ButtonRelease(ButtonReleaseEvent {
        detail: 1,
        root: ROOT,
        event: ROOT,
        root_x: root.0 as i16,
        root_y: root.1 as i16,
        event_x: root.0 as i16,
        event_y: root.1 as i16,
        same_screen: true,
        ..Default::default()
    })
}

/// Pointer motion reported against the root, as during an active grab
pub fn motion(x: i32, y: i32) -> Event {
    Event::MotionNotify(MotionNotifyEvent {
        root: ROOT,
        event: ROOT,
        root_x: x as i16,
        root_y: y as i16,
        event_x: x as i16,
        event_y: y as i16,
        same_screen: true,
        ..Default::default()
    })
}

pub fn key_press(keycode: Keycode, state: u16) -> Event {
    Event::KeyPress(KeyPressEvent {
        detail: keycode,
        root: ROOT,
        event: ROOT,
        state: KeyButMask::from(state),
        same_screen: true,
        ..Default::default()
    })
}

pub fn enter_notify(window: Window) -> Event {
    Event::EnterNotify(EnterNotifyEvent {
        root: ROOT,
        event: window,
        ..Default::default()
    })
}

pub fn expose(window: Window, count: u16) -> Event {
    Event::Expose(ExposeEvent {
        window,
        count,
        ..Default::default()
    })
}

pub fn property_notify(window: Window, atom: Atom) -> Event {
    Event::PropertyNotify(PropertyNotifyEvent {
        window,
        atom,
        ..Default::default()
    })
}

pub fn configure_request(window: Window, rect: Rect, mask: ConfigWindow) -> Event {
    Event::ConfigureRequest(ConfigureRequestEvent {
        parent: ROOT,
        window,
        x: rect.x as i16,
        y: rect.y as i16,
        width: rect.width as u16,
        height: rect.height as u16,
        value_mask: mask,
        ..Default::default()
    })
}

pub fn change_state(atoms: &Atoms, window: Window, state: WmState) -> Event {
    Event::ClientMessage(ClientMessageEvent::new(
        32,
        window,
        atoms.wm_change_state,
        [state.as_u32(), 0, 0, 0, 0],
    ))
}

impl XConn for FakeConn {
    fn root(&self) -> Window {
        ROOT
    }

    fn screen_size(&self) -> (i32, i32) {
        self.screen
    }

    fn font_extents(&self) -> (i32, i32) {
        (11, 3)
    }

    fn atoms(&self) -> &Atoms {
        &self.atoms
    }

    fn next_event(&self) -> Result<Option<Event>> {
        match self.events.borrow_mut().pop_front() {
            Some(event) => Ok(event),
            None => anyhow::bail!("event queue exhausted"),
        }
    }

    fn requeue(&self, events: Vec<Event>) {
        let mut queue = self.events.borrow_mut();
        for event in events.into_iter().rev() {
            queue.push_front(Some(event));
        }
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn grab_server(&self) -> Result<()> {
        self.record("grab_server".to_string());
        Ok(())
    }

    fn ungrab_server(&self) -> Result<()> {
        self.record("ungrab_server".to_string());
        Ok(())
    }

    fn suppress_errors(&self) {
        self.record("suppress_errors".to_string());
    }

    fn restore_errors(&self) -> Result<()> {
        self.record("restore_errors".to_string());
        Ok(())
    }

    fn query_pointer(&self) -> Result<(i32, i32)> {
        Ok(self.pointer.get())
    }

    fn window_attributes(&self, window: Window) -> Result<Option<WindowAttributes>> {
        Ok(self.window(window).map(|w| WindowAttributes {
            rect: w.rect,
            viewable: w.mapped,
            override_redirect: w.override_redirect,
            colormap: w.colormap,
        }))
    }

    fn top_level_windows(&self) -> Result<Vec<Window>> {
        Ok(self.stacking.borrow().clone())
    }

    fn transient_for(&self, window: Window) -> Option<Window> {
        self.window(window).and_then(|w| w.transient_for)
    }

    fn fetch_name(&self, window: Window) -> Option<String> {
        self.window(window).and_then(|w| w.title)
    }

    fn size_hints(&self, window: Window) -> SizeHints {
        self.window(window).map(|w| w.hints).unwrap_or_default()
    }

    fn initial_state(&self, window: Window) -> Option<WmState> {
        self.window(window).and_then(|w| w.initial_state)
    }

    fn supports_delete(&self, window: Window) -> bool {
        self.window(window).map(|w| w.supports_delete).unwrap_or(false)
    }

    fn keycode_to_keysym(&self, keycode: Keycode) -> Option<u32> {
        self.keymap.get(&keycode).copied()
    }

    fn set_wm_state(&self, window: Window, state: WmState) -> Result<()> {
        self.record(format!("set_wm_state 0x{:x} {:?}", window, state));
        self.update(window, |w| w.wm_state = Some(state));
        Ok(())
    }

    fn send_delete(&self, window: Window) -> Result<()> {
        self.record(format!("send_delete 0x{:x}", window));
        Ok(())
    }

    fn kill_client(&self, window: Window) -> Result<()> {
        self.record(format!("kill_client 0x{:x}", window));
        Ok(())
    }

    fn send_configure_notify(&self, window: Window, rect: Rect) -> Result<()> {
        self.record(format!(
            "send_configure_notify 0x{:x} {} {} {} {}",
            window, rect.x, rect.y, rect.width, rect.height
        ));
        Ok(())
    }

    fn create_frame(&self, rect: Rect, style: WindowStyle) -> Result<Window> {
        let id = self.allocate(rect, ROOT, style.border_width);
        self.record(format!("create_frame 0x{:x}", id));
        Ok(id)
    }

    fn create_input_window(&self, rect: Rect) -> Result<Window> {
        let id = self.allocate(rect, ROOT, 0);
        self.record(format!(
            "create_input_window 0x{:x} {} {} {} {}",
            id, rect.x, rect.y, rect.width, rect.height
        ));
        Ok(id)
    }

    fn create_overlay(&self, parent: Window, rect: Rect, style: WindowStyle) -> Result<Window> {
        let id = self.allocate(rect, parent, style.border_width);
        self.record(format!("create_overlay 0x{:x}", id));
        Ok(id)
    }

    fn destroy_window(&self, window: Window) -> Result<()> {
        self.record(format!("destroy_window 0x{:x}", window));
        self.vanish(window);
        Ok(())
    }

    fn map_window(&self, window: Window) -> Result<()> {
        self.record(format!("map_window 0x{:x}", window));
        self.update(window, |w| w.mapped = true);
        Ok(())
    }

    fn map_raised(&self, window: Window) -> Result<()> {
        self.record(format!("map_raised 0x{:x}", window));
        self.update(window, |w| w.mapped = true);
        self.restack(window, true);
        Ok(())
    }

    fn unmap_window(&self, window: Window) -> Result<()> {
        self.record(format!("unmap_window 0x{:x}", window));
        self.update(window, |w| w.mapped = false);
        Ok(())
    }

    fn raise_window(&self, window: Window) -> Result<()> {
        self.record(format!("raise_window 0x{:x}", window));
        self.restack(window, true);
        Ok(())
    }

    fn lower_window(&self, window: Window) -> Result<()> {
        self.record(format!("lower_window 0x{:x}", window));
        self.restack(window, false);
        Ok(())
    }

    fn move_window(&self, window: Window, x: i32, y: i32) -> Result<()> {
        self.record(format!("move_window 0x{:x} {} {}", window, x, y));
        self.update(window, |w| {
            w.rect.x = x;
            w.rect.y = y;
        });
        Ok(())
    }

    fn resize_window(&self, window: Window, width: i32, height: i32) -> Result<()> {
        self.record(format!("resize_window 0x{:x} {} {}", window, width, height));
        self.update(window, |w| {
            w.rect.width = width;
            w.rect.height = height;
        });
        Ok(())
    }

    fn move_resize(&self, window: Window, rect: Rect) -> Result<()> {
        self.record(format!(
            "move_resize 0x{:x} {} {} {} {}",
            window, rect.x, rect.y, rect.width, rect.height
        ));
        self.update(window, |w| w.rect = rect);
        Ok(())
    }

    fn configure_window(&self, window: Window, aux: &ConfigureWindowAux) -> Result<()> {
        self.record(format!(
            "configure_window 0x{:x} {:?} {:?} {:?} {:?}",
            window, aux.x, aux.y, aux.width, aux.height
        ));
        self.update(window, |w| {
            if let Some(x) = aux.x {
                w.rect.x = x;
            }
            if let Some(y) = aux.y {
                w.rect.y = y;
            }
            if let Some(width) = aux.width {
                w.rect.width = width as i32;
            }
            if let Some(height) = aux.height {
                w.rect.height = height as i32;
            }
            if let Some(bw) = aux.border_width {
                w.border_width = bw as i32;
            }
        });
        Ok(())
    }

    fn reparent(&self, window: Window, parent: Window, x: i32, y: i32) -> Result<()> {
        self.record(format!("reparent 0x{:x} 0x{:x} {} {}", window, parent, x, y));
        self.update(window, |w| {
            w.parent = parent;
            w.rect.x = x;
            w.rect.y = y;
        });
        let mut stacking = self.stacking.borrow_mut();
        stacking.retain(|&w| w != window);
        if parent == ROOT {
            stacking.push(window);
        }
        Ok(())
    }

    fn set_border_width(&self, window: Window, width: i32) -> Result<()> {
        self.record(format!("set_border_width 0x{:x} {}", window, width));
        self.update(window, |w| w.border_width = width);
        Ok(())
    }

    fn add_to_save_set(&self, window: Window) -> Result<()> {
        self.record(format!("add_to_save_set 0x{:x}", window));
        Ok(())
    }

    fn remove_from_save_set(&self, window: Window) -> Result<()> {
        self.record(format!("remove_from_save_set 0x{:x}", window));
        Ok(())
    }

    fn select_client_input(&self, window: Window) -> Result<()> {
        self.record(format!("select_client_input 0x{:x}", window));
        Ok(())
    }

    fn set_input_focus(&self, window: Window) -> Result<()> {
        self.record(format!("set_input_focus 0x{:x}", window));
        Ok(())
    }

    fn focus_pointer_root(&self) -> Result<()> {
        self.record("focus_pointer_root".to_string());
        Ok(())
    }

    fn install_colormap(&self, colormap: Colormap) -> Result<()> {
        if colormap != x11rb::NONE {
            self.record(format!("install_colormap 0x{:x}", colormap));
        }
        Ok(())
    }

    fn install_default_colormap(&self) -> Result<()> {
        self.record("install_default_colormap".to_string());
        Ok(())
    }

    fn grab_buttons(&self, frame: Window) -> Result<()> {
        self.record(format!("grab_buttons 0x{:x}", frame));
        Ok(())
    }

    fn replay_pointer(&self) -> Result<()> {
        self.record("replay_pointer".to_string());
        Ok(())
    }

    fn grab_pointer(&self, confine_to: Option<Window>, cursor: GrabCursor) -> Result<bool> {
        let confine = confine_to.map(|w| format!("0x{:x}", w)).unwrap_or_default();
        self.record(format!("grab_pointer {} {:?}", confine, cursor));
        Ok(!self.refuse_grabs.get())
    }

    fn ungrab_pointer(&self) -> Result<()> {
        self.record("ungrab_pointer".to_string());
        if self.fail_ungrabs.get() {
            anyhow::bail!("connection lost");
        }
        Ok(())
    }

    fn numlock_mask(&self) -> u16 {
        self.numlock_mask.get()
    }

    fn grab_keys(&self, modifiers: u16, keysyms: &[u32]) -> Result<()> {
        self.record(format!("grab_keys {} {:x?}", modifiers, keysyms));
        Ok(())
    }

    fn bounding_shape_rects(&self, window: Window) -> Result<usize> {
        Ok(self.window(window).map(|w| w.shape_rects).unwrap_or(0))
    }

    fn shape_from_window(&self, frame: Window, window: Window, y: i32) -> Result<()> {
        self.record(format!("shape_from_window 0x{:x} 0x{:x} {}", frame, window, y));
        Ok(())
    }

    fn shape_union(&self, frame: Window, kind: ShapeKind, offset: (i32, i32), rect: Rect) -> Result<()> {
        self.record(format!(
            "shape_union 0x{:x} {:?} {:?} {} {} {} {}",
            frame, kind, offset, rect.x, rect.y, rect.width, rect.height
        ));
        Ok(())
    }

    fn shape_reset(&self, frame: Window, rect: Rect) -> Result<()> {
        self.record(format!(
            "shape_reset 0x{:x} {} {} {} {}",
            frame, rect.x, rect.y, rect.width, rect.height
        ));
        Ok(())
    }

    fn clear_window(&self, window: Window) -> Result<()> {
        self.draw(format!("clear 0x{:x}", window));
        Ok(())
    }

    fn fill_rect(&self, window: Window, color: u32, rect: Rect) -> Result<()> {
        self.draw(format!(
            "fill 0x{:x} #{:06x} {} {} {} {}",
            window, color, rect.x, rect.y, rect.width, rect.height
        ));
        Ok(())
    }

    fn draw_rect(&self, window: Window, color: u32, rect: Rect) -> Result<()> {
        self.draw(format!(
            "rect 0x{:x} #{:06x} {} {} {} {}",
            window, color, rect.x, rect.y, rect.width, rect.height
        ));
        Ok(())
    }

    fn draw_line(&self, window: Window, color: u32, from: (i32, i32), to: (i32, i32)) -> Result<()> {
        self.draw(format!("line 0x{:x} #{:06x} {:?} {:?}", window, color, from, to));
        Ok(())
    }

    fn draw_text(&self, window: Window, _fg: u32, _background: u32, x: i32, y: i32, text: &str) -> Result<()> {
        self.draw(format!("text 0x{:x} {} {} {}", window, x, y, text));
        Ok(())
    }

    fn text_width(&self, text: &str) -> i32 {
        6 * text.len() as i32
    }
}
