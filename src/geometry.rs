//! Pure geometry for client placement and interactive resizing.
//!
//! Nothing in here talks to the X server. Every rule that decides where a
//! client may sit, how big it may be and how a dragged edge snaps to the
//! client's resize increments lives here so it can be tested directly.

use x11rb::protocol::xproto::ConfigWindow;

use crate::types::{Gravity, Rect, SizeHints};

/// Padding between bar edges and text
pub const SPACE: i32 = 3;

/// Screen size plus the decoration sizes every calculation depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub screen_width: i32,
    pub screen_height: i32,
    /// Height of a title bar, and of the taskbar
    pub bar_height: i32,
    pub border_width: i32,
}

impl Metrics {
    /// Smallest width or height a client may be given
    pub fn min_window_size(&self) -> i32 {
        self.bar_height * 4
    }

    /// Width of one title-bar button
    pub fn button_size(&self) -> i32 {
        self.bar_height - self.border_width
    }
}

/// Clamp a client rectangle so that its decorated frame stays on screen,
/// then convert it from inner-window to frame coordinates.
///
/// `fullscreen` drops the title bar from the height budget.
pub fn fix_position(rect: Rect, fullscreen: bool, m: &Metrics) -> Rect {
    let titlebar = if fullscreen { 0 } else { m.bar_height };
    let xmax = m.screen_width;
    let ymax = m.screen_height;
    let mut r = rect;

    r.width = r.width.max(m.min_window_size());
    r.height = r.height.max(m.min_window_size());

    if r.width > xmax {
        r.width = xmax;
    }
    if r.height + m.bar_height + titlebar > ymax {
        r.height = ymax - (m.bar_height + titlebar);
    }

    if r.x < 0 {
        r.x = 0;
    }
    if r.y < m.bar_height {
        r.y = m.bar_height;
    }

    if r.x + r.width + m.border_width >= xmax {
        r.x = xmax - r.width;
    }
    if r.y + r.height + m.bar_height >= ymax {
        r.y = ymax - r.height - m.bar_height;
    }

    r.x -= m.border_width;
    r.y -= m.border_width;
    r
}

/// Run [`fix_position`] and report which fields it had to change.
///
/// A field the clamp leaves alone is not reported, so a reconfigure built
/// from the returned mask only touches what actually moved.
pub fn refix_position(rect: Rect, fullscreen: bool, m: &Metrics) -> (Rect, ConfigWindow) {
    let old = Rect::new(
        rect.x - m.border_width,
        rect.y - m.border_width,
        rect.width,
        rect.height,
    );
    let fixed = fix_position(rect, fullscreen, m);

    let mut changed = ConfigWindow::from(0u16);
    if old.x != fixed.x {
        changed = changed | ConfigWindow::X;
    }
    if old.y != fixed.y {
        changed = changed | ConfigWindow::Y;
    }
    if old.width != fixed.width {
        changed = changed | ConfigWindow::WIDTH;
    }
    if old.height != fixed.height {
        changed = changed | ConfigWindow::HEIGHT;
    }
    (fixed, changed)
}

/// Vertical offset the title bar imposes for the client's window gravity.
pub fn gravity_offset(hints: &SizeHints, m: &Metrics) -> i32 {
    match hints.gravity.unwrap_or_default() {
        Gravity::NorthWest | Gravity::North | Gravity::NorthEast => m.bar_height,
        Gravity::Center => m.bar_height / 2,
        _ => 0,
    }
}

/// Apply (`multiplier = 1`) or remove (`multiplier = -1`) the gravity offset.
pub fn gravitate(rect: Rect, hints: &SizeHints, multiplier: i32, m: &Metrics) -> Rect {
    Rect {
        y: rect.y + multiplier * gravity_offset(hints, m),
        ..rect
    }
}

/// Snap a size down onto the client's resize-increment grid.
///
/// Returns `None` when the client has no increment hint. A zero increment
/// leaves that dimension untouched.
pub fn snap_to_increments(hints: &SizeHints, width: i32, height: i32) -> Option<(i32, i32)> {
    let (inc_w, inc_h) = hints.size_increment?;
    let (base_w, base_h) = hints.increment_base();
    let snap = |value: i32, base: i32, inc: i32| {
        if inc > 0 {
            value - (value - base).rem_euclid(inc)
        } else {
            value
        }
    };
    Some((snap(width, base_w, inc_w), snap(height, base_h, inc_h)))
}

/// Clamp an inner window size to the client's min/max hints, the global
/// minimum, and the screen area below the taskbar.
pub fn limit_size(width: i32, height: i32, hints: &SizeHints, m: &Metrics) -> (i32, i32) {
    let (mut w, mut h) = (width, height);
    if let Some((min_w, min_h)) = hints.min_size {
        w = w.max(min_w);
        h = h.max(min_h);
    }
    if let Some((max_w, max_h)) = hints.max_size {
        if max_w > 0 {
            w = w.min(max_w);
        }
        if max_h > 0 {
            h = h.min(max_h);
        }
    }
    w = w.max(m.min_window_size()).min(m.screen_width);
    h = h
        .max(m.min_window_size())
        .min(m.screen_height - 2 * m.bar_height);
    (w, h)
}

/// Where a fullscreen client's frame goes and where its window sits inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullscreenPlacement {
    /// Frame rectangle, covering the screen below the taskbar
    pub frame: Rect,
    /// Inner window: offset within the frame plus size
    pub window: Rect,
}

impl FullscreenPlacement {
    /// The geometry recorded on the client while it is fullscreen
    pub fn client_rect(&self) -> Rect {
        Rect::new(self.frame.x, self.frame.y, self.window.width, self.window.height)
    }
}

/// Fill the screen below the taskbar, honoring max-size and increment
/// hints and centering whatever space they leave over.
pub fn fullscreen_placement(hints: &SizeHints, m: &Metrics) -> FullscreenPlacement {
    let area_w = m.screen_width;
    let area_h = m.screen_height - m.bar_height;
    let (mut w, mut h) = (area_w, area_h);

    if let Some((max_w, max_h)) = hints.max_size {
        if max_w > 0 {
            w = w.min(max_w);
        }
        if max_h > 0 {
            h = h.min(max_h);
        }
    }
    if let Some((snap_w, snap_h)) = snap_to_increments(hints, w, h) {
        w = snap_w;
        h = snap_h;
    }

    FullscreenPlacement {
        frame: Rect::new(-m.border_width, m.bar_height - m.border_width, area_w, area_h),
        window: Rect::new((area_w - w) / 2, (area_h - h) / 2, w, h),
    }
}

/// Region the pointer is confined to while moving a client, chosen so the
/// title bar can never be dragged under the taskbar.
pub fn move_bounds(pointer: (i32, i32), client: Rect, m: &Metrics) -> Rect {
    let (mx, my) = pointer;
    let x = (mx - client.x) - m.border_width;
    let y = (my - client.y) + (m.bar_height * 2 - m.border_width);
    let width = m.screen_width - client.width + 1;
    let height = m.screen_height - 2 * m.bar_height + m.border_width + 1;
    Rect::new(x, y, width.max(1), height.max(1))
}

/// Which edges a resize motion moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Edges {
    pub left: bool,
    pub right: bool,
    pub top: bool,
    pub bottom: bool,
}

impl Edges {
    pub fn any(&self) -> bool {
        self.left || self.right || self.top || self.bottom
    }
}

/// How a resize was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    /// Pressed inside the window: pulling edges outwards
    Outward,
    /// Pressed outside the window: pushing the nearest edge inwards
    Inward,
}

/// Decide the drag kind from where the initiating click landed.
pub fn classify_drag(press: (i32, i32), client: Rect, m: &Metrics) -> DragKind {
    let (x, y) = press;
    let bw = m.border_width;
    let inside = x > client.x + bw
        && x < client.right() - bw
        && y > (client.y - m.bar_height) + bw
        && y < client.bottom() - bw;
    if inside {
        DragKind::Outward
    } else {
        DragKind::Inward
    }
}

/// Running state of an interactive resize.
///
/// `dims` follows the pointer exactly; `result` is the snapped and clamped
/// frame rectangle that the outline shows and that is committed on release.
#[derive(Debug, Clone, Copy)]
pub struct ResizeDrag {
    pub kind: DragKind,
    dims: Rect,
    result: Rect,
}

impl ResizeDrag {
    pub fn new(kind: DragKind, client: Rect, m: &Metrics) -> Self {
        let dims = Rect::new(
            client.x,
            client.y - m.bar_height,
            client.width,
            client.height + m.bar_height,
        );
        Self { kind, dims, result: dims }
    }

    /// Frame rectangle (title bar included) currently proposed
    pub fn frame_rect(&self) -> Rect {
        self.result
    }

    /// Client rectangle to commit on release
    pub fn client_rect(&self, m: &Metrics) -> Rect {
        Rect::new(
            self.result.x,
            self.result.y + m.bar_height,
            self.result.width,
            self.result.height - m.bar_height,
        )
    }

    /// Feed a pointer position. Returns the new frame rectangle when an
    /// edge moved; positions over the taskbar are ignored.
    pub fn motion(&mut self, px: i32, py: i32, hints: &SizeHints, m: &Metrics) -> Option<Rect> {
        if py < m.bar_height {
            return None;
        }
        let bw = m.border_width;
        let d = &mut self.dims;
        let mut edges = Edges::default();

        match self.kind {
            DragKind::Outward => {
                if px < d.x + bw {
                    d.width += d.x + bw - px;
                    d.x = px - bw;
                    edges.left = true;
                } else if px > d.right() + bw {
                    // +1 lets the window sit flush with the screen edge
                    d.width = (px - d.x - bw) + 1;
                    edges.right = true;
                }
                if py < d.y + bw {
                    d.height += d.y + bw - py;
                    d.y = py - bw;
                    edges.top = true;
                } else if py > d.bottom() + bw {
                    d.height = (py - d.y - bw) + 1;
                    edges.bottom = true;
                }
            }
            DragKind::Inward => {
                let inside = px >= d.x + bw
                    && px <= d.right() + bw
                    && py >= d.y + bw
                    && py <= d.bottom() + bw;
                if inside {
                    let from_left = px - d.x - bw;
                    let from_right = d.right() + bw - px;
                    let from_top = py - d.y - bw;
                    let from_bottom = d.bottom() + bw - py;
                    if from_left < from_right && from_left < from_top && from_left < from_bottom {
                        d.width -= from_left;
                        d.x = px - bw;
                        edges.left = true;
                    } else if from_right < from_top && from_right < from_bottom {
                        d.width = px - d.x - bw;
                        edges.right = true;
                    } else if from_top < from_bottom {
                        d.height -= from_top;
                        d.y = py - bw;
                        edges.top = true;
                    } else {
                        d.height = py - d.y - bw;
                        edges.bottom = true;
                    }
                }
            }
        }

        if !edges.any() {
            return None;
        }
        self.result = constrain_frame(*d, edges, hints, m);
        Some(self.result)
    }
}

/// Snap and clamp a dragged frame rectangle, keeping the edges that did
/// not move fixed.
fn constrain_frame(dims: Rect, edges: Edges, hints: &SizeHints, m: &Metrics) -> Rect {
    let mut r = dims;
    r.height -= m.bar_height;

    if let Some((new_w, new_h)) = snap_to_increments(hints, r.width, r.height) {
        if edges.left {
            r.x = r.right() - new_w;
            r.width = new_w;
        } else if edges.right {
            r.width = new_w;
        }
        if edges.top {
            r.y = r.bottom() - new_h;
            r.height = new_h;
        } else if edges.bottom {
            r.height = new_h;
        }
    }

    let (w, h) = limit_size(r.width, r.height, hints, m);
    if edges.left {
        r.x = r.right() - w;
    }
    r.width = w;
    r.height += m.bar_height;
    let h = h + m.bar_height;
    if edges.top {
        r.y = r.bottom() - h;
    }
    r.height = h;
    r
}

/// Title-bar buttons, counted from the right edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleBarHit {
    Close,
    ToggleDepth,
    Hide,
    Title,
}

/// Map an x offset within a frame of inner width `width` to what was hit.
pub fn box_clicked(width: i32, x: i32, m: &Metrics) -> Option<TitleBarHit> {
    let from_right = width - x;
    if from_right < 0 {
        return None;
    }
    Some(match from_right / m.button_size().max(1) {
        0 => TitleBarHit::Close,
        1 => TitleBarHit::ToggleDepth,
        2 => TitleBarHit::Hide,
        _ => TitleBarHit::Title,
    })
}

/// Width of each taskbar button when `count` clients share the bar.
pub fn taskbar_button_width(count: usize, m: &Metrics) -> f32 {
    (m.screen_width + m.border_width) as f32 / count.max(1) as f32
}

/// Index of the taskbar button under `x`, if any.
pub fn taskbar_button_at(x: i32, count: usize, m: &Metrics) -> Option<usize> {
    if count == 0 || x < 0 {
        return None;
    }
    let index = (x as f32 / taskbar_button_width(count, m)) as usize;
    (index < count).then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> Metrics {
        Metrics {
            screen_width: 1920,
            screen_height: 1080,
            bar_height: 20,
            border_width: 2,
        }
    }

    fn has(mask: ConfigWindow, flag: ConfigWindow) -> bool {
        u16::from(mask) & u16::from(flag) != 0
    }

    #[test]
    fn test_fix_position_oversized_request() {
        let m = metrics();
        let r = fix_position(Rect::new(-50, 0, 4000, 4000), false, &m);
        assert!(r.height <= 1060);
        assert_eq!(r.width, 1920);
        // frame interior starts on screen, below the taskbar
        assert!(r.x + m.border_width >= 0);
        assert!(r.x + m.border_width + r.width <= m.screen_width);
        assert!(r.y + m.border_width - m.bar_height >= 0);
        assert!(r.y + m.border_width + r.height <= m.screen_height);
    }

    #[test]
    fn test_fix_position_enforces_minimum() {
        let m = metrics();
        let r = fix_position(Rect::new(100, 100, 10, 10), false, &m);
        assert_eq!(r.width, 80);
        assert_eq!(r.height, 80);
        assert_eq!((r.x, r.y), (98, 98));
    }

    #[test]
    fn test_refix_reports_only_changed_fields() {
        let m = metrics();
        let (fixed, changed) = refix_position(Rect::new(100, 100, 300, 200), false, &m);
        assert_eq!(fixed, Rect::new(98, 98, 300, 200));
        assert_eq!(u16::from(changed), 0);

        let (_, changed) = refix_position(Rect::new(100, 5, 300, 200), false, &m);
        assert!(has(changed, ConfigWindow::Y));
        assert!(!has(changed, ConfigWindow::X));
        assert!(!has(changed, ConfigWindow::WIDTH));
    }

    #[test]
    fn test_gravity_round_trip() {
        let m = metrics();
        let mut hints = SizeHints::default();
        let rect = Rect::new(10, 50, 100, 100);
        assert_eq!(gravitate(rect, &hints, 1, &m).y, 70);
        hints.gravity = Some(Gravity::Center);
        assert_eq!(gravitate(rect, &hints, 1, &m).y, 60);
        hints.gravity = Some(Gravity::SouthWest);
        assert_eq!(gravitate(rect, &hints, 1, &m).y, 50);

        hints.gravity = Some(Gravity::North);
        let applied = gravitate(rect, &hints, 1, &m);
        assert_eq!(gravitate(applied, &hints, -1, &m), rect);
    }

    #[test]
    fn test_snap_to_increments() {
        let hints = SizeHints {
            min_size: Some((10, 10)),
            size_increment: Some((7, 7)),
            base_size: Some((10, 10)),
            ..Default::default()
        };
        assert_eq!(snap_to_increments(&hints, 30, 30), Some((24, 24)));
        assert_eq!(snap_to_increments(&hints, 24, 24), Some((24, 24)));
        assert_eq!(snap_to_increments(&SizeHints::default(), 30, 30), None);
    }

    #[test]
    fn test_snap_ignores_zero_increment() {
        let hints = SizeHints {
            size_increment: Some((0, 5)),
            ..Default::default()
        };
        assert_eq!(snap_to_increments(&hints, 33, 33), Some((33, 30)));
    }

    #[test]
    fn test_limit_size() {
        let m = metrics();
        let hints = SizeHints {
            min_size: Some((100, 100)),
            max_size: Some((500, 400)),
            ..Default::default()
        };
        assert_eq!(limit_size(50, 50, &hints, &m), (100, 100));
        assert_eq!(limit_size(900, 900, &hints, &m), (500, 400));
        assert_eq!(limit_size(5000, 5000, &SizeHints::default(), &m), (1920, 1040));
    }

    #[test]
    fn test_fullscreen_placement_fills_screen() {
        let m = metrics();
        let p = fullscreen_placement(&SizeHints::default(), &m);
        assert_eq!(p.frame, Rect::new(-2, 18, 1920, 1060));
        assert_eq!(p.window, Rect::new(0, 0, 1920, 1060));
        assert_eq!(p.client_rect(), Rect::new(-2, 18, 1920, 1060));
    }

    #[test]
    fn test_fullscreen_placement_centers_slack() {
        let m = metrics();
        let hints = SizeHints {
            max_size: Some((1000, 2000)),
            ..Default::default()
        };
        let p = fullscreen_placement(&hints, &m);
        assert_eq!(p.window, Rect::new(460, 0, 1000, 1060));

        let hints = SizeHints {
            size_increment: Some((100, 1)),
            ..Default::default()
        };
        let p = fullscreen_placement(&hints, &m);
        assert_eq!(p.window.width, 1900);
        assert_eq!(p.window.x, 10);
    }

    #[test]
    fn test_classify_drag() {
        let m = metrics();
        let client = Rect::new(100, 100, 400, 300);
        assert_eq!(classify_drag((300, 200), client, &m), DragKind::Outward);
        assert_eq!(classify_drag((50, 200), client, &m), DragKind::Inward);
        assert_eq!(classify_drag((300, 450), client, &m), DragKind::Inward);
    }

    #[test]
    fn test_resize_outward_right_edge_snaps() {
        let m = metrics();
        let hints = SizeHints {
            min_size: Some((10, 10)),
            size_increment: Some((7, 7)),
            base_size: Some((10, 10)),
            ..Default::default()
        };
        let client = Rect::new(100, 100, 101, 101);
        let mut drag = ResizeDrag::new(DragKind::Outward, client, &m);
        let frame = drag.motion(300, 150, &hints, &m).unwrap();
        // raw width 199 snaps down to 10 + 27 * 7
        assert_eq!(frame.x, 100);
        assert_eq!(frame.width, 199);
        // 204 pixels are not a full step past 199
        let frame = drag.motion(305, 150, &hints, &m).unwrap();
        assert_eq!(frame.width, 199);
        let frame = drag.motion(307, 150, &hints, &m).unwrap();
        assert_eq!(frame.width, 206);
        assert_eq!(frame.x, 100);
    }

    #[test]
    fn test_resize_left_edge_keeps_right_edge() {
        let m = metrics();
        let hints = SizeHints {
            size_increment: Some((10, 10)),
            base_size: Some((0, 0)),
            ..Default::default()
        };
        let client = Rect::new(500, 200, 300, 300);
        let right = client.right();
        let mut drag = ResizeDrag::new(DragKind::Outward, client, &m);
        let frame = drag.motion(455, 300, &hints, &m).unwrap();
        assert_eq!(frame.right(), right);
        assert_eq!(frame.width % 10, 0);
    }

    #[test]
    fn test_resize_clamp_keeps_fixed_edge() {
        let m = metrics();
        let hints = SizeHints {
            max_size: Some((320, 1000)),
            ..Default::default()
        };
        let client = Rect::new(500, 200, 300, 300);
        let right = client.right();
        let mut drag = ResizeDrag::new(DragKind::Outward, client, &m);
        let frame = drag.motion(100, 300, &hints, &m).unwrap();
        assert_eq!(frame.width, 320);
        assert_eq!(frame.right(), right);
    }

    #[test]
    fn test_resize_inward_moves_nearest_edge_only() {
        let m = metrics();
        let client = Rect::new(100, 100, 400, 400);
        let mut drag = ResizeDrag::new(DragKind::Inward, client, &m);
        // closest to the bottom edge
        let frame = drag.motion(300, 460, &SizeHints::default(), &m).unwrap();
        assert_eq!(frame.x, 100);
        assert_eq!(frame.width, 400);
        assert_eq!(frame.y, 80);
        assert_eq!(frame.height, 460 - 80 - 2);
        // outside the window nothing moves
        assert!(drag.motion(10, 460, &SizeHints::default(), &m).is_none());
    }

    #[test]
    fn test_resize_ignores_taskbar() {
        let m = metrics();
        let mut drag = ResizeDrag::new(DragKind::Outward, Rect::new(100, 100, 400, 400), &m);
        assert!(drag.motion(50, 10, &SizeHints::default(), &m).is_none());
        assert_eq!(drag.client_rect(&m), Rect::new(100, 100, 400, 400));
    }

    #[test]
    fn test_box_clicked() {
        let m = metrics();
        assert_eq!(box_clicked(300, 295, &m), Some(TitleBarHit::Close));
        assert_eq!(box_clicked(300, 280, &m), Some(TitleBarHit::ToggleDepth));
        assert_eq!(box_clicked(300, 250, &m), Some(TitleBarHit::Hide));
        assert_eq!(box_clicked(300, 10, &m), Some(TitleBarHit::Title));
        assert_eq!(box_clicked(300, 301, &m), None);
    }

    #[test]
    fn test_taskbar_button_at() {
        let m = metrics();
        assert_eq!(taskbar_button_at(0, 3, &m), Some(0));
        assert_eq!(taskbar_button_at(700, 3, &m), Some(1));
        assert_eq!(taskbar_button_at(1921, 3, &m), Some(2));
        assert_eq!(taskbar_button_at(10, 0, &m), None);
    }

    #[test]
    fn test_move_bounds_positive() {
        let m = metrics();
        let b = move_bounds((150, 110), Rect::new(100, 100, 400, 300), &m);
        assert_eq!((b.x, b.y), (48, 48));
        assert!(b.width > 0 && b.height > 0);
    }
}
