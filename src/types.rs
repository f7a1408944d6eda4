//! Shared types used across multiple modules.
//!
//! Geometry, ICCCM hint data and the window-state property values live here
//! so the registry, the lifecycle code and the connection layer can agree
//! on them without depending on each other.

use serde::{Deserialize, Serialize};

/// A rectangle representing geometry.
///
/// Width and height are signed because the interactive geometry code works
/// with intermediate rectangles whose edges may cross during a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Right edge (exclusive)
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive)
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

/// Values of the ICCCM WM_STATE property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WmState {
    Withdrawn,
    Normal,
    Iconic,
}

impl WmState {
    pub fn as_u32(self) -> u32 {
        match self {
            WmState::Withdrawn => 0,
            WmState::Normal => 1,
            WmState::Iconic => 3,
        }
    }
}

/// The part of a client's requested geometry that stays put when a title
/// bar is added above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
    Static,
}

/// WM_NORMAL_HINTS, reduced to the fields the manager consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeHints {
    pub min_size: Option<(i32, i32)>,
    pub max_size: Option<(i32, i32)>,
    pub size_increment: Option<(i32, i32)>,
    pub base_size: Option<(i32, i32)>,
    /// `None` when the client did not set PWinGravity
    pub gravity: Option<Gravity>,
}

impl SizeHints {
    /// Size the increment grid is anchored at: the base size, else the
    /// minimum size, else zero.
    pub fn increment_base(&self) -> (i32, i32) {
        self.base_size.or(self.min_size).unwrap_or((0, 0))
    }
}

/// Geometry and state of a window as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAttributes {
    pub rect: Rect,
    pub viewable: bool,
    pub override_redirect: bool,
    pub colormap: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edges() {
        let rect = Rect::new(10, 20, 100, 200);
        assert_eq!(rect.right(), 110);
        assert_eq!(rect.bottom(), 220);
    }

    #[test]
    fn test_wm_state_values() {
        assert_eq!(WmState::Iconic.as_u32(), 3);
        assert_eq!(WmState::Normal.as_u32(), 1);
        assert_eq!(WmState::Withdrawn.as_u32(), 0);
    }

    #[test]
    fn test_increment_base_fallbacks() {
        let mut hints = SizeHints::default();
        assert_eq!(hints.increment_base(), (0, 0));
        hints.min_size = Some((10, 12));
        assert_eq!(hints.increment_base(), (10, 12));
        hints.base_size = Some((4, 6));
        assert_eq!(hints.increment_base(), (4, 6));
    }
}
