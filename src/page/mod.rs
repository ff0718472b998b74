//! The page collaborator: everything the pipeline reads from or writes to the
//! monitored document.
//!
//! The pipeline only needs element lookup by tag, geometry, visibility, text
//! and pointer-event dispatch. [`PageTree`] implements the trait in memory and
//! is what the binary and the tests drive.

mod fixture;
mod tree;

pub use fixture::{load_fixture, sample_chart, FixtureWatcher, NodeStyle, PageNode};
pub use tree::PageTree;

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::PageError;

/// A reference to an element of a particular document load.
///
/// References from an earlier load are detached once the page reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub(crate) generation: u64,
    pub(crate) index: usize,
}

/// A point in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An element's rendered bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// True when the box has no rendered area.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Hit test. The right and bottom edges are outside the box.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }
}

/// The subset of computed style the pipeline inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
}

impl ComputedStyle {
    /// False for `display: none` and `visibility: hidden`/`collapse`.
    pub fn is_rendered(&self) -> bool {
        self.display != "none" && self.visibility != "hidden" && self.visibility != "collapse"
    }
}

/// Kinds of synthetic pointer events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Enter,
    Over,
    Move,
}

impl PointerKind {
    /// The DOM event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            PointerKind::Enter => "mouseenter",
            PointerKind::Over => "mouseover",
            PointerKind::Move => "mousemove",
        }
    }
}

/// A synthetic pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub point: Point,
    pub bubbles: bool,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, point: Point) -> Self {
        Self {
            kind,
            point,
            // mouseenter does not propagate
            bubbles: kind != PointerKind::Enter,
        }
    }
}

/// Read and event-dispatch access to a live document.
///
/// Implementations must not assume handlers finish before the caller's
/// settle delay elapses.
pub trait Page: Send + Sync + Debug {
    /// All elements under `scope` (or the whole document) whose tag is one of
    /// `tags`, in document order. A detached scope yields nothing.
    fn query_all(&self, scope: Option<ElementRef>, tags: &[&str]) -> Result<Vec<ElementRef>, PageError>;

    /// Whether the element still belongs to the current document.
    fn is_attached(&self, element: ElementRef) -> bool;

    /// The rendered bounding box, or `None` for detached elements.
    fn bounding_box(&self, element: ElementRef) -> Option<Rect>;

    /// The effective display and visibility, or `None` for detached elements.
    fn computed_style(&self, element: ElementRef) -> Option<ComputedStyle>;

    /// Concatenated text of the element and its descendants.
    fn text_content(&self, element: ElementRef) -> Option<String>;

    /// Dispatch a pointer event at the element. Returns whether any handler ran.
    fn dispatch(&self, element: ElementRef, event: &PointerEvent) -> Result<bool, PageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_hit_test_excludes_right_edge() {
        let rect = Rect::new(10.0, 10.0, 20.0, 10.0);
        assert!(rect.contains(Point::new(29.0, 15.0)));
        assert!(!rect.contains(Point::new(30.0, 15.0)));
        assert!(rect.contains(Point::new(10.0, 10.0)));
    }

    #[test]
    fn test_enter_does_not_bubble() {
        let enter = PointerEvent::new(PointerKind::Enter, Point::default());
        let over = PointerEvent::new(PointerKind::Over, Point::default());
        assert!(!enter.bubbles);
        assert!(over.bubbles);
        assert_eq!(over.kind.event_name(), "mouseover");
    }
}
