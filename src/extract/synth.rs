//! Synthetic hover over the chart target.

use tracing::trace;

use crate::error::PageError;
use crate::page::{ElementRef, Page, PointerEvent, PointerKind, Point, Rect};

/// Default distance from the right edge of the target, in pixels.
pub const DEFAULT_HOVER_INSET: f64 = 1.0;

/// Accepted inset range. The chart's hit testing misses the mark outside it.
pub const HOVER_INSET_RANGE: std::ops::RangeInclusive<f64> = 1.0..=2.0;

/// The hover coordinates for a target box: just inside the right edge,
/// vertically centred.
pub fn target_point(rect: Rect, inset: f64) -> Point {
    Point::new(rect.right() - inset, rect.y + rect.height / 2.0)
}

/// Dispatches pointer-enter, pointer-over and pointer-move at one point.
#[derive(Debug, Clone, Copy)]
pub struct EventSynthesizer {
    inset: f64,
}

impl Default for EventSynthesizer {
    fn default() -> Self {
        Self {
            inset: DEFAULT_HOVER_INSET,
        }
    }
}

impl EventSynthesizer {
    /// `inset` must lie in [`HOVER_INSET_RANGE`]; the monitor builder checks it.
    pub fn new(inset: f64) -> Self {
        Self { inset }
    }

    pub fn inset(&self) -> f64 {
        self.inset
    }

    /// Fire the three events at `point`. Returns whether any page handler ran.
    pub fn fire(&self, page: &dyn Page, target: ElementRef, point: Point) -> Result<bool, PageError> {
        let mut handled = false;
        for kind in [PointerKind::Enter, PointerKind::Over, PointerKind::Move] {
            let event = PointerEvent::new(kind, point);
            handled |= page.dispatch(target, &event)?;
            trace!(event = kind.event_name(), x = point.x, y = point.y, "dispatched");
        }
        Ok(handled)
    }

    /// Hover the target at its computed point. `None` when the target has
    /// been detached since it was located.
    pub fn hover(&self, page: &dyn Page, target: ElementRef) -> Result<Option<Point>, PageError> {
        let Some(rect) = page.bounding_box(target) else {
            return Ok(None);
        };
        let point = target_point(rect, self.inset);
        self.fire(page, target, point)?;
        Ok(Some(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{PageNode, PageTree};

    #[test]
    fn test_target_point_is_inside_right_edge() {
        let point = target_point(Rect::new(100.0, 50.0, 20.0, 100.0), 1.0);
        assert_eq!(point, Point::new(119.0, 100.0));
    }

    #[test]
    fn test_hover_reveals_tooltip() {
        let page = PageTree::from_root(PageNode::new("body").children([
            PageNode::new("rect").id("bar").rect(100.0, 50.0, 20.0, 100.0).on_hover("tip"),
            PageNode::new("table").id("tip").rect(0.0, 0.0, 50.0, 20.0).display("none"),
        ]));
        let bar = page.element_by_id("bar").unwrap();
        let tip = page.element_by_id("tip").unwrap();

        let point = EventSynthesizer::default().hover(&page, bar).unwrap();
        assert_eq!(point, Some(Point::new(119.0, 100.0)));
        assert!(page.computed_style(tip).unwrap().is_rendered());
    }

    #[test]
    fn test_zero_inset_lands_on_boundary_and_misses() {
        let page = PageTree::from_root(PageNode::new("body").children([
            PageNode::new("rect").id("bar").rect(100.0, 50.0, 20.0, 100.0).on_hover("tip"),
            PageNode::new("table").id("tip").display("none"),
        ]));
        let bar = page.element_by_id("bar").unwrap();
        let point = target_point(page.bounding_box(bar).unwrap(), 0.0);

        assert!(!EventSynthesizer::default().fire(&page, bar, point).unwrap());
    }

    #[test]
    fn test_detached_target_is_not_hovered() {
        let page = PageTree::from_root(PageNode::new("body").child(PageNode::new("rect").id("bar")));
        let bar = page.element_by_id("bar").unwrap();
        page.load(PageNode::new("body"));

        assert_eq!(EventSynthesizer::default().hover(&page, bar).unwrap(), None);
    }
}
