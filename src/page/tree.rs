//! In-memory document used by the binary and the tests.

use parking_lot::RwLock;

use super::{ComputedStyle, ElementRef, Page, PageNode, PointerEvent, PointerKind, Rect};
use crate::error::PageError;

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    id: Option<String>,
    parent: Option<usize>,
    /// Exclusive end of this node's subtree in the arena.
    end: usize,
    rect: Rect,
    display: Option<String>,
    visibility: Option<String>,
    text: String,
    on_hover: Option<String>,
}

#[derive(Debug, Default)]
struct TreeState {
    generation: u64,
    loaded: bool,
    /// Nodes in document (pre-)order.
    nodes: Vec<NodeData>,
}

impl TreeState {
    fn flatten(&mut self, node: PageNode, parent: Option<usize>) {
        let index = self.nodes.len();
        self.nodes.push(NodeData {
            tag: node.tag.to_ascii_lowercase(),
            id: node.id,
            parent,
            end: index + 1,
            rect: node.rect,
            display: node.style.display,
            visibility: node.style.visibility,
            text: node.text,
            on_hover: node.on_hover,
        });
        for child in node.children {
            self.flatten(child, Some(index));
        }
        self.nodes[index].end = self.nodes.len();
    }

    fn resolve(&self, element: ElementRef) -> Option<usize> {
        (self.loaded && element.generation == self.generation && element.index < self.nodes.len())
            .then_some(element.index)
    }

    fn ancestors_and_self(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(Some(index), move |&i| self.nodes[i].parent)
    }

    fn effective_style(&self, index: usize) -> ComputedStyle {
        let hidden_by_ancestor = self
            .ancestors_and_self(index)
            .any(|i| self.nodes[i].display.as_deref() == Some("none"));
        let display = if hidden_by_ancestor {
            "none".to_string()
        } else {
            self.nodes[index].display.clone().unwrap_or_else(|| "block".to_string())
        };
        // visibility inherits from the nearest ancestor that sets it
        let visibility = self
            .ancestors_and_self(index)
            .find_map(|i| self.nodes[i].visibility.clone())
            .unwrap_or_else(|| "visible".to_string());
        ComputedStyle { display, visibility }
    }

    fn layout_box(&self, index: usize) -> Rect {
        if self.effective_style(index).display == "none" {
            Rect::default()
        } else {
            self.nodes[index].rect
        }
    }

    fn reveal(&mut self, id: &str) -> bool {
        let Some(node) = self.nodes.iter_mut().find(|n| n.id.as_deref() == Some(id)) else {
            return false;
        };
        node.display = Some("block".to_string());
        node.visibility = Some("visible".to_string());
        true
    }
}

/// A document held in memory.
///
/// Elements with an `on_hover` target reveal that target when a pointer-over
/// or pointer-move lands inside their box, which is how the tooltip of the
/// real chart behaves. Reloading replaces the document and detaches every
/// previously handed out [`ElementRef`].
#[derive(Debug, Default)]
pub struct PageTree {
    state: RwLock<TreeState>,
}

impl PageTree {
    /// Create a page with no document loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a page with `root` loaded.
    pub fn from_root(root: PageNode) -> Self {
        let page = Self::new();
        page.load(root);
        page
    }

    /// Replace the document.
    pub fn load(&self, root: PageNode) {
        let mut state = self.state.write();
        state.generation += 1;
        state.nodes.clear();
        state.flatten(root, None);
        state.loaded = true;
    }

    /// Drop the document. Queries fail until the next load.
    pub fn unload(&self) {
        let mut state = self.state.write();
        state.generation += 1;
        state.nodes.clear();
        state.loaded = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.state.read().loaded
    }

    /// Replace the own text of the element with `id`, as a live chart does
    /// when the tooltip follows new data. References stay attached.
    pub fn set_text(&self, id: &str, text: &str) -> bool {
        let mut state = self.state.write();
        match state.nodes.iter_mut().find(|n| n.id.as_deref() == Some(id)) {
            Some(node) => {
                node.text = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Look up an element by its `id`.
    pub fn element_by_id(&self, id: &str) -> Option<ElementRef> {
        let state = self.state.read();
        if !state.loaded {
            return None;
        }
        state
            .nodes
            .iter()
            .position(|n| n.id.as_deref() == Some(id))
            .map(|index| ElementRef {
                generation: state.generation,
                index,
            })
    }
}

impl Page for PageTree {
    fn query_all(&self, scope: Option<ElementRef>, tags: &[&str]) -> Result<Vec<ElementRef>, PageError> {
        let state = self.state.read();
        if !state.loaded {
            return Err(PageError::Unavailable);
        }

        let range = match scope {
            None => 0..state.nodes.len(),
            Some(scope) => match state.resolve(scope) {
                Some(i) => (i + 1)..state.nodes[i].end,
                None => return Ok(Vec::new()),
            },
        };

        Ok(range
            .filter(|&i| tags.iter().any(|t| state.nodes[i].tag.eq_ignore_ascii_case(t)))
            .map(|index| ElementRef {
                generation: state.generation,
                index,
            })
            .collect())
    }

    fn is_attached(&self, element: ElementRef) -> bool {
        self.state.read().resolve(element).is_some()
    }

    fn bounding_box(&self, element: ElementRef) -> Option<Rect> {
        let state = self.state.read();
        state.resolve(element).map(|i| state.layout_box(i))
    }

    fn computed_style(&self, element: ElementRef) -> Option<ComputedStyle> {
        let state = self.state.read();
        state.resolve(element).map(|i| state.effective_style(i))
    }

    fn text_content(&self, element: ElementRef) -> Option<String> {
        let state = self.state.read();
        let index = state.resolve(element)?;
        Some(state.nodes[index..state.nodes[index].end].iter().map(|n| n.text.as_str()).collect())
    }

    fn dispatch(&self, element: ElementRef, event: &PointerEvent) -> Result<bool, PageError> {
        let mut state = self.state.write();
        if !state.loaded {
            return Err(PageError::Unavailable);
        }
        let Some(target) = state.resolve(element) else {
            return Ok(false);
        };

        let path: Vec<usize> = if event.bubbles {
            state.ancestors_and_self(target).collect()
        } else {
            vec![target]
        };

        // Only over/move carry the tooltip handler; enter is delivered and ignored.
        if event.kind == PointerKind::Enter {
            return Ok(false);
        }

        let reveals: Vec<String> = path
            .into_iter()
            .filter(|&i| state.layout_box(i).contains(event.point))
            .filter_map(|i| state.nodes[i].on_hover.clone())
            .collect();

        let mut fired = false;
        for id in reveals {
            fired |= state.reveal(&id);
        }
        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Point;

    fn chart_page() -> PageNode {
        PageNode::new("body").rect(0.0, 0.0, 800.0, 600.0).children([
            PageNode::new("svg").rect(0.0, 0.0, 400.0, 300.0).child(
                PageNode::new("rect").id("bar").rect(100.0, 50.0, 20.0, 100.0).on_hover("tip"),
            ),
            PageNode::new("div").display("none").child(
                PageNode::new("table")
                    .id("tip")
                    .rect(10.0, 10.0, 120.0, 40.0)
                    .child(PageNode::new("tr").text("a").child(PageNode::new("td").text("b"))),
            ),
        ])
    }

    #[test]
    fn test_query_all_in_document_order() {
        let page = PageTree::from_root(chart_page());
        let all = page.query_all(None, &["svg", "table", "rect"]).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1], page.element_by_id("bar").unwrap());
    }

    #[test]
    fn test_scoped_query_excludes_scope_itself() {
        let page = PageTree::from_root(chart_page());
        let svg = page.query_all(None, &["svg"]).unwrap()[0];
        assert_eq!(page.query_all(Some(svg), &["svg"]).unwrap().len(), 0);
        assert_eq!(page.query_all(Some(svg), &["rect"]).unwrap().len(), 1);
    }

    #[test]
    fn test_hidden_ancestor_hides_descendant() {
        let page = PageTree::from_root(chart_page());
        let table = page.element_by_id("tip").unwrap();
        let style = page.computed_style(table).unwrap();
        assert!(!style.is_rendered());
        assert!(page.bounding_box(table).unwrap().is_empty());
    }

    #[test]
    fn test_text_content_concatenates_subtree() {
        let page = PageTree::from_root(chart_page());
        let table = page.element_by_id("tip").unwrap();
        assert_eq!(page.text_content(table).unwrap(), "ab");
    }

    #[test]
    fn test_reload_detaches_old_references() {
        let page = PageTree::from_root(chart_page());
        let bar = page.element_by_id("bar").unwrap();
        assert!(page.is_attached(bar));

        page.load(chart_page());
        assert!(!page.is_attached(bar));
        assert!(page.bounding_box(bar).is_none());
    }

    #[test]
    fn test_set_text_keeps_references() {
        let page = PageTree::from_root(chart_page());
        let tip = page.element_by_id("tip").unwrap();
        assert!(page.set_text("tip", "x"));
        assert!(page.is_attached(tip));
        assert_eq!(page.text_content(tip).unwrap(), "xab");
        assert!(!page.set_text("missing", "x"));
    }

    #[test]
    fn test_unloaded_page_fails_queries() {
        let page = PageTree::from_root(chart_page());
        page.unload();
        assert!(matches!(page.query_all(None, &["svg"]), Err(PageError::Unavailable)));
    }

    #[test]
    fn test_hover_inside_box_reveals_target() {
        let page = PageTree::from_root(PageNode::new("body").children([
            PageNode::new("rect").id("bar").rect(100.0, 50.0, 20.0, 100.0).on_hover("tip"),
            PageNode::new("table").id("tip").rect(0.0, 0.0, 10.0, 10.0).display("none"),
        ]));
        let bar = page.element_by_id("bar").unwrap();
        let tip = page.element_by_id("tip").unwrap();

        // exactly on the right edge misses
        let edge = PointerEvent::new(PointerKind::Move, Point::new(120.0, 100.0));
        assert!(!page.dispatch(bar, &edge).unwrap());
        assert!(!page.computed_style(tip).unwrap().is_rendered());

        let inside = PointerEvent::new(PointerKind::Move, Point::new(119.0, 100.0));
        assert!(page.dispatch(bar, &inside).unwrap());
        assert!(page.computed_style(tip).unwrap().is_rendered());
    }

    #[test]
    fn test_over_bubbles_to_ancestor_handler() {
        let page = PageTree::from_root(PageNode::new("body").children([
            PageNode::new("svg").rect(0.0, 0.0, 400.0, 300.0).on_hover("tip").child(
                PageNode::new("rect").id("bar").rect(100.0, 50.0, 20.0, 100.0),
            ),
            PageNode::new("table").id("tip").display("none"),
        ]));
        let bar = page.element_by_id("bar").unwrap();

        let enter = PointerEvent::new(PointerKind::Enter, Point::new(119.0, 100.0));
        assert!(!page.dispatch(bar, &enter).unwrap());

        let over = PointerEvent::new(PointerKind::Over, Point::new(119.0, 100.0));
        assert!(page.dispatch(bar, &over).unwrap());
    }
}
