//! JSON page fixtures and a watcher that reloads them into a [`PageTree`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{PageTree, Rect};
use crate::error::PageError;

/// Inline style of a fixture node. Absent values inherit or default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
}

/// One element of a page fixture.
///
/// `on_hover` names the `id` of an element that becomes visible when a
/// pointer-over or pointer-move lands inside this element's box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageNode {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub style: NodeStyle,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_hover: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PageNode>,
}

impl PageNode {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            id: None,
            rect: Rect::default(),
            style: NodeStyle::default(),
            text: String::new(),
            on_hover: None,
            children: Vec::new(),
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Rect::new(x, y, width, height);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn display(mut self, display: &str) -> Self {
        self.style.display = Some(display.to_string());
        self
    }

    pub fn visibility(mut self, visibility: &str) -> Self {
        self.style.visibility = Some(visibility.to_string());
        self
    }

    pub fn on_hover(mut self, target_id: &str) -> Self {
        self.on_hover = Some(target_id.to_string());
        self
    }

    pub fn child(mut self, child: PageNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = PageNode>) -> Self {
        self.children.extend(children);
        self
    }
}

/// A chart page shaped like the one the default target path expects: five
/// `svg` containers, the fifth holding thirteen `rect` marks. Hovering the
/// 13th mark reveals the tooltip table `tooltip`. Each row's value cell has
/// the id `value-<n>` (1-based) so it can be updated in place.
pub fn sample_chart(rows: &[(&str, &str)]) -> PageNode {
    let small_charts = (0..4).map(|c| {
        PageNode::new("svg")
            .rect(0.0, c as f64 * 60.0, 200.0, 50.0)
            .children((0..2).map(move |m| PageNode::new("rect").rect(m as f64 * 20.0, c as f64 * 60.0, 20.0, 50.0)))
    });

    let marks = (1..=13).map(|m| {
        let mark = PageNode::new("rect").rect(200.0 + (m - 1) as f64 * 40.0, 300.0, 40.0, 200.0);
        if m == 13 {
            mark.id("hover-target").on_hover("tooltip")
        } else {
            mark
        }
    });
    let main_chart = PageNode::new("svg").rect(200.0, 300.0, 520.0, 200.0).children(marks);

    let table_rows = rows.iter().enumerate().map(|(i, (key, value))| {
        PageNode::new("tr").children([
            PageNode::new("td").text(key),
            PageNode::new("td").id(&format!("value-{}", i + 1)).text(value),
        ])
    });
    let tooltip = PageNode::new("table")
        .id("tooltip")
        .rect(740.0, 300.0, 220.0, 24.0 * rows.len().max(1) as f64)
        .display("none")
        .children(table_rows);

    PageNode::new("body")
        .rect(0.0, 0.0, 1280.0, 800.0)
        .children(small_charts)
        .child(main_chart)
        .child(tooltip)
}

/// Read and decode a fixture file.
pub fn load_fixture(path: &Path) -> Result<PageNode, PageError> {
    let content = fs::read_to_string(path)
        .map_err(|e| PageError::Fixture(format!("read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| PageError::Fixture(format!("parse {}: {}", path.display(), e)))
}

/// Polls a fixture file and reloads the page when the file changes.
///
/// A missing file unloads the page, which is what a navigation away looks
/// like to the monitor. A file that fails to parse leaves the current page in
/// place.
#[derive(Debug)]
pub struct FixtureWatcher {
    path: PathBuf,
    page: Arc<PageTree>,
    last_modified: Option<SystemTime>,
    last_error: Option<String>,
}

impl FixtureWatcher {
    pub fn new<P: AsRef<Path>>(path: P, page: Arc<PageTree>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            page,
            last_modified: None,
            last_error: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn get_modified_time(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }

    /// Reload the page if the file changed. Returns true when a new document
    /// was loaded.
    pub fn poll(&mut self) -> bool {
        let current_modified = self.get_modified_time();

        let file_changed = match (&self.last_modified, &current_modified) {
            (_, None) => {
                if self.page.is_loaded() {
                    warn!(path = %self.path.display(), "page fixture disappeared, unloading page");
                    self.page.unload();
                }
                self.last_error = Some(format!("Read error: {} is missing", self.path.display()));
                self.last_modified = None;
                return false;
            }
            (None, Some(_)) => true,
            (Some(last), Some(current)) => current > last,
        };

        if !file_changed {
            return false;
        }

        match load_fixture(&self.path) {
            Ok(root) => {
                self.page.load(root);
                self.last_modified = current_modified;
                self.last_error = None;
                debug!(path = %self.path.display(), "page fixture reloaded");
                true
            }
            Err(e) => {
                warn!(error = %e, "keeping previous page");
                self.last_error = Some(e.to_string());
                false
            }
        }
    }

    /// Poll on a fixed interval in a background task.
    pub fn spawn(mut self, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            loop {
                timer.tick().await;
                self.poll();
            }
        })
    }
}
