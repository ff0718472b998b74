//! Finding the chart element to hover.
//!
//! The primary strategy follows a structural path such as `svg[5]/rect[13]`:
//! the 5th chart container in the document, then the 13th mark inside it.
//! When the chart layout shifts the path stops resolving, so the locator falls
//! back in order:
//!
//! 1. the structural query again (the chart may have finished rendering)
//! 2. the first container with at least N marks, taking its Nth mark, where N
//!    is the mark index of the path
//! 3. the first container with at least two marks, taking its 2nd mark

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CacheKey, ElementCache};
use crate::error::{LocateFailure, PageError};
use crate::page::{ElementRef, Page};

/// Default structural path to the hover target.
pub const DEFAULT_TARGET_PATH: &str = "svg[5]/rect[13]";

/// Which strategy produced a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    Structural,
    StructuralRetry,
    DenseContainer,
    AnyContainer,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Structural => "structural",
            Strategy::StructuralRetry => "structural-retry",
            Strategy::DenseContainer => "dense-container",
            Strategy::AnyContainer => "any-container",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `tag[index]` step of a structural path. Indexes are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub tag: String,
    pub index: usize,
}

/// A path of `tag[index]` steps, each matched among the descendants of the
/// previous step's element in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralPath {
    steps: Vec<PathStep>,
}

impl StructuralPath {
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Tag of the chart container (first step).
    pub fn container_tag(&self) -> &str {
        &self.steps[0].tag
    }

    /// Tag of the hoverable mark (last step).
    pub fn mark_tag(&self) -> &str {
        &self.steps[self.steps.len() - 1].tag
    }

    /// Index of the mark within its container (last step).
    pub fn mark_index(&self) -> usize {
        self.steps[self.steps.len() - 1].index
    }

    fn resolve(&self, page: &dyn Page) -> Result<Option<ElementRef>, PageError> {
        let mut scope = None;
        for step in &self.steps {
            let matches = page.query_all(scope, &[step.tag.as_str()])?;
            match matches.get(step.index - 1) {
                Some(element) => scope = Some(*element),
                None => return Ok(None),
            }
        }
        Ok(scope)
    }
}

impl Default for StructuralPath {
    /// `svg[5]/rect[13]`
    fn default() -> Self {
        Self {
            steps: vec![
                PathStep {
                    tag: "svg".to_string(),
                    index: 5,
                },
                PathStep {
                    tag: "rect".to_string(),
                    index: 13,
                },
            ],
        }
    }
}

impl FromStr for StructuralPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let steps = s
            .split('/')
            .map(|step| {
                let step = step.trim();
                let (tag, rest) = step
                    .split_once('[')
                    .ok_or_else(|| format!("step {step:?} is not tag[index]"))?;
                let index: usize = rest
                    .strip_suffix(']')
                    .and_then(|n| n.parse().ok())
                    .filter(|n| *n >= 1)
                    .ok_or_else(|| format!("step {step:?} needs a positive index"))?;
                if tag.is_empty() {
                    return Err(format!("step {step:?} has no tag"));
                }
                Ok(PathStep {
                    tag: tag.to_ascii_lowercase(),
                    index,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;

        if steps.len() < 2 {
            return Err("path needs a container step and a mark step".to_string());
        }
        Ok(Self { steps })
    }
}

impl fmt::Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self.steps.iter().map(|s| format!("{}[{}]", s.tag, s.index)).collect();
        f.write_str(&steps.join("/"))
    }
}

/// A located hover target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located {
    pub element: ElementRef,
    pub strategy: Strategy,
    /// True when served from the element cache.
    pub cached: bool,
}

/// What the page looked like when the locator ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorDiagnostics {
    pub path: String,
    pub container_count: usize,
    /// Marks inside each container, in document order.
    pub marks_per_container: Vec<usize>,
    pub primary_resolved: bool,
}

impl fmt::Display for LocatorDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "path {} resolved={}, {} containers, marks {:?}",
            self.path, self.primary_resolved, self.container_count, self.marks_per_container
        )
    }
}

/// Finds the element whose hover makes the tooltip render.
#[derive(Debug, Clone, Default)]
pub struct TargetLocator {
    path: StructuralPath,
}

impl TargetLocator {
    pub fn new(path: StructuralPath) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &StructuralPath {
        &self.path
    }

    /// Locate the hover target, using and refreshing the cache.
    pub fn locate(&self, page: &dyn Page, cache: &mut ElementCache) -> Result<Located, LocateFailure> {
        if let Some(entry) = cache.get(CacheKey::TargetElement, page) {
            if let (Some(element), Some(strategy)) = (entry.elements.first(), entry.strategy) {
                return Ok(Located {
                    element: *element,
                    strategy,
                    cached: true,
                });
            }
        }

        match self.search(page)? {
            Some((element, strategy)) => {
                debug!(strategy = %strategy, "hover target located");
                cache.insert(CacheKey::TargetElement, vec![element], Some(strategy));
                Ok(Located {
                    element,
                    strategy,
                    cached: false,
                })
            }
            None => {
                let diagnostics = self.diagnose(page)?;
                debug!(%diagnostics, "hover target not found");
                Err(LocateFailure::NotFound(diagnostics))
            }
        }
    }

    fn search(&self, page: &dyn Page) -> Result<Option<(ElementRef, Strategy)>, PageError> {
        if let Some(element) = self.path.resolve(page)? {
            return Ok(Some((element, Strategy::Structural)));
        }
        if let Some(element) = self.path.resolve(page)? {
            return Ok(Some((element, Strategy::StructuralRetry)));
        }
        if let Some(element) = self.nth_mark_of_first_container(page, self.path.mark_index())? {
            return Ok(Some((element, Strategy::DenseContainer)));
        }
        if let Some(element) = self.nth_mark_of_first_container(page, 2)? {
            return Ok(Some((element, Strategy::AnyContainer)));
        }
        Ok(None)
    }

    /// The `n`th mark of the first container holding at least `n` marks.
    fn nth_mark_of_first_container(&self, page: &dyn Page, n: usize) -> Result<Option<ElementRef>, PageError> {
        for container in page.query_all(None, &[self.path.container_tag()])? {
            let marks = page.query_all(Some(container), &[self.path.mark_tag()])?;
            if marks.len() >= n {
                return Ok(Some(marks[n - 1]));
            }
        }
        Ok(None)
    }

    /// Describe the chart structure. Never affects locating.
    pub fn diagnose(&self, page: &dyn Page) -> Result<LocatorDiagnostics, PageError> {
        let containers = page.query_all(None, &[self.path.container_tag()])?;
        let marks_per_container = containers
            .iter()
            .map(|c| page.query_all(Some(*c), &[self.path.mark_tag()]).map(|m| m.len()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LocatorDiagnostics {
            path: self.path.to_string(),
            container_count: containers.len(),
            marks_per_container,
            primary_resolved: self.path.resolve(page)?.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{PageNode, PageTree};

    fn chart(container_marks: &[usize]) -> PageNode {
        PageNode::new("body").children(container_marks.iter().enumerate().map(|(c, &marks)| {
            PageNode::new("svg").children(
                (1..=marks).map(move |m| PageNode::new("rect").id(&format!("c{}m{}", c + 1, m))),
            )
        }))
    }

    #[test]
    fn test_parse_path() {
        let path: StructuralPath = "svg[5]/rect[13]".parse().unwrap();
        assert_eq!(path.container_tag(), "svg");
        assert_eq!(path.mark_tag(), "rect");
        assert_eq!(path.mark_index(), 13);
        assert_eq!(path.to_string(), "svg[5]/rect[13]");
    }

    #[test]
    fn test_default_path_matches_constant() {
        assert_eq!(StructuralPath::default().to_string(), DEFAULT_TARGET_PATH);
    }

    #[test]
    fn test_parse_path_rejects_bad_input() {
        assert!("svg[5]".parse::<StructuralPath>().is_err());
        assert!("svg[0]/rect[1]".parse::<StructuralPath>().is_err());
        assert!("svg/rect[1]".parse::<StructuralPath>().is_err());
        assert!("[1]/rect[1]".parse::<StructuralPath>().is_err());
    }

    #[test]
    fn test_primary_path_resolves() {
        let page = PageTree::from_root(chart(&[1, 1, 1, 1, 20]));
        let mut cache = ElementCache::default();
        let located = TargetLocator::default().locate(&page, &mut cache).unwrap();

        assert_eq!(located.strategy, Strategy::Structural);
        assert_eq!(located.element, page.element_by_id("c5m13").unwrap());
    }

    #[test]
    fn test_dense_container_fallback_takes_nth_mark() {
        // only two containers, the second one has enough marks
        let page = PageTree::from_root(chart(&[3, 15]));
        let mut cache = ElementCache::default();
        let located = TargetLocator::default().locate(&page, &mut cache).unwrap();

        assert_eq!(located.strategy, Strategy::DenseContainer);
        assert_eq!(located.element, page.element_by_id("c2m13").unwrap());
    }

    #[test]
    fn test_any_container_fallback_takes_second_mark() {
        let page = PageTree::from_root(chart(&[1, 4]));
        let mut cache = ElementCache::default();
        let located = TargetLocator::default().locate(&page, &mut cache).unwrap();

        assert_eq!(located.strategy, Strategy::AnyContainer);
        assert_eq!(located.element, page.element_by_id("c2m2").unwrap());
    }

    #[test]
    fn test_not_found_carries_diagnostics() {
        let page = PageTree::from_root(chart(&[1, 0]));
        let mut cache = ElementCache::default();
        let err = TargetLocator::default().locate(&page, &mut cache).unwrap_err();

        let LocateFailure::NotFound(diagnostics) = err else {
            panic!("expected NotFound");
        };
        assert_eq!(diagnostics.container_count, 2);
        assert_eq!(diagnostics.marks_per_container, vec![1, 0]);
        assert!(!diagnostics.primary_resolved);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unloaded_page_is_a_page_error() {
        let page = PageTree::new();
        let mut cache = ElementCache::default();
        let err = TargetLocator::default().locate(&page, &mut cache).unwrap_err();
        assert!(matches!(err, LocateFailure::Page(PageError::Unavailable)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_target_reused_until_detached() {
        let page = PageTree::from_root(chart(&[1, 15]));
        let mut cache = ElementCache::default();
        let locator = TargetLocator::default();

        let first = locator.locate(&page, &mut cache).unwrap();
        assert!(!first.cached);
        let second = locator.locate(&page, &mut cache).unwrap();
        assert!(second.cached);
        assert_eq!(second.strategy, Strategy::DenseContainer);

        page.load(chart(&[1, 15]));
        let third = locator.locate(&page, &mut cache).unwrap();
        assert!(!third.cached);
        assert_ne!(third.element, first.element);
    }
}
