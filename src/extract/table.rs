//! Tooltip table parsing.

use tracing::trace;

use super::{CacheKey, ElementCache};
use crate::data::{now_millis, parse_cell_value, DataSnapshot};
use crate::error::PageError;
use crate::page::{ElementRef, Page};

/// Keys that label a table rather than a reading.
const GENERIC_KEYS: &[&str] = &["header", "title", "name", "label"];

/// Bullet markers the chart prints in front of series names.
const BULLETS: &[char] = &['●', '•'];

pub const DEFAULT_VOCABULARY: &[&str] = &["Stock Price", "Volume", "Market Cap", "P/E Ratio"];

pub const DEFAULT_KEY_TOKENS: &[&str] = &[
    "MA", "EMA", "SMA", "RSI", "MACD", "ATR", "VWAP", "Signal", "Ratio", "Index", "Trend",
];

/// Strip bullet markers and collapse whitespace.
pub fn normalize_key(text: &str) -> String {
    text.replace(BULLETS, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decides which row keys are indicator readings.
///
/// A key is accepted when it equals a vocabulary entry (ignoring case) or
/// contains one of the indicator tokens. Empty and generic header keys are
/// always rejected.
#[derive(Debug, Clone)]
pub struct KeyFilter {
    vocabulary: Vec<String>,
    tokens: Vec<String>,
}

impl Default for KeyFilter {
    fn default() -> Self {
        Self::new(
            DEFAULT_VOCABULARY.iter().map(|s| s.to_string()).collect(),
            DEFAULT_KEY_TOKENS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl KeyFilter {
    pub fn new(vocabulary: Vec<String>, tokens: Vec<String>) -> Self {
        Self { vocabulary, tokens }
    }

    pub fn accepts(&self, key: &str) -> bool {
        if key.is_empty() || GENERIC_KEYS.iter().any(|g| key.eq_ignore_ascii_case(g)) {
            return false;
        }
        self.vocabulary.iter().any(|v| key.eq_ignore_ascii_case(v))
            || self.tokens.iter().any(|t| key.contains(t.as_str()))
    }
}

/// Turns the visible tooltip tables into a [`DataSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct TableParser {
    filter: KeyFilter,
}

impl TableParser {
    pub fn new(filter: KeyFilter) -> Self {
        Self { filter }
    }

    /// Extract all accepted rows from the visible tables under `root` (the
    /// whole document when `None`). Later tables overwrite earlier keys.
    pub fn extract(
        &self,
        page: &dyn Page,
        root: Option<ElementRef>,
        cache: &mut ElementCache,
    ) -> Result<DataSnapshot, PageError> {
        let mut snapshot = DataSnapshot::new(now_millis());
        for table in self.visible_tables(page, root, cache)? {
            snapshot.merge(self.parse_table(page, table)?);
        }
        Ok(snapshot)
    }

    /// Tables with a non-empty box that are neither `display: none` nor
    /// hidden. Non-empty results are cached.
    pub fn visible_tables(
        &self,
        page: &dyn Page,
        root: Option<ElementRef>,
        cache: &mut ElementCache,
    ) -> Result<Vec<ElementRef>, PageError> {
        if let Some(entry) = cache.get(CacheKey::VisibleTables, page) {
            return Ok(entry.elements.clone());
        }

        let tables: Vec<ElementRef> = page
            .query_all(root, &["table"])?
            .into_iter()
            .filter(|t| is_visible(page, *t))
            .collect();

        if !tables.is_empty() {
            cache.insert(CacheKey::VisibleTables, tables.clone(), None);
        }
        Ok(tables)
    }

    /// Rows with at least two cells: first cell is the key, second the value.
    pub fn parse_table(&self, page: &dyn Page, table: ElementRef) -> Result<DataSnapshot, PageError> {
        let mut snapshot = DataSnapshot::new(now_millis());

        for row in page.query_all(Some(table), &["tr"])? {
            let cells = page.query_all(Some(row), &["td", "th"])?;
            let [key_cell, value_cell, ..] = cells.as_slice() else {
                continue;
            };

            let key = normalize_key(&page.text_content(*key_cell).unwrap_or_default());
            let value_text = page.text_content(*value_cell).unwrap_or_default();
            if value_text.trim().is_empty() || !self.filter.accepts(&key) {
                trace!(key = %key, "row skipped");
                continue;
            }
            snapshot.insert(key, parse_cell_value(&value_text));
        }

        Ok(snapshot)
    }
}

fn is_visible(page: &dyn Page, element: ElementRef) -> bool {
    let has_area = page.bounding_box(element).is_some_and(|r| !r.is_empty());
    let rendered = page.computed_style(element).is_some_and(|s| s.is_rendered());
    has_area && rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataValue, OhlcFields};
    use crate::page::{PageNode, PageTree};

    fn row(key: &str, value: &str) -> PageNode {
        PageNode::new("tr").children([PageNode::new("td").text(key), PageNode::new("td").text(value)])
    }

    fn table(rows: impl IntoIterator<Item = PageNode>) -> PageNode {
        PageNode::new("table").rect(10.0, 10.0, 200.0, 80.0).children(rows)
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("● RSI   14 "), "RSI 14");
        assert_eq!(normalize_key("•Volume"), "Volume");
        assert_eq!(normalize_key("Stock\n  Price"), "Stock Price");
    }

    #[test]
    fn test_key_filter() {
        let filter = KeyFilter::default();
        assert!(filter.accepts("Stock Price"));
        assert!(filter.accepts("stock price"));
        assert!(filter.accepts("RSI 14"));
        assert!(filter.accepts("EMA (20)"));
        assert!(!filter.accepts(""));
        assert!(!filter.accepts("Title"));
        assert!(!filter.accepts("LABEL"));
        assert!(!filter.accepts("Date"));
    }

    #[test]
    fn test_extract_parses_tooltip_rows() {
        let page = PageTree::from_root(PageNode::new("body").child(table([
            row("● Stock Price", "Open: 10 High: 12 Low: 9 Close: 11"),
            row("RSI 14", "55.2"),
            row("Volume", "1.5k"),
            row("Title", "ignored"),
            row("MACD", "  "),
            PageNode::new("tr").child(PageNode::new("td").text("lonely cell")),
        ])));

        let snapshot = TableParser::default()
            .extract(&page, None, &mut ElementCache::default())
            .unwrap();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(
            snapshot.get("Stock Price"),
            Some(&DataValue::Fields(OhlcFields {
                open: Some(10.0),
                high: Some(12.0),
                low: Some(9.0),
                close: Some(11.0),
            }))
        );
        assert_eq!(snapshot.get("RSI 14"), Some(&DataValue::Number(55.2)));
        assert_eq!(snapshot.get("Volume"), Some(&DataValue::Number(1500.0)));
    }

    #[test]
    fn test_invisible_tables_never_contribute() {
        let page = PageTree::from_root(PageNode::new("body").children([
            table([row("RSI", "1")]).display("none"),
            table([row("EMA", "2")]).visibility("hidden"),
            PageNode::new("table").child(row("SMA", "3")),
            PageNode::new("div")
                .display("none")
                .child(table([row("MACD", "4")])),
        ]));

        let snapshot = TableParser::default()
            .extract(&page, None, &mut ElementCache::default())
            .unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_later_tables_win() {
        let page = PageTree::from_root(PageNode::new("body").children([
            table([row("RSI", "40"), row("EMA", "1.0")]),
            table([row("RSI", "60")]),
        ]));

        let snapshot = TableParser::default()
            .extract(&page, None, &mut ElementCache::default())
            .unwrap();
        assert_eq!(snapshot.get("RSI"), Some(&DataValue::Number(60.0)));
        assert_eq!(snapshot.get("EMA"), Some(&DataValue::Number(1.0)));
    }

    #[test]
    fn test_header_cells_count_as_cells() {
        let page = PageTree::from_root(PageNode::new("body").child(table([PageNode::new("tr")
            .children([PageNode::new("th").text("RSI"), PageNode::new("td").text("N/A")])])));

        let snapshot = TableParser::default()
            .extract(&page, None, &mut ElementCache::default())
            .unwrap();
        assert_eq!(snapshot.get("RSI"), Some(&DataValue::Text("N/A".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_non_empty_table_lists_are_cached() {
        let page = PageTree::from_root(PageNode::new("body").child(table([row("RSI", "1")]).display("none")));
        let parser = TableParser::default();
        let mut cache = ElementCache::default();

        assert!(parser.visible_tables(&page, None, &mut cache).unwrap().is_empty());
        assert!(cache.is_empty());

        page.load(PageNode::new("body").child(table([row("RSI", "1")])));
        assert_eq!(parser.visible_tables(&page, None, &mut cache).unwrap().len(), 1);
        assert_eq!(cache.len(), 1);
    }
}
