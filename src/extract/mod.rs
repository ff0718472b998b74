//! Reading the tooltip: locate the chart target, hover it, parse the tables.
//!
//! ```text
//! TargetLocator::locate()  ──▶  EventSynthesizer::hover()
//!                                        │
//!                                 (settle delay)
//!                                        ▼
//!                             TableParser::extract()  ──▶  DataSnapshot
//! ```
//!
//! Both the located target and the visible table list are kept in an
//! [`ElementCache`] for a few seconds.

pub mod cache;
pub mod locator;
pub mod synth;
pub mod table;

pub use cache::{CacheEntry, CacheKey, ElementCache, DEFAULT_CACHE_TTL};
pub use locator::{
    Located, LocatorDiagnostics, PathStep, Strategy, StructuralPath, TargetLocator,
    DEFAULT_TARGET_PATH,
};
pub use synth::{target_point, EventSynthesizer, DEFAULT_HOVER_INSET, HOVER_INSET_RANGE};
pub use table::{normalize_key, KeyFilter, TableParser, DEFAULT_KEY_TOKENS, DEFAULT_VOCABULARY};
