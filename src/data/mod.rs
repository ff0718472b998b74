//! Extracted data and change detection.
//!
//! ## Submodules
//!
//! - [`value`]: cell values ([`DataValue`], [`OhlcFields`]) and text classification
//! - [`snapshot`]: one extraction ([`DataSnapshot`])
//! - [`change`]: comparison against the last accepted snapshot
//!
//! ## Data Flow
//!
//! ```text
//! tooltip cell text
//!        │
//!        ▼
//! parse_cell_value()  ──▶  DataValue
//!        │
//!        ▼
//! DataSnapshot (key → DataValue, timestamp)
//!        │
//!        ▼
//! has_changed(next, previous)  ──▶  publish / drop
//! ```

pub mod change;
pub mod snapshot;
pub mod value;

pub use change::has_changed;
pub use snapshot::{now_millis, DataSnapshot};
pub use value::{format_magnitude, parse_cell_value, DataValue, OhlcFields};
