//! Thresholds, alarm edges and alarm playback.
//!
//! ```text
//! DataSnapshot ──▶ ThresholdEngine::evaluate_all() ──▶ ThresholdResult per key
//!                                                          │
//!                      AlarmEdgeDetector::process() ◀──────┘
//!                                │
//!                                ▼
//!                     triggered keys ──▶ AlarmSink::sound()
//! ```

pub mod edge;
pub mod sink;
pub mod threshold;

pub use edge::{AlarmEdgeDetector, AlarmState};
pub use sink::{AlarmSink, RecordingSink, Silent, TerminalBell};
pub use threshold::{coerce_number, is_above, parse_threshold, ThresholdEngine, ThresholdResult, ThresholdSpec};
