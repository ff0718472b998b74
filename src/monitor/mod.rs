//! Per-tab monitoring: the extraction loop, its health and the task that runs it.

pub mod health;
pub mod pipeline;
pub mod service;

pub use health::{Fault, HealthReport, HealthStatus, HealthTracker};
pub use pipeline::{CycleOutcome, Diagnostics, LoopState, Monitor, MonitorBuilder, MonitorStatus, Timing};
pub use service::{Command, MonitorHandle, MonitorService};
