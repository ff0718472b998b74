//! Cycle bookkeeping and stall detection.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::extract::Strategy;

/// Overall health of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthStatus {
    /// Stopped, or running with recent cycles.
    Healthy,
    /// Running, but the last cycle failed.
    Degraded,
    /// Running with no completed cycle within the stall window.
    Stalled,
}

impl HealthStatus {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "OK",
            HealthStatus::Degraded => "WARN",
            HealthStatus::Stalled => "STALL",
        }
    }
}

/// Why a monitor stopped on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Fault {
    /// Too many cycles failed in a row.
    #[serde(rename_all = "camelCase")]
    RepeatedCycleFailure { failures: u32, last_error: String },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::RepeatedCycleFailure { failures, last_error } => {
                write!(f, "stopped after {failures} failed cycles: {last_error}")
            }
        }
    }
}

/// Point-in-time view of a monitor's cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Cycles completed since the monitor was created, skipped ones included.
    pub cycles: u64,
    pub last_cycle_age_ms: Option<u64>,
    pub consecutive_errors: u32,
    pub last_error: Option<String>,
    pub last_strategy: Option<Strategy>,
}

/// Counts cycles and failures for one monitor.
#[derive(Debug, Default)]
pub struct HealthTracker {
    cycles: u64,
    started: Option<Instant>,
    last_cycle: Option<Instant>,
    consecutive_errors: u32,
    last_error: Option<String>,
    last_strategy: Option<Strategy>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run: failures are forgiven and the stall clock restarts.
    pub fn restart(&mut self) {
        self.started = Some(Instant::now());
        self.consecutive_errors = 0;
        self.last_error = None;
    }

    pub fn record_completed(&mut self) {
        self.cycles += 1;
        self.last_cycle = Some(Instant::now());
        self.consecutive_errors = 0;
    }

    /// Count a failed cycle and return the length of the failure streak.
    pub fn record_failure(&mut self, error: &dyn fmt::Display) -> u32 {
        self.consecutive_errors += 1;
        self.last_error = Some(error.to_string());
        self.consecutive_errors
    }

    pub fn record_strategy(&mut self, strategy: Strategy) {
        self.last_strategy = Some(strategy);
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn report(&self, running: bool, stall_after: Duration) -> HealthReport {
        let now = Instant::now();
        let last_progress = self.last_cycle.max(self.started);
        let stalled = running && last_progress.is_some_and(|t| now.duration_since(t) > stall_after);

        let status = if !running {
            HealthStatus::Healthy
        } else if stalled {
            HealthStatus::Stalled
        } else if self.consecutive_errors > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthReport {
            status,
            cycles: self.cycles,
            last_cycle_age_ms: self.last_cycle.map(|t| now.duration_since(t).as_millis() as u64),
            consecutive_errors: self.consecutive_errors,
            last_error: self.last_error.clone(),
            last_strategy: self.last_strategy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_running_without_cycles_stalls() {
        let mut tracker = HealthTracker::new();
        tracker.restart();
        let stall = Duration::from_secs(3);

        assert_eq!(tracker.report(true, stall).status, HealthStatus::Healthy);

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(tracker.report(true, stall).status, HealthStatus::Stalled);
        assert_eq!(tracker.report(false, stall).status, HealthStatus::Healthy);

        tracker.record_completed();
        let report = tracker.report(true, stall);
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.cycles, 1);
        assert_eq!(report.last_cycle_age_ms, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_streak_resets_on_success() {
        let mut tracker = HealthTracker::new();
        tracker.restart();

        assert_eq!(tracker.record_failure(&"page is not available"), 1);
        assert_eq!(tracker.record_failure(&"page is not available"), 2);
        let report = tracker.report(true, Duration::from_secs(3));
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.last_error.as_deref(), Some("page is not available"));

        tracker.record_completed();
        assert_eq!(tracker.consecutive_errors(), 0);
        assert_eq!(tracker.last_error(), Some("page is not available"));
    }

    #[test]
    fn test_fault_display() {
        let fault = Fault::RepeatedCycleFailure {
            failures: 5,
            last_error: "page is not available".to_string(),
        };
        assert_eq!(fault.to_string(), "stopped after 5 failed cycles: page is not available");
    }
}
