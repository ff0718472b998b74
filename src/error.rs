//! Error types for the monitoring pipeline and its collaborators.
//!
//! Only [`CycleError`] counts towards the monitor's circuit breaker; every
//! other error is recovered where it occurs.

use thiserror::Error;

use crate::extract::LocatorDiagnostics;

/// Errors raised by a [`Page`](crate::page::Page) implementation.
#[derive(Debug, Error)]
pub enum PageError {
    /// No document is loaded (navigated away, fixture missing).
    #[error("page is not available")]
    Unavailable,

    /// A page fixture could not be read or decoded.
    #[error("failed to load page fixture: {0}")]
    Fixture(String),
}

/// Why the hover target could not be located.
#[derive(Debug, Error)]
pub enum LocateFailure {
    /// The page is there but no strategy produced a target. The monitor
    /// skips the cycle.
    #[error("no hover target found ({0})")]
    NotFound(LocatorDiagnostics),

    #[error(transparent)]
    Page(#[from] PageError),
}

/// Errors raised by a [`Storage`](crate::store::Storage) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be encoded or decoded.
    #[error("storage encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// A threshold input that does not follow the accepted grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid threshold {input:?}: {reason}")]
pub struct ValidationError {
    /// The raw text the user entered.
    pub input: String,
    /// Human-readable reason, suitable for inline display.
    pub reason: String,
}

impl ValidationError {
    pub(crate) fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors from setting or clearing a threshold.
#[derive(Debug, Error)]
pub enum ThresholdError {
    /// The input was rejected; stored thresholds are unchanged.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The threshold could not be persisted; nothing was committed.
    #[error("failed to persist thresholds: {0}")]
    Storage(#[from] StoreError),
}

/// Transient messaging failures. Publication degrades to storage only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommsError {
    /// The receiving end is gone.
    #[error("receiving end does not exist")]
    Disconnected,

    /// The receiving end is not keeping up.
    #[error("message channel is full")]
    Full,
}

/// A failure inside one monitoring cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Errors from assembling a monitor in [`MonitorBuilder`](crate::monitor::MonitorBuilder).
#[derive(Debug, Error)]
pub enum BuildError {
    /// A required collaborator was not supplied.
    #[error("monitor is missing its {0} collaborator")]
    Missing(&'static str),

    /// A setting is outside its accepted range or malformed.
    #[error("invalid setting `{name}`: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// Errors from talking to a running monitor through its handle.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The monitor task has shut down.
    #[error("monitor task is no longer running")]
    Closed,

    #[error(transparent)]
    Threshold(#[from] ThresholdError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}
