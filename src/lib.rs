//! # chartwatch
//!
//! Watches indicator readings on a rendered chart page, compares them with
//! user thresholds, and raises an alarm when a reading crosses its threshold.
//!
//! The readings only appear in a tooltip while the pointer rests over the
//! chart, so each monitor hovers a known plot element, waits for the tooltip
//! to render, and reads its key/value table.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  ┌────────┐  hover   ┌─────────┐  snapshot  ┌─────────┐           │
//! │  │  page  │◀─────────│ extract │───────────▶│ monitor │── alarm   │
//! │  │ (DOM)  │─────────▶│(locate, │            │ (cycle) │   sink    │
//! │  └────────┘  table   │ parse)  │            └───┬─┬───┘           │
//! │                      └─────────┘     thresholds │ │ DataUpdate    │
//! │                                      & settings │ │ ThresholdBreach
//! │                      ┌─────────┐                ▼ ▼               │
//! │                      │  store  │◀───────────  ┌─────┐  ┌───────┐  │
//! │                      └─────────┘              │ bus │─▶│  app  │  │
//! │                                               └─────┘  │ + ui  │  │
//! │                                 control messages ▲     └───┬───┘  │
//! │                                                  └─────────┘      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`page`]**: the document model a monitor reads ([`Page`] trait) with an
//!   in-memory [`PageTree`] loaded from JSON fixtures
//! - **[`extract`]**: target location with fallbacks, pointer event synthesis,
//!   tooltip table parsing and the element cache
//! - **[`data`]**: typed cell values, snapshots and change detection
//! - **[`alarm`]**: threshold parsing and evaluation, rising-edge alarms and
//!   alarm playback
//! - **[`store`]**: async key/value storage, batched writes and per-tab settings
//! - **[`monitor`]**: the per-tab extraction loop, its health and its actor
//! - **[`bus`]**: messages between monitors and the panel, control routing and
//!   panel window tracking
//! - **[`app`]**, **[`events`]**, **[`ui`]**: the terminal side panel
//!
//! ## Usage
//!
//! ```bash
//! # Watch one page fixture, keeping settings in a file
//! chartwatch --page chart.json --store chartwatch-store.json
//!
//! # Print one extraction as JSON and exit
//! chartwatch --page chart.json --once
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::sync::Arc;
//! use chartwatch::{sample_chart, ChannelBus, MemoryStore, Monitor, MonitorService, PageTree};
//!
//! # tokio_test::block_on(async {
//! let page = Arc::new(PageTree::from_root(sample_chart(&[("RSI", "71.5")])));
//! let (bus, mut updates) = ChannelBus::create(16);
//!
//! let monitor = Monitor::builder(1)
//!     .page(page)
//!     .storage(Arc::new(MemoryStore::new()))
//!     .bus(Arc::new(bus))
//!     .build()
//!     .unwrap();
//! let (handle, _task) = MonitorService::spawn(monitor);
//!
//! handle.set_threshold("RSI", "70", false).await.unwrap();
//! let update = updates.recv().await.unwrap();
//! assert_eq!(update.message.action(), "dataUpdate");
//! # handle.shutdown().await.unwrap();
//! # });
//! ```

pub mod alarm;
pub mod app;
pub mod bus;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod extract;
pub mod logging;
pub mod monitor;
pub mod page;
pub mod store;
pub mod ui;

// Re-export main types for convenience
pub use alarm::{AlarmEdgeDetector, AlarmSink, TerminalBell, ThresholdEngine, ThresholdResult, ThresholdSpec};
pub use app::App;
pub use bus::{Background, Bus, ChannelBus, ControlRouter, Envelope, Message, Response};
pub use config::Settings;
pub use data::{DataSnapshot, DataValue};
pub use error::{BuildError, CycleError, MonitorError, PageError, StoreError, ThresholdError, ValidationError};
pub use extract::{EventSynthesizer, TableParser, TargetLocator};
pub use monitor::{HealthStatus, Monitor, MonitorHandle, MonitorService, MonitorStatus};
pub use page::{sample_chart, Page, PageTree};
pub use store::{FileStore, MemoryStore, Storage, TabId, TabSettings};
