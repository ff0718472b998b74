//! The monitoring loop of one tab.
//!
//! A cycle hovers the chart target when the last hover is stale, waits for
//! the tooltip to settle, extracts the tooltip tables and publishes the
//! snapshot when it differs from the last published one:
//!
//! ```text
//! locate ─▶ hover ─▶ settle ─▶ extract ─▶ changed? ─▶ evaluate ─▶ edges ─▶ publish
//!                                             │
//!                                             └─ no ─▶ done
//! ```
//!
//! [`Monitor`] is driven from outside: the [`service`](super::service) task
//! calls [`Monitor::tick`] on its interval and forwards commands.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::health::{Fault, HealthReport, HealthStatus, HealthTracker};
use crate::alarm::{AlarmEdgeDetector, AlarmSink, Silent, ThresholdEngine, ThresholdResult, ThresholdSpec};
use crate::bus::{BreachRecord, Bus, Message};
use crate::config::Settings;
use crate::data::{has_changed, DataSnapshot};
use crate::error::{BuildError, CycleError, LocateFailure, StoreError, ThresholdError};
use crate::extract::{
    CacheKey, ElementCache, EventSynthesizer, KeyFilter, LocatorDiagnostics, StructuralPath, TableParser,
    TargetLocator, HOVER_INSET_RANGE,
};
use crate::page::Page;
use crate::store::{keys, save, Storage, TabId, TabSettings, WriteBatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopState {
    Stopped,
    Running,
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A changed snapshot was published. `triggered` lists the keys whose
    /// alarm fired.
    Published { items: usize, triggered: Vec<String> },
    /// Same readings as the last published snapshot.
    Unchanged,
    /// No visible tooltip rows.
    Empty,
    /// The hover target could not be found.
    Skipped,
    /// The monitor is stopped.
    Idle,
}

/// Snapshot of a monitor's state for the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub tab: TabId,
    pub state: LoopState,
    pub enabled: bool,
    pub fault: Option<Fault>,
    pub health: HealthReport,
    pub thresholds: usize,
    /// Timestamp of the last published snapshot.
    pub last_update: Option<u64>,
    pub items: usize,
}

impl MonitorStatus {
    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }
}

/// Locator view of the page plus the monitor status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub locator: Option<LocatorDiagnostics>,
    /// Set when the page could not be inspected.
    pub page_error: Option<String>,
    pub status: MonitorStatus,
}

/// Loop timings, taken from [`Settings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub tick: Duration,
    pub settle: Duration,
    pub hover_refresh: Duration,
    pub health_interval: Duration,
    pub stall_after: Duration,
}

impl From<&Settings> for Timing {
    fn from(settings: &Settings) -> Self {
        Self {
            tick: settings.tick(),
            settle: settings.settle(),
            hover_refresh: settings.hover_refresh(),
            health_interval: settings.health_interval(),
            stall_after: settings.stall_after(),
        }
    }
}

/// Assembles a [`Monitor`] from its collaborators.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use chartwatch::bus::ChannelBus;
/// use chartwatch::monitor::Monitor;
/// use chartwatch::page::{sample_chart, PageTree};
/// use chartwatch::store::MemoryStore;
///
/// let (bus, _rx) = ChannelBus::create(16);
/// let monitor = Monitor::builder(1)
///     .page(Arc::new(PageTree::from_root(sample_chart(&[("RSI", "55")]))))
///     .storage(Arc::new(MemoryStore::new()))
///     .bus(Arc::new(bus))
///     .build()
///     .unwrap();
/// assert!(!monitor.is_running());
/// ```
#[derive(Debug)]
pub struct MonitorBuilder {
    tab: TabId,
    page: Option<Arc<dyn Page>>,
    storage: Option<Arc<dyn Storage>>,
    bus: Option<Arc<dyn Bus>>,
    sink: Option<Box<dyn AlarmSink>>,
    settings: Settings,
}

impl MonitorBuilder {
    pub fn new(tab: TabId) -> Self {
        Self {
            tab,
            page: None,
            storage: None,
            bus: None,
            sink: None,
            settings: Settings::default(),
        }
    }

    pub fn page(mut self, page: Arc<dyn Page>) -> Self {
        self.page = Some(page);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn bus(mut self, bus: Arc<dyn Bus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Where alarms are played. Defaults to [`Silent`].
    pub fn alarm_sink(mut self, sink: Box<dyn AlarmSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Result<Monitor, BuildError> {
        let page = self.page.ok_or(BuildError::Missing("page"))?;
        let storage = self.storage.ok_or(BuildError::Missing("storage"))?;
        let bus = self.bus.ok_or(BuildError::Missing("bus"))?;
        let settings = self.settings;

        if !HOVER_INSET_RANGE.contains(&settings.hover_inset_px) {
            return Err(BuildError::InvalidSetting {
                name: "hover_inset_px",
                reason: format!("{} is outside 1 to 2 px", settings.hover_inset_px),
            });
        }
        for (name, value) in [("tick_ms", settings.tick_ms), ("health_ms", settings.health_ms)] {
            if value == 0 {
                return Err(BuildError::InvalidSetting {
                    name,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if settings.max_consecutive_failures == 0 {
            return Err(BuildError::InvalidSetting {
                name: "max_consecutive_failures",
                reason: "must be at least 1".to_string(),
            });
        }
        let path: StructuralPath = settings
            .target_path
            .parse()
            .map_err(|reason| BuildError::InvalidSetting {
                name: "target_path",
                reason,
            })?;

        Ok(Monitor {
            tab: self.tab,
            page,
            storage,
            bus,
            sink: self.sink.unwrap_or_else(|| Box::new(Silent)),
            locator: TargetLocator::new(path),
            synth: EventSynthesizer::new(settings.hover_inset_px),
            parser: TableParser::new(KeyFilter::new(settings.vocabulary.clone(), settings.key_tokens.clone())),
            cache: ElementCache::new(settings.cache_ttl()),
            thresholds: ThresholdEngine::new(self.tab),
            alarms: AlarmEdgeDetector::new(),
            batcher: WriteBatcher::new(settings.batch_window()),
            health: HealthTracker::new(),
            tab_settings: TabSettings::new(self.tab),
            timing: Timing::from(&settings),
            max_failures: settings.max_consecutive_failures,
            state: LoopState::Stopped,
            fault: None,
            current: None,
            previous: None,
            last_hover: None,
        })
    }
}

/// Extraction, change detection, threshold evaluation and publishing for one tab.
#[derive(Debug)]
pub struct Monitor {
    tab: TabId,
    page: Arc<dyn Page>,
    storage: Arc<dyn Storage>,
    bus: Arc<dyn Bus>,
    sink: Box<dyn AlarmSink>,
    locator: TargetLocator,
    synth: EventSynthesizer,
    parser: TableParser,
    cache: ElementCache,
    thresholds: ThresholdEngine,
    alarms: AlarmEdgeDetector,
    batcher: WriteBatcher,
    health: HealthTracker,
    tab_settings: TabSettings,
    timing: Timing,
    max_failures: u32,
    state: LoopState,
    fault: Option<Fault>,
    /// Last published snapshot.
    current: Option<DataSnapshot>,
    /// The snapshot `current` replaced.
    previous: Option<DataSnapshot>,
    last_hover: Option<Instant>,
}

impl Monitor {
    pub fn builder(tab: TabId) -> MonitorBuilder {
        MonitorBuilder::new(tab)
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn is_enabled(&self) -> bool {
        self.tab_settings.enabled
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    pub fn current_data(&self) -> Option<&DataSnapshot> {
        self.current.as_ref()
    }

    pub fn previous_data(&self) -> Option<&DataSnapshot> {
        self.previous.as_ref()
    }

    pub fn thresholds(&self) -> &BTreeMap<String, ThresholdSpec> {
        self.thresholds.all()
    }

    /// Load the thresholds and the enabled flag saved for this tab.
    pub async fn restore(&mut self) -> Result<(), StoreError> {
        self.thresholds = ThresholdEngine::load(&*self.storage, self.tab).await?;
        self.tab_settings = TabSettings::load(&*self.storage, self.tab).await?;
        debug!(
            tab = self.tab,
            thresholds = self.thresholds.len(),
            enabled = self.tab_settings.enabled,
            "tab state restored"
        );
        Ok(())
    }

    /// Start monitoring and run the first cycle. Returns false if already running.
    pub async fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        self.alarms.reset_all();
        self.fault = None;
        self.health.restart();
        self.state = LoopState::Running;
        info!(tab = self.tab, "monitoring started");

        let _ = self.step(true, true).await;
        true
    }

    /// Stop monitoring. Returns false if already stopped.
    pub async fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.halt().await;
        info!(tab = self.tab, "monitoring stopped");
        true
    }

    /// Stop if running and write out pending storage.
    pub async fn shutdown(&mut self) {
        if !self.stop().await {
            self.flush_pending().await;
        }
    }

    async fn halt(&mut self) {
        self.state = LoopState::Stopped;
        self.alarms.reset_all();
        self.cache.clear();
        self.last_hover = None;
        self.flush_pending().await;
    }

    /// Run one scheduled cycle. The hover is repeated once the last one is
    /// older than the refresh interval; otherwise the tooltip is read as is.
    pub async fn tick(&mut self) -> Result<CycleOutcome, CycleError> {
        if !self.is_running() {
            return Ok(CycleOutcome::Idle);
        }
        let hover = self
            .last_hover
            .is_none_or(|at| at.elapsed() >= self.timing.hover_refresh);
        self.step(hover, false).await
    }

    async fn step(&mut self, hover: bool, initial: bool) -> Result<CycleOutcome, CycleError> {
        match self.run_cycle(hover, initial).await {
            Ok(outcome) => {
                self.health.record_completed();
                Ok(outcome)
            }
            Err(e) => {
                let failures = self.health.record_failure(&e);
                warn!(tab = self.tab, failures, error = %e, "cycle failed");
                if failures >= self.max_failures {
                    error!(tab = self.tab, failures, "too many failed cycles, stopping monitor");
                    self.fault = Some(Fault::RepeatedCycleFailure {
                        failures,
                        last_error: e.to_string(),
                    });
                    self.halt().await;
                }
                Err(e)
            }
        }
    }

    async fn run_cycle(&mut self, hover: bool, initial: bool) -> Result<CycleOutcome, CycleError> {
        // The first cycle reads whatever is on screen even without a target.
        if hover && !self.hover().await? && !initial {
            return Ok(CycleOutcome::Skipped);
        }

        let snapshot = self.parser.extract(&*self.page, None, &mut self.cache)?;
        if snapshot.is_empty() {
            debug!(tab = self.tab, "no tooltip rows");
            return Ok(CycleOutcome::Empty);
        }
        if !has_changed(&snapshot, self.current.as_ref()) {
            return Ok(CycleOutcome::Unchanged);
        }

        let results = self.thresholds.evaluate_all(&snapshot);
        let triggered = self.alarms.process(results.values());
        if !triggered.is_empty() {
            info!(tab = self.tab, keys = ?triggered, "threshold crossed");
            self.sink.sound(self.tab, &triggered);
        }

        self.publish(&snapshot, &results, &triggered).await?;

        let items = snapshot.len();
        self.previous = self.current.replace(snapshot);
        Ok(CycleOutcome::Published { items, triggered })
    }

    /// Locate the target, hover it and wait for the tooltip to settle.
    /// Returns false when there was nothing to hover.
    async fn hover(&mut self) -> Result<bool, CycleError> {
        self.cache.invalidate(CacheKey::VisibleTables);

        let located = match self.locator.locate(&*self.page, &mut self.cache) {
            Ok(located) => located,
            Err(LocateFailure::NotFound(diagnostics)) => {
                debug!(tab = self.tab, %diagnostics, "no hover target");
                return Ok(false);
            }
            Err(LocateFailure::Page(e)) => return Err(e.into()),
        };
        self.health.record_strategy(located.strategy);

        if self.synth.hover(&*self.page, located.element)?.is_none() {
            self.cache.invalidate(CacheKey::TargetElement);
            debug!(tab = self.tab, "hover target detached");
            return Ok(false);
        }
        self.last_hover = Some(Instant::now());
        debug!(tab = self.tab, strategy = %located.strategy, cached = located.cached, "hovered");

        tokio::time::sleep(self.timing.settle).await;
        Ok(true)
    }

    async fn publish(
        &mut self,
        snapshot: &DataSnapshot,
        results: &BTreeMap<String, ThresholdResult>,
        triggered: &[String],
    ) -> Result<(), StoreError> {
        self.batcher
            .push(keys::latest_data(self.tab), serde_json::to_value(snapshot)?);

        match self.bus.publish(self.tab, Message::data_update(snapshot, results.clone())) {
            Ok(()) => debug!(tab = self.tab, items = snapshot.len(), "data update published"),
            Err(e) => {
                warn!(tab = self.tab, error = %e, "data update not delivered, writing to storage");
                self.batcher.flush(&*self.storage).await?;
            }
        }

        if triggered.is_empty() {
            return Ok(());
        }
        let breach = BreachRecord {
            triggered: triggered.to_vec(),
            results: results
                .iter()
                .filter(|(key, _)| triggered.contains(key))
                .map(|(key, result)| (key.clone(), result.clone()))
                .collect(),
            timestamp: snapshot.timestamp,
        };
        let message = Message::ThresholdBreach { breach: breach.clone() };
        if let Err(e) = self.bus.publish(self.tab, message) {
            warn!(tab = self.tab, error = %e, "breach not delivered, writing to storage");
            save(&*self.storage, &keys::threshold_breach(self.tab), &breach).await?;
        }
        Ok(())
    }

    /// When the pending storage batch is due.
    pub fn batch_deadline(&self) -> Option<Instant> {
        self.batcher.deadline()
    }

    /// Write the pending storage batch. Failures are logged, not raised.
    pub async fn flush_pending(&mut self) {
        match self.batcher.flush(&*self.storage).await {
            Ok(0) => {}
            Ok(entries) => debug!(tab = self.tab, entries, "storage batch written"),
            Err(e) => warn!(tab = self.tab, error = %e, "storage batch dropped"),
        }
    }

    pub async fn set_threshold(&mut self, key: &str, raw: &str, absolute: bool) -> Result<ThresholdSpec, ThresholdError> {
        let spec = self
            .thresholds
            .set_threshold(&*self.storage, key, raw, absolute)
            .await?;
        self.alarms.reset_state(key);
        self.republish();
        Ok(spec)
    }

    pub async fn clear_threshold(&mut self, key: &str) -> Result<(), StoreError> {
        self.thresholds.clear_threshold(&*self.storage, key).await?;
        self.alarms.reset_state(key);
        self.republish();
        Ok(())
    }

    /// Re-send the last snapshot with fresh threshold results so the panel
    /// reflects a threshold change before the readings move.
    fn republish(&self) {
        let Some(current) = &self.current else {
            return;
        };
        let results = self.thresholds.evaluate_all(current);
        if let Err(e) = self.bus.publish(self.tab, Message::data_update(current, results)) {
            debug!(tab = self.tab, error = %e, "republish not delivered");
        }
    }

    /// Persist the enabled flag, then start or stop to match. Returns
    /// whether the loop changed state.
    pub async fn set_enabled(&mut self, enabled: bool) -> Result<bool, StoreError> {
        self.tab_settings.set_enabled(&*self.storage, enabled).await?;
        Ok(if enabled { self.start().await } else { self.stop().await })
    }

    /// Remove everything stored for this tab and forget thresholds and alarm
    /// state. The loop keeps its current state.
    pub async fn clear_storage(&mut self) -> Result<(), StoreError> {
        self.batcher.discard();
        self.storage.remove(&keys::all(self.tab)).await?;
        self.thresholds = ThresholdEngine::new(self.tab);
        self.tab_settings = TabSettings::new(self.tab);
        self.alarms.reset_all();
        info!(tab = self.tab, "tab storage cleared");
        self.republish();
        Ok(())
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            tab: self.tab,
            state: self.state,
            enabled: self.tab_settings.enabled,
            fault: self.fault.clone(),
            health: self.health.report(self.is_running(), self.timing.stall_after),
            thresholds: self.thresholds.len(),
            last_update: self.current.as_ref().map(|s| s.timestamp),
            items: self.current.as_ref().map_or(0, DataSnapshot::len),
        }
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let (locator, page_error) = match self.locator.diagnose(&*self.page) {
            Ok(diagnostics) => (Some(diagnostics), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Diagnostics {
            locator,
            page_error,
            status: self.status(),
        }
    }

    /// Health report, warning when the loop has stalled.
    pub fn check_health(&self) -> HealthReport {
        let report = self.health.report(self.is_running(), self.timing.stall_after);
        if report.status == HealthStatus::Stalled {
            warn!(
                tab = self.tab,
                last_cycle_age_ms = ?report.last_cycle_age_ms,
                consecutive_errors = report.consecutive_errors,
                "no cycle completed recently"
            );
        }
        report
    }
}
