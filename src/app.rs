//! Panel state and the actions behind its key bindings.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::debug;

use crate::alarm::{ThresholdResult, ThresholdSpec};
use crate::bus::{Background, BreachRecord, Envelope, Message, Response};
use crate::data::{DataSnapshot, DataValue};
use crate::monitor::MonitorStatus;
use crate::store::{Storage, TabId, TabSettings};
use crate::ui::Theme;

/// How long a status message stays on screen.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// Everything the panel knows about one tab.
#[derive(Debug, Clone)]
pub struct TabView {
    pub tab: TabId,
    pub label: String,
    pub data: Option<DataSnapshot>,
    pub results: BTreeMap<String, ThresholdResult>,
    pub thresholds: BTreeMap<String, ThresholdSpec>,
    pub settings: TabSettings,
    pub status: Option<MonitorStatus>,
    pub last_breach: Option<BreachRecord>,
    pub last_updated: Option<Instant>,
}

impl TabView {
    fn new(tab: TabId, label: String, settings: TabSettings) -> Self {
        Self {
            tab,
            label,
            data: None,
            results: BTreeMap::new(),
            thresholds: BTreeMap::new(),
            settings,
            status: None,
            last_breach: None,
            last_updated: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status.as_ref().is_some_and(MonitorStatus::is_running)
    }
}

/// One table row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub key: String,
    pub value: Option<DataValue>,
    pub threshold: Option<ThresholdSpec>,
    pub result: Option<ThresholdResult>,
}

/// Which keys the table lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowView {
    Visible,
    /// Only hidden keys, for unhiding.
    Hidden,
}

/// The threshold being typed at the input line.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdInput {
    pub key: String,
    pub buffer: String,
    pub absolute: bool,
    /// Why the last submission was rejected.
    pub error: Option<String>,
}

/// Main panel state.
pub struct App {
    pub running: bool,
    pub show_help: bool,
    pub row_view: RowView,
    background: Background,
    storage: Arc<dyn Storage>,
    updates: mpsc::Receiver<Envelope>,
    pub tabs: Vec<TabView>,
    pub current_tab: usize,
    pub selected_row: usize,
    pub input: Option<ThresholdInput>,
    pub theme: Theme,
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create the panel for `tabs` (id and label). Saved tab settings are
    /// loaded and the first tab's panel is opened.
    pub async fn new(
        mut background: Background,
        storage: Arc<dyn Storage>,
        updates: mpsc::Receiver<Envelope>,
        tabs: Vec<(TabId, String)>,
        theme: Theme,
    ) -> Result<Self> {
        let mut views = Vec::with_capacity(tabs.len());
        for (tab, label) in tabs {
            let settings = TabSettings::load(&*storage, tab).await?;
            views.push(TabView::new(tab, label, settings));
        }
        if let Some(first) = views.first() {
            background.open_panel(first.tab);
        }

        let mut app = Self {
            running: true,
            show_help: false,
            row_view: RowView::Visible,
            background,
            storage,
            updates,
            tabs: views,
            current_tab: 0,
            selected_row: 0,
            input: None,
            theme,
            status_message: None,
        };
        app.refresh().await;
        Ok(app)
    }

    pub fn current(&self) -> Option<&TabView> {
        self.tabs.get(self.current_tab)
    }

    fn current_id(&self) -> Option<TabId> {
        self.current().map(|v| v.tab)
    }

    /// Apply every message the monitors published since the last call.
    pub fn poll_updates(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(envelope) = self.updates.try_recv() {
            self.apply(envelope);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, envelope: Envelope) {
        let Some(view) = self.tabs.iter_mut().find(|v| v.tab == envelope.tab) else {
            debug!(tab = envelope.tab, "message for unknown tab");
            return;
        };
        match envelope.message {
            Message::DataUpdate {
                data,
                timestamp,
                results,
            } => {
                view.data = Some(DataSnapshot { values: data, timestamp });
                view.results = results;
                view.last_updated = Some(Instant::now());
            }
            Message::ThresholdBreach { breach } => {
                let keys = breach.triggered.join(", ");
                view.last_breach = Some(breach);
                self.set_status_message(format!("Threshold crossed: {keys}"));
            }
            other => debug!(action = other.action(), "ignoring control message on the update channel"),
        }
        self.clamp_selection();
    }

    /// Ask every monitor for its status and thresholds.
    pub async fn refresh(&mut self) {
        let router = self.background.router();
        for view in &mut self.tabs {
            view.status = router.handle(view.tab, Message::GetStatus).await.status;
            if let Some(handle) = router.handle_for(view.tab) {
                if let Ok(thresholds) = handle.thresholds().await {
                    view.thresholds = thresholds;
                }
            }
        }
    }

    /// Rows of the current tab for the active row view.
    pub fn rows(&self) -> Vec<Row> {
        let Some(view) = self.current() else {
            return Vec::new();
        };
        let keys: Vec<String> = match self.row_view {
            RowView::Visible => {
                let present = view.data.iter().flat_map(|d| d.keys());
                view.settings.arrange(present)
            }
            RowView::Hidden => view.settings.hidden.iter().cloned().collect(),
        };
        keys.into_iter()
            .map(|key| Row {
                value: view.data.as_ref().and_then(|d| d.get(&key)).cloned(),
                threshold: view.thresholds.get(&key).cloned(),
                result: view.results.get(&key).cloned(),
                key,
            })
            .collect()
    }

    pub fn selected_key(&self) -> Option<String> {
        self.rows().into_iter().nth(self.selected_row).map(|r| r.key)
    }

    fn clamp_selection(&mut self) {
        let count = self.rows().len();
        if self.selected_row >= count {
            self.selected_row = count.saturating_sub(1);
        }
    }

    pub fn select_next(&mut self) {
        let max = self.rows().len().saturating_sub(1);
        self.selected_row = (self.selected_row + 1).min(max);
    }

    pub fn select_prev(&mut self) {
        self.selected_row = self.selected_row.saturating_sub(1);
    }

    pub fn select_first(&mut self) {
        self.selected_row = 0;
    }

    pub fn select_last(&mut self) {
        self.selected_row = self.rows().len().saturating_sub(1);
    }

    /// Switch to the next tab, focusing its panel.
    pub fn next_tab(&mut self) {
        if self.tabs.is_empty() {
            return;
        }
        self.switch_tab((self.current_tab + 1) % self.tabs.len());
    }

    pub fn prev_tab(&mut self) {
        if self.tabs.is_empty() {
            return;
        }
        self.switch_tab((self.current_tab + self.tabs.len() - 1) % self.tabs.len());
    }

    fn switch_tab(&mut self, index: usize) {
        self.current_tab = index;
        self.selected_row = 0;
        self.input = None;
        if let Some(tab) = self.current_id() {
            self.background.open_panel(tab);
        }
    }

    pub fn toggle_row_view(&mut self) {
        self.row_view = match self.row_view {
            RowView::Visible => RowView::Hidden,
            RowView::Hidden => RowView::Visible,
        };
        self.selected_row = 0;
    }

    /// Open the input line for the selected key, prefilled with its threshold.
    pub fn begin_threshold_input(&mut self) {
        let Some(row) = self.rows().into_iter().nth(self.selected_row) else {
            return;
        };
        self.input = Some(ThresholdInput {
            buffer: row.threshold.as_ref().map(|t| t.original_input.clone()).unwrap_or_default(),
            absolute: row.threshold.as_ref().is_some_and(|t| t.absolute),
            key: row.key,
            error: None,
        });
    }

    pub fn input_push(&mut self, c: char) {
        if let Some(input) = &mut self.input {
            input.buffer.push(c);
            input.error = None;
        }
    }

    pub fn input_pop(&mut self) {
        if let Some(input) = &mut self.input {
            input.buffer.pop();
            input.error = None;
        }
    }

    pub fn toggle_input_absolute(&mut self) {
        if let Some(input) = &mut self.input {
            input.absolute = !input.absolute;
        }
    }

    pub fn cancel_input(&mut self) {
        self.input = None;
    }

    /// Send the typed threshold. A rejected value keeps the input open with
    /// the reason shown beside it.
    pub async fn submit_threshold(&mut self) {
        let (Some(tab), Some(input)) = (self.current_id(), self.input.clone()) else {
            return;
        };
        let message = Message::SetThreshold {
            key: input.key.clone(),
            value: input.buffer.clone(),
            absolute: input.absolute,
        };
        let response = self.background.router().handle(tab, message).await;

        match (response.threshold, response.error) {
            (Some(spec), _) => {
                self.set_status_message(format!("{} threshold set to {}", input.key, spec.original_input));
                if let Some(view) = self.tabs.get_mut(self.current_tab) {
                    view.thresholds.insert(input.key, spec);
                }
                self.input = None;
            }
            (None, error) => {
                if let Some(input) = &mut self.input {
                    input.error = Some(error.unwrap_or_else(|| "threshold was not saved".to_string()));
                }
            }
        }
    }

    pub async fn clear_selected_threshold(&mut self) {
        let (Some(tab), Some(key)) = (self.current_id(), self.selected_key()) else {
            return;
        };
        let message = Message::ClearThreshold { key: key.clone() };
        let response = self.background.router().handle(tab, message).await;
        if self.report_error(&response) {
            return;
        }
        if let Some(view) = self.tabs.get_mut(self.current_tab) {
            view.thresholds.remove(&key);
            view.results.remove(&key);
        }
        self.set_status_message(format!("{key} threshold cleared"));
    }

    /// Hide the selected key, or unhide it in the hidden view.
    pub async fn toggle_selected_hidden(&mut self) {
        let Some(key) = self.selected_key() else {
            return;
        };
        let hide = self.row_view == RowView::Visible;
        let Some(view) = self.tabs.get_mut(self.current_tab) else {
            return;
        };
        let saved = view.settings.set_hidden(&*self.storage, &key, hide).await;
        match saved {
            Ok(()) => {
                let verb = if hide { "hidden" } else { "shown" };
                self.set_status_message(format!("{key} {verb}"));
            }
            Err(e) => self.set_status_message(format!("Could not save: {e}")),
        }
        self.clamp_selection();
    }

    /// Move the selected key up (`-1`) or down (`1`); the selection follows.
    pub async fn move_selected(&mut self, offset: isize) {
        if self.row_view != RowView::Visible {
            return;
        }
        let visible: Vec<String> = self.rows().into_iter().map(|r| r.key).collect();
        let Some(key) = visible.get(self.selected_row).cloned() else {
            return;
        };
        let Some(view) = self.tabs.get_mut(self.current_tab) else {
            return;
        };
        if let Err(e) = view.settings.move_key(&*self.storage, &visible, &key, offset).await {
            self.set_status_message(format!("Could not save: {e}"));
            return;
        }
        if let Some(position) = self.rows().iter().position(|r| r.key == key) {
            self.selected_row = position;
        }
    }

    /// Stop a running tab or (re)start a stopped one. Starting clears a fault.
    pub async fn toggle_monitoring(&mut self) {
        let Some(view) = self.current() else {
            return;
        };
        let (tab, message) = if view.is_running() {
            (view.tab, Message::DisableTab)
        } else {
            (view.tab, Message::EnableTab)
        };
        let response = self.background.router().handle(tab, message).await;
        if self.report_error(&response) {
            return;
        }
        let enabled = response.enabled.unwrap_or_default();
        if let Some(view) = self.tabs.get_mut(self.current_tab) {
            view.settings.enabled = enabled;
        }
        self.set_status_message(if enabled { "Monitoring enabled" } else { "Monitoring disabled" }.to_string());
        self.refresh().await;
    }

    /// Forget everything stored for the current tab.
    pub async fn clear_tab_storage(&mut self) {
        let Some(tab) = self.current_id() else {
            return;
        };
        let response = self.background.router().handle(tab, Message::ClearStorage).await;
        if self.report_error(&response) {
            return;
        }
        if let Some(view) = self.tabs.get_mut(self.current_tab) {
            view.settings = TabSettings::new(tab);
            view.thresholds.clear();
            view.results.clear();
            view.last_breach = None;
        }
        self.set_status_message("Tab storage cleared".to_string());
        self.refresh().await;
    }

    /// Show the locator's view of the page in the status line.
    pub async fn show_diagnostics(&mut self) {
        let Some(tab) = self.current_id() else {
            return;
        };
        let response = self.background.router().handle(tab, Message::GetDiagnostics).await;
        if self.report_error(&response) {
            return;
        }
        let Some(diagnostics) = response.diagnostics else {
            return;
        };
        let message = match (diagnostics.locator, diagnostics.page_error) {
            (Some(locator), _) => locator.to_string(),
            (None, Some(error)) => format!("Page: {error}"),
            (None, None) => "No diagnostics".to_string(),
        };
        self.set_status_message(message);
    }

    /// Show the response error, if any. Returns whether there was one.
    fn report_error(&mut self, response: &Response) -> bool {
        match &response.error {
            Some(error) => {
                self.set_status_message(format!("Error: {error}"));
                true
            }
            None => false,
        }
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        match &self.status_message {
            Some((msg, time)) if time.elapsed() < STATUS_MESSAGE_TTL => Some(msg),
            _ => None,
        }
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Shut every monitor down, flushing their pending writes.
    pub async fn shutdown(&mut self) {
        for tab in self.background.router().tabs() {
            if let Some(handle) = self.background.router().handle_for(tab) {
                let _ = handle.shutdown().await;
            }
        }
    }
}
