//! Long-lived coordinator: which panel window shows which tab, and cleanup
//! when tabs or windows go away.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{ControlRouter, OwnershipRegistry};
use crate::error::StoreError;
use crate::store::{keys, Storage, TabId};

/// Identifies a panel window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// Tracks panel windows per tab and owns the control router.
#[derive(Debug)]
pub struct Background {
    panels: OwnershipRegistry<TabId, WindowId>,
    focused: Option<WindowId>,
    next_window: u64,
    router: ControlRouter,
    storage: Arc<dyn Storage>,
}

impl Background {
    pub fn new(router: ControlRouter, storage: Arc<dyn Storage>) -> Self {
        Self {
            panels: OwnershipRegistry::new(),
            focused: None,
            next_window: 1,
            router,
            storage,
        }
    }

    pub fn router(&self) -> &ControlRouter {
        &self.router
    }

    pub fn focused(&self) -> Option<WindowId> {
        self.focused
    }

    /// The tab shown in the focused window.
    pub fn focused_tab(&self) -> Option<TabId> {
        self.focused.and_then(|w| self.panels.find_by_value(&w))
    }

    pub fn panel_for(&self, tab: TabId) -> Option<WindowId> {
        self.panels.get(&tab).copied()
    }

    /// Focus the panel of `tab`, creating it when the tab has none.
    pub fn open_panel(&mut self, tab: TabId) -> WindowId {
        if let Some(window) = self.panels.get(&tab).copied() {
            debug!(tab, %window, "focusing existing panel");
            self.focused = Some(window);
            return window;
        }

        let window = WindowId(self.next_window);
        self.next_window += 1;
        self.panels.set(tab, window);
        self.focused = Some(window);
        info!(tab, %window, "panel opened");
        window
    }

    /// A tab was closed: forget its enabled flag, close its panel and shut
    /// its monitor down.
    pub async fn tab_removed(&mut self, tab: TabId) -> Result<(), StoreError> {
        if let Some(window) = self.panels.delete(&tab) {
            if self.focused == Some(window) {
                self.focused = None;
            }
            debug!(tab, %window, "panel closed with its tab");
        }
        if let Some(handle) = self.router.remove(tab) {
            if let Err(e) = handle.shutdown().await {
                warn!(tab, error = %e, "monitor already gone");
            }
        }
        self.storage.remove(&[keys::monitor_enabled(tab)]).await
    }

    /// A panel window was closed by the user. The tab keeps monitoring.
    pub fn window_removed(&mut self, window: WindowId) -> Option<TabId> {
        let tab = self.panels.find_by_value(&window)?;
        self.panels.delete(&tab);
        if self.focused == Some(window) {
            self.focused = None;
        }
        debug!(tab, %window, "panel window closed");
        Some(tab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ChannelBus;
    use crate::monitor::{Monitor, MonitorService};
    use crate::page::{sample_chart, PageTree};
    use crate::store::{save, MemoryStore};

    fn background(store: Arc<MemoryStore>) -> Background {
        Background::new(ControlRouter::new(), store)
    }

    #[test]
    fn test_open_panel_focuses_or_creates() {
        let mut bg = background(Arc::new(MemoryStore::new()));

        let first = bg.open_panel(1);
        let second = bg.open_panel(2);
        assert_ne!(first, second);
        assert_eq!(bg.focused_tab(), Some(2));

        assert_eq!(bg.open_panel(1), first);
        assert_eq!(bg.focused(), Some(first));
    }

    #[test]
    fn test_window_removed_releases_tab() {
        let mut bg = background(Arc::new(MemoryStore::new()));
        let window = bg.open_panel(4);

        assert_eq!(bg.window_removed(window), Some(4));
        assert_eq!(bg.panel_for(4), None);
        assert_eq!(bg.focused(), None);
        assert_eq!(bg.window_removed(window), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tab_removed_cleans_up() {
        let store = Arc::new(MemoryStore::new());
        save(&*store, &keys::monitor_enabled(5), &true).await.unwrap();

        let (bus, _rx) = ChannelBus::create(16);
        let monitor = Monitor::builder(5)
            .page(Arc::new(PageTree::from_root(sample_chart(&[("RSI", "40")]))))
            .storage(store.clone())
            .bus(Arc::new(bus))
            .build()
            .unwrap();
        let (handle, _task) = MonitorService::spawn(monitor);
        let mut router = ControlRouter::new();
        router.register(handle.clone());

        let mut bg = Background::new(router, store.clone());
        bg.open_panel(5);
        bg.tab_removed(5).await.unwrap();

        assert_eq!(bg.panel_for(5), None);
        assert!(bg.router().tabs().is_empty());
        assert!(handle.is_closed());
        assert!(store.peek(&keys::monitor_enabled(5)).is_none());
    }
}
