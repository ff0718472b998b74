//! Dispatch of control messages to monitor handles.

use std::collections::HashMap;

use tracing::debug;

use super::{Message, Response};
use crate::error::{MonitorError, ThresholdError};
use crate::monitor::MonitorHandle;
use crate::store::TabId;

/// Routes inbound control messages to the monitor of their tab.
#[derive(Debug, Default)]
pub struct ControlRouter {
    monitors: HashMap<TabId, MonitorHandle>,
}

impl ControlRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: MonitorHandle) {
        self.monitors.insert(handle.tab(), handle);
    }

    pub fn remove(&mut self, tab: TabId) -> Option<MonitorHandle> {
        self.monitors.remove(&tab)
    }

    pub fn handle_for(&self, tab: TabId) -> Option<&MonitorHandle> {
        self.monitors.get(&tab)
    }

    /// Registered tabs in ascending order.
    pub fn tabs(&self) -> Vec<TabId> {
        let mut tabs: Vec<TabId> = self.monitors.keys().copied().collect();
        tabs.sort_unstable();
        tabs
    }

    /// Answer one control message for `tab`. Failures become error responses.
    pub async fn handle(&self, tab: TabId, message: Message) -> Response {
        let Some(monitor) = self.monitors.get(&tab) else {
            return Response::error(format!("no monitor for tab {tab}"));
        };
        let action = message.action();
        debug!(tab, action, "control message");

        match dispatch(monitor, message).await {
            Ok(response) => response,
            Err(MonitorError::Threshold(ThresholdError::Validation(e))) => Response::error(e.reason),
            Err(e) => Response::error(e.to_string()),
        }
    }
}

async fn dispatch(monitor: &MonitorHandle, message: Message) -> Result<Response, MonitorError> {
    let action = message.action();
    let response = match message {
        Message::StartMonitoring => Response::success(monitor.start().await?),
        Message::StopMonitoring => Response {
            success: Some(true),
            stopped: Some(monitor.stop().await?),
            ..Default::default()
        },
        Message::GetStatus => Response {
            status: Some(monitor.status().await?),
            ..Default::default()
        },
        Message::GetCurrentData => {
            let data = monitor.current_data().await?;
            Response {
                success: Some(data.is_some()),
                data,
                ..Default::default()
            }
        }
        Message::GetDiagnostics => Response {
            diagnostics: Some(monitor.diagnostics().await?),
            ..Default::default()
        },
        Message::EnableTab => set_enabled(monitor, true).await?,
        Message::DisableTab => set_enabled(monitor, false).await?,
        Message::IsTabEnabled => Response {
            enabled: Some(monitor.is_enabled().await?),
            ..Default::default()
        },
        Message::ClearStorage => {
            monitor.clear_storage().await?;
            Response::success(true)
        }
        Message::SetThreshold { key, value, absolute } => {
            let spec = monitor.set_threshold(&key, &value, absolute).await?;
            Response {
                success: Some(true),
                threshold: Some(spec),
                ..Default::default()
            }
        }
        Message::ClearThreshold { key } => {
            monitor.clear_threshold(&key).await?;
            Response::success(true)
        }
        Message::DataUpdate { .. } | Message::ThresholdBreach { .. } => {
            Response::error(format!("{action} is not a control message"))
        }
    };
    Ok(response)
}

async fn set_enabled(monitor: &MonitorHandle, enabled: bool) -> Result<Response, MonitorError> {
    monitor.set_enabled(enabled).await?;
    Ok(Response {
        success: Some(true),
        enabled: Some(enabled),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::bus::ChannelBus;
    use crate::monitor::{Monitor, MonitorService};
    use crate::page::{sample_chart, PageTree};
    use crate::store::MemoryStore;

    async fn router() -> (ControlRouter, tokio::sync::mpsc::Receiver<crate::bus::Envelope>) {
        let (bus, rx) = ChannelBus::create(64);
        let monitor = Monitor::builder(2)
            .page(Arc::new(PageTree::from_root(sample_chart(&[("RSI", "40")]))))
            .storage(Arc::new(MemoryStore::new()))
            .bus(Arc::new(bus))
            .build()
            .unwrap();
        let (handle, _task) = MonitorService::spawn(monitor);
        let mut router = ControlRouter::new();
        router.register(handle);
        (router, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_tab_is_an_error() {
        let (router, _rx) = router().await;
        let response = router.handle(9, Message::GetStatus).await;
        assert_eq!(response.error.as_deref(), Some("no monitor for tab 9"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_then_start() {
        let (router, _rx) = router().await;

        let stopped = router.handle(2, Message::StopMonitoring).await;
        assert_eq!(stopped.stopped, Some(true));

        let again = router.handle(2, Message::StopMonitoring).await;
        assert_eq!(again.stopped, Some(false));

        let started = router.handle(2, Message::StartMonitoring).await;
        assert_eq!(started.success, Some(true));

        let status = router.handle(2, Message::GetStatus).await.status.unwrap();
        assert!(status.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_threshold_reports_reason() {
        let (router, _rx) = router().await;
        let response = router
            .handle(
                2,
                Message::SetThreshold {
                    key: "RSI".to_string(),
                    value: "abc".to_string(),
                    absolute: false,
                },
            )
            .await;
        assert!(response.error.unwrap().starts_with("invalid format"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_data_after_start() {
        let (router, _rx) = router().await;
        let response = router.handle(2, Message::GetCurrentData).await;
        assert_eq!(response.success, Some(true));
        assert_eq!(response.data.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbound_messages_are_rejected() {
        let (router, _rx) = router().await;
        let response = router
            .handle(
                2,
                Message::DataUpdate {
                    data: Default::default(),
                    timestamp: 0,
                    results: Default::default(),
                },
            )
            .await;
        assert!(response.is_error());
    }
}
