//! Drives monitors through the control router, as the panel does.

use std::sync::Arc;

use tokio::sync::mpsc;

use chartwatch::alarm::RecordingSink;
use chartwatch::bus::{Background, ChannelBus, ControlRouter, Envelope, Message};
use chartwatch::data::DataValue;
use chartwatch::monitor::{Monitor, MonitorService};
use chartwatch::page::{sample_chart, PageTree};
use chartwatch::store::{keys, FileStore, MemoryStore, Storage, TabSettings};

struct Tab {
    page: Arc<PageTree>,
    sink: RecordingSink,
}

fn spawn_tab(router: &mut ControlRouter, tab: u32, storage: Arc<dyn Storage>, bus: &Arc<ChannelBus>) -> Tab {
    let page = Arc::new(PageTree::from_root(sample_chart(&[
        ("RSI", "40"),
        ("MACD", "0.5"),
        ("Volume", "1.2M"),
    ])));
    let sink = RecordingSink::new();
    let monitor = Monitor::builder(tab)
        .page(page.clone())
        .storage(storage)
        .bus(bus.clone())
        .alarm_sink(Box::new(sink.clone()))
        .build()
        .unwrap();
    let (handle, _task) = MonitorService::spawn(monitor);
    router.register(handle);
    Tab { page, sink }
}

/// Wait for a data update carrying `value` under `key`. Returns how many
/// breaches arrived on the way.
async fn wait_for_value(rx: &mut mpsc::Receiver<Envelope>, key: &str, value: f64) -> usize {
    let mut breaches = 0;
    loop {
        match rx.recv().await.unwrap().message {
            Message::DataUpdate { data, .. } => {
                if data.get(key).and_then(DataValue::as_number) == Some(value) {
                    return breaches;
                }
            }
            Message::ThresholdBreach { .. } => breaches += 1,
            _ => {}
        }
    }
}

async fn next_breach(rx: &mut mpsc::Receiver<Envelope>) -> (u32, Vec<String>) {
    loop {
        let envelope = rx.recv().await.unwrap();
        if let Message::ThresholdBreach { breach } = envelope.message {
            return (envelope.tab, breach.triggered);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_threshold_crossing_raises_one_alarm() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStore::new());
    let (bus, mut rx) = ChannelBus::create(256);
    let bus = Arc::new(bus);
    let mut router = ControlRouter::new();
    let tab = spawn_tab(&mut router, 1, storage.clone(), &bus);

    let response = router
        .handle(
            1,
            Message::SetThreshold {
                key: "RSI".to_string(),
                value: "70".to_string(),
                absolute: false,
            },
        )
        .await;
    assert_eq!(response.success, Some(true));

    tab.page.set_text("value-1", "75.5");
    assert_eq!(next_breach(&mut rx).await, (1, vec!["RSI".to_string()]));

    // Staying above does not ring again; dropping and rising does.
    tab.page.set_text("value-1", "80");
    assert_eq!(wait_for_value(&mut rx, "RSI", 80.0).await, 0);
    tab.page.set_text("value-1", "60");
    assert_eq!(wait_for_value(&mut rx, "RSI", 60.0).await, 0);

    tab.page.set_text("value-1", "71");
    assert_eq!(next_breach(&mut rx).await, (1, vec!["RSI".to_string()]));
    assert_eq!(tab.sink.alarms().len(), 2);
    assert!(tab.sink.alarms().iter().all(|(t, keys)| *t == 1 && keys == &["RSI".to_string()]));
}

#[tokio::test(start_paused = true)]
async fn test_tabs_are_independent() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStore::new());
    let (bus, mut rx) = ChannelBus::create(256);
    let bus = Arc::new(bus);
    let mut router = ControlRouter::new();
    let first = spawn_tab(&mut router, 1, storage.clone(), &bus);
    let second = spawn_tab(&mut router, 2, storage.clone(), &bus);

    router.handle(2, Message::DisableTab).await;
    router
        .handle(
            2,
            Message::SetThreshold {
                key: "Volume".to_string(),
                value: "1m".to_string(),
                absolute: false,
            },
        )
        .await;
    router
        .handle(
            1,
            Message::SetThreshold {
                key: "Volume".to_string(),
                value: "2m".to_string(),
                absolute: false,
            },
        )
        .await;

    first.page.set_text("value-3", "2.5M");
    second.page.set_text("value-3", "2.5M");
    assert_eq!(next_breach(&mut rx).await, (1, vec!["Volume".to_string()]));

    let status = router.handle(2, Message::GetStatus).await.status.unwrap();
    assert!(!status.is_running());
    assert!(!status.enabled);
    assert!(second.sink.alarms().is_empty());

    let enabled = router.handle(2, Message::IsTabEnabled).await;
    assert_eq!(enabled.enabled, Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_settings_survive_restart_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let (bus, mut rx) = ChannelBus::create(256);
    let bus = Arc::new(bus);

    {
        let storage: Arc<dyn Storage> = Arc::new(FileStore::open(&path).await.unwrap());
        let mut router = ControlRouter::new();
        spawn_tab(&mut router, 1, storage.clone(), &bus);
        router
            .handle(
                1,
                Message::SetThreshold {
                    key: "MACD".to_string(),
                    value: "-1".to_string(),
                    absolute: true,
                },
            )
            .await;
        let mut settings = TabSettings::load(&*storage, 1).await.unwrap();
        settings.set_hidden(&*storage, "Volume", true).await.unwrap();
        router.handle_for(1).unwrap().shutdown().await.unwrap();
    }

    while rx.try_recv().is_ok() {}

    let storage: Arc<dyn Storage> = Arc::new(FileStore::open(&path).await.unwrap());
    let mut router = ControlRouter::new();
    spawn_tab(&mut router, 1, storage.clone(), &bus);

    let thresholds = router.handle_for(1).unwrap().thresholds().await.unwrap();
    assert_eq!(thresholds["MACD"].value, -1.0);
    assert!(thresholds["MACD"].absolute);

    let settings = TabSettings::load(&*storage, 1).await.unwrap();
    assert!(settings.hidden.contains("Volume"));

    // The restored monitor published its first reading on start.
    let mut saw_update = false;
    while let Ok(envelope) = rx.try_recv() {
        if let Message::DataUpdate { data, .. } = envelope.message {
            saw_update |= data
                .get("Volume")
                .and_then(DataValue::as_number)
                .is_some_and(|v| (v - 1.2e6).abs() < 1e-3);
        }
    }
    assert!(saw_update);
}

#[tokio::test(start_paused = true)]
async fn test_closing_a_tab_forgets_its_flag() {
    let storage = Arc::new(MemoryStore::new());
    let (bus, _rx) = ChannelBus::create(256);
    let bus = Arc::new(bus);
    let mut router = ControlRouter::new();
    spawn_tab(&mut router, 7, storage.clone(), &bus);
    router.handle(7, Message::EnableTab).await;
    assert!(storage.peek(&keys::monitor_enabled(7)).is_some());

    let mut background = Background::new(router, storage.clone());
    background.open_panel(7);
    background.tab_removed(7).await.unwrap();

    assert!(storage.peek(&keys::monitor_enabled(7)).is_none());
    let response = background.router().handle(7, Message::GetStatus).await;
    assert!(response.is_error());
}
