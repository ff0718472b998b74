//! One task per monitored tab.
//!
//! The task owns the [`Monitor`] and multiplexes its timers and the commands
//! sent through a [`MonitorHandle`]. Cycles run inside the task, so they never
//! overlap, and a stop takes effect before the next tick can fire.

use std::collections::BTreeMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::pipeline::{Diagnostics, Monitor, MonitorStatus};
use crate::alarm::ThresholdSpec;
use crate::data::DataSnapshot;
use crate::error::{MonitorError, StoreError, ThresholdError};
use crate::store::TabId;

const COMMAND_BUFFER: usize = 32;

/// Requests understood by the monitor task. Each carries its reply channel.
#[derive(Debug)]
pub enum Command {
    Start(oneshot::Sender<bool>),
    Stop(oneshot::Sender<bool>),
    Status(oneshot::Sender<MonitorStatus>),
    CurrentData(oneshot::Sender<Option<DataSnapshot>>),
    Diagnostics(oneshot::Sender<Diagnostics>),
    Thresholds(oneshot::Sender<BTreeMap<String, ThresholdSpec>>),
    SetThreshold {
        key: String,
        raw: String,
        absolute: bool,
        reply: oneshot::Sender<Result<ThresholdSpec, ThresholdError>>,
    },
    ClearThreshold {
        key: String,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
    SetEnabled {
        enabled: bool,
        reply: oneshot::Sender<Result<bool, StoreError>>,
    },
    IsEnabled(oneshot::Sender<bool>),
    ClearStorage(oneshot::Sender<Result<(), StoreError>>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle to a running monitor task.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    tab: TabId,
    sender: mpsc::Sender<Command>,
}

impl MonitorHandle {
    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// Whether the task is still accepting commands.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, MonitorError> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(command(tx)).await.map_err(|_| MonitorError::Closed)?;
        rx.await.map_err(|_| MonitorError::Closed)
    }

    pub async fn start(&self) -> Result<bool, MonitorError> {
        self.request(Command::Start).await
    }

    pub async fn stop(&self) -> Result<bool, MonitorError> {
        self.request(Command::Stop).await
    }

    pub async fn status(&self) -> Result<MonitorStatus, MonitorError> {
        self.request(Command::Status).await
    }

    pub async fn current_data(&self) -> Result<Option<DataSnapshot>, MonitorError> {
        self.request(Command::CurrentData).await
    }

    pub async fn diagnostics(&self) -> Result<Diagnostics, MonitorError> {
        self.request(Command::Diagnostics).await
    }

    pub async fn thresholds(&self) -> Result<BTreeMap<String, ThresholdSpec>, MonitorError> {
        self.request(Command::Thresholds).await
    }

    pub async fn set_threshold(&self, key: &str, raw: &str, absolute: bool) -> Result<ThresholdSpec, MonitorError> {
        let spec = self
            .request(|reply| Command::SetThreshold {
                key: key.to_string(),
                raw: raw.to_string(),
                absolute,
                reply,
            })
            .await??;
        Ok(spec)
    }

    pub async fn clear_threshold(&self, key: &str) -> Result<(), MonitorError> {
        self.request(|reply| Command::ClearThreshold {
            key: key.to_string(),
            reply,
        })
        .await??;
        Ok(())
    }

    /// Persist the enabled flag and start or stop the loop to match.
    pub async fn set_enabled(&self, enabled: bool) -> Result<bool, MonitorError> {
        Ok(self
            .request(|reply| Command::SetEnabled { enabled, reply })
            .await??)
    }

    pub async fn is_enabled(&self) -> Result<bool, MonitorError> {
        self.request(Command::IsEnabled).await
    }

    pub async fn clear_storage(&self) -> Result<(), MonitorError> {
        self.request(Command::ClearStorage).await??;
        Ok(())
    }

    /// Stop the task after flushing pending storage writes.
    pub async fn shutdown(&self) -> Result<(), MonitorError> {
        self.request(Command::Shutdown).await
    }
}

/// Runs monitors as tasks.
#[derive(Debug)]
pub struct MonitorService;

impl MonitorService {
    /// Spawn the task for `monitor`. It restores the tab's saved state and
    /// starts monitoring when the tab is enabled.
    pub fn spawn(monitor: Monitor) -> (MonitorHandle, JoinHandle<()>) {
        let (sender, commands) = mpsc::channel(COMMAND_BUFFER);
        let handle = MonitorHandle {
            tab: monitor.tab(),
            sender,
        };
        let task = tokio::spawn(run(monitor, commands));
        (handle, task)
    }
}

async fn run(mut monitor: Monitor, mut commands: mpsc::Receiver<Command>) {
    let tab = monitor.tab();
    if let Err(e) = monitor.restore().await {
        warn!(tab, error = %e, "could not restore tab state, using defaults");
    }

    let timing = monitor.timing();
    let mut tick = interval_at(Instant::now() + timing.tick, timing.tick);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut health = interval_at(Instant::now() + timing.health_interval, timing.health_interval);
    health.set_missed_tick_behavior(MissedTickBehavior::Delay);

    if monitor.is_enabled() {
        monitor.start().await;
        tick.reset();
        health.reset();
    }

    loop {
        let deadline = monitor.batch_deadline();
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!(tab, "all handles dropped");
                    break;
                };
                let was_running = monitor.is_running();
                if !handle(&mut monitor, command).await {
                    return;
                }
                if !was_running && monitor.is_running() {
                    tick.reset();
                    health.reset();
                }
            }
            _ = tick.tick(), if monitor.is_running() => {
                // failures are logged and counted by the monitor
                let _ = monitor.tick().await;
            }
            _ = health.tick(), if monitor.is_running() => {
                monitor.check_health();
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                monitor.flush_pending().await;
            }
        }
    }

    monitor.shutdown().await;
}

/// Apply one command. Returns false when the task should exit.
async fn handle(monitor: &mut Monitor, command: Command) -> bool {
    match command {
        Command::Start(reply) => {
            let _ = reply.send(monitor.start().await);
        }
        Command::Stop(reply) => {
            let _ = reply.send(monitor.stop().await);
        }
        Command::Status(reply) => {
            let _ = reply.send(monitor.status());
        }
        Command::CurrentData(reply) => {
            let _ = reply.send(monitor.current_data().cloned());
        }
        Command::Diagnostics(reply) => {
            let _ = reply.send(monitor.diagnostics());
        }
        Command::Thresholds(reply) => {
            let _ = reply.send(monitor.thresholds().clone());
        }
        Command::SetThreshold {
            key,
            raw,
            absolute,
            reply,
        } => {
            let _ = reply.send(monitor.set_threshold(&key, &raw, absolute).await);
        }
        Command::ClearThreshold { key, reply } => {
            let _ = reply.send(monitor.clear_threshold(&key).await);
        }
        Command::SetEnabled { enabled, reply } => {
            let _ = reply.send(monitor.set_enabled(enabled).await);
        }
        Command::IsEnabled(reply) => {
            let _ = reply.send(monitor.is_enabled());
        }
        Command::ClearStorage(reply) => {
            let _ = reply.send(monitor.clear_storage().await);
        }
        Command::Shutdown(reply) => {
            monitor.shutdown().await;
            debug!(tab = monitor.tab(), "monitor task shut down");
            let _ = reply.send(());
            return false;
        }
    }
    true
}
