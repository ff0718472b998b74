//! Alarm playback.

use std::fmt::Debug;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::store::TabId;

/// Plays an alarm for triggered keys.
pub trait AlarmSink: Send + Sync + Debug {
    fn sound(&self, tab: TabId, keys: &[String]);
}

/// Rings the terminal bell once per trigger.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl AlarmSink for TerminalBell {
    fn sound(&self, _tab: TabId, _keys: &[String]) {
        let mut stderr = io::stderr();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
    }
}

/// Plays nothing.
#[derive(Debug, Default)]
pub struct Silent;

impl AlarmSink for Silent {
    fn sound(&self, _tab: TabId, _keys: &[String]) {}
}

/// Records every alarm. Clones share the record.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    alarms: Arc<Mutex<Vec<(TabId, Vec<String>)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alarms(&self) -> Vec<(TabId, Vec<String>)> {
        self.alarms.lock().clone()
    }
}

impl AlarmSink for RecordingSink {
    fn sound(&self, tab: TabId, keys: &[String]) {
        self.alarms.lock().push((tab, keys.to_vec()));
    }
}
