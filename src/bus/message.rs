//! Messages exchanged between monitors and the panel.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::alarm::{ThresholdResult, ThresholdSpec};
use crate::data::{DataSnapshot, DataValue};
use crate::monitor::{Diagnostics, MonitorStatus};

/// Keys that crossed their threshold in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreachRecord {
    pub triggered: Vec<String>,
    /// Threshold results of the triggered keys.
    pub results: BTreeMap<String, ThresholdResult>,
    pub timestamp: u64,
}

/// A message on the bus, tagged by `action`.
///
/// `DataUpdate` and `ThresholdBreach` flow from a monitor to the panel; every
/// other variant is a control request answered with a [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    DataUpdate {
        data: BTreeMap<String, DataValue>,
        timestamp: u64,
        results: BTreeMap<String, ThresholdResult>,
    },
    ThresholdBreach {
        breach: BreachRecord,
    },
    StartMonitoring,
    StopMonitoring,
    GetStatus,
    GetCurrentData,
    GetDiagnostics,
    EnableTab,
    DisableTab,
    IsTabEnabled,
    ClearStorage,
    SetThreshold {
        key: String,
        value: String,
        #[serde(default)]
        absolute: bool,
    },
    ClearThreshold {
        key: String,
    },
}

impl Message {
    /// The `action` tag.
    pub fn action(&self) -> &'static str {
        match self {
            Message::DataUpdate { .. } => "dataUpdate",
            Message::ThresholdBreach { .. } => "thresholdBreach",
            Message::StartMonitoring => "startMonitoring",
            Message::StopMonitoring => "stopMonitoring",
            Message::GetStatus => "getStatus",
            Message::GetCurrentData => "getCurrentData",
            Message::GetDiagnostics => "getDiagnostics",
            Message::EnableTab => "enableTab",
            Message::DisableTab => "disableTab",
            Message::IsTabEnabled => "isTabEnabled",
            Message::ClearStorage => "clearStorage",
            Message::SetThreshold { .. } => "setThreshold",
            Message::ClearThreshold { .. } => "clearThreshold",
        }
    }

    pub fn data_update(snapshot: &DataSnapshot, results: BTreeMap<String, ThresholdResult>) -> Self {
        Message::DataUpdate {
            data: snapshot.values.clone(),
            timestamp: snapshot.timestamp,
            results,
        }
    }
}

/// Reply to a control message. Only the fields relevant to the request are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MonitorStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<ThresholdSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn success(success: bool) -> Self {
        Self {
            success: Some(success),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_control_messages_use_action_tag() {
        let json = serde_json::to_value(Message::StartMonitoring).unwrap();
        assert_eq!(json, json!({"action": "startMonitoring"}));

        let parsed: Message =
            serde_json::from_value(json!({"action": "setThreshold", "key": "RSI", "value": "70"})).unwrap();
        assert_eq!(
            parsed,
            Message::SetThreshold {
                key: "RSI".to_string(),
                value: "70".to_string(),
                absolute: false,
            }
        );
        assert_eq!(parsed.action(), "setThreshold");
    }

    #[test]
    fn test_data_update_shape() {
        let mut snapshot = DataSnapshot::new(7);
        snapshot.insert("RSI", DataValue::Number(55.0));
        let json = serde_json::to_value(Message::data_update(&snapshot, BTreeMap::new())).unwrap();
        assert_eq!(
            json,
            json!({"action": "dataUpdate", "data": {"RSI": 55.0}, "timestamp": 7, "results": {}})
        );
    }

    #[test]
    fn test_response_omits_unset_fields() {
        let json = serde_json::to_value(Response::success(true)).unwrap();
        assert_eq!(json, json!({"success": true}));
        assert!(Response::error("unknown tab 3").is_error());
    }
}
