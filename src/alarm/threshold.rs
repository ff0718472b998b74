//! User thresholds and their evaluation against readings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::value::{scan_number, suffix_multiplier};
use crate::data::{DataSnapshot, DataValue};
use crate::error::{StoreError, ThresholdError, ValidationError};
use crate::store::{keys, load, save, Storage, TabId};

/// Threshold suffixes, matched case-insensitively.
const THRESHOLD_SUFFIXES: &[(char, f64)] = &[('k', 1e3), ('m', 1e6), ('g', 1e9), ('b', 1e9)];

const USAGE: &str = "use a number with an optional k, m, g or b suffix, e.g. 123, -45.6, 100k, 1.5m, 2g, 1b";

/// A threshold set on one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdSpec {
    pub value: f64,
    /// Compare magnitudes instead of signed values.
    pub absolute: bool,
    /// The text the user typed, for display.
    pub original_input: String,
}

/// The outcome of comparing one reading with its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdResult {
    pub key: String,
    pub value: f64,
    pub threshold: f64,
    pub absolute: bool,
    pub is_above: bool,
    pub is_below: bool,
}

/// Parse threshold input: `[+-]digits[.digits][k|m|g|b]`, case-insensitive.
pub fn parse_threshold(raw: &str) -> Result<f64, ValidationError> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(ValidationError::new(raw, "empty input"));
    }
    let invalid = || ValidationError::new(raw, format!("invalid format, {USAGE}"));

    let lower = input.to_ascii_lowercase();
    let (number, suffix) = match lower.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&lower[..i], Some(c)),
        _ => (lower.as_str(), None),
    };

    let unsigned = number.strip_prefix(['+', '-']).unwrap_or(number);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (unsigned, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || frac_part.is_some_and(|f| !all_digits(f)) {
        return Err(invalid());
    }

    let multiplier = match suffix {
        None => 1.0,
        Some(c) => THRESHOLD_SUFFIXES
            .iter()
            .find(|(s, _)| *s == c)
            .map(|(_, m)| *m)
            .ok_or_else(invalid)?,
    };

    let value: f64 = number.parse().map_err(|_| invalid())?;
    Ok(value * multiplier)
}

/// The number a reading is compared as, if it has one.
///
/// Numbers are used as they are. Text has `,`, `%`, `$` and whitespace
/// removed and is then read as a leading number with an optional suffix.
/// Price cells count only when exactly one field is present.
pub fn coerce_number(value: &DataValue) -> Option<f64> {
    match value {
        DataValue::Number(n) => Some(*n),
        DataValue::Fields(fields) => fields.single(),
        DataValue::Text(text) => {
            let cleaned: String = text
                .chars()
                .filter(|c| !matches!(c, ',' | '%' | '$') && !c.is_whitespace())
                .collect();
            let (number, rest) = scan_number(&cleaned)?;
            let rest = rest.to_ascii_lowercase();
            Some(number * suffix_multiplier(&rest, THRESHOLD_SUFFIXES))
        }
    }
}

/// Whether `value` is at or beyond `threshold`.
pub fn is_above(value: f64, threshold: f64, absolute: bool) -> bool {
    if absolute {
        value.abs() >= threshold.abs()
    } else {
        value >= threshold
    }
}

/// Thresholds of one tab.
///
/// Changes are written to storage before they take effect; a failed write
/// leaves the engine unchanged.
#[derive(Debug, Clone)]
pub struct ThresholdEngine {
    tab: TabId,
    thresholds: BTreeMap<String, ThresholdSpec>,
}

impl ThresholdEngine {
    pub fn new(tab: TabId) -> Self {
        Self {
            tab,
            thresholds: BTreeMap::new(),
        }
    }

    /// Restore the thresholds saved for `tab`.
    pub async fn load(storage: &dyn Storage, tab: TabId) -> Result<Self, StoreError> {
        let thresholds = load(storage, &keys::thresholds(tab)).await?.unwrap_or_default();
        Ok(Self { tab, thresholds })
    }

    pub fn get(&self, key: &str) -> Option<&ThresholdSpec> {
        self.thresholds.get(key)
    }

    pub fn all(&self) -> &BTreeMap<String, ThresholdSpec> {
        &self.thresholds
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub async fn set_threshold(
        &mut self,
        storage: &dyn Storage,
        key: &str,
        raw: &str,
        absolute: bool,
    ) -> Result<ThresholdSpec, ThresholdError> {
        let spec = ThresholdSpec {
            value: parse_threshold(raw)?,
            absolute,
            original_input: raw.trim().to_string(),
        };

        let mut updated = self.thresholds.clone();
        updated.insert(key.to_string(), spec.clone());
        save(storage, &keys::thresholds(self.tab), &updated).await?;

        self.thresholds = updated;
        debug!(tab = self.tab, key, value = spec.value, absolute, "threshold set");
        Ok(spec)
    }

    /// Remove a threshold. Clearing a key without one is a no-op.
    pub async fn clear_threshold(&mut self, storage: &dyn Storage, key: &str) -> Result<(), StoreError> {
        if !self.thresholds.contains_key(key) {
            return Ok(());
        }
        let mut updated = self.thresholds.clone();
        updated.remove(key);
        save(storage, &keys::thresholds(self.tab), &updated).await?;

        self.thresholds = updated;
        debug!(tab = self.tab, key, "threshold cleared");
        Ok(())
    }

    /// Compare one reading. `None` without a threshold or a usable number.
    pub fn evaluate(&self, key: &str, value: &DataValue) -> Option<ThresholdResult> {
        let spec = self.thresholds.get(key)?;
        let value = coerce_number(value)?;
        let above = is_above(value, spec.value, spec.absolute);
        Some(ThresholdResult {
            key: key.to_string(),
            value,
            threshold: spec.value,
            absolute: spec.absolute,
            is_above: above,
            is_below: !above,
        })
    }

    /// Results for every key in the snapshot that has a threshold.
    pub fn evaluate_all(&self, snapshot: &DataSnapshot) -> BTreeMap<String, ThresholdResult> {
        snapshot
            .iter()
            .filter_map(|(key, value)| self.evaluate(key, value).map(|r| (key.to_string(), r)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OhlcFields;
    use crate::store::MemoryStore;

    #[test]
    fn test_parse_threshold_suffixes() {
        assert_eq!(parse_threshold("100k"), Ok(100_000.0));
        assert_eq!(parse_threshold("1.5M"), Ok(1_500_000.0));
        assert_eq!(parse_threshold("2g"), Ok(2e9));
        assert_eq!(parse_threshold(" 1B "), Ok(1e9));
        assert_eq!(parse_threshold("-45.6"), Ok(-45.6));
        assert_eq!(parse_threshold("+7"), Ok(7.0));
    }

    #[test]
    fn test_parse_threshold_rejects_bad_input() {
        assert_eq!(parse_threshold("  ").unwrap_err().reason, "empty input");
        for input in ["abc", "1.2.3", "5x", ".5", "5.", "--5", "1,000", "k"] {
            let err = parse_threshold(input).unwrap_err();
            assert!(err.reason.starts_with("invalid format"), "{input}");
        }
    }

    #[test]
    fn test_coerce_text_and_fields() {
        assert_eq!(coerce_number(&DataValue::Text("$1,234.5".into())), Some(1234.5));
        assert_eq!(coerce_number(&DataValue::Text("12.5 %".into())), Some(12.5));
        assert_eq!(coerce_number(&DataValue::Text("2.5 M".into())), Some(2_500_000.0));
        assert_eq!(coerce_number(&DataValue::Text("N/A".into())), None);

        let one = OhlcFields {
            close: Some(3.0),
            ..Default::default()
        };
        let two = OhlcFields {
            open: Some(1.0),
            close: Some(3.0),
            ..Default::default()
        };
        assert_eq!(coerce_number(&DataValue::Fields(one)), Some(3.0));
        assert_eq!(coerce_number(&DataValue::Fields(two)), None);
    }

    #[tokio::test]
    async fn test_100k_threshold() {
        let store = MemoryStore::new();
        let mut engine = ThresholdEngine::new(1);
        engine.set_threshold(&store, "Volume", "100k", false).await.unwrap();

        let at = engine.evaluate("Volume", &DataValue::Number(100_000.0)).unwrap();
        assert!(at.is_above);
        assert!(!at.is_below);

        let below = engine.evaluate("Volume", &DataValue::Number(99_999.0)).unwrap();
        assert!(below.is_below);
    }

    #[tokio::test]
    async fn test_absolute_threshold_is_symmetric() {
        let store = MemoryStore::new();
        let mut engine = ThresholdEngine::new(1);
        engine.set_threshold(&store, "MACD", "1000", true).await.unwrap();

        assert!(engine.evaluate("MACD", &DataValue::Number(-1000.0)).unwrap().is_above);
        assert!(engine.evaluate("MACD", &DataValue::Number(1000.0)).unwrap().is_above);
        assert!(!engine.evaluate("MACD", &DataValue::Number(-999.0)).unwrap().is_above);
    }

    #[tokio::test]
    async fn test_invalid_input_leaves_thresholds_unchanged() {
        let store = MemoryStore::new();
        let mut engine = ThresholdEngine::new(1);
        engine.set_threshold(&store, "RSI", "70", false).await.unwrap();

        let err = engine.set_threshold(&store, "RSI", "abc", false).await.unwrap_err();
        assert!(matches!(err, ThresholdError::Validation(_)));
        assert_eq!(engine.get("RSI").unwrap().value, 70.0);
        assert_eq!(engine.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_commits_nothing() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        let mut engine = ThresholdEngine::new(1);

        let err = engine.set_threshold(&store, "RSI", "70", false).await.unwrap_err();
        assert!(matches!(err, ThresholdError::Storage(_)));
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn test_thresholds_persist_and_clear_is_idempotent() {
        let store = MemoryStore::new();
        let mut engine = ThresholdEngine::new(2);
        engine.set_threshold(&store, "RSI", " 70 ", false).await.unwrap();
        engine.set_threshold(&store, "MACD", "-1.5k", true).await.unwrap();
        engine.clear_threshold(&store, "MACD").await.unwrap();
        engine.clear_threshold(&store, "MACD").await.unwrap();

        let restored = ThresholdEngine::load(&store, 2).await.unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.get("RSI").unwrap().original_input, "70");

        let stored = store.peek("thresholds_2").unwrap();
        assert_eq!(stored["RSI"]["originalInput"], "70");
    }

    #[tokio::test]
    async fn test_evaluate_all_only_keys_with_thresholds() {
        let store = MemoryStore::new();
        let mut engine = ThresholdEngine::new(1);
        engine.set_threshold(&store, "RSI", "70", false).await.unwrap();
        engine.set_threshold(&store, "Trend", "1", false).await.unwrap();

        let snapshot: DataSnapshot = [
            ("RSI", DataValue::Number(75.0)),
            ("EMA", DataValue::Number(1.0)),
            ("Trend", DataValue::Text("up".into())),
        ]
        .into_iter()
        .collect();

        let results = engine.evaluate_all(&snapshot);
        assert_eq!(results.len(), 1);
        assert!(results["RSI"].is_above);
    }
}
