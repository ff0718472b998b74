use std::collections::HashMap;

use super::ThresholdResult;

/// Last known side of the threshold for a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlarmState {
    #[default]
    Normal,
    Above,
}

/// Turns level readings into alarm edges.
///
/// A key triggers when it is above its threshold and was not above on the
/// previous evaluation. State is kept in memory only.
#[derive(Debug, Default)]
pub struct AlarmEdgeDetector {
    states: HashMap<String, AlarmState>,
}

impl AlarmEdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the results and return the keys that just crossed above.
    pub fn process<'a>(&mut self, results: impl IntoIterator<Item = &'a ThresholdResult>) -> Vec<String> {
        let mut triggered = Vec::new();
        for result in results {
            let next = if result.is_above {
                AlarmState::Above
            } else {
                AlarmState::Normal
            };
            let previous = self.states.insert(result.key.clone(), next).unwrap_or_default();
            if next == AlarmState::Above && previous != AlarmState::Above {
                triggered.push(result.key.clone());
            }
        }
        triggered
    }

    pub fn state(&self, key: &str) -> AlarmState {
        self.states.get(key).copied().unwrap_or_default()
    }

    /// Forget a key so its next crossing triggers again.
    pub fn reset_state(&mut self, key: &str) {
        self.states.remove(key);
    }

    pub fn reset_all(&mut self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(key: &str, is_above: bool) -> ThresholdResult {
        ThresholdResult {
            key: key.to_string(),
            value: 0.0,
            threshold: 0.0,
            absolute: false,
            is_above,
            is_below: !is_above,
        }
    }

    #[test]
    fn test_triggers_only_on_rising_edge() {
        let mut detector = AlarmEdgeDetector::new();
        let sequence = [false, true, true, false, true];

        let fired: Vec<usize> = sequence
            .iter()
            .enumerate()
            .filter(|(_, above)| !detector.process([&result("RSI", **above)]).is_empty())
            .map(|(i, _)| i + 1)
            .collect();

        assert_eq!(fired, vec![2, 5]);
    }

    #[test]
    fn test_reset_allows_refire() {
        let mut detector = AlarmEdgeDetector::new();
        assert_eq!(detector.process([&result("RSI", true)]), vec!["RSI"]);
        assert!(detector.process([&result("RSI", true)]).is_empty());

        detector.reset_state("RSI");
        assert_eq!(detector.state("RSI"), AlarmState::Normal);
        assert_eq!(detector.process([&result("RSI", true)]), vec!["RSI"]);

        detector.reset_all();
        assert_eq!(detector.process([&result("RSI", true)]), vec!["RSI"]);
    }

    #[test]
    fn test_keys_are_independent() {
        let mut detector = AlarmEdgeDetector::new();
        let first = [result("RSI", true), result("EMA", false)];
        assert_eq!(detector.process(&first), vec!["RSI"]);

        let second = [result("RSI", true), result("EMA", true)];
        assert_eq!(detector.process(&second), vec!["EMA"]);
        assert_eq!(detector.state("RSI"), AlarmState::Above);
    }
}
