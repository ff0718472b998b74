//! Cell values and the text-to-value classification used by the table parser.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Labels that mark a cell as a multi-field price cell.
const FIELD_LABELS: &[&str] = &["Open:", "High:", "Low:", "Close:"];

/// Magnitude suffixes accepted in cell text.
const CELL_SUFFIXES: &[(char, f64)] = &[
    ('k', 1e3),
    ('M', 1e6),
    ('m', 1e6),
    ('g', 1e9),
    ('b', 1e9),
    ('G', 1e9),
    ('B', 1e9),
];

/// Open/High/Low/Close sub-fields of a price cell. Fields that were not
/// present in the cell text stay `None` and are not serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OhlcFields {
    #[serde(rename = "Open", default, skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(rename = "High", default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(rename = "Low", default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(rename = "Close", default, skip_serializing_if = "Option::is_none")]
    pub close: Option<f64>,
}

impl OhlcFields {
    /// Parse every `Label: number` pair found in `text`.
    pub fn parse(text: &str) -> Self {
        let field = |label: &str| {
            let start = text.find(label)? + label.len();
            scan_number(text[start..].trim_start()).map(|(value, _)| value)
        };
        Self {
            open: field("Open:"),
            high: field("High:"),
            low: field("Low:"),
            close: field("Close:"),
        }
    }

    /// Present fields in Open, High, Low, Close order.
    pub fn present(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("Open", self.open),
            ("High", self.high),
            ("Low", self.low),
            ("Close", self.close),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }

    pub fn len(&self) -> usize {
        self.present().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The only present field, if exactly one is present.
    pub fn single(&self) -> Option<f64> {
        let mut present = self.present();
        match (present.next(), present.next()) {
            (Some((_, value)), None) => Some(value),
            _ => None,
        }
    }
}

/// A value read from a tooltip cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Number(f64),
    Fields(OhlcFields),
    Text(String),
}

impl DataValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            DataValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Short type name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            DataValue::Number(_) => "number",
            DataValue::Fields(_) => "fields",
            DataValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Number(n) => f.write_str(&format_magnitude(*n)),
            DataValue::Fields(fields) => {
                let parts: Vec<String> = fields
                    .present()
                    .map(|(name, value)| format!("{}: {}", name, format_magnitude(value)))
                    .collect();
                f.write_str(&parts.join(", "))
            }
            DataValue::Text(text) => f.write_str(text),
        }
    }
}

/// Classify the text of a value cell.
///
/// Multi-field price text becomes [`DataValue::Fields`], a leading number
/// with an optional magnitude suffix becomes [`DataValue::Number`], anything
/// else is kept as trimmed [`DataValue::Text`].
pub fn parse_cell_value(text: &str) -> DataValue {
    let text = text.trim();

    if FIELD_LABELS.iter().any(|label| text.contains(label)) {
        return DataValue::Fields(OhlcFields::parse(text));
    }

    match scan_number(text) {
        Some((value, rest)) => DataValue::Number(value * suffix_multiplier(rest, CELL_SUFFIXES)),
        None => DataValue::Text(text.to_string()),
    }
}

/// Read a signed decimal at the start of `text`, ignoring `,` group
/// separators. Returns the value and the unread remainder.
pub(crate) fn scan_number(text: &str) -> Option<(f64, &str)> {
    let bytes = text.as_bytes();
    let mut literal = String::new();
    let mut i = 0;

    if let Some(&sign @ (b'+' | b'-')) = bytes.first() {
        literal.push(sign as char);
        i = 1;
    }

    let mut seen_digit = false;
    let mut seen_dot = false;
    while i < bytes.len() {
        match bytes[i] {
            b @ b'0'..=b'9' => {
                literal.push(b as char);
                seen_digit = true;
            }
            b'.' if !seen_dot => {
                literal.push('.');
                seen_dot = true;
            }
            b',' if seen_digit => {}
            _ => break,
        }
        i += 1;
    }

    if !seen_digit {
        return None;
    }
    let value = literal.parse::<f64>().ok()?;
    Some((value, &text[i..]))
}

/// Multiplier for a suffix at the start of `rest`. A suffix that runs into
/// another letter ("5min") is not a suffix.
pub(crate) fn suffix_multiplier(rest: &str, suffixes: &[(char, f64)]) -> f64 {
    let mut chars = rest.chars();
    let Some(first) = chars.next() else {
        return 1.0;
    };
    if chars.next().is_some_and(|c| c.is_alphabetic()) {
        return 1.0;
    }
    suffixes
        .iter()
        .find(|(suffix, _)| *suffix == first)
        .map_or(1.0, |(_, multiplier)| *multiplier)
}

/// Format a value with a magnitude suffix: `1.50B`, `2.00M`, `1.5k`, `12.34`, `7`.
pub fn format_magnitude(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.1}k", value / 1e3)
    } else if value.fract() != 0.0 {
        format!("{:.2}", value)
    } else {
        format!("{}", value)
    }
}
