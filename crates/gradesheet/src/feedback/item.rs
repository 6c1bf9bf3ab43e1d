use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::workbook::cell::format_number;

/// One substitution value in a feedback item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedbackParam {
    Integer(i64),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl fmt::Display for FeedbackParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackParam::Integer(i) => write!(f, "{}", i),
            FeedbackParam::Number(n) => f.write_str(&format_number(*n)),
            FeedbackParam::Text(s) => f.write_str(s),
            FeedbackParam::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<&str> for FeedbackParam {
    fn from(value: &str) -> Self {
        FeedbackParam::Text(value.to_string())
    }
}

impl From<String> for FeedbackParam {
    fn from(value: String) -> Self {
        FeedbackParam::Text(value)
    }
}

impl From<&String> for FeedbackParam {
    fn from(value: &String) -> Self {
        FeedbackParam::Text(value.clone())
    }
}

impl From<i64> for FeedbackParam {
    fn from(value: i64) -> Self {
        FeedbackParam::Integer(value)
    }
}

impl From<u32> for FeedbackParam {
    fn from(value: u32) -> Self {
        FeedbackParam::Integer(i64::from(value))
    }
}

impl From<usize> for FeedbackParam {
    fn from(value: usize) -> Self {
        FeedbackParam::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for FeedbackParam {
    fn from(value: f64) -> Self {
        FeedbackParam::Number(value)
    }
}

impl From<Vec<String>> for FeedbackParam {
    fn from(value: Vec<String>) -> Self {
        FeedbackParam::List(value)
    }
}

/// A stable feedback code plus the values its message template needs.
///
/// Items are built once by a checker and never edited afterwards; the
/// builder methods consume and return the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub code: String,
    #[serde(default)]
    pub params: BTreeMap<String, FeedbackParam>,
}

impl FeedbackItem {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<FeedbackParam>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Shorthand for the common `cell` parameter.
    pub fn cell(self, address: impl fmt::Display) -> Self {
        self.with("cell", address.to_string())
    }

    pub fn param(&self, key: &str) -> Option<&FeedbackParam> {
        self.params.get(key)
    }

    /// `{key: value, ...}` form used when no template can render the item.
    pub fn params_text(&self) -> String {
        let body: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect();
        format!("{{{}}}", body.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_params_text() {
        let item = FeedbackItem::new("STAT_MEAN_PARTIAL")
            .cell("G18")
            .with("reason", "range_offset");
        assert_eq!(item.param("cell"), Some(&FeedbackParam::Text("G18".into())));
        assert_eq!(item.params_text(), "{cell: G18, reason: range_offset}");
        assert_eq!(FeedbackItem::new("X").params_text(), "{}");
    }

    #[test]
    fn test_param_display() {
        assert_eq!(FeedbackParam::from(24.0).to_string(), "24");
        assert_eq!(FeedbackParam::from(2.82).to_string(), "2.82");
        assert_eq!(FeedbackParam::from(17usize).to_string(), "17");
        let list = FeedbackParam::from(vec!["A40-32".to_string(), "5/9".to_string()]);
        assert_eq!(list.to_string(), "A40-32, 5/9");
    }

    #[test]
    fn test_item_json_shape() {
        let item = FeedbackItem::new("IA_PREDICTIONS_PARTIAL")
            .with("correct", 8usize)
            .with("total", 17usize);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["params"]["correct"], 8);
        let back: FeedbackItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }
}
