use serde::{Deserialize, Serialize};

/// The raw content of a cell as stored in the document.
///
/// Formula text always keeps its leading `=`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Formula(String),
    Boolean(bool),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula(_))
    }

    pub fn as_formula(&self) -> Option<&str> {
        match self {
            CellValue::Formula(f) => Some(f.as_str()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A formula result the spreadsheet application saved alongside the formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CachedValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub cached: Option<CachedValue>,
    pub number_format: String,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            value: CellValue::Empty,
            cached: None,
            number_format: GENERAL_FORMAT.to_string(),
        }
    }
}

pub const GENERAL_FORMAT: &str = "General";

impl Cell {
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    pub fn with_cached(mut self, cached: CachedValue) -> Self {
        self.cached = Some(cached);
        self
    }

    pub fn with_format(mut self, number_format: impl Into<String>) -> Self {
        self.number_format = number_format.into();
        self
    }

    /// The numeric value a reader of the sheet would see: the literal for a
    /// number cell, the cached result for a formula cell.
    pub fn numeric_value(&self) -> Option<f64> {
        match &self.value {
            CellValue::Number(n) => Some(*n),
            CellValue::Formula(_) => match &self.cached {
                Some(CachedValue::Number(n)) => Some(*n),
                _ => None,
            },
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            CellValue::Empty | CellValue::Boolean(_) => None,
        }
    }

    /// Text as displayed, preferring the cached result of a formula and
    /// falling back to its formula text.
    pub fn display_text(&self) -> String {
        match &self.value {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(b) => bool_text(*b).to_string(),
            CellValue::Formula(f) => match &self.cached {
                Some(CachedValue::Number(n)) => format_number(*n),
                Some(CachedValue::Text(s)) => s.clone(),
                Some(CachedValue::Boolean(b)) => bool_text(*b).to_string(),
                Some(CachedValue::Error(_)) | None => f.clone(),
            },
        }
    }
}

pub(crate) fn bool_text(b: bool) -> &'static str {
    if b {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Renders a number the way a plain spreadsheet cell shows it: integral
/// values without a fractional part, everything else with the shortest
/// round-tripping representation.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
