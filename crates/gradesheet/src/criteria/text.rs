//! Checks on free text: names, unit labels and written responses.

use crate::criteria::{CheckContext, CriterionResult};
use crate::feedback::FeedbackItem;
use crate::normalize::normalize_unit_text;
use crate::resolve::resolve;
use crate::workbook::address::CellAddress;
use crate::workbook::cell::CellValue;
use crate::workbook::sheet::Worksheet;

const NAME_PLACEHOLDERS: &[&str] = &["your name here", "enter name", "name"];

/// A student-entered name.
#[derive(Debug, Clone)]
pub struct NameCheck {
    pub prefix: String,
    pub address: CellAddress,
    pub points: f64,
    /// Names shorter than this earn half credit.
    pub min_len: Option<usize>,
}

impl NameCheck {
    pub fn new(prefix: &str, address: CellAddress, points: f64) -> Self {
        Self {
            prefix: prefix.to_string(),
            address,
            points,
            min_len: None,
        }
    }

    pub fn min_len(mut self, min_len: usize) -> Self {
        self.min_len = Some(min_len);
        self
    }

    pub fn check(&self, ctx: &CheckContext<'_>) -> CriterionResult {
        let name = resolve(ctx.sheet, &self.address.to_string());
        let is_placeholder = NAME_PLACEHOLDERS.contains(&name.to_lowercase().as_str());

        if name.is_empty() || is_placeholder {
            return CriterionResult::zero(
                self.points,
                FeedbackItem::new(format!("{}_MISSING", self.prefix)).cell(self.address),
            );
        }

        if self.min_len.is_some_and(|min| name.chars().count() < min) {
            return CriterionResult::new(
                self.points / 2.0,
                self.points,
                vec![FeedbackItem::new(format!("{}_TOO_SHORT", self.prefix)).with("name", name)],
            );
        }

        CriterionResult::full(
            self.points,
            FeedbackItem::new(format!("{}_PRESENT", self.prefix))
                .cell(self.address)
                .with("name", name),
        )
    }
}

/// A unit label such as `mcg/mg`, compared after unit normalization.
///
/// A label linked from elsewhere on the sheet (`=$Q$5`) is followed once.
#[derive(Debug, Clone)]
pub struct UnitLabelCheck {
    pub address: CellAddress,
    accepted: Vec<String>,
    pub points: f64,
    pub correct_code: String,
    pub incorrect_code: String,
}

impl UnitLabelCheck {
    pub fn new<I, S>(address: CellAddress, accepted: I, points: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            address,
            accepted: accepted
                .into_iter()
                .map(|s| normalize_unit_text(s.as_ref()))
                .collect(),
            points,
            correct_code: "UNIT_CORRECT".to_string(),
            incorrect_code: "UNIT_INCORRECT".to_string(),
        }
    }

    pub fn codes(mut self, correct: &str, incorrect: &str) -> Self {
        self.correct_code = correct.to_string();
        self.incorrect_code = incorrect.to_string();
        self
    }

    /// The normalized label found, `""` for a blank cell.
    pub fn found(&self, sheet: &Worksheet) -> String {
        normalize_unit_text(&resolve(sheet, &self.address.to_string()))
    }

    pub fn is_accepted(&self, found: &str) -> bool {
        !found.is_empty() && self.accepted.iter().any(|a| a == found)
    }

    pub fn check(&self, ctx: &CheckContext<'_>) -> CriterionResult {
        let found = self.found(ctx.sheet);
        if self.is_accepted(&found) {
            CriterionResult::full(
                self.points,
                FeedbackItem::new(&self.correct_code)
                    .cell(self.address)
                    .with("unit", found),
            )
        } else {
            CriterionResult::zero(
                self.points,
                FeedbackItem::new(&self.incorrect_code)
                    .cell(self.address)
                    .with("found", found)
                    .with("expected", self.accepted.clone()),
            )
        }
    }
}

const RESPONSE_ROWS: std::ops::RangeInclusive<u32> = 39..=54;
const RESPONSE_COLUMNS: [char; 6] = ['F', 'G', 'B', 'C', 'D', 'E'];
const RESPONSE_ANCHOR_ROW: u32 = 43;
const RESPONSE_ANCHOR_COLUMNS: [char; 3] = ['F', 'G', 'B'];
const RESPONSE_MIN_LEN: usize = 50;
const ANCHOR_MIN_LEN: usize = 30;

/// Instruction text printed on the worksheet, never a student answer.
const INSTRUCTION_FRAGMENTS: &[&str] = &[
    "lower bound",
    "upper bound",
    "68%",
    "answer:",
    "legend",
    "if a cell",
    "you should",
];

/// Locates the student's written paragraph near the empirical-rule block.
///
/// The longest non-instruction text over 50 characters in rows 39-54 wins.
/// The merged answer cell on row 43 is then considered with a lower bar of
/// 30 characters. Returns `None` when nothing qualifies.
pub fn find_written_response(sheet: &Worksheet) -> Option<String> {
    let mut found = String::new();

    for row in RESPONSE_ROWS {
        for column in RESPONSE_COLUMNS {
            let Some(text) = text_at(sheet, CellAddress::at(column, row)) else {
                continue;
            };
            let lower = text.to_lowercase();
            if INSTRUCTION_FRAGMENTS.iter().any(|f| lower.contains(f)) {
                continue;
            }
            if text.chars().count() > RESPONSE_MIN_LEN && text.len() > found.len() {
                found = text;
            }
        }
    }

    for column in RESPONSE_ANCHOR_COLUMNS {
        if let Some(text) = text_at(sheet, CellAddress::at(column, RESPONSE_ANCHOR_ROW)) {
            if text.len() > found.len() && text.chars().count() > ANCHOR_MIN_LEN {
                found = text;
            }
        }
    }

    (!found.is_empty()).then_some(found)
}

/// Trimmed text content that does not start with a digit.
fn text_at(sheet: &Worksheet, address: CellAddress) -> Option<String> {
    let cell = sheet.cell(address)?;
    let CellValue::Text(raw) = &cell.value else {
        return None;
    };
    let text = raw.trim().to_string();
    match text.chars().next() {
        Some(c) if !c.is_ascii_digit() => Some(text),
        _ => None,
    }
}
