use crate::criteria::{CheckContext, CriterionResult};
use crate::feedback::FeedbackItem;
use crate::workbook::address::CellAddress;
use crate::workbook::cell::GENERAL_FORMAT;

/// Display formats that show a whole number with no decimal places.
const ZERO_DECIMAL_FORMATS: &[&str] = &[
    "0",
    "0_",
    "0_)",
    "#,##0",
    "#,##0_",
    "#,##0_)",
    "0;-0;0",
    "#,##0;-#,##0;0",
    "#,##0;-#,##0",
    "#,##0_);(#,##0)",
    "#,##0_);[Red](#,##0)",
    "0_);(0)",
    "0_);[Red](0)",
    GENERAL_FORMAT,
];

/// What a cell's declared number format must look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatRule {
    /// A known zero-decimal pattern, or any pattern with a digit
    /// placeholder and no decimal marker.
    ZeroDecimal,
    /// A `$` pattern with no decimal places.
    CurrencyZeroDecimal,
    /// Two decimal places (`0.00`, `#,##0.00`).
    TwoDecimals,
    /// A currency or two-decimal pattern.
    Currency,
    /// An integer pattern. `General` counts.
    WholeNumber,
    Percent,
}

impl FormatRule {
    pub fn accepts(&self, format: &str) -> bool {
        let format = format.trim();
        match self {
            FormatRule::ZeroDecimal => {
                ZERO_DECIMAL_FORMATS.contains(&format) || placeholder_without_decimals(format)
            }
            FormatRule::CurrencyZeroDecimal => {
                format.contains('$') && placeholder_without_decimals(format)
            }
            FormatRule::TwoDecimals => format.contains(".00"),
            FormatRule::Currency => {
                let lower = format.to_lowercase();
                lower.contains('$') || lower.contains("currency") || lower.contains("0.00")
            }
            FormatRule::WholeNumber => {
                matches!(format, "0" | "#,##0" | GENERAL_FORMAT)
                    || (format.contains('0') && !format.contains('.'))
            }
            FormatRule::Percent => format.contains('%'),
        }
    }
}

fn placeholder_without_decimals(format: &str) -> bool {
    if format.contains(".0") || format.contains(".#") {
        return false;
    }
    format.contains('0') || format.contains('#')
}

#[derive(Debug, Clone)]
struct FormatGroup {
    cells: Vec<CellAddress>,
    rule: FormatRule,
    report_cells: bool,
}

/// Proportional credit for cells whose number format satisfies a rule.
///
/// Cells can be grouped under different rules; the score is the share of all
/// cells that pass, times `points`.
#[derive(Debug, Clone)]
pub struct FormatCheck {
    pub prefix: String,
    pub points: f64,
    label: Option<String>,
    groups: Vec<FormatGroup>,
}

/// Pass/fail counts for a [`FormatCheck`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatOutcome {
    pub correct: usize,
    pub total: usize,
    /// Failing cells that should be named in feedback, with the format found.
    pub reported: Vec<(CellAddress, String)>,
    /// The format of the first failing cell, reported or not.
    pub first_found: Option<String>,
}

impl FormatCheck {
    pub fn new(prefix: &str, points: f64) -> Self {
        Self {
            prefix: prefix.to_string(),
            points,
            label: None,
            groups: Vec::new(),
        }
    }

    /// Adds a `range` parameter to the summary codes.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Cells counted toward the score without per-cell feedback.
    pub fn group<I>(mut self, cells: I, rule: FormatRule) -> Self
    where
        I: IntoIterator<Item = CellAddress>,
    {
        self.groups.push(FormatGroup {
            cells: cells.into_iter().collect(),
            rule,
            report_cells: false,
        });
        self
    }

    /// Cells that also get a `<PREFIX>_CELL_WRONG` line when they fail.
    pub fn reported_group<I>(mut self, cells: I, rule: FormatRule) -> Self
    where
        I: IntoIterator<Item = CellAddress>,
    {
        self.groups.push(FormatGroup {
            cells: cells.into_iter().collect(),
            rule,
            report_cells: true,
        });
        self
    }

    pub fn evaluate(&self, ctx: &CheckContext<'_>) -> FormatOutcome {
        let mut outcome = FormatOutcome::default();
        for group in &self.groups {
            for &address in &group.cells {
                outcome.total += 1;
                let format = format_at(ctx, address);
                if group.rule.accepts(&format) {
                    outcome.correct += 1;
                    continue;
                }
                if outcome.first_found.is_none() {
                    outcome.first_found = Some(format.clone());
                }
                if group.report_cells {
                    outcome.reported.push((address, format));
                }
            }
        }
        outcome
    }

    pub fn check(&self, ctx: &CheckContext<'_>) -> CriterionResult {
        let outcome = self.evaluate(ctx);
        let earned = if outcome.total == 0 {
            0.0
        } else {
            outcome.correct as f64 / outcome.total as f64 * self.points
        };

        if outcome.total > 0 && outcome.correct == outcome.total {
            let item = FeedbackItem::new(format!("{}_ALL_CORRECT", self.prefix));
            return CriterionResult::full(self.points, self.labelled(item));
        }

        let summary = if outcome.correct == 0 {
            FeedbackItem::new(format!("{}_NONE_CORRECT", self.prefix))
                .with("total", outcome.total)
                .with("found", outcome.first_found.clone().unwrap_or_default())
        } else {
            FeedbackItem::new(format!("{}_PARTIAL", self.prefix))
                .with("correct", outcome.correct)
                .with("total", outcome.total)
        };

        let mut feedback = vec![self.labelled(summary)];
        feedback.extend(outcome.reported.iter().map(|(address, found)| {
            FeedbackItem::new(format!("{}_CELL_WRONG", self.prefix))
                .cell(address)
                .with("found", found.as_str())
        }));
        CriterionResult::new(earned, self.points, feedback)
    }

    /// All-or-nothing check of one cell, reporting the format found.
    pub fn single(
        ctx: &CheckContext<'_>,
        address: CellAddress,
        rule: FormatRule,
        points: f64,
        correct_code: &str,
        incorrect_code: &str,
    ) -> CriterionResult {
        let format = format_at(ctx, address);
        if rule.accepts(&format) {
            CriterionResult::full(points, FeedbackItem::new(correct_code).cell(address))
        } else {
            CriterionResult::zero(
                points,
                FeedbackItem::new(incorrect_code)
                    .cell(address)
                    .with("found", format),
            )
        }
    }

    fn labelled(&self, item: FeedbackItem) -> FeedbackItem {
        match &self.label {
            Some(label) => item.with("range", label.as_str()),
            None => item,
        }
    }
}

fn format_at(ctx: &CheckContext<'_>, address: CellAddress) -> String {
    ctx.sheet
        .cell(address)
        .map(|c| c.number_format.clone())
        .unwrap_or_else(|| GENERAL_FORMAT.to_string())
}
