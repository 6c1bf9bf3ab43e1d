use crate::criteria::single::describe_reason;
use crate::criteria::{CheckContext, CriterionResult};
use crate::equivalence::{AnswerSpec, Classification, CreditTier, MatchReason};
use crate::feedback::FeedbackItem;
use crate::workbook::address::{CellAddress, CellRange};

/// Counts of per-cell outcomes across a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeTally {
    pub total: usize,
    pub full: usize,
    pub partial: usize,
    pub missing: usize,
    pub not_formula: usize,
    pub wrong: usize,
}

impl RangeTally {
    fn record(&mut self, classification: &Classification) {
        self.total += 1;
        match (&classification.tier, &classification.reason) {
            (CreditTier::Full, _) => self.full += 1,
            (CreditTier::HighPartial | CreditTier::LowPartial, _) => self.partial += 1,
            (CreditTier::None, MatchReason::Missing) => self.missing += 1,
            (CreditTier::None, MatchReason::NotFormula) => self.not_formula += 1,
            (CreditTier::None, _) => self.wrong += 1,
        }
    }
}

/// One cell of a range check.
#[derive(Debug, Clone, PartialEq)]
pub struct CellVerdict {
    pub address: CellAddress,
    pub classification: Classification,
    pub earned: f64,
}

/// Codes for the cells of a range that did not earn full credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissCodes {
    pub missing: String,
    pub not_formula: String,
    pub wrong: String,
}

impl MissCodes {
    /// `<PREFIX>_MISSING` for blanks, `<PREFIX>_WRONG` for everything else.
    pub fn with_prefix(prefix: &str) -> Self {
        let wrong = format!("{}_WRONG", prefix);
        Self {
            missing: format!("{}_MISSING", prefix),
            not_formula: wrong.clone(),
            wrong,
        }
    }

    pub fn new(missing: &str, not_formula: &str, wrong: &str) -> Self {
        Self {
            missing: missing.to_string(),
            not_formula: not_formula.to_string(),
            wrong: wrong.to_string(),
        }
    }

    fn code_for(&self, classification: &Classification) -> &str {
        match classification.reason {
            MatchReason::Missing => &self.missing,
            MatchReason::NotFormula => &self.not_formula,
            _ => &self.wrong,
        }
    }
}

/// Per-cell verdicts for a range plus the proportional score.
#[derive(Debug, Clone)]
pub struct RangeOutcome {
    pub range: CellRange,
    pub verdicts: Vec<CellVerdict>,
    pub tally: RangeTally,
    pub earned: f64,
    pub points: f64,
}

impl RangeOutcome {
    /// The one summary line for the whole range.
    pub fn rollup(&self, prefix: &str) -> FeedbackItem {
        let range = self.range.to_string();
        if self.tally.total > 0 && self.tally.full == self.tally.total {
            return FeedbackItem::new(format!("{}_ALL_CORRECT", prefix)).with("range", range);
        }
        if self.earned <= 0.0 {
            return FeedbackItem::new(format!("{}_NONE_CORRECT", prefix))
                .with("range", range)
                .with("total", self.tally.total);
        }
        let incorrect: Vec<String> = self
            .verdicts
            .iter()
            .filter(|v| !v.classification.tier.is_full())
            .map(|v| v.address.to_string())
            .collect();
        FeedbackItem::new(format!("{}_PARTIAL", prefix))
            .with("range", range)
            .with("correct", self.tally.full)
            .with("total", self.tally.total)
            .with("incorrect", incorrect)
    }

    pub fn into_result(self, prefix: &str) -> CriterionResult {
        let item = self.rollup(prefix);
        CriterionResult::new(self.earned, self.points, vec![item])
    }

    /// One result per cell, silent when the cell earned full credit, so a
    /// category summary can count cells rather than ranges.
    pub fn cell_results(&self, codes: &MissCodes) -> Vec<CriterionResult> {
        let per_cell = self.points / self.tally.total.max(1) as f64;
        self.verdicts
            .iter()
            .map(|v| {
                let feedback = if v.classification.tier.is_full() {
                    Vec::new()
                } else {
                    let item = FeedbackItem::new(codes.code_for(&v.classification))
                        .cell(v.address)
                        .with("row", v.address.row());
                    vec![describe_reason(item, &v.classification.reason)]
                };
                CriterionResult::new(v.earned, per_cell, feedback)
            })
            .collect()
    }
}

/// Applies one spec per cell across a range and splits the points evenly
/// between cells.
pub struct RangeCheck<F>
where
    F: Fn(CellAddress) -> AnswerSpec,
{
    pub prefix: String,
    pub range: CellRange,
    pub points: f64,
    spec_for: F,
}

impl<F> RangeCheck<F>
where
    F: Fn(CellAddress) -> AnswerSpec,
{
    /// `spec_for` builds the expectation for each cell, typically by
    /// substituting the cell's row.
    pub fn new(prefix: &str, range: CellRange, points: f64, spec_for: F) -> Self {
        Self {
            prefix: prefix.to_string(),
            range,
            points,
            spec_for,
        }
    }

    pub fn evaluate(&self, ctx: &CheckContext<'_>) -> RangeOutcome {
        let count = self.range.len().max(1) as f64;
        let per_cell = self.points / count;

        let mut tally = RangeTally::default();
        let mut earned = 0.0;
        let mut verdicts = Vec::with_capacity(self.range.len());

        for address in self.range.cells() {
            let spec = (self.spec_for)(address);
            let classification = ctx.engine.classify_cell(ctx.sheet, address, &spec);
            let cell_earned = spec.credit_scale().points(classification.tier, per_cell);
            earned += cell_earned;
            tally.record(&classification);
            verdicts.push(CellVerdict {
                address,
                classification,
                earned: cell_earned,
            });
        }

        RangeOutcome {
            range: self.range,
            verdicts,
            tally,
            earned,
            points: self.points,
        }
    }

    pub fn check(&self, ctx: &CheckContext<'_>) -> CriterionResult {
        self.evaluate(ctx).into_result(&self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equivalence::{EquivalenceEngine, Requirement};
    use crate::feedback::FeedbackParam;
    use crate::workbook::cell::CellValue;
    use crate::workbook::sheet::Worksheet;

    fn prediction_check() -> RangeCheck<impl Fn(CellAddress) -> AnswerSpec> {
        RangeCheck::new(
            "IA_PREDICTIONS",
            CellRange::parse("E19:E35").unwrap(),
            6.0,
            |address| {
                let years = format!("D{}", address.row());
                AnswerSpec::new().require(
                    Requirement::new()
                        .refs(["B30", "B31", years.as_str()])
                        .operators("*+"),
                )
            },
        )
    }

    fn sheet_with_correct_rows(correct: u32) -> Worksheet {
        let mut ws = Worksheet::new("Income Analysis");
        for row in 19..=35 {
            let formula = if row < 19 + correct {
                format!("=$B$30*D{}+$B$31", row)
            } else {
                "=B30*D19".to_string()
            };
            ws.set_value(&format!("E{}", row), CellValue::Formula(formula));
        }
        ws
    }

    fn evaluate(ws: &Worksheet) -> RangeOutcome {
        let engine = EquivalenceEngine::default();
        prediction_check().evaluate(&CheckContext::new(ws, &engine))
    }

    #[test]
    fn test_proportional_credit() {
        let outcome = evaluate(&sheet_with_correct_rows(8));
        assert_eq!(outcome.tally.full, 8);
        assert_eq!(outcome.tally.wrong, 9);
        assert!((outcome.earned - 8.0 / 17.0 * 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_rollup_code() {
        let ws = sheet_with_correct_rows(8);
        let engine = EquivalenceEngine::default();
        let result = prediction_check().check(&CheckContext::new(&ws, &engine));
        assert_eq!(result.feedback.len(), 1);
        let item = &result.feedback[0];
        assert_eq!(item.code, "IA_PREDICTIONS_PARTIAL");
        assert_eq!(item.param("correct"), Some(&FeedbackParam::Integer(8)));
        assert_eq!(item.param("total"), Some(&FeedbackParam::Integer(17)));
    }

    #[test]
    fn test_all_and_none() {
        let all = evaluate(&sheet_with_correct_rows(17));
        assert_eq!(all.rollup("IA_PREDICTIONS").code, "IA_PREDICTIONS_ALL_CORRECT");
        assert!((all.earned - 6.0).abs() < 1e-9);

        let none = evaluate(&Worksheet::new("Income Analysis"));
        assert_eq!(none.tally.missing, 17);
        assert_eq!(none.rollup("IA_PREDICTIONS").code, "IA_PREDICTIONS_NONE_CORRECT");
    }

    #[test]
    fn test_cell_results_report_only_misses() {
        let mut ws = sheet_with_correct_rows(16);
        ws.set_value("E35", CellValue::Number(51000.0));
        ws.set_value("E34", CellValue::Empty);
        let results = evaluate(&ws).cell_results(&MissCodes::new(
            "PRED_MISSING",
            "PRED_NOT_FORMULA",
            "PRED_WRONG",
        ));
        assert_eq!(results.len(), 17);
        assert!(results[..15].iter().all(|r| r.is_full() && r.feedback.is_empty()));
        assert_eq!(results[15].feedback[0].code, "PRED_MISSING");
        assert_eq!(results[16].feedback[0].code, "PRED_NOT_FORMULA");
        assert_eq!(
            results[16].feedback[0].param("row"),
            Some(&FeedbackParam::Integer(35))
        );
        let total: f64 = results.iter().map(|r| r.max).sum();
        assert!((total - 6.0).abs() < 1e-9);
    }
}
