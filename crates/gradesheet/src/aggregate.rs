//! Category totals and their one-line summary.

use serde::Serialize;

use crate::criteria::CriterionResult;
use crate::feedback::FeedbackItem;

/// Comparison slack for sums of fractional credit.
const EPSILON: f64 = 1e-9;

/// Summary codes for one grading category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub all_correct: String,
    pub none_correct: String,
    pub partial: String,
    /// Used instead of `partial` when at least one criterion earned partial
    /// credit.
    pub partial_credit: Option<String>,
    /// A full score shows only the summary line.
    pub replace_on_full: bool,
}

impl Summary {
    /// `<PREFIX>_ALL_CORRECT`, `<PREFIX>_NONE_CORRECT`, `<PREFIX>_PARTIAL`.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            all_correct: format!("{}_ALL_CORRECT", prefix),
            none_correct: format!("{}_NONE_CORRECT", prefix),
            partial: format!("{}_PARTIAL", prefix),
            partial_credit: None,
            replace_on_full: false,
        }
    }

    pub fn replace_on_full(mut self) -> Self {
        self.replace_on_full = true;
        self
    }

    pub fn partial_credit(mut self, code: &str) -> Self {
        self.partial_credit = Some(code.to_string());
        self
    }
}

/// A category's final score and feedback, summary first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    pub score: f64,
    pub max: f64,
    pub feedback: Vec<FeedbackItem>,
}

impl CategoryScore {
    pub fn zero(max: f64, item: FeedbackItem) -> Self {
        Self {
            score: 0.0,
            max,
            feedback: vec![item],
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sums earned points, clamps to `[0, max]`, rounds to two decimals and puts
/// exactly one summary code in front of the criterion feedback.
pub fn aggregate<I>(results: I, max: f64, summary: &Summary) -> CategoryScore
where
    I: IntoIterator<Item = CriterionResult>,
{
    let mut earned = 0.0;
    let mut criteria = 0usize;
    let mut full = 0usize;
    let mut partial = 0usize;
    let mut details = Vec::new();

    for result in results {
        criteria += 1;
        if result.is_full() {
            full += 1;
        } else if result.is_partial() {
            partial += 1;
        }
        earned += result.earned;
        details.extend(result.feedback);
    }

    let score = round2(earned).clamp(0.0, max.max(0.0));

    let head = if max > 0.0 && score >= max - EPSILON {
        if summary.replace_on_full {
            details.clear();
        }
        FeedbackItem::new(&summary.all_correct)
            .with("score", score)
            .with("max", max)
    } else if score <= EPSILON {
        FeedbackItem::new(&summary.none_correct).with("possible", max)
    } else {
        match (&summary.partial_credit, partial > 0) {
            (Some(code), true) => FeedbackItem::new(code)
                .with("full_credit", full)
                .with("partial_credit", partial)
                .with("score", score)
                .with("max_score", max),
            _ => FeedbackItem::new(&summary.partial)
                .with("correct", full)
                .with("total", criteria)
                .with("earned", score)
                .with("max", max),
        }
    };

    let mut feedback = Vec::with_capacity(details.len() + 1);
    feedback.push(head);
    feedback.extend(details);

    CategoryScore {
        score,
        max,
        feedback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{CheckContext, RangeCheck};
    use crate::equivalence::{AnswerSpec, EquivalenceEngine, Requirement};
    use crate::feedback::FeedbackParam;
    use crate::workbook::address::{CellAddress, CellRange};
    use crate::workbook::cell::CellValue;
    use crate::workbook::sheet::Worksheet;
    use proptest::prelude::*;

    fn result(earned: f64, max: f64, code: &str) -> CriterionResult {
        CriterionResult::new(earned, max, vec![FeedbackItem::new(code)])
    }

    fn codes(score: &CategoryScore) -> Vec<&str> {
        score.feedback.iter().map(|f| f.code.as_str()).collect()
    }

    // ── Summaries ──

    #[test]
    fn test_all_correct_keeps_or_replaces_details() {
        let results = vec![result(3.0, 3.0, "PERCENTILE_OK"), result(3.0, 3.0, "PERCENTILE_OK")];
        let kept = aggregate(results.clone(), 6.0, &Summary::with_prefix("PERCENTILE"));
        assert_eq!(kept.score, 6.0);
        assert_eq!(codes(&kept), vec!["PERCENTILE_ALL_CORRECT", "PERCENTILE_OK", "PERCENTILE_OK"]);

        let replaced = aggregate(results, 6.0, &Summary::with_prefix("PERCENTILE").replace_on_full());
        assert_eq!(codes(&replaced), vec!["PERCENTILE_ALL_CORRECT"]);
    }

    #[test]
    fn test_none_and_partial_summaries() {
        let none = aggregate(vec![result(0.0, 3.0, "EMPIRICAL_LOWER_MISSING")], 3.0, &Summary::with_prefix("EMPIRICAL"));
        assert_eq!(codes(&none)[0], "EMPIRICAL_NONE_CORRECT");

        let partial = aggregate(
            vec![result(3.0, 3.0, "EMPIRICAL_LOWER_OK"), result(0.0, 3.0, "EMPIRICAL_UPPER_WRONG")],
            6.0,
            &Summary::with_prefix("EMPIRICAL"),
        );
        assert_eq!(partial.feedback[0].code, "EMPIRICAL_PARTIAL");
        assert_eq!(partial.feedback[0].param("correct"), Some(&FeedbackParam::Integer(1)));
        assert_eq!(partial.feedback.len(), 3);
    }

    #[test]
    fn test_partial_credit_code_when_any_partial() {
        let summary = Summary::with_prefix("STATS").partial_credit("STATS_PARTIAL_CREDIT");
        let score = aggregate(
            vec![result(2.0, 2.0, "STAT_MEAN_OK"), result(1.5, 2.0, "STAT_MEDIAN_PARTIAL")],
            24.0,
            &summary,
        );
        assert_eq!(score.score, 3.5);
        assert_eq!(score.feedback[0].code, "STATS_PARTIAL_CREDIT");
        assert_eq!(score.feedback[0].param("partial_credit"), Some(&FeedbackParam::Integer(1)));
    }

    #[test]
    fn test_clamped_to_max() {
        let score = aggregate(
            vec![result(2.0, 1.0, "CC22_FORMAT"), result(1.5, 1.0, "CC22_BONUS")],
            3.0,
            &Summary::with_prefix("CC22"),
        );
        assert_eq!(score.score, 3.0);
    }

    #[test]
    fn test_rounding_never_exceeds_uneven_max() {
        let score = aggregate(
            vec![result(10.0, 10.0, "CC22_FORMAT")],
            5.678,
            &Summary::with_prefix("CC22"),
        );
        assert!(score.score <= 5.678);
        assert_eq!(score.score, 5.678);
    }

    #[test]
    fn test_seventeen_cell_range_rounds_to_two_places() {
        let mut ws = Worksheet::new("Income Analysis");
        for row in 19..=35u32 {
            let text = if row < 27 {
                format!("=B30*D{}+B31", row)
            } else {
                "=B30".to_string()
            };
            ws.set_value(&format!("E{}", row), CellValue::Formula(text));
        }
        let engine = EquivalenceEngine::default();
        let check = RangeCheck::new(
            "IA_PREDICTIONS",
            CellRange::parse("E19:E35").unwrap(),
            6.0,
            |a: CellAddress| {
                let years = format!("D{}", a.row());
                AnswerSpec::new().require(
                    Requirement::new()
                        .refs(["B30", "B31", years.as_str()])
                        .operators("*+"),
                )
            },
        );
        let result = check.check(&CheckContext::new(&ws, &engine));
        let score = aggregate(vec![result], 6.0, &Summary::with_prefix("IA_PREDICTIONS"));
        assert_eq!(score.score, 2.82);
    }

    // ── Properties ──

    fn arb_results() -> impl Strategy<Value = Vec<(f64, f64)>> {
        prop::collection::vec((0.0f64..5.0, 0.5f64..5.0), 0..12)
            .prop_map(|v| v.into_iter().map(|(e, m)| (e.min(m), m)).collect())
    }

    fn build(pairs: &[(f64, f64)]) -> Vec<CriterionResult> {
        pairs.iter().map(|(e, m)| result(*e, *m, "X")).collect()
    }

    proptest! {
        #[test]
        fn prop_total_never_exceeds_max(pairs in arb_results(), max in 0.0f64..30.0) {
            let score = aggregate(build(&pairs), max, &Summary::with_prefix("X"));
            prop_assert!(score.score <= max + EPSILON);
            prop_assert!(score.score >= 0.0);
            prop_assert_eq!(score.feedback.len(), pairs.len() + 1);
        }

        #[test]
        fn prop_adding_correct_criterion_is_monotonic(
            pairs in arb_results(),
            extra in 0.5f64..5.0,
            max in 0.0f64..30.0,
        ) {
            let summary = Summary::with_prefix("X");
            let before = aggregate(build(&pairs), max, &summary).score;
            let mut more = build(&pairs);
            more.push(result(extra, extra, "X_OK"));
            let after = aggregate(more, max, &summary).score;
            prop_assert!(after >= before);
        }
    }
}
