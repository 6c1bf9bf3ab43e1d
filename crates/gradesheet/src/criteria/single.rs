use crate::criteria::{CheckContext, CriterionResult};
use crate::equivalence::{AnswerSpec, Classification, CreditTier, MatchReason};
use crate::feedback::FeedbackItem;
use crate::workbook::address::CellAddress;

const RANGE_OFFSET_HINT: &str =
    "Range is slightly off - use absolute references ($) when copying formulas";
const COMMA_HINT: &str =
    "Used comma instead of colon - B14,B63 only uses 2 cells, B14:B63 uses the full range";

/// Feedback code emitted for each outcome of a single-cell check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierCodes {
    pub full: String,
    pub high_partial: String,
    pub low_partial: String,
    pub wrong: String,
    pub missing: String,
}

impl TierCodes {
    /// `<PREFIX>_OK`, `<PREFIX>_PARTIAL` for both partial tiers,
    /// `<PREFIX>_WRONG` and `<PREFIX>_MISSING`.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            full: format!("{}_OK", prefix),
            high_partial: format!("{}_PARTIAL", prefix),
            low_partial: format!("{}_PARTIAL", prefix),
            wrong: format!("{}_WRONG", prefix),
            missing: format!("{}_MISSING", prefix),
        }
    }

    pub fn new(full: &str, high_partial: &str, low_partial: &str, wrong: &str, missing: &str) -> Self {
        Self {
            full: full.to_string(),
            high_partial: high_partial.to_string(),
            low_partial: low_partial.to_string(),
            wrong: wrong.to_string(),
            missing: missing.to_string(),
        }
    }

    pub fn code_for(&self, classification: &Classification) -> &str {
        match classification.tier {
            CreditTier::Full => &self.full,
            CreditTier::HighPartial => &self.high_partial,
            CreditTier::LowPartial => &self.low_partial,
            CreditTier::None if classification.is_missing() => &self.missing,
            CreditTier::None => &self.wrong,
        }
    }
}

/// One cell, one [`AnswerSpec`], one feedback item.
#[derive(Debug, Clone)]
pub struct SingleCellCheck {
    pub address: CellAddress,
    pub spec: AnswerSpec,
    pub points: f64,
    pub codes: TierCodes,
    quiet_on_full: bool,
}

impl SingleCellCheck {
    pub fn new(address: CellAddress, spec: AnswerSpec, points: f64, codes: TierCodes) -> Self {
        Self {
            address,
            spec,
            points,
            codes,
            quiet_on_full: false,
        }
    }

    /// Full credit earns points but no feedback line; the category summary
    /// already says so.
    pub fn quiet_on_full(mut self) -> Self {
        self.quiet_on_full = true;
        self
    }

    pub fn classify(&self, ctx: &CheckContext<'_>) -> Classification {
        ctx.engine.classify_cell(ctx.sheet, self.address, &self.spec)
    }

    pub fn check(&self, ctx: &CheckContext<'_>) -> CriterionResult {
        let classification = self.classify(ctx);
        self.result_for(&classification)
    }

    /// Scores an existing classification, so callers that need the tier for
    /// cross-cell feedback classify only once.
    pub fn result_for(&self, classification: &Classification) -> CriterionResult {
        let earned = self
            .spec
            .credit_scale()
            .points(classification.tier, self.points);

        if classification.tier.is_full() && self.quiet_on_full {
            return CriterionResult::new(earned, self.points, Vec::new());
        }

        let item = FeedbackItem::new(self.codes.code_for(classification)).cell(self.address);
        let item = describe_reason(item, &classification.reason);
        let item = match (classification.tier, self.spec.expected_form()) {
            (CreditTier::None, Some(expected)) if !classification.is_missing() => {
                item.with("expected", expected)
            }
            _ => item,
        };
        CriterionResult::new(earned, self.points, vec![item])
    }
}

/// Adds `reason` and `hint` parameters explaining a partial match.
pub(crate) fn describe_reason(item: FeedbackItem, reason: &MatchReason) -> FeedbackItem {
    match reason {
        MatchReason::RangeOffset { .. } => item
            .with("reason", "range_offset")
            .with("hint", RANGE_OFFSET_HINT),
        MatchReason::CommaNotColon => item
            .with("reason", "comma_not_colon")
            .with("hint", COMMA_HINT),
        MatchReason::ComputedValue { .. } => item
            .with("reason", "computed_value")
            .with(
                "hint",
                "The result is right but the formula does not use the expected cells",
            ),
        _ => item,
    }
}
