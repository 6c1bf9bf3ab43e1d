use serde::Serialize;

use crate::config::EquivalenceConfig;
use crate::equivalence::spec::{tokens_of, AnswerSpec, RangeRule};
use crate::equivalence::tier::CreditTier;
use crate::equivalence::value::{NoValues, ValueLookup, ValueTolerance};
use crate::normalize::normalize;
use crate::workbook::address::{CellAddress, ReferenceToken};
use crate::workbook::sheet::Worksheet;

/// Why a candidate landed in its tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MatchReason {
    /// Equal to the expected form or an accepted alternate.
    Exact,
    /// Satisfied a structural requirement.
    Structure,
    PartialForm,
    RangeOffset { start_delta: i64, end_delta: i64 },
    ComputedValue { actual: f64, expected: f64 },
    CommaNotColon,
    Fallback,
    Missing,
    NotFormula,
    NoMatch,
}

/// Exactly one tier per evaluation, plus the evidence for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub tier: CreditTier,
    #[serde(flatten)]
    pub reason: MatchReason,
}

impl Classification {
    fn new(tier: CreditTier, reason: MatchReason) -> Self {
        Self { tier, reason }
    }

    fn none(reason: MatchReason) -> Self {
        Self::new(CreditTier::None, reason)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.reason, MatchReason::Missing)
    }
}

/// Pre-computed numbers available while classifying one candidate.
pub struct Evidence<'a> {
    /// The candidate cell's own cached result.
    pub cached: Option<f64>,
    /// Cached results of the cells an expected value depends on.
    pub values: &'a dyn ValueLookup,
}

impl Evidence<'static> {
    pub fn none() -> Self {
        Self {
            cached: None,
            values: &NoValues,
        }
    }
}

/// Classifies normalized candidates against [`AnswerSpec`]s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquivalenceEngine {
    range_offset_tolerance: u32,
    values: ValueTolerance,
}

impl Default for EquivalenceEngine {
    fn default() -> Self {
        Self {
            range_offset_tolerance: 3,
            values: ValueTolerance::default(),
        }
    }
}

impl EquivalenceEngine {
    pub fn new(range_offset_tolerance: u32, values: ValueTolerance) -> Self {
        Self {
            range_offset_tolerance,
            values,
        }
    }

    pub fn from_config(config: &EquivalenceConfig) -> Self {
        Self::new(
            config.range_offset_tolerance,
            ValueTolerance {
                relative: config.relative_tolerance,
                zero_absolute: config.zero_absolute_tolerance,
            },
        )
    }

    pub fn value_tolerance(&self) -> ValueTolerance {
        self.values
    }

    /// The tier alone, with no cached values available.
    pub fn tier_of(&self, candidate: &str, spec: &AnswerSpec) -> CreditTier {
        self.classify(candidate, spec, &Evidence::none()).tier
    }

    /// Classifies an already-normalized candidate.
    ///
    /// Full credit is decided first. Among the partial mechanisms the highest
    /// tier wins; equal tiers resolve in the order partial form, range
    /// offset, computed value, comma-for-colon, fallback.
    pub fn classify(&self, candidate: &str, spec: &AnswerSpec, evidence: &Evidence<'_>) -> Classification {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Classification::none(MatchReason::Missing);
        }

        if spec.accepted.iter().any(|form| form == candidate) {
            return Classification::new(CreditTier::Full, MatchReason::Exact);
        }

        let partial_form = spec
            .partial_forms
            .iter()
            .filter(|(form, _)| form == candidate)
            .map(|(_, tier)| *tier)
            .max();

        let Some(body) = candidate.strip_prefix('=') else {
            if let Some(tier) = partial_form {
                return Classification::new(tier, MatchReason::PartialForm);
            }
            let expects_formula = spec
                .accepted
                .first()
                .is_none_or(|form| form.starts_with('='));
            return Classification::none(if expects_formula {
                MatchReason::NotFormula
            } else {
                MatchReason::NoMatch
            });
        };

        let tokens = tokens_of(body);

        if spec
            .requirements
            .iter()
            .any(|req| req.is_satisfied(body, &tokens))
        {
            return Classification::new(CreditTier::Full, MatchReason::Structure);
        }

        let mut options: Vec<Classification> = Vec::new();
        if let Some(tier) = partial_form {
            options.push(Classification::new(tier, MatchReason::PartialForm));
        }
        if let Some(rule) = &spec.range_rule {
            if let Some((start_delta, end_delta)) = self.range_offset(body, &tokens, rule) {
                options.push(Classification::new(
                    CreditTier::HighPartial,
                    MatchReason::RangeOffset {
                        start_delta,
                        end_delta,
                    },
                ));
            }
        }
        if let Some(rule) = &spec.computed {
            if rule.gate.is_satisfied(body, &tokens) {
                if let (Some(actual), Some(expected)) =
                    (evidence.cached, rule.expected.evaluate(evidence.values))
                {
                    if self.values.matches(actual, expected) {
                        options.push(Classification::new(
                            rule.tier,
                            MatchReason::ComputedValue { actual, expected },
                        ));
                    }
                }
            }
        }
        if let Some(rule) = &spec.range_rule {
            if comma_not_colon(body, &tokens, rule) {
                options.push(Classification::new(
                    CreditTier::LowPartial,
                    MatchReason::CommaNotColon,
                ));
            }
        }
        if let Some((req, tier)) = &spec.fallback {
            if req.is_satisfied(body, &tokens) {
                options.push(Classification::new(*tier, MatchReason::Fallback));
            }
        }

        // First of the highest tier: `max_by_key` keeps the last maximum, so
        // walk the options in reverse.
        options
            .into_iter()
            .rev()
            .max_by_key(|c| c.tier)
            .filter(|c| c.tier != CreditTier::None)
            .unwrap_or_else(|| Classification::none(MatchReason::NoMatch))
    }

    /// Reads, normalizes and classifies one cell. The cell's cached result
    /// and the rest of the sheet serve as evidence for computed values.
    pub fn classify_cell(&self, sheet: &Worksheet, address: CellAddress, spec: &AnswerSpec) -> Classification {
        let Some(cell) = sheet.cell(address) else {
            return Classification::none(MatchReason::Missing);
        };
        if cell.value.is_empty() {
            return Classification::none(MatchReason::Missing);
        }
        let cached = if cell.value.is_formula() {
            cell.numeric_value()
        } else {
            None
        };
        let evidence = Evidence {
            cached,
            values: sheet,
        };
        self.classify(&normalize(&cell.value), spec, &evidence)
    }

    /// Row deltas of the first range on the expected column when both
    /// endpoints drifted by at most the tolerance in the same direction.
    fn range_offset(&self, body: &str, tokens: &[ReferenceToken], rule: &RangeRule) -> Option<(i64, i64)> {
        if !rule.gate.is_satisfied(body, tokens) {
            return None;
        }
        let tolerance = i64::from(self.range_offset_tolerance);
        joined_pairs(body, tokens, rule.expected.column, ":").find_map(|(a, b)| {
            let start_delta = i64::from(a.row) - i64::from(rule.expected.start);
            let end_delta = i64::from(b.row) - i64::from(rule.expected.end);
            let within = start_delta.abs() <= tolerance && end_delta.abs() <= tolerance;
            let exact = start_delta == 0 && end_delta == 0;
            let opposed = start_delta.signum() * end_delta.signum() < 0;
            (within && !exact && !opposed).then_some((start_delta, end_delta))
        })
    }
}

fn comma_not_colon(body: &str, tokens: &[ReferenceToken], rule: &RangeRule) -> bool {
    rule.gate.is_satisfied(body, tokens)
        && joined_pairs(body, tokens, rule.expected.column, ",")
            .next()
            .is_some()
}

/// Adjacent references on `column` separated by exactly `joiner`.
fn joined_pairs<'a>(
    body: &'a str,
    tokens: &'a [ReferenceToken],
    column: u32,
    joiner: &'a str,
) -> impl Iterator<Item = (&'a ReferenceToken, &'a ReferenceToken)> + 'a {
    tokens.windows(2).filter_map(move |pair| {
        let (a, b) = (&pair[0], &pair[1]);
        let between = body.get(a.end..b.start)?;
        (between == joiner && a.column == column && b.column == column).then_some((a, b))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equivalence::spec::{RangeExpectation, Requirement};
    use crate::equivalence::tier::CreditScale;
    use crate::equivalence::value::ValueExpr;
    use crate::normalize::normalize_text;
    use crate::workbook::cell::{CachedValue, Cell, CellValue};
    use proptest::prelude::*;

    fn engine() -> EquivalenceEngine {
        EquivalenceEngine::default()
    }

    fn classify(formula: &str, spec: &AnswerSpec) -> Classification {
        engine().classify(&normalize_text(formula), spec, &Evidence::none())
    }

    fn average_spec() -> AnswerSpec {
        let range = RangeExpectation::new("B", 14, 63);
        let gate = Requirement::new().leading_function(["AVERAGE"]);
        AnswerSpec::new()
            .accept("=AVERAGE(B14:B63)")
            .require(gate.clone().range(range))
            .range_rule(range, gate)
    }

    fn prediction_spec() -> AnswerSpec {
        AnswerSpec::new()
            .accept("=B30*D19+B31")
            .require(Requirement::new().refs(["B30", "B31", "D19"]).operators("*+"))
    }

    // ── Full credit ──

    #[test]
    fn test_required_tokens_give_full() {
        let c = classify("=B30*D19+B31", &prediction_spec());
        assert_eq!(c.tier, CreditTier::Full);
        let c = classify("=$B$31 + $B$30*D19", &prediction_spec());
        assert_eq!(c.tier, CreditTier::Full);
        assert_eq!(c.reason, MatchReason::Structure);
    }

    #[test]
    fn test_alternate_forms_give_full() {
        let spec = AnswerSpec::new().accept_all(["=B4*C19", "=C19*B4"]);
        assert_eq!(classify("=c19*$b$4", &spec).tier, CreditTier::Full);
        assert_eq!(classify("=(B4*C19)", &spec).tier, CreditTier::Full);
    }

    // ── Range offset and comma ──

    #[test]
    fn test_range_offset_is_high_partial() {
        let c = classify("=AVERAGE(B15:B64)", &average_spec());
        assert_eq!(c.tier, CreditTier::HighPartial);
        assert_eq!(
            c.reason,
            MatchReason::RangeOffset {
                start_delta: 1,
                end_delta: 1
            }
        );
        let points = average_spec().credit_scale().points(c.tier, 2.0);
        assert_eq!(points, 1.5);
    }

    #[test]
    fn test_comma_not_colon_is_low_partial() {
        let c = classify("=AVERAGE(B14,B63)", &average_spec());
        assert_eq!(c.tier, CreditTier::LowPartial);
        assert_eq!(c.reason, MatchReason::CommaNotColon);
    }

    #[test]
    fn test_range_offset_limits() {
        let spec = average_spec();
        assert_eq!(classify("=AVERAGE(B17:B66)", &spec).tier, CreditTier::HighPartial);
        assert_eq!(classify("=AVERAGE(B18:B67)", &spec).tier, CreditTier::None);
        // Only one endpoint within reach.
        assert_eq!(classify("=AVERAGE(B14:B70)", &spec).tier, CreditTier::None);
        // Endpoints moved in opposite directions.
        assert_eq!(classify("=AVERAGE(B13:B64)", &spec).tier, CreditTier::None);
        // Right range, wrong column.
        assert_eq!(classify("=AVERAGE(C15:C64)", &spec).tier, CreditTier::None);
    }

    #[test]
    fn test_range_rules_need_the_gate() {
        assert_eq!(classify("=MEDIAN(B15:B64)", &average_spec()).tier, CreditTier::None);
        assert_eq!(classify("=MEDIAN(B14,B63)", &average_spec()).tier, CreditTier::None);
    }

    // ── Computed values ──

    fn conversion_sheet(actual: f64) -> Worksheet {
        let mut ws = Worksheet::new("Currency Conversion");
        ws.set_value("B4", CellValue::Number(200.0));
        ws.set_value("C19", CellValue::Number(1.0));
        ws.set(
            CellAddress::parse("C20").unwrap(),
            Cell::new(CellValue::Formula("=200*C19".into())).with_cached(CachedValue::Number(actual)),
        );
        ws
    }

    fn conversion_spec() -> AnswerSpec {
        let b4 = CellAddress::parse("B4").unwrap();
        let c19 = CellAddress::parse("C19").unwrap();
        AnswerSpec::new()
            .accept_all(["=B4*C19", "=C19*B4"])
            .require(Requirement::new().refs(["B4", "C19"]).operators("*"))
            .computed(ValueExpr::cell(b4).mul(ValueExpr::cell(c19)), Requirement::new())
    }

    #[test]
    fn test_computed_value_at_tolerance_edge_is_inclusive() {
        let c20 = CellAddress::parse("C20").unwrap();
        let ws = conversion_sheet(202.0);
        let c = engine().classify_cell(&ws, c20, &conversion_spec());
        assert_eq!(c.tier, CreditTier::HighPartial);
        assert!(matches!(c.reason, MatchReason::ComputedValue { .. }));

        let ws = conversion_sheet(202.01);
        let c = engine().classify_cell(&ws, c20, &conversion_spec());
        assert_eq!(c.tier, CreditTier::None);
    }

    #[test]
    fn test_computed_value_unreachable_without_cache() {
        let spec = conversion_spec();
        assert_eq!(engine().tier_of("=200*C19", &spec), CreditTier::None);
    }

    // ── Other partials ──

    #[test]
    fn test_partial_forms_and_fallback() {
        let scale = CreditScale::new(2.0 / 3.0, 1.0 / 3.0);
        let spec = AnswerSpec::new()
            .accept("=SLOPE(B19:B26,A19:A26)")
            .partial("=SLOPE(A19:A26,B19:B26)", CreditTier::HighPartial)
            .fallback(Requirement::new().functions(["SLOPE"]), CreditTier::LowPartial)
            .scale(scale);

        assert_eq!(classify("=SLOPE(A19:A26,B19:B26)", &spec).tier, CreditTier::HighPartial);
        let c = classify("=SLOPE(B19:B25,A19:A25)", &spec);
        assert_eq!(c.tier, CreditTier::LowPartial);
        assert_eq!(c.reason, MatchReason::Fallback);
        assert!((scale.points(c.tier, 3.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_and_not_formula() {
        let spec = prediction_spec();
        assert_eq!(classify("", &spec).reason, MatchReason::Missing);
        assert_eq!(classify("   ", &spec).reason, MatchReason::Missing);
        assert_eq!(classify("51234", &spec).reason, MatchReason::NotFormula);
        let units = AnswerSpec::new().accept("mcg/mg");
        assert_eq!(classify("mg/mcg", &units).reason, MatchReason::NoMatch);
    }

    #[test]
    fn test_classify_cell_blank_is_missing() {
        let ws = Worksheet::new("Analysis");
        let c = engine().classify_cell(&ws, CellAddress::parse("G18").unwrap(), &average_spec());
        assert!(c.is_missing());
        assert_eq!(c.tier, CreditTier::None);
    }

    proptest! {
        #[test]
        fn accepted_form_is_never_downgraded(start in 10u32..20, end in 60u32..70) {
            let form = format!("=AVERAGE(B{}:B{})", start, end);
            let spec = average_spec()
                .accept(&form)
                .partial(&form, CreditTier::LowPartial);
            prop_assert_eq!(classify(&form, &spec).tier, CreditTier::Full);
        }

        #[test]
        fn classification_is_deterministic(body in "[A-D0-9:,()+*/-]{0,20}") {
            let formula = format!("=AVERAGE({})", body);
            let a = classify(&formula, &average_spec());
            let b = classify(&formula, &average_spec());
            prop_assert_eq!(a, b);
        }
    }
}
