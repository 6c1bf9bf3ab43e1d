//! Income Analysis: linear regression of salary on years of experience.

use crate::aggregate::{aggregate, Summary};
use crate::assignments::{CategoryReport, CategorySlot};
use crate::criteria::{
    ChartInspection, CheckContext, CriterionResult, FormatCheck, FormatRule, NameCheck,
    RangeCheck, RangeOutcome, ScatterChartCheck, SingleCellCheck, TierCodes,
};
use crate::equivalence::{AnswerSpec, CreditScale, CreditTier, MatchReason, Requirement};
use crate::feedback::FeedbackItem;
use crate::workbook::address::{CellAddress, CellRange};

pub const CATEGORIES: &[CategorySlot] = &[
    NAME,
    SLOPE_INTERCEPT,
    PREDICTIONS,
    SCATTER_CHART,
    SCATTER_TRENDLINE,
];

const NAME: CategorySlot = CategorySlot::new("name", 3, 1.0);
const SLOPE_INTERCEPT: CategorySlot = CategorySlot::new("slope_intercept", 4, 7.0);
const PREDICTIONS: CategorySlot = CategorySlot::new("predictions", 5, 7.0);
const SCATTER_CHART: CategorySlot = CategorySlot::new("scatterplot_chart", 6, 6.0);
const SCATTER_TRENDLINE: CategorySlot = CategorySlot::new("scatterplot_trendline", 7, 2.0);

const NAME_CELL: CellAddress = CellAddress::at('B', 1);
const SLOPE_CELL: CellAddress = CellAddress::at('B', 30);
const INTERCEPT_CELL: CellAddress = CellAddress::at('B', 31);
const PREDICTION_RANGE: CellRange = CellRange::column('E', 19, 35);

/// Reversed arguments keep two thirds, any other use of the function one
/// third.
const REGRESSION_SCALE: CreditScale = CreditScale::new(2.0 / 3.0, 1.0 / 3.0);

const REGRESSION_POINTS: f64 = 3.0;
const REGRESSION_FORMAT_POINTS: f64 = 0.5;
const PREDICTION_POINTS: f64 = 6.0;
const PREDICTION_FORMAT_POINTS: f64 = 1.0;

/// Years of experience (x) in column A, salary (y) in column B.
const X_COLUMN: u32 = 1;
const Y_COLUMN: u32 = 2;

pub fn grade(ctx: &CheckContext<'_>, charts: &ChartInspection) -> Vec<CategoryReport> {
    let name = NameCheck::new("IA_NAME", NAME_CELL, NAME.max).check(ctx);
    let (chart, trendline) =
        ScatterChartCheck::new("IA_SCATTER", *charts, X_COLUMN, Y_COLUMN).check(ctx.sheet);

    vec![
        NAME.report(aggregate([name], NAME.max, &Summary::with_prefix("IA_NAME"))),
        SLOPE_INTERCEPT.report(aggregate(
            slope_intercept(ctx),
            SLOPE_INTERCEPT.max,
            &Summary::with_prefix("IA_SLOPE_INTERCEPT"),
        )),
        PREDICTIONS.report(aggregate(
            predictions(ctx),
            PREDICTIONS.max,
            &Summary::with_prefix("IA_PREDICTIONS_TOTAL"),
        )),
        SCATTER_CHART.report(aggregate(
            [chart],
            SCATTER_CHART.max,
            &Summary::with_prefix("IA_SCATTER_CHART"),
        )),
        SCATTER_TRENDLINE.report(aggregate(
            [trendline],
            SCATTER_TRENDLINE.max,
            &Summary::with_prefix("IA_SCATTER_TRENDLINE"),
        )),
    ]
}

/// `=SLOPE(B19:B26,A19:A26)` style spec for a regression function.
fn regression_spec(function: &str) -> AnswerSpec {
    AnswerSpec::new()
        .accept(&format!("={}(B19:B26,A19:A26)", function))
        .partial(&format!("={}(A19:A26,B19:B26)", function), CreditTier::HighPartial)
        .fallback(Requirement::new().functions([function]), CreditTier::LowPartial)
        .scale(REGRESSION_SCALE)
}

fn regression_check(function: &str, address: CellAddress) -> SingleCellCheck {
    let prefix = format!("IA_{}", function);
    SingleCellCheck::new(
        address,
        regression_spec(function),
        REGRESSION_POINTS,
        TierCodes::new(
            &format!("{}_CORRECT", prefix),
            &format!("{}_REVERSED", prefix),
            &format!("{}_WRONG_RANGE", prefix),
            &format!("{}_MISSING", prefix),
            &format!("{}_MISSING", prefix),
        ),
    )
}

fn slope_intercept(ctx: &CheckContext<'_>) -> Vec<CriterionResult> {
    let slope = regression_check("SLOPE", SLOPE_CELL);
    let intercept = regression_check("INTERCEPT", INTERCEPT_CELL);
    let slope_class = slope.classify(ctx);
    let intercept_class = intercept.classify(ctx);

    let mut results = Vec::with_capacity(5);
    let both_reversed = [&slope_class, &intercept_class]
        .iter()
        .all(|c| c.reason == MatchReason::PartialForm);
    if both_reversed {
        results.push(CriterionResult::new(
            0.0,
            0.0,
            vec![FeedbackItem::new("IA_XY_DATA_SWAPPED").with(
                "note",
                "Both functions take the y values (B19:B26) first and the x values (A19:A26) second",
            )],
        ));
    }

    results.push(slope.result_for(&slope_class));
    results.push(FormatCheck::single(
        ctx,
        SLOPE_CELL,
        FormatRule::ZeroDecimal,
        REGRESSION_FORMAT_POINTS,
        "IA_SLOPE_FORMAT_CORRECT",
        "IA_SLOPE_FORMAT_INCORRECT",
    ));
    results.push(intercept.result_for(&intercept_class));
    results.push(FormatCheck::single(
        ctx,
        INTERCEPT_CELL,
        FormatRule::ZeroDecimal,
        REGRESSION_FORMAT_POINTS,
        "IA_INTERCEPT_FORMAT_CORRECT",
        "IA_INTERCEPT_FORMAT_INCORRECT",
    ));
    results
}

/// `=B30*D{row}+B31` in every prediction row.
fn prediction_spec(address: CellAddress) -> AnswerSpec {
    let years = CellAddress::at('D', address.row()).to_string();
    AnswerSpec::new()
        .accept(&format!("=B30*{}+B31", years))
        .require(
            Requirement::new()
                .refs(["B30", "B31", years.as_str()])
                .operators("*+"),
        )
}

fn predictions(ctx: &CheckContext<'_>) -> Vec<CriterionResult> {
    let outcome = RangeCheck::new(
        "IA_PREDICTIONS",
        PREDICTION_RANGE,
        PREDICTION_POINTS,
        prediction_spec,
    )
    .evaluate(ctx);
    let rollup = prediction_rollup(ctx, &outcome);
    let values = CriterionResult::new(outcome.earned, outcome.points, rollup);

    let format = FormatCheck::new("IA_PRED_FORMAT", PREDICTION_FORMAT_POINTS)
        .label(PREDICTION_RANGE.to_string())
        .group(PREDICTION_RANGE.cells(), FormatRule::CurrencyZeroDecimal)
        .check(ctx);

    vec![values, format]
}

/// Why prediction rows failed, grouped so the student sees one line per
/// kind of mistake.
#[derive(Debug, Default, PartialEq, Eq)]
struct PredictionIssues {
    not_formulas: usize,
    missing_refs: usize,
    missing_years: usize,
}

fn prediction_issues(ctx: &CheckContext<'_>, outcome: &RangeOutcome) -> PredictionIssues {
    let coefficients = AnswerSpec::new().require(Requirement::new().refs(["B30", "B31"]));
    let mut issues = PredictionIssues::default();
    for verdict in outcome.verdicts.iter().filter(|v| !v.classification.tier.is_full()) {
        match verdict.classification.reason {
            MatchReason::Missing | MatchReason::NotFormula => issues.not_formulas += 1,
            _ => {
                let has_coefficients = ctx
                    .engine
                    .classify_cell(ctx.sheet, verdict.address, &coefficients)
                    .tier
                    .is_full();
                if has_coefficients {
                    issues.missing_years += 1;
                } else {
                    issues.missing_refs += 1;
                }
            }
        }
    }
    issues
}

fn prediction_rollup(ctx: &CheckContext<'_>, outcome: &RangeOutcome) -> Vec<FeedbackItem> {
    let range = outcome.range.to_string();
    if outcome.tally.full == outcome.tally.total {
        return vec![FeedbackItem::new("IA_PREDICTIONS_ALL_CORRECT").with("range", range)];
    }

    let issues = prediction_issues(ctx, outcome);

    if outcome.tally.full == 0 {
        let mut feedback = Vec::new();
        if issues.not_formulas > 0 {
            feedback.push(
                FeedbackItem::new("IA_PREDICTIONS_NOT_FORMULAS")
                    .with("count", issues.not_formulas)
                    .with("range", range.as_str()),
            );
        }
        if issues.missing_refs > 0 {
            feedback.push(
                FeedbackItem::new("IA_PREDICTIONS_MISSING_REFS")
                    .with("count", issues.missing_refs)
                    .with("range", range.as_str())
                    .with("expected", "B30 (slope) and B31 (intercept)"),
            );
        }
        if issues.missing_years > 0 {
            feedback.push(
                FeedbackItem::new("IA_PREDICTIONS_MISSING_YEARS")
                    .with("count", issues.missing_years)
                    .with("range", range.as_str()),
            );
        }
        if feedback.is_empty() {
            feedback.push(FeedbackItem::new("IA_PREDICTIONS_NONE_CORRECT").with("range", range));
        }
        return feedback;
    }

    let mut details = Vec::new();
    if issues.missing_refs > 0 {
        details.push(format!("{} missing B30/B31 refs", issues.missing_refs));
    }
    if issues.missing_years > 0 {
        details.push(format!("{} missing years ref", issues.missing_years));
    }
    if issues.not_formulas > 0 {
        details.push(format!("{} not formulas", issues.not_formulas));
    }
    vec![FeedbackItem::new("IA_PREDICTIONS_PARTIAL")
        .with("correct", outcome.tally.full)
        .with("total", outcome.tally.total)
        .with("range", range)
        .with("issues", details.join("; "))]
}
