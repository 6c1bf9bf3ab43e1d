//! MA3 Analysis: descriptive statistics over three data columns, percentiles
//! of the differences, the empirical rule and a written interpretation.

use crate::aggregate::{aggregate, CategoryScore, Summary};
use crate::assignments::{CategoryReport, CategorySlot};
use crate::criteria::{
    find_written_response, CheckContext, CriterionResult, FormatCheck, FormatRule, MissCodes,
    NameCheck, RangeCheck, SingleCellCheck, TierCodes,
};
use crate::equivalence::{AnswerSpec, RangeExpectation, Requirement};
use crate::feedback::FeedbackItem;
use crate::workbook::address::{CellAddress, CellRange};

pub const CATEGORIES: &[CategorySlot] = &[
    NAME,
    DIFFERENCES,
    STATISTICS,
    PERCENTILES,
    EMPIRICAL,
    WRITTEN,
    FORMATTING,
];

const NAME: CategorySlot = CategorySlot::new("name", 3, 1.0);
const DIFFERENCES: CategorySlot = CategorySlot::new("differences", 4, 6.0);
const STATISTICS: CategorySlot = CategorySlot::new("statistics", 5, 24.0);
const PERCENTILES: CategorySlot = CategorySlot::new("percentiles", 6, 6.0);
const EMPIRICAL: CategorySlot = CategorySlot::new("empirical_rule", 7, 6.0);
const WRITTEN: CategorySlot = CategorySlot::new("written_response", 8, 0.0);
const FORMATTING: CategorySlot = CategorySlot::new("formatting", 9, 6.0);

const NAME_CELL: CellAddress = CellAddress::at('B', 10);
const DIFFERENCE_RANGE: CellRange = CellRange::column('D', 14, 63);
const FIRST_DATA_ROW: u32 = 14;
const LAST_DATA_ROW: u32 = 63;

/// Statistic columns and the data column each one summarizes.
const STAT_COLUMNS: [(char, char); 3] = [('G', 'B'), ('H', 'C'), ('I', 'D')];

const PERCENTILE_CELLS: [CellAddress; 2] = [CellAddress::at('G', 27), CellAddress::at('G', 28)];
const LOWER_BOUND_CELL: CellAddress = CellAddress::at('G', 36);
const UPPER_BOUND_CELL: CellAddress = CellAddress::at('G', 37);

const STAT_POINTS: f64 = 2.0;
const PERCENTILE_POINTS: f64 = 3.0;
const EMPIRICAL_POINTS: f64 = 3.0;

/// Shorter written responses are flagged for the grader.
const WRITTEN_MIN_CHARS: usize = 50;
const WRITTEN_PREVIEW_CHARS: usize = 500;

const PERCENTILE_FUNCTIONS: [&str; 3] = ["PERCENTILE", "PERCENTILE.INC", "PERCENTILE.EXC"];

/// One row of the statistics block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statistic {
    Mean,
    Median,
    StdDev,
    Range,
}

impl Statistic {
    const ALL: [Statistic; 4] = [
        Statistic::Mean,
        Statistic::Median,
        Statistic::StdDev,
        Statistic::Range,
    ];

    fn row(&self) -> u32 {
        match self {
            Statistic::Mean => 18,
            Statistic::Median => 19,
            Statistic::StdDev => 20,
            Statistic::Range => 21,
        }
    }

    fn code_prefix(&self) -> &'static str {
        match self {
            Statistic::Mean => "STAT_MEAN",
            Statistic::Median => "STAT_MEDIAN",
            Statistic::StdDev => "STAT_STDEV",
            Statistic::Range => "STAT_RANGE",
        }
    }

    /// Expected formula over `data_column`, rows 14 to 63.
    fn spec(&self, data_column: char) -> AnswerSpec {
        let column = data_column.to_string();
        let range = RangeExpectation::new(&column, FIRST_DATA_ROW, LAST_DATA_ROW);
        let text = range.text();
        match self {
            Statistic::Mean | Statistic::Median => {
                let function = if *self == Statistic::Mean {
                    "AVERAGE"
                } else {
                    "MEDIAN"
                };
                let gate = Requirement::new().leading_function([function]);
                AnswerSpec::new()
                    .accept(&format!("={}({})", function, text))
                    .require(gate.clone().range(range))
                    .range_rule(range, gate)
            }
            Statistic::StdDev => {
                let gate = Requirement::new().leading_function(["STDEV", "STDEV.S", "STDEV.P"]);
                AnswerSpec::new()
                    .accept(&format!("=STDEV.S({})", text))
                    .require(gate.clone().range(range))
                    .range_rule(range, gate)
            }
            Statistic::Range => {
                let gate = Requirement::new().functions(["MAX", "MIN"]);
                AnswerSpec::new()
                    .accept(&format!("=MAX({0})-MIN({0})", text))
                    .require(
                        gate.clone()
                            .columns([column.as_str()])
                            .operators("-")
                            .range(range),
                    )
                    .range_rule(range, gate.operators("-"))
            }
        }
    }

    fn check(&self, stat_column: char, data_column: char) -> SingleCellCheck {
        SingleCellCheck::new(
            CellAddress::at(stat_column, self.row()),
            self.spec(data_column),
            STAT_POINTS,
            TierCodes::with_prefix(self.code_prefix()),
        )
        .quiet_on_full()
    }
}

pub fn grade(ctx: &CheckContext<'_>) -> Vec<CategoryReport> {
    let name = NameCheck::new("NAME", NAME_CELL, NAME.max)
        .min_len(3)
        .check(ctx);

    vec![
        NAME.report(aggregate([name], NAME.max, &Summary::with_prefix("NAME"))),
        DIFFERENCES.report(aggregate(
            differences(ctx),
            DIFFERENCES.max,
            &Summary::with_prefix("DIFF").replace_on_full(),
        )),
        STATISTICS.report(aggregate(
            statistics(ctx),
            STATISTICS.max,
            &Summary::with_prefix("STATS")
                .partial_credit("STATS_PARTIAL_CREDIT")
                .replace_on_full(),
        )),
        PERCENTILES.report(aggregate(
            percentiles(ctx),
            PERCENTILES.max,
            &Summary::with_prefix("PERCENTILES").replace_on_full(),
        )),
        EMPIRICAL.report(aggregate(
            empirical_rule(ctx),
            EMPIRICAL.max,
            &Summary::with_prefix("EMPIRICAL").replace_on_full(),
        )),
        written_response(ctx),
        FORMATTING.report(aggregate(
            [formatting(ctx)],
            FORMATTING.max,
            &Summary::with_prefix("FORMAT").replace_on_full(),
        )),
    ]
}

// ── Differences ──

fn differences(ctx: &CheckContext<'_>) -> Vec<CriterionResult> {
    let check = RangeCheck::new("DIFF", DIFFERENCE_RANGE, DIFFERENCES.max, |address| {
        let row = address.row();
        AnswerSpec::new()
            .accept(&format!("=C{0}-B{0}", row))
            .accept(&format!("=SUM(C{0}-B{0})", row))
    });
    check.evaluate(ctx).cell_results(&MissCodes::new(
        "DIFF_FORMULA_MISSING",
        "DIFF_NOT_FORMULA",
        "DIFF_FORMULA_WRONG",
    ))
}

// ── Statistics ──

fn statistics(ctx: &CheckContext<'_>) -> Vec<CriterionResult> {
    Statistic::ALL
        .iter()
        .flat_map(|stat| {
            STAT_COLUMNS
                .iter()
                .map(move |(stat_column, data_column)| stat.check(*stat_column, *data_column))
        })
        .map(|check| check.check(ctx))
        .collect()
}

fn percentiles(ctx: &CheckContext<'_>) -> Vec<CriterionResult> {
    let range = RangeExpectation::new("D", FIRST_DATA_ROW, LAST_DATA_ROW);
    let gate = Requirement::new().leading_function(PERCENTILE_FUNCTIONS);
    let spec = AnswerSpec::new()
        .require(gate.clone().range(range))
        .range_rule(range, gate);
    PERCENTILE_CELLS
        .iter()
        .map(|address| {
            SingleCellCheck::new(
                *address,
                spec.clone(),
                PERCENTILE_POINTS,
                TierCodes::with_prefix("PERCENTILE"),
            )
            .check(ctx)
        })
        .collect()
}

/// Mean minus and plus two standard deviations of the differences.
fn empirical_rule(ctx: &CheckContext<'_>) -> Vec<CriterionResult> {
    let bound = |address: CellAddress, operator: &str, prefix: &str| {
        SingleCellCheck::new(
            address,
            AnswerSpec::new().require(Requirement::new().refs(["I18", "I20"]).operators(operator)),
            EMPIRICAL_POINTS,
            TierCodes::with_prefix(prefix),
        )
        .check(ctx)
    };
    vec![
        bound(LOWER_BOUND_CELL, "-", "EMPIRICAL_LOWER"),
        bound(UPPER_BOUND_CELL, "+", "EMPIRICAL_UPPER"),
    ]
}

// ── Written response ──

fn preview(text: &str) -> String {
    if text.chars().count() <= WRITTEN_PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(WRITTEN_PREVIEW_CHARS).collect();
    format!("{}...", cut)
}

/// Worth no points: the response is surfaced for manual grading.
fn written_response(ctx: &CheckContext<'_>) -> CategoryReport {
    let response = find_written_response(ctx.sheet);
    let item = match &response {
        None => FeedbackItem::new("WRITTEN_MISSING"),
        Some(text) if text.chars().count() < WRITTEN_MIN_CHARS => {
            FeedbackItem::new("WRITTEN_TOO_SHORT").with("length", text.chars().count())
        }
        Some(text) => FeedbackItem::new("WRITTEN_FOUND").with("text", preview(text)),
    };
    let mut report = WRITTEN.report(CategoryScore::zero(WRITTEN.max, item));
    report.manual_text = response;
    report
}

// ── Formatting ──

fn formatting(ctx: &CheckContext<'_>) -> CriterionResult {
    let stat_cells: Vec<CellAddress> = Statistic::ALL
        .iter()
        .flat_map(|stat| {
            STAT_COLUMNS
                .iter()
                .map(move |(column, _)| CellAddress::at(*column, stat.row()))
        })
        .chain(PERCENTILE_CELLS)
        .chain([LOWER_BOUND_CELL, UPPER_BOUND_CELL])
        .collect();
    FormatCheck::new("FORMAT_CELLS", FORMATTING.max)
        .reported_group(stat_cells, FormatRule::TwoDecimals)
        .check(ctx)
}
