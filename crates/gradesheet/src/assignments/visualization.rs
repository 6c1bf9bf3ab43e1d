//! MA3 Visualization: bin table, frequency distribution and histogram of the
//! difference data.

use crate::aggregate::{aggregate, Summary};
use crate::assignments::{CategoryReport, CategorySlot};
use crate::criteria::{
    CheckContext, CriterionResult, FormatCheck, FormatRule, HistogramCheck, MissCodes,
    RangeCheck, SingleCellCheck, TierCodes,
};
use crate::equivalence::{AnswerSpec, Requirement};
use crate::workbook::address::{CellAddress, CellRange};

pub const CATEGORIES: &[CategorySlot] = &[BIN_TABLE, LIMITS, DISTRIBUTION, HISTOGRAM, FORMATTING];

const BIN_TABLE: CategorySlot = CategorySlot::new("bin_table", 11, 6.0);
const LIMITS: CategorySlot = CategorySlot::new("freq_limits", 12, 12.0);
const DISTRIBUTION: CategorySlot = CategorySlot::new("freq_distribution", 13, 18.0);
const HISTOGRAM: CategorySlot = CategorySlot::new("histogram", 14, HistogramCheck::MAX);
const FORMATTING: CategorySlot = CategorySlot::new("formatting", 15, 4.0);

const BIN_MIN_CELL: CellAddress = CellAddress::at('E', 22);
const BIN_MAX_CELL: CellAddress = CellAddress::at('E', 23);
const BIN_WIDTH_CELL: CellAddress = CellAddress::at('E', 24);
const BIN_POINTS: f64 = 2.0;

const FIRST_BIN_ROW: u32 = 28;
const LAST_BIN_ROW: u32 = 38;

/// Points per frequency-table column.
const COLUMN_POINTS: f64 = 6.0;

/// Bin midpoints in F label the histogram's bars, frequencies in G.
const HISTOGRAM_LABELS: u32 = 6;
const HISTOGRAM_VALUES: u32 = 7;

const COUNT_FUNCTIONS: [&str; 4] = ["COUNTIFS", "COUNTIF", "FREQUENCY", "SUMPRODUCT"];

fn bin_column(column: char) -> CellRange {
    CellRange::column(column, FIRST_BIN_ROW, LAST_BIN_ROW)
}

pub fn grade(ctx: &CheckContext<'_>) -> Vec<CategoryReport> {
    let histogram = HistogramCheck::new("HIST", HISTOGRAM_VALUES, HISTOGRAM_LABELS).check(ctx.sheet);

    vec![
        BIN_TABLE.report(aggregate(
            bin_table(ctx),
            BIN_TABLE.max,
            &Summary::with_prefix("BIN").replace_on_full(),
        )),
        LIMITS.report(aggregate(
            limits(ctx),
            LIMITS.max,
            &Summary::with_prefix("FREQ_LIMITS").replace_on_full(),
        )),
        DISTRIBUTION.report(aggregate(
            distribution(ctx),
            DISTRIBUTION.max,
            &Summary::with_prefix("FREQ_DIST").replace_on_full(),
        )),
        HISTOGRAM.report(aggregate(
            [histogram],
            HISTOGRAM.max,
            &Summary::with_prefix("HISTOGRAM").replace_on_full(),
        )),
        FORMATTING.report(aggregate(
            [formatting(ctx)],
            FORMATTING.max,
            &Summary::with_prefix("VIS_FORMAT").replace_on_full(),
        )),
    ]
}

// ── Bin table ──

/// `MIN`/`MAX` over the difference data in column B. The data starts on
/// row 12, so a range mentioning 12, 14 or 61 counts.
fn extreme_spec(function: &str, endpoints: [&str; 2]) -> AnswerSpec {
    let base = Requirement::new().functions([function]).columns(["B"]);
    AnswerSpec::new()
        .accept(&format!("={}(B12:B61)", function))
        .require(base.clone().fragments([endpoints[0]]))
        .require(base.fragments([endpoints[1]]))
}

fn bin_table(ctx: &CheckContext<'_>) -> Vec<CriterionResult> {
    let width = AnswerSpec::new()
        .accept("=(E23-E22)/10")
        .require(Requirement::new().refs(["E22", "E23"]).operators("/"))
        .require(Requirement::new().functions(["MAX", "MIN"]).operators("-/"));

    [
        (BIN_MIN_CELL, extreme_spec("MIN", ["12", "14"]), "BIN_MIN"),
        (BIN_MAX_CELL, extreme_spec("MAX", ["12", "61"]), "BIN_MAX"),
        (BIN_WIDTH_CELL, width, "BIN_WIDTH"),
    ]
    .into_iter()
    .map(|(address, spec, prefix)| {
        SingleCellCheck::new(address, spec, BIN_POINTS, TierCodes::with_prefix(prefix)).check(ctx)
    })
    .collect()
}

// ── Frequency table ──

/// Per-cell results for one frequency-table column worth [`COLUMN_POINTS`].
fn column_results<F>(ctx: &CheckContext<'_>, column: char, prefix: &str, spec_for: F) -> Vec<CriterionResult>
where
    F: Fn(CellAddress) -> AnswerSpec,
{
    RangeCheck::new(prefix, bin_column(column), COLUMN_POINTS, spec_for)
        .evaluate(ctx)
        .cell_results(&MissCodes::with_prefix(prefix))
}

/// Each lower limit continues from the previous upper limit; the first
/// starts at the bin minimum.
fn limits(ctx: &CheckContext<'_>) -> Vec<CriterionResult> {
    let mut results = column_results(ctx, 'D', "FREQ_LOWER", |address| {
        let previous = if address.row() == FIRST_BIN_ROW {
            BIN_MIN_CELL.to_string()
        } else {
            format!("E{}", address.row() - 1)
        };
        AnswerSpec::new()
            .accept(&format!("={}", previous))
            .require(Requirement::new().refs([previous]))
    });
    results.extend(column_results(ctx, 'E', "FREQ_UPPER", |address| {
        let row = address.row();
        AnswerSpec::new()
            .accept(&format!("=D{}+E24", row))
            .require(
                Requirement::new()
                    .refs([format!("D{}", row), BIN_WIDTH_CELL.to_string()])
                    .operators("+"),
            )
    }));
    results
}

fn distribution(ctx: &CheckContext<'_>) -> Vec<CriterionResult> {
    let mut results = column_results(ctx, 'F', "FREQ_TITLE", |address| {
        let row = address.row();
        AnswerSpec::new()
            .accept(&format!("=(D{0}+E{0})/2", row))
            .require(
                Requirement::new()
                    .refs([format!("D{}", row), format!("E{}", row)])
                    .operators("+")
                    .fragments(["2"]),
            )
    });
    results.extend(column_results(ctx, 'G', "FREQ_COUNT", |_| {
        COUNT_FUNCTIONS
            .iter()
            .fold(AnswerSpec::new(), |spec, function| {
                spec.require(Requirement::new().functions([*function]))
            })
    }));
    results.extend(column_results(ctx, 'H', "FREQ_REL", |address| {
        let count = format!("G{}", address.row());
        AnswerSpec::new()
            .accept(&format!("={}/50", count))
            .require(Requirement::new().refs([count]).operators("/"))
    }));
    results
}

// ── Formatting ──

fn formatting(ctx: &CheckContext<'_>) -> CriterionResult {
    FormatCheck::new("VIS_FORMAT_CELLS", FORMATTING.max)
        .reported_group(
            [BIN_MIN_CELL, BIN_MAX_CELL, BIN_WIDTH_CELL],
            FormatRule::TwoDecimals,
        )
        .group(
            ['D', 'E', 'F']
                .into_iter()
                .flat_map(|c| (FIRST_BIN_ROW..=LAST_BIN_ROW).map(move |r| CellAddress::at(c, r))),
            FormatRule::TwoDecimals,
        )
        .group(bin_column('G').cells(), FormatRule::WholeNumber)
        .group(bin_column('H').cells(), FormatRule::Percent)
        .check(ctx)
}
