//! Checker families that turn cells into scored feedback.
//!
//! Every checker is total: blank cells, missing charts and values of the
//! wrong type come back as zero-credit [`CriterionResult`]s carrying a
//! descriptive code, never as errors.

pub mod chart;
pub mod combination;
pub mod format;
pub mod range;
pub mod ratio;
pub mod single;
pub mod text;

use serde::Serialize;

use crate::equivalence::EquivalenceEngine;
use crate::feedback::FeedbackItem;
use crate::workbook::sheet::Worksheet;

pub use chart::{series_columns, ChartInspection, HistogramCheck, ScatterChartCheck};
pub use combination::CombinationCheck;
pub use format::{FormatCheck, FormatOutcome, FormatRule};
pub use range::{CellVerdict, MissCodes, RangeCheck, RangeOutcome, RangeTally};
pub use ratio::{CodeStyle, RatioOption, RatioPair, RatioRowCheck, RatioRowResult};
pub use single::{SingleCellCheck, TierCodes};
pub use text::{find_written_response, NameCheck, UnitLabelCheck};

/// Points earned for one criterion, the points it was worth, and what to
/// tell the student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriterionResult {
    pub earned: f64,
    pub max: f64,
    pub feedback: Vec<FeedbackItem>,
}

impl CriterionResult {
    pub fn new(earned: f64, max: f64, feedback: Vec<FeedbackItem>) -> Self {
        Self {
            earned,
            max,
            feedback,
        }
    }

    pub fn full(max: f64, item: FeedbackItem) -> Self {
        Self::new(max, max, vec![item])
    }

    pub fn zero(max: f64, item: FeedbackItem) -> Self {
        Self::new(0.0, max, vec![item])
    }

    pub fn is_full(&self) -> bool {
        self.max > 0.0 && self.earned >= self.max
    }

    pub fn is_partial(&self) -> bool {
        self.earned > 0.0 && self.earned < self.max
    }
}

/// What every checker reads from.
#[derive(Clone, Copy)]
pub struct CheckContext<'a> {
    pub sheet: &'a Worksheet,
    pub engine: &'a EquivalenceEngine,
}

impl<'a> CheckContext<'a> {
    pub fn new(sheet: &'a Worksheet, engine: &'a EquivalenceEngine) -> Self {
        Self { sheet, engine }
    }
}
