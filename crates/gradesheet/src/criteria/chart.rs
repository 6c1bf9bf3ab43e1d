//! Chart feature checks: chart type, data columns, titles and trendlines.

use crate::config::ChartsConfig;
use crate::criteria::CriterionResult;
use crate::feedback::FeedbackItem;
use crate::workbook::address::{column_to_letters, find_references};
use crate::workbook::chart::{Chart, ChartKind, Series};
use crate::workbook::sheet::Worksheet;

/// Thresholds used when judging chart features.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartInspection {
    /// Forward projection, in x-axis units, that counts as an extended
    /// trendline.
    pub trendline_forward_min: f64,
    /// An x-axis maximum at or above this also counts as extended.
    pub x_axis_max_min: f64,
}

impl Default for ChartInspection {
    fn default() -> Self {
        Self {
            trendline_forward_min: 10.0,
            x_axis_max_min: 20.0,
        }
    }
}

impl ChartInspection {
    pub fn from_config(config: &ChartsConfig) -> Self {
        Self {
            trendline_forward_min: config.trendline_forward_min,
            x_axis_max_min: config.x_axis_max_min,
        }
    }

    /// The first chart of `kind` on the sheet.
    pub fn find<'a>(sheet: &'a Worksheet, kind: &ChartKind) -> Option<&'a Chart> {
        sheet.charts.iter().find(|c| &c.kind == kind)
    }

    pub fn is_extended(&self, chart: &Chart) -> bool {
        if chart.max_forward() >= self.trendline_forward_min {
            return true;
        }
        chart
            .x_axis()
            .and_then(|a| a.max)
            .is_some_and(|max| max >= self.x_axis_max_min)
    }
}

/// Columns referenced by a series formula such as
/// `'Income Analysis'!$A$19:$A$26`.
pub fn series_columns(reference: &str) -> Vec<u32> {
    let cells = reference.rsplit('!').next().unwrap_or(reference);
    let mut columns: Vec<u32> = find_references(cells).iter().map(|t| t.column).collect();
    columns.dedup();
    columns
}

fn uses_only_column(reference: Option<&str>, column: u32) -> bool {
    reference
        .map(series_columns)
        .is_some_and(|cols| !cols.is_empty() && cols.iter().all(|c| *c == column))
}

fn present(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

fn first_series(chart: &Chart) -> Option<&Series> {
    chart.series.first()
}

/// XY scatter chart with a linear trendline extended past the data.
///
/// Produces two results: the chart itself (type, data, title, axis labels)
/// and the trendline (presence, extension).
#[derive(Debug, Clone)]
pub struct ScatterChartCheck {
    pub prefix: String,
    pub inspection: ChartInspection,
    pub x_column: u32,
    pub y_column: u32,
    pub chart_points: f64,
    /// Credit for a scatter chart that plots the wrong columns.
    pub wrong_data_points: f64,
    pub label_points: f64,
    pub trendline_points: f64,
    pub extension_points: f64,
}

impl ScatterChartCheck {
    pub fn new(prefix: &str, inspection: ChartInspection, x_column: u32, y_column: u32) -> Self {
        Self {
            prefix: prefix.to_string(),
            inspection,
            x_column,
            y_column,
            chart_points: 3.0,
            wrong_data_points: 1.0,
            label_points: 1.0,
            trendline_points: 1.0,
            extension_points: 1.0,
        }
    }

    pub fn chart_max(&self) -> f64 {
        self.chart_points + 3.0 * self.label_points
    }

    pub fn trendline_max(&self) -> f64 {
        self.trendline_points + self.extension_points
    }

    fn code(&self, suffix: &str) -> FeedbackItem {
        FeedbackItem::new(format!("{}_{}", self.prefix, suffix))
    }

    pub fn check(&self, sheet: &Worksheet) -> (CriterionResult, CriterionResult) {
        let Some(chart) = ChartInspection::find(sheet, &ChartKind::Scatter) else {
            return (
                CriterionResult::zero(self.chart_max(), self.code("NOT_FOUND")),
                CriterionResult::zero(self.trendline_max(), self.code("TRENDLINE_MISSING")),
            );
        };
        (self.check_chart(chart), self.check_trendline(chart))
    }

    fn check_chart(&self, chart: &Chart) -> CriterionResult {
        let mut earned = 0.0;
        let mut feedback = Vec::new();

        let series = first_series(chart);
        let x_ok = uses_only_column(series.and_then(|s| s.x_ref.as_deref()), self.x_column);
        let y_ok = uses_only_column(series.and_then(|s| s.y_ref.as_deref()), self.y_column);
        if x_ok && y_ok {
            earned += self.chart_points;
            feedback.push(self.code("FOUND"));
        } else {
            earned += self.wrong_data_points;
            feedback.push(
                self.code("WRONG_DATA")
                    .with("expected_x", column_to_letters(self.x_column))
                    .with("expected_y", column_to_letters(self.y_column)),
            );
        }

        match present(chart.title.as_deref()) {
            Some(title) => {
                earned += self.label_points;
                feedback.push(self.code("TITLE_PRESENT").with("title", title));
            }
            None => feedback.push(self.code("TITLE_MISSING")),
        }

        match present(chart.x_axis().and_then(|a| a.title.as_deref())) {
            Some(label) => {
                earned += self.label_points;
                feedback.push(self.code("XLABEL_PRESENT").with("label", label));
            }
            None => feedback.push(self.code("XLABEL_MISSING")),
        }

        match present(chart.y_axis().and_then(|a| a.title.as_deref())) {
            Some(label) => {
                earned += self.label_points;
                feedback.push(self.code("YLABEL_PRESENT").with("label", label));
            }
            None => feedback.push(self.code("YLABEL_MISSING")),
        }

        CriterionResult::new(earned, self.chart_max(), feedback)
    }

    fn check_trendline(&self, chart: &Chart) -> CriterionResult {
        let mut earned = 0.0;
        let mut feedback = Vec::new();

        if chart.has_trendline() {
            earned += self.trendline_points;
            feedback.push(self.code("TRENDLINE_PRESENT"));
        } else {
            feedback.push(self.code("TRENDLINE_MISSING"));
        }

        if self.inspection.is_extended(chart) {
            earned += self.extension_points;
            feedback.push(self.code("EXTENDED_CORRECT"));
        } else {
            feedback.push(
                self.code("EXTENDED_MISSING")
                    .with("forward_min", self.inspection.trendline_forward_min)
                    .with("axis_max_min", self.inspection.x_axis_max_min),
            );
        }

        CriterionResult::new(earned, self.trendline_max(), feedback)
    }
}

/// Column chart of a frequency table: bars from one column, category labels
/// from another.
#[derive(Debug, Clone)]
pub struct HistogramCheck {
    pub prefix: String,
    pub values_column: u32,
    pub labels_column: u32,
}

impl HistogramCheck {
    const FOUND: f64 = 1.0;
    const DATA: f64 = 2.0;
    const LABELS: f64 = 1.0;
    const TITLE: f64 = 1.0;
    const AXIS: f64 = 0.5;
    pub const MAX: f64 = 6.0;

    pub fn new(prefix: &str, values_column: u32, labels_column: u32) -> Self {
        Self {
            prefix: prefix.to_string(),
            values_column,
            labels_column,
        }
    }

    fn code(&self, suffix: &str) -> FeedbackItem {
        FeedbackItem::new(format!("{}_{}", self.prefix, suffix))
    }

    pub fn check(&self, sheet: &Worksheet) -> CriterionResult {
        if sheet.charts.is_empty() {
            return CriterionResult::zero(Self::MAX, self.code("MISSING"));
        }
        let Some(chart) = ChartInspection::find(sheet, &ChartKind::Bar) else {
            return CriterionResult::zero(Self::MAX, self.code("WRONG_TYPE"));
        };

        let mut earned = Self::FOUND;
        let mut feedback = vec![self.code("FOUND")];

        let series = first_series(chart);
        let values = series.and_then(|s| s.y_ref.as_deref());
        let labels = series.and_then(|s| s.x_ref.as_deref());

        if uses_only_column(values, self.values_column) {
            earned += Self::DATA;
            feedback.push(self.code("DATA_OK"));
        } else if values.is_some() {
            feedback.push(self.code("DATA_WRONG"));
        } else {
            feedback.push(self.code("DATA_MISSING"));
        }

        if uses_only_column(labels, self.labels_column) {
            earned += Self::LABELS;
            feedback.push(self.code("LABELS_OK"));
        } else if labels.is_some() {
            feedback.push(self.code("LABELS_WRONG"));
        } else {
            feedback.push(self.code("LABELS_MISSING"));
        }

        match present(chart.title.as_deref()) {
            Some(title) => {
                earned += Self::TITLE;
                feedback.push(self.code("TITLE_OK").with("title", title));
            }
            None => feedback.push(self.code("TITLE_MISSING")),
        }

        match present(chart.x_axis().and_then(|a| a.title.as_deref())) {
            Some(title) => {
                earned += Self::AXIS;
                feedback.push(self.code("XAXIS_OK").with("title", title));
            }
            None => feedback.push(self.code("XAXIS_MISSING")),
        }

        match present(chart.y_axis().and_then(|a| a.title.as_deref())) {
            Some(title) => {
                earned += Self::AXIS;
                feedback.push(self.code("YAXIS_OK").with("title", title));
            }
            None => feedback.push(self.code("YAXIS_MISSING")),
        }

        if earned >= Self::MAX {
            return CriterionResult::full(Self::MAX, self.code("ALL_CORRECT"));
        }
        feedback.insert(
            0,
            self.code("PARTIAL").with("earned", earned).with("max", Self::MAX),
        );
        CriterionResult::new(earned, Self::MAX, feedback)
    }
}
