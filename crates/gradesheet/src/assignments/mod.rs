//! Fixed criterion tables, one module per graded worksheet.
//!
//! Every tab grader reads one student worksheet and returns a [`TabReport`]:
//! a score and feedback per grading-sheet row. Cell addresses are part of
//! the assignment template and are hard-coded here.

pub mod currency_conversion;
pub mod data_analysis;
pub mod income_analysis;
pub mod unit_conversions;
pub mod visualization;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::aggregate::CategoryScore;
use crate::criteria::{ChartInspection, CheckContext};
use crate::equivalence::EquivalenceEngine;
use crate::error::WorkbookError;
use crate::feedback::{FeedbackCatalog, FeedbackItem};
use crate::workbook::grading::GradingWorkbook;
use crate::workbook::sheet::Worksheet;

/// Which homework a batch grades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Assignment {
    Ma1,
    Ma3,
}

impl Assignment {
    /// Appended to prepared file names: `First_Last_MA1.xlsx`.
    pub fn suffix(&self) -> &'static str {
        match self {
            Assignment::Ma1 => "MA1",
            Assignment::Ma3 => "MA3",
        }
    }

    pub fn tabs(&self) -> &'static [Tab] {
        match self {
            Assignment::Ma1 => &[
                Tab::IncomeAnalysis,
                Tab::UnitConversions,
                Tab::CurrencyConversion,
            ],
            Assignment::Ma3 => &[Tab::DataAnalysis, Tab::Visualization],
        }
    }

    pub fn required_sheets(&self) -> Vec<&'static str> {
        self.tabs().iter().map(|t| t.sheet_name()).collect()
    }

    /// Every grading-sheet category across all tabs, in row order per tab.
    pub fn categories(&self) -> impl Iterator<Item = (Tab, &'static CategorySlot)> {
        self.tabs()
            .iter()
            .flat_map(|tab| tab.categories().iter().map(move |slot| (*tab, slot)))
    }

    /// The most auto-graded points a student can earn.
    pub fn max_points(&self) -> f64 {
        self.categories().map(|(_, slot)| slot.max).sum()
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Assignment::Ma1 => "ma1",
            Assignment::Ma3 => "ma3",
        })
    }
}

impl FromStr for Assignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ma1" => Ok(Assignment::Ma1),
            "ma3" => Ok(Assignment::Ma3),
            other => Err(format!("Unknown assignment '{}' (expected ma1 or ma3)", other)),
        }
    }
}

/// One graded worksheet of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    IncomeAnalysis,
    UnitConversions,
    CurrencyConversion,
    DataAnalysis,
    Visualization,
}

impl Tab {
    /// Sheet name in the student's workbook, matched case-insensitively.
    pub fn sheet_name(&self) -> &'static str {
        match self {
            Tab::IncomeAnalysis => "Income Analysis",
            Tab::UnitConversions => "Unit Conversions",
            Tab::CurrencyConversion => "Currency Conversion",
            Tab::DataAnalysis => "Analysis",
            Tab::Visualization => "Visualization",
        }
    }

    /// Key of the tab's templates in the [`FeedbackCatalog`].
    pub fn feedback_tab(&self) -> &'static str {
        match self {
            Tab::IncomeAnalysis => "income_analysis",
            Tab::UnitConversions => "unit_conversions",
            Tab::CurrencyConversion => "currency_conversion",
            Tab::DataAnalysis => "ma3_analysis",
            Tab::Visualization => "ma3_visualization",
        }
    }

    pub fn categories(&self) -> &'static [CategorySlot] {
        match self {
            Tab::IncomeAnalysis => income_analysis::CATEGORIES,
            Tab::UnitConversions => unit_conversions::CATEGORIES,
            Tab::CurrencyConversion => currency_conversion::CATEGORIES,
            Tab::DataAnalysis => data_analysis::CATEGORIES,
            Tab::Visualization => visualization::CATEGORIES,
        }
    }

    pub fn grade(&self, sheet: &Worksheet, env: &GradingEnv<'_>) -> TabReport {
        let ctx = CheckContext::new(sheet, env.engine);
        let categories = match self {
            Tab::IncomeAnalysis => income_analysis::grade(&ctx, &env.charts),
            Tab::UnitConversions => unit_conversions::grade(&ctx),
            Tab::CurrencyConversion => currency_conversion::grade(&ctx, env.student),
            Tab::DataAnalysis => data_analysis::grade(&ctx),
            Tab::Visualization => visualization::grade(&ctx),
        };
        TabReport { tab: *self, categories }
    }

    /// Zero in every category, for a submission without this sheet.
    pub fn missing(&self) -> TabReport {
        let categories = self
            .categories()
            .iter()
            .map(|slot| {
                slot.report(CategoryScore::zero(
                    slot.max,
                    FeedbackItem::new("SHEET_MISSING").with("sheet", self.sheet_name()),
                ))
            })
            .collect();
        TabReport {
            tab: *self,
            categories,
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_name())
    }
}

/// Where a category lands on the grading sheet and what it is worth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategorySlot {
    pub key: &'static str,
    pub row: u32,
    pub max: f64,
}

impl CategorySlot {
    pub const fn new(key: &'static str, row: u32, max: f64) -> Self {
        Self { key, row, max }
    }

    pub fn report(&self, score: CategoryScore) -> CategoryReport {
        CategoryReport {
            key: self.key,
            row: self.row,
            score,
            manual_text: None,
        }
    }
}

/// The student's name as derived from the submission folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentName {
    pub first: String,
    pub last: String,
}

impl StudentName {
    pub fn new(first: impl Into<String>, last: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            last: last.into(),
        }
    }

    /// `First_Last`, the stem of every file written for the student.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.first, self.last)
    }
}

impl fmt::Display for StudentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first, self.last)
    }
}

/// Everything a tab grader needs besides the worksheet.
pub struct GradingEnv<'a> {
    pub engine: &'a EquivalenceEngine,
    pub charts: ChartInspection,
    pub student: &'a StudentName,
}

/// One grading-sheet row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryReport {
    pub key: &'static str,
    pub row: u32,
    #[serde(flatten)]
    pub score: CategoryScore,
    /// Text for the instructor to grade by hand, shown above the feedback.
    pub manual_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabReport {
    pub tab: Tab,
    pub categories: Vec<CategoryReport>,
}

impl TabReport {
    pub fn total(&self) -> f64 {
        self.categories.iter().map(|c| c.score.score).sum()
    }

    pub fn category(&self, key: &str) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.key == key)
    }

    /// Writes each category's score to `F{row}` and its rendered feedback
    /// to `G{row}`.
    pub fn write_to(
        &self,
        grading: &mut GradingWorkbook,
        catalog: &FeedbackCatalog,
    ) -> Result<(), WorkbookError> {
        let tab = self.tab.feedback_tab();
        for category in &self.categories {
            grading.set_number(&format!("F{}", category.row), category.score.score)?;
            let rendered = catalog.render(&category.score.feedback, tab);
            let text = match &category.manual_text {
                Some(response) => format!(
                    "[MANUAL GRADING REQUIRED]\n\nStudent's Response:\n{}\n\n{}",
                    response, rendered
                ),
                None => rendered,
            };
            grading.set_text(&format!("G{}", category.row), text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Assignments ──

    #[test]
    fn test_assignment_parsing_and_sheets() {
        assert_eq!("MA1".parse::<Assignment>().unwrap(), Assignment::Ma1);
        assert_eq!(" ma3 ".parse::<Assignment>().unwrap(), Assignment::Ma3);
        assert!("ma2".parse::<Assignment>().is_err());

        assert_eq!(
            Assignment::Ma1.required_sheets(),
            vec!["Income Analysis", "Unit Conversions", "Currency Conversion"]
        );
        assert_eq!(Assignment::Ma3.required_sheets(), vec!["Analysis", "Visualization"]);
        assert_eq!(Assignment::Ma3.suffix(), "MA3");
    }

    #[test]
    fn test_assignment_serde_is_lowercase() {
        let json = serde_json::to_string(&Assignment::Ma1).unwrap();
        assert_eq!(json, "\"ma1\"");
        let back: Assignment = serde_json::from_str("\"ma3\"").unwrap();
        assert_eq!(back, Assignment::Ma3);
    }

    #[test]
    fn test_category_rows_are_unique_per_assignment() {
        for assignment in [Assignment::Ma1, Assignment::Ma3] {
            let mut rows: Vec<u32> = assignment.categories().map(|(_, s)| s.row).collect();
            let count = rows.len();
            rows.sort_unstable();
            rows.dedup();
            assert_eq!(rows.len(), count, "{} reuses a grading row", assignment);
        }
    }

    // ── Reports ──

    #[test]
    fn test_missing_sheet_zeroes_every_category() {
        let report = Tab::CurrencyConversion.missing();
        assert_eq!(report.categories.len(), currency_conversion::CATEGORIES.len());
        assert_eq!(report.total(), 0.0);
        for category in &report.categories {
            assert_eq!(category.score.feedback[0].code, "SHEET_MISSING");
        }
    }

    #[test]
    fn test_student_name_stem() {
        let name = StudentName::new("Ana", "De_La_Cruz");
        assert_eq!(name.file_stem(), "Ana_De_La_Cruz");
        assert_eq!(name.to_string(), "Ana De_La_Cruz");
    }
}
