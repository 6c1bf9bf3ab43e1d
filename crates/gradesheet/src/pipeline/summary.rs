//! The class roll-up: `INSTRUCTOR_MASTER.xlsx` plus `class_summary.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::assignments::Assignment;
use crate::error::{StorageError, WorkbookError};
use crate::workbook::address::{column_to_letters, CellAddress};
use crate::workbook::cell::{CachedValue, Cell, CellValue};
use crate::workbook::sheet::{Workbook, Worksheet};
use crate::workbook::writer::write_workbook;

use super::error::PipelineError;
use super::job::StudentOutcome;

pub const MASTER_FILE: &str = "INSTRUCTOR_MASTER.xlsx";
pub const SUMMARY_FILE: &str = "class_summary.json";
const MASTER_SHEET: &str = "Summary";
const SCORE_FORMAT: &str = "0.00";

#[derive(Debug, Clone, Serialize)]
pub struct StudentRow {
    pub student: String,
    pub grading_sheet: String,
    /// `tab/category` to score.
    pub categories: BTreeMap<String, f64>,
    pub total: f64,
    pub missing_sheets: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassSummary {
    pub course: String,
    pub assignment: Assignment,
    pub generated_at: DateTime<Utc>,
    pub max_points: f64,
    pub graded: usize,
    pub errors: usize,
    pub mean: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub students: Vec<StudentRow>,
}

impl ClassSummary {
    pub fn build(
        course: &str,
        assignment: Assignment,
        outcomes: &[StudentOutcome],
        errors: usize,
    ) -> Self {
        let students: Vec<StudentRow> = outcomes
            .iter()
            .map(|outcome| StudentRow {
                student: outcome.student.to_string(),
                grading_sheet: outcome
                    .grading_sheet
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                categories: assignment
                    .categories()
                    .map(|(tab, slot)| {
                        (
                            category_label(tab.feedback_tab(), slot.key),
                            outcome.category_score(tab, slot.key).unwrap_or(0.0),
                        )
                    })
                    .collect(),
                total: outcome.total,
                missing_sheets: outcome.missing_sheets.clone(),
            })
            .collect();

        let totals: Vec<f64> = students.iter().map(|s| s.total).collect();
        let mean = (!totals.is_empty())
            .then(|| round2(totals.iter().sum::<f64>() / totals.len() as f64));
        let high = totals.iter().copied().reduce(f64::max);
        let low = totals.iter().copied().reduce(f64::min);

        Self {
            course: course.to_string(),
            assignment,
            generated_at: Utc::now(),
            max_points: assignment.max_points(),
            graded: students.len(),
            errors,
            mean,
            high,
            low,
            students,
        }
    }

    /// Writes both summary files into `dir` and returns the master path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf, PipelineError> {
        let master = dir.join(MASTER_FILE);
        write_workbook(&self.master_workbook(), &master).map_err(PipelineError::Summary)?;

        let json_path = dir.join(SUMMARY_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            PipelineError::Summary(WorkbookError::Write {
                path: json_path.clone(),
                reason: e.to_string(),
            })
        })?;
        std::fs::write(&json_path, json).map_err(|e| StorageError::WriteFile {
            path: json_path.clone(),
            source: e,
        })?;
        Ok(master)
    }

    /// One header row, one row per student, a class average row.
    pub fn master_workbook(&self) -> Workbook {
        let mut sheet = Worksheet::new(MASTER_SHEET);
        let categories: Vec<String> = self
            .assignment
            .categories()
            .map(|(tab, slot)| category_label(tab.feedback_tab(), slot.key))
            .collect();

        let mut headers = vec!["Student".to_string(), "Grading Sheet".to_string()];
        headers.extend(categories.iter().cloned());
        headers.push("Auto-Graded Total".to_string());
        headers.push("Max".to_string());
        headers.push("Missing Sheets".to_string());
        for (i, header) in headers.iter().enumerate() {
            sheet.set(
                CellAddress::new(i as u32 + 1, 1),
                Cell::new(CellValue::Text(header.clone())),
            );
        }

        let total_col = categories.len() as u32 + 3;
        for (idx, student) in self.students.iter().enumerate() {
            let row = idx as u32 + 2;
            sheet.set(
                CellAddress::new(1, row),
                Cell::new(CellValue::Text(student.student.clone())),
            );
            sheet.set(
                CellAddress::new(2, row),
                Cell::new(CellValue::Text(student.grading_sheet.clone())),
            );
            for (offset, label) in categories.iter().enumerate() {
                let score = student.categories.get(label).copied().unwrap_or(0.0);
                sheet.set(CellAddress::new(offset as u32 + 3, row), score_cell(score));
            }
            sheet.set(CellAddress::new(total_col, row), score_cell(student.total));
            sheet.set(
                CellAddress::new(total_col + 1, row),
                score_cell(self.max_points),
            );
            if !student.missing_sheets.is_empty() {
                sheet.set(
                    CellAddress::new(total_col + 2, row),
                    Cell::new(CellValue::Text(student.missing_sheets.join(", "))),
                );
            }
        }

        if let Some(mean) = self.mean {
            let row = self.students.len() as u32 + 2;
            let letters = column_to_letters(total_col);
            sheet.set(
                CellAddress::new(1, row),
                Cell::new(CellValue::Text("Class Average".to_string())),
            );
            sheet.set(
                CellAddress::new(total_col, row),
                Cell::new(CellValue::Formula(format!(
                    "=AVERAGE({}2:{}{})",
                    letters,
                    letters,
                    row - 1
                )))
                .with_cached(CachedValue::Number(mean))
                .with_format(SCORE_FORMAT),
            );
        }

        let mut workbook = Workbook::new();
        workbook.push(sheet);
        workbook
    }
}

fn score_cell(score: f64) -> Cell {
    Cell::new(CellValue::Number(score)).with_format(SCORE_FORMAT)
}

fn category_label(tab: &str, key: &str) -> String {
    format!("{}/{}", tab, key)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignments::{StudentName, Tab};
    use crate::pipeline::job::StudentJob;
    use crate::workbook::reader::read_workbook;
    use tempfile::TempDir;

    fn outcome(first: &str, tabs: Vec<crate::assignments::TabReport>) -> StudentOutcome {
        let job = StudentJob {
            student: StudentName::new(first, "Lee"),
            submission: PathBuf::from(format!("/subs/{}_Lee_MA1.xlsx", first)),
            grading_sheet: PathBuf::from(format!("/graded/{}_Lee_MA1_Grade.xlsx", first)),
        };
        StudentOutcome::new(&job, tabs, Vec::new(), Assignment::Ma1.max_points())
    }

    #[test]
    fn test_build_computes_class_statistics() {
        let missing = vec![
            Tab::IncomeAnalysis.missing(),
            Tab::UnitConversions.missing(),
            Tab::CurrencyConversion.missing(),
        ];
        let outcomes = vec![outcome("Ana", missing.clone()), outcome("Bo", missing)];
        let summary = ClassSummary::build("MAT-144", Assignment::Ma1, &outcomes, 1);

        assert_eq!(summary.graded, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.mean, Some(0.0));
        assert_eq!(summary.students[0].student, "Ana Lee");
        assert_eq!(summary.students[0].grading_sheet, "Ana_Lee_MA1_Grade.xlsx");
        assert_eq!(
            summary.students[0].categories.len(),
            Assignment::Ma1.categories().count()
        );
        assert!(summary.students[0]
            .categories
            .contains_key("unit_conversions/formulas"));
    }

    #[test]
    fn test_empty_class_has_no_statistics() {
        let summary = ClassSummary::build("MAT-144", Assignment::Ma3, &[], 0);
        assert_eq!(summary.mean, None);
        assert_eq!(summary.high, None);
        assert!(summary.master_workbook().sheets()[0].get("A2").is_none());
    }

    #[test]
    fn test_write_master_and_json() {
        let temp = TempDir::new().unwrap();
        let outcomes = vec![outcome("Ana", vec![Tab::DataAnalysis.missing()])];
        let summary = ClassSummary::build("MAT-144", Assignment::Ma3, &outcomes, 0);
        let master = summary.write(temp.path()).unwrap();

        let workbook = read_workbook(&master).unwrap();
        let sheet = workbook.sheet(MASTER_SHEET).unwrap();
        assert_eq!(sheet.value("A1"), CellValue::Text("Student".into()));
        assert_eq!(sheet.value("A2"), CellValue::Text("Ana Lee".into()));
        assert_eq!(sheet.value("A3"), CellValue::Text("Class Average".into()));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(temp.path().join(SUMMARY_FILE)).unwrap())
                .unwrap();
        assert_eq!(json["assignment"], "ma3");
        assert_eq!(json["students"][0]["student"], "Ana Lee");
    }
}
