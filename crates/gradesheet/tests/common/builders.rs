//! Builders for submission and template workbooks.

#![allow(dead_code)]

use gradesheet::workbook::{CellValue, Workbook, Worksheet};
use gradesheet::Assignment;

/// Builder for a student's submission workbook.
pub struct SubmissionBuilder {
    sheets: Vec<Worksheet>,
}

impl SubmissionBuilder {
    pub fn new() -> Self {
        Self { sheets: Vec::new() }
    }

    /// Every sheet `assignment` requires, with `name` in each tab's name cell.
    pub fn for_assignment(assignment: Assignment, name: &str) -> Self {
        let mut builder = Self::new();
        for sheet in assignment.required_sheets() {
            builder = builder.sheet(sheet);
        }
        builder.name(name)
    }

    /// Adds an empty sheet.
    pub fn sheet(mut self, name: &str) -> Self {
        self.sheets.push(Worksheet::new(name));
        self
    }

    /// Drops a sheet by exact name.
    pub fn without_sheet(mut self, name: &str) -> Self {
        self.sheets.retain(|s| s.name != name);
        self
    }

    /// Writes the student name where each tab expects it.
    pub fn name(mut self, name: &str) -> Self {
        for sheet in &mut self.sheets {
            let cell = match sheet.name.as_str() {
                "Analysis" => "B10",
                _ => "B1",
            };
            sheet.set_value(cell, CellValue::Text(name.to_string()));
        }
        self
    }

    pub fn cell(mut self, sheet: &str, address: &str, value: CellValue) -> Self {
        if let Some(ws) = self.sheets.iter_mut().find(|s| s.name == sheet) {
            ws.set_value(address, value);
        }
        self
    }

    pub fn build(self) -> Workbook {
        let mut workbook = Workbook::new();
        for sheet in self.sheets {
            workbook.push(sheet);
        }
        workbook
    }
}

impl Default for SubmissionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A grading template with a labelled `Grading Sheet` tab.
pub fn grading_template(sheet_name: &str) -> Workbook {
    let mut sheet = Worksheet::new(sheet_name);
    sheet.set_value("A1", CellValue::Text("Category".into()));
    sheet.set_value("F1", CellValue::Text("Score".into()));
    sheet.set_value("G1", CellValue::Text("Feedback".into()));
    let mut workbook = Workbook::new();
    workbook.push(sheet);
    workbook
}

/// `Given Family` names for a class of `count` students.
pub fn class_roster(count: usize) -> Vec<(String, String)> {
    const GIVEN: &[&str] = &["Ana", "Bo", "Cy", "Dee", "Eli", "Fay"];
    const FAMILY: &[&str] = &["Lee", "Chen", "Diaz", "Okafor", "Novak"];
    (0..count)
        .map(|i| {
            (
                GIVEN[i % GIVEN.len()].to_string(),
                format!("{}{}", FAMILY[i % FAMILY.len()], i),
            )
        })
        .collect()
}
