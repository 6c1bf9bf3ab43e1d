//! Chart image export and insertion.
//!
//! Rendering a chart needs a native spreadsheet application, so export sits
//! behind [`ChartExporter`]. The default exporter reports the platform as
//! unsupported and the batch carries on without images.

use std::path::{Path, PathBuf};

use log::debug;

use crate::error::WorkbookError;
use crate::workbook::address::CellAddress;
use crate::workbook::cell::CellValue;
use crate::workbook::grading::GradingWorkbook;

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Exported(PathBuf),
    NoChart,
    Unsupported,
}

pub trait ChartExporter: Send + Sync {
    fn name(&self) -> &str;

    /// Exports the graded chart of `submission` as `<out_dir>/<stem>.png`.
    fn export(&self, submission: &Path, out_dir: &Path, stem: &str)
        -> Result<ExportOutcome, String>;
}

/// Exporter for platforms without a spreadsheet application.
pub struct UnsupportedExporter;

impl ChartExporter for UnsupportedExporter {
    fn name(&self) -> &str {
        "unsupported platform"
    }

    fn export(&self, _submission: &Path, _out_dir: &Path, _stem: &str) -> Result<ExportOutcome, String> {
        Ok(ExportOutcome::Unsupported)
    }
}

/// Image files in `dir` keyed by file stem, sorted.
pub fn exported_images(dir: &Path) -> Vec<(String, PathBuf)> {
    let pattern = dir.join("*.png");
    let Some(pattern) = pattern.to_str() else {
        return Vec::new();
    };
    let mut images: Vec<(String, PathBuf)> = match glob::glob(pattern) {
        Ok(paths) => paths
            .filter_map(|p| p.ok())
            .filter_map(|p| {
                let stem = p.file_stem()?.to_str()?.to_string();
                Some((stem, p))
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    images.sort();
    images
}

/// Records `image` on the grading sheet at `anchor`, with the instruction
/// to review it in the row below.
pub fn insert_chart_note(
    grading_sheet: &Path,
    sheet_name: &str,
    anchor: &str,
    image: &Path,
) -> Result<(), WorkbookError> {
    let mut grading = GradingWorkbook::open(grading_sheet, sheet_name)?;
    let anchor_cell = CellAddress::parse(anchor)?;
    let file_name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    grading.set(
        anchor_cell,
        CellValue::Text(format!("Chart image: {}", file_name)),
    );
    if let Some(below) = anchor_cell.offset(1, 0) {
        grading.set(
            below,
            CellValue::Text(
                "Review the exported chart for manual grading".to_string(),
            ),
        );
    }
    grading.save()?;
    debug!("Recorded chart {} in {}", file_name, grading_sheet.display());
    Ok(())
}
