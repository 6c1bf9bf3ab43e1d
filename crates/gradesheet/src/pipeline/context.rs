use std::path::PathBuf;

use super::error::PipelineWarning;
use super::import::ImportSummary;
use super::job::{StudentJob, StudentOutcome};
use super::workspace::CoursePaths;

/// Counters kept while grading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounters {
    pub prepared: usize,
    pub prepare_errors: usize,
    pub graded: usize,
    pub errors: usize,
    pub skipped_tabs: usize,
    pub charts_exported: usize,
    pub charts_inserted: usize,
}

pub struct BatchContext {
    pub run_id: String,

    // Input
    pub bundle: PathBuf,
    pub course_label: String,

    // Step 2 result, set once the course folders exist
    pub course: Option<CoursePaths>,

    // Step 3 result
    pub import: ImportSummary,

    // Step 5 results
    pub jobs: Vec<StudentJob>,
    pub outcomes: Vec<StudentOutcome>,
    pub cancelled: bool,

    // Step 8 result
    pub master_path: Option<PathBuf>,

    pub counters: BatchCounters,

    // Non-fatal warnings
    pub warnings: Vec<PipelineWarning>,
}

impl BatchContext {
    pub fn new(bundle: impl Into<PathBuf>, course_label: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            bundle: bundle.into(),
            course_label: course_label.into(),
            course: None,
            import: ImportSummary::default(),
            jobs: Vec::new(),
            outcomes: Vec::new(),
            cancelled: false,
            master_path: None,
            counters: BatchCounters::default(),
            warnings: Vec::new(),
        }
    }

    /// The graded output folder, once the course folders exist.
    pub fn output_path(&self) -> Option<PathBuf> {
        self.course.as_ref().map(|c| c.graded.clone())
    }
}
