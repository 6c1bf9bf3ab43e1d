use std::path::PathBuf;

use thiserror::Error;

/// Failures that end the whole batch run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Course label cannot be blank")]
    BlankCourseLabel,

    #[error("Grading template not found at '{0}'")]
    TemplateMissing(PathBuf),

    #[error("Grading template '{path}' is unusable: {source}")]
    TemplateInvalid {
        path: PathBuf,
        #[source]
        source: crate::error::WorkbookError,
    },

    #[error("Configuration failed: {0}")]
    Config(#[from] crate::error::ConfigError),

    #[error("Storage failed: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("Import failed: {0}")]
    Import(#[from] crate::error::ImportError),

    #[error("Summary workbook could not be written: {0}")]
    Summary(crate::error::WorkbookError),

    #[error("A batch is already running")]
    AlreadyRunning,

    #[error("No batch is running")]
    NotRunning,
}

/// Failures that end one student's grading; the batch moves on.
#[derive(Error, Debug)]
pub enum StudentError {
    #[error("Submission '{path}' could not be read: {source}")]
    Submission {
        path: PathBuf,
        #[source]
        source: crate::error::WorkbookError,
    },

    #[error("Grading sheet '{path}' could not be opened: {source}")]
    GradingSheet {
        path: PathBuf,
        #[source]
        source: crate::error::WorkbookError,
    },

    #[error("Grading sheet '{path}' could not be saved: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: crate::error::WorkbookError,
    },

    #[error("Grading sheet for '{0}' was never prepared")]
    GradingSheetMissing(String),
}

/// Non-fatal conditions collected on the batch context.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    MissingSheets { student: String, sheets: Vec<String> },
    TabWriteFailed { student: String, tab: String, error: String },
    FolderSkipped { folder: String, reason: String },
    ChartExportFailed { student: String, error: String },
    ChartInsertFailed { student: String, error: String },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::MissingSheets { student, sheets } => {
                write!(f, "{}: missing sheets {}", student, sheets.join(", "))
            }
            PipelineWarning::TabWriteFailed {
                student,
                tab,
                error,
            } => write!(f, "{}: could not write {} results: {}", student, tab, error),
            PipelineWarning::FolderSkipped { folder, reason } => {
                write!(f, "Skipped folder '{}': {}", folder, reason)
            }
            PipelineWarning::ChartExportFailed { student, error } => {
                write!(f, "{}: chart export failed: {}", student, error)
            }
            PipelineWarning::ChartInsertFailed { student, error } => {
                write!(f, "{}: chart insert failed: {}", student, error)
            }
        }
    }
}
