//! The batch pipeline: import a submission bundle, grade every student into
//! a copy of the grading template, and roll the class up into a master file.

pub mod charts;
pub mod config;
pub mod context;
pub mod error;
pub mod import;
pub mod job;
pub mod progress;
pub mod runner;
pub mod scanner;
pub mod state;
pub mod summary;
pub mod workspace;

pub use charts::{ChartExporter, ExportOutcome, UnsupportedExporter};
pub use config::PipelineConfig;
pub use context::{BatchContext, BatchCounters};
pub use error::{PipelineError, PipelineWarning, StudentError};
pub use import::{import_bundle, ImportSummary};
pub use job::{clean_name_parts, StudentJob, StudentOutcome};
pub use progress::{FnProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{BatchRunner, TOTAL_STEPS};
pub use state::{BatchStatus, LogEvent, PipelineState, StatusSnapshot};
pub use summary::{ClassSummary, StudentRow};
pub use workspace::{sanitize_course_label, CoursePaths, Workspace};
