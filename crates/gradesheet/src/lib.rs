pub mod aggregate;
pub mod assignments;
pub mod config;
pub mod criteria;
pub mod equivalence;
pub mod error;
pub mod feedback;
pub mod normalize;
pub mod pipeline;
pub mod resolve;
pub mod workbook;

pub use aggregate::{aggregate, CategoryScore, Summary};
pub use assignments::{Assignment, StudentName, Tab, TabReport};
pub use config::{load_config, Config};
pub use equivalence::EquivalenceEngine;
pub use error::{ConfigError, GradesheetError, ImportError, Result, StorageError, WorkbookError};
pub use feedback::{FeedbackCatalog, FeedbackItem};
pub use pipeline::{BatchRunner, BatchStatus, PipelineConfig, PipelineError, PipelineState};
pub use workbook::{read_workbook, write_workbook, Workbook, Worksheet};
