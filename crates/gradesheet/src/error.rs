use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GradesheetError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Workbook error: {0}")]
    Workbook(#[from] WorkbookError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Config does not match schema: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to read feedback catalog '{path}': {reason}")]
    FeedbackCatalog { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum WorkbookError {
    #[error("Failed to open workbook '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Workbook '{path}' is not a valid xlsx package: {reason}")]
    Package { path: PathBuf, reason: String },

    #[error("Missing package part '{part}'")]
    MissingPart { part: String },

    #[error("XML parsing error in '{part}': {reason}")]
    Xml { part: String, reason: String },

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    #[error("Failed to write workbook '{path}': {reason}")]
    Write { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy file from '{from}' to '{to}': {source}")]
    CopyFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove '{path}': {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Could not determine a workspace directory")]
    NoWorkspace,
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Submission bundle not found: {0}")]
    BundleNotFound(PathBuf),

    #[error("Failed to read archive '{path}': {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("Archive entry escapes the extraction directory: {0}")]
    UnsafeEntry(String),

    #[error("Import storage failed: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, GradesheetError>;
