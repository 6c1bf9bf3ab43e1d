//! Isolated workspace for running the batch pipeline end to end.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use gradesheet::config::Config;
use gradesheet::pipeline::{
    BatchContext, BatchRunner, NoopProgress, PipelineConfig, PipelineError, PipelineState,
};
use gradesheet::workbook::{read_workbook, write_workbook, Workbook};
use gradesheet::Assignment;

use super::builders::grading_template;

pub const COURSE: &str = "MAT-144 501";
pub const COURSE_FOLDER: &str = "MAT-144_501";

pub struct TestHarness {
    temp_dir: TempDir,
    pub workspace: PathBuf,
    /// Extracted-download layout: one folder per student.
    pub download_dir: PathBuf,
    pub config: Config,
}

impl TestHarness {
    pub fn new(assignment: Assignment) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let workspace = temp_dir.path().join("workspace");
        let download_dir = temp_dir.path().join("download");
        std::fs::create_dir_all(&download_dir).expect("Failed to create download dir");

        let config = Config {
            workspace_root: workspace.clone(),
            assignment,
            ..Config::default()
        };

        let template = config.resolved_template_path();
        std::fs::create_dir_all(template.parent().expect("template has a parent"))
            .expect("Failed to create templates dir");
        write_workbook(&grading_template(&config.grading_sheet_name), &template)
            .expect("Failed to write template");

        Self {
            temp_dir,
            workspace,
            download_dir,
            config,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Adds `<download>/<folder>/<file>`.
    pub fn add_submission(&self, folder: &str, file: &str, workbook: &Workbook) -> PathBuf {
        let dir = self.download_dir.join(folder);
        std::fs::create_dir_all(&dir).expect("Failed to create student folder");
        let path = dir.join(file);
        write_workbook(workbook, &path).expect("Failed to write submission");
        path
    }

    /// Adds raw bytes, e.g. a corrupt upload.
    pub fn add_raw_submission(&self, folder: &str, file: &str, bytes: &[u8]) -> PathBuf {
        let dir = self.download_dir.join(folder);
        std::fs::create_dir_all(&dir).expect("Failed to create student folder");
        let path = dir.join(file);
        std::fs::write(&path, bytes).expect("Failed to write submission");
        path
    }

    /// Packs the download folder into `bundle.zip` the way an LMS does.
    pub fn zip_download(&self) -> PathBuf {
        let bundle = self.temp_path().join("bundle.zip");
        let file = std::fs::File::create(&bundle).expect("Failed to create zip");
        let mut zip = zip::ZipWriter::new(file);
        for entry in WalkDir::new(&self.download_dir).sort_by_file_name() {
            let entry = entry.expect("walk download dir");
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry
                .path()
                .strip_prefix(&self.download_dir)
                .expect("entry under download dir")
                .to_string_lossy()
                .replace('\\', "/");
            zip.start_file(name, SimpleFileOptions::default())
                .expect("start zip entry");
            zip.write_all(&std::fs::read(entry.path()).expect("read entry"))
                .expect("write zip entry");
        }
        zip.finish().expect("finish zip");
        bundle
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::from_config(&self.config)
    }

    pub fn runner(&self) -> BatchRunner {
        BatchRunner::from_config(Arc::new(self.pipeline_config()))
    }

    /// Runs the batch on `bundle` with a fresh state.
    pub fn run(&self, bundle: &Path) -> (Arc<PipelineState>, Result<BatchContext, PipelineError>) {
        let state = PipelineState::new();
        let result = self.runner().run(bundle, COURSE, &state, &NoopProgress);
        (state, result)
    }

    pub fn graded_dir(&self) -> PathBuf {
        self.workspace.join("graded_output").join(COURSE_FOLDER)
    }

    pub fn read_graded(&self, file_name: &str) -> Workbook {
        read_workbook(&self.graded_dir().join(file_name)).expect("Failed to read grading sheet")
    }
}
