//! The on-disk workspace layout.
//!
//! ```text
//! <root>/
//!   templates/                    grading templates
//!   feedback/                     feedback template overrides
//!   temp_charts/                  exported chart images, removed after use
//!   student_groups/<course>/      one folder per student, as imported
//!   student_submissions/<course>/ First_Last_<ASSIGN>.xlsx
//!   graded_output/<course>/       First_Last_<ASSIGN>_Grade.xlsx + summaries
//! ```

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::StorageError;

pub struct Workspace {
    root: PathBuf,
}

/// The three per-course folders.
#[derive(Debug, Clone)]
pub struct CoursePaths {
    pub label: String,
    pub groups: PathBuf,
    pub submissions: PathBuf,
    pub graded: PathBuf,
}

impl Workspace {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    pub fn feedback_dir(&self) -> PathBuf {
        self.root.join("feedback")
    }

    pub fn temp_charts_dir(&self) -> PathBuf {
        self.root.join("temp_charts")
    }

    /// Creates the root plus `templates/` and `feedback/`.
    pub fn ensure_assets(&self) -> Result<(), StorageError> {
        ensure_directory(&self.root)?;
        ensure_directory(&self.templates_dir())?;
        ensure_directory(&self.feedback_dir())?;
        debug!("Workspace assets ready under {}", self.root.display());
        Ok(())
    }

    /// Creates the course folders for an already sanitized label.
    pub fn course_folders(&self, label: &str) -> Result<CoursePaths, StorageError> {
        let paths = CoursePaths {
            label: label.to_string(),
            groups: self.root.join("student_groups").join(label),
            submissions: self.root.join("student_submissions").join(label),
            graded: self.root.join("graded_output").join(label),
        };
        ensure_directory(&paths.groups)?;
        ensure_directory(&paths.submissions)?;
        ensure_directory(&paths.graded)?;
        info!("Workspace folders ready for: {}", label);
        Ok(paths)
    }

    /// Deletes `temp_charts/`. Returns whether anything was removed.
    pub fn clean_temp_charts(&self) -> Result<bool, StorageError> {
        let dir = self.temp_charts_dir();
        if !dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir).map_err(|e| StorageError::Remove {
            path: dir.clone(),
            source: e,
        })?;
        debug!("Removed {}", dir.display());
        Ok(true)
    }
}

/// Folder-safe course label: spaces and slashes become underscores.
/// `None` for a blank label.
pub fn sanitize_course_label(label: &str) -> Option<String> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.replace([' ', '/', '\\'], "_"))
}

pub fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

pub fn copy_file(from: &Path, to: &Path) -> Result<(), StorageError> {
    std::fs::copy(from, to).map_err(|e| StorageError::CopyFile {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_course_label() {
        assert_eq!(
            sanitize_course_label(" MAT 144/501 ").as_deref(),
            Some("MAT_144_501")
        );
        assert_eq!(sanitize_course_label("MAT-144").as_deref(), Some("MAT-144"));
        assert_eq!(sanitize_course_label("   "), None);
    }

    #[test]
    fn test_ensure_assets_and_course_folders() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path().join("ws"));
        workspace.ensure_assets().unwrap();
        assert!(workspace.templates_dir().is_dir());
        assert!(workspace.feedback_dir().is_dir());

        let course = workspace.course_folders("MAT-144").unwrap();
        assert!(course.groups.ends_with("student_groups/MAT-144"));
        assert!(course.submissions.is_dir());
        assert!(course.graded.is_dir());

        // Second call is a no-op.
        workspace.course_folders("MAT-144").unwrap();
    }

    #[test]
    fn test_clean_temp_charts() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path());
        assert!(!workspace.clean_temp_charts().unwrap());

        ensure_directory(&workspace.temp_charts_dir()).unwrap();
        std::fs::write(workspace.temp_charts_dir().join("a.png"), b"png").unwrap();
        assert!(workspace.clean_temp_charts().unwrap());
        assert!(!workspace.temp_charts_dir().exists());
    }

    #[test]
    fn test_copy_file_reports_both_paths() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.xlsx");
        let target = temp.path().join("copy.xlsx");
        match copy_file(&missing, &target) {
            Err(StorageError::CopyFile { from, to, .. }) => {
                assert_eq!(from, missing);
                assert_eq!(to, target);
            }
            other => panic!("expected copy error, got {:?}", other),
        }
    }
}
