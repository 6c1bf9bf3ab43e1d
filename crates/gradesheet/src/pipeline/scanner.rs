use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

use crate::assignments::Assignment;
use crate::error::StorageError;

use super::job::StudentJob;

/// Lists prepared submissions in `submissions_dir`, sorted by file name.
///
/// Only top-level `.xlsx` files named `First_Last_<ASSIGN>.xlsx` are taken;
/// Office lock files (`~$...`) are skipped.
pub fn discover_submissions(
    submissions_dir: &Path,
    graded_dir: &Path,
    assignment: Assignment,
) -> Result<Vec<StudentJob>, StorageError> {
    let mut jobs = Vec::new();

    for path in top_level_files(submissions_dir)? {
        if !is_workbook(&path) {
            continue;
        }
        match StudentJob::from_submission(&path, graded_dir, assignment) {
            Some(job) => {
                debug!("Found submission: {}", path.display());
                jobs.push(job);
            }
            None => debug!("Ignoring {}: not a {} submission", path.display(), assignment),
        }
    }

    info!(
        "Discovered {} submissions in {}",
        jobs.len(),
        submissions_dir.display()
    );
    Ok(jobs)
}

/// Student folders directly under `groups_dir`, sorted by name.
pub fn student_folders(groups_dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let mut folders = Vec::new();
    for entry in WalkDir::new(groups_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| StorageError::ScanFailed {
            path: groups_dir.to_path_buf(),
            source: e,
        })?;
        if entry.file_type().is_dir() {
            folders.push(entry.into_path());
        }
    }
    Ok(folders)
}

/// The first workbook in a student folder, by sorted file name.
pub fn first_workbook(folder: &Path) -> Result<Option<PathBuf>, StorageError> {
    Ok(top_level_files(folder)?.into_iter().find(|p| is_workbook(p)))
}

/// An `.xlsx` file that is not an Office lock file.
pub fn is_workbook(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    !name.starts_with("~$")
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"))
}

fn top_level_files(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| StorageError::ScanFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    #[test]
    fn test_discover_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        temp.child("Zoe_Adams_MA1.xlsx").touch().unwrap();
        temp.child("Ana_Lee_MA1.xlsx").touch().unwrap();
        temp.child("~$Ana_Lee_MA1.xlsx").touch().unwrap();
        temp.child("notes.txt").touch().unwrap();
        temp.child("Bo_Chen_MA3.xlsx").touch().unwrap();
        temp.child("nested/Cy_Diaz_MA1.xlsx").touch().unwrap();

        let jobs = discover_submissions(temp.path(), Path::new("/graded"), Assignment::Ma1).unwrap();
        let names: Vec<String> = jobs.iter().map(|j| j.student.file_stem()).collect();
        assert_eq!(names, vec!["Ana_Lee", "Zoe_Adams"]);
    }

    #[test]
    fn test_missing_directory_is_scan_error() {
        let result = discover_submissions(
            Path::new("/nonexistent/submissions"),
            Path::new("/graded"),
            Assignment::Ma1,
        );
        assert!(matches!(result, Err(StorageError::ScanFailed { .. })));
    }

    #[test]
    fn test_student_folders_and_first_workbook() {
        let temp = TempDir::new().unwrap();
        temp.child("Lee_Ana_1/b.xlsx").touch().unwrap();
        temp.child("Lee_Ana_1/a.xlsx").touch().unwrap();
        temp.child("Chen_Bo_2/readme.md").touch().unwrap();
        temp.child("stray.xlsx").touch().unwrap();

        let folders = student_folders(temp.path()).unwrap();
        assert_eq!(folders.len(), 2);
        assert!(folders[0].ends_with("Chen_Bo_2"));

        assert_eq!(first_workbook(&folders[0]).unwrap(), None);
        let first = first_workbook(&folders[1]).unwrap().unwrap();
        assert!(first.ends_with("a.xlsx"));
    }

    #[test]
    fn test_is_workbook() {
        assert!(is_workbook(Path::new("a/B.XLSX")));
        assert!(!is_workbook(Path::new("a/~$B.xlsx")));
        assert!(!is_workbook(Path::new("a/B.xls")));
    }
}
