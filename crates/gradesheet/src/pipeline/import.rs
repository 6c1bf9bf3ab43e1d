//! Bringing an LMS download into `student_groups/<course>/`.
//!
//! A bundle is a `.zip` or a directory. Every workbook in it is filed under a
//! per-student folder: flat LMS names (`leeana_12345_67890_MA1.xlsx`) use the
//! text before the first `_<digits>` run, anything else the folder that
//! contains it, or its own file stem at the top level.

use std::path::{Component, Path};
use std::sync::OnceLock;

use log::{debug, info, warn};
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{ImportError, StorageError};

use super::scanner::is_workbook;
use super::workspace::{copy_file, ensure_directory};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub students: usize,
    pub files: usize,
    pub skipped: usize,
}

pub fn import_bundle(bundle: &Path, groups_dir: &Path) -> Result<ImportSummary, ImportError> {
    if !bundle.exists() {
        return Err(ImportError::BundleNotFound(bundle.to_path_buf()));
    }
    ensure_directory(groups_dir)?;

    let summary = if bundle.is_dir() {
        import_directory(bundle, groups_dir)?
    } else {
        import_zip(bundle, groups_dir)?
    };

    info!(
        "Imported {} workbooks for {} students ({} entries skipped)",
        summary.files, summary.students, summary.skipped
    );
    Ok(summary)
}

fn import_zip(bundle: &Path, groups_dir: &Path) -> Result<ImportSummary, ImportError> {
    let archive_err = |reason: String| ImportError::Archive {
        path: bundle.to_path_buf(),
        reason,
    };

    let file = std::fs::File::open(bundle).map_err(|e| archive_err(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| archive_err(e.to_string()))?;

    let mut summary = ImportSummary::default();
    let mut students = std::collections::BTreeSet::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| archive_err(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }

        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ImportError::UnsafeEntry(entry.name().to_string()))?;

        if is_metadata(&relative) || !is_workbook(&relative) {
            debug!("Skipping archive entry {}", entry.name());
            summary.skipped += 1;
            continue;
        }

        let Some((folder, file_name)) = placement(&relative) else {
            summary.skipped += 1;
            continue;
        };

        let target_dir = groups_dir.join(&folder);
        ensure_directory(&target_dir)?;
        let target = target_dir.join(&file_name);
        let mut out = std::fs::File::create(&target).map_err(|e| StorageError::WriteFile {
            path: target.clone(),
            source: e,
        })?;
        std::io::copy(&mut entry, &mut out).map_err(|e| StorageError::WriteFile {
            path: target.clone(),
            source: e,
        })?;

        students.insert(folder);
        summary.files += 1;
    }

    summary.students = students.len();
    Ok(summary)
}

fn import_directory(bundle: &Path, groups_dir: &Path) -> Result<ImportSummary, ImportError> {
    let mut summary = ImportSummary::default();
    let mut students = std::collections::BTreeSet::new();

    for entry in WalkDir::new(bundle).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| StorageError::ScanFailed {
            path: bundle.to_path_buf(),
            source: e,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = match entry.path().strip_prefix(bundle) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => continue,
        };
        if is_metadata(&relative) || !is_workbook(&relative) {
            summary.skipped += 1;
            continue;
        }
        let Some((folder, file_name)) = placement(&relative) else {
            summary.skipped += 1;
            continue;
        };

        let target_dir = groups_dir.join(&folder);
        ensure_directory(&target_dir)?;
        copy_file(entry.path(), &target_dir.join(&file_name))?;

        students.insert(folder);
        summary.files += 1;
    }

    summary.students = students.len();
    Ok(summary)
}

/// Student folder and file name for a workbook at `relative`.
fn placement(relative: &Path) -> Option<(String, String)> {
    let file_name = relative.file_name()?.to_str()?.to_string();

    if let Some(prefix) = lms_prefix(&file_name) {
        return Some((prefix, file_name));
    }

    let parent = relative
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str());
    match parent {
        Some(folder) if !folder.is_empty() => Some((folder.to_string(), file_name)),
        _ => {
            let stem = relative.file_stem()?.to_str()?.to_string();
            if stem.is_empty() {
                warn!("Cannot place workbook {}", relative.display());
                return None;
            }
            Some((stem, file_name))
        }
    }
}

/// `leeana_12345_67890_MA1.xlsx` -> `leeana`.
fn lms_prefix(file_name: &str) -> Option<String> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"^(.+?)_\d+(?:_|\.|$)").ok())
        .as_ref()?;
    pattern
        .captures(file_name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn is_metadata(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => name
            .to_str()
            .is_some_and(|n| n == "__MACOSX" || n.starts_with('.')),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    // ── Placement ──

    #[test]
    fn test_lms_prefix() {
        assert_eq!(lms_prefix("leeana_12345_67890_MA1.xlsx").as_deref(), Some("leeana"));
        assert_eq!(lms_prefix("lee_ana_late_1_MA1.xlsx").as_deref(), Some("lee_ana_late"));
        assert_eq!(lms_prefix("Ana_Lee.xlsx"), None);
        assert_eq!(lms_prefix("MA1v2_final.xlsx"), None);
    }

    #[test]
    fn test_placement_rules() {
        assert_eq!(
            placement(Path::new("leeana_12345_MA1.xlsx")),
            Some(("leeana".into(), "leeana_12345_MA1.xlsx".into()))
        );
        assert_eq!(
            placement(Path::new("wrapper/Ana_Lee_998/MA1.xlsx")),
            Some(("Ana_Lee_998".into(), "MA1.xlsx".into()))
        );
        assert_eq!(
            placement(Path::new("Ana Lee.xlsx")),
            Some(("Ana Lee".into(), "Ana Lee.xlsx".into()))
        );
    }

    // ── Bundles ──

    #[test]
    fn test_import_zip_groups_by_student() {
        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join("bundle.zip");
        write_zip(
            &bundle,
            &[
                ("leeana_111_222_MA1.xlsx", b"a"),
                ("chenbo_333_444_MA1.xlsx", b"b"),
                ("Diaz_Cy_555/homework.xlsx", b"c"),
                ("__MACOSX/._leeana_111_222_MA1.xlsx", b"x"),
                ("readme.txt", b"x"),
            ],
        );

        let groups = temp.path().join("groups");
        let summary = import_bundle(&bundle, &groups).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                students: 3,
                files: 3,
                skipped: 2
            }
        );
        assert!(groups.join("leeana/leeana_111_222_MA1.xlsx").is_file());
        assert!(groups.join("Diaz_Cy_555/homework.xlsx").is_file());
        assert_eq!(super::super::scanner::student_folders(&groups).unwrap().len(), 3);
    }

    #[test]
    fn test_import_zip_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join("evil.zip");
        write_zip(&bundle, &[("../escape_1.xlsx", b"x")]);

        let result = import_bundle(&bundle, &temp.path().join("groups"));
        assert!(matches!(result, Err(ImportError::UnsafeEntry(_))));
        assert!(!temp.path().join("escape_1.xlsx").exists());
    }

    #[test]
    fn test_import_directory() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("download");
        std::fs::create_dir_all(source.join("Ana_Lee_1")).unwrap();
        std::fs::write(source.join("Ana_Lee_1/work.xlsx"), b"a").unwrap();
        std::fs::write(source.join("chenbo_9_MA1.xlsx"), b"b").unwrap();

        let groups = temp.path().join("groups");
        let summary = import_bundle(&source, &groups).unwrap();
        assert_eq!(summary.students, 2);
        assert!(groups.join("chenbo/chenbo_9_MA1.xlsx").is_file());
    }

    #[test]
    fn test_missing_bundle_and_corrupt_zip() {
        let temp = TempDir::new().unwrap();
        let groups = temp.path().join("groups");
        assert!(matches!(
            import_bundle(&temp.path().join("none.zip"), &groups),
            Err(ImportError::BundleNotFound(_))
        ));

        let bogus = temp.path().join("bogus.zip");
        std::fs::write(&bogus, b"not a zip").unwrap();
        assert!(matches!(
            import_bundle(&bogus, &groups),
            Err(ImportError::Archive { .. })
        ));
    }
}
