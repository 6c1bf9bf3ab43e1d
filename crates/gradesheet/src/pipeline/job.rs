use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::assignments::{Assignment, StudentName, TabReport};

/// One student's submission and the grading sheet it is graded into.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentJob {
    pub student: StudentName,
    pub submission: PathBuf,
    pub grading_sheet: PathBuf,
}

impl StudentJob {
    /// Pairs a prepared submission (`First_Last_MA1.xlsx`) with its grading
    /// sheet in `graded_dir`. `None` when the file name lacks the suffix.
    pub fn from_submission(
        submission: &Path,
        graded_dir: &Path,
        assignment: Assignment,
    ) -> Option<Self> {
        let stem = submission.file_stem()?.to_str()?;
        let readable = stem.strip_suffix(&format!("_{}", assignment.suffix()))?;
        let student = split_readable_name(readable);
        Some(Self {
            grading_sheet: graded_dir.join(grading_file_name(&student, assignment)),
            submission: submission.to_path_buf(),
            student,
        })
    }
}

pub fn submission_file_name(student: &StudentName, assignment: Assignment) -> String {
    format!("{}_{}.xlsx", student.file_stem(), assignment.suffix())
}

pub fn grading_file_name(student: &StudentName, assignment: Assignment) -> String {
    format!("{}_{}_Grade.xlsx", student.file_stem(), assignment.suffix())
}

/// Turns an LMS folder name such as `Jonathan_(Jonathan)_Chavez Chaparro_21222530`
/// into `Jonathan` / `Chavez Chaparro`.
///
/// Numeric tokens and parenthesised tokens are dropped, stray parentheses
/// removed, and consecutive repeats (ignoring case) collapsed. The first
/// remaining token is the first name; the rest, joined with `_`, the last.
pub fn clean_name_parts(folder_name: &str) -> StudentName {
    let mut cleaned: Vec<String> = Vec::new();
    for token in folder_name.split('_').map(str::trim).filter(|t| !t.is_empty()) {
        if token.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if token.starts_with('(') && token.ends_with(')') {
            continue;
        }
        let token: String = token.chars().filter(|c| *c != '(' && *c != ')').collect();
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if cleaned
            .last()
            .is_some_and(|prev| prev.to_lowercase() == token.to_lowercase())
        {
            continue;
        }
        cleaned.push(token.to_string());
    }

    match cleaned.split_first() {
        None => StudentName::new("Unknown", "Unknown"),
        Some((first, [])) => StudentName::new(first.clone(), "Unknown"),
        Some((first, rest)) => StudentName::new(first.clone(), rest.join("_")),
    }
}

/// Splits `First_Last_Parts` back into a name.
fn split_readable_name(readable: &str) -> StudentName {
    match readable.split_once('_') {
        Some((first, last)) => StudentName::new(first, last),
        None => StudentName::new(readable, "Unknown"),
    }
}

/// What grading produced for one student.
#[derive(Debug, Clone, Serialize)]
pub struct StudentOutcome {
    pub student: StudentName,
    #[serde(skip)]
    pub grading_sheet: PathBuf,
    pub tabs: Vec<TabReport>,
    pub missing_sheets: Vec<String>,
    pub total: f64,
    pub max: f64,
}

impl StudentOutcome {
    pub fn new(
        job: &StudentJob,
        tabs: Vec<TabReport>,
        missing_sheets: Vec<String>,
        max: f64,
    ) -> Self {
        let total = (tabs.iter().map(|t| t.total()).sum::<f64>() * 100.0).round() / 100.0;
        Self {
            student: job.student.clone(),
            grading_sheet: job.grading_sheet.clone(),
            tabs,
            missing_sheets,
            total,
            max,
        }
    }

    /// Score of one category, looked up by tab and key.
    pub fn category_score(&self, tab: crate::assignments::Tab, key: &str) -> Option<f64> {
        self.tabs
            .iter()
            .find(|t| t.tab == tab)
            .and_then(|t| t.category(key))
            .map(|c| c.score.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Name cleaning ──

    #[test]
    fn test_clean_lms_folder_name() {
        let name = clean_name_parts("Jonathan_(Jonathan)_Chavez Chaparro_21222530");
        assert_eq!(name, StudentName::new("Jonathan", "Chavez Chaparro"));
    }

    #[test]
    fn test_clean_collapses_repeats_and_keeps_multi_part_last() {
        let name = clean_name_parts("Ana_ana_De_La_Cruz_1234");
        assert_eq!(name, StudentName::new("Ana", "De_La_Cruz"));
    }

    #[test]
    fn test_clean_degenerate_names() {
        assert_eq!(clean_name_parts("12345_(x)"), StudentName::new("Unknown", "Unknown"));
        assert_eq!(clean_name_parts("Prince_998"), StudentName::new("Prince", "Unknown"));
        assert_eq!(clean_name_parts("Lee_(Sam)y"), StudentName::new("Lee", "Samy"));
    }

    // ── Jobs ──

    #[test]
    fn test_job_from_prepared_submission() {
        let job = StudentJob::from_submission(
            Path::new("/subs/Ana_De_La_Cruz_MA1.xlsx"),
            Path::new("/graded"),
            Assignment::Ma1,
        )
        .unwrap();
        assert_eq!(job.student, StudentName::new("Ana", "De_La_Cruz"));
        assert_eq!(
            job.grading_sheet,
            PathBuf::from("/graded/Ana_De_La_Cruz_MA1_Grade.xlsx")
        );
    }

    #[test]
    fn test_job_requires_assignment_suffix() {
        assert!(StudentJob::from_submission(
            Path::new("/subs/Ana_Lee_MA3.xlsx"),
            Path::new("/graded"),
            Assignment::Ma1,
        )
        .is_none());
    }

    #[test]
    fn test_file_names() {
        let student = StudentName::new("Ana", "Lee");
        assert_eq!(submission_file_name(&student, Assignment::Ma3), "Ana_Lee_MA3.xlsx");
        assert_eq!(grading_file_name(&student, Assignment::Ma1), "Ana_Lee_MA1_Grade.xlsx");
    }
}
