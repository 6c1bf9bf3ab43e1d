use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use gradesheet::pipeline::{BatchContext, BatchStatus, ProgressEvent, StatusSnapshot};

/// Progress callback for the grade command.
pub fn log_event(event: ProgressEvent) {
    match event {
        ProgressEvent::Step { .. } => {}
        ProgressEvent::StudentGraded {
            index,
            total,
            student,
            score,
            max,
        } => info!("[{}/{}] {}: {:.2}/{:.2}", index, total, student, score, max),
        ProgressEvent::StudentFailed {
            index,
            total,
            student,
            error,
        } => warn!("[{}/{}] {} failed: {}", index, total, student, error),
        ProgressEvent::Finished { graded, errors } => {
            info!("Finished: {} graded, {} errors", graded, errors)
        }
    }
}

#[derive(Serialize)]
pub struct StudentLine<'a> {
    pub student: String,
    pub total: f64,
    pub max: f64,
    pub missing_sheets: &'a [String],
}

/// Machine-readable result of one `grade` invocation.
#[derive(Serialize)]
pub struct BatchReport<'a> {
    pub run_id: &'a str,
    pub status: BatchStatus,
    pub course: &'a str,
    pub output_path: Option<&'a Path>,
    pub master_path: Option<&'a Path>,
    pub prepared: usize,
    pub graded: usize,
    pub errors: usize,
    pub skipped_tabs: usize,
    pub warnings: Vec<String>,
    pub students: Vec<StudentLine<'a>>,
}

impl<'a> BatchReport<'a> {
    pub fn new(ctx: &'a BatchContext, snapshot: &StatusSnapshot) -> Self {
        Self {
            run_id: &ctx.run_id,
            status: snapshot.status,
            course: &ctx.course_label,
            output_path: ctx.course.as_ref().map(|c| c.graded.as_path()),
            master_path: ctx.master_path.as_deref(),
            prepared: ctx.counters.prepared,
            graded: ctx.counters.graded,
            errors: ctx.counters.errors,
            skipped_tabs: ctx.counters.skipped_tabs,
            warnings: ctx.warnings.iter().map(|w| w.to_string()).collect(),
            students: ctx
                .outcomes
                .iter()
                .map(|o| StudentLine {
                    student: o.student.to_string(),
                    total: o.total,
                    max: o.max,
                    missing_sheets: &o.missing_sheets,
                })
                .collect(),
        }
    }
}

pub fn print_summary(ctx: &BatchContext, snapshot: &StatusSnapshot) {
    let headline = match snapshot.status {
        BatchStatus::Cancelled => "Grading cancelled",
        _ => "Grading complete",
    };
    println!("{}", headline);
    println!(
        "  graded: {}  errors: {}  prepared: {}",
        ctx.counters.graded, ctx.counters.errors, ctx.counters.prepared
    );
    for outcome in &ctx.outcomes {
        println!("  {:<32} {:>7.2} / {:.2}", outcome.student.to_string(), outcome.total, outcome.max);
    }
    if !ctx.warnings.is_empty() {
        println!("Warnings:");
        for warning in &ctx.warnings {
            println!("  {}", warning);
        }
    }
    if let Some(output) = &snapshot.output_path {
        println!("Output: {}", output.display());
    }
    if let Some(master) = &ctx.master_path {
        println!("Master: {}", master.display());
    }
}
