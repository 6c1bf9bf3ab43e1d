use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use crate::assignments::{GradingEnv, TabReport};
use crate::criteria::ChartInspection;
use crate::equivalence::EquivalenceEngine;
use crate::feedback::FeedbackCatalog;
use crate::workbook::grading::GradingWorkbook;
use crate::workbook::reader::read_workbook;

use super::charts::{exported_images, insert_chart_note, ChartExporter, ExportOutcome, UnsupportedExporter};
use super::config::PipelineConfig;
use super::context::BatchContext;
use super::error::{PipelineError, PipelineWarning, StudentError};
use super::import::import_bundle;
use super::job::{clean_name_parts, grading_file_name, submission_file_name, StudentJob, StudentOutcome};
use super::progress::{ProgressEvent, ProgressReporter};
use super::scanner::{discover_submissions, first_workbook, student_folders};
use super::state::PipelineState;
use super::summary::ClassSummary;
use super::workspace::{copy_file, ensure_directory, sanitize_course_label, CoursePaths, Workspace};

pub const TOTAL_STEPS: usize = 8;

const TARGET: &str = "gradesheet::pipeline";

pub struct BatchRunner {
    config: Arc<PipelineConfig>,
    workspace: Workspace,
    engine: EquivalenceEngine,
    charts: ChartInspection,
    exporter: Box<dyn ChartExporter>,
}

impl BatchRunner {
    /// Production constructor: builds every collaborator from config.
    pub fn from_config(config: Arc<PipelineConfig>) -> Self {
        Self {
            workspace: Workspace::new(&config.workspace_root),
            engine: EquivalenceEngine::from_config(&config.equivalence),
            charts: ChartInspection::from_config(&config.charts),
            exporter: Box::new(UnsupportedExporter),
            config,
        }
    }

    pub fn with_exporter(mut self, exporter: Box<dyn ChartExporter>) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Runs a whole batch against `state`.
    ///
    /// Student-level failures are counted and logged; only infrastructure
    /// failures return `Err`, after the state has been moved to `error`.
    pub fn run(
        &self,
        bundle: &Path,
        course_label: &str,
        state: &PipelineState,
        progress: &dyn ProgressReporter,
    ) -> Result<BatchContext, PipelineError> {
        state.begin(TOTAL_STEPS)?;
        let mut ctx = BatchContext::new(bundle, course_label);
        let _batch_span = info_span!("batch",
            run_id = %ctx.run_id,
            course = %course_label,
            assignment = %self.config.assignment,
        )
        .entered();
        match self.run_steps(&mut ctx, state, progress) {
            Ok(()) => {
                let output = ctx.output_path();
                if ctx.cancelled {
                    log_warn(state, "Batch cancelled; finished grading sheets were kept");
                    state.cancelled(output);
                } else {
                    log_info(
                        state,
                        &format!(
                            "Batch complete: {} graded, {} errors",
                            ctx.counters.graded, ctx.counters.errors
                        ),
                    );
                    state.complete(output.unwrap_or_default());
                }
                progress.report(ProgressEvent::Finished {
                    graded: ctx.counters.graded,
                    errors: ctx.counters.errors,
                });
                Ok(ctx)
            }
            Err(e) => {
                state.fail(&e);
                Err(e)
            }
        }
    }

    fn run_steps(
        &self,
        ctx: &mut BatchContext,
        state: &PipelineState,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        // Step 1: Workspace assets
        let catalog = {
            let _step = info_span!("workspace_assets").entered();
            self.enter_step(1, "Preparing workspace", state, progress);
            self.step_workspace_assets(state)?
        };

        // Step 2: Course folders
        let course = {
            let _step = info_span!("course_folders").entered();
            self.enter_step(2, "Creating course folders", state, progress);
            self.step_course_folders(ctx)?
        };

        // Step 3: Import submissions
        {
            let _step = info_span!("import").entered();
            self.enter_step(3, "Importing submissions", state, progress);
            self.step_import(ctx, &course, state)?;
        }

        // Step 4: Prepare submissions and grading sheets
        {
            let _step = info_span!("prepare").entered();
            self.enter_step(4, "Preparing grading sheets", state, progress);
            self.step_prepare(ctx, &course, state)?;
        }

        // Step 5: Grade
        {
            let _step = info_span!("grade").entered();
            self.enter_step(5, "Grading students", state, progress);
            self.step_grade(ctx, &course, &catalog, state, progress)?;
        }

        if ctx.cancelled {
            return Ok(());
        }

        // Step 6: Export charts
        {
            let _step = info_span!("export_charts").entered();
            self.enter_step(6, "Exporting charts", state, progress);
            self.step_export_charts(ctx, state)?;
        }

        // Step 7: Insert charts and clean up
        {
            let _step = info_span!("insert_charts").entered();
            self.enter_step(7, "Inserting charts", state, progress);
            self.step_insert_charts(ctx, state);
        }

        // Step 8: Class summary
        {
            let _step = info_span!("class_summary").entered();
            self.enter_step(8, "Building class summary", state, progress);
            self.step_class_summary(ctx, &course, state)?;
        }

        Ok(())
    }

    fn enter_step(
        &self,
        step: usize,
        name: &str,
        state: &PipelineState,
        progress: &dyn ProgressReporter,
    ) {
        state.set_step(step, name);
        log_info(state, &format!("[{}/{}] {}", step, TOTAL_STEPS, name));
        progress.report(ProgressEvent::Step {
            step,
            total: TOTAL_STEPS,
            name: name.to_string(),
        });
    }

    fn step_workspace_assets(&self, state: &PipelineState) -> Result<FeedbackCatalog, PipelineError> {
        self.workspace.ensure_assets()?;

        let template = &self.config.template_path;
        if !template.is_file() {
            return Err(PipelineError::TemplateMissing(template.clone()));
        }
        GradingWorkbook::open(template, &self.config.grading_sheet_name).map_err(|e| {
            PipelineError::TemplateInvalid {
                path: template.clone(),
                source: e,
            }
        })?;

        let catalog = FeedbackCatalog::load(Some(self.config.feedback_directory.as_path()))?;
        debug!("Template {} is usable", template.display());
        state.log(
            "DEBUG",
            TARGET,
            &format!("Using template {}", template.display()),
        );
        Ok(catalog)
    }

    fn step_course_folders(&self, ctx: &mut BatchContext) -> Result<CoursePaths, PipelineError> {
        let label =
            sanitize_course_label(&ctx.course_label).ok_or(PipelineError::BlankCourseLabel)?;
        let course = self.workspace.course_folders(&label)?;
        ctx.course = Some(course.clone());
        Ok(course)
    }

    fn step_import(
        &self,
        ctx: &mut BatchContext,
        course: &CoursePaths,
        state: &PipelineState,
    ) -> Result<(), PipelineError> {
        ctx.import = import_bundle(&ctx.bundle, &course.groups)?;
        log_info(
            state,
            &format!(
                "Imported {} workbooks for {} students",
                ctx.import.files, ctx.import.students
            ),
        );
        Ok(())
    }

    fn step_prepare(
        &self,
        ctx: &mut BatchContext,
        course: &CoursePaths,
        state: &PipelineState,
    ) -> Result<(), PipelineError> {
        let assignment = self.config.assignment;
        let folders = student_folders(&course.groups)?;
        if folders.is_empty() {
            log_warn(
                state,
                &format!("No student folders found inside {}", course.groups.display()),
            );
        }

        for folder in folders {
            let folder_name = folder
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let student = clean_name_parts(&folder_name);

            let workbook = match first_workbook(&folder) {
                Ok(Some(workbook)) => workbook,
                Ok(None) => {
                    log_warn(state, &format!("No Excel file found inside: {}", folder_name));
                    ctx.warnings.push(PipelineWarning::FolderSkipped {
                        folder: folder_name,
                        reason: "no workbook".to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    self.prepare_failed(ctx, state, folder_name, e.to_string());
                    continue;
                }
            };

            let submission = course.submissions.join(submission_file_name(&student, assignment));
            let grading = course.graded.join(grading_file_name(&student, assignment));
            let copied = copy_file(&workbook, &submission)
                .and_then(|_| copy_file(&self.config.template_path, &grading));
            match copied {
                Ok(()) => {
                    debug!("Prepared: {}", student.file_stem());
                    ctx.counters.prepared += 1;
                }
                Err(e) => self.prepare_failed(ctx, state, folder_name, e.to_string()),
            }
        }

        log_info(
            state,
            &format!(
                "Prepared {} students ({} errors)",
                ctx.counters.prepared, ctx.counters.prepare_errors
            ),
        );
        Ok(())
    }

    fn prepare_failed(
        &self,
        ctx: &mut BatchContext,
        state: &PipelineState,
        folder: String,
        reason: String,
    ) {
        log_warn(state, &format!("Error processing folder '{}': {}", folder, reason));
        ctx.counters.prepare_errors += 1;
        ctx.warnings
            .push(PipelineWarning::FolderSkipped { folder, reason });
    }

    fn step_grade(
        &self,
        ctx: &mut BatchContext,
        course: &CoursePaths,
        catalog: &FeedbackCatalog,
        state: &PipelineState,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        ctx.jobs = discover_submissions(&course.submissions, &course.graded, self.config.assignment)?;
        let total = ctx.jobs.len();
        state.set_student_progress(0, total);

        let jobs = ctx.jobs.clone();
        for (index, job) in jobs.iter().enumerate() {
            if state.is_cancel_requested() {
                log_warn(
                    state,
                    &format!("Cancellation observed after {} of {} students", index, total),
                );
                ctx.cancelled = true;
                break;
            }

            let _student = info_span!("student", name = %job.student).entered();
            match self.grade_student(job, catalog, ctx, state) {
                Ok(outcome) => {
                    ctx.counters.graded += 1;
                    debug!("Graded {}: {}/{}", job.student, outcome.total, outcome.max);
                    progress.report(ProgressEvent::StudentGraded {
                        index: index + 1,
                        total,
                        student: job.student.to_string(),
                        score: outcome.total,
                        max: outcome.max,
                    });
                    ctx.outcomes.push(outcome);
                }
                Err(e) => {
                    ctx.counters.errors += 1;
                    log_warn(state, &format!("Failed to grade {}: {}", job.student, e));
                    progress.report(ProgressEvent::StudentFailed {
                        index: index + 1,
                        total,
                        student: job.student.to_string(),
                        error: e.to_string(),
                    });
                }
            }
            state.set_student_progress(index + 1, total);
        }

        log_info(
            state,
            &format!(
                "Graded {} students, {} errors, {} tabs missing",
                ctx.counters.graded, ctx.counters.errors, ctx.counters.skipped_tabs
            ),
        );
        Ok(())
    }

    /// Grades one student. The submission is read into memory and released
    /// before grading; the grading sheet is rewritten once at the end.
    fn grade_student(
        &self,
        job: &StudentJob,
        catalog: &FeedbackCatalog,
        ctx: &mut BatchContext,
        state: &PipelineState,
    ) -> Result<StudentOutcome, StudentError> {
        if !job.grading_sheet.is_file() {
            return Err(StudentError::GradingSheetMissing(job.student.to_string()));
        }

        let workbook = read_workbook(&job.submission).map_err(|e| StudentError::Submission {
            path: job.submission.clone(),
            source: e,
        })?;
        let mut grading = GradingWorkbook::open(&job.grading_sheet, &self.config.grading_sheet_name)
            .map_err(|e| StudentError::GradingSheet {
                path: job.grading_sheet.clone(),
                source: e,
            })?;

        let assignment = self.config.assignment;
        let validation = workbook.validate_required_sheets(&assignment.required_sheets());
        if !validation.is_complete() {
            log_warn(
                state,
                &format!(
                    "{} is missing sheets: {}",
                    job.student,
                    validation.missing.join(", ")
                ),
            );
            ctx.warnings.push(PipelineWarning::MissingSheets {
                student: job.student.to_string(),
                sheets: validation.missing.clone(),
            });
        }

        let env = GradingEnv {
            engine: &self.engine,
            charts: self.charts,
            student: &job.student,
        };

        let mut reports: Vec<TabReport> = Vec::with_capacity(assignment.tabs().len());
        for tab in assignment.tabs() {
            let report = match workbook.sheet_ci(tab.sheet_name()) {
                Some(sheet) => tab.grade(sheet, &env),
                None => {
                    ctx.counters.skipped_tabs += 1;
                    tab.missing()
                }
            };
            if let Err(e) = report.write_to(&mut grading, catalog) {
                warn!("Could not write {} results for {}: {}", tab, job.student, e);
                ctx.warnings.push(PipelineWarning::TabWriteFailed {
                    student: job.student.to_string(),
                    tab: tab.to_string(),
                    error: e.to_string(),
                });
            }
            reports.push(report);
        }

        grading.save().map_err(|e| StudentError::Save {
            path: job.grading_sheet.clone(),
            source: e,
        })?;

        Ok(StudentOutcome::new(
            job,
            reports,
            validation.missing,
            assignment.max_points(),
        ))
    }

    fn step_export_charts(
        &self,
        ctx: &mut BatchContext,
        state: &PipelineState,
    ) -> Result<(), PipelineError> {
        if !self.config.charts.export_enabled {
            log_info(state, "Chart export disabled; skipping");
            return Ok(());
        }

        let out_dir = self.workspace.temp_charts_dir();
        ensure_directory(&out_dir)?;

        for outcome in &ctx.outcomes {
            let Some(job) = ctx.jobs.iter().find(|j| j.student == outcome.student) else {
                continue;
            };
            let stem = job.student.file_stem();
            match self.exporter.export(&job.submission, &out_dir, &stem) {
                Ok(ExportOutcome::Exported(path)) => {
                    debug!("Exported chart {}", path.display());
                    ctx.counters.charts_exported += 1;
                }
                Ok(ExportOutcome::NoChart) => debug!("No chart to export for {}", stem),
                Ok(ExportOutcome::Unsupported) => {
                    log_info(
                        state,
                        &format!("Chart export skipped: {}", self.exporter.name()),
                    );
                    break;
                }
                Err(error) => {
                    log_warn(state, &format!("Chart export failed for {}: {}", stem, error));
                    ctx.warnings.push(PipelineWarning::ChartExportFailed {
                        student: job.student.to_string(),
                        error,
                    });
                }
            }
        }
        Ok(())
    }

    fn step_insert_charts(&self, ctx: &mut BatchContext, state: &PipelineState) {
        let images = exported_images(&self.workspace.temp_charts_dir());
        if images.is_empty() {
            debug!("No chart images to insert");
        }

        for (stem, image) in images {
            let Some(job) = ctx.jobs.iter().find(|j| j.student.file_stem() == stem) else {
                debug!("No grading sheet for chart {}", image.display());
                continue;
            };
            match insert_chart_note(
                &job.grading_sheet,
                &self.config.grading_sheet_name,
                &self.config.charts.chart_anchor,
                &image,
            ) {
                Ok(()) => ctx.counters.charts_inserted += 1,
                Err(e) => {
                    log_warn(state, &format!("Chart insert failed for {}: {}", stem, e));
                    ctx.warnings.push(PipelineWarning::ChartInsertFailed {
                        student: job.student.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if let Err(e) = self.workspace.clean_temp_charts() {
            log_warn(state, &format!("Could not remove temporary charts: {}", e));
        }
    }

    fn step_class_summary(
        &self,
        ctx: &mut BatchContext,
        course: &CoursePaths,
        state: &PipelineState,
    ) -> Result<(), PipelineError> {
        let summary = ClassSummary::build(
            &course.label,
            self.config.assignment,
            &ctx.outcomes,
            ctx.counters.errors,
        );
        let master = summary.write(&course.graded)?;
        log_info(state, &format!("Instructor master written to {}", master.display()));
        ctx.master_path = Some(master);
        Ok(())
    }
}

fn log_info(state: &PipelineState, message: &str) {
    info!("{}", message);
    state.log("INFO", TARGET, message);
}

fn log_warn(state: &PipelineState, message: &str) {
    warn!("{}", message);
    state.log("WARN", TARGET, message);
}
