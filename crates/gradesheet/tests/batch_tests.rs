//! End-to-end runs of the batch pipeline over realistic class bundles.

mod common;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use common::{class_roster, SubmissionBuilder, TestHarness};
use gradesheet::pipeline::{
    BatchStatus, FnProgress, PipelineError, PipelineState, PipelineWarning, ProgressEvent,
    TOTAL_STEPS,
};
use gradesheet::workbook::CellValue;
use gradesheet::{Assignment, Tab};

const MISSING_INDEX: usize = 7;

/// Thirty MA1 submissions, one without its Currency Conversion sheet.
fn class_of_thirty(harness: &TestHarness) -> Vec<String> {
    class_roster(30)
        .into_iter()
        .enumerate()
        .map(|(i, (given, family))| {
            let mut builder =
                SubmissionBuilder::for_assignment(Assignment::Ma1, &format!("{} {}", given, family));
            if i == MISSING_INDEX {
                builder = builder.without_sheet("Currency Conversion");
            }
            harness.add_submission(
                &format!("{}_{}_{}", given, family, 1000 + i),
                "homework.xlsx",
                &builder.build(),
            );
            format!("{} {}", given, family)
        })
        .collect()
}

// ── Full class ──

#[test]
fn test_class_of_thirty_from_zip() {
    let harness = TestHarness::new(Assignment::Ma1);
    let names = class_of_thirty(&harness);
    let bundle = harness.zip_download();

    let (state, result) = harness.run(&bundle);
    let ctx = result.unwrap();

    assert_eq!(state.status(), BatchStatus::Completed);
    assert_eq!(ctx.import.students, 30);
    assert_eq!(ctx.counters.prepared, 30);
    assert_eq!(ctx.counters.graded, 30);
    assert_eq!(ctx.counters.errors, 0);
    assert_eq!(ctx.counters.skipped_tabs, 1);

    let missing_student = &names[MISSING_INDEX];
    assert_eq!(
        ctx.warnings,
        vec![PipelineWarning::MissingSheets {
            student: missing_student.clone(),
            sheets: vec!["Currency Conversion".to_string()],
        }]
    );

    let graded: BTreeSet<String> = ctx.outcomes.iter().map(|o| o.student.to_string()).collect();
    let expected: BTreeSet<String> = names.iter().cloned().collect();
    assert_eq!(graded, expected);

    for outcome in &ctx.outcomes {
        assert_eq!(outcome.category_score(Tab::IncomeAnalysis, "name"), Some(1.0));
        assert!(outcome.total <= outcome.max);
        assert!(outcome.grading_sheet.is_file());
    }

    let snapshot = state.snapshot();
    assert_eq!(snapshot.step, TOTAL_STEPS);
    assert_eq!(snapshot.students_done, 30);
    assert_eq!(snapshot.output_path, Some(harness.graded_dir()));
}

#[test]
fn test_missing_sheet_scores_zero_with_feedback() {
    let harness = TestHarness::new(Assignment::Ma1);
    let names = class_of_thirty(&harness);
    let (_state, result) = harness.run(&harness.download_dir);
    let ctx = result.unwrap();

    let outcome = ctx
        .outcomes
        .iter()
        .find(|o| o.student.to_string() == names[MISSING_INDEX])
        .unwrap();
    assert_eq!(outcome.missing_sheets, vec!["Currency Conversion".to_string()]);
    for key in ["country_selection", "budget_conversion", "usd_conversion_back", "formatting"] {
        assert_eq!(outcome.category_score(Tab::CurrencyConversion, key), Some(0.0));
    }

    let file = format!("{}_MA1_Grade.xlsx", outcome.student.file_stem());
    let graded = harness.read_graded(&file);
    let sheet = graded.sheet("Grading Sheet").unwrap();
    assert_eq!(sheet.value("F20"), CellValue::Number(0.0));
    match sheet.value("G20") {
        CellValue::Text(text) => assert!(text.contains("Currency Conversion"), "{}", text),
        other => panic!("expected feedback text, got {:?}", other),
    }
    // Template labels survive grading.
    assert_eq!(sheet.value("F1"), CellValue::Text("Score".into()));
}

#[test]
fn test_master_workbook_and_json_summary() {
    let harness = TestHarness::new(Assignment::Ma1);
    class_of_thirty(&harness);
    let (_state, result) = harness.run(&harness.download_dir);
    let ctx = result.unwrap();

    let master = ctx.master_path.clone().unwrap();
    assert_eq!(master, harness.graded_dir().join("INSTRUCTOR_MASTER.xlsx"));
    let workbook = gradesheet::read_workbook(&master).unwrap();
    let sheet = workbook.sheet("Summary").unwrap();
    assert_eq!(sheet.value("A1"), CellValue::Text("Student".into()));
    assert_eq!(sheet.value("A32"), CellValue::Text("Class Average".into()));

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(harness.graded_dir().join("class_summary.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(json["course"], "MAT-144_501");
    assert_eq!(json["assignment"], "ma1");
    assert_eq!(json["graded"], 30);
    assert_eq!(json["students"].as_array().unwrap().len(), 30);
}

// ── Variants ──

#[test]
fn test_ma3_batch() {
    let harness = TestHarness::new(Assignment::Ma3);
    for (given, family) in class_roster(3) {
        harness.add_submission(
            &format!("{}_{}_55", given, family),
            "MA3.xlsx",
            &SubmissionBuilder::for_assignment(Assignment::Ma3, &format!("{} {}", given, family))
                .build(),
        );
    }

    let (state, result) = harness.run(&harness.download_dir);
    let ctx = result.unwrap();
    assert_eq!(state.status(), BatchStatus::Completed);
    assert_eq!(ctx.counters.graded, 3);
    assert!(ctx.warnings.is_empty());
    for outcome in &ctx.outcomes {
        assert_eq!(outcome.category_score(Tab::DataAnalysis, "name"), Some(1.0));
        assert!(harness
            .graded_dir()
            .join(format!("{}_MA3_Grade.xlsx", outcome.student.file_stem()))
            .is_file());
    }
}

#[test]
fn test_flat_lms_download_names() {
    let harness = TestHarness::new(Assignment::Ma1);
    let workbook = SubmissionBuilder::for_assignment(Assignment::Ma1, "Ana Lee").build();
    gradesheet::write_workbook(
        &workbook,
        &harness.download_dir.join("leeana_123456_7890_MA1.xlsx"),
    )
    .unwrap();
    let bundle = harness.zip_download();

    let (_state, result) = harness.run(&bundle);
    let ctx = result.unwrap();
    assert_eq!(ctx.counters.graded, 1);
    assert!(harness.graded_dir().join("leeana_Unknown_MA1_Grade.xlsx").is_file());
}

#[test]
fn test_corrupt_upload_does_not_stop_class() {
    let harness = TestHarness::new(Assignment::Ma1);
    harness.add_submission(
        "Ana_Lee_1",
        "hw.xlsx",
        &SubmissionBuilder::for_assignment(Assignment::Ma1, "Ana Lee").build(),
    );
    harness.add_raw_submission("Bo_Chen_2", "hw.xlsx", b"PK\x03\x04 truncated");

    let (state, result) = harness.run(&harness.download_dir);
    let ctx = result.unwrap();
    assert_eq!(state.status(), BatchStatus::Completed);
    assert_eq!(ctx.counters.graded, 1);
    assert_eq!(ctx.counters.errors, 1);

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(harness.graded_dir().join("class_summary.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(json["errors"], 1);
}

#[test]
fn test_state_can_run_twice() {
    let harness = TestHarness::new(Assignment::Ma1);
    harness.add_submission(
        "Ana_Lee_1",
        "hw.xlsx",
        &SubmissionBuilder::for_assignment(Assignment::Ma1, "Ana Lee").build(),
    );
    let runner = harness.runner();
    let state = PipelineState::new();

    let first = runner
        .run(&harness.download_dir, common::harness::COURSE, &state, &gradesheet::pipeline::NoopProgress)
        .unwrap();
    let second = runner
        .run(&harness.download_dir, common::harness::COURSE, &state, &gradesheet::pipeline::NoopProgress)
        .unwrap();
    assert_eq!(first.counters.graded, second.counters.graded);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(state.status(), BatchStatus::Completed);
}

// ── Progress and cancellation ──

#[test]
fn test_progress_events_in_order() {
    let harness = TestHarness::new(Assignment::Ma1);
    for (given, family) in class_roster(4) {
        harness.add_submission(
            &format!("{}_{}_9", given, family),
            "hw.xlsx",
            &SubmissionBuilder::for_assignment(Assignment::Ma1, &given).build(),
        );
    }

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let progress = FnProgress(move |event: ProgressEvent| sink.lock().unwrap().push(event));
    let state = PipelineState::new();
    harness
        .runner()
        .run(&harness.download_dir, common::harness::COURSE, &state, &progress)
        .unwrap();

    let events = events.lock().unwrap();
    let steps: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Step { step, .. } => Some(*step),
            _ => None,
        })
        .collect();
    assert_eq!(steps, (1..=TOTAL_STEPS).collect::<Vec<_>>());
    let graded = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::StudentGraded { total: 4, .. }))
        .count();
    assert_eq!(graded, 4);
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Finished {
            graded: 4,
            errors: 0
        })
    );
}

#[test]
fn test_cancel_keeps_finished_sheets() {
    let harness = TestHarness::new(Assignment::Ma1);
    class_of_thirty(&harness);

    let state = PipelineState::new();
    let observer = Arc::clone(&state);
    let progress = FnProgress(move |event: ProgressEvent| {
        if let ProgressEvent::StudentGraded { index: 5, .. } = event {
            observer.request_cancel().unwrap();
        }
    });
    let ctx = harness
        .runner()
        .run(&harness.download_dir, common::harness::COURSE, &state, &progress)
        .unwrap();

    assert_eq!(state.status(), BatchStatus::Cancelled);
    assert_eq!(ctx.outcomes.len(), 5);
    assert!(ctx.master_path.is_none());
    assert!(!harness.graded_dir().join("INSTRUCTOR_MASTER.xlsx").exists());
    for outcome in &ctx.outcomes {
        let file = format!("{}_MA1_Grade.xlsx", outcome.student.file_stem());
        let graded = harness.read_graded(&file);
        assert_eq!(
            graded.sheet("Grading Sheet").unwrap().value("F3"),
            CellValue::Number(1.0)
        );
    }
    assert!(state
        .logs()
        .iter()
        .any(|l| l.message.contains("Cancellation requested")));
}

// ── Fatal errors ──

#[test]
fn test_missing_template_reports_error_state() {
    let harness = TestHarness::new(Assignment::Ma1);
    class_of_thirty(&harness);
    std::fs::remove_file(harness.config.resolved_template_path()).unwrap();

    let (state, result) = harness.run(&harness.download_dir);
    assert!(matches!(result, Err(PipelineError::TemplateMissing(_))));
    assert_eq!(state.status(), BatchStatus::Error);
    let snapshot = state.snapshot();
    assert_eq!(snapshot.step, 1);
    assert!(snapshot.error.is_some());
    assert!(!harness.graded_dir().exists());
}

#[test]
fn test_template_without_grading_sheet_is_invalid() {
    let harness = TestHarness::new(Assignment::Ma1);
    let mut config = harness.config.clone();
    config.grading_sheet_name = "Rubric".to_string();
    let runner = gradesheet::pipeline::BatchRunner::from_config(Arc::new(
        gradesheet::pipeline::PipelineConfig::from_config(&config),
    ));

    let state = PipelineState::new();
    let result = runner.run(
        &harness.download_dir,
        common::harness::COURSE,
        &state,
        &gradesheet::pipeline::NoopProgress,
    );
    assert!(matches!(result, Err(PipelineError::TemplateInvalid { .. })));
}
