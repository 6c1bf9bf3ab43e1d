//! Loading config files from disk, JSON and YAML.

mod common;

use std::path::{Path, PathBuf};

use gradesheet::config::{load_config, validate_config, Config};
use gradesheet::pipeline::PipelineConfig;
use gradesheet::{Assignment, ConfigError};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/configs")
        .join(name)
}

#[test]
fn test_minimal_json_uses_defaults() {
    let config = load_config(fixture("minimal.json")).unwrap();
    assert_eq!(config.workspace_root, PathBuf::from("/srv/grading"));
    assert_eq!(config.assignment, Assignment::Ma1);
    assert_eq!(config.grading_sheet_name, "Grading Sheet");
    assert_eq!(config.equivalence.range_offset_tolerance, 3);
    assert_eq!(config.charts.chart_anchor, "J4");
    assert_eq!(
        config.resolved_template_path(),
        PathBuf::from("/srv/grading/templates/MA1_Grading_Template.xlsx")
    );
}

#[test]
fn test_yaml_course_config() {
    let config = load_config(fixture("ma3-course.yaml")).unwrap();
    assert_eq!(config.assignment, Assignment::Ma3);
    assert_eq!(config.equivalence.range_offset_tolerance, 2);
    assert_eq!(config.equivalence.relative_tolerance, 0.02);
    assert_eq!(config.equivalence.zero_absolute_tolerance, 0.01);
    assert_eq!(config.charts.chart_anchor, "K6");

    let pipeline = PipelineConfig::from_config(&config);
    assert_eq!(
        pipeline.template_path,
        PathBuf::from("/srv/grading/templates/MA3_Grading_Template.xlsx")
    );
    assert_eq!(pipeline.feedback_directory, PathBuf::from("/srv/grading/feedback"));
}

#[test]
fn test_unknown_key_fails_schema() {
    match load_config(fixture("unknown-key.json")) {
        Err(ConfigError::SchemaValidation { errors }) => assert!(errors.contains("workers")),
        other => panic!("expected schema error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_bad_anchor_fails_schema() {
    assert!(matches!(
        load_config(fixture("bad-anchor.yaml")),
        Err(ConfigError::SchemaValidation { .. })
    ));
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        load_config(fixture("does-not-exist.json")),
        Err(ConfigError::ReadFile { .. })
    ));
}

#[test]
fn test_config_written_by_harness_round_trips() {
    let harness = common::TestHarness::new(Assignment::Ma3);
    let path = harness.temp_path().join("gradesheet.json");
    std::fs::write(&path, serde_json::to_string_pretty(&harness.config).unwrap()).unwrap();

    let loaded = load_config(&path).unwrap();
    assert_eq!(loaded.workspace_root, harness.workspace);
    assert_eq!(loaded.assignment, Assignment::Ma3);
}

#[test]
fn test_code_built_config_is_validated() {
    let mut config = Config::default();
    assert!(validate_config(&config).is_ok());
    config.charts.chart_anchor = "nowhere".to_string();
    assert!(matches!(
        validate_config(&config),
        Err(ConfigError::Validation { .. })
    ));
}
