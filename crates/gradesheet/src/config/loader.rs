use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::workbook::address::CellAddress;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Loads a config file, parsing YAML for `.yaml`/`.yml` and JSON otherwise.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    if is_yaml {
        load_config_from_yaml_str(&content)
    } else {
        load_config_from_str(&content)
    }
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;
    load_config_from_value(json_value)
}

pub fn load_config_from_yaml_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_yaml::from_str(content)?;
    load_config_from_value(json_value)
}

fn load_config_from_value(json_value: serde_json::Value) -> Result<Config, ConfigError> {
    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Checks that go beyond the schema. Also applied to configs built in code.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.grading_sheet_name.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "grading_sheet_name must not be blank".to_string(),
        });
    }

    let eq = &config.equivalence;
    for (name, value) in [
        ("relative_tolerance", eq.relative_tolerance),
        ("zero_absolute_tolerance", eq.zero_absolute_tolerance),
        ("trendline_forward_min", config.charts.trendline_forward_min),
        ("x_axis_max_min", config.charts.x_axis_max_min),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::Validation {
                message: format!("{} must be a finite, non-negative number (got {})", name, value),
            });
        }
    }

    if eq.relative_tolerance >= 1.0 {
        return Err(ConfigError::Validation {
            message: format!(
                "relative_tolerance must be below 1.0 (got {})",
                eq.relative_tolerance
            ),
        });
    }

    if let Err(e) = CellAddress::parse(&config.charts.chart_anchor) {
        return Err(ConfigError::Validation {
            message: format!("chart_anchor is not a cell address: {}", e),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignments::Assignment;

    #[test]
    fn test_load_valid_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "workspace_root": "/srv/grading",
            "assignment": "ma3",
            "grading_sheet_name": "Rubric",
            "equivalence": {
                "range_offset_tolerance": 2,
                "relative_tolerance": 0.05
            },
            "charts": {
                "chart_anchor": "$K$10",
                "export_enabled": true
            }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.assignment, Assignment::Ma3);
        assert_eq!(config.grading_sheet_name, "Rubric");
        assert_eq!(config.equivalence.range_offset_tolerance, 2);
        assert_eq!(config.equivalence.relative_tolerance, 0.05);
        assert_eq!(config.charts.chart_anchor, "$K$10");
        assert!(config.charts.export_enabled);
    }

    #[test]
    fn test_load_yaml_config() {
        let yaml = r#"
version: "1.0"
assignment: ma1
charts:
  trendline_forward_min: 5
"#;
        let config = load_config_from_yaml_str(yaml).unwrap();
        assert_eq!(config.assignment, Assignment::Ma1);
        assert_eq!(config.charts.trendline_forward_min, 5.0);
    }

    #[test]
    fn test_load_config_from_file_picks_format_by_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let yaml_path = dir.path().join("gradesheet.yml");
        std::fs::write(&yaml_path, "version: \"1.0\"\nassignment: ma3\n").unwrap();
        assert_eq!(load_config(&yaml_path).unwrap().assignment, Assignment::Ma3);

        let json_path = dir.path().join("gradesheet.json");
        std::fs::write(&json_path, r#"{"version": "1.0"}"#).unwrap();
        assert_eq!(load_config(&json_path).unwrap().assignment, Assignment::Ma1);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = load_config("/nonexistent/gradesheet.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    // ── Rejections ──

    #[test]
    fn test_unknown_assignment_fails_schema() {
        let result = load_config_from_str(r#"{"version": "1.0", "assignment": "ma2"}"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_unknown_field_fails_schema() {
        let result = load_config_from_str(r#"{"version": "1.0", "workers": 4}"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let result = load_config_from_str(r#"{"version": "2.0"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_relative_tolerance_must_be_below_one() {
        let result = load_config_from_str(
            r#"{"version": "1.0", "equivalence": {"relative_tolerance": 1.5}}"#,
        );
        match result {
            Err(ConfigError::Validation { message }) => {
                assert!(message.contains("relative_tolerance"))
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_config_rejects_bad_values_built_in_code() {
        let mut config = Config::default();
        config.grading_sheet_name = "   ".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.equivalence.zero_absolute_tolerance = f64::NAN;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.charts.chart_anchor = "J".to_string();
        assert!(validate_config(&config).is_err());

        assert!(validate_config(&Config::default()).is_ok());
    }
}
