use std::path::PathBuf;

use crate::assignments::Assignment;
use crate::config::{ChartsConfig, Config, EquivalenceConfig};

/// Environment variable overriding the configured workspace root.
pub const WORKSPACE_ENV: &str = "GRADESHEET_WORKSPACE";

pub struct PipelineConfig {
    pub workspace_root: PathBuf,
    pub assignment: Assignment,
    pub grading_sheet_name: String,
    pub template_path: PathBuf,
    pub feedback_directory: PathBuf,
    pub equivalence: EquivalenceConfig,
    pub charts: ChartsConfig,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        let workspace_root = std::env::var_os(WORKSPACE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| config.workspace_root.clone());

        let rooted = Config {
            workspace_root: workspace_root.clone(),
            ..config.clone()
        };

        Self {
            template_path: rooted.resolved_template_path(),
            feedback_directory: config
                .feedback_directory
                .clone()
                .unwrap_or_else(|| workspace_root.join("feedback")),
            workspace_root,
            assignment: config.assignment,
            grading_sheet_name: config.grading_sheet_name.clone(),
            equivalence: config.equivalence.clone(),
            charts: config.charts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_workspace_env_overrides_config() {
        let config = Config {
            workspace_root: PathBuf::from("/configured"),
            ..Config::default()
        };

        std::env::set_var(WORKSPACE_ENV, "/from-env");
        let pipeline = PipelineConfig::from_config(&config);
        std::env::remove_var(WORKSPACE_ENV);

        assert_eq!(pipeline.workspace_root, PathBuf::from("/from-env"));
        assert_eq!(
            pipeline.template_path,
            PathBuf::from("/from-env/templates/MA1_Grading_Template.xlsx")
        );
        assert_eq!(pipeline.feedback_directory, PathBuf::from("/from-env/feedback"));
    }

    #[test]
    #[serial]
    fn test_configured_paths_used_without_env() {
        std::env::remove_var(WORKSPACE_ENV);
        let config = Config {
            workspace_root: PathBuf::from("/configured"),
            template_path: Some(PathBuf::from("/templates/custom.xlsx")),
            feedback_directory: Some(PathBuf::from("/feedback")),
            ..Config::default()
        };
        let pipeline = PipelineConfig::from_config(&config);
        assert_eq!(pipeline.workspace_root, PathBuf::from("/configured"));
        assert_eq!(pipeline.template_path, PathBuf::from("/templates/custom.xlsx"));
        assert_eq!(pipeline.feedback_directory, PathBuf::from("/feedback"));
    }
}
