use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::assignments::Assignment;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    #[serde(default = "default_assignment")]
    pub assignment: Assignment,
    #[serde(default = "default_grading_sheet_name")]
    pub grading_sheet_name: String,
    /// Grading template to copy for every student. Defaults to
    /// `<workspace>/templates/<ASSIGN>_Grading_Template.xlsx`.
    #[serde(default)]
    pub template_path: Option<PathBuf>,
    /// Directory of `<tab>.json` files overriding the built-in feedback
    /// templates.
    #[serde(default)]
    pub feedback_directory: Option<PathBuf>,
    #[serde(default)]
    pub equivalence: EquivalenceConfig,
    #[serde(default)]
    pub charts: ChartsConfig,
}

fn default_workspace_root() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .map(|p| p.join("Gradesheet"))
        .unwrap_or_else(|| PathBuf::from("Gradesheet"))
}

fn default_assignment() -> Assignment {
    Assignment::Ma1
}

fn default_grading_sheet_name() -> String {
    "Grading Sheet".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            workspace_root: default_workspace_root(),
            assignment: default_assignment(),
            grading_sheet_name: default_grading_sheet_name(),
            template_path: None,
            feedback_directory: None,
            equivalence: EquivalenceConfig::default(),
            charts: ChartsConfig::default(),
        }
    }
}

impl Config {
    /// Template used when `template_path` is not set.
    pub fn default_template_path(&self) -> PathBuf {
        self.workspace_root
            .join("templates")
            .join(format!("{}_Grading_Template.xlsx", self.assignment.suffix()))
    }

    pub fn resolved_template_path(&self) -> PathBuf {
        self.template_path
            .clone()
            .unwrap_or_else(|| self.default_template_path())
    }
}

/// Tolerances of the equivalence engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquivalenceConfig {
    /// Maximum row shift of both range endpoints for range-offset credit.
    #[serde(default = "default_range_offset_tolerance")]
    pub range_offset_tolerance: u32,
    #[serde(default = "default_relative_tolerance")]
    pub relative_tolerance: f64,
    /// Used instead of the relative tolerance when the expected value is 0.
    #[serde(default = "default_zero_absolute_tolerance")]
    pub zero_absolute_tolerance: f64,
}

fn default_range_offset_tolerance() -> u32 {
    3
}

fn default_relative_tolerance() -> f64 {
    0.01
}

fn default_zero_absolute_tolerance() -> f64 {
    0.01
}

impl Default for EquivalenceConfig {
    fn default() -> Self {
        Self {
            range_offset_tolerance: default_range_offset_tolerance(),
            relative_tolerance: default_relative_tolerance(),
            zero_absolute_tolerance: default_zero_absolute_tolerance(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartsConfig {
    #[serde(default = "default_trendline_forward_min")]
    pub trendline_forward_min: f64,
    #[serde(default = "default_x_axis_max_min")]
    pub x_axis_max_min: f64,
    /// Grading-sheet cell where exported chart images are recorded.
    #[serde(default = "default_chart_anchor")]
    pub chart_anchor: String,
    #[serde(default)]
    pub export_enabled: bool,
}

fn default_trendline_forward_min() -> f64 {
    10.0
}

fn default_x_axis_max_min() -> f64 {
    20.0
}

fn default_chart_anchor() -> String {
    "J4".to_string()
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            trendline_forward_min: default_trendline_forward_min(),
            x_axis_max_min: default_x_axis_max_min(),
            chart_anchor: default_chart_anchor(),
            export_enabled: false,
        }
    }
}
