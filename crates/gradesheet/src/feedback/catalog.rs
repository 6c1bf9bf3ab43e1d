use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::ConfigError;
use crate::feedback::item::{FeedbackItem, FeedbackParam};

/// Message templates shipped with the library, one JSON object per tab.
const BUILTIN: &[(&str, &str)] = &[
    (
        "income_analysis",
        include_str!("../../feedback/income_analysis.json"),
    ),
    (
        "unit_conversions",
        include_str!("../../feedback/unit_conversions.json"),
    ),
    (
        "currency_conversion",
        include_str!("../../feedback/currency_conversion.json"),
    ),
    ("ma3_analysis", include_str!("../../feedback/ma3_analysis.json")),
    (
        "ma3_visualization",
        include_str!("../../feedback/ma3_visualization.json"),
    ),
];

/// Maps `tab -> code -> template`. Templates use `{name}` placeholders and
/// `{{` / `}}` for literal braces.
#[derive(Debug, Clone, Default)]
pub struct FeedbackCatalog {
    tabs: HashMap<String, HashMap<String, String>>,
}

impl FeedbackCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The embedded templates.
    pub fn builtin() -> Result<Self, ConfigError> {
        let mut catalog = Self::new();
        for (tab, json) in BUILTIN {
            let templates = parse_templates(json).map_err(|reason| ConfigError::FeedbackCatalog {
                path: format!("<builtin>/{}.json", tab).into(),
                reason,
            })?;
            catalog.tabs.insert((*tab).to_string(), templates);
        }
        Ok(catalog)
    }

    /// Embedded templates, overridden code by code by any
    /// `<directory>/<tab>.json` files.
    pub fn load(directory: Option<&Path>) -> Result<Self, ConfigError> {
        let mut catalog = Self::builtin()?;
        if let Some(dir) = directory {
            let merged = catalog.merge_directory(dir)?;
            log::debug!("Merged {} feedback files from {}", merged, dir.display());
        }
        Ok(catalog)
    }

    /// Merges every `*.json` file in `dir`; the file stem names the tab.
    /// Returns how many files were merged. A missing directory merges none.
    pub fn merge_directory(&mut self, dir: &Path) -> Result<usize, ConfigError> {
        if !dir.is_dir() {
            return Ok(0);
        }
        let pattern = dir.join("*.json");
        let pattern = pattern.to_string_lossy();
        let entries = glob::glob(&pattern).map_err(|e| ConfigError::FeedbackCatalog {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut merged = 0;
        for entry in entries.flatten() {
            let Some(tab) = entry.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = std::fs::read_to_string(&entry).map_err(|e| ConfigError::FeedbackCatalog {
                path: entry.clone(),
                reason: e.to_string(),
            })?;
            let templates = parse_templates(&content).map_err(|reason| ConfigError::FeedbackCatalog {
                path: entry.clone(),
                reason,
            })?;
            self.tabs.entry(tab.to_string()).or_default().extend(templates);
            merged += 1;
        }
        Ok(merged)
    }

    pub fn insert(&mut self, tab: &str, code: &str, template: &str) {
        self.tabs
            .entry(tab.to_string())
            .or_default()
            .insert(code.to_string(), template.to_string());
    }

    pub fn template(&self, tab: &str, code: &str) -> Option<&str> {
        self.tabs.get(tab)?.get(code).map(|s| s.as_str())
    }

    pub fn codes(&self, tab: &str) -> Vec<&str> {
        let mut codes: Vec<&str> = self
            .tabs
            .get(tab)
            .map(|t| t.keys().map(|k| k.as_str()).collect())
            .unwrap_or_default();
        codes.sort_unstable();
        codes
    }

    /// Renders items as newline-separated text.
    ///
    /// Rendering never fails: an unknown code renders as `[CODE] {params}`
    /// and a template that names a missing parameter as
    /// `[FORMAT ERROR] CODE: {params}`.
    pub fn render(&self, items: &[FeedbackItem], tab: &str) -> String {
        items
            .iter()
            .map(|item| self.render_item(item, tab))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn render_item(&self, item: &FeedbackItem, tab: &str) -> String {
        match self.template(tab, &item.code) {
            None => format!("[{}] {}", item.code, item.params_text()),
            Some(template) => fill_template(template, &item.params)
                .unwrap_or_else(|| format!("[FORMAT ERROR] {}: {}", item.code, item.params_text())),
        }
    }
}

fn parse_templates(json: &str) -> Result<HashMap<String, String>, String> {
    serde_json::from_str(json).map_err(|e| e.to_string())
}

/// Substitutes `{name}` placeholders. `None` when a placeholder has no value
/// or a brace is unbalanced.
fn fill_template(template: &str, params: &BTreeMap<String, FeedbackParam>) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next()? {
                        '}' => break,
                        ch => name.push(ch),
                    }
                }
                let value = params.get(name.trim())?;
                out.push_str(&ascii_only(&value.to_string()));
            }
            '}' => return None,
            _ => out.push(c),
        }
    }
    Some(out)
}

/// Replaces every non-ASCII character with `?`.
fn ascii_only(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect()
}
