use crate::models::Answers;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One questionnaire to evaluate against the catalog
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Human-readable name shown in the output
    pub title: String,
    /// Questionnaire answers; unanswered fields fall back to their defaults
    #[serde(default)]
    pub answers: Answers,
}

/// Root configuration of a run file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Catalog location, a file path or an http(s) URL
    pub catalog: String,
    /// Optional local path to store all run results as JSON
    #[serde(default)]
    pub storage_path: Option<String>,
    /// Questionnaires to evaluate
    #[serde(default)]
    pub runs: Vec<RunConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}
