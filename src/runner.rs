use crate::catalog::load_catalog;
use crate::config::{Config, RunConfig};
use crate::evaluation::evaluate;
use crate::models::{ModelOption, RunResult};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

/// Main runner that loads the catalog and evaluates every configured run
pub struct Runner {
    config: Config,
}

impl Runner {
    /// Create a new runner with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Load the catalog, evaluate all runs and store results if configured
    pub async fn run(&self) -> Result<Vec<RunResult>> {
        let models = load_catalog(&self.config.catalog)
            .await
            .with_context(|| format!("Failed to load catalog: {}", self.config.catalog))?;
        info!(count = models.len(), "Catalog loaded");

        let results = self.run_all(&models);
        self.store_results_if_configured(&results)?;

        Ok(results)
    }

    /// Evaluate every configured run against an already loaded catalog
    pub fn run_all(&self, models: &[ModelOption]) -> Vec<RunResult> {
        let total_runs = self.config.runs.len();
        self.config
            .runs
            .iter()
            .enumerate()
            .map(|(run_index, run)| self.run_single(run, models, run_index + 1, total_runs))
            .collect()
    }

    /// Evaluate a single questionnaire
    fn run_single(
        &self,
        run: &RunConfig,
        models: &[ModelOption],
        run_num: usize,
        total_runs: usize,
    ) -> RunResult {
        info!("Running evaluation {}/{}: {}", run_num, total_runs, run.title);

        let output = evaluate(models, &run.answers);
        for entry in &output.log {
            debug!("  {}", entry);
        }

        match output.results.first() {
            Some(top) => info!(
                candidates = output.results.len(),
                top = %top.model_name,
                score = top.final_score,
                "Evaluation {}/{} finished",
                run_num,
                total_runs
            ),
            None => info!("Evaluation {}/{}: no options match", run_num, total_runs),
        }

        RunResult {
            title: run.title.clone(),
            output,
        }
    }

    /// Store results if storage path is configured
    fn store_results_if_configured(&self, results: &[RunResult]) -> Result<()> {
        if let Some(storage_path) = &self.config.storage_path {
            debug!("Storing {} run results to {}", results.len(), storage_path);
            self.store_results(results, storage_path)?;
        }
        Ok(())
    }

    /// Store results to a JSON file
    fn store_results(&self, results: &[RunResult], path: &str) -> Result<()> {
        let json_content = self.serialize_results(results)?;
        self.ensure_directory_exists(path)?;
        self.write_results_file(path, &json_content)?;
        info!("Results stored to: {}", path);

        Ok(())
    }

    /// Serialize results to JSON
    fn serialize_results(&self, results: &[RunResult]) -> Result<String> {
        serde_json::to_string_pretty(results).context("Failed to serialize results to JSON")
    }

    /// Ensure the directory for the results file exists
    fn ensure_directory_exists(&self, path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        Ok(())
    }

    /// Write results to file
    fn write_results_file(&self, path: &str, content: &str) -> Result<()> {
        std::fs::write(path, content).with_context(|| format!("Failed to write results to: {}", path))
    }
}
