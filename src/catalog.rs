use crate::models::{ModelOption, PerfDimension};
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Load the model catalog from a local file or an http(s) URL
pub async fn load_catalog(source: &str) -> Result<Vec<ModelOption>> {
    let text = if is_url(source) {
        fetch_catalog(source).await?
    } else {
        std::fs::read_to_string(Path::new(source))
            .with_context(|| format!("Failed to read catalog file: {}", source))?
    };

    let models = parse_catalog(&text)
        .with_context(|| format!("Failed to parse catalog: {}", source))?;
    debug!(source, count = models.len(), "Loaded model catalog");

    validate(&models);
    Ok(models)
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetch the catalog document over HTTP
async fn fetch_catalog(url: &str) -> Result<String> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("Failed to fetch catalog: {}", url))?;

    let status = response.status();
    if !status.is_success() {
        bail!("Catalog could not be loaded ({})", status.as_u16());
    }

    response
        .text()
        .await
        .with_context(|| format!("Failed to read catalog response body: {}", url))
}

/// Parse a catalog given either as an array or as `{ "models": [...] }`
pub fn parse_catalog(text: &str) -> Result<Vec<ModelOption>> {
    let document: Value = serde_json::from_str(text).context("Catalog is not valid JSON")?;

    let records = match document {
        Value::Array(records) => records,
        Value::Object(mut object) => match object.remove("models") {
            Some(Value::Array(records)) => records,
            _ => bail!("Unexpected catalog format, expected array or {{ models: [...] }}"),
        },
        _ => bail!("Unexpected catalog format, expected array or {{ models: [...] }}"),
    };

    serde_json::from_value(Value::Array(records)).context("Invalid model record in catalog")
}

/// Warn about catalog entries that will rank oddly; nothing is rejected
pub fn validate(models: &[ModelOption]) -> usize {
    let mut issues = 0;
    let mut seen = HashSet::new();

    for model in models {
        if !seen.insert(model.model_id.as_str()) {
            warn!(model_id = %model.model_id, "Duplicate model_id in catalog");
            issues += 1;
        }

        for dim in PerfDimension::ALL {
            if let Some(value) = model.perf_value(dim) {
                if !(0.0..=100.0).contains(&value) {
                    warn!(
                        model_id = %model.model_id,
                        dimension = %dim,
                        value,
                        "Performance score outside 0-100"
                    );
                    issues += 1;
                }
            }
        }
    }

    issues
}
