use crate::models::{CostData, EvalResultRow, PerfDimension, RunResult};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Write};
use std::str::FromStr;

/// Output format options
#[derive(Debug, Clone, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Column the ranking table is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    FinalScore,
    BaseScore,
    CostScore,
    AvgTokenCost,
    ModelName,
    Perf(PerfDimension),
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(dim) = s.strip_prefix("perf:") {
            return PerfDimension::parse(dim)
                .map(SortKey::Perf)
                .ok_or_else(|| format!("unknown performance dimension: {}", dim));
        }
        match s {
            "final_score" => Ok(SortKey::FinalScore),
            "base_score" => Ok(SortKey::BaseScore),
            "cost_score" => Ok(SortKey::CostScore),
            "avg_token_cost" => Ok(SortKey::AvgTokenCost),
            "model_name" => Ok(SortKey::ModelName),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

enum SortValue<'r> {
    Number(f64),
    Text(&'r str),
    Missing,
}

impl SortKey {
    fn value(self, row: &EvalResultRow) -> SortValue<'_> {
        let number = |v: Option<f64>| v.map_or(SortValue::Missing, SortValue::Number);
        match self {
            SortKey::FinalScore => SortValue::Number(row.final_score),
            SortKey::BaseScore => SortValue::Number(row.base_score),
            SortKey::CostScore => SortValue::Number(row.cost_score),
            SortKey::AvgTokenCost => number(row.avg_token_cost),
            SortKey::ModelName => SortValue::Text(&row.model_name),
            SortKey::Perf(dim) => number(row.perf_values.get(&dim).copied().flatten()),
        }
    }
}

/// How the ranking table is ordered and paged
#[derive(Debug, Clone)]
pub struct TableView {
    pub sort: SortKey,
    pub descending: bool,
    /// 1-based page number
    pub page: usize,
    pub page_size: usize,
}

impl Default for TableView {
    fn default() -> Self {
        Self {
            sort: SortKey::FinalScore,
            descending: true,
            page: 1,
            page_size: 10,
        }
    }
}

/// Fold case and umlauts so that "Ärger" sorts next to "Arger", not after "Z"
fn collation_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        match c {
            'ä' => key.push('a'),
            'ö' => key.push('o'),
            'ü' => key.push('u'),
            'ß' => key.push_str("ss"),
            other => key.push(other),
        }
    }
    key
}

/// Dictionary order for model names; exact text breaks ties
fn compare_names(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

/// Order rows by the key; missing values always go last
pub fn sort_rows(rows: &[EvalResultRow], key: SortKey, descending: bool) -> Vec<&EvalResultRow> {
    let mut sorted: Vec<&EvalResultRow> = rows.iter().collect();
    sorted.sort_by(|a, b| {
        let ordering = match (key.value(a), key.value(b)) {
            (SortValue::Missing, SortValue::Missing) => return Ordering::Equal,
            (SortValue::Missing, _) => return Ordering::Greater,
            (_, SortValue::Missing) => return Ordering::Less,
            (SortValue::Number(x), SortValue::Number(y)) => x.total_cmp(&y),
            (SortValue::Text(x), SortValue::Text(y)) => compare_names(x, y),
            _ => Ordering::Equal,
        };
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
    sorted
}

/// One page of the ranking table
#[derive(Debug)]
pub struct Page<'r> {
    pub rows: &'r [&'r EvalResultRow],
    pub page: usize,
    pub total_pages: usize,
    /// Zero-based index of the first row on this page
    pub start: usize,
}

/// Cut out the requested page, clamping the page number into range
pub fn paginate<'r>(rows: &'r [&'r EvalResultRow], page: usize, page_size: usize) -> Page<'r> {
    let page_size = page_size.max(1);
    let total_pages = rows.len().div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);
    let start = ((page - 1) * page_size).min(rows.len());
    let end = (start + page_size).min(rows.len());

    Page {
        rows: &rows[start..end],
        page,
        total_pages,
        start,
    }
}

/// Print run results in the requested format
pub fn print_results(results: &[RunResult], format: OutputFormat, view: &TableView) {
    match format {
        OutputFormat::Plain => match render_plain(results, view) {
            Ok(text) => print!("{}", text),
            Err(e) => eprintln!("Error rendering results: {}", e),
        },
        OutputFormat::Json => print_json(results),
    }
}

/// Render results in plain text format
pub fn render_plain(results: &[RunResult], view: &TableView) -> Result<String, fmt::Error> {
    let mut out = String::new();
    for (i, result) in results.iter().enumerate() {
        writeln!(out, "=== Evaluation {}: {} ===", i + 1, result.title)?;
        writeln!(out)?;

        writeln!(out, "🔎 FILTER")?;
        writeln!(out, "---------")?;
        for entry in &result.output.log {
            writeln!(out, "  • {}", entry)?;
        }
        writeln!(out)?;

        if !result.output.excluded_by_stage.is_empty() {
            writeln!(out, "🚫 AUSGESCHLOSSEN")?;
            writeln!(out, "----------------")?;
            for (stage, names) in &result.output.excluded_by_stage {
                writeln!(out, "  {}: {}", stage, names.join(", "))?;
            }
            writeln!(out)?;
        }

        render_ranking(&mut out, &result.output.results, view)?;

        if i + 1 < results.len() {
            writeln!(out, "{}", "=".repeat(50))?;
            writeln!(out)?;
        }
    }
    Ok(out)
}

fn render_ranking(out: &mut String, rows: &[EvalResultRow], view: &TableView) -> fmt::Result {
    writeln!(out, "🏆 RANKING")?;
    writeln!(out, "----------")?;

    if rows.is_empty() {
        writeln!(
            out,
            "Keine Ergebnisse: Nach den Ausschlussregeln bleiben keine Optionen übrig."
        )?;
        return writeln!(out);
    }

    let sorted = sort_rows(rows, view.sort, view.descending);
    let page = paginate(&sorted, view.page, view.page_size);

    writeln!(
        out,
        "{:<4} {:<28} {:<7} {:<7} {:<7} {:<14} {:<18} {:<16} {:<5}",
        "#", "Modell", "Final", "Basis", "Kosten", "Kostendaten", "Segment", "Zahlungsmodell", "Dims"
    )?;
    writeln!(out, "{}", "-".repeat(112))?;

    for (offset, row) in page.rows.iter().enumerate() {
        let cost_data = match row.cost_data {
            CostData::Ok => "ok",
            CostData::NotAvailable => "nicht verfügbar",
        };
        writeln!(
            out,
            "{:<4} {:<28} {:<7.3} {:<7.3} {:<7.3} {:<14} {:<18} {:<16} {:<5}",
            page.start + offset + 1,
            row.model_name,
            row.final_score,
            row.base_score,
            row.cost_score,
            cost_data,
            row.segment_label.to_string(),
            row.plan_match.to_string(),
            row.perf_dims_used
        )?;
    }

    writeln!(
        out,
        "Zeige {}–{} von {} Ergebnissen (Seite {}/{})",
        page.start + 1,
        page.start + page.rows.len(),
        sorted.len(),
        page.page,
        page.total_pages
    )?;
    writeln!(out)
}

/// Render results as pretty-printed JSON
pub fn render_json(results: &[RunResult]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(results)
}

/// Print results in JSON format
fn print_json(results: &[RunResult]) {
    match render_json(results) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing results to JSON: {}", e),
    }
}
