use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use llm_canvas::config::Config;
use llm_canvas::output::{self, OutputFormat, SortKey, TableView};
use llm_canvas::runner::Runner;

/// LLM Canvas CLI - Rank model offerings from a catalog against questionnaire answers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML run file
    run_file: PathBuf,

    /// Output format: plain or json
    #[arg(short, long, default_value = "plain")]
    output: OutputFormat,

    /// Sort column: final_score, base_score, cost_score, avg_token_cost, model_name or perf:<dimension>
    #[arg(short, long, default_value = "final_score")]
    sort: SortKey,

    /// Sort ascending instead of descending
    #[arg(long)]
    ascending: bool,

    /// Page of the ranking table to show (1-based)
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Rows per page
    #[arg(long, default_value_t = 10)]
    page_size: usize,

    /// Verbose output - log every filter stage
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_file(&args.run_file)?;
    let runner = Runner::new(config);

    let results = runner.run().await?;

    let view = TableView {
        sort: args.sort,
        descending: !args.ascending,
        page: args.page,
        page_size: args.page_size,
    };
    output::print_results(&results, args.output, &view);

    Ok(())
}
