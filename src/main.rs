use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use jobs_aggregator::aggregator::{self, RunOptions};
use jobs_aggregator::types::AtsProvider;

/// Gather job data (including salaries) from companies by name across
/// multiple ATS systems and bespoke careers sites.
#[derive(Parser, Debug)]
#[command(name = "jobs-aggregator", version)]
struct Cli {
    /// Company name(s) to search for (defaults to the AI companies list)
    companies: Vec<String>,

    /// Use the predefined AI companies list even when names are given
    #[arg(long)]
    ai_companies: bool,

    /// Limit search to a specific ATS system
    #[arg(long, value_parser = parse_ats)]
    ats: Option<AtsProvider>,

    /// Output CSV file path
    #[arg(long, short, default_value = "map/public/ai.csv")]
    output: PathBuf,

    /// Project root holding the per-ATS directories and snapshots
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

fn parse_ats(raw: &str) -> Result<AtsProvider, String> {
    AtsProvider::from_str(raw)
        .ok_or_else(|| format!("unknown ATS '{raw}' (ashby, greenhouse, lever, workable, rippling)"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    aggregator::run(&RunOptions {
        root: cli.root,
        companies: cli.companies,
        ai_companies: cli.ai_companies,
        ats: cli.ats,
        output: cli.output,
    })
}
