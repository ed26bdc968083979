//! table-probe - report existence, row counts, columns and sample rows of
//! tables behind a PostgREST endpoint.
//!
//! Usage:
//!   table-probe [TABLE...] [--verbose] [--json] [--concurrency N]
//!
//! Examples:
//!   table-probe teams games --verbose
//!   table-probe --json --no-insert-probe

use anyhow::Context;
use clap::Parser;
use table_probe::config::{parse_sample_limit, Config};
use table_probe::models::TableName;
use table_probe::obs::init_tracing;
use table_probe::prober::{ProberOptions, TableProber};
use table_probe::reporter::{render_details, render_json, render_summary, render_text, BatchReporter};
use table_probe::session::Session;

#[derive(Parser)]
#[command(name = "table-probe")]
#[command(about = "Probe tables of a hosted store for existence, row counts and columns")]
#[command(version)]
struct Cli {
    /// Tables to probe, in order (defaults to PROBE_TABLES or the built-in list)
    tables: Vec<String>,

    /// Show columns, sample rows and every recorded error
    #[arg(short, long)]
    verbose: bool,

    /// Print the full report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Number of tables probed at once
    #[arg(short, long, default_value_t = 1)]
    concurrency: usize,

    /// Never send the placeholder insert used to recover columns of empty tables
    #[arg(long)]
    no_insert_probe: bool,

    /// Rows requested per sample (1-100)
    #[arg(long, value_parser = parse_limit)]
    sample_limit: Option<usize>,
}

fn parse_limit(raw: &str) -> Result<usize, String> {
    parse_sample_limit(raw).map_err(|e| e.to_string())
}

/// Main entry point.
///
/// Loads configuration, opens a session and probes every requested table.
/// Only configuration or session failures produce a non-zero exit; per-table
/// problems are part of the report.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!("Configuration loaded successfully");

    let session = Session::connect(
        &config.supabase_url,
        &config.supabase_key,
        config.request_timeout,
    )
    .context("failed to open session")?;

    let requested = if cli.tables.is_empty() {
        config.tables.clone()
    } else {
        cli.tables.clone()
    };
    let tables = TableName::parse_list(requested);

    let options = ProberOptions {
        sample_limit: cli.sample_limit.unwrap_or(config.sample_limit),
        insert_probe: config.insert_probe && !cli.no_insert_probe,
        ..Default::default()
    };
    let reporter =
        BatchReporter::new(TableProber::new(&session, options)).with_concurrency(cli.concurrency);

    let report = reporter.run(&tables).await;

    if cli.json {
        println!("{}", render_json(&report)?);
        return Ok(());
    }

    print!("{}", render_text(&report, cli.verbose));
    println!("{}", render_summary(&report));
    if cli.verbose {
        let details = render_details(&report);
        if !details.is_empty() {
            println!();
            print!("{}", details);
        }
    }

    Ok(())
}
