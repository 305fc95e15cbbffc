use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use payroll_pipeline::{CsvResultSink, PayrollConfig, Pipeline, PipelineOptions, RecordSource};

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Payroll deductions calculator.
///
/// Reads `employeeId,income` lines, computes social insurance, income tax and
/// net income with the rates of the selected city, and writes one CSV row per
/// employee.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// City code to look up in the configuration file.
    #[arg(short = 'C', long)]
    city: String,

    /// Configuration file with city rates.
    #[arg(short = 'c', long)]
    config: PathBuf,

    /// Input records. Use `-` to read from stdin.
    #[arg(short = 'd', long)]
    data: PathBuf,

    /// Output CSV file. Only created once every record has been written.
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Number of tax engine workers. Input order is kept only with 1.
    #[arg(short = 'w', long, default_value_t = 1)]
    workers: usize,

    /// Capacity of each inter-stage queue.
    #[arg(short = 'q', long, default_value_t = 64)]
    queue_capacity: usize,
}

// ─── tracing ─────────────────────────────────────────────────────────────────

/// Initialise the tracing subscriber.
///
/// * Honours `RUST_LOG` when set.
/// * Falls back to `info` so normal runs are quiet.
/// * Writes to stderr and strips timestamps and targets.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::from("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

// ─── input ───────────────────────────────────────────────────────────────────

fn open_input(path: &Path) -> anyhow::Result<Box<dyn Read + Send>> {
    if path == Path::new("-") {
        debug!("reading records from stdin");
        return Ok(Box::new(io::stdin()));
    }

    let file = File::open(path)
        .with_context(|| format!("cannot open input file '{}'", path.display()))?;
    Ok(Box::new(file))
}

// ─── output ──────────────────────────────────────────────────────────────────

/// Creates a temporary file in the directory of `path`, so that it can later
/// be renamed over `path`.
fn staging_file(path: &Path) -> anyhow::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    NamedTempFile::new_in(dir)
        .with_context(|| format!("cannot create output file in '{}'", dir.display()))
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let config = PayrollConfig::load(&cli.config)
        .with_context(|| format!("failed to load config '{}'", cli.config.display()))?;
    let policy = config
        .tax_policy(&cli.city)
        .with_context(|| format!("no usable policy for city '{}'", cli.city))?;
    info!(
        city = %cli.city,
        contribution_rate = %policy.social_insurance().rate,
        "loaded policy"
    );

    let options = PipelineOptions {
        workers: cli.workers,
        queue_capacity: cli.queue_capacity,
    };
    let pipeline = Pipeline::new(options, Arc::new(policy))?;

    let input = open_input(&cli.data)?;
    let staged = staging_file(&cli.output)?;

    // Dropping the staged file on any error below removes it.
    let finished = pipeline
        .run(RecordSource::new(input), CsvResultSink::new(staged))
        .await
        .context("payroll run aborted")?;

    let staged = finished.sink.into_inner()?;
    staged
        .persist(&cli.output)
        .with_context(|| format!("cannot write output file '{}'", cli.output.display()))?;

    info!(
        records = finished.summary.sink.items,
        output = %cli.output.display(),
        "results written"
    );

    Ok(())
}
