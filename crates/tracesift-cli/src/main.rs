use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use glob::glob;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use tracesift_core::{
    ArchiveFetcher, BatchConfig, BatchReport, BatchScheduler, DEFAULT_WORKERS, Fetcher,
    HttpFetcher, TraceSource, load_sources, write_report_json, write_summary_file,
};

mod progress;

use progress::BarProgress;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("TRACESIFT_BUILD_COMMIT"),
    ", ",
    env!("TRACESIFT_BUILD_DATE"),
    ")"
);

const EXAMPLES: &str = "Examples:\n  tracesift extract capture.pcap -o out/\n  tracesift extract 'traces/*.pcap.gz' -o out/ -j 8 --summary out/summary.csv\n  tracesift batch links.csv --work-dir work --output-dir out --report out/report.json";

const ACCEPTED_EXTENSIONS: [&str; 4] = ["pcap", "pcapng", "cap", "gz"];

/// Directory for decompressed captures inside the output directory.
const EXTRACT_WORK_DIR: &str = ".tracesift-work";

#[derive(Parser, Debug)]
#[command(name = "tracesift")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Extract per-packet endpoint, port, DSCP and payload fields from packet captures.",
    long_about = None,
    after_help = EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress progress bars and non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract records from local capture files (.pcap, .pcapng, optionally gzipped).
    Extract {
        /// Capture files or glob patterns
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for the per-trace CSV files
        #[arg(short = 'o', long, default_value = ".")]
        output_dir: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Download and extract every trace named in a link list CSV (url,total,...).
    Batch {
        /// Link list produced by the trace scraper
        link_list: PathBuf,

        /// Directory for fetched and decompressed captures
        #[arg(long, default_value = "work")]
        work_dir: PathBuf,

        /// Directory for the per-trace CSV files
        #[arg(short = 'o', long, default_value = "output")]
        output_dir: PathBuf,

        /// Keep fetched captures after extraction
        #[arg(long)]
        keep_captures: bool,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Number of traces processed concurrently
    #[arg(short = 'j', long, default_value_t = DEFAULT_WORKERS)]
    jobs: usize,

    /// Write a per-trace counter summary (CSV)
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Write the full batch report (JSON)
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Extract {
            inputs,
            output_dir,
            run,
        } => cmd_extract(inputs, output_dir, run, cli.quiet),
        Commands::Batch {
            link_list,
            work_dir,
            output_dir,
            keep_captures,
            run,
        } => cmd_batch(link_list, work_dir, output_dir, keep_captures, run, cli.quiet),
    };

    match result {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let filter = if quiet {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

/// Returns the number of failed traces.
fn cmd_extract(
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
    run: RunArgs,
    quiet: bool,
) -> Result<usize, CliError> {
    let mut captures = Vec::new();
    for input in &inputs {
        for path in resolve_input_paths(input)? {
            validate_input_file(&path)?;
            captures.push(path);
        }
    }

    let work_dir = output_dir.join(EXTRACT_WORK_DIR);
    create_dir(&output_dir, "output")?;
    create_dir(&work_dir, "work")?;

    let sources = captures
        .iter()
        .map(|path| TraceSource::new(path.to_string_lossy(), 0))
        .collect();
    let config = BatchConfig::new(&work_dir, &output_dir).with_workers(run.jobs);
    let failed = run_batch(config, ArchiveFetcher, sources, &run, quiet);

    if let Err(err) = fs::remove_dir(&work_dir) {
        debug!(path = %work_dir.display(), error = %err, "work directory left in place");
    }
    failed
}

/// Returns the number of failed traces.
fn cmd_batch(
    link_list: PathBuf,
    work_dir: PathBuf,
    output_dir: PathBuf,
    keep_captures: bool,
    run: RunArgs,
    quiet: bool,
) -> Result<usize, CliError> {
    let sources = load_sources(&link_list).map_err(|err| {
        CliError::new(
            err.to_string(),
            Some("expected a CSV with a `url` column and an optional `total` column".to_string()),
        )
    })?;
    if sources.is_empty() {
        return Err(CliError::new(
            format!("link list has no entries: {}", link_list.display()),
            Some("add one `url,total` row per trace".to_string()),
        ));
    }
    info!(sources = sources.len(), list = %link_list.display(), "loaded link list");

    create_dir(&work_dir, "work")?;
    create_dir(&output_dir, "output")?;

    let fetcher = HttpFetcher::new().context("Failed to set up the HTTP client")?;
    let config = BatchConfig::new(&work_dir, &output_dir)
        .with_workers(run.jobs)
        .keep_captures(keep_captures);
    run_batch(config, fetcher, sources, &run, quiet)
}

fn run_batch<F: Fetcher + 'static>(
    config: BatchConfig,
    fetcher: F,
    sources: Vec<TraceSource>,
    run: &RunArgs,
    quiet: bool,
) -> Result<usize, CliError> {
    let scheduler = BatchScheduler::new(config, fetcher).map_err(|err| {
        CliError::new(
            err.to_string(),
            Some("use -j/--jobs with a value of at least 1".to_string()),
        )
    })?;
    let progress = Arc::new(BarProgress::new(sources.len() as u64, quiet));
    let scheduler = scheduler.with_progress(progress.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    let report = runtime.block_on(scheduler.run(sources));
    progress.finish();

    if let Some(path) = &run.summary {
        write_summary_file(path, &report)
            .with_context(|| format!("Failed to write summary: {}", path.display()))?;
    }
    if let Some(path) = &run.report {
        write_report_json(path, &report)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
    }

    print_run_summary(&report, quiet);
    Ok(report.failed())
}

fn print_run_summary(report: &BatchReport, quiet: bool) {
    if !quiet {
        eprintln!("{} succeeded, {} failed", report.succeeded(), report.failed());
    }
    for (source, category) in report.failures() {
        eprintln!("{}, {}", source.url, category);
    }
}

fn create_dir(path: &Path, role: &str) -> Result<(), CliError> {
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create {role} directory: {}", path.display()))?;
    Ok(())
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.is_file() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("use a .pcap, .pcapng or .pcap.gz file".to_string()),
        ));
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a .pcap, .pcapng or .pcap.gz file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_paths(input: &Path) -> Result<Vec<PathBuf>, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(vec![input.to_path_buf()]);
    }

    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    let mut matches = Vec::new();
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    if matches.is_empty() {
        return Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern; expected .pcap, .pcapng or .gz".to_string()),
        ));
    }
    Ok(matches)
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
