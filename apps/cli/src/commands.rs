//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use ttharvest_collector::{Harvester, ProgressReporter, require_year_listings};
use ttharvest_shared::{
    FetchOutcome, HarvestConfig, RunSummary, WorkUnit, init_config, load_config,
};
use ttharvest_store::RawStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ttharvest — keep a local raw store of WTT data fresh.
#[derive(Parser)]
#[command(
    name = "ttharvest",
    version,
    about = "Incrementally harvest WTT event and match data into a local raw JSON store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Override the raw data root from the config file.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Harvest year-partitioned event calendar listings.
    Events {
        /// First year to consider (overrides config).
        #[arg(long)]
        start_year: Option<i32>,

        /// Maximum concurrent fetches (overrides config).
        #[arg(short, long)]
        concurrency: Option<u32>,
    },

    /// Harvest per-event match lists for stored listings.
    Matches {
        /// Maximum concurrent fetches (overrides config).
        #[arg(short, long)]
        concurrency: Option<u32>,
    },

    /// Harvest events, then matches, in one invocation.
    All {
        /// First year to consider (overrides config).
        #[arg(long)]
        start_year: Option<i32>,

        /// Maximum concurrent fetches (overrides config).
        #[arg(short, long)]
        concurrency: Option<u32>,
    },

    /// Write a markdown summary of the raw store.
    Report {
        /// Output path (defaults to <data_dir>/RAW_DATA_REPORT.md).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "ttharvest=info",
        1 => "ttharvest=debug",
        _ => "ttharvest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let data_dir = cli.data_dir.clone();
    match cli.command {
        Command::Events {
            start_year,
            concurrency,
        } => cmd_events(data_dir, start_year, concurrency).await,
        Command::Matches { concurrency } => cmd_matches(data_dir, concurrency).await,
        Command::All {
            start_year,
            concurrency,
        } => cmd_all(data_dir, start_year, concurrency).await,
        Command::Report { out } => cmd_report(data_dir, out).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Resolve the runtime config from file + CLI overrides.
fn resolve_config(
    data_dir: Option<PathBuf>,
    start_year: Option<i32>,
    concurrency: Option<u32>,
) -> Result<HarvestConfig> {
    let app_config = load_config()?;
    let mut config = HarvestConfig::from(&app_config);
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    if let Some(year) = start_year {
        config.start_year = year;
    }
    if let Some(n) = concurrency {
        config.concurrency = n;
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_events(
    data_dir: Option<PathBuf>,
    start_year: Option<i32>,
    concurrency: Option<u32>,
) -> Result<()> {
    let config = resolve_config(data_dir, start_year, concurrency)?;
    info!(
        start_year = config.start_year,
        concurrency = config.concurrency,
        "harvesting event listings"
    );

    let harvester = Harvester::new(config)?;
    let reporter = CliProgress::new();
    let summary = harvester.harvest_events(&reporter).await?;

    print_summary("Event listings", &summary);
    Ok(())
}

async fn cmd_matches(data_dir: Option<PathBuf>, concurrency: Option<u32>) -> Result<()> {
    let config = resolve_config(data_dir, None, concurrency)?;
    let harvester = Harvester::new(config)?;
    require_year_listings(harvester.store())?;

    info!("harvesting event matches");
    let reporter = CliProgress::new();
    let summary = harvester.harvest_event_matches(&reporter).await?;

    print_summary("Event matches", &summary);
    Ok(())
}

async fn cmd_all(
    data_dir: Option<PathBuf>,
    start_year: Option<i32>,
    concurrency: Option<u32>,
) -> Result<()> {
    let config = resolve_config(data_dir, start_year, concurrency)?;
    let harvester = Harvester::new(config)?;

    let reporter = CliProgress::new();
    let events = harvester.harvest_events(&reporter).await?;
    print_summary("Event listings", &events);

    let reporter = CliProgress::new();
    let matches = harvester.harvest_event_matches(&reporter).await?;
    print_summary("Event matches", &matches);

    Ok(())
}

async fn cmd_report(data_dir: Option<PathBuf>, out: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(data_dir, None, None)?;
    let store = RawStore::open(config.data_dir.join("raw"))?;

    let out = out.unwrap_or_else(|| config.data_dir.join("RAW_DATA_REPORT.md"));
    let written = ttharvest_report::write_report(&store, &out)?;

    println!("  Report written to {}", written.display());
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("  Config file created at {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let rendered = toml::to_string_pretty(&config)?;
    println!("{rendered}");
    Ok(())
}

/// Print the run-level summary. Always printed, even when every unit
/// failed — per-unit failures never change the exit code.
fn print_summary(label: &str, summary: &RunSummary) {
    let minutes = summary.elapsed.as_secs() / 60;
    let seconds = summary.elapsed.as_secs() % 60;

    println!();
    println!("  {label} harvest complete");
    println!("  Units:       {}", summary.units);
    println!("  Failed:      {}", summary.failed);
    println!("  Records:     {}", summary.total_records);
    println!("  New records: {}", summary.new_records);
    println!("  Time:        {minutes}m {seconds}s");
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn unit_done(&self, unit: &WorkUnit, outcome: &FetchOutcome, completed: usize, total: usize) {
        let state = if outcome.succeeded { "ok" } else { "failed" };
        self.spinner
            .set_message(format!("[{completed}/{total}] {unit}: {state}"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}
