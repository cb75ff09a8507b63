//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use insightflow_core::demo::write_demo_csv;
use insightflow_core::{CsvSource, Orchestrator, ProgressReporter};
use insightflow_shared::{AppConfig, ResultRecord, init_config, load_config, load_config_from};
use insightflow_storage::LongTermMemory;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// InsightFlow: turn a CSV into KPIs, a revenue trend and an executive summary.
#[derive(Parser)]
#[command(
    name = "insightflow",
    version,
    about = "Profile tabular data, compute KPIs, chart monthly revenue and summarize the results.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.insightflow/insightflow.toml.
    #[arg(long, global = true, env = "INSIGHTFLOW_CONFIG")]
    pub config: Option<PathBuf>,

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
    /// Analyze a CSV file.
    Analyze {
        /// Path to the CSV file.
        file: PathBuf,

        /// Print the full result record as JSON.
        #[arg(long)]
        json: bool,

        /// Skip chart rendering.
        #[arg(long)]
        no_charts: bool,

        /// Directory for rendered charts.
        #[arg(long)]
        chart_dir: Option<PathBuf>,
    },

    /// Generate the demo e-commerce dataset and analyze it.
    Demo {
        /// Number of daily orders to generate.
        #[arg(long, default_value = "90")]
        days: u32,

        /// Where to write the demo CSV.
        #[arg(long, default_value = "demo_ecommerce.csv")]
        out: PathBuf,

        /// Print the full result record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API.
    Serve {
        /// Bind address (defaults to config).
        #[arg(long)]
        host: Option<String>,

        /// Bind port (defaults to $PORT, then config).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Inspect or edit long-term memory.
    Memory {
        /// Memory subcommand.
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Long-term memory subcommands.
#[derive(Subcommand)]
pub(crate) enum MemoryAction {
    /// Print every stored entry.
    Show,
    /// Print one entry.
    Get {
        key: String,
    },
    /// Store a JSON value (bare words are stored as strings).
    Set {
        key: String,
        value: String,
    },
    /// Delete one entry.
    Remove {
        key: String,
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
        0 => "insightflow=info",
        1 => "insightflow=debug",
        _ => "insightflow=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Command::Analyze {
            file,
            json,
            no_charts,
            chart_dir,
        } => cmd_analyze(config, &file, json, no_charts, chart_dir),
        Command::Demo { days, out, json } => cmd_demo(config, days, &out, json),
        Command::Serve { host, port } => cmd_serve(config, host, port).await,
        Command::Memory { action } => cmd_memory(&config, action),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_analyze(
    mut config: AppConfig,
    file: &Path,
    json: bool,
    no_charts: bool,
    chart_dir: Option<PathBuf>,
) -> Result<()> {
    if no_charts {
        config.output.charts_enabled = false;
    }
    if let Some(dir) = chart_dir {
        config.output.chart_dir = dir.to_string_lossy().to_string();
    }

    info!(file = %file.display(), "analyzing dataset");
    let record = analyze(&config, file)?;
    print_record(&record, json)
}

fn cmd_demo(config: AppConfig, days: u32, out: &Path, json: bool) -> Result<()> {
    write_demo_csv(out, days)?;
    info!(path = %out.display(), days, "demo dataset written");

    let record = analyze(&config, out)?;
    print_record(&record, json)
}

fn analyze(config: &AppConfig, file: &Path) -> Result<ResultRecord> {
    let orchestrator = Orchestrator::from_config(config)?;
    let reporter = CliProgress::new();
    let source = CsvSource::Path(file.to_path_buf());

    match orchestrator.run_with_progress(&source, &reporter) {
        Ok(record) => Ok(record),
        Err(e) => {
            reporter.spinner.finish_and_clear();
            Err(e.into())
        }
    }
}

fn print_record(record: &ResultRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    println!();
    println!("=== PROFILE ===");
    println!("{}", serde_json::to_string_pretty(&record.profile)?);
    println!();
    println!("=== KPIs ===");
    println!("{}", serde_json::to_string_pretty(&record.kpis)?);
    println!();
    println!("=== NARRATIVE ===");
    println!("{}", record.narrative);
    println!();
    if record.charts.is_empty() {
        println!("No charts generated.");
    } else {
        for (name, chart) in &record.charts {
            println!("Chart {name}: {}", chart.path.display());
        }
    }

    Ok(())
}

async fn cmd_serve(config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or_else(|| config.server.resolved_port());
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| eyre!("invalid bind address '{host}:{port}': {e}"))?;

    let orchestrator = Orchestrator::from_config(&config)?;

    println!("InsightFlow API on http://{addr}");
    insightflow_server::serve(addr, config.server.max_upload_bytes, orchestrator)
        .await
        .map_err(|e| eyre!("server error: {e}"))
}

fn cmd_memory(config: &AppConfig, action: MemoryAction) -> Result<()> {
    let memory = LongTermMemory::open(&config.memory.path)?;

    match action {
        MemoryAction::Show => {
            println!("{}", serde_json::to_string_pretty(&memory.snapshot()?)?);
        }
        MemoryAction::Get { key } => match memory.get(&key)? {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => return Err(eyre!("no entry for '{key}'")),
        },
        MemoryAction::Set { key, value } => {
            let parsed = serde_json::from_str::<serde_json::Value>(&value)
                .unwrap_or(serde_json::Value::String(value));
            memory.set(&key, parsed)?;
            println!("Stored '{key}' in {}", memory.path().display());
        }
        MemoryAction::Remove { key } => match memory.remove(&key)? {
            Some(_) => println!("Removed '{key}'"),
            None => println!("No entry for '{key}'"),
        },
    }

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _record: &ResultRecord) {
        self.spinner.finish_and_clear();
    }
}
