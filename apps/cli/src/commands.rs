//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use enricher_core::{
    FieldFetchers, ProgressReporter, RunResult, Selection, TomlCatalog, aggregate, run as run_pipeline,
};
use enricher_shared::{AppConfig, init_config, init_config_at, load_config, load_config_from};
use enricher_sources::SourceConfig;
use enricher_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Enricher: keep catalog metadata in sync with its sources.
#[derive(Parser)]
#[command(
    name = "enricher",
    version,
    about = "Fetch registry and repository metadata for catalog packages and rebuild the summary.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.enricher/enricher.toml.
    #[arg(long, global = true, env = "ENRICHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Enrich packages, then rebuild the aggregated summary.
    Run {
        /// Package identifiers to enrich, in order.
        ids: Vec<String>,

        /// Enrich every package in the catalog.
        #[arg(long, conflicts_with = "ids")]
        all: bool,

        /// Skip rebuilding the aggregated summary.
        #[arg(long)]
        no_aggregate: bool,
    },

    /// Rebuild the aggregated summary from stored fields.
    Aggregate,

    /// Print the aggregated summary as JSON.
    Show,

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
        0 => "enricher=info",
        1 => "enricher=debug",
        _ => "enricher=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

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
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run {
            ids,
            all,
            no_aggregate,
        } => {
            let selection = match (all, ids.is_empty()) {
                (true, _) => Selection::All,
                (false, false) => Selection::Packages(ids),
                (false, true) => return print_run_usage(),
            };
            cmd_run(config_path, &selection, !no_aggregate).await
        }
        Command::Aggregate => cmd_aggregate(config_path).await,
        Command::Show => cmd_show(config_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

fn open_catalog(config: &AppConfig) -> Result<TomlCatalog> {
    let path = Path::new(&config.paths.catalog);
    let catalog = TomlCatalog::load(path)
        .wrap_err_with(|| format!("failed to load catalog {}", path.display()))?;
    info!(packages = catalog.len(), path = %path.display(), "catalog loaded");
    Ok(catalog)
}

async fn open_storage(config: &AppConfig) -> Result<Storage> {
    let path = Path::new(&config.paths.database);
    let storage = Storage::open(path)
        .await
        .wrap_err_with(|| format!("failed to open database {}", path.display()))?;
    Ok(storage)
}

/// `run` with neither ids nor `--all` does nothing and reports usage.
fn print_run_usage() -> Result<()> {
    let mut cmd = Cli::command();
    match cmd.find_subcommand_mut("run") {
        Some(sub) => sub.print_help()?,
        None => cmd.print_help()?,
    }
    eprintln!();
    eprintln!("nothing to do: pass package ids or --all");
    Ok(())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, selection: &Selection, with_aggregate: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    let catalog = open_catalog(&config)?;
    let storage = open_storage(&config).await?;

    let sources = SourceConfig::from_app_config(&config);
    if sources.token.is_none() {
        info!(
            env = %config.hosting.token_env,
            "no hosting token set, requests are unauthenticated"
        );
    }
    let fetchers = FieldFetchers::new(&sources, &config.hosting.avatar_pattern)?;

    let reporter = CliProgress::new();
    let result: RunResult = run_pipeline(
        selection,
        with_aggregate,
        &catalog,
        &storage,
        &fetchers,
        &config.aggregate,
        &reporter,
    )
    .await?;

    let e = &result.enrich;
    println!();
    println!("  Enrichment finished");
    println!("  Packages:    {} enriched, {} skipped", e.attempted, e.skipped);
    println!("  Written:     {}", e.written);
    println!("  Not found:   {}", e.not_found);
    println!("  No value:    {}", e.unavailable);
    println!("  Failed:      {}", e.failed);
    match &result.aggregate {
        Some(a) => println!("  Summary:     {} records", a.records),
        None => println!("  Summary:     not rebuilt (--no-aggregate)"),
    }
    println!(
        "  Time:        {:.1}s",
        e.elapsed_ms as f64 / 1000.0
    );
    println!();

    Ok(())
}

async fn cmd_aggregate(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let catalog = open_catalog(&config)?;
    let storage = open_storage(&config).await?;

    let report = aggregate(&catalog, &storage, &config.aggregate).await?;
    println!(
        "Aggregated {} packages in {:.1}s",
        report.records,
        report.elapsed.as_secs_f64()
    );
    Ok(())
}

async fn cmd_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let path = Path::new(&config.paths.database);
    if !path.exists() {
        return Err(eyre!(
            "database {} does not exist; run `enricher run --all` first",
            path.display()
        ));
    }

    let storage = Storage::open_readonly(path).await?;
    match storage.get_aggregated().await? {
        Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
        None => eprintln!("no aggregated summary yet; run `enricher aggregate`"),
    }
    Ok(())
}

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(p) => {
            init_config_at(p)?;
            p.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
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
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn package_started(&self, package_id: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Enriching [{current}/{total}] {package_id}"));
    }

    fn finish(&self, _message: &str) {
        self.spinner.finish_and_clear();
    }
}
