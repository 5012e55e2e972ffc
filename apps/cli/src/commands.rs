//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use sitearchiver_core::{ProgressReporter, RunConfig, RunResult};
use sitearchiver_shared::{
    AppConfig, Credentials, PageUrl, SitemapErrorPolicy, init_config, load_config,
    load_config_from,
};
use sitearchiver_submitter::SubmitOutcome;
use tracing::{info, warn};
use url::Url;

/// Save Page Now allows 12 captures per minute.
const MIN_SAFE_INTERVAL_SECS: u64 = 5;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sitearchiver — archive every page of a sitemap with Save Page Now.
#[derive(Parser)]
#[command(
    name = "sitearchiver",
    version,
    about = "Submit every URL listed in one or more sitemaps to the Wayback Machine.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.sitearchiver/sitearchiver.toml.
    #[arg(long, global = true, env = "SITEARCHIVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Defaults to `run` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
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
    /// Read the sitemaps and submit every URL for archiving.
    Run(RunArgs),

    /// Read the sitemaps and print the URLs that would be submitted.
    Urls(SitemapArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Sitemap selection shared by `run` and `urls`.
#[derive(Args, Default)]
pub(crate) struct SitemapArgs {
    /// Sitemap URL to read (repeatable). Replaces the configured list.
    #[arg(long = "sitemap", value_name = "URL")]
    pub sitemaps: Vec<String>,

    /// Continue with the remaining sitemaps when one fails.
    #[arg(long)]
    pub skip_failed_sitemaps: bool,
}

/// Options for `run`.
#[derive(Args, Default)]
pub(crate) struct RunArgs {
    #[command(flatten)]
    pub sitemaps: SitemapArgs,

    /// Seconds between submissions (overrides `archive.interval_secs`).
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
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
        0 => "sitearchiver=info",
        1 => "sitearchiver=debug",
        _ => "sitearchiver=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
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
    match cli.command.unwrap_or_else(|| Command::Run(RunArgs::default())) {
        Command::Run(args) => cmd_run(config_path, &args).await,
        Command::Urls(args) => cmd_urls(config_path, &args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

/// Load the config file and apply sitemap overrides from the command line.
fn resolve_config(config_path: Option<&Path>, args: &SitemapArgs) -> Result<AppConfig> {
    let mut config = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    if !args.sitemaps.is_empty() {
        config.sitemaps.urls = args.sitemaps.clone();
    }
    if args.skip_failed_sitemaps {
        config.sitemaps.on_error = SitemapErrorPolicy::Skip;
    }

    Ok(config)
}

async fn cmd_run(config_path: Option<&Path>, args: &RunArgs) -> Result<()> {
    let config = resolve_config(config_path, &args.sitemaps)?;
    let mut run_config = RunConfig::from_app_config(&config)?;

    if let Some(secs) = args.interval {
        run_config.submit.interval = Duration::from_secs(secs);
        run_config.validate()?;
    }
    if run_config.submit.interval < Duration::from_secs(MIN_SAFE_INTERVAL_SECS) {
        warn!(
            interval_secs = run_config.submit.interval.as_secs(),
            "interval is below the Save Page Now quota of 12 captures per minute"
        );
    }

    let credentials = Credentials::from_env(&config.archive);
    if !credentials.is_complete() {
        warn!(
            access_key_env = %config.archive.access_key_env,
            secret_key_env = %config.archive.secret_key_env,
            "archive credentials are not set; submissions will be rejected"
        );
    }

    info!(
        sitemaps = run_config.sitemaps.len(),
        policy = ?run_config.on_sitemap_error,
        "archiving sitemap pages"
    );

    let reporter = CliProgress::new();
    let result = sitearchiver_core::run(&run_config, &credentials, &reporter).await?;

    println!();
    println!("  Archive run finished.");
    println!("  Sitemaps:  {} read, {} skipped", result.sitemaps_fetched, result.sitemaps_skipped);
    println!("  URLs:      {}", result.urls_discovered);
    println!("  Accepted:  {}", result.tally.succeeded);
    println!("  Rejected:  {}", result.tally.rejected);
    println!("  Failed:    {}", result.tally.failed);
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_urls(config_path: Option<&Path>, args: &SitemapArgs) -> Result<()> {
    let config = resolve_config(config_path, args)?;
    let run_config = RunConfig::from_app_config(&config)?;

    let collected = sitearchiver_core::discover(&run_config, &sitearchiver_core::SilentProgress).await?;
    for url in &collected.urls {
        println!("{url}");
    }

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path, &SitemapArgs::default())?;
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn sitemap_fetched(&self, url: &Url, count: usize) {
        self.spinner.set_message(format!("Read {count} URLs from {url}"));
    }

    fn page_submitted(&self, url: &PageUrl, current: usize, total: usize, outcome: &SubmitOutcome) {
        let mark = if outcome.is_success() { "ok" } else { "failed" };
        self.spinner
            .set_message(format!("Submitted [{current}/{total}] {url} ({mark})"));
    }

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}
