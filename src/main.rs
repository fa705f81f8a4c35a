mod cli;
mod core;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::core::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "tokboard",
    about = "Daily LLM token usage and cost tracker",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: $XDG_CONFIG_HOME/tokboard/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch usage for yesterday and today (or one date) and store it
    Update {
        /// Refresh only this UTC date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print stored outcomes as JSON
        #[arg(short = 'j', long)]
        json: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Fill in missing days, leaving recorded days untouched
    Backfill {
        /// Number of days ending today
        #[arg(long, default_value_t = 7)]
        days: u32,

        /// Print stored outcomes as JSON
        #[arg(short = 'j', long)]
        json: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Update, then send the daily comparison to the configured channel
    Notify {
        /// Report from the store as-is, without fetching
        #[arg(long)]
        skip_update: bool,
    },
    /// Show the yesterday/today comparison from stored data
    Report {
        /// Output JSON instead of text
        #[arg(short = 'j', long)]
        json: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Serve the dashboard and the raw usage document over HTTP
    Serve {
        /// Address to bind (default from config, 0.0.0.0)
        #[arg(long)]
        bind: Option<String>,

        /// Port (default from config, 18888)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init,
    /// Validate config file
    Check,
    /// Print the config file location
    Path,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("tokboard=debug,info")
        } else {
            EnvFilter::new("tokboard=info,warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn output_options(json: bool, pretty: bool, use_color: bool) -> cli::output::OutputOptions {
    cli::output::OutputOptions {
        format: if json {
            cli::output::OutputFormat::Json
        } else {
            cli::output::OutputFormat::Text
        },
        pretty,
        use_color,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.as_deref();
    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cli::config_cmd::init(config_path),
            ConfigAction::Check => cli::config_cmd::check(config_path),
            ConfigAction::Path => cli::config_cmd::path(config_path),
        };
    }

    let config = AppConfig::resolve(config_path).context("Failed to load config")?;
    for issue in config.validate() {
        tracing::warn!("config: {}", issue);
    }
    let use_color = cli::output::detect_color(!cli.no_color, &config.settings.color);

    match cli.command {
        Commands::Update { date, json, pretty } => {
            cli::update_cmd::run(&config, date, &output_options(json, pretty, use_color)).await?
        }
        Commands::Backfill { days, json, pretty } => {
            cli::update_cmd::backfill(&config, days, &output_options(json, pretty, use_color))
                .await?
        }
        Commands::Notify { skip_update } => cli::notify_cmd::run(&config, skip_update).await?,
        Commands::Report { json, pretty } => {
            cli::report_cmd::run(&config, &output_options(json, pretty, use_color))?
        }
        Commands::Serve { bind, port } => cli::serve_cmd::run(&config, bind, port).await?,
        Commands::Config { .. } => {}
    }

    Ok(())
}
