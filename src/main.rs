use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use floorwatch::config::Config;
use floorwatch::ui::UiMode;

mod cmd;

#[derive(Parser)]
#[command(name = "floorwatch")]
#[command(version, about = "Live production-floor monitoring for the Track & Trace backend")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to floorwatch.toml (defaults to .floorwatch/floorwatch.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL, e.g. https://erp.example.com/api
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Vendor and filter overrides shared by the feed commands.
#[derive(Args, Debug, Clone, Default)]
pub struct FeedArgs {
    /// Vendor (tenant) id to poll
    #[arg(long)]
    pub vendor: Option<String>,

    /// Project id, or "all"
    #[arg(long)]
    pub project: Option<String>,

    /// Machine id, or "all"
    #[arg(long)]
    pub machine: Option<String>,

    /// Operator id, or "all"
    #[arg(long)]
    pub operator: Option<String>,

    /// Item status, or "all"
    #[arg(long)]
    pub status: Option<String>,

    /// today, yesterday, last_7_days, last_30_days
    #[arg(long)]
    pub date_range: Option<String>,

    /// Poll interval in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll the backend and render the live dashboard
    Watch {
        #[command(flatten)]
        feed: FeedArgs,

        /// UI output mode: full, minimal, json
        #[arg(long, default_value = "full")]
        ui: UiMode,

        /// Rows shown in the live item feed
        #[arg(long, default_value = "15")]
        items: usize,
    },
    /// Run one poll cycle and print the snapshot as JSON
    Snapshot {
        #[command(flatten)]
        feed: FeedArgs,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Serve the feed over HTTP and WebSocket
    Serve {
        #[command(flatten)]
        feed: FeedArgs,

        /// Port to serve on (defaults to relay.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable dev mode (permissive CORS, bind all interfaces)
        #[arg(long)]
        dev: bool,
    },
    /// View, validate or create configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default floorwatch.toml
    Init {
        /// Overwrite an existing file without asking
        #[arg(long)]
        yes: bool,
    },
}

impl Commands {
    fn feed_args(&self) -> Option<&FeedArgs> {
        match self {
            Commands::Watch { feed, .. }
            | Commands::Snapshot { feed, .. }
            | Commands::Serve { feed, .. } => Some(feed),
            Commands::Config { .. } => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    if let Commands::Config { command } = &cli.command {
        return cmd::cmd_config(&project_dir, &cli, command.clone());
    }

    let mut config = Config::resolve(cli.config.as_deref(), &project_dir)?;
    if let Some(url) = &cli.base_url {
        config.toml.backend.base_url = url.clone();
    }
    if let Some(feed) = cli.command.feed_args() {
        cmd::apply_feed_args(&mut config.toml, feed);
    }

    // The full-screen dashboard owns the terminal; keep stderr quiet.
    if let Commands::Watch {
        ui: UiMode::Full, ..
    } = &cli.command
        && !cli.verbose
        && config.toml.logging.level == "info"
    {
        config.toml.logging.level = "warn".to_string();
    }
    let _log_guard = floorwatch::logging::init(&config.toml.logging, cli.verbose)?;
    for notice in &config.notices {
        tracing::warn!("{}", notice);
    }

    match &cli.command {
        Commands::Watch { ui, items, .. } => cmd::cmd_watch(&config, *ui, *items).await?,
        Commands::Snapshot { pretty, .. } => cmd::cmd_snapshot(&config, *pretty).await?,
        Commands::Serve { port, dev, .. } => cmd::cmd_serve(&config, *port, *dev).await?,
        Commands::Config { .. } => {}
    }

    Ok(())
}
