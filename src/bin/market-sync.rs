// Market Sync - CLI
// Single entry point: workspace setup, live tabs, stored history

use clap::{Parser, Subcommand};
use market_sync::{Config, ConfigError, SyncError};
use tracing::{error, info, warn, Level};

// Load command modules from cli directory
#[path = "../cli/run_commands.rs"]
mod run_commands;
#[path = "../cli/history_commands.rs"]
mod history_commands;

#[derive(Parser)]
#[command(name = "market-sync")]
#[command(version)]
#[command(about = "Multi-tab coordinated live market data", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and data directory
    Init,

    /// Run one live tab until Ctrl-C
    Run {
        /// Run without a sync bus (always leader)
        #[arg(long)]
        no_bus: bool,
    },

    /// Launch several tabs on one bus and report who leads
    Tabs {
        /// Number of tabs
        #[arg(short = 'n', long, default_value = "3")]
        count: usize,

        /// How long to keep them running
        #[arg(short, long, default_value = "5")]
        secs: u64,

        /// Do not start the upstream feed on the leader
        #[arg(long)]
        offline: bool,
    },

    /// Show stored price history for a symbol
    History {
        /// Symbol key, e.g. btcusdt
        symbol: String,

        /// Number of points
        #[arg(short = 'n', long, default_value = "20")]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging first (before config load so we can see config errors)
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(log_level).init();

    info!("📡 market-sync v{}", env!("CARGO_PKG_VERSION"));
    info!("📁 Config: {}", cli.config);

    match cli.command {
        // Init doesn't require config (it creates it)
        Commands::Init => {
            init_workspace(&cli.config)?;
        }

        Commands::Run { no_bus } => {
            let config = load_config_or_exit(&cli.config);
            run_commands::run_tab(&config, !no_bus).await?;
        }

        Commands::Tabs { count, secs, offline } => {
            let mut config = load_config_or_exit(&cli.config);
            if offline {
                config.feed.enabled = false;
            }
            run_commands::run_tabs(&config, count, secs).await?;
        }

        Commands::History { symbol, count } => {
            let config = load_config_or_exit(&cli.config);
            history_commands::show_history(&config, &symbol.to_lowercase(), count)?;
        }
    }

    Ok(())
}

/// Load config or exit with helpful error message
fn load_config_or_exit(path: &str) -> Config {
    match Config::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            let e = match e {
                ConfigError::FileRead(_) => SyncError::ConfigNotFound(path.to_string()),
                other => SyncError::from(other),
            };
            error!("❌ Configuration Error");
            for line in e.user_message().lines() {
                error!("{}", line);
            }
            std::process::exit(1);
        }
    }
}

fn init_workspace(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    use std::fs;

    info!("🔧 Initializing workspace...");
    fs::create_dir_all("data")?;

    if !std::path::Path::new(config_path).exists() {
        let default_config = include_str!("../../config.toml.example");
        fs::write(config_path, default_config)?;
        info!("📝 Created {}", config_path);
    } else {
        warn!("⚠️  {} already exists, skipping", config_path);
    }

    info!("✅ Workspace initialized successfully!");
    info!("💡 Next steps:");
    info!("   1. Edit config.toml (symbols, proxy URL)");
    info!("   2. Run: market-sync run");
    info!("   3. Run: market-sync tabs -n 3");

    Ok(())
}
