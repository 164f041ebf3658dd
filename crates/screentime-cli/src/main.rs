use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "screentime-cli", version, about = "Screen-time credit CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Credit timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Reward calculation and granting
    Reward {
        #[command(subcommand)]
        action: commands::reward::RewardAction,
    },
    /// Penalty points for the current debt
    Penalty {
        /// Use this debt (seconds) instead of the stored one
        #[arg(long)]
        debt: Option<u64>,
    },
    /// Credit ledger statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run the tick scheduler and print the status notification
    Watch {
        /// Stop after this many updates
        #[arg(long)]
        updates: Option<u64>,
        /// Override the configured tick interval (milliseconds, at least 1000)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1000..))]
        interval_ms: Option<u64>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Reward { action } => commands::reward::run(action),
        Commands::Penalty { debt } => commands::reward::penalty(debt),
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Watch {
            updates,
            interval_ms,
        } => commands::watch::run(updates, interval_ms),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
