use clap::Subcommand;
use screentime_core::storage::Database;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Ledger totals (all-time and today)
    Summary,
    /// Most recent ledger entries
    Recent {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

pub fn run(action: StatsAction) -> CliResult {
    let db = Database::open()?;

    match action {
        StatsAction::Summary => print_json(&db.stats()?),
        StatsAction::Recent { limit } => print_json(&db.recent_credits(limit)?),
    }
}
