pub mod config;
pub mod reward;
pub mod stats;
pub mod timer;
pub mod watch;

use screentime_core::{Config, CreditEngine, CreditService, Database, SystemClock};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the on-disk state and wrap it in a service configured from `config`.
pub fn open_service(config: &Config) -> Result<CreditService<Database, SystemClock>, Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let engine = CreditEngine::open(db, SystemClock)?;
    let thresholds = if config.notifications.enabled {
        config.notifications.low_credit_thresholds.clone()
    } else {
        Vec::new()
    };
    Ok(CreditService::new(engine, thresholds))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
