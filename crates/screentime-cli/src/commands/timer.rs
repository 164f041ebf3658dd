use clap::{Subcommand, ValueEnum};
use screentime_core::{Config, CoreError, CreditKind, CreditService, CreditStatus, Database, SystemClock};

use super::{open_service, print_json, CliResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum ScreenState {
    On,
    Off,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum AppState {
    Foreground,
    Background,
}

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print the reconciled credit status as JSON
    Status,
    /// Start a tracking session
    Start,
    /// Stop the tracking session (credit and debt are kept)
    Stop,
    /// Zero credit and debt and stop tracking
    Reset,
    /// Add credit seconds (negative values remove credit)
    Add {
        #[arg(allow_negative_numbers = true)]
        seconds: i64,
    },
    /// Report the screen power state
    Screen {
        #[arg(value_enum)]
        state: ScreenState,
    },
    /// Report the host app state
    App {
        #[arg(value_enum)]
        state: AppState,
    },
    /// Reconcile once, as the scheduler would
    Tick,
}

pub fn run(action: TimerAction) -> CliResult {
    let config = Config::load_or_default();
    let service = open_service(&config)?;

    let status = match action {
        TimerAction::Status | TimerAction::Tick => service.snapshot()?,
        TimerAction::Start => service.start_tracking()?,
        TimerAction::Stop => service.stop_tracking()?,
        TimerAction::Reset => {
            let status = service.reset()?;
            record(&service, CreditKind::Reset, 0, &status);
            status
        }
        TimerAction::Add { seconds } => {
            let status = service.add_credit(seconds)?;
            record(&service, CreditKind::Adjusted, seconds, &status);
            status
        }
        TimerAction::Screen { state } => service.set_screen_on(matches!(state, ScreenState::On))?,
        TimerAction::App { state } => {
            service.set_app_foreground(matches!(state, AppState::Foreground))?
        }
    };

    print_json(&status)
}

/// Append to the ledger. The credit change itself is already persisted, so a
/// ledger failure is only logged.
pub fn record(
    service: &CreditService<Database, SystemClock>,
    kind: CreditKind,
    seconds: i64,
    status: &CreditStatus,
) {
    let at = chrono::Utc::now();
    let result = service
        .with_engine(|engine| engine.store().record_credit(kind, seconds, status, at))
        .and_then(|inserted| inserted.map_err(CoreError::from));
    if let Err(e) = result {
        tracing::warn!(error = %e, "failed to record ledger entry");
    }
}
