use std::time::Duration;

use screentime_core::presentation::render_event;
use screentime_core::{format_duration, Config, Event, TickScheduler};
use tokio::sync::broadcast::error::RecvError;

use super::{open_service, CliResult};

/// Tick in the foreground, printing the rendered notification after every
/// update until `updates` have been shown or Ctrl-C.
pub fn run(updates: Option<u64>, interval_ms: Option<u64>) -> CliResult {
    let config = Config::load_or_default();
    let interval = Duration::from_millis(interval_ms.unwrap_or(config.timer.tick_interval_ms));
    let service = open_service(&config)?;
    let mut rx = service.subscribe();
    let mut scheduler = TickScheduler::new(service, interval)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        scheduler.start();

        let mut shown = 0u64;
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(event) => {
                        if let Some(line) = describe(&event) {
                            println!("{line}");
                        }
                        if matches!(event, Event::CreditUpdated { .. }) {
                            shown += 1;
                            if updates.is_some_and(|limit| shown >= limit) {
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "watch fell behind");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        scheduler.stop();
    });
    Ok(())
}

fn describe(event: &Event) -> Option<String> {
    match event {
        Event::LowCredit { remaining_time, .. } => Some(format!(
            "! only {} left",
            format_duration(remaining_time.unsigned_abs())
        )),
        Event::CreditExhausted { .. } => Some("! credit exhausted, debt is accruing".to_string()),
        other => render_event(other).map(|n| format!("{} | {}", n.title, n.text)),
    }
}
