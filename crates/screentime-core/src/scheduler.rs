//! Best-effort periodic reconciliation.
//!
//! The scheduler only keeps the published balance fresh while the process is
//! alive. Correctness never depends on it: the engine reconciles on every
//! call, so delayed, coalesced or missed ticks cost nothing but staleness of
//! the notification.
//!
//! Reconciliation counts whole seconds and discards the remainder, so the
//! interval may not be shorter than [`MIN_TICK_INTERVAL`]: faster ticks would
//! each see less than a second elapse and never drain anything.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::error::ValidationError;
use crate::service::CreditService;
use crate::storage::StateStore;

pub const MIN_TICK_INTERVAL: Duration = Duration::from_secs(1);

pub struct TickScheduler<S, C> {
    service: CreditService<S, C>,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl<S, C> std::fmt::Debug for TickScheduler<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickScheduler")
            .field("interval", &self.interval)
            .field("running", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

impl<S, C> TickScheduler<S, C>
where
    S: StateStore + Send + 'static,
    C: Clock + Send + 'static,
{
    /// # Errors
    /// Intervals shorter than [`MIN_TICK_INTERVAL`] are rejected.
    pub fn new(service: CreditService<S, C>, interval: Duration) -> Result<Self, ValidationError> {
        if interval < MIN_TICK_INTERVAL {
            return Err(ValidationError::OutOfRange {
                field: "tick_interval_ms".into(),
                value: i64::try_from(interval.as_millis()).unwrap_or(i64::MAX),
                min: MIN_TICK_INTERVAL.as_millis() as i64,
                max: i64::MAX,
            });
        }
        Ok(Self {
            service,
            interval,
            handle: None,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Spawn the tick loop on the current tokio runtime.
    ///
    /// Returns false if it was already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        let service = self.service.clone();
        let period = self.interval;
        debug!(interval_ms = period.as_millis() as u64, "starting tick scheduler");

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // A suspended process should not replay a burst of ticks.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match service.tick() {
                    Ok(status) => trace!(
                        remaining = status.remaining_credit(),
                        debt = status.debt(),
                        draining = status.is_draining,
                        "tick"
                    ),
                    Err(e) => warn!(error = %e, "tick failed, will retry next interval"),
                }
            }
        }));
        true
    }

    /// Cancel future ticks. The snapshot is left as the last tick wrote it.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("tick scheduler stopped");
        }
    }
}

impl<S, C> Drop for TickScheduler<S, C> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
