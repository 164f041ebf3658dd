//! Shared, serialised access to the credit engine.
//!
//! The engine performs read-modify-persist sequences that must not
//! interleave, so every caller (commands and the tick scheduler alike) goes
//! through one mutex here. After each operation the service publishes events
//! on a broadcast channel; subscribers such as the notification renderer
//! never touch the engine themselves.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::credit::{CreditEngine, CreditStatus, Transition};
use crate::error::Result;
use crate::events::{event_time, Event};
use crate::storage::StateStore;

const EVENT_CAPACITY: usize = 64;

pub struct CreditService<S, C = SystemClock> {
    engine: Arc<Mutex<CreditEngine<S, C>>>,
    events: broadcast::Sender<Event>,
    low_credit_thresholds: Arc<Vec<u64>>,
}

impl<S, C> Clone for CreditService<S, C> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            events: self.events.clone(),
            low_credit_thresholds: Arc::clone(&self.low_credit_thresholds),
        }
    }
}

impl<S: StateStore, C: Clock> CreditService<S, C> {
    /// Wrap an engine. `low_credit_thresholds` are remaining-credit levels in
    /// seconds that produce a [`Event::LowCredit`] when crossed downward.
    pub fn new(engine: CreditEngine<S, C>, low_credit_thresholds: Vec<u64>) -> Self {
        let mut thresholds: Vec<u64> = low_credit_thresholds.into_iter().filter(|t| *t > 0).collect();
        thresholds.sort_unstable_by(|a, b| b.cmp(a));
        thresholds.dedup();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            engine: Arc::new(Mutex::new(engine)),
            events,
            low_credit_thresholds: Arc::new(thresholds),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Run `f` with exclusive access to the engine, without publishing.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut CreditEngine<S, C>) -> R) -> Result<R> {
        let mut engine = self.engine.lock()?;
        Ok(f(&mut *engine))
    }

    /// Last committed state, without reconciling.
    pub fn current(&self) -> Result<CreditStatus> {
        Ok(self.engine.lock()?.current())
    }

    pub fn snapshot(&self) -> Result<CreditStatus> {
        self.run(|engine| engine.snapshot(), |_| None)
    }

    pub fn tick(&self) -> Result<CreditStatus> {
        self.run(|engine| engine.tick(), |_| None)
    }

    pub fn reconcile(&self, now_ms: i64) -> Result<CreditStatus> {
        self.run(|engine| engine.reconcile(now_ms), |_| None)
    }

    pub fn start_tracking(&self) -> Result<CreditStatus> {
        self.run(
            |engine| engine.start_tracking(),
            |status| Some(Event::TrackingStarted {
                at: event_time(status.snapshot.last_update),
            }),
        )
    }

    pub fn stop_tracking(&self) -> Result<CreditStatus> {
        self.run(
            |engine| engine.stop_tracking(),
            |status| Some(Event::TrackingStopped {
                at: event_time(status.snapshot.last_update),
            }),
        )
    }

    pub fn add_credit(&self, seconds: i64) -> Result<CreditStatus> {
        self.run(
            |engine| engine.add_credit(seconds),
            |status| Some(Event::CreditAdded {
                seconds,
                remaining_time: status.remaining_credit(),
                at: event_time(status.snapshot.last_update),
            }),
        )
    }

    pub fn reset(&self) -> Result<CreditStatus> {
        let status = self.engine.lock()?.reset()?;
        self.publish(Event::TimerReset {
            at: event_time(status.snapshot.last_update),
        });
        self.publish(Event::updated(&status));
        Ok(status)
    }

    pub fn set_screen_on(&self, on: bool) -> Result<CreditStatus> {
        self.run(
            |engine| engine.set_screen_on(on),
            |status| Some(Event::ScreenChanged {
                screen_on: on,
                at: event_time(status.snapshot.last_update),
            }),
        )
    }

    pub fn set_app_foreground(&self, foreground: bool) -> Result<CreditStatus> {
        self.run(
            |engine| engine.set_app_foreground(foreground),
            |status| Some(Event::AppStateChanged {
                app_foreground: foreground,
                at: event_time(status.snapshot.last_update),
            }),
        )
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn run<Op, Ev>(&self, op: Op, event: Ev) -> Result<CreditStatus>
    where
        Op: FnOnce(&mut CreditEngine<S, C>) -> Result<CreditStatus>,
        Ev: FnOnce(&CreditStatus) -> Option<Event>,
    {
        let transition = {
            let mut engine = self.engine.lock()?;
            op(&mut *engine)?;
            engine.last_transition()
        };
        let after = transition.after;

        if let Some(ev) = event(&after) {
            self.publish(ev);
        }
        for ev in self.crossings(&transition) {
            self.publish(ev);
        }
        self.publish(Event::updated(&after));
        Ok(after)
    }

    fn crossings(&self, transition: &Transition) -> Vec<Event> {
        let after = &transition.after;
        let from = transition.before.remaining_credit();
        let to = after.remaining_credit();
        let at = event_time(after.snapshot.last_update);
        let mut events = Vec::new();

        if to < from {
            for &threshold in self.low_credit_thresholds.iter() {
                let t = i64::try_from(threshold).unwrap_or(i64::MAX);
                if from > t && to <= t {
                    events.push(Event::LowCredit {
                        threshold_secs: threshold,
                        remaining_time: to,
                        at,
                    });
                }
            }
        }
        // Only a drain exhausts credit; a negative adjustment to zero does not.
        if transition.exhausted_by_drain() {
            events.push(Event::CreditExhausted {
                debt_time: after.debt(),
                at,
            });
        }
        events
    }

    fn publish(&self, event: Event) {
        // No subscribers is fine.
        if self.events.send(event).is_err() {
            debug!("event dropped, no subscribers");
        }
    }
}
