//! Credit timer engine.
//!
//! The engine is a wall-clock-based state machine with no internal thread.
//! Every operation first replays the time elapsed since the last
//! reconciliation against the previously stored state, then applies its own
//! change, then persists. A caller therefore never observes a balance older
//! than its own call, whether or not anything has been ticking in between.
//!
//! ## Atomicity
//!
//! Each operation re-reads the persisted snapshot inside an exclusive store
//! section, applies its change to a copy and writes it back before the
//! section ends. Another process sharing the store therefore never has its
//! update overwritten by a stale in-memory copy. The copy replaces the
//! in-memory state only after the store accepted it, so a failed write
//! leaves the engine exactly as it was before the call.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = CreditEngine::open(Database::open()?, SystemClock)?;
//! engine.add_credit(90)?;
//! engine.start_tracking()?;
//! // From a scheduler, ~1 Hz:
//! engine.tick()?;
//! ```

use tracing::{debug, info};

use super::snapshot::{CreditStatus, TimerSnapshot};
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, ValidationError};
use crate::storage::state::{exclusive, load_snapshot, save_snapshot, StateStore};

/// Largest single credit adjustment accepted, in seconds.
pub const MAX_CREDIT_ADJUSTMENT: i64 = i32::MAX as i64;

/// What the last successful operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State as persisted when the operation began, before reconciling.
    pub before: CreditStatus,
    /// Seconds drained by the reconciliation step.
    pub drained: u64,
    pub after: CreditStatus,
}

impl Transition {
    fn settled(status: CreditStatus) -> Self {
        Self {
            before: status,
            drained: 0,
            after: status,
        }
    }

    /// True when reconciliation alone took the balance from positive to zero.
    pub fn exhausted_by_drain(&self) -> bool {
        let before = self.before.remaining_credit();
        before > 0 && i64::try_from(self.drained).unwrap_or(i64::MAX) >= before
    }
}

/// Core credit engine, generic over its store and clock.
#[derive(Debug)]
pub struct CreditEngine<S, C = SystemClock> {
    store: S,
    clock: C,
    snapshot: TimerSnapshot,
    last: Transition,
}

impl<S: StateStore, C: Clock> CreditEngine<S, C> {
    /// Load the persisted snapshot, or create and persist a fresh one.
    ///
    /// A loaded snapshot may be arbitrarily old; it is not reconciled here
    /// but on the first operation.
    pub fn open(mut store: S, clock: C) -> Result<Self> {
        let now = checked_now(&clock)?;
        let snapshot = exclusive(&mut store, |store| match load_snapshot(store, now)? {
            Some(snapshot) => {
                debug!(
                    remaining = snapshot.remaining_credit,
                    debt = snapshot.debt,
                    tracking = snapshot.is_tracking,
                    last_update = snapshot.last_update,
                    "loaded credit snapshot"
                );
                Ok(snapshot)
            }
            None => {
                let snapshot = TimerSnapshot::new(now);
                save_snapshot(store, &snapshot)?;
                debug!("created fresh credit snapshot");
                Ok(snapshot)
            }
        })?;
        Ok(Self {
            store,
            clock,
            snapshot,
            last: Transition::settled(snapshot.status()),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// The in-memory state as of the last successful operation, without
    /// reconciling or re-reading the store.
    pub fn current(&self) -> CreditStatus {
        self.snapshot.status()
    }

    pub fn last_transition(&self) -> Transition {
        self.last
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Reconcile to the clock's current time and return the result.
    pub fn snapshot(&mut self) -> Result<CreditStatus> {
        self.tick()
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Apply the time elapsed up to `now_ms` and persist.
    ///
    /// Calling twice with the same `now_ms` changes nothing the second time.
    /// A `now_ms` earlier than the last update drains nothing and keeps
    /// `last_update` where it was.
    pub fn reconcile(&mut self, now_ms: i64) -> Result<CreditStatus> {
        self.transition(now_ms, |_| {})
    }

    /// Reconcile against the engine's clock.
    pub fn tick(&mut self) -> Result<CreditStatus> {
        let now = checked_now(&self.clock)?;
        self.reconcile(now)
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn set_screen_on(&mut self, on: bool) -> Result<CreditStatus> {
        let now = checked_now(&self.clock)?;
        let status = self.transition(now, |s| s.screen_on = on)?;
        debug!(screen_on = on, "screen state changed");
        Ok(status)
    }

    pub fn set_app_foreground(&mut self, foreground: bool) -> Result<CreditStatus> {
        let now = checked_now(&self.clock)?;
        let status = self.transition(now, |s| s.app_foreground = foreground)?;
        debug!(app_foreground = foreground, "app state changed");
        Ok(status)
    }

    pub fn start_tracking(&mut self) -> Result<CreditStatus> {
        let now = checked_now(&self.clock)?;
        let status = self.transition(now, |s| s.is_tracking = true)?;
        info!(remaining = status.remaining_credit(), "tracking started");
        Ok(status)
    }

    /// Stop tracking. Credit and debt are kept.
    pub fn stop_tracking(&mut self) -> Result<CreditStatus> {
        let now = checked_now(&self.clock)?;
        let status = self.transition(now, |s| s.is_tracking = false)?;
        info!(remaining = status.remaining_credit(), debt = status.debt(), "tracking stopped");
        Ok(status)
    }

    /// Add (or, if negative, remove) credit. The balance is floored at zero
    /// and debt is never reduced here.
    ///
    /// # Errors
    /// Adjustments beyond [`MAX_CREDIT_ADJUSTMENT`] in either direction are
    /// rejected before anything is touched.
    pub fn add_credit(&mut self, seconds: i64) -> Result<CreditStatus> {
        if !(-MAX_CREDIT_ADJUSTMENT..=MAX_CREDIT_ADJUSTMENT).contains(&seconds) {
            return Err(ValidationError::OutOfRange {
                field: "seconds".into(),
                value: seconds,
                min: -MAX_CREDIT_ADJUSTMENT,
                max: MAX_CREDIT_ADJUSTMENT,
            }
            .into());
        }
        let now = checked_now(&self.clock)?;
        let status = self.transition(now, |s| {
            s.remaining_credit = s.remaining_credit.saturating_add(seconds).max(0);
        })?;
        info!(
            seconds,
            remaining = status.remaining_credit(),
            debt = status.debt(),
            "credit adjusted"
        );
        Ok(status)
    }

    /// Zero credit and debt and stop tracking. Screen and app flags are kept.
    pub fn reset(&mut self) -> Result<CreditStatus> {
        let now = checked_now(&self.clock)?;
        let status = self.update(now, |s| {
            *s = TimerSnapshot {
                remaining_credit: 0,
                debt: 0,
                is_tracking: false,
                last_update: s.last_update.max(now),
                ..*s
            };
            0
        })?;
        info!("credit timer reset");
        Ok(status)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn transition<F>(&mut self, now_ms: i64, change: F) -> Result<CreditStatus>
    where
        F: FnOnce(&mut TimerSnapshot),
    {
        self.update(now_ms, |s| {
            let drained = s.reconcile(now_ms);
            change(s);
            drained
        })
    }

    /// Load, modify and persist the snapshot in one exclusive section.
    /// `change` returns the seconds it drained.
    fn update<F>(&mut self, now_ms: i64, change: F) -> Result<CreditStatus>
    where
        F: FnOnce(&mut TimerSnapshot) -> u64,
    {
        if now_ms < 0 {
            return Err(ValidationError::NegativeTimestamp(now_ms).into());
        }
        let cached = self.snapshot;
        let (before, next, drained) = exclusive(&mut self.store, |store| {
            let before = load_snapshot(store, now_ms)?.unwrap_or(cached);
            let mut next = before;
            let drained = change(&mut next);
            save_snapshot(store, &next)?;
            if drained > 0 {
                store.record_spent(drained, now_ms)?;
            }
            Ok((before, next, drained))
        })?;

        if before != cached {
            debug!(
                cached_remaining = cached.remaining_credit,
                stored_remaining = before.remaining_credit,
                "store changed since last operation"
            );
        }
        if drained > 0 {
            debug!(
                drained,
                remaining = next.remaining_credit,
                debt = next.debt,
                "reconciled elapsed time"
            );
        }
        self.snapshot = next;
        self.last = Transition {
            before: before.status(),
            drained,
            after: next.status(),
        };
        Ok(self.current())
    }
}

fn checked_now<C: Clock>(clock: &C) -> Result<i64> {
    let now = clock.now_ms();
    if now < 0 {
        return Err(ValidationError::NegativeTimestamp(now).into());
    }
    Ok(now)
}
