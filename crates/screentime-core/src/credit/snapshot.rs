use serde::{Deserialize, Serialize};

/// The durable record of the credit timer.
///
/// This is the single source of truth: the engine persists it after every
/// mutation and rebuilds itself from it after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    /// Credit pool in seconds. Never negative at rest.
    pub remaining_credit: i64,
    /// Overdraw in seconds. Only a reset lowers it.
    pub debt: u64,
    pub is_tracking: bool,
    pub screen_on: bool,
    pub app_foreground: bool,
    /// Epoch milliseconds of the last reconciliation.
    pub last_update: i64,
}

impl TimerSnapshot {
    /// A fresh snapshot: no credit, no debt, not tracking, screen off.
    pub fn new(now_ms: i64) -> Self {
        Self {
            remaining_credit: 0,
            debt: 0,
            is_tracking: false,
            screen_on: false,
            app_foreground: false,
            last_update: now_ms,
        }
    }

    /// Credit drains iff tracking, screen on and the host app is backgrounded.
    pub fn is_draining(&self) -> bool {
        self.is_tracking && self.screen_on && !self.app_foreground
    }

    pub fn is_in_debt(&self) -> bool {
        self.debt > 0
    }

    /// Whole seconds between `last_update` and `now_ms`, zero if the clock
    /// went backwards.
    pub fn elapsed_secs(&self, now_ms: i64) -> u64 {
        let delta = now_ms.saturating_sub(self.last_update);
        if delta <= 0 {
            0
        } else {
            (delta / 1000) as u64
        }
    }

    /// Apply the wall-clock time elapsed since `last_update`.
    ///
    /// The drain condition is taken from the state as it was before this
    /// call: toggles between two reconciliations are not observed. Any overdraw
    /// is folded into `debt`. Returns the number of seconds drained.
    pub fn reconcile(&mut self, now_ms: i64) -> u64 {
        let elapsed = self.elapsed_secs(now_ms);
        let drained = if self.is_draining() { elapsed } else { 0 };

        if drained > 0 {
            let drained_i = i64::try_from(drained).unwrap_or(i64::MAX);
            let next = self.remaining_credit.saturating_sub(drained_i);
            if next < 0 {
                self.debt = self.debt.saturating_add(next.unsigned_abs());
                self.remaining_credit = 0;
            } else {
                self.remaining_credit = next;
            }
        }

        // Never move backwards, even if the wall clock does.
        self.last_update = self.last_update.max(now_ms);
        drained
    }

    /// Restore the at-rest invariants on a snapshot read from storage.
    ///
    /// Returns true if anything had to change.
    pub fn normalize(&mut self) -> bool {
        if self.remaining_credit < 0 {
            self.debt = self.debt.saturating_add(self.remaining_credit.unsigned_abs());
            self.remaining_credit = 0;
            return true;
        }
        false
    }

    /// A read-only view with the derived flags filled in.
    pub fn status(&self) -> CreditStatus {
        CreditStatus {
            snapshot: *self,
            is_draining: self.is_draining(),
            is_in_debt: self.is_in_debt(),
        }
    }
}

/// An immutable copy of the snapshot plus derived flags, as handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditStatus {
    #[serde(flatten)]
    pub snapshot: TimerSnapshot,
    pub is_draining: bool,
    pub is_in_debt: bool,
}

impl CreditStatus {
    pub fn remaining_credit(&self) -> i64 {
        self.snapshot.remaining_credit
    }

    pub fn debt(&self) -> u64 {
        self.snapshot.debt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draining(remaining: i64, at: i64) -> TimerSnapshot {
        TimerSnapshot {
            remaining_credit: remaining,
            debt: 0,
            is_tracking: true,
            screen_on: true,
            app_foreground: false,
            last_update: at,
        }
    }

    #[test]
    fn drain_condition_needs_all_three() {
        let mut snap = draining(10, 0);
        assert!(snap.is_draining());
        snap.app_foreground = true;
        assert!(!snap.is_draining());
        snap.app_foreground = false;
        snap.screen_on = false;
        assert!(!snap.is_draining());
        snap.screen_on = true;
        snap.is_tracking = false;
        assert!(!snap.is_draining());
    }

    #[test]
    fn elapsed_floors_partial_seconds() {
        let snap = draining(0, 1_000);
        assert_eq!(snap.elapsed_secs(1_999), 0);
        assert_eq!(snap.elapsed_secs(2_000), 1);
        assert_eq!(snap.elapsed_secs(12_999), 11);
        assert_eq!(snap.elapsed_secs(0), 0);
    }

    #[test]
    fn reconcile_folds_overdraw_into_debt() {
        let mut snap = draining(5, 0);
        assert_eq!(snap.reconcile(8_000), 8);
        assert_eq!(snap.remaining_credit, 0);
        assert_eq!(snap.debt, 3);
        assert_eq!(snap.last_update, 8_000);
    }

    #[test]
    fn reconcile_keeps_last_update_when_clock_goes_back() {
        let mut snap = draining(5, 10_000);
        assert_eq!(snap.reconcile(4_000), 0);
        assert_eq!(snap.last_update, 10_000);
        assert_eq!(snap.remaining_credit, 5);
    }

    #[test]
    fn normalize_moves_negative_credit_to_debt() {
        let mut snap = draining(-7, 0);
        snap.debt = 2;
        assert!(snap.normalize());
        assert_eq!(snap.remaining_credit, 0);
        assert_eq!(snap.debt, 9);
        assert!(!snap.normalize());
    }

    #[test]
    fn status_serializes_flat() {
        let status = draining(3, 0).status();
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["remainingCredit"], 3);
        assert_eq!(json["isDraining"], true);
        assert_eq!(json["isInDebt"], false);
    }
}
