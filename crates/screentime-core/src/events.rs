use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credit::CreditStatus;

/// Every state change in the system produces an Event.
/// The presentation layer subscribes to them; the CLI prints them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Event {
    /// Published after every reconciliation and mutation.
    CreditUpdated {
        remaining_time: i64,
        debt_time: u64,
        is_tracking: bool,
        screen_on: bool,
        app_foreground: bool,
        /// Epoch milliseconds of the reconciliation.
        timestamp: i64,
    },
    TrackingStarted {
        at: DateTime<Utc>,
    },
    TrackingStopped {
        at: DateTime<Utc>,
    },
    CreditAdded {
        seconds: i64,
        remaining_time: i64,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    ScreenChanged {
        screen_on: bool,
        at: DateTime<Utc>,
    },
    AppStateChanged {
        app_foreground: bool,
        at: DateTime<Utc>,
    },
    /// Remaining credit dropped through a warning threshold.
    LowCredit {
        threshold_secs: u64,
        remaining_time: i64,
        at: DateTime<Utc>,
    },
    /// Credit ran out while draining; debt accrues from here.
    CreditExhausted {
        debt_time: u64,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// The periodic update for a status.
    pub fn updated(status: &CreditStatus) -> Self {
        let snap = &status.snapshot;
        Event::CreditUpdated {
            remaining_time: snap.remaining_credit,
            debt_time: snap.debt,
            is_tracking: snap.is_tracking,
            screen_on: snap.screen_on,
            app_foreground: snap.app_foreground,
            timestamp: snap.last_update,
        }
    }
}

/// Event time for a snapshot reconciled at `epoch_ms`.
pub fn event_time(epoch_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(epoch_ms).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credit::TimerSnapshot;

    #[test]
    fn credit_updated_uses_wire_field_names() {
        let status = TimerSnapshot {
            remaining_credit: 42,
            debt: 1,
            is_tracking: true,
            screen_on: true,
            app_foreground: false,
            last_update: 1_000,
        }
        .status();
        let json = serde_json::to_value(Event::updated(&status)).unwrap();
        assert_eq!(json["type"], "CreditUpdated");
        assert_eq!(json["remainingTime"], 42);
        assert_eq!(json["debtTime"], 1);
        assert_eq!(json["isTracking"], true);
        assert_eq!(json["screenOn"], true);
        assert_eq!(json["appForeground"], false);
        assert_eq!(json["timestamp"], 1_000);
    }

    #[test]
    fn event_time_converts_millis() {
        assert_eq!(event_time(1_500).timestamp_millis(), 1_500);
    }
}
