//! Key-value contract for the persisted timer snapshot.
//!
//! The snapshot is stored as six scalar entries under the `credit_timer`
//! namespace. All six are written together through [`StateStore::write_all`],
//! which implementations must apply atomically.

use tracing::warn;

use crate::credit::TimerSnapshot;
use crate::error::StorageError;

/// Namespace prefix shared by every timer key.
pub const NAMESPACE: &str = "credit_timer";

pub const KEY_REMAINING_TIME: &str = "remainingTime";
pub const KEY_DEBT_TIME: &str = "debtTime";
pub const KEY_IS_TRACKING: &str = "isTracking";
pub const KEY_LAST_UPDATE: &str = "lastUpdate";
pub const KEY_SCREEN_STATE: &str = "screenState";
pub const KEY_APP_STATE: &str = "appState";

const ALL_KEYS: [&str; 6] = [
    KEY_REMAINING_TIME,
    KEY_DEBT_TIME,
    KEY_IS_TRACKING,
    KEY_LAST_UPDATE,
    KEY_SCREEN_STATE,
    KEY_APP_STATE,
];

/// Durable key-value persistence for the engine.
///
/// Several processes may share one store. The engine wraps every
/// read-modify-write in [`exclusive`], so stores shared across processes must
/// implement `begin_exclusive`/`commit`/`rollback`; the defaults suit stores
/// with a single owner.
pub trait StateStore {
    /// Read a single value. `Ok(None)` means the key was never written.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write every entry or none of them.
    fn write_all(&mut self, entries: &[(String, String)]) -> Result<(), StorageError>;

    /// Block other writers until `commit` or `rollback`. Reads made after this
    /// see the latest committed state.
    fn begin_exclusive(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    fn rollback(&mut self) {}

    /// Account for `seconds` of drained credit, reconciled at `at_ms`.
    fn record_spent(&mut self, _seconds: u64, _at_ms: i64) -> Result<(), StorageError> {
        Ok(())
    }
}

impl<T: StateStore + ?Sized> StateStore for Box<T> {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key)
    }

    fn write_all(&mut self, entries: &[(String, String)]) -> Result<(), StorageError> {
        (**self).write_all(entries)
    }

    fn begin_exclusive(&mut self) -> Result<(), StorageError> {
        (**self).begin_exclusive()
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        (**self).commit()
    }

    fn rollback(&mut self) {
        (**self).rollback()
    }

    fn record_spent(&mut self, seconds: u64, at_ms: i64) -> Result<(), StorageError> {
        (**self).record_spent(seconds, at_ms)
    }
}

/// Run `f` inside an exclusive section, committing on success and rolling
/// back on any error.
pub fn exclusive<S, T, F>(store: &mut S, f: F) -> Result<T, StorageError>
where
    S: StateStore + ?Sized,
    F: FnOnce(&mut S) -> Result<T, StorageError>,
{
    store.begin_exclusive()?;
    let value = match f(store) {
        Ok(value) => value,
        Err(e) => {
            store.rollback();
            return Err(e);
        }
    };
    if let Err(e) = store.commit() {
        store.rollback();
        return Err(e);
    }
    Ok(value)
}

/// Fully qualified key, e.g. `credit_timer.remainingTime`.
pub fn scoped(key: &str) -> String {
    format!("{NAMESPACE}.{key}")
}

/// Encode a snapshot into its six persisted entries.
pub fn encode(snapshot: &TimerSnapshot) -> Vec<(String, String)> {
    vec![
        (scoped(KEY_REMAINING_TIME), snapshot.remaining_credit.to_string()),
        (scoped(KEY_DEBT_TIME), snapshot.debt.to_string()),
        (scoped(KEY_IS_TRACKING), snapshot.is_tracking.to_string()),
        (scoped(KEY_LAST_UPDATE), snapshot.last_update.to_string()),
        (scoped(KEY_SCREEN_STATE), snapshot.screen_on.to_string()),
        (scoped(KEY_APP_STATE), snapshot.app_foreground.to_string()),
    ]
}

/// Persist a snapshot.
pub fn save_snapshot<S: StateStore + ?Sized>(
    store: &mut S,
    snapshot: &TimerSnapshot,
) -> Result<(), StorageError> {
    store.write_all(&encode(snapshot))
}

/// Load the persisted snapshot, if any key of it was ever written.
///
/// Missing keys fall back to defaults; a missing `lastUpdate` becomes
/// `now_ms`. Values that break the at-rest invariants are repaired and logged.
pub fn load_snapshot<S: StateStore + ?Sized>(
    store: &S,
    now_ms: i64,
) -> Result<Option<TimerSnapshot>, StorageError> {
    let mut values = [None, None, None, None, None, None];
    for (slot, key) in values.iter_mut().zip(ALL_KEYS) {
        *slot = store.read(&scoped(key))?;
    }
    if values.iter().all(Option::is_none) {
        return Ok(None);
    }
    let [remaining, debt, tracking, last_update, screen, app] = values;

    let remaining_credit = parse_int(KEY_REMAINING_TIME, remaining)?.unwrap_or(0);
    let raw_debt = parse_int(KEY_DEBT_TIME, debt)?.unwrap_or(0);
    let last_update = parse_int(KEY_LAST_UPDATE, last_update)?.unwrap_or(now_ms);

    let mut snapshot = TimerSnapshot {
        remaining_credit,
        debt: raw_debt.max(0) as u64,
        is_tracking: parse_bool(KEY_IS_TRACKING, tracking)?.unwrap_or(false),
        screen_on: parse_bool(KEY_SCREEN_STATE, screen)?.unwrap_or(false),
        app_foreground: parse_bool(KEY_APP_STATE, app)?.unwrap_or(false),
        last_update,
    };

    if raw_debt < 0 {
        warn!(debt = raw_debt, "stored debt was negative, clamping to zero");
    }
    if snapshot.normalize() {
        warn!(
            remaining = remaining_credit,
            debt = snapshot.debt,
            "stored credit was negative, folded into debt"
        );
    }
    Ok(Some(snapshot))
}

fn parse_int(key: &str, raw: Option<String>) -> Result<Option<i64>, StorageError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.trim()
        .parse::<i64>()
        .map(Some)
        .map_err(|_| StorageError::Corrupt {
            key: scoped(key),
            value: raw,
        })
}

fn parse_bool(key: &str, raw: Option<String>) -> Result<Option<bool>, StorageError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim() {
        "true" | "1" => Ok(Some(true)),
        "false" | "0" => Ok(Some(false)),
        _ => Err(StorageError::Corrupt {
            key: scoped(key),
            value: raw,
        }),
    }
}
