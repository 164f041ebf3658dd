//! SQLite-based state storage and credit ledger.
//!
//! Provides persistent storage for:
//! - The credit timer snapshot (key-value table)
//! - A ledger of credit grants, adjustments and resets
//! - Drained (spent) seconds per day
//! - Ledger statistics (daily and all-time)
//!
//! Several processes may open the same file. Engine updates run inside
//! `BEGIN IMMEDIATE` transactions so they serialise on the write lock.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;
use serde::{Deserialize, Serialize};

use super::data_dir;
use super::state::StateStore;
use crate::credit::CreditStatus;
use crate::error::{CoreError, StorageError};
use crate::events::event_time;

/// How long a writer waits for another process to release the lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// What a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditKind {
    /// Credit earned from a reward.
    Earned,
    /// A manual adjustment, positive or negative.
    Adjusted,
    /// The balance and debt were wiped.
    Reset,
}

impl CreditKind {
    fn as_str(self) -> &'static str {
        match self {
            CreditKind::Earned => "earned",
            CreditKind::Adjusted => "adjusted",
            CreditKind::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditRecord {
    pub id: i64,
    pub kind: String,
    pub seconds: i64,
    pub balance_after: i64,
    pub debt_after: u64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub total_entries: u64,
    pub total_earned_secs: i64,
    pub total_adjusted_secs: i64,
    pub resets: u64,
    pub today_earned_secs: i64,
    pub today_entries: u64,
    /// Credit seconds drained while tracking.
    pub total_spent_secs: u64,
    pub today_spent_secs: u64,
}

/// SQLite database backing the credit timer.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/screentime/screentime.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the database
    /// cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("screentime.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS credit_log (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                kind          TEXT NOT NULL,
                seconds       INTEGER NOT NULL,
                balance_after INTEGER NOT NULL,
                debt_after    INTEGER NOT NULL,
                at            TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS daily_usage (
                day        TEXT PRIMARY KEY,
                spent_secs INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_credit_log_at ON credit_log(at);
            CREATE INDEX IF NOT EXISTS idx_credit_log_kind_at ON credit_log(kind, at);",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Append a ledger entry describing a credit change.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_credit(
        &self,
        kind: CreditKind,
        seconds: i64,
        status: &CreditStatus,
        at: DateTime<Utc>,
    ) -> Result<i64, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO credit_log (kind, seconds, balance_after, debt_after, at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                kind.as_str(),
                seconds,
                status.remaining_credit(),
                i64::try_from(status.debt()).unwrap_or(i64::MAX),
                at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent ledger entries, newest first.
    pub fn recent_credits(&self, limit: usize) -> Result<Vec<CreditRecord>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, seconds, balance_after, debt_after, at
             FROM credit_log
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let at: String = row.get(5)?;
            let at = DateTime::parse_from_rfc3339(&at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
                })?;
            Ok(CreditRecord {
                id: row.get(0)?,
                kind: row.get(1)?,
                seconds: row.get(2)?,
                balance_after: row.get(3)?,
                debt_after: row.get::<_, i64>(4)?.max(0) as u64,
                at,
            })
        })?;
        rows.collect()
    }

    pub fn stats(&self) -> Result<LedgerStats, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, COUNT(*), COALESCE(SUM(seconds), 0)
             FROM credit_log
             GROUP BY kind",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut stats = LedgerStats::default();
        for row in rows {
            let (kind, count, seconds) = row?;
            stats.total_entries += count;
            match kind.as_str() {
                "earned" => stats.total_earned_secs += seconds,
                "adjusted" => stats.total_adjusted_secs += seconds,
                "reset" => stats.resets += count,
                _ => {}
            }
        }

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let (today_entries, today_earned) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN kind = 'earned' THEN seconds ELSE 0 END), 0)
             FROM credit_log
             WHERE at >= ?1",
            params![format!("{today}T00:00:00+00:00")],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, i64>(1)?)),
        )?;
        stats.today_entries = today_entries;
        stats.today_earned_secs = today_earned;

        let (total_spent, today_spent) = self.conn.query_row(
            "SELECT COALESCE(SUM(spent_secs), 0),
                    COALESCE(SUM(CASE WHEN day = ?1 THEN spent_secs ELSE 0 END), 0)
             FROM daily_usage",
            params![today],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )?;
        stats.total_spent_secs = total_spent.max(0) as u64;
        stats.today_spent_secs = today_spent.max(0) as u64;

        Ok(stats)
    }
}

fn write_entries(conn: &Connection, entries: &[(String, String)]) -> Result<(), rusqlite::Error> {
    for (key, value) in entries {
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
    }
    Ok(())
}

impl StateStore for Database {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.kv_get(key)?)
    }

    fn write_all(&mut self, entries: &[(String, String)]) -> Result<(), StorageError> {
        if !self.conn.is_autocommit() {
            // Already inside an exclusive section; its commit covers these rows.
            return Ok(write_entries(&self.conn, entries)?);
        }
        let tx = self.conn.transaction()?;
        write_entries(&tx, entries)?;
        tx.commit()?;
        Ok(())
    }

    fn begin_exclusive(&mut self) -> Result<(), StorageError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) {
        if self.conn.is_autocommit() {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            warn!(error = %e, "rollback failed");
        }
    }

    fn record_spent(&mut self, seconds: u64, at_ms: i64) -> Result<(), StorageError> {
        let day = event_time(at_ms).format("%Y-%m-%d").to_string();
        self.conn.execute(
            "INSERT INTO daily_usage (day, spent_secs) VALUES (?1, ?2)
             ON CONFLICT(day) DO UPDATE SET spent_secs = spent_secs + excluded.spent_secs",
            params![day, i64::try_from(seconds).unwrap_or(i64::MAX)],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credit::TimerSnapshot;
    use crate::storage::state::{exclusive, load_snapshot, save_snapshot};

    fn status(remaining: i64, debt: u64) -> CreditStatus {
        TimerSnapshot {
            remaining_credit: remaining,
            debt,
            ..TimerSnapshot::new(0)
        }
        .status()
    }

    #[test]
    fn kv_store() {
        let mut db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.write_all(&[("test".into(), "hello".into())]).unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
    }

    #[test]
    fn exclusive_section_commits_or_rolls_back() {
        let mut db = Database::open_memory().unwrap();
        exclusive(&mut db, |db| db.write_all(&[("a".into(), "1".into())])).unwrap();
        assert_eq!(db.kv_get("a").unwrap().as_deref(), Some("1"));

        let failed: Result<(), StorageError> = exclusive(&mut db, |db| {
            db.write_all(&[("a".into(), "2".into())])?;
            db.record_spent(30, 0)?;
            Err(StorageError::Locked)
        });
        assert!(failed.is_err());
        assert_eq!(db.kv_get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(db.stats().unwrap().total_spent_secs, 0);
        assert!(db.conn.is_autocommit());
    }

    #[test]
    fn spent_seconds_accumulate_per_day() {
        let mut db = Database::open_memory().unwrap();
        let now_ms = Utc::now().timestamp_millis();
        db.record_spent(40, now_ms).unwrap();
        db.record_spent(20, now_ms).unwrap();
        // 2001-09-09, long before today.
        db.record_spent(5, 1_000_000_000_000).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_spent_secs, 65);
        assert_eq!(stats.today_spent_secs, 60);
    }

    #[test]
    fn snapshot_lives_in_kv_table() {
        let mut db = Database::open_memory().unwrap();
        let snap = TimerSnapshot {
            remaining_credit: 90,
            is_tracking: true,
            ..TimerSnapshot::new(1_000)
        };
        save_snapshot(&mut db, &snap).unwrap();
        assert_eq!(db.kv_get("credit_timer.remainingTime").unwrap().as_deref(), Some("90"));
        assert_eq!(load_snapshot(&db, 0).unwrap(), Some(snap));
    }

    #[test]
    fn ledger_stats_group_by_kind() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        db.record_credit(CreditKind::Earned, 60, &status(60, 0), now).unwrap();
        db.record_credit(CreditKind::Earned, 120, &status(180, 0), now).unwrap();
        db.record_credit(CreditKind::Adjusted, -30, &status(150, 0), now).unwrap();
        db.record_credit(CreditKind::Reset, 0, &status(0, 0), now).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_entries, 4);
        assert_eq!(stats.total_earned_secs, 180);
        assert_eq!(stats.total_adjusted_secs, -30);
        assert_eq!(stats.resets, 1);
        assert_eq!(stats.today_earned_secs, 180);
        assert_eq!(stats.today_entries, 4);
    }

    #[test]
    fn recent_credits_newest_first() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        db.record_credit(CreditKind::Earned, 60, &status(60, 0), now).unwrap();
        db.record_credit(CreditKind::Adjusted, 5, &status(65, 2), now).unwrap();
        let recent = db.recent_credits(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].kind, "adjusted");
        assert_eq!(recent[0].debt_after, 2);
        assert_eq!(recent[1].seconds, 60);
    }
}
