//! Notification Ledger
//!
//! Durable record of past notifications, used to suppress repeats within the
//! renotify buffer. Storage sits behind the [`NotificationStore`] trait so
//! tests can run against an in-memory fake instead of a real database.
//!
//! Policy: a key is eligible when no prior record exists, or the prior
//! record's timestamp is older than `now - renotify_buffer`. Records are
//! written only after a delivery was confirmed (see the scheduler), so a
//! failed webhook call never silences an asset permanently.
//!
//! The SQLite file is safe to delete while the daemon is stopped; schema
//! initialization is idempotent and re-creates it on next startup.

use super::types::Direction;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Width of the change buckets used in notification keys.
///
/// A 12% and a 13% move share bucket 10; an 18% move lands in bucket 15.
/// Bucketing means an escalating move renotifies immediately instead of
/// waiting out the buffer.
pub const BUCKET_WIDTH_PCT: f64 = 5.0;

/// Identity of a notification for dedup purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationKey {
    pub symbol: String,
    pub direction: Direction,
    pub timeframe: String,
    /// Lower edge of the |change_pct| bucket, in whole percent.
    pub bucket: i64,
}

impl NotificationKey {
    pub fn new(symbol: &str, direction: Direction, timeframe: &str, change_pct: f64) -> Self {
        let bucket = (change_pct.abs() / BUCKET_WIDTH_PCT).floor() as i64 * BUCKET_WIDTH_PCT as i64;

        Self {
            symbol: symbol.to_string(),
            direction,
            timeframe: timeframe.to_string(),
            bucket,
        }
    }

    /// Composite string stored in the `notification_key` column.
    pub fn as_storage_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.symbol,
            self.direction.as_str(),
            self.timeframe,
            self.bucket
        )
    }
}

/// Row written after a confirmed delivery. Never updated in place; a new
/// notification for the same key supersedes the old row.
#[derive(Debug, Clone)]
pub struct NotificationRecord {
    pub key: NotificationKey,
    pub change_pct: f64,
    /// Unix timestamp (seconds) of the delivery.
    pub notified_at: i64,
}

/// Storage backend for notification history.
///
/// The daemon is the only writer, so implementations need no cross-process
/// locking; they only need each put to be atomic.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Unix timestamp of the most recent notification for this key, if any.
    async fn last_notified(
        &self,
        key: &NotificationKey,
    ) -> Result<Option<i64>, Box<dyn std::error::Error + Send + Sync>>;

    /// Upsert the record under its key.
    async fn put(
        &self,
        record: &NotificationRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// SQLite-backed store. Survives process restarts.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the backing database and initialize the schema.
    ///
    /// Initialization is idempotent: opening an existing store preserves
    /// all prior history.
    pub fn open(db_path: &Path) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                notification_key TEXT UNIQUE NOT NULL,
                symbol           TEXT NOT NULL,
                timeframe        TEXT NOT NULL,
                direction        TEXT NOT NULL,
                change_pct       REAL NOT NULL,
                notified_at      INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn last_notified(
        &self,
        key: &NotificationKey,
    ) -> Result<Option<i64>, Box<dyn std::error::Error + Send + Sync>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt =
            conn.prepare("SELECT notified_at FROM notifications WHERE notification_key = ?")?;

        let ts = stmt
            .query_row([key.as_storage_key()], |row| row.get::<_, i64>(0))
            .optional()?;

        Ok(ts)
    }

    async fn put(
        &self,
        record: &NotificationRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            INSERT INTO notifications
                (notification_key, symbol, timeframe, direction, change_pct, notified_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(notification_key) DO UPDATE SET
                change_pct = excluded.change_pct,
                notified_at = excluded.notified_at
            "#,
            rusqlite::params![
                record.key.as_storage_key(),
                record.key.symbol,
                record.key.timeframe,
                record.key.direction.as_str(),
                record.change_pct,
                record.notified_at,
            ],
        )?;

        Ok(())
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, i64>>,
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn last_notified(
        &self,
        key: &NotificationKey,
    ) -> Result<Option<i64>, Box<dyn std::error::Error + Send + Sync>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(&key.as_storage_key()).copied())
    }

    async fn put(
        &self,
        record: &NotificationRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(record.key.as_storage_key(), record.notified_at);
        Ok(())
    }
}

/// Dedup policy on top of a [`NotificationStore`].
pub struct NotificationLedger {
    store: Arc<dyn NotificationStore>,
    renotify_buffer_secs: i64,
}

impl NotificationLedger {
    pub fn new(store: Arc<dyn NotificationStore>, renotify_buffer_minutes: u64) -> Self {
        Self {
            store,
            renotify_buffer_secs: renotify_buffer_minutes as i64 * 60,
        }
    }

    /// True when no prior record exists or the prior record has aged out.
    ///
    /// Storage errors propagate to the caller, which must fail closed
    /// (treat the asset as suppressed for the cycle).
    pub async fn should_notify(
        &self,
        key: &NotificationKey,
        now: i64,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        match self.store.last_notified(key).await? {
            Some(last) => Ok(now - last >= self.renotify_buffer_secs),
            None => Ok(true),
        }
    }

    pub async fn record(
        &self,
        record: &NotificationRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.store.put(record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn key(symbol: &str, change_pct: f64) -> NotificationKey {
        NotificationKey::new(symbol, Direction::Up, "4h", change_pct)
    }

    fn record(symbol: &str, change_pct: f64, notified_at: i64) -> NotificationRecord {
        NotificationRecord {
            key: key(symbol, change_pct),
            change_pct,
            notified_at,
        }
    }

    #[test]
    fn test_change_bucketing() {
        // 12% and 13% share bucket 10; 18% lands in bucket 15.
        assert_eq!(key("FOO", 12.0).bucket, 10);
        assert_eq!(key("FOO", 13.0).bucket, 10);
        assert_eq!(key("FOO", 18.0).bucket, 15);
        assert_eq!(key("FOO", 3.0).bucket, 0);

        // Down moves bucket on the absolute value.
        let down = NotificationKey::new("FOO", Direction::Down, "4h", -12.0);
        assert_eq!(down.bucket, 10);
    }

    #[test]
    fn test_storage_key_components() {
        let k = NotificationKey::new("FOO", Direction::Down, "1h", -7.5);
        assert_eq!(k.as_storage_key(), "FOO:down:1h:5");
    }

    #[tokio::test]
    async fn test_renotify_window_boundaries() {
        let ledger = NotificationLedger::new(Arc::new(MemoryStore::default()), 30);
        let t0 = 1_700_000_000;

        let k = key("FOO", 12.0);
        assert!(ledger.should_notify(&k, t0).await.unwrap());

        ledger.record(&record("FOO", 12.0, t0)).await.unwrap();

        // Suppressed for the whole buffer, eligible exactly at its edge.
        assert!(!ledger.should_notify(&k, t0).await.unwrap());
        assert!(!ledger.should_notify(&k, t0 + 20 * 60).await.unwrap());
        assert!(!ledger.should_notify(&k, t0 + 30 * 60 - 1).await.unwrap());
        assert!(ledger.should_notify(&k, t0 + 30 * 60).await.unwrap());
        assert!(ledger.should_notify(&k, t0 + 31 * 60).await.unwrap());
    }

    #[tokio::test]
    async fn test_directions_are_independent() {
        let ledger = NotificationLedger::new(Arc::new(MemoryStore::default()), 30);
        let t0 = 1_700_000_000;

        ledger.record(&record("FOO", 12.0, t0)).await.unwrap();

        let down = NotificationKey::new("FOO", Direction::Down, "4h", -12.0);
        assert!(ledger.should_notify(&down, t0 + 60).await.unwrap());
    }

    #[tokio::test]
    async fn test_new_bucket_renotifies_immediately() {
        let ledger = NotificationLedger::new(Arc::new(MemoryStore::default()), 60);
        let t0 = 1_700_000_000;

        ledger.record(&record("FOO", 12.0, t0)).await.unwrap();

        // Same asset escalating into a new bucket is a fresh key.
        assert!(!ledger.should_notify(&key("FOO", 13.0), t0 + 60).await.unwrap());
        assert!(ledger.should_notify(&key("FOO", 18.0), t0 + 60).await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_store_roundtrip() {
        let temp = NamedTempFile::new().unwrap();
        let store = SqliteStore::open(temp.path()).unwrap();

        assert!(store.last_notified(&key("FOO", 12.0)).await.unwrap().is_none());

        store.put(&record("FOO", 12.0, 1_700_000_000)).await.unwrap();
        assert_eq!(
            store.last_notified(&key("FOO", 12.0)).await.unwrap(),
            Some(1_700_000_000)
        );

        // Upsert supersedes the old row rather than duplicating it.
        store.put(&record("FOO", 12.0, 1_700_009_000)).await.unwrap();
        assert_eq!(
            store.last_notified(&key("FOO", 12.0)).await.unwrap(),
            Some(1_700_009_000)
        );
    }

    #[tokio::test]
    async fn test_sqlite_store_survives_reopen() {
        let temp = NamedTempFile::new().unwrap();

        {
            let store = SqliteStore::open(temp.path()).unwrap();
            store.put(&record("FOO", 12.0, 1_700_000_000)).await.unwrap();
        }

        // Re-opening runs schema init again; history must be intact.
        let reopened = SqliteStore::open(temp.path()).unwrap();
        assert_eq!(
            reopened.last_notified(&key("FOO", 12.0)).await.unwrap(),
            Some(1_700_000_000)
        );
    }

    #[tokio::test]
    async fn test_suppression_preserved_across_restart() {
        let temp = NamedTempFile::new().unwrap();
        let t0 = 1_700_000_000;

        {
            let store: Arc<dyn NotificationStore> = Arc::new(SqliteStore::open(temp.path()).unwrap());
            let ledger = NotificationLedger::new(store, 60);
            ledger.record(&record("FOO", 12.0, t0)).await.unwrap();
        }

        let store: Arc<dyn NotificationStore> = Arc::new(SqliteStore::open(temp.path()).unwrap());
        let ledger = NotificationLedger::new(store, 60);

        // Same behavior as if the process had never restarted.
        assert!(!ledger.should_notify(&key("FOO", 12.0), t0 + 30 * 60).await.unwrap());
        assert!(ledger.should_notify(&key("FOO", 12.0), t0 + 60 * 60).await.unwrap());
    }
}
