//! SQLite-backed snapshot storage with zstd-compressed payloads

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::SnapshotStore;

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            -- One row per snapshot key; the payload is zstd compressed JSON
            CREATE TABLE snapshots (
                key TEXT PRIMARY KEY,
                payload BLOB NOT NULL,
                raw_size INTEGER NOT NULL,
                saved_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        ),
    ])
}

/// Snapshot storage in a SQLite file, shared by every tab that opens it
pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
    key: String,
}

impl SqliteSnapshotStore {
    /// Open (or create) the database at `db_path`, storing under `key`
    pub fn new(db_path: impl AsRef<Path>, key: impl Into<String>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        Self::with_connection(conn, key)
    }

    /// Open a private in-memory database
    pub fn in_memory(key: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn, key)
    }

    fn with_connection(mut conn: Connection, key: impl Into<String>) -> Result<Self> {
        // WAL lets other tabs read while the master writes
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
            key: key.into(),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("snapshot database lock poisoned"))
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        let conn = self.conn()?;
        let payload: Option<Vec<u8>> = conn
            .query_row(
                "SELECT payload FROM snapshots WHERE key = ?",
                [&self.key],
                |row| row.get(0),
            )
            .optional()?;

        payload
            .map(|data| zstd::decode_all(data.as_slice()).context("Failed to decompress snapshot"))
            .transpose()
    }

    fn save(&self, bytes: &[u8]) -> Result<()> {
        // Level 3 = good balance of speed vs compression
        let compressed = zstd::encode_all(bytes, 3).context("Failed to compress snapshot")?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO snapshots (key, payload, raw_size, saved_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                raw_size = excluded.raw_size,
                saved_at = excluded.saved_at",
            params![self.key, compressed, bytes.len() as i64],
        )
        .context("Failed to write snapshot")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM snapshots WHERE key = ?", [&self.key])?;
        Ok(())
    }
}
