//! Store module for Contacts Import
//!
//! SQLite persistence for the state the CLI keeps between runs:
//! the contacts sync token, the OAuth refresh token and the local copy of
//! the contact list that incremental syncs are merged into.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

// Connection pooling
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::people::{Contact, SyncResult, SYNC_TOKEN_RETENTION_DAYS};

const SYNC_TOKEN_KEY: &str = "contacts_sync_token";
const REFRESH_TOKEN_KEY: &str = "oauth_refresh_token";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS sync_state (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        saved_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS contacts (
        resource_name TEXT PRIMARY KEY,
        position INTEGER NOT NULL,
        data TEXT NOT NULL
    );
"#;

/// New entries go after the existing ones; updates keep their position
const UPSERT_CONTACT: &str = r#"
    INSERT INTO contacts (resource_name, position, data)
    VALUES (?1, (SELECT COALESCE(MAX(position), -1) + 1 FROM contacts), ?2)
    ON CONFLICT(resource_name) DO UPDATE SET data = excluded.data
"#;

/// Store error types
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid timestamp for {key}: {value}")]
    InvalidTimestamp { key: String, value: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A persisted sync token and when it was issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSyncToken {
    pub token: String,
    pub saved_at: DateTime<Utc>,
}

impl StoredSyncToken {
    /// Whether the service has most likely dropped this token by `now`
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.saved_at >= Duration::days(SYNC_TOKEN_RETENTION_DAYS)
    }
}

/// Thread-safe SQLite store
#[derive(Clone)]
pub struct Store {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl Store {
    /// Open (or create) the store at `db_path`
    pub fn new(db_path: &Path) -> StoreResult<Self> {
        let manager = SqliteConnectionManager::file(db_path);

        let pool = Pool::builder()
            .max_size(4)
            .connection_timeout(std::time::Duration::from_secs(10))
            .build(manager)?;

        let conn = pool.get()?;
        conn.execute_batch(r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        "#)?;
        conn.execute_batch(SCHEMA)?;
        drop(conn);

        log::debug!("Store opened at {:?}", db_path);

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Create an in-memory store (for testing)
    ///
    /// Every pooled connection to `:memory:` is a separate database, so the
    /// pool is limited to a single connection.
    pub fn in_memory() -> StoreResult<Self> {
        let manager = SqliteConnectionManager::memory();

        let pool = Pool::builder()
            .max_size(1)
            .build(manager)?;

        let conn = pool.get()?;
        conn.execute_batch(SCHEMA)?;
        drop(conn);

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    fn get_conn(&self) -> StoreResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    // =========================================================================
    // SYNC TOKEN
    // =========================================================================

    pub fn load_sync_token(&self) -> StoreResult<Option<StoredSyncToken>> {
        Ok(self.get(SYNC_TOKEN_KEY)?.map(|(token, saved_at)| StoredSyncToken { token, saved_at }))
    }

    pub fn save_sync_token(&self, token: &str, saved_at: DateTime<Utc>) -> StoreResult<()> {
        self.put(SYNC_TOKEN_KEY, token, saved_at)
    }

    pub fn clear_sync_token(&self) -> StoreResult<bool> {
        self.delete(SYNC_TOKEN_KEY)
    }

    // =========================================================================
    // CONTACTS
    // =========================================================================

    /// Record the outcome of a sync in one transaction.
    ///
    /// A full retrieval replaces the stored contacts. An incremental one is
    /// merged: changed entries are upserted and deleted ones removed. The
    /// sync token is saved with `now`, or cleared when none was returned.
    pub fn apply_sync(&self, result: &SyncResult, now: DateTime<Utc>) -> StoreResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        if !result.used_incremental_sync {
            tx.execute("DELETE FROM contacts", [])?;
        }

        for contact in &result.contacts {
            let Some(resource_name) = contact.resource_name.as_deref() else {
                log::warn!("Skipping contact without resource name");
                continue;
            };

            if contact.deleted {
                tx.execute(
                    "DELETE FROM contacts WHERE resource_name = ?1",
                    params![resource_name],
                )?;
            } else {
                tx.execute(
                    UPSERT_CONTACT,
                    params![resource_name, serde_json::to_string(contact)?],
                )?;
            }
        }

        match &result.next_sync_token {
            Some(token) => put_state(&tx, SYNC_TOKEN_KEY, token, now)?,
            None => {
                delete_state(&tx, SYNC_TOKEN_KEY)?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Stored contacts in the order they were first received
    pub fn load_contacts(&self) -> StoreResult<Vec<Contact>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT data FROM contacts ORDER BY position")?;

        let contacts = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|data| -> StoreResult<Contact> { Ok(serde_json::from_str(&data?)?) })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(contacts)
    }

    pub fn find_contact(&self, resource_name: &str) -> StoreResult<Option<Contact>> {
        let conn = self.get_conn()?;

        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM contacts WHERE resource_name = ?1",
                params![resource_name],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    pub fn clear_contacts(&self) -> StoreResult<usize> {
        let conn = self.get_conn()?;
        Ok(conn.execute("DELETE FROM contacts", [])?)
    }

    // =========================================================================
    // OAUTH REFRESH TOKEN
    // =========================================================================

    pub fn load_refresh_token(&self) -> StoreResult<Option<String>> {
        Ok(self.get(REFRESH_TOKEN_KEY)?.map(|(token, _)| token))
    }

    pub fn save_refresh_token(&self, token: &str) -> StoreResult<()> {
        self.put(REFRESH_TOKEN_KEY, token, Utc::now())
    }

    pub fn clear_refresh_token(&self) -> StoreResult<bool> {
        self.delete(REFRESH_TOKEN_KEY)
    }

    // =========================================================================
    // KEY/VALUE
    // =========================================================================

    fn get(&self, key: &str) -> StoreResult<Option<(String, DateTime<Utc>)>> {
        let conn = self.get_conn()?;

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT value, saved_at FROM sync_state WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((value, saved_at)) = row else {
            return Ok(None);
        };

        let saved_at = DateTime::parse_from_rfc3339(&saved_at)
            .map_err(|_| StoreError::InvalidTimestamp {
                key: key.to_string(),
                value: saved_at.clone(),
            })?
            .with_timezone(&Utc);

        Ok(Some((value, saved_at)))
    }

    fn put(&self, key: &str, value: &str, saved_at: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.get_conn()?;
        put_state(&conn, key, value, saved_at)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        let conn = self.get_conn()?;
        delete_state(&conn, key)
    }
}

fn put_state(conn: &Connection, key: &str, value: &str, saved_at: DateTime<Utc>) -> StoreResult<()> {
    conn.execute(
        r#"
        INSERT INTO sync_state (key, value, saved_at) VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, saved_at = excluded.saved_at
        "#,
        params![key, value, saved_at.to_rfc3339()],
    )?;
    Ok(())
}

fn delete_state(conn: &Connection, key: &str) -> StoreResult<bool> {
    let deleted = conn.execute("DELETE FROM sync_state WHERE key = ?1", params![key])?;
    Ok(deleted > 0)
}
