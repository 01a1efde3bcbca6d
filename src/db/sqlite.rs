// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! SQLite-backed key-value store

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{KeyChange, KeyClaims, KeyValueStore};
use crate::config::DatabaseConfig;
use crate::error::{Result, TrackerError};

/// Database manager
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    changes: broadcast::Sender<KeyChange>,
    claims: KeyClaims,
}

impl Database {
    /// Open or create database
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TrackerError::Storage(e.to_string()))?;
        }

        let conn = Connection::open(&config.path)?;

        // Every counter write must survive an abrupt stop
        let synchronous = if config.synchronous_full { "FULL" } else { "NORMAL" };
        conn.execute_batch(&format!(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = {synchronous};
            PRAGMA temp_store = MEMORY;
            "#
        ))?;

        let db = Self::with_connection(conn)?;
        info!("Database opened at {:?}", config.path);
        Ok(db)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let (changes, _) = broadcast::channel(256);
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            changes,
            claims: KeyClaims::new(),
        };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        Ok(())
    }

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let conn = self.conn.lock();

        let key_count: i64 = conn.query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))?;

        let size_bytes: i64 = conn
            .query_row(
                "SELECT page_count * page_size as size FROM pragma_page_count(), pragma_page_size()",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        Ok(DatabaseStats {
            key_count: key_count as usize,
            size_bytes: size_bytes as u64,
        })
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();

        let result: std::result::Result<String, _> = conn.query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, value, Utc::now().to_rfc3339()],
            )?;
        }
        debug!(key, value, "stored");

        let _ = self.changes.send(KeyChange {
            key: key.to_string(),
            value: Some(value.to_string()),
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        {
            let conn = self.conn.lock();
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        }
        let _ = self.changes.send(KeyChange { key: key.to_string(), value: None });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<KeyChange> {
        self.changes.subscribe()
    }

    fn claims(&self) -> &KeyClaims {
        &self.claims
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub key_count: usize,
    pub size_bytes: u64,
}
