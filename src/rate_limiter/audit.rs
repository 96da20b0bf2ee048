//! # Audit Store
//!
//! Optional SQLite persistence for limiter definitions and admission
//! decisions. Strictly write-only: nothing here is ever read back into live
//! counters. The tables exist for offline inspection, not recovery.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use tracing::debug;

use super::config::RateLimitConfig;

/// Write-only audit sink backed by SQLite.
///
/// Two tables:
///
/// - `rate_configs`: one row per configured limiter, upserted on
///   `configure` and on enable/disable.
/// - `request_log`: one row per admission decision.
///
/// All writes go through one connection behind a mutex. Throughput is not a
/// goal; attach a store only where the write amplification is acceptable.
pub struct AuditStore {
    conn: Mutex<Connection>,
}

impl AuditStore {
    /// Opens (and creates if needed) an audit database at `path`.
    pub fn open(path: impl AsRef<Path>) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS rate_configs (
                 name          TEXT PRIMARY KEY,
                 rate_per_sec  REAL NOT NULL,
                 burst         REAL NOT NULL,
                 strategy      TEXT NOT NULL,
                 scope         TEXT NOT NULL,
                 retry_after   REAL NOT NULL,
                 enabled       INTEGER NOT NULL,
                 priority      INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS request_log (
                 id            INTEGER PRIMARY KEY AUTOINCREMENT,
                 limit_name    TEXT NOT NULL,
                 scope_key     TEXT,
                 timestamp     TEXT NOT NULL DEFAULT (datetime('now')),
                 allowed       INTEGER NOT NULL,
                 wait_time_ms  REAL NOT NULL
             );",
        )
    }

    /// Upserts a limiter definition.
    pub fn record_config(&self, config: &RateLimitConfig) -> rusqlite::Result<()> {
        let conn = self.conn.lock().expect("audit store lock poisoned");
        conn.execute(
            "INSERT INTO rate_configs
                 (name, rate_per_sec, burst, strategy, scope, retry_after, enabled, priority)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(name) DO UPDATE SET
                 rate_per_sec = excluded.rate_per_sec,
                 burst        = excluded.burst,
                 strategy     = excluded.strategy,
                 scope        = excluded.scope,
                 retry_after  = excluded.retry_after,
                 enabled      = excluded.enabled,
                 priority     = excluded.priority",
            params![
                config.name,
                config.rate_per_sec,
                config.burst_capacity,
                config.strategy.as_str(),
                config.scope.as_str(),
                config.retry_after_seconds,
                config.enabled,
                config.priority,
            ],
        )?;
        debug!(name = %config.name, "limiter config persisted");
        Ok(())
    }

    /// Flips the persisted kill switch for a named limiter.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> rusqlite::Result<()> {
        let conn = self.conn.lock().expect("audit store lock poisoned");
        conn.execute(
            "UPDATE rate_configs SET enabled = ?2 WHERE name = ?1",
            params![name, enabled],
        )?;
        Ok(())
    }

    /// Appends one admission decision.
    pub fn log_request(
        &self,
        limit_name: &str,
        scope_key: Option<&str>,
        allowed: bool,
        wait_time_ms: f64,
    ) -> rusqlite::Result<()> {
        let conn = self.conn.lock().expect("audit store lock poisoned");
        conn.execute(
            "INSERT INTO request_log (limit_name, scope_key, allowed, wait_time_ms)
             VALUES (?1, ?2, ?3, ?4)",
            params![limit_name, scope_key, allowed, wait_time_ms],
        )?;
        Ok(())
    }

    #[cfg(test)]
    fn count(&self, table: &str) -> i64 {
        let conn = self.conn.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::config::{Scope, Strategy};

    #[test]
    fn records_and_upserts_configs() {
        let store = AuditStore::open_in_memory().unwrap();
        let config = RateLimitConfig::new("jupiter_api", 10.0)
            .with_strategy(Strategy::TokenBucket)
            .with_scope(Scope::Global);

        store.record_config(&config).unwrap();
        store.record_config(&config.clone().with_burst(40.0)).unwrap();

        assert_eq!(store.count("rate_configs"), 1);
    }

    #[test]
    fn logs_admission_decisions() {
        let store = AuditStore::open_in_memory().unwrap();
        store.log_request("jupiter_api", None, true, 0.0).unwrap();
        store
            .log_request("jupiter_api", Some("user-1"), false, 120.0)
            .unwrap();

        assert_eq!(store.count("request_log"), 2);
    }

    #[test]
    fn persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");

        let store = AuditStore::open(&path).unwrap();
        store.log_request("solana_rpc", None, true, 0.0).unwrap();
        drop(store);

        let reopened = AuditStore::open(&path).unwrap();
        assert_eq!(reopened.count("request_log"), 1);
    }
}
