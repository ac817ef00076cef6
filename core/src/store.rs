//! Per-target persistence of validated endpoints.
//!
//! One SQLite database per target, named by the MD5 digest of the hidden
//! host so the roster line can change shape without orphaning history.
//! Rows older than a week are dropped on open; retrieval feeds known-good
//! addresses back into the sweep ahead of the configured blocks.

use std::net::Ipv4Addr;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use tracing::{debug, warn};

const ROW_TTL_SECS: i64 = 7 * 86_400;
const RECENT_LIMIT: i64 = 60;

pub struct EndpointStore {
    pool: SqlitePool,
}

impl EndpointStore {
    /// Opens (creating if needed) the database for `hidden_host` and
    /// prunes rows older than seven days.
    pub async fn open(data_dir: &Path, hidden_host: &str) -> Result<Self> {
        let digest = format!("{:x}", md5::compute(hidden_host));
        let db_path = data_dir.join(format!("{digest}.db"));

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("open endpoint store {}", db_path.display()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS endpoints (\
             tm INTEGER, score INTEGER, addr TEXT, front_host TEXT, cipher TEXT, \
             hidden_host TEXT DEFAULT '', path_prefix TEXT DEFAULT '', \
             priority INTEGER DEFAULT 0)",
        )
        .execute(&pool)
        .await
        .context("create endpoint schema")?;

        let cutoff = unix_now() - ROW_TTL_SECS;
        sqlx::query("DELETE FROM endpoints WHERE tm < ?")
            .bind(cutoff)
            .execute(&pool)
            .await
            .context("prune stale endpoints")?;

        debug!(host = hidden_host, path = %db_path.display(), "endpoint store ready");
        Ok(Self { pool })
    }

    /// Up to 60 distinct previously-validated addresses, oldest first.
    /// Unparseable rows are logged and skipped.
    pub async fn load_recent(&self) -> Vec<Ipv4Addr> {
        let rows = match sqlx::query("SELECT addr FROM endpoints GROUP BY addr ORDER BY tm LIMIT ?")
            .bind(RECENT_LIMIT)
            .fetch_all(&self.pool)
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "failed to read cached endpoints");
                return Vec::new();
            }
        };

        let mut addrs = Vec::new();
        for row in rows {
            let text: String = match row.try_get("addr") {
                Ok(text) => text,
                Err(err) => {
                    warn!(error = %err, "discarding undecodable cached row");
                    continue;
                }
            };
            match text.parse::<Ipv4Addr>() {
                Ok(addr) => {
                    debug!(%addr, "cached endpoint loaded");
                    addrs.push(addr);
                }
                Err(_) => warn!(addr = %text, "discarding unparseable cached address"),
            }
        }
        addrs
    }

    /// Records one validated endpoint. Failure is logged, never fatal: a
    /// broken cache must not cost a working endpoint.
    pub async fn append(&self, addr: Ipv4Addr, front_host: &str, latency_ms: u32, cipher_tag: &str) {
        let result = sqlx::query(
            "INSERT INTO endpoints (tm, score, addr, front_host, cipher) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(unix_now())
        .bind(latency_ms as i64)
        .bind(addr.to_string())
        .bind(front_host)
        .bind(cipher_tag)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => debug!(%addr, front_host, latency_ms, "endpoint persisted"),
            Err(err) => warn!(%addr, error = %err, "failed to persist endpoint"),
        }
    }

    /// Raw pool handle, for integration tests that need to shape rows.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
