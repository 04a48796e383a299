//! Integration verification probes
//!
//! Each probe exercises one backing service end to end (write, read back,
//! clean up) and reports the outcome instead of failing the request. Probes
//! run one after another, are bounded by [`PROBE_TIMEOUT`], and are never
//! retried.

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

/// Upper bound for a single probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// TTL of the cache probe key, in seconds
const CACHE_PROBE_TTL_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("read back mismatch: expected {expected:?}, got {actual:?}")]
    Mismatch {
        expected: String,
        actual: Option<String>,
    },

    #[error("unsupported queue connection: {0}")]
    UnsupportedQueue(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Outcome of one probe
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProbeResult {
    pub name: String,
    pub healthy: bool,

    /// `"ok"` or the error message
    pub status: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationReport {
    pub healthy: bool,
    pub checks: Vec<ProbeResult>,
}

impl IntegrationReport {
    pub fn new(checks: Vec<ProbeResult>) -> Self {
        IntegrationReport {
            healthy: checks.iter().all(|c| c.healthy),
            checks,
        }
    }
}

/// Runs one probe under the timeout and converts its error into a status
pub async fn probe<F>(name: &str, check: F) -> ProbeResult
where
    F: Future<Output = Result<(), ProbeError>>,
{
    let started = Instant::now();
    let outcome = match tokio::time::timeout(PROBE_TIMEOUT, check).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(PROBE_TIMEOUT)),
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => ProbeResult {
            name: name.to_string(),
            healthy: true,
            status: "ok".to_string(),
            duration_ms,
        },
        Err(e) => {
            tracing::warn!(probe = name, error = %e, "Integration probe failed");
            ProbeResult {
                name: name.to_string(),
                healthy: false,
                status: e.to_string(),
                duration_ms,
            }
        }
    }
}

fn expect_value(expected: &str, actual: Option<String>) -> Result<(), ProbeError> {
    if actual.as_deref() == Some(expected) {
        Ok(())
    } else {
        Err(ProbeError::Mismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Inserts, reads back and deletes a row in `integration_probes`
pub async fn check_database(pool: &PgPool) -> Result<(), ProbeError> {
    let key = format!("probe-{}", Uuid::new_v4());
    let value = Uuid::new_v4().to_string();

    sqlx::query("INSERT INTO integration_probes (key, value) VALUES ($1, $2)")
        .bind(&key)
        .bind(&value)
        .execute(pool)
        .await?;

    let stored: Option<String> =
        sqlx::query_scalar("SELECT value FROM integration_probes WHERE key = $1")
            .bind(&key)
            .fetch_optional(pool)
            .await?;

    sqlx::query("DELETE FROM integration_probes WHERE key = $1")
        .bind(&key)
        .execute(pool)
        .await?;

    expect_value(&value, stored)
}

/// SET with a TTL, GET, then DEL
pub async fn check_cache(client: &redis::Client) -> Result<(), ProbeError> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    let key = format!("backoffice:probe:{}", Uuid::new_v4());
    let value = Uuid::new_v4().to_string();

    let _: () = redis::cmd("SET")
        .arg(&key)
        .arg(&value)
        .arg("EX")
        .arg(CACHE_PROBE_TTL_SECS)
        .query_async(&mut conn)
        .await?;

    let stored: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;
    let _: i64 = redis::cmd("DEL").arg(&key).query_async(&mut conn).await?;

    expect_value(&value, stored)
}

/// Writes, reads back and removes a file under the storage root
pub async fn check_storage(root: &Path) -> Result<(), ProbeError> {
    tokio::fs::create_dir_all(root).await?;

    let path = root.join(format!(".integration-probe-{}", Uuid::new_v4()));
    let value = Uuid::new_v4().to_string();

    tokio::fs::write(&path, value.as_bytes()).await?;
    let stored = tokio::fs::read_to_string(&path).await;
    tokio::fs::remove_file(&path).await?;

    expect_value(&value, Some(stored?))
}

/// `sync` needs nothing; `redis` must answer PING
pub async fn check_queue(connection: &str, client: &redis::Client) -> Result<(), ProbeError> {
    match connection {
        "sync" => Ok(()),
        "redis" => {
            let mut conn = client.get_multiplexed_async_connection().await?;
            let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            expect_value("PONG", Some(pong))
        }
        other => Err(ProbeError::UnsupportedQueue(other.to_string())),
    }
}

/// Runs every probe in sequence
pub async fn run_all(
    pool: &PgPool,
    redis: &redis::Client,
    storage_root: &Path,
    queue_connection: &str,
) -> IntegrationReport {
    let checks = vec![
        probe("database", check_database(pool)).await,
        probe("cache", check_cache(redis)).await,
        probe("storage", check_storage(storage_root)).await,
        probe("queue", check_queue(queue_connection, redis)).await,
    ];

    IntegrationReport::new(checks)
}
