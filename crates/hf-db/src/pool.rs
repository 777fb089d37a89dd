//! Warehouse connection pool
//!
//! Owns the pooled tokio-postgres connections. Capacity equals the configured
//! thread count; acquisition is non-blocking and fails with
//! `ConnectionExhausted` when every connection is leased. Establishment
//! failures are retried per the configured retry budget; query failures are
//! never retried because a partially-applied statement cannot be safely
//! re-sent.

use crate::error::{DbError, DbResult};
use hf_core::config::{ConnectionConfig, SslMode};
use hf_core::sql_utils::quote_ident;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};

/// Pool of warehouse connections
pub struct ConnectionPool {
    config: ConnectionConfig,
    capacity: usize,
    permits: Arc<Semaphore>,
    idle: Arc<Mutex<Vec<PooledClient>>>,
}

/// An established connection plus the background task driving its socket
struct PooledClient {
    client: Client,
    driver: JoinHandle<()>,
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

impl ConnectionPool {
    /// Create a pool sized to `config.threads` (minimum one)
    pub fn new(config: ConnectionConfig) -> Self {
        let capacity = config.threads.max(1);
        Self {
            config,
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
            idle: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
        }
    }

    /// Pool capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Connection configuration the pool was built with
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Lease a connection.
    ///
    /// Reuses an idle connection whose socket is still alive, otherwise
    /// establishes a new one under the retry policy. The returned handle
    /// gives the connection back to the pool when dropped, on every exit
    /// path.
    pub async fn acquire(&self) -> DbResult<ConnectionHandle> {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| DbError::ConnectionExhausted {
                capacity: self.capacity,
            })?;

        let pooled = match self.take_idle() {
            Some(pooled) => pooled,
            None => self.connect_with_retries().await?,
        };

        Ok(ConnectionHandle {
            inner: Some(pooled),
            idle: Arc::clone(&self.idle),
            _permit: permit,
        })
    }

    /// Health check: lease one connection, run the debug query, release it
    pub async fn test_connection(&self) -> DbResult<()> {
        let handle = self.acquire().await?;
        handle.execute("select 1 as id").await?;
        Ok(())
    }

    /// Pop idle connections until one with a live socket turns up
    fn take_idle(&self) -> Option<PooledClient> {
        let mut idle = match self.idle.lock() {
            Ok(idle) => idle,
            Err(poisoned) => poisoned.into_inner(),
        };
        while let Some(pooled) = idle.pop() {
            if pooled.client.is_closed() {
                log::debug!("discarding dead idle connection to {}", self.config.host);
                continue;
            }
            return Some(pooled);
        }
        None
    }

    async fn connect_with_retries(&self) -> DbResult<PooledClient> {
        let attempts = self.config.retries + 1;
        retry_connect(attempts, &self.config.host, || self.connect_once()).await
    }

    async fn connect_once(&self) -> DbResult<PooledClient> {
        if self.config.sslmode == SslMode::Require {
            return Err(DbError::Unsupported {
                feature: "sslmode=require (this build carries no TLS connector)".to_string(),
            });
        }

        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.config.host)
            .port(self.config.port)
            .user(&self.config.user)
            .password(&self.config.password)
            .dbname(&self.config.database)
            .application_name(&self.config.application_name);

        let (client, connection) = tokio::time::timeout(timeout, pg.connect(NoTls))
            .await
            .map_err(|_| DbError::ConnectTimeout {
                host: self.config.host.clone(),
                timeout_secs: self.config.connect_timeout_secs,
            })?
            .map_err(|e| DbError::ConnectionFailed {
                host: self.config.host.clone(),
                message: e.to_string(),
            })?;

        let host = self.config.host.clone();
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::warn!("connection to {} closed: {}", host, e);
            }
        });

        let pooled = PooledClient { client, driver };
        self.apply_session_settings(&pooled.client).await?;
        log::debug!(
            "established connection to {}:{} as {}",
            self.config.host,
            self.config.port,
            self.config.user
        );
        Ok(pooled)
    }

    /// Session-level settings applied once per established connection
    async fn apply_session_settings(&self, client: &Client) -> DbResult<()> {
        if let Some(role) = &self.config.role {
            let sql = format!("SET ROLE {}", quote_ident(role));
            client
                .batch_execute(&sql)
                .await
                .map_err(|e| DbError::execution(&sql, &e))?;
        }
        if let Some(search_path) = &self.config.search_path {
            let quoted: Vec<String> = search_path
                .split(',')
                .map(|schema| quote_ident(schema.trim()))
                .collect();
            let sql = format!("SET search_path = {}", quoted.join(", "));
            client
                .batch_execute(&sql)
                .await
                .map_err(|e| DbError::execution(&sql, &e))?;
        }
        Ok(())
    }
}

/// Retry connection establishment up to `attempts` total tries.
///
/// Only establishment goes through here; the last failure is surfaced
/// unchanged so a timeout stays a `ConnectTimeout`.
async fn retry_connect<T, F, Fut>(attempts: usize, host: &str, mut connect: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let attempts = attempts.max(1);
    let mut last = None;
    for attempt in 1..=attempts {
        match connect().await {
            Ok(conn) => {
                if attempt > 1 {
                    log::info!("connected to {} on attempt {}/{}", host, attempt, attempts);
                }
                return Ok(conn);
            }
            Err(err) => {
                log::warn!(
                    "connection attempt {}/{} to {} failed: {}",
                    attempt,
                    attempts,
                    host,
                    err
                );
                last = Some(err);
            }
        }
    }
    // attempts >= 1, so at least one error was recorded
    Err(last.unwrap_or(DbError::ConnectionFailed {
        host: host.to_string(),
        message: "no connection attempts were made".to_string(),
    }))
}

/// A leased pooled connection.
///
/// Owned by exactly one in-flight operation; dropping it returns the
/// connection to the pool (or discards it when the socket has died).
pub struct ConnectionHandle {
    inner: Option<PooledClient>,
    idle: Arc<Mutex<Vec<PooledClient>>>,
    _permit: OwnedSemaphorePermit,
}

impl ConnectionHandle {
    fn client(&self) -> &Client {
        // inner is only vacated in Drop
        &self
            .inner
            .as_ref()
            .expect("connection present until drop")
            .client
    }

    /// Borrow the underlying driver client for typed catalog queries
    pub(crate) fn pg_client(&self) -> &Client {
        self.client()
    }

    /// Execute one statement, returning rows affected
    pub async fn execute(&self, sql: &str) -> DbResult<u64> {
        log::debug!("executing: {}", sql);
        self.client()
            .execute(sql, &[])
            .await
            .map_err(|e| DbError::execution(sql, &e))
    }

    /// Execute a statement with no useful row count (BEGIN, SET, ...)
    pub async fn batch_execute(&self, sql: &str) -> DbResult<()> {
        log::debug!("executing: {}", sql);
        self.client()
            .batch_execute(sql)
            .await
            .map_err(|e| DbError::execution(sql, &e))
    }

    /// Open an explicit transaction
    pub async fn begin(&self) -> DbResult<()> {
        self.batch_execute("BEGIN").await
    }

    /// Commit the open transaction
    pub async fn commit(&self) -> DbResult<()> {
        self.batch_execute("COMMIT").await
    }

    /// Roll back the open transaction
    pub async fn rollback(&self) -> DbResult<()> {
        self.batch_execute("ROLLBACK").await
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(pooled) = self.inner.take() {
            if pooled.client.is_closed() {
                log::debug!("dropping dead connection instead of re-pooling it");
                return;
            }
            let mut idle = match self.idle.lock() {
                Ok(idle) => idle,
                Err(poisoned) => poisoned.into_inner(),
            };
            idle.push(pooled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fail(host: &str) -> DbError {
        DbError::ConnectTimeout {
            host: host.to_string(),
            timeout_secs: 10,
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_two_failures() {
        let calls = Cell::new(0usize);
        let result = retry_connect(3, "wh", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(fail("wh"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_no_retries_fails_immediately() {
        let calls = Cell::new(0usize);
        let result: DbResult<()> = retry_connect(1, "wh", || {
            calls.set(calls.get() + 1);
            async { Err(fail("wh")) }
        })
        .await;
        assert!(matches!(result, Err(DbError::ConnectTimeout { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_last_error() {
        let calls = Cell::new(0usize);
        let result: DbResult<()> = retry_connect(2, "wh", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n == 1 {
                    Err(fail("wh"))
                } else {
                    Err(DbError::ConnectionFailed {
                        host: "wh".to_string(),
                        message: "refused".to_string(),
                    })
                }
            }
        })
        .await;
        assert!(matches!(result, Err(DbError::ConnectionFailed { .. })));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_first_success_stops_retrying() {
        let calls = Cell::new(0usize);
        let result = retry_connect(3, "wh", || {
            calls.set(calls.get() + 1);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_pool_capacity_has_floor_of_one() {
        let config = ConnectionConfig {
            host: "wh".to_string(),
            port: 80,
            user: "u".to_string(),
            password: "p".to_string(),
            database: "d".to_string(),
            schema: String::new(),
            role: None,
            search_path: None,
            threads: 0,
            connect_timeout_secs: 10,
            sslmode: SslMode::Disable,
            application_name: "holoflow".to_string(),
            retries: 1,
        };
        let pool = ConnectionPool::new(config);
        assert_eq!(pool.capacity(), 1);
    }
}
