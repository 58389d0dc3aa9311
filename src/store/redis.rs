//! Redis-backed [`KvStore`].

use std::future::Future;
use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use ::redis::{IntoConnectionInfo, RedisResult};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use super::KvStore;
use crate::error::{StoreError, StoreResult};

/// Redis client with a lazily opened, shared multiplexed connection.
///
/// Every command is bounded by `timeout`. A failed command drops the cached
/// connection so the next call reconnects.
pub struct RedisStore {
    client: ::redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    timeout: Duration,
}

impl RedisStore {
    /// Parses `url` and prepares a client. Does not connect.
    ///
    /// `token`, when given, overrides the password in the URL.
    pub fn open(url: &str, token: Option<&str>, timeout: Duration) -> StoreResult<Self> {
        let mut info = url.into_connection_info()?;
        if let Some(token) = token {
            info.redis.password = Some(token.to_string());
        }
        let client = ::redis::Client::open(info)?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            timeout,
        })
    }

    async fn connection(&self) -> StoreResult<MultiplexedConnection> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        debug!("Opening Redis connection");
        let conn = self.client.get_multiplexed_async_connection().await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn reset_connection(&self) {
        self.connection.lock().await.take();
    }

    /// Runs one command under the store timeout.
    async fn run<T, F, Fut>(&self, command: F) -> StoreResult<T>
    where
        F: FnOnce(MultiplexedConnection) -> Fut + Send,
        Fut: Future<Output = RedisResult<T>> + Send,
        T: Send,
    {
        let attempt = async {
            let conn = self.connection().await?;
            command(conn).await.map_err(StoreError::from)
        };
        match timeout(self.timeout, attempt).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                self.reset_connection().await;
                Err(err)
            }
            Err(_) => {
                self.reset_connection().await;
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.run(|mut conn| async move {
            let value: Option<String> = ::redis::cmd("GET").arg(key).query_async(&mut conn).await?;
            Ok::<_, ::redis::RedisError>(value)
        })
        .await
    }

    async fn set_px(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let ttl_ms = super::ttl_millis(ttl).max(1);
        self.run(|mut conn| async move {
            let _: () = ::redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("PX")
                .arg(ttl_ms)
                .query_async(&mut conn)
                .await?;
            Ok::<_, ::redis::RedisError>(())
        })
        .await
    }

    async fn del(&self, keys: &[String]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.run(|mut conn| async move {
            let removed: u64 = ::redis::cmd("DEL").arg(keys).query_async(&mut conn).await?;
            Ok::<_, ::redis::RedisError>(removed)
        })
        .await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.run(|mut conn| async move {
            let found: bool = ::redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
            Ok::<_, ::redis::RedisError>(found)
        })
        .await
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> StoreResult<(u64, Vec<String>)> {
        self.run(|mut conn| async move {
            let page: (u64, Vec<String>) = ::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(count)
                .query_async(&mut conn)
                .await?;
            Ok::<_, ::redis::RedisError>(page)
        })
        .await
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.run(|mut conn| async move {
            let count: i64 = ::redis::cmd("INCR").arg(key).query_async(&mut conn).await?;
            Ok::<_, ::redis::RedisError>(count)
        })
        .await
    }

    async fn pexpire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let ttl_ms = super::ttl_millis(ttl).max(1);
        self.run(|mut conn| async move {
            let applied: bool = ::redis::cmd("PEXPIRE")
                .arg(key)
                .arg(ttl_ms)
                .query_async(&mut conn)
                .await?;
            Ok::<_, ::redis::RedisError>(applied)
        })
        .await
    }

    async fn pttl(&self, key: &str) -> StoreResult<i64> {
        self.run(|mut conn| async move {
            let remaining: i64 = ::redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
            Ok::<_, ::redis::RedisError>(remaining)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_does_not_connect() {
        // Nothing listens on this port; opening must still succeed.
        let store = RedisStore::open("redis://127.0.0.1:1", Some("token"), Duration::from_millis(50));
        assert!(store.is_ok());
    }

    #[test]
    fn test_open_rejects_garbage() {
        assert!(RedisStore::open("::::", None, Duration::from_millis(50)).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_store_reports_error() {
        let store =
            RedisStore::open("redis://127.0.0.1:1", None, Duration::from_millis(200)).unwrap();
        assert!(store.get("anything").await.is_err());
    }
}
