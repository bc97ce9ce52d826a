//! Redis-backed counter store shared across processes.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use tracing::{error, info};

use crate::domain::repositories::CounterStore;
use crate::error::AppError;

/// `INCR` and set the expiry only on the first hit, atomically server-side.
const INCREMENT_SCRIPT: &str = r"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return current
";

/// Counter store using Redis native increment and expiry.
///
/// Every round trip is bounded by `timeout`; a slow server surfaces as
/// [`AppError::Timeout`] rather than stalling the request.
pub struct RedisCounterStore {
    client: ConnectionManager,
    script: Script,
    timeout: Duration,
}

impl RedisCounterStore {
    /// Connects and verifies the server with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Configuration`] if Redis cannot be reached.
    pub async fn connect(redis_url: &str, timeout: Duration) -> Result<Self, AppError> {
        info!("Connecting counter store to Redis at {}", redis_url);

        let client = Client::open(redis_url)
            .map_err(|e| AppError::Configuration(format!("invalid REDIS_URL: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Configuration(format!("failed to connect to Redis: {e}")))?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| AppError::Configuration(format!("Redis PING failed: {e}")))?;

        Ok(Self {
            client: manager,
            script: Script::new(INCREMENT_SCRIPT),
            timeout,
        })
    }
}

/// Runs one Redis round trip under `timeout`. Elapsed time maps to
/// [`AppError::Timeout`]; a Redis error maps to [`AppError::Internal`].
async fn bounded<T, F>(timeout: Duration, operation: &'static str, fut: F) -> Result<T, AppError>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            error!("Redis counter {} failed: {}", operation, e);
            Err(AppError::internal("Counter store error"))
        }
        Err(_) => Err(AppError::Timeout { operation }),
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, AppError> {
        let mut conn = self.client.clone();
        let window_ms = (window.as_millis() as u64).max(1);
        let mut invocation = self.script.key(key);
        invocation.arg(window_ms);

        bounded(
            self.timeout,
            "counter increment",
            invocation.invoke_async::<u64>(&mut conn),
        )
        .await
    }

    async fn get(&self, key: &str) -> Result<u64, AppError> {
        let mut conn = self.client.clone();
        let count = bounded(
            self.timeout,
            "counter read",
            conn.get::<_, Option<u64>>(key),
        )
        .await?;
        Ok(count.unwrap_or(0))
    }

    async fn reset(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.client.clone();
        bounded(self.timeout, "counter reset", conn.del::<_, ()>(key)).await
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_slow_round_trip_is_timeout() {
        let result: Result<u64, AppError> = bounded(
            Duration::from_millis(10),
            "counter increment",
            std::future::pending::<redis::RedisResult<u64>>(),
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            AppError::Timeout {
                operation: "counter increment"
            }
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_redis_error_is_internal() {
        let failure = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));

        let result: Result<u64, AppError> = bounded(
            Duration::from_secs(1),
            "counter read",
            std::future::ready(Err(failure)),
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, AppError::Internal { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_fast_round_trip_passes_value_through() {
        let result = bounded(
            Duration::from_secs(1),
            "counter read",
            std::future::ready(Ok::<u64, redis::RedisError>(7)),
        )
        .await;

        assert_eq!(result.unwrap(), 7);
    }

    /// Needs a reachable Redis (`REDIS_URL`, default `redis://127.0.0.1:6379`).
    #[tokio::test]
    #[ignore]
    async fn test_live_increment_expires_with_window() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let store = RedisCounterStore::connect(&url, Duration::from_secs(1))
            .await
            .unwrap();
        let key = format!("rate:test:{}", chrono::Utc::now().timestamp_millis());
        let window = Duration::from_millis(200);

        assert_eq!(store.increment(&key, window).await.unwrap(), 1);
        assert_eq!(store.increment(&key, window).await.unwrap(), 2);
        assert_eq!(store.get(&key).await.unwrap(), 2);

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(store.get(&key).await.unwrap(), 0);
        assert_eq!(store.increment(&key, window).await.unwrap(), 1);

        store.reset(&key).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), 0);
    }
}
