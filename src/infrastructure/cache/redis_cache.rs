//! Redis-backed cache tier (L2).

use std::time::Duration;

use super::service::{CacheEntry, CacheError, CacheResult, CacheService};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::{debug, error, info, warn};

/// Shared cache tier in front of persistence.
///
/// Entries are stored as JSON under `link:{short_code}` with a millisecond
/// expiry. Uses `ConnectionManager` for connection reuse. All operations are
/// fail-open: errors are logged but don't propagate to callers.
pub struct RedisCache {
    client: ConnectionManager,
    default_ttl: Duration,
    key_prefix: String,
}

impl RedisCache {
    /// Connects to Redis, validates the connection with a PING, and configures the default TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ConnectionError`] if the URL is invalid, the connection cannot
    /// be established, or the PING health check fails.
    pub async fn connect(redis_url: &str, default_ttl: Duration) -> CacheResult<Self> {
        info!("Connecting to Redis cache at {}", redis_url);

        let client = Client::open(redis_url).map_err(|e| {
            CacheError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| CacheError::ConnectionError(format!("Redis PING failed: {}", e)))?;

        info!("✓ Connected to Redis cache");

        Ok(Self {
            client: manager,
            default_ttl,
            key_prefix: "link:".to_string(),
        })
    }

    fn build_key(&self, short_code: &str) -> String {
        format!("{}{}", self.key_prefix, short_code)
    }

    /// Collects every key under this cache's prefix with cursor-based SCAN.
    async fn scan_keys(&self) -> Result<Vec<String>, redis::RedisError> {
        let mut conn = self.client.clone();
        let pattern = format!("{}*", self.key_prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys)
    }
}

#[async_trait]
impl CacheService for RedisCache {
    fn tier(&self) -> &'static str {
        "l2"
    }

    fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    async fn get(&self, short_code: &str) -> CacheResult<Option<CacheEntry>> {
        let key = self.build_key(short_code);
        let mut conn = self.client.clone();

        match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) => {
                    debug!("Cache HIT (l2): {} -> {}", short_code, entry.target);
                    Ok(Some(entry))
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry for {}: {}", short_code, e);
                    Ok(None)
                }
            },
            Ok(None) => {
                debug!("Cache MISS (l2): {}", short_code);
                Ok(None)
            }
            Err(e) => {
                error!("Redis GET error for {}: {}", short_code, e);
                Ok(None)
            }
        }
    }

    async fn put(&self, short_code: &str, entry: CacheEntry, ttl: Duration) -> CacheResult<()> {
        let key = self.build_key(short_code);
        let mut conn = self.client.clone();
        let ttl_ms = (ttl.as_millis() as u64).max(1);

        let payload = serde_json::to_string(&entry)
            .map_err(|e| CacheError::OperationError(format!("serialize entry: {}", e)))?;

        match redis::cmd("SET")
            .arg(&key)
            .arg(payload)
            .arg("PX")
            .arg(ttl_ms)
            .query_async::<()>(&mut conn)
            .await
        {
            Ok(()) => {
                debug!(
                    "Cache SET (l2): {} -> {} (TTL: {}ms)",
                    short_code, entry.target, ttl_ms
                );
                Ok(())
            }
            Err(e) => {
                warn!("Redis SET error for {}: {}", short_code, e);
                Ok(())
            }
        }
    }

    async fn invalidate(&self, short_code: &str) -> CacheResult<()> {
        let key = self.build_key(short_code);
        let mut conn = self.client.clone();

        match conn.del::<_, i32>(&key).await {
            Ok(deleted) => {
                if deleted > 0 {
                    debug!("Cache INVALIDATE (l2): {}", short_code);
                }
                Ok(())
            }
            Err(e) => {
                warn!("Redis DEL error for {}: {}", short_code, e);
                Ok(())
            }
        }
    }

    async fn clear(&self) -> CacheResult<()> {
        let keys = match self.scan_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Redis SCAN error during clear: {}", e);
                return Ok(());
            }
        };

        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.client.clone();
        for chunk in keys.chunks(500) {
            if let Err(e) = conn.del::<_, i32>(chunk.to_vec()).await {
                warn!("Redis DEL error during clear: {}", e);
            }
        }
        debug!("Cache CLEAR (l2): {} keys", keys.len());
        Ok(())
    }

    async fn size(&self) -> CacheResult<usize> {
        self.scan_keys()
            .await
            .map(|keys| keys.len())
            .map_err(|e| CacheError::OperationError(e.to_string()))
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }
}
