//! Cache Layer (C6): fingerprint-keyed Redis cache with adaptive TTL,
//! bounded retry, and namespaced scan-and-delete.
//!
//! A `deadpool_redis::Pool` is built once at construction and a connection
//! is checked out per operation. Every operation is wrapped by a
//! [`CircuitBreaker`] and a bounded retry; on exhaustion the caller
//! degrades to a cache miss and serves from live computation rather than
//! erroring.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use lix_core::{Fingerprint, LixError, Result};
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::config::CacheConfig;

/// Bounded retry attempts for a single cache operation.
const DEFAULT_RETRIES: u32 = 2;
/// Per-attempt socket timeout.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Size class, used only to pick a TTL, mirroring [`lix_core::SizeClass`]
/// without taking a dependency cycle back through it for a one-method enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    Small,
    Medium,
    Large,
}

pub struct CacheLayer {
    pool: Pool,
    breaker: CircuitBreaker,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheLayer {
    pub fn connect(config: &CacheConfig) -> Result<Self> {
        let pool_config = PoolConfig::from_url(config.redis_url());
        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| LixError::DependencyUnavailable(format!("redis pool init failed: {e}")))?;

        Ok(Self {
            pool,
            breaker: CircuitBreaker::new("cache", CircuitBreakerConfig::default()),
            config: config.clone(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// TTL in seconds for a given size class.
    pub fn ttl_for(&self, class: TtlClass) -> u64 {
        match class {
            TtlClass::Small => self.config.ttl_small,
            TtlClass::Medium => self.config.ttl_default,
            TtlClass::Large => self.config.ttl_large,
        }
    }

    /// Cache key for an analysis fingerprint.
    fn analysis_key(fp: &Fingerprint) -> String {
        format!("lix:analysis:{fp}")
    }

    /// Get a cached, deserialized value by analysis fingerprint. Any
    /// dependency failure degrades silently to `Ok(None)` (a cache miss),
    ///
    pub async fn get<T: DeserializeOwned>(&self, fp: &Fingerprint) -> Option<T> {
        let key = Self::analysis_key(fp);
        match self.get_raw(&key).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(value) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    Some(value)
                }
                Err(e) => {
                    warn!(key, error = %e, "cache entry failed to deserialize, treating as miss");
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    None
                }
            },
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                warn!(key, error = %e, "cache get degraded to miss");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Set a cached value under its analysis fingerprint with the TTL for
    /// `class`. Idempotent: setting the same key twice refreshes the TTL.
    pub async fn set<T: Serialize + Sync>(&self, fp: &Fingerprint, value: &T, class: TtlClass) -> Result<()> {
        let key = Self::analysis_key(fp);
        let ttl = self.ttl_for(class);
        let json = serde_json::to_string(value).map_err(LixError::Serialization)?;
        self.set_raw(&key, &json, ttl).await
    }

    /// Store a transient task/batch-job status record under a namespaced
    /// key (`task_status:<id>` or `batch_job:<id>`).
    pub async fn set_status<T: Serialize + Sync>(&self, namespace: &str, id: &str, value: &T, ttl_secs: u64) -> Result<()> {
        let key = format!("lix:{namespace}:{id}");
        let json = serde_json::to_string(value).map_err(LixError::Serialization)?;
        self.set_raw(&key, &json, ttl_secs).await
    }

    pub async fn get_status<T: DeserializeOwned>(&self, namespace: &str, id: &str) -> Option<T> {
        let key = format!("lix:{namespace}:{id}");
        match self.get_raw(&key).await {
            Ok(Some(json)) => serde_json::from_str(&json).ok(),
            _ => None,
        }
    }

    pub async fn delete(&self, fp: &Fingerprint) -> Result<()> {
        let key = Self::analysis_key(fp);
        self.delete_raw(&key).await
    }

    /// Scan-and-delete every key under a namespace prefix.
    pub async fn delete_namespace(&self, namespace: &str) -> Result<u64> {
        let pattern = format!("lix:{namespace}:*");
        let pool = self.pool.clone();
        let deleted = self
            .breaker
            .call(|| async move {
                let mut conn = pool
                    .get()
                    .await
                    .map_err(|e| LixError::DependencyUnavailable(format!("redis pool: {e}")))?;
                let keys: Vec<String> = redis::cmd("KEYS")
                    .arg(&pattern)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| LixError::DependencyUnavailable(format!("redis KEYS: {e}")))?;
                if keys.is_empty() {
                    return Ok(0);
                }
                let count = keys.len() as u64;
                conn.del::<_, ()>(&keys)
                    .await
                    .map_err(|e| LixError::DependencyUnavailable(format!("redis DEL: {e}")))?;
                Ok(count)
            })
            .await?;
        Ok(deleted)
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        with_retry(DEFAULT_RETRIES, || self.get_raw_once(key)).await
    }

    async fn get_raw_once(&self, key: &str) -> Result<Option<String>> {
        let pool = self.pool.clone();
        let key = key.to_string();
        self.breaker
            .call(|| async move {
                let mut conn = pool
                    .get()
                    .await
                    .map_err(|e| LixError::DependencyUnavailable(format!("redis pool: {e}")))?;
                tokio::time::timeout(OPERATION_TIMEOUT, conn.get::<_, Option<String>>(&key))
                    .await
                    .map_err(|_| LixError::Transient("redis GET timed out".into()))?
                    .map_err(|e| LixError::DependencyUnavailable(format!("redis GET: {e}")))
            })
            .await
    }

    async fn set_raw(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        with_retry(DEFAULT_RETRIES, || self.set_raw_once(key, value, ttl_secs)).await
    }

    async fn set_raw_once(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let pool = self.pool.clone();
        let key = key.to_string();
        let value = value.to_string();
        self.breaker
            .call(|| async move {
                let mut conn = pool
                    .get()
                    .await
                    .map_err(|e| LixError::DependencyUnavailable(format!("redis pool: {e}")))?;
                tokio::time::timeout(OPERATION_TIMEOUT, conn.set_ex::<_, _, ()>(&key, &value, ttl_secs))
                    .await
                    .map_err(|_| LixError::Transient("redis SETEX timed out".into()))?
                    .map_err(|e| LixError::DependencyUnavailable(format!("redis SETEX: {e}")))
            })
            .await
    }

    async fn delete_raw(&self, key: &str) -> Result<()> {
        with_retry(DEFAULT_RETRIES, || self.delete_raw_once(key)).await
    }

    async fn delete_raw_once(&self, key: &str) -> Result<()> {
        let pool = self.pool.clone();
        let key = key.to_string();
        self.breaker
            .call(|| async move {
                let mut conn = pool
                    .get()
                    .await
                    .map_err(|e| LixError::DependencyUnavailable(format!("redis pool: {e}")))?;
                conn.del::<_, ()>(&key)
                    .await
                    .map_err(|e| LixError::DependencyUnavailable(format!("redis DEL: {e}")))
            })
            .await
    }

    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        if hits + misses == 0.0 {
            return 0.0;
        }
        hits / (hits + misses)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Lightweight liveness probe for the health endpoint: a PING through
    /// the pool, independent of the hit/miss-tracked analysis path.
    pub async fn ping(&self) -> bool {
        let Ok(mut conn) = self.pool.get().await else { return false };
        redis::cmd("PING").query_async::<String>(&mut conn).await.is_ok()
    }
}

/// Retry `op` up to `attempts` additional times on a retryable error,
/// returning the first success or the last failure.
async fn with_retry<T, F, Fut>(attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                debug!(attempt, error = %e, "retrying cache operation");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| LixError::Transient("cache operation exhausted retries".into())))
}

/// Thread-safe handle shared across axum handlers.
pub type SharedCache = Arc<CacheLayer>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_selection_matches_size_class() {
        let cache = CacheConfig::default();
        assert_eq!(cache.ttl_small, 7200);
        assert_eq!(cache.ttl_default, 3600);
        assert_eq!(cache.ttl_large, 1800);
    }

    #[test]
    fn hit_ratio_is_zero_with_no_traffic() {
        // Constructed directly to avoid needing a live Redis connection.
        let config = CacheConfig::default();
        let pool = PoolConfig::from_url(config.redis_url()).create_pool(Some(Runtime::Tokio1)).unwrap();
        let layer = CacheLayer {
            pool,
            breaker: CircuitBreaker::new("cache", CircuitBreakerConfig::default()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        };
        assert_eq!(layer.hit_ratio(), 0.0);
        layer.hits.fetch_add(3, Ordering::Relaxed);
        layer.misses.fetch_add(1, Ordering::Relaxed);
        assert!((layer.hit_ratio() - 0.75).abs() < 1e-9);
    }
}
