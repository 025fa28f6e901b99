use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::config::CacheConfig;
use crate::error::Error;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

/// A string key/value cache with per-entry expiry. Nothing in the service
/// depends on a value being present; every lookup falls back to the
/// database.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error>;

    async fn delete(&self, key: &str) -> Result<(), Error>;

    /// Returns how many entries were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, Error>;
}

pub async fn connect(config: &CacheConfig) -> Result<Box<dyn Cache>, Error> {
    match &config.redis_url {
        Some(url) => Ok(Box::new(RedisCache::connect(url).await?)),
        None => {
            tracing::info!("REDIS_URL not set, using in-memory cache");
            Ok(Box::new(MemoryCache::new(10_000)))
        }
    }
}

/// Reads and decodes a cached value. Cache and decoding failures are logged
/// and reported as a miss.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    let raw = match cache.get(key).await {
        Ok(raw) => raw?,
        Err(err) => {
            warn!(key, error = %err, "cache read failed");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, error = %err, "discarding undecodable cache entry");
            None
        }
    }
}

pub async fn set_json<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl: Duration) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(key, error = %err, "could not encode cache entry");
            return;
        }
    };

    if let Err(err) = cache.set(key, &raw, ttl).await {
        warn!(key, error = %err, "cache write failed");
    }
}

pub async fn invalidate_prefix(cache: &dyn Cache, prefix: &str) {
    if let Err(err) = cache.delete_prefix(prefix).await {
        warn!(prefix, error = %err, "cache invalidation failed");
    }
}

pub mod keys {
    pub const EVENTS_PREFIX: &str = "events:";
    pub const DASHBOARD: &str = "admin:dashboard";

    pub fn public_events(city: Option<&str>, category: Option<&str>, upcoming: bool) -> String {
        format!(
            "{}public:{}:{}:{}",
            EVENTS_PREFIX,
            city.unwrap_or("*").to_lowercase(),
            category.unwrap_or("*").to_lowercase(),
            upcoming
        )
    }
}
