// In-process cache for read-mostly listings

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| Instant::now() > expires_at)
            .unwrap_or(false)
    }
}

#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

fn poisoned<T>(_: T) -> CacheError {
    CacheError::OperationFailed("cache lock poisoned".to_string())
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.store.read().map(|store| store.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        {
            let store = self.store.read().map_err(poisoned)?;
            match store.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }
        self.store.write().map_err(poisoned)?.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut store = self.store.write().map_err(poisoned)?;
        // Expired entries are dropped on every write, not only when re-read
        store.retain(|_, entry| !entry.is_expired());
        store.insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.store.write().map_err(poisoned)?.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut store = self.store.write().map_err(poisoned)?;
        let before = store.len();
        store.retain(|key, _| !key.starts_with(prefix));
        Ok(before - store.len())
    }
}

const DESCRIPTION_LISTING_PREFIX: &str = "descriptions:list:";

/// Cache of active description listings keyed by filter.
///
/// Failures are logged and treated as misses; a broken cache never fails a request.
/// Every invalidation bumps a generation; a listing read under an older
/// generation is never left in the cache.
#[derive(Clone)]
pub struct ListingCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Option<Duration>,
    generation: Arc<AtomicU64>,
}

impl ListingCache {
    /// `ttl = None` disables caching entirely.
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Option<Duration>) -> Self {
        Self {
            backend,
            ttl,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn in_memory(ttl: Option<Duration>) -> Self {
        Self::new(Arc::new(InMemoryCache::new()), ttl)
    }

    pub fn key(category: Option<&str>, parent: Option<&str>) -> String {
        format!(
            "{}{}:{}",
            DESCRIPTION_LISTING_PREFIX,
            category.unwrap_or("*"),
            parent.unwrap_or("*")
        )
    }

    /// Take before reading the rows a listing is built from; pass to [`put`](Self::put).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.ttl?;
        match self.backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(key, "listing cache hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(key, error = %e, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "listing cache read failed");
                None
            }
        }
    }

    /// Stores `value` unless an invalidation happened since `read_at`.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T, read_at: u64) {
        let Some(ttl) = self.ttl else {
            return;
        };
        if self.generation() != read_at {
            debug!(key, "skipping stale listing");
            return;
        }
        let result = match serde_json::to_string(value) {
            Ok(raw) => self.backend.set(key, &raw, Some(ttl)).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!(key, error = %e, "listing cache write failed");
            return;
        }
        // An invalidation may have landed between the check and the write
        if self.generation() != read_at {
            if let Err(e) = self.backend.delete(key).await {
                warn!(key, error = %e, "listing cache delete failed");
            }
        }
    }

    /// Drops every cached description listing.
    pub async fn invalidate_descriptions(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        match self.backend.delete_prefix(DESCRIPTION_LISTING_PREFIX).await {
            Ok(removed) => debug!(removed, "description listing cache invalidated"),
            Err(e) => warn!(error = %e, "listing cache invalidation failed"),
        }
    }
}
