use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

/// Narrow key-value capability used to memoize access tokens.
///
/// Any store with TTL support can back it. Implementations own expiry: a value
/// past its TTL must read back as `None`.
pub trait TokenCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

impl<T: TokenCache + ?Sized> TokenCache for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        (**self).set(key, value, ttl)
    }
}

/// Cached value with its deadline
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: String,
    /// `None` when the TTL reaches past what `Instant` can represent
    pub expires_at: Option<Instant>,
}

impl CacheEntry {
    pub fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at.is_none_or(|deadline| Instant::now() < deadline)
    }
}

/// In-process `TokenCache` backed by a map with per-entry deadlines
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, CacheEntry>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("token cache lock poisoned"))
    }

    /// Drop entries whose TTL has elapsed
    pub fn purge_expired(&self) -> Result<usize> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_valid());
        Ok(before - entries.len())
    }

    /// Number of stored entries, expired ones included until purged
    pub fn len(&self) -> usize {
        // every mutation is a single map call, so a poisoned map is still consistent
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}

impl TokenCache for MemoryTokenCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(entry) if entry.is_valid() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        // last write wins
        self.lock()?
            .insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }
}
