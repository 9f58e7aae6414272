//! On-disk image of the cache.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use cached::IOCached;
use cached::stores::DiskCache;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::cache::error::CacheError;
use crate::cache::fingerprint::Fingerprint;

const CACHE_NAME: &str = "tracker-cache";

/// Key under which the list of persisted fingerprints is kept
const INDEX_KEY: &str = "__index__";

/// Stored value of one read plus the time it was fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub stored_at: Timestamp,
}

impl CacheEntry {
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            value,
            stored_at: Timestamp::now(),
        }
    }

    pub fn is_fresh(&self, max_age: Duration, now: Timestamp) -> bool {
        now.duration_since(self.stored_at).as_secs_f64() < max_age.as_secs_f64()
    }
}

/// Persisted entries backed by `cached`'s sled disk store.
pub struct DiskImage {
    store: DiskCache<String, Vec<u8>>,
    persisted: HashSet<String>,
}

impl DiskImage {
    pub fn open(dir: &Path) -> Result<Self, CacheError> {
        // Freshness is tracked per entry; the store itself never expires
        let store = DiskCache::new(CACHE_NAME)
            .set_disk_directory(dir)
            .set_lifespan(Duration::from_secs(86400 * 365 * 10))
            .build()
            .map_err(|e| CacheError::Open {
                path: dir.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            store,
            persisted: HashSet::new(),
        })
    }

    /// Reads every persisted entry; undecodable entries are skipped.
    pub fn load(&mut self) -> Result<Vec<(Fingerprint, CacheEntry)>, CacheError> {
        let Some(index) = self.get(INDEX_KEY)? else {
            return Ok(Vec::new());
        };
        let keys: Vec<String> = serde_json::from_slice(&index)?;

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(bytes) = self.get(&key)? else {
                continue;
            };
            match serde_json::from_slice::<CacheEntry>(&bytes) {
                Ok(entry) => {
                    self.persisted.insert(key.clone());
                    entries.push((Fingerprint::from(key), entry));
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "Skipping corrupt cache entry"),
            }
        }
        Ok(entries)
    }

    /// Writes changed entries, drops removed ones and replaces the index.
    pub fn write(
        &mut self,
        upserts: Vec<(Fingerprint, CacheEntry)>,
        removals: Vec<Fingerprint>,
    ) -> Result<(), CacheError> {
        for (key, entry) in upserts {
            let bytes = serde_json::to_vec(&entry)?;
            self.store
                .cache_set(key.as_str().to_string(), bytes)
                .map_err(|e| CacheError::Operation(e.to_string()))?;
            self.persisted.insert(key.as_str().to_string());
        }

        for key in removals {
            if self.persisted.remove(key.as_str()) {
                self.store
                    .cache_remove(&key.as_str().to_string())
                    .map_err(|e| CacheError::Operation(e.to_string()))?;
            }
        }

        let mut index: Vec<&String> = self.persisted.iter().collect();
        index.sort();
        let index = serde_json::to_vec(&index)?;
        self.store
            .cache_set(INDEX_KEY.to_string(), index)
            .map_err(|e| CacheError::Operation(e.to_string()))?;

        self.store
            .connection()
            .flush()
            .map_err(|e| CacheError::Operation(e.to_string()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.persisted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persisted.is_empty()
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.store
            .cache_get(&key.to_string())
            .map_err(|e| CacheError::Operation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut image = DiskImage::open(dir.path()).unwrap();
            assert!(image.load().unwrap().is_empty());
            image
                .write(
                    vec![
                        (Fingerprint::bug(1), CacheEntry::new(json!({"id": 1}))),
                        (Fingerprint::bug(2), CacheEntry::new(json!({"id": 2}))),
                    ],
                    Vec::new(),
                )
                .unwrap();
            image.write(Vec::new(), vec![Fingerprint::bug(2)]).unwrap();
            assert_eq!(image.len(), 1);
        }

        let mut image = DiskImage::open(dir.path()).unwrap();
        let entries = image.load().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, Fingerprint::bug(1));
        assert_eq!(entries[0].1.value, json!({"id": 1}));
    }

    #[test]
    fn test_freshness() {
        let entry = CacheEntry::new(json!(null));
        let now = Timestamp::now();
        assert!(entry.is_fresh(Duration::from_secs(60), now));
        assert!(!entry.is_fresh(Duration::ZERO, now));
    }
}
