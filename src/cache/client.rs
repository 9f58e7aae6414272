//! Read-through cache in front of a tracker client.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use jiff::Timestamp;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::error::CacheError;
use crate::cache::fingerprint::Fingerprint;
use crate::cache::store::{CacheEntry, DiskImage};
use crate::config::CacheSettings;
use crate::error::AppResult;
use crate::tracker::{
    Bug, BugId, BugUpdate, Comment, HistoryEntry, SearchQuery, TrackerClient,
};

/// Shared state of the cache.
///
/// Concurrent readers go straight to the map; a miss takes a per-fingerprint
/// fetch lock so at most one remote call per key is in flight. Invalidation
/// bumps a generation counter and a fetch that started before the bump does
/// not store its result.
pub struct CacheStore {
    entries: DashMap<Fingerprint, CacheEntry>,
    inflight: StdMutex<HashMap<Fingerprint, Arc<Mutex<()>>>>,
    generation: AtomicU64,
    dirty: StdMutex<HashSet<Fingerprint>>,
    max_age: Duration,
    image: Mutex<Option<DiskImage>>,
    flusher: StdMutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl CacheStore {
    fn empty(max_age: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            inflight: StdMutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            dirty: StdMutex::new(HashSet::new()),
            max_age,
            image: Mutex::new(None),
            flusher: StdMutex::new(None),
        }
    }

    /// Cache without a persisted image.
    pub fn memory_only(max_age: Duration) -> Arc<Self> {
        Arc::new(Self::empty(max_age))
    }

    /// Opens the cache, loading the persisted image when a path is configured
    /// and starting the periodic flush. A missing or unreadable image only
    /// means a cold cache.
    pub async fn open(settings: &CacheSettings, cancel: &CancellationToken) -> Arc<Self> {
        let store = Arc::new(Self::empty(Duration::from_secs(settings.max_age)));

        let Some(path) = &settings.path else {
            tracing::info!("Tracker cache is memory only");
            return store;
        };

        match DiskImage::open(path).and_then(|mut image| image.load().map(|e| (image, e))) {
            Ok((image, loaded)) => {
                tracing::info!(path = %path.display(), entries = loaded.len(), "Loaded tracker cache image");
                for (key, entry) in loaded {
                    store.entries.insert(key, entry);
                }
                *store.image.lock().await = Some(image);
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to load tracker cache image, starting cold");
                return store;
            }
        }

        let token = cancel.child_token();
        let handle = tokio::spawn(flush_loop(
            Arc::clone(&store),
            Duration::from_secs(settings.flush_interval),
            token.clone(),
        ));
        if let Ok(mut flusher) = store.flusher.lock() {
            *flusher = Some((token, handle));
        }

        store
    }

    /// Stops the periodic flush, writes a final flush and releases the image.
    pub async fn close(&self) {
        let flusher = self.flusher.lock().ok().and_then(|mut f| f.take());
        if let Some((token, handle)) = flusher {
            token.cancel();
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Cache flush task ended abnormally");
            }
        }

        if let Err(e) = self.flush().await {
            tracing::error!(error = %e, "Final tracker cache flush failed");
        }
        self.image.lock().await.take();
    }

    /// Writes pending changes to the image, if there is one.
    pub async fn flush(&self) -> Result<(), CacheError> {
        let mut image = self.image.lock().await;
        let Some(image) = image.as_mut() else {
            return Ok(());
        };

        let dirty: Vec<Fingerprint> = match self.dirty.lock() {
            Ok(mut dirty) => dirty.drain().collect(),
            Err(_) => return Err(CacheError::Operation("dirty set poisoned".to_string())),
        };
        if dirty.is_empty() {
            return Ok(());
        }

        let mut upserts = Vec::new();
        let mut removals = Vec::new();
        for key in dirty {
            match self.entries.get(&key) {
                Some(entry) => upserts.push((key, entry.value().clone())),
                None => removals.push(key),
            }
        }

        let (written, removed) = (upserts.len(), removals.len());
        let result = image.write(upserts, removals);
        if result.is_ok() {
            tracing::debug!(written, removed, "Flushed tracker cache image");
        }
        result
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry derived from one bug.
    pub fn invalidate_bug(&self, id: BugId) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        for key in Fingerprint::for_bug(id) {
            self.remove(&key);
        }
    }

    /// Drops every search result; any of them may contain a changed bug.
    pub fn invalidate_searches(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let keys: Vec<Fingerprint> = self
            .entries
            .iter()
            .filter(|e| e.key().is_search())
            .map(|e| e.key().clone())
            .collect();
        for key in keys {
            self.remove(&key);
        }
    }

    fn remove(&self, key: &Fingerprint) {
        if self.entries.remove(key).is_some() {
            self.mark_dirty(key.clone());
        }
    }

    fn mark_dirty(&self, key: Fingerprint) {
        if let Ok(mut dirty) = self.dirty.lock() {
            dirty.insert(key);
        }
    }

    fn lookup<T: DeserializeOwned>(&self, key: &Fingerprint) -> Option<T> {
        let entry = self.entries.get(key)?;
        if !entry.is_fresh(self.max_age, Timestamp::now()) {
            drop(entry);
            self.remove(key);
            return None;
        }
        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                drop(entry);
                self.remove(key);
                None
            }
        }
    }

    fn fetch_lock(&self, key: &Fingerprint) -> Option<Arc<Mutex<()>>> {
        let mut inflight = self.inflight.lock().ok()?;
        Some(Arc::clone(inflight.entry(key.clone()).or_default()))
    }

    fn release_fetch_lock(&self, key: &Fingerprint, lock: Arc<Mutex<()>>) {
        if let Ok(mut inflight) = self.inflight.lock() {
            // Only the map and this caller still hold it
            if Arc::strong_count(&lock) <= 2 {
                inflight.remove(key);
            }
        }
    }

    /// Returns the cached value of `key` or fetches, stores and returns it.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: Fingerprint, fetch: F) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        if let Some(value) = self.lookup(&key) {
            tracing::trace!(key = %key, "Tracker cache hit");
            return Ok(value);
        }

        let Some(lock) = self.fetch_lock(&key) else {
            return fetch().await;
        };

        let result = {
            let _flight = lock.lock().await;

            // Another caller may have filled the key while we waited
            if let Some(value) = self.lookup(&key) {
                tracing::trace!(key = %key, "Tracker cache hit after wait");
                Ok(value)
            } else {
                tracing::debug!(key = %key, "Tracker cache miss");
                let generation = self.generation.load(Ordering::SeqCst);
                let fetched = fetch().await;
                if let Ok(value) = &fetched {
                    self.store(&key, value, generation);
                }
                fetched
            }
        };

        self.release_fetch_lock(&key, lock);
        result
    }

    fn store<T: Serialize>(&self, key: &Fingerprint, value: &T, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(key = %key, "Not caching result fetched across an invalidation");
            return;
        }
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to encode cache entry");
                return;
            }
        };

        self.entries.insert(key.clone(), CacheEntry::new(value));
        self.mark_dirty(key.clone());

        // An invalidation bumps the generation before removing entries, so
        // one that raced the insert is either seen here or removes it itself
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(key = %key, "Dropping result invalidated while it was stored");
            self.remove(key);
        }
    }
}

async fn flush_loop(store: Arc<CacheStore>, interval: Duration, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                if let Err(e) = store.flush().await {
                    tracing::warn!(error = %e, "Periodic tracker cache flush failed");
                }
            }
        }
    }
}

/// Tracker client answering reads from a [`CacheStore`].
pub struct CachedTrackerClient {
    delegate: Arc<dyn TrackerClient>,
    store: Arc<CacheStore>,
}

impl CachedTrackerClient {
    pub fn new(delegate: Arc<dyn TrackerClient>, store: Arc<CacheStore>) -> Self {
        Self { delegate, store }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    fn invalidate(&self, id: BugId) {
        self.store.invalidate_bug(id);
        self.store.invalidate_searches();
    }

    /// Drops cached reads of bugs that a search shows changed since.
    ///
    /// `last_change_time` is the freshness marker: a bug entry is only kept
    /// while no newer change time has been observed for it.
    fn drop_outdated(&self, bugs: &[Bug]) {
        for bug in bugs {
            let Some(cached) = self.store.lookup::<Bug>(&Fingerprint::bug(bug.id)) else {
                continue;
            };
            if bug.last_change_time > cached.last_change_time {
                tracing::debug!(bug_id = bug.id, "Bug changed remotely, dropping cached reads");
                self.store.invalidate_bug(bug.id);
            }
        }
    }
}

#[async_trait]
impl TrackerClient for CachedTrackerClient {
    async fn get_bug(&self, id: BugId) -> AppResult<Bug> {
        self.store
            .get_or_fetch(Fingerprint::bug(id), || self.delegate.get_bug(id))
            .await
    }

    async fn search(&self, query: &SearchQuery) -> AppResult<Vec<Bug>> {
        let bugs: Vec<Bug> = self
            .store
            .get_or_fetch(Fingerprint::search(query), || self.delegate.search(query))
            .await?;
        self.drop_outdated(&bugs);
        Ok(bugs)
    }

    async fn get_comments(&self, id: BugId) -> AppResult<Vec<Comment>> {
        self.store
            .get_or_fetch(Fingerprint::comments(id), || self.delegate.get_comments(id))
            .await
    }

    async fn get_history(&self, id: BugId) -> AppResult<Vec<HistoryEntry>> {
        self.store
            .get_or_fetch(Fingerprint::history(id), || self.delegate.get_history(id))
            .await
    }

    async fn update_bug(&self, id: BugId, update: &BugUpdate) -> AppResult<()> {
        let result = self.delegate.update_bug(id, update).await;
        // A failed write may still have been applied remotely
        self.invalidate(id);
        result
    }

    async fn add_comment(&self, id: BugId, text: &str) -> AppResult<()> {
        let result = self.delegate.add_comment(id, text).await;
        self.invalidate(id);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::test_support::{MockTracker, sample_bug};
    use tempfile::tempdir;

    fn cached(tracker: &Arc<MockTracker>) -> CachedTrackerClient {
        CachedTrackerClient::new(
            tracker.clone(),
            CacheStore::memory_only(Duration::from_secs(300)),
        )
    }

    #[tokio::test]
    async fn test_repeated_read_hits_remote_once() {
        let tracker = Arc::new(MockTracker::with_bugs(vec![sample_bug(1, "NEW")]));
        let client = cached(&tracker);

        let first = client.get_bug(1).await.unwrap();
        let second = client.get_bug(1).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(tracker.read_calls(), 1);
    }

    #[tokio::test]
    async fn test_equal_searches_share_an_entry() {
        let tracker = Arc::new(MockTracker::with_bugs(vec![sample_bug(1, "NEW")]));
        let client = cached(&tracker);

        let a = SearchQuery::new().statuses(["NEW", "ASSIGNED"]);
        let b = SearchQuery::new().statuses(["ASSIGNED", "NEW"]);
        client.search(&a).await.unwrap();
        client.search(&b).await.unwrap();

        assert_eq!(tracker.read_calls(), 1);
    }

    #[tokio::test]
    async fn test_mutation_invalidates_dependent_entries() {
        let tracker = Arc::new(MockTracker::with_bugs(vec![
            sample_bug(1, "NEW"),
            sample_bug(2, "NEW"),
        ]));
        let client = cached(&tracker);
        let query = SearchQuery::new().statuses(["NEW"]);

        client.get_bug(1).await.unwrap();
        client.get_bug(2).await.unwrap();
        client.search(&query).await.unwrap();
        assert_eq!(tracker.read_calls(), 3);

        let update = BugUpdate {
            status: Some("ASSIGNED".to_string()),
            ..Default::default()
        };
        client.update_bug(1, &update).await.unwrap();
        assert_eq!(tracker.mutation_calls(), 1);

        // bug 1 and the search are refetched, bug 2 is untouched
        assert_eq!(client.get_bug(1).await.unwrap().status, "ASSIGNED");
        assert!(client.search(&query).await.unwrap().iter().all(|b| b.id != 1));
        client.get_bug(2).await.unwrap();
        assert_eq!(tracker.read_calls(), 5);
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let tracker = Arc::new(
            MockTracker::with_bugs(vec![sample_bug(1, "NEW")])
                .with_delay(Duration::from_millis(50)),
        );
        let client = Arc::new(cached(&tracker));

        let reads = (0..8).map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.get_bug(1).await })
        });
        for read in futures::future::join_all(reads).await {
            assert_eq!(read.unwrap().unwrap().id, 1);
        }

        assert_eq!(tracker.read_calls(), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let tracker = Arc::new(MockTracker::with_bugs(vec![sample_bug(1, "NEW")]));
        let client = cached(&tracker);

        tracker.set_failing(true);
        let err = client.get_bug(1).await.unwrap_err();
        assert!(matches!(err, AppError::Remote { .. }));

        tracker.set_failing(false);
        assert_eq!(client.get_bug(1).await.unwrap().id, 1);
        assert_eq!(tracker.read_calls(), 2);
        assert_eq!(client.store().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_max_age_always_refetches() {
        let tracker = Arc::new(MockTracker::with_bugs(vec![sample_bug(1, "NEW")]));
        let client = CachedTrackerClient::new(tracker.clone(), CacheStore::memory_only(Duration::ZERO));

        client.get_bug(1).await.unwrap();
        client.get_bug(1).await.unwrap();
        assert_eq!(tracker.read_calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_see_remote_changes() {
        let tracker = Arc::new(MockTracker::with_bugs(vec![sample_bug(1, "NEW")]));
        let client = CachedTrackerClient::new(
            tracker.clone(),
            CacheStore::memory_only(Duration::from_millis(50)),
        );
        let query = SearchQuery::new().statuses(["CLOSED"]);
        assert!(client.search(&query).await.unwrap().is_empty());

        // closed by someone else, the cache never saw the write
        let close = BugUpdate {
            status: Some("CLOSED".to_string()),
            ..Default::default()
        };
        tracker.update_bug(1, &close).await.unwrap();
        assert!(client.search(&query).await.unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(80)).await;
        let found = client.search(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(tracker.read_calls(), 2);
    }

    #[tokio::test]
    async fn test_newer_change_time_in_search_drops_bug_entry() {
        let tracker = Arc::new(MockTracker::with_bugs(vec![sample_bug(1, "NEW")]));
        let client = cached(&tracker);
        assert_eq!(client.get_bug(1).await.unwrap().status, "NEW");

        let update = BugUpdate {
            status: Some("ASSIGNED".to_string()),
            ..Default::default()
        };
        tracker.update_bug(1, &update).await.unwrap();

        client.search(&SearchQuery::new()).await.unwrap();
        assert_eq!(client.get_bug(1).await.unwrap().status, "ASSIGNED");
        assert_eq!(tracker.read_calls(), 3);
    }

    #[tokio::test]
    async fn test_unchanged_bug_entry_survives_search() {
        let tracker = Arc::new(MockTracker::with_bugs(vec![sample_bug(1, "NEW")]));
        let client = cached(&tracker);

        client.get_bug(1).await.unwrap();
        client.search(&SearchQuery::new()).await.unwrap();
        client.get_bug(1).await.unwrap();
        assert_eq!(tracker.read_calls(), 2);
    }

    #[test]
    fn test_store_after_invalidation_is_discarded() {
        let store = CacheStore::memory_only(Duration::from_secs(300));
        let key = Fingerprint::bug(1);
        let generation = store.generation.load(Ordering::SeqCst);

        store.invalidate_bug(1);
        store.store(&key, &sample_bug(1, "NEW"), generation);
        assert!(store.is_empty());

        let generation = store.generation.load(Ordering::SeqCst);
        store.store(&key, &sample_bug(1, "NEW"), generation);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_image_survives_reopen() {
        let dir = tempdir().unwrap();
        let settings = CacheSettings {
            path: Some(dir.path().join("cache")),
            flush_interval: 3600,
            max_age: 3600,
        };
        let cancel = CancellationToken::new();
        let tracker = Arc::new(MockTracker::with_bugs(vec![sample_bug(1, "NEW")]));

        let store = CacheStore::open(&settings, &cancel).await;
        let client = CachedTrackerClient::new(tracker.clone(), Arc::clone(&store));
        client.get_bug(1).await.unwrap();
        client.get_comments(1).await.unwrap();
        store.close().await;
        drop(client);
        drop(store);

        let store = CacheStore::open(&settings, &cancel).await;
        assert_eq!(store.len(), 2);
        let client = CachedTrackerClient::new(tracker.clone(), Arc::clone(&store));
        client.get_bug(1).await.unwrap();
        assert_eq!(tracker.read_calls(), 2);
        store.close().await;
    }

    #[tokio::test]
    async fn test_unusable_path_falls_back_to_memory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        let settings = CacheSettings {
            path: Some(file.join("cache")),
            ..Default::default()
        };

        let store = CacheStore::open(&settings, &CancellationToken::new()).await;
        let tracker = Arc::new(MockTracker::with_bugs(vec![sample_bug(1, "NEW")]));
        let client = CachedTrackerClient::new(tracker.clone(), Arc::clone(&store));
        client.get_bug(1).await.unwrap();
        client.get_bug(1).await.unwrap();
        assert_eq!(tracker.read_calls(), 1);
        store.close().await;
    }
}
