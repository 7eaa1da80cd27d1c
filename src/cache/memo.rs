//! Cache Facade Module
//!
//! Public cache API composing the entry store, request coalescer and
//! statistics collector behind a single lock.

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture, FutureExt};
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::coalescer::{RequestCoalescer, SharedComputation};
use crate::cache::{CacheStats, EntryStore, StatsCollector};
use crate::config::{CacheConfig, CacheOptions};
use crate::error::{CacheError, Result};

/// Maximum number of keys a single `prefetch` call issues
pub const PREFETCH_BATCH_SIZE: usize = 5;

type BoxedError = Box<dyn StdError + Send + Sync + 'static>;
type BoxedFactory<V> =
    Box<dyn FnOnce() -> BoxFuture<'static, std::result::Result<V, BoxedError>> + Send>;

// == Warm Up Item ==
/// A key to populate ahead of time, with its own factory and options.
pub struct WarmUpItem<V> {
    key: String,
    factory: BoxedFactory<V>,
    options: Option<CacheOptions>,
}

impl<V: Send + 'static> WarmUpItem<V> {
    pub fn new<F, Fut, E>(key: impl Into<String>, factory: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<BoxedError> + Send + 'static,
    {
        Self {
            key: key.into(),
            factory: Box::new(move || async move { factory().await.map_err(Into::into) }.boxed()),
            options: None,
        }
    }

    /// Applies per-item options on top of the cache defaults.
    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.options = Some(options);
        self
    }
}

// == Entry Info ==
/// Diagnostic snapshot of one live entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub access_count: u64,
    pub estimated_size_bytes: u64,
    pub ttl_remaining: Duration,
}

struct State<V> {
    store: EntryStore<V>,
    pending: RequestCoalescer<V>,
    stats: StatsCollector,
}

struct Inner<V> {
    state: Mutex<State<V>>,
    defaults: CacheConfig,
}

enum Lookup<V> {
    Hit(V),
    Pending(SharedComputation<V>),
}

// == Memo Cache ==
/// TTL cache with pluggable eviction, memory accounting and request coalescing.
///
/// Cloning is cheap and every clone shares the same entries, so one instance
/// can be handed to any number of callers. Values are returned as clones;
/// store large payloads behind an `Arc`.
///
/// ```
/// use memo_cache::{CacheConfig, MemoCache};
///
/// # async fn example() -> memo_cache::Result<()> {
/// let cache: MemoCache<String> = MemoCache::new(CacheConfig::default());
///
/// let title = cache
///     .get("metadata:doc1", || async { Ok::<_, std::io::Error>("Q3 report".to_string()) }, None)
///     .await?;
/// assert_eq!(title, "Q3 report");
/// assert!(cache.has("metadata:doc1"));
/// # Ok(())
/// # }
/// ```
pub struct MemoCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for MemoCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for MemoCache<V>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<V> MemoCache<V>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty cache; `defaults` apply wherever a call passes no options.
    pub fn new(defaults: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    store: EntryStore::new(),
                    pending: RequestCoalescer::new(),
                    stats: StatsCollector::new(),
                }),
                defaults,
            }),
        }
    }

    pub fn defaults(&self) -> &CacheConfig {
        &self.inner.defaults
    }

    // == Get ==
    /// Returns the cached value for `key`, computing it with `factory` on a miss.
    ///
    /// Concurrent misses for the same key share a single `factory` call and
    /// all receive the same value or the same error. A failed computation
    /// caches nothing and is not retried.
    ///
    /// # Arguments
    /// * `key` - The key to retrieve
    /// * `factory` - Produces the value on a miss
    /// * `options` - Per-call overrides for the cache defaults
    pub async fn get<F, Fut, E>(&self, key: &str, factory: F, options: Option<CacheOptions>) -> Result<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<BoxedError> + Send + 'static,
    {
        let started = Instant::now();

        let lookup = {
            let mut state = self.inner.state.lock();
            match state.store.lookup(key) {
                Some(value) => {
                    state.stats.record_hit();
                    debug!("Cache hit for {}", key);
                    Lookup::Hit(value)
                }
                None => {
                    state.stats.record_miss();
                    let config = self.inner.defaults.resolve(options.as_ref());
                    Lookup::Pending(self.start(&mut state, key, factory, config))
                }
            }
        };

        let result = match lookup {
            Lookup::Hit(value) => Ok(value),
            Lookup::Pending(computation) => computation.await,
        };

        self.inner
            .state
            .lock()
            .stats
            .record_access_time(key, started.elapsed());
        result
    }

    // == Set ==
    /// Stores a value unconditionally, bypassing the factory path.
    ///
    /// Still subject to eviction. Fails only with `EntryTooLarge` under
    /// [`crate::OversizePolicy::Reject`].
    pub fn set(&self, key: impl Into<String>, value: V, options: Option<CacheOptions>) -> Result<()> {
        let config = self.inner.defaults.resolve(options.as_ref());
        let mut state = self.inner.state.lock();
        let evicted = state.store.insert(key.into(), value, &config)?;
        for _ in 0..evicted {
            state.stats.record_eviction();
        }
        Ok(())
    }

    // == Get Sync ==
    /// Returns the cached value without computing anything on a miss.
    pub fn get_sync(&self, key: &str) -> Option<V> {
        let mut state = self.inner.state.lock();
        let value = state.store.lookup(key);
        match value {
            Some(_) => state.stats.record_hit(),
            None => state.stats.record_miss(),
        }
        value
    }

    // == Has ==
    /// Checks for a live entry, removing it if it has expired.
    pub fn has(&self, key: &str) -> bool {
        self.inner.state.lock().store.contains(key)
    }

    /// Checks whether a computation for `key` is in flight.
    pub fn is_pending(&self, key: &str) -> bool {
        self.inner.state.lock().pending.is_pending(key)
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether an entry was present.
    ///
    /// An in-flight computation for the key still resolves for its callers,
    /// but its result is no longer stored.
    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.inner.state.lock();
        state.pending.detach(key);
        state.store.remove(key)
    }

    // == Clear ==
    /// Removes all entries and forgets all in-flight computations.
    ///
    /// Statistics counters are kept.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        state.store.clear();
        state.pending.clear();
        debug!("Cache cleared");
    }

    // == Invalidate Pattern ==
    /// Removes every key matching the regular expression `pattern`.
    ///
    /// Matching in-flight computations are detached as in [`MemoCache::delete`].
    /// Returns the number of entries removed.
    ///
    /// # Errors
    /// `InvalidPattern` if `pattern` does not compile; nothing is removed.
    pub fn invalidate_pattern(&self, pattern: &str) -> Result<usize> {
        let regex = Regex::new(pattern)?;

        let mut state = self.inner.state.lock();
        let removed = state.store.remove_where(|key| regex.is_match(key));
        let detached = state.pending.detach_where(|key| regex.is_match(key));

        debug!(
            "Invalidated {} entries and {} pending computations matching {}",
            removed.len(),
            detached,
            pattern
        );
        Ok(removed.len())
    }

    // == Warm Up ==
    /// Populates every item not already cached, each with its own factory.
    ///
    /// Runs in the background; the returned handle may be awaited or
    /// dropped. Failures are logged and not cached. Must be called within
    /// a Tokio runtime.
    pub fn warm_up(&self, items: impl IntoIterator<Item = WarmUpItem<V>>) -> JoinHandle<()> {
        let computations: Vec<(String, SharedComputation<V>)> = {
            let mut state = self.inner.state.lock();
            let mut computations = Vec::new();
            for item in items {
                if state.store.contains(&item.key) {
                    continue;
                }
                let config = self.inner.defaults.resolve(item.options.as_ref());
                let computation = self.start(&mut state, &item.key, item.factory, config);
                computations.push((item.key, computation));
            }
            computations
        };

        spawn_population("Warm-up", computations)
    }

    // == Prefetch ==
    /// Populates up to [`PREFETCH_BATCH_SIZE`] of `keys` with a shared factory.
    ///
    /// Keys already cached or in flight are skipped and do not count toward
    /// the batch. Runs in the background like [`MemoCache::warm_up`].
    pub fn prefetch<I, K, F, Fut, E>(&self, keys: I, factory: F) -> JoinHandle<()>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<BoxedError> + Send + 'static,
    {
        let factory = Arc::new(factory);

        let computations: Vec<(String, SharedComputation<V>)> = {
            let mut state = self.inner.state.lock();
            let mut computations = Vec::new();
            for key in keys {
                let key: String = key.into();
                if computations.len() >= PREFETCH_BATCH_SIZE {
                    break;
                }
                if state.store.contains(&key) || state.pending.is_pending(&key) {
                    continue;
                }
                let factory = Arc::clone(&factory);
                let owned_key = key.clone();
                let config = self.inner.defaults.clone();
                let computation = self.start(&mut state, &key, move || factory(owned_key), config);
                computations.push((key, computation));
            }
            computations
        };

        spawn_population("Prefetch", computations)
    }

    // == Stats ==
    /// Returns a snapshot of cache statistics.
    ///
    /// Expired entries are purged first so `size` and `memory_usage_bytes`
    /// only count live entries.
    pub fn stats(&self) -> CacheStats {
        let mut state = self.inner.state.lock();
        state.store.purge_expired();
        state
            .stats
            .snapshot(state.store.len(), state.store.memory_usage())
    }

    /// Removes all expired entries. Returns the number removed.
    ///
    /// Also forgets in-flight registrations whose callers have all gone away.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.inner.state.lock();
        let abandoned = state.pending.prune_abandoned();
        if abandoned > 0 {
            debug!("Dropped {} abandoned computations", abandoned);
        }
        state.store.purge_expired()
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.store.purge_expired();
        state.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns bookkeeping for a live entry without recording an access.
    pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        let state = self.inner.state.lock();
        let entry = state.store.peek(key).filter(|entry| !entry.is_expired())?;
        Some(EntryInfo {
            access_count: entry.access_count,
            estimated_size_bytes: entry.estimated_size_bytes,
            ttl_remaining: entry.ttl_remaining(),
        })
    }

    // == Start Computation ==
    /// Joins the in-flight computation for `key` or registers a new one.
    fn start<F, Fut, E>(
        &self,
        state: &mut State<V>,
        key: &str,
        factory: F,
        config: CacheConfig,
    ) -> SharedComputation<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<BoxedError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();

        let (computation, joined) = state.pending.get_or_create(key, move |id| {
            async move {
                let outcome = factory()
                    .await
                    .map_err(|err| CacheError::factory(owned_key.as_str(), err));
                inner.settle(&owned_key, id, outcome, &config)
            }
            .boxed()
        });

        if joined {
            debug!("Joining in-flight computation for {}", key);
        } else {
            debug!("Cache miss for {}, invoking factory", key);
        }
        computation
    }
}

impl<V> Inner<V>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    // == Settle ==
    /// Finishes the computation registered under `id`, storing a success.
    fn settle(&self, key: &str, id: u64, outcome: Result<V>, config: &CacheConfig) -> Result<V> {
        let mut state = self.state.lock();
        let registered = state.pending.complete(key, id);

        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                debug!("Computation for {} failed: {}", key, err);
                return Err(err);
            }
        };

        if !registered {
            debug!("Discarding result for {}, invalidated while in flight", key);
            return Ok(value);
        }

        match state.store.insert(key.to_string(), value.clone(), config) {
            Ok(evicted) => {
                for _ in 0..evicted {
                    state.stats.record_eviction();
                }
            }
            Err(err) => warn!("Computed value not cached: {}", err),
        }
        Ok(value)
    }
}

fn spawn_population<V>(label: &'static str, computations: Vec<(String, SharedComputation<V>)>) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let results = join_all(
            computations
                .into_iter()
                .map(|(key, computation)| async move { (key, computation.await) }),
        )
        .await;

        for (key, result) in results {
            if let Err(err) = result {
                warn!("{} failed for {}: {}", label, key, err);
            }
        }
    })
}
