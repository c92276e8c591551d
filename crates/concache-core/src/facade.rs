//! Public surface of the cache.
//!
//! Orchestrates [`LruStore`], [`SingleFlight`], and [`BatchCoalescer`] and
//! owns the [`Counters`] they share. No other module in this crate talks
//! to more than one of those three directly; `CacheFacade` is the only
//! place the four concerns are wired together.

use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::batch::{BatchCoalescer, BatchLoaderFn, LoaderId};
use crate::config::{CacheConfig, TtlSetting};
use crate::error::{CacheError, Result};
use crate::metrics::{Counters, Metrics};
use crate::single_flight::SingleFlight;
use crate::store::LruStore;

/// A nullary, single-shot loader for [`CacheFacade::get`]'s single-key path.
pub type SingleLoaderFn<V> =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<V>> + Send>> + Send>;

/// Builds a boxed [`SingleLoaderFn`] from any `FnOnce` returning a future,
/// so callers don't have to hand-write the `Box::pin` boilerplate.
pub fn single_loader<V, F, Fut>(loader: F) -> SingleLoaderFn<V>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<V>> + Send + 'static,
{
    Box::new(move || Box::pin(loader()))
}

/// A coordinated async cache: bounded LRU retention, single-flight
/// coalescing of same-key misses, and batch coalescing of cross-key
/// misses, behind one facade.
pub struct CacheFacade<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
{
    default_ttl: Option<Duration>,
    store: Arc<LruStore<K, V>>,
    single_flight: SingleFlight<K, V>,
    batch: Arc<BatchCoalescer<K, V>>,
    counters: Counters,
}

impl<K, V> CacheFacade<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Builds a cache from `config`.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let store: Arc<LruStore<K, V>> = Arc::new(LruStore::new(config.maxsize.map(|n| n.get())));
        let write_back_store = store.clone();
        let batch = Arc::new(BatchCoalescer::new(
            config.batch_window,
            config.max_batch_size.get(),
            Arc::new(move |key: K, value: V, ttl: Option<Duration>| {
                write_back_store.put_with_ttl(key, value, ttl);
            }),
        ));

        Self {
            default_ttl: config.default_ttl,
            store,
            single_flight: SingleFlight::new(),
            batch,
            counters: Counters::new(),
        }
    }

    /// Looks up `key`.
    ///
    /// * If present and unexpired: records a hit and returns the value.
    /// * Otherwise: records a miss. With no loader, returns `Ok(None)`
    ///   (absence is not an error). With `single_loader`, coalesces
    ///   concurrent misses for `key` through [`SingleFlight`]. With
    ///   `batch_loader`, enqueues into [`BatchCoalescer`].
    ///
    /// At most one of `single_loader`/`batch_loader` may be supplied; both
    /// being `Some` is a programmer error surfaced before any state
    /// mutation.
    pub async fn get(
        &self,
        key: K,
        single_loader: Option<SingleLoaderFn<V>>,
        batch_loader: Option<(LoaderId, BatchLoaderFn<K, V>)>,
        ttl: TtlSetting,
    ) -> Result<Option<V>> {
        if single_loader.is_some() && batch_loader.is_some() {
            return Err(CacheError::BothLoadersSupplied);
        }

        if let Some(value) = self.store.get(&key) {
            self.counters.record_hit();
            return Ok(Some(value));
        }
        self.counters.record_miss();

        let effective_ttl = ttl.resolve(self.default_ttl);

        if let Some(loader) = single_loader {
            let store = self.store.clone();
            let load_key = key.clone();
            let outcome = self
                .single_flight
                .run(key, move || async move {
                    let value = loader().await?;
                    store.put_with_ttl(load_key, value.clone(), effective_ttl);
                    Ok(value)
                })
                .await?;
            return Ok(Some(outcome));
        }

        if let Some((loader_id, loader)) = batch_loader {
            return self.batch.enqueue(key, loader_id, loader, effective_ttl).await;
        }

        Ok(None)
    }

    /// Inserts or updates `key`. `ttl` resolves against the cache's
    /// `default_ttl` per [`TtlSetting::resolve`].
    pub fn set(&self, key: K, value: V, ttl: TtlSetting) {
        let effective_ttl = ttl.resolve(self.default_ttl);
        self.store.put_with_ttl(key, value, effective_ttl);
    }

    /// Removes `key` if present. Absent is not an error.
    ///
    /// A single-flight load already in progress for `key` is unaffected:
    /// when it resolves it still writes its value. Cancelling the
    /// in-flight load instead would not remove the race, only relocate
    /// it, since a `delete` landing after a cancellation check but before
    /// the in-flight write is indistinguishable from not cancelling at
    /// all; the simpler behaviour is the one callers can already reason
    /// about.
    pub fn delete(&self, key: &K) {
        self.store.delete(key);
    }

    /// Removes every entry and resets `hits`/`misses` to zero.
    pub fn clear(&self) {
        self.store.clear();
        self.counters.reset();
    }

    /// Returns a snapshot of `{hits, misses, size, hit_rate}`.
    #[must_use]
    pub fn metrics(&self) -> Metrics {
        self.counters.snapshot(self.store.size())
    }

    /// Sequentially `get`s each `(key, loader)` pair, populating any key
    /// not already present. Existing entries are left untouched: warmup
    /// observes cache semantics, not `set` semantics.
    pub async fn warmup<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, SingleLoaderFn<V>)>,
    {
        for (key, loader) in entries {
            self.get(key, Some(loader), None, TtlSetting::Unset).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchResult;
    use std::collections::HashMap as StdHashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    fn facade(maxsize: usize) -> CacheFacade<String, String> {
        CacheFacade::new(CacheConfig {
            maxsize: std::num::NonZeroUsize::new(maxsize),
            ..CacheConfig::default()
        })
    }

    #[tokio::test]
    async fn read_your_write() {
        let cache = facade(128);
        cache.set("k".into(), "v".into(), TtlSetting::Unset);
        let value = cache.get("k".into(), None, None, TtlSetting::Unset).await.unwrap();
        assert_eq!(value, Some("v".to_string()));
        assert_eq!(cache.metrics().hits, 1);
    }

    #[tokio::test]
    async fn miss_without_loader_returns_none() {
        let cache = facade(128);
        let value = cache.get("missing".into(), None, None, TtlSetting::Unset).await.unwrap();
        assert_eq!(value, None);
        assert_eq!(cache.metrics().misses, 1);
    }

    #[tokio::test]
    async fn both_loaders_is_a_programmer_error() {
        let cache = facade(128);
        let single = single_loader(|| async { Ok("v".to_string()) });
        let batch: BatchLoaderFn<String, String> = Arc::new(|keys| {
            Box::pin(async move { Ok(BatchResult::Ordered(keys.into_iter().map(|_| None).collect())) })
        });
        let result = cache
            .get("k".into(), Some(single), Some((1, batch)), TtlSetting::Unset)
            .await;
        assert!(matches!(result, Err(CacheError::BothLoadersSupplied)));
        assert_eq!(cache.metrics().hits + cache.metrics().misses, 0, "no mutation on programmer error");
    }

    #[tokio::test]
    async fn herd_scenario_500_concurrent_misses_one_load() {
        let cache = Arc::new(facade(128));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..500 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                let loader = single_loader(move || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(StdDuration::from_millis(100)).await;
                        Ok::<_, CacheError>("v".to_string())
                    }
                });
                cache.get("k".into(), Some(loader), None, TtlSetting::Unset).await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Some("v".to_string()));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 0);
        assert_eq!(metrics.misses, 500);
        assert_eq!(metrics.size, 1);
    }

    #[tokio::test]
    async fn loader_failure_is_not_negatively_cached() {
        let cache = facade(128);

        let failing = single_loader(|| async { Err(CacheError::loader_message("boom")) });
        let first = cache.get("k".into(), Some(failing), None, TtlSetting::Unset).await;
        assert!(first.is_err());

        let succeeding = single_loader(|| async { Ok("ok".to_string()) });
        let second = cache.get("k".into(), Some(succeeding), None, TtlSetting::Unset).await;
        assert_eq!(second.unwrap(), Some("ok".to_string()));
    }

    #[tokio::test]
    async fn ttl_override_beats_cache_default() {
        let cache = CacheFacade::<String, String>::new(CacheConfig {
            default_ttl: Some(StdDuration::from_secs(10)),
            ..CacheConfig::default()
        });
        cache.set("short".into(), "v".into(), TtlSetting::ExplicitSeconds(0));
        cache.set("long".into(), "v".into(), TtlSetting::Unset);

        tokio::time::sleep(StdDuration::from_millis(20)).await;

        assert_eq!(cache.get("short".into(), None, None, TtlSetting::Unset).await.unwrap(), None);
        assert_eq!(
            cache.get("long".into(), None, None, TtlSetting::Unset).await.unwrap(),
            Some("v".to_string())
        );
    }

    #[tokio::test]
    async fn clear_resets_counters_and_entries() {
        let cache = facade(128);
        cache.set("k".into(), "v".into(), TtlSetting::Unset);
        cache.get("k".into(), None, None, TtlSetting::Unset).await.unwrap();
        cache.get("missing".into(), None, None, TtlSetting::Unset).await.unwrap();
        cache.clear();
        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 0);
        assert_eq!(metrics.misses, 0);
        assert_eq!(metrics.size, 0);
    }

    #[tokio::test]
    async fn warmup_skips_already_present_keys() {
        let cache = facade(128);
        cache.set("k".into(), "original".into(), TtlSetting::Unset);

        let calls = Arc::new(AtomicUsize::new(0));
        let mut entries: StdHashMap<String, SingleLoaderFn<String>> = StdHashMap::new();
        let counter = calls.clone();
        entries.insert(
            "k".to_string(),
            single_loader(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok("from-loader".to_string()) }
            }),
        );
        cache.warmup(entries).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0, "warmup must not overwrite existing entries");
        assert_eq!(
            cache.get("k".into(), None, None, TtlSetting::Unset).await.unwrap(),
            Some("original".to_string())
        );
    }
}
