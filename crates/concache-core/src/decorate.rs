//! Decorator-style ergonomics atop [`CacheFacade`].
//!
//! Wraps a plain async function so every call site gets `get`/`set`
//! semantics for free, without hand-deriving a key at each call. Rust has
//! no decorator syntax, so the same idea is expressed as a struct wrapping
//! the loader closure plus a [`CacheFacade<CacheKey, V>`] keyed by
//! `(operation, args)`.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{CacheConfig, TtlSetting};
use crate::error::Result;
use crate::facade::{single_loader, CacheFacade};
use crate::key::CacheKey;
use crate::metrics::Metrics;

/// Wraps a single-argument async loader behind a [`CacheFacade`] keyed by
/// `(operation, args)`.
///
/// `A` is the loader's argument type; it must be `Serialize` so a call's
/// arguments can become a [`CacheKey`], and `Clone` because the same
/// argument value is both hashed into a key and, on a miss, moved into the
/// loader invocation.
pub struct CachedFn<F, A, V> {
    facade: Arc<CacheFacade<CacheKey, V>>,
    operation: &'static str,
    skip_args: usize,
    ttl: TtlSetting,
    func: F,
    _marker: PhantomData<fn(A)>,
}

impl<F, A, V, Fut> CachedFn<F, A, V>
where
    F: Fn(A) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<V>> + Send + 'static,
    A: Serialize + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Wraps `func` under `operation`'s key namespace, backed by `facade`.
    ///
    /// `skip_args` is the count of leading positional arguments excluded
    /// from the derived key, for wrapping a method-like closure whose
    /// first argument is a receiver that should not participate in
    /// caching identity (`A` itself is still the single value `call`
    /// takes; `skip_args` only controls what [`CacheKey::derive_positional`]
    /// treats as significant). `ttl` applies to every value stored through
    /// this wrapper.
    pub fn new(
        facade: Arc<CacheFacade<CacheKey, V>>,
        operation: &'static str,
        skip_args: usize,
        func: F,
        ttl: TtlSetting,
    ) -> Self {
        Self {
            facade,
            operation,
            skip_args,
            ttl,
            func,
            _marker: PhantomData,
        }
    }

    /// Calls the wrapped function through the cache: a hit returns the
    /// stored value, a miss runs `func` (coalesced across concurrent
    /// callers with identical `args`) and stores its result.
    pub async fn call(&self, args: A) -> Result<V> {
        let key = CacheKey::derive_positional(self.operation, &[args.clone()], self.skip_args);
        let func = self.func.clone();
        let loader = single_loader(move || func(args));
        let value = self.facade.get(key, Some(loader), None, self.ttl).await?;
        Ok(value.expect("a resolved single-loader get always yields Some"))
    }

    /// Removes the cached entry for `args`, if any.
    pub fn invalidate(&self, args: &A) {
        let key =
            CacheKey::derive_positional(self.operation, std::slice::from_ref(args), self.skip_args);
        self.facade.delete(&key);
    }

    /// Clears every entry ever cached through this wrapper, for any `args`.
    pub fn clear(&self) {
        self.facade.clear();
    }

    /// Returns the wrapped cache's current hit/miss/size snapshot.
    #[must_use]
    pub fn metrics(&self) -> Metrics {
        self.facade.metrics()
    }
}

/// Builds a [`CachedFn`] over a freshly constructed, privately-owned cache.
///
/// See [`CachedFn::new`] for what `skip_args` controls.
pub fn cached<F, A, V, Fut>(
    config: CacheConfig,
    operation: &'static str,
    skip_args: usize,
    ttl: TtlSetting,
    func: F,
) -> CachedFn<F, A, V>
where
    F: Fn(A) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<V>> + Send + 'static,
    A: Serialize + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    CachedFn::new(Arc::new(CacheFacade::new(config)), operation, skip_args, func, ttl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn repeated_calls_with_same_args_hit_the_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let wrapped = cached(CacheConfig::default(), "square", 0, TtlSetting::Unset, move |n: i64| {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok::<_, crate::error::CacheError>(n * n)
            }
        });

        assert_eq!(wrapped.call(7).await.unwrap(), 49);
        assert_eq!(wrapped.call(7).await.unwrap(), 49);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(wrapped.metrics().hits, 1);
    }

    #[tokio::test]
    async fn distinct_args_do_not_collide() {
        let wrapped = cached(CacheConfig::default(), "square", 0, TtlSetting::Unset, |n: i64| async move {
            Ok::<_, crate::error::CacheError>(n * n)
        });

        assert_eq!(wrapped.call(2).await.unwrap(), 4);
        assert_eq!(wrapped.call(3).await.unwrap(), 9);
        assert_eq!(wrapped.metrics().misses, 2);
    }

    #[tokio::test]
    async fn invalidate_forces_a_fresh_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let wrapped = cached(CacheConfig::default(), "square", 0, TtlSetting::Unset, move |n: i64| {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok::<_, crate::error::CacheError>(n * n)
            }
        });

        wrapped.call(5).await.unwrap();
        wrapped.invalidate(&5);
        wrapped.call(5).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
