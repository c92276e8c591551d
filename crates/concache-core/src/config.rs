//! Cache configuration.
//!
//! `TtlSetting` is a three-valued enum rather than an `Option<Duration>`
//! with a sentinel default, so "no override" and "explicitly no expiry"
//! can never be confused.

use std::num::NonZeroUsize;
use std::time::Duration;

/// A per-call or cache-wide TTL setting with three distinguishable states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtlSetting {
    /// No override was supplied; fall back to the cache's `default_ttl`.
    #[default]
    Unset,
    /// The caller explicitly requested no expiry, even if a cache default
    /// exists.
    ExplicitNone,
    /// The caller explicitly requested this TTL.
    ExplicitSeconds(u64),
}

impl TtlSetting {
    /// Resolves this setting against a cache-wide default, producing the
    /// effective TTL to apply: an explicit override always beats the
    /// cache default, and an explicit `null` override means no expiry
    /// even when a default exists.
    #[must_use]
    pub fn resolve(self, default_ttl: Option<Duration>) -> Option<Duration> {
        match self {
            Self::Unset => default_ttl,
            Self::ExplicitNone => None,
            Self::ExplicitSeconds(secs) => Some(Duration::from_secs(secs)),
        }
    }
}

/// Configuration for a [`crate::facade::CacheFacade`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Eviction threshold; `None` means unbounded.
    pub maxsize: Option<NonZeroUsize>,
    /// Default expiry applied when a `get`/`set` call does not override it.
    pub default_ttl: Option<Duration>,
    /// Upper bound on added latency for batch coalescing.
    pub batch_window: Duration,
    /// Size-based flush trigger for batch coalescing.
    pub max_batch_size: NonZeroUsize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            maxsize: NonZeroUsize::new(128),
            default_ttl: None,
            batch_window: Duration::from_millis(5),
            max_batch_size: NonZeroUsize::new(100).expect("100 is non-zero"),
        }
    }
}

impl CacheConfig {
    /// Starts from [`CacheConfig::default`] with an explicit `maxsize`.
    #[must_use]
    pub fn with_maxsize(mut self, maxsize: Option<NonZeroUsize>) -> Self {
        self.maxsize = maxsize;
        self
    }

    /// Starts from [`CacheConfig::default`] with an explicit `default_ttl`.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Starts from [`CacheConfig::default`] with explicit batch settings.
    #[must_use]
    pub fn with_batch(mut self, window: Duration, max_batch_size: NonZeroUsize) -> Self {
        self.batch_window = window;
        self.max_batch_size = max_batch_size;
        self
    }
}
