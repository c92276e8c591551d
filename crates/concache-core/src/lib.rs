//! An in-process asynchronous cache: bounded LRU retention, optional
//! per-entry TTL, single-flight coalescing of same-key misses, and batch
//! coalescing of cross-key misses sharing a loader.
//!
//! [`CacheFacade`] is the entry point most callers want; [`decorate::cached`]
//! wraps a plain async function behind one without hand-deriving keys.
//! Everything else in this crate is a component `CacheFacade` composes:
//! [`store::LruStore`], [`single_flight::SingleFlight`], and
//! [`batch::BatchCoalescer`].

pub mod batch;
pub mod config;
pub mod decorate;
pub mod error;
pub mod facade;
pub mod key;
pub mod metrics;
pub mod single_flight;
pub mod store;

pub use config::{CacheConfig, TtlSetting};
pub use decorate::{cached, CachedFn};
pub use error::{CacheError, Result};
pub use facade::{single_loader, CacheFacade, SingleLoaderFn};
pub use key::CacheKey;
pub use metrics::Metrics;
