//! Error types for `concache`.
//!
//! A single error enum covers every failure mode the core can produce.
//! Loader failures carry the caller's error behind an `Arc` so that one
//! outcome can be cloned to every single-flight or batch waiter without
//! re-running the loader.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Result type alias for `concache` operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur in `concache` operations.
///
/// Error codes follow the pattern `CONCACHE-XXX` for easy log grepping.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The caller's loader signalled failure (CONCACHE-001).
    ///
    /// Propagated verbatim to every waiter of the load; never cached.
    #[error("[CONCACHE-001] loader failed: {0}")]
    Loader(#[source] Arc<dyn StdError + Send + Sync>),

    /// The awaiting task (or the single-flight leader) was cancelled
    /// before a result was produced (CONCACHE-002).
    #[error("[CONCACHE-002] load was cancelled before completion")]
    Cancelled,

    /// Both `single_loader` and `batch_loader` were supplied to one
    /// `get` call (CONCACHE-003).
    #[error("[CONCACHE-003] at most one loader may be supplied per get() call")]
    BothLoadersSupplied,

    /// A batch loader returned a list whose length does not match the
    /// number of keys it was given (CONCACHE-004).
    #[error("[CONCACHE-004] batch loader returned {actual} results for {expected} keys")]
    BatchLengthMismatch {
        /// Number of keys the loader was invoked with.
        expected: usize,
        /// Number of results the loader returned.
        actual: usize,
    },
}

impl CacheError {
    /// Returns the error code (e.g. `"CONCACHE-001"`).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Loader(_) => "CONCACHE-001",
            Self::Cancelled => "CONCACHE-002",
            Self::BothLoadersSupplied => "CONCACHE-003",
            Self::BatchLengthMismatch { .. } => "CONCACHE-004",
        }
    }

    /// Wraps an arbitrary loader error.
    pub fn from_loader<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Loader(Arc::new(err))
    }

    /// Wraps a loader error that is only a displayable message, for
    /// loaders that report failure as a plain string.
    #[must_use]
    pub fn loader_message(message: impl Into<String>) -> Self {
        Self::Loader(Arc::new(LoaderMessage(message.into())))
    }
}

/// Adapts a plain string into a `std::error::Error` for [`CacheError::loader_message`].
#[derive(Debug)]
struct LoaderMessage(String);

impl fmt::Display for LoaderMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for LoaderMessage {}
