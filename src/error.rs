//! Error taxonomy for the governance layer.
//!
//! Three kinds of failure exist in this crate, and only two of them are
//! errors:
//!
//! - [`ConfigError`]: a limiter was configured with invalid parameters.
//! - [`FetchError`]: an opaque wrapper around whatever a supplied fetcher
//!   failed with. The cache passes it through untouched, to the original
//!   caller and to every co-waiter of a coalesced fetch.
//! - Capacity exhaustion is **not** an error: `acquire` returns a
//!   [`Verdict`](crate::Verdict) with `allowed = false` and a wait hint,
//!   and the caller decides what to do with it.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Invalid rate limiter parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid rate limiter configuration: {0}")]
pub struct ConfigError(pub(crate) String);

impl ConfigError {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Opaque failure from a caller-supplied fetcher.
///
/// The source error is held behind an `Arc` so the *same* error value can be
/// handed to every task awaiting a coalesced fetch. Cloning is cheap and the
/// original error stays reachable through [`std::error::Error::source`].
#[derive(Clone)]
pub struct FetchError {
    source: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl FetchError {
    /// Wraps any error produced by a fetcher.
    pub fn new<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            source: Arc::new(source),
        }
    }

    /// Wraps a plain message, for fetchers without a structured error type.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            source: Arc::new(MessageError(message.into())),
        }
    }

    /// The underlying fetcher error.
    pub fn source_err(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetch failed: {}", self.source)
    }
}

impl fmt::Debug for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FetchError").field(&self.source).finish()
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct MessageError(String);

/// Crate-wide error type.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Invalid limiter parameters.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A caller-supplied fetcher failed; propagated unmodified.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
