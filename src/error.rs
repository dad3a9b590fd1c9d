//! Error types for the polycache library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Returned from cache operations. The only domain error is
//!   [`CacheError::NotFound`]; the remaining variants surface failures from
//!   user-supplied code (loader, serialization hooks) or cancellation.
//! - [`ConfigError`]: Returned when cache configuration parameters are invalid
//!   (e.g. zero capacity for a bounded eviction policy).
//!
//! [`CacheError`] is `Clone` because a single loader invocation may be shared
//! by many concurrent waiters, each of which receives the same result.
//!
//! ## Example Usage
//!
//! ```
//! use polycache::builder::CacheBuilder;
//! use polycache::error::CacheError;
//!
//! let cache = CacheBuilder::<u64, String>::new(16).lru().build();
//! let missing = cache.get_if_present(&1).unwrap_err();
//! assert!(matches!(missing, CacheError::NotFound));
//! ```

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Boxed error type accepted from user-supplied loaders and hooks.
pub type DynError = Box<dyn Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Error returned from cache read, write, and load operations.
#[derive(Debug, Clone)]
pub enum CacheError {
    /// The key is absent or expired, and no loader produced a value.
    ///
    /// Also returned by the non-blocking load path while a load for the key
    /// is still in flight.
    NotFound,

    /// The loader returned an error, or panicked (the panic is captured and
    /// converted so one bad load does not poison future loads).
    Loader(Arc<dyn Error + Send + Sync + 'static>),

    /// A serialize/deserialize hook returned an error.
    Serialization(Arc<dyn Error + Send + Sync + 'static>),

    /// The supplied context was cancelled before the load produced a result.
    Cancelled,
}

impl CacheError {
    /// Returns `true` if this is the not-found sentinel.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound)
    }

    pub(crate) fn loader(err: DynError) -> Self {
        CacheError::Loader(Arc::from(err))
    }

    pub(crate) fn serialization(err: DynError) -> Self {
        CacheError::Serialization(Arc::from(err))
    }

    /// Converts a captured panic payload into a loader error.
    pub(crate) fn loader_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        CacheError::Loader(Arc::new(LoaderPanic(message)))
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::NotFound => f.write_str("key not found"),
            CacheError::Loader(err) => write!(f, "loader failed: {err}"),
            CacheError::Serialization(err) => write!(f, "serialization hook failed: {err}"),
            CacheError::Cancelled => f.write_str("operation cancelled"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CacheError::Loader(err) | CacheError::Serialization(err) => {
                let source: &(dyn Error + 'static) = err.as_ref();
                Some(source)
            },
            _ => None,
        }
    }
}

/// Error wrapper for a panic raised inside a loader.
#[derive(Debug)]
struct LoaderPanic(String);

impl fmt::Display for LoaderPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loader panicked: {}", self.0)
    }
}

impl Error for LoaderPanic {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`CacheBuilder::try_build`](crate::builder::CacheBuilder::try_build).
/// Carries a human-readable description of which parameter failed validation.
///
/// # Example
///
/// ```
/// use polycache::builder::CacheBuilder;
///
/// let err = CacheBuilder::<u64, u64>::new(0).arc().try_build().unwrap_err();
/// assert!(err.to_string().contains("capacity"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
