//! Error types for the cache layer
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache layer.
///
/// "Not found" is never an error anywhere in this crate; lookups report it
/// through `Option` or [`Cached`](crate::keyed::Cached).
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backing store rejected or failed an operation
    #[error("Backend error: {0}")]
    Backend(String),

    /// A value could not be encoded or a cached payload could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The cache store failed (connectivity, protocol)
    #[error("Cache store error: {0}")]
    Store(String),

    /// The backend write succeeded but the cached view could not be refreshed.
    ///
    /// The write is authoritative and is not rolled back; stale entries live
    /// until the next successful invalidation or their TTL runs out.
    #[error("Cache left stale after write ({affected} rows): {reason}")]
    StaleAfterWrite { affected: u64, reason: String },

    /// A per-call deadline elapsed
    #[error("Deadline elapsed during {0}")]
    Timeout(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CacheError {
    /// True for the warning-grade class: backend write stood, cache is stale.
    pub fn is_stale_warning(&self) -> bool {
        matches!(self, CacheError::StaleAfterWrite { .. })
    }

    /// Wraps a cache failure that happened after a successful backend write.
    pub(crate) fn stale(affected: u64, cause: CacheError) -> Self {
        match cause {
            CacheError::StaleAfterWrite { reason, .. } => {
                CacheError::StaleAfterWrite { affected, reason }
            }
            other => CacheError::StaleAfterWrite {
                affected,
                reason: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;
