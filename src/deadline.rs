//! Per-call deadlines
//!
//! Dropping a future cancels it; this adds an optional upper bound on how
//! long a single cache-store or backend call may take.

use std::future::Future;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Awaits `fut`, failing with [`CacheError::Timeout`] once `limit` elapses.
pub(crate) async fn within<T, F>(limit: Option<Duration>, op: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| CacheError::Timeout(op.to_string()))?,
        None => fut.await,
    }
}
