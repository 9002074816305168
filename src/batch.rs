use futures::future::try_join_all;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::FetchError;
use crate::hn_client::ItemSource;
use crate::models::Item;

/// Caps how many item requests are in flight at once, shared by every batch
/// that goes through the same limiter.
#[derive(Clone)]
pub struct RequestLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl RequestLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    async fn acquire(&self) -> Result<SemaphorePermit<'_>, FetchError> {
        self.semaphore.acquire().await.map_err(|_| FetchError::Cancelled)
    }
}

/// Resolve every id into a record, all or nothing.
///
/// Results come back in the order of `ids`. Tombstones (null, deleted or dead
/// items) are dropped from the result; any other failure fails the whole
/// batch and the remaining requests are abandoned.
pub async fn resolve_batch<T, F>(
    source: &dyn ItemSource,
    limiter: &RequestLimiter,
    ids: &[u64],
    convert: F,
) -> Result<Vec<T>, FetchError>
where
    F: Fn(Item) -> Result<T, FetchError>,
{
    let convert = &convert;
    let fetches = ids.iter().map(|&id| async move {
        let _permit = limiter.acquire().await?;
        match source.item(id).await.and_then(convert) {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_tombstone() => {
                tracing::debug!(item_id = id, "skipping tombstoned item");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(item_id = id, "item fetch failed: {e}");
                Err(e)
            }
        }
    });

    let resolved = try_join_all(fetches).await?;
    Ok(resolved.into_iter().flatten().collect())
}
