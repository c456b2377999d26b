use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;

use crate::error::Result;
use crate::model::leave_request::LeaveRequest;

/// Read-through cache of leave requests keyed by id.
///
/// Entries are only ever dropped, never patched: every successful mutation
/// invalidates its id and the next read reloads from the store.
///
/// A load that overlaps an invalidation may have read the old row, so its
/// result is dropped again once the invalidation epoch has moved.
#[derive(Clone)]
pub struct RequestCache {
    entries: Cache<String, LeaveRequest>,
    epoch: Arc<AtomicU64>,
}

impl RequestCache {
    pub fn new(capacity: u64, ttl_secs: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(Duration::from_secs(ttl_secs))
                .build(),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cached copy, or whatever `load` finds. Misses are not cached.
    pub async fn get_or_load<F, Fut>(&self, id: &str, load: F) -> Result<Option<LeaveRequest>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<LeaveRequest>>>,
    {
        if let Some(hit) = self.entries.get(id).await {
            return Ok(Some(hit));
        }

        let started = self.epoch.load(Ordering::SeqCst);
        let loaded = load().await?;
        if let Some(leave) = &loaded {
            self.entries.insert(id.to_string(), leave.clone()).await;

            // an invalidation ran while loading; what we read may predate it
            if self.epoch.load(Ordering::SeqCst) != started {
                self.entries.invalidate(id).await;
            }
        }

        Ok(loaded)
    }

    /// Must be called after the mutation is committed.
    pub async fn invalidate(&self, id: &str) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.entries.invalidate(id).await;
    }

    #[cfg(test)]
    pub async fn contains(&self, id: &str) -> bool {
        self.entries.get(id).await.is_some()
    }
}
