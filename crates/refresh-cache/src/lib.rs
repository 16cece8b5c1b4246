//! Memoizing cache that serves stale values while revalidating.
//!
//! A cache instance holds a single value produced by a [`RefreshSource`].
//! The first read loads synchronously; once the value is older than the
//! TTL, reads keep returning it immediately and at most one background
//! reload runs at a time. A failed reload keeps the stale value and is
//! retried at the next expiry.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use authgate_core_types::AuthzError;

/// TTL applied when a configurable source does not specify one.
pub const DEFAULT_TTL_SECONDS: u64 = 600;

/// Produces a fresh value for the cache. Implementations should bound
/// their own fetch time; the cache never cancels a reload.
#[async_trait]
pub trait RefreshSource<T>: Send + Sync {
    async fn load(&self) -> Result<T, AuthzError>;
}

struct Slot<T> {
    value: Option<Arc<T>>,
    loaded_at: Option<Instant>,
    refreshing: bool,
}

impl<T> Slot<T> {
    fn empty() -> Self {
        Self {
            value: None,
            loaded_at: None,
            refreshing: false,
        }
    }

    fn store(&mut self, value: Arc<T>) {
        self.value = Some(value);
        self.loaded_at = Some(Instant::now());
    }
}

/// Single-value cache with asynchronous refresh.
///
/// Clones share the same slot, so a source wrapped once is refreshed once
/// no matter how many handles exist.
pub struct AsyncRefreshCache<T> {
    ttl: Duration,
    source: Arc<dyn RefreshSource<T>>,
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Clone for AsyncRefreshCache<T> {
    fn clone(&self) -> Self {
        Self {
            ttl: self.ttl,
            source: Arc::clone(&self.source),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for AsyncRefreshCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRefreshCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> AsyncRefreshCache<T> {
    pub fn new(ttl: Duration, source: Arc<dyn RefreshSource<T>>) -> Self {
        Self {
            ttl,
            source,
            slot: Arc::new(Mutex::new(Slot::empty())),
        }
    }

    pub fn with_default_ttl(source: Arc<dyn RefreshSource<T>>) -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECONDS), source)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached value, loading it synchronously only when the
    /// cache is empty. A stale value is returned as-is while one
    /// background reload revalidates it.
    pub async fn get(&self) -> Result<Arc<T>, AuthzError> {
        let mut slot = self.slot.lock().await;
        match &slot.value {
            None => {
                // Initial load happens under the lock: concurrent first
                // readers wait for one load instead of duplicating it.
                let value = Arc::new(self.source.load().await?);
                slot.store(Arc::clone(&value));
                Ok(value)
            }
            Some(value) => {
                let value = Arc::clone(value);
                let expired = slot
                    .loaded_at
                    .map(|at| at.elapsed() >= self.ttl)
                    .unwrap_or(true);
                if expired && !slot.refreshing {
                    slot.refreshing = true;
                    self.spawn_refresh();
                }
                Ok(value)
            }
        }
    }

    fn spawn_refresh(&self) {
        let source = Arc::clone(&self.source);
        let slot = Arc::clone(&self.slot);
        tokio::spawn(async move {
            let loaded = source.load().await;
            let mut slot = slot.lock().await;
            match loaded {
                Ok(value) => {
                    slot.value = Some(Arc::new(value));
                    debug!("background refresh completed");
                }
                Err(err) => {
                    warn!(error = %err, "background refresh failed, keeping stale value");
                }
            }
            // Resets the clock on failure too: the retry happens at the
            // next expiry, not on every read.
            slot.loaded_at = Some(Instant::now());
            slot.refreshing = false;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    impl CountingSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RefreshSource<usize> for CountingSource {
        async fn load(&self) -> Result<usize, AuthzError> {
            Ok(self.calls.fetch_add(1, Ordering::SeqCst))
        }
    }

    struct FlakySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RefreshSource<String> for FlakySource {
        async fn load(&self) -> Result<String, AuthzError> {
            match self.calls.fetch_add(1, Ordering::SeqCst) {
                0 => Ok("first".to_string()),
                1 => Err(AuthzError::source("backend unavailable")),
                _ => Ok("second".to_string()),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_get_loads_synchronously() {
        let source = CountingSource::new();
        let cache = AsyncRefreshCache::new(Duration::from_secs(1), source.clone());
        assert_eq!(*cache.get().await.unwrap(), 0);
        assert_eq!(*cache.get().await.unwrap(), 0);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_get_returns_previous_value_and_refreshes_once() {
        let source = CountingSource::new();
        let cache = AsyncRefreshCache::new(Duration::from_secs(1), source.clone());
        assert_eq!(*cache.get().await.unwrap(), 0);

        tokio::time::advance(Duration::from_secs(2)).await;

        // Several reads inside the stale window: all serve the previous
        // value, and only one reload is started.
        for _ in 0..5 {
            assert_eq!(*cache.get().await.unwrap(), 0);
        }
        assert_eq!(source.calls(), 1);

        // Let the background reload run.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*cache.get().await.unwrap(), 1);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_keeps_stale_value() {
        let source = Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
        });
        let cache = AsyncRefreshCache::new(Duration::from_secs(1), source.clone());
        assert_eq!(*cache.get().await.unwrap(), "first");

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(*cache.get().await.unwrap(), "first");
        tokio::time::sleep(Duration::from_millis(10)).await;

        // The failed reload left the old value in place.
        assert_eq!(*cache.get().await.unwrap(), "first");

        // The next expiry retries and succeeds.
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(*cache.get().await.unwrap(), "first");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*cache.get().await.unwrap(), "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_load_error_propagates_and_is_retried() {
        struct FailingFirst {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl RefreshSource<u32> for FailingFirst {
            async fn load(&self) -> Result<u32, AuthzError> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AuthzError::source("cold start failure"))
                } else {
                    Ok(7)
                }
            }
        }

        let cache = AsyncRefreshCache::new(
            Duration::from_secs(1),
            Arc::new(FailingFirst {
                calls: AtomicUsize::new(0),
            }),
        );
        assert!(cache.get().await.is_err());
        assert_eq!(*cache.get().await.unwrap(), 7);
    }
}
