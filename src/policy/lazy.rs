use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::errors::ClientError;
use crate::model::config::ConfigEntry;
use crate::policy::core::{older_than, PolicyCore};

/// Downloads the config JSON on reads, when the current one is older than the cache TTL.
pub struct LazyLoadingPolicy {
    core: Arc<PolicyCore>,
    cache_ttl: Duration,
    use_async_refresh: bool,
    refreshing: Arc<AtomicBool>,
    token: CancellationToken,
}

impl LazyLoadingPolicy {
    pub fn new(core: Arc<PolicyCore>, cache_ttl: Duration, use_async_refresh: bool) -> Self {
        core.sync_cache();
        core.mark_initialized();
        Self {
            core,
            cache_ttl,
            use_async_refresh,
            refreshing: Arc::new(AtomicBool::new(false)),
            token: CancellationToken::new(),
        }
    }

    pub async fn get_configuration(&self) -> Arc<ConfigEntry> {
        let current = self.core.sync_cache();
        let threshold = older_than(self.cache_ttl);
        if current.fetch_time > threshold || self.core.is_offline() {
            return current;
        }
        if self.use_async_refresh && !current.is_empty() {
            self.refresh_in_background(threshold);
            return current;
        }
        // Failures are logged by the fetcher, readers get what's available.
        _ = self.core.fetch_if_older(threshold).await;
        self.core.current()
    }

    pub async fn refresh(&self) -> Result<bool, ClientError> {
        self.core.fetch_if_older(DateTime::<Utc>::MAX_UTC).await
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn core(&self) -> &Arc<PolicyCore> {
        &self.core
    }

    fn refresh_in_background(&self, threshold: DateTime<Utc>) {
        if self.refreshing.swap(true, Ordering::SeqCst) {
            return;
        }
        let core = Arc::clone(&self.core);
        let refreshing = Arc::clone(&self.refreshing);
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = core.fetch_if_older(threshold) => {},
                _ = token.cancelled() => {},
            }
            refreshing.store(false, Ordering::SeqCst);
        });
    }
}

impl Drop for LazyLoadingPolicy {
    fn drop(&mut self) {
        self.close();
    }
}
