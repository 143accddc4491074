use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{watch, Mutex};

use crate::cache::{ConfigCache, ConfigJsonCache};
use crate::errors::{ClientError, ErrorKind};
use crate::fetch::fetcher::{FetchResponse, Fetcher};
use crate::model::config::ConfigEntry;
use crate::model::enums::ClientCacheState;

/// State shared by every refresh policy: the collaborators and the serialized fetch logic.
pub struct PolicyCore {
    fetcher: Arc<Fetcher>,
    cache: Arc<dyn ConfigCache>,
    json_cache: Arc<ConfigJsonCache>,
    sdk_key: String,
    offline: AtomicBool,
    fetch_lock: Mutex<()>,
    init: watch::Sender<bool>,
}

impl PolicyCore {
    pub fn new(
        fetcher: Arc<Fetcher>,
        cache: Arc<dyn ConfigCache>,
        json_cache: Arc<ConfigJsonCache>,
        sdk_key: &str,
        offline: bool,
    ) -> Self {
        let (init, _) = watch::channel(false);
        Self {
            fetcher,
            cache,
            json_cache,
            sdk_key: sdk_key.to_owned(),
            offline: AtomicBool::new(offline),
            fetch_lock: Mutex::new(()),
            init,
        }
    }

    /// Brings the in-memory snapshot up to date with the external cache and returns it.
    pub fn sync_cache(&self) -> Arc<ConfigEntry> {
        self.json_cache.sync_from(self.cache.as_ref());
        self.json_cache.current()
    }

    pub fn current(&self) -> Arc<ConfigEntry> {
        self.json_cache.current()
    }

    /// Downloads the config JSON when the current snapshot's fetch time is not after `threshold`.
    /// Returns `true` when a new config JSON was stored.
    pub async fn fetch_if_older(&self, threshold: DateTime<Utc>) -> Result<bool, ClientError> {
        let _guard = self.fetch_lock.lock().await;
        let current = self.sync_cache();
        if current.fetch_time > threshold {
            self.mark_initialized();
            return Ok(false);
        }
        if self.is_offline() {
            self.mark_initialized();
            return Err(offline_error());
        }
        let result = match self.fetcher.fetch(current.etag.as_str()).await {
            FetchResponse::Fetched(entry) => {
                self.json_cache.store(entry, self.cache.as_ref());
                Ok(true)
            }
            FetchResponse::NotModified => {
                self.json_cache
                    .store(current.with_time(Utc::now()), self.cache.as_ref());
                Ok(false)
            }
            FetchResponse::Failed(err, transient) => {
                if !transient && !current.is_empty() {
                    self.json_cache
                        .store(current.with_time(Utc::now()), self.cache.as_ref());
                }
                Err(err)
            }
        };
        self.mark_initialized();
        result
    }

    pub fn mark_initialized(&self) {
        self.init.send_if_modified(|initialized| {
            if *initialized {
                return false;
            }
            *initialized = true;
            true
        });
    }

    #[cfg(test)]
    pub fn is_initialized(&self) -> bool {
        *self.init.borrow()
    }

    /// Waits at most `timeout` for the first completed fetch attempt. Returns `false` on timeout.
    pub async fn wait_initialized(&self, timeout: Duration) -> bool {
        let mut rx = self.init.subscribe();
        let ready = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|initialized| *initialized)).await,
            Ok(Ok(_))
        );
        ready
    }

    pub fn cache_state(&self, fresh_for: Option<Duration>) -> ClientCacheState {
        let current = self.current();
        if current.is_empty() {
            return ClientCacheState::NoFlagData;
        }
        match fresh_for {
            Some(period) if current.fetch_time > older_than(period) => {
                ClientCacheState::HasUpToDateFlagData
            }
            _ => ClientCacheState::HasCachedFlagDataOnly,
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    #[cfg(test)]
    pub fn cache(&self) -> &Arc<dyn ConfigCache> {
        &self.cache
    }

    #[cfg(test)]
    pub fn json_cache(&self) -> &Arc<ConfigJsonCache> {
        &self.json_cache
    }

    #[cfg(test)]
    pub fn sdk_key(&self) -> &str {
        self.sdk_key.as_str()
    }
}

/// The point in time `period` before now.
pub fn older_than(period: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(period)
        .ok()
        .and_then(|delta| Utc::now().checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn offline_error() -> ClientError {
    ClientError::new(
        ErrorKind::OfflineClient,
        "Client is in offline mode, it cannot initiate HTTP calls.".to_owned(),
    )
}

#[cfg(test)]
pub mod core_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use mockito::Matcher;
    use reqwest::header::{ETAG, IF_NONE_MATCH};

    use crate::cache::cache_tests::SingleValueCache;
    use crate::cache::{ConfigCache, ConfigJsonCache};
    use crate::constants::test_constants::{MOCK_KEY, MOCK_PATH};
    use crate::errors::ErrorKind;
    use crate::fetch::fetcher::Fetcher;
    use crate::model::config::entry_from_json;
    use crate::model::enums::ClientCacheState;
    use crate::policy::core::PolicyCore;

    pub fn body(value: &str) -> String {
        format!(r#"{{"f":{{"key":{{"t":1,"v":{{"s":"{value}"}}}}}}}}"#)
    }

    pub fn new_core(url: String, mode: &str, cache: Arc<dyn ConfigCache>) -> PolicyCore {
        let fetcher =
            Fetcher::new(url, true, MOCK_KEY, mode, Duration::from_secs(30)).unwrap();
        PolicyCore::new(
            Arc::new(fetcher),
            cache,
            Arc::new(ConfigJsonCache::new(MOCK_KEY, mode)),
            MOCK_KEY,
            false,
        )
    }

    #[tokio::test]
    async fn fetch_stores_and_restamps() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", MOCK_PATH)
            .match_header(IF_NONE_MATCH.as_str(), Matcher::Missing)
            .with_status(200)
            .with_header(ETAG.as_str(), "etag1")
            .with_body(body("test1"))
            .create_async()
            .await;
        let second = server
            .mock("GET", MOCK_PATH)
            .match_header(IF_NONE_MATCH.as_str(), "etag1")
            .with_status(304)
            .create_async()
            .await;

        let cache = Arc::new(SingleValueCache::default());
        let core = new_core(server.url(), "m", cache.clone());
        assert!(!core.is_initialized());
        assert!(core.fetch_if_older(DateTime::<Utc>::MAX_UTC).await.unwrap());
        assert!(core.is_initialized());
        let fetched = core.current();

        assert!(!core.fetch_if_older(DateTime::<Utc>::MAX_UTC).await.unwrap());
        let restamped = core.current();
        assert_eq!(restamped.etag, "etag1");
        assert!(restamped.fetch_time >= fetched.fetch_time);
        assert!(Arc::ptr_eq(&restamped.config, &fetched.config));
        assert_eq!(
            cache.read(core.json_cache().cache_key()),
            Some(restamped.serialize())
        );

        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn fresh_snapshot_is_not_refetched() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", MOCK_PATH)
            .with_status(200)
            .with_body(body("test1"))
            .expect(1)
            .create_async()
            .await;

        let core = new_core(server.url(), "l", Arc::new(SingleValueCache::default()));
        core.fetch_if_older(Utc::now()).await.unwrap();
        assert!(!core.fetch_if_older(Utc::now() - chrono::Duration::minutes(1)).await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn invalid_sdk_key_keeps_data() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", MOCK_PATH)
            .with_status(404)
            .create_async()
            .await;

        let cache = Arc::new(SingleValueCache::default());
        let core = new_core(server.url(), "m", cache.clone());
        let stale = entry_from_json(body("cached").as_str(), "etag0", Utc::now() - chrono::Duration::hours(1)).unwrap();
        cache.write(core.json_cache().cache_key(), stale.serialize().as_str());

        let err = core.fetch_if_older(DateTime::<Utc>::MAX_UTC).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidSdkKey);
        let current = core.current();
        assert_eq!(current.etag, "etag0");
        assert!(current.fetch_time > stale.fetch_time);
    }

    #[tokio::test]
    async fn offline_fails_without_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", MOCK_PATH)
            .expect(0)
            .create_async()
            .await;

        let core = new_core(server.url(), "m", Arc::new(SingleValueCache::default()));
        core.set_offline(true);
        let err = core.fetch_if_older(DateTime::<Utc>::MAX_UTC).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::OfflineClient);
        assert!(core.is_initialized());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn cache_states() {
        let cache = Arc::new(SingleValueCache::default());
        let core = new_core("http://localhost".to_owned(), "m", cache.clone());
        assert_eq!(core.cache_state(None), ClientCacheState::NoFlagData);

        let entry = entry_from_json(body("x").as_str(), "etag", Utc::now()).unwrap();
        cache.write(core.json_cache().cache_key(), entry.serialize().as_str());
        core.sync_cache();
        assert_eq!(core.cache_state(None), ClientCacheState::HasCachedFlagDataOnly);
        assert_eq!(
            core.cache_state(Some(Duration::from_secs(60))),
            ClientCacheState::HasUpToDateFlagData
        );
    }

    #[tokio::test]
    async fn wait_initialized_times_out() {
        let core = new_core(
            "http://localhost".to_owned(),
            "a",
            Arc::new(SingleValueCache::default()),
        );
        assert!(!core.wait_initialized(Duration::from_millis(50)).await);
        core.mark_initialized();
        assert!(core.wait_initialized(Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn wait_initialized_wakes_on_mark() {
        let core = Arc::new(new_core(
            "http://localhost".to_owned(),
            "a",
            Arc::new(SingleValueCache::default()),
        ));
        let waiter = {
            let core = Arc::clone(&core);
            tokio::spawn(async move { core.wait_initialized(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        core.mark_initialized();
        assert!(waiter.await.unwrap());
    }
}
