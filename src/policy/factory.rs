use std::sync::Arc;

use crate::cache::{ConfigCache, ConfigJsonCache, EmptyConfigCache};
use crate::fetch::fetcher::Fetcher;
use crate::modes::PollingMode;
use crate::policy::auto::AutoPollingPolicy;
use crate::policy::core::PolicyCore;
use crate::policy::lazy::LazyLoadingPolicy;
use crate::policy::manual::ManualPollingPolicy;
use crate::policy::RefreshPolicy;

/// Builds the [`RefreshPolicy`] that belongs to a [`PollingMode`], wired with shared collaborators.
pub struct RefreshPolicyFactory {
    fetcher: Arc<Fetcher>,
    cache: Arc<dyn ConfigCache>,
    json_cache: Arc<ConfigJsonCache>,
    sdk_key: String,
    offline: bool,
}

impl RefreshPolicyFactory {
    pub fn new(
        fetcher: Arc<Fetcher>,
        cache: Option<Arc<dyn ConfigCache>>,
        json_cache: Arc<ConfigJsonCache>,
        sdk_key: &str,
    ) -> Self {
        Self {
            fetcher,
            cache: cache.unwrap_or_else(|| Arc::new(EmptyConfigCache::new())),
            json_cache,
            sdk_key: sdk_key.to_owned(),
            offline: false,
        }
    }

    /// Policies created afterwards start in offline mode.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn create(&self, mode: &PollingMode) -> RefreshPolicy {
        let core = Arc::new(PolicyCore::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.cache),
            Arc::clone(&self.json_cache),
            self.sdk_key.as_str(),
            self.offline,
        ));
        match mode {
            PollingMode::AutoPoll {
                interval,
                max_init_wait,
                on_change,
            } => RefreshPolicy::AutoPoll(AutoPollingPolicy::new(
                core,
                *interval,
                *max_init_wait,
                on_change.clone(),
            )),
            PollingMode::LazyLoad {
                cache_ttl,
                use_async_refresh,
            } => RefreshPolicy::LazyLoad(LazyLoadingPolicy::new(
                core,
                *cache_ttl,
                *use_async_refresh,
            )),
            PollingMode::Manual => RefreshPolicy::Manual(ManualPollingPolicy::new(core)),
        }
    }
}

#[cfg(test)]
mod factory_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::cache::cache_tests::SingleValueCache;
    use crate::cache::{ConfigCache, ConfigJsonCache};
    use crate::constants::test_constants::MOCK_KEY;
    use crate::fetch::fetcher::Fetcher;
    use crate::modes::PollingMode;
    use crate::policy::factory::RefreshPolicyFactory;
    use crate::policy::RefreshPolicy;

    fn parts() -> (Arc<Fetcher>, Arc<dyn ConfigCache>, Arc<ConfigJsonCache>) {
        let fetcher = Fetcher::new(
            "http://localhost".to_owned(),
            true,
            MOCK_KEY,
            "m",
            Duration::from_secs(30),
        )
        .unwrap();
        let cache: Arc<dyn ConfigCache> = Arc::new(SingleValueCache::default());
        (
            Arc::new(fetcher),
            cache,
            Arc::new(ConfigJsonCache::new(MOCK_KEY, "m")),
        )
    }

    #[tokio::test]
    async fn each_mode_gets_its_policy_with_shared_parts() {
        let (fetcher, cache, json_cache) = parts();
        let factory = RefreshPolicyFactory::new(
            Arc::clone(&fetcher),
            Some(Arc::clone(&cache)),
            Arc::clone(&json_cache),
            MOCK_KEY,
        )
        .offline(true);
        let modes = vec![
            PollingMode::auto_poll(Duration::from_secs(60)),
            PollingMode::lazy_load(Duration::from_secs(60)),
            PollingMode::Manual,
        ];
        let mut kinds = Vec::new();
        for mode in modes.iter() {
            let policy = factory.create(mode);
            let core = policy.core();
            assert!(Arc::ptr_eq(core.fetcher(), &fetcher));
            assert!(Arc::ptr_eq(core.cache(), &cache));
            assert!(Arc::ptr_eq(core.json_cache(), &json_cache));
            assert_eq!(core.sdk_key(), MOCK_KEY);
            assert!(policy.is_offline());
            kinds.push(match policy {
                RefreshPolicy::AutoPoll(ref auto) => {
                    assert_eq!(auto.interval(), Duration::from_secs(60));
                    "auto"
                }
                RefreshPolicy::LazyLoad(ref lazy) => {
                    assert_eq!(lazy.cache_ttl(), Duration::from_secs(60));
                    "lazy"
                }
                RefreshPolicy::Manual(_) => "manual",
            });
            policy.close();
        }
        assert_eq!(kinds, vec!["auto", "lazy", "manual"]);
    }

    #[tokio::test]
    async fn auto_poll_interval_has_lower_bound() {
        let (fetcher, _, json_cache) = parts();
        let factory = RefreshPolicyFactory::new(fetcher, None, json_cache, MOCK_KEY).offline(true);
        let policy = factory.create(&PollingMode::auto_poll(Duration::from_millis(10)));
        match &policy {
            RefreshPolicy::AutoPoll(auto) => assert_eq!(auto.interval(), Duration::from_secs(1)),
            _ => panic!("auto polling policy expected"),
        }
    }

    #[tokio::test]
    async fn offline_refresh_fails() {
        let (fetcher, cache, json_cache) = parts();
        let factory =
            RefreshPolicyFactory::new(fetcher, Some(cache), json_cache, MOCK_KEY).offline(true);
        let policy = factory.create(&PollingMode::Manual);
        let err = policy.refresh().await.unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::OfflineClient);
        policy.set_offline(false);
        assert!(!policy.is_offline());
    }
}
