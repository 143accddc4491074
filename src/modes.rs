use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked by [`PollingMode::AutoPoll`] when a refresh produced a new config JSON.
pub type OnConfigChanged = Arc<dyn Fn() + Send + Sync>;

/// Describes the polling modes.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use configcat_core::PollingMode;
///
/// let auto = PollingMode::auto_poll(Duration::from_secs(30));
/// let lazy = PollingMode::lazy_load(Duration::from_secs(120));
/// assert_eq!(auto.identifier(), "a");
/// assert_eq!(lazy.identifier(), "l");
/// assert_eq!(PollingMode::Manual.identifier(), "m");
/// ```
#[derive(Clone)]
pub enum PollingMode {
    /// The config JSON is downloaded by a background task at `interval`.
    AutoPoll {
        /// Time between two polls. Must be at least 1 second.
        interval: Duration,
        /// How long the first evaluation waits for the initial download.
        max_init_wait: Duration,
        /// Invoked when the downloaded config JSON changed.
        on_change: Option<OnConfigChanged>,
    },
    /// The config JSON is downloaded when it's requested and the cached one is older than `cache_ttl`.
    LazyLoad {
        /// How long the downloaded config JSON is considered fresh.
        cache_ttl: Duration,
        /// When `true`, an expired config JSON is served while the refresh runs in the background.
        use_async_refresh: bool,
    },
    /// The config JSON is downloaded only on explicit refresh requests.
    Manual,
}

impl PollingMode {
    /// Default time between two polls of [`PollingMode::AutoPoll`].
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
    /// Default maximum wait for the initial download of [`PollingMode::AutoPoll`].
    pub const DEFAULT_MAX_INIT_WAIT: Duration = Duration::from_secs(5);
    /// Default time to live of [`PollingMode::LazyLoad`].
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

    /// Auto polling at `interval`, with the default initial wait and no change callback.
    pub fn auto_poll(interval: Duration) -> Self {
        PollingMode::AutoPoll {
            interval,
            max_init_wait: Self::DEFAULT_MAX_INIT_WAIT,
            on_change: None,
        }
    }

    /// Lazy loading with `cache_ttl` and synchronous refresh.
    pub fn lazy_load(cache_ttl: Duration) -> Self {
        PollingMode::LazyLoad {
            cache_ttl,
            use_async_refresh: false,
        }
    }

    /// The short identifier of the mode, it's part of the cache key and the user agent.
    pub fn identifier(&self) -> &'static str {
        match self {
            PollingMode::AutoPoll { .. } => "a",
            PollingMode::LazyLoad { .. } => "l",
            PollingMode::Manual => "m",
        }
    }
}

impl Default for PollingMode {
    fn default() -> Self {
        Self::auto_poll(Self::DEFAULT_POLL_INTERVAL)
    }
}

impl Debug for PollingMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PollingMode::AutoPoll {
                interval,
                max_init_wait,
                on_change,
            } => f
                .debug_struct("AutoPoll")
                .field("interval", interval)
                .field("max_init_wait", max_init_wait)
                .field("on_change", &on_change.is_some())
                .finish(),
            PollingMode::LazyLoad {
                cache_ttl,
                use_async_refresh,
            } => f
                .debug_struct("LazyLoad")
                .field("cache_ttl", cache_ttl)
                .field("use_async_refresh", use_async_refresh)
                .finish(),
            PollingMode::Manual => f.write_str("Manual"),
        }
    }
}

#[cfg(test)]
mod modes_tests {
    use crate::PollingMode;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn identifiers() {
        let modes = vec![
            PollingMode::default(),
            PollingMode::AutoPoll {
                interval: Duration::from_secs(5),
                max_init_wait: Duration::from_secs(1),
                on_change: Some(Arc::new(|| {})),
            },
            PollingMode::lazy_load(Duration::from_secs(1)),
            PollingMode::LazyLoad {
                cache_ttl: Duration::from_secs(60),
                use_async_refresh: true,
            },
            PollingMode::Manual,
        ];
        let ids = modes.iter().map(|m| m.identifier()).collect::<Vec<&str>>();
        assert_eq!(ids, vec!["a", "a", "l", "l", "m"]);
    }

    #[test]
    fn same_parameters_same_identifier() {
        let first = PollingMode::auto_poll(Duration::from_secs(10));
        let second = first.clone();
        assert_eq!(first.identifier(), second.identifier());
        assert_ne!(
            PollingMode::lazy_load(Duration::from_secs(10)).identifier(),
            first.identifier()
        );
    }

    #[test]
    fn debug_output() {
        let mode = PollingMode::AutoPoll {
            interval: Duration::from_secs(2),
            max_init_wait: Duration::from_secs(1),
            on_change: None,
        };
        assert_eq!(
            format!("{mode:?}"),
            "AutoPoll { interval: 2s, max_init_wait: 1s, on_change: false }"
        );
        assert_eq!(format!("{:?}", PollingMode::Manual), "Manual");
    }
}
