use std::sync::Arc;

use arc_swap::ArcSwap;
use log::warn;

use crate::constants::{CONFIG_FILE_NAME, SERIALIZATION_FORMAT_VERSION};
use crate::errors::ErrorKind;
use crate::model::config::{entry_from_cached_json, ConfigEntry};
use crate::utils::sha1;

/// A cache API used to make custom cache implementations.
pub trait ConfigCache: Sync + Send {
    /// Gets the actual value from the cache identified by the given `key`.
    fn read(&self, key: &str) -> Option<String>;

    /// Writes the given `value` to the cache by the given `key`.
    fn write(&self, key: &str, value: &str);
}

/// The cache used when no persistent cache is configured. It stores nothing.
#[derive(Default)]
pub struct EmptyConfigCache {}

impl EmptyConfigCache {
    /// Creates the empty cache.
    pub fn new() -> Self {
        Self {}
    }
}

impl ConfigCache for EmptyConfigCache {
    fn read(&self, _: &str) -> Option<String> {
        None
    }

    fn write(&self, _: &str, _: &str) {}
}

/// Holds the current config JSON snapshot in memory and keeps it in sync with a [`ConfigCache`].
pub struct ConfigJsonCache {
    cache_key: String,
    current: ArcSwap<ConfigEntry>,
    last_raw: ArcSwap<String>,
}

impl ConfigJsonCache {
    /// Creates an empty snapshot holder for the given SDK key and polling mode identifier.
    pub fn new(sdk_key: &str, mode_identifier: &str) -> Self {
        Self {
            cache_key: cache_key(sdk_key, mode_identifier),
            current: ArcSwap::from_pointee(ConfigEntry::default()),
            last_raw: ArcSwap::from_pointee(String::default()),
        }
    }

    /// The key the config JSON is stored by in the [`ConfigCache`].
    pub fn cache_key(&self) -> &str {
        self.cache_key.as_str()
    }

    /// The current snapshot.
    pub fn current(&self) -> Arc<ConfigEntry> {
        self.current.load_full()
    }

    /// Replaces the current snapshot with the cached one, when the cache holds a different
    /// or a more recent entry. Returns `true` when the snapshot was replaced.
    pub fn sync_from(&self, cache: &dyn ConfigCache) -> bool {
        let observed = self.current.load_full();
        let raw = match cache.read(self.cache_key.as_str()) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return false,
        };
        if *self.last_raw.load_full() == raw {
            return false;
        }
        let entry = match entry_from_cached_json(raw.as_str()) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(event_id = ErrorKind::ConfigJsonCacheReadFailure.event_id(); "Error occurred while reading the cache. ({err})");
                return false;
            }
        };
        self.last_raw.store(Arc::new(raw));
        if entry.etag == observed.etag && entry.fetch_time <= observed.fetch_time {
            return false;
        }
        let previous = self.current.compare_and_swap(&observed, Arc::new(entry));
        Arc::ptr_eq(&previous, &observed)
    }

    /// Makes `entry` the current snapshot and writes it to `cache`.
    pub fn store(&self, entry: ConfigEntry, cache: &dyn ConfigCache) {
        let payload = entry.serialize();
        self.current.store(Arc::new(entry));
        cache.write(self.cache_key.as_str(), payload.as_str());
        self.last_raw.store(Arc::new(payload));
    }
}

fn cache_key(sdk_key: &str, mode_identifier: &str) -> String {
    sha1(
        format!("{sdk_key}_{mode_identifier}_{CONFIG_FILE_NAME}_{SERIALIZATION_FORMAT_VERSION}")
            .as_str(),
    )
}
