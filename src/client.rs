use crate::builder::ClientBuilder;
use crate::errors::ErrorKind;
use crate::model::config::ConfigEntry;
use crate::parser::ConfigParser;
use crate::policy::RefreshPolicy;
use crate::value::{Value, ValuePrimitive};
use crate::{ClientCacheState, ClientError, User};
use log::{error, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// The main component for evaluating feature flags and settings.
///
/// The client keeps the downloaded config JSON up to date according to its [`crate::PollingMode`]
/// and reads values through a [`ConfigParser`]. Every getter falls back to the caller's default on failure.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use configcat_core::{Client, PollingMode, User};
///
/// #[tokio::main]
/// async fn main() {
///     let client = Client::builder("configcat-sdk-1/PKDVCLf-Hq-h-kCzMp-L7Q/HhOWfwVtZ0mb30i9wi17GQ")
///         .polling_mode(PollingMode::auto_poll(Duration::from_secs(60)))
///         .build()
///         .unwrap();
///
///     let user = User::new("user-id");
///     let is_flag_enabled = client.get_value("flag-key", Some(user), false).await;
/// }
/// ```
pub struct Client {
    policy: RefreshPolicy,
    parser: ConfigParser,
    default_user: Option<User>,
}

impl Client {
    pub(crate) fn with_parts(
        policy: RefreshPolicy,
        parser: ConfigParser,
        default_user: Option<User>,
    ) -> Self {
        Self {
            policy,
            parser,
            default_user,
        }
    }

    /// Creates a new [`ClientBuilder`] used to build a [`Client`].
    pub fn builder(sdk_key: &str) -> ClientBuilder {
        ClientBuilder::new(sdk_key)
    }

    /// Creates a new [`Client`] with default options.
    ///
    /// # Errors
    ///
    /// This method fails if the given SDK key is empty or has an invalid format.
    pub fn new(sdk_key: &str) -> Result<Self, ClientError> {
        ClientBuilder::new(sdk_key).build()
    }

    /// Initiates a force refresh on the cached config JSON data.
    ///
    /// # Errors
    ///
    /// This method fails when the client is in offline mode or the HTTP request fails.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        self.policy.refresh().await
    }

    /// Evaluates a feature flag or setting identified by the given `key`.
    ///
    /// Returns `default` if the flag doesn't exist, its value is not a `T`,
    /// or there was an error during the evaluation.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use configcat_core::{Client, User};
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let client = Client::new("configcat-sdk-1/PKDVCLf-Hq-h-kCzMp-L7Q/HhOWfwVtZ0mb30i9wi17GQ").unwrap();
    ///
    ///     let user = User::new("user-id");
    ///     let value = client.get_value("flag-key", Some(user), String::default()).await;
    /// }
    /// ```
    pub async fn get_value<T: ValuePrimitive>(
        &self,
        key: &str,
        user: Option<User>,
        default: T,
    ) -> T {
        let entry = self.policy.get_configuration().await;
        if !self.has_settings(&entry, key) {
            return default;
        }
        let user = user.or_else(|| self.default_user.clone());
        self.parser
            .get_value(key, &entry.config.settings, user.as_ref())
            .unwrap_or(default)
    }

    /// Evaluates a setting and checks the result against a kind name like `"bool"` or `"string?"`.
    ///
    /// Returns [`None`] when the kind name is unsupported or the evaluation fails.
    pub async fn get_value_of_kind(
        &self,
        key: &str,
        kind: &str,
        user: Option<User>,
    ) -> Option<Value> {
        let entry = self.policy.get_configuration().await;
        let user = user.or_else(|| self.default_user.clone());
        self.parser
            .get_value_of_kind(key, kind, &entry.config.settings, user.as_ref())
            .ok()
    }

    /// Returns the variation ID of the value a setting evaluates to, or `default` on failure.
    pub async fn get_variation_id(&self, key: &str, user: Option<User>, default: &str) -> String {
        let entry = self.policy.get_configuration().await;
        if !self.has_settings(&entry, key) {
            return default.to_owned();
        }
        let user = user.or_else(|| self.default_user.clone());
        self.parser
            .get_variation_id(key, &entry.config.settings, user.as_ref())
            .unwrap_or_else(|_| default.to_owned())
    }

    /// Returns the variation IDs of every feature flag and setting.
    pub async fn get_all_variation_ids(&self, user: Option<User>) -> Vec<String> {
        let entry = self.policy.get_configuration().await;
        let user = user.or_else(|| self.default_user.clone());
        self.parser
            .get_all_variation_ids(&entry.config.settings, user.as_ref())
    }

    /// Evaluates all feature flags and settings.
    ///
    /// Returns a [`HashMap`] of [`String`] keys and evaluated [`Value`]s.
    pub async fn get_all_values(&self, user: Option<User>) -> HashMap<String, Value> {
        let entry = self.policy.get_configuration().await;
        let user = user.or_else(|| self.default_user.clone());
        self.parser
            .get_all_values(&entry.config.settings, user.as_ref())
    }

    /// Returns the key of the setting that owns `variation_id` together with the tagged value.
    pub async fn get_key_and_value(&self, variation_id: &str) -> Option<(String, Value)> {
        let entry = self.policy.get_configuration().await;
        self.parser
            .get_key_and_value(variation_id, &entry.config.settings)
            .ok()
    }

    /// Returns the keys of all feature flags and settings.
    ///
    /// If there's no config JSON to work on, this method returns an empty [`Vec`].
    pub async fn get_all_keys(&self) -> Vec<String> {
        let entry = self.policy.get_configuration().await;
        let settings = &entry.config.settings;
        if !settings.is_empty() {
            return settings.keys().cloned().collect();
        }
        error!(event_id = ErrorKind::ConfigJsonNotAvailable.event_id(); "Config JSON is not present. Returning empty vector.");
        vec![]
    }

    /// Puts the [`Client`] into offline mode.
    ///
    /// In this mode the client is not allowed to initiate HTTP requests and works only from the configured cache.
    pub fn offline(&self) {
        self.policy.set_offline(true);
    }

    /// Puts the [`Client`] into online mode.
    pub fn online(&self) {
        self.policy.set_offline(false);
    }

    /// Returns `true` when the client is configured not to initiate HTTP requests, otherwise `false`.
    pub fn is_offline(&self) -> bool {
        self.policy.is_offline()
    }

    /// Waits for the initialization of the [`Client`] for a maximum duration specified in `wait_timeout`.
    ///
    /// # Errors
    ///
    /// This method fails with [`ErrorKind::ClientInitTimedOut`] if the initialization takes more
    /// time than `wait_timeout`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use configcat_core::{Client, ClientCacheState};
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let client = Client::new("configcat-sdk-1/PKDVCLf-Hq-h-kCzMp-L7Q/HhOWfwVtZ0mb30i9wi17GQ").unwrap();
    ///     let state = client.wait_for_ready(Duration::from_secs(5)).await.unwrap();
    ///
    ///     assert!(matches!(state, ClientCacheState::HasUpToDateFlagData));
    /// }
    /// ```
    pub async fn wait_for_ready(
        &self,
        wait_timeout: Duration,
    ) -> Result<ClientCacheState, ClientError> {
        self.policy
            .wait_for_ready(wait_timeout)
            .await
            .inspect_err(|err| warn!(event_id = err.kind.event_id(); "{err}"))
    }

    /// Stops the background work of the client. Reads keep serving the last known config JSON.
    pub fn close(&self) {
        self.policy.close();
    }

    fn has_settings(&self, entry: &Arc<ConfigEntry>, key: &str) -> bool {
        if entry.config.settings.is_empty() {
            error!(event_id = ErrorKind::ConfigJsonNotAvailable.event_id(); "Config JSON is not present when evaluating setting '{key}'. Returning the `defaultValue` parameter that you specified in your application.");
            return false;
        }
        true
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}
