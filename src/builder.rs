use crate::cache::ConfigJsonCache;
use crate::constants::{EU_CDN_URL, GLOBAL_CDN_URL, SDK_KEY_PROXY_PREFIX};
use crate::errors::{ClientError, ErrorKind};
use crate::eval::evaluator::{DefaultEvaluator, RolloutEvaluator};
use crate::fetch::fetcher::Fetcher;
use crate::model::enums::DataGovernance;
use crate::modes::PollingMode;
use crate::parser::ConfigParser;
use crate::policy::factory::RefreshPolicyFactory;
use crate::{Client, ConfigCache, User};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder to create a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use configcat_core::{DataGovernance, Client, PollingMode};
///
/// #[tokio::main]
/// async fn main() {
///     let client = Client::builder("configcat-sdk-1/PKDVCLf-Hq-h-kCzMp-L7Q/HhOWfwVtZ0mb30i9wi17GQ")
///         .polling_mode(PollingMode::auto_poll(Duration::from_secs(60)))
///         .data_governance(DataGovernance::EU)
///         .build()
///         .unwrap();
/// }
/// ```
pub struct ClientBuilder {
    sdk_key: String,
    base_url: Option<String>,
    data_governance: Option<DataGovernance>,
    http_timeout: Option<Duration>,
    cache: Option<Arc<dyn ConfigCache>>,
    offline: bool,
    polling_mode: Option<PollingMode>,
    default_user: Option<User>,
    evaluator: Option<Arc<dyn RolloutEvaluator>>,
}

impl ClientBuilder {
    const SDK_KEY_PREFIX: &'static str = "configcat-sdk-1";
    const SDK_KEY_SECTION_LENGTH: usize = 22;

    pub(crate) fn new(sdk_key: &str) -> Self {
        Self {
            sdk_key: sdk_key.to_owned(),
            offline: false,
            http_timeout: None,
            base_url: None,
            cache: None,
            polling_mode: None,
            data_governance: None,
            default_user: None,
            evaluator: None,
        }
    }

    /// Indicates whether the client should be initialized in offline mode or not.
    /// Default value is `false`.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Sets the HTTP request timeout.
    /// Default value is `30` seconds.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Sets a custom base URL.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use configcat_core::Client;
    ///
    /// let builder = Client::builder("configcat-proxy/my-proxy-key")
    ///     .base_url("https://custom-cdn-url.com");
    /// ```
    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_owned());
        self
    }

    /// Sets the [`DataGovernance`] option.
    /// Default value is [`DataGovernance::Global`].
    pub fn data_governance(mut self, data_governance: DataGovernance) -> Self {
        self.data_governance = Some(data_governance);
        self
    }

    /// Sets a [`ConfigCache`] implementation used to persist the downloaded config JSON.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use configcat_core::{ConfigCache, Client};
    ///
    /// let builder = Client::builder("SDK_KEY")
    ///     .cache(Box::new(CustomCache{}));
    ///
    /// struct CustomCache {}
    ///
    /// impl ConfigCache for CustomCache {
    ///     fn read(&self, key: &str) -> Option<String> {
    ///         None
    ///     }
    ///
    ///     fn write(&self, key: &str, value: &str) {}
    /// }
    /// ```
    pub fn cache(mut self, cache: Box<dyn ConfigCache>) -> Self {
        self.cache = Some(Arc::from(cache));
        self
    }

    /// Sets the [`PollingMode`] of the client.
    /// Default value is [`PollingMode::AutoPoll`] with `60` seconds poll interval.
    pub fn polling_mode(mut self, polling_mode: PollingMode) -> Self {
        self.polling_mode = Some(polling_mode);
        self
    }

    /// Sets the [`User`] used when an evaluation method is called without one.
    pub fn default_user(mut self, user: User) -> Self {
        self.default_user = Some(user);
        self
    }

    /// Replaces the [`crate::DefaultEvaluator`] with a custom [`RolloutEvaluator`].
    pub fn evaluator(mut self, evaluator: Arc<dyn RolloutEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Creates a [`Client`] from the configuration made on the builder.
    ///
    /// Auto polling starts its background task on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// This method fails if the given SDK key is empty or has an invalid format,
    /// or the HTTP client could not be initialized.
    pub fn build(self) -> Result<Client, ClientError> {
        if self.sdk_key.is_empty() {
            return Err(ClientError::new(
                ErrorKind::InvalidSdkKey,
                "SDK Key cannot be empty".to_owned(),
            ));
        }
        if !is_sdk_key_valid(self.sdk_key.as_str(), self.base_url.is_some()) {
            return Err(ClientError::new(
                ErrorKind::InvalidSdkKey,
                format!("SDK Key '{}' is invalid.", self.sdk_key),
            ));
        }
        let mode = self.polling_mode.unwrap_or_default();
        let is_custom_url = self.base_url.is_some();
        let url = match (self.base_url, self.data_governance.unwrap_or_default()) {
            (Some(base_url), _) => base_url,
            (None, DataGovernance::Global) => GLOBAL_CDN_URL.to_owned(),
            (None, DataGovernance::EU) => EU_CDN_URL.to_owned(),
        };
        let fetcher = Fetcher::new(
            url,
            is_custom_url,
            self.sdk_key.as_str(),
            mode.identifier(),
            self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT),
        )?;
        let json_cache = ConfigJsonCache::new(self.sdk_key.as_str(), mode.identifier());
        let policy = RefreshPolicyFactory::new(
            Arc::new(fetcher),
            self.cache,
            Arc::new(json_cache),
            self.sdk_key.as_str(),
        )
        .offline(self.offline)
        .create(&mode);
        let parser = ConfigParser::new(
            self.evaluator
                .unwrap_or_else(|| Arc::new(DefaultEvaluator)),
        );
        Ok(Client::with_parts(policy, parser, self.default_user))
    }
}

fn is_sdk_key_valid(sdk_key: &str, is_custom_url: bool) -> bool {
    if is_custom_url
        && sdk_key.len() > SDK_KEY_PROXY_PREFIX.len()
        && sdk_key.starts_with(SDK_KEY_PROXY_PREFIX)
    {
        return true;
    }
    let comps: Vec<&str> = sdk_key.split('/').collect();
    match comps.as_slice() {
        [first, second] => {
            first.len() == ClientBuilder::SDK_KEY_SECTION_LENGTH
                && second.len() == ClientBuilder::SDK_KEY_SECTION_LENGTH
        }
        [prefix, first, second] => {
            *prefix == ClientBuilder::SDK_KEY_PREFIX
                && first.len() == ClientBuilder::SDK_KEY_SECTION_LENGTH
                && second.len() == ClientBuilder::SDK_KEY_SECTION_LENGTH
        }
        _ => false,
    }
}

#[cfg(test)]
mod builder_tests {
    use crate::builder::is_sdk_key_valid;

    #[test]
    fn sdk_key_formats() {
        let tests = vec![
            ("sdk-key-90123456789012", false, false),
            ("sdk-key-9012345678901/1234567890123456789012", false, false),
            ("sdk-key-90123456789012/123456789012345678901", false, false),
            ("sdk-key-90123456789012/12345678901234567890123", false, false),
            ("sdk-key-90123456789012/1234567890123456789012", false, true),
            ("configcat-sdk-1/sdk-key-90123456789012", false, false),
            ("configcat-sdk-1/sdk-key-9012345678901/1234567890123456789012", false, false),
            ("configcat-sdk-1/sdk-key-90123456789012/1234567890123456789012", false, true),
            ("configcat-sdk-2/sdk-key-90123456789012/1234567890123456789012", false, false),
            ("configcat-proxy/", true, false),
            ("configcat-proxy/sdk-key-90123456789012", false, false),
            ("configcat-proxy/sdk-key-90123456789012", true, true),
        ];
        for (key, custom_url, expected) in tests {
            assert_eq!(is_sdk_key_valid(key, custom_url), expected, "{key}");
        }
    }
}
