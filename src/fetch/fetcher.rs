use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;
use log::{debug, error, warn};
use reqwest::header::{HeaderMap, HeaderValue, ETAG, IF_NONE_MATCH};

use crate::constants::{CONFIG_FILE_NAME, PKG_VERSION, SDK_KEY_PROXY_PREFIX};
use crate::errors::ErrorKind::*;
use crate::errors::{ClientError, ErrorKind};
use crate::fetch::fetcher::FetchResponse::{Failed, Fetched, NotModified};
use crate::model::config::{entry_from_json, ConfigEntry};
use crate::model::enums::RedirectMode;

const CONFIGCAT_UA_HEADER: &str = "X-ConfigCat-UserAgent";
const MAX_REDIRECTS: usize = 3;

/// Outcome of one config JSON download. `Failed` carries whether the failure is transient.
#[derive(Debug, PartialEq)]
pub enum FetchResponse {
    Fetched(ConfigEntry),
    NotModified,
    Failed(ClientError, bool),
}

impl FetchResponse {
    fn failed(kind: ErrorKind, msg: String, transient: bool) -> Self {
        error!(event_id = kind.event_id(); "{msg}");
        Failed(ClientError::new(kind, msg), transient)
    }
}

pub struct Fetcher {
    is_custom_url: bool,
    fetch_url: ArcSwap<String>,
    http_client: reqwest::Client,
    sdk_key: String,
}

impl Fetcher {
    pub fn new(
        url: String,
        is_custom: bool,
        sdk_key: &str,
        mode: &str,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let init_err = |err: String| {
            ClientError::new(
                HttpClientInitFailure,
                format!("Failed to initialize the HTTP client. ({err})"),
            )
        };
        let mut headers = HeaderMap::new();
        let ua = HeaderValue::from_str(format!("ConfigCat-Rust/{mode}-{PKG_VERSION}").as_str())
            .map_err(|err| init_err(err.to_string()))?;
        headers.insert(CONFIGCAT_UA_HEADER, ua);
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| init_err(err.to_string()))?;
        Ok(Self {
            sdk_key: sdk_key.to_owned(),
            fetch_url: ArcSwap::from_pointee(url),
            is_custom_url: is_custom,
            http_client,
        })
    }

    pub async fn fetch(&self, etag: &str) -> FetchResponse {
        for _ in 0..MAX_REDIRECTS {
            let fetch_url = self.fetch_url.load_full();
            let response = self.fetch_http(fetch_url.as_str(), etag).await;
            let preferences = match &response {
                Fetched(entry) => match entry.config.preferences.as_ref() {
                    Some(pref) => pref,
                    None => return response,
                },
                _ => return response,
            };
            let pref_url = match preferences.url.as_ref() {
                Some(url) if *url != *fetch_url => url.clone(),
                _ => return response,
            };
            let redirect = preferences.redirect.unwrap_or(RedirectMode::No);
            if self.is_custom_url
                && (self.sdk_key.starts_with(SDK_KEY_PROXY_PREFIX)
                    || redirect != RedirectMode::Force)
            {
                return response;
            }
            self.fetch_url.store(Arc::new(pref_url));
            match redirect {
                RedirectMode::No => return response,
                RedirectMode::Should => {
                    warn!(event_id = 3002; "The `.data_governance()` parameter specified at the client initialization is not in sync with the preferences on the ConfigCat Dashboard. Read more: https://configcat.com/docs/advanced/data-governance")
                }
                RedirectMode::Force => {}
            }
        }
        FetchResponse::failed(
            RedirectLoop,
            "Redirection loop encountered while trying to fetch config JSON. Please contact us at https://configcat.com/support".to_owned(),
            true,
        )
    }

    async fn fetch_http(&self, url: &str, etag: &str) -> FetchResponse {
        let final_url = format!(
            "{url}/configuration-files/{sdk_key}/{CONFIG_FILE_NAME}",
            sdk_key = self.sdk_key
        );
        let mut builder = self.http_client.get(final_url);
        if !etag.is_empty() {
            builder = builder.header(IF_NONE_MATCH, etag);
        }
        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return FetchResponse::failed(
                    HttpRequestTimeout,
                    "Request timed out while trying to fetch config JSON.".to_owned(),
                    true,
                )
            }
            Err(err) => {
                return FetchResponse::failed(
                    HttpRequestFailure,
                    format!("Unexpected error occurred while trying to fetch config JSON. It is most likely due to a local network issue. Please make sure your application can reach the ConfigCat CDN servers (or your proxy server) over HTTP. {err}"),
                    true,
                )
            }
        };
        match response.status().as_u16() {
            200 => {
                let etag = response
                    .headers()
                    .get(ETAG)
                    .and_then(|header| header.to_str().ok())
                    .unwrap_or_default()
                    .to_owned();
                let parsed = match response.text().await {
                    Ok(body) => entry_from_json(body.as_str(), etag.as_str(), Utc::now())
                        .map_err(|err| err.to_string()),
                    Err(err) => Err(err.to_string()),
                };
                match parsed {
                    Ok(entry) => {
                        debug!("Fetch was successful: new config fetched");
                        Fetched(entry)
                    }
                    Err(err) => FetchResponse::failed(
                        InvalidHttpResponseContent,
                        format!("Fetching config JSON was successful but the HTTP response content was invalid. {err}"),
                        true,
                    ),
                }
            }
            304 => {
                debug!("Fetch was successful: not modified");
                NotModified
            }
            code @ (403 | 404) => FetchResponse::failed(
                InvalidSdkKey,
                format!("Your SDK Key seems to be wrong. You can find the valid SDK Key at https://app.configcat.com/sdkkey. Status code: {code}"),
                false,
            ),
            code => FetchResponse::failed(
                UnexpectedHttpResponse,
                format!("Unexpected HTTP response was received while trying to fetch config JSON. Status code: {code}"),
                true,
            ),
        }
    }
}

#[cfg(test)]
mod fetch_tests {
    use std::time::Duration;

    use reqwest::header::{ETAG, IF_NONE_MATCH};

    use crate::constants::test_constants::{MOCK_KEY, MOCK_PATH};
    use crate::constants::PKG_VERSION;
    use crate::errors::ErrorKind;
    use crate::fetch::fetcher::FetchResponse::{Failed, Fetched, NotModified};
    use crate::fetch::fetcher::{Fetcher, CONFIGCAT_UA_HEADER};

    fn fetcher(url: String) -> Fetcher {
        Fetcher::new(url, false, MOCK_KEY, "m", Duration::from_secs(30)).unwrap()
    }

    #[tokio::test]
    async fn sends_user_agent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", MOCK_PATH)
            .match_header(
                CONFIGCAT_UA_HEADER,
                format!("ConfigCat-Rust/m-{PKG_VERSION}").as_str(),
            )
            .with_status(200)
            .with_body(r#"{"f": {}}"#)
            .create_async()
            .await;

        let response = fetcher(server.url()).fetch("").await;
        assert!(matches!(response, Fetched(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn etag_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", MOCK_PATH)
            .with_status(200)
            .with_header(ETAG.as_str(), "etag1")
            .with_body(r#"{"f": {}}"#)
            .create_async()
            .await;
        let second = server
            .mock("GET", MOCK_PATH)
            .match_header(IF_NONE_MATCH.as_str(), "etag1")
            .with_status(304)
            .create_async()
            .await;

        let fetcher = fetcher(server.url());
        let etag = match fetcher.fetch("").await {
            Fetched(entry) => entry.etag,
            other => panic!("unexpected response: {other:?}"),
        };
        assert_eq!(etag, "etag1");
        assert_eq!(fetcher.fetch(etag.as_str()).await, NotModified);

        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn status_codes() {
        let tests = vec![
            (404, ErrorKind::InvalidSdkKey, false),
            (403, ErrorKind::InvalidSdkKey, false),
            (500, ErrorKind::UnexpectedHttpResponse, true),
            (502, ErrorKind::UnexpectedHttpResponse, true),
        ];
        for (status, kind, expected_transient) in tests {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", MOCK_PATH)
                .with_status(status)
                .create_async()
                .await;
            match fetcher(server.url()).fetch("").await {
                Failed(err, transient) => {
                    assert_eq!(err.kind, kind);
                    assert_eq!(transient, expected_transient);
                    assert!(err.message.ends_with(format!("Status code: {status}").as_str()));
                }
                other => panic!("unexpected response: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn invalid_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", MOCK_PATH)
            .with_status(200)
            .with_body(r#"{"f": {}"#)
            .create_async()
            .await;

        match fetcher(server.url()).fetch("").await {
            Failed(err, transient) => {
                assert!(transient);
                assert_eq!(err.kind, ErrorKind::InvalidHttpResponseContent);
                assert_eq!(err.message, "Fetching config JSON was successful but the HTTP response content was invalid. JSON parsing failed. (EOF while parsing an object at line 1 column 8)");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server() {
        let fetcher = fetcher("http://127.0.0.1:1".to_owned());
        match fetcher.fetch("").await {
            Failed(err, transient) => {
                assert!(transient);
                assert_eq!(err.kind, ErrorKind::HttpRequestFailure);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
