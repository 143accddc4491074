use std::error::Error;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Error kind that represents failures reported by the SDK.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ErrorKind {
    /// Initialization of the internal [`reqwest::Client`] failed.
    HttpClientInitFailure,
    /// The evaluation failed because the config JSON was not available locally.
    ConfigJsonNotAvailable = 1000,
    /// The evaluation failed because the key of the evaluated setting was not found in the config JSON.
    SettingKeyMissing = 1001,
    /// The evaluation failed because the evaluator could not resolve the setting.
    EvaluationFailure = 1002,
    /// An HTTP response indicating an invalid SDK Key was received (403 Forbidden or 404 Not Found).
    InvalidSdkKey = 1100,
    /// Invalid HTTP response was received (unexpected HTTP status code).
    UnexpectedHttpResponse = 1101,
    /// The HTTP request timed out.
    HttpRequestTimeout = 1102,
    /// The HTTP request failed (most likely, due to a local network issue).
    HttpRequestFailure = 1103,
    /// Redirection loop encountered while trying to fetch config JSON.
    RedirectLoop = 1104,
    /// An invalid HTTP response was received (200 OK with an invalid content).
    InvalidHttpResponseContent = 1105,
    /// The requested value kind is not one of the supported kinds.
    InvalidRequestedType = 2001,
    /// The evaluated setting value could not be converted to the requested kind.
    SettingValueTypeMismatch = 2002,
    /// No setting was found for the given variation ID.
    SettingForVariationIdMissing = 2011,
    /// The cached config JSON could not be read.
    ConfigJsonCacheReadFailure = 2201,
    /// The client is in offline mode, it cannot initiate HTTP requests.
    OfflineClient = 3200,
    /// The initialization of the client did not finish in time.
    ClientInitTimedOut = 4200,
}

impl ErrorKind {
    pub(crate) fn event_id(&self) -> u16 {
        *self as u16
    }
}

/// Error struct that holds the [`ErrorKind`] and message of the reported failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientError {
    /// Error kind that represents failures reported by the SDK.
    pub kind: ErrorKind,
    /// The text representation of the failure.
    pub message: String,
}

impl ClientError {
    pub(crate) fn new(kind: ErrorKind, message: String) -> Self {
        Self { message, kind }
    }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message.as_str())
    }
}

impl Error for ClientError {}

/// Failures reported by the [`crate::ConfigParser`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParserError {
    /// The caller asked for a value kind that can't be produced.
    #[error("Only String, Integer, Double, Bool or Any types can be parsed. Requested type: '{0}'.")]
    InvalidRequestedType(String),
    /// The key or variation ID could not be resolved, or the value has the wrong kind.
    #[error("{message}")]
    ParseFailure {
        /// The event the failure was logged with.
        kind: ErrorKind,
        /// The logged message.
        message: String,
    },
}

impl ParserError {
    pub(crate) fn parse_failure(kind: ErrorKind, message: String) -> Self {
        ParserError::ParseFailure { kind, message }
    }

    /// Returns the [`ErrorKind`] used when the failure is reported.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParserError::InvalidRequestedType(_) => ErrorKind::InvalidRequestedType,
            ParserError::ParseFailure { kind, .. } => *kind,
        }
    }
}
