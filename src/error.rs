//! Error types for the agentchat client.
//!
//! Every fallible operation in the crate returns [`Error`].  The variants follow
//! the failure classes a chat front end has to tell apart: a rejected credential
//! (which forces a new login), a failed HTTP exchange (shown to the user), an
//! intentional cancellation (never shown), and the transport/decoding failures
//! underneath them.

use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::sync::Arc;

/// The main error type for agentchat.
#[derive(Clone, Debug)]
pub enum Error {
    /// The server rejected the bearer token (HTTP 401).
    ///
    /// By the time this is returned the stored token has been cleared and the
    /// front end has been sent to the login view.
    Unauthorized {
        /// Human-readable error message.
        message: String,
    },

    /// No token is stored, so an authenticated call cannot be made.
    NotAuthenticated {
        /// Human-readable error message.
        message: String,
    },

    /// The server answered with a non-success status other than 401.
    Http {
        /// HTTP status code.
        status: u16,
        /// Message taken from the JSON error body, or `HTTP <status>`.
        message: String,
    },

    /// The request or stream was cancelled by the client.
    Abort {
        /// Human-readable error message.
        message: String,
    },

    /// Request timeout.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
    },

    /// Connection error.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// HTTP client error.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Error during JSON or YAML serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The response body failed mid-stream.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Encoding/decoding error.
    Encoding {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A URL parsing or manipulation error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// Error during validation of caller-supplied parameters.
    Validation {
        /// Human-readable error message.
        message: String,
        /// Parameter that failed validation.
        param: Option<String>,
    },
}

impl Error {
    /// Creates a new unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Error::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new not-authenticated error.
    pub fn not_authenticated(message: impl Into<String>) -> Self {
        Error::NotAuthenticated {
            message: message.into(),
        }
    }

    /// Creates a new HTTP status error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Error::Http {
            status,
            message: message.into(),
        }
    }

    /// Creates a new abort error.
    pub fn abort(message: impl Into<String>) -> Self {
        Error::Abort {
            message: message.into(),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new encoding error.
    pub fn encoding(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Encoding {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    /// Classifies a transport error from reqwest.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Option<f64>) -> Self {
        if err.is_timeout() {
            Error::timeout(format!("Request timed out: {err}"), timeout)
        } else if err.is_connect() {
            Error::connection(format!("Connection error: {err}"), Some(Box::new(err)))
        } else {
            Error::http_client(format!("Request failed: {err}"), Some(Box::new(err)))
        }
    }

    /// Returns true if the server rejected the credential.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized { .. })
    }

    /// Returns true if no credential was available.
    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, Error::NotAuthenticated { .. })
    }

    /// Returns true if this error is an intentional cancellation.
    ///
    /// Cancellations are swallowed by the chat controller: a superseded stream
    /// must not leave error text behind in the conversation.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Abort { .. })
    }

    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if this error is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Returns the HTTP status associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Unauthorized { .. } => Some(401),
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the bare message without the category prefix used by `Display`.
    ///
    /// This is the text written into a turn after `Error: `.
    pub fn message(&self) -> &str {
        match self {
            Error::Unauthorized { message }
            | Error::NotAuthenticated { message }
            | Error::Http { message, .. }
            | Error::Abort { message }
            | Error::Timeout { message, .. }
            | Error::Connection { message, .. }
            | Error::HttpClient { message, .. }
            | Error::Serialization { message, .. }
            | Error::Streaming { message, .. }
            | Error::Encoding { message, .. }
            | Error::Url { message, .. }
            | Error::Io { message, .. }
            | Error::Validation { message, .. } => message,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Unauthorized { message } => write!(f, "Unauthorized: {message}"),
            Error::NotAuthenticated { message } => write!(f, "Not authenticated: {message}"),
            Error::Http { status, message } => {
                if message.is_empty() {
                    write!(f, "HTTP {status}")
                } else {
                    write!(f, "HTTP error ({status}): {message}")
                }
            }
            Error::Abort { message } => write!(f, "Request aborted: {message}"),
            Error::Timeout { message, duration } => {
                if let Some(duration) = duration {
                    write!(f, "Timeout error: {message} ({duration} seconds)")
                } else {
                    write!(f, "Timeout error: {message}")
                }
            }
            Error::Connection { message, .. } => write!(f, "Connection error: {message}"),
            Error::HttpClient { message, .. } => write!(f, "HTTP client error: {message}"),
            Error::Serialization { message, .. } => write!(f, "Serialization error: {message}"),
            Error::Streaming { message, .. } => write!(f, "Streaming error: {message}"),
            Error::Encoding { message, .. } => write!(f, "Encoding error: {message}"),
            Error::Url { message, .. } => write!(f, "URL error: {message}"),
            Error::Io { message, .. } => write!(f, "I/O error: {message}"),
            Error::Validation { message, param } => {
                if let Some(param) = param {
                    write!(f, "Validation error: {message} (parameter: {param})")
                } else {
                    write!(f, "Validation error: {message}")
                }
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. }
            | Error::HttpClient { source, .. }
            | Error::Serialization { source, .. }
            | Error::Streaming { source, .. }
            | Error::Encoding { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::serialization(format!("YAML error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Error::encoding(format!("UTF-8 error: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for agentchat operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(Error::unauthorized("Unauthorized").status_code(), Some(401));
        assert_eq!(Error::http(502, "HTTP 502").status_code(), Some(502));
        assert_eq!(Error::abort("cancelled").status_code(), None);
    }

    #[test]
    fn abort_is_distinguished() {
        assert!(Error::abort("superseded").is_abort());
        assert!(!Error::http(500, "boom").is_abort());
        assert!(!Error::streaming("reset", None).is_abort());
    }

    #[test]
    fn message_strips_category() {
        let err = Error::http(500, "database unavailable");
        assert_eq!(err.message(), "database unavailable");
        assert_eq!(err.to_string(), "HTTP error (500): database unavailable");
    }

    #[test]
    fn json_error_converts() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Serialization { .. }));
        assert!(error::Error::source(&err).is_some());
    }
}
