//! Error handling for mirrorsrc.
//!
//! Provides a unified error handling system based on gRPC status codes,
//! with mapping from various underlying errors to appropriate categories.
//!
//! # Error Categories
//!
//! Resolution failures fall into a small number of classes, each carried by
//! an [`ErrorKind`]:
//!
//! | Class           | Kind                 | Handling                           |
//! |-----------------|----------------------|------------------------------------|
//! | Transient       | `DeadlineExceeded`   | retried, then degrades to no result|
//! | Not found       | `NotFound`           | a legitimate empty result          |
//! | Malformed record| `InvalidArgument`    | record dropped, batch continues    |
//! | Protocol        | `FailedPrecondition` | surfaced, never retried            |
//! | Corrupt         | `DataLoss`           | surfaced, fatal for that record    |
//!
//! Cancellation (`Cancelled`) and connection failures (`Unavailable`) are
//! surfaced as-is.
//!
//! # Example
//!
//! ```rust
//! use mirrorsrc::error::{Error, ErrorKind, Result};
//!
//! fn lookup(found: bool) -> Result<()> {
//!     if !found {
//!         return Err(Error::not_found("track does not exist"));
//!     }
//!     Ok(())
//! }
//! ```

#![allow(clippy::enum_glob_use)]

use std::fmt;
use thiserror::Error;

/// Main error type combining error kind and details.
///
/// Provides:
/// * Categorized error types ([`ErrorKind`])
/// * Underlying error details
/// * Conversion from common error types
#[derive(Debug)]
pub struct Error {
    /// Classification of the error
    pub kind: ErrorKind,

    /// Details of the underlying error
    pub error: Box<dyn std::error::Error + Send + Sync>,
}

impl Error {
    /// Whether this error is a transport timeout that the retry policy may
    /// try again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Standard result type for mirrorsrc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories based on gRPC status codes.
///
/// See [gRPC status codes](https://github.com/googleapis/googleapis/blob/master/google/rpc/code.proto)
/// for the original definitions.
#[expect(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u32)]
pub enum ErrorKind {
    /// The caller abandoned the operation.
    #[error("operation was cancelled")]
    Cancelled = 1,

    /// HTTP Mapping: 500 Internal Server Error
    #[error("unknown error")]
    Unknown = 2,

    /// A single record could not be turned into metadata.
    #[error("invalid argument specified")]
    InvalidArgument = 3,

    /// Transport timeout; the only retryable kind.
    #[error("operation timed out")]
    DeadlineExceeded = 4,

    /// HTTP Mapping: 404 Not Found
    #[error("not found")]
    NotFound = 5,

    /// HTTP Mapping: 403 Forbidden
    #[error("permission denied")]
    PermissionDenied = 7,

    /// HTTP Mapping: 429 Too Many Requests
    #[error("resource has been exhausted")]
    ResourceExhausted = 8,

    /// Response shape outside documented provider variance.
    #[error("unexpected response")]
    FailedPrecondition = 9,

    /// HTTP Mapping: 500 Internal Server Error
    #[error("internal error")]
    Internal = 13,

    /// Connection could not be established.
    #[error("service unavailable")]
    Unavailable = 14,

    /// Persisted track state could not be decoded.
    #[error("unrecoverable data loss or corruption")]
    DataLoss = 15,
}

impl ErrorKind {
    /// Only transport timeouts are retried. Connection resets and DNS
    /// failures surface immediately.
    #[must_use]
    pub fn is_transient(self) -> bool {
        self == Self::DeadlineExceeded
    }
}

impl Error {
    /// Creates a new error with specified kind and details.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let err = Error::new(ErrorKind::NotFound, "no such track");
    /// assert_eq!(err.kind, ErrorKind::NotFound);
    /// ```
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            error: error.into(),
        }
    }

    /// Creates an error for cancelled operations.
    ///
    /// Use when a caller abandoned a resolution or mirror search before it
    /// completed.
    pub fn cancelled<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Cancelled, error)
    }

    /// Creates an error for data corruption or loss.
    ///
    /// Use when persisted track state is truncated or otherwise cannot be
    /// decoded.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let err = Error::data_loss("track state truncated");
    /// assert_eq!(err.kind, ErrorKind::DataLoss);
    /// ```
    pub fn data_loss<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::DataLoss, error)
    }

    /// Creates an error for operations that exceeded their deadline.
    pub fn deadline_exceeded<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::DeadlineExceeded, error)
    }

    /// Creates an error for responses that do not have the shape a
    /// provider is documented to return.
    pub fn failed_precondition<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::FailedPrecondition, error)
    }

    /// Creates an error for internal errors.
    pub fn internal<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Internal, error)
    }

    /// Creates an error for invalid arguments.
    ///
    /// Use when a single provider record or a configuration value does not
    /// meet validation requirements.
    pub fn invalid_argument<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::InvalidArgument, error)
    }

    /// Creates an error for missing resources.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let err = Error::not_found("track does not exist");
    /// assert_eq!(err.kind, ErrorKind::NotFound);
    /// ```
    pub fn not_found<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::NotFound, error)
    }

    /// Creates an error for permission denied conditions.
    pub fn permission_denied<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::PermissionDenied, error)
    }

    /// Creates an error for exhausted resources, such as provider rate
    /// limits.
    pub fn resource_exhausted<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::ResourceExhausted, error)
    }

    /// Creates an error for unavailable services.
    pub fn unavailable<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Unavailable, error)
    }

    /// Creates an error for unknown errors.
    pub fn unknown<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Unknown, error)
    }

    /// Maps an unsuccessful HTTP status to an error kind.
    ///
    /// * 404 -> `NotFound`
    /// * 401, 403 -> `PermissionDenied`
    /// * 408, 504 -> `DeadlineExceeded`
    /// * 429 -> `ResourceExhausted`
    /// * other 5xx -> `Unavailable`
    /// * anything else -> `FailedPrecondition`
    #[must_use]
    pub fn from_status(status: http::StatusCode, origin: &str) -> Self {
        use http::StatusCode;

        let message = format!("{origin}: HTTP {status}");
        match status {
            StatusCode::NOT_FOUND => Self::not_found(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::permission_denied(message),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                Self::deadline_exceeded(message)
            }
            StatusCode::TOO_MANY_REQUESTS => Self::resource_exhausted(message),
            status if status.is_server_error() => Self::unavailable(message),
            _ => Self::failed_precondition(message),
        }
    }
}

/// Returns the underlying error source.
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

/// Formats the error for display, showing both kind and details.
///
/// Format: "{kind}: {details}"
impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}: ", self.kind)?;
        self.error.fmt(fmt)
    }
}

/// Converts IO errors into appropriate error kinds.
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match err.kind() {
            NotFound => Self::not_found(err),
            PermissionDenied => Self::permission_denied(err),
            AddrNotAvailable | ConnectionRefused | NotConnected | BrokenPipe | ConnectionReset
            | ConnectionAborted => Self::unavailable(err),
            Interrupted => Self::cancelled(err),
            UnexpectedEof => Self::data_loss(err),
            TimedOut => Self::deadline_exceeded(err),
            InvalidInput | InvalidData => Self::invalid_argument(err),
            _ => Self::unknown(err),
        }
    }
}

/// Converts HTTP client errors into appropriate error kinds.
///
/// Maps HTTP errors based on their nature:
/// * Timeout errors -> `DeadlineExceeded`
/// * Connect errors -> `Unavailable`
/// * Status errors -> per [`Error::from_status`]
/// * Body and decode errors -> `FailedPrecondition`
/// * Builder errors -> `Internal`
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Timeouts are checked first: a connect timeout is still a timeout.
        if err.is_timeout() {
            return Self::deadline_exceeded(err);
        }

        if err.is_connect() {
            return Self::unavailable(err);
        }

        if let Some(status) = err.status() {
            let origin = err
                .url()
                .and_then(|url| url.host_str())
                .unwrap_or("unknown host")
                .to_owned();
            return Self::from_status(status, &origin);
        }

        if err.is_body() || err.is_decode() {
            return Self::failed_precondition(err);
        }

        if err.is_builder() || err.is_request() {
            return Self::internal(err);
        }

        if err.is_redirect() {
            return Self::resource_exhausted(err);
        }

        Self::unknown(err)
    }
}

/// Converts JSON errors to `FailedPrecondition`: a provider answered with
/// something that is not the JSON it documents.
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::failed_precondition(err)
    }
}

/// Converts invalid header errors to `InvalidArgument`.
impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// Converts URL parsing errors to `Internal`.
impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::internal(e.to_string())
    }
}

/// Converts pattern compilation errors to `InvalidArgument`.
impl From<regex_lite::Error> for Error {
    fn from(e: regex_lite::Error) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// Converts Base64 decoding errors to `DataLoss`: only persisted track
/// state is Base64 encoded.
impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Self::data_loss(e.to_string())
    }
}

/// Converts UTF-8 errors in persisted strings to `DataLoss`.
impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::data_loss(e.to_string())
    }
}

/// Converts configuration parsing errors to `InvalidArgument`.
impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeouts_are_transient() {
        assert!(Error::deadline_exceeded("slow").is_transient());
        assert!(!Error::unavailable("connection reset").is_transient());
        assert!(!Error::not_found("nothing").is_transient());
        assert!(!Error::failed_precondition("odd shape").is_transient());
    }

    #[test]
    fn status_mapping() {
        use http::StatusCode;

        let kind = |status| Error::from_status(status, "test").kind;
        assert_eq!(kind(StatusCode::NOT_FOUND), ErrorKind::NotFound);
        assert_eq!(kind(StatusCode::GATEWAY_TIMEOUT), ErrorKind::DeadlineExceeded);
        assert_eq!(kind(StatusCode::TOO_MANY_REQUESTS), ErrorKind::ResourceExhausted);
        assert_eq!(kind(StatusCode::BAD_GATEWAY), ErrorKind::Unavailable);
        assert_eq!(kind(StatusCode::BAD_REQUEST), ErrorKind::FailedPrecondition);
    }

    #[test]
    fn display_includes_kind() {
        let err = Error::data_loss("truncated");
        assert_eq!(err.to_string(), "unrecoverable data loss or corruption: truncated");
    }

    #[test]
    fn io_timeout_maps_to_deadline() {
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert_eq!(err.kind, ErrorKind::DeadlineExceeded);
    }
}
