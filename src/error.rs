//! Error handling for ynison-bridge.
//!
//! Provides a unified error type that pairs a classification with the
//! underlying error, plus conversions from the library errors that cross
//! module boundaries.
//!
//! # Error Categories
//!
//! The session protocol fails in one of four ways:
//! * [`HandshakeFailed`](ErrorKind::HandshakeFailed) - discovery endpoint
//!   unreachable, refused, or silent
//! * [`ChannelFailed`](ErrorKind::ChannelFailed) - state channel connect,
//!   send or receive failure
//! * [`MalformedPayload`](ErrorKind::MalformedPayload) - reply is not JSON or
//!   lacks required fields
//! * [`IndexOutOfRange`](ErrorKind::IndexOutOfRange) - selected queue index
//!   outside the playable list
//!
//! The remaining kinds cover configuration, the catalog and callers that
//! impose deadlines. Mapping kinds to HTTP status codes is left to the
//! [`server`](crate::server).
//!
//! # Example
//!
//! ```rust
//! use ynison_bridge::error::{Error, ErrorKind, Result};
//!
//! fn check(host: &str) -> Result<()> {
//!     if host.is_empty() {
//!         return Err(Error::malformed_payload("redirect reply lacks `host`"));
//!     }
//!     Ok(())
//! }
//! ```

#![allow(clippy::enum_glob_use)]

use std::fmt;
use thiserror::Error;

/// Main error type combining error kind and details.
#[derive(Debug)]
pub struct Error {
    /// Classification of the error
    pub kind: ErrorKind,

    /// Details of the underlying error
    pub error: Box<dyn std::error::Error + Send + Sync>,
}

impl Error {
    /// Attempts to downcast the underlying error to a concrete type.
    ///
    /// # Returns
    /// * `Some(&E)` - If the underlying error is of type `E`
    /// * `None` - If the underlying error is not of type `E`
    #[must_use]
    pub fn downcast<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.error.downcast_ref::<E>()
    }
}

/// Standard result type for ynison-bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories.
///
/// The first four variants are the session protocol taxonomy and propagate
/// unchanged from the protocol layers to callers.
#[expect(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, Ord, PartialEq, PartialOrd)]
pub enum ErrorKind {
    /// Discovery endpoint unreachable, connection refused, or no reply
    /// within the handshake deadline.
    #[error("handshake failed")]
    HandshakeFailed,

    /// State channel connect, send or receive failure.
    #[error("state channel failed")]
    ChannelFailed,

    /// Reply is not valid JSON or lacks required fields.
    #[error("malformed payload")]
    MalformedPayload,

    /// Decoded queue index is not the "none" sentinel but lies outside the
    /// playable list.
    #[error("index out of range")]
    IndexOutOfRange,

    /// A caller-imposed deadline expired.
    #[error("operation timed out")]
    DeadlineExceeded,

    /// Invalid token, track id, URL or configuration value.
    #[error("invalid argument specified")]
    InvalidArgument,

    /// The catalog rejected the token.
    #[error("no valid authentication credentials")]
    Unauthenticated,

    /// The catalog has no such resource.
    #[error("not found")]
    NotFound,

    /// The catalog could not be reached.
    #[error("service unavailable")]
    Unavailable,

    /// Unexpected errors that shouldn't occur during normal operation.
    #[error("internal error")]
    Internal,
}

impl ErrorKind {
    /// Whether this kind belongs to the session protocol taxonomy.
    #[must_use]
    pub fn is_protocol(self) -> bool {
        matches!(
            self,
            Self::HandshakeFailed
                | Self::ChannelFailed
                | Self::MalformedPayload
                | Self::IndexOutOfRange
        )
    }
}

impl Error {
    /// Creates a new error with specified kind and details.
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            error: error.into(),
        }
    }

    /// Creates an error for a failed discovery handshake.
    ///
    /// Use when the redirect endpoint cannot be reached, refuses the
    /// connection, closes it early, or does not reply in time.
    pub fn handshake_failed<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::HandshakeFailed, error)
    }

    /// Creates an error for a failed state channel.
    pub fn channel_failed<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::ChannelFailed, error)
    }

    /// Creates an error for a reply that could not be parsed or lacks
    /// required fields.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let err = Error::malformed_payload("missing `redirect_ticket`");
    /// assert_eq!(err.kind, ErrorKind::MalformedPayload);
    /// ```
    pub fn malformed_payload<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::MalformedPayload, error)
    }

    /// Creates an error for a queue index outside the playable list.
    pub fn index_out_of_range<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::IndexOutOfRange, error)
    }

    /// Creates an error for operations that exceeded their deadline.
    pub fn deadline_exceeded<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::DeadlineExceeded, error)
    }

    /// Creates an error for invalid arguments.
    ///
    /// Use when provided arguments don't meet validation requirements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let err = Error::invalid_argument("token contains whitespace");
    /// assert_eq!(err.kind, ErrorKind::InvalidArgument);
    /// ```
    pub fn invalid_argument<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::InvalidArgument, error)
    }

    /// Creates an error for authentication failures against the catalog.
    pub fn unauthenticated<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Unauthenticated, error)
    }

    /// Creates an error for missing resources.
    pub fn not_found<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::NotFound, error)
    }

    /// Creates an error for unavailable services.
    pub fn unavailable<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Unavailable, error)
    }

    /// Creates an error for internal errors.
    pub fn internal<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Internal, error)
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
///
/// Only reached outside the protocol layers (secrets file, listener
/// binding, signal registration).
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match err.kind() {
            NotFound => Self::not_found(err),
            AddrNotAvailable | ConnectionRefused | NotConnected => Self::unavailable(err),
            TimedOut => Self::deadline_exceeded(err),
            InvalidInput | InvalidData => Self::invalid_argument(err),
            _ => Self::internal(err),
        }
    }
}

/// Converts HTTP client errors into appropriate error kinds.
///
/// Maps HTTP errors based on their nature:
/// * Decode errors -> `MalformedPayload`
/// * Connect errors -> `Unavailable`
/// * Timeout errors -> `DeadlineExceeded`
/// * Status errors -> by status code
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return Self::internal(err);
        }

        if err.is_decode() || err.is_body() {
            return Self::malformed_payload(err);
        }

        if err.is_timeout() {
            return Self::deadline_exceeded(err);
        }

        if err.is_connect() || err.is_redirect() {
            return Self::unavailable(err);
        }

        if let Some(status) = err.status() {
            return match status.as_u16() {
                401 | 403 => Self::unauthenticated(err),
                404 => Self::not_found(err),
                400..=499 => Self::invalid_argument(err),
                _ => Self::unavailable(err),
            };
        }

        Self::internal(err)
    }
}

/// Converts JSON errors to `MalformedPayload`.
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed_payload(err)
    }
}

/// Converts invalid header errors to `InvalidArgument`.
///
/// Header values are built from the token and the device descriptor; a
/// value the `http` crate refuses means the input was unusable.
impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// Converts URL parsing errors to `InvalidArgument`.
impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// Converts TOML errors to `InvalidArgument`.
impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// Converts integer parsing errors to `InvalidArgument`.
impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// Converts mutex poisoning errors to `Internal`.
impl<T> From<std::sync::PoisonError<std::sync::MutexGuard<'_, T>>> for Error {
    fn from(e: std::sync::PoisonError<std::sync::MutexGuard<'_, T>>) -> Self {
        Self::internal(e.to_string())
    }
}

/// Converts timeout errors to `DeadlineExceeded`.
impl From<tokio::time::error::Elapsed> for Error {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Self::deadline_exceeded(e.to_string())
    }
}
