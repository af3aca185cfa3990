//! Probe error categories
//!
//! The engine never inspects a probe error beyond its [`ErrorKind`]. A run's
//! ignored set is a set of these kinds: an error whose kind is in the set is
//! treated as an unsuccessful call and retried, any other error aborts the run.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::io;

/// Closed set of failure categories a probe can signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// The request was rejected by the API (4xx)
    Client,

    /// Authentication or authorization failure (403)
    Auth,

    /// The resource does not exist (yet)
    NotFound,

    /// The API failed while processing the request (5xx)
    Server,

    /// Network-level hiccup worth retrying
    Transient,

    /// Anything not covered above
    Other,
}

impl ErrorKind {
    /// Map an HTTP status code to an error kind
    ///
    /// Returns `None` for non-error statuses.
    ///
    /// ```rust
    /// use exoscale_polling::ErrorKind;
    ///
    /// assert_eq!(ErrorKind::from_status(403), Some(ErrorKind::Auth));
    /// assert_eq!(ErrorKind::from_status(503), Some(ErrorKind::Server));
    /// assert_eq!(ErrorKind::from_status(200), None);
    /// ```
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            403 => Some(ErrorKind::Auth),
            404 => Some(ErrorKind::NotFound),
            400..=499 => Some(ErrorKind::Client),
            500..=599 => Some(ErrorKind::Server),
            _ => None,
        }
    }

    /// Short lowercase name, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Client => "client",
            ErrorKind::Auth => "auth",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Server => "server",
            ErrorKind::Transient => "transient",
            ErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can report their [`ErrorKind`]
///
/// Implement this for a probe's error type to make it usable with the
/// engine's ignored set.
///
/// # Example
///
/// ```rust
/// use exoscale_polling::poll::{Classify, ErrorKind};
///
/// #[derive(Debug)]
/// enum DnsError {
///     NotPropagated,
///     Refused,
/// }
///
/// impl Classify for DnsError {
///     fn kind(&self) -> ErrorKind {
///         match self {
///             DnsError::NotPropagated => ErrorKind::NotFound,
///             DnsError::Refused => ErrorKind::Transient,
///         }
///     }
/// }
/// ```
pub trait Classify {
    /// The category of this error
    fn kind(&self) -> ErrorKind;
}

impl Classify for ErrorKind {
    fn kind(&self) -> ErrorKind {
        *self
    }
}

impl Classify for io::Error {
    fn kind(&self) -> ErrorKind {
        match io::Error::kind(self) {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::Auth,
            io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::WouldBlock => ErrorKind::Transient,
            _ => ErrorKind::Other,
        }
    }
}

impl<T: Classify + ?Sized> Classify for Box<T> {
    fn kind(&self) -> ErrorKind {
        (**self).kind()
    }
}

/// Ready-made probe error carrying a kind and a message
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct ProbeError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl ProbeError {
    /// Create a probe error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a client error (4xx)
    pub fn client(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Client, message)
    }

    /// Create an authentication error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a server error (5xx)
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, message)
    }

    /// Create a transient error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    /// Create an uncategorized error
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, message)
    }

    /// Build an error from an HTTP error response
    ///
    /// Non-error statuses are classified as [`ErrorKind::Other`].
    pub fn from_status(status: u16, body: impl fmt::Display) -> Self {
        let kind = ErrorKind::from_status(status).unwrap_or(ErrorKind::Other);
        let label = match kind {
            ErrorKind::Auth => "Authentication error",
            ErrorKind::Server => "Server error",
            _ => "Client error",
        };
        Self::new(kind, format!("{} {}: {}", label, status, body))
    }

    /// Attach an underlying cause
    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The error message without the kind prefix
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Classify for ProbeError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}
