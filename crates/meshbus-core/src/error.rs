//! Unified error types for MeshBus.
//!
//! Every bus operation reports failure through [`AppError`], whose
//! [`ErrorKind`] is the status code returned by the administrative API
//! (`BindSessionPort`, `JoinSession`, `LeaveSession`, ...).

use std::fmt;
use thiserror::Error;

/// Status categories returned by bus operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The target endpoint could not be resolved.
    NoEndpoint,
    /// The session id is unknown or the session has been torn down.
    NoSession,
    /// The caller is not a member of the session it addressed.
    NotSessionMember,
    /// The permission filter removed every usable transport.
    NoTransports,
    /// A unique name is already registered.
    DuplicateName,
    /// The destination queue is saturated; the caller may retry.
    Busy,
    /// A join/accept round-trip exceeded its deadline.
    Timeout,
    /// The accept-callback or an administrative check refused the request.
    Denied,
    /// The session port is already bound by this binder.
    PortInUse,
    /// The joiner's session options are incompatible with the bound port.
    BadSessionOpts,
    /// The caller is already a member of the session.
    AlreadyJoined,
    /// An argument was malformed or contradictory.
    InvalidArgument,
    /// Peer authentication failed.
    Authentication,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEndpoint => write!(f, "NO_ENDPOINT"),
            Self::NoSession => write!(f, "NO_SESSION"),
            Self::NotSessionMember => write!(f, "NOT_SESSION_MEMBER"),
            Self::NoTransports => write!(f, "NO_TRANSPORTS"),
            Self::DuplicateName => write!(f, "DUPLICATE_NAME"),
            Self::Busy => write!(f, "BUSY"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Denied => write!(f, "DENIED"),
            Self::PortInUse => write!(f, "PORT_IN_USE"),
            Self::BadSessionOpts => write!(f, "BAD_SESSION_OPTS"),
            Self::AlreadyJoined => write!(f, "ALREADY_JOINED"),
            Self::InvalidArgument => write!(f, "INVALID_ARGUMENT"),
            Self::Authentication => write!(f, "AUTHENTICATION"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified error used throughout MeshBus.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the caller may retry the failed operation unchanged.
    ///
    /// Only transient backpressure is retryable; the router never retries
    /// on its own.
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Busy
    }

    /// Create a no-endpoint error.
    pub fn no_endpoint(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoEndpoint, message)
    }

    /// Create a no-session error.
    pub fn no_session(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoSession, message)
    }

    /// Create a not-a-session-member error.
    pub fn not_session_member(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSessionMember, message)
    }

    /// Create a no-transports error.
    pub fn no_transports(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoTransports, message)
    }

    /// Create a duplicate-name error.
    pub fn duplicate_name(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateName, message)
    }

    /// Create a busy error.
    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Busy, message)
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create a denied error.
    pub fn denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Denied, message)
    }

    /// Create a port-in-use error.
    pub fn port_in_use(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PortInUse, message)
    }

    /// Create a bad-session-options error.
    pub fn bad_session_opts(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadSessionOpts, message)
    }

    /// Create an already-joined error.
    pub fn already_joined(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyJoined, message)
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Internal, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
