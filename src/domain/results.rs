//! Result types for external calls and component runs.
//!
//! Two layers:
//! - [`ApiResult`]: transport level, produced by every guarded external call
//! - [`ComponentResult`]: component level, carries whether a retry can help

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed external call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// HTTP 429
    RateLimit,

    /// HTTP 5xx or connection failure
    ServerError,

    /// No response within the attempt timeout
    Timeout,

    /// HTTP 401/403
    AuthError,

    /// Short-circuited by an open breaker; no call was made
    CircuitOpen,

    /// Anything else (other 4xx, undecodable body)
    Unknown,
}

impl ErrorKind {
    /// Whether a component failing with this kind may succeed on a later pass.
    ///
    /// Only credential failures need outside intervention; everything else,
    /// an open breaker included, clears up with time.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, Self::AuthError)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::ServerError => "server_error",
            Self::Timeout => "timeout",
            Self::AuthError => "auth_error",
            Self::CircuitOpen => "circuit_open",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified external-call failure
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of a guarded external call: data or a classified error, never both
pub type ApiResult<T> = Result<T, ApiError>;

/// Raw failure reported by a transport, before classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallFailure {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl CallFailure {
    /// Map a raw failure onto the error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Status { status: 429, .. } => ErrorKind::RateLimit,
            Self::Status {
                status: 401 | 403, ..
            } => ErrorKind::AuthError,
            Self::Status { status, .. } if *status >= 500 => ErrorKind::ServerError,
            Self::Status { .. } => ErrorKind::Unknown,
            Self::Connect(_) => ErrorKind::ServerError,
            Self::Timeout => ErrorKind::Timeout,
            Self::Decode(_) => ErrorKind::Unknown,
        }
    }

    pub fn classify(&self) -> ApiError {
        ApiError::new(self.kind(), self.to_string())
    }
}

/// Failure of a component run
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ComponentError {
    pub message: String,

    /// False only for authentication/authorization failures
    pub retriable: bool,
}

impl ComponentError {
    pub fn retriable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retriable: true,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retriable: false,
        }
    }

    /// Prefix the message with where the failure happened
    pub fn context(mut self, context: impl std::fmt::Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }
}

impl From<ApiError> for ComponentError {
    fn from(err: ApiError) -> Self {
        Self {
            retriable: err.kind.is_retriable(),
            message: err.to_string(),
        }
    }
}

/// Outcome of a component run
pub type ComponentResult<T> = Result<T, ComponentError>;
