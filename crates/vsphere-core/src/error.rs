//! Error types for vSphere control-plane operations.
//!
//! This module provides the transport-level error type returned by every remote call,
//! including HTTP status code mapping and the structured faults reported by vCenter.
//! Operation-level failures are expressed with [`crate::record::ErrorRecord`] instead.

use thiserror::Error;

/// Main error type for vSphere operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// vCenter is unreachable or refused the connection
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Operation timed out
    #[error("Timeout waiting for vCenter: {0}")]
    Timeout(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// The session is missing, expired, or the credentials were rejected
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Structured fault returned by the control plane
    #[error("{code}: {message}")]
    Fault {
        /// Fault type name, for example `DuplicateName`
        code: String,
        /// Localized fault message
        message: String,
    },

    /// Failed to parse a control-plane response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// No transport is available to reach the control plane
    #[error("Not connected: {0}")]
    NotConnected(String),
}

/// Specialized result type for vSphere operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Timeout(_) => "TIMEOUT",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::NotAuthenticated(_) => "NOT_AUTHENTICATED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Fault { .. } => "FAULT",
            Self::ParseError(_) => "PARSE_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::NotConnected(_) => "NOT_CONNECTED",
        }
    }

    /// Returns the fault type name when the control plane reported a structured fault.
    #[must_use]
    pub fn fault_code(&self) -> Option<&str> {
        match self {
            Self::Fault { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// Returns the underlying message without the variant prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Fault { message, .. } => message,
            Self::ServiceUnavailable(msg)
            | Self::Timeout(msg)
            | Self::HttpError(msg)
            | Self::NotAuthenticated(msg)
            | Self::NotFound(msg)
            | Self::ParseError(msg)
            | Self::ConfigError(msg)
            | Self::InvalidEndpoint(msg)
            | Self::NotConnected(msg) => msg,
        }
    }

    /// Returns true when the error means the held session can no longer be used.
    #[must_use]
    pub const fn is_session_fault(&self) -> bool {
        matches!(self, Self::NotAuthenticated(_) | Self::NotConnected(_))
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(format!("connection failed: {err}"))
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(format!("Invalid configuration: {err}"))
    }
}
