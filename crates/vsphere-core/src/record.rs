//! Structured error records returned to callers.
//!
//! Every failed lifecycle operation is reported as an [`ErrorRecord`] carrying one of the
//! nine [`ErrorKind`]s, a human-readable message, the offending parameter when known, a
//! remediation suggestion, and the listing operations that help the caller recover.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed error taxonomy for lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// A required parameter was not supplied
    MissingParameter,
    /// A parameter was supplied but is out of range or malformed
    InvalidParameter,
    /// A named resource does not exist on the platform
    ResourceNotFound,
    /// The platform rejected the credentials or the operation
    PermissionDenied,
    /// The platform lacks capacity for the request
    QuotaExceeded,
    /// The remote-access transport is not available
    DependencyMissing,
    /// Any other control-plane failure
    ApiError,
    /// The target is not in a state that allows the operation
    PreconditionFailed,
    /// The platform endpoint could not be reached
    ConnectionError,
}

impl ErrorKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingParameter => "MISSING_PARAMETER",
            Self::InvalidParameter => "INVALID_PARAMETER",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::DependencyMissing => "DEPENDENCY_MISSING",
            Self::ApiError => "API_ERROR",
            Self::PreconditionFailed => "PRECONDITION_FAILED",
            Self::ConnectionError => "CONNECTION_ERROR",
        }
    }

    /// Returns the remediation offered when nothing more specific is known.
    #[must_use]
    pub const fn default_suggestion(&self) -> &'static str {
        match self {
            Self::MissingParameter => "Provide the missing parameter and retry",
            Self::InvalidParameter => "Correct the parameter value and retry",
            Self::ResourceNotFound => "Use the listing operations to find valid resource names",
            Self::PermissionDenied => "Check the username, password and assigned privileges",
            Self::QuotaExceeded => {
                "Check host resource usage, or choose a different host or cluster"
            }
            Self::DependencyMissing => {
                "Build with the remote-access transport enabled or supply a connector"
            }
            Self::ApiError => "Check the parameters, or retry later",
            Self::PreconditionFailed => "Bring the resource into the required state and retry",
            Self::ConnectionError => "Check the vSphere host address, port and network connectivity",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A listing operation that helps the caller correct a failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedOperation {
    /// Operation name, for example `describeTemplates`
    pub name: String,
    /// What the operation returns
    pub description: String,
    /// Example arguments for the operation
    #[serde(default)]
    pub example_args: serde_json::Value,
}

impl RelatedOperation {
    /// Create a related operation entry.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        example_args: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            example_args,
        }
    }
}

/// Structured, immutable description of a failed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    kind: ErrorKind,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parameter: Option<String>,
    suggestion: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    related_operations: Vec<RelatedOperation>,
}

impl ErrorRecord {
    /// Create a record with the kind's default suggestion.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            parameter: None,
            suggestion: kind.default_suggestion().to_string(),
            related_operations: Vec::new(),
        }
    }

    /// A required parameter is absent.
    #[must_use]
    pub fn missing_parameter(parameter: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingParameter, message).with_parameter(parameter)
    }

    /// A parameter failed validation.
    #[must_use]
    pub fn invalid_parameter(parameter: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParameter, message).with_parameter(parameter)
    }

    /// A named resource could not be resolved.
    #[must_use]
    pub fn not_found(parameter: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceNotFound, message).with_parameter(parameter)
    }

    /// Attach the offending parameter name.
    #[must_use]
    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    /// Replace the remediation suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }

    /// Append a related listing operation.
    #[must_use]
    pub fn with_related(mut self, operation: RelatedOperation) -> Self {
        self.related_operations.push(operation);
        self
    }

    /// The error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The parameter that caused the failure, if known.
    #[must_use]
    pub fn parameter(&self) -> Option<&str> {
        self.parameter.as_deref()
    }

    /// Remediation guidance.
    #[must_use]
    pub fn suggestion(&self) -> &str {
        &self.suggestion
    }

    /// Listing operations that help correct the request.
    #[must_use]
    pub fn related_operations(&self) -> &[RelatedOperation] {
        &self.related_operations
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ErrorRecord {}
