//! Uniform result envelope.

use crate::record::ErrorRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of a lifecycle operation.
///
/// Exactly one of `data` and `error` is populated; `success` is `false` whenever `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope<T> {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

impl<T> ResultEnvelope<T> {
    /// A successful outcome with a generated request id.
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            request_id: Some(Uuid::new_v4().to_string()),
        }
    }

    /// A failed outcome.
    #[must_use]
    pub fn fail(error: ErrorRecord) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            request_id: None,
        }
    }

    /// Replace the request id, for example with a remote task id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Whether the operation succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// The payload of a successful operation.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// The error of a failed operation.
    #[must_use]
    pub const fn error(&self) -> Option<&ErrorRecord> {
        self.error.as_ref()
    }

    /// Correlation id, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Convert into a standard [`Result`].
    ///
    /// # Errors
    ///
    /// Returns the carried [`ErrorRecord`] for failed operations.
    pub fn into_result(self) -> std::result::Result<T, ErrorRecord> {
        match (self.data, self.error) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(error),
            (None, None) => Err(ErrorRecord::new(
                crate::record::ErrorKind::ApiError,
                "empty result envelope",
            )),
        }
    }
}

impl<T> From<std::result::Result<T, ErrorRecord>> for ResultEnvelope<T> {
    fn from(result: std::result::Result<T, ErrorRecord>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(error) => Self::fail(error),
        }
    }
}
