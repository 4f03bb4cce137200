//! Failure type threaded through the engines.

use crate::classify;
use thiserror::Error;
use vsphere_core::ErrorRecord;

/// A lifecycle failure before it is reported to the caller.
///
/// Engine code mixes checks that already know their [`ErrorRecord`] with remote calls that
/// fail with a raw [`vsphere_core::Error`]; raw errors are classified once, at the operation
/// boundary, with the operation name as context.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Already classified
    #[error(transparent)]
    Rejected(#[from] ErrorRecord),

    /// Raw control-plane failure
    #[error(transparent)]
    Remote(#[from] vsphere_core::Error),
}

impl LifecycleError {
    /// Classify into the record returned to the caller.
    #[must_use]
    pub fn into_record(self, operation: &str) -> ErrorRecord {
        match self {
            Self::Rejected(record) => record,
            Self::Remote(err) => classify::classify(&err, operation),
        }
    }
}

/// Result alias for engine and resolver calls.
pub type Result<T> = std::result::Result<T, LifecycleError>;
