//! Managed object references.
//!
//! vCenter identifies every inventory object by its type name and an opaque value such
//! as `vm-42` or `group-v3`. References are weak: they are re-resolved on every call.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::ObjectKind;

/// Reference to a remote managed object.
///
/// Serializes in the VI/JSON shape `{"_typeName": "ManagedObjectReference", "type": ..., "value": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "_typeName", rename = "ManagedObjectReference")]
pub struct MoRef {
    /// Managed object type, for example `VirtualMachine`
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque identifier, for example `vm-42`
    pub value: String,
}

impl MoRef {
    /// Create a reference from a type name and identifier.
    #[must_use]
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// Create a reference for a known object kind.
    #[must_use]
    pub fn of(kind: ObjectKind, value: impl Into<String>) -> Self {
        Self::new(kind.as_type_name(), value)
    }

    /// The object kind, when it is one the lifecycle core understands.
    #[must_use]
    pub fn object_kind(&self) -> Option<ObjectKind> {
        ObjectKind::from_type_name(&self.kind)
    }

    /// Whether the reference names an object of the given kind.
    #[must_use]
    pub fn is(&self, kind: ObjectKind) -> bool {
        self.kind == kind.as_type_name()
    }

    /// The opaque identifier.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for MoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}
