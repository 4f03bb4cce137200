//! Core vSphere domain types.
//!
//! This module provides the inventory object kinds the lifecycle core resolves, VM power
//! states, guest operating system families, and asynchronous task references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default HTTPS port for vCenter
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Inventory object kinds understood by the lifecycle core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Virtual machine or template
    VirtualMachine,
    /// ESXi host
    HostSystem,
    /// DRS/HA cluster
    ClusterComputeResource,
    /// Standalone host compute resource
    ComputeResource,
    /// Inventory folder
    Folder,
    /// Resource pool
    ResourcePool,
    /// Standard switch network
    Network,
    /// Distributed switch port group
    DistributedVirtualPortgroup,
    /// Datacenter
    Datacenter,
    /// Asynchronous task
    Task,
}

impl ObjectKind {
    /// Returns the managed object type name.
    #[must_use]
    pub const fn as_type_name(&self) -> &'static str {
        match self {
            Self::VirtualMachine => "VirtualMachine",
            Self::HostSystem => "HostSystem",
            Self::ClusterComputeResource => "ClusterComputeResource",
            Self::ComputeResource => "ComputeResource",
            Self::Folder => "Folder",
            Self::ResourcePool => "ResourcePool",
            Self::Network => "Network",
            Self::DistributedVirtualPortgroup => "DistributedVirtualPortgroup",
            Self::Datacenter => "Datacenter",
            Self::Task => "Task",
        }
    }

    /// Parses a managed object type name.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.as_type_name() == name)
    }

    /// Returns all known kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::VirtualMachine,
            Self::HostSystem,
            Self::ClusterComputeResource,
            Self::ComputeResource,
            Self::Folder,
            Self::ResourcePool,
            Self::Network,
            Self::DistributedVirtualPortgroup,
            Self::Datacenter,
            Self::Task,
        ]
    }

    /// Returns the prefix vCenter uses for identifiers of this kind, when it is stable.
    #[must_use]
    pub const fn id_prefix(&self) -> Option<&'static str> {
        match self {
            Self::VirtualMachine => Some("vm-"),
            Self::HostSystem => Some("host-"),
            Self::ResourcePool => Some("resgroup-"),
            Self::Network => Some("network-"),
            Self::DistributedVirtualPortgroup => Some("dvportgroup-"),
            Self::Datacenter => Some("datacenter-"),
            Self::Task => Some("task-"),
            Self::ClusterComputeResource
            | Self::ComputeResource
            | Self::Folder => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_type_name())
    }
}

/// Virtual machine power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerState {
    /// Running
    PoweredOn,
    /// Stopped
    PoweredOff,
    /// Suspended to disk
    Suspended,
}

impl PowerState {
    /// Returns the vSphere name of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PoweredOn => "poweredOn",
            Self::PoweredOff => "poweredOff",
            Self::Suspended => "suspended",
        }
    }

    /// Whether device and compute changes may be applied in this state.
    #[must_use]
    pub const fn allows_reconfigure(&self) -> bool {
        matches!(self, Self::PoweredOff)
    }
}

impl FromStr for PowerState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "poweredOn" => Ok(Self::PoweredOn),
            "poweredOff" => Ok(Self::PoweredOff),
            "suspended" => Ok(Self::Suspended),
            _ => Err(Error::ParseError(format!("Unknown power state: {s}"))),
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guest operating system family, derived from the guest identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestOsFamily {
    /// Windows guests, customized with Sysprep
    Windows,
    /// Everything else, customized with `LinuxPrep`
    Linux,
}

impl GuestOsFamily {
    /// Derive the family from a guest identifier such as `windows2019srv_64Guest`.
    #[must_use]
    pub fn from_guest_id(guest_id: &str) -> Self {
        if guest_id.to_lowercase().contains("win") {
            Self::Windows
        } else {
            Self::Linux
        }
    }
}

/// State of an asynchronous remote task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    /// Waiting to run
    Queued,
    /// In progress
    Running,
    /// Completed successfully
    Success,
    /// Completed with an error
    Error,
}

/// Reference to an asynchronous task submitted to the control plane.
///
/// The core never waits on tasks; callers may look them up later by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskRef(String);

impl TaskRef {
    /// Wrap a task identifier such as `task-1042`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The task identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts into the inner identifier.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
