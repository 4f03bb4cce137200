//! The remote control-plane boundary.

use crate::models::{
    CloneSpec, ConfigSpec, HostSummary, ManagedObject, PortgroupInfo, ResourcePoolConfig,
    TaskInfo, VmConfig, VmRuntime,
};
use crate::Result;
use async_trait::async_trait;
use vsphere_core::types::ObjectKind;
use vsphere_core::MoRef;

/// Power transitions a VM can be asked to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerAction {
    /// `PowerOnVM_Task`
    On,
    /// `PowerOffVM_Task`
    Off,
    /// `SuspendVM_Task`
    Suspend,
}

impl PowerAction {
    /// The VI method name for the transition.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::On => "PowerOnVM_Task",
            Self::Off => "PowerOffVM_Task",
            Self::Suspend => "SuspendVM_Task",
        }
    }
}

/// Operations the lifecycle core needs from a live vCenter session.
///
/// Every mutating call returns the reference of the submitted task and does not wait
/// for it to finish.
#[async_trait]
pub trait VimApi: Send + Sync {
    /// Whether the session is still usable.
    async fn is_alive(&self) -> bool;

    /// All objects of exactly `kind` under the root folder, in server order.
    async fn list_objects(&self, kind: ObjectKind) -> Result<Vec<ManagedObject>>;

    /// Display name of an object.
    async fn name(&self, obj: &MoRef) -> Result<String>;

    /// Parent of an object, `None` at the root.
    async fn parent(&self, obj: &MoRef) -> Result<Option<MoRef>>;

    /// VM configuration, `None` when the VM is inaccessible.
    async fn vm_config(&self, vm: &MoRef) -> Result<Option<VmConfig>>;

    /// VM runtime state.
    async fn vm_runtime(&self, vm: &MoRef) -> Result<VmRuntime>;

    /// Host hardware and usage summary.
    async fn host_summary(&self, host: &MoRef) -> Result<HostSummary>;

    /// Root resource pool of a cluster.
    async fn cluster_resource_pool(&self, cluster: &MoRef) -> Result<Option<MoRef>>;

    /// Hosts belonging to a cluster.
    async fn cluster_hosts(&self, cluster: &MoRef) -> Result<Vec<MoRef>>;

    /// Child types a folder may contain.
    async fn folder_child_types(&self, folder: &MoRef) -> Result<Vec<String>>;

    /// CPU and memory allocation of a resource pool.
    async fn resource_pool_config(&self, pool: &MoRef) -> Result<ResourcePoolConfig>;

    /// Child resource pools.
    async fn resource_pool_children(&self, pool: &MoRef) -> Result<Vec<MoRef>>;

    /// VMs placed directly in a resource pool.
    async fn resource_pool_vms(&self, pool: &MoRef) -> Result<Vec<MoRef>>;

    /// Key and switch UUID of a distributed port group.
    async fn portgroup_info(&self, portgroup: &MoRef) -> Result<PortgroupInfo>;

    /// Submit `CloneVM_Task`.
    async fn clone_vm(
        &self,
        template: &MoRef,
        folder: &MoRef,
        name: &str,
        spec: &CloneSpec,
    ) -> Result<MoRef>;

    /// Submit `ReconfigVM_Task`.
    async fn reconfigure_vm(&self, vm: &MoRef, spec: &ConfigSpec) -> Result<MoRef>;

    /// Submit a power transition.
    async fn power_vm(&self, vm: &MoRef, action: PowerAction) -> Result<MoRef>;

    /// Current state of a task.
    async fn task_info(&self, task: &MoRef) -> Result<TaskInfo>;

    /// End the session.
    async fn logout(&self) -> Result<()>;
}
