//! In-memory inventory implementing [`VimApi`].
//!
//! Objects are enumerated in insertion order. Mutating calls are recorded as
//! [`Submission`]s and answered with fresh task references; nothing is applied to the
//! inventory, matching the fire-and-forget contract of the real control plane.

use crate::api::{PowerAction, VimApi};
use crate::models::{
    CloneSpec, ConfigSpec, HostHardwareSummary, HostQuickStats, HostSummary, ManagedObject,
    PortgroupInfo, ResourcePoolConfig, TaskInfo, VirtualDevice, VirtualHardware, VmConfig,
    VmRuntime,
};
use crate::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use vsphere_core::types::{ObjectKind, PowerState, TaskState};
use vsphere_core::{Error, MoRef};

/// A mutation recorded by [`FakeInventory`].
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// `CloneVM_Task`
    Clone {
        /// Source VM or template
        template: MoRef,
        /// Destination folder
        folder: MoRef,
        /// New VM name
        name: String,
        /// Submitted spec
        spec: CloneSpec,
        /// Returned task
        task: MoRef,
    },
    /// `ReconfigVM_Task`
    Reconfigure {
        /// Target VM
        vm: MoRef,
        /// Submitted spec
        spec: ConfigSpec,
        /// Returned task
        task: MoRef,
    },
    /// Power transition
    Power {
        /// Target VM
        vm: MoRef,
        /// Requested transition
        action: PowerAction,
        /// Returned task
        task: MoRef,
    },
}

/// Handles created for a datacenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeDatacenter {
    /// The datacenter
    pub moref: MoRef,
    /// Its `vm` folder
    pub vm_folder: MoRef,
    /// Its `host` folder
    pub host_folder: MoRef,
    /// Its `network` folder
    pub network_folder: MoRef,
}

/// Description of a VM or template to add to the inventory.
#[derive(Debug, Clone)]
pub struct FakeVm {
    name: String,
    folder: MoRef,
    pool: Option<MoRef>,
    host: Option<MoRef>,
    config: Option<VmConfig>,
    power_state: PowerState,
}

impl FakeVm {
    /// A powered-off VM with 1 vCPU, 1 GiB of memory and no devices.
    #[must_use]
    pub fn new(name: impl Into<String>, folder: &MoRef) -> Self {
        let name = name.into();
        Self {
            config: Some(VmConfig {
                name: name.clone(),
                template: false,
                guest_id: Some("otherGuest64".to_string()),
                guest_full_name: Some("Other (64-bit)".to_string()),
                hardware: VirtualHardware {
                    num_cpu: 1,
                    memory_mb: 1024,
                    device: Vec::new(),
                },
            }),
            name,
            folder: folder.clone(),
            pool: None,
            host: None,
            power_state: PowerState::PoweredOff,
        }
    }

    fn config_mut(&mut self) -> Option<&mut VmConfig> {
        self.config.as_mut()
    }

    /// Mark as a template.
    #[must_use]
    pub fn template(mut self) -> Self {
        if let Some(config) = self.config_mut() {
            config.template = true;
        }
        self
    }

    /// Set the guest identifier and display name.
    #[must_use]
    pub fn guest(mut self, guest_id: &str, full_name: &str) -> Self {
        if let Some(config) = self.config_mut() {
            config.guest_id = Some(guest_id.to_string());
            config.guest_full_name = Some(full_name.to_string());
        }
        self
    }

    /// Set vCPU count and memory.
    #[must_use]
    pub fn hardware(mut self, num_cpu: i32, memory_mb: i64) -> Self {
        if let Some(config) = self.config_mut() {
            config.hardware.num_cpu = num_cpu;
            config.hardware.memory_mb = memory_mb;
        }
        self
    }

    /// Attach a virtual disk of the given size.
    #[must_use]
    pub fn disk_gb(mut self, size_gb: i64) -> Self {
        if let Some(config) = self.config_mut() {
            let key = 2000 + device_count(config);
            let kb = size_gb * 1024 * 1024;
            config.hardware.device.push(device(json!({
                "_typeName": "VirtualDisk",
                "key": key,
                "controllerKey": 1000,
                "unitNumber": 0,
                "capacityInKB": kb,
                "capacityInBytes": kb * 1024
            })));
        }
        self
    }

    /// Attach a VMXNET3 adapter on a standard network.
    #[must_use]
    pub fn nic(mut self, network_name: &str) -> Self {
        if let Some(config) = self.config_mut() {
            let key = 4000 + device_count(config);
            config.hardware.device.push(device(json!({
                "_typeName": "VirtualVmxnet3",
                "key": key,
                "deviceInfo": {"_typeName": "Description", "label": "Network adapter 1", "summary": network_name},
                "backing": {
                    "_typeName": "VirtualEthernetCardNetworkBackingInfo",
                    "deviceName": network_name
                }
            })));
        }
        self
    }

    /// Register on a host.
    #[must_use]
    pub fn on_host(mut self, host: &MoRef) -> Self {
        self.host = Some(host.clone());
        self
    }

    /// Place in a resource pool.
    #[must_use]
    pub fn in_pool(mut self, pool: &MoRef) -> Self {
        self.pool = Some(pool.clone());
        self
    }

    /// Set the power state.
    #[must_use]
    pub const fn powered(mut self, state: PowerState) -> Self {
        self.power_state = state;
        self
    }

    /// Make the configuration unreadable, as for an orphaned VM.
    #[must_use]
    pub fn inaccessible(mut self) -> Self {
        self.config = None;
        self
    }
}

fn device_count(config: &VmConfig) -> i64 {
    i64::try_from(config.hardware.device.len()).unwrap_or(0)
}

fn device(value: serde_json::Value) -> VirtualDevice {
    match value {
        serde_json::Value::Object(map) => VirtualDevice::from_map(map),
        _ => VirtualDevice::default(),
    }
}

#[derive(Debug, Clone)]
enum Detail {
    Folder { child_types: Vec<String> },
    Datacenter,
    Cluster { pool: MoRef, hosts: Vec<MoRef> },
    Host { summary: HostSummary },
    Pool {
        config: ResourcePoolConfig,
        children: Vec<MoRef>,
        vms: Vec<MoRef>,
    },
    Vm {
        config: Option<VmConfig>,
        runtime: VmRuntime,
    },
    Network,
    Portgroup { info: PortgroupInfo },
}

#[derive(Debug, Clone)]
struct Entry {
    moref: MoRef,
    name: String,
    parent: Option<MoRef>,
    detail: Detail,
}

#[derive(Debug, Default)]
struct State {
    entries: Vec<Entry>,
    next_id: u32,
    dead: bool,
    remote_calls: usize,
    logouts: usize,
    failures: HashMap<&'static str, Error>,
    submissions: Vec<Submission>,
    tasks: HashMap<String, TaskInfo>,
}

impl State {
    fn allocate(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn insert(
        &mut self,
        kind: ObjectKind,
        prefix: &str,
        name: &str,
        parent: Option<&MoRef>,
        detail: Detail,
    ) -> MoRef {
        let moref = MoRef::of(kind, self.allocate(prefix));
        self.entries.push(Entry {
            moref: moref.clone(),
            name: name.to_string(),
            parent: parent.cloned(),
            detail,
        });
        moref
    }

    fn entry(&self, moref: &MoRef) -> Result<&Entry> {
        self.entries
            .iter()
            .find(|entry| &entry.moref == moref)
            .ok_or_else(|| not_found(moref))
    }

    fn entry_mut(&mut self, moref: &MoRef) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|entry| &entry.moref == moref)
    }

    fn begin(&mut self, operation: &'static str) -> Result<()> {
        self.remote_calls += 1;
        if self.dead {
            return Err(Error::NotAuthenticated(
                "The session is not authenticated.".to_string(),
            ));
        }
        match self.failures.remove(operation) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn submit_task(&mut self, entity: &MoRef, description: &str) -> MoRef {
        let task = MoRef::of(ObjectKind::Task, self.allocate("task-"));
        let entity_name = self
            .entries
            .iter()
            .find(|entry| &entry.moref == entity)
            .map(|entry| entry.name.clone());
        self.tasks.insert(
            task.value().to_string(),
            TaskInfo {
                key: task.value().to_string(),
                state: TaskState::Queued,
                description_id: Some(description.to_string()),
                entity_name,
                error: None,
                queue_time: Some(chrono::Utc::now()),
                start_time: None,
                complete_time: None,
            },
        );
        task
    }
}

fn not_found(moref: &MoRef) -> Error {
    Error::Fault {
        code: "ManagedObjectNotFound".to_string(),
        message: format!(
            "The object 'vim.{}:{}' has already been deleted or has not been completely created",
            moref.kind, moref.value
        ),
    }
}

fn wrong_kind(moref: &MoRef, expected: &str) -> Error {
    Error::Fault {
        code: "InvalidArgument".to_string(),
        message: format!("{moref} is not a {expected}"),
    }
}

/// In-memory vCenter inventory.
#[derive(Debug)]
pub struct FakeInventory {
    state: Mutex<State>,
    root: MoRef,
}

impl Default for FakeInventory {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeInventory {
    /// Create an inventory holding only the root folder.
    #[must_use]
    pub fn new() -> Self {
        let mut state = State::default();
        let root = state.insert(
            ObjectKind::Folder,
            "group-d",
            "Datacenters",
            None,
            Detail::Folder {
                child_types: vec!["Folder".to_string(), "Datacenter".to_string()],
            },
        );
        Self {
            state: Mutex::new(state),
            root,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The root folder.
    #[must_use]
    pub fn root_folder(&self) -> MoRef {
        self.root.clone()
    }

    /// Add a datacenter with its `vm`, `host` and `network` folders.
    pub fn add_datacenter(&self, name: &str) -> FakeDatacenter {
        let mut state = self.lock();
        let dc = state.insert(
            ObjectKind::Datacenter,
            "datacenter-",
            name,
            Some(&self.root),
            Detail::Datacenter,
        );
        let folder = |types: &[&str]| Detail::Folder {
            child_types: types.iter().map(|t| (*t).to_string()).collect(),
        };
        let vm_folder = state.insert(
            ObjectKind::Folder,
            "group-v",
            "vm",
            Some(&dc),
            folder(&["Folder", "VirtualMachine", "VirtualApp"]),
        );
        let host_folder = state.insert(
            ObjectKind::Folder,
            "group-h",
            "host",
            Some(&dc),
            folder(&["Folder", "ComputeResource"]),
        );
        let network_folder = state.insert(
            ObjectKind::Folder,
            "group-n",
            "network",
            Some(&dc),
            folder(&["Folder", "Network", "DistributedVirtualSwitch"]),
        );
        FakeDatacenter {
            moref: dc,
            vm_folder,
            host_folder,
            network_folder,
        }
    }

    /// Add a folder.
    pub fn add_folder(&self, name: &str, parent: &MoRef, child_types: &[&str]) -> MoRef {
        self.lock().insert(
            ObjectKind::Folder,
            "group-v",
            name,
            Some(parent),
            Detail::Folder {
                child_types: child_types.iter().map(|t| (*t).to_string()).collect(),
            },
        )
    }

    /// Add a cluster and its root resource pool `Resources`.
    pub fn add_cluster(&self, name: &str, host_folder: &MoRef) -> MoRef {
        let mut state = self.lock();
        let cluster_id = state.allocate("domain-c");
        let cluster = MoRef::of(ObjectKind::ClusterComputeResource, cluster_id);
        let pool = state.insert(
            ObjectKind::ResourcePool,
            "resgroup-",
            "Resources",
            Some(&cluster),
            Detail::Pool {
                config: ResourcePoolConfig::default(),
                children: Vec::new(),
                vms: Vec::new(),
            },
        );
        state.entries.push(Entry {
            moref: cluster.clone(),
            name: name.to_string(),
            parent: Some(host_folder.clone()),
            detail: Detail::Cluster {
                pool,
                hosts: Vec::new(),
            },
        });
        cluster
    }

    /// The root resource pool of a cluster.
    #[must_use]
    pub fn cluster_pool(&self, cluster: &MoRef) -> Option<MoRef> {
        let state = self.lock();
        match state.entry(cluster).map(|entry| &entry.detail) {
            Ok(Detail::Cluster { pool, .. }) => Some(pool.clone()),
            _ => None,
        }
    }

    /// Add a host to a cluster.
    pub fn add_host(
        &self,
        name: &str,
        cluster: &MoRef,
        cores: i32,
        cpu_mhz: i32,
        memory_bytes: i64,
    ) -> MoRef {
        let mut state = self.lock();
        let host = state.insert(
            ObjectKind::HostSystem,
            "host-",
            name,
            Some(cluster),
            Detail::Host {
                summary: HostSummary {
                    hardware: Some(HostHardwareSummary {
                        num_cpu_cores: cores,
                        cpu_mhz,
                        memory_size: memory_bytes,
                    }),
                    quick_stats: HostQuickStats::default(),
                },
            },
        );
        if let Some(Entry {
            detail: Detail::Cluster { hosts, .. },
            ..
        }) = state.entry_mut(cluster)
        {
            hosts.push(host.clone());
        }
        host
    }

    /// Set the live usage of a host.
    pub fn set_host_usage(&self, host: &MoRef, cpu_mhz: i64, memory_mb: i64) {
        if let Some(Entry {
            detail: Detail::Host { summary },
            ..
        }) = self.lock().entry_mut(host)
        {
            summary.quick_stats = HostQuickStats {
                overall_cpu_usage: Some(cpu_mhz),
                overall_memory_usage: Some(memory_mb),
            };
        }
    }

    /// Add a child resource pool.
    pub fn add_resource_pool(
        &self,
        name: &str,
        parent: &MoRef,
        config: ResourcePoolConfig,
    ) -> MoRef {
        let mut state = self.lock();
        let pool = state.insert(
            ObjectKind::ResourcePool,
            "resgroup-",
            name,
            Some(parent),
            Detail::Pool {
                config,
                children: Vec::new(),
                vms: Vec::new(),
            },
        );
        if let Some(Entry {
            detail: Detail::Pool { children, .. },
            ..
        }) = state.entry_mut(parent)
        {
            children.push(pool.clone());
        }
        pool
    }

    /// Add a VM or template.
    pub fn add_vm(&self, vm: FakeVm) -> MoRef {
        let mut state = self.lock();
        let moref = state.insert(
            ObjectKind::VirtualMachine,
            "vm-",
            &vm.name,
            Some(&vm.folder),
            Detail::Vm {
                config: vm.config,
                runtime: VmRuntime {
                    power_state: vm.power_state,
                    host: vm.host,
                },
            },
        );
        if let Some(pool) = vm.pool {
            if let Some(Entry {
                detail: Detail::Pool { vms, .. },
                ..
            }) = state.entry_mut(&pool)
            {
                vms.push(moref.clone());
            }
        }
        moref
    }

    /// Add a standard switch network.
    pub fn add_network(&self, name: &str, network_folder: &MoRef) -> MoRef {
        self.lock().insert(
            ObjectKind::Network,
            "network-",
            name,
            Some(network_folder),
            Detail::Network,
        )
    }

    /// Add a distributed port group.
    pub fn add_portgroup(&self, name: &str, network_folder: &MoRef, switch_uuid: &str) -> MoRef {
        let mut state = self.lock();
        let id = state.allocate("dvportgroup-");
        let moref = MoRef::of(ObjectKind::DistributedVirtualPortgroup, id.clone());
        state.entries.push(Entry {
            moref: moref.clone(),
            name: name.to_string(),
            parent: Some(network_folder.clone()),
            detail: Detail::Portgroup {
                info: PortgroupInfo {
                    key: id,
                    switch_uuid: switch_uuid.to_string(),
                },
            },
        });
        moref
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: &'static str, error: Error) {
        self.lock().failures.insert(operation, error);
    }

    /// Mark the session dead or alive.
    pub fn set_alive(&self, alive: bool) {
        self.lock().dead = !alive;
    }

    /// Recorded mutations, oldest first.
    #[must_use]
    pub fn submissions(&self) -> Vec<Submission> {
        self.lock().submissions.clone()
    }

    /// Number of remote calls made, excluding liveness checks and logout.
    #[must_use]
    pub fn remote_calls(&self) -> usize {
        self.lock().remote_calls
    }

    /// Number of logouts.
    #[must_use]
    pub fn logouts(&self) -> usize {
        self.lock().logouts
    }
}

#[async_trait]
impl VimApi for FakeInventory {
    async fn is_alive(&self) -> bool {
        !self.lock().dead
    }

    async fn list_objects(&self, kind: ObjectKind) -> Result<Vec<ManagedObject>> {
        let mut state = self.lock();
        state.begin("list_objects")?;
        Ok(state
            .entries
            .iter()
            .filter(|entry| entry.moref.is(kind))
            .map(|entry| ManagedObject::new(entry.moref.clone(), entry.name.clone()))
            .collect())
    }

    async fn name(&self, obj: &MoRef) -> Result<String> {
        let mut state = self.lock();
        state.begin("name")?;
        state.entry(obj).map(|entry| entry.name.clone())
    }

    async fn parent(&self, obj: &MoRef) -> Result<Option<MoRef>> {
        let mut state = self.lock();
        state.begin("parent")?;
        state.entry(obj).map(|entry| entry.parent.clone())
    }

    async fn vm_config(&self, vm: &MoRef) -> Result<Option<VmConfig>> {
        let mut state = self.lock();
        state.begin("vm_config")?;
        match &state.entry(vm)?.detail {
            Detail::Vm { config, .. } => Ok(config.clone()),
            _ => Err(wrong_kind(vm, "VirtualMachine")),
        }
    }

    async fn vm_runtime(&self, vm: &MoRef) -> Result<VmRuntime> {
        let mut state = self.lock();
        state.begin("vm_runtime")?;
        match &state.entry(vm)?.detail {
            Detail::Vm { runtime, .. } => Ok(runtime.clone()),
            _ => Err(wrong_kind(vm, "VirtualMachine")),
        }
    }

    async fn host_summary(&self, host: &MoRef) -> Result<HostSummary> {
        let mut state = self.lock();
        state.begin("host_summary")?;
        match &state.entry(host)?.detail {
            Detail::Host { summary } => Ok(summary.clone()),
            _ => Err(wrong_kind(host, "HostSystem")),
        }
    }

    async fn cluster_resource_pool(&self, cluster: &MoRef) -> Result<Option<MoRef>> {
        let mut state = self.lock();
        state.begin("cluster_resource_pool")?;
        match &state.entry(cluster)?.detail {
            Detail::Cluster { pool, .. } => Ok(Some(pool.clone())),
            _ => Err(wrong_kind(cluster, "ClusterComputeResource")),
        }
    }

    async fn cluster_hosts(&self, cluster: &MoRef) -> Result<Vec<MoRef>> {
        let mut state = self.lock();
        state.begin("cluster_hosts")?;
        match &state.entry(cluster)?.detail {
            Detail::Cluster { hosts, .. } => Ok(hosts.clone()),
            _ => Err(wrong_kind(cluster, "ClusterComputeResource")),
        }
    }

    async fn folder_child_types(&self, folder: &MoRef) -> Result<Vec<String>> {
        let mut state = self.lock();
        state.begin("folder_child_types")?;
        match &state.entry(folder)?.detail {
            Detail::Folder { child_types } => Ok(child_types.clone()),
            _ => Err(wrong_kind(folder, "Folder")),
        }
    }

    async fn resource_pool_config(&self, pool: &MoRef) -> Result<ResourcePoolConfig> {
        let mut state = self.lock();
        state.begin("resource_pool_config")?;
        match &state.entry(pool)?.detail {
            Detail::Pool { config, .. } => Ok(config.clone()),
            _ => Err(wrong_kind(pool, "ResourcePool")),
        }
    }

    async fn resource_pool_children(&self, pool: &MoRef) -> Result<Vec<MoRef>> {
        let mut state = self.lock();
        state.begin("resource_pool_children")?;
        match &state.entry(pool)?.detail {
            Detail::Pool { children, .. } => Ok(children.clone()),
            _ => Err(wrong_kind(pool, "ResourcePool")),
        }
    }

    async fn resource_pool_vms(&self, pool: &MoRef) -> Result<Vec<MoRef>> {
        let mut state = self.lock();
        state.begin("resource_pool_vms")?;
        match &state.entry(pool)?.detail {
            Detail::Pool { vms, .. } => Ok(vms.clone()),
            _ => Err(wrong_kind(pool, "ResourcePool")),
        }
    }

    async fn portgroup_info(&self, portgroup: &MoRef) -> Result<PortgroupInfo> {
        let mut state = self.lock();
        state.begin("portgroup_info")?;
        match &state.entry(portgroup)?.detail {
            Detail::Portgroup { info } => Ok(info.clone()),
            _ => Err(wrong_kind(portgroup, "DistributedVirtualPortgroup")),
        }
    }

    async fn clone_vm(
        &self,
        template: &MoRef,
        folder: &MoRef,
        name: &str,
        spec: &CloneSpec,
    ) -> Result<MoRef> {
        let mut state = self.lock();
        state.begin("clone_vm")?;
        state.entry(template)?;
        state.entry(folder)?;
        let task = state.submit_task(template, "VirtualMachine.clone");
        state.submissions.push(Submission::Clone {
            template: template.clone(),
            folder: folder.clone(),
            name: name.to_string(),
            spec: spec.clone(),
            task: task.clone(),
        });
        Ok(task)
    }

    async fn reconfigure_vm(&self, vm: &MoRef, spec: &ConfigSpec) -> Result<MoRef> {
        let mut state = self.lock();
        state.begin("reconfigure_vm")?;
        state.entry(vm)?;
        let task = state.submit_task(vm, "VirtualMachine.reconfigure");
        state.submissions.push(Submission::Reconfigure {
            vm: vm.clone(),
            spec: spec.clone(),
            task: task.clone(),
        });
        Ok(task)
    }

    async fn power_vm(&self, vm: &MoRef, action: PowerAction) -> Result<MoRef> {
        let mut state = self.lock();
        state.begin("power_vm")?;
        state.entry(vm)?;
        let description = match action {
            PowerAction::On => "VirtualMachine.powerOn",
            PowerAction::Off => "VirtualMachine.powerOff",
            PowerAction::Suspend => "VirtualMachine.suspend",
        };
        let task = state.submit_task(vm, description);
        state.submissions.push(Submission::Power {
            vm: vm.clone(),
            action,
            task: task.clone(),
        });
        Ok(task)
    }

    async fn task_info(&self, task: &MoRef) -> Result<TaskInfo> {
        let mut state = self.lock();
        state.begin("task_info")?;
        state
            .tasks
            .get(task.value())
            .cloned()
            .ok_or_else(|| not_found(task))
    }

    async fn logout(&self) -> Result<()> {
        let mut state = self.lock();
        state.logouts += 1;
        state.dead = true;
        Ok(())
    }
}
