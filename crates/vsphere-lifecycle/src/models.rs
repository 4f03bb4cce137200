//! Requests, results and listing records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use vsphere_core::types::{PowerState, TaskState};
use vsphere_vim::models::TaskInfo;

/// Default Windows time zone index (China Standard Time).
pub const DEFAULT_WINDOWS_TIME_ZONE: i32 = 210;
/// Default Linux time zone.
pub const DEFAULT_LINUX_TIME_ZONE: &str = "Asia/Shanghai";
/// Default Windows workgroup when no domain is joined.
pub const DEFAULT_WORKGROUP: &str = "WORKGROUP";
/// Default subnet mask for fixed addresses.
pub const DEFAULT_SUBNET_MASK: &str = "255.255.255.0";
/// Default Linux DNS domain.
pub const DEFAULT_LINUX_DOMAIN: &str = "localdomain";

/// Site defaults applied to guest customization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomizationDefaults {
    /// Windows time zone index
    pub windows_time_zone: i32,
    /// Olson time zone for Linux guests
    pub linux_time_zone: String,
    /// Workgroup joined by Windows guests without a domain
    pub workgroup: String,
    /// Subnet mask used when a fixed address has none
    pub subnet_mask: String,
    /// DNS domain for Linux guests without one
    pub linux_domain: String,
}

impl Default for CustomizationDefaults {
    fn default() -> Self {
        Self {
            windows_time_zone: DEFAULT_WINDOWS_TIME_ZONE,
            linux_time_zone: DEFAULT_LINUX_TIME_ZONE.to_string(),
            workgroup: DEFAULT_WORKGROUP.to_string(),
            subnet_mask: DEFAULT_SUBNET_MASK.to_string(),
            linux_domain: DEFAULT_LINUX_DOMAIN.to_string(),
        }
    }
}

impl CustomizationDefaults {
    /// Set the Windows time zone index.
    #[must_use]
    pub const fn with_windows_time_zone(mut self, index: i32) -> Self {
        self.windows_time_zone = index;
        self
    }

    /// Set the Linux time zone.
    #[must_use]
    pub fn with_linux_time_zone(mut self, zone: impl Into<String>) -> Self {
        self.linux_time_zone = zone.into();
        self
    }

    /// Set the Windows workgroup.
    #[must_use]
    pub fn with_workgroup(mut self, workgroup: impl Into<String>) -> Self {
        self.workgroup = workgroup.into();
        self
    }

    /// Set the default subnet mask.
    #[must_use]
    pub fn with_subnet_mask(mut self, mask: impl Into<String>) -> Self {
        self.subnet_mask = mask.into();
        self
    }
}

/// Guest operating system customization applied while cloning.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCustomization {
    /// Guest host name, defaults to the VM name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// DNS domain; Windows guests join it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Fixed IPv4 address; DHCP when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Subnet mask for the fixed address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_mask: Option<String>,
    /// Default gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    /// DNS servers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_servers: Vec<String>,
    /// Administrator password (Windows only)
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl GuestCustomization {
    /// Whether any field that triggers customization is set.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.ip_address.is_some()
            || self.hostname.is_some()
            || self.password.is_some()
            || self.domain.is_some()
    }
}

impl fmt::Debug for GuestCustomization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestCustomization")
            .field("hostname", &self.hostname)
            .field("domain", &self.domain)
            .field("ip_address", &self.ip_address)
            .field("subnet_mask", &self.subnet_mask)
            .field("gateway", &self.gateway)
            .field("dns_servers", &self.dns_servers)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Request to clone a new VM from a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Name of the new VM
    #[serde(default)]
    pub vm_name: String,
    /// Source template or VM
    #[serde(default)]
    pub template_name: String,
    /// Destination cluster
    #[serde(default)]
    pub cluster_name: String,
    /// vCPU override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i32>,
    /// Memory override in MB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<i64>,
    /// Destination folder, defaults to the template's folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,
    /// Destination resource pool, defaults to the cluster's root pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_pool_name: Option<String>,
    /// Network for the first adapter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,
    /// Guest customization
    #[serde(flatten)]
    pub customization: GuestCustomization,
    /// Power on after cloning, defaults to `true`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_on: Option<bool>,
}

impl TargetSpec {
    /// A request with only the required fields.
    #[must_use]
    pub fn new(
        vm_name: impl Into<String>,
        template_name: impl Into<String>,
        cluster_name: impl Into<String>,
    ) -> Self {
        Self {
            vm_name: vm_name.into(),
            template_name: template_name.into(),
            cluster_name: cluster_name.into(),
            ..Self::default()
        }
    }

    /// Override the vCPU count.
    #[must_use]
    pub const fn with_cpu(mut self, cpu: i32) -> Self {
        self.cpu = Some(cpu);
        self
    }

    /// Override memory.
    #[must_use]
    pub const fn with_memory_mb(mut self, memory_mb: i64) -> Self {
        self.memory_mb = Some(memory_mb);
        self
    }

    /// Place in a named folder.
    #[must_use]
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder_name = Some(folder.into());
        self
    }

    /// Place in a named resource pool.
    #[must_use]
    pub fn with_resource_pool(mut self, pool: impl Into<String>) -> Self {
        self.resource_pool_name = Some(pool.into());
        self
    }

    /// Attach the first adapter to a named network.
    #[must_use]
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network_name = Some(network.into());
        self
    }

    /// Customize the guest.
    #[must_use]
    pub fn with_customization(mut self, customization: GuestCustomization) -> Self {
        self.customization = customization;
        self
    }

    /// Set whether the clone powers on.
    #[must_use]
    pub const fn with_power_on(mut self, power_on: bool) -> Self {
        self.power_on = Some(power_on);
        self
    }

    /// Whether the clone powers on.
    #[must_use]
    pub fn powers_on(&self) -> bool {
        self.power_on.unwrap_or(true)
    }
}

/// Request to change an existing, powered-off VM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconfigureSpec {
    /// Target VM
    #[serde(default)]
    pub vm_name: String,
    /// New vCPU count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i32>,
    /// New memory in MB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<i64>,
    /// New size of the first disk in GB; growth only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<i64>,
    /// Network for the first adapter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,
}

impl ReconfigureSpec {
    /// A request with no changes.
    #[must_use]
    pub fn new(vm_name: impl Into<String>) -> Self {
        Self {
            vm_name: vm_name.into(),
            ..Self::default()
        }
    }

    /// Set the vCPU count.
    #[must_use]
    pub const fn with_cpu(mut self, cpu: i32) -> Self {
        self.cpu = Some(cpu);
        self
    }

    /// Set memory.
    #[must_use]
    pub const fn with_memory_mb(mut self, memory_mb: i64) -> Self {
        self.memory_mb = Some(memory_mb);
        self
    }

    /// Grow the first disk.
    #[must_use]
    pub const fn with_disk_size_gb(mut self, size_gb: i64) -> Self {
        self.disk_size_gb = Some(size_gb);
        self
    }

    /// Rebind the first adapter.
    #[must_use]
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network_name = Some(network.into());
        self
    }

    /// Whether any change was requested.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.cpu.is_some()
            || self.memory_mb.is_some()
            || self.disk_size_gb.is_some()
            || self.network_name.is_some()
    }
}

/// Overrides echoed back for an accepted clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneDetails {
    /// Source template
    pub template: String,
    /// Destination cluster
    pub cluster: String,
    /// vCPU override
    pub cpu: Option<i32>,
    /// Memory override
    pub memory_mb: Option<i64>,
    /// Requested folder
    pub folder: Option<String>,
    /// Requested resource pool
    pub resource_pool: Option<String>,
    /// Requested network
    pub network: Option<String>,
    /// Whether guest customization was attached
    pub customized: bool,
    /// Whether the clone powers on
    pub power_on: bool,
}

/// An accepted clone request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneAccepted {
    /// Name of the new VM
    pub vm_name: String,
    /// Always `creation_started`
    pub status: String,
    /// Human-readable summary
    pub message: String,
    /// Remote task to look up with `get_task`
    pub task_id: String,
    /// Echo of the request
    pub details: CloneDetails,
}

/// An accepted reconfiguration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconfigureAccepted {
    /// Target VM
    pub vm_name: String,
    /// Always `reconfiguration_started`
    pub status: String,
    /// Human-readable summary
    pub message: String,
    /// Remote task to look up with `get_task`
    pub task_id: String,
    /// Echo of the request
    pub changes: ReconfigureSpec,
}

/// An accepted power transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerSubmitted {
    /// Target VM
    pub vm_name: String,
    /// `on`, `off` or `suspend`
    pub action: String,
    /// Human-readable summary
    pub message: String,
    /// Remote task to look up with `get_task`
    pub task_id: String,
}

/// A VM template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInfo {
    /// Template name
    pub name: String,
    /// Managed object id
    pub template_id: String,
    /// Guest operating system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_os: Option<String>,
    /// vCPU count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_cpu: Option<i32>,
    /// Memory in MB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<i64>,
    /// Total disk size in whole GB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<i64>,
}

/// A virtual machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmInfo {
    /// VM name
    pub name: String,
    /// Managed object id
    pub vm_id: String,
    /// Power state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_state: Option<PowerState>,
    /// Guest operating system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_os: Option<String>,
    /// vCPU count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_cpu: Option<i32>,
    /// Memory in MB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<i64>,
    /// Host the VM runs on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    /// Cluster of that host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    /// Inventory path of the VM's folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_path: Option<String>,
}

/// An ESXi host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Host name
    pub name: String,
    /// Managed object id
    pub host_id: String,
    /// CPU usage in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    /// Memory usage in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
    /// Physical CPU cores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cpu: Option<i32>,
    /// Physical memory in whole GB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_memory_gb: Option<i64>,
}

/// A compute cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Cluster name
    pub name: String,
    /// Managed object id
    pub cluster_id: String,
    /// Hosts in the cluster
    pub num_hosts: usize,
    /// Non-template VMs in the cluster
    pub num_vms: usize,
}

/// A VM folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderInfo {
    /// Folder name
    pub name: String,
    /// Managed object id
    pub folder_id: String,
    /// Inventory path, for example `/DC1/vm/Prod`
    pub path: String,
}

/// A resource pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePoolInfo {
    /// Pool name
    pub name: String,
    /// Managed object id
    pub resource_pool_id: String,
    /// CPU limit in GHz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit_ghz: Option<f64>,
    /// Memory limit in GB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit_gb: Option<f64>,
}

/// Switch type backing a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkType {
    /// Standard switch port group
    Standard,
    /// Distributed switch port group
    Distributed,
}

/// A network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Network name
    pub name: String,
    /// Managed object id
    pub network_id: String,
    /// Switch type
    pub network_type: NetworkType,
}

/// Power state of a VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerStateReport {
    /// VM name
    pub vm_name: String,
    /// Power state
    pub power_state: PowerState,
    /// Whether the VM may be reconfigured now
    pub can_reconfigure: bool,
}

/// A point-in-time view of a remote task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Task id
    pub task_id: String,
    /// Current state
    pub state: TaskState,
    /// Operation identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Entity the task operates on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the task was queued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<DateTime<Utc>>,
    /// When the task started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the task finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<TaskInfo> for TaskStatus {
    fn from(info: TaskInfo) -> Self {
        Self {
            task_id: info.key,
            state: info.state,
            description: info.description_id,
            entity_name: info.entity_name,
            error: info.error.map(|fault| fault.localized_message),
            queued_at: info.queue_time,
            started_at: info.start_time,
            completed_at: info.complete_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn target_spec_flattens_customization() {
        let spec: TargetSpec = serde_json::from_value(json!({
            "vm_name": "web-01",
            "template_name": "ubuntu-tpl",
            "cluster_name": "Cluster01",
            "ip_address": "10.0.0.5",
            "dns_servers": ["10.0.0.2"]
        }))
        .unwrap();

        assert_eq!(spec.customization.ip_address.as_deref(), Some("10.0.0.5"));
        assert_eq!(spec.customization.dns_servers, ["10.0.0.2"]);
        assert!(spec.customization.is_requested());
        assert!(spec.powers_on());
    }

    #[test]
    fn dns_alone_does_not_request_customization() {
        let customization = GuestCustomization {
            dns_servers: vec!["10.0.0.2".to_string()],
            gateway: Some("10.0.0.1".to_string()),
            ..GuestCustomization::default()
        };
        assert!(!customization.is_requested());
    }

    #[test]
    fn password_is_redacted() {
        let customization = GuestCustomization {
            password: Some("hunter2".to_string()),
            ..GuestCustomization::default()
        };
        assert!(!format!("{customization:?}").contains("hunter2"));
        assert!(serde_json::to_value(&customization)
            .unwrap()
            .get("password")
            .is_none());
    }

    #[test]
    fn reconfigure_changes() {
        assert!(!ReconfigureSpec::new("db-01").has_changes());
        assert!(ReconfigureSpec::new("db-01").with_disk_size_gb(80).has_changes());
    }

    #[test]
    fn listing_records_omit_missing_fields() {
        let info = TemplateInfo {
            name: "tpl".to_string(),
            template_id: "vm-1".to_string(),
            guest_os: None,
            num_cpu: Some(2),
            memory_mb: None,
            disk_size_gb: None,
        };
        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            json!({"name": "tpl", "template_id": "vm-1", "num_cpu": 2})
        );
        assert_eq!(
            serde_json::to_value(NetworkType::Distributed).unwrap(),
            json!("Distributed")
        );
    }
}
