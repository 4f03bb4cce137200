//! VI/JSON data objects.
//!
//! Read models are partial: only the properties the lifecycle core consumes are typed, and
//! everything else is ignored. Write models carry the `_typeName` discriminator vCenter
//! requires on every data object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use vsphere_core::types::{PowerState, TaskState};
use vsphere_core::MoRef;

/// Device type names that are virtual ethernet cards.
pub const ETHERNET_CARD_TYPES: &[&str] = &[
    "VirtualEthernetCard",
    "VirtualE1000",
    "VirtualE1000e",
    "VirtualPCNet32",
    "VirtualVmxnet",
    "VirtualVmxnet2",
    "VirtualVmxnet3",
    "VirtualVmxnet3Vrdma",
    "VirtualSriovEthernetCard",
];

/// Type name of virtual disks.
pub const VIRTUAL_DISK_TYPE: &str = "VirtualDisk";

/// An inventory object and its display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedObject {
    /// Object reference
    pub moref: MoRef,
    /// Display name
    pub name: String,
}

impl ManagedObject {
    /// Pair a reference with its name.
    #[must_use]
    pub fn new(moref: MoRef, name: impl Into<String>) -> Self {
        Self {
            moref,
            name: name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// `VirtualMachineConfigInfo`, restricted to the properties in use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmConfig {
    /// VM name
    #[serde(default)]
    pub name: String,
    /// Whether the VM is marked as a template
    #[serde(default)]
    pub template: bool,
    /// Guest identifier, for example `ubuntu64Guest`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<String>,
    /// Guest operating system display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_full_name: Option<String>,
    /// Virtual hardware
    #[serde(default)]
    pub hardware: VirtualHardware,
}

impl VmConfig {
    /// The first virtual disk, if any.
    #[must_use]
    pub fn first_disk(&self) -> Option<&VirtualDevice> {
        self.hardware.device.iter().find(|device| device.is_disk())
    }

    /// The first virtual ethernet card, if any.
    #[must_use]
    pub fn first_ethernet_card(&self) -> Option<&VirtualDevice> {
        self.hardware
            .device
            .iter()
            .find(|device| device.is_ethernet_card())
    }

    /// Sum of all virtual disk capacities in whole GiB.
    #[must_use]
    pub fn total_disk_gb(&self) -> i64 {
        let total_kb: i64 = self
            .hardware
            .device
            .iter()
            .filter(|device| device.is_disk())
            .filter_map(VirtualDevice::capacity_in_kb)
            .sum();
        total_kb / (1024 * 1024)
    }
}

/// `VirtualHardware`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualHardware {
    /// Virtual CPU count
    #[serde(rename = "numCPU", default)]
    pub num_cpu: i32,
    /// Memory in MB
    #[serde(rename = "memoryMB", default)]
    pub memory_mb: i64,
    /// Attached devices
    #[serde(default)]
    pub device: Vec<VirtualDevice>,
}

/// `VirtualMachineRuntimeInfo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmRuntime {
    /// Current power state
    pub power_state: PowerState,
    /// Host the VM is registered on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<MoRef>,
}

/// `HostListSummary`, restricted to hardware and quick stats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSummary {
    /// Hardware summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware: Option<HostHardwareSummary>,
    /// Live usage statistics
    #[serde(default)]
    pub quick_stats: HostQuickStats,
}

/// `HostHardwareSummary`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostHardwareSummary {
    /// Physical CPU cores
    #[serde(default)]
    pub num_cpu_cores: i32,
    /// Per-core clock in MHz
    #[serde(default)]
    pub cpu_mhz: i32,
    /// Physical memory in bytes
    #[serde(default)]
    pub memory_size: i64,
}

/// `HostListSummaryQuickStats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostQuickStats {
    /// Aggregate CPU usage in MHz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_cpu_usage: Option<i64>,
    /// Aggregate memory usage in MB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_memory_usage: Option<i64>,
}

/// `ResourceConfigSpec`, restricted to CPU and memory limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePoolConfig {
    /// CPU allocation (limit in MHz)
    #[serde(default)]
    pub cpu_allocation: ResourceAllocation,
    /// Memory allocation (limit in MB)
    #[serde(default)]
    pub memory_allocation: ResourceAllocation,
}

/// `ResourceAllocationInfo`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    /// Limit, `-1` when unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// `TaskInfo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    /// Task identifier
    pub key: String,
    /// Current state
    pub state: TaskState,
    /// Operation identifier, for example `VirtualMachine.clone`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_id: Option<String>,
    /// Name of the entity the task operates on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    /// Fault for failed tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<LocalizedFault>,
    /// Time the task was queued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_time: Option<DateTime<Utc>>,
    /// Time the task started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Time the task finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_time: Option<DateTime<Utc>>,
}

/// `LocalizedMethodFault`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedFault {
    /// Localized message
    #[serde(default)]
    pub localized_message: String,
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// A virtual device as returned by vCenter.
///
/// Devices are polymorphic and round-tripped unchanged except for the properties this
/// crate edits, so the raw object is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualDevice(Map<String, Value>);

impl VirtualDevice {
    /// Wrap a raw device object.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Access the raw device object.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Device type name, for example `VirtualVmxnet3`.
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.0.get("_typeName").and_then(Value::as_str)
    }

    /// Device key.
    #[must_use]
    pub fn key(&self) -> Option<i64> {
        self.0.get("key").and_then(Value::as_i64)
    }

    /// Whether the device is a virtual disk.
    #[must_use]
    pub fn is_disk(&self) -> bool {
        self.type_name() == Some(VIRTUAL_DISK_TYPE)
    }

    /// Whether the device is a virtual ethernet card.
    #[must_use]
    pub fn is_ethernet_card(&self) -> bool {
        self.type_name()
            .is_some_and(|name| ETHERNET_CARD_TYPES.contains(&name))
    }

    /// Disk capacity in KB.
    #[must_use]
    pub fn capacity_in_kb(&self) -> Option<i64> {
        self.0.get("capacityInKB").and_then(Value::as_i64)
    }

    /// Set the disk capacity, keeping `capacityInBytes` consistent when present.
    ///
    /// Returns `None` when the size in bytes does not fit an `i64`.
    #[must_use]
    pub fn with_capacity_kb(mut self, capacity_kb: i64) -> Option<Self> {
        let capacity_bytes = capacity_kb.checked_mul(1024)?;
        self.0.insert("capacityInKB".to_string(), json!(capacity_kb));
        if self.0.contains_key("capacityInBytes") {
            self.0
                .insert("capacityInBytes".to_string(), json!(capacity_bytes));
        }
        Some(self)
    }

    /// Replace the network backing.
    #[must_use]
    pub fn with_backing(mut self, backing: &NicBacking) -> Self {
        self.0.insert("backing".to_string(), backing.to_value());
        self
    }

    /// Mark the device connected at power-on and now.
    #[must_use]
    pub fn with_connected(mut self) -> Self {
        self.0.insert(
            "connectable".to_string(),
            json!({
                "_typeName": "VirtualDeviceConnectInfo",
                "startConnected": true,
                "allowGuestControl": true,
                "connected": true
            }),
        );
        self
    }

    /// The current backing, as raw JSON.
    #[must_use]
    pub fn backing(&self) -> Option<&Value> {
        self.0.get("backing")
    }
}

/// Network backing for a virtual ethernet card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NicBacking {
    /// Standard switch port group
    Network {
        /// Network object
        network: MoRef,
        /// Network name
        device_name: String,
    },
    /// Distributed switch port group
    DistributedPort {
        /// Port group key
        portgroup_key: String,
        /// Owning switch UUID
        switch_uuid: String,
    },
}

impl NicBacking {
    fn to_value(&self) -> Value {
        match self {
            Self::Network {
                network,
                device_name,
            } => json!({
                "_typeName": "VirtualEthernetCardNetworkBackingInfo",
                "deviceName": device_name,
                "network": {
                    "_typeName": "ManagedObjectReference",
                    "type": network.kind,
                    "value": network.value
                }
            }),
            Self::DistributedPort {
                portgroup_key,
                switch_uuid,
            } => json!({
                "_typeName": "VirtualEthernetCardDistributedVirtualPortBackingInfo",
                "port": {
                    "_typeName": "DistributedVirtualSwitchPortConnection",
                    "portgroupKey": portgroup_key,
                    "switchUuid": switch_uuid
                }
            }),
        }
    }
}

/// Identity of a distributed port group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortgroupInfo {
    /// Port group key
    pub key: String,
    /// UUID of the owning distributed switch
    pub switch_uuid: String,
}

// ---------------------------------------------------------------------------
// Write models
// ---------------------------------------------------------------------------

/// `VirtualMachineCloneSpec`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_typeName", rename = "VirtualMachineCloneSpec", rename_all = "camelCase")]
pub struct CloneSpec {
    /// Placement
    pub location: RelocateSpec,
    /// Whether the clone is marked as a template
    pub template: bool,
    /// Power on after cloning
    pub power_on: bool,
    /// Compute and device overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSpec>,
    /// Guest customization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customization: Option<CustomizationSpec>,
}

/// `VirtualMachineRelocateSpec`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "_typeName", rename = "VirtualMachineRelocateSpec")]
pub struct RelocateSpec {
    /// Target resource pool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<MoRef>,
}

/// `VirtualMachineConfigSpec`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "_typeName", rename = "VirtualMachineConfigSpec")]
pub struct ConfigSpec {
    /// Virtual CPU count
    #[serde(rename = "numCPUs", skip_serializing_if = "Option::is_none")]
    pub num_cpus: Option<i32>,
    /// Memory in MB
    #[serde(rename = "memoryMB", skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<i64>,
    /// Device edits
    #[serde(rename = "deviceChange", skip_serializing_if = "Vec::is_empty")]
    pub device_change: Vec<DeviceConfigSpec>,
}

impl ConfigSpec {
    /// Whether the spec stages no change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_cpus.is_none() && self.memory_mb.is_none() && self.device_change.is_empty()
    }
}

/// `VirtualDeviceConfigSpecOperation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceOperation {
    /// Add a device
    Add,
    /// Edit a device in place
    Edit,
    /// Remove a device
    Remove,
}

/// `VirtualDeviceConfigSpec`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_typeName", rename = "VirtualDeviceConfigSpec")]
pub struct DeviceConfigSpec {
    /// Operation
    pub operation: DeviceOperation,
    /// Device after the change
    pub device: VirtualDevice,
}

impl DeviceConfigSpec {
    /// Edit an existing device.
    #[must_use]
    pub const fn edit(device: VirtualDevice) -> Self {
        Self {
            operation: DeviceOperation::Edit,
            device,
        }
    }
}

/// `CustomizationSpec`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_typeName", rename = "CustomizationSpec", rename_all = "camelCase")]
pub struct CustomizationSpec {
    /// Guest identity
    pub identity: CustomizationIdentity,
    /// Settings shared by all adapters
    #[serde(rename = "globalIPSettings")]
    pub global_ip_settings: GlobalIpSettings,
    /// Per-adapter settings
    pub nic_setting_map: Vec<AdapterMapping>,
}

/// Guest identity, one per operating system family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_typeName")]
pub enum CustomizationIdentity {
    /// Windows Sysprep identity
    #[serde(rename = "CustomizationSysprep")]
    Sysprep(Sysprep),
    /// Linux identity
    #[serde(rename = "CustomizationLinuxPrep")]
    LinuxPrep(LinuxPrep),
}

/// `CustomizationSysprep` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sysprep {
    /// Unattended setup answers
    pub gui_unattended: GuiUnattended,
    /// Owner and computer name
    pub user_data: UserData,
    /// Workgroup or domain membership
    pub identification: Identification,
}

/// `CustomizationGuiUnattended`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_typeName", rename = "CustomizationGuiUnattended", rename_all = "camelCase")]
pub struct GuiUnattended {
    /// Administrator password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<CustomizationPassword>,
    /// Windows time zone index
    pub time_zone: i32,
    /// Log on automatically after setup
    pub auto_logon: bool,
    /// Number of automatic logons
    pub auto_logon_count: i32,
}

/// `CustomizationUserData`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_typeName", rename = "CustomizationUserData", rename_all = "camelCase")]
pub struct UserData {
    /// Owner full name
    pub full_name: String,
    /// Organization
    pub org_name: String,
    /// Computer name
    pub computer_name: CustomizationName,
    /// Product key, empty for volume licenses
    pub product_id: String,
}

/// `CustomizationIdentification`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_typeName", rename = "CustomizationIdentification", rename_all = "camelCase")]
pub struct Identification {
    /// Workgroup to join
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_workgroup: Option<String>,
    /// Domain to join
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_domain: Option<String>,
    /// Domain account allowed to join computers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_admin: Option<String>,
    /// Password of the domain account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_admin_password: Option<CustomizationPassword>,
}

/// `CustomizationLinuxPrep` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxPrep {
    /// Host name
    pub host_name: CustomizationName,
    /// DNS domain
    pub domain: String,
    /// Hardware clock runs in UTC
    #[serde(rename = "hwClockUTC")]
    pub hw_clock_utc: bool,
    /// Olson time zone
    pub time_zone: String,
}

/// `CustomizationPassword`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_typeName", rename = "CustomizationPassword", rename_all = "camelCase")]
pub struct CustomizationPassword {
    /// Password value
    pub value: String,
    /// Whether `value` is plain text
    pub plain_text: bool,
}

impl CustomizationPassword {
    /// A plain-text password.
    #[must_use]
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            plain_text: true,
        }
    }
}

/// `CustomizationName` variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_typeName")]
pub enum CustomizationName {
    /// A fixed name
    #[serde(rename = "CustomizationFixedName")]
    Fixed {
        /// The name
        name: String,
    },
}

impl CustomizationName {
    /// A fixed name.
    #[must_use]
    pub fn fixed(name: impl Into<String>) -> Self {
        Self::Fixed { name: name.into() }
    }
}

/// `CustomizationGlobalIPSettings`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "_typeName", rename = "CustomizationGlobalIPSettings", rename_all = "camelCase")]
pub struct GlobalIpSettings {
    /// DNS servers
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_server_list: Vec<String>,
    /// DNS search suffixes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_suffix_list: Vec<String>,
}

/// `CustomizationAdapterMapping`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_typeName", rename = "CustomizationAdapterMapping")]
pub struct AdapterMapping {
    /// Adapter IP settings
    pub adapter: IpSettings,
}

/// `CustomizationIPSettings`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_typeName", rename = "CustomizationIPSettings", rename_all = "camelCase")]
pub struct IpSettings {
    /// Address assignment
    pub ip: IpGenerator,
    /// Subnet mask for fixed addresses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_mask: Option<String>,
    /// Default gateways
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gateway: Vec<String>,
}

/// Address assignment for a customized adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_typeName")]
pub enum IpGenerator {
    /// Static address
    #[serde(rename = "CustomizationFixedIp")]
    Fixed {
        /// IPv4 address
        #[serde(rename = "ipAddress")]
        ip_address: String,
    },
    /// DHCP
    #[serde(rename = "CustomizationDhcpIpGenerator")]
    Dhcp,
}
