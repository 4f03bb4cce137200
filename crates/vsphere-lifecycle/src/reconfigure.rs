//! Changing the hardware of powered-off VMs.

use crate::catalog;
use crate::error::Result;
use crate::models::ReconfigureSpec;
use crate::provision::missing;
use crate::resolver::ObjectResolver;
use tracing::{debug, info};
use vsphere_core::types::{ObjectKind, TaskRef};
use vsphere_core::{ErrorKind, ErrorRecord, MoRef};
use vsphere_vim::models::{ConfigSpec, DeviceConfigSpec, VmConfig};
use vsphere_vim::VimApi;

const KB_PER_GB: i64 = 1024 * 1024;

/// Submits reconfiguration tasks.
pub struct ReconfigurationEngine<'a> {
    api: &'a dyn VimApi,
}

impl<'a> ReconfigurationEngine<'a> {
    /// Reconfigure through `api`.
    #[must_use]
    pub fn new(api: &'a dyn VimApi) -> Self {
        Self { api }
    }

    /// Stage the requested changes and submit them.
    ///
    /// The VM must be powered off. Disks only grow; asking for the current size stages
    /// nothing for the disk.
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for a missing VM, disk, adapter or network,
    /// `PRECONDITION_FAILED` when the VM is not powered off, `INVALID_PARAMETER` for a
    /// shrink, `MISSING_PARAMETER` when nothing would change, or the control-plane error
    /// of a failed lookup or submission.
    pub async fn reconfigure(&self, spec: &ReconfigureSpec) -> Result<TaskRef> {
        let resolver = ObjectResolver::new(self.api);
        let vm = resolver
            .find_by_name(&spec.vm_name, ObjectKind::VirtualMachine)
            .await?
            .ok_or_else(|| {
                missing(
                    "vm_name",
                    "Virtual machine",
                    &spec.vm_name,
                    catalog::describe_vms(),
                )
            })?;

        let power_state = self.api.vm_runtime(&vm).await?.power_state;
        if !power_state.allows_reconfigure() {
            return Err(ErrorRecord::new(
                ErrorKind::PreconditionFailed,
                format!(
                    "VM '{}' is currently {power_state}. It must be powered off to reconfigure.",
                    spec.vm_name
                ),
            )
            .with_parameter("vm_name")
            .with_suggestion("Power off the VM first; use getVMPowerState to check its state")
            .with_related(catalog::get_vm_power_state())
            .into());
        }

        let current = self.api.vm_config(&vm).await?;
        let mut config = ConfigSpec {
            num_cpus: spec.cpu,
            memory_mb: spec.memory_mb,
            device_change: Vec::new(),
        };
        if let Some(size_gb) = spec.disk_size_gb {
            if let Some(change) = disk_change(current.as_ref(), size_gb)? {
                config.device_change.push(change);
            }
        }
        if let Some(network_name) = &spec.network_name {
            let change = self
                .network_change(&resolver, current.as_ref(), network_name)
                .await?;
            config.device_change.push(change);
        }

        if config.is_empty() {
            return Err(ErrorRecord::new(
                ErrorKind::MissingParameter,
                "No configuration changes specified",
            )
            .into());
        }

        self.submit(&vm, &spec.vm_name, &config).await
    }

    async fn submit(&self, vm: &MoRef, vm_name: &str, config: &ConfigSpec) -> Result<TaskRef> {
        let task = self.api.reconfigure_vm(vm, config).await?;
        info!(
            vm_name,
            task = %task.value,
            devices = config.device_change.len(),
            "reconfigure submitted"
        );
        Ok(TaskRef::new(task.value))
    }

    async fn network_change(
        &self,
        resolver: &ObjectResolver<'_>,
        current: Option<&VmConfig>,
        network_name: &str,
    ) -> Result<DeviceConfigSpec> {
        let Some(nic) = current.and_then(VmConfig::first_ethernet_card) else {
            return Err(ErrorRecord::not_found(
                "network_name",
                "No network adapter found on the VM to reconfigure",
            )
            .into());
        };
        let network = resolver
            .find_network(network_name)
            .await?
            .ok_or_else(|| {
                missing(
                    "network_name",
                    "Network",
                    network_name,
                    catalog::describe_networks(),
                )
            })?;
        let backing = resolver.nic_backing(&network, network_name).await?;
        Ok(DeviceConfigSpec::edit(nic.clone().with_backing(&backing)))
    }
}

/// The edit growing the first disk to `size_gb`, or `None` when it already has that size.
fn disk_change(current: Option<&VmConfig>, size_gb: i64) -> Result<Option<DeviceConfigSpec>> {
    let Some(disk) = current.and_then(VmConfig::first_disk) else {
        return Err(ErrorRecord::not_found(
            "disk_size_gb",
            "No virtual disk found on the VM to expand",
        )
        .into());
    };

    let current_kb = disk.capacity_in_kb().unwrap_or_default();
    let too_large = || {
        ErrorRecord::invalid_parameter(
            "disk_size_gb",
            format!("Disk size of {size_gb} GB is too large"),
        )
    };
    let requested_kb = size_gb.checked_mul(KB_PER_GB).ok_or_else(too_large)?;
    if requested_kb < current_kb {
        return Err(ErrorRecord::invalid_parameter(
            "disk_size_gb",
            format!(
                "Cannot shrink disk (current: {} GB, requested: {size_gb} GB). Only expansion is supported.",
                current_kb / KB_PER_GB
            ),
        )
        .with_suggestion("Request a size larger than the current disk")
        .into());
    }
    if requested_kb == current_kb {
        debug!(size_gb, "disk already has the requested size");
        return Ok(None);
    }
    let disk = disk
        .clone()
        .with_capacity_kb(requested_kb)
        .ok_or_else(too_large)?;
    Ok(Some(DeviceConfigSpec::edit(disk)))
}
