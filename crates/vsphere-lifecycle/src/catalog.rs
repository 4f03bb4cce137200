//! Listing operations offered to callers as recovery hints.

use serde_json::json;
use vsphere_core::RelatedOperation;

/// Operation name for template listings.
pub const DESCRIBE_TEMPLATES: &str = "describeTemplates";
/// Operation name for host listings.
pub const DESCRIBE_HOSTS: &str = "describeHosts";
/// Operation name for cluster listings.
pub const DESCRIBE_CLUSTERS: &str = "describeClusters";
/// Operation name for folder listings.
pub const DESCRIBE_FOLDERS: &str = "describeFolders";
/// Operation name for resource pool listings.
pub const DESCRIBE_RESOURCE_POOLS: &str = "describeResourcePools";
/// Operation name for network listings.
pub const DESCRIBE_NETWORKS: &str = "describeNetworks";
/// Operation name for VM listings.
pub const DESCRIBE_VMS: &str = "describeVMs";
/// Operation name for power state reads.
pub const GET_VM_POWER_STATE: &str = "getVMPowerState";

/// Lists the available VM templates.
#[must_use]
pub fn describe_templates() -> RelatedOperation {
    RelatedOperation::new(
        DESCRIBE_TEMPLATES,
        "List the available VM templates",
        json!({"cluster_name": "Cluster01"}),
    )
}

/// Lists the available hosts.
#[must_use]
pub fn describe_hosts() -> RelatedOperation {
    RelatedOperation::new(
        DESCRIBE_HOSTS,
        "List the available hosts",
        json!({"cluster_name": "Cluster01"}),
    )
}

/// Lists the available clusters.
#[must_use]
pub fn describe_clusters() -> RelatedOperation {
    RelatedOperation::new(DESCRIBE_CLUSTERS, "List the available clusters", json!({}))
}

/// Lists the available VM folders.
#[must_use]
pub fn describe_folders() -> RelatedOperation {
    RelatedOperation::new(DESCRIBE_FOLDERS, "List the available VM folders", json!({}))
}

/// Lists the available resource pools.
#[must_use]
pub fn describe_resource_pools() -> RelatedOperation {
    RelatedOperation::new(
        DESCRIBE_RESOURCE_POOLS,
        "List the available resource pools",
        json!({"cluster_name": "Cluster01"}),
    )
}

/// Lists the available networks.
#[must_use]
pub fn describe_networks() -> RelatedOperation {
    RelatedOperation::new(
        DESCRIBE_NETWORKS,
        "List the available networks",
        json!({"cluster_name": "Cluster01"}),
    )
}

/// Lists virtual machines.
#[must_use]
pub fn describe_vms() -> RelatedOperation {
    RelatedOperation::new(
        DESCRIBE_VMS,
        "List virtual machines, optionally filtered by name",
        json!({"vm_name": "web"}),
    )
}

/// Reads a VM's power state.
#[must_use]
pub fn get_vm_power_state() -> RelatedOperation {
    RelatedOperation::new(
        GET_VM_POWER_STATE,
        "Check whether a VM is powered off",
        json!({"vm_name": "db-01"}),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_args_match_operation_filters() {
        assert_eq!(describe_templates().example_args["cluster_name"], "Cluster01");
        assert_eq!(describe_clusters().example_args, json!({}));
        assert_eq!(describe_folders().name, "describeFolders");
    }
}
