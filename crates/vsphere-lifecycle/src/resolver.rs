//! Name-to-object resolution and inventory listings.
//!
//! Every lookup enumerates the inventory afresh; nothing is cached between calls. Names are
//! matched exactly, and when several objects share a name the first one in enumeration
//! order wins.

use crate::models::{
    ClusterInfo, FolderInfo, HostInfo, NetworkInfo, NetworkType, ResourcePoolInfo, TemplateInfo,
    VmInfo,
};
use std::collections::HashSet;
use tracing::{debug, warn};
use vsphere_core::types::ObjectKind;
use vsphere_core::{MoRef, Result};
use vsphere_vim::models::{HostSummary, ManagedObject, NicBacking, ResourcePoolConfig};
use vsphere_vim::VimApi;

const BYTES_PER_GIB: i64 = 1024 * 1024 * 1024;

/// Resolves names and walks the inventory through a live session.
pub struct ObjectResolver<'a> {
    api: &'a dyn VimApi,
}

impl<'a> ObjectResolver<'a> {
    /// Resolve through `api`.
    #[must_use]
    pub fn new(api: &'a dyn VimApi) -> Self {
        Self { api }
    }

    /// First object of `kind` named exactly `name`.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if the inventory cannot be enumerated.
    pub async fn find_by_name(&self, name: &str, kind: ObjectKind) -> Result<Option<MoRef>> {
        let mut matches = self
            .api
            .list_objects(kind)
            .await?
            .into_iter()
            .filter(|obj| obj.name == name);
        let first = matches.next();
        let others = matches.count();
        if others > 0 {
            warn!(
                name,
                kind = %kind,
                matches = others + 1,
                "ambiguous name, using the first match"
            );
        }
        Ok(first.map(|obj| obj.moref))
    }

    /// A network by name: standard networks first, then distributed port groups.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if the inventory cannot be enumerated.
    pub async fn find_network(&self, name: &str) -> Result<Option<MoRef>> {
        if let Some(network) = self.find_by_name(name, ObjectKind::Network).await? {
            return Ok(Some(network));
        }
        self.find_by_name(name, ObjectKind::DistributedVirtualPortgroup)
            .await
    }

    /// Adapter backing that attaches to `network`.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if a port group cannot be read.
    pub async fn nic_backing(&self, network: &MoRef, name: &str) -> Result<NicBacking> {
        if network.is(ObjectKind::DistributedVirtualPortgroup) {
            let info = self.api.portgroup_info(network).await?;
            Ok(NicBacking::DistributedPort {
                portgroup_key: info.key,
                switch_uuid: info.switch_uuid,
            })
        } else {
            Ok(NicBacking::Network {
                network: network.clone(),
                device_name: name.to_string(),
            })
        }
    }

    /// The cluster a host belongs to: its parent, when that is a cluster.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if the parent cannot be read.
    pub async fn cluster_of_host(&self, host: &MoRef) -> Result<Option<MoRef>> {
        let parent = self.api.parent(host).await?;
        Ok(parent.filter(|parent| parent.is(ObjectKind::ClusterComputeResource)))
    }

    /// The cluster of the host a VM runs on.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if the runtime or host parent cannot be read.
    pub async fn cluster_of_vm(&self, vm: &MoRef) -> Result<Option<MoRef>> {
        match self.api.vm_runtime(vm).await?.host {
            Some(host) => self.cluster_of_host(&host).await,
            None => Ok(None),
        }
    }

    /// The nearest cluster ancestor of a resource pool.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if an ancestor cannot be read.
    pub async fn cluster_of_resource_pool(&self, pool: &MoRef) -> Result<Option<MoRef>> {
        let mut current = self.api.parent(pool).await?;
        while let Some(obj) = current {
            if obj.is(ObjectKind::ClusterComputeResource) {
                return Ok(Some(obj));
            }
            current = self.api.parent(&obj).await?;
        }
        Ok(None)
    }

    /// Inventory path of a folder, up to and including its datacenter, such as `/DC1/vm/Prod`.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if an ancestor cannot be read.
    pub async fn folder_path(&self, folder: &MoRef) -> Result<String> {
        let mut parts = Vec::new();
        let mut current = Some(folder.clone());
        while let Some(obj) = current {
            parts.push(self.api.name(&obj).await?);
            if obj.is(ObjectKind::Datacenter) {
                break;
            }
            current = self.api.parent(&obj).await?;
        }
        parts.reverse();
        Ok(format!("/{}", parts.join("/")))
    }

    /// Non-template VMs in a pool and all its descendants.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if a pool or VM cannot be read.
    pub async fn count_vms(&self, pool: &MoRef) -> Result<usize> {
        let mut count = 0;
        let mut pending = vec![pool.clone()];
        while let Some(pool) = pending.pop() {
            for vm in self.api.resource_pool_vms(&pool).await? {
                let is_template = self
                    .api
                    .vm_config(&vm)
                    .await?
                    .is_some_and(|config| config.template);
                if !is_template {
                    count += 1;
                }
            }
            pending.extend(self.api.resource_pool_children(&pool).await?);
        }
        Ok(count)
    }

    async fn name_of(&self, obj: Option<&MoRef>) -> Result<Option<String>> {
        match obj {
            Some(obj) => self.api.name(obj).await.map(Some),
            None => Ok(None),
        }
    }

    /// Templates, optionally restricted to a cluster.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if VMs cannot be enumerated. Failures on individual
    /// templates are logged and the template is skipped.
    pub async fn list_templates(&self, cluster_name: Option<&str>) -> Result<Vec<TemplateInfo>> {
        let mut templates = Vec::new();
        for vm in self.api.list_objects(ObjectKind::VirtualMachine).await? {
            match self.template_info(&vm, cluster_name).await {
                Ok(Some(info)) => templates.push(info),
                Ok(None) => {}
                Err(err) => warn!(name = %vm.name, error = %err, "skipping template"),
            }
        }
        Ok(templates)
    }

    async fn template_info(
        &self,
        vm: &ManagedObject,
        cluster_name: Option<&str>,
    ) -> Result<Option<TemplateInfo>> {
        let Some(config) = self.api.vm_config(&vm.moref).await? else {
            return Ok(None);
        };
        if !config.template {
            return Ok(None);
        }
        if let Some(wanted) = cluster_name {
            let cluster = self.cluster_of_vm(&vm.moref).await?;
            if !self.in_cluster(cluster.as_ref(), wanted).await? {
                return Ok(None);
            }
        }

        let disk_size_gb = config.total_disk_gb();
        Ok(Some(TemplateInfo {
            name: vm.name.clone(),
            template_id: vm.moref.value.clone(),
            guest_os: config.guest_full_name.clone(),
            num_cpu: Some(config.hardware.num_cpu),
            memory_mb: Some(config.hardware.memory_mb),
            disk_size_gb: (disk_size_gb > 0).then_some(disk_size_gb),
        }))
    }

    /// Objects without a known cluster pass the filter.
    async fn in_cluster(&self, cluster: Option<&MoRef>, wanted: &str) -> Result<bool> {
        match self.name_of(cluster).await? {
            Some(name) => Ok(name == wanted),
            None => Ok(true),
        }
    }

    /// Hosts with usage figures, optionally restricted to a cluster.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if hosts cannot be enumerated. Failures on individual
    /// hosts are logged and the host is skipped.
    pub async fn list_hosts(&self, cluster_name: Option<&str>) -> Result<Vec<HostInfo>> {
        let mut hosts = Vec::new();
        for host in self.api.list_objects(ObjectKind::HostSystem).await? {
            match self.host_info(&host, cluster_name).await {
                Ok(Some(info)) => hosts.push(info),
                Ok(None) => {}
                Err(err) => warn!(name = %host.name, error = %err, "skipping host"),
            }
        }
        Ok(hosts)
    }

    async fn host_info(
        &self,
        host: &ManagedObject,
        cluster_name: Option<&str>,
    ) -> Result<Option<HostInfo>> {
        if let Some(wanted) = cluster_name {
            let cluster = self.cluster_of_host(&host.moref).await?;
            if !self.in_cluster(cluster.as_ref(), wanted).await? {
                return Ok(None);
            }
        }
        let summary = self.api.host_summary(&host.moref).await?;
        Ok(Some(host_usage(host, &summary)))
    }

    /// All clusters with host and VM counts.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if clusters cannot be enumerated. Failures on
    /// individual clusters are logged and the cluster is skipped.
    pub async fn list_clusters(&self) -> Result<Vec<ClusterInfo>> {
        let mut clusters = Vec::new();
        for cluster in self
            .api
            .list_objects(ObjectKind::ClusterComputeResource)
            .await?
        {
            match self.cluster_info(&cluster).await {
                Ok(info) => clusters.push(info),
                Err(err) => warn!(name = %cluster.name, error = %err, "skipping cluster"),
            }
        }
        Ok(clusters)
    }

    async fn cluster_info(&self, cluster: &ManagedObject) -> Result<ClusterInfo> {
        let num_hosts = self.api.cluster_hosts(&cluster.moref).await?.len();
        let num_vms = match self.api.cluster_resource_pool(&cluster.moref).await? {
            Some(pool) => self.count_vms(&pool).await?,
            None => 0,
        };
        Ok(ClusterInfo {
            name: cluster.name.clone(),
            cluster_id: cluster.moref.value.clone(),
            num_hosts,
            num_vms,
        })
    }

    /// VM folders with their inventory paths.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if folders cannot be enumerated. Failures on
    /// individual folders are logged and the folder is skipped.
    pub async fn list_folders(&self) -> Result<Vec<FolderInfo>> {
        let mut folders = Vec::new();
        for folder in self.api.list_objects(ObjectKind::Folder).await? {
            match self.folder_info(&folder).await {
                Ok(Some(info)) => folders.push(info),
                Ok(None) => {}
                Err(err) => warn!(name = %folder.name, error = %err, "skipping folder"),
            }
        }
        Ok(folders)
    }

    async fn folder_info(&self, folder: &ManagedObject) -> Result<Option<FolderInfo>> {
        let child_types = self.api.folder_child_types(&folder.moref).await?;
        if !child_types.iter().any(|t| t == "VirtualMachine") {
            return Ok(None);
        }
        Ok(Some(FolderInfo {
            name: folder.name.clone(),
            folder_id: folder.moref.value.clone(),
            path: self.folder_path(&folder.moref).await?,
        }))
    }

    /// Resource pools with their limits, optionally restricted to a cluster.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if pools cannot be enumerated. Failures on
    /// individual pools are logged and the pool is skipped.
    pub async fn list_resource_pools(
        &self,
        cluster_name: Option<&str>,
    ) -> Result<Vec<ResourcePoolInfo>> {
        let mut pools = Vec::new();
        for pool in self.api.list_objects(ObjectKind::ResourcePool).await? {
            match self.resource_pool_info(&pool, cluster_name).await {
                Ok(Some(info)) => pools.push(info),
                Ok(None) => {}
                Err(err) => warn!(name = %pool.name, error = %err, "skipping resource pool"),
            }
        }
        Ok(pools)
    }

    async fn resource_pool_info(
        &self,
        pool: &ManagedObject,
        cluster_name: Option<&str>,
    ) -> Result<Option<ResourcePoolInfo>> {
        if let Some(wanted) = cluster_name {
            let cluster = self.cluster_of_resource_pool(&pool.moref).await?;
            if !self.in_cluster(cluster.as_ref(), wanted).await? {
                return Ok(None);
            }
        }
        let config = self.api.resource_pool_config(&pool.moref).await?;
        Ok(Some(pool_limits(pool, &config)))
    }

    /// Standard networks followed by distributed port groups, without duplicates.
    ///
    /// Networks span clusters, so `cluster_name` is accepted and ignored.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if networks cannot be enumerated.
    pub async fn list_networks(&self, cluster_name: Option<&str>) -> Result<Vec<NetworkInfo>> {
        if let Some(cluster) = cluster_name {
            debug!(cluster, "network listing ignores the cluster filter");
        }
        let standard = self.api.list_objects(ObjectKind::Network).await?;
        let distributed = self
            .api
            .list_objects(ObjectKind::DistributedVirtualPortgroup)
            .await?;

        let mut seen = HashSet::new();
        let networks = standard
            .into_iter()
            .map(|net| (net, NetworkType::Standard))
            .chain(
                distributed
                    .into_iter()
                    .map(|net| (net, NetworkType::Distributed)),
            )
            .filter(|(net, _)| seen.insert(net.moref.value.clone()))
            .map(|(net, network_type)| NetworkInfo {
                name: net.name,
                network_id: net.moref.value,
                network_type,
            })
            .collect();
        Ok(networks)
    }

    /// Non-template VMs, optionally filtered by cluster and by a case-insensitive name
    /// substring.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if VMs cannot be enumerated. Failures on individual
    /// VMs are logged and the VM is skipped.
    pub async fn list_vms(
        &self,
        cluster_name: Option<&str>,
        name_filter: Option<&str>,
    ) -> Result<Vec<VmInfo>> {
        let needle = name_filter.map(str::to_lowercase);
        let mut vms = Vec::new();
        for vm in self.api.list_objects(ObjectKind::VirtualMachine).await? {
            if let Some(needle) = &needle {
                if !vm.name.to_lowercase().contains(needle.as_str()) {
                    continue;
                }
            }
            match self.vm_info(&vm, cluster_name).await {
                Ok(Some(info)) => vms.push(info),
                Ok(None) => {}
                Err(err) => warn!(name = %vm.name, error = %err, "skipping virtual machine"),
            }
        }
        Ok(vms)
    }

    /// Details of one VM, or `None` when it is a template or outside `cluster_name`.
    ///
    /// # Errors
    ///
    /// Returns the control-plane error if the VM or a related object cannot be read.
    pub async fn vm_info(
        &self,
        vm: &ManagedObject,
        cluster_name: Option<&str>,
    ) -> Result<Option<VmInfo>> {
        let config = self.api.vm_config(&vm.moref).await?;
        if config.as_ref().is_some_and(|config| config.template) {
            return Ok(None);
        }

        let runtime = self.api.vm_runtime(&vm.moref).await?;
        let cluster = match &runtime.host {
            Some(host) => self.cluster_of_host(host).await?,
            None => None,
        };
        let cluster_label = self.name_of(cluster.as_ref()).await?;
        if let (Some(wanted), Some(actual)) = (cluster_name, cluster_label.as_deref()) {
            if actual != wanted {
                return Ok(None);
            }
        }

        let folder_path = match self.api.parent(&vm.moref).await? {
            Some(parent) => Some(self.folder_path(&parent).await?),
            None => None,
        };

        Ok(Some(VmInfo {
            name: vm.name.clone(),
            vm_id: vm.moref.value.clone(),
            power_state: Some(runtime.power_state),
            guest_os: config.as_ref().and_then(|c| c.guest_full_name.clone()),
            num_cpu: config.as_ref().map(|c| c.hardware.num_cpu),
            memory_mb: config.as_ref().map(|c| c.hardware.memory_mb),
            host_name: self.name_of(runtime.host.as_ref()).await?,
            cluster_name: cluster_label,
            folder_path,
        }))
    }
}

#[allow(clippy::cast_precision_loss)]
fn host_usage(host: &ManagedObject, summary: &HostSummary) -> HostInfo {
    let hardware = summary.hardware.as_ref();
    let stats = &summary.quick_stats;

    let total_cpu = hardware.map(|hw| hw.num_cpu_cores);
    let total_memory_gb = hardware.map(|hw| hw.memory_size / BYTES_PER_GIB);

    let cpu_usage = hardware.and_then(|hw| {
        let used = stats.overall_cpu_usage?;
        let capacity = i64::from(hw.num_cpu_cores) * i64::from(hw.cpu_mhz);
        if capacity <= 0 {
            return None;
        }
        Some(round_tenth(used as f64 / capacity as f64 * 100.0))
    });
    let memory_usage = hardware.and_then(|hw| {
        let used_mb = stats.overall_memory_usage?;
        (hw.memory_size > 0)
            .then(|| round_tenth((used_mb * 1024 * 1024) as f64 / hw.memory_size as f64 * 100.0))
    });

    HostInfo {
        name: host.name.clone(),
        host_id: host.moref.value.clone(),
        cpu_usage,
        memory_usage,
        total_cpu,
        total_memory_gb,
    }
}

#[allow(clippy::cast_precision_loss)]
fn pool_limits(pool: &ManagedObject, config: &ResourcePoolConfig) -> ResourcePoolInfo {
    let positive = |limit: Option<i64>| limit.filter(|limit| *limit > 0);
    ResourcePoolInfo {
        name: pool.name.clone(),
        resource_pool_id: pool.moref.value.clone(),
        cpu_limit_ghz: positive(config.cpu_allocation.limit).map(|mhz| mhz as f64 / 1000.0),
        memory_limit_gb: positive(config.memory_allocation.limit).map(|mb| mb as f64 / 1024.0),
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
