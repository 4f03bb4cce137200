//! Cloning new VMs from templates.

use crate::catalog;
use crate::error::Result;
use crate::models::{CustomizationDefaults, GuestCustomization, TargetSpec};
use crate::resolver::ObjectResolver;
use tracing::{info, warn};
use vsphere_core::types::{GuestOsFamily, ObjectKind, TaskRef};
use vsphere_core::{ErrorRecord, RelatedOperation};
use vsphere_vim::models::{
    AdapterMapping, CloneSpec, ConfigSpec, CustomizationIdentity, CustomizationName,
    CustomizationPassword, CustomizationSpec, DeviceConfigSpec, GlobalIpSettings, GuiUnattended,
    Identification, IpGenerator, IpSettings, LinuxPrep, RelocateSpec, Sysprep, UserData, VmConfig,
};
use vsphere_vim::VimApi;

const SYSPREP_FULL_NAME: &str = "Administrator";
const SYSPREP_ORG_NAME: &str = "Organization";
const DOMAIN_ADMIN: &str = "Administrator";

/// Submits clone tasks.
pub struct ProvisioningEngine<'a> {
    api: &'a dyn VimApi,
    defaults: &'a CustomizationDefaults,
}

impl<'a> ProvisioningEngine<'a> {
    /// Provision through `api` with the given customization defaults.
    #[must_use]
    pub fn new(api: &'a dyn VimApi, defaults: &'a CustomizationDefaults) -> Self {
        Self { api, defaults }
    }

    /// Resolve every name in `spec`, build the clone spec and submit it.
    ///
    /// Nothing is submitted unless every name resolves.
    ///
    /// # Errors
    ///
    /// Returns a `RESOURCE_NOT_FOUND` record naming the first unresolved parameter, or the
    /// control-plane error of a failed lookup or submission.
    pub async fn clone(&self, spec: &TargetSpec) -> Result<TaskRef> {
        let resolver = ObjectResolver::new(self.api);

        let template = resolver
            .find_by_name(&spec.template_name, ObjectKind::VirtualMachine)
            .await?
            .ok_or_else(|| {
                missing(
                    "template_name",
                    "Template",
                    &spec.template_name,
                    catalog::describe_templates(),
                )
            })?;
        let cluster = resolver
            .find_by_name(&spec.cluster_name, ObjectKind::ClusterComputeResource)
            .await?
            .ok_or_else(|| {
                missing(
                    "cluster_name",
                    "Cluster",
                    &spec.cluster_name,
                    catalog::describe_clusters(),
                )
            })?;

        let pool = match &spec.resource_pool_name {
            Some(name) => Some(
                resolver
                    .find_by_name(name, ObjectKind::ResourcePool)
                    .await?
                    .ok_or_else(|| {
                        missing(
                            "resource_pool_name",
                            "Resource pool",
                            name,
                            catalog::describe_resource_pools(),
                        )
                    })?,
            ),
            None => self.api.cluster_resource_pool(&cluster).await?,
        };
        let folder = match &spec.folder_name {
            Some(name) => resolver
                .find_by_name(name, ObjectKind::Folder)
                .await?
                .ok_or_else(|| {
                    missing("folder_name", "Folder", name, catalog::describe_folders())
                })?,
            None => self.api.parent(&template).await?.ok_or_else(|| {
                missing(
                    "folder_name",
                    "Folder of template",
                    &spec.template_name,
                    catalog::describe_folders(),
                )
            })?,
        };

        let template_config = self.api.vm_config(&template).await?;

        let mut config = ConfigSpec {
            num_cpus: spec.cpu,
            memory_mb: spec.memory_mb,
            device_change: Vec::new(),
        };
        if let Some(network_name) = &spec.network_name {
            let change = self
                .network_change(&resolver, template_config.as_ref(), network_name)
                .await?;
            config.device_change.push(change);
        }

        let customization = if spec.customization.is_requested() {
            let family = template_config
                .as_ref()
                .and_then(|config| config.guest_id.as_deref())
                .map_or(GuestOsFamily::Linux, GuestOsFamily::from_guest_id);
            Some(build_customization(
                family,
                &spec.vm_name,
                &spec.customization,
                self.defaults,
            ))
        } else {
            None
        };

        let clone_spec = CloneSpec {
            location: RelocateSpec { pool },
            template: false,
            power_on: spec.powers_on(),
            config: (!config.is_empty()).then_some(config),
            customization,
        };

        let task = self
            .api
            .clone_vm(&template, &folder, &spec.vm_name, &clone_spec)
            .await?;
        info!(
            vm_name = %spec.vm_name,
            template = %spec.template_name,
            cluster = %spec.cluster_name,
            task = %task.value,
            "clone submitted"
        );
        Ok(TaskRef::new(task.value))
    }

    async fn network_change(
        &self,
        resolver: &ObjectResolver<'_>,
        template_config: Option<&VmConfig>,
        network_name: &str,
    ) -> Result<DeviceConfigSpec> {
        let not_found = || {
            missing(
                "network_name",
                "Network",
                network_name,
                catalog::describe_networks(),
            )
        };
        let Some(network) = resolver.find_network(network_name).await? else {
            return Err(not_found().into());
        };
        let Some(nic) = template_config.and_then(VmConfig::first_ethernet_card) else {
            return Err(ErrorRecord::not_found(
                "network_name",
                "The template has no network adapter to attach",
            )
            .with_suggestion("Choose a template with a network adapter")
            .with_related(catalog::describe_templates())
            .into());
        };
        let backing = resolver.nic_backing(&network, network_name).await?;
        Ok(DeviceConfigSpec::edit(
            nic.clone().with_backing(&backing).with_connected(),
        ))
    }
}

pub(crate) fn missing(
    parameter: &str,
    noun: &str,
    name: &str,
    listing: RelatedOperation,
) -> ErrorRecord {
    ErrorRecord::not_found(parameter, format!("{noun} '{name}' does not exist"))
        .with_suggestion(format!("Use {} to find available names", listing.name))
        .with_related(listing)
}

/// Guest customization for a clone named `vm_name`.
#[must_use]
pub fn build_customization(
    family: GuestOsFamily,
    vm_name: &str,
    request: &GuestCustomization,
    defaults: &CustomizationDefaults,
) -> CustomizationSpec {
    let hostname = request.hostname.as_deref().unwrap_or(vm_name);
    let identity = match family {
        GuestOsFamily::Windows => {
            CustomizationIdentity::Sysprep(sysprep(hostname, request, defaults))
        }
        GuestOsFamily::Linux => {
            if request.password.is_some() {
                warn!(vm_name, "Linux customization cannot set a password, ignoring it");
            }
            CustomizationIdentity::LinuxPrep(LinuxPrep {
                host_name: CustomizationName::fixed(hostname),
                domain: request
                    .domain
                    .clone()
                    .unwrap_or_else(|| defaults.linux_domain.clone()),
                hw_clock_utc: true,
                time_zone: defaults.linux_time_zone.clone(),
            })
        }
    };

    let adapter = match &request.ip_address {
        Some(ip_address) => IpSettings {
            ip: IpGenerator::Fixed {
                ip_address: ip_address.clone(),
            },
            subnet_mask: Some(
                request
                    .subnet_mask
                    .clone()
                    .unwrap_or_else(|| defaults.subnet_mask.clone()),
            ),
            gateway: request.gateway.iter().cloned().collect(),
        },
        None => IpSettings {
            ip: IpGenerator::Dhcp,
            subnet_mask: None,
            gateway: Vec::new(),
        },
    };

    CustomizationSpec {
        identity,
        global_ip_settings: GlobalIpSettings {
            dns_server_list: request.dns_servers.clone(),
            dns_suffix_list: request.domain.iter().cloned().collect(),
        },
        nic_setting_map: vec![AdapterMapping { adapter }],
    }
}

fn sysprep(
    hostname: &str,
    request: &GuestCustomization,
    defaults: &CustomizationDefaults,
) -> Sysprep {
    let password = request.password.as_deref().map(CustomizationPassword::plain);
    let identification = match &request.domain {
        Some(domain) => Identification {
            join_workgroup: None,
            join_domain: Some(domain.clone()),
            domain_admin: Some(DOMAIN_ADMIN.to_string()),
            domain_admin_password: password.clone(),
        },
        None => Identification {
            join_workgroup: Some(defaults.workgroup.clone()),
            join_domain: None,
            domain_admin: None,
            domain_admin_password: None,
        },
    };

    Sysprep {
        gui_unattended: GuiUnattended {
            password,
            time_zone: defaults.windows_time_zone,
            auto_logon: true,
            auto_logon_count: 1,
        },
        user_data: UserData {
            full_name: SYSPREP_FULL_NAME.to_string(),
            org_name: SYSPREP_ORG_NAME.to_string(),
            computer_name: CustomizationName::fixed(hostname),
            product_id: String::new(),
        },
        identification,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LifecycleError;
    use serde_json::json;
    use vsphere_core::{ErrorKind, MoRef};
    use vsphere_vim::fake::{FakeDatacenter, FakeInventory, FakeVm, Submission};

    struct Site {
        inventory: FakeInventory,
        dc: FakeDatacenter,
        pool: MoRef,
        template: MoRef,
    }

    fn site() -> Site {
        let inventory = FakeInventory::new();
        let dc = inventory.add_datacenter("DC1");
        let cluster = inventory.add_cluster("Cluster01", &dc.host_folder);
        let host = inventory.add_host("esx-01", &cluster, 16, 2000, 64 << 30);
        let pool = inventory.cluster_pool(&cluster).unwrap();
        let template = inventory.add_vm(
            FakeVm::new("ubuntu-tpl", &dc.vm_folder)
                .template()
                .guest("ubuntu64Guest", "Ubuntu Linux (64-bit)")
                .hardware(2, 4096)
                .disk_gb(40)
                .nic("VM Network")
                .on_host(&host),
        );
        Site {
            inventory,
            dc,
            pool,
            template,
        }
    }

    fn request() -> TargetSpec {
        TargetSpec::new("web-01", "ubuntu-tpl", "Cluster01")
    }

    async fn clone(site: &Site, spec: &TargetSpec) -> Result<TaskRef> {
        let defaults = CustomizationDefaults::default();
        ProvisioningEngine::new(&site.inventory, &defaults)
            .clone(spec)
            .await
    }

    fn only_clone(site: &Site) -> (MoRef, MoRef, String, CloneSpec) {
        let submissions = site.inventory.submissions();
        assert_eq!(submissions.len(), 1);
        match submissions.into_iter().next() {
            Some(Submission::Clone {
                template,
                folder,
                name,
                spec,
                ..
            }) => (template, folder, name, spec),
            other => panic!("expected a clone submission, got {other:?}"),
        }
    }

    fn rejected(result: Result<TaskRef>) -> ErrorRecord {
        match result {
            Err(LifecycleError::Rejected(record)) => record,
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn minimal_clone_uses_defaults() {
        let site = site();
        let task = clone(&site, &request()).await.unwrap();
        assert!(task.as_str().starts_with("task-"));

        let (template, folder, name, spec) = only_clone(&site);
        assert_eq!(template, site.template);
        assert_eq!(folder, site.dc.vm_folder);
        assert_eq!(name, "web-01");
        assert_eq!(spec.location.pool, Some(site.pool.clone()));
        assert!(spec.power_on);
        assert!(!spec.template);
        assert!(spec.config.is_none());
        assert!(spec.customization.is_none());
    }

    #[tokio::test]
    async fn compute_override_carries_only_given_fields() {
        let site = site();
        clone(&site, &request().with_cpu(4).with_power_on(false))
            .await
            .unwrap();

        let (_, _, _, spec) = only_clone(&site);
        let config = spec.config.unwrap();
        assert_eq!(config.num_cpus, Some(4));
        assert_eq!(config.memory_mb, None);
        assert!(!spec.power_on);
    }

    #[tokio::test]
    async fn explicit_placement() {
        let site = site();
        let prod = site
            .inventory
            .add_folder("Prod", &site.dc.vm_folder, &["VirtualMachine"]);
        let gold = site.inventory.add_resource_pool(
            "Gold",
            &site.pool,
            vsphere_vim::models::ResourcePoolConfig::default(),
        );

        clone(&site, &request().with_folder("Prod").with_resource_pool("Gold"))
            .await
            .unwrap();

        let (_, folder, _, spec) = only_clone(&site);
        assert_eq!(folder, prod);
        assert_eq!(spec.location.pool, Some(gold));
    }

    #[tokio::test]
    async fn unresolved_names_submit_nothing() {
        let site = site();
        let cases = [
            (TargetSpec::new("web-01", "missing-tpl", "Cluster01"), "template_name", "describeTemplates"),
            (TargetSpec::new("web-01", "ubuntu-tpl", "Nope"), "cluster_name", "describeClusters"),
            (request().with_folder("Nope"), "folder_name", "describeFolders"),
            (request().with_resource_pool("Nope"), "resource_pool_name", "describeResourcePools"),
            (request().with_network("Nope"), "network_name", "describeNetworks"),
        ];
        for (spec, parameter, listing) in cases {
            let record = rejected(clone(&site, &spec).await);
            assert_eq!(record.kind(), ErrorKind::ResourceNotFound);
            assert_eq!(record.parameter(), Some(parameter));
            assert_eq!(record.related_operations()[0].name, listing);
        }
        assert!(site.inventory.submissions().is_empty());
    }

    #[tokio::test]
    async fn standard_network_rebinds_first_nic() {
        let site = site();
        let prod = site.inventory.add_network("Prod", &site.dc.network_folder);
        clone(&site, &request().with_network("Prod")).await.unwrap();

        let (_, _, _, spec) = only_clone(&site);
        let change = &spec.config.unwrap().device_change[0];
        let device = change.device.as_map();
        assert_eq!(device["key"], json!(4001));
        assert_eq!(device["backing"]["deviceName"], json!("Prod"));
        assert_eq!(device["backing"]["network"]["value"], json!(prod.value));
        assert_eq!(device["connectable"]["startConnected"], json!(true));
        assert_eq!(device["connectable"]["connected"], json!(true));
    }

    #[tokio::test]
    async fn distributed_network_uses_port_backing() {
        let site = site();
        let pg = site
            .inventory
            .add_portgroup("DV-Prod", &site.dc.network_folder, "50 2a 3b");
        clone(&site, &request().with_network("DV-Prod")).await.unwrap();

        let (_, _, _, spec) = only_clone(&site);
        let device = spec.config.unwrap().device_change[0].device.clone();
        let port = &device.as_map()["backing"]["port"];
        assert_eq!(port["portgroupKey"], json!(pg.value));
        assert_eq!(port["switchUuid"], json!("50 2a 3b"));
    }

    #[tokio::test]
    async fn template_without_nic_cannot_take_network() {
        let site = site();
        site.inventory.add_network("Prod", &site.dc.network_folder);
        site.inventory
            .add_vm(FakeVm::new("bare-tpl", &site.dc.vm_folder).template());

        let spec = TargetSpec::new("web-01", "bare-tpl", "Cluster01").with_network("Prod");
        let record = rejected(clone(&site, &spec).await);
        assert_eq!(record.parameter(), Some("network_name"));
        assert!(site.inventory.submissions().is_empty());
    }

    #[tokio::test]
    async fn linux_customization_from_guest_id() {
        let site = site();
        let customization = GuestCustomization {
            ip_address: Some("10.0.0.10".to_string()),
            gateway: Some("10.0.0.1".to_string()),
            dns_servers: vec!["10.0.0.2".to_string()],
            ..GuestCustomization::default()
        };
        clone(&site, &request().with_customization(customization))
            .await
            .unwrap();

        let (_, _, _, spec) = only_clone(&site);
        let customization = spec.customization.unwrap();
        match &customization.identity {
            CustomizationIdentity::LinuxPrep(prep) => {
                assert_eq!(prep.host_name, CustomizationName::fixed("web-01"));
                assert_eq!(prep.domain, "localdomain");
                assert_eq!(prep.time_zone, "Asia/Shanghai");
                assert!(prep.hw_clock_utc);
            }
            CustomizationIdentity::Sysprep(_) => panic!("expected LinuxPrep"),
        }
        let adapter = &customization.nic_setting_map[0].adapter;
        assert_eq!(adapter.subnet_mask.as_deref(), Some("255.255.255.0"));
        assert_eq!(adapter.gateway, ["10.0.0.1"]);
        assert_eq!(customization.global_ip_settings.dns_server_list, ["10.0.0.2"]);
    }

    #[test]
    fn windows_domain_join() {
        let request = GuestCustomization {
            hostname: Some("WEB01".to_string()),
            domain: Some("corp.example.com".to_string()),
            password: Some("s3cret!".to_string()),
            ..GuestCustomization::default()
        };
        let spec = build_customization(
            GuestOsFamily::Windows,
            "web-01",
            &request,
            &CustomizationDefaults::default().with_windows_time_zone(35),
        );

        let CustomizationIdentity::Sysprep(sysprep) = spec.identity else {
            panic!("expected Sysprep");
        };
        assert_eq!(sysprep.user_data.computer_name, CustomizationName::fixed("WEB01"));
        assert_eq!(sysprep.user_data.full_name, "Administrator");
        assert_eq!(sysprep.user_data.org_name, "Organization");
        assert_eq!(sysprep.gui_unattended.time_zone, 35);
        assert_eq!(sysprep.gui_unattended.auto_logon_count, 1);
        assert_eq!(
            sysprep.identification.join_domain.as_deref(),
            Some("corp.example.com")
        );
        assert_eq!(
            sysprep.identification.domain_admin_password,
            Some(CustomizationPassword::plain("s3cret!"))
        );
        assert!(sysprep.identification.join_workgroup.is_none());
        assert_eq!(spec.global_ip_settings.dns_suffix_list, ["corp.example.com"]);
        assert_eq!(spec.nic_setting_map[0].adapter.ip, IpGenerator::Dhcp);
    }

    #[test]
    fn windows_without_domain_joins_workgroup() {
        let request = GuestCustomization {
            hostname: Some("WEB01".to_string()),
            ..GuestCustomization::default()
        };
        let spec = build_customization(
            GuestOsFamily::Windows,
            "web-01",
            &request,
            &CustomizationDefaults::default(),
        );

        let CustomizationIdentity::Sysprep(sysprep) = spec.identity else {
            panic!("expected Sysprep");
        };
        assert_eq!(sysprep.identification.join_workgroup.as_deref(), Some("WORKGROUP"));
        assert!(sysprep.gui_unattended.password.is_none());
        assert_eq!(sysprep.gui_unattended.time_zone, 210);
        assert!(spec.global_ip_settings.dns_suffix_list.is_empty());
    }

    #[tokio::test]
    async fn submission_failure_propagates() {
        let site = site();
        site.inventory.fail_next(
            "clone_vm",
            vsphere_core::Error::Fault {
                code: "DuplicateName".to_string(),
                message: "The name 'web-01' already exists.".to_string(),
            },
        );
        let err = clone(&site, &request()).await.unwrap_err();
        let record = err.into_record("clone_vm");
        assert_eq!(record.kind(), ErrorKind::InvalidParameter);
        assert_eq!(record.parameter(), Some("vm_name"));
    }
}
