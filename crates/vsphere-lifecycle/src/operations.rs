//! The operation facade.
//!
//! Every operation validates its request locally, acquires the session, runs the resolver
//! or an engine, and reports the outcome as a [`ResultEnvelope`]. Invalid requests never
//! open a session.

use crate::catalog;
use crate::classify;
use crate::connection::{ConnectionManager, Connector, Unavailable};
use crate::error::{LifecycleError, Result};
use crate::models::{
    CloneAccepted, CloneDetails, ClusterInfo, CustomizationDefaults, FolderInfo, HostInfo,
    NetworkInfo, PowerStateReport, PowerSubmitted, ReconfigureAccepted, ReconfigureSpec,
    ResourcePoolInfo, TargetSpec, TaskStatus, TemplateInfo, VmInfo,
};
use crate::provision::{missing, ProvisioningEngine};
use crate::reconfigure::ReconfigurationEngine;
use crate::resolver::ObjectResolver;
use crate::validation::{self, ValidationPipeline};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};
use vsphere_core::config::VsphereConfig;
use vsphere_core::types::ObjectKind;
use vsphere_core::{ErrorRecord, MoRef, ResultEnvelope};
use vsphere_vim::models::ManagedObject;
use vsphere_vim::{PowerAction, VimApi};

const CLONE_VM: &str = "clone_vm";
const RECONFIGURE_VM: &str = "reconfigure_vm";
const DESCRIBE_TEMPLATES: &str = "describe_templates";
const DESCRIBE_HOSTS: &str = "describe_hosts";
const DESCRIBE_CLUSTERS: &str = "describe_clusters";
const DESCRIBE_FOLDERS: &str = "describe_folders";
const DESCRIBE_RESOURCE_POOLS: &str = "describe_resource_pools";
const DESCRIBE_NETWORKS: &str = "describe_networks";
const DESCRIBE_VMS: &str = "describe_vms";
const GET_VM_POWER_STATE: &str = "get_vm_power_state";
const POWER_VM: &str = "power_vm";
const GET_VM: &str = "get_vm";
const GET_TASK: &str = "get_task";

const MANAGED_OBJECT_NOT_FOUND: &str = "ManagedObjectNotFound";

/// VM lifecycle operations against one vCenter.
pub struct LifecycleService {
    connections: ConnectionManager,
    defaults: CustomizationDefaults,
}

impl LifecycleService {
    /// Connect with `config` on first use.
    #[must_use]
    pub fn new(config: VsphereConfig) -> Self {
        Self::with_connector(default_connector(config))
    }

    /// Connect with settings from the `VSPHERE_*` environment variables.
    ///
    /// Incomplete settings do not fail here; every operation reports them as
    /// `MISSING_PARAMETER` instead.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`LifecycleService::from_env`], reading variables through `lookup`.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match VsphereConfig::from_lookup(lookup) {
            Ok(config) => Self::new(config),
            Err(err) => {
                warn!(error = %err, "vSphere settings are incomplete");
                Self::with_connector(Box::new(Unavailable::new(err)))
            }
        }
    }

    /// Open sessions through `connector`.
    #[must_use]
    pub fn with_connector(connector: Box<dyn Connector>) -> Self {
        Self {
            connections: ConnectionManager::new(connector),
            defaults: CustomizationDefaults::default(),
        }
    }

    /// Replace the guest customization defaults.
    #[must_use]
    pub fn with_defaults(mut self, defaults: CustomizationDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Clone a new VM from a template. The returned task is not awaited.
    pub async fn clone_vm(&self, spec: &TargetSpec) -> ResultEnvelope<CloneAccepted> {
        if let Err(record) = validate(CLONE_VM, &validation::clone_pipeline(spec)) {
            return ResultEnvelope::fail(record);
        }

        let envelope = self
            .run(CLONE_VM, |api| async move { self.submit_clone(api.as_ref(), spec).await })
            .await;

        match envelope.data().map(|accepted| accepted.task_id.clone()) {
            Some(task_id) => envelope.with_request_id(task_id),
            None => envelope,
        }
    }

    /// Change CPU, memory, disk size or network of a powered-off VM.
    pub async fn reconfigure_vm(
        &self,
        spec: &ReconfigureSpec,
    ) -> ResultEnvelope<ReconfigureAccepted> {
        if let Err(record) = validate(RECONFIGURE_VM, &validation::reconfigure_pipeline(spec)) {
            return ResultEnvelope::fail(record);
        }

        self.run(RECONFIGURE_VM, |api| async move {
            submit_reconfigure(api.as_ref(), spec).await
        })
        .await
    }

    /// Templates, optionally in one cluster.
    pub async fn list_templates(
        &self,
        cluster_name: Option<&str>,
    ) -> ResultEnvelope<Vec<TemplateInfo>> {
        self.run(DESCRIBE_TEMPLATES, |api| async move {
            ObjectResolver::new(api.as_ref())
                .list_templates(cluster_name)
                .await
                .map_err(LifecycleError::from)
        })
        .await
    }

    /// Hosts with usage, optionally in one cluster.
    pub async fn list_hosts(&self, cluster_name: Option<&str>) -> ResultEnvelope<Vec<HostInfo>> {
        self.run(DESCRIBE_HOSTS, |api| async move {
            ObjectResolver::new(api.as_ref())
                .list_hosts(cluster_name)
                .await
                .map_err(LifecycleError::from)
        })
        .await
    }

    /// Clusters with host and VM counts.
    pub async fn list_clusters(&self) -> ResultEnvelope<Vec<ClusterInfo>> {
        self.run(DESCRIBE_CLUSTERS, |api| async move {
            ObjectResolver::new(api.as_ref())
                .list_clusters()
                .await
                .map_err(LifecycleError::from)
        })
        .await
    }

    /// VM folders with their paths.
    pub async fn list_folders(&self) -> ResultEnvelope<Vec<FolderInfo>> {
        self.run(DESCRIBE_FOLDERS, |api| async move {
            ObjectResolver::new(api.as_ref())
                .list_folders()
                .await
                .map_err(LifecycleError::from)
        })
        .await
    }

    /// Resource pools, optionally in one cluster.
    pub async fn list_resource_pools(
        &self,
        cluster_name: Option<&str>,
    ) -> ResultEnvelope<Vec<ResourcePoolInfo>> {
        self.run(DESCRIBE_RESOURCE_POOLS, |api| async move {
            ObjectResolver::new(api.as_ref())
                .list_resource_pools(cluster_name)
                .await
                .map_err(LifecycleError::from)
        })
        .await
    }

    /// Standard networks and distributed port groups. `cluster_name` is ignored.
    pub async fn list_networks(
        &self,
        cluster_name: Option<&str>,
    ) -> ResultEnvelope<Vec<NetworkInfo>> {
        self.run(DESCRIBE_NETWORKS, |api| async move {
            ObjectResolver::new(api.as_ref())
                .list_networks(cluster_name)
                .await
                .map_err(LifecycleError::from)
        })
        .await
    }

    /// VMs, optionally in one cluster and matching a case-insensitive name fragment.
    pub async fn list_vms(
        &self,
        cluster_name: Option<&str>,
        name_filter: Option<&str>,
    ) -> ResultEnvelope<Vec<VmInfo>> {
        self.run(DESCRIBE_VMS, |api| async move {
            ObjectResolver::new(api.as_ref())
                .list_vms(cluster_name, name_filter)
                .await
                .map_err(LifecycleError::from)
        })
        .await
    }

    /// Power state of a VM and whether it may be reconfigured.
    pub async fn get_vm_power_state(&self, vm_name: &str) -> ResultEnvelope<PowerStateReport> {
        let checks = ValidationPipeline::new()
            .check(|| validation::validate_required("vm_name", vm_name, "the VM to inspect"));
        if let Err(record) = validate(GET_VM_POWER_STATE, &checks) {
            return ResultEnvelope::fail(record);
        }

        self.run(GET_VM_POWER_STATE, |api| async move {
            power_state_report(api.as_ref(), vm_name).await
        })
        .await
    }

    /// Submit a power transition. The returned task is not awaited.
    pub async fn power_vm(
        &self,
        vm_name: &str,
        action: PowerAction,
    ) -> ResultEnvelope<PowerSubmitted> {
        let checks = ValidationPipeline::new()
            .check(|| validation::validate_required("vm_name", vm_name, "the VM to power"));
        if let Err(record) = validate(POWER_VM, &checks) {
            return ResultEnvelope::fail(record);
        }

        self.run(POWER_VM, |api| async move {
            submit_power(api.as_ref(), vm_name, action).await
        })
        .await
    }

    /// Details of a VM by managed object id, such as `vm-42`.
    pub async fn get_vm(&self, vm_id: &str) -> ResultEnvelope<VmInfo> {
        let checks = ValidationPipeline::new()
            .check(|| validation::validate_id_prefix("vm_id", vm_id, "vm-"));
        if let Err(record) = validate(GET_VM, &checks) {
            return ResultEnvelope::fail(record);
        }

        self.run(GET_VM, |api| async move { vm_by_id(api.as_ref(), vm_id).await })
            .await
    }

    /// One-shot read of a submitted task, such as `task-1042`.
    pub async fn get_task(&self, task_id: &str) -> ResultEnvelope<TaskStatus> {
        let checks = ValidationPipeline::new()
            .check(|| validation::validate_id_prefix("task_id", task_id, "task-"));
        if let Err(record) = validate(GET_TASK, &checks) {
            return ResultEnvelope::fail(record);
        }

        self.run(GET_TASK, |api| async move { task_status(api.as_ref(), task_id).await })
            .await
    }

    /// Log out and drop the session.
    pub async fn disconnect(&self) {
        self.connections.disconnect().await;
    }

    async fn submit_clone(&self, api: &dyn VimApi, spec: &TargetSpec) -> Result<CloneAccepted> {
        let task = ProvisioningEngine::new(api, &self.defaults)
            .clone(spec)
            .await?;
        Ok(CloneAccepted {
            vm_name: spec.vm_name.clone(),
            status: "creation_started".to_string(),
            message: format!("Creation of VM '{}' has been submitted", spec.vm_name),
            task_id: task.into_inner(),
            details: CloneDetails {
                template: spec.template_name.clone(),
                cluster: spec.cluster_name.clone(),
                cpu: spec.cpu,
                memory_mb: spec.memory_mb,
                folder: spec.folder_name.clone(),
                resource_pool: spec.resource_pool_name.clone(),
                network: spec.network_name.clone(),
                customized: spec.customization.is_requested(),
                power_on: spec.powers_on(),
            },
        })
    }

    async fn run<T, F, Fut>(&self, operation: &str, body: F) -> ResultEnvelope<T>
    where
        F: FnOnce(Arc<dyn VimApi>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let api = match self.connections.acquire().await {
            Ok(api) => api,
            Err(err) => {
                let record = classify::connection_failure(&err);
                warn!(
                    operation,
                    code = %record.kind(),
                    cause = err.error_code(),
                    error = %err,
                    "cannot reach vSphere"
                );
                return ResultEnvelope::fail(record);
            }
        };

        match body(api).await {
            Ok(data) => ResultEnvelope::ok(data),
            Err(err) => {
                if let LifecycleError::Remote(remote) = &err {
                    if remote.is_session_fault() {
                        self.connections.invalidate().await;
                    }
                }
                let record = err.into_record(operation);
                warn!(
                    operation,
                    code = %record.kind(),
                    message = record.message(),
                    "operation failed"
                );
                ResultEnvelope::fail(record)
            }
        }
    }
}

#[cfg(feature = "http")]
fn default_connector(config: VsphereConfig) -> Box<dyn Connector> {
    Box::new(crate::connection::VimConnector::new(Arc::new(config)))
}

#[cfg(not(feature = "http"))]
fn default_connector(_config: VsphereConfig) -> Box<dyn Connector> {
    Box::new(Unavailable::new(vsphere_core::Error::NotConnected(
        "built without the http feature".to_string(),
    )))
}

fn validate(
    operation: &str,
    checks: &ValidationPipeline<'_>,
) -> std::result::Result<(), ErrorRecord> {
    let result = checks.run();
    if let Err(record) = &result {
        debug!(
            operation,
            code = %record.kind(),
            parameter = ?record.parameter(),
            "request rejected"
        );
    }
    result
}

async fn find_vm(api: &dyn VimApi, vm_name: &str) -> Result<MoRef> {
    ObjectResolver::new(api)
        .find_by_name(vm_name, ObjectKind::VirtualMachine)
        .await?
        .ok_or_else(|| {
            LifecycleError::from(missing(
                "vm_name",
                "Virtual machine",
                vm_name,
                catalog::describe_vms(),
            ))
        })
}

async fn submit_reconfigure(
    api: &dyn VimApi,
    spec: &ReconfigureSpec,
) -> Result<ReconfigureAccepted> {
    let task = ReconfigurationEngine::new(api).reconfigure(spec).await?;
    Ok(ReconfigureAccepted {
        vm_name: spec.vm_name.clone(),
        status: "reconfiguration_started".to_string(),
        message: format!("Reconfiguration of VM '{}' has been submitted", spec.vm_name),
        task_id: task.into_inner(),
        changes: spec.clone(),
    })
}

async fn power_state_report(api: &dyn VimApi, vm_name: &str) -> Result<PowerStateReport> {
    let vm = find_vm(api, vm_name).await?;
    let power_state = api.vm_runtime(&vm).await?.power_state;
    Ok(PowerStateReport {
        vm_name: vm_name.to_string(),
        power_state,
        can_reconfigure: power_state.allows_reconfigure(),
    })
}

async fn submit_power(
    api: &dyn VimApi,
    vm_name: &str,
    action: PowerAction,
) -> Result<PowerSubmitted> {
    let vm = find_vm(api, vm_name).await?;
    let task = api.power_vm(&vm, action).await?;
    let label = action_label(action);
    Ok(PowerSubmitted {
        vm_name: vm_name.to_string(),
        action: label.to_string(),
        message: format!("Power {label} of VM '{vm_name}' has been submitted"),
        task_id: task.value,
    })
}

async fn vm_by_id(api: &dyn VimApi, vm_id: &str) -> Result<VmInfo> {
    let not_found = || {
        ErrorRecord::not_found("vm_id", format!("Virtual machine '{vm_id}' does not exist"))
            .with_suggestion("Use describeVMs to find VM ids")
            .with_related(catalog::describe_vms())
    };
    let moref = MoRef::of(ObjectKind::VirtualMachine, vm_id);
    let name = api
        .name(&moref)
        .await
        .map_err(|err| object_missing(err, not_found))?;
    let vm = ManagedObject::new(moref, name);
    let info = ObjectResolver::new(api)
        .vm_info(&vm, None)
        .await
        .map_err(|err| object_missing(err, not_found))?;
    info.ok_or_else(|| {
        LifecycleError::from(
            ErrorRecord::not_found("vm_id", format!("'{vm_id}' is a template, not a VM"))
                .with_suggestion("Use describeTemplates to inspect templates")
                .with_related(catalog::describe_templates()),
        )
    })
}

async fn task_status(api: &dyn VimApi, task_id: &str) -> Result<TaskStatus> {
    let task = MoRef::of(ObjectKind::Task, task_id);
    let info = api.task_info(&task).await.map_err(|err| {
        object_missing(err, || {
            ErrorRecord::not_found("task_id", format!("Task '{task_id}' does not exist"))
                .with_suggestion("Task ids are returned by clone, reconfigure and power operations")
        })
    })?;
    Ok(TaskStatus::from(info))
}

fn object_missing<F>(err: vsphere_core::Error, record: F) -> LifecycleError
where
    F: FnOnce() -> ErrorRecord,
{
    if err.fault_code() == Some(MANAGED_OBJECT_NOT_FOUND) {
        record().into()
    } else {
        err.into()
    }
}

const fn action_label(action: PowerAction) -> &'static str {
    match action {
        PowerAction::On => "on",
        PowerAction::Off => "off",
        PowerAction::Suspend => "suspend",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MockConnector;
    use vsphere_core::types::{PowerState, TaskState};
    use vsphere_core::{Error, ErrorKind};
    use vsphere_vim::fake::{FakeInventory, FakeVm};

    #[cfg(not(feature = "http"))]
    #[tokio::test]
    async fn without_transport_operations_report_dependency_missing() {
        let config = VsphereConfig::new("vcenter.local", "admin", "secret").unwrap();
        let service = LifecycleService::new(config);
        let envelope = service.list_clusters().await;
        assert_eq!(
            envelope.error().map(ErrorRecord::kind),
            Some(ErrorKind::DependencyMissing)
        );
    }

    #[cfg(feature = "http")]
    #[tokio::test]
    async fn with_transport_configured_service_attempts_vcenter() {
        let config = VsphereConfig::new("127.0.0.1", "admin", "secret")
            .unwrap()
            .with_port(1)
            .with_timeout(2);
        let service = LifecycleService::new(config);
        let envelope = service.list_clusters().await;
        let kind = envelope.error().map(ErrorRecord::kind);
        assert_ne!(kind, Some(ErrorKind::DependencyMissing));
        assert!(kind.is_some());
    }

    fn never_connects() -> LifecycleService {
        let mut connector = MockConnector::new();
        connector.expect_connect().times(0);
        LifecycleService::with_connector(Box::new(connector))
    }

    fn serving(inventory: &Arc<FakeInventory>) -> LifecycleService {
        let session: Arc<dyn VimApi> = inventory.clone();
        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .times(1)
            .return_once(move || Ok(session));
        LifecycleService::with_connector(Box::new(connector))
    }

    fn inventory() -> Arc<FakeInventory> {
        let inventory = FakeInventory::new();
        let dc = inventory.add_datacenter("DC1");
        let cluster = inventory.add_cluster("Cluster01", &dc.host_folder);
        let host = inventory.add_host("esx-01", &cluster, 16, 2000, 64 << 30);
        inventory.add_vm(
            FakeVm::new("ubuntu-tpl", &dc.vm_folder)
                .template()
                .guest("ubuntu64Guest", "Ubuntu Linux (64-bit)")
                .on_host(&host),
        );
        inventory.add_vm(
            FakeVm::new("db-01", &dc.vm_folder)
                .on_host(&host)
                .powered(PowerState::PoweredOn),
        );
        Arc::new(inventory)
    }

    fn failure<T>(envelope: &ResultEnvelope<T>) -> &ErrorRecord {
        assert!(!envelope.is_success());
        envelope.error().unwrap()
    }

    #[tokio::test]
    async fn invalid_requests_never_connect() {
        let service = never_connects();

        let envelope = service
            .clone_vm(&TargetSpec::new("ab", "ubuntu-tpl", "Cluster01"))
            .await;
        assert_eq!(failure(&envelope).kind(), ErrorKind::InvalidParameter);
        assert_eq!(failure(&envelope).parameter(), Some("vm_name"));

        let envelope = service.reconfigure_vm(&ReconfigureSpec::new("db-01")).await;
        assert_eq!(failure(&envelope).kind(), ErrorKind::MissingParameter);

        let envelope = service.get_vm("db-01").await;
        assert_eq!(failure(&envelope).parameter(), Some("vm_id"));

        let envelope = service.get_task("").await;
        assert_eq!(failure(&envelope).kind(), ErrorKind::MissingParameter);

        let envelope = service.power_vm("", PowerAction::On).await;
        assert_eq!(failure(&envelope).parameter(), Some("vm_name"));
    }

    #[tokio::test]
    async fn connect_failures_are_connection_errors() {
        let mut connector = MockConnector::new();
        connector.expect_connect().times(1).return_once(|| {
            Err(Error::Fault {
                code: "InvalidLogin".to_string(),
                message: "Cannot complete login due to an incorrect user name or password."
                    .to_string(),
            })
        });
        let service = LifecycleService::with_connector(Box::new(connector));

        let envelope = service.list_clusters().await;
        assert_eq!(failure(&envelope).kind(), ErrorKind::ConnectionError);
    }

    #[tokio::test]
    async fn incomplete_settings_are_missing_parameters() {
        let service = LifecycleService::from_lookup(|_| None);
        let envelope = service.list_hosts(None).await;
        let record = failure(&envelope);
        assert_eq!(record.kind(), ErrorKind::MissingParameter);
        assert!(record.suggestion().contains("VSPHERE_PASSWORD"));
    }

    #[tokio::test]
    async fn clone_reports_task_as_request_id() {
        let inventory = inventory();
        let service = serving(&inventory);

        let envelope = service
            .clone_vm(&TargetSpec::new("web-01", "ubuntu-tpl", "Cluster01").with_cpu(2))
            .await;
        let accepted = envelope.data().unwrap();
        assert_eq!(accepted.status, "creation_started");
        assert_eq!(accepted.details.cpu, Some(2));
        assert!(!accepted.details.customized);
        assert!(accepted.details.power_on);
        assert_eq!(envelope.request_id(), Some(accepted.task_id.as_str()));
    }

    #[tokio::test]
    async fn remote_errors_are_classified_with_operation_context() {
        let inventory = inventory();
        let service = serving(&inventory);
        inventory.fail_next(
            "list_objects",
            Error::HttpError("Template xyz not found".to_string()),
        );

        let envelope = service.list_hosts(None).await;
        let record = failure(&envelope);
        assert_eq!(record.kind(), ErrorKind::ResourceNotFound);
        assert_eq!(record.parameter(), Some("host_name"));
    }

    #[tokio::test]
    async fn rejected_session_is_dropped() {
        let inventory = inventory();
        let service = serving(&inventory);
        inventory.fail_next(
            "list_objects",
            Error::NotAuthenticated("The session is not authenticated.".to_string()),
        );

        let envelope = service.list_clusters().await;
        assert_eq!(failure(&envelope).kind(), ErrorKind::PermissionDenied);
        assert!(!service.connections.is_connected().await);
    }

    #[tokio::test]
    async fn power_then_read_task() {
        let inventory = inventory();
        let service = serving(&inventory);

        let report = service.get_vm_power_state("db-01").await;
        let report = report.data().unwrap();
        assert_eq!(report.power_state, PowerState::PoweredOn);
        assert!(!report.can_reconfigure);

        let submitted = service.power_vm("db-01", PowerAction::Off).await;
        let submitted = submitted.data().unwrap();
        assert_eq!(submitted.action, "off");

        let status = service.get_task(&submitted.task_id).await;
        let status = status.data().unwrap();
        assert_eq!(status.state, TaskState::Queued);
        assert_eq!(status.description.as_deref(), Some("VirtualMachine.powerOff"));
        assert_eq!(status.entity_name.as_deref(), Some("db-01"));
    }

    #[tokio::test]
    async fn lookups_by_id() {
        let inventory = inventory();
        let service = serving(&inventory);

        let vms = service.list_vms(None, Some("db")).await;
        let vm_id = vms.data().unwrap()[0].vm_id.clone();
        let vm = service.get_vm(&vm_id).await;
        assert_eq!(vm.data().unwrap().name, "db-01");

        let envelope = service.get_vm("vm-9999").await;
        assert_eq!(failure(&envelope).kind(), ErrorKind::ResourceNotFound);
        assert_eq!(failure(&envelope).parameter(), Some("vm_id"));

        let envelope = service.get_task("task-9999").await;
        assert_eq!(failure(&envelope).parameter(), Some("task_id"));
    }

    #[tokio::test]
    async fn unknown_vm_power_state() {
        let inventory = inventory();
        let service = serving(&inventory);

        let envelope = service.get_vm_power_state("nope").await;
        let record = failure(&envelope);
        assert_eq!(record.kind(), ErrorKind::ResourceNotFound);
        assert_eq!(record.related_operations()[0].name, "describeVMs");
    }

    #[tokio::test]
    async fn disconnect_logs_out() {
        let inventory = inventory();
        let service = serving(&inventory);
        assert!(service.list_folders().await.is_success());
        service.disconnect().await;
        assert_eq!(inventory.logouts(), 1);
    }
}
