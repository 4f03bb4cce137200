//! Asynchronous VI/JSON client implementation.

use crate::api::{PowerAction, VimApi};
use crate::models::{
    CloneSpec, ConfigSpec, HostSummary, ManagedObject, PortgroupInfo, ResourcePoolConfig,
    TaskInfo, VmConfig, VmRuntime,
};
use crate::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;
use vsphere_core::client::TransportSettings;
use vsphere_core::config::VsphereConfig;
use vsphere_core::types::ObjectKind;
use vsphere_core::{Error, MoRef};

const USER_AGENT: &str = concat!("vsphere-vim/", env!("CARGO_PKG_VERSION"));

/// Header carrying the session token on every authenticated request.
pub const SESSION_HEADER: &str = "vmware-api-session-id";

/// Builder for [`VimClient`].
#[derive(Debug, Clone)]
pub struct VimClientBuilder {
    base_url: Url,
    transport: TransportSettings,
}

impl VimClientBuilder {
    /// Create a builder for a VI/JSON base URL such as `https://vc/sdk/vim25/8.0.1.0/`.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let raw = base_url.as_ref();
        let normalized = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{raw}/")
        };
        let url = Url::parse(&normalized).map_err(|err| {
            Error::ConfigError(format!("Invalid vSphere base URL `{raw}`: {err}"))
        })?;

        Ok(Self {
            base_url: url,
            transport: TransportSettings::new(),
        })
    }

    /// Create a builder from connection settings.
    pub fn from_config(config: &VsphereConfig) -> Result<Self> {
        let transport = TransportSettings::for_vcenter(config);
        Ok(Self::new(config.endpoint_url()?)?.with_transport(transport))
    }

    /// Override the transport settings.
    #[must_use]
    pub fn with_transport(mut self, transport: TransportSettings) -> Self {
        self.transport = transport;
        self
    }

    /// Build the client instance.
    pub fn build(self) -> Result<VimClient> {
        let transport = &self.transport;
        let mut builder = ClientBuilder::new()
            .timeout(transport.timeout)
            .connect_timeout(transport.connect_timeout)
            .user_agent(USER_AGENT)
            .pool_idle_timeout(transport.pool_idle_timeout)
            .pool_max_idle_per_host(transport.pool_max_idle)
            .cookie_store(true)
            .danger_accept_invalid_certs(transport.accept_invalid_certs);
        if !transport.gzip {
            builder = builder.no_gzip();
        }

        let http = builder.build().map_err(|err| {
            Error::ConfigError(format!("Failed to build vSphere HTTP client: {err}"))
        })?;

        Ok(VimClient {
            http,
            base_url: self.base_url,
            session: RwLock::new(None),
            content: RwLock::new(None),
        })
    }
}

/// Service content references needed after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceContent {
    /// Root inventory folder
    pub root_folder: MoRef,
    /// Property collector
    pub property_collector: MoRef,
    /// View manager
    pub view_manager: MoRef,
    /// Session manager
    pub session_manager: MoRef,
}

#[derive(Debug, Deserialize)]
struct RetrieveResult {
    #[serde(default)]
    objects: Vec<ObjectContent>,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectContent {
    obj: MoRef,
    #[serde(default)]
    prop_set: Vec<DynamicProperty>,
}

#[derive(Debug, Deserialize)]
struct DynamicProperty {
    name: String,
    val: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortgroupConfig {
    distributed_virtual_switch: MoRef,
}

/// Asynchronous client for the vCenter VI/JSON API.
pub struct VimClient {
    http: Client,
    base_url: Url,
    session: RwLock<Option<String>>,
    content: RwLock<Option<ServiceContent>>,
}

impl VimClient {
    /// Construct directly from a base URL.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        VimClientBuilder::new(base_url)?.build()
    }

    /// Build a client from connection settings and log in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] for rejected credentials and a transport error
    /// when vCenter cannot be reached.
    pub async fn connect(config: &VsphereConfig) -> Result<Self> {
        let client = VimClientBuilder::from_config(config)?.build()?;
        client.login(&config.username, config.password()).await?;
        Ok(client)
    }

    /// Access the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Whether a session token is held.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session
            .read()
            .map(|session| session.is_some())
            .unwrap_or(false)
    }

    /// Fetch the service content and open a session.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let content: ServiceContent = self
            .get_json("ServiceInstance/ServiceInstance/content")
            .await?;

        let path = format!(
            "SessionManager/{}/Login",
            content.session_manager.value()
        );
        let body = json!({ "userName": username, "password": password });
        let (headers, _) = self.execute(Method::POST, &path, Some(&body)).await?;

        let token = headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::NotAuthenticated(format!("login response carried no {SESSION_HEADER}"))
            })?;

        self.store_session(Some(token));
        if let Ok(mut slot) = self.content.write() {
            *slot = Some(content);
        }
        info!(base_url = %self.base_url, user = username, "vSphere session established");
        Ok(())
    }

    fn service_content(&self) -> Result<ServiceContent> {
        self.content
            .read()
            .ok()
            .and_then(|content| content.clone())
            .ok_or_else(|| Error::NotConnected("no vSphere session".to_string()))
    }

    fn session_token(&self) -> Option<String> {
        self.session.read().ok().and_then(|token| token.clone())
    }

    fn store_session(&self, token: Option<String>) {
        if let Ok(mut session) = self.session.write() {
            *session = token;
        }
    }

    fn build_url(&self, path: &str) -> Result<Url> {
        let normalized = path.strip_prefix('/').unwrap_or(path);
        self.base_url.join(normalized).map_err(|err| {
            Error::InvalidEndpoint(format!("Invalid vSphere path `{path}`: {err}"))
        })
    }

    async fn get_property<T>(&self, obj: &MoRef, property: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let path = format!("{}/{}/{property}", obj.kind, obj.value);
        self.get_json(&path).await
    }

    async fn invoke<B, R>(&self, obj: &MoRef, method: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let path = format!("{}/{}/{method}", obj.kind, obj.value);
        self.send_json(Method::POST, &path, Some(body)).await
    }

    async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send_json::<(), T>(Method::GET, path, None).await
    }

    async fn send_json<B, R>(&self, method: Method, path: &str, body: Option<&B>) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let (_, bytes) = self.execute(method, path, body).await?;
        deserialize_body(path, &bytes)
    }

    async fn execute<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(HeaderMap, Vec<u8>)>
    where
        B: Serialize + ?Sized,
    {
        let url = self.build_url(path)?;
        let mut request = self
            .http
            .request(method.clone(), url)
            .header("Accept", "application/json");

        if let Some(token) = self.session_token() {
            request = request.header(SESSION_HEADER, token);
        }
        if let Some(payload) = body {
            request = request.json(payload);
        }

        debug!(%method, path, "vSphere request");

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(|err| {
            Error::HttpError(format!("Failed to read vSphere response body: {err}"))
        })?;

        if status.is_success() {
            return Ok((headers, bytes.to_vec()));
        }

        let error = map_status_to_error(status, &bytes);
        if matches!(error, Error::NotAuthenticated(_)) {
            warn!(path, "vSphere session rejected, dropping token");
            self.store_session(None);
        }
        Err(error)
    }

    async fn retrieve_names(&self, kind: ObjectKind) -> Result<Vec<ManagedObject>> {
        let content = self.service_content()?;
        let view: MoRef = self
            .invoke(
                &content.view_manager,
                "CreateContainerView",
                &json!({
                    "container": content.root_folder,
                    "type": [kind.as_type_name()],
                    "recursive": true
                }),
            )
            .await?;

        let result = self.collect_names(&content.property_collector, &view, kind).await;

        if let Err(err) = self
            .invoke::<_, Value>(&view, "DestroyView", &json!({}))
            .await
        {
            warn!(view = %view, error = %err, "failed to destroy container view");
        }

        result
    }

    async fn collect_names(
        &self,
        collector: &MoRef,
        view: &MoRef,
        kind: ObjectKind,
    ) -> Result<Vec<ManagedObject>> {
        let spec = json!({
            "specSet": [{
                "_typeName": "PropertyFilterSpec",
                "objectSet": [{
                    "_typeName": "ObjectSpec",
                    "obj": view,
                    "skip": true,
                    "selectSet": [{
                        "_typeName": "TraversalSpec",
                        "name": "traverseView",
                        "type": "ContainerView",
                        "path": "view",
                        "skip": false
                    }]
                }],
                "propSet": [{
                    "_typeName": "PropertySpec",
                    "type": kind.as_type_name(),
                    "pathSet": ["name"]
                }]
            }],
            "options": { "_typeName": "RetrieveOptions" }
        });

        let mut objects = Vec::new();
        let mut page: Option<RetrieveResult> =
            self.invoke(collector, "RetrievePropertiesEx", &spec).await?;

        while let Some(result) = page.take() {
            objects.extend(
                result
                    .objects
                    .into_iter()
                    .filter(|content| content.obj.is(kind))
                    .filter_map(|content| {
                        let name = content
                            .prop_set
                            .iter()
                            .find(|prop| prop.name == "name")
                            .and_then(|prop| unbox_string(&prop.val))?;
                        Some(ManagedObject::new(content.obj, name))
                    }),
            );

            if let Some(token) = result.token {
                page = self
                    .invoke(
                        collector,
                        "ContinueRetrievePropertiesEx",
                        &json!({ "token": token }),
                    )
                    .await?;
            }
        }

        Ok(objects)
    }
}

#[async_trait]
impl VimApi for VimClient {
    async fn is_alive(&self) -> bool {
        let Ok(content) = self.service_content() else {
            return false;
        };
        if !self.has_session() {
            return false;
        }
        self.get_property::<Value>(&content.session_manager, "currentSession")
            .await
            .map(|session| !session.is_null())
            .unwrap_or(false)
    }

    async fn list_objects(&self, kind: ObjectKind) -> Result<Vec<ManagedObject>> {
        self.retrieve_names(kind).await
    }

    async fn name(&self, obj: &MoRef) -> Result<String> {
        self.get_property(obj, "name").await
    }

    async fn parent(&self, obj: &MoRef) -> Result<Option<MoRef>> {
        self.get_property(obj, "parent").await
    }

    async fn vm_config(&self, vm: &MoRef) -> Result<Option<VmConfig>> {
        self.get_property(vm, "config").await
    }

    async fn vm_runtime(&self, vm: &MoRef) -> Result<VmRuntime> {
        self.get_property(vm, "runtime").await
    }

    async fn host_summary(&self, host: &MoRef) -> Result<HostSummary> {
        self.get_property(host, "summary").await
    }

    async fn cluster_resource_pool(&self, cluster: &MoRef) -> Result<Option<MoRef>> {
        self.get_property(cluster, "resourcePool").await
    }

    async fn cluster_hosts(&self, cluster: &MoRef) -> Result<Vec<MoRef>> {
        let hosts: Option<Vec<MoRef>> = self.get_property(cluster, "host").await?;
        Ok(hosts.unwrap_or_default())
    }

    async fn folder_child_types(&self, folder: &MoRef) -> Result<Vec<String>> {
        let types: Option<Vec<String>> = self.get_property(folder, "childType").await?;
        Ok(types.unwrap_or_default())
    }

    async fn resource_pool_config(&self, pool: &MoRef) -> Result<ResourcePoolConfig> {
        let config: Option<ResourcePoolConfig> = self.get_property(pool, "config").await?;
        Ok(config.unwrap_or_default())
    }

    async fn resource_pool_children(&self, pool: &MoRef) -> Result<Vec<MoRef>> {
        let pools: Option<Vec<MoRef>> = self.get_property(pool, "resourcePool").await?;
        Ok(pools.unwrap_or_default())
    }

    async fn resource_pool_vms(&self, pool: &MoRef) -> Result<Vec<MoRef>> {
        let vms: Option<Vec<MoRef>> = self.get_property(pool, "vm").await?;
        Ok(vms.unwrap_or_default())
    }

    async fn portgroup_info(&self, portgroup: &MoRef) -> Result<PortgroupInfo> {
        let key: String = self.get_property(portgroup, "key").await?;
        let config: PortgroupConfig = self.get_property(portgroup, "config").await?;
        let switch_uuid: String = self
            .get_property(&config.distributed_virtual_switch, "uuid")
            .await?;
        Ok(PortgroupInfo { key, switch_uuid })
    }

    async fn clone_vm(
        &self,
        template: &MoRef,
        folder: &MoRef,
        name: &str,
        spec: &CloneSpec,
    ) -> Result<MoRef> {
        let task: MoRef = self
            .invoke(
                template,
                "CloneVM_Task",
                &json!({ "folder": folder, "name": name, "spec": spec }),
            )
            .await?;
        info!(template = %template, name, task = task.value(), "clone submitted");
        Ok(task)
    }

    async fn reconfigure_vm(&self, vm: &MoRef, spec: &ConfigSpec) -> Result<MoRef> {
        let task: MoRef = self
            .invoke(vm, "ReconfigVM_Task", &json!({ "spec": spec }))
            .await?;
        info!(vm = %vm, task = task.value(), "reconfigure submitted");
        Ok(task)
    }

    async fn power_vm(&self, vm: &MoRef, action: PowerAction) -> Result<MoRef> {
        let task: MoRef = self.invoke(vm, action.method(), &json!({})).await?;
        info!(vm = %vm, method = action.method(), task = task.value(), "power change submitted");
        Ok(task)
    }

    async fn task_info(&self, task: &MoRef) -> Result<TaskInfo> {
        self.get_property(task, "info").await
    }

    async fn logout(&self) -> Result<()> {
        let content = self.service_content()?;
        let result = self
            .invoke::<_, Value>(&content.session_manager, "Logout", &json!({}))
            .await
            .map(|_| ());
        self.store_session(None);
        result
    }
}

fn unbox_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => map.get("_value").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn deserialize_body<R>(path: &str, bytes: &[u8]) -> Result<R>
where
    R: DeserializeOwned,
{
    if bytes.is_empty() {
        serde_json::from_value(Value::Null).map_err(|err| {
            Error::ParseError(format!(
                "Failed to parse empty vSphere response for `{path}`: {err}"
            ))
        })
    } else {
        serde_json::from_slice(bytes).map_err(|err| {
            Error::ParseError(format!("Failed to parse vSphere response for `{path}`: {err}"))
        })
    }
}

fn fault_message(fault: &Value) -> Option<String> {
    ["message", "localizedMessage"]
        .iter()
        .find_map(|key| fault.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .or_else(|| {
            fault
                .get("faultMessage")
                .and_then(Value::as_array)
                .and_then(|messages| messages.first())
                .and_then(|message| message.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
}

fn map_status_to_error(status: StatusCode, bytes: &[u8]) -> Error {
    let text = String::from_utf8_lossy(bytes).into_owned();
    let fault = serde_json::from_slice::<Value>(bytes).ok();
    let code = fault
        .as_ref()
        .and_then(|value| value.get("_typeName"))
        .and_then(Value::as_str);

    if let (Some(code), Some(fault)) = (code, fault.as_ref()) {
        let message = fault_message(fault).unwrap_or_else(|| code.to_string());
        return match code {
            "NotAuthenticated" | "InvalidLogin" => Error::NotAuthenticated(message),
            _ => Error::Fault {
                code: code.to_string(),
                message,
            },
        };
    }

    match status {
        StatusCode::UNAUTHORIZED => Error::NotAuthenticated(text),
        StatusCode::NOT_FOUND => Error::NotFound(text),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            Error::ServiceUnavailable(format!("vSphere temporarily unavailable: {text}"))
        }
        status if status.is_server_error() => {
            Error::ServiceUnavailable(format!("vSphere server error {status}: {text}"))
        }
        _ => Error::HttpError(format!("vSphere error {status}: {text}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASE: &str = "/sdk/vim25/8.0.1.0";

    fn client(server: &MockServer) -> VimClient {
        VimClient::new(format!("{}{BASE}", server.uri())).unwrap()
    }

    fn moref(kind: &str, value: &str) -> Value {
        json!({"_typeName": "ManagedObjectReference", "type": kind, "value": value})
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/ServiceInstance/ServiceInstance/content")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_typeName": "ServiceContent",
                "rootFolder": moref("Folder", "group-d1"),
                "propertyCollector": moref("PropertyCollector", "propertyCollector"),
                "viewManager": moref("ViewManager", "ViewManager"),
                "sessionManager": moref("SessionManager", "SessionManager")
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/SessionManager/SessionManager/Login")))
            .and(body_partial_json(json!({"userName": "admin"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(SESSION_HEADER, "token-1")
                    .set_body_json(json!({"_typeName": "UserSession", "key": "52a1"})),
            )
            .mount(server)
            .await;
    }

    async fn logged_in(server: &MockServer) -> VimClient {
        mount_login(server).await;
        let client = client(server);
        client.login("admin", "secret").await.unwrap();
        client
    }

    #[tokio::test]
    async fn login_stores_session_and_checks_liveness() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!(
                "{BASE}/SessionManager/SessionManager/currentSession"
            )))
            .and(header(SESSION_HEADER, "token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_typeName": "UserSession",
                "key": "52a1"
            })))
            .mount(&server)
            .await;

        let client = logged_in(&server).await;
        assert!(client.has_session());
        assert!(client.is_alive().await);
    }

    #[tokio::test]
    async fn login_rejected_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/ServiceInstance/ServiceInstance/content")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rootFolder": moref("Folder", "group-d1"),
                "propertyCollector": moref("PropertyCollector", "propertyCollector"),
                "viewManager": moref("ViewManager", "ViewManager"),
                "sessionManager": moref("SessionManager", "SessionManager")
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/SessionManager/SessionManager/Login")))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "_typeName": "InvalidLogin",
                "faultMessage": [{"key": "login", "message": "Cannot complete login due to an incorrect user name or password."}]
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client.login("admin", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated(_)));
        assert!(!client.has_session());
    }

    #[tokio::test]
    async fn list_objects_filters_to_exact_kind() {
        let server = MockServer::start().await;
        let client = logged_in(&server).await;

        Mock::given(method("POST"))
            .and(path(format!(
                "{BASE}/ViewManager/ViewManager/CreateContainerView"
            )))
            .and(body_partial_json(json!({"type": ["Network"], "recursive": true})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(moref("ContainerView", "view-1")),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!(
                "{BASE}/PropertyCollector/propertyCollector/RetrievePropertiesEx"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_typeName": "RetrieveResult",
                "objects": [
                    {
                        "obj": moref("Network", "network-11"),
                        "propSet": [{"name": "name", "val": {"_typeName": "string", "_value": "VM Network"}}]
                    },
                    {
                        "obj": moref("DistributedVirtualPortgroup", "dvportgroup-20"),
                        "propSet": [{"name": "name", "val": "DPortGroup"}]
                    }
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!(
                "{BASE}/ContainerView/view-1/DestroyView"
            )))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let networks = client.list_objects(ObjectKind::Network).await.unwrap();
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].name, "VM Network");
        assert_eq!(networks[0].moref.value(), "network-11");
    }

    #[tokio::test]
    async fn clone_fault_is_structured() {
        let server = MockServer::start().await;
        let client = logged_in(&server).await;

        Mock::given(method("POST"))
            .and(path(format!("{BASE}/VirtualMachine/vm-10/CloneVM_Task")))
            .and(body_partial_json(json!({"name": "web-01"})))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "_typeName": "DuplicateName",
                "faultMessage": [{"key": "dup", "message": "The name 'web-01' already exists."}]
            })))
            .mount(&server)
            .await;

        let spec = CloneSpec {
            location: crate::models::RelocateSpec::default(),
            template: false,
            power_on: true,
            config: None,
            customization: None,
        };
        let err = client
            .clone_vm(
                &MoRef::new("VirtualMachine", "vm-10"),
                &MoRef::new("Folder", "group-v3"),
                "web-01",
                &spec,
            )
            .await
            .unwrap_err();

        assert_eq!(err.fault_code(), Some("DuplicateName"));
        assert_eq!(err.message(), "The name 'web-01' already exists.");
    }

    #[tokio::test]
    async fn reconfigure_returns_task_reference() {
        let server = MockServer::start().await;
        let client = logged_in(&server).await;

        Mock::given(method("POST"))
            .and(path(format!("{BASE}/VirtualMachine/vm-42/ReconfigVM_Task")))
            .and(body_partial_json(json!({"spec": {"numCPUs": 4}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(moref("Task", "task-1042")))
            .mount(&server)
            .await;

        let spec = ConfigSpec {
            num_cpus: Some(4),
            ..ConfigSpec::default()
        };
        let task = client
            .reconfigure_vm(&MoRef::new("VirtualMachine", "vm-42"), &spec)
            .await
            .unwrap();
        assert_eq!(task.value(), "task-1042");
    }

    #[tokio::test]
    async fn unauthenticated_response_drops_session() {
        let server = MockServer::start().await;
        let client = logged_in(&server).await;

        Mock::given(method("GET"))
            .and(path(format!("{BASE}/VirtualMachine/vm-42/name")))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = client
            .name(&MoRef::new("VirtualMachine", "vm-42"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated(_)));
        assert!(!client.has_session());
        assert!(!client.is_alive().await);
    }

    #[tokio::test]
    async fn null_config_is_none() {
        let server = MockServer::start().await;
        let client = logged_in(&server).await;

        Mock::given(method("GET"))
            .and(path(format!("{BASE}/VirtualMachine/vm-7/config")))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        let config = client
            .vm_config(&MoRef::new("VirtualMachine", "vm-7"))
            .await
            .unwrap();
        assert!(config.is_none());
    }

    #[tokio::test]
    async fn portgroup_info_reads_switch_uuid() {
        let server = MockServer::start().await;
        let client = logged_in(&server).await;

        Mock::given(method("GET"))
            .and(path(format!(
                "{BASE}/DistributedVirtualPortgroup/dvportgroup-20/key"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!("dvportgroup-20")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!(
                "{BASE}/DistributedVirtualPortgroup/dvportgroup-20/config"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_typeName": "DVPortgroupConfigInfo",
                "distributedVirtualSwitch": moref("VmwareDistributedVirtualSwitch", "dvs-15")
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!(
                "{BASE}/VmwareDistributedVirtualSwitch/dvs-15/uuid"
            )))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!("50 2a 7b 11 22 33 44 55")),
            )
            .mount(&server)
            .await;

        let info = client
            .portgroup_info(&MoRef::new("DistributedVirtualPortgroup", "dvportgroup-20"))
            .await
            .unwrap();
        assert_eq!(info.key, "dvportgroup-20");
        assert_eq!(info.switch_uuid, "50 2a 7b 11 22 33 44 55");
    }

    #[test]
    fn status_mapping_without_fault_body() {
        assert!(matches!(
            map_status_to_error(StatusCode::NOT_FOUND, b"missing"),
            Error::NotFound(_)
        ));
        assert!(matches!(
            map_status_to_error(StatusCode::SERVICE_UNAVAILABLE, b""),
            Error::ServiceUnavailable(_)
        ));
        assert!(matches!(
            map_status_to_error(StatusCode::BAD_REQUEST, b"bad"),
            Error::HttpError(_)
        ));
    }

    #[test]
    fn fault_message_prefers_explicit_message() {
        let fault = json!({
            "_typeName": "InvalidPowerState",
            "localizedMessage": "The attempted operation cannot be performed in the current state (Powered on)."
        });
        assert_eq!(
            fault_message(&fault).as_deref(),
            Some("The attempted operation cannot be performed in the current state (Powered on).")
        );
    }
}
