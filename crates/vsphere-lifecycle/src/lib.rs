//! VM provisioning, reconfiguration and inventory discovery on vSphere.
//!
//! [`LifecycleService`] is the entry point. Each operation validates its request locally,
//! reuses or opens a vCenter session, resolves names to managed objects, and returns a
//! [`vsphere_core::ResultEnvelope`] whose failures carry a classified
//! [`vsphere_core::ErrorRecord`] with recovery hints.
//!
//! ```no_run
//! use vsphere_lifecycle::{LifecycleService, TargetSpec};
//!
//! # async fn demo() {
//! let service = LifecycleService::from_env();
//! let envelope = service
//!     .clone_vm(&TargetSpec::new("web-01", "ubuntu-tpl", "Cluster01"))
//!     .await;
//! if let Some(error) = envelope.error() {
//!     eprintln!("{}: {}", error.kind(), error.message());
//! }
//! service.disconnect().await;
//! # }
//! ```

#![deny(missing_docs)]

pub mod catalog;
pub mod classify;
pub mod connection;
pub mod error;
pub mod models;
pub mod operations;
pub mod provision;
pub mod reconfigure;
pub mod resolver;
pub mod validation;

#[cfg(feature = "http")]
pub use connection::VimConnector;
pub use connection::{ConnectionManager, Connector, Unavailable};
pub use error::{LifecycleError, Result};
pub use models::{
    CloneAccepted, CloneDetails, ClusterInfo, CustomizationDefaults, FolderInfo,
    GuestCustomization, HostInfo, NetworkInfo, NetworkType, PowerStateReport, PowerSubmitted,
    ReconfigureAccepted, ReconfigureSpec, ResourcePoolInfo, TargetSpec, TaskStatus,
    TemplateInfo, VmInfo,
};
pub use operations::LifecycleService;
pub use provision::ProvisioningEngine;
pub use reconfigure::ReconfigurationEngine;
pub use resolver::ObjectResolver;
pub use validation::ValidationPipeline;
pub use vsphere_vim::PowerAction;
