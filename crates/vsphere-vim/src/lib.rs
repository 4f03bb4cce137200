//! VI/JSON control-plane client and wire models for vCenter.
//!
//! [`VimApi`] is the boundary the lifecycle engines program against. With the default `http`
//! feature, `VimClient` implements it over the vCenter VI/JSON REST binding; with the
//! `test-helpers` feature an in-memory `fake::FakeInventory` implements it as well.

#![deny(missing_docs)]

pub mod api;
#[cfg(feature = "http")]
pub mod client;
#[cfg(any(test, feature = "test-helpers"))]
pub mod fake;
pub mod models;

pub use api::{PowerAction, VimApi};
#[cfg(feature = "http")]
pub use client::{ServiceContent, VimClient, VimClientBuilder, SESSION_HEADER};
pub use models::{
    CloneSpec, ConfigSpec, CustomizationSpec, DeviceConfigSpec, HostSummary, ManagedObject,
    NicBacking, PortgroupInfo, ResourcePoolConfig, TaskInfo, VirtualDevice, VmConfig, VmRuntime,
};

/// Convenient result alias that reuses the shared vSphere error type.
pub type Result<T> = vsphere_core::Result<T>;
