//! # vsphere-core
//!
//! Core types and utilities for managing virtual machine lifecycles on vSphere.
//!
//! This crate provides the shared error handling, configuration, and object reference
//! types used by the control-plane client and the lifecycle engines.
//!
//! ## Modules
//!
//! - [`error`] - Transport error type and HTTP status mapping
//! - [`record`] - The closed error taxonomy and structured error records
//! - [`envelope`] - Uniform result envelope returned by every operation
//! - [`moref`] - Managed object references
//! - [`types`] - Core vSphere domain types (object kinds, power states, tasks)
//! - [`config`] - Connection configuration and environment loading
//! - [`client`] - HTTP client settings and defaults

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod moref;
pub mod record;
pub mod types;

// Re-export commonly used types
pub use envelope::ResultEnvelope;
pub use error::{Error, Result};
pub use moref::MoRef;
pub use record::{ErrorKind, ErrorRecord, RelatedOperation};
