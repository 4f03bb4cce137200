//! Transport settings for the VI/JSON endpoint.
//!
//! Requests are never retried; a failed call surfaces immediately. The request timeout is
//! the only deadline the lifecycle core has.

use crate::config::VsphereConfig;
use std::time::Duration;

/// Request timeout when none is configured, in seconds.
pub const VIM_DEFAULT_TIMEOUT: u64 = 30;

/// Deadline for the TCP and TLS handshake, in seconds.
pub const VIM_CONNECT_TIMEOUT: u64 = 10;

/// Idle connections are dropped after this many seconds.
pub const VIM_POOL_IDLE_TIMEOUT: u64 = 90;

/// Operations run one at a time per session, so a few idle connections suffice.
pub const VIM_POOL_MAX_IDLE: usize = 4;

/// How the HTTP transport to vCenter is set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Per-request deadline
    pub timeout: Duration,
    /// Handshake deadline
    pub connect_timeout: Duration,
    /// How long an idle pooled connection is kept
    pub pool_idle_timeout: Duration,
    /// Idle connections kept per host
    pub pool_max_idle: usize,
    /// Skip certificate validation, for vCenters with self-signed certificates
    pub accept_invalid_certs: bool,
    /// Ask for gzip responses; property collector pages compress well
    pub gzip: bool,
}

impl TransportSettings {
    /// Settings for a vCenter described by `config`.
    #[must_use]
    pub const fn for_vcenter(config: &VsphereConfig) -> Self {
        Self {
            timeout: config.timeout(),
            accept_invalid_certs: !config.tls_verify,
            ..Self::new()
        }
    }

    /// Defaults with certificate validation on.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_secs(VIM_DEFAULT_TIMEOUT),
            connect_timeout: Duration::from_secs(VIM_CONNECT_TIMEOUT),
            pool_idle_timeout: Duration::from_secs(VIM_POOL_IDLE_TIMEOUT),
            pool_max_idle: VIM_POOL_MAX_IDLE,
            accept_invalid_certs: false,
            gzip: true,
        }
    }

    /// Set the per-request deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the handshake deadline.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Accept self-signed or otherwise invalid certificates.
    #[must_use]
    pub const fn accepting_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Turn gzip responses on or off.
    #[must_use]
    pub const fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::new()
    }
}
