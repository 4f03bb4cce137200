//! Session acquisition.
//!
//! A [`ConnectionManager`] owns at most one live session. Concurrent callers serialize on
//! the session slot, so a dead session is replaced by exactly one reconnect.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use vsphere_core::Error;
use vsphere_vim::VimApi;

#[cfg(feature = "http")]
use vsphere_core::config::VsphereConfig;

/// Opens sessions against a control plane.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open and authenticate a new session.
    async fn connect(&self) -> vsphere_core::Result<Arc<dyn VimApi>>;
}

/// Connector that logs in to vCenter over VI/JSON.
#[cfg(feature = "http")]
pub struct VimConnector {
    config: Arc<VsphereConfig>,
}

#[cfg(feature = "http")]
impl VimConnector {
    /// Creates a new connector instance.
    #[must_use]
    pub fn new(config: Arc<VsphereConfig>) -> Self {
        Self { config }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Connector for VimConnector {
    async fn connect(&self) -> vsphere_core::Result<Arc<dyn VimApi>> {
        let client = vsphere_vim::VimClient::connect(&self.config).await?;
        Ok(Arc::new(client))
    }
}

/// Connector that always fails with the same error.
///
/// Stands in when the configuration could not be loaded or no transport is compiled in, so
/// the failure surfaces from every operation instead of at construction.
pub struct Unavailable(Error);

impl Unavailable {
    /// Fail every connect with `error`.
    #[must_use]
    pub const fn new(error: Error) -> Self {
        Self(error)
    }
}

#[async_trait]
impl Connector for Unavailable {
    async fn connect(&self) -> vsphere_core::Result<Arc<dyn VimApi>> {
        Err(self.0.clone())
    }
}

/// Lazily opened, reused session.
pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    session: Mutex<Option<Arc<dyn VimApi>>>,
}

impl ConnectionManager {
    /// Manage sessions opened by `connector`.
    #[must_use]
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            session: Mutex::new(None),
        }
    }

    /// The live session, connecting or reconnecting as needed.
    ///
    /// # Errors
    ///
    /// Returns the connector's error when a new session cannot be opened.
    pub async fn acquire(&self) -> vsphere_core::Result<Arc<dyn VimApi>> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            if session.is_alive().await {
                return Ok(Arc::clone(session));
            }
            warn!("vSphere session expired, reconnecting");
            *slot = None;
        }

        let session = self.connector.connect().await?;
        info!("connected to vSphere");
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Log out and drop the session. Logout failures are logged and ignored.
    pub async fn disconnect(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            match session.logout().await {
                Ok(()) => info!("disconnected from vSphere"),
                Err(err) => warn!(error = %err, "vSphere logout failed"),
            }
        }
    }

    /// Forget the session after the control plane rejected it, without logging out.
    pub async fn invalidate(&self) {
        if self.session.lock().await.take().is_some() {
            warn!("vSphere rejected the session, it will be reopened on next use");
        }
    }

    /// Whether a session is currently held. The session may still have expired remotely.
    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }
}
