//! Configuration for the vCenter connection.
//!
//! This module provides the endpoint and credential settings used to open a control-plane
//! session, with validation and loading from `VSPHERE_*` environment variables.

use crate::types::DEFAULT_HTTPS_PORT;
use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Environment variable holding the vCenter host name
pub const ENV_HOST: &str = "VSPHERE_HOST";
/// Environment variable holding the login user
pub const ENV_USERNAME: &str = "VSPHERE_USERNAME";
/// Environment variable holding the login password
pub const ENV_PASSWORD: &str = "VSPHERE_PASSWORD";
/// Environment variable holding the HTTPS port
pub const ENV_PORT: &str = "VSPHERE_PORT";
/// Environment variable toggling TLS certificate verification
pub const ENV_TLS_VERIFY: &str = "VSPHERE_TLS_VERIFY";
/// Environment variable holding the request timeout in seconds
pub const ENV_TIMEOUT_SECS: &str = "VSPHERE_TIMEOUT_SECS";
/// Environment variable holding the VI/JSON API release
pub const ENV_API_RELEASE: &str = "VSPHERE_API_RELEASE";

/// Default VI/JSON API release path segment
pub const DEFAULT_API_RELEASE: &str = "8.0.1.0";

/// Connection settings for one vCenter endpoint.
#[derive(Debug, Validate)]
pub struct VsphereConfig {
    /// vCenter host name or address
    #[validate(length(min = 1, max = 253))]
    pub host: String,

    /// Login user, for example `administrator@vsphere.local`
    #[validate(length(min = 1))]
    pub username: String,

    password: SecretString,

    /// HTTPS port
    #[validate(range(min = 1))]
    pub port: u16,

    /// Whether to verify TLS certificates
    pub tls_verify: bool,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,

    /// VI/JSON API release used in request paths
    #[validate(length(min = 1))]
    pub api_release: String,
}

const fn default_tls_verify() -> bool {
    false
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl VsphereConfig {
    /// Create a configuration with required parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, Error> {
        let config = Self {
            host: host.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
            port: DEFAULT_HTTPS_PORT,
            tls_verify: default_tls_verify(),
            request_timeout_secs: default_request_timeout_secs(),
            api_release: DEFAULT_API_RELEASE.to_string(),
        };

        config.validate()?;

        Ok(config)
    }

    /// Load the configuration from `VSPHERE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] when a required variable is missing or a value is malformed.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] when a required variable is missing or a value is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let missing: Vec<&str> = [ENV_HOST, ENV_USERNAME, ENV_PASSWORD]
            .into_iter()
            .filter(|key| read(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::ConfigError(format!(
                "missing vSphere connection settings: {}",
                missing.join(", ")
            )));
        }

        let mut config = Self::new(
            read(ENV_HOST).unwrap_or_default(),
            read(ENV_USERNAME).unwrap_or_default(),
            read(ENV_PASSWORD).unwrap_or_default(),
        )?;

        if let Some(port) = read(ENV_PORT) {
            config.port = port
                .trim()
                .parse()
                .map_err(|e| Error::ConfigError(format!("Invalid {ENV_PORT} `{port}`: {e}")))?;
        }
        if let Some(verify) = read(ENV_TLS_VERIFY) {
            config.tls_verify = parse_flag(&verify).ok_or_else(|| {
                Error::ConfigError(format!("Invalid {ENV_TLS_VERIFY} `{verify}`"))
            })?;
        }
        if let Some(timeout) = read(ENV_TIMEOUT_SECS) {
            config.request_timeout_secs = timeout.trim().parse().map_err(|e| {
                Error::ConfigError(format!("Invalid {ENV_TIMEOUT_SECS} `{timeout}`: {e}"))
            })?;
        }
        if let Some(release) = read(ENV_API_RELEASE) {
            config.api_release = release.trim().to_string();
        }

        config.validate()?;

        Ok(config)
    }

    /// Set the HTTPS port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set the VI/JSON API release.
    #[must_use]
    pub fn with_api_release(mut self, release: impl Into<String>) -> Self {
        self.api_release = release.into();
        self
    }

    /// The login password.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build the VI/JSON base URL, `https://{host}:{port}/sdk/vim25/{release}/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot form a valid URL.
    pub fn endpoint_url(&self) -> Result<Url, Error> {
        let raw = format!(
            "https://{}:{}/sdk/vim25/{}/",
            self.host, self.port, self.api_release
        );
        Url::parse(&raw).map_err(|e| Error::ConfigError(format!("Invalid vSphere endpoint: {e}")))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_new_defaults() {
        let config = VsphereConfig::new("vcenter.local", "admin", "secret").unwrap();
        assert_eq!(config.port, 443);
        assert!(!config.tls_verify);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.api_release, DEFAULT_API_RELEASE);
        assert_eq!(config.password(), "secret");
    }

    #[test]
    fn test_config_rejects_empty_host() {
        assert!(VsphereConfig::new("", "admin", "secret").is_err());
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let config = VsphereConfig::new("vcenter.local", "admin", "hunter2").unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_config_builder() {
        let config = VsphereConfig::new("vcenter.local", "admin", "secret")
            .unwrap()
            .with_port(8443)
            .with_tls_verify(true)
            .with_timeout(60)
            .with_api_release("7.0.3.0");

        assert_eq!(config.port, 8443);
        assert!(config.tls_verify);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.api_release, "7.0.3.0");
    }

    #[test]
    fn test_config_endpoint_url() {
        let config = VsphereConfig::new("vcenter.local", "admin", "secret")
            .unwrap()
            .with_port(8443);
        let url = config.endpoint_url().unwrap();
        assert_eq!(url.as_str(), "https://vcenter.local:8443/sdk/vim25/8.0.1.0/");
    }

    #[test]
    fn test_from_lookup_success() {
        let config = VsphereConfig::from_lookup(lookup_from(&[
            (ENV_HOST, "vcenter.local"),
            (ENV_USERNAME, "administrator@vsphere.local"),
            (ENV_PASSWORD, "secret"),
            (ENV_PORT, "9443"),
            (ENV_TLS_VERIFY, "true"),
            (ENV_TIMEOUT_SECS, "45"),
        ]))
        .unwrap();

        assert_eq!(config.host, "vcenter.local");
        assert_eq!(config.username, "administrator@vsphere.local");
        assert_eq!(config.port, 9443);
        assert!(config.tls_verify);
        assert_eq!(config.request_timeout_secs, 45);
    }

    #[test]
    fn test_from_lookup_missing_variables() {
        let err = VsphereConfig::from_lookup(lookup_from(&[(ENV_HOST, "vcenter.local")]))
            .unwrap_err();
        match err {
            Error::ConfigError(msg) => {
                assert!(msg.contains(ENV_USERNAME));
                assert!(msg.contains(ENV_PASSWORD));
                assert!(!msg.contains(ENV_HOST));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_lookup_invalid_port() {
        let result = VsphereConfig::from_lookup(lookup_from(&[
            (ENV_HOST, "vcenter.local"),
            (ENV_USERNAME, "admin"),
            (ENV_PASSWORD, "secret"),
            (ENV_PORT, "https"),
        ]));
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_config_validation_timeout_range() {
        let mut config = VsphereConfig::new("vcenter.local", "admin", "secret").unwrap();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.request_timeout_secs = 301;
        assert!(config.validate().is_err());

        config.request_timeout_secs = 30;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("YES"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
