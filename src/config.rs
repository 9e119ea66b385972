//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::connection::ConnectionRecord;

/// Connection settings for the `cirrus` CLI, merged from defaults,
/// configuration files, environment variables, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "CIRRUS",
    discovery(
        app_name = "cirrus",
        env_var = "CIRRUS_CONFIG_PATH",
        config_file_name = "cirrus.toml",
        dotfile_name = ".cirrus.toml",
        project_file_name = "cirrus.toml"
    )
)]
pub struct CirrusConfig {
    /// Management API URL (`http://host:8080/client/api`).
    pub url: String,
    /// API key of the account used by the connector.
    pub api_key: String,
    /// Secret key used to sign requests.
    pub secret_key: String,
    /// Zone new servers are placed in.
    pub zone_id: Option<String>,
    /// Hypervisor new servers are placed on.
    pub hypervisor: Option<String>,
    /// Identifier of the connection record. Key pair names embed it.
    #[ortho_config(default = 1)]
    pub connection_id: u64,
    /// Seconds between polls while waiting for a new server's NIC.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Seconds to wait for a new server's NIC before rolling back.
    #[ortho_config(default = 300)]
    pub wait_timeout_secs: u64,
    /// Directory holding key pair records and private keys.
    #[ortho_config(default = ".cirrus/keys".to_owned())]
    pub key_store: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl CirrusConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to cirrus.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("cirrus")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] when the polling settings are unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.url,
            &FieldMetadata::new("CloudStack API URL", "CIRRUS_URL", "url"),
        )?;
        Self::require_field(
            &self.api_key,
            &FieldMetadata::new("CloudStack API key", "CIRRUS_API_KEY", "api_key"),
        )?;
        Self::require_field(
            &self.secret_key,
            &FieldMetadata::new("CloudStack secret key", "CIRRUS_SECRET_KEY", "secret_key"),
        )?;
        Self::require_field(
            &self.key_store,
            &FieldMetadata::new("key pair store directory", "CIRRUS_KEY_STORE", "key_store"),
        )?;
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "poll_interval_secs must be greater than zero",
            )));
        }
        if self.wait_timeout_secs < self.poll_interval_secs {
            return Err(ConfigError::Invalid(String::from(
                "wait_timeout_secs must not be shorter than poll_interval_secs",
            )));
        }
        Ok(())
    }

    /// Interval between NIC polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Upper bound on the NIC wait.
    #[must_use]
    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    /// Builds the connection record described by this configuration.
    #[must_use]
    pub fn to_record(&self) -> ConnectionRecord {
        let mut record = ConnectionRecord::new(
            self.connection_id,
            self.url.clone(),
            self.api_key.clone(),
            self.secret_key.clone(),
        );
        record.set_zone(self.zone_id.clone());
        record.set_hypervisor(self.hypervisor.clone());
        record
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
