//! Configuration loading via `ortho-config`.

use std::fmt;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::model::Region;

/// Public Azure cloud management endpoint.
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// Longest accepted `operation_timeout_secs` (one day).
pub const MAX_OPERATION_TIMEOUT_SECS: u64 = 86_400;

/// Azure settings derived from defaults, configuration files, and
/// environment variables (`AZURE_*`).
#[derive(Clone, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "AZURE",
    discovery(
        app_name = "ehprov",
        env_var = "EHPROV_CONFIG_PATH",
        config_file_name = "ehprov.toml",
        dotfile_name = ".ehprov.toml",
        project_file_name = "ehprov.toml"
    )
)]
pub struct AzureConfig {
    /// Subscription that receives every resource. This value is required.
    pub subscription_id: String,
    /// Microsoft Entra tenant used for service principal sign-in.
    pub tenant_id: Option<String>,
    /// Application (client) id of the service principal.
    pub client_id: Option<String>,
    /// Client secret of the service principal. Redacted in `Debug`.
    pub client_secret: Option<String>,
    /// Region for the resource group and namespace. Defaults to `eastus`.
    #[ortho_config(default = "eastus".to_owned())]
    pub region: String,
    /// Region for the capture storage account. Defaults to `eastus2`.
    #[ortho_config(default = "eastus2".to_owned())]
    pub storage_region: String,
    /// Resource Manager endpoint; override for sovereign clouds.
    #[ortho_config(default = DEFAULT_MANAGEMENT_ENDPOINT.to_owned())]
    pub management_endpoint: String,
    /// Event Hubs namespace SKU. Capture needs `Standard` or above.
    #[ortho_config(default = "Standard".to_owned())]
    pub namespace_sku: String,
    /// Seconds between polls of a long-running operation when the service
    /// does not send `Retry-After`.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Upper bound for a single long-running operation, in seconds.
    #[ortho_config(default = 1800)]
    pub operation_timeout_secs: u64,
    /// Attempts made after the first one for throttled or transient failures.
    #[ortho_config(default = 3)]
    pub max_retries: u32,
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConfig")
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("region", &self.region)
            .field("storage_region", &self.storage_region)
            .field("management_endpoint", &self.management_endpoint)
            .field("namespace_sku", &self.namespace_sku)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("operation_timeout_secs", &self.operation_timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
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

impl AzureConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to ehprov.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("ehprov")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and configuration key that supply the missing value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty,
    /// [`ConfigError::PartialServicePrincipal`] when only some service
    /// principal settings are present, and [`ConfigError::Invalid`] for
    /// out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.subscription_id,
            &FieldMetadata::new(
                "Azure subscription ID",
                "AZURE_SUBSCRIPTION_ID",
                "subscription_id",
            ),
        )?;
        Self::require_field(
            &self.region,
            &FieldMetadata::new("region", "AZURE_REGION", "region"),
        )?;
        Self::require_field(
            &self.storage_region,
            &FieldMetadata::new(
                "storage account region",
                "AZURE_STORAGE_REGION",
                "storage_region",
            ),
        )?;
        Self::require_field(
            &self.management_endpoint,
            &FieldMetadata::new(
                "Resource Manager endpoint",
                "AZURE_MANAGEMENT_ENDPOINT",
                "management_endpoint",
            ),
        )?;
        Self::require_field(
            &self.namespace_sku,
            &FieldMetadata::new(
                "Event Hubs namespace SKU",
                "AZURE_NAMESPACE_SKU",
                "namespace_sku",
            ),
        )?;

        let principal = [&self.tenant_id, &self.client_id, &self.client_secret];
        let present = principal
            .iter()
            .filter(|value| value.as_deref().is_some_and(|inner| !inner.trim().is_empty()))
            .count();
        if present != 0 && present != principal.len() {
            return Err(ConfigError::PartialServicePrincipal);
        }

        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "poll_interval_secs must be at least 1 (AZURE_POLL_INTERVAL_SECS)",
            )));
        }
        if self.operation_timeout_secs < self.poll_interval_secs {
            return Err(ConfigError::Invalid(String::from(
                "operation_timeout_secs must not be shorter than poll_interval_secs (AZURE_OPERATION_TIMEOUT_SECS)",
            )));
        }
        if self.operation_timeout_secs > MAX_OPERATION_TIMEOUT_SECS {
            return Err(ConfigError::Invalid(format!(
                "operation_timeout_secs must not exceed {MAX_OPERATION_TIMEOUT_SECS} (AZURE_OPERATION_TIMEOUT_SECS)"
            )));
        }
        Ok(())
    }

    /// Returns `true` when service principal credentials are configured.
    #[must_use]
    pub fn has_service_principal(&self) -> bool {
        [&self.tenant_id, &self.client_id, &self.client_secret]
            .iter()
            .all(|value| value.as_deref().is_some_and(|inner| !inner.trim().is_empty()))
    }

    /// Region for the resource group and namespace.
    #[must_use]
    pub fn region(&self) -> Region {
        Region::new(&self.region)
    }

    /// Region for the storage account.
    #[must_use]
    pub fn storage_region(&self) -> Region {
        Region::new(&self.storage_region)
    }

    /// Endpoint without a trailing slash.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.management_endpoint.trim().trim_end_matches('/')
    }

    /// Default poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Operation timeout as a [`Duration`].
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Raised when only part of the service principal is configured.
    #[error(
        "incomplete service principal: set all of AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET, or none to use the Azure CLI login"
    )]
    PartialServicePrincipal,
    /// Raised when a value is present but unusable.
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
