//! Credential selection for Resource Manager requests.

use std::fmt;
use std::sync::Arc;

use azure_core::credentials::{Secret, TokenCredential};
use tracing::info;

use crate::config::AzureConfig;

use super::AzureBackendError;

/// Identity the manager signs requests as.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signer<'a> {
    /// App registration authenticating with a client secret.
    ServicePrincipal {
        tenant_id: &'a str,
        client_id: &'a str,
        client_secret: &'a str,
    },
    /// Whatever account `az login` last signed in with.
    CliLogin,
}

impl fmt::Debug for Signer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServicePrincipal {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ServicePrincipal")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Self::CliLogin => f.write_str("CliLogin"),
        }
    }
}

impl<'a> Signer<'a> {
    /// Service principal when all three of its settings are present,
    /// otherwise the CLI login.
    pub(crate) fn from_config(config: &'a AzureConfig) -> Self {
        match (
            non_blank(config.tenant_id.as_deref()),
            non_blank(config.client_id.as_deref()),
            non_blank(config.client_secret.as_deref()),
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => Self::ServicePrincipal {
                tenant_id,
                client_id,
                client_secret,
            },
            _ => Self::CliLogin,
        }
    }
}

/// Credential that signs management requests as the configured identity.
///
/// # Errors
///
/// Returns [`AzureBackendError::Credential`] when `azure_identity` rejects
/// the settings.
pub fn build_credential(
    config: &AzureConfig,
) -> Result<Arc<dyn TokenCredential>, AzureBackendError> {
    let credential: Arc<dyn TokenCredential> = match Signer::from_config(config) {
        Signer::ServicePrincipal {
            tenant_id,
            client_id,
            client_secret,
        } => {
            info!(tenant_id, client_id, "signing requests as service principal");
            azure_identity::ClientSecretCredential::new(
                tenant_id,
                client_id.to_owned(),
                Secret::new(client_secret.to_owned()),
                None,
            )?
        }
        Signer::CliLogin => {
            info!("signing requests with the az login account");
            azure_identity::AzureCliCredential::new(None)?
        }
    };
    Ok(credential)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|inner| !inner.is_empty())
}

/// OAuth scope covering the management endpoint.
pub(crate) fn management_scope(endpoint: &str) -> String {
    format!("{}/.default", endpoint.trim_end_matches('/'))
}
