//! Names and regions for a single provisioning run.

use crate::config::AzureConfig;
use crate::model::{AccessRight, Region};
use crate::names::{random_name, random_storage_account_name};

/// Blob container receiving captured events.
pub const BLOB_CONTAINER_NAME: &str = "testname";

/// Consumer group created on the capture-enabled Event Hub.
pub const CONSUMER_GROUP_NAME: &str = "cg1";

/// Metadata stored with [`CONSUMER_GROUP_NAME`].
pub const CONSUMER_GROUP_METADATA: &str = "sometadata";

/// Authorization rule created on the capture-enabled Event Hub.
pub const AUTHORIZATION_RULE_NAME: &str = "listenrule1";

/// Everything a run needs to know before it touches Azure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionPlan {
    /// Region for the resource group and namespace.
    pub region: Region,
    /// Region for the storage account.
    pub storage_region: Region,
    /// Resource group name (`rgeh…`).
    pub resource_group: String,
    /// Namespace name (`ns…`).
    pub namespace: String,
    /// Storage account name (`stg…`).
    pub storage_account: String,
    /// Capture container name.
    pub blob_container: String,
    /// Capture-enabled Event Hub name (`eh…`).
    pub primary_event_hub: String,
    /// Second Event Hub name (`eh…`).
    pub secondary_event_hub: String,
    /// Consumer group name.
    pub consumer_group: String,
    /// Consumer group metadata.
    pub consumer_group_metadata: String,
    /// Authorization rule name.
    pub authorization_rule: String,
    /// Rights granted by the authorization rule.
    pub authorization_rights: Vec<AccessRight>,
}

impl ProvisionPlan {
    /// Creates a plan with freshly generated resource names.
    #[must_use]
    pub fn generate(region: Region, storage_region: Region) -> Self {
        Self {
            region,
            storage_region,
            resource_group: random_name("rgeh"),
            namespace: random_name("ns"),
            storage_account: random_storage_account_name("stg"),
            blob_container: BLOB_CONTAINER_NAME.to_owned(),
            primary_event_hub: random_name("eh"),
            secondary_event_hub: random_name("eh"),
            consumer_group: CONSUMER_GROUP_NAME.to_owned(),
            consumer_group_metadata: CONSUMER_GROUP_METADATA.to_owned(),
            authorization_rule: AUTHORIZATION_RULE_NAME.to_owned(),
            authorization_rights: vec![AccessRight::Listen],
        }
    }

    /// Creates a plan using the configured regions.
    #[must_use]
    pub fn from_config(config: &AzureConfig) -> Self {
        Self::generate(config.region(), config.storage_region())
    }
}
