//! Typed view of the Azure resources created by a provisioning run.
//!
//! Every resource carries its Azure Resource Manager identifier. Child
//! identifiers are always derived from the parent's identifier so the
//! parent/child relationship cannot drift.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use thiserror::Error;

const SUBSCRIPTIONS_PREFIX: &str = "/subscriptions/";

/// Raised when a string is not a usable Azure resource identifier.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("invalid resource id '{0}': expected /subscriptions/<id>/...")]
pub struct InvalidResourceId(pub String);

/// Azure Resource Manager identifier such as
/// `/subscriptions/<sub>/resourceGroups/<rg>`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ResourceId(String);

impl ResourceId {
    /// Parses and validates a resource identifier.
    ///
    /// Trailing slashes are removed.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidResourceId`] when the value does not start with
    /// `/subscriptions/` followed by a subscription id.
    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidResourceId> {
        let raw = value.into();
        let trimmed = raw.trim().trim_end_matches('/');
        let subscription = trimmed
            .strip_prefix(SUBSCRIPTIONS_PREFIX)
            .map(|rest| rest.split('/').next().unwrap_or_default())
            .unwrap_or_default();
        if subscription.is_empty() {
            return Err(InvalidResourceId(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Identifier of a subscription.
    #[must_use]
    pub fn subscription(subscription_id: &str) -> Self {
        Self(format!("{SUBSCRIPTIONS_PREFIX}{}", subscription_id.trim()))
    }

    /// Identifier of a resource group inside a subscription.
    #[must_use]
    pub fn resource_group(subscription_id: &str, name: &str) -> Self {
        Self::subscription(subscription_id).child("resourceGroups", name)
    }

    /// Derives the identifier of a nested resource.
    ///
    /// `segment` is the collection name, for example `eventhubs` or
    /// `providers/Microsoft.EventHub/namespaces`.
    #[must_use]
    pub fn child(&self, segment: &str, name: &str) -> Self {
        Self(format!("{}/{segment}/{name}", self.0))
    }

    /// Returns the last path segment, which is the resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Returns `true` when `other` is nested below this identifier.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other
            .0
            .strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Borrows the identifier as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for ResourceId {
    type Err = InvalidResourceId;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for ResourceId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Azure region name such as `eastus`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Region(String);

impl Region {
    /// Normalises a region name to the lower-case form ARM reports.
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.trim().replace(' ', "").to_ascii_lowercase())
    }

    /// Borrows the region as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access right granted by an authorization rule.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AccessRight {
    /// Receive events.
    Listen,
    /// Publish events.
    Send,
    /// Manage the entity; ARM requires `Listen` and `Send` alongside it.
    Manage,
}

impl AccessRight {
    /// Wire name used by the Event Hubs management API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Listen => "Listen",
            Self::Send => "Send",
            Self::Manage => "Manage",
        }
    }

    /// Parses the wire name, ignoring case.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "listen" => Some(Self::Listen),
            "send" => Some(Self::Send),
            "manage" => Some(Self::Manage),
            _ => None,
        }
    }
}

impl fmt::Display for AccessRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File format used when capture writes events to blob storage.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CaptureEncoding {
    /// Apache Avro.
    #[default]
    Avro,
    /// Apache Avro with deflate compression.
    AvroDeflate,
}

impl CaptureEncoding {
    /// Wire name used by the Event Hubs management API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Avro => "Avro",
            Self::AvroDeflate => "AvroDeflate",
        }
    }

    /// Parses the wire name, ignoring case.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "avro" => Some(Self::Avro),
            "avrodeflate" => Some(Self::AvroDeflate),
            _ => None,
        }
    }
}

/// Destination name ARM expects for block blob capture.
pub const BLOCK_BLOB_DESTINATION: &str = "EventHubArchive.AzureBlockBlob";

/// Blob naming pattern applied when no other format is configured.
pub const DEFAULT_ARCHIVE_NAME_FORMAT: &str =
    "{Namespace}/{EventHub}/{PartitionId}/{Year}/{Month}/{Day}/{Hour}/{Minute}/{Second}";

/// Where captured events are written.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CaptureDestination {
    /// Destination kind, normally [`BLOCK_BLOB_DESTINATION`].
    pub name: String,
    /// Identifier of the storage account receiving the blobs.
    pub storage_account_id: ResourceId,
    /// Container inside the storage account.
    pub blob_container: String,
    /// Blob naming pattern.
    pub archive_name_format: String,
}

impl CaptureDestination {
    /// Builds a block blob destination pointing at an existing container.
    #[must_use]
    pub fn block_blob(account: &StorageAccount, container: &BlobContainer) -> Self {
        Self {
            name: BLOCK_BLOB_DESTINATION.to_owned(),
            storage_account_id: account.id.clone(),
            blob_container: container.name.clone(),
            archive_name_format: DEFAULT_ARCHIVE_NAME_FORMAT.to_owned(),
        }
    }
}

/// Capture settings for an Event Hub.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CaptureDescription {
    /// Whether capture is switched on.
    pub enabled: bool,
    /// Output encoding.
    pub encoding: CaptureEncoding,
    /// Target storage.
    pub destination: CaptureDestination,
}

impl CaptureDescription {
    /// Enabled Avro capture into the given destination.
    #[must_use]
    pub const fn avro(destination: CaptureDestination) -> Self {
        Self {
            enabled: true,
            encoding: CaptureEncoding::Avro,
            destination,
        }
    }
}

/// Root container for every resource of a run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceGroup {
    /// ARM identifier.
    pub id: ResourceId,
    /// Group name.
    pub name: String,
    /// Region the group metadata lives in.
    pub region: Region,
}

/// Event Hubs namespace.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Namespace {
    /// ARM identifier.
    pub id: ResourceId,
    /// Namespace name.
    pub name: String,
    /// Hosting region.
    pub region: Region,
}

/// General purpose v2 storage account.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageAccount {
    /// ARM identifier.
    pub id: ResourceId,
    /// Account name.
    pub name: String,
    /// Hosting region.
    pub region: Region,
}

/// Blob service of a storage account (always named `default`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlobService {
    /// ARM identifier.
    pub id: ResourceId,
}

/// Blob container inside a blob service.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlobContainer {
    /// ARM identifier.
    pub id: ResourceId,
    /// Container name.
    pub name: String,
}

/// Event Hub inside a namespace.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EventHub {
    /// ARM identifier.
    pub id: ResourceId,
    /// Event Hub name.
    pub name: String,
    /// Capture settings reported by the service, if any.
    pub capture: Option<CaptureDescription>,
}

/// Consumer group of an Event Hub.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConsumerGroup {
    /// ARM identifier.
    pub id: ResourceId,
    /// Consumer group name.
    pub name: String,
    /// Free-form metadata stored with the group.
    pub user_metadata: Option<String>,
}

/// Shared access authorization rule on an Event Hub.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthorizationRule {
    /// ARM identifier.
    pub id: ResourceId,
    /// Rule name.
    pub name: String,
    /// Rights granted by the rule.
    pub rights: Vec<AccessRight>,
}
