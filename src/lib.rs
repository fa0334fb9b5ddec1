//! Core library for the `ehprov` Event Hubs provisioning tool.
//!
//! The crate exposes a resource manager abstraction over the Azure Resource
//! Manager operations needed to stand up an Event Hub with capture into blob
//! storage, an Azure implementation of it, and the orchestrator that runs
//! the walkthrough (create resource group → namespace → storage → event hubs
//! → consumer group → authorization rule → listings → delete resource
//! group).

pub mod azure;
pub mod backend;
pub mod config;
pub mod model;
pub mod names;
pub mod provision;
pub mod test_support;

pub use azure::{AzureBackendError, AzureResourceManager, RetryPolicy, build_credential};
pub use backend::{BackendFuture, ResourceManager};
pub use config::{AzureConfig, ConfigError};
pub use model::{
    AccessRight, AuthorizationRule, BlobContainer, BlobService, CaptureDescription,
    CaptureDestination, CaptureEncoding, ConsumerGroup, EventHub, InvalidResourceId, Namespace,
    Region, ResourceGroup, ResourceId, StorageAccount,
};
pub use provision::{
    CleanupOutcome, ProvisionError, ProvisionOrchestrator, ProvisionPlan, ProvisionReport,
    ProvisionStep, ProvisionSummary,
};
