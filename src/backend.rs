//! Resource manager abstraction used by the provisioning run.

use std::future::Future;
use std::pin::Pin;

use crate::model::{
    AccessRight, AuthorizationRule, BlobContainer, BlobService, CaptureDescription, ConsumerGroup,
    EventHub, Namespace, Region, ResourceGroup, ResourceId, StorageAccount,
};

/// Future returned by resource manager operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Remote operations needed to build and destroy the Event Hubs resource
/// graph.
///
/// Every creating call resolves only once the remote operation has reached a
/// terminal state. Listing calls resolve once every page has been read.
pub trait ResourceManager {
    /// Provider specific error type returned by the manager.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates (or updates) a resource group.
    fn create_resource_group<'a>(
        &'a self,
        name: &'a str,
        region: &'a Region,
    ) -> BackendFuture<'a, ResourceGroup, Self::Error>;

    /// Creates an Event Hubs namespace inside a resource group.
    fn create_namespace<'a>(
        &'a self,
        group: &'a ResourceGroup,
        name: &'a str,
        region: &'a Region,
    ) -> BackendFuture<'a, Namespace, Self::Error>;

    /// Creates a `StorageV2` / `Standard_LRS` storage account.
    fn create_storage_account<'a>(
        &'a self,
        group: &'a ResourceGroup,
        name: &'a str,
        region: &'a Region,
    ) -> BackendFuture<'a, StorageAccount, Self::Error>;

    /// Fetches the blob service of a storage account.
    fn get_blob_service<'a>(
        &'a self,
        account: &'a StorageAccount,
    ) -> BackendFuture<'a, BlobService, Self::Error>;

    /// Creates a blob container.
    fn create_blob_container<'a>(
        &'a self,
        service: &'a BlobService,
        name: &'a str,
    ) -> BackendFuture<'a, BlobContainer, Self::Error>;

    /// Creates an Event Hub, optionally with capture enabled.
    fn create_event_hub<'a>(
        &'a self,
        namespace: &'a Namespace,
        name: &'a str,
        capture: Option<&'a CaptureDescription>,
    ) -> BackendFuture<'a, EventHub, Self::Error>;

    /// Creates a consumer group on an Event Hub.
    fn create_consumer_group<'a>(
        &'a self,
        hub: &'a EventHub,
        name: &'a str,
        user_metadata: Option<&'a str>,
    ) -> BackendFuture<'a, ConsumerGroup, Self::Error>;

    /// Creates an authorization rule on an Event Hub.
    fn create_authorization_rule<'a>(
        &'a self,
        hub: &'a EventHub,
        name: &'a str,
        rights: &'a [AccessRight],
    ) -> BackendFuture<'a, AuthorizationRule, Self::Error>;

    /// Lists every consumer group of an Event Hub.
    fn list_consumer_groups<'a>(
        &'a self,
        hub: &'a EventHub,
    ) -> BackendFuture<'a, Vec<ConsumerGroup>, Self::Error>;

    /// Lists every Event Hub of a namespace.
    fn list_event_hubs<'a>(
        &'a self,
        namespace: &'a Namespace,
    ) -> BackendFuture<'a, Vec<EventHub>, Self::Error>;

    /// Deletes a resource group and, with it, everything nested inside.
    fn delete_resource_group<'a>(
        &'a self,
        group: &'a ResourceId,
    ) -> BackendFuture<'a, (), Self::Error>;
}
