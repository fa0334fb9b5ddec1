//! Test support utilities shared across unit and integration tests.
//!
//! [`ScriptedManager`] is an in-memory [`ResourceManager`] that behaves like
//! a tiny Resource Manager: it derives identifiers from parents, keeps the
//! created resources so listings return them, cascades resource group
//! deletion, records every call in order, and fails on request.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::backend::{BackendFuture, ResourceManager};
use crate::model::{
    AccessRight, AuthorizationRule, BlobContainer, BlobService, CaptureDescription, ConsumerGroup,
    EventHub, Namespace, Region, ResourceGroup, ResourceId, StorageAccount,
};

/// Consumer group Azure creates on every Event Hub.
pub const DEFAULT_CONSUMER_GROUP: &str = "$Default";

/// Subscription id used by [`ScriptedManager::new`].
pub const SCRIPTED_SUBSCRIPTION_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Kinds of calls accepted by [`ScriptedManager`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    /// [`ResourceManager::create_resource_group`].
    CreateResourceGroup,
    /// [`ResourceManager::create_namespace`].
    CreateNamespace,
    /// [`ResourceManager::create_storage_account`].
    CreateStorageAccount,
    /// [`ResourceManager::get_blob_service`].
    GetBlobService,
    /// [`ResourceManager::create_blob_container`].
    CreateBlobContainer,
    /// [`ResourceManager::create_event_hub`].
    CreateEventHub,
    /// [`ResourceManager::create_consumer_group`].
    CreateConsumerGroup,
    /// [`ResourceManager::create_authorization_rule`].
    CreateAuthorizationRule,
    /// [`ResourceManager::list_consumer_groups`].
    ListConsumerGroups,
    /// [`ResourceManager::list_event_hubs`].
    ListEventHubs,
    /// [`ResourceManager::delete_resource_group`].
    DeleteResourceGroup,
}

impl Operation {
    /// Parses the kebab-case name used in feature files and environment
    /// hooks, for example `create-event-hub`.
    #[must_use]
    pub fn from_name(value: &str) -> Option<Self> {
        let operation = match value.trim() {
            "create-resource-group" => Self::CreateResourceGroup,
            "create-namespace" => Self::CreateNamespace,
            "create-storage-account" => Self::CreateStorageAccount,
            "get-blob-service" => Self::GetBlobService,
            "create-blob-container" => Self::CreateBlobContainer,
            "create-event-hub" => Self::CreateEventHub,
            "create-consumer-group" => Self::CreateConsumerGroup,
            "create-authorization-rule" => Self::CreateAuthorizationRule,
            "list-consumer-groups" => Self::ListConsumerGroups,
            "list-event-hubs" => Self::ListEventHubs,
            "delete-resource-group" => Self::DeleteResourceGroup,
            _ => return None,
        };
        Some(operation)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A recorded call and its arguments.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ManagerCall {
    /// Resource group creation.
    CreateResourceGroup {
        /// Requested name.
        name: String,
        /// Requested region.
        region: Region,
    },
    /// Namespace creation.
    CreateNamespace {
        /// Parent resource group.
        group: ResourceId,
        /// Requested name.
        name: String,
    },
    /// Storage account creation.
    CreateStorageAccount {
        /// Parent resource group.
        group: ResourceId,
        /// Requested name.
        name: String,
        /// Requested region.
        region: Region,
    },
    /// Blob service lookup.
    GetBlobService {
        /// Storage account.
        account: ResourceId,
    },
    /// Blob container creation.
    CreateBlobContainer {
        /// Parent blob service.
        service: ResourceId,
        /// Requested name.
        name: String,
    },
    /// Event Hub creation.
    CreateEventHub {
        /// Parent namespace.
        namespace: ResourceId,
        /// Requested name.
        name: String,
        /// Requested capture settings.
        capture: Option<CaptureDescription>,
    },
    /// Consumer group creation.
    CreateConsumerGroup {
        /// Parent Event Hub.
        hub: ResourceId,
        /// Requested name.
        name: String,
        /// Requested metadata.
        user_metadata: Option<String>,
    },
    /// Authorization rule creation.
    CreateAuthorizationRule {
        /// Parent Event Hub.
        hub: ResourceId,
        /// Requested name.
        name: String,
        /// Requested rights.
        rights: Vec<AccessRight>,
    },
    /// Consumer group listing.
    ListConsumerGroups {
        /// Listed Event Hub.
        hub: ResourceId,
    },
    /// Event Hub listing.
    ListEventHubs {
        /// Listed namespace.
        namespace: ResourceId,
    },
    /// Resource group deletion.
    DeleteResourceGroup {
        /// Deleted group.
        group: ResourceId,
    },
}

impl ManagerCall {
    /// Kind of this call.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::CreateResourceGroup { .. } => Operation::CreateResourceGroup,
            Self::CreateNamespace { .. } => Operation::CreateNamespace,
            Self::CreateStorageAccount { .. } => Operation::CreateStorageAccount,
            Self::GetBlobService { .. } => Operation::GetBlobService,
            Self::CreateBlobContainer { .. } => Operation::CreateBlobContainer,
            Self::CreateEventHub { .. } => Operation::CreateEventHub,
            Self::CreateConsumerGroup { .. } => Operation::CreateConsumerGroup,
            Self::CreateAuthorizationRule { .. } => Operation::CreateAuthorizationRule,
            Self::ListConsumerGroups { .. } => Operation::ListConsumerGroups,
            Self::ListEventHubs { .. } => Operation::ListEventHubs,
            Self::DeleteResourceGroup { .. } => Operation::DeleteResourceGroup,
        }
    }
}

/// Error returned by [`ScriptedManager`] for injected failures.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("scripted failure during {operation} (call {occurrence})")]
pub struct ScriptedManagerError {
    /// Operation that failed.
    pub operation: Operation,
    /// 1-based occurrence of the operation that failed.
    pub occurrence: usize,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<ManagerCall>,
    failures: Vec<(Operation, usize)>,
    groups: Vec<ResourceGroup>,
    event_hubs: Vec<EventHub>,
    consumer_groups: Vec<ConsumerGroup>,
    other_resources: Vec<ResourceId>,
}

impl State {
    fn occurrences(&self, operation: Operation) -> usize {
        self.calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }
}

/// Scripted in-memory resource manager.
#[derive(Clone, Debug)]
pub struct ScriptedManager {
    subscription_id: String,
    state: Arc<Mutex<State>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for ScriptedManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedManager {
    /// Creates a manager bound to [`SCRIPTED_SUBSCRIPTION_ID`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscription_id: SCRIPTED_SUBSCRIPTION_ID.to_owned(),
            state: Arc::new(Mutex::new(State::default())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fails the first call of `operation`.
    pub fn fail_on(&self, operation: Operation) {
        self.fail_at(operation, 1);
    }

    /// Fails the `occurrence`-th (1-based) call of `operation`.
    pub fn fail_at(&self, operation: Operation, occurrence: usize) {
        self.lock().failures.push((operation, occurrence));
    }

    /// Snapshot of every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ManagerCall> {
        self.lock().calls.clone()
    }

    /// Snapshot of the recorded operation kinds, in order.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.lock().calls.iter().map(ManagerCall::operation).collect()
    }

    /// Number of recorded calls of `operation`.
    #[must_use]
    pub fn count(&self, operation: Operation) -> usize {
        self.lock().occurrences(operation)
    }

    /// Highest number of calls that were running at the same time.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Number of resources that still exist, resource groups included.
    #[must_use]
    pub fn remaining_resources(&self) -> usize {
        let state = self.lock();
        state.groups.len()
            + state.event_hubs.len()
            + state.consumer_groups.len()
            + state.other_resources.len()
    }

    async fn call<T>(
        &self,
        call: ManagerCall,
        apply: impl FnOnce(&mut State) -> T,
    ) -> Result<T, ScriptedManagerError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let result = {
            let mut state = self.lock();
            let operation = call.operation();
            state.calls.push(call);
            let occurrence = state.occurrences(operation);
            if state.failures.contains(&(operation, occurrence)) {
                Err(ScriptedManagerError {
                    operation,
                    occurrence,
                })
            } else {
                Ok(apply(&mut state))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl ResourceManager for ScriptedManager {
    type Error = ScriptedManagerError;

    fn create_resource_group<'a>(
        &'a self,
        name: &'a str,
        region: &'a Region,
    ) -> BackendFuture<'a, ResourceGroup, Self::Error> {
        Box::pin(async move {
            let call = ManagerCall::CreateResourceGroup {
                name: name.to_owned(),
                region: region.clone(),
            };
            let group = ResourceGroup {
                id: ResourceId::resource_group(&self.subscription_id, name),
                name: name.to_owned(),
                region: region.clone(),
            };
            self.call(call, move |state| {
                state.groups.push(group.clone());
                group
            })
            .await
        })
    }

    fn create_namespace<'a>(
        &'a self,
        group: &'a ResourceGroup,
        name: &'a str,
        region: &'a Region,
    ) -> BackendFuture<'a, Namespace, Self::Error> {
        Box::pin(async move {
            let call = ManagerCall::CreateNamespace {
                group: group.id.clone(),
                name: name.to_owned(),
            };
            let namespace = Namespace {
                id: group
                    .id
                    .child("providers/Microsoft.EventHub/namespaces", name),
                name: name.to_owned(),
                region: region.clone(),
            };
            self.call(call, move |state| {
                state.other_resources.push(namespace.id.clone());
                namespace
            })
            .await
        })
    }

    fn create_storage_account<'a>(
        &'a self,
        group: &'a ResourceGroup,
        name: &'a str,
        region: &'a Region,
    ) -> BackendFuture<'a, StorageAccount, Self::Error> {
        Box::pin(async move {
            let call = ManagerCall::CreateStorageAccount {
                group: group.id.clone(),
                name: name.to_owned(),
                region: region.clone(),
            };
            let account = StorageAccount {
                id: group
                    .id
                    .child("providers/Microsoft.Storage/storageAccounts", name),
                name: name.to_owned(),
                region: region.clone(),
            };
            self.call(call, move |state| {
                state.other_resources.push(account.id.clone());
                account
            })
            .await
        })
    }

    fn get_blob_service<'a>(
        &'a self,
        account: &'a StorageAccount,
    ) -> BackendFuture<'a, BlobService, Self::Error> {
        Box::pin(async move {
            let call = ManagerCall::GetBlobService {
                account: account.id.clone(),
            };
            let service = BlobService {
                id: account.id.child("blobServices", "default"),
            };
            self.call(call, move |_| service).await
        })
    }

    fn create_blob_container<'a>(
        &'a self,
        service: &'a BlobService,
        name: &'a str,
    ) -> BackendFuture<'a, BlobContainer, Self::Error> {
        Box::pin(async move {
            let call = ManagerCall::CreateBlobContainer {
                service: service.id.clone(),
                name: name.to_owned(),
            };
            let container = BlobContainer {
                id: service.id.child("containers", name),
                name: name.to_owned(),
            };
            self.call(call, move |state| {
                state.other_resources.push(container.id.clone());
                container
            })
            .await
        })
    }

    fn create_event_hub<'a>(
        &'a self,
        namespace: &'a Namespace,
        name: &'a str,
        capture: Option<&'a CaptureDescription>,
    ) -> BackendFuture<'a, EventHub, Self::Error> {
        Box::pin(async move {
            let call = ManagerCall::CreateEventHub {
                namespace: namespace.id.clone(),
                name: name.to_owned(),
                capture: capture.cloned(),
            };
            let hub = EventHub {
                id: namespace.id.child("eventhubs", name),
                name: name.to_owned(),
                capture: capture.cloned(),
            };
            self.call(call, move |state| {
                state.consumer_groups.push(ConsumerGroup {
                    id: hub.id.child("consumergroups", DEFAULT_CONSUMER_GROUP),
                    name: DEFAULT_CONSUMER_GROUP.to_owned(),
                    user_metadata: None,
                });
                state.event_hubs.push(hub.clone());
                hub
            })
            .await
        })
    }

    fn create_consumer_group<'a>(
        &'a self,
        hub: &'a EventHub,
        name: &'a str,
        user_metadata: Option<&'a str>,
    ) -> BackendFuture<'a, ConsumerGroup, Self::Error> {
        Box::pin(async move {
            let call = ManagerCall::CreateConsumerGroup {
                hub: hub.id.clone(),
                name: name.to_owned(),
                user_metadata: user_metadata.map(str::to_owned),
            };
            let group = ConsumerGroup {
                id: hub.id.child("consumergroups", name),
                name: name.to_owned(),
                user_metadata: user_metadata.map(str::to_owned),
            };
            self.call(call, move |state| {
                state.consumer_groups.push(group.clone());
                group
            })
            .await
        })
    }

    fn create_authorization_rule<'a>(
        &'a self,
        hub: &'a EventHub,
        name: &'a str,
        rights: &'a [AccessRight],
    ) -> BackendFuture<'a, AuthorizationRule, Self::Error> {
        Box::pin(async move {
            let call = ManagerCall::CreateAuthorizationRule {
                hub: hub.id.clone(),
                name: name.to_owned(),
                rights: rights.to_vec(),
            };
            let rule = AuthorizationRule {
                id: hub.id.child("authorizationRules", name),
                name: name.to_owned(),
                rights: rights.to_vec(),
            };
            self.call(call, move |state| {
                state.other_resources.push(rule.id.clone());
                rule
            })
            .await
        })
    }

    fn list_consumer_groups<'a>(
        &'a self,
        hub: &'a EventHub,
    ) -> BackendFuture<'a, Vec<ConsumerGroup>, Self::Error> {
        Box::pin(async move {
            let call = ManagerCall::ListConsumerGroups {
                hub: hub.id.clone(),
            };
            self.call(call, |state| {
                state
                    .consumer_groups
                    .iter()
                    .filter(|group| hub.id.is_ancestor_of(&group.id))
                    .cloned()
                    .collect()
            })
            .await
        })
    }

    fn list_event_hubs<'a>(
        &'a self,
        namespace: &'a Namespace,
    ) -> BackendFuture<'a, Vec<EventHub>, Self::Error> {
        Box::pin(async move {
            let call = ManagerCall::ListEventHubs {
                namespace: namespace.id.clone(),
            };
            self.call(call, |state| {
                state
                    .event_hubs
                    .iter()
                    .filter(|hub| namespace.id.is_ancestor_of(&hub.id))
                    .cloned()
                    .collect()
            })
            .await
        })
    }

    fn delete_resource_group<'a>(
        &'a self,
        group: &'a ResourceId,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let call = ManagerCall::DeleteResourceGroup {
                group: group.clone(),
            };
            self.call(call, |state| {
                state.groups.retain(|existing| existing.id != *group);
                state.event_hubs.retain(|hub| !group.is_ancestor_of(&hub.id));
                state
                    .consumer_groups
                    .retain(|consumer| !group.is_ancestor_of(&consumer.id));
                state
                    .other_resources
                    .retain(|id| !group.is_ancestor_of(id));
            })
            .await
        })
    }
}
