//! Orchestrates the Event Hubs provisioning walkthrough.
//!
//! A run creates a resource group, builds the namespace, storage, Event Hub,
//! consumer group and authorization rule inside it, lists what it created,
//! and finally deletes the resource group. Deletion is attempted on every
//! exit path once the group exists: after success, after a failed step, and
//! after a shutdown request. A failed deletion is logged and reported but
//! never replaces the outcome of the run itself.

mod plan;

use std::fmt;
use std::future::{self, Future};

use thiserror::Error;
use tracing::{error, info};

use crate::backend::ResourceManager;
use crate::model::{
    AuthorizationRule, BlobContainer, CaptureDescription, CaptureDestination, ConsumerGroup,
    EventHub, Namespace, ResourceGroup, ResourceId, StorageAccount,
};

pub use plan::{
    AUTHORIZATION_RULE_NAME, BLOB_CONTAINER_NAME, CONSUMER_GROUP_METADATA, CONSUMER_GROUP_NAME,
    ProvisionPlan,
};

/// Individual remote operations of a run, in execution order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProvisionStep {
    /// Create the resource group.
    CreateResourceGroup,
    /// Create the Event Hubs namespace.
    CreateNamespace,
    /// Create the storage account.
    CreateStorageAccount,
    /// Fetch the storage account's blob service.
    GetBlobService,
    /// Create the capture container.
    CreateBlobContainer,
    /// Create the capture-enabled Event Hub.
    CreateEventHub,
    /// Create the consumer group.
    CreateConsumerGroup,
    /// Create the authorization rule.
    CreateAuthorizationRule,
    /// List consumer groups of the first Event Hub.
    ListConsumerGroups,
    /// Create the second Event Hub.
    CreateSecondEventHub,
    /// List Event Hubs of the namespace.
    ListEventHubs,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CreateResourceGroup => "create resource group",
            Self::CreateNamespace => "create namespace",
            Self::CreateStorageAccount => "create storage account",
            Self::GetBlobService => "fetch blob service",
            Self::CreateBlobContainer => "create blob container",
            Self::CreateEventHub => "create event hub with capture",
            Self::CreateConsumerGroup => "create consumer group",
            Self::CreateAuthorizationRule => "create authorization rule",
            Self::ListConsumerGroups => "list consumer groups",
            Self::CreateSecondEventHub => "create second event hub",
            Self::ListEventHubs => "list event hubs",
        };
        f.write_str(text)
    }
}

/// Resources created and observed by a successful run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionSummary {
    /// Root resource group.
    pub resource_group: ResourceGroup,
    /// Event Hubs namespace.
    pub namespace: Namespace,
    /// Capture storage account.
    pub storage_account: StorageAccount,
    /// Capture container.
    pub blob_container: BlobContainer,
    /// Capture-enabled Event Hub.
    pub primary_event_hub: EventHub,
    /// Consumer group on the primary Event Hub.
    pub consumer_group: ConsumerGroup,
    /// Authorization rule on the primary Event Hub.
    pub authorization_rule: AuthorizationRule,
    /// Second Event Hub.
    pub secondary_event_hub: EventHub,
    /// Consumer groups listed on the primary Event Hub.
    pub consumer_groups: Vec<ConsumerGroup>,
    /// Event Hubs listed in the namespace.
    pub event_hubs: Vec<EventHub>,
}

/// Result of the resource group deletion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CleanupOutcome {
    /// The resource group and everything inside it was deleted.
    Deleted,
    /// Deletion failed; resources may remain.
    Failed {
        /// Description of the deletion failure.
        message: String,
    },
}

impl CleanupOutcome {
    /// Returns `true` when the resource group was deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    fn failure(&self) -> Option<String> {
        match self {
            Self::Deleted => None,
            Self::Failed { message } => Some(message.clone()),
        }
    }
}

fn teardown_note(teardown: Option<&str>) -> String {
    teardown.map_or_else(String::new, |message| {
        format!(" (teardown also failed: {message})")
    })
}

/// Outcome of a run whose creation sequence completed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionReport {
    /// What was created and listed.
    pub summary: ProvisionSummary,
    /// Whether the final deletion succeeded.
    pub cleanup: CleanupOutcome,
}

/// Errors surfaced by a provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError<ManagerError>
where
    ManagerError: std::error::Error + 'static,
{
    /// Raised when the resource group cannot be created. Nothing exists
    /// yet, so no cleanup is attempted.
    #[error("failed to create resource group")]
    ResourceGroup(#[source] ManagerError),
    /// Raised when a step inside the resource group fails. Cleanup has
    /// already run; a cleanup failure is kept in `teardown`.
    #[error("failed to {step}{}", teardown_note(.teardown.as_deref()))]
    Step {
        /// Step that failed.
        step: ProvisionStep,
        /// Resource group deletion failure, if deletion also failed.
        teardown: Option<String>,
        /// Provider error raised by the step.
        #[source]
        source: ManagerError,
    },
    /// Raised when shutdown was requested before the sequence finished.
    /// Cleanup has already run.
    #[error(
        "provisioning cancelled by shutdown request{}",
        teardown_note(.teardown.as_deref())
    )]
    Cancelled {
        /// Resource group deletion failure, if deletion also failed.
        teardown: Option<String>,
    },
}

impl<ManagerError> ProvisionError<ManagerError>
where
    ManagerError: std::error::Error + 'static,
{
    /// Step at which the run stopped, when it stopped at one.
    #[must_use]
    pub const fn step(&self) -> Option<ProvisionStep> {
        match self {
            Self::ResourceGroup(_) => Some(ProvisionStep::CreateResourceGroup),
            Self::Step { step, .. } => Some(*step),
            Self::Cancelled { .. } => None,
        }
    }
}

struct StepFailure<E> {
    step: ProvisionStep,
    source: E,
}

enum BodyFailure<E> {
    Step(StepFailure<E>),
    Cancelled,
}

fn at<E>(step: ProvisionStep) -> impl FnOnce(E) -> StepFailure<E> {
    move |source| StepFailure { step, source }
}

/// Runs the provisioning sequence against a [`ResourceManager`].
#[derive(Debug)]
pub struct ProvisionOrchestrator<M> {
    manager: M,
}

impl<M> ProvisionOrchestrator<M>
where
    M: ResourceManager,
{
    /// Creates a new orchestrator.
    #[must_use]
    pub const fn new(manager: M) -> Self {
        Self { manager }
    }

    /// Runs the whole sequence with no shutdown source.
    ///
    /// # Errors
    ///
    /// See [`ProvisionOrchestrator::execute_until`].
    pub async fn execute(
        &self,
        plan: &ProvisionPlan,
    ) -> Result<ProvisionReport, ProvisionError<M::Error>> {
        self.execute_until(plan, future::pending()).await
    }

    /// Runs the whole sequence, stopping early when `shutdown` resolves.
    ///
    /// Once the resource group exists it is deleted before this returns,
    /// whatever happened in between. A deletion failure after a successful
    /// sequence is reported through [`ProvisionReport::cleanup`] rather than
    /// as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ResourceGroup`] when the group cannot be
    /// created, [`ProvisionError::Step`] when a later step fails, and
    /// [`ProvisionError::Cancelled`] when `shutdown` resolves first.
    pub async fn execute_until<F>(
        &self,
        plan: &ProvisionPlan,
        shutdown: F,
    ) -> Result<ProvisionReport, ProvisionError<M::Error>>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(name = %plan.resource_group, region = %plan.region, "creating resource group");
        let group = self
            .manager
            .create_resource_group(&plan.resource_group, &plan.region)
            .await
            .map_err(ProvisionError::ResourceGroup)?;
        info!(id = %group.id, "created resource group");

        let body = tokio::select! {
            biased;
            () = &mut shutdown => Err(BodyFailure::Cancelled),
            result = self.provision_within(&group, plan) => result.map_err(BodyFailure::Step),
        };

        let cleanup = self.release(&group.id).await;

        match body {
            Ok(summary) => Ok(ProvisionReport { summary, cleanup }),
            Err(BodyFailure::Step(StepFailure { step, source })) => {
                error!(%step, error = %source, "provisioning step failed");
                Err(ProvisionError::Step {
                    step,
                    teardown: cleanup.failure(),
                    source,
                })
            }
            Err(BodyFailure::Cancelled) => Err(ProvisionError::Cancelled {
                teardown: cleanup.failure(),
            }),
        }
    }

    /// Deletes a resource group, logging the outcome instead of raising it.
    pub async fn release(&self, group: &ResourceId) -> CleanupOutcome {
        info!(id = %group, "deleting resource group");
        match self.manager.delete_resource_group(group).await {
            Ok(()) => {
                info!(id = %group, "deleted resource group");
                CleanupOutcome::Deleted
            }
            Err(err) => {
                error!(id = %group, error = %err, "failed to delete resource group");
                CleanupOutcome::Failed {
                    message: err.to_string(),
                }
            }
        }
    }

    async fn provision_within(
        &self,
        group: &ResourceGroup,
        plan: &ProvisionPlan,
    ) -> Result<ProvisionSummary, StepFailure<M::Error>> {
        info!(name = %plan.namespace, "creating a namespace");
        let namespace = self
            .manager
            .create_namespace(group, &plan.namespace, &plan.region)
            .await
            .map_err(at(ProvisionStep::CreateNamespace))?;
        info!(id = %namespace.id, "created a namespace");

        let (storage_account, blob_container) = self.create_capture_storage(group, plan).await?;

        info!(name = %plan.primary_event_hub, "creating an event hub with data capture enabled");
        let capture = CaptureDescription::avro(CaptureDestination::block_blob(
            &storage_account,
            &blob_container,
        ));
        let primary_event_hub = self
            .manager
            .create_event_hub(&namespace, &plan.primary_event_hub, Some(&capture))
            .await
            .map_err(at(ProvisionStep::CreateEventHub))?;
        info!(id = %primary_event_hub.id, "created an event hub");

        let consumer_group = self
            .manager
            .create_consumer_group(
                &primary_event_hub,
                &plan.consumer_group,
                Some(plan.consumer_group_metadata.as_str()),
            )
            .await
            .map_err(at(ProvisionStep::CreateConsumerGroup))?;
        info!(id = %consumer_group.id, "created a consumer group");

        let authorization_rule = self
            .manager
            .create_authorization_rule(
                &primary_event_hub,
                &plan.authorization_rule,
                &plan.authorization_rights,
            )
            .await
            .map_err(at(ProvisionStep::CreateAuthorizationRule))?;
        info!(id = %authorization_rule.id, "created an authorization rule");

        info!("retrieving consumer groups");
        let consumer_groups = self
            .manager
            .list_consumer_groups(&primary_event_hub)
            .await
            .map_err(at(ProvisionStep::ListConsumerGroups))?;
        info!(count = consumer_groups.len(), "retrieved consumer groups");
        for listed in &consumer_groups {
            info!(name = %listed.name, "consumer group");
        }

        info!(name = %plan.secondary_event_hub, "creating a second event hub in same namespace");
        let secondary_event_hub = self
            .manager
            .create_event_hub(&namespace, &plan.secondary_event_hub, None)
            .await
            .map_err(at(ProvisionStep::CreateSecondEventHub))?;
        info!(id = %secondary_event_hub.id, "created an event hub");

        let event_hubs = self
            .manager
            .list_event_hubs(&namespace)
            .await
            .map_err(at(ProvisionStep::ListEventHubs))?;
        for listed in &event_hubs {
            info!(name = %listed.name, "event hub");
        }

        Ok(ProvisionSummary {
            resource_group: group.clone(),
            namespace,
            storage_account,
            blob_container,
            primary_event_hub,
            consumer_group,
            authorization_rule,
            secondary_event_hub,
            consumer_groups,
            event_hubs,
        })
    }

    async fn create_capture_storage(
        &self,
        group: &ResourceGroup,
        plan: &ProvisionPlan,
    ) -> Result<(StorageAccount, BlobContainer), StepFailure<M::Error>> {
        info!(name = %plan.storage_account, region = %plan.storage_region, "creating a storage account");
        let account = self
            .manager
            .create_storage_account(group, &plan.storage_account, &plan.storage_region)
            .await
            .map_err(at(ProvisionStep::CreateStorageAccount))?;
        info!(id = %account.id, "created a storage account");

        let service = self
            .manager
            .get_blob_service(&account)
            .await
            .map_err(at(ProvisionStep::GetBlobService))?;
        let container = self
            .manager
            .create_blob_container(&service, &plan.blob_container)
            .await
            .map_err(at(ProvisionStep::CreateBlobContainer))?;
        info!(id = %container.id, "created a blob container");

        Ok((account, container))
    }
}
