//! Azure Resource Manager implementation of [`ResourceManager`].
//!
//! Requests are plain REST calls against the management endpoint signed with
//! a bearer token from `azure_identity`. Every mutating call is followed to
//! its terminal state before the future resolves.

mod auth;
mod error;
mod lro;
mod paging;
mod retry;
mod types;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use azure_core::credentials::TokenCredential;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::backend::{BackendFuture, ResourceManager};
use crate::config::AzureConfig;
use crate::model::{
    AccessRight, AuthorizationRule, BlobContainer, BlobService, CaptureDescription, ConsumerGroup,
    EventHub, Namespace, Region, ResourceGroup, ResourceId, StorageAccount,
};
use lro::{OperationStatus, PollTarget};
use paging::{Page, PageCursor};
use types::{
    ArmResource, AuthorizationRuleBody, BlobContainerBody, ConsumerGroupBody,
    ConsumerGroupProperties, ErrorEnvelope, EventHubBody, NamespaceBody, ResourceGroupBody,
    StorageAccountBody,
};

pub use auth::build_credential;
pub use error::AzureBackendError;
pub use retry::RetryPolicy;

/// `api-version` for resource groups.
pub const RESOURCES_API_VERSION: &str = "2021-04-01";
/// `api-version` for Event Hubs namespaces and their children.
pub const EVENT_HUB_API_VERSION: &str = "2024-01-01";
/// `api-version` for storage accounts and blob containers.
pub const STORAGE_API_VERSION: &str = "2023-05-01";

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const NAMESPACES: &str = "providers/Microsoft.EventHub/namespaces";
const STORAGE_ACCOUNTS: &str = "providers/Microsoft.Storage/storageAccounts";

/// Response of a successful request with its body already read.
#[derive(Debug)]
struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

/// Resource manager talking to Azure Resource Manager.
#[derive(Clone)]
pub struct AzureResourceManager {
    http: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    endpoint: String,
    scope: String,
    subscription_id: String,
    namespace_sku: String,
    poll_interval: Duration,
    operation_timeout: Duration,
    retry: RetryPolicy,
}

impl fmt::Debug for AzureResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureResourceManager")
            .field("endpoint", &self.endpoint)
            .field("subscription_id", &self.subscription_id)
            .field("namespace_sku", &self.namespace_sku)
            .field("poll_interval", &self.poll_interval)
            .field("operation_timeout", &self.operation_timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl AzureResourceManager {
    /// Constructs a manager from validated configuration and a credential.
    ///
    /// # Errors
    ///
    /// Returns [`AzureBackendError::Config`] when the configuration fails
    /// validation and [`AzureBackendError::Request`] when the HTTP client
    /// cannot be built.
    pub fn new(
        config: &AzureConfig,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self, AzureBackendError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| AzureBackendError::Request(err.to_string()))?;
        let endpoint = config.endpoint().to_owned();
        Ok(Self {
            http,
            credential,
            scope: auth::management_scope(&endpoint),
            endpoint,
            subscription_id: config.subscription_id.trim().to_owned(),
            namespace_sku: config.namespace_sku.trim().to_owned(),
            poll_interval: config.poll_interval(),
            operation_timeout: config.operation_timeout(),
            retry: RetryPolicy::with_max_retries(config.max_retries),
        })
    }

    /// Constructs a manager, picking the credential from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AzureBackendError::Config`] for invalid configuration and
    /// [`AzureBackendError::Credential`] when no credential can be built.
    pub fn from_config(config: &AzureConfig) -> Result<Self, AzureBackendError> {
        config.validate()?;
        let credential = build_credential(config)?;
        Self::new(config, credential)
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Subscription receiving every resource.
    #[must_use]
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn resource_url(&self, id: &ResourceId, api_version: &str) -> String {
        format!("{}{id}?api-version={api_version}", self.endpoint)
    }

    fn collection_url(&self, parent: &ResourceId, segment: &str, api_version: &str) -> String {
        format!(
            "{}{parent}/{segment}?api-version={api_version}",
            self.endpoint
        )
    }

    /// Refuses URLs outside the management endpoint. Monitor and `nextLink`
    /// URLs come from the service and must not receive the bearer token
    /// when they point elsewhere.
    fn ensure_on_endpoint(&self, url: &str) -> Result<(), AzureBackendError> {
        let on_endpoint = url
            .strip_prefix(self.endpoint.as_str())
            .is_some_and(|rest| rest.starts_with('/'));
        if on_endpoint {
            Ok(())
        } else {
            Err(AzureBackendError::ForeignUrl {
                url: url.to_owned(),
                endpoint: self.endpoint.clone(),
            })
        }
    }

    /// Latest instant a long-running `action` on `id` may finish by.
    fn deadline(&self, id: &ResourceId, action: &str) -> Result<Instant, AzureBackendError> {
        Instant::now()
            .checked_add(self.operation_timeout)
            .ok_or_else(|| timeout(id, action))
    }

    async fn bearer_token(&self) -> Result<String, AzureBackendError> {
        let token = self
            .credential
            .get_token(&[self.scope.as_str()], None)
            .await?;
        Ok(token.token.secret().to_owned())
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Reply, AzureBackendError> {
        self.ensure_on_endpoint(url)?;
        let token = self.bearer_token().await?;
        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(payload) = body {
            request = request.json(payload);
        }
        let response = request
            .send()
            .await
            .map_err(|err| AzureBackendError::from_transport(&err))?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response
            .text()
            .await
            .map_err(|err| AzureBackendError::from_transport(&err))?;

        if !status.is_success() {
            let (code, message) = ErrorEnvelope::describe(&text);
            return Err(AzureBackendError::Api {
                status: status.as_u16(),
                code,
                message,
                retry_after: lro::retry_after(&headers),
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok(Reply {
            status,
            headers,
            body,
        })
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Reply, AzureBackendError> {
        let action = method.as_str().to_owned();
        self.retry
            .run(&action, || self.send_once(method.clone(), url, body))
            .await
    }

    async fn get_json(&self, url: &str) -> Result<Value, AzureBackendError> {
        Ok(self.send(Method::GET, url, None).await?.body)
    }

    /// Creates or updates a resource and returns its final representation.
    async fn put_resource<B: Serialize + Sync>(
        &self,
        id: &ResourceId,
        api_version: &str,
        body: &B,
    ) -> Result<ArmResource, AzureBackendError> {
        let url = self.resource_url(id, api_version);
        let payload = serde_json::to_value(body)?;
        let deadline = self.deadline(id, "create")?;
        debug!(resource = %id, "PUT");
        let reply = self.send(Method::PUT, &url, Some(&payload)).await?;

        let representation = if self.await_poll_target(&reply, id, "create", deadline).await? {
            self.get_json(&url).await?
        } else {
            reply.body
        };
        let settled = self
            .await_provisioning(&url, id, representation, deadline)
            .await?;
        ArmResource::parse(settled)
    }

    async fn get_resource(
        &self,
        id: &ResourceId,
        api_version: &str,
    ) -> Result<ArmResource, AzureBackendError> {
        let body = self.get_json(&self.resource_url(id, api_version)).await?;
        ArmResource::parse(body)
    }

    async fn delete_resource(
        &self,
        id: &ResourceId,
        api_version: &str,
    ) -> Result<(), AzureBackendError> {
        let url = self.resource_url(id, api_version);
        let deadline = self.deadline(id, "delete")?;
        debug!(resource = %id, "DELETE");
        let reply = self.send(Method::DELETE, &url, None).await?;
        self.await_poll_target(&reply, id, "delete", deadline)
            .await?;
        Ok(())
    }

    /// Reads every page of a collection.
    async fn list_collection(&self, first: String) -> Result<Vec<ArmResource>, AzureBackendError> {
        let mut cursor = PageCursor::default();
        let mut items = Vec::new();
        let mut next = Some(first);
        while let Some(url) = next {
            let page = Page::parse(self.get_json(&url).await?)?;
            next = cursor.advance(&page)?;
            for value in page.value {
                items.push(ArmResource::parse(value)?);
            }
        }
        Ok(items)
    }

    /// Follows the polling target advertised by `reply`, if any. Returns
    /// `true` when polling took place.
    async fn await_poll_target(
        &self,
        reply: &Reply,
        id: &ResourceId,
        action: &str,
        deadline: Instant,
    ) -> Result<bool, AzureBackendError> {
        let Some(target) = lro::poll_target(&reply.headers) else {
            return Ok(false);
        };
        if reply.status != StatusCode::ACCEPTED && reply.status != StatusCode::CREATED {
            // 200 and 204 are final even when a monitor is advertised.
            return Ok(false);
        }
        let mut wait = lro::retry_after(&reply.headers).unwrap_or(self.poll_interval);
        loop {
            self.sleep_before_poll(wait, deadline, id, action).await?;
            match &target {
                PollTarget::AsyncOperation(url) => {
                    let poll = self.send(Method::GET, url, None).await?;
                    match lro::async_operation_status(&poll.body) {
                        OperationStatus::Succeeded => return Ok(true),
                        status @ (OperationStatus::Failed | OperationStatus::Canceled) => {
                            return Err(operation_failed(id, action, status, &poll.body));
                        }
                        OperationStatus::InProgress => {
                            wait = lro::retry_after(&poll.headers).unwrap_or(self.poll_interval);
                        }
                    }
                }
                PollTarget::Location(url) => {
                    let poll = self.send(Method::GET, url, None).await?;
                    if lro::location_done(poll.status) {
                        return Ok(true);
                    }
                    wait = lro::retry_after(&poll.headers).unwrap_or(self.poll_interval);
                }
            }
        }
    }

    /// Polls the resource until `properties.provisioningState` is terminal.
    async fn await_provisioning(
        &self,
        url: &str,
        id: &ResourceId,
        mut body: Value,
        deadline: Instant,
    ) -> Result<Value, AzureBackendError> {
        loop {
            match lro::provisioning_state(&body) {
                None | Some(OperationStatus::Succeeded) => return Ok(body),
                Some(status @ (OperationStatus::Failed | OperationStatus::Canceled)) => {
                    return Err(operation_failed(id, "create", status, &body));
                }
                Some(OperationStatus::InProgress) => {
                    self.sleep_before_poll(self.poll_interval, deadline, id, "create")
                        .await?;
                    body = self.get_json(url).await?;
                }
            }
        }
    }

    async fn sleep_before_poll(
        &self,
        wait: Duration,
        deadline: Instant,
        id: &ResourceId,
        action: &str,
    ) -> Result<(), AzureBackendError> {
        if deadline.saturating_duration_since(Instant::now()) < wait {
            return Err(timeout(id, action));
        }
        debug!(resource = %id, action, ?wait, "operation still running");
        sleep(wait).await;
        Ok(())
    }
}

fn event_hub(resource: ArmResource) -> Result<EventHub, AzureBackendError> {
    Ok(EventHub {
        id: resource.resource_id()?,
        capture: resource.capture()?,
        name: resource.name,
    })
}

fn consumer_group(resource: ArmResource) -> Result<ConsumerGroup, AzureBackendError> {
    Ok(ConsumerGroup {
        id: resource.resource_id()?,
        user_metadata: resource.user_metadata(),
        name: resource.name,
    })
}

fn timeout(id: &ResourceId, action: &str) -> AzureBackendError {
    AzureBackendError::Timeout {
        action: action.to_owned(),
        resource: id.to_string(),
    }
}

fn operation_failed(
    id: &ResourceId,
    action: &str,
    status: OperationStatus,
    body: &Value,
) -> AzureBackendError {
    AzureBackendError::OperationFailed {
        action: action.to_owned(),
        resource: id.to_string(),
        status: status.to_string(),
        message: lro::failure_message(body),
    }
}

impl ResourceManager for AzureResourceManager {
    type Error = AzureBackendError;

    fn create_resource_group<'a>(
        &'a self,
        name: &'a str,
        region: &'a Region,
    ) -> BackendFuture<'a, ResourceGroup, Self::Error> {
        Box::pin(async move {
            let id = ResourceId::resource_group(&self.subscription_id, name);
            let body = ResourceGroupBody {
                location: region.as_str(),
            };
            let resource = self.put_resource(&id, RESOURCES_API_VERSION, &body).await?;
            info!(resource_group = %resource.name, "resource group ready");
            Ok(ResourceGroup {
                id: resource.resource_id()?,
                region: resource.region_or(region),
                name: resource.name,
            })
        })
    }

    fn create_namespace<'a>(
        &'a self,
        group: &'a ResourceGroup,
        name: &'a str,
        region: &'a Region,
    ) -> BackendFuture<'a, Namespace, Self::Error> {
        Box::pin(async move {
            let id = group.id.child(NAMESPACES, name);
            let body = NamespaceBody::new(region, &self.namespace_sku);
            let resource = self.put_resource(&id, EVENT_HUB_API_VERSION, &body).await?;
            Ok(Namespace {
                id: resource.resource_id()?,
                region: resource.region_or(region),
                name: resource.name,
            })
        })
    }

    fn create_storage_account<'a>(
        &'a self,
        group: &'a ResourceGroup,
        name: &'a str,
        region: &'a Region,
    ) -> BackendFuture<'a, StorageAccount, Self::Error> {
        Box::pin(async move {
            let id = group.id.child(STORAGE_ACCOUNTS, name);
            let body = StorageAccountBody::new(region);
            let resource = self.put_resource(&id, STORAGE_API_VERSION, &body).await?;
            Ok(StorageAccount {
                id: resource.resource_id()?,
                region: resource.region_or(region),
                name: resource.name,
            })
        })
    }

    fn get_blob_service<'a>(
        &'a self,
        account: &'a StorageAccount,
    ) -> BackendFuture<'a, BlobService, Self::Error> {
        Box::pin(async move {
            let id = account.id.child("blobServices", "default");
            let resource = self.get_resource(&id, STORAGE_API_VERSION).await?;
            Ok(BlobService {
                id: resource.resource_id()?,
            })
        })
    }

    fn create_blob_container<'a>(
        &'a self,
        service: &'a BlobService,
        name: &'a str,
    ) -> BackendFuture<'a, BlobContainer, Self::Error> {
        Box::pin(async move {
            let id = service.id.child("containers", name);
            let resource = self
                .put_resource(&id, STORAGE_API_VERSION, &BlobContainerBody::default())
                .await?;
            Ok(BlobContainer {
                id: resource.resource_id()?,
                name: resource.name,
            })
        })
    }

    fn create_event_hub<'a>(
        &'a self,
        namespace: &'a Namespace,
        name: &'a str,
        capture: Option<&'a CaptureDescription>,
    ) -> BackendFuture<'a, EventHub, Self::Error> {
        Box::pin(async move {
            let id = namespace.id.child("eventhubs", name);
            let body = EventHubBody::new(capture);
            let resource = self.put_resource(&id, EVENT_HUB_API_VERSION, &body).await?;
            event_hub(resource)
        })
    }

    fn create_consumer_group<'a>(
        &'a self,
        hub: &'a EventHub,
        name: &'a str,
        user_metadata: Option<&'a str>,
    ) -> BackendFuture<'a, ConsumerGroup, Self::Error> {
        Box::pin(async move {
            let id = hub.id.child("consumergroups", name);
            let body = ConsumerGroupBody {
                properties: ConsumerGroupProperties { user_metadata },
            };
            let resource = self.put_resource(&id, EVENT_HUB_API_VERSION, &body).await?;
            consumer_group(resource)
        })
    }

    fn create_authorization_rule<'a>(
        &'a self,
        hub: &'a EventHub,
        name: &'a str,
        rights: &'a [AccessRight],
    ) -> BackendFuture<'a, AuthorizationRule, Self::Error> {
        Box::pin(async move {
            let id = hub.id.child("authorizationRules", name);
            let body = AuthorizationRuleBody::new(rights);
            let resource = self.put_resource(&id, EVENT_HUB_API_VERSION, &body).await?;
            Ok(AuthorizationRule {
                id: resource.resource_id()?,
                rights: resource.rights(),
                name: resource.name,
            })
        })
    }

    fn list_consumer_groups<'a>(
        &'a self,
        hub: &'a EventHub,
    ) -> BackendFuture<'a, Vec<ConsumerGroup>, Self::Error> {
        Box::pin(async move {
            let url = self.collection_url(&hub.id, "consumergroups", EVENT_HUB_API_VERSION);
            self.list_collection(url)
                .await?
                .into_iter()
                .map(consumer_group)
                .collect()
        })
    }

    fn list_event_hubs<'a>(
        &'a self,
        namespace: &'a Namespace,
    ) -> BackendFuture<'a, Vec<EventHub>, Self::Error> {
        Box::pin(async move {
            let url = self.collection_url(&namespace.id, "eventhubs", EVENT_HUB_API_VERSION);
            self.list_collection(url)
                .await?
                .into_iter()
                .map(event_hub)
                .collect()
        })
    }

    fn delete_resource_group<'a>(
        &'a self,
        group: &'a ResourceId,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move { self.delete_resource(group, RESOURCES_API_VERSION).await })
    }
}

#[cfg(test)]
mod http_stub;
