//! Wire shapes for Resource Manager requests and responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{
    AccessRight, CaptureDescription, CaptureDestination, CaptureEncoding, Region, ResourceId,
};

use super::AzureBackendError;

pub(crate) const STORAGE_SKU: &str = "Standard_LRS";
pub(crate) const STORAGE_KIND: &str = "StorageV2";

#[derive(Debug, Serialize)]
pub(crate) struct ResourceGroupBody<'a> {
    pub(crate) location: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct Sku<'a> {
    pub(crate) name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tier: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NamespaceBody<'a> {
    pub(crate) location: &'a str,
    pub(crate) sku: Sku<'a>,
}

impl<'a> NamespaceBody<'a> {
    pub(crate) const fn new(region: &'a Region, sku: &'a str) -> Self {
        Self {
            location: region.as_str(),
            sku: Sku {
                name: sku,
                tier: Some(sku),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StorageAccountBody<'a> {
    pub(crate) sku: Sku<'a>,
    pub(crate) kind: &'a str,
    pub(crate) location: &'a str,
}

impl<'a> StorageAccountBody<'a> {
    pub(crate) const fn new(region: &'a Region) -> Self {
        Self {
            sku: Sku {
                name: STORAGE_SKU,
                tier: None,
            },
            kind: STORAGE_KIND,
            location: region.as_str(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct EmptyProperties {}

#[derive(Debug, Default, Serialize)]
pub(crate) struct BlobContainerBody {
    pub(crate) properties: EmptyProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CaptureDestinationProperties<'a> {
    pub(crate) storage_account_resource_id: &'a str,
    pub(crate) blob_container: &'a str,
    pub(crate) archive_name_format: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CaptureDestinationBody<'a> {
    pub(crate) name: &'a str,
    pub(crate) properties: CaptureDestinationProperties<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CaptureBody<'a> {
    pub(crate) enabled: bool,
    pub(crate) encoding: &'a str,
    pub(crate) destination: CaptureDestinationBody<'a>,
}

impl<'a> From<&'a CaptureDescription> for CaptureBody<'a> {
    fn from(capture: &'a CaptureDescription) -> Self {
        Self {
            enabled: capture.enabled,
            encoding: capture.encoding.as_str(),
            destination: CaptureDestinationBody {
                name: &capture.destination.name,
                properties: CaptureDestinationProperties {
                    storage_account_resource_id: capture.destination.storage_account_id.as_str(),
                    blob_container: &capture.destination.blob_container,
                    archive_name_format: &capture.destination.archive_name_format,
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventHubProperties<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) capture_description: Option<CaptureBody<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EventHubBody<'a> {
    pub(crate) properties: EventHubProperties<'a>,
}

impl<'a> EventHubBody<'a> {
    pub(crate) fn new(capture: Option<&'a CaptureDescription>) -> Self {
        Self {
            properties: EventHubProperties {
                capture_description: capture.map(CaptureBody::from),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConsumerGroupProperties<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) user_metadata: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ConsumerGroupBody<'a> {
    pub(crate) properties: ConsumerGroupProperties<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AuthorizationRuleProperties {
    pub(crate) rights: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AuthorizationRuleBody {
    pub(crate) properties: AuthorizationRuleProperties,
}

impl AuthorizationRuleBody {
    pub(crate) fn new(rights: &[AccessRight]) -> Self {
        Self {
            properties: AuthorizationRuleProperties {
                rights: rights.iter().map(|right| right.as_str()).collect(),
            },
        }
    }
}

/// `{"error": {"code", "message"}}` envelope of a failed request.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(default)]
    pub(crate) error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub(crate) code: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

impl ErrorEnvelope {
    /// Extracts `(code, message)` from a response body, falling back to the
    /// raw text when the body is not the usual envelope.
    pub(crate) fn describe(text: &str) -> (String, String) {
        let envelope: Self = serde_json::from_str(text).unwrap_or_default();
        let code = envelope
            .error
            .code
            .unwrap_or_else(|| String::from("Unknown"));
        let message = envelope.error.message.unwrap_or_else(|| {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                String::from("no response body")
            } else {
                trimmed.to_owned()
            }
        });
        (code, message)
    }
}

/// Fields shared by every Resource Manager resource body.
#[derive(Debug, Deserialize)]
pub(crate) struct ArmResource {
    pub(crate) id: String,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) location: Option<String>,
    #[serde(default)]
    pub(crate) properties: Value,
}

impl ArmResource {
    pub(crate) fn parse(body: Value) -> Result<Self, AzureBackendError> {
        Ok(serde_json::from_value(body)?)
    }

    pub(crate) fn resource_id(&self) -> Result<ResourceId, AzureBackendError> {
        Ok(ResourceId::parse(self.id.as_str())?)
    }

    /// Region reported by the service, or `fallback` when absent.
    pub(crate) fn region_or(&self, fallback: &Region) -> Region {
        self.location
            .as_deref()
            .map_or_else(|| fallback.clone(), Region::new)
    }

    pub(crate) fn user_metadata(&self) -> Option<String> {
        self.properties
            .get("userMetadata")
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    /// Access rights, skipping values this crate does not model.
    pub(crate) fn rights(&self) -> Vec<AccessRight> {
        self.properties
            .get("rights")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(AccessRight::from_wire)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn capture(&self) -> Result<Option<CaptureDescription>, AzureBackendError> {
        let Some(raw) = self.properties.get("captureDescription") else {
            return Ok(None);
        };
        if raw.is_null() {
            return Ok(None);
        }
        let wire: WireCapture = serde_json::from_value(raw.clone())?;
        wire.into_model().map(Some)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCapture {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    encoding: Option<String>,
    destination: WireDestination,
}

#[derive(Debug, Deserialize)]
struct WireDestination {
    name: String,
    properties: WireDestinationProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDestinationProperties {
    storage_account_resource_id: String,
    blob_container: String,
    #[serde(default)]
    archive_name_format: Option<String>,
}

impl WireCapture {
    fn into_model(self) -> Result<CaptureDescription, AzureBackendError> {
        let encoding = self
            .encoding
            .as_deref()
            .map_or(Some(CaptureEncoding::default()), CaptureEncoding::from_wire)
            .ok_or_else(|| {
                AzureBackendError::Decode(format!(
                    "unknown capture encoding: {}",
                    self.encoding.as_deref().unwrap_or_default()
                ))
            })?;
        let properties = self.destination.properties;
        Ok(CaptureDescription {
            enabled: self.enabled,
            encoding,
            destination: CaptureDestination {
                name: self.destination.name,
                storage_account_id: ResourceId::parse(properties.storage_account_resource_id)?,
                blob_container: properties.blob_container,
                archive_name_format: properties
                    .archive_name_format
                    .unwrap_or_else(|| String::from(crate::model::DEFAULT_ARCHIVE_NAME_FORMAT)),
            },
        })
    }
}
