//! Resource Manager list pages.

use serde::Deserialize;
use serde_json::Value;

use super::AzureBackendError;

/// One page of a list response: `{ "value": [...], "nextLink": "..." }`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Page {
    #[serde(default)]
    pub(crate) value: Vec<Value>,
    #[serde(default, rename = "nextLink")]
    next_link: Option<String>,
}

impl Page {
    pub(crate) fn parse(body: Value) -> Result<Self, AzureBackendError> {
        if body.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(body)?)
    }

    /// Link to the following page. Blank links end the listing.
    pub(crate) fn next_link(&self) -> Option<&str> {
        self.next_link
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())
    }
}

/// Tracks visited page links so a service that repeats a `nextLink` cannot
/// keep a listing alive forever.
#[derive(Debug, Default)]
pub(crate) struct PageCursor {
    visited: Vec<String>,
}

impl PageCursor {
    /// Records `page`'s successor and returns it, or `None` at the end.
    pub(crate) fn advance(&mut self, page: &Page) -> Result<Option<String>, AzureBackendError> {
        let Some(link) = page.next_link() else {
            return Ok(None);
        };
        if self.visited.iter().any(|seen| seen == link) {
            return Err(AzureBackendError::Decode(format!(
                "pagination returned a link twice: {link}"
            )));
        }
        self.visited.push(link.to_owned());
        Ok(Some(link.to_owned()))
    }
}
