use serde::{Deserialize, Serialize};

use super::session::SessionRecord;

/// Hydra pagination block (`hydra:view`) of a collection response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageView {
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "hydra:first", default, skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    #[serde(rename = "hydra:last", default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
    #[serde(rename = "hydra:previous", default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(rename = "hydra:next", default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// One page of `/sessions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPage {
    #[serde(rename = "hydra:member", default)]
    pub members: Vec<SessionRecord>,
    #[serde(
        rename = "hydra:totalItems",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub total_items: Option<u64>,
    #[serde(rename = "hydra:view", default, skip_serializing_if = "Option::is_none")]
    pub view: Option<PageView>,
}

impl SessionPage {
    /// Continuation reference; `None` (or an empty string) ends pagination.
    pub fn next_reference(&self) -> Option<&str> {
        self.view
            .as_ref()
            .and_then(|v| v.next.as_deref())
            .filter(|r| !r.is_empty())
    }

    pub fn last_reference(&self) -> Option<&str> {
        self.view
            .as_ref()
            .and_then(|v| v.last.as_deref())
            .filter(|r| !r.is_empty())
    }
}
