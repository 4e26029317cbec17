//! Confluence page types.

use serde::{Deserialize, Serialize};

/// Minimal page reference (ancestors, children).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PageRef {
    /// Page ID.
    pub id: String,
    /// Page title.
    #[serde(default)]
    pub title: String,
}

/// Confluence page as seen by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Page ID.
    pub id: String,
    /// Page title.
    pub title: String,
    /// Server-owned version number.
    pub version: u32,
    /// Ancestors from the space root down to the immediate parent.
    pub ancestors: Vec<PageRef>,
    /// Direct child pages, in server order.
    pub children: Vec<PageRef>,
    /// Current storage-format body, when it was fetched.
    pub body: Option<String>,
}

impl Page {
    /// ID of the immediate parent page.
    pub fn parent_id(&self) -> Option<&str> {
        self.ancestors.last().map(|a| a.id.as_str())
    }
}

/// Input for page creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePage {
    /// Page title.
    pub title: String,
    /// Storage-format body.
    pub content: String,
    /// Ancestor IDs; only the last one is sent as the parent.
    pub ancestors: Vec<String>,
}

/// Input for page update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePage {
    /// Page ID.
    pub id: String,
    /// Page title.
    pub title: String,
    /// Storage-format body.
    pub content: String,
    /// Current server version (the request carries `version + 1`).
    pub version: u32,
    /// Ancestor IDs; only the last one is sent as the parent.
    pub ancestors: Vec<String>,
}

/// Content API response.
///
/// Only includes fields that are actually used.
/// Serde ignores unknown fields from the API response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContentResponse {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub version: Option<Version>,
    #[serde(default)]
    pub ancestors: Vec<PageRef>,
    #[serde(default)]
    pub body: Option<Body>,
}

impl ContentResponse {
    pub(crate) fn into_page(self, children: Vec<PageRef>) -> Page {
        Page {
            id: self.id,
            title: self.title,
            version: self.version.map_or(0, |v| v.number),
            ancestors: self.ancestors,
            children,
            body: self.body.and_then(|b| b.storage).map(|s| s.value),
        }
    }
}

/// Page version.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Version {
    pub number: u32,
}

/// Page body content.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Body {
    #[serde(default)]
    pub storage: Option<Storage>,
}

/// Storage format representation.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Storage {
    pub value: String,
}

/// One page of a child listing.
///
/// `size` is the total number of children reported by the server.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChildrenResponse {
    #[serde(default)]
    pub results: Vec<PageRef>,
    #[serde(default)]
    pub size: usize,
}
