//! Input documents.

use crate::storage::Node;
use crate::types::AttachmentFile;

/// Page content: already parsed, or raw storage markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentContent {
    /// Raw storage-format markup.
    Storage(String),
    /// Parsed storage-format fragment.
    Tree(Vec<Node>),
}

impl From<&str> for DocumentContent {
    fn from(markup: &str) -> Self {
        Self::Storage(markup.to_owned())
    }
}

impl From<String> for DocumentContent {
    fn from(markup: String) -> Self {
        Self::Storage(markup)
    }
}

impl From<Vec<Node>> for DocumentContent {
    fn from(nodes: Vec<Node>) -> Self {
        Self::Tree(nodes)
    }
}

/// A document to publish as one Confluence page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Page title, before prefixing.
    pub title: String,
    /// Source path.
    pub path: String,
    /// Path relative to the documentation root. Identity key of the document.
    pub relative_path: String,
    /// Page content.
    pub content: DocumentContent,
    /// Parent identifiers from the top down to the immediate parent. Each is
    /// either the `path`/`relative_path` of another document or a remote page ID.
    pub ancestors: Vec<String>,
    /// Short name prefixed to descendant titles.
    pub name: Option<String>,
    /// `Some(false)` keeps the page out of the run.
    pub sync: Option<bool>,
    /// Remote page ID declared by the document's metadata.
    pub id: Option<String>,
    /// Files published alongside the page.
    pub attachments: Vec<AttachmentFile>,
}

impl Document {
    /// Create a document whose relative path equals `path`.
    pub fn new(
        title: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<DocumentContent>,
    ) -> Self {
        let path = path.into();
        Self {
            title: title.into(),
            relative_path: path.clone(),
            path,
            content: content.into(),
            ancestors: Vec::new(),
            name: None,
            sync: None,
            id: None,
            attachments: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_relative_path(mut self, relative_path: impl Into<String>) -> Self {
        self.relative_path = relative_path.into();
        self
    }

    #[must_use]
    pub fn with_ancestors<I, S>(mut self, ancestors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ancestors = ancestors.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = Some(sync);
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_attachment(mut self, file: AttachmentFile) -> Self {
        self.attachments.push(file);
        self
    }

    /// Identity key used by the identity store.
    pub fn key(&self) -> &str {
        &self.relative_path
    }

    pub(crate) fn is_sync_disabled(&self) -> bool {
        self.sync == Some(false)
    }
}
