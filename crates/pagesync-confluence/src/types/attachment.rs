//! Confluence attachment types.

use serde::Deserialize;

/// Confluence attachment.
///
/// Only includes fields that are actually used.
/// Serde ignores unknown fields from the API response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attachment {
    /// Attachment ID.
    pub id: String,
    /// Attachment title/filename.
    pub title: String,
}

/// File to upload as a page attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFile {
    /// Attachment filename.
    pub filename: String,
    /// Raw file content.
    pub data: Vec<u8>,
    /// MIME type sent with the upload.
    pub content_type: String,
}

/// Attachments API response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AttachmentsResponse {
    #[serde(default)]
    pub results: Vec<Attachment>,
    /// Total number of attachments on the page.
    #[serde(default)]
    pub size: usize,
}
