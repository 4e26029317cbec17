//! Attachment operations for Confluence API.

use rand::RngExt;
use tracing::info;

use super::{CHILDREN_PAGE_SIZE, ConfluenceClient, RequestBody, collect_paginated};
use crate::error::ConfluenceError;
use crate::types::{Attachment, AttachmentFile, AttachmentsResponse};

impl ConfluenceClient {
    /// List all attachments on a page.
    pub fn get_attachments(&self, page_id: &str) -> Result<Vec<Attachment>, ConfluenceError> {
        info!("Getting attachments for page {page_id}");

        let path = format!("/rest/api/content/{page_id}/child/attachment");
        collect_paginated(CHILDREN_PAGE_SIZE, |start, limit| {
            let body = self.send(
                "GET",
                &path,
                &[("start", start.to_string()), ("limit", limit.to_string())],
                None,
                &[],
            )?;
            let response: AttachmentsResponse = serde_json::from_str(&body)?;
            Ok((response.results, response.size))
        })
        .map_err(|source| ConfluenceError::AttachmentsNotFound {
            id: page_id.to_owned(),
            source,
        })
    }

    /// Upload files to a page in one multipart request.
    ///
    /// Uploads are marked as minor edits so watchers are not notified.
    pub fn create_attachments(
        &self,
        page_id: &str,
        files: &[AttachmentFile],
    ) -> Result<(), ConfluenceError> {
        if files.is_empty() {
            return Ok(());
        }

        let names = files
            .iter()
            .map(|f| f.filename.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        if self.dry_run {
            info!("Dry run: uploading attachments [{names}] to page {page_id}");
            return Ok(());
        }

        info!("Uploading attachments [{names}] to page {page_id}");

        let boundary = format!(
            "----PagesyncFormBoundary{:016x}",
            rand::rng().random::<u64>()
        );

        self.send(
            "POST",
            &format!("/rest/api/content/{page_id}/child/attachment"),
            &[],
            Some(multipart_body(&boundary, files)),
            &[("X-Atlassian-Token", "nocheck")],
        )
        .map(|_| ())
        .map_err(|source| ConfluenceError::AttachmentCreateFailed {
            id: page_id.to_owned(),
            source,
        })
    }
}

/// Build `multipart/form-data` with one `file` part per attachment and a
/// trailing `minorEdit=true` field.
fn multipart_body(boundary: &str, files: &[AttachmentFile]) -> RequestBody {
    let mut body = Vec::new();

    for file in files {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                quoted_filename(&file.filename)
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
        body.extend_from_slice(&file.data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"minorEdit\"\r\n\r\n");
    body.extend_from_slice(b"true\r\n");

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    RequestBody {
        content_type: format!("multipart/form-data; boundary={boundary}"),
        bytes: body,
    }
}

/// Escape a filename for a quoted `Content-Disposition` parameter.
///
/// Quotes and line breaks are percent-encoded the way browsers encode form
/// uploads; all other characters are sent as UTF-8.
fn quoted_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '"' => out.push_str("%22"),
            '\r' => out.push_str("%0D"),
            '\n' => out.push_str("%0A"),
            _ => out.push(ch),
        }
    }
    out
}
