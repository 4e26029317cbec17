//! Document manifest loading.
//!
//! A manifest is a JSON file listing the documents of one run:
//!
//! ```json
//! {
//!   "documents": [
//!     { "title": "Guide", "path": "guide.md", "name": "Guide" },
//!     { "title": "Install", "path": "guide/install.md", "ancestors": ["guide.md"],
//!       "attachments": ["guide/diagram.png"] }
//!   ]
//! }
//! ```
//!
//! Paths are relative to the manifest. Each `path` is a Markdown file rendered
//! to HTML before the document is handed to the sync engine.

use std::path::Path;

use pagesync_confluence::{AttachmentFile, Document};
use pulldown_cmark::{Options, Parser, html};
use serde::Deserialize;

use crate::error::CliError;

#[derive(Debug, Deserialize)]
struct Manifest {
    documents: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    title: String,
    path: String,
    relative_path: Option<String>,
    #[serde(default)]
    ancestors: Vec<String>,
    name: Option<String>,
    sync: Option<bool>,
    id: Option<String>,
    #[serde(default)]
    attachments: Vec<String>,
}

/// Read the manifest at `path` and build its documents.
pub(crate) fn load(path: &Path) -> Result<Vec<Document>, CliError> {
    let content = read(path)?;
    let manifest: Manifest =
        serde_json::from_str(&content).map_err(|source| CliError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;

    let base = path.parent().unwrap_or(Path::new("."));
    manifest
        .documents
        .into_iter()
        .map(|entry| build_document(base, entry))
        .collect()
}

fn build_document(base: &Path, entry: Entry) -> Result<Document, CliError> {
    let source = base.join(&entry.path);
    let markdown = read(&source)?;

    let mut doc = Document::new(entry.title, entry.path, render_markdown(&markdown))
        .with_ancestors(entry.ancestors);
    if let Some(relative_path) = entry.relative_path {
        doc = doc.with_relative_path(relative_path);
    }
    if let Some(name) = entry.name {
        doc = doc.with_name(name);
    }
    if let Some(sync) = entry.sync {
        doc = doc.with_sync(sync);
    }
    if let Some(id) = entry.id {
        doc = doc.with_id(id);
    }
    for attachment in entry.attachments {
        doc = doc.with_attachment(read_attachment(&base.join(attachment))?);
    }
    Ok(doc)
}

/// Render Markdown to XHTML-compatible HTML.
///
/// GFM alert syntax is left as text so the storage transformer sees the
/// `[!NOTE]` markers.
pub(crate) fn render_markdown(markdown: &str) -> String {
    let options =
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, options));
    out
}

fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn read_attachment(path: &Path) -> Result<AttachmentFile, CliError> {
    let data = std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(AttachmentFile {
        content_type: content_type(&filename).to_owned(),
        filename,
        data,
    })
}

fn content_type(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
}
