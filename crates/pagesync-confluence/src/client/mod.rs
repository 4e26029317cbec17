//! Confluence REST API client.
//!
//! Provides a sync HTTP client for the Confluence REST API. Every failed call
//! is classified into a [`TransportError`] and wrapped by the calling operation
//! into its [`ConfluenceError`] variant. The client never retries.
//!
//! In dry-run mode mutating operations make no network call: they log their
//! intent and return a synthetic result.

mod attachments;
mod pages;
mod pagination;

pub use pagination::{CHILDREN_PAGE_SIZE, collect_paginated};

use std::time::Duration;

use tracing::debug;
use ureq::Agent;

use crate::auth::Authentication;
use crate::error::{ConfluenceError, TransportError};
use crate::types::{Attachment, AttachmentFile, CreatePage, Page, UpdatePage};

/// Default HTTP timeout in seconds.
const DEFAULT_TIMEOUT: u64 = 30;

/// Page ID returned by `create_page` in dry-run mode.
pub const DRY_RUN_PAGE_ID: &str = "1234";

/// Page operations consumed by the sync engine.
///
/// Implemented by [`ConfluenceClient`]; tests provide in-memory fakes.
pub trait ConfluenceApi: Sync {
    /// Fetch a page with ancestors, version, body and all children.
    fn get_page(&self, id: &str) -> Result<Page, ConfluenceError>;

    /// Create a page under the last ancestor.
    fn create_page(&self, page: &CreatePage) -> Result<Page, ConfluenceError>;

    /// Update a page; `page.version` must be the server's current version.
    fn update_page(&self, page: &UpdatePage) -> Result<Page, ConfluenceError>;

    /// Delete a page or attachment.
    fn delete_content(&self, id: &str) -> Result<(), ConfluenceError>;

    /// List attachments of a page.
    fn get_attachments(&self, id: &str) -> Result<Vec<Attachment>, ConfluenceError>;

    /// Upload attachments to a page.
    fn create_attachments(&self, id: &str, files: &[AttachmentFile])
    -> Result<(), ConfluenceError>;
}

/// Connection settings for [`ConfluenceClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Confluence server base URL.
    pub base_url: String,
    /// Key of the space pages are created in.
    pub space_key: String,
    /// Request credentials.
    pub auth: Authentication,
    /// Short-circuit mutating calls.
    pub dry_run: bool,
}

/// Confluence REST API client.
pub struct ConfluenceClient {
    agent: Agent,
    base_url: String,
    space_key: String,
    auth: Authentication,
    dry_run: bool,
}

/// Request body with its content type.
struct RequestBody {
    content_type: String,
    bytes: Vec<u8>,
}

impl ConfluenceClient {
    /// Create client from connection settings.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            space_key: config.space_key,
            auth: config.auth,
            dry_run: config.dry_run,
        }
    }

    /// Whether mutating calls are simulated.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and return the response body of a successful call.
    ///
    /// Error statuses are classified from the status code; failures inside the
    /// HTTP stack keep the `ureq` error as their cause.
    fn send(
        &self,
        method: &'static str,
        path: &str,
        query: &[(&str, String)],
        body: Option<RequestBody>,
        extra_headers: &[(&str, &str)],
    ) -> Result<String, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let auth_header = self.auth.header(method, path, query);

        debug!("{method} {path}");

        macro_rules! prepare {
            ($builder:expr) => {{
                let mut builder = $builder
                    .header("Authorization", &auth_header)
                    .header("Accept", "application/json");
                for (key, value) in query {
                    builder = builder.query(*key, value);
                }
                for (key, value) in extra_headers {
                    builder = builder.header(*key, *value);
                }
                builder
            }};
        }

        let response = match (method, body) {
            ("GET", _) => prepare!(self.agent.get(&url)).call()?,
            ("DELETE", _) => prepare!(self.agent.delete(&url)).call()?,
            ("POST", Some(body)) => prepare!(self.agent.post(&url))
                .header("Content-Type", &body.content_type)
                .send(&body.bytes[..])?,
            ("PUT", Some(body)) => prepare!(self.agent.put(&url))
                .header("Content-Type", &body.content_type)
                .send(&body.bytes[..])?,
            ("POST", None) => prepare!(self.agent.post(&url)).send_empty()?,
            ("PUT", None) => prepare!(self.agent.put(&url)).send_empty()?,
            (other, _) => {
                return Err(TransportError::unknown(
                    format!("unsupported HTTP method {other}"),
                    None,
                ));
            }
        };

        let status = response.status().as_u16();
        let mut body_reader = response.into_body();

        if status >= 400 {
            let error_body = body_reader
                .read_to_string()
                .unwrap_or_else(|_| "(unable to read error body)".to_owned());
            return Err(TransportError::from_status(status, error_body));
        }

        body_reader.read_to_string().map_err(|e| {
            TransportError::unknown("response body could not be read", Some(Box::new(e)))
        })
    }

    /// JSON request body.
    fn json_body(payload: &serde_json::Value) -> RequestBody {
        RequestBody {
            content_type: "application/json".to_owned(),
            bytes: payload.to_string().into_bytes(),
        }
    }
}

impl ConfluenceApi for ConfluenceClient {
    fn get_page(&self, id: &str) -> Result<Page, ConfluenceError> {
        ConfluenceClient::get_page(self, id)
    }

    fn create_page(&self, page: &CreatePage) -> Result<Page, ConfluenceError> {
        ConfluenceClient::create_page(self, page)
    }

    fn update_page(&self, page: &UpdatePage) -> Result<Page, ConfluenceError> {
        ConfluenceClient::update_page(self, page)
    }

    fn delete_content(&self, id: &str) -> Result<(), ConfluenceError> {
        ConfluenceClient::delete_content(self, id)
    }

    fn get_attachments(&self, id: &str) -> Result<Vec<Attachment>, ConfluenceError> {
        ConfluenceClient::get_attachments(self, id)
    }

    fn create_attachments(
        &self,
        id: &str,
        files: &[AttachmentFile],
    ) -> Result<(), ConfluenceError> {
        ConfluenceClient::create_attachments(self, id, files)
    }
}
