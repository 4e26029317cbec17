//! Page operations for Confluence API.

use serde_json::json;
use tracing::info;

use super::{CHILDREN_PAGE_SIZE, ConfluenceClient, DRY_RUN_PAGE_ID, collect_paginated};
use crate::error::{ConfluenceError, TransportError, TransportErrorKind};
use crate::types::{ChildrenResponse, ContentResponse, CreatePage, Page, PageRef, UpdatePage};

impl ConfluenceClient {
    /// Get page by ID with ancestors, version, body and all direct children.
    ///
    /// Any failure, including one in the child listing, is reported as
    /// [`ConfluenceError::NotFound`] carrying the classified cause.
    pub fn get_page(&self, id: &str) -> Result<Page, ConfluenceError> {
        info!("Getting page with id {id}");
        self.fetch_page(id)
            .map_err(|source| ConfluenceError::NotFound {
                id: id.to_owned(),
                source,
            })
    }

    fn fetch_page(&self, id: &str) -> Result<Page, TransportError> {
        let body = self.send(
            "GET",
            &format!("/rest/api/content/{id}"),
            &[("expand", "ancestors,version,body.storage".to_owned())],
            None,
            &[],
        )?;
        let content: ContentResponse = serde_json::from_str(&body)?;
        let children = self.fetch_children(id)?;
        Ok(content.into_page(children))
    }

    /// List all direct child pages, following pagination.
    fn fetch_children(&self, id: &str) -> Result<Vec<PageRef>, TransportError> {
        let path = format!("/rest/api/content/{id}/child/page");
        collect_paginated(CHILDREN_PAGE_SIZE, |start, limit| {
            let body = self.send(
                "GET",
                &path,
                &[("start", start.to_string()), ("limit", limit.to_string())],
                None,
                &[],
            )?;
            let response: ChildrenResponse = serde_json::from_str(&body)?;
            Ok((response.results, response.size))
        })
    }

    /// Create a new page under the last of `page.ancestors`.
    pub fn create_page(&self, page: &CreatePage) -> Result<Page, ConfluenceError> {
        if self.dry_run {
            info!("Dry run: creating page with title {}", page.title);
            return Ok(Page {
                id: DRY_RUN_PAGE_ID.to_owned(),
                title: page.title.clone(),
                version: 1,
                ancestors: page
                    .ancestors
                    .iter()
                    .map(|id| PageRef {
                        id: id.clone(),
                        title: String::new(),
                    })
                    .collect(),
                children: Vec::new(),
                body: Some(page.content.clone()),
            });
        }

        info!("Creating page with title {}", page.title);

        let mut payload = json!({
            "type": "page",
            "title": page.title,
            "space": {"key": self.space_key},
            "body": {
                "storage": {
                    "value": page.content,
                    "representation": "storage"
                }
            }
        });
        if let Some(parent) = page.ancestors.last() {
            payload["ancestors"] = json!([{"id": parent}]);
        }

        self.send(
            "POST",
            "/rest/api/content",
            &[],
            Some(Self::json_body(&payload)),
            &[],
        )
        .and_then(|body| Ok(serde_json::from_str::<ContentResponse>(&body)?))
        .map(|content| content.into_page(Vec::new()))
        .map_err(|source| ConfluenceError::CreateFailed {
            title: page.title.clone(),
            source,
        })
    }

    /// Update an existing page.
    ///
    /// The request carries `page.version + 1`; a 409 answer is reported as
    /// [`ConfluenceError::Conflict`].
    pub fn update_page(&self, page: &UpdatePage) -> Result<Page, ConfluenceError> {
        if self.dry_run {
            info!(
                "Dry run: updating page with id {} and title {}",
                page.id, page.title
            );
            return Ok(Page {
                id: page.id.clone(),
                title: page.title.clone(),
                version: page.version,
                ancestors: page
                    .ancestors
                    .iter()
                    .map(|id| PageRef {
                        id: id.clone(),
                        title: String::new(),
                    })
                    .collect(),
                children: Vec::new(),
                body: Some(page.content.clone()),
            });
        }

        info!("Updating page with id {} and title {}", page.id, page.title);

        let mut payload = json!({
            "id": page.id,
            "type": "page",
            "title": page.title,
            "version": {"number": page.version + 1},
            "body": {
                "storage": {
                    "value": page.content,
                    "representation": "storage"
                }
            }
        });
        if let Some(parent) = page.ancestors.last() {
            payload["ancestors"] = json!([{"id": parent}]);
        }

        self.send(
            "PUT",
            &format!("/rest/api/content/{}", page.id),
            &[],
            Some(Self::json_body(&payload)),
            &[],
        )
        .and_then(|body| Ok(serde_json::from_str::<ContentResponse>(&body)?))
        .map(|content| content.into_page(Vec::new()))
        .map_err(|source| {
            if source.kind() == TransportErrorKind::UnknownTransport && source.status() == Some(409)
            {
                ConfluenceError::Conflict {
                    id: page.id.clone(),
                    source,
                }
            } else {
                ConfluenceError::UpdateFailed {
                    id: page.id.clone(),
                    title: page.title.clone(),
                    source,
                }
            }
        })
    }

    /// Delete a page or attachment by content ID.
    pub fn delete_content(&self, id: &str) -> Result<(), ConfluenceError> {
        if self.dry_run {
            info!("Dry run: deleting content with id {id}");
            return Ok(());
        }

        info!("Deleting content with id {id}");
        self.send("DELETE", &format!("/rest/api/content/{id}"), &[], None, &[])
            .map(|_| ())
            .map_err(|source| ConfluenceError::DeleteFailed {
                id: id.to_owned(),
                source,
            })
    }
}
