//! Page tree synchronization.
//!
//! [`SyncEngine`] publishes a set of [`Document`]s as a page tree:
//!
//! 1. Order documents so every ancestor is handled before its descendants
//! 2. Find each document's existing page (identity store, declared ID, or a
//!    child of the parent with the same title)
//! 3. Create missing pages, update changed ones, skip identical ones
//! 4. Upload attachments of created and updated pages
//! 5. Optionally delete pages whose documents disappeared
//!
//! Independent documents run concurrently on a bounded worker pool. Failures
//! are per document: the descendants of a failed document are skipped, the
//! rest of the run continues.
//!
//! # Example
//!
//! ```no_run
//! use pagesync_confluence::{
//!     Authentication, ClientConfig, ConfluenceClient, Document, MemoryIdentityStore, SyncConfig,
//!     SyncEngine,
//! };
//!
//! let client = ConfluenceClient::new(ClientConfig {
//!     base_url: "https://confluence.example.com".to_owned(),
//!     space_key: "DOCS".to_owned(),
//!     auth: Authentication::OAuth2 {
//!         access_token: "token".to_owned(),
//!     },
//!     dry_run: false,
//! });
//! let store = MemoryIdentityStore::new();
//! let engine = SyncEngine::new(&client, &store, SyncConfig::new("10001"));
//!
//! let documents = vec![
//!     Document::new("Guide", "guide.md", "<p>Start here</p>"),
//!     Document::new("Install", "guide/install.md", "<p>Steps</p>").with_ancestors(["guide.md"]),
//! ];
//! let report = engine.sync(&documents);
//! println!("{} created, {} failed", report.created(), report.failed());
//! ```

mod document;
mod engine;
mod identity;
#[cfg(test)]
mod mock;
mod plan;
mod result;
mod scheduler;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub use document::{Document, DocumentContent};
pub use engine::SyncEngine;
pub use identity::{IdentityStore, JsonIdentityStore, MemoryIdentityStore};
pub use result::{SkipReason, SyncOutcome, SyncReport, SyncResult};

use crate::storage::TransformOptions;

/// Default number of concurrent document operations.
pub const DEFAULT_WORKERS: usize = 4;

/// Configuration for a sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Page that top-level documents are created under.
    pub root_page_id: String,
    /// Prefix for every page title, as `[name] `.
    pub root_page_name: Option<String>,
    /// Simulate every mutating operation.
    pub dry_run: bool,
    /// Delete pages of identity store entries absent from the input.
    pub delete_orphans: bool,
    /// Maximum number of documents processed at once.
    pub workers: usize,
    /// Content transformation options.
    pub transform: TransformOptions,
}

impl SyncConfig {
    /// Configuration with defaults for everything but the root page.
    pub fn new(root_page_id: impl Into<String>) -> Self {
        Self {
            root_page_id: root_page_id.into(),
            root_page_name: None,
            dry_run: false,
            delete_orphans: false,
            workers: DEFAULT_WORKERS,
            transform: TransformOptions::default(),
        }
    }
}

/// Cooperative cancellation for a running sync.
///
/// Work already dispatched completes; nothing new is started.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
