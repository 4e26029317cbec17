//! Confluence publishing for pagesync.
//!
//! This crate provides the three layers used to mirror a document tree into a
//! Confluence space:
//! - [`ConfluenceClient`]: REST API client with pagination, error classification
//!   and dry-run short-circuiting
//! - [`ContentTransformer`]: storage-format rewrite of rendered documents
//!   (alert and code block macros)
//! - [`SyncEngine`]: dependency-ordered create/update/delete with a per-document report
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use pagesync_confluence::{
//!     Authentication, ClientConfig, ConfluenceClient, Document, MemoryIdentityStore,
//!     SyncConfig, SyncEngine,
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
//! let docs = vec![Document::new("Guide", "guide.md", "<p>Hello</p>")];
//! let report = engine.sync(&docs);
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

// API client
mod client;
pub use client::{
    CHILDREN_PAGE_SIZE, ClientConfig, ConfluenceApi, ConfluenceClient, DRY_RUN_PAGE_ID,
    collect_paginated,
};

// Authentication
pub mod auth;
pub use auth::Authentication;

// Wire types
mod types;
pub use types::{Attachment, AttachmentFile, CreatePage, Page, PageRef, UpdatePage};

// Storage-format transformation
pub mod storage;
pub use storage::{ContentTransformer, TransformOptions};

// Sync engine
pub mod sync;
pub use sync::{
    CancelHandle, DEFAULT_WORKERS, Document, DocumentContent, IdentityStore, JsonIdentityStore,
    MemoryIdentityStore, SkipReason, SyncConfig, SyncEngine, SyncOutcome, SyncReport, SyncResult,
};

// Errors
pub mod error;
pub use error::{
    ConfluenceError, ErrorKind, StorageError, StoreError, TransportError, TransportErrorKind,
    error_chain,
};
