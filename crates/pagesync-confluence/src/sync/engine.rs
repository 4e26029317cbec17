//! Sync engine implementation.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

use tracing::{debug, info, warn};

use super::document::{Document, DocumentContent};
use super::identity::IdentityStore;
use super::plan::{Plan, page_title};
use super::result::{SkipReason, SyncOutcome, SyncReport, SyncResult};
use super::scheduler::{Anchor, Coordinator, Finished, Job};
use super::{CancelHandle, SyncConfig};
use crate::client::{ConfluenceApi, DRY_RUN_PAGE_ID};
use crate::error::ConfluenceError;
use crate::storage::{ContentTransformer, normalize, serialize};
use crate::types::{CreatePage, Page, UpdatePage};

/// Where an existing page ID came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdSource {
    Store,
    Declared,
    Adopted,
}

/// Outcome of publishing one document.
struct Published {
    outcome: SyncOutcome,
    id: String,
    simulated: bool,
}

/// Publishes documents as a Confluence page tree.
pub struct SyncEngine<'a> {
    client: &'a dyn ConfluenceApi,
    store: &'a dyn IdentityStore,
    config: SyncConfig,
    transformer: ContentTransformer,
    cancel: CancelHandle,
}

impl<'a> SyncEngine<'a> {
    /// Create an engine.
    #[must_use]
    pub fn new(
        client: &'a dyn ConfluenceApi,
        store: &'a dyn IdentityStore,
        config: SyncConfig,
    ) -> Self {
        let transformer = ContentTransformer::new(config.transform.clone());
        Self {
            client,
            store,
            config,
            transformer,
            cancel: CancelHandle::default(),
        }
    }

    /// Handle that cancels a running [`SyncEngine::sync`] from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Synchronize `documents`.
    ///
    /// Returns one result per document, in input order, followed by one result
    /// per deleted orphan when deletion is enabled.
    pub fn sync(&self, documents: &[Document]) -> SyncReport {
        let plan = Plan::build(documents);
        let titles: Vec<String> = documents
            .iter()
            .zip(&plan.deps)
            .map(|(doc, deps)| {
                page_title(
                    self.config.root_page_name.as_deref(),
                    documents,
                    deps,
                    &doc.title,
                )
            })
            .collect();

        info!(
            "Syncing {} documents under page {}{}",
            documents.len(),
            self.config.root_page_id,
            if self.config.dry_run { " (dry run)" } else { "" }
        );

        let coordinator = Coordinator::new(
            documents,
            plan,
            Anchor::remote(&self.config.root_page_id),
        );
        let known_id = |doc: &Document| self.store.get(doc.key()).or_else(|| doc.id.clone());
        let workers = self.config.workers.max(1);
        let (tx, rx) = mpsc::channel::<Finished>();

        // A panicking job still reports, or the coordinator would wait on it forever.
        let execute = |job: Job| {
            let index = job.index;
            let doc = &documents[index];
            panic::catch_unwind(AssertUnwindSafe(|| self.execute(doc, &titles[index], job)))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    warn!("Sync of {} panicked: {message}", doc.path);
                    Finished {
                        index,
                        result: SyncResult {
                            path: doc.path.clone(),
                            relative_path: doc.relative_path.clone(),
                            page_id: None,
                            outcome: SyncOutcome::Failed(ConfluenceError::aborted(
                                &doc.path, message,
                            )),
                        },
                        anchor: None,
                    }
                })
        };

        let mut results = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("pagesync-worker-{i}"))
            .build()
        {
            Ok(pool) => pool.in_place_scope(|scope| {
                coordinator.run(
                    workers,
                    &self.cancel,
                    known_id,
                    |job| {
                        let tx = tx.clone();
                        let execute = &execute;
                        scope.spawn(move |_| {
                            let _ = tx.send(execute(job));
                        });
                    },
                    &rx,
                )
            }),
            Err(e) => {
                warn!("Failed to create worker pool, running sequentially: {e}");
                coordinator.run(
                    1,
                    &self.cancel,
                    known_id,
                    |job| {
                        let _ = tx.send(execute(job));
                    },
                    &rx,
                )
            }
        };

        if self.config.delete_orphans {
            let live: HashSet<&str> = results.iter().filter_map(|r| r.page_id.as_deref()).collect();
            let deletions = self.delete_orphans(documents, &live);
            results.extend(deletions);
        }

        let report = SyncReport { results };
        info!(
            "Sync finished: {} created, {} updated, {} deleted, {} skipped, {} failed",
            report.created(),
            report.updated(),
            report.deleted(),
            report.skipped(),
            report.failed()
        );
        report
    }

    /// Process one dispatched document.
    fn execute(&self, doc: &Document, title: &str, job: Job) -> Finished {
        debug!("Resolving {} as \"{title}\"", doc.path);

        let (outcome, page_id, anchor) = if doc.is_sync_disabled() {
            let id = self.store.get(doc.key()).or_else(|| doc.id.clone());
            info!("Skipping {}: sync disabled", doc.path);
            let anchor = id.as_deref().map(|id| job.parent.child(id, false));
            (SyncOutcome::Skipped(SkipReason::SyncDisabled), id, anchor)
        } else {
            match self.publish(doc, title, &job.parent) {
                Ok(published) => {
                    let anchor = job.parent.child(&published.id, published.simulated);
                    (published.outcome, Some(published.id), Some(anchor))
                }
                Err(e) => {
                    warn!("Failed to sync {}: {e}", doc.path);
                    (SyncOutcome::Failed(e), None, None)
                }
            }
        };

        Finished {
            index: job.index,
            result: SyncResult {
                path: doc.path.clone(),
                relative_path: doc.relative_path.clone(),
                page_id,
                outcome,
            },
            anchor,
        }
    }

    fn publish(
        &self,
        doc: &Document,
        title: &str,
        parent: &Anchor,
    ) -> Result<Published, ConfluenceError> {
        let content = self.render(doc);

        let published = match self.find_existing(doc, title, parent)? {
            Some((page, source)) => self.update(doc, title, content, parent, page, source)?,
            None => self.create(doc, title, content, parent)?,
        };

        if !doc.attachments.is_empty()
            && matches!(published.outcome, SyncOutcome::Created | SyncOutcome::Updated)
        {
            self.upload_attachments(doc, &published)?;
        }
        Ok(published)
    }

    /// Storage-format body sent for `doc`.
    fn render(&self, doc: &Document) -> String {
        let body = match &doc.content {
            DocumentContent::Storage(markup) => self.transformer.transform(markup),
            DocumentContent::Tree(nodes) => {
                serialize(&self.transformer.transform_tree(nodes.clone()))
            }
        };
        match self.transformer.notice(&doc.title, &doc.relative_path) {
            Some(notice) => serialize(&[notice]) + &body,
            None => body,
        }
    }

    /// Existing page of `doc`, with a freshly read version.
    fn find_existing(
        &self,
        doc: &Document,
        title: &str,
        parent: &Anchor,
    ) -> Result<Option<(Page, IdSource)>, ConfluenceError> {
        if let Some(id) = self.store.get(doc.key()) {
            match self.client.get_page(&id) {
                Ok(page) => return Ok(Some((page, IdSource::Store))),
                Err(e) if is_gone(&e) => {
                    warn!(
                        "Page {id} recorded for {} no longer exists, creating it again",
                        doc.relative_path
                    );
                    if !self.config.dry_run {
                        self.store.remove(doc.key());
                    }
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(id) = &doc.id {
            let page = self.client.get_page(id)?;
            return Ok(Some((page, IdSource::Declared)));
        }

        if parent.simulated {
            return Ok(None);
        }
        let parent_page = self.client.get_page(&parent.id)?;
        match parent_page.children.iter().find(|c| c.title == title) {
            Some(child) => {
                info!(
                    "Adopting existing page {} \"{title}\" for {}",
                    child.id, doc.relative_path
                );
                let page = self.client.get_page(&child.id)?;
                Ok(Some((page, IdSource::Adopted)))
            }
            None => Ok(None),
        }
    }

    fn create(
        &self,
        doc: &Document,
        title: &str,
        content: String,
        parent: &Anchor,
    ) -> Result<Published, ConfluenceError> {
        if self.config.dry_run {
            info!("Dry run: would create \"{title}\" under page {}", parent.id);
            return Ok(Published {
                outcome: SyncOutcome::Created,
                id: DRY_RUN_PAGE_ID.to_owned(),
                simulated: true,
            });
        }

        let page = self.client.create_page(&CreatePage {
            title: title.to_owned(),
            content,
            ancestors: parent.chain.clone(),
        })?;
        info!("Created page {} \"{title}\"", page.id);
        self.store.set(doc.key(), &page.id);
        Ok(Published {
            outcome: SyncOutcome::Created,
            id: page.id,
            simulated: false,
        })
    }

    fn update(
        &self,
        doc: &Document,
        title: &str,
        content: String,
        parent: &Anchor,
        page: Page,
        source: IdSource,
    ) -> Result<Published, ConfluenceError> {
        let unchanged = page.title == title
            && page.parent_id() == Some(parent.id.as_str())
            && page
                .body
                .as_deref()
                .is_some_and(|body| normalize(body) == normalize(&content));

        if !self.config.dry_run && source != IdSource::Store {
            self.store.set(doc.key(), &page.id);
        }

        if unchanged {
            debug!("Page {} \"{title}\" is up to date", page.id);
            return Ok(Published {
                outcome: SyncOutcome::Skipped(SkipReason::Unchanged),
                id: page.id,
                simulated: false,
            });
        }

        if self.config.dry_run {
            info!("Dry run: would update page {} \"{title}\"", page.id);
        } else {
            self.client.update_page(&UpdatePage {
                id: page.id.clone(),
                title: title.to_owned(),
                content,
                version: page.version,
                ancestors: parent.chain.clone(),
            })?;
            info!("Updated page {} \"{title}\"", page.id);
        }
        Ok(Published {
            outcome: SyncOutcome::Updated,
            id: page.id,
            simulated: false,
        })
    }

    /// Replace same-named attachments, then upload the document's files.
    fn upload_attachments(
        &self,
        doc: &Document,
        published: &Published,
    ) -> Result<(), ConfluenceError> {
        if self.config.dry_run {
            info!(
                "Dry run: would upload {} attachments to page {}",
                doc.attachments.len(),
                published.id
            );
            return Ok(());
        }

        let names: HashSet<&str> = doc.attachments.iter().map(|f| f.filename.as_str()).collect();
        for existing in self.client.get_attachments(&published.id)? {
            if names.contains(existing.title.as_str()) {
                debug!("Replacing attachment {} on page {}", existing.title, published.id);
                self.client.delete_content(&existing.id)?;
            }
        }
        self.client
            .create_attachments(&published.id, &doc.attachments)
    }

    /// Delete pages recorded for documents that are no longer in the input.
    ///
    /// Deepest paths go first so children are removed before their parents.
    fn delete_orphans(&self, documents: &[Document], live: &HashSet<&str>) -> Vec<SyncResult> {
        let keys: HashSet<&str> = documents.iter().map(Document::key).collect();
        let mut orphans: Vec<(String, String)> = self
            .store
            .entries()
            .into_iter()
            .filter(|(key, id)| !keys.contains(key.as_str()) && !live.contains(id.as_str()))
            .collect();
        orphans.sort_by(|(a, _), (b, _)| depth(b).cmp(&depth(a)).then_with(|| b.cmp(a)));

        let mut results = Vec::with_capacity(orphans.len());
        for (key, id) in orphans {
            if self.cancel.is_cancelled() {
                info!("Cancelled, orphan deletion stopped");
                break;
            }

            let outcome = if self.config.dry_run {
                info!("Dry run: would delete page {id} of removed document {key}");
                SyncOutcome::Deleted
            } else {
                match self.client.delete_content(&id) {
                    Ok(()) => {
                        info!("Deleted page {id} of removed document {key}");
                        self.store.remove(&key);
                        SyncOutcome::Deleted
                    }
                    Err(e) => {
                        warn!("Failed to delete page {id}: {e}");
                        SyncOutcome::Failed(e)
                    }
                }
            };
            results.push(SyncResult {
                path: key.clone(),
                relative_path: key,
                page_id: Some(id),
                outcome,
            });
        }
        results
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_owned())
}

/// Whether a lookup failed because the page does not exist.
fn is_gone(error: &ConfluenceError) -> bool {
    error.transport().and_then(|t| t.status()) == Some(404)
}

fn depth(path: &str) -> usize {
    path.matches('/').count()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorKind;
    use crate::sync::identity::MemoryIdentityStore;
    use crate::sync::mock::{Call, MockConfluence};
    use crate::types::AttachmentFile;

    const ROOT: &str = "10001";

    fn config() -> SyncConfig {
        SyncConfig::new(ROOT)
    }

    fn tree() -> Vec<Document> {
        vec![
            Document::new("Guide", "guide.md", "<p>Guide</p>"),
            Document::new("Install", "guide/install.md", "<p>Install</p>")
                .with_ancestors(["guide.md"]),
            Document::new("Linux", "guide/install/linux.md", "<p>Linux</p>")
                .with_ancestors(["guide.md", "guide/install.md"]),
            Document::new("FAQ", "faq.md", "<p>FAQ</p>"),
        ]
    }

    fn outcome<'r>(report: &'r SyncReport, path: &str) -> &'r SyncOutcome {
        &report.get(path).unwrap().outcome
    }

    #[test]
    fn test_first_run_creates_tree() {
        let mock = MockConfluence::with_root(ROOT);
        let store = MemoryIdentityStore::new();
        let report = SyncEngine::new(&mock, &store, config()).sync(&tree());

        assert!(report.is_success());
        assert_eq!(report.created(), 4);

        let (guide_id, _) = mock.find("Guide").unwrap();
        let (install_id, install) = mock.find("Install").unwrap();
        let (_, linux) = mock.find("Linux").unwrap();
        assert_eq!(install.parent.as_deref(), Some(guide_id.as_str()));
        assert_eq!(linux.parent.as_deref(), Some(install_id.as_str()));
        assert_eq!(store.get("guide.md"), Some(guide_id));
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let mock = MockConfluence::with_root(ROOT);
        let store = MemoryIdentityStore::new();
        let engine = SyncEngine::new(&mock, &store, config());
        engine.sync(&tree());
        let pages = mock.page_count();
        mock.clear_calls();

        let report = engine.sync(&tree());

        assert!(report.is_success());
        assert_eq!(report.skipped(), 4);
        assert_eq!(mock.count(|c| matches!(c, Call::UpdatePage { .. })), 0);
        assert!(mock.mutating_calls().is_empty());
        assert_eq!(mock.page_count(), pages);
    }

    #[test]
    fn test_server_decorated_macros_count_as_unchanged() {
        let mock = MockConfluence::with_root(ROOT);
        let store = MemoryIdentityStore::new();
        let docs = vec![Document::new(
            "Setup",
            "setup.md",
            r#"<blockquote><p>[!TIP] Use a venv</p></blockquote><pre><code class="language-sh">pip install x</code></pre>"#,
        )];
        let engine = SyncEngine::new(&mock, &store, config());
        engine.sync(&docs);
        let (id, page) = mock.find("Setup").unwrap();
        // Confluence stamps macros with its own attributes when it saves a page.
        let saved = page.body.replace(
            "<ac:structured-macro ac:name=",
            r#"<ac:structured-macro ac:schema-version="1" ac:macro-id="7f3e" ac:name="#,
        );
        assert_ne!(saved, page.body);
        mock.add_page(&id, "Setup", Some(ROOT), &saved);
        mock.clear_calls();

        let report = engine.sync(&docs);

        assert!(matches!(
            outcome(&report, "setup.md"),
            SyncOutcome::Skipped(SkipReason::Unchanged)
        ));
        assert_eq!(mock.count(|c| matches!(c, Call::UpdatePage { .. })), 0);
    }

    #[test]
    fn test_changed_document_updated_with_fresh_version() {
        let mock = MockConfluence::with_root(ROOT);
        let store = MemoryIdentityStore::new();
        let engine = SyncEngine::new(&mock, &store, config());
        engine.sync(&tree());
        let (faq_id, _) = mock.find("FAQ").unwrap();
        // Someone else edited the page in between.
        mock.add_page(&faq_id, "FAQ", Some(ROOT), "<p>edited</p>");
        mock.clear_calls();

        let report = engine.sync(&tree());

        assert!(matches!(outcome(&report, "faq.md"), SyncOutcome::Updated));
        assert_eq!(report.updated(), 1);
        assert_eq!(
            mock.count(|c| matches!(c, Call::UpdatePage { id, version: 1 } if *id == faq_id)),
            1
        );
        assert_eq!(mock.page(&faq_id).unwrap().body, "<p>FAQ</p>");
    }

    #[test]
    fn test_ancestors_created_first_sequential_and_concurrent() {
        for workers in [1, 8] {
            let mock = MockConfluence::with_root(ROOT);
            let store = MemoryIdentityStore::new();
            let docs = vec![
                Document::new("C", "a/b/c.md", "<p>c</p>").with_ancestors(["a.md", "a/b.md"]),
                Document::new("B", "a/b.md", "<p>b</p>").with_ancestors(["a.md"]),
                Document::new("A", "a.md", "<p>a</p>"),
            ];
            let report = SyncEngine::new(
                &mock,
                &store,
                SyncConfig {
                    workers,
                    ..config()
                },
            )
            .sync(&docs);
            assert!(report.is_success());

            let creates: Vec<(String, Option<String>)> = mock
                .calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::CreatePage { title, parent } => Some((title, parent)),
                    _ => None,
                })
                .collect();
            let titles: Vec<&str> = creates.iter().map(|(t, _)| t.as_str()).collect();
            assert_eq!(titles, vec!["A", "B", "C"], "workers={workers}");

            let (a_id, _) = mock.find("A").unwrap();
            let (b_id, _) = mock.find("B").unwrap();
            assert_eq!(creates[0].1.as_deref(), Some(ROOT));
            assert_eq!(creates[1].1.as_deref(), Some(a_id.as_str()));
            assert_eq!(creates[2].1.as_deref(), Some(b_id.as_str()));
        }
    }

    #[test]
    fn test_concurrent_run_creates_every_sibling() {
        let mock = MockConfluence::with_root(ROOT);
        let store = MemoryIdentityStore::new();
        let mut docs = vec![Document::new("Hub", "hub.md", "<p>hub</p>")];
        for i in 0..20 {
            docs.push(
                Document::new(format!("Leaf {i}"), format!("hub/{i}.md"), "<p>x</p>")
                    .with_ancestors(["hub.md"]),
            );
        }
        let report = SyncEngine::new(&mock, &store, config()).sync(&docs);

        assert_eq!(report.created(), 21);
        let (hub_id, _) = mock.find("Hub").unwrap();
        for i in 0..20 {
            let (_, leaf) = mock.find(&format!("Leaf {i}")).unwrap();
            assert_eq!(leaf.parent.as_deref(), Some(hub_id.as_str()));
        }
    }

    #[test]
    fn test_parent_failure_skips_descendants_only() {
        let mock = MockConfluence::with_root(ROOT);
        mock.fail("create", "Guide", 500);
        let store = MemoryIdentityStore::new();
        let report = SyncEngine::new(&mock, &store, config()).sync(&tree());

        let SyncOutcome::Failed(error) = outcome(&report, "guide.md") else {
            panic!("guide.md should fail");
        };
        assert_eq!(error.kind(), ErrorKind::ServerError);
        assert!(matches!(
            outcome(&report, "guide/install.md"),
            SyncOutcome::Skipped(SkipReason::ParentFailed { parent }) if parent == "guide.md"
        ));
        assert!(matches!(
            outcome(&report, "guide/install/linux.md"),
            SyncOutcome::Skipped(SkipReason::ParentFailed { .. })
        ));
        assert!(matches!(outcome(&report, "faq.md"), SyncOutcome::Created));
        assert_eq!(
            mock.count(|c| matches!(c, Call::CreatePage { title, .. } if title == "Install")),
            0
        );
    }

    #[test]
    fn test_panicking_client_fails_document_without_hanging() {
        for workers in [1, 4] {
            let mock = MockConfluence::with_root(ROOT);
            mock.panic_on_create("Install");
            let store = MemoryIdentityStore::new();
            let report = SyncEngine::new(&mock, &store, SyncConfig { workers, ..config() })
                .sync(&tree());

            let SyncOutcome::Failed(error) = outcome(&report, "guide/install.md") else {
                panic!("guide/install.md should fail");
            };
            assert_eq!(error.kind(), ErrorKind::Unknown);
            assert!(error.to_string().contains("lost connection state"));
            assert!(matches!(
                outcome(&report, "guide/install/linux.md"),
                SyncOutcome::Skipped(SkipReason::ParentFailed { .. })
            ));
            assert!(matches!(outcome(&report, "guide.md"), SyncOutcome::Created));
            assert!(matches!(outcome(&report, "faq.md"), SyncOutcome::Created));
        }
    }

    #[test]
    fn test_dry_run_makes_no_mutating_calls() {
        let mock = MockConfluence::with_root(ROOT);
        let store = MemoryIdentityStore::new();
        // One existing, changed page and one orphan.
        mock.add_page("500", "FAQ", Some(ROOT), "<p>old</p>");
        mock.add_page("600", "Old", Some(ROOT), "<p>old</p>");
        let store_before = [("faq.md", "500"), ("old.md", "600")];
        for (k, v) in store_before {
            store.set(k, v);
        }

        let docs = tree();
        let report = SyncEngine::new(
            &mock,
            &store,
            SyncConfig {
                dry_run: true,
                delete_orphans: true,
                ..config()
            },
        )
        .sync(&docs);

        assert!(mock.mutating_calls().is_empty());
        assert_eq!(report.created(), 3);
        assert_eq!(report.updated(), 1);
        assert_eq!(report.deleted(), 1);
        assert_eq!(
            report.get("guide/install.md").unwrap().page_id.as_deref(),
            Some(DRY_RUN_PAGE_ID)
        );
        // Simulated pages are never read back.
        assert_eq!(mock.count(|c| *c == Call::GetPage(DRY_RUN_PAGE_ID.to_owned())), 0);
        assert_eq!(store.entries().len(), 2);
    }

    #[test]
    fn test_orphans_deleted_deepest_first() {
        let mock = MockConfluence::with_root(ROOT);
        mock.add_page("1", "Old", Some(ROOT), "");
        mock.add_page("2", "Old child", Some("1"), "");
        let store = MemoryIdentityStore::with_entries([("old.md", "1"), ("old/child.md", "2")]);

        let report = SyncEngine::new(
            &mock,
            &store,
            SyncConfig {
                delete_orphans: true,
                ..config()
            },
        )
        .sync(&tree());

        assert_eq!(report.deleted(), 2);
        let deletes: Vec<Call> = mock
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::DeleteContent(_)))
            .collect();
        assert_eq!(
            deletes,
            vec![
                Call::DeleteContent("2".to_owned()),
                Call::DeleteContent("1".to_owned())
            ]
        );
        assert_eq!(store.get("old.md"), None);
        assert!(mock.page("1").is_none());
    }

    #[test]
    fn test_orphans_kept_without_delete_flag() {
        let mock = MockConfluence::with_root(ROOT);
        mock.add_page("1", "Old", Some(ROOT), "");
        let store = MemoryIdentityStore::with_entries([("old.md", "1")]);

        let report = SyncEngine::new(&mock, &store, config()).sync(&tree());

        assert_eq!(report.deleted(), 0);
        assert!(mock.page("1").is_some());
    }

    #[test]
    fn test_existing_child_with_same_title_is_adopted() {
        let mock = MockConfluence::with_root(ROOT);
        mock.add_page("777", "FAQ", Some(ROOT), "<p>FAQ</p>");
        let store = MemoryIdentityStore::new();

        let report = SyncEngine::new(&mock, &store, config()).sync(&tree());

        assert!(matches!(
            outcome(&report, "faq.md"),
            SyncOutcome::Skipped(SkipReason::Unchanged)
        ));
        assert_eq!(store.get("faq.md").as_deref(), Some("777"));
        assert_eq!(
            mock.count(|c| matches!(c, Call::CreatePage { title, .. } if title == "FAQ")),
            0
        );
    }

    #[test]
    fn test_stale_store_id_recreates_page() {
        let mock = MockConfluence::with_root(ROOT);
        let store = MemoryIdentityStore::with_entries([("faq.md", "999")]);

        let report = SyncEngine::new(&mock, &store, config()).sync(&tree());

        assert!(matches!(outcome(&report, "faq.md"), SyncOutcome::Created));
        let (faq_id, _) = mock.find("FAQ").unwrap();
        assert_eq!(store.get("faq.md"), Some(faq_id));
    }

    #[test]
    fn test_lookup_error_is_not_treated_as_missing() {
        let mock = MockConfluence::with_root(ROOT);
        mock.add_page("500", "FAQ", Some(ROOT), "<p>old</p>");
        mock.fail("get", "500", 401);
        let store = MemoryIdentityStore::with_entries([("faq.md", "500")]);

        let report = SyncEngine::new(&mock, &store, config()).sync(&tree());

        let SyncOutcome::Failed(error) = outcome(&report, "faq.md") else {
            panic!("faq.md should fail");
        };
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(
            mock.count(|c| matches!(c, Call::CreatePage { title, .. } if title == "FAQ")),
            0
        );
    }

    #[test]
    fn test_declared_id_is_used() {
        let mock = MockConfluence::with_root(ROOT);
        mock.add_page("4242", "Anything", Some(ROOT), "");
        let store = MemoryIdentityStore::new();
        let docs = vec![Document::new("FAQ", "faq.md", "<p>FAQ</p>").with_id("4242")];

        let report = SyncEngine::new(&mock, &store, config()).sync(&docs);

        assert!(matches!(outcome(&report, "faq.md"), SyncOutcome::Updated));
        assert_eq!(mock.page("4242").unwrap().title, "FAQ");
        assert_eq!(store.get("faq.md").as_deref(), Some("4242"));
    }

    #[test]
    fn test_title_prefixes() {
        let mock = MockConfluence::with_root(ROOT);
        let store = MemoryIdentityStore::new();
        let docs = vec![
            Document::new("API", "api.md", "<p>api</p>").with_name("API"),
            Document::new("Endpoints", "api/endpoints.md", "<p>e</p>").with_ancestors(["api.md"]),
        ];
        let report = SyncEngine::new(
            &mock,
            &store,
            SyncConfig {
                root_page_name: Some("Docs".to_owned()),
                ..config()
            },
        )
        .sync(&docs);

        assert!(report.is_success());
        assert!(mock.find("[Docs] API").is_some());
        assert!(mock.find("[Docs] [API] Endpoints").is_some());
    }

    #[test]
    fn test_sync_disabled_document_still_parents_children() {
        let mock = MockConfluence::with_root(ROOT);
        mock.add_page("300", "Guide", Some(ROOT), "<p>manual</p>");
        let store = MemoryIdentityStore::new();
        let docs = vec![
            Document::new("Guide", "guide.md", "<p>Guide</p>")
                .with_id("300")
                .with_sync(false),
            Document::new("Install", "guide/install.md", "<p>Install</p>")
                .with_ancestors(["guide.md"]),
            Document::new("Hidden", "hidden.md", "<p>h</p>").with_sync(false),
            Document::new("Under hidden", "hidden/x.md", "<p>x</p>").with_ancestors(["hidden.md"]),
        ];

        let report = SyncEngine::new(&mock, &store, config()).sync(&docs);

        assert!(matches!(
            outcome(&report, "guide.md"),
            SyncOutcome::Skipped(SkipReason::SyncDisabled)
        ));
        assert_eq!(mock.page("300").unwrap().body, "<p>manual</p>");
        let (_, install) = mock.find("Install").unwrap();
        assert_eq!(install.parent.as_deref(), Some("300"));
        assert!(matches!(
            outcome(&report, "hidden/x.md"),
            SyncOutcome::Skipped(SkipReason::ParentFailed { .. })
        ));
    }

    #[test]
    fn test_invalid_documents_fail_validation() {
        let mock = MockConfluence::with_root(ROOT);
        let store = MemoryIdentityStore::new();
        let docs = vec![
            Document::new("", "empty.md", "<p>x</p>"),
            Document::new("Child", "empty/child.md", "<p>x</p>").with_ancestors(["empty.md"]),
            Document::new("A", "a.md", "").with_ancestors(["b.md"]),
            Document::new("B", "b.md", "").with_ancestors(["a.md"]),
        ];

        let report = SyncEngine::new(&mock, &store, config()).sync(&docs);

        for path in ["empty.md", "a.md", "b.md"] {
            let SyncOutcome::Failed(error) = outcome(&report, path) else {
                panic!("{path} should fail");
            };
            assert_eq!(error.kind(), ErrorKind::Validation);
        }
        assert!(matches!(
            outcome(&report, "empty/child.md"),
            SyncOutcome::Skipped(SkipReason::ParentFailed { .. })
        ));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_content_is_transformed() {
        let mock = MockConfluence::with_root(ROOT);
        let store = MemoryIdentityStore::new();
        let docs = vec![Document::new(
            "Warn",
            "warn.md",
            "<blockquote><p>[!WARNING]\nDo not do X</p></blockquote>",
        )];
        SyncEngine::new(
            &mock,
            &store,
            SyncConfig {
                transform: crate::storage::TransformOptions {
                    code_blocks: true,
                    notice_message: Some("Generated from {relative_path}".to_owned()),
                },
                ..config()
            },
        )
        .sync(&docs);

        let (_, page) = mock.find("Warn").unwrap();
        assert_eq!(
            page.body,
            concat!(
                "<p><em>Generated from warn.md</em></p>",
                r#"<ac:structured-macro ac:name="warning">"#,
                r#"<ac:parameter ac:name="title">Warning</ac:parameter>"#,
                "<ac:rich-text-body><p>Do not do X</p></ac:rich-text-body>",
                "</ac:structured-macro>"
            )
        );
    }

    #[test]
    fn test_attachments_replaced_by_name() {
        let mock = MockConfluence::with_root(ROOT);
        let store = MemoryIdentityStore::new();
        let file = AttachmentFile {
            filename: "diagram.png".to_owned(),
            data: vec![1, 2, 3],
            content_type: "image/png".to_owned(),
        };
        let engine = SyncEngine::new(&mock, &store, config());

        let first = vec![Document::new("Pic", "pic.md", "<p>v1</p>").with_attachment(file.clone())];
        engine.sync(&first);
        let second = vec![Document::new("Pic", "pic.md", "<p>v2</p>").with_attachment(file)];
        let report = engine.sync(&second);

        assert!(report.is_success());
        let (pic_id, _) = mock.find("Pic").unwrap();
        assert_eq!(mock.attachment_names(&pic_id), vec!["diagram.png"]);
        assert_eq!(
            mock.count(|c| matches!(c, Call::CreateAttachments { .. })),
            2
        );
    }

    #[test]
    fn test_attachment_failure_fails_document() {
        let mock = MockConfluence::with_root(ROOT);
        let store = MemoryIdentityStore::new();
        mock.add_page("55", "Pic", Some(ROOT), "<p>old</p>");
        mock.fail("attach", "55", 500);
        let docs = vec![
            Document::new("Pic", "pic.md", "<p>new</p>").with_attachment(AttachmentFile {
                filename: "a.png".to_owned(),
                data: vec![0],
                content_type: "image/png".to_owned(),
            }),
        ];

        let report = SyncEngine::new(&mock, &store, config()).sync(&docs);

        let SyncOutcome::Failed(error) = outcome(&report, "pic.md") else {
            panic!("pic.md should fail");
        };
        assert!(matches!(error, ConfluenceError::AttachmentCreateFailed { .. }));
    }

    #[test]
    fn test_cancel_before_start_skips_everything() {
        let mock = MockConfluence::with_root(ROOT);
        let store = MemoryIdentityStore::new();
        let engine = SyncEngine::new(&mock, &store, config());
        engine.cancel_handle().cancel();

        let report = engine.sync(&tree());

        assert_eq!(report.skipped(), 4);
        assert!(report.results.iter().all(|r| matches!(
            r.outcome,
            SyncOutcome::Skipped(SkipReason::Cancelled)
        )));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_update_conflict_is_reported() {
        let mock = MockConfluence::with_root(ROOT);
        mock.add_page("500", "FAQ", Some(ROOT), "<p>old</p>");
        mock.fail("update", "500", 409);
        let store = MemoryIdentityStore::with_entries([("faq.md", "500")]);

        let report = SyncEngine::new(&mock, &store, config()).sync(&tree());

        let SyncOutcome::Failed(error) = outcome(&report, "faq.md") else {
            panic!("faq.md should fail");
        };
        assert_eq!(error.transport().and_then(|t| t.status()), Some(409));
        assert_eq!(mock.count(|c| matches!(c, Call::UpdatePage { .. })), 1);
    }
}
