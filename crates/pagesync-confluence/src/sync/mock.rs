//! In-memory Confluence used by engine tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::client::ConfluenceApi;
use crate::error::{ConfluenceError, TransportError};
use crate::types::{Attachment, AttachmentFile, CreatePage, Page, PageRef, UpdatePage};

/// Recorded client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    GetPage(String),
    CreatePage { title: String, parent: Option<String> },
    UpdatePage { id: String, version: u32 },
    DeleteContent(String),
    GetAttachments(String),
    CreateAttachments { id: String, files: Vec<String> },
}

impl Call {
    pub(crate) fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::CreatePage { .. }
                | Self::UpdatePage { .. }
                | Self::DeleteContent(_)
                | Self::CreateAttachments { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MockPage {
    pub(crate) title: String,
    pub(crate) version: u32,
    pub(crate) parent: Option<String>,
    pub(crate) body: String,
}

#[derive(Debug, Default)]
struct State {
    pages: BTreeMap<String, MockPage>,
    attachments: HashMap<String, Vec<Attachment>>,
    next_id: u64,
    calls: Vec<Call>,
    /// Injected failures: `(operation, key)` to HTTP status.
    failures: HashMap<(&'static str, String), u16>,
    /// Page titles whose creation panics.
    panicking_creates: HashSet<String>,
}

/// Fake Confluence holding pages in memory and recording every call.
#[derive(Debug, Default)]
pub(crate) struct MockConfluence {
    state: Mutex<State>,
}

impl MockConfluence {
    /// Mock with one root page.
    pub(crate) fn with_root(id: &str) -> Self {
        let mock = Self::default();
        mock.add_page(id, "Root", None, "");
        mock
    }

    pub(crate) fn add_page(&self, id: &str, title: &str, parent: Option<&str>, body: &str) {
        self.lock().pages.insert(
            id.to_owned(),
            MockPage {
                title: title.to_owned(),
                version: 1,
                parent: parent.map(str::to_owned),
                body: body.to_owned(),
            },
        );
    }

    pub(crate) fn page(&self, id: &str) -> Option<MockPage> {
        self.lock().pages.get(id).cloned()
    }

    /// Page with this title, if exactly one exists.
    pub(crate) fn find(&self, title: &str) -> Option<(String, MockPage)> {
        let state = self.lock();
        let mut matches = state.pages.iter().filter(|(_, p)| p.title == title);
        let found = matches.next().map(|(id, p)| (id.clone(), p.clone()));
        if matches.next().is_some() { None } else { found }
    }

    pub(crate) fn page_count(&self) -> usize {
        self.lock().pages.len()
    }

    pub(crate) fn attachment_names(&self, id: &str) -> Vec<String> {
        self.lock()
            .attachments
            .get(id)
            .map(|list| list.iter().map(|a| a.title.clone()).collect())
            .unwrap_or_default()
    }

    /// Make `operation` on `key` (page ID, or title for creates) fail.
    pub(crate) fn fail(&self, operation: &'static str, key: &str, status: u16) {
        self.lock().failures.insert((operation, key.to_owned()), status);
    }

    /// Make creating a page titled `title` panic.
    pub(crate) fn panic_on_create(&self, title: &str) {
        self.lock().panicking_creates.insert(title.to_owned());
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub(crate) fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn injected(&self, operation: &'static str, key: &str) -> Result<(), TransportError> {
        match self.failures.get(&(operation, key.to_owned())) {
            Some(&status) => Err(TransportError::from_status(status, "injected")),
            None => Ok(()),
        }
    }

    fn new_id(&mut self) -> String {
        self.next_id += 1;
        (20_000 + self.next_id).to_string()
    }

    fn chain(&self, id: &str) -> Vec<PageRef> {
        let mut chain = Vec::new();
        let mut current = self.pages.get(id).and_then(|p| p.parent.clone());
        while let Some(parent_id) = current {
            let parent = self.pages.get(&parent_id);
            chain.push(PageRef {
                id: parent_id.clone(),
                title: parent.map(|p| p.title.clone()).unwrap_or_default(),
            });
            current = parent.and_then(|p| p.parent.clone());
        }
        chain.reverse();
        chain
    }

    fn to_page(&self, id: &str) -> Option<Page> {
        let page = self.pages.get(id)?;
        Some(Page {
            id: id.to_owned(),
            title: page.title.clone(),
            version: page.version,
            ancestors: self.chain(id),
            children: self
                .pages
                .iter()
                .filter(|(_, p)| p.parent.as_deref() == Some(id))
                .map(|(child_id, p)| PageRef {
                    id: child_id.clone(),
                    title: p.title.clone(),
                })
                .collect(),
            body: Some(page.body.clone()),
        })
    }
}

impl ConfluenceApi for MockConfluence {
    fn get_page(&self, id: &str) -> Result<Page, ConfluenceError> {
        let mut state = self.lock();
        state.calls.push(Call::GetPage(id.to_owned()));
        let not_found = |source| ConfluenceError::NotFound {
            id: id.to_owned(),
            source,
        };
        state.injected("get", id).map_err(not_found)?;
        state
            .to_page(id)
            .ok_or_else(|| not_found(TransportError::from_status(404, "no content")))
    }

    fn create_page(&self, page: &CreatePage) -> Result<Page, ConfluenceError> {
        if self.lock().panicking_creates.contains(&page.title) {
            panic!("lost connection state creating {}", page.title);
        }
        let mut state = self.lock();
        let parent = page.ancestors.last().cloned();
        state.calls.push(Call::CreatePage {
            title: page.title.clone(),
            parent: parent.clone(),
        });
        state
            .injected("create", &page.title)
            .map_err(|source| ConfluenceError::CreateFailed {
                title: page.title.clone(),
                source,
            })?;

        let id = state.new_id();
        state.pages.insert(
            id.clone(),
            MockPage {
                title: page.title.clone(),
                version: 1,
                parent,
                body: page.content.clone(),
            },
        );
        Ok(state.to_page(&id).unwrap())
    }

    fn update_page(&self, page: &UpdatePage) -> Result<Page, ConfluenceError> {
        let mut state = self.lock();
        state.calls.push(Call::UpdatePage {
            id: page.id.clone(),
            version: page.version,
        });
        let failed = |source| ConfluenceError::UpdateFailed {
            id: page.id.clone(),
            title: page.title.clone(),
            source,
        };
        state.injected("update", &page.id).map_err(failed)?;

        let Some(existing) = state.pages.get_mut(&page.id) else {
            return Err(failed(TransportError::from_status(404, "no content")));
        };
        if existing.version != page.version {
            return Err(ConfluenceError::Conflict {
                id: page.id.clone(),
                source: TransportError::from_status(409, "version mismatch"),
            });
        }
        existing.version += 1;
        existing.title.clone_from(&page.title);
        existing.body.clone_from(&page.content);
        existing.parent = page.ancestors.last().cloned();
        Ok(state.to_page(&page.id).unwrap())
    }

    fn delete_content(&self, id: &str) -> Result<(), ConfluenceError> {
        let mut state = self.lock();
        state.calls.push(Call::DeleteContent(id.to_owned()));
        state
            .injected("delete", id)
            .map_err(|source| ConfluenceError::DeleteFailed {
                id: id.to_owned(),
                source,
            })?;
        state.pages.remove(id);
        for list in state.attachments.values_mut() {
            list.retain(|a| a.id != id);
        }
        Ok(())
    }

    fn get_attachments(&self, id: &str) -> Result<Vec<Attachment>, ConfluenceError> {
        let mut state = self.lock();
        state.calls.push(Call::GetAttachments(id.to_owned()));
        Ok(state.attachments.get(id).cloned().unwrap_or_default())
    }

    fn create_attachments(&self, id: &str, files: &[AttachmentFile]) -> Result<(), ConfluenceError> {
        let mut state = self.lock();
        state.calls.push(Call::CreateAttachments {
            id: id.to_owned(),
            files: files.iter().map(|f| f.filename.clone()).collect(),
        });
        state
            .injected("attach", id)
            .map_err(|source| ConfluenceError::AttachmentCreateFailed {
                id: id.to_owned(),
                source,
            })?;
        let mut created = Vec::new();
        for file in files {
            let att_id = format!("att{}", state.new_id());
            created.push(Attachment {
                id: att_id,
                title: file.filename.clone(),
            });
        }
        state.attachments.entry(id.to_owned()).or_default().extend(created);
        Ok(())
    }
}
