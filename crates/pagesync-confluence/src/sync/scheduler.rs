//! Dispatch loop for document jobs.
//!
//! The coordinator runs on the calling thread. It hands ready documents to
//! workers and collects their completions over a channel. A document is ready
//! when every ancestor document finished with a remote page ID and no other
//! job currently holds the same remote ID.

use std::collections::HashSet;
use std::sync::mpsc::Receiver;

use tracing::{debug, info};

use super::CancelHandle;
use super::document::Document;
use super::plan::{Parent, Plan};
use super::result::{SkipReason, SyncOutcome, SyncResult};

/// Resolved position of a page in the remote tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Anchor {
    /// Page ID.
    pub(super) id: String,
    /// Ancestor IDs from the top down to this page, inclusive.
    pub(super) chain: Vec<String>,
    /// The page only exists in a dry run.
    pub(super) simulated: bool,
}

impl Anchor {
    pub(super) fn remote(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            chain: vec![id.to_owned()],
            simulated: false,
        }
    }

    /// Anchor of a child page `id` placed under `self`.
    pub(super) fn child(&self, id: &str, simulated: bool) -> Self {
        let mut chain = self.chain.clone();
        chain.push(id.to_owned());
        Self {
            id: id.to_owned(),
            chain,
            simulated: self.simulated || simulated,
        }
    }
}

/// One document handed to a worker.
#[derive(Debug)]
pub(super) struct Job {
    pub(super) index: usize,
    pub(super) parent: Anchor,
}

/// A worker's completion message.
#[derive(Debug)]
pub(super) struct Finished {
    pub(super) index: usize,
    pub(super) result: SyncResult,
    /// Where descendants attach; `None` when the document has no page.
    pub(super) anchor: Option<Anchor>,
}

#[derive(Debug)]
enum Slot {
    Pending,
    Running { remote_id: Option<String> },
    Done { anchor: Option<Anchor> },
}

pub(super) struct Coordinator<'a> {
    documents: &'a [Document],
    plan: Plan,
    root: Anchor,
    slots: Vec<Slot>,
    results: Vec<Option<SyncResult>>,
    in_flight: HashSet<String>,
    running: usize,
}

impl<'a> Coordinator<'a> {
    pub(super) fn new(documents: &'a [Document], mut plan: Plan, root: Anchor) -> Self {
        let rejected = std::mem::take(&mut plan.rejected);
        let mut coordinator = Self {
            documents,
            slots: documents.iter().map(|_| Slot::Pending).collect(),
            results: documents.iter().map(|_| None).collect(),
            plan,
            root,
            in_flight: HashSet::new(),
            running: 0,
        };
        for (i, error) in rejected.into_iter().enumerate() {
            if let Some(error) = error {
                coordinator.complete(i, SyncOutcome::Failed(error), None, None);
            }
        }
        coordinator
    }

    /// Run until every document reached a terminal state.
    ///
    /// `known_id` reports the remote ID a document is expected to touch, used
    /// to keep two jobs off the same page. `dispatch` starts a job; its
    /// completion must arrive on `done`.
    pub(super) fn run(
        mut self,
        workers: usize,
        cancel: &CancelHandle,
        known_id: impl Fn(&Document) -> Option<String>,
        mut dispatch: impl FnMut(Job),
        done: &Receiver<Finished>,
    ) -> Vec<SyncResult> {
        let workers = workers.max(1);

        loop {
            if cancel.is_cancelled() {
                self.cancel_pending();
            } else {
                while self.running < workers {
                    let Some(job) = self.next_ready(&known_id) else {
                        break;
                    };
                    self.running += 1;
                    dispatch(job);
                }
            }

            if self.running == 0 {
                break;
            }
            match done.recv() {
                Ok(finished) => self.finish(finished),
                Err(_) => break,
            }
        }

        self.strand_pending();
        self.results.into_iter().flatten().collect()
    }

    /// Next dispatchable document in plan order.
    ///
    /// Documents whose ancestors failed are completed as skipped on the way.
    fn next_ready(&mut self, known_id: &impl Fn(&Document) -> Option<String>) -> Option<Job> {
        for pos in 0..self.plan.order.len() {
            let i = self.plan.order[pos];
            if !matches!(self.slots[i], Slot::Pending) {
                continue;
            }

            match self.dependency_state(i) {
                DependencyState::Waiting => continue,
                DependencyState::Failed(j) => {
                    let parent = self.documents[j].path.clone();
                    debug!("{} skipped, ancestor {parent} has no page", self.documents[i].path);
                    self.complete(
                        i,
                        SyncOutcome::Skipped(SkipReason::ParentFailed { parent }),
                        None,
                        None,
                    );
                    continue;
                }
                DependencyState::Ready => {}
            }

            let remote_id = known_id(&self.documents[i]);
            if let Some(id) = &remote_id
                && self.in_flight.contains(id)
            {
                debug!("{} waits for page {id}", self.documents[i].path);
                continue;
            }

            let parent = match &self.plan.parents[i] {
                Parent::Root => self.root.clone(),
                Parent::Remote(id) => Anchor::remote(id),
                Parent::Document(j) => match &self.slots[*j] {
                    Slot::Done {
                        anchor: Some(anchor),
                    } => anchor.clone(),
                    _ => continue,
                },
            };

            if let Some(id) = &remote_id {
                self.in_flight.insert(id.clone());
            }
            self.slots[i] = Slot::Running { remote_id };
            return Some(Job { index: i, parent });
        }
        None
    }

    fn dependency_state(&self, i: usize) -> DependencyState {
        for &j in &self.plan.deps[i] {
            match &self.slots[j] {
                Slot::Done { anchor: Some(_) } => {}
                Slot::Done { anchor: None } => return DependencyState::Failed(j),
                Slot::Pending | Slot::Running { .. } => return DependencyState::Waiting,
            }
        }
        DependencyState::Ready
    }

    fn finish(&mut self, finished: Finished) {
        if let Slot::Running {
            remote_id: Some(id),
        } = &self.slots[finished.index]
        {
            self.in_flight.remove(id);
        }
        self.running -= 1;
        let page_id = finished.result.page_id.clone();
        self.results[finished.index] = Some(finished.result);
        self.slots[finished.index] = Slot::Done {
            anchor: finished.anchor,
        };
        debug!(
            "{} finished (page {})",
            self.documents[finished.index].path,
            page_id.as_deref().unwrap_or("-")
        );
    }

    fn complete(
        &mut self,
        i: usize,
        outcome: SyncOutcome,
        page_id: Option<String>,
        anchor: Option<Anchor>,
    ) {
        let doc = &self.documents[i];
        self.results[i] = Some(SyncResult {
            path: doc.path.clone(),
            relative_path: doc.relative_path.clone(),
            page_id,
            outcome,
        });
        self.slots[i] = Slot::Done { anchor };
    }

    fn cancel_pending(&mut self) {
        let pending: Vec<usize> = (0..self.slots.len())
            .filter(|&i| matches!(self.slots[i], Slot::Pending))
            .collect();
        if !pending.is_empty() {
            info!("Cancelled, {} documents not started", pending.len());
        }
        for i in pending {
            self.complete(i, SyncOutcome::Skipped(SkipReason::Cancelled), None, None);
        }
    }

    /// Complete documents that can no longer be dispatched.
    fn strand_pending(&mut self) {
        for i in 0..self.slots.len() {
            if matches!(self.slots[i], Slot::Pending) {
                let parent = self.plan.deps[i]
                    .first()
                    .map(|&j| self.documents[j].path.clone())
                    .unwrap_or_default();
                self.complete(
                    i,
                    SyncOutcome::Skipped(SkipReason::ParentFailed { parent }),
                    None,
                    None,
                );
            }
        }
    }
}

enum DependencyState {
    Ready,
    Waiting,
    /// Ancestor document at this index has no page.
    Failed(usize),
}
