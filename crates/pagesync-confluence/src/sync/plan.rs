//! Dependency resolution and ordering of a document set.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use super::document::Document;
use crate::error::ConfluenceError;

/// Where a document attaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Parent {
    /// Directly under the configured root page.
    Root,
    /// Under an existing remote page.
    Remote(String),
    /// Under another document of the same run.
    Document(usize),
}

/// Ordering and dependency data for one run.
#[derive(Debug)]
pub(super) struct Plan {
    /// Immediate parent of each document.
    pub(super) parents: Vec<Parent>,
    /// Ancestor documents of each document, in ancestor order.
    pub(super) deps: Vec<Vec<usize>>,
    /// Dispatch priority: parents strictly before children. Documents blocked
    /// behind a cycle come last.
    pub(super) order: Vec<usize>,
    /// Documents rejected before any remote call.
    pub(super) rejected: Vec<Option<ConfluenceError>>,
}

impl Plan {
    pub(super) fn build(documents: &[Document]) -> Self {
        let mut by_path: HashMap<&str, usize> = HashMap::new();
        for (i, doc) in documents.iter().enumerate() {
            by_path.entry(doc.relative_path.as_str()).or_insert(i);
            by_path.entry(doc.path.as_str()).or_insert(i);
        }

        let mut rejected: Vec<Option<ConfluenceError>> = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| validate(doc, by_path.get(doc.relative_path.as_str()) != Some(&i)))
            .collect();

        let mut parents = Vec::with_capacity(documents.len());
        let mut deps = Vec::with_capacity(documents.len());
        for doc in documents {
            let mut doc_deps: Vec<usize> = Vec::new();
            for ancestor in &doc.ancestors {
                if let Some(&j) = by_path.get(ancestor.as_str())
                    && !doc_deps.contains(&j)
                {
                    doc_deps.push(j);
                }
            }
            parents.push(match doc.ancestors.last() {
                None => Parent::Root,
                Some(last) => by_path
                    .get(last.as_str())
                    .map_or_else(|| Parent::Remote(last.clone()), |&j| Parent::Document(j)),
            });
            deps.push(doc_deps);
        }

        let mut order = topological_order(&deps);
        if order.len() < documents.len() {
            let placed: Vec<bool> = {
                let mut placed = vec![false; documents.len()];
                for &i in &order {
                    placed[i] = true;
                }
                placed
            };
            for i in (0..documents.len()).filter(|&i| !placed[i]) {
                if reaches(&deps, &placed, i, i) {
                    debug!("{} is part of an ancestor cycle", documents[i].path);
                    rejected[i] = Some(ConfluenceError::validation(
                        &documents[i].path,
                        "ancestor chain contains a cycle",
                    ));
                }
                order.push(i);
            }
        }

        Self {
            parents,
            deps,
            order,
            rejected,
        }
    }
}

fn validate(doc: &Document, duplicate: bool) -> Option<ConfluenceError> {
    if doc.title.trim().is_empty() {
        return Some(ConfluenceError::validation(&doc.path, "title is empty"));
    }
    if doc.relative_path.is_empty() {
        return Some(ConfluenceError::validation(&doc.path, "relative path is empty"));
    }
    if duplicate {
        return Some(ConfluenceError::validation(
            &doc.path,
            format!("duplicate relative path {}", doc.relative_path),
        ));
    }
    None
}

/// Kahn's algorithm over `deps`; ties keep input order.
fn topological_order(deps: &[Vec<usize>]) -> Vec<usize> {
    let mut indegree: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); deps.len()];
    for (i, doc_deps) in deps.iter().enumerate() {
        for &j in doc_deps {
            dependents[j].push(i);
        }
    }

    let mut queue: VecDeque<usize> = (0..deps.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(deps.len());
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &child in &dependents[i] {
            indegree[child] -= 1;
            if indegree[child] == 0 {
                queue.push_back(child);
            }
        }
    }
    order
}

/// Whether `target` is reachable from `from` through unplaced documents.
fn reaches(deps: &[Vec<usize>], placed: &[bool], from: usize, target: usize) -> bool {
    let mut seen = vec![false; deps.len()];
    let mut stack: Vec<usize> = deps[from].clone();
    while let Some(i) = stack.pop() {
        if i == target {
            return true;
        }
        if placed[i] || seen[i] {
            continue;
        }
        seen[i] = true;
        stack.extend(deps[i].iter().copied());
    }
    false
}

/// Final page title: root name, then ancestor short names, then the title.
///
/// `[Docs] [API] Endpoints`
pub(super) fn page_title(
    root_page_name: Option<&str>,
    documents: &[Document],
    deps: &[usize],
    title: &str,
) -> String {
    let mut out = String::new();
    let names = root_page_name
        .into_iter()
        .chain(deps.iter().filter_map(|&j| documents[j].name.as_deref()));
    for name in names.filter(|n| !n.is_empty()) {
        out.push('[');
        out.push_str(name);
        out.push_str("] ");
    }
    out.push_str(title);
    out
}
