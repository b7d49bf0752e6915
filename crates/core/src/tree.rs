//! Incrementally rebuilt forest of [`ProgressNode`]s.
//!
//! Nodes are stored flat, keyed by id. The parent → children relation is an
//! index derived from each node's `parent_id`, so an update to a parent never
//! touches its children, and a child that arrives before its parent (an
//! *orphan*) shows up under the parent as soon as the parent is observed.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::CoreError;
use crate::progress::{JobStatus, ProgressNode};
use crate::types::{JobId, Timestamp};

/// What [`ProgressTree::apply_update`] did with the incoming node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First event for this id.
    Inserted,
    /// Fields replaced.
    Updated,
    /// Identical to the stored node; nothing changed.
    Unchanged,
    /// A terminal node went back to `running`: a new attempt, updated in place.
    Restarted,
}

/// Session-scoped progress state, keyed by job id.
#[derive(Debug, Clone, Default)]
pub struct ProgressTree {
    nodes: BTreeMap<JobId, ProgressNode>,
    /// Parent id → child ids. Entries may point at parents that have not
    /// been observed yet.
    children: BTreeMap<JobId, BTreeSet<JobId>>,
}

impl ProgressTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one progress document into the tree.
    ///
    /// Scalar fields of the stored node are replaced wholesale. Nested
    /// `children` carried by the document are flattened and merged one by
    /// one, inheriting the enclosing node as parent when they name none.
    ///
    /// An update that would make a node its own ancestor is rejected and
    /// leaves the tree untouched for that node.
    pub fn apply_update(&mut self, mut node: ProgressNode) -> Result<MergeOutcome, CoreError> {
        let nested = std::mem::take(&mut node.children);
        let id = node.id.clone();
        let outcome = self.upsert(node)?;

        for mut child in nested.into_values() {
            if child.parent_id.is_none() {
                child.parent_id = Some(id.clone());
            }
            self.apply_update(child)?;
        }

        Ok(outcome)
    }

    fn upsert(&mut self, node: ProgressNode) -> Result<MergeOutcome, CoreError> {
        if let Some(parent_id) = node.parent_id.as_deref() {
            if self.would_cycle(&node.id, parent_id) {
                return Err(CoreError::Validation(format!(
                    "job {} cannot be placed under {parent_id}: it would become its own ancestor",
                    node.id
                )));
            }
        }

        let previous = self.nodes.get(&node.id);
        let outcome = match previous {
            None => MergeOutcome::Inserted,
            Some(prev) if *prev == node => return Ok(MergeOutcome::Unchanged),
            Some(prev) if prev.status.is_terminal() && node.status == JobStatus::Running => {
                MergeOutcome::Restarted
            }
            Some(_) => MergeOutcome::Updated,
        };

        let old_parent = previous.and_then(|prev| prev.parent_id.clone());
        if old_parent != node.parent_id {
            if let Some(old_parent) = old_parent {
                self.unlink(&old_parent, &node.id);
            }
            if let Some(new_parent) = &node.parent_id {
                self.children
                    .entry(new_parent.clone())
                    .or_default()
                    .insert(node.id.clone());
            }
        }

        self.nodes.insert(node.id.clone(), node);
        Ok(outcome)
    }

    /// True if `parent_id` is `id` itself or one of its descendants.
    fn would_cycle(&self, id: &str, parent_id: &str) -> bool {
        let mut current = Some(parent_id);
        // Bounded by the node count; the tree is acyclic so this always ends.
        for _ in 0..=self.nodes.len() {
            match current {
                Some(ancestor) if ancestor == id => return true,
                Some(ancestor) => {
                    current = self
                        .nodes
                        .get(ancestor)
                        .and_then(|n| n.parent_id.as_deref());
                }
                None => return false,
            }
        }
        true
    }

    fn unlink(&mut self, parent_id: &str, child_id: &str) {
        if let Some(set) = self.children.get_mut(parent_id) {
            set.remove(child_id);
            if set.is_empty() {
                self.children.remove(parent_id);
            }
        }
    }

    /// Stored node without its derived children.
    pub fn get(&self, id: &str) -> Option<&ProgressNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of the direct children of `id`, including ones observed before
    /// `id` itself.
    pub fn child_ids(&self, id: &str) -> impl Iterator<Item = &JobId> {
        self.children.get(id).into_iter().flatten()
    }

    /// Snapshot of `id` with its whole descendant subtree attached.
    pub fn materialize(&self, id: &str) -> Option<ProgressNode> {
        let mut node = self.nodes.get(id)?.clone();
        for child_id in self.child_ids(id) {
            if let Some(child) = self.materialize(child_id) {
                node.children.insert(child_id.clone(), child);
            }
        }
        Some(node)
    }

    /// Top-level jobs: nodes that declare no parent.
    pub fn roots(&self) -> Vec<&JobId> {
        self.nodes
            .values()
            .filter(|n| n.parent_id.is_none())
            .map(|n| &n.id)
            .collect()
    }

    /// Nodes whose declared parent has not been observed yet.
    pub fn orphans(&self) -> Vec<&JobId> {
        self.nodes
            .values()
            .filter(|n| {
                n.parent_id
                    .as_deref()
                    .is_some_and(|p| !self.nodes.contains_key(p))
            })
            .map(|n| &n.id)
            .collect()
    }

    /// Remove `id` and every descendant. Returns the number of nodes removed.
    pub fn remove(&mut self, id: &str) -> usize {
        let Some(node) = self.nodes.remove(id) else {
            return 0;
        };
        if let Some(parent_id) = node.parent_id.as_deref() {
            self.unlink(parent_id, id);
        }

        let mut removed = 1;
        let mut pending: Vec<JobId> = self
            .children
            .remove(id)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();

        while let Some(child_id) = pending.pop() {
            if self.nodes.remove(&child_id).is_some() {
                removed += 1;
            }
            if let Some(grandchildren) = self.children.remove(&child_id) {
                pending.extend(grandchildren);
            }
        }

        removed
    }

    /// Drop orphans (and anything under them) whose last update is older
    /// than `max_age`. Returns the number of nodes removed.
    pub fn prune_orphans(&mut self, max_age: chrono::Duration, now: Timestamp) -> usize {
        let stale: Vec<JobId> = self
            .orphans()
            .into_iter()
            .filter(|id| {
                self.nodes
                    .get(id.as_str())
                    .is_some_and(|n| now - n.updated_at > max_age)
            })
            .cloned()
            .collect();

        stale.iter().map(|id| self.remove(id)).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
