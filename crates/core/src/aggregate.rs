//! Read-only aggregation over a materialised progress subtree.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::progress::{ItemProgressState, ItemStatus, JobType, ProgressNode};
use crate::types::ItemId;

/// Union of the per-item progress reported by every `DomainFetch` job in
/// the subtree rooted at `node`.
///
/// Children are visited in id order; when two jobs report the same item the
/// later one wins. An item is expected to belong to a single fetch job at a
/// time, so in practice the sets are disjoint.
pub fn collect_item_progress(node: &ProgressNode) -> BTreeMap<ItemId, ItemProgressState> {
    let mut items = BTreeMap::new();
    collect_into(node, &mut items);
    items
}

fn collect_into(node: &ProgressNode, items: &mut BTreeMap<ItemId, ItemProgressState>) {
    if node.job_type == JobType::DomainFetch {
        items.extend(
            node.metrics
                .entry_progress
                .iter()
                .map(|(id, state)| (id.clone(), state.clone())),
        );
    }
    for child in node.children.values() {
        collect_into(child, items);
    }
}

/// Number of items in each [`ItemStatus`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: u32,
    pub fetching: u32,
    pub fetched: u32,
    pub distilling: u32,
    pub completed: u32,
    pub error: u32,
}

impl StatusCounts {
    pub fn total(&self) -> u32 {
        [self.pending, self.fetching, self.fetched]
            .into_iter()
            .chain([self.distilling, self.completed, self.error])
            .fold(0, u32::saturating_add)
    }

    /// Items whose content has been downloaded (fetched or any later phase).
    pub fn fetched_or_later(&self) -> u32 {
        self.fetched
            .saturating_add(self.distilling)
            .saturating_add(self.completed)
    }

    /// Items that reached a final state, successfully or not.
    pub fn finished(&self) -> u32 {
        self.completed.saturating_add(self.error)
    }
}

pub fn count_by_status<'a, I>(items: I) -> StatusCounts
where
    I: IntoIterator<Item = &'a ItemProgressState>,
{
    let mut counts = StatusCounts::default();
    for item in items {
        let slot = match item.status {
            ItemStatus::Pending => &mut counts.pending,
            ItemStatus::Fetching => &mut counts.fetching,
            ItemStatus::Fetched => &mut counts.fetched,
            ItemStatus::Distilling => &mut counts.distilling,
            ItemStatus::Completed => &mut counts.completed,
            ItemStatus::Error => &mut counts.error,
        };
        *slot = slot.saturating_add(1);
    }
    counts
}
