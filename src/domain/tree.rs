//! Reply-tree materialization over an arena of comment records.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::domain::entities::CommentRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub record: CommentRecord,
    pub children: Vec<CommentNode>,
}

impl CommentNode {
    /// Number of comments in this subtree, including the root.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(CommentNode::subtree_len)
            .sum::<usize>()
    }
}

/// Comment records indexed by id.
///
/// Records are loaded level by level (see [`CommentArena::pending_children`])
/// and then assembled into trees following each record's `reply_ids` order.
#[derive(Debug, Default)]
pub struct CommentArena {
    records: HashMap<Uuid, CommentRecord>,
}

impl CommentArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: CommentRecord) {
        self.records.insert(record.id, record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = CommentRecord>) {
        for record in records {
            self.insert(record);
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<&CommentRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Reply ids referenced by `parents` that are not loaded yet.
    pub fn pending_children(&self, parents: &[Uuid]) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        parents
            .iter()
            .filter_map(|id| self.records.get(id))
            .flat_map(|record| record.reply_ids.iter().copied())
            .filter(|id| !self.records.contains_key(id) && seen.insert(*id))
            .collect()
    }

    pub fn author_ids(&self) -> HashSet<Uuid> {
        self.records.values().map(|record| record.author_id).collect()
    }

    /// Build the subtree rooted at `root`.
    ///
    /// Reply ids without a loaded record are skipped, as are levels deeper
    /// than `max_depth` below the root, which bounds the walk even if stored
    /// data forms a cycle.
    pub fn assemble(&self, root: Uuid, max_depth: u8) -> Option<CommentNode> {
        self.assemble_at(root, 0, max_depth)
    }

    fn assemble_at(&self, id: Uuid, level: u8, max_depth: u8) -> Option<CommentNode> {
        let record = self.records.get(&id)?;
        let children = if level < max_depth {
            record
                .reply_ids
                .iter()
                .filter_map(|child| self.assemble_at(*child, level + 1, max_depth))
                .collect()
        } else {
            Vec::new()
        };

        Some(CommentNode {
            record: record.clone(),
            children,
        })
    }
}
