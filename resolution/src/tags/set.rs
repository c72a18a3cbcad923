//! The set of tags attached to a topic

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Opaque forum tag identifier.
pub type TagId = u64;

/// Direction of a tag membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagChangeKind {
    Added,
    Removed,
}

/// One effective membership change, recorded for the topic-tag mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagChange {
    pub tag_id: TagId,
    pub kind: TagChangeKind,
}

/// Tags attached to a topic.
///
/// Add and remove are idempotent; only calls that change membership are
/// recorded in the pending change log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagSet {
    tags: BTreeSet<TagId>,
    #[serde(skip)]
    changes: Vec<TagChange>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, tag: TagId) -> bool {
        self.tags.contains(&tag)
    }

    /// Add a tag. Returns true when the tag was not already present.
    pub fn add(&mut self, tag: TagId) -> bool {
        let inserted = self.tags.insert(tag);
        if inserted {
            self.changes.push(TagChange {
                tag_id: tag,
                kind: TagChangeKind::Added,
            });
        }
        inserted
    }

    /// Remove a tag. Returns true when the tag was present.
    pub fn remove(&mut self, tag: TagId) -> bool {
        let removed = self.tags.remove(&tag);
        if removed {
            self.changes.push(TagChange {
                tag_id: tag,
                kind: TagChangeKind::Removed,
            });
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = TagId> + '_ {
        self.tags.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Changes recorded since the last drain.
    pub fn pending_changes(&self) -> &[TagChange] {
        &self.changes
    }

    /// Drain the change log, typically after the topic has been persisted.
    pub fn take_changes(&mut self) -> Vec<TagChange> {
        std::mem::take(&mut self.changes)
    }
}

impl PartialEq for TagSet {
    fn eq(&self, other: &Self) -> bool {
        self.tags == other.tags
    }
}

impl Eq for TagSet {}

impl FromIterator<TagId> for TagSet {
    fn from_iter<I: IntoIterator<Item = TagId>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().collect(),
            changes: Vec::new(),
        }
    }
}
