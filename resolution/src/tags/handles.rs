//! Tag names resolved once to forum tag ids

use std::collections::HashMap;

use crate::error::ForumResult;
use crate::forum::ForumStore;

use super::set::{TagId, TagSet};
use super::vocabulary::TagName;

/// The whole vocabulary resolved to forum tag ids.
///
/// Built once at startup with [`TagHandles::resolve`]; afterwards evaluator and
/// conversation code pass [`TagName`]s and never look tags up by string.
#[derive(Debug, Clone)]
pub struct TagHandles {
    ids: [TagId; TagName::COUNT],
    names: HashMap<TagId, TagName>,
}

impl TagHandles {
    /// Find or create every vocabulary tag in the forum.
    pub fn resolve(store: &dyn ForumStore) -> ForumResult<Self> {
        let mut ids = [0; TagName::COUNT];
        for tag in TagName::ALL {
            ids[tag.index()] = store.find_or_create_tag(tag.as_str())?;
        }
        Ok(Self::from_ids(ids))
    }

    /// Build handles from ids already known, indexed by [`TagName::ALL`] order.
    pub fn from_ids(ids: [TagId; TagName::COUNT]) -> Self {
        let names = TagName::ALL
            .into_iter()
            .map(|tag| (ids[tag.index()], tag))
            .collect();
        Self { ids, names }
    }

    pub fn id(&self, tag: TagName) -> TagId {
        self.ids[tag.index()]
    }

    /// Reverse lookup; `None` for tags outside the vocabulary.
    pub fn name(&self, id: TagId) -> Option<TagName> {
        self.names.get(&id).copied()
    }

    pub fn has(&self, tags: &TagSet, tag: TagName) -> bool {
        tags.contains(self.id(tag))
    }

    pub fn add(&self, tags: &mut TagSet, tag: TagName) -> bool {
        tags.add(self.id(tag))
    }

    pub fn remove(&self, tags: &mut TagSet, tag: TagName) -> bool {
        tags.remove(self.id(tag))
    }

    /// Vocabulary tags present in the set, in vocabulary order.
    pub fn known(&self, tags: &TagSet) -> Vec<TagName> {
        TagName::ALL
            .into_iter()
            .filter(|t| self.has(tags, *t))
            .collect()
    }
}
