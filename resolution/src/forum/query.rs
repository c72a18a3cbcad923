//! Topic selection for the scheduled sweeps

use chrono::{DateTime, Utc};

use crate::model::{Archetype, CategoryId, Topic};
use crate::tags::TagId;

/// Filter over topics. Unset fields do not constrain the result.
///
/// A database-backed store translates this into its own query language;
/// [`TopicQuery::matches`] is the reference semantics.
#[derive(Debug, Clone, Default)]
pub struct TopicQuery {
    pub archetype: Option<Archetype>,
    /// Inclusive lower bound on creation time
    pub created_after: Option<DateTime<Utc>>,
    /// Exclusive upper bound on creation time
    pub created_before: Option<DateTime<Utc>>,
    pub categories: Option<Vec<CategoryId>>,
    /// Strictly more posts than this
    pub min_posts_exclusive: Option<u32>,
    /// None of these tags may be present
    pub without_tags: Vec<TagId>,
    /// All of these tags must be present
    pub with_tags: Vec<TagId>,
    /// The `asked_user` custom field must never have been written
    pub never_asked: bool,
    pub exclude_deleted: bool,
    pub exclude_closed: bool,
}

impl TopicQuery {
    pub fn regular() -> Self {
        Self {
            archetype: Some(Archetype::Regular),
            exclude_deleted: true,
            ..Default::default()
        }
    }

    pub fn created_in(mut self, after: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        self.created_after = Some(after);
        self.created_before = Some(before);
        self
    }

    pub fn in_categories(mut self, categories: &[CategoryId]) -> Self {
        self.categories = Some(categories.to_vec());
        self
    }

    pub fn with_more_posts_than(mut self, count: u32) -> Self {
        self.min_posts_exclusive = Some(count);
        self
    }

    pub fn without(mut self, tag: TagId) -> Self {
        self.without_tags.push(tag);
        self
    }

    pub fn with(mut self, tag: TagId) -> Self {
        self.with_tags.push(tag);
        self
    }

    pub fn never_asked(mut self) -> Self {
        self.never_asked = true;
        self
    }

    pub fn open(mut self) -> Self {
        self.exclude_closed = true;
        self
    }

    pub fn matches(&self, topic: &Topic) -> bool {
        if self.archetype.is_some_and(|a| a != topic.archetype) {
            return false;
        }
        if self.created_after.is_some_and(|t| topic.created_at < t) {
            return false;
        }
        if self.created_before.is_some_and(|t| topic.created_at >= t) {
            return false;
        }
        if let Some(categories) = &self.categories {
            if !topic.category_id.is_some_and(|c| categories.contains(&c)) {
                return false;
            }
        }
        if self.min_posts_exclusive.is_some_and(|n| topic.posts_count <= n) {
            return false;
        }
        if self.without_tags.iter().any(|t| topic.tags.contains(*t)) {
            return false;
        }
        if !self.with_tags.iter().all(|t| topic.tags.contains(*t)) {
            return false;
        }
        if self.never_asked && topic.fields.asked_user.is_some() {
            return false;
        }
        if self.exclude_deleted && topic.is_deleted() {
            return false;
        }
        if self.exclude_closed && topic.closed {
            return false;
        }
        true
    }
}
