//! Forum data as seen by the core
//!
//! Storage and rendering belong to the forum; these types carry just the fields
//! the ladder, evaluator and follow-up conversation read or write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tags::TagSet;

pub type TopicId = u64;
pub type PostId = u64;
pub type UserId = u64;
pub type CategoryId = u64;
pub type GroupId = u64;

/// Kind of conversation a topic holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    #[default]
    Regular,
    PrivateMessage,
}

/// Workflow flags persisted as topic custom fields
///
/// `None` means the field was never written, which the ask-user sweep relies on
/// to tell "never asked" apart from "asked".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_support: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asked_user: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_escalation: Option<bool>,
    /// Set on follow-up private messages; points at the subject topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_topic_id: Option<TopicId>,
}

/// Boolean workflow flags the core writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicFlag {
    NeedsSupport,
    Supported,
    AskedUser,
    StaffEscalation,
}

impl TopicFields {
    pub fn get(&self, flag: TopicFlag) -> Option<bool> {
        match flag {
            TopicFlag::NeedsSupport => self.needs_support,
            TopicFlag::Supported => self.supported,
            TopicFlag::AskedUser => self.asked_user,
            TopicFlag::StaffEscalation => self.staff_escalation,
        }
    }

    pub fn set(&mut self, flag: TopicFlag, value: bool) {
        let slot = match flag {
            TopicFlag::NeedsSupport => &mut self.needs_support,
            TopicFlag::Supported => &mut self.supported,
            TopicFlag::AskedUser => &mut self.asked_user,
            TopicFlag::StaffEscalation => &mut self.staff_escalation,
        };
        *slot = Some(value);
    }

    pub fn is_set(&self, flag: TopicFlag) -> bool {
        self.get(flag).unwrap_or(false)
    }
}

/// A discussion thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub title: String,
    pub category_id: Option<CategoryId>,
    /// Author of the first post
    pub user_id: UserId,
    #[serde(default)]
    pub archetype: Archetype,
    /// Recipients, for private messages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_usernames: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_posted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub word_count: u32,
    #[serde(default)]
    pub posts_count: u32,
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default)]
    pub fields: TopicFields,
}

fn default_true() -> bool {
    true
}

impl Topic {
    /// A fresh, open, visible regular topic with no posts yet.
    pub fn new(
        id: TopicId,
        title: impl Into<String>,
        user_id: UserId,
        category_id: Option<CategoryId>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            category_id,
            user_id,
            archetype: Archetype::Regular,
            allowed_usernames: Vec::new(),
            created_at: Utc::now(),
            last_posted_at: None,
            closed: false,
            visible: true,
            archived: false,
            deleted_at: None,
            word_count: 0,
            posts_count: 0,
            tags: TagSet::new(),
            fields: TopicFields::default(),
        }
    }

    pub fn is_regular(&self) -> bool {
        self.archetype == Archetype::Regular
    }

    pub fn is_private_message(&self) -> bool {
        self.archetype == Archetype::PrivateMessage
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Open and visible to members; thank-you messages are only sent for these.
    pub fn is_public_and_open(&self) -> bool {
        !self.closed && !self.archived && self.visible
    }
}

/// Post visibility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    #[default]
    Regular,
    /// Staff-only annotation
    Whisper,
}

/// A single message within a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub topic_id: TopicId,
    pub user_id: UserId,
    pub raw: String,
    /// Rendered HTML
    #[serde(default)]
    pub cooked: String,
    pub word_count: u32,
    /// 1 for the opening post
    pub post_number: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub post_type: PostType,
    /// Moderator flags raised against the post
    #[serde(default)]
    pub notify_moderators_count: u32,
}

impl Post {
    pub fn is_first_post(&self) -> bool {
        self.post_number == 1
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A forum account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub primary_group_id: Option<GroupId>,
    /// Admin or moderator
    #[serde(default)]
    pub staff: bool,
}

impl User {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            primary_group_id: None,
            staff: false,
        }
    }

    pub fn in_group(mut self, group: GroupId) -> Self {
        self.primary_group_id = Some(group);
        self
    }

    pub fn as_staff(mut self) -> Self {
        self.staff = true;
        self
    }
}

/// Aggregate over the replies in a topic from people other than its author
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyStats {
    pub word_count: u32,
    pub reply_count: u32,
}

impl ReplyStats {
    /// Sum non-author, non-deleted, non-whisper posts.
    pub fn collect<'a>(topic: &Topic, posts: impl IntoIterator<Item = &'a Post>) -> Self {
        posts
            .into_iter()
            .filter(|p| counts_as_reply(topic, p))
            .fold(Self::default(), |acc, p| Self {
                word_count: acc.word_count + p.word_count,
                reply_count: acc.reply_count + 1,
            })
    }
}

/// Whether a post contributes to the reply aggregates of its topic.
pub fn counts_as_reply(topic: &Topic, post: &Post) -> bool {
    post.user_id != topic.user_id && !post.is_deleted() && post.post_type != PostType::Whisper
}

/// Whitespace-separated word count, the way the forum counts raw text.
pub fn count_words(raw: &str) -> u32 {
    raw.split_whitespace().count() as u32
}
