//! Forum collaborators
//!
//! The core never owns storage. It reads and writes topics, posts, users and
//! tags through [`ForumStore`] and creates messages through [`Messenger`].
//! [`MemoryForum`] implements both for tests and for the worker.

pub mod memory;
pub mod query;

pub use memory::MemoryForum;
pub use query::TopicQuery;

use crate::error::ForumResult;
use crate::model::{Post, Topic, TopicId, User, UserId};
use crate::tags::TagId;

/// Storage of topics, posts, users and tags
pub trait ForumStore: Send + Sync {
    fn topic(&self, id: TopicId) -> ForumResult<Option<Topic>>;

    /// Persist the topic's tags and custom fields together.
    fn save_topic(&self, topic: &Topic) -> ForumResult<()>;

    /// All posts of a topic, deleted ones included, in post-number order.
    fn posts(&self, topic_id: TopicId) -> ForumResult<Vec<Post>>;

    fn user(&self, id: UserId) -> ForumResult<Option<User>>;

    fn user_by_username(&self, username: &str) -> ForumResult<Option<User>>;

    /// Tags are unique by name and created on first use.
    fn find_or_create_tag(&self, name: &str) -> ForumResult<TagId>;

    fn topics(&self, query: &TopicQuery) -> ForumResult<Vec<Topic>>;
}

/// A private message to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateMessage {
    pub from: UserId,
    pub to_usernames: Vec<String>,
    pub title: String,
    pub body: String,
    /// Subject topic a follow-up refers to
    pub ref_topic_id: Option<TopicId>,
}

/// Creation of posts on behalf of the system account
pub trait Messenger: Send + Sync {
    /// Open a new private message topic; returns its first post.
    fn create_private_message(&self, message: PrivateMessage) -> ForumResult<Post>;

    /// Append a regular post to an existing topic.
    fn create_reply(&self, topic_id: TopicId, from: UserId, body: &str) -> ForumResult<Post>;

    /// Append a staff-only whisper to an existing topic.
    fn create_whisper(&self, topic_id: TopicId, from: UserId, body: &str) -> ForumResult<Post>;
}
