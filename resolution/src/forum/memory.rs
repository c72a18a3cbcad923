//! In-memory forum
//!
//! Implements [`ForumStore`] and [`Messenger`] over a single `RwLock`. Used by
//! the test suites and by the worker, which snapshots it to a JSON file.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::RwLock;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{ForumStore, Messenger, PrivateMessage, TopicQuery};
use crate::error::{ForumError, ForumResult};
use crate::model::{
    count_words, Archetype, CategoryId, Post, PostId, PostType, Topic, TopicId, User, UserId,
};
use crate::tags::TagId;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ForumData {
    topics: BTreeMap<TopicId, Topic>,
    posts: BTreeMap<PostId, Post>,
    users: BTreeMap<UserId, User>,
    tags: BTreeMap<String, TagId>,
    next_topic_id: TopicId,
    next_post_id: PostId,
    next_tag_id: TagId,
}

/// Forum state held in memory
#[derive(Debug, Default)]
pub struct MemoryForum {
    data: RwLock<ForumData>,
    failing_saves: RwLock<HashSet<TopicId>>,
}

impl MemoryForum {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Fixtures and forum-side mutations
    // =========================================================================

    pub fn upsert_user(&self, user: User) -> ForumResult<()> {
        let mut data = self.write()?;
        data.users.insert(user.id, user);
        Ok(())
    }

    /// Open a new regular topic with no posts.
    pub fn create_topic(
        &self,
        user_id: UserId,
        title: &str,
        category_id: Option<CategoryId>,
    ) -> ForumResult<Topic> {
        let mut data = self.write()?;
        data.next_topic_id += 1;
        let topic = Topic::new(data.next_topic_id, title, user_id, category_id);
        data.topics.insert(topic.id, topic.clone());
        Ok(topic)
    }

    /// Insert a topic as-is, e.g. with a backdated `created_at`.
    pub fn insert_topic(&self, topic: Topic) -> ForumResult<()> {
        let mut data = self.write()?;
        data.next_topic_id = data.next_topic_id.max(topic.id);
        data.topics.insert(topic.id, topic);
        Ok(())
    }

    /// Append a regular post, updating the topic's counters.
    pub fn create_post(&self, topic_id: TopicId, user_id: UserId, raw: &str) -> ForumResult<Post> {
        self.append_post(topic_id, user_id, raw, PostType::Regular)
    }

    /// Soft-delete a post.
    pub fn delete_post(&self, post_id: PostId) -> ForumResult<()> {
        let mut data = self.write()?;
        if let Some(post) = data.posts.get_mut(&post_id) {
            post.deleted_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Raise a moderator flag on a post.
    pub fn flag_post(&self, post_id: PostId) -> ForumResult<()> {
        let mut data = self.write()?;
        if let Some(post) = data.posts.get_mut(&post_id) {
            post.notify_moderators_count += 1;
        }
        Ok(())
    }

    /// Mutate a stored topic in place (status changes, external tagging, backdating).
    ///
    /// Tag changes made here are forum-side and are not reported as pending.
    pub fn update_topic(&self, id: TopicId, f: impl FnOnce(&mut Topic)) -> ForumResult<bool> {
        let mut data = self.write()?;
        let Some(topic) = data.topics.get_mut(&id) else {
            return Ok(false);
        };
        f(topic);
        topic.tags.take_changes();
        Ok(true)
    }

    /// Attach a tag the way a moderator would. Returns the tag id when the topic exists.
    pub fn attach_tag(&self, topic_id: TopicId, name: &str) -> ForumResult<Option<TagId>> {
        let tag_id = self.find_or_create_tag(name)?;
        let found = self.update_topic(topic_id, |t| {
            t.tags.add(tag_id);
        })?;
        Ok(found.then_some(tag_id))
    }

    /// Make every later `save_topic` for this topic fail.
    pub fn fail_saves_for(&self, id: TopicId) {
        if let Ok(mut failing) = self.failing_saves.write() {
            failing.insert(id);
        }
    }

    /// Private message topics addressed to `username`, oldest first.
    pub fn private_messages_to(&self, username: &str) -> ForumResult<Vec<Topic>> {
        let data = self.read()?;
        Ok(data
            .topics
            .values()
            .filter(|t| t.is_private_message())
            .filter(|t| t.allowed_usernames.iter().any(|u| u == username))
            .cloned()
            .collect())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Write the whole forum to a JSON file.
    pub fn save_snapshot(&self, path: &Path) -> ForumResult<()> {
        let data = self.read()?;
        let json = serde_json::to_string_pretty(&*data)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a forum from a JSON file; `None` when the file does not exist.
    pub fn load_snapshot(path: &Path) -> ForumResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(path)?;
        let data: ForumData = serde_json::from_str(&json)?;
        Ok(Some(Self {
            data: RwLock::new(data),
            failing_saves: RwLock::new(HashSet::new()),
        }))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn read(&self) -> ForumResult<std::sync::RwLockReadGuard<'_, ForumData>> {
        self.data.read().map_err(|_| ForumError::LockPoisoned)
    }

    fn write(&self) -> ForumResult<std::sync::RwLockWriteGuard<'_, ForumData>> {
        self.data.write().map_err(|_| ForumError::LockPoisoned)
    }

    fn append_post(
        &self,
        topic_id: TopicId,
        user_id: UserId,
        raw: &str,
        post_type: PostType,
    ) -> ForumResult<Post> {
        let mut data = self.write()?;
        let post_number = data
            .posts
            .values()
            .filter(|p| p.topic_id == topic_id)
            .count() as u32
            + 1;
        data.next_post_id += 1;
        let post = Post {
            id: data.next_post_id,
            topic_id,
            user_id,
            raw: raw.to_string(),
            cooked: format!("<p>{}</p>", raw),
            word_count: count_words(raw),
            post_number,
            created_at: Utc::now(),
            deleted_at: None,
            post_type,
            notify_moderators_count: 0,
        };

        let topic = data
            .topics
            .get_mut(&topic_id)
            .ok_or_else(|| ForumError::Message(format!("topic {} not found", topic_id)))?;
        topic.posts_count += 1;
        topic.word_count += post.word_count;
        topic.last_posted_at = Some(post.created_at);

        data.posts.insert(post.id, post.clone());
        Ok(post)
    }
}

impl ForumStore for MemoryForum {
    fn topic(&self, id: TopicId) -> ForumResult<Option<Topic>> {
        Ok(self.read()?.topics.get(&id).cloned())
    }

    fn save_topic(&self, topic: &Topic) -> ForumResult<()> {
        let failing = self
            .failing_saves
            .read()
            .map_err(|_| ForumError::LockPoisoned)?
            .contains(&topic.id);
        if failing {
            return Err(ForumError::Persist {
                topic_id: topic.id,
                reason: "save rejected".into(),
            });
        }

        let mut data = self.write()?;
        let stored = data
            .topics
            .get_mut(&topic.id)
            .ok_or_else(|| ForumError::Persist {
                topic_id: topic.id,
                reason: "topic not found".into(),
            })?;
        stored.tags = topic.tags.clone();
        stored.tags.take_changes();
        stored.fields = topic.fields.clone();
        Ok(())
    }

    fn posts(&self, topic_id: TopicId) -> ForumResult<Vec<Post>> {
        let data = self.read()?;
        let mut posts: Vec<Post> = data
            .posts
            .values()
            .filter(|p| p.topic_id == topic_id)
            .cloned()
            .collect();
        posts.sort_by_key(|p| p.post_number);
        Ok(posts)
    }

    fn user(&self, id: UserId) -> ForumResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    fn user_by_username(&self, username: &str) -> ForumResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    fn find_or_create_tag(&self, name: &str) -> ForumResult<TagId> {
        let mut data = self.write()?;
        if let Some(id) = data.tags.get(name) {
            return Ok(*id);
        }
        data.next_tag_id += 1;
        let id = data.next_tag_id;
        data.tags.insert(name.to_string(), id);
        Ok(id)
    }

    fn topics(&self, query: &TopicQuery) -> ForumResult<Vec<Topic>> {
        Ok(self
            .read()?
            .topics
            .values()
            .filter(|t| query.matches(t))
            .cloned()
            .collect())
    }
}

impl Messenger for MemoryForum {
    fn create_private_message(&self, message: PrivateMessage) -> ForumResult<Post> {
        let topic_id = {
            let mut data = self.write()?;
            data.next_topic_id += 1;
            let mut topic = Topic::new(data.next_topic_id, message.title, message.from, None);
            topic.archetype = Archetype::PrivateMessage;
            topic.allowed_usernames = message.to_usernames;
            topic.fields.ref_topic_id = message.ref_topic_id;
            let id = topic.id;
            data.topics.insert(id, topic);
            id
        };
        self.append_post(topic_id, message.from, &message.body, PostType::Regular)
    }

    fn create_reply(&self, topic_id: TopicId, from: UserId, body: &str) -> ForumResult<Post> {
        self.append_post(topic_id, from, body, PostType::Regular)
    }

    fn create_whisper(&self, topic_id: TopicId, from: UserId, body: &str) -> ForumResult<Post> {
        self.append_post(topic_id, from, body, PostType::Whisper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_numbers_and_counters() {
        let forum = MemoryForum::new();
        let topic = forum.create_topic(1, "Help", Some(67)).unwrap();
        let first = forum.create_post(topic.id, 1, "one two three").unwrap();
        let second = forum.create_post(topic.id, 2, "four five").unwrap();

        assert!(first.is_first_post());
        assert_eq!(second.post_number, 2);

        let stored = forum.topic(topic.id).unwrap().unwrap();
        assert_eq!(stored.posts_count, 2);
        assert_eq!(stored.word_count, 5);
        assert!(stored.last_posted_at.is_some());
    }

    #[test]
    fn test_save_only_touches_tags_and_fields() {
        let forum = MemoryForum::new();
        let topic = forum.create_topic(1, "Help", Some(67)).unwrap();
        let mut loaded = forum.topic(topic.id).unwrap().unwrap();

        forum.create_post(topic.id, 1, "hello").unwrap();
        loaded.tags.add(5);
        loaded.fields.supported = Some(true);
        forum.save_topic(&loaded).unwrap();

        let stored = forum.topic(topic.id).unwrap().unwrap();
        assert_eq!(stored.posts_count, 1);
        assert!(stored.tags.contains(5));
        assert!(stored.tags.pending_changes().is_empty());
        assert_eq!(stored.fields.supported, Some(true));
    }

    #[test]
    fn test_attach_tag_leaves_no_pending_changes() {
        let forum = MemoryForum::new();
        let topic = forum.create_topic(1, "Help", None).unwrap();
        let tag = forum.attach_tag(topic.id, "Video-Reply").unwrap().unwrap();

        let stored = forum.topic(topic.id).unwrap().unwrap();
        assert!(stored.tags.contains(tag));
        assert!(stored.tags.pending_changes().is_empty());
        assert_eq!(forum.attach_tag(999, "Video-Reply").unwrap(), None);
    }

    #[test]
    fn test_failing_saves() {
        let forum = MemoryForum::new();
        let topic = forum.create_topic(1, "Help", None).unwrap();
        forum.fail_saves_for(topic.id);
        assert!(matches!(
            forum.save_topic(&topic),
            Err(ForumError::Persist { .. })
        ));
    }

    #[test]
    fn test_private_message_carries_reference() {
        let forum = MemoryForum::new();
        let post = forum
            .create_private_message(PrivateMessage {
                from: 1,
                to_usernames: vec!["op".into()],
                title: "Follow Up".into(),
                body: "hi".into(),
                ref_topic_id: Some(77),
            })
            .unwrap();

        let pm = forum.topic(post.topic_id).unwrap().unwrap();
        assert!(pm.is_private_message());
        assert_eq!(pm.fields.ref_topic_id, Some(77));
        assert_eq!(forum.private_messages_to("op").unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forum.json");
        assert!(MemoryForum::load_snapshot(&path).unwrap().is_none());

        let forum = MemoryForum::new();
        forum.upsert_user(User::new(1, "op")).unwrap();
        let topic = forum.create_topic(1, "Help", Some(67)).unwrap();
        forum.create_post(topic.id, 1, "hello there").unwrap();
        let tag = forum.find_or_create_tag("Supported").unwrap();
        forum.save_snapshot(&path).unwrap();

        let restored = MemoryForum::load_snapshot(&path).unwrap().unwrap();
        assert_eq!(restored.posts(topic.id).unwrap().len(), 1);
        assert_eq!(restored.find_or_create_tag("Supported").unwrap(), tag);
        assert_eq!(
            restored.user_by_username("op").unwrap().map(|u| u.id),
            Some(1)
        );
    }
}
