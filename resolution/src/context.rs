//! Shared collaborators for the service, the conversation and the sweeper

use std::sync::Arc;

use tracing::debug;

use crate::config::SupportConfig;
use crate::error::{ForumResult, SupportResult};
use crate::evaluator::SupportEvaluator;
use crate::forum::{ForumStore, Messenger};
use crate::locks::TopicLocks;
use crate::model::{Topic, User};
use crate::notify::{Notifier, TopicTagPayload, WebhookEvent};
use crate::tags::{TagChangeKind, TagHandles};

/// Shared reference to a [`SupportContext`]
pub type SharedContext = Arc<SupportContext>;

/// Everything a unit of work needs, resolved once at startup
pub struct SupportContext {
    pub store: Arc<dyn ForumStore>,
    pub messenger: Arc<dyn Messenger>,
    pub notifier: Arc<dyn Notifier>,
    pub config: SupportConfig,
    pub handles: TagHandles,
    pub evaluator: SupportEvaluator,
    pub locks: TopicLocks,
}

impl SupportContext {
    /// Resolve the tag vocabulary and compile the evaluator policy.
    pub fn new(
        store: Arc<dyn ForumStore>,
        messenger: Arc<dyn Messenger>,
        notifier: Arc<dyn Notifier>,
        config: SupportConfig,
    ) -> SupportResult<Self> {
        let handles = TagHandles::resolve(store.as_ref())?;
        let evaluator = SupportEvaluator::from_config(&config)?;
        Ok(Self {
            store,
            messenger,
            notifier,
            config,
            handles,
            evaluator,
            locks: TopicLocks::new(),
        })
    }

    pub fn shared(self) -> SharedContext {
        Arc::new(self)
    }

    /// The account follow-up messages are sent from.
    pub fn system_user(&self) -> ForumResult<Option<User>> {
        let user = self.store.user_by_username(&self.config.system_username)?;
        if user.is_none() {
            debug!(username = %self.config.system_username, "System user not found");
        }
        Ok(user)
    }

    /// Persist tags and fields, then mirror every tag change made since the last commit.
    ///
    /// Nothing is mirrored if the save fails.
    pub fn commit(&self, topic: &mut Topic) -> ForumResult<()> {
        self.store.save_topic(topic)?;
        for change in topic.tags.take_changes() {
            let name = self
                .handles
                .name(change.tag_id)
                .map(|t| t.as_str().to_string())
                .unwrap_or_else(|| change.tag_id.to_string());
            let payload = match change.kind {
                TagChangeKind::Added => TopicTagPayload::created(topic.id, change.tag_id, name),
                TagChangeKind::Removed => TopicTagPayload::deleted(topic.id, change.tag_id, name),
            };
            self.notifier.notify(WebhookEvent::TopicTag(payload));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::MemoryForum;
    use crate::notify::{RecordingNotifier, TagEventKind};
    use crate::tags::TagName;

    #[test]
    fn test_commit_mirrors_changes_once() {
        let forum = Arc::new(MemoryForum::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = SupportContext::new(
            forum.clone(),
            forum.clone(),
            notifier.clone(),
            SupportConfig::default(),
        )
        .unwrap();

        let mut topic = forum.create_topic(1, "Help", Some(67)).unwrap();
        ctx.handles.add(&mut topic.tags, TagName::NeedsSupport);
        ctx.commit(&mut topic).unwrap();
        ctx.commit(&mut topic).unwrap();

        let mirrors = notifier.tag_mirrors();
        assert_eq!(mirrors.len(), 1);
        assert_eq!(mirrors[0].event, TagEventKind::Created);
        assert_eq!(mirrors[0].tag_name, "Needs-Support");
    }

    #[test]
    fn test_failed_commit_mirrors_nothing() {
        let forum = Arc::new(MemoryForum::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = SupportContext::new(
            forum.clone(),
            forum.clone(),
            notifier.clone(),
            SupportConfig::default(),
        )
        .unwrap();

        let mut topic = forum.create_topic(1, "Help", Some(67)).unwrap();
        forum.fail_saves_for(topic.id);
        ctx.handles.add(&mut topic.tags, TagName::Supported);
        assert!(ctx.commit(&mut topic).is_err());
        assert!(notifier.events().is_empty());
    }
}
