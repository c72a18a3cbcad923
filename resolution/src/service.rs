//! Live event handling
//!
//! [`SupportService`] is the entry point for forum events. Each `on_*` method is
//! one unit of work: it runs its `handle_*` twin and logs a failure instead of
//! returning it, so the ingestion pipeline keeps going.
//!
//! Every handler runs its read-decide-write sequence under the topic's lock and
//! persists before emitting webhooks. A failed save aborts the rest of the event.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::SharedContext;
use crate::effects::{apply_effects, describe, AppliedEffects, TopicEffect};
use crate::error::SupportResult;
use crate::evaluator::{EvaluationDecision, ReplierRole};
use crate::followup::{AskTrigger, FollowUpConversation, ReplyOutcome};
use crate::ladder::{ResolutionLadder, ResolutionTag};
use crate::model::{Post, Topic, TopicId, User, UserId};
use crate::notify::{DiscoursePayload, SupplierPayload, TopicTagPayload, WebhookEvent};
use crate::tags::TagName;

/// Topic status fields the forum reports changes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    Closed,
    Visible,
}

/// What a new post led to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostOutcome {
    /// Set when the topic is in a support category
    pub decision: Option<EvaluationDecision>,
    /// Set when the post was inside a private message
    pub follow_up: Option<ReplyOutcome>,
    /// A staff reply cleared `Staff-Escalation`
    pub escalation_cleared: bool,
    /// The author was asked for feedback
    pub asked: bool,
}

/// What attaching a tag to a topic led to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagOutcome {
    pub video_reply: bool,
    pub asked: bool,
}

pub struct SupportService {
    ctx: SharedContext,
}

impl SupportService {
    pub fn new(ctx: SharedContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &SharedContext {
        &self.ctx
    }

    // =========================================================================
    // Unit-of-work boundaries
    // =========================================================================

    pub fn on_post_created(&self, post: &Post) {
        if let Err(e) = self.handle_post_created(post) {
            warn!(post_id = post.id, topic_id = post.topic_id, error = %e, "Post handling failed");
        }
    }

    pub fn on_topic_created(&self, topic_id: TopicId) {
        if let Err(e) = self.handle_topic_created(topic_id) {
            warn!(topic_id, error = %e, "Topic creation handling failed");
        }
    }

    pub fn on_topic_status_changed(&self, topic_id: TopicId, status: TopicStatus, enabled: bool) {
        if let Err(e) = self.handle_topic_status_changed(topic_id, status, enabled) {
            warn!(topic_id, ?status, enabled, error = %e, "Status change handling failed");
        }
    }

    pub fn on_topic_tag_created(&self, topic_id: TopicId, tag_name: &str) {
        if let Err(e) = self.handle_topic_tag_created(topic_id, tag_name) {
            warn!(topic_id, tag = tag_name, error = %e, "Tag event handling failed");
        }
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    /// Evaluate a new post, answer follow-ups and clear staff escalations.
    pub fn handle_post_created(&self, post: &Post) -> SupportResult<PostOutcome> {
        if post.is_deleted() {
            debug!(post_id = post.id, "Ignoring deleted post");
            return Ok(PostOutcome::default());
        }
        let Some(topic) = self.ctx.store.topic(post.topic_id)? else {
            debug!(post_id = post.id, topic_id = post.topic_id, "Topic not found");
            return Ok(PostOutcome::default());
        };

        if topic.is_private_message() {
            let reply = FollowUpConversation::new(&self.ctx).handle_reply(post)?;
            return Ok(PostOutcome {
                follow_up: Some(reply),
                ..Default::default()
            });
        }

        let Some(author) = self.ctx.store.user(post.user_id)? else {
            debug!(post_id = post.id, user_id = post.user_id, "Post author not found");
            return Ok(PostOutcome::default());
        };

        self.ctx
            .locks
            .with_topic(topic.id, || self.process_reply(post, &author))?
    }

    fn process_reply(&self, post: &Post, author: &User) -> SupportResult<PostOutcome> {
        let Some(mut topic) = self.ctx.store.topic(post.topic_id)? else {
            return Ok(PostOutcome::default());
        };
        let mut outcome = PostOutcome::default();

        if self.ctx.config.is_support_category(topic.category_id) {
            let (decision, applied) = self.evaluate(&mut topic, post, author)?;
            if applied.added(TagName::VideoReply) {
                outcome.asked |= self.video_reply_attached(&mut topic)?;
            }
            outcome.decision = Some(decision);
        }

        if self.clears_escalation(&topic, author) {
            let effects = [TopicEffect::RemoveTag(TagName::StaffEscalation)];
            apply_effects(&mut topic, &self.ctx.handles, &effects);
            self.ctx.commit(&mut topic)?;
            info!(topic_id = topic.id, staff = %author.username, "Staff reply cleared escalation");
            outcome.escalation_cleared = true;

            let asked = FollowUpConversation::new(&self.ctx)
                .ask_user(&mut topic, AskTrigger::EscalationResolved)?;
            outcome.asked |= asked.is_some();
        }

        Ok(outcome)
    }

    /// Apply the evaluator's decision, then send the supplier and discourse hooks.
    fn evaluate(
        &self,
        topic: &mut Topic,
        post: &Post,
        author: &User,
    ) -> SupportResult<(EvaluationDecision, AppliedEffects)> {
        let evaluator = &self.ctx.evaluator;
        let posts = self.ctx.store.posts(topic.id)?;
        let already_supported = self.ctx.handles.has(&topic.tags, TagName::Supported);

        let users = if evaluator.role_of(author) == ReplierRole::RapidResponse {
            self.authors_of(&posts)?
        } else {
            HashMap::new()
        };
        let input = evaluator.input_for(topic, post, author, already_supported, &posts, &users);
        let decision = evaluator.decide(&input);

        let applied = apply_effects(topic, &self.ctx.handles, &decision.effects);
        if !decision.effects.is_empty() {
            self.ctx.commit(topic)?;
            info!(
                topic_id = topic.id,
                post_id = post.id,
                decision = %decision.summary(),
                effects = %describe(&decision.effects),
                dominant = ?ResolutionLadder::dominant(&topic.tags, &self.ctx.handles),
                "Evaluated post"
            );
        }

        self.ctx.notifier.notify(WebhookEvent::Supplier(SupplierPayload {
            topic_id: topic.id,
            supported: decision.supported,
            username: author.username.clone(),
            category_id: topic.category_id,
            closed: topic.closed,
        }));
        if !post.is_first_post() {
            self.ctx.notifier.notify(WebhookEvent::Discourse(DiscoursePayload {
                topic_id: topic.id,
                supported: decision.supported,
                newly_supported: decision.newly_supported,
                body: post.cooked.clone(),
                username: author.username.clone(),
            }));
        }

        Ok((decision, applied))
    }

    fn authors_of(&self, posts: &[Post]) -> SupportResult<HashMap<UserId, User>> {
        let mut users = HashMap::new();
        for post in posts {
            if users.contains_key(&post.user_id) {
                continue;
            }
            if let Some(user) = self.ctx.store.user(post.user_id)? {
                users.insert(user.id, user);
            }
        }
        Ok(users)
    }

    /// A staff member other than the author replied to an escalated topic that is
    /// not already waiting on the author.
    fn clears_escalation(&self, topic: &Topic, author: &User) -> bool {
        let handles = &self.ctx.handles;
        author.staff
            && author.id != topic.user_id
            && handles.has(&topic.tags, TagName::StaffEscalation)
            && !handles.has(&topic.tags, TagName::AskedUser)
    }

    /// Tag topics opened in platform categories `Need-Listening-Ear`.
    pub fn handle_topic_created(&self, topic_id: TopicId) -> SupportResult<bool> {
        self.ctx.locks.with_topic(topic_id, || -> SupportResult<bool> {
            let Some(mut topic) = self.ctx.store.topic(topic_id)? else {
                debug!(topic_id, "Topic not found");
                return Ok(false);
            };
            if !topic.is_regular() || !self.ctx.config.is_platform_category(topic.category_id) {
                return Ok(false);
            }
            let applied = apply_effects(
                &mut topic,
                &self.ctx.handles,
                &[TopicEffect::AddTag(TagName::NeedListeningEar)],
            );
            if !applied.added(TagName::NeedListeningEar) {
                return Ok(false);
            }
            self.ctx.commit(&mut topic)?;
            info!(topic_id, "Tagged platform topic");
            Ok(true)
        })?
    }

    /// Drop `Needs-Support` when a topic is closed or hidden.
    pub fn handle_topic_status_changed(
        &self,
        topic_id: TopicId,
        status: TopicStatus,
        enabled: bool,
    ) -> SupportResult<bool> {
        let hides = match status {
            TopicStatus::Closed => enabled,
            TopicStatus::Visible => !enabled,
        };
        if !hides {
            return Ok(false);
        }

        self.ctx.locks.with_topic(topic_id, || -> SupportResult<bool> {
            let Some(mut topic) = self.ctx.store.topic(topic_id)? else {
                debug!(topic_id, "Topic not found");
                return Ok(false);
            };
            let applied = apply_effects(
                &mut topic,
                &self.ctx.handles,
                &[TopicEffect::RemoveTag(TagName::NeedsSupport)],
            );
            if !applied.removed(TagName::NeedsSupport) {
                return Ok(false);
            }
            self.ctx.commit(&mut topic)?;
            info!(topic_id, ?status, "Removed Needs-Support from closed or hidden topic");
            Ok(true)
        })?
    }

    /// React to a tag attached from outside the core and mirror it.
    pub fn handle_topic_tag_created(
        &self,
        topic_id: TopicId,
        tag_name: &str,
    ) -> SupportResult<TagOutcome> {
        let tag_id = self.ctx.store.find_or_create_tag(tag_name)?;
        self.ctx.notifier.notify(WebhookEvent::TopicTag(TopicTagPayload::created(
            topic_id, tag_id, tag_name,
        )));

        if self.ctx.handles.name(tag_id) != Some(TagName::VideoReply) {
            return Ok(TagOutcome::default());
        }

        self.ctx.locks.with_topic(topic_id, || -> SupportResult<TagOutcome> {
            let Some(mut topic) = self.ctx.store.topic(topic_id)? else {
                debug!(topic_id, "Topic not found");
                return Ok(TagOutcome::default());
            };
            let asked = self.video_reply_attached(&mut topic)?;
            Ok(TagOutcome {
                video_reply: true,
                asked,
            })
        })?
    }

    /// Clear `Needs-Support` by asserting `Sufficient-Words`, then ask the author
    /// if the topic is in an ask category and was never asked.
    fn video_reply_attached(&self, topic: &mut Topic) -> SupportResult<bool> {
        let applied = apply_effects(
            topic,
            &self.ctx.handles,
            &[TopicEffect::Resolve(ResolutionTag::SufficientWords)],
        );
        if applied.ladder.iter().any(|o| o.changed()) {
            self.ctx.commit(topic)?;
        }

        let handles = &self.ctx.handles;
        let eligible = self.ctx.config.is_ask_category(topic.category_id)
            && topic.fields.asked_user.is_none()
            && !handles.has(&topic.tags, TagName::AskedUser);
        if !eligible {
            return Ok(false);
        }
        let asked = FollowUpConversation::new(&self.ctx).ask_user(topic, AskTrigger::VideoReply)?;
        Ok(asked.is_some())
    }
}
