//! Follow-up conversation driver
//!
//! Opens the private message that asks a topic's author for feedback and
//! reacts to their replies. Callers entering the conversation hold the subject
//! topic's lock; [`FollowUpConversation::handle_reply`] takes the private
//! message lock and then the subject lock itself.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::messages;
use super::state::{transition, FollowUpAction, FollowUpState, ReplyIntent};
use crate::context::SupportContext;
use crate::effects::{apply_effects, describe, TopicEffect};
use crate::error::SupportResult;
use crate::forum::PrivateMessage;
use crate::model::{Post, Topic, TopicFlag, TopicId, User, UserId};
use crate::notify::{FollowUpPayload, FollowUpResponse, WebhookEvent};
use crate::tags::TagName;

/// What caused the author to be asked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskTrigger {
    /// Enough non-author words on an aged topic
    WordCount,
    /// A staff reply cleared `Staff-Escalation`
    EscalationResolved,
    /// A video reply was attached
    VideoReply,
}

impl std::fmt::Display for AskTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WordCount => write!(f, "word_count"),
            Self::EscalationResolved => write!(f, "escalation_resolved"),
            Self::VideoReply => write!(f, "video_reply"),
        }
    }
}

/// Result of feeding a post to the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Not a reply inside a follow-up private message
    NotFollowUp,
    /// Posted by the system account; never acted on
    SystemAuthor,
    Handled {
        state: FollowUpState,
        /// The subject topic no longer exists; only the private message was answered
        subject_missing: bool,
        thanked: usize,
    },
}

pub struct FollowUpConversation<'a> {
    ctx: &'a SupportContext,
}

impl<'a> FollowUpConversation<'a> {
    pub fn new(ctx: &'a SupportContext) -> Self {
        Self { ctx }
    }

    /// Ask the author of `subject` whether they felt supported.
    ///
    /// Persists `asked_user` and the `Asked-User` tag, then sends the prompt. If
    /// sending fails both are cleared again. Returns the prompt post, or `None`
    /// when the author or the system account cannot be found.
    pub fn ask_user(
        &self,
        subject: &mut Topic,
        trigger: AskTrigger,
    ) -> SupportResult<Option<Post>> {
        let Some(system) = self.ctx.system_user()? else {
            return Ok(None);
        };
        let Some(author) = self.ctx.store.user(subject.user_id)? else {
            debug!(topic_id = subject.id, user_id = subject.user_id, "Topic author not found");
            return Ok(None);
        };

        // The mark is stored before the prompt goes out, never after.
        let previous = subject.fields.asked_user;
        let applied = apply_effects(
            subject,
            &self.ctx.handles,
            &[
                TopicEffect::SetFlag(TopicFlag::AskedUser, true),
                TopicEffect::AddTag(TagName::AskedUser),
            ],
        );
        self.ctx.commit(subject)?;

        let prompt = match self.ctx.messenger.create_private_message(PrivateMessage {
            from: system.id,
            to_usernames: vec![author.username.clone()],
            title: messages::FOLLOW_UP_TITLE.to_string(),
            body: messages::ask_prompt(&author.username, &self.ctx.config.topic_url(subject.id)),
            ref_topic_id: Some(subject.id),
        }) {
            Ok(prompt) => prompt,
            Err(e) => {
                subject.fields.asked_user = previous;
                if applied.added(TagName::AskedUser) {
                    apply_effects(
                        subject,
                        &self.ctx.handles,
                        &[TopicEffect::RemoveTag(TagName::AskedUser)],
                    );
                }
                if let Err(undo) = self.ctx.commit(subject) {
                    warn!(topic_id = subject.id, error = %undo, "Failed to clear ask mark");
                }
                return Err(e.into());
            }
        };

        info!(
            topic_id = subject.id,
            dm_id = prompt.topic_id,
            username = %author.username,
            %trigger,
            "Asked author for feedback"
        );
        Ok(Some(prompt))
    }

    /// React to a post that may be a reply inside a follow-up private message.
    pub fn handle_reply(&self, post: &Post) -> SupportResult<ReplyOutcome> {
        let Some(dm) = self.ctx.store.topic(post.topic_id)? else {
            return Ok(ReplyOutcome::NotFollowUp);
        };
        let Some(subject_id) = dm.fields.ref_topic_id.filter(|_| dm.is_private_message()) else {
            return Ok(ReplyOutcome::NotFollowUp);
        };
        let Some(system) = self.ctx.system_user()? else {
            return Ok(ReplyOutcome::NotFollowUp);
        };
        if post.user_id == system.id {
            debug!(dm_id = dm.id, "Ignoring system reply in follow-up");
            return Ok(ReplyOutcome::SystemAuthor);
        }

        let locks = &self.ctx.locks;
        locks.with_topic(dm.id, || -> SupportResult<ReplyOutcome> {
            locks.with_topic(subject_id, || self.answer(&dm, subject_id, post, &system))?
        })?
    }

    fn answer(
        &self,
        dm: &Topic,
        subject_id: TopicId,
        post: &Post,
        system: &User,
    ) -> SupportResult<ReplyOutcome> {
        let intent = ReplyIntent::parse(&post.raw);
        let mut subject = self.ctx.store.topic(subject_id)?;
        let escalated = subject
            .as_ref()
            .is_some_and(|t| t.fields.is_set(TopicFlag::StaffEscalation));
        let step = transition(&intent, escalated);
        if step.is_noop() {
            debug!(topic_id = subject_id, dm_id = dm.id, "Follow-up reply needs no action");
        }

        if let Some(subject) = subject.as_mut() {
            if !step.effects.is_empty() {
                apply_effects(subject, &self.ctx.handles, &step.effects);
                self.ctx.commit(subject)?;
                info!(
                    topic_id = subject.id,
                    dm_id = dm.id,
                    state = %step.next,
                    effects = %describe(&step.effects),
                    "Follow-up answered"
                );
            }
        } else {
            debug!(topic_id = subject_id, dm_id = dm.id, "Follow-up subject not found");
        }

        let mut thanked = 0;
        for action in &step.actions {
            match action {
                FollowUpAction::ReplyThanks => {
                    let body = messages::yes_reply(&self.ctx.config.followup.yes_form_url);
                    self.ctx.messenger.create_reply(dm.id, system.id, &body)?;
                }
                FollowUpAction::ReplyApology => {
                    let body = messages::no_reply(&self.ctx.config.followup.no_form_url);
                    self.ctx.messenger.create_reply(dm.id, system.id, &body)?;
                }
                FollowUpAction::ThankRepliers => {
                    if let Some(subject) = subject.as_ref() {
                        thanked = self.thank_repliers(subject, system)?;
                    }
                }
                FollowUpAction::ForwardToStaff => {
                    if let (Some(subject), ReplyIntent::FreeText(message)) =
                        (subject.as_ref(), &intent)
                    {
                        self.forward_to_staff(dm, subject, post.user_id, message, system)?;
                    }
                }
            }
        }

        Ok(ReplyOutcome::Handled {
            state: step.next,
            subject_missing: subject.is_none(),
            thanked,
        })
    }

    fn forward_to_staff(
        &self,
        dm: &Topic,
        subject: &Topic,
        from: UserId,
        message: &str,
        system: &User,
    ) -> SupportResult<()> {
        self.ctx
            .messenger
            .create_whisper(subject.id, system.id, message)?;

        let response = if self.ctx.handles.has(&subject.tags, TagName::UserAnsweredYes) {
            FollowUpResponse::Yes
        } else {
            FollowUpResponse::No
        };
        self.ctx
            .notifier
            .notify(WebhookEvent::FollowUp(FollowUpPayload {
                dm_id: dm.id,
                topic_id: subject.id,
                message: message.to_string(),
                discourse_user_id: from,
                response,
            }));
        info!(topic_id = subject.id, dm_id = dm.id, "Forwarded follow-up to staff");
        Ok(())
    }

    /// Send "you helped a user" to each distinct replier on an open, visible topic.
    ///
    /// Skips the author, the system account, deleted posts and posts with
    /// moderator flags. Returns how many messages were sent.
    pub fn thank_repliers(&self, subject: &Topic, system: &User) -> SupportResult<usize> {
        if !subject.is_public_and_open() {
            debug!(topic_id = subject.id, "Topic closed or hidden, skipping thank-yous");
            return Ok(0);
        }
        let Some(author) = self.ctx.store.user(subject.user_id)? else {
            debug!(topic_id = subject.id, "Topic author not found, skipping thank-yous");
            return Ok(0);
        };

        let mut seen = HashSet::new();
        let mut usernames = Vec::new();
        for post in self.ctx.store.posts(subject.id)? {
            let eligible = post.user_id != subject.user_id
                && post.user_id != system.id
                && post.notify_moderators_count == 0
                && !post.is_deleted();
            if !eligible || !seen.insert(post.user_id) {
                continue;
            }
            match self.ctx.store.user(post.user_id)? {
                Some(user) => usernames.push(user.username),
                None => debug!(user_id = post.user_id, "Replier not found"),
            }
        }

        let body = messages::helped_user(&author.username, &self.ctx.config.topic_url(subject.id));
        for username in &usernames {
            self.ctx.messenger.create_private_message(PrivateMessage {
                from: system.id,
                to_usernames: vec![username.clone()],
                title: messages::HELPED_TITLE.to_string(),
                body: body.clone(),
                ref_topic_id: None,
            })?;
        }

        if !usernames.is_empty() {
            info!(topic_id = subject.id, count = usernames.len(), "Thanked repliers");
        }
        Ok(usernames.len())
    }
}
