//! Support Evaluator — decides, per new post, how a topic's support state moves
//!
//! Pure decision logic. The caller gathers an [`EvaluationInput`] from the forum,
//! asks for an [`EvaluationDecision`] and applies its effects.
//!
//! ```text
//! first post ─────────────────────────────▶ Needs-Support, needs_support=true
//! reply, not yet supported
//!     ├─ words ≥ limit, ≥1 reply ─────────▶ Sufficient-Words + Supported   (newly)
//!     ├─ words < limit, trained author ───▶ Trained-Reply + Supported      (newly)
//!     └─ words < limit, rapid-response,
//!        group replied ≥ N times ─────────▶ Trained-Reply + Supported      (newly)
//! reply, already supported, words ≥ limit ▶ re-assert Sufficient-Words
//! any reply linking a video ──────────────▶ Sufficient-Words + Supported + Video-Reply,
//!                                           Staff-Escalation removed
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::SupportConfig;
use crate::effects::TopicEffect;
use crate::error::ConfigError;
use crate::ladder::ResolutionTag;
use crate::model::{counts_as_reply, GroupId, Post, ReplyStats, Topic, TopicFlag, User, UserId};
use crate::tags::TagName;
use crate::video::VideoLinkDetector;

/// How the post author's group membership counts toward support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplierRole {
    Member,
    /// Staff or trained replier
    Trained,
    /// Counts once the group has replied enough times in the topic
    RapidResponse,
}

/// Everything the evaluator reads about one post event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationInput {
    pub is_first_post: bool,
    /// Topic carried `Supported` before this post
    pub already_supported: bool,
    pub stats: ReplyStats,
    pub role: ReplierRole,
    /// Replies in the topic from rapid-response members, this post included
    pub rapid_response_replies: u32,
    pub video_reply: bool,
}

/// Why the decision came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationReason {
    OpenedNeed,
    SufficientWords,
    TrainedReply,
    RapidResponse,
    VideoReply,
    AlreadySupported,
    BelowThreshold,
}

/// Decision produced for a single post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationDecision {
    pub effects: Vec<TopicEffect>,
    /// Support state after the post
    pub supported: bool,
    /// The topic became supported with this post
    pub newly_supported: bool,
    pub reasons: Vec<EvaluationReason>,
}

impl EvaluationDecision {
    pub fn summary(&self) -> String {
        format!(
            "supported={} newly={} reasons={:?}",
            self.supported, self.newly_supported, self.reasons
        )
    }
}

/// The support policy: thresholds, groups and video detection
#[derive(Debug, Clone)]
pub struct SupportEvaluator {
    support_limit: u32,
    trained_groups: Vec<GroupId>,
    rapid_response_groups: Vec<GroupId>,
    rapid_response_min_replies: u32,
    video: VideoLinkDetector,
}

impl SupportEvaluator {
    pub fn from_config(config: &SupportConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            support_limit: config.support_limit,
            trained_groups: config.trained_groups.clone(),
            rapid_response_groups: config.rapid_response_groups.clone(),
            rapid_response_min_replies: config.rapid_response_min_replies,
            video: VideoLinkDetector::new(&config.video_patterns)?,
        })
    }

    pub fn role_of(&self, user: &User) -> ReplierRole {
        let group = user.primary_group_id;
        if user.staff || group.is_some_and(|g| self.trained_groups.contains(&g)) {
            ReplierRole::Trained
        } else if group.is_some_and(|g| self.rapid_response_groups.contains(&g)) {
            ReplierRole::RapidResponse
        } else {
            ReplierRole::Member
        }
    }

    pub fn is_video_reply(&self, post: &Post) -> bool {
        self.video.is_video_reply(&post.raw, &post.cooked)
    }

    /// Gather the evaluation input for `post` from the topic's posts and their authors.
    pub fn input_for(
        &self,
        topic: &Topic,
        post: &Post,
        author: &User,
        already_supported: bool,
        posts: &[Post],
        users: &HashMap<UserId, User>,
    ) -> EvaluationInput {
        let rapid_response_replies = posts
            .iter()
            .filter(|p| counts_as_reply(topic, p))
            .filter(|p| {
                users
                    .get(&p.user_id)
                    .is_some_and(|u| self.role_of(u) == ReplierRole::RapidResponse)
            })
            .count() as u32;

        EvaluationInput {
            is_first_post: post.is_first_post(),
            already_supported,
            stats: ReplyStats::collect(topic, posts),
            role: self.role_of(author),
            rapid_response_replies,
            video_reply: !post.is_first_post() && self.is_video_reply(post),
        }
    }

    /// Decide the transition for one post.
    pub fn decide(&self, input: &EvaluationInput) -> EvaluationDecision {
        if input.is_first_post {
            return EvaluationDecision {
                effects: vec![
                    TopicEffect::AddTag(TagName::NeedsSupport),
                    TopicEffect::SetFlag(TopicFlag::NeedsSupport, true),
                    TopicEffect::SetFlag(TopicFlag::Supported, false),
                ],
                supported: false,
                newly_supported: false,
                reasons: vec![EvaluationReason::OpenedNeed],
            };
        }

        let mut effects = Vec::new();
        let mut reasons = Vec::new();
        let mut supported = input.already_supported;
        let words = input.stats.word_count;

        if !supported {
            if words >= self.support_limit && input.stats.reply_count >= 1 {
                effects.extend(mark_supported(ResolutionTag::SufficientWords));
                reasons.push(EvaluationReason::SufficientWords);
                supported = true;
            } else if words < self.support_limit {
                match input.role {
                    ReplierRole::Trained => {
                        effects.extend(mark_supported(ResolutionTag::TrainedReply));
                        reasons.push(EvaluationReason::TrainedReply);
                        supported = true;
                    }
                    ReplierRole::RapidResponse
                        if input.rapid_response_replies >= self.rapid_response_min_replies =>
                    {
                        effects.extend(mark_supported(ResolutionTag::TrainedReply));
                        reasons.push(EvaluationReason::RapidResponse);
                        supported = true;
                    }
                    _ => reasons.push(EvaluationReason::BelowThreshold),
                }
            }
        } else {
            if words >= self.support_limit {
                effects.push(TopicEffect::Resolve(ResolutionTag::SufficientWords));
            }
            reasons.push(EvaluationReason::AlreadySupported);
        }

        if input.video_reply {
            effects.extend(mark_supported(ResolutionTag::SufficientWords));
            effects.push(TopicEffect::AddTag(TagName::VideoReply));
            effects.push(TopicEffect::RemoveTag(TagName::StaffEscalation));
            reasons.push(EvaluationReason::VideoReply);
            supported = true;
        }

        EvaluationDecision {
            effects,
            supported,
            newly_supported: supported && !input.already_supported,
            reasons,
        }
    }
}

fn mark_supported(rung: ResolutionTag) -> [TopicEffect; 3] {
    [
        TopicEffect::Resolve(rung),
        TopicEffect::AddTag(TagName::Supported),
        TopicEffect::SetFlag(TopicFlag::Supported, true),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> SupportEvaluator {
        SupportEvaluator::from_config(&SupportConfig::default()).unwrap()
    }

    fn reply(words: u32, replies: u32, role: ReplierRole) -> EvaluationInput {
        EvaluationInput {
            is_first_post: false,
            already_supported: false,
            stats: ReplyStats {
                word_count: words,
                reply_count: replies,
            },
            role,
            rapid_response_replies: 0,
            video_reply: false,
        }
    }

    #[test]
    fn test_first_post_opens_need() {
        let input = EvaluationInput {
            is_first_post: true,
            ..reply(0, 0, ReplierRole::Trained)
        };
        let decision = evaluator().decide(&input);

        assert!(!decision.supported);
        assert!(!decision.newly_supported);
        assert_eq!(decision.reasons, vec![EvaluationReason::OpenedNeed]);
        assert!(decision
            .effects
            .contains(&TopicEffect::AddTag(TagName::NeedsSupport)));
        assert!(decision
            .effects
            .contains(&TopicEffect::SetFlag(TopicFlag::Supported, false)));
    }

    #[test]
    fn test_word_threshold_supports() {
        let decision = evaluator().decide(&reply(500, 2, ReplierRole::Member));
        assert!(decision.supported);
        assert!(decision.newly_supported);
        assert_eq!(
            decision.effects[0],
            TopicEffect::Resolve(ResolutionTag::SufficientWords)
        );
    }

    #[test]
    fn test_below_threshold_member_stays_open() {
        let decision = evaluator().decide(&reply(499, 3, ReplierRole::Member));
        assert!(!decision.supported);
        assert!(decision.effects.is_empty());
        assert_eq!(decision.reasons, vec![EvaluationReason::BelowThreshold]);
    }

    #[test]
    fn test_trained_reply_below_threshold() {
        let decision = evaluator().decide(&reply(40, 1, ReplierRole::Trained));
        assert!(decision.newly_supported);
        assert_eq!(
            decision.effects[0],
            TopicEffect::Resolve(ResolutionTag::TrainedReply)
        );
    }

    #[test]
    fn test_rapid_response_needs_second_reply() {
        let e = evaluator();
        let mut input = reply(40, 1, ReplierRole::RapidResponse);
        input.rapid_response_replies = 1;
        assert!(!e.decide(&input).supported);

        input.rapid_response_replies = 2;
        let decision = e.decide(&input);
        assert!(decision.supported);
        assert_eq!(decision.reasons, vec![EvaluationReason::RapidResponse]);
    }

    #[test]
    fn test_already_supported_reasserts_sufficient_words_only() {
        let mut input = reply(800, 4, ReplierRole::Member);
        input.already_supported = true;
        let decision = evaluator().decide(&input);

        assert!(decision.supported);
        assert!(!decision.newly_supported);
        assert_eq!(
            decision.effects,
            vec![TopicEffect::Resolve(ResolutionTag::SufficientWords)]
        );
    }

    #[test]
    fn test_video_short_circuits_word_count() {
        let mut input = reply(12, 1, ReplierRole::Member);
        input.video_reply = true;
        let decision = evaluator().decide(&input);

        assert!(decision.newly_supported);
        assert!(decision
            .effects
            .contains(&TopicEffect::RemoveTag(TagName::StaffEscalation)));
        assert!(decision
            .effects
            .contains(&TopicEffect::AddTag(TagName::VideoReply)));
        assert!(decision.reasons.contains(&EvaluationReason::VideoReply));
    }

    #[test]
    fn test_roles() {
        let e = evaluator();
        assert_eq!(e.role_of(&User::new(1, "a")), ReplierRole::Member);
        assert_eq!(e.role_of(&User::new(1, "a").in_group(42)), ReplierRole::Trained);
        assert_eq!(e.role_of(&User::new(1, "a").as_staff()), ReplierRole::Trained);
        assert_eq!(
            e.role_of(&User::new(1, "a").in_group(54)),
            ReplierRole::RapidResponse
        );
    }
}
