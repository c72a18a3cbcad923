//! Follow-up conversation state machine
//!
//! ```text
//!                      "yes"
//!                 ┌──────────────▶ Resolved(Yes)
//! AwaitingResponse│  "no"
//!                 ├──────────────▶ Resolved(No)   (escalates the subject)
//!                 │  free text, subject escalated
//!                 └──────────────▶ Escalated      (forwarded to staff)
//! ```
//!
//! The table is keyed by the normalized reply and whether the subject topic
//! carries the `staff_escalation` flag. Answers are accepted from any state;
//! the author may change their mind.

use serde::{Deserialize, Serialize};

use crate::effects::TopicEffect;
use crate::ladder::ResolutionTag;
use crate::model::TopicFlag;
use crate::tags::TagName;

/// The author's answer to "did you get the support you needed?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserAnswer {
    Yes,
    No,
}

impl std::fmt::Display for UserAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => write!(f, "yes"),
            Self::No => write!(f, "no"),
        }
    }
}

/// A private-message reply, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyIntent {
    Answer(UserAnswer),
    FreeText(String),
}

impl ReplyIntent {
    /// Lower-case and trim, then match the two answers exactly.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "yes" => Self::Answer(UserAnswer::Yes),
            "no" => Self::Answer(UserAnswer::No),
            _ => Self::FreeText(raw.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpState {
    AwaitingResponse,
    Resolved(UserAnswer),
    Escalated,
}

impl std::fmt::Display for FollowUpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingResponse => write!(f, "awaiting_response"),
            Self::Resolved(answer) => write!(f, "resolved({})", answer),
            Self::Escalated => write!(f, "escalated"),
        }
    }
}

/// Side effects of a transition beyond the subject topic's tags and flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpAction {
    /// Thank the author in the private message and link the "yes" form
    ReplyThanks,
    /// Apologise in the private message and link the "no" form
    ReplyApology,
    /// Send "you helped a user" to every eligible replier
    ThankRepliers,
    /// Whisper the message on the subject topic and send the triage webhook
    ForwardToStaff,
}

/// One row of the transition table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpTransition {
    pub next: FollowUpState,
    /// Applied to the subject topic
    pub effects: Vec<TopicEffect>,
    pub actions: Vec<FollowUpAction>,
}

impl FollowUpTransition {
    pub fn is_noop(&self) -> bool {
        self.effects.is_empty() && self.actions.is_empty()
    }
}

/// Look up the transition for a reply.
pub fn transition(intent: &ReplyIntent, subject_escalated: bool) -> FollowUpTransition {
    match intent {
        ReplyIntent::Answer(UserAnswer::Yes) => FollowUpTransition {
            next: FollowUpState::Resolved(UserAnswer::Yes),
            effects: vec![
                TopicEffect::RemoveTag(TagName::StaffEscalation),
                TopicEffect::RemoveTag(TagName::AskedUser),
                TopicEffect::AddTag(TagName::Supported),
                TopicEffect::Resolve(ResolutionTag::UserAnsweredYes),
                TopicEffect::SetFlag(TopicFlag::Supported, true),
            ],
            actions: vec![FollowUpAction::ReplyThanks, FollowUpAction::ThankRepliers],
        },
        ReplyIntent::Answer(UserAnswer::No) => FollowUpTransition {
            next: FollowUpState::Resolved(UserAnswer::No),
            effects: vec![
                TopicEffect::RemoveTag(TagName::Supported),
                TopicEffect::AddTag(TagName::StaffEscalation),
                TopicEffect::RemoveTag(TagName::AskedUser),
                TopicEffect::Resolve(ResolutionTag::UserAnsweredNo),
                TopicEffect::SetFlag(TopicFlag::StaffEscalation, true),
            ],
            actions: vec![FollowUpAction::ReplyApology],
        },
        ReplyIntent::FreeText(_) if subject_escalated => FollowUpTransition {
            next: FollowUpState::Escalated,
            effects: Vec::new(),
            actions: vec![FollowUpAction::ForwardToStaff],
        },
        ReplyIntent::FreeText(_) => FollowUpTransition {
            next: FollowUpState::AwaitingResponse,
            effects: Vec::new(),
            actions: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        assert_eq!(
            ReplyIntent::parse("  YES \n"),
            ReplyIntent::Answer(UserAnswer::Yes)
        );
        assert_eq!(ReplyIntent::parse("No"), ReplyIntent::Answer(UserAnswer::No));
        assert_eq!(
            ReplyIntent::parse(" yes, thanks "),
            ReplyIntent::FreeText("yes, thanks".into())
        );
    }

    #[test]
    fn test_yes_row() {
        let t = transition(&ReplyIntent::Answer(UserAnswer::Yes), true);
        assert_eq!(t.next, FollowUpState::Resolved(UserAnswer::Yes));
        assert!(t
            .effects
            .contains(&TopicEffect::Resolve(ResolutionTag::UserAnsweredYes)));
        assert!(t
            .effects
            .contains(&TopicEffect::RemoveTag(TagName::StaffEscalation)));
        assert!(t.actions.contains(&FollowUpAction::ThankRepliers));
    }

    #[test]
    fn test_no_row_escalates() {
        let t = transition(&ReplyIntent::Answer(UserAnswer::No), false);
        assert_eq!(t.next, FollowUpState::Resolved(UserAnswer::No));
        assert!(t
            .effects
            .contains(&TopicEffect::SetFlag(TopicFlag::StaffEscalation, true)));
        assert_eq!(t.actions, vec![FollowUpAction::ReplyApology]);
    }

    #[test]
    fn test_free_text_forwarded_only_when_escalated() {
        let text = ReplyIntent::parse("still struggling");
        assert!(transition(&text, false).is_noop());

        let t = transition(&text, true);
        assert_eq!(t.next, FollowUpState::Escalated);
        assert_eq!(t.actions, vec![FollowUpAction::ForwardToStaff]);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            FollowUpState::Resolved(UserAnswer::No).to_string(),
            "resolved(no)"
        );
    }
}
