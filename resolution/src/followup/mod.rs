//! Follow-up conversations with topic authors
//!
//! A private message from the system account asks the author of a topic
//! whether they got the support they needed. The message carries
//! `ref_topic_id`, which ties every reply back to the subject topic.

pub mod conversation;
pub mod messages;
pub mod state;

pub use conversation::{AskTrigger, FollowUpConversation, ReplyOutcome};
pub use state::{
    transition, FollowUpAction, FollowUpState, FollowUpTransition, ReplyIntent, UserAnswer,
};
