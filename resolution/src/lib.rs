//! Resolution core for peer-support topics
//!
//! This library provides:
//! - A resolution ladder: eight mutually exclusive tags ranked by priority
//! - A support evaluator deciding, per reply, whether a topic counts as supported
//! - A follow-up conversation asking topic authors whether they felt supported
//! - Scheduled sweeps reconciling topics no live event revisited
//! - Asynchronous webhook dispatch with timeouts and retries
//!
//! # Flow
//!
//! ```text
//! forum event ──▶ SupportService ──▶ SupportEvaluator ──┐
//!                      │                                 ├─▶ TopicEffect[] ──▶ apply + save
//!                      └──────────▶ FollowUpConversation ┘                        │
//!                                                                                 ▼
//! ScheduledSweeper (daily / 6-hourly) ───────────────────────────────▶ Notifier (webhooks)
//! ```
//!
//! Storage and messaging stay with the forum behind [`forum::ForumStore`] and
//! [`forum::Messenger`]; [`forum::MemoryForum`] implements both.

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod context;
pub mod effects;
pub mod error;
pub mod evaluator;
pub mod followup;
pub mod forum;
pub mod ladder;
pub mod locks;
pub mod model;
pub mod notify;
pub mod service;
pub mod sweeper;
pub mod tags;
pub mod video;

// Re-export key policy types
pub use config::{FollowUpConfig, SupportConfig, SweepConfig, WebhookConfig};
pub use context::{SharedContext, SupportContext};
pub use error::{ConfigError, ForumError, ForumResult, NotifyError, SupportError, SupportResult};

// Re-export the state machines
pub use effects::{apply_effects, AppliedEffects, TopicEffect};
pub use evaluator::{
    EvaluationDecision, EvaluationInput, EvaluationReason, ReplierRole, SupportEvaluator,
};
pub use followup::{AskTrigger, FollowUpConversation, FollowUpState, ReplyOutcome, UserAnswer};
pub use ladder::{LadderOutcome, ResolutionLadder, ResolutionTag};

// Re-export forum collaborators
pub use forum::{ForumStore, MemoryForum, Messenger, PrivateMessage, TopicQuery};
pub use model::{CategoryId, Post, Topic, TopicFields, TopicFlag, TopicId, User, UserId};
pub use tags::{TagHandles, TagId, TagName, TagSet};

// Re-export entry points
pub use locks::TopicLocks;
pub use notify::{Notifier, RecordingNotifier, WebhookDispatcher, WebhookEvent};
pub use service::{PostOutcome, SupportService, TagOutcome, TopicStatus};
pub use sweeper::{ScheduledSweeper, SweepKind, SweepReport};
