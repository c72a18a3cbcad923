//! Topic effects — the only way decisions mutate a topic
//!
//! Evaluator and conversation logic return effect lists; [`apply_effects`]
//! runs them in order against a topic's tags and fields.

use serde::{Deserialize, Serialize};

use crate::ladder::{LadderOutcome, ResolutionLadder, ResolutionTag};
use crate::model::{Topic, TopicFlag};
use crate::tags::{TagHandles, TagName};

/// A single mutation of a topic's tags or workflow flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "arg")]
pub enum TopicEffect {
    /// Plain, priority-unaware add
    AddTag(TagName),
    /// Plain, priority-unaware remove
    RemoveTag(TagName),
    /// Assert a ladder rung
    Resolve(ResolutionTag),
    SetFlag(TopicFlag, bool),
}

impl std::fmt::Display for TopicEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddTag(tag) => write!(f, "+{}", tag),
            Self::RemoveTag(tag) => write!(f, "-{}", tag),
            Self::Resolve(rung) => write!(f, "resolve:{}", rung),
            Self::SetFlag(flag, value) => write!(f, "{:?}={}", flag, value),
        }
    }
}

/// Summary of what applying an effect list changed
#[derive(Debug, Clone, Default)]
pub struct AppliedEffects {
    pub ladder: Vec<LadderOutcome>,
    pub tags_added: Vec<TagName>,
    pub tags_removed: Vec<TagName>,
}

impl AppliedEffects {
    pub fn removed(&self, tag: TagName) -> bool {
        self.tags_removed.contains(&tag)
            || self
                .ladder
                .iter()
                .any(|o| o.removed.iter().any(|r| r.tag_name() == tag))
    }

    pub fn added(&self, tag: TagName) -> bool {
        self.tags_added.contains(&tag)
            || self
                .ladder
                .iter()
                .any(|o| o.added && o.target.tag_name() == tag)
    }
}

/// Apply effects in order. Nothing is persisted here.
pub fn apply_effects(
    topic: &mut Topic,
    handles: &TagHandles,
    effects: &[TopicEffect],
) -> AppliedEffects {
    let mut applied = AppliedEffects::default();
    for effect in effects {
        match *effect {
            TopicEffect::AddTag(tag) => {
                if handles.add(&mut topic.tags, tag) {
                    applied.tags_added.push(tag);
                }
            }
            TopicEffect::RemoveTag(tag) => {
                if handles.remove(&mut topic.tags, tag) {
                    applied.tags_removed.push(tag);
                }
            }
            TopicEffect::Resolve(rung) => {
                applied
                    .ladder
                    .push(ResolutionLadder::apply(&mut topic.tags, handles, rung));
            }
            TopicEffect::SetFlag(flag, value) => topic.fields.set(flag, value),
        }
    }
    applied
}

/// Render an effect list for log lines.
pub fn describe(effects: &[TopicEffect]) -> String {
    effects
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
