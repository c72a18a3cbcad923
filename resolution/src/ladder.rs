//! Resolution Ladder — priority-ordered, mutually exclusive resolution tags
//!
//! A topic carries at most one ladder tag once reconciled, and it is the
//! highest-priority one asserted so far.
//!
//! ```text
//! 7  User-Answered-Yes
//! 6  User-Selected
//! 5  User-Answered-No
//! 4  Admin-Selected
//! 3  Trained-Reply
//! 2  Sufficient-Words
//! 1  Insufficient
//! 0  Needs-Support
//! ```
//!
//! Asserting a rung removes every lower rung present and adds the target unless
//! a higher rung already stands, in which case the target is dropped. Plain
//! add/remove on the tag set stays available for unconditional resets.

use serde::{Deserialize, Serialize};

use crate::tags::{TagHandles, TagName, TagSet};

/// One rung of the resolution ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTag {
    /// The author confirmed they felt supported
    UserAnsweredYes,
    /// The author picked a reply as helpful
    UserSelected,
    /// The author said they did not feel supported
    UserAnsweredNo,
    /// An admin marked the topic as handled
    AdminSelected,
    /// A staff or trained replier answered
    TrainedReply,
    /// Enough words from other people
    SufficientWords,
    /// Aged out without enough support
    Insufficient,
    /// Opened, nothing established yet
    NeedsSupport,
}

impl ResolutionTag {
    /// Highest priority first.
    pub const ALL: [ResolutionTag; 8] = [
        Self::UserAnsweredYes,
        Self::UserSelected,
        Self::UserAnsweredNo,
        Self::AdminSelected,
        Self::TrainedReply,
        Self::SufficientWords,
        Self::Insufficient,
        Self::NeedsSupport,
    ];

    pub fn priority(self) -> u8 {
        match self {
            Self::UserAnsweredYes => 7,
            Self::UserSelected => 6,
            Self::UserAnsweredNo => 5,
            Self::AdminSelected => 4,
            Self::TrainedReply => 3,
            Self::SufficientWords => 2,
            Self::Insufficient => 1,
            Self::NeedsSupport => 0,
        }
    }

    pub fn tag_name(self) -> TagName {
        match self {
            Self::UserAnsweredYes => TagName::UserAnsweredYes,
            Self::UserSelected => TagName::UserSelected,
            Self::UserAnsweredNo => TagName::UserAnsweredNo,
            Self::AdminSelected => TagName::AdminSelected,
            Self::TrainedReply => TagName::TrainedReply,
            Self::SufficientWords => TagName::SufficientWords,
            Self::Insufficient => TagName::Insufficient,
            Self::NeedsSupport => TagName::NeedsSupport,
        }
    }

    /// Look up a rung by forum tag name. Unknown names are not ladder tags.
    pub fn parse(name: &str) -> Option<Self> {
        TagName::parse(name).and_then(TagName::as_resolution)
    }
}

impl std::fmt::Display for ResolutionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag_name().as_str())
    }
}

/// What a single assertion did to the tag set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderOutcome {
    pub target: ResolutionTag,
    /// Whether the target tag was newly added
    pub added: bool,
    /// Lower rungs that were stripped
    pub removed: Vec<ResolutionTag>,
    /// The higher rung that made the target a no-op
    pub superseded_by: Option<ResolutionTag>,
}

impl LadderOutcome {
    pub fn changed(&self) -> bool {
        self.added || !self.removed.is_empty()
    }
}

/// The ladder algorithm over a topic's tag set
pub struct ResolutionLadder;

impl ResolutionLadder {
    /// Assert a rung on the tag set.
    pub fn apply(tags: &mut TagSet, handles: &TagHandles, target: ResolutionTag) -> LadderOutcome {
        let priority = target.priority();

        let mut removed = Vec::new();
        for rung in ResolutionTag::ALL {
            if rung.priority() < priority && handles.remove(tags, rung.tag_name()) {
                removed.push(rung);
            }
        }

        let superseded_by = ResolutionTag::ALL
            .into_iter()
            .find(|rung| rung.priority() > priority && handles.has(tags, rung.tag_name()));

        let added = superseded_by.is_none() && handles.add(tags, target.tag_name());

        LadderOutcome {
            target,
            added,
            removed,
            superseded_by,
        }
    }

    /// Assert a rung by forum tag name. Names outside the ladder are a no-op.
    pub fn apply_named(
        tags: &mut TagSet,
        handles: &TagHandles,
        name: &str,
    ) -> Option<LadderOutcome> {
        ResolutionTag::parse(name).map(|target| Self::apply(tags, handles, target))
    }

    /// Highest rung currently present.
    pub fn dominant(tags: &TagSet, handles: &TagHandles) -> Option<ResolutionTag> {
        ResolutionTag::ALL
            .into_iter()
            .find(|rung| handles.has(tags, rung.tag_name()))
    }

    /// Every rung currently present, highest first.
    pub fn present(tags: &TagSet, handles: &TagHandles) -> Vec<ResolutionTag> {
        ResolutionTag::ALL
            .into_iter()
            .filter(|rung| handles.has(tags, rung.tag_name()))
            .collect()
    }
}
