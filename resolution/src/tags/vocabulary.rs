//! The fixed tag vocabulary the core reads and writes

use serde::{Deserialize, Serialize};

use crate::ladder::ResolutionTag;

/// Every tag name the core touches.
///
/// The first eight variants are the resolution ladder; the rest are plain
/// workflow markers mutated without priority checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagName {
    UserAnsweredYes,
    UserSelected,
    UserAnsweredNo,
    AdminSelected,
    TrainedReply,
    SufficientWords,
    Insufficient,
    NeedsSupport,
    Supported,
    AskedUser,
    StaffEscalation,
    VideoReply,
    NeedListeningEar,
}

impl TagName {
    pub const COUNT: usize = 13;

    pub const ALL: [TagName; Self::COUNT] = [
        Self::UserAnsweredYes,
        Self::UserSelected,
        Self::UserAnsweredNo,
        Self::AdminSelected,
        Self::TrainedReply,
        Self::SufficientWords,
        Self::Insufficient,
        Self::NeedsSupport,
        Self::Supported,
        Self::AskedUser,
        Self::StaffEscalation,
        Self::VideoReply,
        Self::NeedListeningEar,
    ];

    /// Name as stored in the forum.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserAnsweredYes => "User-Answered-Yes",
            Self::UserSelected => "User-Selected",
            Self::UserAnsweredNo => "User-Answered-No",
            Self::AdminSelected => "Admin-Selected",
            Self::TrainedReply => "Trained-Reply",
            Self::SufficientWords => "Sufficient-Words",
            Self::Insufficient => "Insufficient",
            Self::NeedsSupport => "Needs-Support",
            Self::Supported => "Supported",
            Self::AskedUser => "Asked-User",
            Self::StaffEscalation => "Staff-Escalation",
            Self::VideoReply => "Video-Reply",
            Self::NeedListeningEar => "Need-Listening-Ear",
        }
    }

    /// Look a forum tag name up in the vocabulary. Matching is exact.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// The ladder rung this tag represents, if any.
    pub fn as_resolution(self) -> Option<ResolutionTag> {
        ResolutionTag::ALL
            .into_iter()
            .find(|r| r.tag_name() == self)
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for TagName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
