//! Error types for the resolution core
//!
//! Every failure is swallowed at the boundary of a unit of work (one post event,
//! one swept topic) and logged; these types exist so the `handle_*` entry points
//! can report what went wrong to tests and embedders.

use crate::model::TopicId;

/// Errors raised by the forum collaborators (storage, messaging, lookups)
#[derive(Debug, thiserror::Error)]
pub enum ForumError {
    #[error("Failed to persist topic {topic_id}: {reason}")]
    Persist { topic_id: TopicId, reason: String },

    #[error("Failed to create message: {0}")]
    Message(String),

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for forum collaborator operations
pub type ForumResult<T> = Result<T, ForumError>;

/// Errors raised while delivering a webhook
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Endpoint {endpoint} answered {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Delivery to {endpoint} timed out after {timeout_secs}s")]
    Timeout { endpoint: String, timeout_secs: u64 },

    #[error("Dispatcher queue closed")]
    QueueClosed,
}

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid video link pattern `{pattern}`: {source}")]
    VideoPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Umbrella error for a single unit of work
#[derive(Debug, thiserror::Error)]
pub enum SupportError {
    #[error(transparent)]
    Forum(#[from] ForumError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for core operations
pub type SupportResult<T> = Result<T, SupportError>;
