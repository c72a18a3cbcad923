//! Policy configuration
//!
//! Thresholds, category allow-lists, group ids and webhook endpoints. Every value
//! has a default matching the production forum; a TOML file can override any of
//! them and a handful of deployment URLs can be overridden from the environment.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::{CategoryId, GroupId};

/// Top-level policy configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupportConfig {
    /// Non-author words needed before a topic counts as supported.
    pub support_limit: u32,
    /// Non-author words needed before the author is asked for feedback.
    pub ask_user_limit: u32,
    /// Categories evaluated on every new reply.
    pub support_categories: Vec<CategoryId>,
    /// Categories whose authors receive a follow-up private message.
    pub ask_categories: Vec<CategoryId>,
    /// Categories whose new topics are tagged `Need-Listening-Ear`.
    pub platform_categories: Vec<CategoryId>,
    /// Staff and trained-replier primary groups.
    pub trained_groups: Vec<GroupId>,
    /// Rapid-response primary groups; they count once the group has replied enough.
    pub rapid_response_groups: Vec<GroupId>,
    /// Replies from rapid-response members needed before `Trained-Reply` applies.
    pub rapid_response_min_replies: u32,
    /// Username of the account that sends follow-up messages.
    pub system_username: String,
    /// Public forum URL used to build topic links in messages.
    pub base_url: String,
    /// Regex patterns recognised as video replies.
    pub video_patterns: Vec<String>,
    pub followup: FollowUpConfig,
    pub sweeps: SweepConfig,
    pub webhooks: WebhookConfig,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            support_limit: 500,
            ask_user_limit: 300,
            support_categories: vec![67, 77, 85, 87, 88, 89, 102, 106],
            ask_categories: vec![67, 89, 4],
            platform_categories: vec![77, 87, 102, 106, 85, 89],
            trained_groups: vec![3, 42, 73],
            rapid_response_groups: vec![54],
            rapid_response_min_replies: 2,
            system_username: "system".into(),
            base_url: "https://forum.heartsupport.com".into(),
            video_patterns: vec![
                r"(?i)https?://(www\.)?loom\.com/(share|embed)/".into(),
                r"(?i)https?://(www\.)?youtube\.com/watch".into(),
                r"(?i)https?://youtu\.be/".into(),
                r"(?i)https?://(www\.)?vimeo\.com/\d+".into(),
            ],
            followup: FollowUpConfig::default(),
            sweeps: SweepConfig::default(),
            webhooks: WebhookConfig::default(),
        }
    }
}

impl SupportConfig {
    /// Load configuration from a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: SupportConfig = toml::from_str(content)?;
        Ok(config.with_env_overrides())
    }

    /// Apply deployment overrides from the environment.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("SUPPORT_BASE_URL") {
            self.base_url = url;
        }
        if let Ok(url) = std::env::var("SUPPORT_SUPPLIER_WEBHOOK_URL") {
            self.webhooks.supplier_url = Some(url);
        }
        if let Ok(url) = std::env::var("SUPPORT_DISCOURSE_WEBHOOK_URL") {
            self.webhooks.discourse_url = Some(url);
        }
        if let Ok(url) = std::env::var("SUPPORT_FOLLOWUP_WEBHOOK_URL") {
            self.webhooks.followup_url = Some(url);
        }
        if let Ok(url) = std::env::var("SUPPORT_TOPIC_TAG_WEBHOOK_URL") {
            self.webhooks.topic_tag_url = Some(url);
        }
        self
    }

    pub fn is_support_category(&self, category: Option<CategoryId>) -> bool {
        category.is_some_and(|c| self.support_categories.contains(&c))
    }

    pub fn is_ask_category(&self, category: Option<CategoryId>) -> bool {
        category.is_some_and(|c| self.ask_categories.contains(&c))
    }

    pub fn is_platform_category(&self, category: Option<CategoryId>) -> bool {
        category.is_some_and(|c| self.platform_categories.contains(&c))
    }

    /// Public link to a topic.
    pub fn topic_url(&self, topic_id: u64) -> String {
        format!("{}/t/{}", self.base_url.trim_end_matches('/'), topic_id)
    }
}

/// Follow-up conversation wording that varies per deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FollowUpConfig {
    /// Feedback form linked after a "yes".
    pub yes_form_url: String,
    /// Feedback form linked after a "no".
    pub no_form_url: String,
}

impl Default for FollowUpConfig {
    fn default() -> Self {
        Self {
            yes_form_url: "https://docs.google.com/forms/d/e/1FAIpQLScrXmJ96G3l4aypDtf307JycIhFHS9_8WMkF65m9JiM9Xm6WA/viewform".into(),
            no_form_url: "https://docs.google.com/forms/d/e/1FAIpQLSdxWbRMQPUe0IxL0xBEDA5RZ5B0a9Yl2e25ltW5RGDE6J2DOA/viewform".into(),
        }
    }
}

/// Windows and cadences for the scheduled sweeps.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Topics created on the calendar day this many days ago are closed out.
    pub close_out_age_days: i64,
    /// Youngest topic the ask-user sweep considers.
    pub ask_min_age_hours: i64,
    /// Oldest topic the ask-user sweep considers.
    pub ask_max_age_days: i64,
    pub close_out_every_secs: u64,
    pub ask_user_every_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            close_out_age_days: 14,
            ask_min_age_hours: 24,
            ask_max_age_days: 14,
            close_out_every_secs: 24 * 60 * 60,
            ask_user_every_secs: 6 * 60 * 60,
        }
    }
}

/// Outbound webhook endpoints and delivery policy. Unset endpoints are skipped.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub supplier_url: Option<String>,
    pub discourse_url: Option<String>,
    pub followup_url: Option<String>,
    pub topic_tag_url: Option<String>,
    /// Per-attempt timeout.
    pub timeout_secs: u64,
    /// Attempts per event, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub initial_backoff_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            supplier_url: Some("https://porter.heartsupport.com/webhooks/supplier".into()),
            discourse_url: Some("https://porter.heartsupport.com/twilio/discourse_webhook".into()),
            followup_url: Some("https://porter.heartsupport.com/webhooks/followup".into()),
            topic_tag_url: None,
            timeout_secs: 10,
            max_attempts: 3,
            initial_backoff_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_forum_policy() {
        let config = SupportConfig::default();
        assert_eq!(config.support_limit, 500);
        assert_eq!(config.ask_user_limit, 300);
        assert!(config.is_support_category(Some(67)));
        assert!(!config.is_support_category(Some(4)));
        assert!(config.is_ask_category(Some(4)));
        assert!(!config.is_ask_category(None));
        assert_eq!(config.sweeps.ask_user_every_secs, 21_600);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SupportConfig::from_toml(
            r#"
support_limit = 250
ask_categories = [1, 2]

[webhooks]
max_attempts = 5
"#,
        )
        .unwrap();

        assert_eq!(config.support_limit, 250);
        assert_eq!(config.ask_user_limit, 300);
        assert_eq!(config.ask_categories, vec![1, 2]);
        assert_eq!(config.webhooks.max_attempts, 5);
        assert_eq!(config.webhooks.timeout_secs, 10);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("support.toml");
        std::fs::write(&path, "system_username = \"bot\"\n").unwrap();

        let config = SupportConfig::from_file(&path).unwrap();
        assert_eq!(config.system_username, "bot");
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = SupportConfig::from_toml("support_limit = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_topic_url_trims_slash() {
        let config = SupportConfig {
            base_url: "https://forum.example/".into(),
            ..Default::default()
        };
        assert_eq!(config.topic_url(42), "https://forum.example/t/42");
    }

    #[test]
    fn test_default_ignores_environment() {
        std::env::set_var("SUPPORT_BASE_URL", "https://staging.example");
        let config = SupportConfig::default();
        assert_eq!(config.base_url, "https://forum.heartsupport.com");
        assert_eq!(config.topic_url(5), "https://forum.heartsupport.com/t/5");

        let config = config.with_env_overrides();
        assert_eq!(config.base_url, "https://staging.example");
        std::env::remove_var("SUPPORT_BASE_URL");
    }
}
