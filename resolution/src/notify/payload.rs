//! Outbound webhook payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::WebhookConfig;
use crate::model::{CategoryId, TopicId, UserId};
use crate::tags::TagId;

/// Support state of a topic after a reply or sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierPayload {
    pub topic_id: TopicId,
    pub supported: bool,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    pub closed: bool,
}

/// Analytics mirror of a reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoursePayload {
    pub topic_id: TopicId,
    pub supported: bool,
    pub newly_supported: bool,
    /// Rendered post body
    pub body: String,
    pub username: String,
}

/// Yes/no resolution state carried with a triage message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowUpResponse {
    Yes,
    No,
}

/// Free-text follow-up reply forwarded for staff triage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpPayload {
    /// The private-message topic the reply was posted in
    pub dm_id: TopicId,
    /// The subject topic
    pub topic_id: TopicId,
    pub message: String,
    pub discourse_user_id: UserId,
    pub response: FollowUpResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagEventKind {
    Created,
    Deleted,
}

/// Mirror of a single tag attached to or removed from a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicTagPayload {
    pub event: TagEventKind,
    pub topic_id: TopicId,
    pub tag_id: TagId,
    pub tag_name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TopicTagPayload {
    pub fn created(topic_id: TopicId, tag_id: TagId, tag_name: impl Into<String>) -> Self {
        Self {
            event: TagEventKind::Created,
            topic_id,
            tag_id,
            tag_name: tag_name.into(),
            created_at: Some(Utc::now()),
            deleted_at: None,
        }
    }

    pub fn deleted(topic_id: TopicId, tag_id: TagId, tag_name: impl Into<String>) -> Self {
        Self {
            event: TagEventKind::Deleted,
            topic_id,
            tag_id,
            tag_name: tag_name.into(),
            created_at: None,
            deleted_at: Some(Utc::now()),
        }
    }
}

/// How a payload is put on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Form,
    Json,
}

/// The payload of a [`WebhookEvent`] without its `kind` tag, as posted
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum PayloadBody<'a> {
    Supplier(&'a SupplierPayload),
    Discourse(&'a DiscoursePayload),
    FollowUp(&'a FollowUpPayload),
    TopicTag(&'a TopicTagPayload),
}

/// An intent emitted by the core, delivered by a [`super::Notifier`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WebhookEvent {
    Supplier(SupplierPayload),
    Discourse(DiscoursePayload),
    FollowUp(FollowUpPayload),
    TopicTag(TopicTagPayload),
}

impl WebhookEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Supplier(_) => "supplier",
            Self::Discourse(_) => "discourse",
            Self::FollowUp(_) => "followup",
            Self::TopicTag(_) => "topic_tag",
        }
    }

    pub fn topic_id(&self) -> TopicId {
        match self {
            Self::Supplier(p) => p.topic_id,
            Self::Discourse(p) => p.topic_id,
            Self::FollowUp(p) => p.topic_id,
            Self::TopicTag(p) => p.topic_id,
        }
    }

    /// Configured endpoint for this kind of event, if any.
    pub fn endpoint<'a>(&self, config: &'a WebhookConfig) -> Option<&'a str> {
        let url = match self {
            Self::Supplier(_) => &config.supplier_url,
            Self::Discourse(_) => &config.discourse_url,
            Self::FollowUp(_) => &config.followup_url,
            Self::TopicTag(_) => &config.topic_tag_url,
        };
        url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn body(&self) -> PayloadBody<'_> {
        match self {
            Self::Supplier(p) => PayloadBody::Supplier(p),
            Self::Discourse(p) => PayloadBody::Discourse(p),
            Self::FollowUp(p) => PayloadBody::FollowUp(p),
            Self::TopicTag(p) => PayloadBody::TopicTag(p),
        }
    }

    /// Supplier, discourse and follow-up hooks are form posts; the tag mirror is JSON.
    pub fn encoding(&self) -> Encoding {
        match self {
            Self::TopicTag(_) => Encoding::Json,
            _ => Encoding::Form,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supplier() -> WebhookEvent {
        WebhookEvent::Supplier(SupplierPayload {
            topic_id: 9,
            supported: true,
            username: "op".into(),
            category_id: Some(67),
            closed: false,
        })
    }

    #[test]
    fn test_endpoint_selection() {
        let config = WebhookConfig::default();
        assert!(supplier()
            .endpoint(&config)
            .is_some_and(|u| u.ends_with("/webhooks/supplier")));

        let tag = WebhookEvent::TopicTag(TopicTagPayload::created(9, 3, "Supported"));
        assert_eq!(tag.endpoint(&config), None);
        assert_eq!(tag.encoding(), Encoding::Json);
        assert_eq!(supplier().encoding(), Encoding::Form);
    }

    #[test]
    fn test_body_drops_kind_tag() {
        let tagged = serde_json::to_value(supplier()).unwrap();
        assert_eq!(tagged["kind"], "supplier");

        let body = serde_json::to_value(supplier().body()).unwrap();
        assert!(body.get("kind").is_none());
        assert_eq!(body["topic_id"], 9);
        assert_eq!(body["category_id"], 67);
    }

    #[test]
    fn test_empty_endpoint_is_unset() {
        let config = WebhookConfig {
            supplier_url: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(supplier().endpoint(&config), None);
    }

    #[test]
    fn test_tag_payload_wire_shape() {
        let payload = TopicTagPayload::deleted(9, 3, "Asked-User");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["event"], "deleted");
        assert_eq!(json["tag_name"], "Asked-User");
        assert!(json["created_at"].is_null());
        assert!(json["deleted_at"].is_string());
    }

    #[test]
    fn test_followup_response_lowercase() {
        let json = serde_json::to_value(FollowUpResponse::No).unwrap();
        assert_eq!(json, "no");
    }
}
