//! In-memory notifier for tests and dry runs

use std::sync::Mutex;

use super::payload::{
    DiscoursePayload, FollowUpPayload, SupplierPayload, TopicTagPayload, WebhookEvent,
};
use super::Notifier;

/// Keeps every event it is handed, in order
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<WebhookEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WebhookEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<WebhookEvent> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }

    pub fn supplier(&self) -> Vec<SupplierPayload> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                WebhookEvent::Supplier(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn discourse(&self) -> Vec<DiscoursePayload> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                WebhookEvent::Discourse(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn followups(&self) -> Vec<FollowUpPayload> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                WebhookEvent::FollowUp(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn tag_mirrors(&self) -> Vec<TopicTagPayload> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                WebhookEvent::TopicTag(p) => Some(p),
                _ => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: WebhookEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
