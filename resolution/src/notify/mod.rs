//! Outbound notifications
//!
//! The core emits [`WebhookEvent`] intents after a topic's state is persisted.
//! Delivery is somebody else's problem: [`WebhookDispatcher`] queues them for a
//! background task with its own timeout and retry policy, [`RecordingNotifier`]
//! keeps them for assertions.

pub mod dispatcher;
pub mod payload;
pub mod recording;

pub use dispatcher::{DispatchStats, HttpSink, WebhookDispatcher, WebhookSink};
pub use payload::{
    DiscoursePayload, Encoding, FollowUpPayload, FollowUpResponse, PayloadBody,
    SupplierPayload, TagEventKind, TopicTagPayload, WebhookEvent,
};
pub use recording::RecordingNotifier;

/// Receiver of webhook intents. Must not block the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: WebhookEvent);
}
