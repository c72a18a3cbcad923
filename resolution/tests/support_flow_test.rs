//! Integration tests for live post events through the support service
//!
//! Tests verify:
//! - First post opens the need with exactly `Needs-Support`
//! - Non-author words over the limit make a topic supported
//! - Trained replies below the limit make a topic supported
//! - Rapid-response members support a topic once enough of them reply
//! - Hiding a topic clears its need
//! - Deleted replies never count towards the word limit
//! - Video replies short-circuit the word count and clear escalation
//! - Concurrent replies never leave two ladder tags behind
//! - Supplier and discourse hooks follow every evaluated post

use std::sync::Arc;
use std::thread;

use resolution::{
    ForumStore, MemoryForum, RecordingNotifier, ResolutionLadder, SupportConfig, SupportContext,
    SupportService, TagName, TopicId, TopicStatus, User,
};

struct Harness {
    forum: Arc<MemoryForum>,
    notifier: Arc<RecordingNotifier>,
    service: Arc<SupportService>,
}

impl Harness {
    fn new() -> Self {
        let forum = Arc::new(MemoryForum::new());
        let notifier = Arc::new(RecordingNotifier::new());
        for user in [
            User::new(1, "system"),
            User::new(10, "op"),
            User::new(20, "peer"),
            User::new(21, "peer2"),
            User::new(30, "trained").in_group(42),
            User::new(40, "mod").as_staff(),
            User::new(50, "rapid1").in_group(54),
            User::new(51, "rapid2").in_group(54),
        ] {
            forum.upsert_user(user).unwrap();
        }
        let ctx = SupportContext::new(
            forum.clone(),
            forum.clone(),
            notifier.clone(),
            SupportConfig::default(),
        )
        .unwrap();
        Self {
            forum,
            notifier,
            service: Arc::new(SupportService::new(ctx.shared())),
        }
    }

    fn open_topic(&self, category: u64) -> TopicId {
        let topic = self.forum.create_topic(10, "I need help", Some(category)).unwrap();
        self.post(topic.id, 10, "I am having a hard time lately");
        topic.id
    }

    fn post(&self, topic_id: TopicId, user_id: u64, raw: &str) {
        let post = self.forum.create_post(topic_id, user_id, raw).unwrap();
        self.service.on_post_created(&post);
    }

    fn tags(&self, topic_id: TopicId) -> Vec<TagName> {
        let topic = self.forum.topic(topic_id).unwrap().unwrap();
        self.service.context().handles.known(&topic.tags)
    }
}

fn words(n: usize) -> String {
    "word ".repeat(n)
}

#[test]
fn test_first_post_opens_need() {
    let h = Harness::new();
    let topic_id = h.open_topic(67);

    let topic = h.forum.topic(topic_id).unwrap().unwrap();
    assert_eq!(topic.fields.needs_support, Some(true));
    assert_eq!(topic.fields.supported, Some(false));
    assert_eq!(h.tags(topic_id), vec![TagName::NeedsSupport]);

    let supplier = h.notifier.supplier();
    assert_eq!(supplier.len(), 1);
    assert!(!supplier[0].supported);
    assert!(h.notifier.discourse().is_empty());
}

#[test]
fn test_word_threshold_across_two_replies() {
    let h = Harness::new();
    let topic_id = h.open_topic(67);

    h.post(topic_id, 20, &words(300));
    assert_eq!(h.tags(topic_id), vec![TagName::NeedsSupport]);

    h.post(topic_id, 20, &words(200));
    assert_eq!(
        h.tags(topic_id),
        vec![TagName::SufficientWords, TagName::Supported]
    );

    let discourse = h.notifier.discourse();
    assert_eq!(discourse.len(), 2);
    assert!(!discourse[0].newly_supported);
    assert!(discourse[1].supported && discourse[1].newly_supported);
}

#[test]
fn test_author_words_do_not_count() {
    let h = Harness::new();
    let topic_id = h.open_topic(67);

    h.post(topic_id, 10, &words(800));
    h.post(topic_id, 20, "hugs");
    assert_eq!(h.tags(topic_id), vec![TagName::NeedsSupport]);
}

#[test]
fn test_trained_reply_below_threshold() {
    let h = Harness::new();
    let topic_id = h.open_topic(85);

    h.post(topic_id, 30, "You are not alone in this.");
    assert_eq!(
        h.tags(topic_id),
        vec![TagName::TrainedReply, TagName::Supported]
    );
}

#[test]
fn test_rapid_response_needs_two_replies() {
    let h = Harness::new();
    let topic_id = h.open_topic(67);

    h.post(topic_id, 50, "Thinking of you today.");
    assert_eq!(h.tags(topic_id), vec![TagName::NeedsSupport]);

    h.post(topic_id, 51, "You matter. We are here.");
    assert_eq!(
        h.tags(topic_id),
        vec![TagName::TrainedReply, TagName::Supported]
    );
    assert!(h.notifier.discourse().last().unwrap().newly_supported);
}

#[test]
fn test_hidden_topic_drops_need() {
    let h = Harness::new();
    let topic_id = h.open_topic(67);
    assert_eq!(h.tags(topic_id), vec![TagName::NeedsSupport]);

    h.forum.update_topic(topic_id, |t| t.visible = false).unwrap();
    h.service
        .on_topic_status_changed(topic_id, TopicStatus::Visible, false);

    assert!(h.tags(topic_id).is_empty());
}

#[test]
fn test_deleted_reply_words_do_not_count() {
    let h = Harness::new();
    let topic_id = h.open_topic(67);
    let long = h.forum.create_post(topic_id, 20, &words(600)).unwrap();
    h.forum.delete_post(long.id).unwrap();

    h.post(topic_id, 21, "Sending you strength.");
    assert_eq!(h.tags(topic_id), vec![TagName::NeedsSupport]);
    let topic = h.forum.topic(topic_id).unwrap().unwrap();
    assert_eq!(topic.fields.supported, Some(false));
}

#[test]
fn test_trained_reply_keeps_higher_rung_after_more_words() {
    let h = Harness::new();
    let topic_id = h.open_topic(67);

    h.post(topic_id, 30, "short and kind");
    h.post(topic_id, 20, &words(600));

    let tags = h.tags(topic_id);
    assert!(tags.contains(&TagName::TrainedReply));
    assert!(!tags.contains(&TagName::SufficientWords));
}

#[test]
fn test_video_reply_short_circuits() {
    let h = Harness::new();
    let topic_id = h.open_topic(67);
    h.forum.attach_tag(topic_id, "Staff-Escalation").unwrap();

    h.post(topic_id, 20, "made you this https://www.loom.com/share/abc123");

    let tags = h.tags(topic_id);
    assert!(tags.contains(&TagName::SufficientWords));
    assert!(tags.contains(&TagName::Supported));
    assert!(tags.contains(&TagName::VideoReply));
    assert!(!tags.contains(&TagName::StaffEscalation));
    assert!(!tags.contains(&TagName::NeedsSupport));
}

#[test]
fn test_other_categories_untouched() {
    let h = Harness::new();
    let topic_id = h.open_topic(4);
    h.post(topic_id, 20, &words(600));

    assert!(h.tags(topic_id).is_empty());
    assert!(h.notifier.events().is_empty());
}

#[test]
fn test_concurrent_replies_keep_one_ladder_tag() {
    let h = Harness::new();
    let topic_id = h.open_topic(67);

    let workers: Vec<_> = [(20, 300), (21, 300), (30, 5), (20, 250)]
        .into_iter()
        .map(|(user_id, count)| {
            let forum = Arc::clone(&h.forum);
            let service = Arc::clone(&h.service);
            thread::spawn(move || {
                let post = forum.create_post(topic_id, user_id, &words(count)).unwrap();
                service.on_post_created(&post);
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let topic = h.forum.topic(topic_id).unwrap().unwrap();
    let handles = &h.service.context().handles;
    assert_eq!(ResolutionLadder::present(&topic.tags, handles).len(), 1);
    assert!(handles.has(&topic.tags, TagName::Supported));
}
