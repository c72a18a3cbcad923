//! Forum event ingestion
//!
//! Events arrive as JSON lines. Each one is first applied to the forum mirror,
//! the way the forum itself would record it, and then handed to the service.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use resolution::{
    CategoryId, ForumStore, MemoryForum, ScheduledSweeper, SharedContext, SupportService,
    SweepKind, Topic, TopicId, TopicStatus, User, UserId,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One forum-side change, as reported by the forum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForumEvent {
    UserUpserted {
        user: User,
    },
    TopicCreated {
        topic_id: TopicId,
        user_id: UserId,
        title: String,
        #[serde(default)]
        category_id: Option<CategoryId>,
        #[serde(default)]
        created_at: Option<DateTime<Utc>>,
    },
    PostCreated {
        topic_id: TopicId,
        user_id: UserId,
        raw: String,
    },
    TopicStatusChanged {
        topic_id: TopicId,
        status: TopicStatus,
        enabled: bool,
    },
    TopicTagCreated {
        topic_id: TopicId,
        tag_name: String,
    },
    /// Run a sweep now instead of waiting for the schedule
    Sweep {
        kind: SweepKind,
    },
}

impl ForumEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserUpserted { .. } => "user_upserted",
            Self::TopicCreated { .. } => "topic_created",
            Self::PostCreated { .. } => "post_created",
            Self::TopicStatusChanged { .. } => "topic_status_changed",
            Self::TopicTagCreated { .. } => "topic_tag_created",
            Self::Sweep { .. } => "sweep",
        }
    }
}

/// The forum mirror plus the services that react to it
pub struct Worker {
    forum: Arc<MemoryForum>,
    service: SupportService,
    sweeper: ScheduledSweeper,
}

impl Worker {
    pub fn new(forum: Arc<MemoryForum>, ctx: SharedContext) -> Self {
        Self {
            forum,
            service: SupportService::new(Arc::clone(&ctx)),
            sweeper: ScheduledSweeper::new(ctx),
        }
    }

    pub fn forum(&self) -> &MemoryForum {
        &self.forum
    }

    pub fn sweeper(&self) -> &ScheduledSweeper {
        &self.sweeper
    }

    /// Record `event` in the forum mirror, then run the matching handler.
    pub fn apply(&self, event: ForumEvent) -> Result<()> {
        match event {
            ForumEvent::UserUpserted { user } => {
                self.forum.upsert_user(user)?;
            }
            ForumEvent::TopicCreated {
                topic_id,
                user_id,
                title,
                category_id,
                created_at,
            } => {
                if self.forum.topic(topic_id)?.is_some() {
                    anyhow::bail!("topic {} already exists", topic_id);
                }
                let mut topic = Topic::new(topic_id, title, user_id, category_id);
                if let Some(created_at) = created_at {
                    topic.created_at = created_at;
                }
                self.forum.insert_topic(topic)?;
                let tagged = self.service.handle_topic_created(topic_id)?;
                debug!(topic_id, tagged, "Topic created");
            }
            ForumEvent::PostCreated {
                topic_id,
                user_id,
                raw,
            } => {
                let post = self
                    .forum
                    .create_post(topic_id, user_id, &raw)
                    .with_context(|| format!("failed to record post in topic {}", topic_id))?;
                let outcome = self.service.handle_post_created(&post)?;
                debug!(
                    topic_id,
                    post_id = post.id,
                    decision = ?outcome.decision,
                    follow_up = ?outcome.follow_up,
                    "Post created"
                );
            }
            ForumEvent::TopicStatusChanged {
                topic_id,
                status,
                enabled,
            } => {
                let found = self.forum.update_topic(topic_id, |t| match status {
                    TopicStatus::Closed => t.closed = enabled,
                    TopicStatus::Visible => t.visible = enabled,
                })?;
                if !found {
                    anyhow::bail!("topic {} not found", topic_id);
                }
                self.service
                    .handle_topic_status_changed(topic_id, status, enabled)?;
            }
            ForumEvent::TopicTagCreated { topic_id, tag_name } => {
                if self.forum.attach_tag(topic_id, &tag_name)?.is_none() {
                    anyhow::bail!("topic {} not found", topic_id);
                }
                let outcome = self.service.handle_topic_tag_created(topic_id, &tag_name)?;
                debug!(topic_id, tag = %tag_name, ?outcome, "Tag attached");
            }
            ForumEvent::Sweep { kind } => {
                let report = match kind {
                    SweepKind::CloseOut => self.sweeper.run_close_out_sweep(),
                    SweepKind::AskUser => self.sweeper.run_ask_user_sweep(),
                };
                debug!(summary = %report.summary(), "Requested sweep finished");
            }
        }
        Ok(())
    }
}

/// Counters for one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub applied: u64,
    pub rejected: u64,
}

/// Read JSON-line events until EOF or cancellation.
///
/// Blank lines are skipped. Lines that fail to parse or apply are logged and
/// counted; they never stop the stream.
pub async fn run<R>(reader: R, worker: Arc<Worker>, cancel: CancellationToken) -> IngestStats
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = IngestStats::default();
    let mut line_no: u64 = 0;

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Event stream read failed");
                break;
            }
        };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let event: ForumEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = line_no, error = %e, "Malformed event");
                stats.rejected += 1;
                continue;
            }
        };
        let name = event.name();
        let w = Arc::clone(&worker);
        match tokio::task::spawn_blocking(move || w.apply(event)).await {
            Ok(Ok(())) => stats.applied += 1,
            Ok(Err(e)) => {
                warn!(line = line_no, event = name, error = %e, "Event rejected");
                stats.rejected += 1;
            }
            Err(e) => {
                warn!(line = line_no, event = name, error = %e, "Event handler panicked");
                stats.rejected += 1;
            }
        }
    }

    info!(
        applied = stats.applied,
        rejected = stats.rejected,
        "Event stream closed"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolution::{RecordingNotifier, SupportConfig, SupportContext, TagName};

    fn worker() -> (Arc<Worker>, Arc<RecordingNotifier>) {
        let forum = Arc::new(MemoryForum::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = SupportContext::new(
            forum.clone(),
            forum.clone(),
            notifier.clone(),
            SupportConfig::default(),
        )
        .unwrap();
        (Arc::new(Worker::new(forum, ctx.shared())), notifier)
    }

    fn has_tag(worker: &Worker, topic_id: TopicId, tag: TagName) -> bool {
        let topic = worker.forum().topic(topic_id).unwrap().unwrap();
        worker.service.context().handles.has(&topic.tags, tag)
    }

    const SCRIPT: &str = r#"
{"type":"user_upserted","user":{"id":1,"username":"system"}}
{"type":"user_upserted","user":{"id":10,"username":"op"}}
{"type":"user_upserted","user":{"id":20,"username":"peer","primary_group_id":42}}
{"type":"topic_created","topic_id":7,"user_id":10,"title":"Struggling","category_id":67}
{"type":"post_created","topic_id":7,"user_id":10,"raw":"I am struggling"}
{"type":"post_created","topic_id":7,"user_id":20,"raw":"You are not alone"}
"#;

    #[test]
    fn test_event_wire_format() {
        let event: ForumEvent = serde_json::from_str(
            r#"{"type":"topic_status_changed","topic_id":3,"status":"closed","enabled":true}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ForumEvent::TopicStatusChanged {
                topic_id: 3,
                status: TopicStatus::Closed,
                enabled: true,
            }
        );
        assert_eq!(event.name(), "topic_status_changed");
    }

    #[tokio::test]
    async fn test_script_resolves_topic() {
        let (worker, notifier) = worker();
        let stats = run(SCRIPT.as_bytes(), Arc::clone(&worker), CancellationToken::new()).await;
        assert_eq!(stats, IngestStats { applied: 6, rejected: 0 });

        let topic = worker.forum().topic(7).unwrap().unwrap();
        assert_eq!(topic.posts_count, 2);
        assert_eq!(topic.fields.supported, Some(true));
        assert_eq!(notifier.supplier().len(), 2);
    }

    #[tokio::test]
    async fn test_bad_lines_are_counted_not_fatal() {
        let (worker, _) = worker();
        let input = "not json\n{\"type\":\"post_created\",\"topic_id\":99,\"user_id\":1,\"raw\":\"x\"}\n\n{\"type\":\"user_upserted\",\"user\":{\"id\":1,\"username\":\"system\"}}\n";
        let stats = run(input.as_bytes(), worker, CancellationToken::new()).await;
        assert_eq!(stats, IngestStats { applied: 1, rejected: 2 });
    }

    #[test]
    fn test_status_and_tag_events_update_mirror() {
        let (worker, _) = worker();
        for line in SCRIPT.lines().filter(|l| !l.trim().is_empty()).take(5) {
            worker.apply(serde_json::from_str(line).unwrap()).unwrap();
        }
        assert!(has_tag(&worker, 7, TagName::NeedsSupport));

        worker
            .apply(ForumEvent::TopicStatusChanged {
                topic_id: 7,
                status: TopicStatus::Closed,
                enabled: true,
            })
            .unwrap();
        let topic = worker.forum().topic(7).unwrap().unwrap();
        assert!(topic.closed);
        assert!(!has_tag(&worker, 7, TagName::NeedsSupport));

        worker
            .apply(ForumEvent::TopicTagCreated {
                topic_id: 7,
                tag_name: "Grief".into(),
            })
            .unwrap();
        assert!(worker
            .apply(ForumEvent::TopicTagCreated {
                topic_id: 404,
                tag_name: "Grief".into(),
            })
            .is_err());
    }

    #[test]
    fn test_duplicate_topic_rejected() {
        let (worker, _) = worker();
        let created = || ForumEvent::TopicCreated {
            topic_id: 5,
            user_id: 10,
            title: "t".into(),
            category_id: None,
            created_at: None,
        };
        worker.apply(created()).unwrap();
        assert!(worker.apply(created()).is_err());
    }
}
