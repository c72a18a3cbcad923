//! Scheduled sweeps
//!
//! Re-apply the support policy to topics no live event revisited.
//!
//! - close-out (daily): regular, open, unsupported topics created on the day
//!   `close_out_age_days` ago end up `Supported` or `Insufficient`.
//! - ask-user (6-hourly): topics between `ask_min_age_hours` and
//!   `ask_max_age_days` old with enough non-author words get a follow-up; a
//!   second pass asks on every `Video-Reply` topic not yet asked.
//!
//! Each topic is its own unit of work. A failure is recorded in the
//! [`SweepReport`] and the sweep moves on. Both sweeps are idempotent.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::SharedContext;
use crate::effects::{apply_effects, TopicEffect};
use crate::error::{SupportError, SupportResult};
use crate::followup::{AskTrigger, FollowUpConversation};
use crate::forum::TopicQuery;
use crate::ladder::ResolutionTag;
use crate::model::{ReplyStats, Topic, TopicFlag, TopicId};
use crate::notify::{SupplierPayload, WebhookEvent};
use crate::tags::TagName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepKind {
    CloseOut,
    AskUser,
}

impl std::fmt::Display for SweepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CloseOut => write!(f, "close_out"),
            Self::AskUser => write!(f, "ask_user"),
        }
    }
}

/// What happened to one swept topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TopicResult {
    Supported,
    Insufficient,
    Asked,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub topic_id: TopicId,
    pub error: String,
}

/// Outcome of one sweep run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub kind: SweepKind,
    pub examined: u32,
    pub supported: u32,
    pub insufficient: u32,
    pub asked: u32,
    pub unchanged: u32,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    fn new(kind: SweepKind) -> Self {
        Self {
            kind,
            examined: 0,
            supported: 0,
            insufficient: 0,
            asked: 0,
            unchanged: 0,
            failures: Vec::new(),
        }
    }

    fn record(&mut self, topic_id: TopicId, result: SupportResult<TopicResult>) {
        self.examined += 1;
        match result {
            Ok(TopicResult::Supported) => self.supported += 1,
            Ok(TopicResult::Insufficient) => self.insufficient += 1,
            Ok(TopicResult::Asked) => self.asked += 1,
            Ok(TopicResult::Unchanged) => self.unchanged += 1,
            Err(e) => {
                warn!(sweep = %self.kind, topic_id, error = %e, "Swept topic failed");
                self.failures.push(SweepFailure {
                    topic_id,
                    error: e.to_string(),
                });
            }
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: examined={} supported={} insufficient={} asked={} unchanged={} failed={}",
            self.kind,
            self.examined,
            self.supported,
            self.insufficient,
            self.asked,
            self.unchanged,
            self.failures.len()
        )
    }
}

pub struct ScheduledSweeper {
    ctx: SharedContext,
}

impl ScheduledSweeper {
    pub fn new(ctx: SharedContext) -> Self {
        Self { ctx }
    }

    pub fn run_close_out_sweep(&self) -> SweepReport {
        self.logged(SweepKind::CloseOut, self.run_close_out_sweep_at(Utc::now()))
    }

    pub fn run_ask_user_sweep(&self) -> SweepReport {
        self.logged(SweepKind::AskUser, self.run_ask_user_sweep_at(Utc::now()))
    }

    fn logged(&self, kind: SweepKind, result: SupportResult<SweepReport>) -> SweepReport {
        match result {
            Ok(report) => {
                info!(summary = %report.summary(), "Sweep finished");
                report
            }
            Err(e) => {
                warn!(sweep = %kind, error = %e, "Sweep could not select topics");
                SweepReport::new(kind)
            }
        }
    }

    // =========================================================================
    // Close-out
    // =========================================================================

    /// Close out topics created on the calendar day `close_out_age_days` before `now`.
    pub fn run_close_out_sweep_at(&self, now: DateTime<Utc>) -> SupportResult<SweepReport> {
        let day = (now - Duration::days(self.ctx.config.sweeps.close_out_age_days)).date_naive();
        let start = Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN));
        let query = TopicQuery::regular()
            .open()
            .created_in(start, start + Duration::days(1))
            .without(self.ctx.handles.id(TagName::Supported));

        let mut report = SweepReport::new(SweepKind::CloseOut);
        for topic in self.ctx.store.topics(&query)? {
            let result = self
                .ctx
                .locks
                .with_topic(topic.id, || self.close_out_topic(topic.id))
                .map_err(SupportError::from)
                .and_then(|r| r);
            report.record(topic.id, result);
        }
        Ok(report)
    }

    fn close_out_topic(&self, topic_id: TopicId) -> SupportResult<TopicResult> {
        let handles = &self.ctx.handles;
        let Some(mut topic) = self.ctx.store.topic(topic_id)? else {
            debug!(topic_id, "Topic vanished before close-out");
            return Ok(TopicResult::Unchanged);
        };
        if handles.has(&topic.tags, TagName::Supported) {
            return Ok(TopicResult::Unchanged);
        }

        let mut effects = vec![
            TopicEffect::RemoveTag(TagName::NeedsSupport),
            TopicEffect::RemoveTag(TagName::AskedUser),
        ];
        let stats = ReplyStats::collect(&topic, &self.ctx.store.posts(topic.id)?);
        let result = if stats.word_count >= self.ctx.config.support_limit
            || handles.has(&topic.tags, TagName::VideoReply)
        {
            effects.extend([
                TopicEffect::Resolve(ResolutionTag::SufficientWords),
                TopicEffect::AddTag(TagName::Supported),
                TopicEffect::SetFlag(TopicFlag::Supported, true),
            ]);
            TopicResult::Supported
        } else if self.ctx.config.is_support_category(topic.category_id)
            && topic.visible
            && !topic.closed
        {
            effects.push(TopicEffect::Resolve(ResolutionTag::Insufficient));
            TopicResult::Insufficient
        } else {
            TopicResult::Unchanged
        };

        apply_effects(&mut topic, handles, &effects);
        self.ctx.commit(&mut topic)?;
        debug!(topic_id, words = stats.word_count, ?result, "Closed out topic");

        self.push_to_supplier(&topic)?;
        Ok(result)
    }

    fn push_to_supplier(&self, topic: &Topic) -> SupportResult<()> {
        let Some(author) = self.ctx.store.user(topic.user_id)? else {
            debug!(topic_id = topic.id, "Topic author not found, skipping supplier hook");
            return Ok(());
        };
        self.ctx.notifier.notify(WebhookEvent::Supplier(SupplierPayload {
            topic_id: topic.id,
            supported: self.ctx.handles.has(&topic.tags, TagName::Supported),
            username: author.username,
            category_id: topic.category_id,
            closed: topic.closed,
        }));
        Ok(())
    }

    // =========================================================================
    // Ask-user
    // =========================================================================

    /// Ask authors of aged, well-answered topics and of video-reply topics.
    pub fn run_ask_user_sweep_at(&self, now: DateTime<Utc>) -> SupportResult<SweepReport> {
        let sweeps = &self.ctx.config.sweeps;
        let handles = &self.ctx.handles;
        let ask_categories = &self.ctx.config.ask_categories;
        let mut report = SweepReport::new(SweepKind::AskUser);

        let by_words = TopicQuery::regular()
            .created_in(
                now - Duration::days(sweeps.ask_max_age_days),
                now - Duration::hours(sweeps.ask_min_age_hours),
            )
            .in_categories(ask_categories)
            .with_more_posts_than(1)
            .without(handles.id(TagName::Supported))
            .without(handles.id(TagName::AskedUser))
            .never_asked();
        for topic in self.ctx.store.topics(&by_words)? {
            let result = self
                .ctx
                .locks
                .with_topic(topic.id, || self.ask_topic(topic.id, AskTrigger::WordCount))
                .map_err(SupportError::from)
                .and_then(|r| r);
            report.record(topic.id, result);
        }

        let by_video = TopicQuery::regular()
            .in_categories(ask_categories)
            .with(handles.id(TagName::VideoReply))
            .never_asked();
        for topic in self.ctx.store.topics(&by_video)? {
            let result = self
                .ctx
                .locks
                .with_topic(topic.id, || self.ask_topic(topic.id, AskTrigger::VideoReply))
                .map_err(SupportError::from)
                .and_then(|r| r);
            report.record(topic.id, result);
        }

        Ok(report)
    }

    fn ask_topic(&self, topic_id: TopicId, trigger: AskTrigger) -> SupportResult<TopicResult> {
        let Some(mut topic) = self.ctx.store.topic(topic_id)? else {
            return Ok(TopicResult::Unchanged);
        };
        if topic.fields.asked_user.is_some() {
            return Ok(TopicResult::Unchanged);
        }
        if trigger == AskTrigger::WordCount {
            let stats = ReplyStats::collect(&topic, &self.ctx.store.posts(topic.id)?);
            if stats.word_count < self.ctx.config.ask_user_limit {
                return Ok(TopicResult::Unchanged);
            }
        }

        let asked = FollowUpConversation::new(&self.ctx).ask_user(&mut topic, trigger)?;
        Ok(if asked.is_some() {
            TopicResult::Asked
        } else {
            TopicResult::Unchanged
        })
    }
}
