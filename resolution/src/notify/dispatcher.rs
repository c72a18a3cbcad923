//! Asynchronous webhook delivery
//!
//! ```text
//! core ──notify()──▶ unbounded mpsc ──▶ delivery task ──▶ WebhookSink
//!                                          │  attempt 1 .. max_attempts
//!                                          │  backoff: b, 2b, 4b, ...
//!                                          └─ give up: warn! and drop
//! ```
//!
//! Events are delivered one at a time in queue order. The queue lives in memory;
//! events still queued when the process dies are lost.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::payload::{Encoding, WebhookEvent};
use super::Notifier;
use crate::config::WebhookConfig;
use crate::error::NotifyError;

/// Something that can put one event on the wire
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn deliver(&self, endpoint: &str, event: &WebhookEvent) -> Result<(), NotifyError>;
}

/// HTTP POST delivery with a per-attempt timeout
pub struct HttpSink {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpSink {
    pub fn new(timeout_secs: u64) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

#[async_trait]
impl WebhookSink for HttpSink {
    async fn deliver(&self, endpoint: &str, event: &WebhookEvent) -> Result<(), NotifyError> {
        let request = self.client.post(endpoint);
        let body = event.body();
        let request = match event.encoding() {
            Encoding::Form => request.form(&body),
            Encoding::Json => request.json(&body),
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                NotifyError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout_secs: self.timeout_secs,
                }
            } else {
                NotifyError::Transport(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Delivery outcome counters, returned on shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u32,
    pub failed: u32,
    /// No endpoint configured for the event kind
    pub skipped: u32,
}

struct Envelope {
    delivery_id: Uuid,
    event: WebhookEvent,
}

/// [`Notifier`] that hands events to a background delivery task
pub struct WebhookDispatcher {
    sender: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    worker: Mutex<Option<JoinHandle<DispatchStats>>>,
}

impl WebhookDispatcher {
    /// Start the delivery task on the current tokio runtime.
    pub fn spawn(config: WebhookConfig, sink: Arc<dyn WebhookSink>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_deliveries(receiver, config, sink));
        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Start a dispatcher delivering over HTTP.
    pub fn http(config: WebhookConfig) -> Result<Self, NotifyError> {
        let sink = HttpSink::new(config.timeout_secs)?;
        Ok(Self::spawn(config, Arc::new(sink)))
    }

    /// Close the queue and wait until every queued event was delivered or given up on.
    pub async fn shutdown(&self) -> DispatchStats {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        match worker {
            Some(handle) => match handle.await {
                Ok(stats) => stats,
                Err(e) => {
                    warn!(error = %e, "Webhook delivery task failed");
                    DispatchStats::default()
                }
            },
            None => DispatchStats::default(),
        }
    }
}

impl Notifier for WebhookDispatcher {
    fn notify(&self, event: WebhookEvent) {
        let envelope = Envelope {
            delivery_id: Uuid::new_v4(),
            event,
        };
        let sent = match self.sender.lock() {
            Ok(sender) => match sender.as_ref() {
                Some(tx) => tx.send(envelope).map_err(|e| e.0),
                None => Err(envelope),
            },
            Err(_) => Err(envelope),
        };
        if let Err(envelope) = sent {
            warn!(
                kind = envelope.event.kind(),
                topic_id = envelope.event.topic_id(),
                error = %NotifyError::QueueClosed,
                "Dropping webhook"
            );
        }
    }
}

async fn run_deliveries(
    mut receiver: mpsc::UnboundedReceiver<Envelope>,
    config: WebhookConfig,
    sink: Arc<dyn WebhookSink>,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    while let Some(envelope) = receiver.recv().await {
        let Some(endpoint) = envelope.event.endpoint(&config) else {
            debug!(
                kind = envelope.event.kind(),
                topic_id = envelope.event.topic_id(),
                "No endpoint configured, skipping webhook"
            );
            stats.skipped += 1;
            continue;
        };

        match deliver_with_retry(sink.as_ref(), endpoint, &envelope, &config).await {
            Ok(attempts) => {
                debug!(
                    delivery_id = %envelope.delivery_id,
                    kind = envelope.event.kind(),
                    topic_id = envelope.event.topic_id(),
                    attempts,
                    "Webhook delivered"
                );
                stats.delivered += 1;
            }
            Err(e) => {
                warn!(
                    delivery_id = %envelope.delivery_id,
                    kind = envelope.event.kind(),
                    topic_id = envelope.event.topic_id(),
                    endpoint,
                    error = %e,
                    "Webhook delivery gave up"
                );
                stats.failed += 1;
            }
        }
    }
    info!(
        delivered = stats.delivered,
        failed = stats.failed,
        skipped = stats.skipped,
        "Webhook queue drained"
    );
    stats
}

async fn deliver_with_retry(
    sink: &dyn WebhookSink,
    endpoint: &str,
    envelope: &Envelope,
    config: &WebhookConfig,
) -> Result<u32, NotifyError> {
    let max_attempts = config.max_attempts.max(1);
    let mut backoff = Duration::from_millis(config.initial_backoff_ms);
    let mut attempt = 1;
    loop {
        match sink.deliver(endpoint, &envelope.event).await {
            Ok(()) => return Ok(attempt),
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(e) => {
                warn!(
                    delivery_id = %envelope.delivery_id,
                    attempt,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Webhook delivery failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::payload::SupplierPayload;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then records every delivery.
    struct FlakySink {
        failures: u32,
        calls: AtomicU32,
        delivered: Mutex<Vec<(String, WebhookEvent)>>,
    }

    impl FlakySink {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
                delivered: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl WebhookSink for FlakySink {
        async fn deliver(&self, endpoint: &str, event: &WebhookEvent) -> Result<(), NotifyError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(NotifyError::Status {
                    endpoint: endpoint.to_string(),
                    status: 503,
                });
            }
            self.delivered
                .lock()
                .unwrap()
                .push((endpoint.to_string(), event.clone()));
            Ok(())
        }
    }

    fn supplier(topic_id: u64) -> WebhookEvent {
        WebhookEvent::Supplier(SupplierPayload {
            topic_id,
            supported: false,
            username: "op".into(),
            category_id: Some(67),
            closed: false,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_delivered() {
        let sink = FlakySink::new(2);
        let dispatcher = WebhookDispatcher::spawn(WebhookConfig::default(), sink.clone());

        dispatcher.notify(supplier(1));
        let stats = dispatcher.shutdown().await;

        assert_eq!(stats.delivered, 1);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let sink = FlakySink::new(u32::MAX);
        let dispatcher = WebhookDispatcher::spawn(WebhookConfig::default(), sink.clone());

        dispatcher.notify(supplier(1));
        dispatcher.notify(supplier(2));
        let stats = dispatcher.shutdown().await;

        assert_eq!(stats.failed, 2);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_unset_endpoint_is_skipped_and_order_kept() {
        let sink = FlakySink::new(0);
        let dispatcher = WebhookDispatcher::spawn(WebhookConfig::default(), sink.clone());

        dispatcher.notify(supplier(1));
        dispatcher.notify(WebhookEvent::TopicTag(
            crate::notify::payload::TopicTagPayload::created(1, 4, "Supported"),
        ));
        dispatcher.notify(supplier(2));
        let stats = dispatcher.shutdown().await;

        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.skipped, 1);
        let topics: Vec<u64> = sink
            .delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, e)| e.topic_id())
            .collect();
        assert_eq!(topics, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_notify_after_shutdown_is_dropped() {
        let sink = FlakySink::new(0);
        let dispatcher = WebhookDispatcher::spawn(WebhookConfig::default(), sink.clone());
        dispatcher.shutdown().await;

        dispatcher.notify(supplier(1));
        assert_eq!(dispatcher.shutdown().await, DispatchStats::default());
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }
}
