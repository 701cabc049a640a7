//! Topic demultiplexing for inbound stream events.
//!
//! Events are dispatched strictly one at a time in arrival order: the next
//! handler never starts before the previous one returns. A failing or
//! panicking handler is reported and dispatch moves on to the next event.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

/// One event received on the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub topic: String,
    pub payload: Value,
}

impl InboundEvent {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

/// Handles every event published on one topic.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, payload: Value) -> anyhow::Result<()>;
}

/// Adapts an async closure into an [`EventHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn handle(&self, payload: Value) -> anyhow::Result<()> {
        (self.0)(payload).await
    }
}

/// Called with the topic and error whenever a handler fails.
pub type FailureReporter = Arc<dyn Fn(&str, &anyhow::Error) + Send + Sync>;

pub struct EventDispatcher {
    handlers: RwLock<HashMap<String, Arc<dyn EventHandler>>>,
    reporter: RwLock<Option<FailureReporter>>,
    dispatched: AtomicU64,
    failures: AtomicU64,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            reporter: RwLock::new(None),
            dispatched: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Install the handler for `topic`, replacing any previous one.
    pub fn subscribe(&self, topic: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let topic = topic.into();
        if self.handlers.write().insert(topic.clone(), handler).is_some() {
            debug!(topic = %topic, "Replaced topic handler");
        } else {
            debug!(topic = %topic, "Subscribed topic handler");
        }
    }

    /// Topics with an installed handler, in no particular order.
    pub fn topics(&self) -> Vec<String> {
        self.handlers.read().keys().cloned().collect()
    }

    pub fn set_failure_reporter(&self, reporter: FailureReporter) {
        *self.reporter.write() = Some(reporter);
    }

    /// Events that reached a handler.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Handler invocations that failed or panicked.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Deliver one event and wait for its handler to finish.
    pub async fn dispatch(&self, event: InboundEvent) {
        let handler = self.handlers.read().get(&event.topic).cloned();
        let Some(handler) = handler else {
            trace!(topic = %event.topic, "No handler for topic, dropping event");
            return;
        };

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        let outcome = AssertUnwindSafe(handler.handle(event.payload))
            .catch_unwind()
            .await;

        let err = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                anyhow::anyhow!("handler panicked: {msg}")
            }
        };

        self.failures.fetch_add(1, Ordering::Relaxed);
        error!(topic = %event.topic, error = %err, "Event handler failed");
        let reporter = self.reporter.read().clone();
        if let Some(report) = reporter {
            report(&event.topic, &err);
        }
    }

    /// Drain `events` until every sender is dropped.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<InboundEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event).await;
        }
        debug!("Dispatch loop finished");
    }
}
