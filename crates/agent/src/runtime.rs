//! The agent run loop.
//!
//! `register -> install handlers -> connect -> join -> on_start -> wait`,
//! then `on_stop -> disconnect` once the stream closes or the cancellation
//! token fires. Handlers go in before the stream opens so nothing delivered
//! right after the handshake is missed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use agora_config::{AppConfig, ReconnectConfig};
use agora_core::model::{Innovation, Message, Task};
use agora_core::topic::{self, JoinedPayload, PlatformErrorPayload};
use agora_core::{AgentStats, RuntimeEvent};
use agora_transport::{
    BackoffPolicy, EventHandler, FnHandler, PlatformClient, StreamClient, StreamEnd,
    connect_with_backoff,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::AgentContext;
use crate::hooks::AgentHooks;

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub end: StreamEnd,
    pub stats: AgentStats,
}

pub struct AgentRuntime {
    ctx: Arc<AgentContext>,
    backoff: BackoffPolicy,
    reconcile_every: Option<Duration>,
}

impl AgentRuntime {
    pub fn new(ctx: AgentContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            backoff: BackoffPolicy::default(),
            reconcile_every: None,
        }
    }

    /// Build a runtime from loaded configuration.
    pub fn from_config(
        config: &AppConfig,
        hooks: Arc<dyn AgentHooks>,
    ) -> agora_core::Result<Self> {
        let client = PlatformClient::new(&config.platform.url, config.platform.request_timeout())?;
        let stream = StreamClient::new(&config.platform.url, config.platform.connect_timeout());
        let ctx = AgentContext::new(config.agent.profile(), client, stream, hooks)
            .with_claim_channel(config.agent.claim_via);

        Ok(Self::new(ctx)
            .with_backoff(backoff_policy(&config.reconnect))
            .with_reconcile_interval(config.reconcile.interval()))
    }

    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = policy;
        self
    }

    /// Run the corrective poll this often while connected.
    pub fn with_reconcile_interval(mut self, every: Option<Duration>) -> Self {
        self.reconcile_every = every;
        self
    }

    pub fn context(&self) -> &Arc<AgentContext> {
        &self.ctx
    }

    /// Run one full lifecycle. Returns when the stream closes or `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> agora_core::Result<RunReport> {
        let ctx = &self.ctx;
        ctx.register().await?;
        self.install_handlers();

        if let Err(e) = connect_with_backoff(ctx.stream(), &self.backoff, &cancel).await {
            if cancel.is_cancelled() {
                info!("Cancelled before the stream opened");
                ctx.events().publish(RuntimeEvent::Stopped { timestamp: Utc::now() });
                return Ok(self.report(StreamEnd::Cancelled));
            }
            return Err(e.into());
        }
        ctx.events().publish(RuntimeEvent::Connected { timestamp: Utc::now() });

        ctx.stream().emit_typed(&ctx.profile().join_payload())?;
        debug!(name = %ctx.profile().name, "Sent join");

        if let Err(e) = ctx.hooks().on_start(ctx).await {
            self.report_hook_failure("on_start", &e);
        }

        let poller = self.spawn_reconcile(cancel.child_token());
        let end = ctx.stream().run_until_closed(&cancel).await;
        if let Some((stop, handle)) = poller {
            stop.cancel();
            let _ = handle.await;
        }

        // Teardown runs whatever ended the wait.
        if let Err(e) = ctx.hooks().on_stop(ctx).await {
            self.report_hook_failure("on_stop", &e);
        }
        ctx.stream().close().await;

        let end = end?;
        match &end {
            StreamEnd::Closed(reason) => {
                warn!(reason = %reason, "Stream closed");
                ctx.events().publish(RuntimeEvent::stream_closed(reason));
            }
            StreamEnd::Cancelled => info!("Agent stopping"),
        }
        ctx.events().publish(RuntimeEvent::Stopped { timestamp: Utc::now() });
        Ok(self.report(end))
    }

    fn report(&self, end: StreamEnd) -> RunReport {
        RunReport {
            end,
            stats: self.ctx.stats(),
        }
    }

    fn report_hook_failure(&self, hook: &str, err: &anyhow::Error) {
        error!(hook, error = %err, "Lifecycle hook failed");
        self.ctx
            .events()
            .publish(RuntimeEvent::handler_failed(hook, err));
    }

    fn install_handlers(&self) {
        let stream = self.ctx.stream();

        let events = self.ctx.events().clone();
        stream.on_handler_error(Arc::new(move |topic: &str, err: &anyhow::Error| {
            events.publish(RuntimeEvent::handler_failed(topic, err));
        }));

        stream.subscribe(
            topic::AGENT_JOINED,
            route(&self.ctx, |ctx, payload: JoinedPayload| async move {
                ctx.handle_joined(payload).await
            }),
        );
        stream.subscribe(
            topic::TASK_CREATED,
            route(&self.ctx, |ctx, task: Task| async move { ctx.handle_created(task).await }),
        );
        stream.subscribe(
            topic::TASK_ASSIGNED,
            route(&self.ctx, |ctx, task: Task| async move { ctx.handle_assigned(task).await }),
        );
        stream.subscribe(
            topic::MESSAGE_NEW,
            route(&self.ctx, |ctx, message: Message| async move {
                ctx.handle_message(message).await
            }),
        );
        stream.subscribe(
            topic::INNOVATION_CREATED,
            route(&self.ctx, |ctx, innovation: Innovation| async move {
                ctx.handle_innovation(innovation).await
            }),
        );
        stream.subscribe(
            topic::PLATFORM_ERROR,
            route(&self.ctx, |ctx, payload: PlatformErrorPayload| async move {
                ctx.handle_platform_error(payload).await
            }),
        );
        debug!(topics = ?stream.dispatcher().topics(), "Topic handlers installed");
    }

    fn spawn_reconcile(
        &self,
        stop: CancellationToken,
    ) -> Option<(CancellationToken, JoinHandle<()>)> {
        let every = self.reconcile_every?;
        let ctx = Arc::downgrade(&self.ctx);
        let token = stop.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately; nothing to settle yet.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(ctx) = ctx.upgrade() else { break };
                        if let Err(e) = ctx.reconcile().await {
                            warn!(error = %e, "Reconcile failed");
                        }
                    }
                }
            }
            debug!("Reconcile loop stopped");
        });
        Some((stop, handle))
    }
}

/// Turn a typed context handler into a topic handler.
///
/// The handler holds the context weakly: the context owns the stream,
/// which owns the dispatcher, which owns this handler.
fn route<T, F, Fut>(ctx: &Arc<AgentContext>, handle: F) -> Arc<dyn EventHandler>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(Arc<AgentContext>, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let ctx = Arc::downgrade(ctx);
    Arc::new(FnHandler(move |payload: Value| {
        let call = ctx.upgrade().map(|ctx| {
            serde_json::from_value::<T>(payload)
                .map(|parsed| handle(ctx, parsed))
                .map_err(|e| anyhow::anyhow!("malformed payload: {e}"))
        });
        async move {
            match call {
                Some(Ok(fut)) => fut.await,
                Some(Err(e)) => Err(e),
                None => Ok(()),
            }
        }
    }))
}

/// Backoff settings from the `[reconnect]` section.
pub fn backoff_policy(config: &ReconnectConfig) -> BackoffPolicy {
    BackoffPolicy {
        initial_delay: Duration::from_millis(config.initial_delay_ms),
        max_delay: Duration::from_millis(config.max_delay_ms),
        multiplier: config.multiplier,
        max_attempts: config.max_attempts,
    }
}
