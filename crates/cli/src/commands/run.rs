//! `agora run`: Start a worker agent.
//!
//! The worker claims new tasks that mention one of its capabilities (or
//! every task with `--auto-claim`), completes the ones it wins with a short
//! summary, and logs what other agents say and publish.

use std::path::Path;
use std::sync::Arc;

use agora_agent::{AgentContext, AgentHooks, AgentRuntime, TaskDecision};
use agora_core::model::{Agent, Innovation, Message, Task};
use agora_transport::StreamEnd;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub async fn run(
    config_path: Option<&Path>,
    name: Option<String>,
    capabilities: Vec<String>,
    auto_claim: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;
    if let Some(name) = name {
        config.agent.name = name;
    }
    if !capabilities.is_empty() {
        config.agent.capabilities = capabilities;
    }
    config
        .validate()
        .map_err(|e| format!("Invalid configuration: {e}"))?;

    println!("Agora worker — {}", config.agent.name);
    println!("   Platform:     {}", config.platform.url);
    println!("   Capabilities: {}", config.agent.capabilities.join(", "));
    println!("   Claim via:    {:?}", config.agent.claim_via);
    println!("   Auto-claim:   {auto_claim}");
    println!("\nPress Ctrl+C to stop.\n");

    let hooks = Arc::new(WorkerHooks { auto_claim });
    let runtime = AgentRuntime::from_config(&config, hooks)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                cancel.cancel();
            }
        });
    }

    let report = runtime.run(cancel).await?;

    println!("\nWorker stopped ({})", describe_end(&report.end));
    println!("   Claims sent:     {}", report.stats.claims_sent);
    println!("   Tasks won:       {}", report.stats.tasks_won);
    println!("   Tasks lost:      {}", report.stats.tasks_lost);
    println!("   Tasks completed: {}", report.stats.tasks_completed);
    println!("   Events handled:  {}", report.stats.events_dispatched);
    if report.stats.handler_failures > 0 {
        println!("   Handler errors:  {}", report.stats.handler_failures);
    }

    Ok(())
}

fn describe_end(end: &StreamEnd) -> String {
    match end {
        StreamEnd::Cancelled => "interrupted".into(),
        StreamEnd::Closed(reason) => reason.to_string(),
    }
}

/// Claims matching tasks and completes whatever it wins.
struct WorkerHooks {
    auto_claim: bool,
}

impl WorkerHooks {
    fn wants(&self, ctx: &AgentContext, task: &Task) -> bool {
        if self.auto_claim {
            return true;
        }
        let text = format!("{} {}", task.title, task.description);
        ctx.profile().matches_text(&text)
    }
}

/// The result reported for a finished task.
fn summarize(agent_name: &str, task: &Task) -> String {
    let detail = task.description.trim();
    if detail.is_empty() {
        format!("{agent_name} completed \"{}\"", task.title)
    } else {
        format!("{agent_name} completed \"{}\": {detail}", task.title)
    }
}

#[async_trait]
impl AgentHooks for WorkerHooks {
    async fn on_start(&self, ctx: &AgentContext) -> anyhow::Result<()> {
        let pending = ctx.pending_tasks().await?;
        info!(pending = pending.len(), "Worker ready");
        Ok(())
    }

    async fn on_stop(&self, ctx: &AgentContext) -> anyhow::Result<()> {
        let stats = ctx.stats();
        info!(
            won = stats.tasks_won,
            completed = stats.tasks_completed,
            "Worker stopping"
        );
        Ok(())
    }

    async fn on_joined(&self, _ctx: &AgentContext, agent: Option<&Agent>) -> anyhow::Result<()> {
        if let Some(agent) = agent {
            info!(agent_id = agent.id, "Joined as {}", agent.name);
        }
        Ok(())
    }

    async fn on_task_created(&self, ctx: &AgentContext, task: &Task) -> anyhow::Result<TaskDecision> {
        if self.wants(ctx, task) {
            info!(task_id = task.id, title = %task.title, "Claiming task");
            Ok(TaskDecision::Claim)
        } else {
            debug!(task_id = task.id, "Task does not match capabilities");
            Ok(TaskDecision::Ignore)
        }
    }

    async fn on_task_assigned(&self, ctx: &AgentContext, task: &Task) -> anyhow::Result<()> {
        info!(task_id = task.id, title = %task.title, "Won task");
        let result = summarize(&ctx.profile().name, task);
        ctx.complete_task(task.id, Some(&result)).await?;
        Ok(())
    }

    async fn on_task_assigned_elsewhere(&self, _ctx: &AgentContext, task: &Task) -> anyhow::Result<()> {
        debug!(task_id = task.id, assignee = ?task.assigned_agent_id, "Task went to another agent");
        Ok(())
    }

    async fn on_message_received(&self, _ctx: &AgentContext, message: &Message) -> anyhow::Result<()> {
        info!(
            discussion_id = message.discussion_id,
            from = %message.agent_name,
            "{}",
            message.content
        );
        Ok(())
    }

    async fn on_innovation_created(
        &self,
        _ctx: &AgentContext,
        innovation: &Innovation,
    ) -> anyhow::Result<()> {
        info!(
            innovation_id = innovation.id,
            category = innovation.category.as_deref().unwrap_or("-"),
            "New innovation: {}",
            innovation.title
        );
        Ok(())
    }

    async fn on_platform_error(&self, _ctx: &AgentContext, message: &str) -> anyhow::Result<()> {
        warn!("Platform: {message}");
        Ok(())
    }
}
