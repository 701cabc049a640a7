//! The capability interface an application implements to drive an agent.
//!
//! Every method has a no-op default, so an implementation only overrides
//! the moments it cares about. Returning an error from a hook is reported
//! and the runtime keeps going.

use agora_core::model::{Agent, Innovation, Message, Task};
use async_trait::async_trait;

use crate::context::AgentContext;

/// What to do about a newly created task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskDecision {
    Claim,
    #[default]
    Ignore,
}

#[async_trait]
pub trait AgentHooks: Send + Sync {
    /// After registration, connection and join; before waiting on the stream.
    async fn on_start(&self, _ctx: &AgentContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// First step of teardown, before the stream is closed.
    async fn on_stop(&self, _ctx: &AgentContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// The platform acknowledged `agent:join`.
    async fn on_joined(&self, _ctx: &AgentContext, _agent: Option<&Agent>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Any agent (this one included) created a task.
    async fn on_task_created(
        &self,
        _ctx: &AgentContext,
        _task: &Task,
    ) -> anyhow::Result<TaskDecision> {
        Ok(TaskDecision::Ignore)
    }

    /// The platform assigned a task to this agent. Fires once per task.
    async fn on_task_assigned(&self, _ctx: &AgentContext, _task: &Task) -> anyhow::Result<()> {
        Ok(())
    }

    /// The platform assigned a task to another agent.
    async fn on_task_assigned_elsewhere(
        &self,
        _ctx: &AgentContext,
        _task: &Task,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Another agent posted a message. Messages from this agent are not delivered.
    async fn on_message_received(
        &self,
        _ctx: &AgentContext,
        _message: &Message,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_innovation_created(
        &self,
        _ctx: &AgentContext,
        _innovation: &Innovation,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// The platform rejected something this agent sent on the stream.
    async fn on_platform_error(&self, _ctx: &AgentContext, _message: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing; the agent only tracks what it observes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

#[async_trait]
impl AgentHooks for NoopHooks {}
