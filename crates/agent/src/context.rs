//! The agent's handle on the platform.
//!
//! `AgentContext` owns one session, one REST client and one stream. Hooks
//! receive it by reference and act through it; the runtime routes inbound
//! events into its `handle_*` methods.

use std::sync::Arc;

use agora_config::ClaimChannel;
use agora_core::model::{Agent, ClaimState, Discussion, EntityId, Innovation, Message, Task};
use agora_core::topic::{
    ChatPayload, DiscussionJoinPayload, InnovationDraft, JoinedPayload, NewTask,
    PlatformErrorPayload, TaskClaimPayload, TaskCompletePayload, TaskCreatePayload,
};
use agora_core::{
    AgentProfile, AgentSession, AgentStats, CoordinationError, EventBus, RegistrationError,
    RuntimeEvent, SessionError, TransportError,
};
use agora_transport::{PlatformClient, StreamClient};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::coordination::{Resolution, TaskCoordinator};
use crate::hooks::{AgentHooks, TaskDecision};

/// Outcome of one corrective poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Claims rolled back because the task is still pending
    pub reverted: Vec<EntityId>,
    /// Claims settled from the task's current assignee
    pub resolved: Vec<EntityId>,
    /// Claims left as they were because the lookup or the hook failed
    pub failed: Vec<EntityId>,
}

pub struct AgentContext {
    session: AgentSession,
    client: PlatformClient,
    stream: StreamClient,
    tasks: TaskCoordinator,
    events: Arc<EventBus>,
    hooks: Arc<dyn AgentHooks>,
    claim_via: ClaimChannel,
    stats: Mutex<AgentStats>,
}

impl AgentContext {
    pub fn new(
        profile: AgentProfile,
        client: PlatformClient,
        stream: StreamClient,
        hooks: Arc<dyn AgentHooks>,
    ) -> Self {
        Self {
            session: AgentSession::new(profile),
            client,
            stream,
            tasks: TaskCoordinator::new(),
            events: Arc::new(EventBus::default()),
            hooks,
            claim_via: ClaimChannel::default(),
            stats: Mutex::new(AgentStats::default()),
        }
    }

    /// Send claims and completions through `channel`.
    pub fn with_claim_channel(mut self, channel: ClaimChannel) -> Self {
        self.claim_via = channel;
        self
    }

    /// Publish runtime events on a shared bus.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn session(&self) -> &AgentSession {
        &self.session
    }

    pub fn profile(&self) -> &AgentProfile {
        self.session.profile()
    }

    pub fn agent_id(&self) -> Result<EntityId, SessionError> {
        self.session.agent_id()
    }

    pub fn is_self(&self, agent_id: EntityId) -> Result<bool, SessionError> {
        self.session.is_self(agent_id)
    }

    pub fn client(&self) -> &PlatformClient {
        &self.client
    }

    pub fn stream(&self) -> &StreamClient {
        &self.stream
    }

    pub fn tasks(&self) -> &TaskCoordinator {
        &self.tasks
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn claim_channel(&self) -> ClaimChannel {
        self.claim_via
    }

    pub(crate) fn hooks(&self) -> &Arc<dyn AgentHooks> {
        &self.hooks
    }

    /// Counters so far, including the dispatcher's.
    pub fn stats(&self) -> AgentStats {
        let mut stats = self.stats.lock().clone();
        stats.events_dispatched = self.stream.dispatcher().dispatched();
        stats.handler_failures = self.stream.dispatcher().failures();
        stats
    }

    // --- Registration ---

    /// Register with the platform. Allowed once per context.
    pub async fn register(&self) -> Result<&Agent, RegistrationError> {
        if self.session.is_registered() {
            return Err(RegistrationError::AlreadyRegistered);
        }
        let agent = self.client.register_agent(self.session.profile()).await?;
        let agent = self.session.establish(agent)?;
        info!(agent_id = agent.id, name = %agent.name, "Registered with platform");
        self.events
            .publish(RuntimeEvent::registered(agent.id, agent.name.clone()));
        Ok(agent)
    }

    // --- Claims ---

    /// Ask the platform for `task_id`.
    ///
    /// Returns the local state after the attempt: `ClaimAttempted` while the
    /// outcome is unknown, or the resolved state when the platform answered
    /// directly. A task already past `Unclaimed` is rejected without any
    /// network traffic.
    pub async fn claim_task(&self, task_id: EntityId) -> agora_core::Result<ClaimState> {
        let agent_id = self.agent_id()?;
        self.tasks.begin_claim(task_id)?;
        self.events.publish(RuntimeEvent::claim_attempted(task_id));
        info!(task_id, via = ?self.claim_via, "Claiming task");

        let sent = match self.claim_via {
            ClaimChannel::Stream => self
                .stream
                .emit_typed(&TaskClaimPayload { task_id })
                .map(|()| None),
            ClaimChannel::Request => self.client.assign_task(task_id, agent_id).await.map(Some),
        };
        if !matches!(&sent, Err(e) if e.never_sent()) {
            self.stats.lock().claims_sent += 1;
        }

        match sent {
            Ok(None) => Ok(ClaimState::ClaimAttempted),
            Ok(Some(task)) => {
                // Assignments over REST are not broadcast; resolve here.
                self.handle_assigned(task)
                    .await
                    .map_err(|e| agora_core::Error::Internal(e.to_string()))?;
                Ok(self.tasks.state(task_id).unwrap_or(ClaimState::ClaimAttempted))
            }
            Err(err) => {
                match self.tasks.claim_failed(task_id, &err) {
                    Some(ClaimState::Unclaimed) => {
                        warn!(task_id, error = %err, "Claim never sent, reverted");
                        self.events.publish(RuntimeEvent::claim_reverted(task_id));
                    }
                    Some(ClaimState::NotMine) => {
                        info!(task_id, "Platform refused claim");
                        self.stats.lock().tasks_lost += 1;
                        self.events.publish(RuntimeEvent::task_resolved(task_id, false));
                    }
                    _ => warn!(task_id, error = %err, "Claim outcome unknown"),
                }
                Err(err.into())
            }
        }
    }

    /// Report a task this agent owns as finished.
    pub async fn complete_task(
        &self,
        task_id: EntityId,
        result: Option<&str>,
    ) -> agora_core::Result<()> {
        self.tasks.ensure_owned(task_id)?;

        match self.claim_via {
            ClaimChannel::Stream => self.stream.emit_typed(&TaskCompletePayload {
                task_id,
                result: result.map(String::from),
            })?,
            ClaimChannel::Request => {
                self.client.complete_task(task_id, result).await?;
            }
        }

        self.tasks.mark_completed(task_id)?;
        self.stats.lock().tasks_completed += 1;
        self.events.publish(RuntimeEvent::task_completed(task_id));
        info!(task_id, "Task completed");
        Ok(())
    }

    /// Settle claims whose `task:assigned` may have been lost.
    ///
    /// Claims on tasks that are still pending are rolled back; claims on
    /// tasks that left the pending list are resolved from the assignee. A
    /// lookup failure for one task is recorded in `failed` and the pass
    /// moves on; only failing to list pending tasks aborts it.
    pub async fn reconcile(&self) -> anyhow::Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let attempted = self.tasks.attempted();
        if attempted.is_empty() {
            return Ok(report);
        }

        let pending = self.client.list_pending_tasks().await?;
        for task_id in attempted {
            if pending.iter().any(|t| t.id == task_id) {
                if self.tasks.revert(task_id) {
                    self.events.publish(RuntimeEvent::claim_reverted(task_id));
                    report.reverted.push(task_id);
                }
                continue;
            }

            let task = match self.client.get_task(task_id).await {
                Ok(task) => task,
                Err(e) => {
                    warn!(task_id, error = %e, "Could not look up claimed task");
                    report.failed.push(task_id);
                    continue;
                }
            };
            if task.assigned_agent_id.is_none() {
                debug!(task_id, status = ?task.status, "Task left pending without an assignee");
                continue;
            }
            match self.handle_assigned(task).await {
                Ok(()) => report.resolved.push(task_id),
                Err(e) => {
                    warn!(task_id, error = %e, "Resolving claimed task failed");
                    if self.tasks.state(task_id) == Some(ClaimState::ClaimAttempted) {
                        report.failed.push(task_id);
                    } else {
                        report.resolved.push(task_id);
                    }
                }
            }
        }

        if !report.reverted.is_empty() || !report.resolved.is_empty() || !report.failed.is_empty() {
            info!(
                reverted = report.reverted.len(),
                resolved = report.resolved.len(),
                failed = report.failed.len(),
                "Reconciled claims"
            );
        }
        Ok(report)
    }

    // --- Tasks ---

    /// Create a task over REST, credited to this agent.
    pub async fn create_task(
        &self,
        title: &str,
        description: &str,
        priority: i64,
    ) -> agora_core::Result<Task> {
        let task = NewTask {
            title: title.to_string(),
            description: description.to_string(),
            creator_agent_id: Some(self.agent_id()?),
            priority,
        };
        Ok(self.client.create_task(&task).await?)
    }

    /// Create a task over the stream; the platform broadcasts `task:created`.
    pub fn emit_task_create(
        &self,
        title: &str,
        description: &str,
        priority: i64,
    ) -> Result<(), TransportError> {
        self.stream.emit_typed(&TaskCreatePayload {
            title: title.to_string(),
            description: description.to_string(),
            priority,
        })
    }

    pub async fn pending_tasks(&self) -> Result<Vec<Task>, TransportError> {
        self.client.list_pending_tasks().await
    }

    pub async fn online_agents(&self) -> Result<Vec<Agent>, TransportError> {
        self.client.list_online_agents().await
    }

    // --- Discussions ---

    pub async fn create_discussion(&self, topic: &str) -> Result<Discussion, TransportError> {
        self.client.create_discussion(topic).await
    }

    /// Subscribe this connection to a discussion's messages.
    pub fn join_discussion(&self, discussion_id: EntityId) -> Result<(), TransportError> {
        self.stream
            .emit_typed(&DiscussionJoinPayload { discussion_id })
    }

    /// Post to a discussion over the stream.
    pub fn send_message(&self, discussion_id: EntityId, content: &str) -> Result<(), TransportError> {
        self.stream.emit_typed(&ChatPayload {
            discussion_id,
            content: content.to_string(),
        })
    }

    /// Post to a discussion over REST and get the stored message back.
    pub async fn post_message(
        &self,
        discussion_id: EntityId,
        content: &str,
    ) -> agora_core::Result<Message> {
        let agent_id = self.agent_id()?;
        Ok(self
            .client
            .post_message(discussion_id, agent_id, content)
            .await?)
    }

    pub async fn recent_messages(
        &self,
        discussion_id: EntityId,
        limit: usize,
    ) -> Result<Vec<Message>, TransportError> {
        self.client.list_messages(discussion_id, limit).await
    }

    // --- Innovations ---

    pub async fn create_innovation(
        &self,
        draft: &InnovationDraft,
    ) -> Result<Innovation, TransportError> {
        self.client.create_innovation(draft).await
    }

    /// Publish over the stream; the platform broadcasts `innovation:created`.
    pub fn emit_innovation(&self, draft: &InnovationDraft) -> Result<(), TransportError> {
        self.stream.emit_typed(draft)
    }

    pub async fn upvote_innovation(&self, innovation_id: EntityId) -> Result<Innovation, TransportError> {
        self.client.upvote_innovation(innovation_id).await
    }

    // --- Inbound events ---

    pub(crate) async fn handle_joined(&self, payload: JoinedPayload) -> anyhow::Result<()> {
        if !payload.success {
            warn!("Platform did not confirm join");
            return Ok(());
        }
        info!("Joined platform stream");
        self.events.publish(RuntimeEvent::Joined {
            timestamp: chrono::Utc::now(),
        });
        self.hooks.on_joined(self, payload.agent.as_ref()).await
    }

    pub(crate) async fn handle_created(&self, task: Task) -> anyhow::Result<()> {
        let state = self.tasks.observe_created(task.id);
        debug!(task_id = task.id, state = %state, "Task created");

        if self.hooks.on_task_created(self, &task).await? != TaskDecision::Claim {
            return Ok(());
        }
        match self.claim_task(task.id).await {
            Ok(_) => Ok(()),
            Err(agora_core::Error::Coordination(CoordinationError::AlreadyTracked {
                state, ..
            })) => {
                debug!(task_id = task.id, state = %state, "Claim skipped");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply an authoritative assignment and fire the matching hook.
    pub(crate) async fn handle_assigned(&self, task: Task) -> anyhow::Result<()> {
        let Some(assignee) = task.assigned_agent_id else {
            warn!(task_id = task.id, "Assignment without an assignee ignored");
            return Ok(());
        };
        let mine = self.is_self(assignee)?;

        match self.tasks.resolve(task.id, mine) {
            Resolution::BecameMine => {
                info!(task_id = task.id, "Task assigned to this agent");
                self.stats.lock().tasks_won += 1;
                self.events.publish(RuntimeEvent::task_resolved(task.id, true));
                self.hooks.on_task_assigned(self, &task).await
            }
            Resolution::BecameNotMine => {
                debug!(task_id = task.id, assignee, "Task assigned elsewhere");
                self.stats.lock().tasks_lost += 1;
                self.events.publish(RuntimeEvent::task_resolved(task.id, false));
                self.hooks.on_task_assigned_elsewhere(self, &task).await
            }
            Resolution::Duplicate(_) => Ok(()),
        }
    }

    pub(crate) async fn handle_message(&self, message: Message) -> anyhow::Result<()> {
        if self.is_self(message.agent_id)? {
            return Ok(());
        }
        self.hooks.on_message_received(self, &message).await
    }

    pub(crate) async fn handle_innovation(&self, innovation: Innovation) -> anyhow::Result<()> {
        self.hooks.on_innovation_created(self, &innovation).await
    }

    pub(crate) async fn handle_platform_error(
        &self,
        payload: PlatformErrorPayload,
    ) -> anyhow::Result<()> {
        warn!(message = %payload.message, "Platform reported an error");
        self.hooks.on_platform_error(self, &payload.message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoopHooks;
    use std::time::Duration;

    fn offline_context(claim_via: ClaimChannel) -> AgentContext {
        let client = PlatformClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let stream = StreamClient::new("http://127.0.0.1:9", Duration::from_secs(1));
        AgentContext::new(AgentProfile::new("A"), client, stream, Arc::new(NoopHooks))
            .with_claim_channel(claim_via)
    }

    fn registered(ctx: &AgentContext, id: EntityId) {
        ctx.session
            .establish(Agent {
                id,
                name: "A".into(),
                capabilities: vec![],
                endpoint: None,
                status: None,
                last_seen: None,
            })
            .unwrap();
    }

    fn assigned(task_id: EntityId, agent_id: EntityId) -> Task {
        serde_json::from_value(serde_json::json!({
            "id": task_id,
            "title": "t",
            "status": "in_progress",
            "assigned_agent_id": agent_id
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn claim_requires_registration() {
        let ctx = offline_context(ClaimChannel::Stream);
        let err = ctx.claim_task(1).await.unwrap_err();
        assert!(matches!(err, agora_core::Error::Session(SessionError::NotRegistered)));
        assert!(ctx.tasks().is_empty());
    }

    #[tokio::test]
    async fn stream_claim_while_disconnected_reverts() {
        let ctx = offline_context(ClaimChannel::Stream);
        registered(&ctx, 1);
        let mut events = ctx.events().subscribe();

        let err = ctx.claim_task(42).await.unwrap_err();

        assert!(matches!(
            err,
            agora_core::Error::Transport(TransportError::NotConnected)
        ));
        assert_eq!(ctx.tasks().state(42), Some(ClaimState::Unclaimed));
        assert!(matches!(
            *events.recv().await.unwrap(),
            RuntimeEvent::ClaimAttempted { task_id: 42, .. }
        ));
        assert!(matches!(
            *events.recv().await.unwrap(),
            RuntimeEvent::ClaimReverted { task_id: 42, .. }
        ));
        assert_eq!(ctx.stats().claims_sent, 0);
    }

    #[tokio::test]
    async fn request_claim_on_unreachable_platform_stays_attempted() {
        let ctx = offline_context(ClaimChannel::Request);
        registered(&ctx, 1);

        assert!(ctx.claim_task(42).await.is_err());
        assert_eq!(ctx.tasks().state(42), Some(ClaimState::ClaimAttempted));

        // Guarded locally: no second request.
        let err = ctx.claim_task(42).await.unwrap_err();
        assert!(matches!(
            err,
            agora_core::Error::Coordination(CoordinationError::AlreadyTracked { .. })
        ));
        assert_eq!(ctx.stats().claims_sent, 1);
    }

    #[tokio::test]
    async fn duplicate_assignment_counts_once() {
        let ctx = offline_context(ClaimChannel::Stream);
        registered(&ctx, 1);

        ctx.handle_assigned(assigned(42, 1)).await.unwrap();
        ctx.handle_assigned(assigned(42, 1)).await.unwrap();
        ctx.handle_assigned(assigned(7, 3)).await.unwrap();

        let stats = ctx.stats();
        assert_eq!(stats.tasks_won, 1);
        assert_eq!(stats.tasks_lost, 1);
        assert_eq!(ctx.tasks().state(42), Some(ClaimState::Mine));
        assert_eq!(ctx.tasks().state(7), Some(ClaimState::NotMine));
    }

    #[tokio::test]
    async fn complete_requires_ownership() {
        let ctx = offline_context(ClaimChannel::Stream);
        registered(&ctx, 1);
        ctx.handle_assigned(assigned(7, 3)).await.unwrap();

        let err = ctx.complete_task(7, Some("done")).await.unwrap_err();
        assert!(matches!(
            err,
            agora_core::Error::Coordination(CoordinationError::NotOwner { .. })
        ));
    }

    #[tokio::test]
    async fn failed_completion_keeps_task_mine() {
        let ctx = offline_context(ClaimChannel::Stream);
        registered(&ctx, 1);
        ctx.handle_assigned(assigned(42, 1)).await.unwrap();

        assert!(ctx.complete_task(42, None).await.is_err());
        assert_eq!(ctx.tasks().state(42), Some(ClaimState::Mine));
    }

    #[tokio::test]
    async fn own_messages_are_filtered() {
        let ctx = offline_context(ClaimChannel::Stream);
        registered(&ctx, 1);
        let own = Message {
            id: None,
            discussion_id: 1,
            agent_id: 1,
            agent_name: "A".into(),
            content: "hi".into(),
        };
        ctx.handle_message(own).await.unwrap();
    }

    #[tokio::test]
    async fn reconcile_without_attempts_makes_no_calls() {
        let ctx = offline_context(ClaimChannel::Stream);
        registered(&ctx, 1);
        let report = ctx.reconcile().await.unwrap();
        assert_eq!(report, ReconcileReport::default());
    }
}
