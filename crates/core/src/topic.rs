//! Stream topics and the payloads carried on them.
//!
//! Outbound payloads are camelCase on the wire; inbound entities are decoded
//! with the types in [`crate::model`].

use serde::{Deserialize, Serialize};

use crate::model::{Agent, EntityId};

// Inbound topics consumed by the runtime.
pub const AGENT_JOINED: &str = "agent:joined";
pub const TASK_CREATED: &str = "task:created";
pub const TASK_ASSIGNED: &str = "task:assigned";
pub const MESSAGE_NEW: &str = "message:new";
pub const INNOVATION_CREATED: &str = "innovation:created";
/// Sent to a single socket when one of its streamed requests failed.
pub const PLATFORM_ERROR: &str = "error";

// Outbound topics.
pub const AGENT_JOIN: &str = "agent:join";
pub const AGENT_MESSAGE: &str = "agent:message";
pub const TASK_CREATE: &str = "task:create";
pub const TASK_CLAIM: &str = "task:claim";
pub const TASK_COMPLETE: &str = "task:complete";
pub const INNOVATION_CREATE: &str = "innovation:create";
pub const DISCUSSION_JOIN: &str = "discussion:join";

/// A payload that is always emitted on the same topic.
pub trait Emission: Serialize {
    const TOPIC: &'static str;
}

/// Announces this connection as a registered agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub name: String,
    pub capabilities: Vec<String>,
    pub endpoint: Option<String>,
}

impl Emission for JoinPayload {
    const TOPIC: &'static str = AGENT_JOIN;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub discussion_id: EntityId,
    pub content: String,
}

impl Emission for ChatPayload {
    const TOPIC: &'static str = AGENT_MESSAGE;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreatePayload {
    pub title: String,
    pub description: String,
    pub priority: i64,
}

impl Emission for TaskCreatePayload {
    const TOPIC: &'static str = TASK_CREATE;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskClaimPayload {
    pub task_id: EntityId,
}

impl Emission for TaskClaimPayload {
    const TOPIC: &'static str = TASK_CLAIM;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletePayload {
    pub task_id: EntityId,
    pub result: Option<String>,
}

impl Emission for TaskCompletePayload {
    const TOPIC: &'static str = TASK_COMPLETE;
}

/// A new innovation, used both for the stream emission and the REST call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnovationDraft {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub agents_involved: Vec<EntityId>,
    pub output_data: serde_json::Map<String, serde_json::Value>,
}

impl Emission for InnovationDraft {
    const TOPIC: &'static str = INNOVATION_CREATE;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionJoinPayload {
    pub discussion_id: EntityId,
}

impl Emission for DiscussionJoinPayload {
    const TOPIC: &'static str = DISCUSSION_JOIN;
}

/// Payload of `agent:joined`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedPayload {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub agent: Option<Agent>,
}

/// Payload of the platform's `error` topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformErrorPayload {
    #[serde(default)]
    pub message: String,
}

// --- REST request bodies ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub creator_agent_id: Option<EntityId>,
    pub priority: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub agent_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDiscussion {
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub agent_id: EntityId,
    pub content: String,
}
