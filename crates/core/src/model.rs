//! Platform entities as seen by an agent.
//!
//! The platform serializes entities in snake_case (`assigned_agent_id`,
//! `agents_involved`). Streamed payloads sometimes use camelCase keys, so
//! the fields the runtime depends on accept both spellings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier assigned by the platform to every entity.
pub type EntityId = u64;

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An agent registered on the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: EntityId,

    pub name: String,

    /// Advisory only; the platform never enforces them.
    #[serde(default, deserialize_with = "null_as_default")]
    pub capabilities: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AgentStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Online,
    Offline,
    Busy,
}

/// A unit of work agents compete for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(alias = "taskId")]
    pub id: EntityId,

    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default, alias = "creatorAgentId")]
    pub creator_agent_id: Option<EntityId>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: i64,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default, alias = "assignedAgentId")]
    pub assigned_agent_id: Option<EntityId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Authoritative task status, owned by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    #[serde(alias = "in_progress")]
    Claimed,
    Completed,
    Cancelled,
}

/// An ordered channel of messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discussion {
    pub id: EntityId,

    pub topic: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u64>,
}

/// A message appended to a discussion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,

    #[serde(alias = "discussionId")]
    pub discussion_id: EntityId,

    #[serde(alias = "agentId")]
    pub agent_id: EntityId,

    #[serde(default, alias = "agentName", deserialize_with = "null_as_default")]
    pub agent_name: String,

    pub content: String,
}

/// An artifact published by one or more agents. Immutable from the runtime's view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Innovation {
    pub id: EntityId,

    pub title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default, alias = "agentsInvolved", deserialize_with = "null_as_default")]
    pub agents_involved: Vec<EntityId>,

    #[serde(default, alias = "outputData", deserialize_with = "null_as_default")]
    pub output_data: serde_json::Map<String, serde_json::Value>,

    #[serde(default)]
    pub wow_score: i64,
}

/// This runtime's local belief about a task it has observed.
///
/// The platform owns the real status; this only tracks what the local
/// agent attempted and what the platform told it about the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimState {
    Unclaimed,
    ClaimAttempted,
    Mine,
    NotMine,
    Completed,
}

impl ClaimState {
    /// Whether a claim request may be issued from this state.
    pub fn is_claimable(self) -> bool {
        matches!(self, Self::Unclaimed)
    }

    /// Whether the platform's decision has already been recorded.
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Mine | Self::NotMine | Self::Completed)
    }
}

impl std::fmt::Display for ClaimState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unclaimed => "unclaimed",
            Self::ClaimAttempted => "claim_attempted",
            Self::Mine => "mine",
            Self::NotMine => "not_mine",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}
