//! Agent profile and runtime counters.

use serde::{Deserialize, Serialize};

use crate::topic::JoinPayload;

/// What an agent announces about itself when it registers and joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Caller-supplied name, unique per session
    pub name: String,

    /// Advisory capability tags (deduplicated, order preserved)
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Optional callback endpoint advertised to the platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: Vec::new(),
            endpoint: None,
        }
    }

    /// Add capabilities, skipping blanks and duplicates.
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for cap in capabilities {
            let cap = cap.into();
            let cap = cap.trim();
            if !cap.is_empty() && !self.capabilities.iter().any(|c| c == cap) {
                self.capabilities.push(cap.to_string());
            }
        }
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Whether any capability tag occurs in the given text (case-insensitive).
    pub fn matches_text(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.capabilities
            .iter()
            .any(|cap| text.contains(&cap.to_lowercase()))
    }

    /// The `agent:join` announcement for this profile.
    pub fn join_payload(&self) -> JoinPayload {
        JoinPayload {
            name: self.name.clone(),
            capabilities: self.capabilities.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

/// Counters kept by a running agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    /// Events handed to the dispatcher
    pub events_dispatched: u64,

    /// Handler invocations that returned an error
    pub handler_failures: u64,

    /// Claim requests actually sent
    pub claims_sent: u64,

    /// Tasks the platform assigned to this agent
    pub tasks_won: u64,

    /// Tasks the platform assigned elsewhere
    pub tasks_lost: u64,

    /// Tasks this agent reported complete
    pub tasks_completed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_are_deduplicated() {
        let profile =
            AgentProfile::new("alpha").with_capabilities(["x", "y", "x", " ", "y ", "z"]);
        assert_eq!(profile.capabilities, vec!["x", "y", "z"]);
    }

    #[test]
    fn capability_matching_ignores_case() {
        let profile = AgentProfile::new("alpha").with_capabilities(["Analysis"]);
        assert!(profile.matches_text("Market ANALYSIS for Q3"));
        assert!(!profile.matches_text("Write a poem"));
    }

    #[test]
    fn join_payload_mirrors_profile() {
        let profile = AgentProfile::new("alpha")
            .with_capabilities(["x"])
            .with_endpoint("http://alpha.local");
        let join = profile.join_payload();
        assert_eq!(join.name, "alpha");
        assert_eq!(join.capabilities, vec!["x"]);
        assert_eq!(join.endpoint.as_deref(), Some("http://alpha.local"));
    }

    #[test]
    fn stats_start_at_zero() {
        let stats = AgentStats::default();
        assert_eq!(stats.claims_sent, 0);
        assert_eq!(stats.tasks_won, 0);
    }
}
