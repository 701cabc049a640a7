//! Agent identity for one runtime lifetime.
//!
//! The session is created empty and filled exactly once, when the
//! registration call returns. Every question about "is this me?" goes
//! through here and fails loudly before registration, because guessing an
//! identity would corrupt claim bookkeeping.

use std::sync::OnceLock;

use crate::agent::AgentProfile;
use crate::error::{RegistrationError, SessionError};
use crate::model::{Agent, EntityId};

#[derive(Debug)]
pub struct AgentSession {
    profile: AgentProfile,
    agent: OnceLock<Agent>,
}

impl AgentSession {
    pub fn new(profile: AgentProfile) -> Self {
        Self {
            profile,
            agent: OnceLock::new(),
        }
    }

    /// What this agent announced (or will announce) to the platform.
    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// Record the identity returned by registration. Only the first call wins.
    pub fn establish(&self, agent: Agent) -> Result<&Agent, RegistrationError> {
        self.agent
            .set(agent)
            .map_err(|_| RegistrationError::AlreadyRegistered)?;
        self.agent()
            .map_err(|_| RegistrationError::AlreadyRegistered)
    }

    pub fn is_registered(&self) -> bool {
        self.agent.get().is_some()
    }

    pub fn agent(&self) -> Result<&Agent, SessionError> {
        self.agent.get().ok_or(SessionError::NotRegistered)
    }

    pub fn agent_id(&self) -> Result<EntityId, SessionError> {
        self.agent().map(|a| a.id)
    }

    /// True iff `candidate` is the id the platform assigned to this agent.
    pub fn is_self(&self, candidate: EntityId) -> Result<bool, SessionError> {
        Ok(self.agent_id()? == candidate)
    }
}
