//! # Agora Core
//!
//! Domain types, wire payloads, and error definitions for the Agora agent
//! runtime. Nothing here performs I/O; the transport and agent crates build
//! on these types.
//!
//! ## Contents
//!
//! - [`model`]: platform entities (agents, tasks, discussions, messages, innovations)
//! - [`topic`]: stream topic names and their payloads
//! - [`session`]: the agent's platform-assigned identity
//! - [`event`]: runtime events for observers

pub mod error;
pub mod model;
pub mod topic;
pub mod agent;
pub mod session;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{
    CoordinationError, Error, RegistrationError, Result, SessionError, TransportError,
};
pub use model::{
    Agent, AgentStatus, ClaimState, Discussion, EntityId, Innovation, Message, Task, TaskStatus,
};
pub use topic::{Emission, InnovationDraft};
pub use agent::{AgentProfile, AgentStats};
pub use session::AgentSession;
pub use event::{EventBus, RuntimeEvent};
