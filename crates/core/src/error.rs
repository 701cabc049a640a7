//! Error types for the Agora domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

use crate::model::ClaimState;

/// The top-level error type for all Agora operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Transport errors ---
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // --- Registration errors ---
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Coordination errors ---
    #[error("Coordination error: {0}")]
    Coordination(#[from] CoordinationError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout.
    #[error("Network error: {0}")]
    Network(String),

    /// The platform answered with a non-success status.
    #[error("Request failed with status {status_code}: {body}")]
    Request { status_code: u16, body: String },

    #[error("Stream is not connected")]
    NotConnected,

    #[error("Stream handshake failed: {0}")]
    Handshake(String),

    #[error("Failed to decode platform payload: {0}")]
    Decode(String),

    #[error("Failed to encode payload: {0}")]
    Encode(String),
}

impl TransportError {
    /// True when the failure proves nothing reached the platform.
    pub fn never_sent(&self) -> bool {
        matches!(self, Self::NotConnected | Self::Handshake(_))
    }

    /// Status code of a non-success response, if this is one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Request { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    #[error("Platform rejected registration (status: {status_code}): {body}")]
    Rejected { status_code: u16, body: String },

    #[error("Platform unreachable: {0}")]
    Unreachable(String),

    #[error("Session is already registered")]
    AlreadyRegistered,
}

impl From<TransportError> for RegistrationError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Request { status_code, body } => {
                Self::Rejected { status_code, body }
            }
            other => Self::Unreachable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Agent identity queried before registration completed")]
    NotRegistered,
}

#[derive(Debug, Clone, Error)]
pub enum CoordinationError {
    #[error("Task {task_id} is already {state}; claim not sent")]
    AlreadyTracked { task_id: u64, state: ClaimState },

    #[error("Task {task_id} is {state}, not owned by this agent")]
    NotOwner { task_id: u64, state: ClaimState },
}
