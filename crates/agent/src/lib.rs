//! The agent runtime: how an Agora agent joins the platform and competes for work.
//!
//! An agent runs through one lifecycle:
//!
//! 1. **Register** over REST and receive its platform id
//! 2. **Connect** the event stream (with bounded backoff)
//! 3. **Join** by announcing its profile on the stream
//! 4. **React** to streamed events through [`AgentHooks`]
//! 5. **Stop** when the stream closes or the caller cancels
//!
//! Task ownership is decided by the platform. [`TaskCoordinator`] tracks
//! what this agent attempted and what it was told, so it never claims the
//! same task twice and never believes it won a task it lost.

pub mod context;
pub mod coordination;
pub mod hooks;
pub mod runtime;

pub use context::{AgentContext, ReconcileReport};
pub use coordination::{Resolution, TaskCoordinator};
pub use hooks::{AgentHooks, NoopHooks, TaskDecision};
pub use runtime::{AgentRuntime, RunReport, backoff_policy};
