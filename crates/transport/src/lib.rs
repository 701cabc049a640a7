//! # agora-transport
//!
//! Everything that talks to the platform over the network: the REST
//! [`PlatformClient`], the Socket.IO [`StreamClient`], and the
//! [`EventDispatcher`] that routes inbound stream events to handlers.

pub mod backoff;
pub mod dispatch;
pub mod engineio;
pub mod http;
pub mod stream;

pub use backoff::{BackoffPolicy, connect_with_backoff};
pub use dispatch::{EventDispatcher, EventHandler, FailureReporter, FnHandler, InboundEvent};
pub use http::PlatformClient;
pub use stream::{CloseReason, StreamClient, StreamEnd};
