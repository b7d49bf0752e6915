//! Server-Sent Events push channel.
//!
//! Provides the connection registry, the session re-validation heartbeat,
//! and the HTTP handler used by Axum routes.

mod handler;
mod heartbeat;
pub mod hub;

pub use handler::sse_handler;
pub use heartbeat::start_heartbeat;
pub use hub::{BroadcastHub, HubConfig, SseSubscription, SweepReport};
