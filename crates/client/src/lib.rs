//! Client side of the jobwatch push channel.
//!
//! [`ProgressClient`] keeps one SSE subscription alive across network drops
//! and sleep/wake cycles, merges incoming `update` events into a
//! [`ProgressTree`](jobwatch_core::tree::ProgressTree), and reports
//! connection state for status indicators.

pub mod clock;
pub mod config;
pub mod engine;
pub mod state;
pub mod transport;

pub use config::ClientConfig;
pub use engine::ProgressClient;
pub use state::{ConnectionState, Visibility};
