//! Push-event contract and in-process change bus.
//!
//! - [`wire`]: the Server-Sent Events wire format shared by the server
//!   ([`PushEvent::encode`]) and clients ([`SseDecoder`]).
//! - [`bus`]: [`ProgressBus`], the publish/subscribe hub that carries
//!   [`JobChange`] notices from the intake endpoint to the relay.

pub mod bus;
pub mod wire;

pub use bus::{JobChange, ProgressBus};
pub use wire::{PushEvent, PushEventKind, SseDecoder, SseFrame, WireError};
