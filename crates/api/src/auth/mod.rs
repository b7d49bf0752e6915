//! Session authentication.
//!
//! - [`jwt`]: HS256 session token decoding, plus minting for tests and tooling.
//! - [`session`]: the [`session::SessionValidator`] seam with local, remote and
//!   caching implementations.

pub mod jwt;
pub mod session;
