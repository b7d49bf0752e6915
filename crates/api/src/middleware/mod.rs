//! Request extractors.
//!
//! - [`auth::SessionCredential`]: the raw session credential from a Bearer
//!   header or the `session` cookie.
//! - [`auth::AuthUser`]: a credential that passed session validation.

pub mod auth;
