//! crosswire core: the GWT-RPC wire grammar and serialization-policy model.
//!
//! This crate defines the token-stream encoder, the policy manifest parser,
//! and the policy registry shared by the client crate and by test tooling.
//! It intentionally carries no transport or runtime dependencies so it can be
//! reused in multiple contexts.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `CrosswireError`/`Result` so a caller
//! never crashes on a malformed manifest or an un-whitelisted value.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod policy;
pub mod wire;

/// Shared result type.
pub use error::{CrosswireError, Result};
