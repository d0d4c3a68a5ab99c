//! Top-level facade crate for crosswire.
//!
//! Re-exports the wire/policy core and the client library so users can
//! depend on a single crate.

pub mod core {
    pub use crosswire_core::*;
}

pub mod client {
    pub use crosswire_client::*;
}
