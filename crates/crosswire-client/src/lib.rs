//! crosswire client library entry.
//!
//! This crate wires the transport, policy discovery, proxy settings, and the
//! invocation dispatcher into a working GWT-RPC client stack on top of the
//! wire grammar from `crosswire-core`. It is intended to be consumed through
//! the `crosswire` facade crate and by integration tests.

pub mod context;
pub mod discovery;
pub mod dispatch;
pub mod settings;
pub mod transport;
