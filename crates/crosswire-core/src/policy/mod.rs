//! Serialization policy: the per-deployment whitelist controlling which
//! types and fields may cross the wire, and under what wire-visible name.

pub mod loader;
pub mod model;
pub mod store;

pub use loader::{load_manifest, LoadedPolicy};
pub use model::{SerializationPolicy, TypePolicy};
pub use store::PolicyStore;
