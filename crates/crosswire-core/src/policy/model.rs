//! Immutable whitelist model parsed from a policy manifest.

use std::collections::HashMap;

/// Whitelist entry for one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypePolicy {
    pub field_serializable: bool,
    pub field_deserializable: bool,
    pub instantiable_ser: bool,
    pub instantiable_deser: bool,
    /// Wire-visible type signature. May differ from the locally computed
    /// one; for container types under the legacy protocol version it always
    /// wins over the local signature.
    pub type_id: String,
    /// Field names visible to clients, for types that carry server-only
    /// extra fields. `None` means all fields are client-visible.
    pub client_fields: Option<Vec<String>>,
}

/// Immutable whitelist keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct SerializationPolicy {
    types: HashMap<String, TypePolicy>,
}

impl SerializationPolicy {
    pub fn new(types: HashMap<String, TypePolicy>) -> Self {
        Self { types }
    }

    pub fn entry(&self, type_name: &str) -> Option<&TypePolicy> {
        self.types.get(type_name)
    }

    pub fn field_serializable(&self, type_name: &str) -> bool {
        self.entry(type_name)
            .map(|t| t.field_serializable)
            .unwrap_or(false)
    }

    /// The server-declared signature for a type, when the policy records one.
    pub fn type_id(&self, type_name: &str) -> Option<&str> {
        self.entry(type_name)
            .map(|t| t.type_id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn client_fields(&self, type_name: &str) -> Option<&[String]> {
        self.entry(type_name)
            .and_then(|t| t.client_fields.as_deref())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
