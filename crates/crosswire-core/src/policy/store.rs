//! In-memory policy registry:
//! `service name -> policy id` and `policy id -> parsed whitelist`.
//!
//! Merge semantics are append-only per fetch cycle: installing a manifest
//! replaces the mapping of every service it names (writer wins) but never
//! removes mappings for services it does not mention — those may live in a
//! different policy file of the same deployment.

use std::sync::Arc;

use dashmap::DashMap;

use crate::policy::loader::LoadedPolicy;
use crate::policy::model::SerializationPolicy;

#[derive(Debug, Default)]
pub struct PolicyStore {
    by_service: DashMap<String, String>,
    by_id: DashMap<String, Arc<SerializationPolicy>>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached policy id for a service, if any. Callers may pass either
    /// the synchronous interface name or its `Async` counterpart.
    pub fn policy_id_for(&self, service: &str) -> Option<String> {
        self.by_service.get(service).map(|r| r.value().clone())
    }

    /// The parsed whitelist for a policy id, if cached.
    pub fn policy(&self, policy_id: &str) -> Option<Arc<SerializationPolicy>> {
        self.by_id.get(policy_id).map(|r| Arc::clone(r.value()))
    }

    /// Merge one fetched manifest into the registry. Each embedded service
    /// interface is registered under both its own name and the asynchronous
    /// counterpart name, since callers may reference either.
    pub fn install(&self, policy_id: &str, loaded: LoadedPolicy) {
        for service in &loaded.services {
            tracing::debug!(service = %service, policy = %policy_id, "policy mapping installed");
            self.by_service
                .insert(service.clone(), policy_id.to_string());
            self.by_service
                .insert(format!("{service}Async"), policy_id.to_string());
        }
        self.by_id
            .insert(policy_id.to_string(), Arc::new(loaded.policy));
    }

    /// Number of known service mappings (both naming forms counted).
    pub fn service_count(&self) -> usize {
        self.by_service.len()
    }
}
