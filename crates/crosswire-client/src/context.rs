//! Shared client context.
//!
//! One context per deployment (module base URL); every service proxy built
//! against that deployment shares its policy cache, type tables, and
//! transport. Nothing here is global: two contexts against two deployments
//! coexist in one process without interference.

use std::sync::Arc;
use std::time::Duration;

use crosswire_core::error::Result;
use crosswire_core::policy::PolicyStore;
use crosswire_core::wire::{CustomSerializerRegistry, FieldTableRegistry};

use crate::discovery::PolicyDiscovery;
use crate::dispatch::{ResponseDecoder, WireResponseDecoder};
use crate::settings::ProxySettings;
use crate::transport::{HttpTransport, Transport};

pub struct ClientContext {
    pub transport: Arc<dyn Transport>,
    pub store: Arc<PolicyStore>,
    pub discovery: PolicyDiscovery,
    pub tables: Arc<FieldTableRegistry>,
    pub serializers: Arc<CustomSerializerRegistry>,
    pub decoder: Arc<dyn ResponseDecoder>,
}

impl ClientContext {
    /// Context over the default HTTP transport.
    pub fn new(settings: &ProxySettings, tables: FieldTableRegistry) -> Result<Arc<Self>> {
        Self::with_transport(settings, tables, Arc::new(HttpTransport::new()?))
    }

    /// Context over a caller-supplied transport. Tests inject their mock
    /// here.
    pub fn with_transport(
        settings: &ProxySettings,
        tables: FieldTableRegistry,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<Self>> {
        settings.validate()?;
        let store = Arc::new(PolicyStore::new());
        let discovery = PolicyDiscovery::new(
            Arc::clone(&transport),
            Arc::clone(&store),
            settings.module_base(),
            settings.resolved_module_name()?,
            Duration::from_millis(settings.policy_retry_ms),
        )?;
        let tables = Arc::new(tables);
        Ok(Arc::new(Self {
            transport,
            store,
            discovery,
            tables: Arc::clone(&tables),
            serializers: Arc::new(CustomSerializerRegistry::with_builtins()),
            decoder: Arc::new(WireResponseDecoder::new(tables)),
        }))
    }
}
