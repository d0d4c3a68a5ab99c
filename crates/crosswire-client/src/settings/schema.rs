//! Per-service proxy configuration.
//!
//! Constructed once per service proxy (from YAML or programmatically),
//! mutable before the first call, read-mostly afterward. Concurrent mutation
//! while calls are in flight is a documented caller responsibility; nothing
//! here takes internal locks.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use crosswire_core::error::{CrosswireError, Result};
use crosswire_core::wire::ProtocolVersion;

use crate::dispatch::{Authenticator, TokenFaultHandler};

#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxySettings {
    /// Deployment base URL; must end with `/` (normalized by `validate`).
    pub module_base_url: String,

    /// Module name used for artifact discovery (`<module>.nocache.js`).
    /// Defaults to the last path segment of the base URL.
    #[serde(default)]
    pub module_name: Option<String>,

    /// Service path relative to the base URL. When absent, the service
    /// descriptor's default entry point applies.
    #[serde(default)]
    pub service_entry_point: Option<String>,

    /// Extra headers added to every RPC call.
    #[serde(default)]
    pub custom_headers: BTreeMap<String, String>,

    /// User-Agent header for RPC calls.
    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub protocol_version: ProtocolVersion,

    /// Minimum delay before re-running policy discovery for a service whose
    /// previous discovery failed.
    #[serde(default = "default_policy_retry_ms")]
    pub policy_retry_ms: u64,

    /// Allow calls against the bare base URL when neither the settings nor
    /// the service descriptor name an entry point.
    #[serde(default)]
    pub suppress_missing_entry_point: bool,

    /// Out-of-band anti-forgery token attached to every request.
    #[serde(skip)]
    pub rpc_token: Option<String>,

    /// Dedicated handler for token-validation faults. When set, such faults
    /// bypass the normal failure path.
    #[serde(skip)]
    pub token_fault_handler: Option<Arc<dyn TokenFaultHandler>>,

    /// Hook producing an authentication header per call.
    #[serde(skip)]
    pub authenticator: Option<Arc<dyn Authenticator>>,
}

impl std::fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxySettings")
            .field("module_base_url", &self.module_base_url)
            .field("module_name", &self.module_name)
            .field("service_entry_point", &self.service_entry_point)
            .field("custom_headers", &self.custom_headers)
            .field("user_agent", &self.user_agent)
            .field("protocol_version", &self.protocol_version)
            .field("policy_retry_ms", &self.policy_retry_ms)
            .field(
                "suppress_missing_entry_point",
                &self.suppress_missing_entry_point,
            )
            .field("rpc_token", &self.rpc_token)
            .field(
                "token_fault_handler",
                &self.token_fault_handler.as_ref().map(|_| "<dyn TokenFaultHandler>"),
            )
            .field(
                "authenticator",
                &self.authenticator.as_ref().map(|_| "<dyn Authenticator>"),
            )
            .finish()
    }
}

fn default_policy_retry_ms() -> u64 {
    5000
}

impl ProxySettings {
    /// Minimal programmatic constructor.
    pub fn new(module_base_url: impl Into<String>) -> Self {
        Self {
            module_base_url: module_base_url.into(),
            policy_retry_ms: default_policy_retry_ms(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.module_base_url.is_empty() {
            return Err(CrosswireError::Configuration(
                "module_base_url must not be empty".into(),
            ));
        }
        url::Url::parse(&self.module_base_url).map_err(|e| {
            CrosswireError::Configuration(format!("module_base_url is not a valid URL: {e}"))
        })?;
        if self.policy_retry_ms > 600_000 {
            return Err(CrosswireError::Configuration(
                "policy_retry_ms must be at most 600000".into(),
            ));
        }
        Ok(())
    }

    /// Base URL with a guaranteed trailing slash.
    pub fn module_base(&self) -> String {
        if self.module_base_url.ends_with('/') {
            self.module_base_url.clone()
        } else {
            format!("{}/", self.module_base_url)
        }
    }

    /// Module name: explicit setting, or the last path segment of the base
    /// URL.
    pub fn resolved_module_name(&self) -> Result<String> {
        if let Some(name) = &self.module_name {
            return Ok(name.clone());
        }
        let base = self.module_base();
        base.trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .map(String::from)
            .ok_or_else(|| {
                CrosswireError::Configuration(
                    "module_name not set and not derivable from module_base_url".into(),
                )
            })
    }

    /// Absolute URL of the service endpoint. Fails fast when no entry point
    /// is configured or discoverable, unless explicitly suppressed.
    pub fn endpoint_url(&self, default_entry_point: Option<&str>) -> Result<String> {
        let base = self.module_base();
        let path = self
            .service_entry_point
            .as_deref()
            .or(default_entry_point);
        match path {
            Some(p) => Ok(format!("{base}{}", p.trim_start_matches('/'))),
            None if self.suppress_missing_entry_point => Ok(base),
            None => Err(CrosswireError::Configuration(
                "no service entry point configured and none declared by the service".into(),
            )),
        }
    }
}
