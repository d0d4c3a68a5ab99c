//! Policy discovery: locate, fetch, and parse the deployment's generated
//! policy manifests.
//!
//! There is no stable discovery endpoint — the manifest names are embedded
//! in other generated artifacts. The sequence: fetch the bootstrap script,
//! extract the permutation strong name, fetch the per-permutation artifact,
//! and extract candidate policy ids with the linker family's quoting
//! convention. Older deployment layouts carry no permutation token in the
//! bootstrap; those fall back to the `compilation-mappings.txt` index.
//!
//! Discovery for a given service is single-flighted: concurrent resolves
//! with no cached entry share one in-flight run instead of issuing
//! duplicate network calls.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::future::join_all;
use regex::Regex;
use tokio::sync::OnceCell;

use crosswire_core::error::{CrosswireError, Result};
use crosswire_core::policy::{load_manifest, PolicyStore};

use crate::transport::Transport;

pub struct PolicyDiscovery {
    transport: Arc<dyn Transport>,
    store: Arc<PolicyStore>,
    module_base_url: String,
    module_name: String,
    /// Minimum delay before re-running discovery after a failed run.
    retry_interval: Duration,

    inflight: DashMap<String, Arc<OnceCell<()>>>,
    last_failure: DashMap<String, Instant>,

    permutation_re: Regex,
    policy_sq_re: Regex,
    policy_dq_re: Regex,
    artifact_re: Regex,
}

impl PolicyDiscovery {
    /// `module_base_url` must end with `/`.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<PolicyStore>,
        module_base_url: String,
        module_name: String,
        retry_interval: Duration,
    ) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| CrosswireError::Configuration(format!("bad pattern: {e}")))
        };
        Ok(Self {
            transport,
            store,
            module_base_url,
            module_name,
            retry_interval,
            inflight: DashMap::new(),
            last_failure: DashMap::new(),
            permutation_re: compile(r#"['"]([A-F0-9]{32})['"]"#)?,
            policy_sq_re: compile(r"'([A-F0-9]{32})\.gwt\.rpc'")?,
            policy_dq_re: compile(r#""([A-F0-9]{32})\.gwt\.rpc""#)?,
            artifact_re: compile(r"([A-F0-9]{32})\.cache\.(?:html|js)")?,
        })
    }

    /// Resolve the current policy id for a service. Cached entries are the
    /// common path and never trigger I/O.
    pub async fn resolve_policy(&self, service: &str) -> Result<String> {
        if let Some(id) = self.store.policy_id_for(service) {
            return Ok(id);
        }
        if let Some(at) = self.last_failure.get(service).map(|r| *r.value()) {
            if at.elapsed() < self.retry_interval {
                return Err(CrosswireError::Configuration(format!(
                    "no policy known for {service} (discovery recently failed)"
                )));
            }
        }

        let cell = self
            .inflight
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let run = cell.get_or_try_init(|| self.run_discovery()).await;
        self.inflight.remove(service);

        match run {
            Ok(_) => match self.store.policy_id_for(service) {
                Some(id) => {
                    self.last_failure.remove(service);
                    Ok(id)
                }
                None => {
                    self.last_failure.insert(service.to_string(), Instant::now());
                    Err(CrosswireError::Configuration(format!(
                        "deployment manifests name no policy for {service}"
                    )))
                }
            },
            Err(e) => {
                self.last_failure.insert(service.to_string(), Instant::now());
                Err(e)
            }
        }
    }

    /// Re-run the whole discovery sequence regardless of cache state and
    /// return the (possibly unchanged) policy id for the service.
    pub async fn force_refetch(&self, service: &str) -> Result<String> {
        self.run_discovery().await?;
        self.store.policy_id_for(service).ok_or_else(|| {
            CrosswireError::Configuration(format!(
                "deployment manifests name no policy for {service}"
            ))
        })
    }

    async fn run_discovery(&self) -> Result<()> {
        let base = &self.module_base_url;
        let bootstrap_url = format!("{base}{}.nocache.js", self.module_name);
        let bootstrap = self.transport.fetch(&bootstrap_url).await?;

        let candidates = match self.permutation_token(&bootstrap) {
            Some(strong_name) => self.permutation_candidates(&bootstrap, &strong_name).await?,
            None => {
                tracing::debug!(
                    module = %self.module_name,
                    "no permutation token in bootstrap; trying compilation-mappings fallback"
                );
                self.fallback_candidates().await?
            }
        };
        if candidates.is_empty() {
            return Err(CrosswireError::Configuration(format!(
                "no policy ids discoverable for module {}",
                self.module_name
            )));
        }

        let fetches = candidates.iter().map(|id| async move {
            let outcome = self.load_policy(id).await;
            (id.clone(), outcome)
        });
        let mut installed = 0usize;
        for (id, outcome) in join_all(fetches).await {
            match outcome {
                Ok(()) => installed += 1,
                // One failed fetch never blocks discovery of the others.
                Err(e) => tracing::warn!(policy = %id, error = %e, "policy manifest skipped"),
            }
        }
        if installed == 0 {
            return Err(CrosswireError::Configuration(format!(
                "all {} candidate policy manifests failed to load",
                candidates.len()
            )));
        }
        tracing::debug!(
            module = %self.module_name,
            manifests = installed,
            services = self.store.service_count(),
            "policy discovery complete"
        );
        Ok(())
    }

    fn permutation_token(&self, bootstrap: &str) -> Option<String> {
        self.permutation_re
            .captures(bootstrap)
            .map(|c| c[1].to_string())
    }

    /// Per-permutation artifact path: cross-site linkers emit `.cache.js`
    /// and quote with `'`; iframe linkers emit `.cache.html` and quote
    /// with `"`.
    async fn permutation_candidates(
        &self,
        bootstrap: &str,
        strong_name: &str,
    ) -> Result<BTreeSet<String>> {
        let cross_site = bootstrap.contains(".cache.js");
        let artifact_url = if cross_site {
            format!("{}{strong_name}.cache.js", self.module_base_url)
        } else {
            format!("{}{strong_name}.cache.html", self.module_base_url)
        };
        let body = self.transport.fetch(&artifact_url).await?;
        let re = if cross_site {
            &self.policy_sq_re
        } else {
            &self.policy_dq_re
        };
        Ok(extract_ids(re, &body))
    }

    /// Older deployment layout: the compilation-mapping index lists one
    /// artifact per browser permutation; policy ids hide in those.
    async fn fallback_candidates(&self) -> Result<BTreeSet<String>> {
        let mappings_url = format!("{}compilation-mappings.txt", self.module_base_url);
        let mappings = self.transport.fetch(&mappings_url).await?;

        let artifacts: BTreeSet<String> = self
            .artifact_re
            .captures_iter(&mappings)
            .map(|c| c[0].to_string())
            .collect();

        let fetches = artifacts.iter().map(|name| async move {
            let url = format!("{}{name}", self.module_base_url);
            (name.clone(), self.transport.fetch(&url).await)
        });
        let mut ids = BTreeSet::new();
        for (name, body) in join_all(fetches).await {
            match body {
                Ok(body) => {
                    ids.extend(extract_ids(&self.policy_sq_re, &body));
                    ids.extend(extract_ids(&self.policy_dq_re, &body));
                }
                Err(e) => {
                    tracing::warn!(artifact = %name, error = %e, "permutation artifact skipped")
                }
            }
        }
        Ok(ids)
    }

    async fn load_policy(&self, policy_id: &str) -> Result<()> {
        let url = format!("{}{policy_id}.gwt.rpc", self.module_base_url);
        let text = self.transport.fetch(&url).await?;
        let loaded = load_manifest(&text)?;
        self.store.install(policy_id, loaded);
        Ok(())
    }
}

fn extract_ids(re: &Regex, body: &str) -> BTreeSet<String> {
    re.captures_iter(body).map(|c| c[1].to_string()).collect()
}
