//! The invocation dispatcher: resolves method metadata, drives the encoder,
//! calls the transport, interprets the response, and runs the
//! policy-mismatch retry protocol.
//!
//! Retry policy: a redeployed service usually changes its policy id (new
//! methods imply new whitelist hashes), which the server signals with a
//! server-error status on stale requests. Exactly one retry is permitted,
//! gated on the refetched policy id actually differing; a genuinely failing
//! service must not retry forever.

use std::sync::Arc;

use crosswire_core::error::{CrosswireError, Result};
use crosswire_core::wire::{
    classify, RequestContext, ResponseClass, RpcValue, WireEncoder, RPC_CONTENT_TYPE,
};

use crate::context::ClientContext;
use crate::settings::ProxySettings;
use crate::transport::RpcResponse;

use super::{CallOutcome, CallState, MethodDescriptor, PendingInvocation, ServiceDescriptor};

/// Header carrying the policy id (strong name) the payload was encoded
/// against.
const STRONG_NAME_HEADER: &str = "X-GWT-Permutation";
/// Header carrying the deployment base URL.
const MODULE_BASE_HEADER: &str = "X-GWT-Module-Base";

/// Outcome of one send: either terminal, or a server-error status feeding
/// the retry protocol.
enum Attempt {
    Done(CallOutcome),
    ServerError(u16),
}

/// One dispatcher per service proxy.
pub struct InvocationDispatcher {
    ctx: Arc<ClientContext>,
    settings: ProxySettings,
    service: ServiceDescriptor,
}

impl InvocationDispatcher {
    pub fn new(
        ctx: Arc<ClientContext>,
        settings: ProxySettings,
        service: ServiceDescriptor,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            ctx,
            settings,
            service,
        })
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    /// Runtime settings mutation the proxy interface exposes (e.g. swapping
    /// the anti-forgery token).
    pub fn settings_mut(&mut self) -> &mut ProxySettings {
        &mut self.settings
    }

    /// Invoke a method of the asynchronous service interface. The method is
    /// resolved against the synchronous counterpart's signatures by name and
    /// arity.
    pub async fn invoke(&self, method_name: &str, args: &[RpcValue]) -> Result<CallOutcome> {
        let method = self.service.method(method_name, args.len())?;
        // Configuration problems surface before any network activity.
        let endpoint = self
            .settings
            .endpoint_url(self.service.default_entry_point.as_deref())?;

        let mut pending = PendingInvocation::new(method_name, args.len());
        let policy_id = self
            .ctx
            .discovery
            .resolve_policy(&self.service.interface)
            .await?;
        pending.policy_id = policy_id.clone();
        pending.attempt = 1;

        match self
            .attempt(&mut pending, method, args, &endpoint, &policy_id)
            .await?
        {
            Attempt::Done(outcome) => Ok(outcome),
            Attempt::ServerError(status) => {
                self.retry_once(&mut pending, method, args, &endpoint, &policy_id, status)
                    .await
            }
        }
    }

    /// The retry protocol: refetch the policy; resend exactly once if and
    /// only if the policy id changed. The second attempt's outcome is
    /// terminal regardless of further mismatches.
    async fn retry_once(
        &self,
        pending: &mut PendingInvocation,
        method: &MethodDescriptor,
        args: &[RpcValue],
        endpoint: &str,
        stale_id: &str,
        status: u16,
    ) -> Result<CallOutcome> {
        // A failed refetch must not mask the server error that triggered it;
        // the caller sees the original status with the refetch failure as
        // context.
        let fresh_id = match self
            .ctx
            .discovery
            .force_refetch(&self.service.interface)
            .await
        {
            Ok(id) => id,
            Err(refetch) => {
                pending.state = CallState::Failed;
                return Err(CrosswireError::Transport(format!(
                    "server error {status}; policy refetch failed: {refetch}"
                )));
            }
        };
        if fresh_id == stale_id {
            pending.state = CallState::Failed;
            return Err(CrosswireError::Transport(format!(
                "server error {status} and policy unchanged"
            )));
        }

        tracing::info!(
            service = %self.service.interface,
            stale = %stale_id,
            fresh = %fresh_id,
            "policy changed after server error; retrying once"
        );
        pending.state = CallState::Retrying;
        pending.policy_id = fresh_id.clone();
        pending.attempt += 1;

        match self
            .attempt(pending, method, args, endpoint, &fresh_id)
            .await?
        {
            Attempt::Done(outcome) => Ok(outcome),
            Attempt::ServerError(status) => {
                pending.state = CallState::Failed;
                Err(CrosswireError::Transport(format!(
                    "server error {status} on retry"
                )))
            }
        }
    }

    async fn attempt(
        &self,
        pending: &mut PendingInvocation,
        method: &MethodDescriptor,
        args: &[RpcValue],
        endpoint: &str,
        policy_id: &str,
    ) -> Result<Attempt> {
        let policy = self.ctx.store.policy(policy_id).ok_or_else(|| {
            CrosswireError::Configuration(format!("policy {policy_id} not cached"))
        })?;

        let module_base = self.settings.module_base();
        let req = RequestContext {
            module_base_url: &module_base,
            policy_id,
            service_interface: &self.service.interface,
            method_name: &method.name,
            rpc_token: self.settings.rpc_token.as_deref(),
        };
        let encoder = WireEncoder::new(
            self.settings.protocol_version,
            &policy,
            &self.ctx.tables,
            &self.ctx.serializers,
        );
        // Encoding failures short-circuit to the caller with no network I/O.
        let payload = encoder.encode_request(&req, &method.arg_types, args)?;
        pending.state = CallState::Encoded;

        let headers = self.headers(policy_id);
        let resp = self
            .ctx
            .transport
            .call(endpoint, &headers, payload)
            .await?;
        pending.state = CallState::Sent;

        self.interpret(pending, method, resp)
    }

    fn headers(&self, policy_id: &str) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Content-Type".to_string(), RPC_CONTENT_TYPE.to_string()),
            (STRONG_NAME_HEADER.to_string(), policy_id.to_string()),
            (MODULE_BASE_HEADER.to_string(), self.settings.module_base()),
        ];
        if let Some(agent) = &self.settings.user_agent {
            headers.push(("User-Agent".to_string(), agent.clone()));
        }
        for (name, value) in &self.settings.custom_headers {
            headers.push((name.clone(), value.clone()));
        }
        if let Some(auth) = &self.settings.authenticator {
            if let Some((name, value)) = auth.header() {
                headers.push((name, value));
            }
        }
        headers
    }

    fn interpret(
        &self,
        pending: &mut PendingInvocation,
        method: &MethodDescriptor,
        resp: RpcResponse,
    ) -> Result<Attempt> {
        if resp.status == 404 {
            pending.state = CallState::Failed;
            // Restricted message: the body is never echoed back, to avoid
            // leaking unrelated content.
            return Err(CrosswireError::Transport(
                "status 404: service endpoint not found".into(),
            ));
        }
        if resp.is_server_error() {
            return Ok(Attempt::ServerError(resp.status));
        }
        if !resp.is_success() {
            pending.state = CallState::Failed;
            return Err(CrosswireError::Transport(format!(
                "unexpected status {}",
                resp.status
            )));
        }

        match classify(&resp.body) {
            ResponseClass::Ok(payload) => {
                let value = self.ctx.decoder.decode_ok(
                    payload,
                    method.return_type.as_ref(),
                    self.settings.protocol_version,
                )?;
                pending.state = CallState::Succeeded;
                Ok(Attempt::Done(CallOutcome::Returned(value)))
            }
            ResponseClass::Thrown(payload) => {
                let thrown = self.ctx.decoder.decode_thrown(payload)?;
                if thrown.is_token_fault() {
                    if let Some(handler) = &self.settings.token_fault_handler {
                        handler.on_token_fault(&thrown);
                        pending.response_ignored = true;
                        pending.state = CallState::Succeeded;
                        return Ok(Attempt::Done(CallOutcome::Suppressed));
                    }
                }
                pending.state = CallState::Failed;
                Err(CrosswireError::Remote {
                    type_name: thrown.type_name,
                    message: thrown.message.unwrap_or_default(),
                })
            }
            ResponseClass::Unknown => {
                pending.state = CallState::Failed;
                Err(CrosswireError::Protocol("unknown response body".into()))
            }
        }
    }
}
