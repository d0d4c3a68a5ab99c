//! Transport abstraction.
//!
//! The dispatcher and discovery never talk HTTP directly; they go through an
//! object-safe [`Transport`] that knows two operations: GET a deployment
//! artifact as text, and POST an RPC payload. Status interpretation for RPC
//! calls belongs to the dispatcher, so `call` reports non-2xx statuses as
//! data, not as errors.

pub mod http;

use async_trait::async_trait;

use crosswire_core::error::Result;

pub use http::HttpTransport;

/// Response of an RPC `call`: status code plus body text.
#[derive(Debug, Clone)]
pub struct RpcResponse {
    pub status: u16,
    pub body: String,
}

impl RpcResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// A mechanism to fetch artifacts and exchange RPC payloads.
///
/// Designed to be object-safe (`Arc<dyn Transport>`). Timeouts and cookie
/// management live here, not in the dispatcher.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a deployment artifact. A non-success status is a transport error.
    async fn fetch(&self, url: &str) -> Result<String>;

    /// POST an RPC payload and return the status and body verbatim.
    /// Fails only on network-level problems.
    async fn call(
        &self,
        url: &str,
        headers: &[(String, String)],
        payload: String,
    ) -> Result<RpcResponse>;
}
