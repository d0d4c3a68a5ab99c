//! reqwest-backed transport with an attached cookie store.

use async_trait::async_trait;

use crosswire_core::error::{CrosswireError, Result};

use super::{RpcResponse, Transport};

/// Production transport. One instance per deployment is enough: the
/// underlying client pools connections and shares its cookie jar across all
/// proxies of the deployment.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| CrosswireError::Transport(format!("client build failed: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap a pre-configured client (custom timeouts, proxies, cookie jar).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CrosswireError::Transport(format!("GET {url} failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CrosswireError::Transport(format!(
                "GET {url} returned status {status}"
            )));
        }
        resp.text()
            .await
            .map_err(|e| CrosswireError::Transport(format!("GET {url} body read failed: {e}")))
    }

    async fn call(
        &self,
        url: &str,
        headers: &[(String, String)],
        payload: String,
    ) -> Result<RpcResponse> {
        let mut req = self.client.post(url).body(payload);
        for (name, value) in headers {
            req = req.header(name, value);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| CrosswireError::Transport(format!("POST {url} failed: {e}")))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| CrosswireError::Transport(format!("POST {url} body read failed: {e}")))?;
        Ok(RpcResponse { status, body })
    }
}
