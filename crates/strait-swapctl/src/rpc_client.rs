use anyhow::{bail, Context};

use strait_core::order::OrderIntent;

/// Simple JSON-RPC 2.0 client used to talk to a running resolver.
///
/// Raw HTTP POST with serde_json rather than a full client library, to
/// keep the control binary lean.
pub struct ResolverRpcClient {
    url: String,
    client: reqwest::Client,
}

impl ResolverRpcClient {
    pub fn new(url: &str) -> Self {
        Self { url: url.to_string(), client: reqwest::Client::new() }
    }

    /// Call a JSON-RPC method and return the `result` field.
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("connecting to resolver at {}", self.url))?;

        let json: serde_json::Value = resp.json().await.context("parsing RPC response")?;

        if let Some(err) = json.get("error").filter(|e| !e.is_null()) {
            bail!("RPC error: {}", err);
        }

        Ok(json["result"].clone())
    }

    pub async fn submit_order(&self, intent: &OrderIntent) -> anyhow::Result<serde_json::Value> {
        self.call("strait_submitOrder", serde_json::json!([intent])).await
    }

    pub async fn get_swap(&self, order_hash: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let result = self.call("strait_getSwap", serde_json::json!([order_hash])).await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(result))
    }

    pub async fn list_swaps(
        &self,
        status: Option<&str>,
    ) -> anyhow::Result<Vec<serde_json::Value>> {
        let result = self.call("strait_listSwaps", serde_json::json!([status])).await?;
        serde_json::from_value(result).context("parsing swap list")
    }

    pub async fn get_status(&self) -> anyhow::Result<serde_json::Value> {
        self.call("strait_getStatus", serde_json::json!([])).await
    }
}
