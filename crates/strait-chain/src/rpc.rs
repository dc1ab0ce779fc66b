use std::time::Duration;

use serde_json::Value;

use strait_core::constants::RPC_TIMEOUT_SECS;
use strait_core::types::ChainId;
use strait_core::ResolverError;

/// Minimal JSON-RPC 2.0 client used by the chain adapters.
///
/// Raw HTTP POST with serde_json rather than a full client library; the
/// adapters own method names and payload shapes, this type owns transport
/// and the result/error split.
pub struct JsonRpcClient {
    chain: ChainId,
    url: String,
    client: reqwest::Client,
}

impl JsonRpcClient {
    pub fn new(chain: ChainId, url: &str) -> Result<Self, ResolverError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(RPC_TIMEOUT_SECS))
            .build()
            .map_err(|e| ResolverError::ChainRpc { chain, message: e.to_string() })?;
        Ok(Self { chain, url: url.to_string(), client })
    }

    /// Call a JSON-RPC method and return the `result` field.
    ///
    /// Timeouts map to `RpcTimeout`; transport failures and RPC-level
    /// errors map to `ChainRpc` with the server's message preserved —
    /// callers classify reverts from that message.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ResolverError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self.client.post(&self.url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                ResolverError::RpcTimeout { chain: self.chain, method: method.to_string() }
            } else {
                ResolverError::ChainRpc { chain: self.chain, message: e.to_string() }
            }
        })?;

        let json: Value = resp
            .json()
            .await
            .map_err(|e| ResolverError::ChainRpc { chain: self.chain, message: e.to_string() })?;

        if let Some(err) = json.get("error").filter(|e| !e.is_null()) {
            return Err(ResolverError::ChainRpc {
                chain: self.chain,
                message: err.to_string(),
            });
        }

        Ok(json.get("result").cloned().unwrap_or(Value::Null))
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }
}
