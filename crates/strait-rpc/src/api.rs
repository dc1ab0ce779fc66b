use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use strait_core::order::OrderIntent;

use crate::types::{RpcCheckpoint, RpcServiceStatus, RpcSubmitResult, RpcSwap};

/// Strait resolver JSON-RPC 2.0 API.
///
/// All method names are prefixed with "strait_" via `namespace = "strait"`.
#[rpc(server, namespace = "strait")]
pub trait StraitApi {
    /// Submit a new swap order. Returns the order hash and initial status
    /// synchronously; processing continues asynchronously.
    #[method(name = "submitOrder")]
    async fn submit_order(&self, order: OrderIntent) -> RpcResult<RpcSubmitResult>;

    /// Fetch one swap by its 0x-prefixed order hash hex.
    #[method(name = "getSwap")]
    async fn get_swap(&self, order_hash: String) -> RpcResult<Option<RpcSwap>>;

    /// List swaps, optionally filtered by status name (e.g. "COMPLETED").
    #[method(name = "listSwaps")]
    async fn list_swaps(&self, status: Option<String>) -> RpcResult<Vec<RpcSwap>>;

    /// Process health: running flag, active swap count, per-chain
    /// degradation and checkpoint heights.
    #[method(name = "getStatus")]
    async fn get_status(&self) -> RpcResult<RpcServiceStatus>;

    /// The durable per-chain ingestion checkpoints.
    #[method(name = "getCheckpoints")]
    async fn get_checkpoints(&self) -> RpcResult<Vec<RpcCheckpoint>>;
}
