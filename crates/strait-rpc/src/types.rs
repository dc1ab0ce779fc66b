use serde::{Deserialize, Serialize};

use strait_core::swap::Swap;

/// Result of a successful order submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcSubmitResult {
    pub order_hash: String,
    pub status: String,
}

/// A swap as exposed over RPC. The preimage never leaves the process
/// through this surface, revealed or not.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcSwap {
    pub order_hash: String,
    pub src_chain: String,
    pub dst_chain: String,
    pub maker: String,
    pub taker: String,
    pub maker_asset: String,
    pub taker_asset: String,
    pub making_amount: String,
    pub taking_amount: String,
    pub hashlock: String,
    pub src_escrow_address: Option<String>,
    pub dst_escrow_address: Option<String>,
    pub status: String,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Swap> for RpcSwap {
    fn from(s: Swap) -> Self {
        Self {
            order_hash: s.order_hash.to_hex(),
            src_chain: s.src_chain.to_string(),
            dst_chain: s.dst_chain.to_string(),
            maker: s.maker,
            taker: s.taker,
            maker_asset: s.maker_asset,
            taker_asset: s.taker_asset,
            making_amount: s.making_amount.to_string(),
            taking_amount: s.taking_amount.to_string(),
            hashlock: s.hashlock.to_hex(),
            src_escrow_address: s.src_escrow_address,
            dst_escrow_address: s.dst_escrow_address,
            status: s.status.to_string(),
            last_error: s.last_error,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// Per-chain health and ingestion progress.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcChainStatus {
    pub chain: String,
    pub degraded: bool,
    pub checkpoint_height: u64,
}

/// One chain's durable ingestion marker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcCheckpoint {
    pub chain: String,
    /// Last processed height; every event at or below it has been handed
    /// to the orchestrator at least once.
    pub height: u64,
}

/// Process-wide status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcServiceStatus {
    pub running: bool,
    pub active_swap_count: usize,
    pub chains: Vec<RpcChainStatus>,
}
