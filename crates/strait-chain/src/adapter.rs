use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use strait_core::types::{Amount, ChainId, Hashlock, Height, OrderHash, Preimage, Timestamp};
use strait_core::{EscrowEvent, ResolverError};

/// Which role an escrow plays in the swap. The source escrow holds the
/// user's asset for the resolver; the destination escrow holds the
/// resolver's asset for the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowSide {
    Src,
    Dst,
}

/// Parameters for deploying one escrow instance.
///
/// `hashlock` must already be the form this chain's contract expects
/// (Keccak-256 on EVM, SHA-256 on Stellar); the orchestrator derives it
/// per side from the stored preimage or the submitted order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EscrowParams {
    pub order_hash: OrderHash,
    pub hashlock: Hashlock,
    pub side: EscrowSide,
    /// Party whose asset the escrow holds.
    pub maker: String,
    /// Party entitled to claim with the preimage.
    pub taker: String,
    /// Chain-native asset identifier (token address / contract id / "native").
    pub asset: String,
    pub amount: Amount,
    /// Packed eight-stage schedule plus its base timestamp.
    pub timelocks_packed: u64,
    pub timelocks_base: Timestamp,
}

/// Result of a successful escrow deployment.
#[derive(Clone, Debug)]
pub struct DeployReceipt {
    pub escrow_address: String,
    /// Chain-native submission identifier (tx hash).
    pub tx_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowStatus {
    Created,
    Funded,
    Withdrawn,
    Cancelled,
}

/// On-chain immutables as read back from an escrow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EscrowImmutables {
    pub order_hash: OrderHash,
    pub hashlock: Hashlock,
    pub amount: Amount,
}

#[derive(Clone, Debug)]
pub struct EscrowState {
    pub status: EscrowStatus,
    pub immutables: EscrowImmutables,
}

// ── ChainAdapter ─────────────────────────────────────────────────────────────

/// Uniform contract over one ledger.
///
/// The adapter is the only component that touches an RPC endpoint or holds
/// a signing key. It owns bounded-retry backoff for transport errors and
/// MUST surface any on-chain revert as [`ResolverError::EscrowReverted`]
/// without retrying. A single in-flight submission per signer account is
/// enforced internally (nonce / sequence safety).
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn chain_id(&self) -> ChainId;

    /// Current confirmable height: the chain tip already discounted by the
    /// configured confirmation depth.
    async fn latest_height(&self) -> Result<Height, ResolverError>;

    /// Ordered canonical events in the inclusive height range.
    async fn poll_events(&self, from: Height, to: Height)
        -> Result<Vec<EscrowEvent>, ResolverError>;

    /// The address a successful [`ChainAdapter::deploy_escrow`] with the
    /// same parameters will produce. Deterministic.
    async fn predict_escrow(&self, params: &EscrowParams) -> Result<String, ResolverError>;

    /// Submit the create-escrow transaction.
    async fn deploy_escrow(&self, params: &EscrowParams) -> Result<DeployReceipt, ResolverError>;

    /// Move `amount` of `asset` into the escrow.
    async fn fund_escrow(
        &self,
        escrow: &str,
        asset: &str,
        amount: Amount,
    ) -> Result<String, ResolverError>;

    /// Submit the claim transaction. The chain contract verifies the
    /// preimage; the adapter only carries it.
    async fn withdraw(&self, escrow: &str, preimage: &Preimage) -> Result<String, ResolverError>;

    /// Submit the refund transaction (valid after the cancellation deadline).
    async fn cancel(&self, escrow: &str) -> Result<String, ResolverError>;

    async fn get_escrow_state(&self, escrow: &str) -> Result<EscrowState, ResolverError>;
}
