use thiserror::Error;

use crate::swap::SwapStatus;
use crate::types::ChainId;

#[derive(Debug, Error)]
pub enum ResolverError {
    // ── Intake errors ────────────────────────────────────────────────────────
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("duplicate order: {0}")]
    DuplicateOrder(String),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("unsupported chain pair: {src} -> {dst}")]
    UnsupportedChainPair { src: ChainId, dst: ChainId },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("invalid {chain} address: {address}")]
    InvalidAddress { chain: ChainId, address: String },

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    // ── Secret store errors ──────────────────────────────────────────────────
    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("a different preimage is already bound to order {0}")]
    AlreadyBound(String),

    #[error("revealed preimage does not match the stored preimage for order {0}")]
    PreimageMismatch(String),

    #[error("no secret recorded for {0}")]
    SecretNotFound(String),

    // ── Timelock errors ──────────────────────────────────────────────────────
    #[error("timelock inversion: {0}")]
    TimelockInversion(String),

    #[error("timelock schedule for order {0} does not strictly advance the existing one")]
    StaleSchedule(String),

    // ── Chain errors ─────────────────────────────────────────────────────────
    #[error("{chain} rpc timed out calling {method}")]
    RpcTimeout { chain: ChainId, method: String },

    #[error("{chain} rpc error: {message}")]
    ChainRpc { chain: ChainId, message: String },

    #[error("{chain} unavailable after retry budget exhausted: {reason}")]
    ChainUnavailable { chain: ChainId, reason: String },

    #[error("{chain} escrow call reverted: {reason}")]
    EscrowReverted { chain: ChainId, reason: String },

    #[error("escrow not found on {chain}: {escrow}")]
    EscrowNotFound { chain: ChainId, escrow: String },

    // ── Ingest errors ────────────────────────────────────────────────────────
    #[error("reorg detected on {chain} at height {height}")]
    ReorgDetected { chain: ChainId, height: u64 },

    // ── Orchestrator invariant violations ────────────────────────────────────
    #[error("revealed preimage does not hash to the stored hashlock for order {0}")]
    HashlockMismatch(String),

    #[error("backward status transition: {from:?} -> {to:?}")]
    BackwardTransition { from: SwapStatus, to: SwapStatus },

    #[error("swap is terminal ({status:?}); no further transitions")]
    SwapTerminal { status: SwapStatus },

    #[error("swap not found: {0}")]
    SwapNotFound(String),

    #[error("stale swap update: expected updated_at {expected}, found {found}")]
    StaleUpdate { expected: i64, found: i64 },

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    // ── Lifecycle ────────────────────────────────────────────────────────────
    #[error("shutting down")]
    ShuttingDown,

    #[error("{0}")]
    Other(String),
}

impl ResolverError {
    /// Errors that fail a swap permanently, as opposed to conditions the
    /// state machine recovers from on the next event or tick.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            ResolverError::HashlockMismatch(_)
                | ResolverError::BackwardTransition { .. }
                | ResolverError::TimelockInversion(_)
        )
    }
}
