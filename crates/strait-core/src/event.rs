//! The canonical escrow event stream surfaced by the per-chain ingestors.

use serde::{Deserialize, Serialize};

use crate::types::{ChainId, Height, OrderHash, Preimage};

/// Variant-specific payload of an escrow event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum EscrowEventKind {
    /// An escrow contract instance appeared on-chain.
    Created,
    /// The escrow holds its full amount.
    Funded,
    /// A withdraw call exposed the preimage on-chain.
    SecretRevealed { preimage: Preimage },
    Withdrawn,
    Cancelled,
}

impl EscrowEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowEventKind::Created => "created",
            EscrowEventKind::Funded => "funded",
            EscrowEventKind::SecretRevealed { .. } => "secret_revealed",
            EscrowEventKind::Withdrawn => "withdrawn",
            EscrowEventKind::Cancelled => "cancelled",
        }
    }
}

/// One canonical event, normalized from whatever the chain's wire format is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowEvent {
    pub chain: ChainId,
    pub order_hash: OrderHash,
    pub escrow_address: String,
    pub height: Height,
    /// Chain-native transaction identifier (EVM tx hash, Stellar tx hash).
    pub tx_id: String,
    /// Position within the transaction/ledger, disambiguating events that
    /// share a tx. Together with `tx_id` this fingerprints the event for
    /// reorg detection.
    pub log_index: u32,
    pub kind: EscrowEventKind,
}

impl EscrowEvent {
    /// Identity used to detect a chain reorganization: a previously
    /// processed height returning a different `(tx_id, log_index)`.
    pub fn fingerprint(&self) -> (String, u32) {
        (self.tx_id.clone(), self.log_index)
    }
}

// ── Checkpoint ───────────────────────────────────────────────────────────────

/// Durable per-chain ingestion marker. `height` is the last processed
/// height — every event at or below it has been handed to the sink at
/// least once. `fingerprint` records the `(tx_id, log_index)` pairs seen
/// in the last processed window, for reorg detection on the next poll.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub height: Height,
    pub fingerprint: Vec<(String, u32)>,
}
