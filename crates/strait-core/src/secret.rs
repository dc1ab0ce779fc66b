//! Stored secret records: the preimage and its per-chain hashlocks.

use serde::{Deserialize, Serialize};

use crate::types::{Hashlock, OrderHash, Preimage, Timestamp};

/// One custody record in the secret store, indexed both by order hash and
/// by hashlock. `revealed_at` is set exactly once, when the preimage first
/// becomes publicly known on any chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecretRecord {
    pub order_hash: OrderHash,
    pub preimage: Preimage,
    /// Keccak-256 of the preimage (EVM-side hashlock).
    pub hashlock_keccak: Hashlock,
    /// SHA-256 of the preimage (Stellar-side hashlock).
    pub hashlock_sha256: Hashlock,
    pub created_at: Timestamp,
    pub revealed_at: Option<Timestamp>,
}
