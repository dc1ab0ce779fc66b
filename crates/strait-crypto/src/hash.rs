use sha2::{Digest as Sha2Digest, Sha256};
use sha3::{Digest as Sha3Digest, Keccak256};

use strait_core::order::OrderIntent;
use strait_core::types::{ChainFamily, ChainId, Hashlock, OrderHash, Preimage};
use strait_core::ResolverError;

/// SHA-256 of arbitrary bytes → 32-byte array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// Keccak-256 of arbitrary bytes → 32-byte array.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

/// The hashlock a chain's escrow contract expects for a given preimage:
/// Keccak-256 on EVM chains, SHA-256 on Stellar.
pub fn hashlock_for_chain(chain: ChainId, preimage: &Preimage) -> Hashlock {
    let bytes = match chain.family() {
        ChainFamily::Evm => keccak256(preimage.as_bytes()),
        ChainFamily::Stellar => sha256(preimage.as_bytes()),
    };
    Hashlock::from_bytes(bytes)
}

/// Derive the order hash: Keccak-256 over the bincode canonical
/// serialization of the normalized intent.
pub fn order_hash_for_intent(intent: &OrderIntent) -> Result<OrderHash, ResolverError> {
    let body = bincode::serialize(&intent.hash_body())
        .map_err(|e| ResolverError::Serialization(e.to_string()))?;
    Ok(OrderHash::from_bytes(keccak256(&body)))
}
