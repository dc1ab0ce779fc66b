use rand::rngs::OsRng;
use rand::RngCore;

use strait_core::types::{ChainId, Hashlock, Preimage};
use strait_core::ResolverError;

use crate::hash::hashlock_for_chain;

/// Draw a fresh 32-byte preimage from the OS CSPRNG.
///
/// `EntropyUnavailable` if the OS source cannot deliver.
pub fn random_preimage() -> Result<Preimage, ResolverError> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| ResolverError::EntropyUnavailable(e.to_string()))?;
    Ok(Preimage::from_bytes(bytes))
}

/// Generate a preimage together with its hashlock under `chain`'s hash
/// function.
pub fn new_secret(chain: ChainId) -> Result<(Preimage, Hashlock), ResolverError> {
    let preimage = random_preimage()?;
    let hashlock = hashlock_for_chain(chain, &preimage);
    Ok((preimage, hashlock))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{keccak256, sha256};

    #[test]
    fn secrets_are_unique() {
        let (a, _) = new_secret(ChainId::Base).unwrap();
        let (b, _) = new_secret(ChainId::Base).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn hashlock_matches_chain_hash_function() {
        let (p, h) = new_secret(ChainId::Base).unwrap();
        assert_eq!(*h.as_bytes(), keccak256(p.as_bytes()));

        let (p, h) = new_secret(ChainId::Stellar).unwrap();
        assert_eq!(*h.as_bytes(), sha256(p.as_bytes()));
    }
}
