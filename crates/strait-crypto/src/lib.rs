//! strait-crypto
//!
//! Hashing and secret generation for the resolver. Two hash functions are
//! load-bearing: Keccak-256 (EVM hashlocks, order hashes, ABI selectors)
//! and SHA-256 (Stellar hashlocks). The preimage is always stored raw and
//! each chain's expected hash is derived independently — never the other
//! way round.

pub mod hash;
pub mod secret;

pub use hash::{hashlock_for_chain, keccak256, order_hash_for_intent, sha256};
pub use secret::{new_secret, random_preimage};
