//! strait-chain
//!
//! Everything that touches a ledger. The [`ChainAdapter`] trait is the
//! uniform contract the rest of the resolver consumes; concrete adapters
//! own their chain's wire format, signing and retry policy. Adding a chain
//! means implementing the trait — no core code changes.
//!
//! - [`adapter`] — the trait plus escrow parameter/state types
//! - [`rpc`] — thin JSON-RPC 2.0 client over reqwest
//! - [`retry`] — bounded exponential backoff for transport errors
//! - [`evm`] — Ethereum-family adapter (Keccak hashlocks, u256 amounts)
//! - [`stellar`] — Soroban adapter (SHA-256 hashlocks, i128 amounts)
//! - [`mock`] — scriptable in-memory chain for tests

pub mod adapter;
pub mod evm;
pub mod mock;
pub mod retry;
pub mod rpc;
pub mod stellar;

pub use adapter::{
    ChainAdapter, DeployReceipt, EscrowImmutables, EscrowParams, EscrowSide, EscrowState,
    EscrowStatus,
};
pub use evm::{EvmAdapter, EvmConfig};
pub use mock::MockChain;
pub use stellar::{StellarAdapter, StellarConfig};
