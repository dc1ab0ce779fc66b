//! strait-core
//!
//! Shared types for the Strait cross-chain swap resolver:
//! - [`types`] — identifiers (order hash, hashlock, preimage), chains, amounts
//! - [`swap`] — the central [`swap::Swap`] entity and its status state machine
//! - [`timelocks`] — the eight-stage timelock schedule (packed and unpacked)
//! - [`event`] — the canonical [`event::EscrowEvent`] surfaced by ingestors
//! - [`order`] — the inbound order intent accepted by the intake
//! - [`secret`] — the stored [`secret::SecretRecord`] custody form
//! - [`error`] — the [`error::ResolverError`] taxonomy

pub mod constants;
pub mod error;
pub mod event;
pub mod order;
pub mod secret;
pub mod swap;
pub mod timelocks;
pub mod types;

pub use error::ResolverError;
pub use event::{Checkpoint, EscrowEvent, EscrowEventKind};
pub use order::OrderIntent;
pub use secret::SecretRecord;
pub use swap::{Swap, SwapStatus};
pub use timelocks::{TimelockStage, Timelocks};
pub use types::{Amount, ChainFamily, ChainId, Hashlock, Height, OrderHash, Preimage, Timestamp};
