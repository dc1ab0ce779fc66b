//! strait-orchestrator
//!
//! The central state machine. Consumes escrow events from the per-chain
//! ingestors, expiry signals from the timelock scheduler, and new-swap
//! submissions from the intake, and drives every swap through its
//! lifecycle by invoking chain adapters.
//!
//! Concurrency contract: all mutation of one swap happens under that
//! order's async mutex, acquired at the top of every handler. Distinct
//! orders proceed in parallel. Handlers are idempotent — events are
//! delivered at least once and timers may replay.

pub mod locks;
pub mod orchestrator;

pub use orchestrator::{Orchestrator, OrchestratorDeps};
