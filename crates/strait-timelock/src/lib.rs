//! strait-timelock
//!
//! Tracks each swap's eight-stage timelock schedule and emits
//! [`TimelockExpired`] once per stage boundary crossed. Wall-clock driven;
//! no cryptography, no chain access.
//!
//! Emission is at-least-once: after a restart every stage whose deadline
//! passed while the process was down is synthesized again, in ascending
//! deadline order. The consumer deduplicates by (order, stage) — in
//! practice by re-checking swap state before acting.

pub mod scheduler;

pub use scheduler::{TimelockExpired, TimelockScheduler};
