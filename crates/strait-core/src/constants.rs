//! ─── Strait resolver defaults ────────────────────────────────────────────────
//!
//! Tuning knobs shared across subsystems. Per-chain values here are defaults
//! only; the config file overrides them per deployment.

// ── Event ingestion ──────────────────────────────────────────────────────────

/// Seconds between ingestor poll rounds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Heights per poll window.
pub const DEFAULT_POLL_WINDOW: u64 = 1;

/// Confirmation depth for EVM chains. `latest_height` is discounted by this.
pub const DEFAULT_CONFIRMATIONS_EVM: u64 = 12;

/// Confirmation depth for Soroban. Near-instant finality; kept configurable
/// so the uniform reorg protocol still applies.
pub const DEFAULT_CONFIRMATIONS_STELLAR: u64 = 1;

// ── Chain RPC ────────────────────────────────────────────────────────────────

/// Per-call RPC timeout.
pub const RPC_TIMEOUT_SECS: u64 = 30;

/// Bounded retries for transport errors before a chain is marked degraded.
pub const RPC_MAX_RETRIES: u32 = 5;

/// Exponential backoff base and ceiling, milliseconds.
pub const RPC_BACKOFF_BASE_MS: u64 = 500;
pub const RPC_BACKOFF_CEILING_MS: u64 = 30_000;

// ── Timelock scheduler ───────────────────────────────────────────────────────

/// Periodic scheduler tick. Must stay at or below 5 seconds so stage
/// boundaries are observed promptly.
pub const SCHEDULER_TICK_SECS: u64 = 2;

// ── Retention ────────────────────────────────────────────────────────────────

/// How long terminal swaps and revealed secrets are kept before GC.
pub const DEFAULT_RETENTION_HORIZON_SECS: i64 = 7 * 24 * 3_600;

/// Seconds between retention sweeps.
pub const GC_INTERVAL_SECS: u64 = 3_600;
