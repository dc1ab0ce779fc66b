//! The central [`Swap`] entity and its status state machine.

use serde::{Deserialize, Serialize};

use crate::error::ResolverError;
use crate::timelocks::Timelocks;
use crate::types::{Amount, ChainId, Hashlock, OrderHash, Preimage, Timestamp};

// ── SwapStatus ───────────────────────────────────────────────────────────────

/// Lifecycle states of a swap.
///
/// Forward progression only; COMPLETED, CANCELLED and FAILED are terminal.
/// SOURCE_WITHDRAWN and DESTINATION_WITHDRAWN commute — whichever side is
/// observed first is recorded, and COMPLETED requires both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapStatus {
    Created,
    SourceDeployed,
    SourceFunded,
    DestinationDeployed,
    DestinationFunded,
    SecretRevealed,
    SourceWithdrawn,
    DestinationWithdrawn,
    Completed,
    Cancelled,
    Failed,
}

impl SwapStatus {
    /// Rank in the progression partial order. The two `*Withdrawn` states
    /// share a rank because they commute.
    pub fn rank(&self) -> u8 {
        match self {
            SwapStatus::Created => 0,
            SwapStatus::SourceDeployed => 1,
            SwapStatus::SourceFunded => 2,
            SwapStatus::DestinationDeployed => 3,
            SwapStatus::DestinationFunded => 4,
            SwapStatus::SecretRevealed => 5,
            SwapStatus::SourceWithdrawn | SwapStatus::DestinationWithdrawn => 6,
            SwapStatus::Completed | SwapStatus::Cancelled | SwapStatus::Failed => 7,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapStatus::Completed | SwapStatus::Cancelled | SwapStatus::Failed)
    }

    /// Whether moving to `next` respects monotonicity. Terminal sinks are
    /// reachable from any non-terminal state; otherwise rank must not
    /// decrease, and same-rank moves are only allowed between the two
    /// commuting withdrawn states.
    pub fn can_transition_to(&self, next: SwapStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next.is_terminal() {
            return true;
        }
        if *self == next {
            return true;
        }
        if next.rank() == self.rank() {
            return matches!(
                (self, next),
                (SwapStatus::SourceWithdrawn, SwapStatus::DestinationWithdrawn)
                    | (SwapStatus::DestinationWithdrawn, SwapStatus::SourceWithdrawn)
            );
        }
        next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Created => "CREATED",
            SwapStatus::SourceDeployed => "SOURCE_DEPLOYED",
            SwapStatus::SourceFunded => "SOURCE_FUNDED",
            SwapStatus::DestinationDeployed => "DESTINATION_DEPLOYED",
            SwapStatus::DestinationFunded => "DESTINATION_FUNDED",
            SwapStatus::SecretRevealed => "SECRET_REVEALED",
            SwapStatus::SourceWithdrawn => "SOURCE_WITHDRAWN",
            SwapStatus::DestinationWithdrawn => "DESTINATION_WITHDRAWN",
            SwapStatus::Completed => "COMPLETED",
            SwapStatus::Cancelled => "CANCELLED",
            SwapStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Swap ─────────────────────────────────────────────────────────────────────

/// One cross-chain swap record. Created by intake, mutated only by the
/// orchestrator under its per-order lock, removed only by retention GC
/// after reaching a terminal state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Swap {
    pub order_hash: OrderHash,
    pub src_chain: ChainId,
    pub dst_chain: ChainId,
    /// Address that locked the source asset (the user on the source side).
    pub maker: String,
    /// Address entitled to claim the source asset (the resolver).
    pub taker: String,
    pub maker_asset: String,
    pub taker_asset: String,
    pub making_amount: Amount,
    pub taking_amount: Amount,
    /// Hashlock as committed on the source chain.
    pub hashlock: Hashlock,
    /// Absent until generated by the resolver or revealed on a chain.
    pub preimage: Option<Preimage>,
    pub timelocks: Timelocks,
    pub src_escrow_address: Option<String>,
    pub dst_escrow_address: Option<String>,
    pub status: SwapStatus,
    /// Flags recording which escrow sides have been seen withdrawn or
    /// cancelled. COMPLETED requires both withdrawals; CANCELLED requires
    /// every funded side to be cancelled.
    pub src_withdrawn: bool,
    pub dst_withdrawn: bool,
    pub src_cancelled: bool,
    pub dst_cancelled: bool,
    pub src_funded: bool,
    pub dst_funded: bool,
    /// Set (and persisted) before the destination funding transaction is
    /// submitted, so a crash between submission and the Funded event can
    /// be reconciled against on-chain state instead of double-funding.
    pub dst_fund_submitted: bool,
    /// Last error string, surfaced through the status endpoint.
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Swap {
    /// Apply a status transition, enforcing monotonicity.
    pub fn transition(&mut self, next: SwapStatus, now: Timestamp) -> Result<(), ResolverError> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(ResolverError::BackwardTransition { from: self.status, to: next });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Monotone status bump: advances only if `next` outranks the current
    /// status. Out-of-order event arrival makes this a frequent no-op.
    pub fn advance_to(&mut self, next: SwapStatus, now: Timestamp) -> Result<bool, ResolverError> {
        if self.status.is_terminal() || next.rank() <= self.status.rank() {
            return Ok(false);
        }
        self.transition(next, now)?;
        Ok(true)
    }
}
