use std::sync::Arc;

use strait_core::event::Checkpoint;
use strait_core::swap::{Swap, SwapStatus};
use strait_core::types::{ChainId, OrderHash, Timestamp};
use strait_core::ResolverError;

use crate::db::SwapDb;

// ── SwapRepository ───────────────────────────────────────────────────────────

/// Swap record lifecycle over the shared database.
///
/// Concurrent updaters of the same order are serialized by the
/// orchestrator's per-order lock; the repository still rejects stale and
/// backward updates so a bug upstream cannot corrupt a record.
pub struct SwapRepository {
    db: Arc<SwapDb>,
}

impl SwapRepository {
    pub fn new(db: Arc<SwapDb>) -> Self {
        Self { db }
    }

    /// Persist a new swap. `DuplicateOrder` if the order hash exists.
    pub fn create(&self, swap: &Swap) -> Result<(), ResolverError> {
        if !self.db.insert_swap_if_absent(swap)? {
            return Err(ResolverError::DuplicateOrder(swap.order_hash.to_hex()));
        }
        Ok(())
    }

    pub fn find_by_order_hash(&self, order: &OrderHash) -> Result<Option<Swap>, ResolverError> {
        self.db.get_swap(order)
    }

    /// Compare-and-swap update. `expected_updated_at` must match the stored
    /// record; the status transition must not move backwards.
    pub fn update(&self, swap: &Swap, expected_updated_at: Timestamp) -> Result<(), ResolverError> {
        let current = self
            .db
            .get_swap(&swap.order_hash)?
            .ok_or_else(|| ResolverError::SwapNotFound(swap.order_hash.to_hex()))?;

        if current.updated_at != expected_updated_at {
            return Err(ResolverError::StaleUpdate {
                expected: expected_updated_at,
                found: current.updated_at,
            });
        }
        if current.status != swap.status && !current.status.can_transition_to(swap.status) {
            return Err(ResolverError::BackwardTransition {
                from: current.status,
                to: swap.status,
            });
        }
        if !self.db.compare_and_swap_swap(&current, swap)? {
            return Err(ResolverError::StaleUpdate {
                expected: expected_updated_at,
                found: current.updated_at,
            });
        }
        Ok(())
    }

    pub fn list_by_status(&self, status: SwapStatus) -> Result<Vec<Swap>, ResolverError> {
        Ok(self.db.iter_swaps()?.into_iter().filter(|s| s.status == status).collect())
    }

    /// Every swap that has not reached a terminal state.
    pub fn list_active(&self) -> Result<Vec<Swap>, ResolverError> {
        Ok(self.db.iter_swaps()?.into_iter().filter(|s| !s.status.is_terminal()).collect())
    }

    pub fn active_count(&self) -> Result<usize, ResolverError> {
        Ok(self.list_active()?.len())
    }

    /// Drop terminal swaps whose last update is older than the horizon.
    /// Returns how many records were removed.
    pub fn gc(&self, now: Timestamp, horizon_secs: i64) -> Result<usize, ResolverError> {
        let mut removed = 0;
        for swap in self.db.iter_swaps()? {
            if swap.status.is_terminal() && now - swap.updated_at > horizon_secs {
                self.db.remove_swap(&swap.order_hash)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

// ── CheckpointStore ──────────────────────────────────────────────────────────

/// Per-chain ingestion markers. Heights only move forward, except for an
/// explicit reorg rewind.
pub struct CheckpointStore {
    db: Arc<SwapDb>,
}

impl CheckpointStore {
    pub fn new(db: Arc<SwapDb>) -> Self {
        Self { db }
    }

    /// The stored checkpoint, or height 0 on first start.
    pub fn load(&self, chain: ChainId) -> Result<Checkpoint, ResolverError> {
        Ok(self.db.get_checkpoint(chain)?.unwrap_or_default())
    }

    /// Advance the checkpoint. Refuses to move backwards.
    pub fn advance(&self, chain: ChainId, cp: &Checkpoint) -> Result<(), ResolverError> {
        let current = self.load(chain)?;
        if cp.height < current.height {
            return Err(ResolverError::Storage(format!(
                "checkpoint for {chain} would move backwards: {} -> {}",
                current.height, cp.height
            )));
        }
        self.db.put_checkpoint(chain, cp)
    }

    /// Reorg rewind: move the checkpoint back by `depth` heights and clear
    /// the stored fingerprint so re-polled events are re-delivered.
    pub fn rewind(&self, chain: ChainId, depth: u64) -> Result<Checkpoint, ResolverError> {
        let current = self.load(chain)?;
        let rewound = Checkpoint {
            height: current.height.saturating_sub(depth),
            fingerprint: Vec::new(),
        };
        self.db.put_checkpoint(chain, &rewound)?;
        Ok(rewound)
    }
}
