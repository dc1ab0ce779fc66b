//! strait-secrets
//!
//! Custody of swap preimages. Records are indexed both by order hash and by
//! either chain's hashlock, persist across restarts, and are garbage
//! collected only after the preimage has become public knowledge.
//!
//! The preimage is resolver-only until it appears on-chain: generated into
//! a zeroizing buffer, stored in the secrets tree, and handed out solely to
//! chain adapters building withdraw transactions.

use std::sync::Arc;

use tracing::{debug, info};

use strait_core::secret::SecretRecord;
use strait_core::types::{Hashlock, OrderHash, Preimage, Timestamp};
use strait_core::ResolverError;
use strait_crypto::hash::{keccak256, sha256};
use strait_store::SwapDb;

pub struct SecretStore {
    db: Arc<SwapDb>,
}

impl SecretStore {
    pub fn new(db: Arc<SwapDb>) -> Self {
        Self { db }
    }

    /// Draw a fresh preimage from the OS CSPRNG.
    pub fn generate(&self) -> Result<Preimage, ResolverError> {
        strait_crypto::random_preimage()
    }

    /// Bind `preimage` to `order`. Idempotent: rebinding the same preimage
    /// is a no-op returning the existing record; a different preimage fails
    /// with `AlreadyBound`. Exactly one preimage is ever bound per order.
    pub fn bind_to_order(
        &self,
        order: OrderHash,
        preimage: &Preimage,
        now: Timestamp,
    ) -> Result<SecretRecord, ResolverError> {
        let record = SecretRecord {
            order_hash: order,
            preimage: preimage.clone(),
            hashlock_keccak: Hashlock::from_bytes(keccak256(preimage.as_bytes())),
            hashlock_sha256: Hashlock::from_bytes(sha256(preimage.as_bytes())),
            created_at: now,
            revealed_at: None,
        };
        if self.db.insert_secret_if_absent(&record)? {
            debug!(order = %order, "bound new secret");
            return Ok(record);
        }
        // Lost the insert race or re-bound: accept only the identical preimage.
        let existing = self
            .db
            .get_secret(&order)?
            .ok_or_else(|| ResolverError::SecretNotFound(order.to_hex()))?;
        if existing.preimage != *preimage {
            return Err(ResolverError::AlreadyBound(order.to_hex()));
        }
        Ok(existing)
    }

    pub fn get_by_order(&self, order: &OrderHash) -> Result<Option<SecretRecord>, ResolverError> {
        self.db.get_secret(order)
    }

    /// Lookup by either chain's hashlock.
    pub fn get_by_hashlock(&self, lock: &Hashlock) -> Result<Option<SecretRecord>, ResolverError> {
        self.db.get_secret_by_hashlock(lock)
    }

    /// Record that `preimage` became publicly known for `order`.
    ///
    /// Creates the record if none exists (the counterparty generated the
    /// secret); otherwise verifies the bytes and sets `revealed_at` exactly
    /// once. Replayed calls with the same preimage are no-ops.
    pub fn record_reveal(
        &self,
        order: OrderHash,
        preimage: &Preimage,
        now: Timestamp,
    ) -> Result<SecretRecord, ResolverError> {
        match self.db.get_secret(&order)? {
            None => {
                let record = SecretRecord {
                    order_hash: order,
                    preimage: preimage.clone(),
                    hashlock_keccak: Hashlock::from_bytes(keccak256(preimage.as_bytes())),
                    hashlock_sha256: Hashlock::from_bytes(sha256(preimage.as_bytes())),
                    created_at: now,
                    revealed_at: Some(now),
                };
                self.db.put_secret(&record)?;
                info!(order = %order, "reveal recorded for externally generated secret");
                Ok(record)
            }
            Some(mut existing) => {
                if existing.preimage != *preimage {
                    return Err(ResolverError::PreimageMismatch(order.to_hex()));
                }
                if existing.revealed_at.is_none() {
                    existing.revealed_at = Some(now);
                    self.db.put_secret(&existing)?;
                    info!(order = %order, "secret marked revealed");
                }
                Ok(existing)
            }
        }
    }

    /// Drop records revealed before `now - older_than_secs`. Unrevealed
    /// records are never dropped — an unfinished swap may still need them.
    pub fn gc(&self, now: Timestamp, older_than_secs: i64) -> Result<usize, ResolverError> {
        let mut removed = 0;
        for record in self.db.iter_secrets()? {
            if let Some(revealed_at) = record.revealed_at {
                if now - revealed_at > older_than_secs {
                    self.db.remove_secret(&record.order_hash)?;
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            debug!(removed, "secret gc sweep");
        }
        Ok(removed)
    }
}
