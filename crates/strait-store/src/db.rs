use std::path::Path;

use strait_core::event::Checkpoint;
use strait_core::secret::SecretRecord;
use strait_core::swap::Swap;
use strait_core::types::{ChainId, Hashlock, OrderHash};
use strait_core::ResolverError;

/// Persistent resolver database backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   swaps              — OrderHash bytes  → bincode(Swap)
///   checkpoints        — chain id utf8    → bincode(Checkpoint)
///   secrets            — OrderHash bytes  → bincode(SecretRecord)
///   secrets_by_lock    — Hashlock bytes   → OrderHash bytes (index; both the
///                        keccak and sha256 hashlocks of a record point here)
pub struct SwapDb {
    _db: sled::Db,
    swaps: sled::Tree,
    checkpoints: sled::Tree,
    secrets: sled::Tree,
    secrets_by_lock: sled::Tree,
}

fn storage_err(e: sled::Error) -> ResolverError {
    ResolverError::Storage(e.to_string())
}

fn codec_err(e: bincode::Error) -> ResolverError {
    ResolverError::Serialization(e.to_string())
}

impl SwapDb {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ResolverError> {
        let db = sled::open(path).map_err(storage_err)?;
        let swaps = db.open_tree("swaps").map_err(storage_err)?;
        let checkpoints = db.open_tree("checkpoints").map_err(storage_err)?;
        let secrets = db.open_tree("secrets").map_err(storage_err)?;
        let secrets_by_lock = db.open_tree("secrets_by_lock").map_err(storage_err)?;
        Ok(Self { _db: db, swaps, checkpoints, secrets, secrets_by_lock })
    }

    /// Open a throwaway database in a fresh temporary location. Test-only
    /// convenience; data is dropped with the handle.
    pub fn open_temporary() -> Result<Self, ResolverError> {
        let db = sled::Config::new().temporary(true).open().map_err(storage_err)?;
        let swaps = db.open_tree("swaps").map_err(storage_err)?;
        let checkpoints = db.open_tree("checkpoints").map_err(storage_err)?;
        let secrets = db.open_tree("secrets").map_err(storage_err)?;
        let secrets_by_lock = db.open_tree("secrets_by_lock").map_err(storage_err)?;
        Ok(Self { _db: db, swaps, checkpoints, secrets, secrets_by_lock })
    }

    // ── Swaps ────────────────────────────────────────────────────────────────

    pub fn get_swap(&self, order: &OrderHash) -> Result<Option<Swap>, ResolverError> {
        match self.swaps.get(order.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(codec_err)?)),
            None => Ok(None),
        }
    }

    pub fn swap_exists(&self, order: &OrderHash) -> bool {
        self.swaps.contains_key(order.as_bytes()).unwrap_or(false)
    }

    /// Unconditional write. Callers wanting atomicity use
    /// [`SwapDb::compare_and_swap_swap`] via the repository.
    pub fn put_swap(&self, swap: &Swap) -> Result<(), ResolverError> {
        let bytes = bincode::serialize(swap).map_err(codec_err)?;
        self.swaps.insert(swap.order_hash.as_bytes(), bytes).map_err(storage_err)?;
        Ok(())
    }

    /// Insert only if absent. Returns false when the key already exists.
    pub fn insert_swap_if_absent(&self, swap: &Swap) -> Result<bool, ResolverError> {
        let bytes = bincode::serialize(swap).map_err(codec_err)?;
        let outcome = self
            .swaps
            .compare_and_swap(swap.order_hash.as_bytes(), None::<&[u8]>, Some(bytes))
            .map_err(storage_err)?;
        Ok(outcome.is_ok())
    }

    /// Atomic replace of `old` with `new`. Returns false if the stored
    /// value no longer matches `old`.
    pub fn compare_and_swap_swap(&self, old: &Swap, new: &Swap) -> Result<bool, ResolverError> {
        let old_bytes = bincode::serialize(old).map_err(codec_err)?;
        let new_bytes = bincode::serialize(new).map_err(codec_err)?;
        let outcome = self
            .swaps
            .compare_and_swap(
                new.order_hash.as_bytes(),
                Some(old_bytes.as_slice()),
                Some(new_bytes),
            )
            .map_err(storage_err)?;
        Ok(outcome.is_ok())
    }

    pub fn remove_swap(&self, order: &OrderHash) -> Result<(), ResolverError> {
        self.swaps.remove(order.as_bytes()).map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_swaps(&self) -> Result<Vec<Swap>, ResolverError> {
        let mut out = Vec::new();
        for item in self.swaps.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(codec_err)?);
        }
        Ok(out)
    }

    pub fn count_swaps(&self) -> u64 {
        self.swaps.len() as u64
    }

    // ── Checkpoints ──────────────────────────────────────────────────────────

    pub fn get_checkpoint(&self, chain: ChainId) -> Result<Option<Checkpoint>, ResolverError> {
        match self.checkpoints.get(chain.as_str().as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(codec_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_checkpoint(&self, chain: ChainId, cp: &Checkpoint) -> Result<(), ResolverError> {
        let bytes = bincode::serialize(cp).map_err(codec_err)?;
        self.checkpoints.insert(chain.as_str().as_bytes(), bytes).map_err(storage_err)?;
        Ok(())
    }

    // ── Secrets ──────────────────────────────────────────────────────────────

    pub fn get_secret(&self, order: &OrderHash) -> Result<Option<SecretRecord>, ResolverError> {
        match self.secrets.get(order.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(codec_err)?)),
            None => Ok(None),
        }
    }

    pub fn get_secret_by_hashlock(
        &self,
        lock: &Hashlock,
    ) -> Result<Option<SecretRecord>, ResolverError> {
        let Some(order_bytes) = self.secrets_by_lock.get(lock.as_bytes()).map_err(storage_err)?
        else {
            return Ok(None);
        };
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&order_bytes);
        self.get_secret(&OrderHash::from_bytes(arr))
    }

    /// Insert a record only if no record exists for its order hash.
    /// Returns false when one already exists (the caller decides whether
    /// that is idempotent success or a conflict).
    pub fn insert_secret_if_absent(&self, record: &SecretRecord) -> Result<bool, ResolverError> {
        let bytes = bincode::serialize(record).map_err(codec_err)?;
        let outcome = self
            .secrets
            .compare_and_swap(record.order_hash.as_bytes(), None::<&[u8]>, Some(bytes))
            .map_err(storage_err)?;
        if outcome.is_ok() {
            self.index_secret(record)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Unconditional overwrite of an existing record (reveal timestamps).
    pub fn put_secret(&self, record: &SecretRecord) -> Result<(), ResolverError> {
        let bytes = bincode::serialize(record).map_err(codec_err)?;
        self.secrets.insert(record.order_hash.as_bytes(), bytes).map_err(storage_err)?;
        self.index_secret(record)?;
        Ok(())
    }

    fn index_secret(&self, record: &SecretRecord) -> Result<(), ResolverError> {
        for lock in [&record.hashlock_keccak, &record.hashlock_sha256] {
            self.secrets_by_lock
                .insert(lock.as_bytes(), record.order_hash.as_bytes().as_slice())
                .map_err(storage_err)?;
        }
        Ok(())
    }

    pub fn remove_secret(&self, order: &OrderHash) -> Result<(), ResolverError> {
        if let Some(record) = self.get_secret(order)? {
            for lock in [&record.hashlock_keccak, &record.hashlock_sha256] {
                self.secrets_by_lock.remove(lock.as_bytes()).map_err(storage_err)?;
            }
        }
        self.secrets.remove(order.as_bytes()).map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_secrets(&self) -> Result<Vec<SecretRecord>, ResolverError> {
        let mut out = Vec::new();
        for item in self.secrets.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(codec_err)?);
        }
        Ok(out)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), ResolverError> {
        self._db.flush().map_err(storage_err)?;
        Ok(())
    }
}
