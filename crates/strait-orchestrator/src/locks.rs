use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use strait_core::types::OrderHash;

/// Per-order async mutexes.
///
/// The registry itself is guarded by a short std lock; the returned
/// handles are tokio mutexes safe to hold across suspension points —
/// holding one pauses a single swap's progress, never the whole service.
#[derive(Default)]
pub struct OrderLocks {
    inner: Mutex<HashMap<OrderHash, Arc<tokio::sync::Mutex<()>>>>,
}

impl OrderLocks {
    pub fn lock_for(&self, order: OrderHash) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("order lock registry poisoned");
        Arc::clone(map.entry(order).or_default())
    }

    /// Drop the entry for a finished order. Outstanding handles stay valid.
    pub fn release(&self, order: &OrderHash) {
        let mut map = self.inner.lock().expect("order lock registry poisoned");
        map.remove(order);
    }
}
