use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use strait_core::constants::SCHEDULER_TICK_SECS;
use strait_core::timelocks::{TimelockStage, Timelocks, STAGES};
use strait_core::types::{OrderHash, Timestamp};
use strait_core::ResolverError;

/// A stage boundary was crossed for an order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimelockExpired {
    pub order_hash: OrderHash,
    pub stage: TimelockStage,
    pub deadline: Timestamp,
}

struct ScheduleEntry {
    timelocks: Timelocks,
    /// Stages emitted during this process lifetime. Cleared on restart so
    /// passed stages are synthesized again (at-least-once).
    emitted: BTreeSet<TimelockStage>,
}

/// Registry of per-order schedules plus the emission loop.
///
/// The interior mutex is a plain std lock: every critical section is a
/// short map operation with no suspension point inside.
pub struct TimelockScheduler {
    entries: Mutex<HashMap<OrderHash, ScheduleEntry>>,
    tx: mpsc::Sender<TimelockExpired>,
}

impl TimelockScheduler {
    /// Build the scheduler and the receiving end of its emission stream.
    pub fn new(channel_capacity: usize) -> (Self, mpsc::Receiver<TimelockExpired>) {
        let (tx, rx) = mpsc::channel(channel_capacity);
        (Self { entries: Mutex::new(HashMap::new()), tx }, rx)
    }

    /// Register (or re-register) an order's schedule.
    ///
    /// Idempotent for an identical schedule. A different schedule replaces
    /// the existing one only if every stage strictly advances; otherwise
    /// `StaleSchedule`.
    pub fn register(&self, order: OrderHash, timelocks: Timelocks) -> Result<(), ResolverError> {
        timelocks.validate()?;
        let mut entries = self.entries.lock().expect("scheduler lock poisoned");
        match entries.get_mut(&order) {
            None => {
                entries.insert(order, ScheduleEntry { timelocks, emitted: BTreeSet::new() });
                debug!(order = %order, "timelock schedule registered");
                Ok(())
            }
            Some(entry) if entry.timelocks == timelocks => Ok(()),
            Some(entry) if entry.timelocks.strictly_precedes(&timelocks) => {
                entry.timelocks = timelocks;
                entry.emitted.clear();
                info!(order = %order, "timelock schedule replaced");
                Ok(())
            }
            Some(_) => Err(ResolverError::StaleSchedule(order.to_hex())),
        }
    }

    /// Drop an order's schedule and cancel pending emissions.
    pub fn remove(&self, order: &OrderHash) {
        let mut entries = self.entries.lock().expect("scheduler lock poisoned");
        if entries.remove(order).is_some() {
            debug!(order = %order, "timelock schedule removed");
        }
    }

    /// Forget that `stage` was emitted so the next tick re-delivers it.
    /// Used by the consumer when acting on an expiry failed transiently.
    pub fn rearm(&self, order: &OrderHash, stage: TimelockStage) {
        let mut entries = self.entries.lock().expect("scheduler lock poisoned");
        if let Some(entry) = entries.get_mut(order) {
            entry.emitted.remove(&stage);
        }
    }

    /// Whether the deadline for `stage` has been reached at `now`.
    /// Unregistered orders allow nothing.
    pub fn is_allowed(&self, order: &OrderHash, stage: TimelockStage, now: Timestamp) -> bool {
        let entries = self.entries.lock().expect("scheduler lock poisoned");
        entries.get(order).map(|e| e.timelocks.is_open(stage, now)).unwrap_or(false)
    }

    pub fn registered_count(&self) -> usize {
        self.entries.lock().expect("scheduler lock poisoned").len()
    }

    /// Collect every stage whose deadline has passed and which has not yet
    /// been emitted this lifetime, in ascending deadline order. Marks them
    /// emitted.
    pub fn poll_due(&self, now: Timestamp) -> Vec<TimelockExpired> {
        let mut due = Vec::new();
        {
            let mut entries = self.entries.lock().expect("scheduler lock poisoned");
            for (order, entry) in entries.iter_mut() {
                for stage in STAGES {
                    if entry.emitted.contains(&stage) {
                        continue;
                    }
                    let deadline = entry.timelocks.deadline(stage);
                    if now >= deadline {
                        entry.emitted.insert(stage);
                        due.push(TimelockExpired { order_hash: *order, stage, deadline });
                    }
                }
            }
        }
        due.sort_by_key(|e| (e.deadline, e.order_hash, e.stage.index()));
        due
    }

    /// Seconds until the next unemitted deadline, if any.
    fn next_deadline_in(&self, now: Timestamp) -> Option<i64> {
        let entries = self.entries.lock().expect("scheduler lock poisoned");
        entries
            .values()
            .flat_map(|e| {
                STAGES
                    .iter()
                    .filter(|s| !e.emitted.contains(*s))
                    .map(|s| e.timelocks.deadline(*s) - now)
                    .collect::<Vec<_>>()
            })
            .min()
    }

    /// The emission loop: a periodic tick, shortened to a one-shot sleep
    /// whenever a deadline lands inside the tick window. On startup the
    /// first pass synthesizes everything that expired while down.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let now = chrono::Utc::now().timestamp();
            for expired in self.poll_due(now) {
                info!(
                    order = %expired.order_hash,
                    stage = %expired.stage,
                    "timelock stage expired"
                );
                if self.tx.send(expired).await.is_err() {
                    warn!("timelock consumer gone; scheduler stopping");
                    return;
                }
            }

            let sleep_secs = self
                .next_deadline_in(chrono::Utc::now().timestamp())
                .map(|d| d.clamp(0, SCHEDULER_TICK_SECS as i64) as u64)
                .unwrap_or(SCHEDULER_TICK_SECS);

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(sleep_secs.max(1))) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("timelock scheduler shutting down");
                        return;
                    }
                }
            }
        }
    }
}
