//! strait-ingest
//!
//! One [`EventIngestor`] per configured chain. Each runs a cooperative
//! poll loop that converts raw chain events into the canonical
//! [`EscrowEvent`] stream with at-least-once delivery: the checkpoint is
//! persisted only after the sink has accepted every event in the window,
//! so a crash re-delivers rather than drops. The sink is responsible for
//! idempotence.
//!
//! Reorg handling: the `(tx_id, log_index)` fingerprint of the last
//! processed height is re-polled before advancing; a mismatch rewinds the
//! checkpoint by the configured confirmation depth and re-emits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use strait_core::constants::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_WINDOW};
use strait_core::event::Checkpoint;
use strait_core::types::ChainId;
use strait_core::{EscrowEvent, ResolverError};
use strait_chain::ChainAdapter;
use strait_store::CheckpointStore;

/// Consumer of the canonical event stream. Implemented by the
/// orchestrator; invoked synchronously so checkpointing can wait on it.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn handle_event(&self, event: EscrowEvent) -> Result<(), ResolverError>;
}

/// Shared per-chain health flag, surfaced through the service status.
#[derive(Default)]
pub struct ChainHealth {
    degraded: AtomicBool,
}

impl ChainHealth {
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn set(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::Relaxed);
    }
}

#[derive(Clone, Debug)]
pub struct IngestorConfig {
    pub poll_interval: Duration,
    /// Heights per poll window.
    pub window: u64,
    /// Rewind depth after a detected reorg.
    pub confirmations: u64,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            window: DEFAULT_POLL_WINDOW,
            confirmations: 1,
        }
    }
}

pub struct EventIngestor {
    chain: ChainId,
    adapter: Arc<dyn ChainAdapter>,
    sink: Arc<dyn EventSink>,
    checkpoints: CheckpointStore,
    cfg: IngestorConfig,
    health: Arc<ChainHealth>,
}

impl EventIngestor {
    pub fn new(
        adapter: Arc<dyn ChainAdapter>,
        sink: Arc<dyn EventSink>,
        checkpoints: CheckpointStore,
        cfg: IngestorConfig,
    ) -> Self {
        let chain = adapter.chain_id();
        Self { chain, adapter, sink, checkpoints, cfg, health: Arc::new(ChainHealth::default()) }
    }

    pub fn health(&self) -> Arc<ChainHealth> {
        Arc::clone(&self.health)
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }

    /// One poll round: reorg check, then advance in bounded windows until
    /// the confirmable tip. Checkpoint moves only after sink success.
    pub async fn run_once(&self) -> Result<(), ResolverError> {
        let mut cp = self.checkpoints.load(self.chain)?;

        if self.detect_reorg(&cp).await? {
            cp = self.checkpoints.rewind(self.chain, self.cfg.confirmations)?;
            error!(chain = %self.chain, resume_from = cp.height, "reorg detected; checkpoint rewound");
        }

        let target = self.adapter.latest_height().await?;
        while cp.height < target {
            let from = cp.height + 1;
            let window_end = (cp.height + self.cfg.window).min(target);
            let events = self.adapter.poll_events(from, window_end).await?;

            for event in &events {
                debug!(
                    chain = %self.chain,
                    order = %event.order_hash,
                    kind = event.kind.as_str(),
                    height = event.height,
                    "delivering event"
                );
                self.sink.handle_event(event.clone()).await?;
            }

            cp = Checkpoint {
                height: window_end,
                fingerprint: events
                    .iter()
                    .filter(|e| e.height == window_end)
                    .map(|e| e.fingerprint())
                    .collect(),
            };
            self.checkpoints.advance(self.chain, &cp)?;
        }
        Ok(())
    }

    /// Re-poll the last processed height and compare fingerprints. A
    /// shallower reorg than the confirmation depth never surfaces here
    /// because heights are only polled once confirmable.
    async fn detect_reorg(&self, cp: &Checkpoint) -> Result<bool, ResolverError> {
        if cp.height == 0 || cp.fingerprint.is_empty() {
            return Ok(false);
        }
        let seen: Vec<_> = self
            .adapter
            .poll_events(cp.height, cp.height)
            .await?
            .iter()
            .map(|e| e.fingerprint())
            .collect();
        Ok(seen != cp.fingerprint)
    }

    /// The long-running loop. Persistent chain failure marks the chain
    /// degraded and keeps the loop alive; recovery clears the flag.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(chain = %self.chain, "event ingestor started");
        loop {
            match self.run_once().await {
                Ok(()) => {
                    if self.health.is_degraded() {
                        info!(chain = %self.chain, "chain recovered");
                    }
                    self.health.set(false);
                }
                Err(e) => {
                    warn!(chain = %self.chain, error = %e, "ingest round failed; chain degraded");
                    self.health.set(true);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.cfg.poll_interval) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(chain = %self.chain, "event ingestor stopping");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use strait_core::types::OrderHash;
    use strait_core::EscrowEventKind;
    use strait_chain::MockChain;
    use strait_store::SwapDb;

    /// Sink that records deliveries and can refuse them.
    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<EscrowEvent>>,
        fail_remaining: Mutex<u32>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn handle_event(&self, event: EscrowEvent) -> Result<(), ResolverError> {
            let mut failures = self.fail_remaining.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(ResolverError::Storage("sink unavailable".into()));
            }
            self.seen.lock().unwrap().push(event);
            Ok(())
        }
    }

    fn setup(
        confirmations: u64,
    ) -> (Arc<MockChain>, Arc<RecordingSink>, EventIngestor, Arc<SwapDb>) {
        let db = Arc::new(SwapDb::open_temporary().unwrap());
        let chain = Arc::new(MockChain::new(ChainId::Base));
        let sink = Arc::new(RecordingSink::default());
        let ingestor = EventIngestor::new(
            chain.clone(),
            sink.clone(),
            CheckpointStore::new(db.clone()),
            IngestorConfig { confirmations, ..Default::default() },
        );
        (chain, sink, ingestor, db)
    }

    #[tokio::test]
    async fn delivers_in_order_and_checkpoints() {
        let (chain, sink, ingestor, db) = setup(1);
        let order = OrderHash::from_bytes([1; 32]);
        chain.push_event(chain.make_event(order, 3, 0, EscrowEventKind::Created));
        chain.push_event(chain.make_event(order, 5, 0, EscrowEventKind::Funded));

        ingestor.run_once().await.unwrap();

        let seen = sink.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind, EscrowEventKind::Created);
        assert_eq!(seen[1].kind, EscrowEventKind::Funded);
        assert_eq!(db.get_checkpoint(ChainId::Base).unwrap().unwrap().height, 5);
    }

    #[tokio::test]
    async fn sink_failure_blocks_checkpoint_and_redelivers() {
        let (chain, sink, ingestor, db) = setup(1);
        let order = OrderHash::from_bytes([1; 32]);
        chain.push_event(chain.make_event(order, 2, 0, EscrowEventKind::Created));
        *sink.fail_remaining.lock().unwrap() = 1;

        assert!(ingestor.run_once().await.is_err());
        assert!(db.get_checkpoint(ChainId::Base).unwrap().is_none());

        // Next round redelivers the same event (at-least-once).
        ingestor.run_once().await.unwrap();
        let seen = sink.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(db.get_checkpoint(ChainId::Base).unwrap().unwrap().height, 2);
    }

    #[tokio::test]
    async fn reorg_rewinds_by_confirmation_depth() {
        let (chain, sink, ingestor, db) = setup(3);
        let order = OrderHash::from_bytes([1; 32]);
        chain.push_event(chain.make_event(order, 6, 0, EscrowEventKind::Created));
        ingestor.run_once().await.unwrap();
        assert_eq!(db.get_checkpoint(ChainId::Base).unwrap().unwrap().height, 6);

        // Different transaction at the processed height: a reorg.
        let mut replacement = chain.make_event(order, 6, 0, EscrowEventKind::Created);
        replacement.tx_id = "tx-after-reorg".into();
        chain.replace_events_at(6, vec![replacement]);

        ingestor.run_once().await.unwrap();
        // Rewound to 3, then re-advanced to the tip re-delivering the event.
        let seen = sink.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].tx_id, "tx-after-reorg");
        assert_eq!(db.get_checkpoint(ChainId::Base).unwrap().unwrap().height, 6);
    }

    #[tokio::test]
    async fn transport_failure_leaves_checkpoint_untouched() {
        let (chain, _sink, ingestor, db) = setup(1);
        let order = OrderHash::from_bytes([1; 32]);
        chain.push_event(chain.make_event(order, 4, 0, EscrowEventKind::Created));
        chain.fail_polls(1);

        assert!(ingestor.run_once().await.is_err());
        assert!(db.get_checkpoint(ChainId::Base).unwrap().is_none());

        ingestor.run_once().await.unwrap();
        assert_eq!(db.get_checkpoint(ChainId::Base).unwrap().unwrap().height, 4);
    }
}
