//! strait-service
//!
//! Process-wide lifecycle for the resolver.
//!
//! Startup sequence:
//!   1. Open (or initialise) the swap database
//!   2. Build the secret store, repository and timelock scheduler
//!   3. Recover: re-register schedules, reconcile outstanding submissions
//!   4. Start one event ingestor per configured chain
//!   5. Start the scheduler tick, timer consumer and retention GC tasks
//!   6. Start the intake RPC server
//!
//! `stop()` is graceful: intake refuses new orders, the shutdown signal
//! drains every task at its next suspension point, checkpoints and swap
//! records are flushed, and the RPC server is brought down.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use strait_core::constants::{DEFAULT_RETENTION_HORIZON_SECS, GC_INTERVAL_SECS};
use strait_core::types::ChainId;
use strait_chain::ChainAdapter;
use strait_ingest::{ChainHealth, EventIngestor, IngestorConfig};
use strait_orchestrator::{Orchestrator, OrchestratorDeps};
use strait_rpc::{RpcServer, RpcServerState, ServerHandle};
use strait_secrets::SecretStore;
use strait_store::{CheckpointStore, SwapDb, SwapRepository};
use strait_timelock::TimelockScheduler;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub listen_addr: SocketAddr,
    pub retention_horizon_secs: i64,
    /// Ingestion settings per chain; chains absent here fall back to
    /// `IngestorConfig::default()`.
    pub ingest: HashMap<ChainId, IngestorConfig>,
}

impl ServiceConfig {
    pub fn new(data_dir: PathBuf, listen_addr: SocketAddr) -> Self {
        Self {
            data_dir,
            listen_addr,
            retention_horizon_secs: DEFAULT_RETENTION_HORIZON_SECS,
            ingest: HashMap::new(),
        }
    }
}

/// Snapshot returned by [`ResolverService::status`].
#[derive(Clone, Debug)]
pub struct ServiceStatus {
    pub running: bool,
    pub active_swap_count: usize,
    pub chains: Vec<(ChainId, bool, u64)>,
}

pub struct ResolverService {
    db: Arc<SwapDb>,
    orchestrator: Arc<Orchestrator>,
    repo: SwapRepository,
    checkpoints: CheckpointStore,
    health: HashMap<ChainId, Arc<ChainHealth>>,
    running: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    rpc_handle: ServerHandle,
}

impl ResolverService {
    /// Wire everything and return once all subsystems are up. Any
    /// subsystem failing to start fails the whole call.
    pub async fn start(
        config: ServiceConfig,
        adapters: HashMap<ChainId, Arc<dyn ChainAdapter>>,
    ) -> anyhow::Result<Self> {
        let now = chrono::Utc::now().timestamp();

        // ── Storage ───────────────────────────────────────────────────────────
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
        let db = Arc::new(SwapDb::open(&config.data_dir).context("opening swap database")?);
        let repo = SwapRepository::new(db.clone());
        let secrets = SecretStore::new(db.clone());

        // ── Scheduler + orchestrator ──────────────────────────────────────────
        let (scheduler, timer_rx) = TimelockScheduler::new(1024);
        let scheduler = Arc::new(scheduler);
        let orchestrator = Arc::new(Orchestrator::new(OrchestratorDeps {
            repo: SwapRepository::new(db.clone()),
            secrets,
            scheduler: scheduler.clone(),
            adapters: adapters.clone(),
        }));
        orchestrator.recover(now).await.context("orchestrator recovery")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        // ── Scheduler tick ────────────────────────────────────────────────────
        {
            let scheduler = scheduler.clone();
            let rx = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move { scheduler.run(rx).await }));
        }

        // ── Timer consumer ────────────────────────────────────────────────────
        {
            let orchestrator = orchestrator.clone();
            let rx = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                orchestrator.run_timer_loop(timer_rx, rx).await
            }));
        }

        // ── Event ingestors, one per chain ────────────────────────────────────
        let mut health = HashMap::new();
        for (chain, adapter) in &adapters {
            let cfg = config.ingest.get(chain).cloned().unwrap_or_default();
            let ingestor = EventIngestor::new(
                adapter.clone(),
                orchestrator.clone(),
                CheckpointStore::new(db.clone()),
                cfg,
            );
            health.insert(*chain, ingestor.health());
            let rx = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move { ingestor.run(rx).await }));
        }

        // ── Retention GC ──────────────────────────────────────────────────────
        {
            let repo = SwapRepository::new(db.clone());
            let secrets = SecretStore::new(db.clone());
            let horizon = config.retention_horizon_secs;
            let mut rx = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(GC_INTERVAL_SECS)) => {}
                        _ = rx.changed() => {
                            if *rx.borrow() {
                                return;
                            }
                        }
                    }
                    let now = chrono::Utc::now().timestamp();
                    match repo.gc(now, horizon) {
                        Ok(0) => {}
                        Ok(n) => info!(removed = n, "retention gc removed terminal swaps"),
                        Err(e) => warn!(error = %e, "swap gc failed"),
                    }
                    if let Err(e) = secrets.gc(now, horizon) {
                        warn!(error = %e, "secret gc failed");
                    }
                }
            }));
        }

        // ── Intake RPC ────────────────────────────────────────────────────────
        let running = Arc::new(AtomicBool::new(true));
        let rpc_state = Arc::new(RpcServerState {
            orchestrator: orchestrator.clone(),
            repo: SwapRepository::new(db.clone()),
            checkpoints: CheckpointStore::new(db.clone()),
            health: health.clone(),
            running: running.clone(),
        });
        let rpc_handle = RpcServer::new(rpc_state)
            .start(config.listen_addr)
            .await
            .context("starting intake RPC server")?;

        info!(chains = adapters.len(), addr = %config.listen_addr, "resolver service ready");
        Ok(Self {
            checkpoints: CheckpointStore::new(db.clone()),
            db,
            orchestrator,
            repo,
            health,
            running,
            shutdown_tx,
            tasks,
            rpc_handle,
        })
    }

    /// Handle for submitting orders in-process (the RPC surface uses the
    /// same orchestrator).
    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        self.orchestrator.clone()
    }

    pub fn status(&self) -> ServiceStatus {
        let mut chains = Vec::with_capacity(self.health.len());
        for (chain, health) in &self.health {
            let height = self.checkpoints.load(*chain).map(|c| c.height).unwrap_or(0);
            chains.push((*chain, health.is_degraded(), height));
        }
        chains.sort_by_key(|(c, _, _)| *c);
        ServiceStatus {
            running: self.running.load(Ordering::Relaxed),
            active_swap_count: self.repo.active_count().unwrap_or(0),
            chains,
        }
    }

    /// Graceful shutdown: refuse new orders, drain tasks, flush storage,
    /// stop the RPC server.
    pub async fn stop(mut self) {
        info!("resolver service stopping");
        self.orchestrator.stop_accepting();
        self.running.store(false, Ordering::Relaxed);
        let _ = self.shutdown_tx.send(true);

        for result in futures::future::join_all(self.tasks.drain(..)).await {
            if let Err(e) = result {
                warn!(error = %e, "task join failed during shutdown");
            }
        }

        let _ = self.rpc_handle.stop();
        if let Err(e) = self.db.flush() {
            warn!(error = %e, "final flush failed");
        }
        info!("resolver service stopped");
    }
}
