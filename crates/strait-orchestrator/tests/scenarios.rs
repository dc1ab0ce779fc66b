//! End-to-end swap scenarios driven through mock chain adapters.
//!
//! Every handler call takes an explicit `now`, so the clock is synthetic:
//! timer expiries come from `TimelockScheduler::poll_due(now)` and event
//! arrival instants are chosen per scenario.

use std::collections::HashMap;
use std::sync::Arc;

use strait_core::order::OrderIntent;
use strait_core::swap::{Swap, SwapStatus};
use strait_core::timelocks::Timelocks;
use strait_core::types::{ChainId, Hashlock, OrderHash, Preimage, Timestamp};
use strait_core::{EscrowEventKind, ResolverError};
use strait_chain::{ChainAdapter, EscrowStatus, MockChain};
use strait_crypto::{keccak256, sha256};
use strait_orchestrator::{Orchestrator, OrchestratorDeps};
use strait_secrets::SecretStore;
use strait_store::{SwapDb, SwapRepository};
use strait_timelock::TimelockScheduler;

const T0: Timestamp = 1_700_000_000;

// ── Harness ───────────────────────────────────────────────────────────────────

struct Harness {
    db: Arc<SwapDb>,
    base: Arc<MockChain>,
    stellar: Arc<MockChain>,
    scheduler: Arc<TimelockScheduler>,
    orch: Arc<Orchestrator>,
}

impl Harness {
    fn new() -> Self {
        Self::with_db(Arc::new(SwapDb::open_temporary().unwrap()))
    }

    fn with_db(db: Arc<SwapDb>) -> Self {
        let base = Arc::new(MockChain::new(ChainId::Base));
        let stellar = Arc::new(MockChain::new(ChainId::Stellar));
        let (scheduler, _rx) = TimelockScheduler::new(256);
        let scheduler = Arc::new(scheduler);

        let mut adapters: HashMap<ChainId, Arc<dyn ChainAdapter>> = HashMap::new();
        adapters.insert(ChainId::Base, base.clone());
        adapters.insert(ChainId::Stellar, stellar.clone());

        let orch = Arc::new(Orchestrator::new(OrchestratorDeps {
            repo: SwapRepository::new(db.clone()),
            secrets: SecretStore::new(db.clone()),
            scheduler: scheduler.clone(),
            adapters,
        }));
        Self { db, base, stellar, scheduler, orch }
    }

    fn secrets(&self) -> SecretStore {
        SecretStore::new(self.db.clone())
    }

    fn swap(&self, order: &OrderHash) -> Swap {
        self.db.get_swap(order).unwrap().expect("swap exists")
    }

    /// Deliver every due timer expiry at `now`, in deadline order.
    async fn fire_timers(&self, now: Timestamp) {
        for expired in self.scheduler.poll_due(now) {
            self.orch.handle_timer_at(expired, now).await.unwrap();
        }
    }
}

/// A schedule anchored at T0:
///   dst: withdrawal +100, public +200, cancellation +400, public +500
///   src: withdrawal +150, public +250, cancellation +600, public +700
fn timelocks() -> Timelocks {
    Timelocks {
        src_withdrawal: T0 + 150,
        src_public_withdrawal: T0 + 250,
        src_cancellation: T0 + 600,
        src_public_cancellation: T0 + 700,
        dst_withdrawal: T0 + 100,
        dst_public_withdrawal: T0 + 200,
        dst_cancellation: T0 + 400,
        dst_public_cancellation: T0 + 500,
    }
}

fn evm_addr(fill: char) -> String {
    format!("0x{}", fill.to_string().repeat(40))
}

fn stellar_addr() -> String {
    format!("G{}", "A".repeat(55))
}

/// EVM→Stellar intent: 1 USDC for 1 XLM-equivalent.
fn base_to_stellar_intent(hashlock: Option<Hashlock>) -> OrderIntent {
    OrderIntent {
        src_chain: ChainId::Base,
        dst_chain: ChainId::Stellar,
        maker: evm_addr('1'),
        taker: stellar_addr(),
        maker_asset: evm_addr('3'),
        taker_asset: "native".into(),
        making_amount: "1000000".into(),
        taking_amount: "10000000".into(),
        hashlock,
        timelocks: timelocks(),
    }
}

fn stellar_to_base_intent(hashlock: Option<Hashlock>) -> OrderIntent {
    OrderIntent {
        src_chain: ChainId::Stellar,
        dst_chain: ChainId::Base,
        maker: stellar_addr(),
        taker: evm_addr('2'),
        maker_asset: "native".into(),
        taker_asset: evm_addr('3'),
        making_amount: "10000000".into(),
        taking_amount: "1000000".into(),
        hashlock,
        timelocks: timelocks(),
    }
}

fn preimage_11() -> Preimage {
    Preimage::from_bytes([0x11; 32])
}

// ── Scenario 1: happy path EVM → Stellar ─────────────────────────────────────

#[tokio::test]
async fn happy_path_evm_to_stellar() {
    let h = Harness::new();
    let preimage = preimage_11();
    let hashlock = Hashlock::from_bytes(keccak256(preimage.as_bytes()));

    // ── 1. Submit ─────────────────────────────────────────────────────────────
    let (order, status) =
        h.orch.submit_order(base_to_stellar_intent(Some(hashlock)), T0).await.unwrap();
    assert_eq!(status, SwapStatus::Created);

    // ── 2. Source escrow appears and is funded ───────────────────────────────
    h.orch
        .handle_event_at(h.base.make_event(order, 10, 0, EscrowEventKind::Created), T0 + 10)
        .await
        .unwrap();
    assert_eq!(h.swap(&order).status, SwapStatus::SourceDeployed);
    assert_eq!(h.stellar.deployed().len(), 1, "counter-deployment submitted");
    assert_eq!(h.stellar.deployed()[0].hashlock, hashlock, "external hashlock passes through");

    h.orch
        .handle_event_at(h.base.make_event(order, 11, 0, EscrowEventKind::Funded), T0 + 20)
        .await
        .unwrap();
    assert_eq!(h.swap(&order).status, SwapStatus::SourceFunded);

    // ── 3. Destination escrow confirmed; resolver funds it ──────────────────
    h.orch
        .handle_event_at(h.stellar.make_event(order, 20, 0, EscrowEventKind::Created), T0 + 30)
        .await
        .unwrap();
    assert_eq!(h.swap(&order).status, SwapStatus::DestinationDeployed);
    assert_eq!(h.stellar.fundings().len(), 1);

    h.orch
        .handle_event_at(h.stellar.make_event(order, 21, 0, EscrowEventKind::Funded), T0 + 40)
        .await
        .unwrap();
    assert_eq!(h.swap(&order).status, SwapStatus::DestinationFunded);

    // ── 4. User claims on destination, revealing the secret ──────────────────
    h.orch
        .handle_event_at(
            h.stellar.make_event(
                order,
                22,
                0,
                EscrowEventKind::SecretRevealed { preimage: preimage.clone() },
            ),
            T0 + 300,
        )
        .await
        .unwrap();
    assert_eq!(h.swap(&order).status, SwapStatus::SecretRevealed);
    let withdrawals = h.base.withdrawals();
    assert_eq!(withdrawals.len(), 1, "source claim submitted immediately");
    assert_eq!(withdrawals[0].1, preimage);

    // ── 5. Both withdrawals confirm ──────────────────────────────────────────
    h.orch
        .handle_event_at(h.base.make_event(order, 12, 0, EscrowEventKind::Withdrawn), T0 + 310)
        .await
        .unwrap();
    h.orch
        .handle_event_at(h.stellar.make_event(order, 23, 0, EscrowEventKind::Withdrawn), T0 + 320)
        .await
        .unwrap();

    let done = h.swap(&order);
    assert_eq!(done.status, SwapStatus::Completed);
    assert!(done.src_withdrawn && done.dst_withdrawn);

    // Secret store shows the reveal.
    let record = h.secrets().get_by_order(&order).unwrap().unwrap();
    assert_eq!(record.revealed_at, Some(T0 + 300));

    // Both escrows are withdrawn on-chain.
    let src_escrow = done.src_escrow_address.unwrap();
    let dst_escrow = done.dst_escrow_address.unwrap();
    assert_eq!(h.base.escrow_status(&src_escrow), Some(EscrowStatus::Withdrawn));
    assert_eq!(h.stellar.escrow_status(&dst_escrow), Some(EscrowStatus::Withdrawn));
    assert!(h.base.cancels().is_empty() && h.stellar.cancels().is_empty());
}

// ── Scenario 2: happy path Stellar → EVM ─────────────────────────────────────

#[tokio::test]
async fn happy_path_stellar_to_evm() {
    let h = Harness::new();
    let preimage = preimage_11();
    // Source is Stellar, so the committed hashlock is the SHA-256 form.
    let hashlock = Hashlock::from_bytes(sha256(preimage.as_bytes()));

    let (order, _) =
        h.orch.submit_order(stellar_to_base_intent(Some(hashlock)), T0).await.unwrap();

    h.orch
        .handle_event_at(h.stellar.make_event(order, 10, 0, EscrowEventKind::Created), T0 + 10)
        .await
        .unwrap();
    assert_eq!(h.base.deployed().len(), 1, "EVM counter-deployment submitted");

    h.orch
        .handle_event_at(h.stellar.make_event(order, 11, 0, EscrowEventKind::Funded), T0 + 20)
        .await
        .unwrap();
    h.orch
        .handle_event_at(h.base.make_event(order, 20, 0, EscrowEventKind::Created), T0 + 30)
        .await
        .unwrap();
    assert_eq!(h.base.fundings().len(), 1);
    h.orch
        .handle_event_at(h.base.make_event(order, 21, 0, EscrowEventKind::Funded), T0 + 40)
        .await
        .unwrap();

    // User claims on the EVM destination; resolver claims Stellar source.
    h.orch
        .handle_event_at(
            h.base.make_event(
                order,
                22,
                0,
                EscrowEventKind::SecretRevealed { preimage: preimage.clone() },
            ),
            T0 + 300,
        )
        .await
        .unwrap();
    assert_eq!(h.stellar.withdrawals().len(), 1);

    h.orch
        .handle_event_at(h.stellar.make_event(order, 12, 0, EscrowEventKind::Withdrawn), T0 + 310)
        .await
        .unwrap();
    h.orch
        .handle_event_at(h.base.make_event(order, 23, 0, EscrowEventKind::Withdrawn), T0 + 320)
        .await
        .unwrap();

    assert_eq!(h.swap(&order).status, SwapStatus::Completed);
}

// ── Scenario 3: destination never funded ─────────────────────────────────────

#[tokio::test]
async fn destination_never_funded_cancels_both_sides() {
    let h = Harness::new();
    let hashlock = Hashlock::from_bytes(keccak256(preimage_11().as_bytes()));
    let (order, _) =
        h.orch.submit_order(base_to_stellar_intent(Some(hashlock)), T0).await.unwrap();

    h.orch
        .handle_event_at(h.base.make_event(order, 10, 0, EscrowEventKind::Created), T0 + 10)
        .await
        .unwrap();
    h.orch
        .handle_event_at(h.base.make_event(order, 11, 0, EscrowEventKind::Funded), T0 + 20)
        .await
        .unwrap();
    h.orch
        .handle_event_at(h.stellar.make_event(order, 20, 0, EscrowEventKind::Created), T0 + 30)
        .await
        .unwrap();
    // The Funded(stellar) event never arrives.

    // ── Clock passes dst_cancellation ────────────────────────────────────────
    h.fire_timers(T0 + 401).await;
    assert_eq!(h.stellar.cancels().len(), 1, "destination cancelled first");
    assert!(h.base.cancels().is_empty(), "source window not open yet");

    h.orch
        .handle_event_at(h.stellar.make_event(order, 21, 0, EscrowEventKind::Cancelled), T0 + 410)
        .await
        .unwrap();
    assert!(!h.swap(&order).status.is_terminal(), "source still exposed");

    // ── Clock passes src_cancellation ────────────────────────────────────────
    h.fire_timers(T0 + 601).await;
    assert_eq!(h.base.cancels().len(), 1, "source cancelled after its deadline");

    h.orch
        .handle_event_at(h.base.make_event(order, 12, 0, EscrowEventKind::Cancelled), T0 + 610)
        .await
        .unwrap();

    let done = h.swap(&order);
    assert_eq!(done.status, SwapStatus::Cancelled);
    assert!(h.base.withdrawals().is_empty() && h.stellar.withdrawals().is_empty());
}

// ── Scenario 4: late reveal race ─────────────────────────────────────────────

#[tokio::test]
async fn late_reveal_wins_over_cancellation() {
    let h = Harness::new();
    let preimage = preimage_11();
    let hashlock = Hashlock::from_bytes(keccak256(preimage.as_bytes()));
    let (order, _) =
        h.orch.submit_order(base_to_stellar_intent(Some(hashlock)), T0).await.unwrap();

    for (chain, height, kind) in [
        (&h.base, 10, EscrowEventKind::Created),
        (&h.base, 11, EscrowEventKind::Funded),
        (&h.stellar, 20, EscrowEventKind::Created),
        (&h.stellar, 21, EscrowEventKind::Funded),
    ] {
        h.orch
            .handle_event_at(chain.make_event(order, height, 0, kind), T0 + 40)
            .await
            .unwrap();
    }

    // ── Reveal one second before src_cancellation ────────────────────────────
    h.orch
        .handle_event_at(
            h.stellar.make_event(
                order,
                22,
                0,
                EscrowEventKind::SecretRevealed { preimage: preimage.clone() },
            ),
            T0 + 599,
        )
        .await
        .unwrap();
    assert_eq!(h.base.withdrawals().len(), 1, "claim submitted inside the window");

    // The cancellation timer fires a second later and must do nothing.
    h.fire_timers(T0 + 600).await;
    assert!(h.base.cancels().is_empty());
    assert!(h.stellar.cancels().is_empty());

    h.orch
        .handle_event_at(h.base.make_event(order, 12, 0, EscrowEventKind::Withdrawn), T0 + 601)
        .await
        .unwrap();
    h.orch
        .handle_event_at(h.stellar.make_event(order, 23, 0, EscrowEventKind::Withdrawn), T0 + 602)
        .await
        .unwrap();
    assert_eq!(h.swap(&order).status, SwapStatus::Completed);
}

// ── Scenario 5: hashlock mismatch attack ─────────────────────────────────────

#[tokio::test]
async fn hashlock_mismatch_fails_swap_without_claiming() {
    let h = Harness::new();
    let hashlock = Hashlock::from_bytes(keccak256(preimage_11().as_bytes()));
    let (order, _) =
        h.orch.submit_order(base_to_stellar_intent(Some(hashlock)), T0).await.unwrap();

    for (chain, height, kind) in [
        (&h.base, 10, EscrowEventKind::Created),
        (&h.base, 11, EscrowEventKind::Funded),
        (&h.stellar, 20, EscrowEventKind::Created),
        (&h.stellar, 21, EscrowEventKind::Funded),
    ] {
        h.orch
            .handle_event_at(chain.make_event(order, height, 0, kind), T0 + 40)
            .await
            .unwrap();
    }

    // A reveal whose bytes do not hash to the committed lock.
    h.orch
        .handle_event_at(
            h.stellar.make_event(
                order,
                22,
                0,
                EscrowEventKind::SecretRevealed { preimage: Preimage::from_bytes([0xde; 32]) },
            ),
            T0 + 300,
        )
        .await
        .unwrap();

    let done = h.swap(&order);
    assert_eq!(done.status, SwapStatus::Failed);
    assert!(done.last_error.unwrap().contains("hashlock"));
    assert!(h.base.withdrawals().is_empty(), "no source claim for a bad secret");
}

// ── Scenario 6: restart mid-flight ───────────────────────────────────────────

/// Full-stack restart: events flow through real ingestors with durable
/// checkpoints; the process dies after three events and a fresh one
/// finishes the swap without duplicating any submission.
#[tokio::test]
async fn restart_mid_flight_converges_to_completed() {
    use strait_ingest::{EventIngestor, IngestorConfig};
    use strait_store::CheckpointStore;

    // Wall-clock anchored schedule: withdraw windows already open, the
    // cancellation deadlines comfortably ahead.
    let t0 = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as Timestamp
        - 200;

    let mut intent = base_to_stellar_intent(None);
    intent.timelocks = Timelocks {
        src_withdrawal: t0 + 150,
        src_public_withdrawal: t0 + 250,
        src_cancellation: t0 + 6_000,
        src_public_cancellation: t0 + 7_000,
        dst_withdrawal: t0 + 100,
        dst_public_withdrawal: t0 + 200,
        dst_cancellation: t0 + 4_000,
        dst_public_cancellation: t0 + 5_000,
    };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state");
    let order;
    let preimage;

    let ingestor = |h: &Harness, chain: &Arc<MockChain>| {
        EventIngestor::new(
            chain.clone(),
            h.orch.clone(),
            CheckpointStore::new(h.db.clone()),
            IngestorConfig::default(),
        )
    };

    // ── Phase 1: process killed after three events ───────────────────────────
    {
        let h = Harness::with_db(Arc::new(SwapDb::open(&path).unwrap()));
        // Resolver-generated secret (no hashlock supplied).
        let (o, _) = h.orch.submit_order(intent.clone(), t0).await.unwrap();
        order = o;
        preimage = h.secrets().get_by_order(&order).unwrap().unwrap().preimage;

        h.base.push_event(h.base.make_event(order, 10, 0, EscrowEventKind::Created));
        h.base.push_event(h.base.make_event(order, 11, 0, EscrowEventKind::Funded));
        ingestor(&h, &h.base).run_once().await.unwrap();

        h.stellar.push_event(h.stellar.make_event(order, 20, 0, EscrowEventKind::Created));
        ingestor(&h, &h.stellar).run_once().await.unwrap();

        assert_eq!(h.stellar.deployed().len(), 1);
        assert_eq!(h.stellar.fundings().len(), 1);
        assert_eq!(h.db.get_checkpoint(ChainId::Base).unwrap().unwrap().height, 11);
        assert_eq!(h.db.get_checkpoint(ChainId::Stellar).unwrap().unwrap().height, 20);
        h.db.flush().unwrap();
        // Process dies here.
    }

    // ── Phase 2: fresh process over the same database ────────────────────────
    {
        let h = Harness::with_db(Arc::new(SwapDb::open(&path).unwrap()));
        let dst_escrow = h.swap(&order).dst_escrow_address.clone().unwrap();

        // Chain history survives the restart; new ledger entries follow.
        h.base.push_event(h.base.make_event(order, 10, 0, EscrowEventKind::Created));
        h.base.push_event(h.base.make_event(order, 11, 0, EscrowEventKind::Funded));
        h.stellar.push_event(h.stellar.make_event(order, 20, 0, EscrowEventKind::Created));
        h.stellar.push_event(h.stellar.make_event(order, 21, 0, EscrowEventKind::Funded));
        h.stellar.push_event(h.stellar.make_event(
            order,
            22,
            0,
            EscrowEventKind::SecretRevealed { preimage: preimage.clone() },
        ));

        h.orch.recover(t0 + 200).await.unwrap();
        assert!(
            h.stellar.deployed().is_empty(),
            "no duplicate destination deployment after restart"
        );
        assert!(
            h.stellar.fundings().is_empty(),
            "funded escrow is not funded again after restart"
        );
        assert_eq!(h.stellar.escrow_status(&dst_escrow), Some(EscrowStatus::Funded));

        // Checkpoints skip everything already processed.
        ingestor(&h, &h.base).run_once().await.unwrap();
        ingestor(&h, &h.stellar).run_once().await.unwrap();
        assert_eq!(h.base.withdrawals().len(), 1, "source claim follows the reveal");

        // Both withdrawals confirm on-chain.
        h.base.push_event(h.base.make_event(order, 12, 0, EscrowEventKind::Withdrawn));
        h.stellar.push_event(h.stellar.make_event(order, 23, 0, EscrowEventKind::Withdrawn));
        ingestor(&h, &h.base).run_once().await.unwrap();
        ingestor(&h, &h.stellar).run_once().await.unwrap();

        assert_eq!(h.swap(&order).status, SwapStatus::Completed);
        assert_eq!(h.db.get_checkpoint(ChainId::Base).unwrap().unwrap().height, 12);
        assert_eq!(h.db.get_checkpoint(ChainId::Stellar).unwrap().unwrap().height, 23);
    }
}

// ── Replay and boundary behavior ─────────────────────────────────────────────

#[tokio::test]
async fn replaying_the_event_log_is_idempotent() {
    let h = Harness::new();
    let preimage = preimage_11();
    let hashlock = Hashlock::from_bytes(keccak256(preimage.as_bytes()));
    let (order, _) =
        h.orch.submit_order(base_to_stellar_intent(Some(hashlock)), T0).await.unwrap();

    let log = vec![
        (h.base.make_event(order, 10, 0, EscrowEventKind::Created), T0 + 10),
        (h.base.make_event(order, 11, 0, EscrowEventKind::Funded), T0 + 20),
        (h.stellar.make_event(order, 20, 0, EscrowEventKind::Created), T0 + 30),
        (h.stellar.make_event(order, 21, 0, EscrowEventKind::Funded), T0 + 40),
        (
            h.stellar.make_event(
                order,
                22,
                0,
                EscrowEventKind::SecretRevealed { preimage: preimage.clone() },
            ),
            T0 + 300,
        ),
        (h.base.make_event(order, 12, 0, EscrowEventKind::Withdrawn), T0 + 310),
        (h.stellar.make_event(order, 23, 0, EscrowEventKind::Withdrawn), T0 + 320),
    ];

    for (ev, at) in &log {
        h.orch.handle_event_at(ev.clone(), *at).await.unwrap();
    }
    assert_eq!(h.swap(&order).status, SwapStatus::Completed);
    let withdrawals = h.base.withdrawals().len();

    // Any replayed suffix leaves the final state untouched.
    for (ev, at) in log.iter().skip(3) {
        h.orch.handle_event_at(ev.clone(), *at).await.unwrap();
    }
    assert_eq!(h.swap(&order).status, SwapStatus::Completed);
    assert_eq!(h.base.withdrawals().len(), withdrawals, "no duplicate claims on replay");
}

#[tokio::test]
async fn reveal_before_source_funding_confirmation_defers_then_claims() {
    let h = Harness::new();
    let preimage = preimage_11();
    let hashlock = Hashlock::from_bytes(keccak256(preimage.as_bytes()));
    let (order, _) =
        h.orch.submit_order(base_to_stellar_intent(Some(hashlock)), T0).await.unwrap();

    // Cross-chain ordering: the destination fills and reveals while the
    // source Funded confirmation is still in flight.
    for (chain, height, kind) in [
        (&h.base, 10, EscrowEventKind::Created),
        (&h.stellar, 20, EscrowEventKind::Created),
        (&h.stellar, 21, EscrowEventKind::Funded),
    ] {
        h.orch
            .handle_event_at(chain.make_event(order, height, 0, kind), T0 + 40)
            .await
            .unwrap();
    }
    h.orch
        .handle_event_at(
            h.stellar.make_event(
                order,
                22,
                0,
                EscrowEventKind::SecretRevealed { preimage: preimage.clone() },
            ),
            T0 + 300,
        )
        .await
        .unwrap();
    assert!(h.base.withdrawals().is_empty(), "claim deferred until funding is observed");
    assert_eq!(h.swap(&order).status, SwapStatus::SecretRevealed);

    // The late Funded confirmation releases the deferred claim.
    h.orch
        .handle_event_at(h.base.make_event(order, 11, 0, EscrowEventKind::Funded), T0 + 310)
        .await
        .unwrap();
    assert_eq!(h.base.withdrawals().len(), 1);
}

#[tokio::test]
async fn same_second_windows_resolve_correctly() {
    let h = Harness::new();
    let preimage = preimage_11();
    let hashlock = Hashlock::from_bytes(keccak256(preimage.as_bytes()));

    // dst and src withdrawal open in the same second.
    let mut intent = base_to_stellar_intent(Some(hashlock));
    intent.timelocks.dst_withdrawal = T0 + 150;
    intent.timelocks.dst_public_withdrawal = T0 + 250;
    let (order, _) = h.orch.submit_order(intent, T0).await.unwrap();

    for (chain, height, kind) in [
        (&h.base, 10, EscrowEventKind::Created),
        (&h.base, 11, EscrowEventKind::Funded),
        (&h.stellar, 20, EscrowEventKind::Created),
        (&h.stellar, 21, EscrowEventKind::Funded),
    ] {
        h.orch
            .handle_event_at(chain.make_event(order, height, 0, kind), T0 + 40)
            .await
            .unwrap();
    }

    // Timers for both opens fire at the shared boundary, then the reveal
    // arrives in the same second.
    h.fire_timers(T0 + 150).await;
    h.orch
        .handle_event_at(
            h.stellar.make_event(order, 22, 0, EscrowEventKind::SecretRevealed { preimage }),
            T0 + 150,
        )
        .await
        .unwrap();
    assert_eq!(h.base.withdrawals().len(), 1, "claim valid at the exact boundary");
}

// ── Intake rejections ────────────────────────────────────────────────────────

#[tokio::test]
async fn zero_amount_orders_are_rejected() {
    let h = Harness::new();
    let mut intent = base_to_stellar_intent(None);
    intent.making_amount = "0".into();
    assert!(matches!(
        h.orch.submit_order(intent, T0).await,
        Err(ResolverError::ZeroAmount)
    ));
}

#[tokio::test]
async fn duplicate_orders_are_rejected() {
    let h = Harness::new();
    let hashlock = Hashlock::from_bytes(keccak256(preimage_11().as_bytes()));
    let intent = base_to_stellar_intent(Some(hashlock));
    h.orch.submit_order(intent.clone(), T0).await.unwrap();
    assert!(matches!(
        h.orch.submit_order(intent, T0 + 5).await,
        Err(ResolverError::DuplicateOrder(_))
    ));
}

#[tokio::test]
async fn same_family_pairs_are_rejected() {
    let h = Harness::new();
    let mut intent = base_to_stellar_intent(None);
    intent.dst_chain = ChainId::Base;
    intent.taker = evm_addr('2');
    assert!(matches!(
        h.orch.submit_order(intent, T0).await,
        Err(ResolverError::UnsupportedChainPair { .. })
    ));
}

#[tokio::test]
async fn inverted_timelocks_are_rejected() {
    let h = Harness::new();
    let mut intent = base_to_stellar_intent(None);
    intent.timelocks.src_cancellation = T0;
    assert!(matches!(
        h.orch.submit_order(intent, T0).await,
        Err(ResolverError::TimelockInversion(_))
    ));
}

#[tokio::test]
async fn bad_addresses_are_rejected() {
    let h = Harness::new();
    let mut intent = base_to_stellar_intent(None);
    intent.maker = "not-an-address".into();
    assert!(matches!(
        h.orch.submit_order(intent, T0).await,
        Err(ResolverError::InvalidAddress { .. })
    ));
}

// ── Resolver-generated secrets ───────────────────────────────────────────────

#[tokio::test]
async fn generated_secret_binds_once_and_derives_both_hashlocks() {
    let h = Harness::new();
    let (order, _) = h.orch.submit_order(base_to_stellar_intent(None), T0).await.unwrap();

    let record = h.secrets().get_by_order(&order).unwrap().unwrap();
    assert_eq!(record.hashlock_keccak.as_bytes(), &keccak256(record.preimage.as_bytes()));
    assert_eq!(record.hashlock_sha256.as_bytes(), &sha256(record.preimage.as_bytes()));
    // The swap carries the source-chain (Keccak) form.
    assert_eq!(h.swap(&order).hashlock, record.hashlock_keccak);

    // Counter-deployment uses the destination-chain (SHA-256) form.
    h.orch
        .handle_event_at(h.base.make_event(order, 10, 0, EscrowEventKind::Created), T0 + 10)
        .await
        .unwrap();
    assert_eq!(h.stellar.deployed()[0].hashlock, record.hashlock_sha256);
}

// ── Revert handling ──────────────────────────────────────────────────────────

#[tokio::test]
async fn deploy_revert_is_recorded_without_failing_the_swap() {
    let h = Harness::new();
    let hashlock = Hashlock::from_bytes(keccak256(preimage_11().as_bytes()));
    let (order, _) =
        h.orch.submit_order(base_to_stellar_intent(Some(hashlock)), T0).await.unwrap();

    // Deploy reverts: the handler records it and consumes the event.
    h.stellar.revert_deploys("factory paused");
    h.orch
        .handle_event_at(h.base.make_event(order, 10, 0, EscrowEventKind::Created), T0 + 10)
        .await
        .unwrap();
    let swap = h.swap(&order);
    assert_eq!(swap.status, SwapStatus::SourceDeployed);
    assert!(swap.dst_escrow_address.is_none());
    assert!(swap.last_error.unwrap().contains("factory paused"));
}
