use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use strait_core::order::OrderIntent;
use strait_core::swap::{Swap, SwapStatus};
use strait_core::timelocks::TimelockStage;
use strait_core::types::{Amount, ChainFamily, ChainId, OrderHash, Preimage, Timestamp};
use strait_core::{EscrowEvent, EscrowEventKind, ResolverError};
use strait_chain::{ChainAdapter, EscrowParams, EscrowSide, EscrowStatus};
use strait_crypto::hashlock_for_chain;
use strait_ingest::EventSink;
use strait_secrets::SecretStore;
use strait_store::SwapRepository;
use strait_timelock::{TimelockExpired, TimelockScheduler};

use crate::locks::OrderLocks;

/// Construction dependencies, wired once at startup.
pub struct OrchestratorDeps {
    pub repo: SwapRepository,
    pub secrets: SecretStore,
    pub scheduler: Arc<TimelockScheduler>,
    pub adapters: HashMap<ChainId, Arc<dyn ChainAdapter>>,
}

pub struct Orchestrator {
    repo: SwapRepository,
    secrets: SecretStore,
    scheduler: Arc<TimelockScheduler>,
    adapters: HashMap<ChainId, Arc<dyn ChainAdapter>>,
    locks: OrderLocks,
    accepting: AtomicBool,
}

/// Errors the caller should retry by re-delivering (the ingestor holds its
/// checkpoint back on these). Everything else is either recorded on the
/// swap or terminal.
fn is_transient(err: &ResolverError) -> bool {
    matches!(
        err,
        ResolverError::RpcTimeout { .. }
            | ResolverError::ChainRpc { .. }
            | ResolverError::ChainUnavailable { .. }
            | ResolverError::Storage(_)
    )
}

/// A revert telling us the action already happened is success for us.
fn is_already_done(reason: &str) -> bool {
    let r = reason.to_ascii_lowercase();
    r.contains("already")
}

fn validate_address(family: ChainFamily, addr: &str) -> bool {
    match family {
        ChainFamily::Evm => {
            addr.len() == 42
                && addr.starts_with("0x")
                && addr[2..].bytes().all(|b| b.is_ascii_hexdigit())
        }
        ChainFamily::Stellar => {
            let b = addr.as_bytes();
            addr.len() == 56
                && (b[0] == b'G' || b[0] == b'C')
                && b.iter().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        }
    }
}

impl Orchestrator {
    pub fn new(deps: OrchestratorDeps) -> Self {
        Self {
            repo: deps.repo,
            secrets: deps.secrets,
            scheduler: deps.scheduler,
            adapters: deps.adapters,
            locks: OrderLocks::default(),
            accepting: AtomicBool::new(true),
        }
    }

    fn adapter(&self, chain: ChainId) -> Result<&Arc<dyn ChainAdapter>, ResolverError> {
        self.adapters
            .get(&chain)
            .ok_or_else(|| ResolverError::UnsupportedChain(chain.to_string()))
    }

    /// Refuse new orders from now on (graceful shutdown).
    pub fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::Relaxed);
    }

    /// Persist the swap and move the CAS expectation forward. Must be
    /// called under the order's lock.
    fn persist(
        &self,
        swap: &mut Swap,
        expected: &mut Timestamp,
        now: Timestamp,
    ) -> Result<(), ResolverError> {
        swap.updated_at = now;
        self.repo.update(swap, *expected)?;
        *expected = now;
        Ok(())
    }

    // ── New swap submissions ─────────────────────────────────────────────────

    /// Validate and persist a new swap. Returns synchronously; all chain
    /// work is driven by subsequent events.
    pub async fn submit_order(
        &self,
        intent: OrderIntent,
        now: Timestamp,
    ) -> Result<(OrderHash, SwapStatus), ResolverError> {
        if !self.accepting.load(Ordering::Relaxed) {
            return Err(ResolverError::ServiceUnavailable("not accepting orders".into()));
        }

        // ── Chain pair ────────────────────────────────────────────────────────
        if !self.adapters.contains_key(&intent.src_chain) {
            return Err(ResolverError::UnsupportedChain(intent.src_chain.to_string()));
        }
        if !self.adapters.contains_key(&intent.dst_chain) {
            return Err(ResolverError::UnsupportedChain(intent.dst_chain.to_string()));
        }
        if intent.src_chain.family() == intent.dst_chain.family() {
            return Err(ResolverError::UnsupportedChainPair {
                src: intent.src_chain,
                dst: intent.dst_chain,
            });
        }

        // ── Amounts ───────────────────────────────────────────────────────────
        let making_amount = Amount::from_dec_str(&intent.making_amount)?;
        let taking_amount = Amount::from_dec_str(&intent.taking_amount)?;
        if making_amount.is_zero() || taking_amount.is_zero() {
            return Err(ResolverError::ZeroAmount);
        }
        if intent.src_chain.family() == ChainFamily::Stellar && !making_amount.fits_i128() {
            return Err(ResolverError::InvalidOrder("making amount exceeds i128".into()));
        }
        if intent.dst_chain.family() == ChainFamily::Stellar && !taking_amount.fits_i128() {
            return Err(ResolverError::InvalidOrder("taking amount exceeds i128".into()));
        }

        // ── Timelocks ─────────────────────────────────────────────────────────
        intent.timelocks.validate()?;

        // ── Addresses (owner side each) ───────────────────────────────────────
        if !validate_address(intent.src_chain.family(), &intent.maker) {
            return Err(ResolverError::InvalidAddress {
                chain: intent.src_chain,
                address: intent.maker.clone(),
            });
        }
        if !validate_address(intent.dst_chain.family(), &intent.taker) {
            return Err(ResolverError::InvalidAddress {
                chain: intent.dst_chain,
                address: intent.taker.clone(),
            });
        }

        // ── Identity ──────────────────────────────────────────────────────────
        let order_hash = strait_crypto::order_hash_for_intent(&intent)?;
        if self.repo.find_by_order_hash(&order_hash)?.is_some() {
            return Err(ResolverError::DuplicateOrder(order_hash.to_hex()));
        }

        // ── Hashlock: supplied, or generated with a fresh secret ─────────────
        let (hashlock, preimage) = match intent.hashlock {
            Some(h) => (h, None),
            None => {
                let preimage = self.secrets.generate()?;
                let record = self.secrets.bind_to_order(order_hash, &preimage, now)?;
                let h = match intent.src_chain.family() {
                    ChainFamily::Evm => record.hashlock_keccak,
                    ChainFamily::Stellar => record.hashlock_sha256,
                };
                (h, Some(preimage))
            }
        };

        let swap = Swap {
            order_hash,
            src_chain: intent.src_chain,
            dst_chain: intent.dst_chain,
            maker: intent.maker,
            taker: intent.taker,
            maker_asset: intent.maker_asset,
            taker_asset: intent.taker_asset,
            making_amount,
            taking_amount,
            hashlock,
            preimage,
            timelocks: intent.timelocks,
            src_escrow_address: None,
            dst_escrow_address: None,
            status: SwapStatus::Created,
            src_withdrawn: false,
            dst_withdrawn: false,
            src_cancelled: false,
            dst_cancelled: false,
            src_funded: false,
            dst_funded: false,
            dst_fund_submitted: false,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        self.repo.create(&swap)?;
        info!(
            order = %order_hash,
            src = %swap.src_chain,
            dst = %swap.dst_chain,
            making = %swap.making_amount,
            taking = %swap.taking_amount,
            "swap created"
        );
        Ok((order_hash, SwapStatus::Created))
    }

    // ── Escrow events ────────────────────────────────────────────────────────

    /// Handle one canonical event at an explicit wall-clock instant.
    /// Idempotent; serialized per order hash.
    pub async fn handle_event_at(
        &self,
        event: EscrowEvent,
        now: Timestamp,
    ) -> Result<(), ResolverError> {
        let order = event.order_hash;
        let lock = self.locks.lock_for(order);
        let _guard = lock.lock().await;

        let Some(mut swap) = self.repo.find_by_order_hash(&order)? else {
            debug!(order = %order, chain = %event.chain, "event for unknown order ignored");
            return Ok(());
        };
        if swap.status.is_terminal() {
            return Ok(());
        }
        let side = if event.chain == swap.src_chain {
            EscrowSide::Src
        } else if event.chain == swap.dst_chain {
            EscrowSide::Dst
        } else {
            warn!(order = %order, chain = %event.chain, "event from chain outside this swap");
            return Ok(());
        };

        let mut expected = swap.updated_at;
        match (event.kind.clone(), side) {
            (EscrowEventKind::Created, EscrowSide::Src) => {
                self.on_source_created(&mut swap, &event, now).await?;
            }
            (EscrowEventKind::Created, EscrowSide::Dst) => {
                self.on_destination_created(&mut swap, &event, &mut expected, now).await?;
            }
            (EscrowEventKind::Funded, EscrowSide::Src) => {
                swap.src_funded = true;
                swap.advance_to(SwapStatus::SourceFunded, now)?;
                // Cross-chain ordering: the reveal may already have been
                // observed before the source funding confirmation. The
                // claim that was deferred then goes out now.
                if swap.status.rank() >= SwapStatus::SecretRevealed.rank() {
                    if let Some(preimage) = swap.preimage.clone() {
                        self.try_withdraw(&mut swap, EscrowSide::Src, &preimage, now).await?;
                    }
                }
            }
            (EscrowEventKind::Funded, EscrowSide::Dst) => {
                swap.dst_funded = true;
                swap.advance_to(SwapStatus::DestinationFunded, now)?;
            }
            (EscrowEventKind::SecretRevealed { preimage }, side) => {
                self.on_secret_revealed(&mut swap, side, &preimage, now).await?;
            }
            (EscrowEventKind::Withdrawn, EscrowSide::Src) => {
                swap.src_withdrawn = true;
                swap.advance_to(SwapStatus::SourceWithdrawn, now)?;
            }
            (EscrowEventKind::Withdrawn, EscrowSide::Dst) => {
                swap.dst_withdrawn = true;
                swap.advance_to(SwapStatus::DestinationWithdrawn, now)?;
            }
            (EscrowEventKind::Cancelled, side) => {
                self.on_cancelled(&mut swap, side, now).await?;
            }
        }

        self.maybe_finish(&mut swap, now)?;
        self.persist(&mut swap, &mut expected, now)?;

        if swap.status.is_terminal() {
            self.scheduler.remove(&order);
            self.locks.release(&order);
        }
        Ok(())
    }

    async fn on_source_created(
        &self,
        swap: &mut Swap,
        event: &EscrowEvent,
        now: Timestamp,
    ) -> Result<(), ResolverError> {
        if swap.src_escrow_address.is_none() {
            swap.src_escrow_address = Some(event.escrow_address.clone());
        }
        swap.advance_to(SwapStatus::SourceDeployed, now)?;
        if let Err(e) = self.scheduler.register(swap.order_hash, swap.timelocks) {
            debug!(order = %swap.order_hash, error = %e, "schedule registration skipped");
        }

        if swap.dst_escrow_address.is_some() {
            return Ok(());
        }

        // Counter-deploy on the destination with the matching hashlock.
        let params = self.counterpart_params(swap)?;
        match self.adapter(swap.dst_chain)?.deploy_escrow(&params).await {
            Ok(receipt) => {
                info!(
                    order = %swap.order_hash,
                    escrow = %receipt.escrow_address,
                    tx = %receipt.tx_id,
                    "destination escrow deployed"
                );
                swap.dst_escrow_address = Some(receipt.escrow_address);
            }
            Err(ResolverError::EscrowReverted { reason, .. }) => {
                warn!(order = %swap.order_hash, %reason, "destination deploy reverted");
                swap.last_error = Some(reason);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    async fn on_destination_created(
        &self,
        swap: &mut Swap,
        event: &EscrowEvent,
        expected: &mut Timestamp,
        now: Timestamp,
    ) -> Result<(), ResolverError> {
        if swap.dst_escrow_address.is_none() {
            swap.dst_escrow_address = Some(event.escrow_address.clone());
        }
        swap.advance_to(SwapStatus::DestinationDeployed, now)?;
        if let Err(e) = self.scheduler.register(swap.order_hash, swap.timelocks) {
            debug!(order = %swap.order_hash, error = %e, "schedule registration skipped");
        }
        self.ensure_destination_funded(swap, expected, now).await
    }

    /// Fund the destination escrow exactly once. The intent flag is
    /// persisted before submission; if the flag is already set the chain
    /// is consulted, so replays and restarts reconcile instead of
    /// double-funding.
    async fn ensure_destination_funded(
        &self,
        swap: &mut Swap,
        expected: &mut Timestamp,
        now: Timestamp,
    ) -> Result<(), ResolverError> {
        if swap.dst_funded {
            return Ok(());
        }
        let Some(escrow) = swap.dst_escrow_address.clone() else {
            return Ok(());
        };
        let adapter = self.adapter(swap.dst_chain)?;

        if swap.dst_fund_submitted {
            match adapter.get_escrow_state(&escrow).await {
                Ok(state) if state.status == EscrowStatus::Created => {
                    info!(order = %swap.order_hash, "re-submitting destination funding");
                }
                Ok(_) => return Ok(()),
                Err(e) if is_transient(&e) => return Err(e),
                Err(e) => {
                    debug!(order = %swap.order_hash, error = %e, "funding reconcile deferred");
                    return Ok(());
                }
            }
        } else {
            swap.dst_fund_submitted = true;
            self.persist(swap, expected, now)?;
        }

        match adapter.fund_escrow(&escrow, &swap.taker_asset, swap.taking_amount).await {
            Ok(tx_id) => {
                info!(order = %swap.order_hash, tx = %tx_id, "destination funding submitted");
                Ok(())
            }
            Err(ResolverError::EscrowReverted { reason, .. }) => {
                warn!(order = %swap.order_hash, %reason, "destination funding reverted");
                swap.last_error = Some(reason);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn on_secret_revealed(
        &self,
        swap: &mut Swap,
        side: EscrowSide,
        preimage: &Preimage,
        now: Timestamp,
    ) -> Result<(), ResolverError> {
        // The claim on source only goes out if the revealed bytes hash to
        // the committed lock under the source chain's function. A mismatch
        // is a contract-layer misconfiguration, never normal.
        let derived = hashlock_for_chain(swap.src_chain, preimage);
        if derived != swap.hashlock {
            error!(
                order = %swap.order_hash,
                "revealed preimage does not hash to the stored hashlock; failing swap"
            );
            swap.last_error =
                Some(ResolverError::HashlockMismatch(swap.order_hash.to_hex()).to_string());
            swap.transition(SwapStatus::Failed, now)?;
            return Ok(());
        }

        match self.secrets.record_reveal(swap.order_hash, preimage, now) {
            Ok(_) => {}
            Err(e @ ResolverError::PreimageMismatch(_)) => {
                error!(order = %swap.order_hash, error = %e, "bound secret conflicts with reveal");
                swap.last_error = Some(e.to_string());
                swap.transition(SwapStatus::Failed, now)?;
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        swap.preimage = Some(preimage.clone());
        swap.advance_to(SwapStatus::SecretRevealed, now)?;

        // The user claimed on the destination; claim the source with the
        // now-public secret.
        if side == EscrowSide::Dst {
            self.try_withdraw(swap, EscrowSide::Src, preimage, now).await?;
        }
        Ok(())
    }

    async fn on_cancelled(
        &self,
        swap: &mut Swap,
        side: EscrowSide,
        now: Timestamp,
    ) -> Result<(), ResolverError> {
        let other = match side {
            EscrowSide::Src => {
                swap.src_cancelled = true;
                EscrowSide::Dst
            }
            EscrowSide::Dst => {
                swap.dst_cancelled = true;
                EscrowSide::Src
            }
        };
        // Cascade: if the other side is still exposed and its window is
        // open, cancel it as well.
        self.try_cancel(swap, other, now).await
    }

    // ── Timelock expiries ────────────────────────────────────────────────────

    pub async fn handle_timer_at(
        &self,
        expired: TimelockExpired,
        now: Timestamp,
    ) -> Result<(), ResolverError> {
        let order = expired.order_hash;
        let lock = self.locks.lock_for(order);
        let _guard = lock.lock().await;

        let Some(mut swap) = self.repo.find_by_order_hash(&order)? else {
            self.scheduler.remove(&order);
            return Ok(());
        };
        if swap.status.is_terminal() {
            self.scheduler.remove(&order);
            return Ok(());
        }

        let mut expected = swap.updated_at;
        match expired.stage {
            // Withdrawal windows open silently; claims are triggered by the
            // counterparty's reveal, not by the clock.
            TimelockStage::SrcWithdrawal | TimelockStage::DstWithdrawal => return Ok(()),

            TimelockStage::SrcPublicWithdrawal => {
                if let Some(preimage) = swap.preimage.clone() {
                    self.try_withdraw(&mut swap, EscrowSide::Src, &preimage, now).await?;
                }
            }
            TimelockStage::DstPublicWithdrawal => {
                if let Some(preimage) = swap.preimage.clone() {
                    self.try_withdraw(&mut swap, EscrowSide::Dst, &preimage, now).await?;
                }
            }
            TimelockStage::SrcCancellation | TimelockStage::SrcPublicCancellation => {
                self.try_cancel(&mut swap, EscrowSide::Src, now).await?;
            }
            TimelockStage::DstCancellation | TimelockStage::DstPublicCancellation => {
                self.try_cancel(&mut swap, EscrowSide::Dst, now).await?;
            }
        }

        self.maybe_finish(&mut swap, now)?;
        self.persist(&mut swap, &mut expected, now)?;

        if swap.status.is_terminal() {
            self.scheduler.remove(&order);
            self.locks.release(&order);
        }
        Ok(())
    }

    // ── Chain actions ────────────────────────────────────────────────────────

    /// Claim one side with the preimage. Preconditions: the escrow has
    /// been observed funded, its withdrawal window is open and its
    /// cancellation window is not. An "already …" revert is success;
    /// other reverts are recorded and the state machine converges on a
    /// later event.
    async fn try_withdraw(
        &self,
        swap: &mut Swap,
        side: EscrowSide,
        preimage: &Preimage,
        now: Timestamp,
    ) -> Result<(), ResolverError> {
        let (chain, escrow, funded, withdrawn, open_stage, close_stage) = match side {
            EscrowSide::Src => (
                swap.src_chain,
                swap.src_escrow_address.clone(),
                swap.src_funded,
                swap.src_withdrawn,
                TimelockStage::SrcWithdrawal,
                TimelockStage::SrcCancellation,
            ),
            EscrowSide::Dst => (
                swap.dst_chain,
                swap.dst_escrow_address.clone(),
                swap.dst_funded,
                swap.dst_withdrawn,
                TimelockStage::DstWithdrawal,
                TimelockStage::DstCancellation,
            ),
        };
        if withdrawn {
            return Ok(());
        }
        if !funded {
            debug!(order = %swap.order_hash, "escrow not observed funded; claim deferred");
            return Ok(());
        }
        let Some(escrow) = escrow else {
            return Ok(());
        };
        if !swap.timelocks.is_open(open_stage, now) {
            debug!(order = %swap.order_hash, stage = %open_stage, "withdrawal window not open");
            return Ok(());
        }
        if swap.timelocks.is_open(close_stage, now) {
            warn!(order = %swap.order_hash, "cancellation window open; withdraw skipped");
            return Ok(());
        }

        match self.adapter(chain)?.withdraw(&escrow, preimage).await {
            Ok(tx_id) => {
                info!(order = %swap.order_hash, %chain, tx = %tx_id, "withdraw submitted");
                Ok(())
            }
            Err(ResolverError::EscrowReverted { reason, .. }) if is_already_done(&reason) => {
                debug!(order = %swap.order_hash, %chain, "withdraw already executed");
                Ok(())
            }
            Err(ResolverError::EscrowReverted { reason, .. }) => {
                warn!(order = %swap.order_hash, %chain, %reason, "withdraw reverted");
                swap.last_error = Some(reason);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Refund one side after its cancellation deadline. Never runs once
    /// the secret is out — the withdraw path is live and must win, even
    /// into the public cancellation window.
    async fn try_cancel(
        &self,
        swap: &mut Swap,
        side: EscrowSide,
        now: Timestamp,
    ) -> Result<(), ResolverError> {
        let (chain, escrow, withdrawn, cancelled, stage) = match side {
            EscrowSide::Src => (
                swap.src_chain,
                swap.src_escrow_address.clone(),
                swap.src_withdrawn,
                swap.src_cancelled,
                TimelockStage::SrcCancellation,
            ),
            EscrowSide::Dst => (
                swap.dst_chain,
                swap.dst_escrow_address.clone(),
                swap.dst_withdrawn,
                swap.dst_cancelled,
                TimelockStage::DstCancellation,
            ),
        };
        if withdrawn || cancelled {
            return Ok(());
        }
        if swap.status.rank() >= SwapStatus::SecretRevealed.rank() {
            debug!(order = %swap.order_hash, "secret revealed; cancel suppressed");
            return Ok(());
        }
        let Some(escrow) = escrow else {
            return Ok(());
        };
        if !swap.timelocks.is_open(stage, now) {
            return Ok(());
        }

        match self.adapter(chain)?.cancel(&escrow).await {
            Ok(tx_id) => {
                info!(order = %swap.order_hash, %chain, tx = %tx_id, "cancel submitted");
                Ok(())
            }
            Err(ResolverError::EscrowReverted { reason, .. }) if is_already_done(&reason) => {
                debug!(order = %swap.order_hash, %chain, "cancel already executed");
                Ok(())
            }
            Err(ResolverError::EscrowReverted { reason, .. }) => {
                warn!(order = %swap.order_hash, %chain, %reason, "cancel reverted");
                swap.last_error = Some(reason);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Destination escrow parameters derived from the source order: sides
    /// swapped, taking amount, and the hashlock under the destination
    /// chain's hash function when the preimage is ours.
    fn counterpart_params(&self, swap: &Swap) -> Result<EscrowParams, ResolverError> {
        let hashlock = match self.secrets.get_by_order(&swap.order_hash)? {
            Some(record) => match swap.dst_chain.family() {
                ChainFamily::Evm => record.hashlock_keccak,
                ChainFamily::Stellar => record.hashlock_sha256,
            },
            // Externally supplied hashlock: passed through unchanged; the
            // submitter is responsible for the destination-side form.
            None => swap.hashlock,
        };
        Ok(EscrowParams {
            order_hash: swap.order_hash,
            hashlock,
            side: EscrowSide::Dst,
            maker: swap.taker.clone(),
            taker: swap.maker.clone(),
            asset: swap.taker_asset.clone(),
            amount: swap.taking_amount,
            timelocks_packed: swap.timelocks.pack(swap.created_at),
            timelocks_base: swap.created_at,
        })
    }

    /// Terminal checks: both sides withdrawn → COMPLETED; every exposed
    /// side cancelled → CANCELLED.
    fn maybe_finish(&self, swap: &mut Swap, now: Timestamp) -> Result<(), ResolverError> {
        if swap.status.is_terminal() {
            return Ok(());
        }
        if swap.src_withdrawn && swap.dst_withdrawn {
            swap.transition(SwapStatus::Completed, now)?;
            info!(order = %swap.order_hash, "swap completed");
            return Ok(());
        }
        let src_resolved = swap.src_cancelled || (!swap.src_funded && !swap.src_withdrawn);
        let dst_resolved = swap.dst_cancelled || (!swap.dst_funded && !swap.dst_withdrawn);
        if (swap.src_cancelled || swap.dst_cancelled) && src_resolved && dst_resolved {
            swap.transition(SwapStatus::Cancelled, now)?;
            info!(order = %swap.order_hash, "swap cancelled");
        }
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Startup recovery: re-register schedules for every non-terminal swap
    /// and reconcile outstanding destination-funding submissions against
    /// on-chain state. The scheduler then re-emits any stage that expired
    /// while the process was down.
    pub async fn recover(&self, now: Timestamp) -> Result<(), ResolverError> {
        let active = self.repo.list_active()?;
        for mut swap in active.iter().cloned() {
            if let Err(e) = self.scheduler.register(swap.order_hash, swap.timelocks) {
                debug!(order = %swap.order_hash, error = %e, "schedule re-registration skipped");
            }
            if swap.dst_fund_submitted && !swap.dst_funded {
                let lock = self.locks.lock_for(swap.order_hash);
                let _guard = lock.lock().await;
                let mut expected = swap.updated_at;
                match self.ensure_destination_funded(&mut swap, &mut expected, now).await {
                    Ok(()) => self.persist(&mut swap, &mut expected, now)?,
                    Err(e) => {
                        warn!(order = %swap.order_hash, error = %e, "funding reconcile failed")
                    }
                }
            }
        }
        info!(active = active.len(), "orchestrator recovery complete");
        Ok(())
    }

    /// Consume the scheduler's expiry stream. A transiently failed expiry
    /// is re-armed so the next tick retries it.
    pub async fn run_timer_loop(
        &self,
        mut rx: mpsc::Receiver<TimelockExpired>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                maybe = rx.recv() => {
                    let Some(expired) = maybe else { return };
                    let order = expired.order_hash;
                    let stage = expired.stage;
                    let now = chrono::Utc::now().timestamp();
                    if let Err(e) = self.handle_timer_at(expired, now).await {
                        warn!(order = %order, stage = %stage, error = %e,
                              "timer handling failed; re-arming");
                        self.scheduler.rearm(&order, stage);
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl EventSink for Orchestrator {
    async fn handle_event(&self, event: EscrowEvent) -> Result<(), ResolverError> {
        self.handle_event_at(event, chrono::Utc::now().timestamp()).await
    }
}
