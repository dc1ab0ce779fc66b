//! Scriptable in-memory chain for tests.
//!
//! Tests queue canonical events at heights, advance the visible height,
//! and inspect every submission the resolver makes. Escrow state follows
//! both pushed events and submitted actions so on-chain invariants can be
//! asserted after a scenario runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use strait_core::types::{Amount, ChainId, Hashlock, Height, OrderHash, Preimage};
use strait_core::{EscrowEvent, EscrowEventKind, ResolverError};

use crate::adapter::{
    ChainAdapter, DeployReceipt, EscrowImmutables, EscrowParams, EscrowState, EscrowStatus,
};

#[derive(Default)]
struct Inner {
    height: Height,
    events: BTreeMap<Height, Vec<EscrowEvent>>,
    deployed: Vec<EscrowParams>,
    fundings: Vec<(String, String, Amount)>,
    withdrawals: Vec<(String, Preimage)>,
    cancels: Vec<String>,
    escrow_status: HashMap<String, EscrowStatus>,
    escrow_immutables: HashMap<String, EscrowImmutables>,
    withdraw_revert: Option<String>,
    deploy_revert: Option<String>,
    poll_failures: u32,
}

pub struct MockChain {
    chain: ChainId,
    inner: Mutex<Inner>,
}

impl MockChain {
    pub fn new(chain: ChainId) -> Self {
        Self { chain, inner: Mutex::new(Inner::default()) }
    }

    /// Deterministic escrow address for an order on this mock chain.
    pub fn escrow_address(&self, order: &OrderHash) -> String {
        format!("esc-{}-{}", self.chain, &order.to_hex()[2..10])
    }

    /// Construct a canonical event with a deterministic fingerprint.
    pub fn make_event(
        &self,
        order: OrderHash,
        height: Height,
        log_index: u32,
        kind: EscrowEventKind,
    ) -> EscrowEvent {
        EscrowEvent {
            chain: self.chain,
            order_hash: order,
            escrow_address: self.escrow_address(&order),
            height,
            tx_id: format!("tx-{}-{height}-{log_index}", self.chain),
            log_index,
            kind,
        }
    }

    /// Queue an event and make its height visible.
    pub fn push_event(&self, event: EscrowEvent) {
        let mut inner = self.inner.lock().unwrap();
        Self::track_state(&mut inner, &event);
        let h = event.height;
        inner.events.entry(h).or_default().push(event);
        if inner.height < h {
            inner.height = h;
        }
    }

    /// Replace everything recorded at a height (reorg simulation).
    pub fn replace_events_at(&self, height: Height, events: Vec<EscrowEvent>) {
        let mut inner = self.inner.lock().unwrap();
        for ev in &events {
            Self::track_state(&mut inner, ev);
        }
        inner.events.insert(height, events);
    }

    fn track_state(inner: &mut Inner, event: &EscrowEvent) {
        let status = match &event.kind {
            EscrowEventKind::Created => EscrowStatus::Created,
            EscrowEventKind::Funded => EscrowStatus::Funded,
            EscrowEventKind::SecretRevealed { .. } => return,
            EscrowEventKind::Withdrawn => EscrowStatus::Withdrawn,
            EscrowEventKind::Cancelled => EscrowStatus::Cancelled,
        };
        inner.escrow_status.insert(event.escrow_address.clone(), status);
    }

    pub fn set_height(&self, height: Height) {
        self.inner.lock().unwrap().height = height;
    }

    /// Fail the next `n` poll rounds with a transport error.
    pub fn fail_polls(&self, n: u32) {
        self.inner.lock().unwrap().poll_failures = n;
    }

    /// Make every withdraw submission revert with `reason`.
    pub fn revert_withdrawals(&self, reason: &str) {
        self.inner.lock().unwrap().withdraw_revert = Some(reason.to_string());
    }

    pub fn revert_deploys(&self, reason: &str) {
        self.inner.lock().unwrap().deploy_revert = Some(reason.to_string());
    }

    // ── Submission inspection ────────────────────────────────────────────────

    pub fn deployed(&self) -> Vec<EscrowParams> {
        self.inner.lock().unwrap().deployed.clone()
    }

    pub fn fundings(&self) -> Vec<(String, String, Amount)> {
        self.inner.lock().unwrap().fundings.clone()
    }

    pub fn withdrawals(&self) -> Vec<(String, Preimage)> {
        self.inner.lock().unwrap().withdrawals.clone()
    }

    pub fn cancels(&self) -> Vec<String> {
        self.inner.lock().unwrap().cancels.clone()
    }

    pub fn escrow_status(&self, escrow: &str) -> Option<EscrowStatus> {
        self.inner.lock().unwrap().escrow_status.get(escrow).copied()
    }
}

#[async_trait]
impl ChainAdapter for MockChain {
    fn chain_id(&self) -> ChainId {
        self.chain
    }

    async fn latest_height(&self) -> Result<Height, ResolverError> {
        Ok(self.inner.lock().unwrap().height)
    }

    async fn poll_events(
        &self,
        from: Height,
        to: Height,
    ) -> Result<Vec<EscrowEvent>, ResolverError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.poll_failures > 0 {
            inner.poll_failures -= 1;
            return Err(ResolverError::RpcTimeout {
                chain: self.chain,
                method: "poll_events".into(),
            });
        }
        Ok(inner
            .events
            .range(from..=to)
            .flat_map(|(_, evs)| evs.iter().cloned())
            .collect())
    }

    async fn predict_escrow(&self, params: &EscrowParams) -> Result<String, ResolverError> {
        Ok(self.escrow_address(&params.order_hash))
    }

    async fn deploy_escrow(&self, params: &EscrowParams) -> Result<DeployReceipt, ResolverError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(reason) = inner.deploy_revert.clone() {
            return Err(ResolverError::EscrowReverted { chain: self.chain, reason });
        }
        let escrow_address = self.escrow_address(&params.order_hash);
        inner.deployed.push(params.clone());
        inner.escrow_status.insert(escrow_address.clone(), EscrowStatus::Created);
        inner.escrow_immutables.insert(
            escrow_address.clone(),
            EscrowImmutables {
                order_hash: params.order_hash,
                hashlock: params.hashlock,
                amount: params.amount,
            },
        );
        Ok(DeployReceipt { escrow_address, tx_id: format!("tx-deploy-{}", inner.deployed.len()) })
    }

    async fn fund_escrow(
        &self,
        escrow: &str,
        asset: &str,
        amount: Amount,
    ) -> Result<String, ResolverError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fundings.push((escrow.to_string(), asset.to_string(), amount));
        inner.escrow_status.insert(escrow.to_string(), EscrowStatus::Funded);
        Ok(format!("tx-fund-{}", inner.fundings.len()))
    }

    async fn withdraw(&self, escrow: &str, preimage: &Preimage) -> Result<String, ResolverError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(reason) = inner.withdraw_revert.clone() {
            return Err(ResolverError::EscrowReverted { chain: self.chain, reason });
        }
        inner.withdrawals.push((escrow.to_string(), preimage.clone()));
        inner.escrow_status.insert(escrow.to_string(), EscrowStatus::Withdrawn);
        Ok(format!("tx-withdraw-{}", inner.withdrawals.len()))
    }

    async fn cancel(&self, escrow: &str) -> Result<String, ResolverError> {
        let mut inner = self.inner.lock().unwrap();
        inner.cancels.push(escrow.to_string());
        inner.escrow_status.insert(escrow.to_string(), EscrowStatus::Cancelled);
        Ok(format!("tx-cancel-{}", inner.cancels.len()))
    }

    async fn get_escrow_state(&self, escrow: &str) -> Result<EscrowState, ResolverError> {
        let inner = self.inner.lock().unwrap();
        let status = inner.escrow_status.get(escrow).copied().ok_or_else(|| {
            ResolverError::EscrowNotFound { chain: self.chain, escrow: escrow.to_string() }
        })?;
        let immutables = inner.escrow_immutables.get(escrow).cloned().unwrap_or(EscrowImmutables {
            order_hash: OrderHash::from_bytes([0; 32]),
            hashlock: Hashlock::from_bytes([0; 32]),
            amount: Amount::ZERO,
        });
        Ok(EscrowState { status, immutables })
    }
}
