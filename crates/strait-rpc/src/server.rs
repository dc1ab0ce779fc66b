use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use strait_core::swap::SwapStatus;
use strait_core::types::{ChainId, OrderHash};
use strait_core::{OrderIntent, ResolverError};
use strait_ingest::ChainHealth;
use strait_orchestrator::Orchestrator;
use strait_store::{CheckpointStore, SwapRepository};

use crate::api::StraitApiServer;
use crate::types::{RpcChainStatus, RpcCheckpoint, RpcServiceStatus, RpcSubmitResult, RpcSwap};

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

/// Intake rejections get distinct codes so clients can branch on them;
/// everything else is an internal error.
fn map_err(err: ResolverError) -> ErrorObject<'static> {
    let code = match &err {
        ResolverError::InvalidOrder(_)
        | ResolverError::ZeroAmount
        | ResolverError::TimelockInversion(_)
        | ResolverError::InvalidAddress { .. } => -32602,
        ResolverError::DuplicateOrder(_) => -32001,
        ResolverError::UnsupportedChain(_) | ResolverError::UnsupportedChainPair { .. } => -32002,
        ResolverError::ServiceUnavailable(_) => -32003,
        _ => -32603,
    };
    rpc_err(code, err.to_string())
}

fn parse_status(s: &str) -> Option<SwapStatus> {
    let all = [
        SwapStatus::Created,
        SwapStatus::SourceDeployed,
        SwapStatus::SourceFunded,
        SwapStatus::DestinationDeployed,
        SwapStatus::DestinationFunded,
        SwapStatus::SecretRevealed,
        SwapStatus::SourceWithdrawn,
        SwapStatus::DestinationWithdrawn,
        SwapStatus::Completed,
        SwapStatus::Cancelled,
        SwapStatus::Failed,
    ];
    all.into_iter().find(|st| st.as_str().eq_ignore_ascii_case(s))
}

/// Shared state passed to the RPC server.
pub struct RpcServerState {
    pub orchestrator: Arc<Orchestrator>,
    pub repo: SwapRepository,
    pub checkpoints: CheckpointStore,
    pub health: HashMap<ChainId, Arc<ChainHealth>>,
    pub running: Arc<AtomicBool>,
}

/// The RPC server implementation.
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS headers.
    /// Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new().allow_methods(Any).allow_origin(Any).allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "intake RPC server started");
        Ok(handle)
    }
}

#[async_trait]
impl StraitApiServer for RpcServer {
    async fn submit_order(&self, order: OrderIntent) -> RpcResult<RpcSubmitResult> {
        let now = chrono::Utc::now().timestamp();
        let (order_hash, status) =
            self.state.orchestrator.submit_order(order, now).await.map_err(map_err)?;
        Ok(RpcSubmitResult { order_hash: order_hash.to_hex(), status: status.to_string() })
    }

    async fn get_swap(&self, order_hash: String) -> RpcResult<Option<RpcSwap>> {
        let order = OrderHash::from_hex(&order_hash)
            .map_err(|e| rpc_err(-32602, format!("invalid order hash: {e}")))?;
        let swap = self.state.repo.find_by_order_hash(&order).map_err(map_err)?;
        Ok(swap.map(RpcSwap::from))
    }

    async fn list_swaps(&self, status: Option<String>) -> RpcResult<Vec<RpcSwap>> {
        let swaps = match status {
            Some(s) => {
                let wanted = parse_status(&s)
                    .ok_or_else(|| rpc_err(-32602, format!("unknown status {s:?}")))?;
                self.state.repo.list_by_status(wanted).map_err(map_err)?
            }
            None => {
                let mut all = self.state.repo.list_active().map_err(map_err)?;
                all.sort_by_key(|s| s.created_at);
                all
            }
        };
        Ok(swaps.into_iter().map(RpcSwap::from).collect())
    }

    async fn get_status(&self) -> RpcResult<RpcServiceStatus> {
        let mut chains = Vec::with_capacity(self.state.health.len());
        for (chain, health) in &self.state.health {
            let checkpoint = self.state.checkpoints.load(*chain).map_err(map_err)?;
            chains.push(RpcChainStatus {
                chain: chain.to_string(),
                degraded: health.is_degraded(),
                checkpoint_height: checkpoint.height,
            });
        }
        chains.sort_by(|a, b| a.chain.cmp(&b.chain));
        Ok(RpcServiceStatus {
            running: self.state.running.load(Ordering::Relaxed),
            active_swap_count: self.state.repo.active_count().map_err(map_err)?,
            chains,
        })
    }

    async fn get_checkpoints(&self) -> RpcResult<Vec<RpcCheckpoint>> {
        let mut out = Vec::with_capacity(self.state.health.len());
        for chain in self.state.health.keys() {
            let checkpoint = self.state.checkpoints.load(*chain).map_err(map_err)?;
            out.push(RpcCheckpoint { chain: chain.to_string(), height: checkpoint.height });
        }
        out.sort_by(|a, b| a.chain.cmp(&b.chain));
        Ok(out)
    }
}
