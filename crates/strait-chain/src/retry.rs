use std::future::Future;
use std::time::Duration;

use tracing::warn;

use strait_core::constants::{RPC_BACKOFF_BASE_MS, RPC_BACKOFF_CEILING_MS, RPC_MAX_RETRIES};
use strait_core::types::ChainId;
use strait_core::ResolverError;

/// Whether an error is worth another attempt. Reverts and invariant
/// violations never are; transport-level conditions are.
fn is_transient(err: &ResolverError) -> bool {
    matches!(
        err,
        ResolverError::RpcTimeout { .. }
            | ResolverError::ChainRpc { .. }
            | ResolverError::ChainUnavailable { .. }
    )
}

/// Run `op` with bounded exponential backoff.
///
/// Transient transport errors are retried up to `RPC_MAX_RETRIES` with
/// delays `base * 2^attempt` capped at the ceiling; anything else — in
/// particular `EscrowReverted` — is surfaced immediately. When the budget
/// is exhausted the last error is wrapped in `ChainUnavailable`.
pub async fn with_retry<T, F, Fut>(
    chain: ChainId,
    op_name: &str,
    mut op: F,
) -> Result<T, ResolverError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ResolverError>>,
{
    let mut last_err = None;
    for attempt in 0..=RPC_MAX_RETRIES {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if is_transient(&e) => {
                let delay_ms =
                    (RPC_BACKOFF_BASE_MS << attempt.min(16)).min(RPC_BACKOFF_CEILING_MS);
                warn!(
                    %chain,
                    op = op_name,
                    attempt,
                    error = %e,
                    "transient chain error; backing off {delay_ms}ms"
                );
                last_err = Some(e);
                if attempt < RPC_MAX_RETRIES {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
    Err(ResolverError::ChainUnavailable {
        chain,
        reason: last_err.map(|e| e.to_string()).unwrap_or_else(|| "retry budget spent".into()),
    })
}
