//! End-to-end smoke test for the resolver service.
//!
//! Starts the full service (ingestors, scheduler, orchestrator, intake
//! RPC) over mock chain adapters, submits an order through JSON-RPC,
//! drives the chains through a complete swap, and asserts the terminal
//! state both over RPC and in storage.
//!
//! Run with:
//!   cargo test -p strait-service --test smoke

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::{Duration, Instant};

use strait_core::timelocks::Timelocks;
use strait_core::types::{ChainId, Hashlock, OrderHash, Preimage, Timestamp};
use strait_core::EscrowEventKind;
use strait_chain::{ChainAdapter, MockChain};
use strait_crypto::keccak256;
use strait_ingest::IngestorConfig;
use strait_service::{ResolverService, ServiceConfig};

// ── RPC helpers ───────────────────────────────────────────────────────────────

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

async fn rpc_call(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    let resp = client
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap_or_else(|e| panic!("RPC call {method} failed: {e}"));
    let json: serde_json::Value = resp.json().await.expect("parse RPC JSON");
    if let Some(err) = json.get("error").filter(|e| !e.is_null()) {
        panic!("RPC error from {method}: {err}");
    }
    json["result"].clone()
}

/// Poll `strait_getSwap` until the swap reaches `status` or times out.
async fn wait_for_status(
    client: &reqwest::Client,
    url: &str,
    order_hash: &str,
    status: &str,
    timeout: Duration,
) -> serde_json::Value {
    let deadline = Instant::now() + timeout;
    loop {
        let swap =
            rpc_call(client, url, "strait_getSwap", serde_json::json!([order_hash])).await;
        if swap["status"] == status {
            return swap;
        }
        assert!(
            Instant::now() < deadline,
            "swap did not reach {status} in time; last seen {}",
            swap["status"]
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

// ── Smoke test ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn smoke_full_swap_over_rpc() {
    // ── 1. Service over mock chains, fast polling ─────────────────────────────
    let base = Arc::new(MockChain::new(ChainId::Base));
    let stellar = Arc::new(MockChain::new(ChainId::Stellar));
    let mut adapters: HashMap<ChainId, Arc<dyn ChainAdapter>> = HashMap::new();
    adapters.insert(ChainId::Base, base.clone());
    adapters.insert(ChainId::Stellar, stellar.clone());

    let fast = IngestorConfig {
        poll_interval: Duration::from_millis(25),
        window: 10,
        confirmations: 1,
    };
    let data_dir = tempfile::tempdir().unwrap();
    let port = free_port();
    let mut config = ServiceConfig::new(
        data_dir.path().join("state"),
        format!("127.0.0.1:{port}").parse().unwrap(),
    );
    config.ingest.insert(ChainId::Base, fast.clone());
    config.ingest.insert(ChainId::Stellar, fast);

    let service = ResolverService::start(config, adapters).await.expect("service starts");
    let url = format!("http://127.0.0.1:{port}");
    let http = reqwest::Client::new();

    // ── 2. Submit an order over RPC ───────────────────────────────────────────
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as Timestamp;
    let preimage = Preimage::from_bytes([0x11; 32]);
    let hashlock = Hashlock::from_bytes(keccak256(preimage.as_bytes()));
    let timelocks = Timelocks {
        src_withdrawal: now - 100,
        src_public_withdrawal: now - 50,
        src_cancellation: now + 6_000,
        src_public_cancellation: now + 7_000,
        dst_withdrawal: now - 150,
        dst_public_withdrawal: now - 100,
        dst_cancellation: now + 4_000,
        dst_public_cancellation: now + 5_000,
    };
    let order = serde_json::json!({
        "src_chain": "base",
        "dst_chain": "stellar",
        "maker": format!("0x{}", "1".repeat(40)),
        "taker": format!("G{}", "A".repeat(55)),
        "maker_asset": format!("0x{}", "3".repeat(40)),
        "taker_asset": "native",
        "making_amount": "1000000",
        "taking_amount": "10000000",
        "hashlock": hashlock,
        "timelocks": timelocks,
    });

    let result =
        rpc_call(&http, &url, "strait_submitOrder", serde_json::json!([order.clone()])).await;
    assert_eq!(result["status"], "CREATED");
    let order_hash_hex = result["order_hash"].as_str().unwrap().to_string();
    let order_hash = OrderHash::from_hex(&order_hash_hex).unwrap();

    // Duplicate submission is rejected.
    let dup = http
        .post(&url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0", "method": "strait_submitOrder", "params": [order], "id": 2
        }))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(dup["error"]["code"], -32001);

    // ── 3. Drive the source chain; the resolver counter-deploys ──────────────
    base.push_event(base.make_event(order_hash, 10, 0, EscrowEventKind::Created));
    base.push_event(base.make_event(order_hash, 11, 0, EscrowEventKind::Funded));
    wait_for_status(&http, &url, &order_hash_hex, "SOURCE_FUNDED", Duration::from_secs(5)).await;
    assert_eq!(stellar.deployed().len(), 1, "destination counter-deployment");

    // ── 4. Destination confirms and funds ─────────────────────────────────────
    stellar.push_event(stellar.make_event(order_hash, 20, 0, EscrowEventKind::Created));
    stellar.push_event(stellar.make_event(order_hash, 21, 0, EscrowEventKind::Funded));
    wait_for_status(&http, &url, &order_hash_hex, "DESTINATION_FUNDED", Duration::from_secs(5))
        .await;
    assert_eq!(stellar.fundings().len(), 1);

    // ── 5. User claims on destination; resolver claims source ────────────────
    stellar.push_event(stellar.make_event(
        order_hash,
        22,
        0,
        EscrowEventKind::SecretRevealed { preimage: preimage.clone() },
    ));
    wait_for_status(&http, &url, &order_hash_hex, "SECRET_REVEALED", Duration::from_secs(5)).await;
    assert_eq!(base.withdrawals().len(), 1);
    assert_eq!(base.withdrawals()[0].1, preimage);

    base.push_event(base.make_event(order_hash, 12, 0, EscrowEventKind::Withdrawn));
    stellar.push_event(stellar.make_event(order_hash, 23, 0, EscrowEventKind::Withdrawn));
    let done =
        wait_for_status(&http, &url, &order_hash_hex, "COMPLETED", Duration::from_secs(5)).await;
    assert!(done["preimage"].is_null(), "preimage never leaves the process");

    // ── 6. Status endpoint: healthy chains, checkpoints advanced ─────────────
    // The terminal status becomes visible a beat before the final window's
    // checkpoint is persisted; allow the ingest loops to settle.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let status = rpc_call(&http, &url, "strait_getStatus", serde_json::json!([])).await;
    assert_eq!(status["running"], true);
    assert_eq!(status["active_swap_count"], 0);
    let chains = status["chains"].as_array().unwrap();
    assert_eq!(chains.len(), 2);
    for chain in chains {
        assert_eq!(chain["degraded"], false);
        assert!(chain["checkpoint_height"].as_u64().unwrap() > 0);
    }

    let checkpoints =
        rpc_call(&http, &url, "strait_getCheckpoints", serde_json::json!([])).await;
    let checkpoints = checkpoints.as_array().unwrap();
    assert_eq!(checkpoints.len(), 2);
    assert_eq!(checkpoints[0]["chain"], "base");
    assert_eq!(checkpoints[0]["height"], 12);
    assert_eq!(checkpoints[1]["chain"], "stellar");
    assert_eq!(checkpoints[1]["height"], 23);

    // ── 7. Graceful stop ──────────────────────────────────────────────────────
    service.stop().await;
}
