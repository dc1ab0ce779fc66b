//! strait-resolverd — the resolver daemon.
//!
//! Startup sequence:
//!   1. Parse CLI flags and the JSON chain-configuration file
//!   2. Build one chain adapter per configured ledger
//!   3. Start the resolver service (storage, ingestors, scheduler,
//!      orchestrator, intake RPC)
//!   4. Run until SIGINT, then drain gracefully

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tracing::info;

use strait_core::constants::{
    DEFAULT_CONFIRMATIONS_EVM, DEFAULT_CONFIRMATIONS_STELLAR, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_RETENTION_HORIZON_SECS,
};
use strait_core::types::ChainId;
use strait_chain::{ChainAdapter, EvmAdapter, EvmConfig, StellarAdapter, StellarConfig};
use strait_ingest::IngestorConfig;
use strait_service::{ResolverService, ServiceConfig};

#[derive(Parser, Debug)]
#[command(
    name = "strait-resolverd",
    version,
    about = "Strait resolver — cross-chain HTLC swap coordination between EVM and Stellar"
)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "~/.strait/config.json")]
    config: PathBuf,

    /// Directory for the persistent swap database (overrides the config).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Intake RPC listen address (overrides the config).
    #[arg(long)]
    listen: Option<SocketAddr>,
}

// ── Configuration file ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    #[serde(default = "default_listen")]
    listen_addr: SocketAddr,
    #[serde(default = "default_retention")]
    retention_horizon_secs: i64,
    chains: Vec<ChainEntry>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.strait/data")
}

fn default_listen() -> SocketAddr {
    "127.0.0.1:8744".parse().expect("static default address")
}

fn default_retention() -> i64 {
    DEFAULT_RETENTION_HORIZON_SECS
}

/// One ledger. The `family` tag selects the adapter implementation.
#[derive(Debug, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
enum ChainEntry {
    Evm {
        chain: ChainId,
        rpc_url: String,
        /// EIP-155 network id.
        network_id: u64,
        /// Hex-encoded secp256k1 signing key.
        signer_key: String,
        factory_address: String,
        #[serde(default)]
        confirmations: Option<u64>,
        #[serde(default)]
        poll_interval_secs: Option<u64>,
    },
    Stellar {
        rpc_url: String,
        network_passphrase: String,
        /// Hex-encoded ed25519 seed.
        signer_key: String,
        factory_address: String,
        native_token_contract: String,
        #[serde(default)]
        confirmations: Option<u64>,
        #[serde(default)]
        poll_interval_secs: Option<u64>,
    },
}

impl ChainEntry {
    fn chain_id(&self) -> ChainId {
        match self {
            ChainEntry::Evm { chain, .. } => *chain,
            ChainEntry::Stellar { .. } => ChainId::Stellar,
        }
    }

    fn ingest_config(&self) -> IngestorConfig {
        let (confirmations, poll) = match self {
            ChainEntry::Evm { confirmations, poll_interval_secs, .. } => {
                (confirmations.unwrap_or(DEFAULT_CONFIRMATIONS_EVM), poll_interval_secs)
            }
            ChainEntry::Stellar { confirmations, poll_interval_secs, .. } => {
                (confirmations.unwrap_or(DEFAULT_CONFIRMATIONS_STELLAR), poll_interval_secs)
            }
        };
        IngestorConfig {
            poll_interval: Duration::from_secs(poll.unwrap_or(DEFAULT_POLL_INTERVAL_SECS)),
            confirmations,
            ..Default::default()
        }
    }

    fn build_adapter(&self) -> anyhow::Result<Arc<dyn ChainAdapter>> {
        match self {
            ChainEntry::Evm {
                chain,
                rpc_url,
                network_id,
                signer_key,
                factory_address,
                confirmations,
                ..
            } => {
                let adapter = EvmAdapter::new(EvmConfig {
                    chain: *chain,
                    rpc_url: rpc_url.clone(),
                    network_id: *network_id,
                    signer_key: signer_key.clone(),
                    factory_address: factory_address.clone(),
                    confirmations: confirmations.unwrap_or(DEFAULT_CONFIRMATIONS_EVM),
                })
                .with_context(|| format!("building {chain} adapter"))?;
                Ok(Arc::new(adapter))
            }
            ChainEntry::Stellar {
                rpc_url,
                network_passphrase,
                signer_key,
                factory_address,
                native_token_contract,
                confirmations,
                ..
            } => {
                let adapter = StellarAdapter::new(StellarConfig {
                    rpc_url: rpc_url.clone(),
                    network_passphrase: network_passphrase.clone(),
                    signer_key: signer_key.clone(),
                    factory_address: factory_address.clone(),
                    native_token_contract: native_token_contract.clone(),
                    confirmations: confirmations.unwrap_or(DEFAULT_CONFIRMATIONS_STELLAR),
                })
                .context("building stellar adapter")?;
                Ok(Arc::new(adapter))
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,strait=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("strait resolver starting");

    let config_path = expand_tilde(&args.config);
    let raw = std::fs::read_to_string(&config_path)
        .with_context(|| format!("reading config from {}", config_path.display()))?;
    let file: ConfigFile = serde_json::from_str(&raw).context("parsing config JSON")?;

    if file.chains.is_empty() {
        anyhow::bail!("config names no chains; nothing to resolve between");
    }

    // ── Adapters ──────────────────────────────────────────────────────────────
    let mut adapters: HashMap<ChainId, Arc<dyn ChainAdapter>> = HashMap::new();
    let mut ingest = HashMap::new();
    for entry in &file.chains {
        let chain = entry.chain_id();
        if adapters.contains_key(&chain) {
            anyhow::bail!("chain {chain} configured twice");
        }
        adapters.insert(chain, entry.build_adapter()?);
        ingest.insert(chain, entry.ingest_config());
        info!(%chain, "chain configured");
    }

    // ── Service ───────────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir.unwrap_or(file.data_dir));
    let mut service_config =
        ServiceConfig::new(data_dir, args.listen.unwrap_or(file.listen_addr));
    service_config.retention_horizon_secs = file.retention_horizon_secs;
    service_config.ingest = ingest;

    let service = ResolverService::start(service_config, adapters).await?;
    info!("resolver ready");

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received");
    service.stop().await;
    Ok(())
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
