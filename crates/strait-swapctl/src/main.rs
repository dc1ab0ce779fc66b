//! strait-swapctl
//!
//! Operator CLI for a running resolver. Submits orders and queries swap
//! state over the intake JSON-RPC.
//!
//! Usage:
//!   strait-swapctl submit --order <order.json> [--rpc <url>]
//!   strait-swapctl get    --order-hash <0x…>   [--rpc <url>]
//!   strait-swapctl list   [--status <STATUS>]  [--rpc <url>]
//!   strait-swapctl status [--rpc <url>]

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use strait_core::order::OrderIntent;

mod rpc_client;
use rpc_client::ResolverRpcClient;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "strait-swapctl",
    version,
    about = "Strait control — submit and inspect cross-chain swaps"
)]
struct Args {
    /// Resolver intake RPC endpoint.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8744")]
    rpc: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a new swap order from a JSON file.
    Submit {
        /// Path to the order intent JSON.
        #[arg(long)]
        order: PathBuf,
    },

    /// Fetch one swap by order hash.
    Get {
        /// 0x-prefixed order hash hex.
        #[arg(long)]
        order_hash: String,
    },

    /// List swaps, optionally filtered by status.
    List {
        /// Status name, e.g. COMPLETED, SOURCE_FUNDED.
        #[arg(long)]
        status: Option<String>,
    },

    /// Show resolver health and per-chain checkpoints.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = ResolverRpcClient::new(&args.rpc);

    match args.command {
        Command::Submit { order } => {
            let raw = std::fs::read_to_string(&order)
                .with_context(|| format!("reading order from {}", order.display()))?;
            let intent: OrderIntent =
                serde_json::from_str(&raw).context("parsing order intent JSON")?;
            let result = client.submit_order(&intent).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Get { order_hash } => match client.get_swap(&order_hash).await? {
            Some(swap) => println!("{}", serde_json::to_string_pretty(&swap)?),
            None => println!("swap not found: {order_hash}"),
        },
        Command::List { status } => {
            let swaps = client.list_swaps(status.as_deref()).await?;
            if swaps.is_empty() {
                println!("no swaps");
            }
            for swap in swaps {
                let hash = swap["order_hash"].as_str().unwrap_or("?");
                let status = swap["status"].as_str().unwrap_or("?");
                let src = swap["src_chain"].as_str().unwrap_or("?");
                let dst = swap["dst_chain"].as_str().unwrap_or("?");
                println!("{hash}  {src} -> {dst}  {status}");
            }
        }
        Command::Status => {
            let status = client.get_status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}
