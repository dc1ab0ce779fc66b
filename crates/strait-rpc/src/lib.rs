//! strait-rpc
//!
//! The order-intake and status surface: a JSON-RPC 2.0 server exposing
//! `strait_submitOrder` plus read-only swap, checkpoint and health
//! queries. Thin by design — validation and all state changes live in the
//! orchestrator.

pub mod api;
pub mod server;
pub mod types;

pub use jsonrpsee::server::ServerHandle;
pub use server::{RpcServer, RpcServerState};
