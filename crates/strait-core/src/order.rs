//! The inbound order intent accepted by the intake surface.

use serde::{Deserialize, Serialize};

use crate::timelocks::Timelocks;
use crate::types::{ChainId, Hashlock};

/// A new swap request as submitted by a user or frontend.
///
/// Amounts arrive as decimal strings in the asset's smallest unit and are
/// parsed into [`crate::types::Amount`] during validation — they are never
/// interpreted as floats. The hashlock is optional; when absent the
/// resolver generates the secret and derives it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderIntent {
    pub src_chain: ChainId,
    pub dst_chain: ChainId,
    pub maker: String,
    pub taker: String,
    pub maker_asset: String,
    pub taker_asset: String,
    pub making_amount: String,
    pub taking_amount: String,
    #[serde(default)]
    pub hashlock: Option<Hashlock>,
    pub timelocks: Timelocks,
}

/// Canonical serialization body for order-hash derivation. Field order is
/// part of the wire contract; never reorder.
#[derive(Serialize)]
pub struct OrderHashBody<'a> {
    pub src_chain: ChainId,
    pub dst_chain: ChainId,
    pub maker: &'a str,
    pub taker: &'a str,
    pub maker_asset: &'a str,
    pub taker_asset: &'a str,
    pub making_amount: &'a str,
    pub taking_amount: &'a str,
    pub hashlock: Option<Hashlock>,
    pub timelocks: Timelocks,
}

impl OrderIntent {
    pub fn hash_body(&self) -> OrderHashBody<'_> {
        OrderHashBody {
            src_chain: self.src_chain,
            dst_chain: self.dst_chain,
            maker: &self.maker,
            taker: &self.taker,
            maker_asset: &self.maker_asset,
            taker_asset: &self.taker_asset,
            making_amount: &self.making_amount,
            taking_amount: &self.taking_amount,
            hashlock: self.hashlock,
            timelocks: self.timelocks,
        }
    }
}
