//! Ethereum-family adapter.
//!
//! Speaks raw eth JSON-RPC. Outbound calls are legacy EIP-155 transactions,
//! RLP-encoded and signed locally with the resolver's secp256k1 key. The
//! escrow factory and escrow instances expose:
//!
//!   factory:  deployEscrow(bytes32,bytes32,address,address,address,uint256,uint256)
//!             predictEscrow(...same args...) → address
//!   escrow:   deposit()  withdraw(bytes32)  cancel()
//!             state() → uint8  immutables() → (bytes32,bytes32,uint256)
//!
//! and emit:
//!
//!   EscrowCreated(bytes32 indexed orderHash, address escrow)     [factory]
//!   EscrowFunded(bytes32 indexed orderHash, uint256 amount)
//!   EscrowWithdrawn(bytes32 indexed orderHash, bytes32 secret)
//!   EscrowCancelled(bytes32 indexed orderHash)
//!
//! A Withdrawn log carries the secret, so it is surfaced as two canonical
//! events: SecretRevealed first, then Withdrawn.

use k256::ecdsa::SigningKey;
use primitive_types::U256;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use strait_core::types::{Amount, ChainId, Hashlock, Height, OrderHash, Preimage};
use strait_core::{EscrowEvent, EscrowEventKind, ResolverError};
use strait_crypto::keccak256;

use crate::adapter::{
    ChainAdapter, DeployReceipt, EscrowImmutables, EscrowParams, EscrowState, EscrowStatus,
};
use crate::retry::with_retry;
use crate::rpc::JsonRpcClient;

#[derive(Clone, Debug)]
pub struct EvmConfig {
    pub chain: ChainId,
    pub rpc_url: String,
    /// EIP-155 network id (1 mainnet, 8453 Base, 11155111 Sepolia).
    pub network_id: u64,
    /// Hex-encoded 32-byte secp256k1 signing key.
    pub signer_key: String,
    /// Escrow factory contract address.
    pub factory_address: String,
    pub confirmations: u64,
}

pub struct EvmAdapter {
    cfg: EvmConfig,
    rpc: JsonRpcClient,
    signer: SigningKey,
    sender: [u8; 20],
    factory: [u8; 20],
    /// One in-flight submission at a time: nonces are fetched per submit
    /// and two concurrent sends from the same account would collide.
    submit_lock: Mutex<()>,
}

// ── ABI helpers ──────────────────────────────────────────────────────────────

fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn event_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak256(signature.as_bytes())))
}

fn enc_bytes32(out: &mut Vec<u8>, b: &[u8; 32]) {
    out.extend_from_slice(b);
}

fn enc_address(out: &mut Vec<u8>, addr: &[u8; 20]) {
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(addr);
}

fn enc_u256(out: &mut Vec<u8>, v: &U256) {
    let mut word = [0u8; 32];
    v.to_big_endian(&mut word);
    out.extend_from_slice(&word);
}

fn parse_address(chain: ChainId, s: &str) -> Result<[u8; 20], ResolverError> {
    let bytes = hex::decode(s.trim_start_matches("0x"))
        .map_err(|_| ResolverError::InvalidAddress { chain, address: s.to_string() })?;
    if bytes.len() != 20 {
        return Err(ResolverError::InvalidAddress { chain, address: s.to_string() });
    }
    let mut arr = [0u8; 20];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

fn addr_hex(addr: &[u8; 20]) -> String {
    format!("0x{}", hex::encode(addr))
}

fn hex_to_u64(chain: ChainId, v: &Value, what: &str) -> Result<u64, ResolverError> {
    let s = v
        .as_str()
        .ok_or_else(|| ResolverError::ChainRpc { chain, message: format!("missing {what}") })?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| ResolverError::ChainRpc { chain, message: format!("bad {what}: {e}") })
}

fn hex_to_bytes(chain: ChainId, v: &Value, what: &str) -> Result<Vec<u8>, ResolverError> {
    let s = v
        .as_str()
        .ok_or_else(|| ResolverError::ChainRpc { chain, message: format!("missing {what}") })?;
    hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| ResolverError::ChainRpc { chain, message: format!("bad {what}: {e}") })
}

/// Big-endian minimal bytes (RLP integer form).
fn trimmed_be(v: &U256) -> Vec<u8> {
    let mut word = [0u8; 32];
    v.to_big_endian(&mut word);
    let first = word.iter().position(|b| *b != 0).unwrap_or(32);
    word[first..].to_vec()
}

/// eth nodes report reverts as RPC errors; those must never be retried.
fn classify_rpc_error(chain: ChainId, err: ResolverError) -> ResolverError {
    match err {
        ResolverError::ChainRpc { message, .. }
            if message.contains("revert") || message.contains("execution reverted") =>
        {
            ResolverError::EscrowReverted { chain, reason: message }
        }
        other => other,
    }
}

impl EvmAdapter {
    pub fn new(cfg: EvmConfig) -> Result<Self, ResolverError> {
        let rpc = JsonRpcClient::new(cfg.chain, &cfg.rpc_url)?;

        let key_bytes = hex::decode(cfg.signer_key.trim_start_matches("0x"))
            .map_err(|e| ResolverError::Other(format!("bad evm signer key: {e}")))?;
        let signer = SigningKey::from_slice(&key_bytes)
            .map_err(|e| ResolverError::Other(format!("bad evm signer key: {e}")))?;

        let verifying = signer.verifying_key();
        let encoded = verifying.to_encoded_point(false);
        let pubkey_hash = keccak256(&encoded.as_bytes()[1..]);
        let mut sender = [0u8; 20];
        sender.copy_from_slice(&pubkey_hash[12..]);

        let factory = parse_address(cfg.chain, &cfg.factory_address)?;

        info!(chain = %cfg.chain, sender = %addr_hex(&sender), "evm adapter ready");
        Ok(Self { cfg, rpc, signer, sender, factory, submit_lock: Mutex::new(()) })
    }

    fn deploy_calldata(&self, params: &EscrowParams) -> Result<(Vec<u8>, Vec<u8>), ResolverError> {
        const SIG: &str = "deployEscrow(bytes32,bytes32,address,address,address,uint256,uint256)";
        const PREDICT_SIG: &str =
            "predictEscrow(bytes32,bytes32,address,address,address,uint256,uint256)";

        let maker = parse_address(self.cfg.chain, &params.maker)?;
        let taker = parse_address(self.cfg.chain, &params.taker)?;
        let token = parse_address(self.cfg.chain, &params.asset)?;

        let mut args = Vec::with_capacity(7 * 32);
        enc_bytes32(&mut args, params.order_hash.as_bytes());
        enc_bytes32(&mut args, params.hashlock.as_bytes());
        enc_address(&mut args, &maker);
        enc_address(&mut args, &taker);
        enc_address(&mut args, &token);
        enc_u256(&mut args, &params.amount.0);
        enc_u256(&mut args, &U256::from(params.timelocks_packed));

        let mut deploy = selector(SIG).to_vec();
        deploy.extend_from_slice(&args);
        let mut predict = selector(PREDICT_SIG).to_vec();
        predict.extend_from_slice(&args);
        Ok((deploy, predict))
    }

    async fn eth_call(&self, to: &[u8; 20], data: Vec<u8>) -> Result<Vec<u8>, ResolverError> {
        let chain = self.cfg.chain;
        let result = with_retry(chain, "eth_call", || {
            let params = json!([
                { "to": addr_hex(to), "data": format!("0x{}", hex::encode(&data)) },
                "latest"
            ]);
            async move {
                self.rpc.call("eth_call", params).await.map_err(|e| classify_rpc_error(chain, e))
            }
        })
        .await?;
        hex_to_bytes(chain, &result, "eth_call result")
    }

    /// Sign and broadcast a legacy transaction. Serialized per adapter so
    /// concurrent submissions cannot reuse a nonce.
    async fn submit(
        &self,
        to: &[u8; 20],
        data: Vec<u8>,
        value: U256,
    ) -> Result<String, ResolverError> {
        let _guard = self.submit_lock.lock().await;
        let chain = self.cfg.chain;

        let nonce = hex_to_u64(
            chain,
            &with_retry(chain, "eth_getTransactionCount", || {
                let params = json!([addr_hex(&self.sender), "pending"]);
                async move { self.rpc.call("eth_getTransactionCount", params).await }
            })
            .await?,
            "nonce",
        )?;

        let gas_price = hex_to_u64(
            chain,
            &with_retry(chain, "eth_gasPrice", || async {
                self.rpc.call("eth_gasPrice", json!([])).await
            })
            .await?,
            "gas price",
        )?;

        // Estimation doubles as the revert check: a reverting call fails
        // here and is surfaced without submitting anything.
        let gas = hex_to_u64(
            chain,
            &with_retry(chain, "eth_estimateGas", || {
                let params = json!([{
                    "from": addr_hex(&self.sender),
                    "to": addr_hex(to),
                    "data": format!("0x{}", hex::encode(&data)),
                    "value": format!("0x{:x}", value),
                }]);
                async move {
                    self.rpc
                        .call("eth_estimateGas", params)
                        .await
                        .map_err(|e| classify_rpc_error(chain, e))
                }
            })
            .await?,
            "gas estimate",
        )?;

        let raw = self.sign_legacy(nonce, gas_price, gas + gas / 5, to, value, &data)?;

        let tx_hash = with_retry(chain, "eth_sendRawTransaction", || {
            let params = json!([format!("0x{}", hex::encode(&raw))]);
            async move {
                self.rpc
                    .call("eth_sendRawTransaction", params)
                    .await
                    .map_err(|e| classify_rpc_error(chain, e))
            }
        })
        .await?;

        let tx_hash = tx_hash
            .as_str()
            .ok_or_else(|| ResolverError::ChainRpc { chain, message: "missing tx hash".into() })?
            .to_string();
        debug!(chain = %chain, tx = %tx_hash, "transaction submitted");
        Ok(tx_hash)
    }

    fn sign_legacy(
        &self,
        nonce: u64,
        gas_price: u64,
        gas: u64,
        to: &[u8; 20],
        value: U256,
        data: &[u8],
    ) -> Result<Vec<u8>, ResolverError> {
        let mut unsigned = rlp::RlpStream::new_list(9);
        unsigned.append(&nonce);
        unsigned.append(&gas_price);
        unsigned.append(&gas);
        unsigned.append(&to.to_vec());
        unsigned.append(&trimmed_be(&value));
        unsigned.append(&data.to_vec());
        unsigned.append(&self.cfg.network_id);
        unsigned.append_empty_data();
        unsigned.append_empty_data();

        let sighash = keccak256(&unsigned.out());
        let (signature, recovery_id) = self
            .signer
            .sign_prehash_recoverable(&sighash)
            .map_err(|e| ResolverError::Other(format!("evm signing failed: {e}")))?;
        let sig_bytes = signature.to_bytes();
        let v = self.cfg.network_id * 2 + 35 + recovery_id.to_byte() as u64;

        let mut signed = rlp::RlpStream::new_list(9);
        signed.append(&nonce);
        signed.append(&gas_price);
        signed.append(&gas);
        signed.append(&to.to_vec());
        signed.append(&trimmed_be(&value));
        signed.append(&data.to_vec());
        signed.append(&v);
        signed.append(&trimmed_be(&U256::from_big_endian(&sig_bytes[..32])));
        signed.append(&trimmed_be(&U256::from_big_endian(&sig_bytes[32..])));
        Ok(signed.out().to_vec())
    }

    fn decode_log(&self, log: &Value) -> Result<Vec<EscrowEvent>, ResolverError> {
        let chain = self.cfg.chain;
        let topics = log
            .get("topics")
            .and_then(Value::as_array)
            .ok_or_else(|| ResolverError::ChainRpc { chain, message: "log without topics".into() })?;
        if topics.len() < 2 {
            return Ok(Vec::new());
        }
        let topic0 = topics[0].as_str().unwrap_or_default().to_ascii_lowercase();
        let order_bytes = hex_to_bytes(chain, &topics[1], "order hash topic")?;
        if order_bytes.len() != 32 {
            return Ok(Vec::new());
        }
        let mut order_arr = [0u8; 32];
        order_arr.copy_from_slice(&order_bytes);
        let order_hash = OrderHash::from_bytes(order_arr);

        let height = hex_to_u64(chain, &log["blockNumber"], "blockNumber")?;
        let tx_id = log["transactionHash"].as_str().unwrap_or_default().to_string();
        let log_index = hex_to_u64(chain, &log["logIndex"], "logIndex")? as u32;
        let data = hex_to_bytes(chain, &log["data"], "log data").unwrap_or_default();

        let event = |escrow: String, kind: EscrowEventKind| EscrowEvent {
            chain,
            order_hash,
            escrow_address: escrow,
            height,
            tx_id: tx_id.clone(),
            log_index,
            kind,
        };

        let emitter = log["address"].as_str().unwrap_or_default().to_ascii_lowercase();

        if topic0 == event_topic("EscrowCreated(bytes32,address)") {
            // The escrow address is the single data word's last 20 bytes.
            if data.len() < 32 {
                return Ok(Vec::new());
            }
            let escrow = format!("0x{}", hex::encode(&data[12..32]));
            return Ok(vec![event(escrow, EscrowEventKind::Created)]);
        }
        if topic0 == event_topic("EscrowFunded(bytes32,uint256)") {
            return Ok(vec![event(emitter, EscrowEventKind::Funded)]);
        }
        if topic0 == event_topic("EscrowWithdrawn(bytes32,bytes32)") {
            if data.len() < 32 {
                return Ok(Vec::new());
            }
            let mut secret = [0u8; 32];
            secret.copy_from_slice(&data[..32]);
            return Ok(vec![
                event(
                    emitter.clone(),
                    EscrowEventKind::SecretRevealed { preimage: Preimage::from_bytes(secret) },
                ),
                event(emitter, EscrowEventKind::Withdrawn),
            ]);
        }
        if topic0 == event_topic("EscrowCancelled(bytes32)") {
            return Ok(vec![event(emitter, EscrowEventKind::Cancelled)]);
        }
        Ok(Vec::new())
    }
}

#[async_trait::async_trait]
impl ChainAdapter for EvmAdapter {
    fn chain_id(&self) -> ChainId {
        self.cfg.chain
    }

    async fn latest_height(&self) -> Result<Height, ResolverError> {
        let chain = self.cfg.chain;
        let tip = hex_to_u64(
            chain,
            &with_retry(chain, "eth_blockNumber", || async {
                self.rpc.call("eth_blockNumber", json!([])).await
            })
            .await?,
            "block number",
        )?;
        Ok(tip.saturating_sub(self.cfg.confirmations))
    }

    async fn poll_events(
        &self,
        from: Height,
        to: Height,
    ) -> Result<Vec<EscrowEvent>, ResolverError> {
        let chain = self.cfg.chain;
        let topics = json!([[
            event_topic("EscrowCreated(bytes32,address)"),
            event_topic("EscrowFunded(bytes32,uint256)"),
            event_topic("EscrowWithdrawn(bytes32,bytes32)"),
            event_topic("EscrowCancelled(bytes32)"),
        ]]);
        let logs = with_retry(chain, "eth_getLogs", || {
            let params = json!([{
                "fromBlock": format!("0x{from:x}"),
                "toBlock": format!("0x{to:x}"),
                "topics": topics.clone(),
            }]);
            async move { self.rpc.call("eth_getLogs", params).await }
        })
        .await?;

        let mut events = Vec::new();
        for log in logs.as_array().map(|a| a.as_slice()).unwrap_or_default() {
            events.extend(self.decode_log(log)?);
        }
        events.sort_by(|a, b| (a.height, a.log_index).cmp(&(b.height, b.log_index)));
        Ok(events)
    }

    async fn predict_escrow(&self, params: &EscrowParams) -> Result<String, ResolverError> {
        let (_, predict) = self.deploy_calldata(params)?;
        let word = self.eth_call(&self.factory, predict).await?;
        if word.len() < 32 {
            return Err(ResolverError::ChainRpc {
                chain: self.cfg.chain,
                message: "short predictEscrow result".into(),
            });
        }
        Ok(format!("0x{}", hex::encode(&word[12..32])))
    }

    async fn deploy_escrow(&self, params: &EscrowParams) -> Result<DeployReceipt, ResolverError> {
        let escrow_address = self.predict_escrow(params).await?;
        let (deploy, _) = self.deploy_calldata(params)?;
        let tx_id = self.submit(&self.factory, deploy, U256::zero()).await?;
        info!(chain = %self.cfg.chain, order = %params.order_hash, escrow = %escrow_address,
              "escrow deployment submitted");
        Ok(DeployReceipt { escrow_address, tx_id })
    }

    async fn fund_escrow(
        &self,
        escrow: &str,
        asset: &str,
        amount: Amount,
    ) -> Result<String, ResolverError> {
        let escrow_addr = parse_address(self.cfg.chain, escrow)?;
        if asset == "native" {
            let data = selector("deposit()").to_vec();
            return self.submit(&escrow_addr, data, amount.0).await;
        }

        // ERC-20: approve the escrow, then trigger its pull-deposit.
        let token = parse_address(self.cfg.chain, asset)?;
        let mut approve = selector("approve(address,uint256)").to_vec();
        enc_address(&mut approve, &escrow_addr);
        enc_u256(&mut approve, &amount.0);
        self.submit(&token, approve, U256::zero()).await?;

        let deposit = selector("deposit()").to_vec();
        self.submit(&escrow_addr, deposit, U256::zero()).await
    }

    async fn withdraw(&self, escrow: &str, preimage: &Preimage) -> Result<String, ResolverError> {
        let escrow_addr = parse_address(self.cfg.chain, escrow)?;
        let mut data = selector("withdraw(bytes32)").to_vec();
        enc_bytes32(&mut data, preimage.as_bytes());
        self.submit(&escrow_addr, data, U256::zero()).await
    }

    async fn cancel(&self, escrow: &str) -> Result<String, ResolverError> {
        let escrow_addr = parse_address(self.cfg.chain, escrow)?;
        let data = selector("cancel()").to_vec();
        self.submit(&escrow_addr, data, U256::zero()).await
    }

    async fn get_escrow_state(&self, escrow: &str) -> Result<EscrowState, ResolverError> {
        let chain = self.cfg.chain;
        let escrow_addr = parse_address(chain, escrow)?;

        let state_word = self.eth_call(&escrow_addr, selector("state()").to_vec()).await?;
        let status = match state_word.last().copied().unwrap_or(255) {
            0 => EscrowStatus::Created,
            1 => EscrowStatus::Funded,
            2 => EscrowStatus::Withdrawn,
            3 => EscrowStatus::Cancelled,
            other => {
                return Err(ResolverError::ChainRpc {
                    chain,
                    message: format!("unknown escrow state {other}"),
                })
            }
        };

        let imm = self.eth_call(&escrow_addr, selector("immutables()").to_vec()).await?;
        if imm.len() < 96 {
            return Err(ResolverError::ChainRpc {
                chain,
                message: "short immutables result".into(),
            });
        }
        let mut order = [0u8; 32];
        order.copy_from_slice(&imm[..32]);
        let mut lock = [0u8; 32];
        lock.copy_from_slice(&imm[32..64]);
        let amount = Amount(U256::from_big_endian(&imm[64..96]));

        Ok(EscrowState {
            status,
            immutables: EscrowImmutables {
                order_hash: OrderHash::from_bytes(order),
                hashlock: Hashlock::from_bytes(lock),
                amount,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_first_four_keccak_bytes() {
        // Known vector: the canonical ERC-20 approve selector.
        assert_eq!(hex::encode(selector("approve(address,uint256)")), "095ea7b3");
    }

    #[test]
    fn abi_words_are_32_byte_aligned() {
        let mut out = Vec::new();
        enc_bytes32(&mut out, &[0x11; 32]);
        enc_address(&mut out, &[0x22; 20]);
        enc_u256(&mut out, &U256::from(7u64));
        assert_eq!(out.len(), 96);
        assert_eq!(&out[32..44], &[0u8; 12]);
        assert_eq!(out[95], 7);
    }

    #[test]
    fn trimmed_be_strips_leading_zeros() {
        assert!(trimmed_be(&U256::zero()).is_empty());
        assert_eq!(trimmed_be(&U256::from(0x1234u64)), vec![0x12, 0x34]);
    }

    #[test]
    fn revert_errors_are_classified() {
        let err = ResolverError::ChainRpc {
            chain: ChainId::Base,
            message: "execution reverted: AlreadyWithdrawn".into(),
        };
        assert!(matches!(
            classify_rpc_error(ChainId::Base, err),
            ResolverError::EscrowReverted { .. }
        ));

        let err = ResolverError::RpcTimeout { chain: ChainId::Base, method: "x".into() };
        assert!(matches!(
            classify_rpc_error(ChainId::Base, err),
            ResolverError::RpcTimeout { .. }
        ));
    }
}
