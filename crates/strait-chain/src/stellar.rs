//! Stellar Soroban adapter.
//!
//! Speaks Soroban RPC. Reads go through `simulateTransaction`; writes use
//! the standard simulate → assemble → sign → send flow, with resource data
//! and authorization entries taken from the simulation result. Envelopes
//! are built from `stellar-xdr` types and signed with the resolver's
//! ed25519 key.
//!
//! Consumed contract surface (escrow factory + per-swap escrow instances,
//! deployed at addresses derived from the factory address and the order
//! hash as salt):
//!
//!   factory: deploy_escrow(order_hash, hashlock, maker, taker, token,
//!                          amount, timelocks, timelocks_base)
//!   escrow:  withdraw(secret)  cancel()  get_state() → u32
//!            get_immutables() → map{order_hash, hashlock, amount}
//!   token:   transfer(from, to, amount)
//!
//! Events are published with topics [sym!("escrow"), sym!(<kind>),
//! bytes(order_hash)]; a "withdrawn" event's value carries the secret, so
//! it is surfaced as SecretRevealed followed by Withdrawn.

use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use stellar_xdr::curr::{
    AccountId, ContractIdPreimage, ContractIdPreimageFromAddress, DecoratedSignature, Hash,
    HashIdPreimage, HashIdPreimageContractId, HostFunction, Int128Parts, InvokeContractArgs,
    InvokeHostFunctionOp, LedgerEntryData, LedgerKey, LedgerKeyAccount, Limits, Memo,
    MuxedAccount, Operation, OperationBody, Preconditions, PublicKey, ReadXdr, ScAddress,
    ScBytes, ScSymbol, ScVal, SequenceNumber, Signature, SignatureHint,
    SorobanAuthorizationEntry, SorobanTransactionData, Transaction, TransactionEnvelope,
    TransactionExt, TransactionSignaturePayload, TransactionSignaturePayloadTaggedTransaction,
    TransactionV1Envelope, Uint256, WriteXdr,
};

use strait_core::types::{Amount, ChainId, Hashlock, Height, OrderHash, Preimage};
use strait_core::{EscrowEvent, EscrowEventKind, ResolverError};
use strait_crypto::sha256;

use crate::adapter::{
    ChainAdapter, DeployReceipt, EscrowImmutables, EscrowParams, EscrowState, EscrowStatus,
};
use crate::retry::with_retry;
use crate::rpc::JsonRpcClient;

#[derive(Clone, Debug)]
pub struct StellarConfig {
    pub rpc_url: String,
    /// Network passphrase; hashed into every signature payload.
    pub network_passphrase: String,
    /// Hex-encoded 32-byte ed25519 seed.
    pub signer_key: String,
    /// Escrow factory contract id ("C…").
    pub factory_address: String,
    /// Stellar Asset Contract id used when an order names the "native" asset.
    pub native_token_contract: String,
    pub confirmations: u64,
}

pub struct StellarAdapter {
    cfg: StellarConfig,
    rpc: JsonRpcClient,
    signer: SigningKey,
    /// sha256(network passphrase).
    network_id: [u8; 32],
    /// One in-flight submission at a time (account sequence safety).
    submit_lock: Mutex<()>,
}

const CHAIN: ChainId = ChainId::Stellar;
const BASE_FEE: u32 = 100;

fn xdr_err(e: impl std::fmt::Display) -> ResolverError {
    ResolverError::Serialization(format!("xdr: {e}"))
}

fn rpc_shape_err(what: &str) -> ResolverError {
    ResolverError::ChainRpc { chain: CHAIN, message: format!("malformed {what} response") }
}

/// Parse a strkey into an ScAddress ("G…" account or "C…" contract).
fn parse_sc_address(s: &str) -> Result<ScAddress, ResolverError> {
    match stellar_strkey::Strkey::from_string(s) {
        Ok(stellar_strkey::Strkey::PublicKeyEd25519(pk)) => Ok(ScAddress::Account(AccountId(
            PublicKey::PublicKeyTypeEd25519(Uint256(pk.0)),
        ))),
        Ok(stellar_strkey::Strkey::Contract(c)) => Ok(ScAddress::Contract(Hash(c.0))),
        _ => Err(ResolverError::InvalidAddress { chain: CHAIN, address: s.to_string() }),
    }
}

fn contract_strkey(id: &[u8; 32]) -> String {
    stellar_strkey::Contract(*id).to_string()
}

fn sc_symbol(s: &str) -> Result<ScSymbol, ResolverError> {
    Ok(ScSymbol(s.try_into().map_err(xdr_err)?))
}

fn sc_bytes(b: &[u8]) -> Result<ScVal, ResolverError> {
    Ok(ScVal::Bytes(ScBytes(b.to_vec().try_into().map_err(xdr_err)?)))
}

fn sc_i128(v: i128) -> ScVal {
    ScVal::I128(Int128Parts { hi: (v >> 64) as i64, lo: v as u64 })
}

impl StellarAdapter {
    pub fn new(cfg: StellarConfig) -> Result<Self, ResolverError> {
        let rpc = JsonRpcClient::new(CHAIN, &cfg.rpc_url)?;

        let seed = hex::decode(cfg.signer_key.trim_start_matches("0x"))
            .map_err(|e| ResolverError::Other(format!("bad stellar signer key: {e}")))?;
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| ResolverError::Other("stellar signer key must be 32 bytes".into()))?;
        let signer = SigningKey::from_bytes(&seed);

        let network_id = sha256(cfg.network_passphrase.as_bytes());

        // Fail fast on a bad factory address.
        parse_sc_address(&cfg.factory_address)?;

        info!(
            account = %stellar_strkey::ed25519::PublicKey(signer.verifying_key().to_bytes()),
            "stellar adapter ready"
        );
        Ok(Self { cfg, rpc, signer, network_id, submit_lock: Mutex::new(()) })
    }

    fn source_account(&self) -> MuxedAccount {
        MuxedAccount::Ed25519(Uint256(self.signer.verifying_key().to_bytes()))
    }

    fn resolver_address(&self) -> ScAddress {
        ScAddress::Account(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(
            self.signer.verifying_key().to_bytes(),
        ))))
    }

    fn token_address(&self, asset: &str) -> Result<ScAddress, ResolverError> {
        if asset == "native" {
            parse_sc_address(&self.cfg.native_token_contract)
        } else {
            parse_sc_address(asset)
        }
    }

    // ── Account sequence ─────────────────────────────────────────────────────

    async fn account_seq(&self) -> Result<i64, ResolverError> {
        let key = LedgerKey::Account(LedgerKeyAccount {
            account_id: AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(
                self.signer.verifying_key().to_bytes(),
            ))),
        });
        let key_b64 = key.to_xdr_base64(Limits::none()).map_err(xdr_err)?;

        let result = with_retry(CHAIN, "getLedgerEntries", || {
            let params = json!({ "keys": [key_b64.clone()] });
            async move { self.rpc.call("getLedgerEntries", params).await }
        })
        .await?;

        let entry_b64 = result["entries"]
            .get(0)
            .and_then(|e| e["xdr"].as_str())
            .ok_or_else(|| rpc_shape_err("getLedgerEntries"))?;
        let entry = LedgerEntryData::from_xdr_base64(entry_b64, Limits::none()).map_err(xdr_err)?;
        match entry {
            LedgerEntryData::Account(acc) => Ok(acc.seq_num.0),
            _ => Err(rpc_shape_err("account entry")),
        }
    }

    // ── Transaction building ─────────────────────────────────────────────────

    fn build_invoke_tx(
        &self,
        contract: ScAddress,
        func: &str,
        args: Vec<ScVal>,
        seq: i64,
    ) -> Result<Transaction, ResolverError> {
        let op = Operation {
            source_account: None,
            body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
                host_function: HostFunction::InvokeContract(InvokeContractArgs {
                    contract_address: contract,
                    function_name: sc_symbol(func)?,
                    args: args.try_into().map_err(xdr_err)?,
                }),
                auth: Vec::new().try_into().map_err(xdr_err)?,
            }),
        };
        Ok(Transaction {
            source_account: self.source_account(),
            fee: BASE_FEE,
            seq_num: SequenceNumber(seq),
            cond: Preconditions::None,
            memo: Memo::None,
            operations: vec![op].try_into().map_err(xdr_err)?,
            ext: TransactionExt::V0,
        })
    }

    fn unsigned_envelope(tx: &Transaction) -> Result<String, ResolverError> {
        TransactionEnvelope::Tx(TransactionV1Envelope {
            tx: tx.clone(),
            signatures: Vec::new().try_into().map_err(xdr_err)?,
        })
        .to_xdr_base64(Limits::none())
        .map_err(xdr_err)
    }

    async fn simulate(&self, tx: &Transaction) -> Result<Value, ResolverError> {
        let envelope = Self::unsigned_envelope(tx)?;
        let result = with_retry(CHAIN, "simulateTransaction", || {
            let params = json!({ "transaction": envelope.clone() });
            async move { self.rpc.call("simulateTransaction", params).await }
        })
        .await?;

        // A simulation error is the contract refusing the call — a revert,
        // never retried.
        if let Some(err) = result.get("error").and_then(Value::as_str) {
            return Err(ResolverError::EscrowReverted { chain: CHAIN, reason: err.to_string() });
        }
        Ok(result)
    }

    /// Fold the simulation's resource data, fee and auth into the tx.
    fn assemble(&self, tx: &mut Transaction, sim: &Value) -> Result<(), ResolverError> {
        let data_b64 =
            sim["transactionData"].as_str().ok_or_else(|| rpc_shape_err("transactionData"))?;
        let soroban_data =
            SorobanTransactionData::from_xdr_base64(data_b64, Limits::none()).map_err(xdr_err)?;
        tx.ext = TransactionExt::V1(soroban_data);

        let min_fee: u32 = sim["minResourceFee"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| sim["minResourceFee"].as_u64().map(|v| v as u32))
            .ok_or_else(|| rpc_shape_err("minResourceFee"))?;
        tx.fee = BASE_FEE + min_fee;

        if let Some(auth_list) = sim["results"].get(0).and_then(|r| r["auth"].as_array()) {
            let mut entries = Vec::with_capacity(auth_list.len());
            for a in auth_list {
                let a = a.as_str().ok_or_else(|| rpc_shape_err("auth entry"))?;
                entries.push(
                    SorobanAuthorizationEntry::from_xdr_base64(a, Limits::none())
                        .map_err(xdr_err)?,
                );
            }
            let mut ops = tx.operations.to_vec();
            if let Some(Operation {
                body: OperationBody::InvokeHostFunction(ref mut op), ..
            }) = ops.first_mut()
            {
                op.auth = entries.try_into().map_err(xdr_err)?;
            }
            tx.operations = ops.try_into().map_err(xdr_err)?;
        }
        Ok(())
    }

    fn sign_envelope(&self, tx: Transaction) -> Result<String, ResolverError> {
        let payload = TransactionSignaturePayload {
            network_id: Hash(self.network_id),
            tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(tx.clone()),
        };
        let payload_hash = sha256(&payload.to_xdr(Limits::none()).map_err(xdr_err)?);
        let signature = self.signer.sign(&payload_hash);

        let pubkey = self.signer.verifying_key().to_bytes();
        let mut hint = [0u8; 4];
        hint.copy_from_slice(&pubkey[28..]);

        let decorated = DecoratedSignature {
            hint: SignatureHint(hint),
            signature: Signature(signature.to_bytes().to_vec().try_into().map_err(xdr_err)?),
        };
        TransactionEnvelope::Tx(TransactionV1Envelope {
            tx,
            signatures: vec![decorated].try_into().map_err(xdr_err)?,
        })
        .to_xdr_base64(Limits::none())
        .map_err(xdr_err)
    }

    /// Full write path: simulate, assemble, sign, send. Returns the tx hash.
    async fn invoke(
        &self,
        contract: ScAddress,
        func: &str,
        args: Vec<ScVal>,
    ) -> Result<String, ResolverError> {
        let _guard = self.submit_lock.lock().await;

        let seq = self.account_seq().await? + 1;
        let mut tx = self.build_invoke_tx(contract, func, args, seq)?;
        let sim = self.simulate(&tx).await?;
        self.assemble(&mut tx, &sim)?;
        let envelope = self.sign_envelope(tx)?;

        let result = with_retry(CHAIN, "sendTransaction", || {
            let params = json!({ "transaction": envelope.clone() });
            async move { self.rpc.call("sendTransaction", params).await }
        })
        .await?;

        let status = result["status"].as_str().unwrap_or_default();
        if status == "ERROR" {
            return Err(ResolverError::EscrowReverted {
                chain: CHAIN,
                reason: result["errorResultXdr"].as_str().unwrap_or("sendTransaction ERROR").into(),
            });
        }
        let hash = result["hash"]
            .as_str()
            .ok_or_else(|| rpc_shape_err("sendTransaction"))?
            .to_string();
        debug!(func, tx = %hash, "soroban transaction submitted");
        Ok(hash)
    }

    /// Read path: the return value of a simulated invocation.
    async fn simulate_value(
        &self,
        contract: ScAddress,
        func: &str,
        args: Vec<ScVal>,
    ) -> Result<ScVal, ResolverError> {
        let seq = self.account_seq().await? + 1;
        let tx = self.build_invoke_tx(contract, func, args, seq)?;
        let sim = self.simulate(&tx).await?;
        let xdr_b64 = sim["results"]
            .get(0)
            .and_then(|r| r["xdr"].as_str())
            .ok_or_else(|| rpc_shape_err("simulation result"))?;
        ScVal::from_xdr_base64(xdr_b64, Limits::none()).map_err(xdr_err)
    }

    // ── Event decoding ───────────────────────────────────────────────────────

    fn decode_event(&self, ev: &Value, position: u32) -> Option<Vec<EscrowEvent>> {
        let topics = ev["topic"].as_array()?;
        if topics.len() < 3 {
            return None;
        }
        let tag = match ScVal::from_xdr_base64(topics[0].as_str()?, Limits::none()).ok()? {
            ScVal::Symbol(s) => s.to_utf8_string_lossy(),
            _ => return None,
        };
        if tag != "escrow" {
            return None;
        }
        let kind_sym = match ScVal::from_xdr_base64(topics[1].as_str()?, Limits::none()).ok()? {
            ScVal::Symbol(s) => s.to_utf8_string_lossy(),
            _ => return None,
        };
        let order_hash = match ScVal::from_xdr_base64(topics[2].as_str()?, Limits::none()).ok()? {
            ScVal::Bytes(b) if b.len() == 32 => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(b.as_slice());
                OrderHash::from_bytes(arr)
            }
            _ => return None,
        };

        let height = ev["ledger"].as_u64()?;
        let tx_id = ev["txHash"].as_str().unwrap_or_default().to_string();
        let escrow_address = ev["contractId"].as_str().unwrap_or_default().to_string();
        let log_index = ev["id"]
            .as_str()
            .and_then(|id| id.rsplit('-').next())
            .and_then(|s| s.parse().ok())
            .unwrap_or(position);

        let base = |kind: EscrowEventKind| EscrowEvent {
            chain: CHAIN,
            order_hash,
            escrow_address: escrow_address.clone(),
            height,
            tx_id: tx_id.clone(),
            log_index,
            kind,
        };

        match kind_sym.as_str() {
            "created" => Some(vec![base(EscrowEventKind::Created)]),
            "funded" => Some(vec![base(EscrowEventKind::Funded)]),
            "cancelled" => Some(vec![base(EscrowEventKind::Cancelled)]),
            "withdrawn" => {
                let value =
                    ScVal::from_xdr_base64(ev["value"].as_str()?, Limits::none()).ok()?;
                let preimage = match value {
                    ScVal::Bytes(b) if b.len() == 32 => {
                        let mut arr = [0u8; 32];
                        arr.copy_from_slice(b.as_slice());
                        Preimage::from_bytes(arr)
                    }
                    _ => return None,
                };
                Some(vec![
                    base(EscrowEventKind::SecretRevealed { preimage }),
                    base(EscrowEventKind::Withdrawn),
                ])
            }
            _ => None,
        }
    }

    fn escrow_contract_id(&self, order_hash: &OrderHash) -> Result<[u8; 32], ResolverError> {
        let preimage = HashIdPreimage::ContractId(HashIdPreimageContractId {
            network_id: Hash(self.network_id),
            contract_id_preimage: ContractIdPreimage::Address(ContractIdPreimageFromAddress {
                address: parse_sc_address(&self.cfg.factory_address)?,
                salt: Uint256(*order_hash.as_bytes()),
            }),
        });
        Ok(sha256(&preimage.to_xdr(Limits::none()).map_err(xdr_err)?))
    }
}

#[async_trait::async_trait]
impl ChainAdapter for StellarAdapter {
    fn chain_id(&self) -> ChainId {
        CHAIN
    }

    async fn latest_height(&self) -> Result<Height, ResolverError> {
        let result = with_retry(CHAIN, "getLatestLedger", || async {
            self.rpc.call("getLatestLedger", json!({})).await
        })
        .await?;
        let seq = result["sequence"].as_u64().ok_or_else(|| rpc_shape_err("getLatestLedger"))?;
        Ok(seq.saturating_sub(self.cfg.confirmations))
    }

    async fn poll_events(
        &self,
        from: Height,
        to: Height,
    ) -> Result<Vec<EscrowEvent>, ResolverError> {
        let result = with_retry(CHAIN, "getEvents", || {
            let params = json!({
                "startLedger": from,
                "filters": [{ "type": "contract" }],
                "pagination": { "limit": 1000 },
            });
            async move { self.rpc.call("getEvents", params).await }
        })
        .await?;

        let mut events = Vec::new();
        let raw = result["events"].as_array().cloned().unwrap_or_default();
        for (i, ev) in raw.iter().enumerate() {
            let ledger = ev["ledger"].as_u64().unwrap_or(0);
            if ledger < from || ledger > to {
                continue;
            }
            if let Some(decoded) = self.decode_event(ev, i as u32) {
                events.extend(decoded);
            }
        }
        Ok(events)
    }

    async fn predict_escrow(&self, params: &EscrowParams) -> Result<String, ResolverError> {
        Ok(contract_strkey(&self.escrow_contract_id(&params.order_hash)?))
    }

    async fn deploy_escrow(&self, params: &EscrowParams) -> Result<DeployReceipt, ResolverError> {
        let escrow_address = self.predict_escrow(params).await?;
        let factory = parse_sc_address(&self.cfg.factory_address)?;
        let args = vec![
            sc_bytes(params.order_hash.as_bytes())?,
            sc_bytes(params.hashlock.as_bytes())?,
            parse_sc_address(&params.maker).map(ScVal::Address)?,
            parse_sc_address(&params.taker).map(ScVal::Address)?,
            ScVal::Address(self.token_address(&params.asset)?),
            sc_i128(params.amount.to_i128()?),
            ScVal::U64(params.timelocks_packed),
            ScVal::U64(params.timelocks_base as u64),
        ];
        let tx_id = self.invoke(factory, "deploy_escrow", args).await?;
        info!(order = %params.order_hash, escrow = %escrow_address,
              "soroban escrow deployment submitted");
        Ok(DeployReceipt { escrow_address, tx_id })
    }

    async fn fund_escrow(
        &self,
        escrow: &str,
        asset: &str,
        amount: Amount,
    ) -> Result<String, ResolverError> {
        let token = self.token_address(asset)?;
        let args = vec![
            ScVal::Address(self.resolver_address()),
            ScVal::Address(parse_sc_address(escrow)?),
            sc_i128(amount.to_i128()?),
        ];
        self.invoke(token, "transfer", args).await
    }

    async fn withdraw(&self, escrow: &str, preimage: &Preimage) -> Result<String, ResolverError> {
        let args = vec![sc_bytes(preimage.as_bytes())?];
        self.invoke(parse_sc_address(escrow)?, "withdraw", args).await
    }

    async fn cancel(&self, escrow: &str) -> Result<String, ResolverError> {
        self.invoke(parse_sc_address(escrow)?, "cancel", Vec::new()).await
    }

    async fn get_escrow_state(&self, escrow: &str) -> Result<EscrowState, ResolverError> {
        let address = parse_sc_address(escrow)?;

        let status = match self.simulate_value(address.clone(), "get_state", Vec::new()).await? {
            ScVal::U32(0) => EscrowStatus::Created,
            ScVal::U32(1) => EscrowStatus::Funded,
            ScVal::U32(2) => EscrowStatus::Withdrawn,
            ScVal::U32(3) => EscrowStatus::Cancelled,
            other => {
                return Err(ResolverError::ChainRpc {
                    chain: CHAIN,
                    message: format!("unknown escrow state {other:?}"),
                })
            }
        };

        let imm = self.simulate_value(address, "get_immutables", Vec::new()).await?;
        let map = match imm {
            ScVal::Map(Some(m)) => m,
            _ => return Err(rpc_shape_err("get_immutables")),
        };
        let mut order = None;
        let mut lock = None;
        let mut amount = None;
        for entry in map.iter() {
            let key = match &entry.key {
                ScVal::Symbol(s) => s.to_utf8_string_lossy(),
                _ => continue,
            };
            match (key.as_str(), &entry.val) {
                ("order_hash", ScVal::Bytes(b)) if b.len() == 32 => {
                    let mut arr = [0u8; 32];
                    arr.copy_from_slice(b.as_slice());
                    order = Some(OrderHash::from_bytes(arr));
                }
                ("hashlock", ScVal::Bytes(b)) if b.len() == 32 => {
                    let mut arr = [0u8; 32];
                    arr.copy_from_slice(b.as_slice());
                    lock = Some(Hashlock::from_bytes(arr));
                }
                ("amount", ScVal::I128(parts)) => {
                    let v = ((parts.hi as i128) << 64) | parts.lo as i128;
                    amount = Some(Amount::from_u128(v.max(0) as u128));
                }
                _ => {}
            }
        }
        match (order, lock, amount) {
            (Some(order_hash), Some(hashlock), Some(amount)) => Ok(EscrowState {
                status,
                immutables: EscrowImmutables { order_hash, hashlock, amount },
            }),
            _ => Err(rpc_shape_err("get_immutables fields")),
        }
    }
}
