//! EVM chain adapter
//!
//! Thin wrapper over an EVM JSON-RPC endpoint plus optional signer
//! material. Reads go through hand-rolled JSON-RPC request/response
//! wrappers; the multicall helper issues a JSON-RPC batch with
//! all-success-or-fail semantics. Writes build an EIP-1559 transaction,
//! sign it locally and submit the raw bytes. No cross-chain awareness.

use std::str::FromStr;
use std::time::Duration;

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_eips::eip2718::Encodable2718;
use alloy_eips::eip2930::AccessList;
use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::codec::hash::u256_from_hex;
use crate::error::BridgeError;
use crate::types::ChainId;

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<Value>,
    id: u64,
}

impl JsonRpcRequest {
    fn new(id: u64, method: &str, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id,
        }
    }
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    result: Option<T>,
    error: Option<JsonRpcError>,
    #[serde(default)]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// EVM event log entry
#[derive(Debug, Clone, Deserialize)]
pub struct EvmLog {
    /// Address of the contract that emitted the event
    pub address: String,
    /// Array of topics (indexed event parameters)
    pub topics: Vec<String>,
    /// Event data (non-indexed parameters)
    pub data: String,
    /// Block number
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    /// Transaction hash
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
}

impl EvmLog {
    pub fn block_number_u64(&self) -> Result<u64, BridgeError> {
        parse_hex_u64(&self.block_number)
    }
}

/// Transaction receipt, trimmed to the fields the engines consume.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionReceipt {
    pub status: Option<String>,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(default)]
    pub logs: Vec<EvmLog>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.as_deref() == Some("0x1")
    }

    pub fn block_number_u64(&self) -> Result<u64, BridgeError> {
        parse_hex_u64(&self.block_number)
    }
}

/// Signer material for the adapter.
pub enum EvmWallet {
    /// Read-only adapter; writes raise a config error.
    None,
    /// 0x-hex secp256k1 private key; signs EIP-1559 transactions locally.
    PrivateKey(String),
}

/// A write request handed to `write_contract`.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub to: Address,
    pub data: Vec<u8>,
    pub value: U256,
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

impl WriteRequest {
    pub fn new(to: Address, data: Vec<u8>) -> Self {
        Self {
            to,
            data,
            value: U256::ZERO,
            gas_limit: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        }
    }
}

#[derive(Debug)]
pub struct EvmChainAdapter {
    chain_id: ChainId,
    client: Client,
    rpc_url: String,
    signer: Option<PrivateKeySigner>,
}

impl EvmChainAdapter {
    pub fn new(chain_id: ChainId, rpc_url: &str, wallet: EvmWallet) -> Result<Self, BridgeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy()
            .build()
            .map_err(|e| BridgeError::config(format!("failed to create HTTP client: {e}")))?;

        let signer = match wallet {
            EvmWallet::None => None,
            EvmWallet::PrivateKey(key) => {
                let stripped = key.strip_prefix("0x").unwrap_or(&key);
                let parsed = PrivateKeySigner::from_str(stripped).map_err(|e| {
                    BridgeError::config(format!("invalid EVM private key for {chain_id}: {e}"))
                })?;
                Some(parsed)
            }
        };

        Ok(Self {
            chain_id,
            client,
            rpc_url: rpc_url.to_string(),
            signer,
        })
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    pub fn has_signer(&self) -> bool {
        self.signer.is_some()
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    /// Single JSON-RPC round trip returning the raw result value, which
    /// may legitimately be null (e.g. a pending receipt).
    async fn rpc_value(&self, method: &str, params: Vec<Value>) -> Result<Value, BridgeError> {
        let request = JsonRpcRequest::new(1, method, params);
        let response: JsonRpcResponse<Value> = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BridgeError::rpc(self.chain_id.as_str(), e))?
            .json()
            .await
            .map_err(|e| BridgeError::rpc(self.chain_id.as_str(), e))?;

        if let Some(error) = response.error {
            return Err(BridgeError::rpc(
                self.chain_id.as_str(),
                format!("{method} failed: {} ({})", error.message, error.code),
            ));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn rpc<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, BridgeError> {
        let value = self.rpc_value(method, params).await?;
        if value.is_null() {
            return Err(BridgeError::rpc(
                self.chain_id.as_str(),
                format!("{method} returned null"),
            ));
        }
        serde_json::from_value(value).map_err(|e| {
            BridgeError::rpc(
                self.chain_id.as_str(),
                format!("{method} returned an unexpected shape: {e}"),
            )
        })
    }

    /// Current block number.
    pub async fn block_number(&self) -> Result<u64, BridgeError> {
        let hex: String = self.rpc("eth_blockNumber", vec![]).await?;
        parse_hex_u64(&hex)
    }

    /// Receipt of a transaction, or `None` while still pending.
    pub async fn transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceipt>, BridgeError> {
        let value = self
            .rpc_value("eth_getTransactionReceipt", vec![json!(tx_hash)])
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value).map(Some).map_err(|e| {
            BridgeError::rpc(
                self.chain_id.as_str(),
                format!("undecodable transaction receipt: {e}"),
            )
        })
    }

    /// `eth_call` against the latest block.
    pub async fn call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, BridgeError> {
        self.call_inner(to, data, json!("latest")).await
    }

    /// `eth_call` pinned to a historical block.
    pub async fn call_at(
        &self,
        to: Address,
        data: &[u8],
        block_number: u64,
    ) -> Result<Vec<u8>, BridgeError> {
        self.call_inner(to, data, json!(format!("0x{block_number:x}")))
            .await
    }

    async fn call_inner(
        &self,
        to: Address,
        data: &[u8],
        block: Value,
    ) -> Result<Vec<u8>, BridgeError> {
        let result: String = self
            .rpc(
                "eth_call",
                vec![
                    json!({
                        "to": format!("{to:?}"),
                        "data": format!("0x{}", hex::encode(data)),
                    }),
                    block,
                ],
            )
            .await?;
        decode_hex_bytes(&result)
    }

    /// Batch of `eth_call`s in one JSON-RPC batch request. Fails as a whole
    /// if any call fails; results come back in request order.
    pub async fn multicall(
        &self,
        calls: &[(Address, Vec<u8>)],
    ) -> Result<Vec<Vec<u8>>, BridgeError> {
        let batch: Vec<JsonRpcRequest> = calls
            .iter()
            .enumerate()
            .map(|(i, (to, data))| {
                JsonRpcRequest::new(
                    i as u64,
                    "eth_call",
                    vec![
                        json!({
                            "to": format!("{to:?}"),
                            "data": format!("0x{}", hex::encode(data)),
                        }),
                        json!("latest"),
                    ],
                )
            })
            .collect();

        let mut responses: Vec<JsonRpcResponse<String>> = self
            .client
            .post(&self.rpc_url)
            .json(&batch)
            .send()
            .await
            .map_err(|e| BridgeError::rpc(self.chain_id.as_str(), e))?
            .json()
            .await
            .map_err(|e| BridgeError::rpc(self.chain_id.as_str(), e))?;

        if responses.len() != calls.len() {
            return Err(BridgeError::rpc(
                self.chain_id.as_str(),
                format!(
                    "multicall returned {} results for {} calls",
                    responses.len(),
                    calls.len()
                ),
            ));
        }

        // Batch responses may arrive out of order; ids restore it.
        responses.sort_by_key(|r| r.id);
        responses
            .into_iter()
            .map(|response| {
                if let Some(error) = response.error {
                    return Err(BridgeError::rpc(
                        self.chain_id.as_str(),
                        format!("multicall entry failed: {} ({})", error.message, error.code),
                    ));
                }
                let hex = response.result.ok_or_else(|| {
                    BridgeError::rpc(self.chain_id.as_str(), "multicall entry returned null")
                })?;
                decode_hex_bytes(&hex)
            })
            .collect()
    }

    /// `eth_estimateGas` for a call.
    pub async fn estimate_gas(
        &self,
        to: Address,
        data: &[u8],
        value: U256,
        from: Option<Address>,
    ) -> Result<u64, BridgeError> {
        let mut call = json!({
            "to": format!("{to:?}"),
            "data": format!("0x{}", hex::encode(data)),
            "value": format!("0x{value:x}"),
        });
        if let Some(from) = from {
            call["from"] = json!(format!("{from:?}"));
        }
        let hex: String = self.rpc("eth_estimateGas", vec![call]).await?;
        parse_hex_u64(&hex)
    }

    /// Signs and submits an EIP-1559 transaction, returning its hash.
    pub async fn write_contract(&self, request: WriteRequest) -> Result<String, BridgeError> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            BridgeError::config(format!("no signer configured for {}", self.chain_id))
        })?;
        let from = signer.address();
        let chain_id = self.chain_id.evm_chain_id()?;

        let nonce_hex: String = self
            .rpc(
                "eth_getTransactionCount",
                vec![json!(format!("{from:?}")), json!("pending")],
            )
            .await?;
        let nonce = parse_hex_u64(&nonce_hex)?;

        let gas_limit = match request.gas_limit {
            Some(limit) => limit,
            None => {
                let estimated = self
                    .estimate_gas(request.to, &request.data, request.value, Some(from))
                    .await?;
                // Headroom over the estimate, matching common client practice.
                estimated + estimated / 5
            }
        };

        let max_priority_fee_per_gas = match request.max_priority_fee_per_gas {
            Some(fee) => fee,
            None => {
                let hex: String = self.rpc("eth_maxPriorityFeePerGas", vec![]).await?;
                u256_from_hex(&hex)?.to::<u128>()
            }
        };
        let max_fee_per_gas = match request.max_fee_per_gas {
            Some(fee) => fee,
            None => {
                let hex: String = self.rpc("eth_gasPrice", vec![]).await?;
                let gas_price = u256_from_hex(&hex)?.to::<u128>();
                gas_price * 2 + max_priority_fee_per_gas
            }
        };

        let tx = TxEip1559 {
            chain_id,
            nonce,
            gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            to: TxKind::Call(request.to),
            value: request.value,
            access_list: AccessList::default(),
            input: Bytes::from(request.data),
        };
        let signature = signer
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| BridgeError::config(format!("failed to sign transaction: {e}")))?;
        let envelope = TxEnvelope::Eip1559(tx.into_signed(signature));
        let raw = envelope.encoded_2718();

        debug!(
            chain = %self.chain_id,
            to = %request.to,
            nonce,
            gas_limit,
            "submitting signed EVM transaction"
        );

        let tx_hash: String = self
            .rpc(
                "eth_sendRawTransaction",
                vec![json!(format!("0x{}", hex::encode(raw)))],
            )
            .await?;
        Ok(tx_hash)
    }

    /// Health check: round-trips `eth_chainId`.
    pub async fn ping(&self) -> Result<(), BridgeError> {
        let _: String = self.rpc("eth_chainId", vec![]).await?;
        Ok(())
    }
}

/// Parses a 0x-hex quantity into a u64.
pub fn parse_hex_u64(value: &str) -> Result<u64, BridgeError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(stripped, 16)
        .map_err(|e| BridgeError::invariant(format!("invalid hex quantity '{value}': {e}")))
}

/// Decodes 0x-hex data into bytes.
pub fn decode_hex_bytes(value: &str) -> Result<Vec<u8>, BridgeError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(stripped).map_err(|e| BridgeError::invariant(format!("invalid hex data: {e}")))
}

/// Parses a 0x-hex 32-byte hash.
pub fn parse_b256(value: &str) -> Result<B256, BridgeError> {
    let bytes = decode_hex_bytes(value)?;
    if bytes.len() != 32 {
        return Err(BridgeError::invariant(format!(
            "expected 32-byte hash, got {} bytes",
            bytes.len()
        )));
    }
    Ok(B256::from_slice(&bytes))
}
