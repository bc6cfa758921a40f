//! EVM engine
//!
//! Submits EVM-originated sends (token transfer, instruction-batch call),
//! produces Merkle-style proofs for EVM -> SVM messages from a contract
//! read, and drives the destination side of SVM -> EVM messages: the
//! successes/failures/getMessageHash multicall, the validator approval wait
//! and the final `relayMessages` submission.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolCall, SolEvent, SolValue};
use solana_sdk::pubkey::Pubkey;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::chains::evm::{parse_b256, EvmChainAdapter, TransactionReceipt, WriteRequest};
use crate::codec::abi;
use crate::codec::accounts::OutgoingMessageAccount;
use crate::codec::hash::{b256_hex, incoming_message_for, outer_hash_for_message};
use crate::error::{BridgeError, ErrorStage};

/// How long to poll for a transaction receipt after submission.
const RECEIPT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);
const RECEIPT_WAIT_INTERVAL: Duration = Duration::from_secs(2);

/// Validator approval wait: 60 s budget, 5 s start, 1.5x growth, 30 s cap.
#[derive(Debug, Clone)]
pub struct ApprovalWaitOptions {
    pub timeout: Duration,
    pub initial_interval: Duration,
    pub max_backoff: Duration,
}

impl Default for ApprovalWaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            initial_interval: Duration::from_secs(5),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// A decoded `MessageInitiated` log.
#[derive(Debug, Clone)]
pub struct InitiationEvent {
    pub message_hash: B256,
    pub mmr_root: B256,
    pub nonce: u64,
    pub sender: B256,
    pub ty: u8,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub tx_hash: String,
}

/// Result of executing (or observing as executed) an SVM -> EVM message.
#[derive(Debug, Clone)]
pub struct EvmExecuteResult {
    /// Execution transaction hash, or the outer hash itself when the
    /// destination already had the message executed (virtual tx).
    pub tx_hash: String,
    pub already_executed: bool,
}

/// Destination-side state of an outer hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageState {
    pub success: bool,
    pub failure: bool,
}

pub struct EvmEngine {
    adapter: Arc<EvmChainAdapter>,
    bridge_contract: Address,
}

impl EvmEngine {
    pub fn new(adapter: Arc<EvmChainAdapter>, bridge_contract: &str) -> Result<Self, BridgeError> {
        let bridge_contract = Address::from_str(bridge_contract)
            .map_err(|e| BridgeError::config(format!("invalid bridge contract address: {e}")))?;
        Ok(Self {
            adapter,
            bridge_contract,
        })
    }

    pub fn adapter(&self) -> &Arc<EvmChainAdapter> {
        &self.adapter
    }

    pub fn bridge_contract(&self) -> Address {
        self.bridge_contract
    }

    /// Submits an instruction batch toward the SVM side.
    pub async fn bridge_call(&self, ixs: Vec<abi::Ix>) -> Result<String, BridgeError> {
        let data = abi::bridgeCallCall { ixs }.abi_encode();
        self.adapter
            .write_contract(WriteRequest::new(self.bridge_contract, data))
            .await
    }

    /// Submits a token transfer toward the SVM side.
    pub async fn bridge_token(
        &self,
        transfer: abi::TokenTransfer,
        ixs: Vec<abi::Ix>,
    ) -> Result<String, BridgeError> {
        let data = abi::bridgeTokenCall { transfer, ixs }.abi_encode();
        self.adapter
            .write_contract(WriteRequest::new(self.bridge_contract, data))
            .await
    }

    /// Polls for a receipt until the transaction lands.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<TransactionReceipt, BridgeError> {
        let deadline = tokio::time::Instant::now() + RECEIPT_WAIT_TIMEOUT;
        loop {
            if let Some(receipt) = self.adapter.transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BridgeError::Timeout {
                    stage: ErrorStage::Initiate,
                    waited_ms: RECEIPT_WAIT_TIMEOUT.as_millis() as u64,
                });
            }
            sleep(RECEIPT_WAIT_INTERVAL).await;
        }
    }

    /// Finds the sole `MessageInitiated` log of a transaction.
    ///
    /// Zero logs or more than one are both rejected: a proof can only be
    /// generated for an unambiguous initiation.
    pub async fn find_initiation_event(
        &self,
        tx_hash: &str,
    ) -> Result<InitiationEvent, BridgeError> {
        let receipt = self
            .adapter
            .transaction_receipt(tx_hash)
            .await?
            .ok_or_else(|| BridgeError::ProofNotAvailable {
                reason: format!("no receipt for {tx_hash}"),
            })?;
        self.initiation_event_from_receipt(&receipt, tx_hash)
    }

    fn initiation_event_from_receipt(
        &self,
        receipt: &TransactionReceipt,
        tx_hash: &str,
    ) -> Result<InitiationEvent, BridgeError> {
        let topic0 = b256_hex(&abi::MessageInitiated::SIGNATURE_HASH);
        let matching: Vec<_> = receipt
            .logs
            .iter()
            .filter(|log| {
                log.address.eq_ignore_ascii_case(&format!("{:?}", self.bridge_contract))
                    && log
                        .topics
                        .first()
                        .is_some_and(|t| t.eq_ignore_ascii_case(&topic0))
            })
            .collect();

        let log = match matching.as_slice() {
            [log] => log,
            [] => {
                return Err(BridgeError::ProofNotAvailable {
                    reason: format!("no MessageInitiated event in {tx_hash}"),
                })
            }
            _ => {
                return Err(BridgeError::ProofNotAvailable {
                    reason: format!(
                        "{} MessageInitiated events in {tx_hash}, expected exactly one",
                        matching.len()
                    ),
                })
            }
        };

        let message_hash = log
            .topics
            .get(1)
            .ok_or_else(|| BridgeError::ProofNotAvailable {
                reason: "MessageInitiated log is missing its hash topic".into(),
            })
            .and_then(|t| parse_b256(t))?;

        let data = crate::chains::evm::decode_hex_bytes(&log.data)?;
        let (mmr_root, message) = <(B256, abi::Message)>::abi_decode(&data).map_err(|e| {
            BridgeError::invariant(format!("undecodable MessageInitiated data: {e}"))
        })?;

        Ok(InitiationEvent {
            message_hash,
            mmr_root,
            nonce: message.nonce,
            sender: message.sender,
            ty: message.ty,
            data: message.data.to_vec(),
            block_number: log.block_number_u64()?,
            tx_hash: tx_hash.to_string(),
        })
    }

    /// Generates the proof for an EVM -> SVM message at the destination's
    /// recorded hub block height.
    ///
    /// Errors with `NotFinal` while the recorded height is still behind the
    /// initiation log's block.
    pub async fn generate_proof(
        &self,
        tx_hash: &str,
        recorded_block_number: u64,
    ) -> Result<(InitiationEvent, Vec<[u8; 32]>), BridgeError> {
        let event = self.find_initiation_event(tx_hash).await?;
        if recorded_block_number < event.block_number {
            return Err(BridgeError::NotFinal {
                recorded_block: recorded_block_number,
                required_block: event.block_number,
            });
        }

        let call = abi::generateProofCall { nonce: event.nonce };
        let raw = self
            .adapter
            .call_at(self.bridge_contract, &call.abi_encode(), recorded_block_number)
            .await?;
        let proof = abi::generateProofCall::abi_decode_returns(&raw)
            .map_err(|e| BridgeError::invariant(format!("undecodable proof response: {e}")))?;

        debug!(
            tx_hash,
            nonce = event.nonce,
            proof_len = proof.len(),
            recorded_block_number,
            "generated message proof"
        );
        Ok((event, proof.into_iter().map(|node| node.0).collect()))
    }

    /// Gas estimate for an arbitrary destination call.
    pub async fn estimate_gas_for_call(
        &self,
        to: Address,
        data: &[u8],
        value: U256,
    ) -> Result<u64, BridgeError> {
        self.adapter
            .estimate_gas(to, data, value, self.adapter.signer_address())
            .await
    }

    /// Destination-side success/failure flags for an outer hash.
    pub async fn message_state(&self, outer_hash: B256) -> Result<MessageState, BridgeError> {
        let calls = vec![
            (
                self.bridge_contract,
                abi::successesCall {
                    messageHash: outer_hash,
                }
                .abi_encode(),
            ),
            (
                self.bridge_contract,
                abi::failuresCall {
                    messageHash: outer_hash,
                }
                .abi_encode(),
            ),
        ];
        let results = self.adapter.multicall(&calls).await?;
        Ok(MessageState {
            success: decode_bool("successes", &results[0])?,
            failure: decode_bool("failures", &results[1])?,
        })
    }

    /// Executes an SVM -> EVM message on the destination.
    ///
    /// Idempotent: an already-successful message returns its outer hash as
    /// a virtual transaction. A recorded failure is fatal. Before relaying,
    /// waits for the bridge validator to approve the message.
    pub async fn execute_message(
        &self,
        outgoing_message: &Pubkey,
        account: &OutgoingMessageAccount,
        gas_limit_override: Option<u64>,
        wait: &ApprovalWaitOptions,
    ) -> Result<EvmExecuteResult, BridgeError> {
        let message = incoming_message_for(outgoing_message, account, gas_limit_override);
        let outer = outer_hash_for_message(outgoing_message, account);

        let calls = vec![
            (
                self.bridge_contract,
                abi::successesCall { messageHash: outer }.abi_encode(),
            ),
            (
                self.bridge_contract,
                abi::failuresCall { messageHash: outer }.abi_encode(),
            ),
            (
                self.bridge_contract,
                abi::getMessageHashCall {
                    message: message.clone(),
                }
                .abi_encode(),
            ),
        ];
        let results = self.adapter.multicall(&calls).await?;

        if decode_bool("successes", &results[0])? {
            info!(outer_hash = %b256_hex(&outer), "message already executed on destination");
            return Ok(EvmExecuteResult {
                tx_hash: b256_hex(&outer),
                already_executed: true,
            });
        }
        if decode_bool("failures", &results[1])? {
            return Err(BridgeError::MessageFailed {
                outer_hash: b256_hex(&outer),
            });
        }
        let on_chain_hash = abi::getMessageHashCall::abi_decode_returns(&results[2])
            .map_err(|e| BridgeError::invariant(format!("undecodable getMessageHash: {e}")))?;
        if on_chain_hash != outer {
            return Err(BridgeError::invariant(format!(
                "outer hash mismatch: local {} vs contract {}",
                b256_hex(&outer),
                b256_hex(&on_chain_hash)
            )));
        }

        self.wait_for_approval(outer, wait).await?;

        let data = abi::relayMessagesCall {
            messages: vec![message],
        }
        .abi_encode();
        let mut request = WriteRequest::new(self.bridge_contract, data);
        request.gas_limit = gas_limit_override;
        let tx_hash = self
            .adapter
            .write_contract(request)
            .await
            .map_err(|err| match err {
                BridgeError::Rpc { message, .. } if message.contains("revert") => {
                    BridgeError::ExecutionReverted {
                        tx: None,
                        reason: message,
                    }
                }
                other => other,
            })?;
        info!(outer_hash = %b256_hex(&outer), tx_hash, "relayed message on destination");
        Ok(EvmExecuteResult {
            tx_hash,
            already_executed: false,
        })
    }

    /// Polls the bridge validator until it approves the outer hash.
    ///
    /// Backoff starts at the configured interval, grows 1.5x per round and
    /// is capped by `max_backoff`; the whole wait is bounded by `timeout`.
    pub async fn wait_for_approval(
        &self,
        outer_hash: B256,
        options: &ApprovalWaitOptions,
    ) -> Result<(), BridgeError> {
        let validator = self.bridge_validator().await?;
        let deadline = tokio::time::Instant::now() + options.timeout;
        let mut interval = options.initial_interval;

        loop {
            let call = abi::validMessagesCall {
                messageHash: outer_hash,
            };
            let raw = self.adapter.call(validator, &call.abi_encode()).await?;
            if decode_bool("validMessages", &raw)? {
                return Ok(());
            }
            if tokio::time::Instant::now() + interval > deadline {
                warn!(outer_hash = %b256_hex(&outer_hash), "validator approval wait expired");
                return Err(BridgeError::Timeout {
                    stage: ErrorStage::Execute,
                    waited_ms: options.timeout.as_millis() as u64,
                });
            }
            debug!(
                outer_hash = %b256_hex(&outer_hash),
                next_poll_ms = interval.as_millis() as u64,
                "message not yet approved by validator"
            );
            sleep(interval).await;
            interval = std::cmp::min(interval * 3 / 2, options.max_backoff);
        }
    }

    /// Polls `successes(outerHash)` until the message executes.
    pub async fn monitor_execution(
        &self,
        outer_hash: B256,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<(), BridgeError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state = self.message_state(outer_hash).await?;
            if state.success {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BridgeError::Timeout {
                    stage: ErrorStage::Monitor,
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            sleep(poll_interval).await;
        }
    }

    /// Address of the bridge validator contract.
    async fn bridge_validator(&self) -> Result<Address, BridgeError> {
        let raw = self
            .adapter
            .call(
                self.bridge_contract,
                &abi::BRIDGE_VALIDATORCall {}.abi_encode(),
            )
            .await?;
        abi::BRIDGE_VALIDATORCall::abi_decode_returns(&raw)
            .map_err(|e| BridgeError::invariant(format!("undecodable BRIDGE_VALIDATOR: {e}")))
    }
}

fn decode_bool(what: &str, raw: &[u8]) -> Result<bool, BridgeError> {
    bool::abi_decode(raw)
        .map_err(|e| BridgeError::invariant(format!("undecodable {what} response: {e}")))
}
