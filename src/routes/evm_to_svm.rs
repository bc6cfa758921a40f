//! EVM -> SVM route adapter
//!
//! Initiation is restricted to token transfers with a registered ERC20 ->
//! mint mapping. The prove step replays the initiation event against the
//! destination's recorded hub block height; execute relays the proven
//! message locally on the SVM side.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use tracing::info;

use crate::codec::abi;
use crate::codec::hash::{b256_hex, parse_outer_hash, pubkey_from_hex};
use crate::config::BridgeConfig;
use crate::engine::{EvmEngine, SvmEngine};
use crate::error::BridgeError;
use crate::routes::RouteAdapter;
use crate::types::{
    derived_keys, AssetRef, BridgeAction, BridgeOperation, BridgeRequest, BridgeRoute,
    ExecuteOutcome, ExecutionStatus, MessageEndpointRef, MessageId, MessageRef, ProveOutcome,
    RouteCapabilities, RouteStep,
};

pub struct EvmToSvmRoute {
    route: BridgeRoute,
    evm: Arc<EvmEngine>,
    svm: Arc<SvmEngine>,
    config: Arc<BridgeConfig>,
}

impl EvmToSvmRoute {
    pub fn new(
        route: BridgeRoute,
        evm: Arc<EvmEngine>,
        svm: Arc<SvmEngine>,
        config: Arc<BridgeConfig>,
    ) -> Self {
        Self {
            route,
            evm,
            svm,
            config,
        }
    }

    fn unsupported(&self, reason: impl Into<String>) -> BridgeError {
        BridgeError::UnsupportedAction {
            route: self.route.key(),
            reason: reason.into(),
        }
    }

    /// Canonical message hash from the source id of a message ref.
    fn message_hash(&self, message: &MessageRef) -> Result<B256, BridgeError> {
        match &message.source.id {
            MessageId::EvmMessageHash(hash) => parse_outer_hash(hash),
            other => Err(BridgeError::invariant(format!(
                "expected evm:messageHash source, got {}",
                other.scheme()
            ))),
        }
    }
}

#[async_trait]
impl RouteAdapter for EvmToSvmRoute {
    fn capabilities(&self) -> RouteCapabilities {
        RouteCapabilities {
            steps: vec![
                RouteStep::Initiate,
                RouteStep::Prove,
                RouteStep::Execute,
                RouteStep::Monitor,
            ],
            auto_relay: false,
            manual_execute: true,
            prove: true,
            min_delay_ms: None,
            max_window_ms: None,
        }
    }

    async fn initiate(&self, request: &BridgeRequest) -> Result<BridgeOperation, BridgeError> {
        let (erc20, amount, recipient) = match &request.action {
            BridgeAction::Transfer {
                asset: AssetRef::Token { address },
                amount,
                recipient,
                call: None,
            } => (address, *amount, recipient),
            BridgeAction::Transfer { call: Some(_), .. } => {
                return Err(self.unsupported("nested calls are not supported on this route"))
            }
            BridgeAction::Transfer {
                asset: AssetRef::Native,
                ..
            } => return Err(self.unsupported("native transfers are not supported on this route")),
            BridgeAction::Transfer {
                asset: AssetRef::Wrapped { .. },
                ..
            } => {
                return Err(
                    self.unsupported("wrapped-token transfers are not supported on this route")
                )
            }
            BridgeAction::Call { .. } => {
                return Err(self.unsupported("arbitrary calls are not supported on this route"))
            }
        };

        let mint_text = self
            .config
            .token_mapping(&self.route, erc20)
            .ok_or_else(|| {
                self.unsupported(format!("no token mapping registered for {erc20}"))
            })?;
        let local_token = Address::from_str(erc20)
            .map_err(|e| self.unsupported(format!("invalid token address {erc20}: {e}")))?;
        let mint = solana_sdk::pubkey::Pubkey::from_str(mint_text)
            .map_err(|e| BridgeError::config(format!("invalid mapped mint {mint_text}: {e}")))?;
        let recipient = pubkey_from_hex_or_base58(recipient)?;

        let transfer = abi::TokenTransfer {
            localToken: local_token,
            remoteToken: B256::from(mint.to_bytes()),
            to: B256::from(recipient.to_bytes()),
            remoteAmount: amount,
        };

        let tx_hash = self.evm.bridge_token(transfer, vec![]).await?;
        self.evm.wait_for_receipt(&tx_hash).await?;
        let event = self.evm.find_initiation_event(&tx_hash).await?;

        let mut derived = std::collections::BTreeMap::new();
        derived.insert(derived_keys::TX_HASH.to_string(), tx_hash.clone());
        derived.insert(derived_keys::NONCE.to_string(), event.nonce.to_string());

        info!(
            route = %self.route,
            tx_hash,
            message_hash = %b256_hex(&event.message_hash),
            "initiated EVM -> SVM message"
        );

        Ok(BridgeOperation {
            message: MessageRef {
                route: self.route.clone(),
                source: MessageEndpointRef {
                    chain: self.route.source.clone(),
                    id: MessageId::EvmMessageHash(b256_hex(&event.message_hash)),
                },
                destination: None,
                derived,
            },
            status: ExecutionStatus::initiated(Some(tx_hash)),
        })
    }

    async fn prove(
        &self,
        message: &MessageRef,
        block_hint: Option<u64>,
    ) -> Result<ProveOutcome, BridgeError> {
        let message_hash = self.message_hash(message)?;
        let tx_hash = message
            .derived
            .get(derived_keys::TX_HASH)
            .ok_or_else(|| BridgeError::ProofNotAvailable {
                reason: "message ref is missing its derived txHash".into(),
            })?;

        let block_number = match block_hint {
            Some(block) => block,
            None => self.svm.latest_destination_block_number().await?,
        };
        let (event, proof) = self.evm.generate_proof(tx_hash, block_number).await?;
        if event.message_hash != message_hash {
            return Err(BridgeError::invariant(format!(
                "initiation event hash {} does not match ref {}",
                b256_hex(&event.message_hash),
                b256_hex(&message_hash)
            )));
        }

        // EVM senders arrive ABI-style, left-padded into bytes32.
        let mut sender = [0u8; 20];
        sender.copy_from_slice(&event.sender.0[12..]);

        let result = self
            .svm
            .prove_incoming_message(
                event.message_hash,
                event.nonce,
                sender,
                &event.data,
                &proof,
                block_number,
            )
            .await?;

        Ok(ProveOutcome {
            proof_tx: result.signature.map(|sig| sig.to_string()),
            message_hash: b256_hex(&message_hash),
        })
    }

    async fn execute(&self, message: &MessageRef) -> Result<ExecuteOutcome, BridgeError> {
        let message_hash = self.message_hash(message)?;
        let signature = self.svm.execute_incoming_message(&message_hash.0).await?;
        Ok(ExecuteOutcome {
            execution_tx: signature.to_string(),
            already_executed: false,
        })
    }

    async fn status(&self, message: &MessageRef) -> Result<ExecutionStatus, BridgeError> {
        let message_hash = self.message_hash(message)?;
        match self.svm.get_incoming_message(&message_hash.0).await? {
            None => Ok(ExecutionStatus::initiated(
                message.derived.get(derived_keys::TX_HASH).cloned(),
            )),
            Some(stored) if stored.executed => Ok(ExecutionStatus::executed(None)),
            Some(_) => Ok(ExecutionStatus::executable()),
        }
    }
}

/// SVM recipients may arrive as base58 or as 0x-hex 32-byte values.
fn pubkey_from_hex_or_base58(
    value: &str,
) -> Result<solana_sdk::pubkey::Pubkey, BridgeError> {
    if value.starts_with("0x") {
        return pubkey_from_hex(value);
    }
    solana_sdk::pubkey::Pubkey::from_str(value)
        .map_err(|e| BridgeError::invariant(format!("invalid SVM recipient {value}: {e}")))
}
