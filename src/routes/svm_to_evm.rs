//! SVM -> EVM route adapter
//!
//! Dispatches the caller's action to the matching SVM engine operation,
//! precomputes the EVM outer hash once the outgoing PDA exists, and drives
//! execute/status against the EVM bridge contract.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::codec::accounts::StoredCall;
use crate::codec::hash::{b256_hex, outer_hash_for_message, pad_evm_address, parse_outer_hash};
use crate::config::BridgeConfig;
use crate::engine::svm::SendOptions;
use crate::engine::{ApprovalWaitOptions, EvmEngine, SvmEngine, SvmInitiation};
use crate::error::BridgeError;
use crate::routes::RouteAdapter;
use crate::types::{
    derived_keys, AssetRef, BridgeAction, BridgeOperation, BridgeRequest, BridgeRoute, CallSpec,
    ExecuteOutcome, ExecutionStatus, MessageEndpointRef, MessageId, MessageRef, ProveOutcome,
    RelayMode, RouteCapabilities, RouteStep,
};

pub struct SvmToEvmRoute {
    route: BridgeRoute,
    svm: Arc<SvmEngine>,
    evm: Arc<EvmEngine>,
    config: Arc<BridgeConfig>,
}

impl SvmToEvmRoute {
    pub fn new(
        route: BridgeRoute,
        svm: Arc<SvmEngine>,
        evm: Arc<EvmEngine>,
        config: Arc<BridgeConfig>,
    ) -> Self {
        Self {
            route,
            svm,
            evm,
            config,
        }
    }

    fn send_options(&self, request: &BridgeRequest) -> Result<SendOptions, BridgeError> {
        let relay = request
            .relay
            .clone()
            .unwrap_or_else(|| crate::types::RelayOptions {
                mode: self.config.defaults.relay.mode,
                gas_limit: self.config.defaults.relay.gas_limit,
                ..Default::default()
            });
        let nested_call = match &request.action {
            BridgeAction::Transfer {
                call: Some(call), ..
            } => Some(stored_call(call)?),
            _ => None,
        };
        Ok(SendOptions {
            pay_for_relay: relay.mode == RelayMode::Auto,
            nested_call,
            gas_limit: relay.gas_limit,
            idempotency_key: request.idempotency_key.clone(),
        })
    }

    fn unsupported(&self, reason: impl Into<String>) -> BridgeError {
        BridgeError::UnsupportedAction {
            route: self.route.key(),
            reason: reason.into(),
        }
    }

    /// Outgoing PDA from the canonical source id of a message ref.
    fn outgoing_pda(&self, message: &MessageRef) -> Result<Pubkey, BridgeError> {
        match &message.source.id {
            MessageId::SvmOutgoingMessagePda(pda) => Pubkey::from_str(pda).map_err(|e| {
                BridgeError::invariant(format!("invalid outgoing message pda {pda}: {e}"))
            }),
            other => Err(BridgeError::invariant(format!(
                "expected svm:outgoingMessagePda source, got {}",
                other.scheme()
            ))),
        }
    }
}

#[async_trait]
impl RouteAdapter for SvmToEvmRoute {
    fn capabilities(&self) -> RouteCapabilities {
        RouteCapabilities {
            steps: vec![RouteStep::Initiate, RouteStep::Execute, RouteStep::Monitor],
            auto_relay: true,
            manual_execute: self.evm.adapter().has_signer(),
            prove: false,
            min_delay_ms: None,
            max_window_ms: None,
        }
    }

    async fn initiate(&self, request: &BridgeRequest) -> Result<BridgeOperation, BridgeError> {
        let options = self.send_options(request)?;

        let initiation: SvmInitiation = match &request.action {
            BridgeAction::Transfer {
                asset: AssetRef::Native,
                amount,
                recipient,
                ..
            } => {
                let to = evm_recipient(recipient)?;
                self.svm.bridge_native(to, *amount, &options).await?
            }
            BridgeAction::Transfer {
                asset: AssetRef::Token { address },
                amount,
                recipient,
                ..
            } => {
                let remote = self
                    .config
                    .token_mapping(&self.route, address)
                    .ok_or_else(|| {
                        self.unsupported(format!("no token mapping registered for mint {address}"))
                    })?;
                let mint = Pubkey::from_str(address)
                    .map_err(|e| self.unsupported(format!("invalid mint {address}: {e}")))?;
                let remote_address = Address::from_str(remote).map_err(|e| {
                    BridgeError::config(format!("invalid mapped token {remote}: {e}"))
                })?;
                let to = evm_recipient(recipient)?;
                self.svm
                    .bridge_token(to, &mint, pad_evm_address(&remote_address), *amount, &options)
                    .await?
            }
            BridgeAction::Transfer {
                asset: AssetRef::Wrapped { address },
                amount,
                recipient,
                ..
            } => {
                let mint = Pubkey::from_str(address)
                    .map_err(|e| self.unsupported(format!("invalid wrapped mint {address}: {e}")))?;
                let to = evm_recipient(recipient)?;
                self.svm
                    .bridge_wrapped(to, &mint, *amount, &options)
                    .await?
            }
            BridgeAction::Call { spec } => {
                self.svm.bridge_call(stored_call(spec)?, &options).await?
            }
        };

        // The outer hash is derivable as soon as the PDA exists; embed both
        // identities into the ref so execute/status need no re-derivation.
        let outgoing = initiation.outgoing_message;
        let account = self.svm.get_outgoing_message(&outgoing).await?;
        let outer = outer_hash_for_message(&outgoing, &account);

        let mut derived = std::collections::BTreeMap::new();
        derived.insert(derived_keys::NONCE.to_string(), account.nonce.to_string());
        derived.insert(
            derived_keys::GAS_LIMIT.to_string(),
            account.gas_limit.to_string(),
        );

        let source_tx = initiation.signature.map(|sig| sig.to_string());
        info!(
            route = %self.route,
            outgoing_message = %outgoing,
            outer_hash = %b256_hex(&outer),
            "initiated SVM -> EVM message"
        );

        Ok(BridgeOperation {
            message: MessageRef {
                route: self.route.clone(),
                source: MessageEndpointRef {
                    chain: self.route.source.clone(),
                    id: MessageId::SvmOutgoingMessagePda(outgoing.to_string()),
                },
                destination: Some(MessageEndpointRef {
                    chain: self.route.destination.clone(),
                    id: MessageId::EvmBridgeOuterHash(b256_hex(&outer)),
                }),
                derived,
            },
            status: ExecutionStatus::initiated(source_tx),
        })
    }

    async fn prove(
        &self,
        _message: &MessageRef,
        _block_hint: Option<u64>,
    ) -> Result<ProveOutcome, BridgeError> {
        Err(BridgeError::UnsupportedStep {
            route: self.route.key(),
            step: RouteStep::Prove,
        })
    }

    async fn execute(&self, message: &MessageRef) -> Result<ExecuteOutcome, BridgeError> {
        // The precomputed outer hash is required; execute refuses to guess.
        let destination = message
            .destination
            .as_ref()
            .filter(|d| matches!(d.id, MessageId::EvmBridgeOuterHash(_)))
            .ok_or_else(|| BridgeError::ProofNotAvailable {
                reason: "message ref has no evm:bridgeOuterHash destination".into(),
            })?;

        let outgoing = self.outgoing_pda(message)?;
        let account = self.svm.get_outgoing_message(&outgoing).await?;

        let expected = parse_outer_hash(destination.id.value())?;
        let outer = outer_hash_for_message(&outgoing, &account);
        if outer != expected {
            return Err(BridgeError::invariant(format!(
                "outgoing message no longer matches its ref: {} vs {}",
                b256_hex(&outer),
                destination.id.value()
            )));
        }

        let result = self
            .evm
            .execute_message(&outgoing, &account, None, &ApprovalWaitOptions::default())
            .await?;
        Ok(ExecuteOutcome {
            execution_tx: result.tx_hash,
            already_executed: result.already_executed,
        })
    }

    async fn status(&self, message: &MessageRef) -> Result<ExecutionStatus, BridgeError> {
        let Some(destination) = message
            .destination
            .as_ref()
            .filter(|d| matches!(d.id, MessageId::EvmBridgeOuterHash(_)))
        else {
            return Ok(ExecutionStatus::unknown());
        };
        let outer = parse_outer_hash(destination.id.value())?;

        let state = self.evm.message_state(outer).await?;
        if state.success {
            return Ok(ExecutionStatus::executed(None));
        }
        if state.failure {
            return Ok(ExecutionStatus::failed(
                "destination recorded permanent failure",
                None,
            ));
        }

        let outgoing = self.outgoing_pda(message)?;
        if self.svm.adapter().get_account(&outgoing).await?.is_some() {
            Ok(ExecutionStatus::executable())
        } else {
            Ok(ExecutionStatus::unknown())
        }
    }
}

/// Parses an EVM recipient and right-pads it into the 32-byte on-chain form.
fn evm_recipient(recipient: &str) -> Result<[u8; 32], BridgeError> {
    let address = Address::from_str(recipient).map_err(|e| BridgeError::InvariantViolation {
        reason: format!("invalid EVM recipient {recipient}: {e}"),
    })?;
    Ok(pad_evm_address(&address))
}

/// Converts a request-level call into its on-chain stored form.
fn stored_call(spec: &CallSpec) -> Result<StoredCall, BridgeError> {
    let address = Address::from_str(&spec.to)
        .map_err(|e| BridgeError::invariant(format!("invalid call target {}: {e}", spec.to)))?;
    Ok(StoredCall {
        call_type: spec.call_type.as_u8(),
        to: pad_evm_address(&address),
        value: spec.value,
        data: spec.data.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CallType;

    /// Test recipient padding into the transfer-tuple byte form
    #[test]
    fn test_evm_recipient_padding() {
        let padded = evm_recipient("0x644e3b91bbe78b586b16b80abdf769ca7fbb74dc").unwrap();
        assert_eq!(
            &padded[..20],
            hex::decode("644e3b91bbe78b586b16b80abdf769ca7fbb74dc")
                .unwrap()
                .as_slice()
        );
        assert_eq!(&padded[20..], [0u8; 12]);
        assert!(evm_recipient("not-an-address").is_err());
    }

    /// Test call conversion preserves the call type tag and data
    #[test]
    fn test_stored_call_conversion() {
        let spec = CallSpec {
            to: "0x1111111111111111111111111111111111111111".into(),
            value: 5,
            data: vec![0xd0, 0x9d, 0xe0, 0x8a],
            call_type: CallType::DelegateCall,
        };
        let stored = stored_call(&spec).unwrap();
        assert_eq!(stored.call_type, 1);
        assert_eq!(&stored.to[..20], [0x11; 20]);
        assert_eq!(stored.value, 5);
        assert_eq!(stored.data, spec.data);
    }
}
