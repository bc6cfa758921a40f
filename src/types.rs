//! Core data model
//!
//! Chain identifiers, routes, actions, message identity and execution
//! statuses shared by every layer of the SDK. All shapes here are plain
//! serde-derived data; behavior lives in the engines and route adapters.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Hub chain id (Base mainnet).
pub const HUB_CHAIN_MAINNET: &str = "eip155:8453";
/// Hub chain id (Base Sepolia).
pub const HUB_CHAIN_TESTNET: &str = "eip155:84532";

/// Which virtual machine family a chain belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Evm,
    Svm,
}

/// CAIP-2 style chain identifier: `eip155:<n>` or `solana:<cluster>`.
///
/// The core treats the value as opaque and only inspects the prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    /// Parses a chain id, rejecting unknown namespaces.
    pub fn parse(value: &str) -> Result<Self, BridgeError> {
        if value.strip_prefix("eip155:").is_some_and(|n| !n.is_empty())
            || value.strip_prefix("solana:").is_some_and(|c| !c.is_empty())
        {
            Ok(Self(value.to_string()))
        } else {
            Err(BridgeError::config(format!(
                "unrecognized chain id '{value}': expected eip155:<n> or solana:<cluster>"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> ChainKind {
        if self.0.starts_with("eip155:") {
            ChainKind::Evm
        } else {
            ChainKind::Svm
        }
    }

    /// Whether this is a hub EVM chain (mainnet or testnet variant).
    pub fn is_hub(&self) -> bool {
        self.0 == HUB_CHAIN_MAINNET || self.0 == HUB_CHAIN_TESTNET
    }

    /// Numeric EVM chain id, for transaction signing.
    pub fn evm_chain_id(&self) -> Result<u64, BridgeError> {
        self.0
            .strip_prefix("eip155:")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| {
                BridgeError::config(format!("chain id '{}' is not an EVM chain", self.0))
            })
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A directed source/destination chain pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BridgeRoute {
    pub source: ChainId,
    pub destination: ChainId,
}

impl BridgeRoute {
    pub fn new(source: ChainId, destination: ChainId) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Canonical `src->dst` key used for caches and token mappings.
    pub fn key(&self) -> String {
        format!("{}->{}", self.source, self.destination)
    }

    /// Whether at least one endpoint is the hub chain.
    pub fn includes_hub(&self) -> bool {
        self.source.is_hub() || self.destination.is_hub()
    }
}

impl fmt::Display for BridgeRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.destination)
    }
}

/// Chain-scoped asset reference. Addresses are EVM hex for EVM tokens and
/// base58 mints for SVM mints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetRef {
    Native,
    Token { address: String },
    Wrapped { address: String },
}

/// Semantics of an arbitrary destination call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Call,
    DelegateCall,
    Create,
    Create2,
}

impl CallType {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Call => 0,
            Self::DelegateCall => 1,
            Self::Create => 2,
            Self::Create2 => 3,
        }
    }
}

/// A call to perform on the destination chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSpec {
    pub to: String,
    pub value: u128,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    pub call_type: CallType,
}

/// What the caller wants the bridge to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BridgeAction {
    /// Move an asset; optionally run a call on destination after crediting.
    Transfer {
        asset: AssetRef,
        amount: u64,
        recipient: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call: Option<CallSpec>,
    },
    /// Run an arbitrary call on the destination chain.
    Call { spec: CallSpec },
}

/// How the destination-side execution is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    /// Attach a pay-for-relay instruction; an off-chain relayer executes.
    Auto,
    /// The caller will execute on destination.
    Manual,
    /// Initiation only.
    None,
}

/// Relay and fee options attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayOptions {
    pub mode: RelayMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<u128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<u128>,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            mode: RelayMode::Auto,
            gas_limit: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        }
    }
}

/// A full bridge request: route + action + optional knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeRequest {
    pub route: BridgeRoute,
    pub action: BridgeAction,
    /// Deterministically seeds the per-message salt so retries land on the
    /// same destination identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelayOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Identity of a message on one side of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", content = "value", rename_all = "snake_case")]
pub enum MessageId {
    /// Base58 outgoing-message PDA on SVM.
    SvmOutgoingMessagePda(String),
    /// Base58 incoming-message PDA on SVM.
    SvmIncomingMessagePda(String),
    /// 0x-hex EVM transaction hash.
    EvmTxHash(String),
    /// 0x-hex protocol inner message hash from the EVM bridge.
    EvmMessageHash(String),
    /// 0x-hex protocol outer hash identifying the message on the EVM side.
    EvmBridgeOuterHash(String),
}

impl MessageId {
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::SvmOutgoingMessagePda(_) => "svm:outgoingMessagePda",
            Self::SvmIncomingMessagePda(_) => "svm:incomingMessagePda",
            Self::EvmTxHash(_) => "evm:txHash",
            Self::EvmMessageHash(_) => "evm:messageHash",
            Self::EvmBridgeOuterHash(_) => "evm:bridgeOuterHash",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::SvmOutgoingMessagePda(v)
            | Self::SvmIncomingMessagePda(v)
            | Self::EvmTxHash(v)
            | Self::EvmMessageHash(v)
            | Self::EvmBridgeOuterHash(v) => v,
        }
    }
}

/// One endpoint of a message's cross-chain identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEndpointRef {
    pub chain: ChainId,
    pub id: MessageId,
}

/// The durable handle to a bridge message.
///
/// `source` is the canonical identity. `destination` may be precomputed at
/// initiation time when it is derivable (SVM->EVM outer hash). `derived`
/// carries route-specific lookup hints such as the initiation tx hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub route: BridgeRoute,
    pub source: MessageEndpointRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<MessageEndpointRef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub derived: BTreeMap<String, String>,
}

/// Derived-hint keys used by the route adapters.
pub mod derived_keys {
    pub const TX_HASH: &str = "txHash";
    pub const NONCE: &str = "nonce";
    pub const GAS_LIMIT: &str = "gasLimit";
}

/// Millisecond unix timestamp, used to stamp statuses at probe time.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Observed lifecycle state of a message, stamped at probe time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutionStatus {
    Unknown {
        at: u64,
    },
    Initiated {
        at: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_tx: Option<String>,
    },
    FinalizedOnSource {
        at: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finality: Option<String>,
    },
    Proven {
        at: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        proof_tx: Option<String>,
    },
    Executable {
        at: u64,
    },
    Executing {
        at: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        execution_tx: Option<String>,
    },
    Executed {
        at: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        execution_tx: Option<String>,
    },
    Failed {
        at: u64,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        execution_tx: Option<String>,
    },
    Expired {
        at: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl ExecutionStatus {
    pub fn unknown() -> Self {
        Self::Unknown { at: now_millis() }
    }

    pub fn initiated(source_tx: Option<String>) -> Self {
        Self::Initiated {
            at: now_millis(),
            source_tx,
        }
    }

    pub fn proven(proof_tx: Option<String>) -> Self {
        Self::Proven {
            at: now_millis(),
            proof_tx,
        }
    }

    pub fn executable() -> Self {
        Self::Executable { at: now_millis() }
    }

    pub fn executed(execution_tx: Option<String>) -> Self {
        Self::Executed {
            at: now_millis(),
            execution_tx,
        }
    }

    pub fn failed(reason: impl Into<String>, execution_tx: Option<String>) -> Self {
        Self::Failed {
            at: now_millis(),
            reason: reason.into(),
            execution_tx,
        }
    }

    /// Whether the message can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Executed { .. } | Self::Failed { .. } | Self::Expired { .. }
        )
    }

    /// Identity key: the variant plus its distinguishing fields, ignoring
    /// timestamps. The monitor yields once per distinct key.
    pub fn status_key(&self) -> String {
        match self {
            Self::Unknown { .. } => "unknown".to_string(),
            Self::Initiated { source_tx, .. } => {
                format!("initiated:{}", source_tx.as_deref().unwrap_or(""))
            }
            Self::FinalizedOnSource { finality, .. } => {
                format!("finalized_on_source:{}", finality.as_deref().unwrap_or(""))
            }
            Self::Proven { proof_tx, .. } => {
                format!("proven:{}", proof_tx.as_deref().unwrap_or(""))
            }
            Self::Executable { .. } => "executable".to_string(),
            Self::Executing { execution_tx, .. } => {
                format!("executing:{}", execution_tx.as_deref().unwrap_or(""))
            }
            Self::Executed { execution_tx, .. } => {
                format!("executed:{}", execution_tx.as_deref().unwrap_or(""))
            }
            Self::Failed {
                reason,
                execution_tx,
                ..
            } => format!(
                "failed:{}:{}",
                reason,
                execution_tx.as_deref().unwrap_or("")
            ),
            Self::Expired { reason, .. } => {
                format!("expired:{}", reason.as_deref().unwrap_or(""))
            }
        }
    }
}

/// A step a route can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStep {
    Initiate,
    Prove,
    Execute,
    Monitor,
}

/// What a route adapter can do, in step order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteCapabilities {
    pub steps: Vec<RouteStep>,
    pub auto_relay: bool,
    pub manual_execute: bool,
    pub prove: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_window_ms: Option<u64>,
}

/// Result of a successful `initiate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeOperation {
    pub message: MessageRef,
    pub status: ExecutionStatus,
}

/// Result of a successful `prove`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProveOutcome {
    /// Absent when the prove was skipped because the message was already
    /// proven (idempotent retry).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_tx: Option<String>,
    pub message_hash: String,
}

/// Result of a successful `execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteOutcome {
    pub execution_tx: String,
    /// True when the destination already had the message executed and the
    /// call was a no-op.
    #[serde(default)]
    pub already_executed: bool,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(de)?;
        let stripped = raw.strip_prefix("0x").unwrap_or(&raw);
        hex::decode(stripped).map_err(serde::de::Error::custom)
    }
}
