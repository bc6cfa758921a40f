//! Bridge error taxonomy
//!
//! Every fallible operation in the SDK surfaces a [`BridgeError`]. Each
//! variant carries a stable machine-readable code plus an actionable outcome
//! so callers can decide between retrying, fixing their input, or giving up
//! without string-matching error messages.

use thiserror::Error;

use crate::types::RouteStep;

/// What the caller should do about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOutcome {
    /// Transient; the same call may succeed later.
    Retry,
    /// The request or configuration is wrong; retrying unchanged will fail.
    UserFix,
    /// Permanent; the message cannot make further progress.
    Fatal,
}

/// Lifecycle stage an error is associated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Initiate,
    Prove,
    Execute,
    Monitor,
}

/// Errors produced by the bridge client, engines and route adapters.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The route does not include the hub chain, or no adapter serves it.
    #[error("unsupported route {route}: {reason}")]
    UnsupportedRoute { route: String, reason: String },

    /// The action shape is not supported on this route.
    #[error("unsupported action on route {route}: {reason}")]
    UnsupportedAction { route: String, reason: String },

    /// The step does not apply to this route (e.g. prove on SVM->EVM).
    #[error("step {step:?} is not applicable on route {route}")]
    UnsupportedStep { route: String, step: RouteStep },

    /// Missing signer, duplicate chain registration, missing deployment.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// An underlying RPC request failed.
    #[error("rpc failure on {chain}: {message}")]
    Rpc { chain: String, message: String },

    /// A monitor loop or approval wait exceeded its budget.
    #[error("timed out after {waited_ms}ms during {stage:?}")]
    Timeout { stage: ErrorStage, waited_ms: u64 },

    /// The destination's recorded source height is behind the initiation log.
    #[error("destination recorded source block {recorded_block}, initiation is at {required_block}")]
    NotFinal {
        recorded_block: u64,
        required_block: u64,
    },

    /// No usable initiation event, or required derived fields are absent.
    #[error("proof not available: {reason}")]
    ProofNotAvailable { reason: String },

    /// Prove was redundant; the message is already proven.
    #[error("message {message_hash} is already proven")]
    AlreadyProven { message_hash: String },

    /// Execute was attempted before prove.
    #[error("message {message_hash} is not proven yet")]
    NotProven { message_hash: String },

    /// Execute was redundant; the message is already executed.
    #[error("message {id} has already been executed")]
    AlreadyExecuted { id: String },

    /// The destination call reverted during execution.
    #[error("execution reverted: {reason}")]
    ExecutionReverted { tx: Option<String>, reason: String },

    /// The destination recorded the message as permanently failed.
    #[error("message {outer_hash} failed on destination")]
    MessageFailed { outer_hash: String },

    /// Illegal status transition, hash mismatch, unexpected event count.
    #[error("invariant violation: {reason}")]
    InvariantViolation { reason: String },
}

impl BridgeError {
    /// Stable machine-readable code for the error class.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedRoute { .. } => "UNSUPPORTED_ROUTE",
            Self::UnsupportedAction { .. } => "UNSUPPORTED_ACTION",
            Self::UnsupportedStep { .. } => "UNSUPPORTED_STEP",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Rpc { .. } => "RPC_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::NotFinal { .. } => "NOT_FINAL",
            Self::ProofNotAvailable { .. } => "PROOF_NOT_AVAILABLE",
            Self::AlreadyProven { .. } => "ALREADY_PROVEN",
            Self::NotProven { .. } => "NOT_PROVEN",
            Self::AlreadyExecuted { .. } => "ALREADY_EXECUTED",
            Self::ExecutionReverted { .. } => "EXECUTION_REVERTED",
            Self::MessageFailed { .. } => "MESSAGE_FAILED",
            Self::InvariantViolation { .. } => "INVARIANT_VIOLATION",
        }
    }

    /// What the caller should do about this error.
    pub fn outcome(&self) -> ErrorOutcome {
        match self {
            Self::Rpc { .. } | Self::Timeout { .. } | Self::NotFinal { .. } => ErrorOutcome::Retry,
            // Redundant prove/execute calls are safe to treat as transient:
            // the operation already succeeded once.
            Self::AlreadyProven { .. } | Self::AlreadyExecuted { .. } => ErrorOutcome::Retry,
            Self::UnsupportedRoute { .. }
            | Self::UnsupportedAction { .. }
            | Self::UnsupportedStep { .. }
            | Self::Config { .. }
            | Self::ProofNotAvailable { .. }
            | Self::NotProven { .. } => ErrorOutcome::UserFix,
            Self::ExecutionReverted { .. }
            | Self::MessageFailed { .. }
            | Self::InvariantViolation { .. } => ErrorOutcome::Fatal,
        }
    }

    /// Lifecycle stage this error class belongs to, where one is implied.
    pub fn stage(&self) -> Option<ErrorStage> {
        match self {
            Self::Timeout { stage, .. } => Some(*stage),
            Self::NotFinal { .. } | Self::ProofNotAvailable { .. } | Self::AlreadyProven { .. } => {
                Some(ErrorStage::Prove)
            }
            Self::NotProven { .. }
            | Self::AlreadyExecuted { .. }
            | Self::ExecutionReverted { .. }
            | Self::MessageFailed { .. } => Some(ErrorStage::Execute),
            _ => None,
        }
    }

    /// Shorthand for wrapping a chain-level transport failure.
    pub fn rpc(chain: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Rpc {
            chain: chain.into(),
            message: err.to_string(),
        }
    }

    /// Shorthand for a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Shorthand for an invariant violation.
    pub fn invariant(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }
}
