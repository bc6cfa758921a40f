//! Source engines
//!
//! One engine per source chain. Each builds and submits the initiating
//! transactions for its chain and also drives the proof/execute side when
//! the destination is its chain.

pub mod evm;
pub mod svm;

pub use evm::{ApprovalWaitOptions, EvmEngine, EvmExecuteResult, InitiationEvent, MessageState};
pub use svm::{SendOptions, SvmEngine, SvmInitiation, SvmProveResult, DEFAULT_GAS_LIMIT};
