//! Route adapters
//!
//! One adapter per direction, composing the engines and the encoding module
//! behind a uniform contract. The registry maps a route onto its direction,
//! enforcing the hub-and-spoke invariant.

pub mod evm_to_svm;
pub mod registry;
pub mod svm_to_evm;

use async_trait::async_trait;

pub use evm_to_svm::EvmToSvmRoute;
pub use registry::{resolve_direction, RouteDirection};
pub use svm_to_evm::SvmToEvmRoute;

use crate::error::BridgeError;
use crate::types::{
    BridgeOperation, BridgeRequest, ExecuteOutcome, ExecutionStatus, MessageRef, ProveOutcome,
    RouteCapabilities,
};

/// The uniform per-direction contract the client drives.
#[async_trait]
pub trait RouteAdapter: Send + Sync {
    /// Steps and flags this route supports.
    fn capabilities(&self) -> RouteCapabilities;

    /// Builds and submits the initiating transaction on the source chain.
    async fn initiate(&self, request: &BridgeRequest) -> Result<BridgeOperation, BridgeError>;

    /// Submits the destination-side proof, where the route has one.
    async fn prove(
        &self,
        message: &MessageRef,
        block_hint: Option<u64>,
    ) -> Result<ProveOutcome, BridgeError>;

    /// Executes the message on the destination chain.
    async fn execute(&self, message: &MessageRef) -> Result<ExecuteOutcome, BridgeError>;

    /// Observes the message's current lifecycle status.
    async fn status(&self, message: &MessageRef) -> Result<ExecutionStatus, BridgeError>;
}
