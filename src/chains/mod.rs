//! Chain adapters
//!
//! One adapter per chain kind. Adapters are thin: they wrap RPC transport
//! and signer material behind a stable interface and know nothing about the
//! other chain.

pub mod evm;
pub mod svm;

use std::sync::Arc;

pub use evm::{EvmChainAdapter, EvmWallet, WriteRequest};
pub use svm::{SvmChainAdapter, SvmSigner};

use crate::error::BridgeError;
use crate::types::{ChainId, ChainKind};

/// A configured chain, dispatched by kind.
#[derive(Clone, Debug)]
pub enum ChainAdapter {
    Evm(Arc<EvmChainAdapter>),
    Svm(Arc<SvmChainAdapter>),
}

impl ChainAdapter {
    pub fn kind(&self) -> ChainKind {
        match self {
            Self::Evm(_) => ChainKind::Evm,
            Self::Svm(_) => ChainKind::Svm,
        }
    }

    pub fn chain_id(&self) -> &ChainId {
        match self {
            Self::Evm(adapter) => adapter.chain_id(),
            Self::Svm(adapter) => adapter.chain_id(),
        }
    }

    /// Optional health check against the underlying RPC endpoint.
    pub async fn ping(&self) -> Result<(), BridgeError> {
        match self {
            Self::Evm(adapter) => adapter.ping().await,
            Self::Svm(adapter) => adapter.ping().await,
        }
    }

    pub(crate) fn as_evm(&self) -> Result<Arc<EvmChainAdapter>, BridgeError> {
        match self {
            Self::Evm(adapter) => Ok(adapter.clone()),
            Self::Svm(adapter) => Err(BridgeError::config(format!(
                "{} is an SVM chain, expected EVM",
                adapter.chain_id()
            ))),
        }
    }

    pub(crate) fn as_svm(&self) -> Result<Arc<SvmChainAdapter>, BridgeError> {
        match self {
            Self::Svm(adapter) => Ok(adapter.clone()),
            Self::Evm(adapter) => Err(BridgeError::config(format!(
                "{} is an EVM chain, expected SVM",
                adapter.chain_id()
            ))),
        }
    }
}
