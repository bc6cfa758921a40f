//! Client SDK for the Solana <-> Base asset and message bridge.
//!
//! The crate orchestrates the multi-step lifecycle of a cross-chain
//! message: initiation on the source chain, proof submission where the
//! route needs one, execution on the destination, and status observation
//! through a polling monitor.
//!
//! ## Layout
//!
//! - [`chains`] — thin per-chain adapters over RPC and signer material
//! - [`codec`] — message identity (inner/outer keccak hashes), PDA seed
//!   table, on-chain account layouts and the EVM ABI surface
//! - [`engine`] — per-source-chain engines building and submitting the
//!   bridge transactions
//! - [`routes`] — the per-direction adapters and the hub-and-spoke registry
//! - [`monitor`] — the generic status polling driver
//! - [`client`] — the public [`BridgeClient`] entry point
//!
//! ## Example
//!
//! ```rust,ignore
//! let client = BridgeClient::new(chains, config)?;
//! let route = BridgeRoute::new(
//!     ChainId::parse("solana:mainnet")?,
//!     ChainId::parse("eip155:8453")?,
//! );
//! let op = client
//!     .transfer(route, AssetRef::Native, 1_000_000, "0x644e…74dc")
//!     .await?;
//! let mut stream = client.monitor(&op.message, None).await?;
//! while let Some(status) = stream.next().await {
//!     println!("{:?}", status?);
//! }
//! ```

pub mod chains;
pub mod client;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod routes;
pub mod types;

pub use chains::{ChainAdapter, EvmChainAdapter, EvmWallet, SvmChainAdapter, SvmSigner};
pub use client::BridgeClient;
pub use config::{BridgeConfig, Defaults, Deployments, EvmDeployment, SvmDeployment};
pub use error::{BridgeError, ErrorOutcome, ErrorStage};
pub use monitor::{MonitorOptions, StatusStream};
pub use routes::{RouteAdapter, RouteDirection};
pub use types::{
    AssetRef, BridgeAction, BridgeOperation, BridgeRequest, BridgeRoute, CallSpec, CallType,
    ChainId, ChainKind, ExecuteOutcome, ExecutionStatus, MessageEndpointRef, MessageId,
    MessageRef, ProveOutcome, RelayMode, RelayOptions, RouteCapabilities, RouteStep,
    HUB_CHAIN_MAINNET, HUB_CHAIN_TESTNET,
};
