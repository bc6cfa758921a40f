//! Bridge client
//!
//! Public entry point: wires chain adapters and configuration, caches route
//! adapters per direction under single-flight discipline, applies defaults
//! and exposes the chain-neutral operation surface.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::chains::ChainAdapter;
use crate::config::BridgeConfig;
use crate::engine::{EvmEngine, SvmEngine};
use crate::error::BridgeError;
use crate::monitor::{MonitorOptions, StatusStream};
use crate::routes::{
    resolve_direction, EvmToSvmRoute, RouteAdapter, RouteDirection, SvmToEvmRoute,
};
use crate::types::{
    AssetRef, BridgeAction, BridgeOperation, BridgeRequest, BridgeRoute, CallSpec, ChainId,
    ExecuteOutcome, ExecutionStatus, MessageRef, ProveOutcome, RouteCapabilities,
};

/// Boxed status probe handed to the monitor.
pub type StatusProbe =
    Box<dyn FnMut() -> BoxFuture<'static, Result<ExecutionStatus, BridgeError>> + Send>;

pub struct BridgeClient {
    chains: HashMap<ChainId, ChainAdapter>,
    config: Arc<BridgeConfig>,
    /// Route adapters by route key. Populated lazily; the lock is held
    /// across construction so concurrent misses resolve to one instance.
    adapters: Mutex<HashMap<String, Arc<dyn RouteAdapter>>>,
}

impl std::fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeClient")
            .field("chains", &self.chains)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BridgeClient {
    /// Builds a client over the given chains and configuration.
    ///
    /// Registering two adapters for the same chain id is a construction
    /// error.
    pub fn new(chains: Vec<ChainAdapter>, config: BridgeConfig) -> Result<Self, BridgeError> {
        let mut registered = HashMap::new();
        for chain in chains {
            let chain_id = chain.chain_id().clone();
            if registered.insert(chain_id.clone(), chain).is_some() {
                return Err(BridgeError::config(format!(
                    "duplicate chain registration for {chain_id}"
                )));
            }
        }
        Ok(Self {
            chains: registered,
            config: Arc::new(config),
            adapters: Mutex::new(HashMap::new()),
        })
    }

    /// Resolves a route to its direction, enforcing the hub invariant and
    /// that both endpoints have registered chain adapters.
    pub fn resolve_route(&self, route: &BridgeRoute) -> Result<RouteDirection, BridgeError> {
        let direction = resolve_direction(route)?;
        for chain in [&route.source, &route.destination] {
            if !self.chains.contains_key(chain) {
                return Err(BridgeError::UnsupportedRoute {
                    route: route.key(),
                    reason: format!("no chain adapter registered for {chain}"),
                });
            }
        }
        Ok(direction)
    }

    async fn adapter(&self, route: &BridgeRoute) -> Result<Arc<dyn RouteAdapter>, BridgeError> {
        let direction = self.resolve_route(route)?;
        let mut cache = self.adapters.lock().await;
        if let Some(adapter) = cache.get(&route.key()) {
            return Ok(adapter.clone());
        }

        debug!(route = %route, "constructing route adapter");
        let adapter: Arc<dyn RouteAdapter> = match direction {
            RouteDirection::SvmToEvm => {
                let svm_chain = self.chains[&route.source].as_svm()?;
                let evm_chain = self.chains[&route.destination].as_evm()?;
                let svm_deployment = self.config.svm_deployment(&route.source)?;
                let evm_deployment = self.config.evm_deployment(&route.destination)?;
                let svm = Arc::new(SvmEngine::new(
                    svm_chain,
                    &svm_deployment.bridge_program,
                    &svm_deployment.relayer_program,
                )?);
                let evm = Arc::new(EvmEngine::new(evm_chain, &evm_deployment.bridge_contract)?);
                Arc::new(SvmToEvmRoute::new(
                    route.clone(),
                    svm,
                    evm,
                    self.config.clone(),
                ))
            }
            RouteDirection::EvmToSvm => {
                let evm_chain = self.chains[&route.source].as_evm()?;
                let svm_chain = self.chains[&route.destination].as_svm()?;
                let evm_deployment = self.config.evm_deployment(&route.source)?;
                let svm_deployment = self.config.svm_deployment(&route.destination)?;
                let evm = Arc::new(EvmEngine::new(evm_chain, &evm_deployment.bridge_contract)?);
                let svm = Arc::new(SvmEngine::new(
                    svm_chain,
                    &svm_deployment.bridge_program,
                    &svm_deployment.relayer_program,
                )?);
                Arc::new(EvmToSvmRoute::new(
                    route.clone(),
                    evm,
                    svm,
                    self.config.clone(),
                ))
            }
        };
        cache.insert(route.key(), adapter.clone());
        Ok(adapter)
    }

    /// Capabilities of the adapter serving a route.
    pub async fn capabilities(&self, route: &BridgeRoute) -> Result<RouteCapabilities, BridgeError> {
        Ok(self.adapter(route).await?.capabilities())
    }

    /// Submits a full bridge request.
    pub async fn request(&self, request: &BridgeRequest) -> Result<BridgeOperation, BridgeError> {
        self.adapter(&request.route).await?.initiate(request).await
    }

    /// Thin wrapper over [`request`](Self::request) for asset transfers.
    pub async fn transfer(
        &self,
        route: BridgeRoute,
        asset: AssetRef,
        amount: u64,
        recipient: &str,
    ) -> Result<BridgeOperation, BridgeError> {
        self.request(&BridgeRequest {
            route,
            action: BridgeAction::Transfer {
                asset,
                amount,
                recipient: recipient.to_string(),
                call: None,
            },
            idempotency_key: None,
            relay: None,
            metadata: None,
        })
        .await
    }

    /// Thin wrapper over [`request`](Self::request) for arbitrary calls.
    pub async fn call(
        &self,
        route: BridgeRoute,
        spec: CallSpec,
    ) -> Result<BridgeOperation, BridgeError> {
        self.request(&BridgeRequest {
            route,
            action: BridgeAction::Call { spec },
            idempotency_key: None,
            relay: None,
            metadata: None,
        })
        .await
    }

    /// Proves a message on its destination, where the route has that step.
    pub async fn prove(
        &self,
        message: &MessageRef,
        block_hint: Option<u64>,
    ) -> Result<ProveOutcome, BridgeError> {
        self.adapter(&message.route)
            .await?
            .prove(message, block_hint)
            .await
    }

    /// Executes a message on its destination.
    pub async fn execute(&self, message: &MessageRef) -> Result<ExecuteOutcome, BridgeError> {
        self.adapter(&message.route).await?.execute(message).await
    }

    /// Observes a message's current status.
    pub async fn status(&self, message: &MessageRef) -> Result<ExecutionStatus, BridgeError> {
        self.adapter(&message.route).await?.status(message).await
    }

    /// Starts a monitor stream over a message. Client defaults apply when
    /// `options` is `None`; each call starts a fresh probe loop.
    pub async fn monitor(
        &self,
        message: &MessageRef,
        options: Option<MonitorOptions>,
    ) -> Result<StatusStream<StatusProbe>, BridgeError> {
        let adapter = self.adapter(&message.route).await?;
        let message = message.clone();
        let probe: StatusProbe = Box::new(move || {
            let adapter = adapter.clone();
            let message = message.clone();
            async move { adapter.status(&message).await }.boxed()
        });
        let options = options.unwrap_or_else(|| {
            MonitorOptions::from_millis(
                self.config.defaults.monitor.timeout_ms,
                self.config.defaults.monitor.poll_interval_ms,
            )
        });
        Ok(StatusStream::new(probe, options))
    }
}
