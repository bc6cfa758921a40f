//! Bridge configuration
//!
//! Deployment addresses, token mappings and client defaults. Configuration
//! is usually built programmatically; `load_from_path` reads the same shape
//! from a TOML file with a `BRIDGE_CONFIG_PATH` env-var override.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::types::{BridgeRoute, ChainId, RelayMode};

/// On-chain program ids for an SVM deployment of the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmDeployment {
    /// Base58 bridge program id.
    pub bridge_program: String,
    /// Base58 relayer program id (pay-for-relay side instruction).
    pub relayer_program: String,
}

/// Contract addresses for an EVM deployment of the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmDeployment {
    /// 0x-hex bridge contract address.
    pub bridge_contract: String,
}

/// Deployments keyed by chain id string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deployments {
    #[serde(default)]
    pub svm: HashMap<String, SvmDeployment>,
    #[serde(default)]
    pub evm: HashMap<String, EvmDeployment>,
}

/// Monitor defaults applied when a caller omits options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorDefaults {
    #[serde(default = "default_monitor_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_monitor_timeout_ms() -> u64 {
    60_000
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

impl Default for MonitorDefaults {
    fn default() -> Self {
        Self {
            timeout_ms: default_monitor_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Relay defaults applied when a request omits relay options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayDefaults {
    #[serde(default = "default_relay_mode")]
    pub mode: RelayMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
}

fn default_relay_mode() -> RelayMode {
    RelayMode::Auto
}

impl Default for RelayDefaults {
    fn default() -> Self {
        Self {
            mode: default_relay_mode(),
            gas_limit: None,
        }
    }
}

/// Per-client defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub monitor: MonitorDefaults,
    #[serde(default)]
    pub relay: RelayDefaults,
}

/// Full bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub deployments: Deployments,
    /// Token mappings keyed by `src->dst` route key; each maps a source
    /// token address to the corresponding destination token address.
    #[serde(default)]
    pub token_mappings: HashMap<String, HashMap<String, String>>,
    #[serde(default)]
    pub defaults: Defaults,
}

impl BridgeConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Resolution order: explicit `path`, then the `BRIDGE_CONFIG_PATH`
    /// env var, then `config/bridge.toml`.
    pub fn load_from_path(path: Option<&str>) -> Result<Self, BridgeError> {
        let config_path = path
            .map(|p| p.to_string())
            .or_else(|| std::env::var("BRIDGE_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/bridge.toml".to_string());

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            BridgeError::config(format!("failed to read config file {config_path}: {e}"))
        })?;
        toml::from_str(&content)
            .map_err(|e| BridgeError::config(format!("invalid config {config_path}: {e}")))
    }

    /// SVM deployment for a chain, or a config error naming the gap.
    pub fn svm_deployment(&self, chain: &ChainId) -> Result<&SvmDeployment, BridgeError> {
        self.deployments.svm.get(chain.as_str()).ok_or_else(|| {
            BridgeError::config(format!("no SVM bridge deployment configured for {chain}"))
        })
    }

    /// EVM deployment for a chain, or a config error naming the gap.
    pub fn evm_deployment(&self, chain: &ChainId) -> Result<&EvmDeployment, BridgeError> {
        self.deployments.evm.get(chain.as_str()).ok_or_else(|| {
            BridgeError::config(format!("no EVM bridge deployment configured for {chain}"))
        })
    }

    /// Destination token mapped to `source_token` on `route`, if registered.
    pub fn token_mapping(&self, route: &BridgeRoute, source_token: &str) -> Option<&str> {
        self.token_mappings
            .get(&route.key())
            .and_then(|m| m.get(source_token))
            .map(String::as_str)
    }
}
