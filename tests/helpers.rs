//! Shared test helpers
//!
//! A mock JSON-RPC server built on wiremock that dispatches on the request
//! method (and call target for `eth_call`), plus builders for the chain
//! adapters and configuration the tests wire together.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use base_bridge::{BridgeConfig, ChainId};

/// Well-known throwaway secp256k1 key used by the write-path tests.
pub const TEST_EVM_PRIVATE_KEY: &str =
    "0x4c0883a69102937d6231471b5dbb6204fe512961708279feb1be6ae5538da033";

/// Queues of JSON-RPC results keyed by dispatch key.
///
/// The dispatch key is the method name, except `eth_call` and
/// `getAccountInfo`, which first try `<method>:<first-param>` so tests can
/// answer per contract address or per account. A queue with one entry
/// repeats forever; longer queues pop.
#[derive(Clone, Default)]
pub struct RpcScript {
    handlers: Arc<Mutex<HashMap<String, VecDeque<Value>>>>,
}

impl RpcScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a repeating result for a dispatch key.
    pub fn on(&self, key: &str, result: Value) -> &Self {
        self.handlers
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(result);
        self
    }

    fn dispatch_key(entry: &Value) -> Vec<String> {
        let method = entry["method"].as_str().unwrap_or_default().to_string();
        let mut keys = Vec::new();
        match method.as_str() {
            "eth_call" => {
                if let Some(to) = entry["params"][0]["to"].as_str() {
                    keys.push(format!("eth_call:{}", to.to_lowercase()));
                }
            }
            "getAccountInfo" => {
                if let Some(account) = entry["params"][0].as_str() {
                    keys.push(format!("getAccountInfo:{account}"));
                }
            }
            _ => {}
        }
        keys.push(method);
        keys
    }

    fn result_for(&self, entry: &Value) -> Value {
        let mut handlers = self.handlers.lock().unwrap();
        for key in Self::dispatch_key(entry) {
            if let Some(queue) = handlers.get_mut(&key) {
                if queue.is_empty() {
                    continue;
                }
                return if queue.len() > 1 {
                    queue.pop_front().unwrap()
                } else {
                    queue.front().cloned().unwrap()
                };
            }
        }
        panic!(
            "no handler scripted for JSON-RPC request: {}",
            serde_json::to_string(entry).unwrap_or_default()
        );
    }

    fn respond_to(&self, entry: &Value) -> Value {
        let id = entry.get("id").cloned().unwrap_or(json!(1));
        json!({
            "jsonrpc": "2.0",
            "result": self.result_for(entry),
            "id": id,
        })
    }
}

impl Respond for RpcScript {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).expect("JSON-RPC body");
        let response = match &body {
            Value::Array(entries) => {
                Value::Array(entries.iter().map(|e| self.respond_to(e)).collect())
            }
            entry => self.respond_to(entry),
        };
        ResponseTemplate::new(200).set_body_json(response)
    }
}

/// Installs the log subscriber for test output. Safe to call from every
/// test; only the first call in the process wins.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Starts a mock RPC server answering every POST from the script.
pub async fn start_rpc_server(script: RpcScript) -> MockServer {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::method("POST"))
        .respond_with(script)
        .mount(&server)
        .await;
    server
}

/// Solana `getAccountInfo` result wrapping base64 account data.
pub fn svm_account_result(data: &[u8], owner: &str) -> Value {
    use base64::Engine as _;
    json!({
        "context": { "apiVersion": "2.0.0", "slot": 1 },
        "value": {
            "data": [base64::engine::general_purpose::STANDARD.encode(data), "base64"],
            "executable": false,
            "lamports": 1_000_000u64,
            "owner": owner,
            "rentEpoch": 0u64,
            "space": data.len(),
        }
    })
}

/// Solana `getAccountInfo` result for a missing account.
pub fn svm_missing_account_result() -> Value {
    json!({
        "context": { "apiVersion": "2.0.0", "slot": 1 },
        "value": null
    })
}

/// ABI word for a boolean `eth_call` result.
pub fn bool_word(value: bool) -> Value {
    let mut word = [0u8; 32];
    word[31] = value as u8;
    json!(format!("0x{}", hex::encode(word)))
}

/// Bridge program id used across the test suites.
pub fn bridge_program() -> solana_sdk::pubkey::Pubkey {
    solana_sdk::pubkey::Pubkey::new_from_array([0xb1; 32])
}

/// Relayer program id used across the test suites.
pub fn relayer_program() -> solana_sdk::pubkey::Pubkey {
    solana_sdk::pubkey::Pubkey::new_from_array([0xb2; 32])
}

/// Test bridge configuration covering the mainnet hub route pair.
pub fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.deployments.svm.insert(
        "solana:mainnet".into(),
        base_bridge::SvmDeployment {
            bridge_program: bridge_program().to_string(),
            relayer_program: relayer_program().to_string(),
        },
    );
    config.deployments.evm.insert(
        "eip155:8453".into(),
        base_bridge::EvmDeployment {
            bridge_contract: "0x00000000000000000000000000000000000000b0".into(),
        },
    );
    config
}

pub fn svm_chain_id() -> ChainId {
    ChainId::parse("solana:mainnet").unwrap()
}

pub fn evm_chain_id() -> ChainId {
    ChainId::parse("eip155:8453").unwrap()
}
