//! Route and client tests against mock RPC endpoints
//!
//! End-to-end shapes of the public surface: initiation in both directions,
//! the token-mapping gate, capabilities, destination status mapping and the
//! monitor stream over a real adapter probe.

use std::sync::Arc;

use alloy_primitives::{Bytes, B256};
use alloy_sol_types::{SolEvent, SolValue};
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;

use base_bridge::codec::abi;
use base_bridge::codec::accounts::{
    FinalizeSol, IncomingMessageAccount, IncomingPayload, IncomingTransfer,
    OutgoingMessageAccount, OutgoingPayload, StoredTransfer,
};
use base_bridge::codec::hash::{b256_hex, outer_hash_for_message, salt_from_idempotency_key};
use base_bridge::codec::seeds;
use base_bridge::{
    AssetRef, BridgeAction, BridgeClient, BridgeRequest, BridgeRoute, ChainAdapter,
    EvmChainAdapter, EvmWallet, ExecutionStatus, MessageEndpointRef, MessageId, MessageRef,
    RelayMode, RelayOptions, SvmChainAdapter, SvmSigner,
};

mod helpers;
use helpers::{
    bridge_program, evm_chain_id, start_rpc_server, svm_account_result, svm_chain_id,
    svm_missing_account_result, test_config, RpcScript, TEST_EVM_PRIVATE_KEY,
};

const BRIDGE_CONTRACT: &str = "0x00000000000000000000000000000000000000b0";
const ERC20: &str = "0x00000000000000000000000000000000000000aa";
const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

fn svm_route() -> BridgeRoute {
    BridgeRoute::new(svm_chain_id(), evm_chain_id())
}

fn evm_route() -> BridgeRoute {
    BridgeRoute::new(evm_chain_id(), svm_chain_id())
}

fn base58_signature() -> String {
    bs58::encode([7u8; 64]).into_string()
}

fn confirmed_status_result() -> serde_json::Value {
    json!({
        "context": { "apiVersion": "2.0.0", "slot": 1 },
        "value": [{
            "slot": 1,
            "confirmations": null,
            "err": null,
            "status": { "Ok": null },
            "confirmationStatus": "confirmed"
        }]
    })
}

fn blockhash_result() -> serde_json::Value {
    json!({
        "context": { "apiVersion": "2.0.0", "slot": 1 },
        "value": {
            "blockhash": bs58::encode([9u8; 32]).into_string(),
            "lastValidBlockHeight": 100u64
        }
    })
}

fn svm_send_script() -> RpcScript {
    let script = RpcScript::new();
    script
        .on("getLatestBlockhash", blockhash_result())
        .on("sendTransaction", json!(base58_signature()))
        .on("getSignatureStatuses", confirmed_status_result())
        .on(
            "isBlockhashValid",
            json!({ "context": { "apiVersion": "2.0.0", "slot": 1 }, "value": true }),
        );
    script
}

async fn client_with(
    svm_script: RpcScript,
    evm_script: RpcScript,
    evm_wallet: EvmWallet,
) -> (BridgeClient, wiremock::MockServer, wiremock::MockServer) {
    let svm_server = start_rpc_server(svm_script).await;
    let evm_server = start_rpc_server(evm_script).await;
    let svm = ChainAdapter::Svm(Arc::new(SvmChainAdapter::new(
        svm_chain_id(),
        &svm_server.uri(),
        SvmSigner::Keypair(Arc::new(Keypair::new())),
    )));
    let evm = ChainAdapter::Evm(Arc::new(
        EvmChainAdapter::new(evm_chain_id(), &evm_server.uri(), evm_wallet).unwrap(),
    ));
    let client = BridgeClient::new(vec![svm, evm], test_config()).unwrap();
    (client, svm_server, evm_server)
}

fn native_outgoing_account(recipient20: [u8; 20], amount: u64) -> OutgoingMessageAccount {
    let mut to = [0u8; 32];
    to[..20].copy_from_slice(&recipient20);
    OutgoingMessageAccount {
        nonce: 1,
        sender: Pubkey::new_from_array([0x05; 32]),
        gas_limit: 123_456,
        payload: OutgoingPayload::Transfer {
            transfer: StoredTransfer {
                local_token: SOL_MINT.parse().unwrap(),
                remote_token: [0u8; 32],
                to,
                amount,
            },
            call: None,
        },
    }
}

/// Test an SVM -> EVM native transfer with auto relay: the returned ref
/// carries both the outgoing PDA and the precomputed outer hash
#[tokio::test]
async fn test_svm_to_evm_native_transfer_initiate() {
    let recipient = "0x644e3b91bbe78b586b16b80abdf769ca7fbb74dc";
    let mut recipient20 = [0u8; 20];
    recipient20.copy_from_slice(&hex::decode(&recipient[2..]).unwrap());

    let salt = salt_from_idempotency_key("native-1");
    let expected_pda = seeds::outgoing_message_pda(&bridge_program(), &salt);
    let account = native_outgoing_account(recipient20, 1_000_000);

    let script = svm_send_script();
    script.on(
        &format!("getAccountInfo:{expected_pda}"),
        svm_account_result(&borsh::to_vec(&account).unwrap(), &bridge_program().to_string()),
    );
    let (client, _svm_server, _evm_server) =
        client_with(script, RpcScript::new(), EvmWallet::None).await;

    let operation = client
        .request(&BridgeRequest {
            route: svm_route(),
            action: BridgeAction::Transfer {
                asset: AssetRef::Native,
                amount: 1_000_000,
                recipient: recipient.to_string(),
                call: None,
            },
            idempotency_key: Some("native-1".into()),
            relay: Some(RelayOptions {
                mode: RelayMode::Auto,
                gas_limit: Some(123_456),
                ..Default::default()
            }),
            metadata: None,
        })
        .await
        .unwrap();

    assert_eq!(
        operation.message.source.id,
        MessageId::SvmOutgoingMessagePda(expected_pda.to_string())
    );
    let expected_outer = outer_hash_for_message(&expected_pda, &account);
    assert_eq!(
        operation.message.destination.as_ref().unwrap().id,
        MessageId::EvmBridgeOuterHash(b256_hex(&expected_outer))
    );
    assert_eq!(operation.message.derived.get("gasLimit").unwrap(), "123456");
    assert!(matches!(
        operation.status,
        ExecutionStatus::Initiated { source_tx: Some(_), .. }
    ));
}

/// Test that a token transfer without a registered mapping is refused
/// Why: the route cannot guess the destination-side token identity
#[tokio::test]
async fn test_svm_to_evm_missing_token_mapping() {
    let (client, _svm_server, _evm_server) =
        client_with(RpcScript::new(), RpcScript::new(), EvmWallet::None).await;

    let err = client
        .transfer(
            svm_route(),
            AssetRef::Token {
                address: SOL_MINT.into(),
            },
            1,
            "0x644e3b91bbe78b586b16b80abdf769ca7fbb74dc",
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNSUPPORTED_ACTION");
}

/// Test an EVM -> SVM token transfer initiation: the ref carries the
/// event's message hash and the initiation tx hash hint
#[tokio::test]
async fn test_evm_to_svm_token_initiate() {
    let message_hash = B256::from([0x88; 32]);
    let message = abi::Message {
        nonce: 12,
        sender: B256::left_padding_from(&[0x11; 20]),
        ty: 1,
        data: Bytes::from(vec![0xaa]),
    };
    let event_data = (B256::from([0x22; 32]), message).abi_encode();
    let tx_hash = format!("0x{}", "ef".repeat(32));

    let script = RpcScript::new();
    script
        .on("eth_getTransactionCount", json!("0x0"))
        .on("eth_estimateGas", json!("0x5208"))
        .on("eth_maxPriorityFeePerGas", json!("0x3b9aca00"))
        .on("eth_gasPrice", json!("0x3b9aca00"))
        .on("eth_sendRawTransaction", json!(tx_hash.clone()))
        .on(
            "eth_getTransactionReceipt",
            json!({
                "status": "0x1",
                "blockNumber": "0x64",
                "logs": [{
                    "address": BRIDGE_CONTRACT,
                    "topics": [
                        b256_hex(&abi::MessageInitiated::SIGNATURE_HASH),
                        b256_hex(&message_hash),
                    ],
                    "data": format!("0x{}", hex::encode(event_data)),
                    "blockNumber": "0x64",
                    "transactionHash": tx_hash.clone(),
                }]
            }),
        );

    let mut config = test_config();
    config.token_mappings.insert(
        "eip155:8453->solana:mainnet".into(),
        [(ERC20.to_string(), SOL_MINT.to_string())]
            .into_iter()
            .collect(),
    );

    let svm_server = start_rpc_server(RpcScript::new()).await;
    let evm_server = start_rpc_server(script).await;
    let client = BridgeClient::new(
        vec![
            ChainAdapter::Svm(Arc::new(SvmChainAdapter::new(
                svm_chain_id(),
                &svm_server.uri(),
                SvmSigner::Keypair(Arc::new(Keypair::new())),
            ))),
            ChainAdapter::Evm(Arc::new(
                EvmChainAdapter::new(
                    evm_chain_id(),
                    &evm_server.uri(),
                    EvmWallet::PrivateKey(TEST_EVM_PRIVATE_KEY.into()),
                )
                .unwrap(),
            )),
        ],
        config,
    )
    .unwrap();

    let operation = client
        .transfer(
            evm_route(),
            AssetRef::Token {
                address: ERC20.into(),
            },
            1,
            "11111111111111111111111111111111",
        )
        .await
        .unwrap();

    assert_eq!(
        operation.message.source.id,
        MessageId::EvmMessageHash(b256_hex(&message_hash))
    );
    assert_eq!(operation.message.derived.get("txHash").unwrap(), &tx_hash);
    assert_eq!(operation.message.derived.get("nonce").unwrap(), "12");
    assert!(operation.message.destination.is_none());
}

/// Test that EVM -> SVM initiation rejects unsupported action shapes
#[tokio::test]
async fn test_evm_to_svm_unsupported_actions() {
    let (client, _svm_server, _evm_server) =
        client_with(RpcScript::new(), RpcScript::new(), EvmWallet::None).await;

    let err = client
        .transfer(
            evm_route(),
            AssetRef::Native,
            1,
            "11111111111111111111111111111111",
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNSUPPORTED_ACTION");
}

/// Test that prove is refused on the route that has no prove step
#[tokio::test]
async fn test_prove_unsupported_on_svm_to_evm() {
    let (client, _svm_server, _evm_server) =
        client_with(RpcScript::new(), RpcScript::new(), EvmWallet::None).await;

    let message = MessageRef {
        route: svm_route(),
        source: MessageEndpointRef {
            chain: svm_chain_id(),
            id: MessageId::SvmOutgoingMessagePda(bridge_program().to_string()),
        },
        destination: None,
        derived: Default::default(),
    };
    let err = client.prove(&message, None).await.unwrap_err();
    assert_eq!(err.code(), "UNSUPPORTED_STEP");
}

/// Test route capabilities in both directions
#[tokio::test]
async fn test_capabilities() {
    let (client, _svm_server, _evm_server) = client_with(
        RpcScript::new(),
        RpcScript::new(),
        EvmWallet::PrivateKey(TEST_EVM_PRIVATE_KEY.into()),
    )
    .await;

    let forward = client.capabilities(&svm_route()).await.unwrap();
    assert!(forward.auto_relay);
    assert!(forward.manual_execute);
    assert!(!forward.prove);

    let reverse = client.capabilities(&evm_route()).await.unwrap();
    assert!(!reverse.auto_relay);
    assert!(reverse.manual_execute);
    assert!(reverse.prove);
}

fn evm_to_svm_ref() -> MessageRef {
    let mut derived = std::collections::BTreeMap::new();
    derived.insert("txHash".to_string(), format!("0x{}", "ef".repeat(32)));
    MessageRef {
        route: evm_route(),
        source: MessageEndpointRef {
            chain: evm_chain_id(),
            id: MessageId::EvmMessageHash(format!("0x{}", "88".repeat(32))),
        },
        destination: None,
        derived,
    }
}

fn incoming_bytes(executed: bool) -> Vec<u8> {
    borsh::to_vec(&IncomingMessageAccount {
        sender: [0x11; 20],
        message: IncomingPayload::Transfer {
            transfer: IncomingTransfer::Sol(FinalizeSol {
                remote_token: [0x22; 20],
                to: Pubkey::new_from_array([0x33; 32]),
                amount: 5,
            }),
            ixs: vec![],
        },
        executed,
    })
    .unwrap()
}

/// Test the EVM -> SVM status ladder: absent PDA means initiated, present
/// means executable, executed flag means executed
#[tokio::test]
async fn test_evm_to_svm_status_ladder() {
    let script = RpcScript::new();
    script.on("getAccountInfo", svm_missing_account_result());
    let (client, _svm_server, _evm_server) =
        client_with(script, RpcScript::new(), EvmWallet::None).await;
    let status = client.status(&evm_to_svm_ref()).await.unwrap();
    assert!(matches!(status, ExecutionStatus::Initiated { .. }));

    let script = RpcScript::new();
    script.on("getAccountInfo", svm_account_result(&incoming_bytes(false), &bridge_program().to_string()));
    let (client, _svm_server, _evm_server) =
        client_with(script, RpcScript::new(), EvmWallet::None).await;
    let status = client.status(&evm_to_svm_ref()).await.unwrap();
    assert!(matches!(status, ExecutionStatus::Executable { .. }));

    let script = RpcScript::new();
    script.on("getAccountInfo", svm_account_result(&incoming_bytes(true), &bridge_program().to_string()));
    let (client, _svm_server, _evm_server) =
        client_with(script, RpcScript::new(), EvmWallet::None).await;
    let status = client.status(&evm_to_svm_ref()).await.unwrap();
    assert!(matches!(status, ExecutionStatus::Executed { .. }));
}

/// Test that a second execute after success raises the dedicated error
#[tokio::test]
async fn test_execute_twice_via_client() {
    let script = RpcScript::new();
    script.on("getAccountInfo", svm_account_result(&incoming_bytes(true), &bridge_program().to_string()));
    let (client, _svm_server, _evm_server) =
        client_with(script, RpcScript::new(), EvmWallet::None).await;

    let err = client.execute(&evm_to_svm_ref()).await.unwrap_err();
    assert_eq!(err.code(), "ALREADY_EXECUTED");
}

/// Test the monitor stream over a live adapter probe: a stuck status
/// yields once, then times out within the configured budget
#[tokio::test]
async fn test_monitor_stream_times_out_on_stuck_message() {
    let script = RpcScript::new();
    script.on("getAccountInfo", svm_missing_account_result());
    let svm_server = start_rpc_server(script).await;
    let evm_server = start_rpc_server(RpcScript::new()).await;

    let mut config = test_config();
    config.defaults.monitor.timeout_ms = 300;
    config.defaults.monitor.poll_interval_ms = 50;

    let client = BridgeClient::new(
        vec![
            ChainAdapter::Svm(Arc::new(SvmChainAdapter::new(
                svm_chain_id(),
                &svm_server.uri(),
                SvmSigner::Keypair(Arc::new(Keypair::new())),
            ))),
            ChainAdapter::Evm(Arc::new(
                EvmChainAdapter::new(evm_chain_id(), &evm_server.uri(), EvmWallet::None).unwrap(),
            )),
        ],
        config,
    )
    .unwrap();

    let mut stream = client.monitor(&evm_to_svm_ref(), None).await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert!(matches!(first, ExecutionStatus::Initiated { .. }));

    let err = stream.next().await.unwrap().unwrap_err();
    assert_eq!(err.code(), "TIMEOUT");
    assert!(stream.next().await.is_none());
}
