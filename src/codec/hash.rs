//! Canonical message identity derivation
//!
//! Derives the identifiers that link a source-side message to its
//! destination-side identity:
//!
//! ```text
//! inner_hash = keccak256(abi.encode(bytes32 sender, uint8 ty, bytes data))
//! outer_hash = keccak256(abi.encode(uint64 nonce,
//!                                   bytes32 outgoingMessagePubkey,
//!                                   bytes32 inner_hash))
//! ```
//!
//! where `(ty, data)` is the EVM ABI encoding of the message payload. All of
//! this is pure; the engines feed it accounts they fetched over RPC.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolValue};
use rand::RngCore;
use solana_sdk::pubkey::Pubkey;

use crate::codec::abi;
use crate::codec::accounts::{OutgoingMessageAccount, OutgoingPayload, StoredCall, StoredTransfer};
use crate::error::BridgeError;

/// Payload type tag: arbitrary call.
pub const PAYLOAD_CALL: u8 = 0;
/// Payload type tag: token transfer.
pub const PAYLOAD_TRANSFER: u8 = 1;
/// Payload type tag: token transfer composed with a nested call.
pub const PAYLOAD_TRANSFER_WITH_CALL: u8 = 2;

/// Takes the EVM address out of a 32-byte SVM-side value (first 20 bytes).
pub fn evm_address_from_bytes32(bytes: &[u8; 32]) -> Address {
    Address::from_slice(&bytes[..20])
}

/// Right-pads a 20-byte EVM address into the 32-byte form the transfer
/// tuple carries, so that on-chain `bytes20(to)` recovers the address.
pub fn pad_evm_address(address: &Address) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[..20].copy_from_slice(address.as_slice());
    out
}

/// Parses a hex pubkey, left-padding to 32 bytes when shorter.
///
/// In practice SVM pubkeys are exactly 32 bytes; the padding recovers
/// leading zero bytes stripped by hex formatters.
pub fn pubkey_from_hex(value: &str) -> Result<Pubkey, BridgeError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    if stripped.len() > 64 {
        return Err(BridgeError::invariant(format!(
            "pubkey hex too long: {} chars",
            stripped.len()
        )));
    }
    let padded = format!("{stripped:0>64}");
    let bytes = hex::decode(&padded)
        .map_err(|e| BridgeError::invariant(format!("invalid pubkey hex: {e}")))?;
    let mut array = [0u8; 32];
    array.copy_from_slice(&bytes);
    Ok(Pubkey::new_from_array(array))
}

/// Parses a 0x-hex 32-byte value, left-padding when shorter.
pub fn bytes32_from_hex(value: &str) -> Result<[u8; 32], BridgeError> {
    Ok(pubkey_from_hex(value)?.to_bytes())
}

/// Per-message salt from an idempotency key.
pub fn salt_from_idempotency_key(key: &str) -> [u8; 32] {
    keccak256(key.as_bytes()).0
}

/// Fresh random per-message salt.
pub fn random_salt() -> [u8; 32] {
    let mut salt = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

fn abi_call(call: &StoredCall) -> abi::CallPayload {
    abi::CallPayload {
        callType: call.call_type,
        to: evm_address_from_bytes32(&call.to),
        value: call.value,
        data: Bytes::from(call.data.clone()),
    }
}

fn abi_transfer(transfer: &StoredTransfer) -> abi::TokenTransfer {
    abi::TokenTransfer {
        // The observed byte layout: the EVM-side local token is the first
        // 20 bytes of what the SVM side stores as the remote token, and the
        // EVM-side remote token is the 32-byte SVM mint.
        localToken: evm_address_from_bytes32(&transfer.remote_token),
        remoteToken: B256::from(transfer.local_token.to_bytes()),
        to: B256::from(transfer.to),
        remoteAmount: transfer.amount,
    }
}

/// Encodes an outgoing payload into its `(ty, data)` wire pair.
pub fn encode_payload(payload: &OutgoingPayload) -> (u8, Vec<u8>) {
    match payload {
        OutgoingPayload::Call(call) => (PAYLOAD_CALL, abi_call(call).abi_encode()),
        OutgoingPayload::Transfer {
            transfer,
            call: None,
        } => (PAYLOAD_TRANSFER, abi_transfer(transfer).abi_encode()),
        OutgoingPayload::Transfer {
            transfer,
            call: Some(call),
        } => (
            PAYLOAD_TRANSFER_WITH_CALL,
            (abi_transfer(transfer), abi_call(call)).abi_encode(),
        ),
    }
}

sol! {
    /// Loose-argument tuple matching `abi.encode(bytes32, uint8, bytes)`;
    /// `u8` alone can't implement `SolValue` (ambiguous with `bytes1`), so
    /// this struct carries the `uint8` typing through the encoder instead.
    struct InnerHashTuple {
        bytes32 sender;
        uint8 ty;
        bytes data;
    }
}

/// Inner hash over `(sender, ty, data)`.
pub fn inner_hash(sender: &Pubkey, ty: u8, data: &[u8]) -> B256 {
    let encoded = InnerHashTuple {
        sender: B256::from(sender.to_bytes()),
        ty,
        data: Bytes::from(data.to_vec()),
    }
    .abi_encode();
    keccak256(encoded)
}

/// Outer hash over `(nonce, outgoingMessagePubkey, innerHash)`.
pub fn outer_hash(nonce: u64, outgoing_message: &Pubkey, inner: B256) -> B256 {
    let encoded = (nonce, B256::from(outgoing_message.to_bytes()), inner).abi_encode();
    keccak256(encoded)
}

/// Outer hash of a fetched outgoing message at its PDA.
pub fn outer_hash_for_message(
    outgoing_message: &Pubkey,
    account: &OutgoingMessageAccount,
) -> B256 {
    let (ty, data) = encode_payload(&account.payload);
    let inner = inner_hash(&account.sender, ty, &data);
    outer_hash(account.nonce, outgoing_message, inner)
}

/// Builds the EVM-side `IncomingMessage` tuple for a fetched outgoing
/// message, optionally overriding the recorded gas limit.
pub fn incoming_message_for(
    outgoing_message: &Pubkey,
    account: &OutgoingMessageAccount,
    gas_limit_override: Option<u64>,
) -> abi::IncomingMessage {
    let (ty, data) = encode_payload(&account.payload);
    abi::IncomingMessage {
        nonce: account.nonce,
        outgoingMessagePubkey: B256::from(outgoing_message.to_bytes()),
        sender: B256::from(account.sender.to_bytes()),
        gasLimit: gas_limit_override.unwrap_or(account.gas_limit),
        ty,
        data: Bytes::from(data),
    }
}

/// Keccak hash of the wrapped-token metadata blob.
///
/// The blob concatenates each field behind an explicit big-endian u32
/// length prefix, then the remote token bytes and the scaler exponent, so
/// no two metadata sets can collide by concatenation.
pub fn wrapped_token_metadata_hash(
    name: &str,
    symbol: &str,
    remote_token: &[u8; 20],
    scaler_exponent: u8,
) -> B256 {
    let mut blob = Vec::with_capacity(4 + name.len() + 4 + symbol.len() + 20 + 1);
    blob.extend_from_slice(&(name.len() as u32).to_be_bytes());
    blob.extend_from_slice(name.as_bytes());
    blob.extend_from_slice(&(symbol.len() as u32).to_be_bytes());
    blob.extend_from_slice(symbol.as_bytes());
    blob.extend_from_slice(remote_token);
    blob.push(scaler_exponent);
    keccak256(blob)
}

/// Formats a B256 as 0x-hex.
pub fn b256_hex(value: &B256) -> String {
    format!("0x{}", hex::encode(value.0))
}

/// Parses a 0x-hex outer/message hash into its 32-byte form.
pub fn parse_outer_hash(value: &str) -> Result<B256, BridgeError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(stripped)
        .map_err(|e| BridgeError::invariant(format!("invalid hash hex '{value}': {e}")))?;
    if bytes.len() != 32 {
        return Err(BridgeError::invariant(format!(
            "expected 32-byte hash, got {} bytes",
            bytes.len()
        )));
    }
    Ok(B256::from_slice(&bytes))
}

/// Parses a 0x-hex U256.
pub fn u256_from_hex(value: &str) -> Result<U256, BridgeError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    U256::from_str_radix(stripped, 16)
        .map_err(|e| BridgeError::invariant(format!("invalid u256 hex '{value}': {e}")))
}
