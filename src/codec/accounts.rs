//! On-chain account and instruction layouts (SVM side)
//!
//! Borsh shapes mirroring the bridge and relayer program IDLs. The SDK
//! deserializes the message accounts it reads and serializes the
//! instruction data it submits; nothing here is interpreted beyond that.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;

/// An arbitrary call carried inside a message, as stored on chain.
///
/// `to` holds a 32-byte value on both directions; for EVM targets the first
/// 20 bytes are the address and the tail is zero.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct StoredCall {
    pub call_type: u8,
    pub to: [u8; 32],
    pub value: u128,
    pub data: Vec<u8>,
}

/// A token transfer carried inside an outgoing message.
///
/// Field naming is chain-relative: `local_token` is the SVM mint,
/// `remote_token` the 32-byte form of the EVM token (20-byte address,
/// right-padded), `to` the 32-byte form of the EVM recipient.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct StoredTransfer {
    pub local_token: Pubkey,
    pub remote_token: [u8; 32],
    pub to: [u8; 32],
    pub amount: u64,
}

/// Payload of an outgoing (SVM -> EVM) message.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum OutgoingPayload {
    Call(StoredCall),
    Transfer {
        transfer: StoredTransfer,
        call: Option<StoredCall>,
    },
}

/// The outgoing-message account written by the bridge program at initiation.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct OutgoingMessageAccount {
    pub nonce: u64,
    pub sender: Pubkey,
    pub gas_limit: u64,
    pub payload: OutgoingPayload,
}

/// The bridge state account. `base_block_number` is the latest hub block
/// height whose output root has been registered on this chain.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BridgeStateAccount {
    pub nonce: u64,
    pub base_block_number: u64,
}

/// One instruction nested inside an incoming message.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct StoredIx {
    pub program_id: Pubkey,
    pub accounts: Vec<StoredIxAccount>,
    pub data: Vec<u8>,
}

/// Account row of a nested instruction.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct StoredIxAccount {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

/// Finalization data for a native SOL credit.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct FinalizeSol {
    pub remote_token: [u8; 20],
    pub to: Pubkey,
    pub amount: u64,
}

/// Finalization data for an SPL token credit out of a vault.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct FinalizeSpl {
    pub remote_token: [u8; 20],
    pub local_token: Pubkey,
    pub to: Pubkey,
    pub amount: u64,
}

/// Finalization data for a wrapped-token mint.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct FinalizeWrapped {
    pub local_token: Pubkey,
    pub to: Pubkey,
    pub amount: u64,
}

/// The transfer half of an incoming message.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum IncomingTransfer {
    Sol(FinalizeSol),
    Spl(FinalizeSpl),
    Wrapped(FinalizeWrapped),
}

/// Payload of an incoming (EVM -> SVM) message.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum IncomingPayload {
    Call(Vec<StoredIx>),
    Transfer {
        transfer: IncomingTransfer,
        ixs: Vec<StoredIx>,
    },
}

/// The incoming-message account created by a successful prove.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct IncomingMessageAccount {
    pub sender: [u8; 20],
    pub message: IncomingPayload,
    pub executed: bool,
}

/// Instruction data of the bridge program, tagged by the leading variant
/// byte of the Borsh enum encoding.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum BridgeInstruction {
    /// Lock native SOL and emit an outgoing message.
    BridgeSol {
        salt: [u8; 32],
        to: [u8; 32],
        amount: u64,
        gas_limit: u64,
        call: Option<StoredCall>,
    },
    /// Lock SPL tokens into their vault and emit an outgoing message.
    BridgeSpl {
        salt: [u8; 32],
        to: [u8; 32],
        remote_token: [u8; 32],
        amount: u64,
        gas_limit: u64,
        call: Option<StoredCall>,
    },
    /// Burn wrapped tokens and emit an outgoing message.
    BridgeWrappedToken {
        salt: [u8; 32],
        to: [u8; 32],
        amount: u64,
        gas_limit: u64,
        call: Option<StoredCall>,
    },
    /// Emit an outgoing message carrying an arbitrary call.
    BridgeCall {
        salt: [u8; 32],
        call: StoredCall,
        gas_limit: u64,
    },
    /// Register wrapped-token metadata and emit the registration message.
    WrapToken {
        salt: [u8; 32],
        decimals: u8,
        name: String,
        symbol: String,
        remote_token: [u8; 20],
        scaler_exponent: u8,
        gas_limit: u64,
    },
    /// Prove an incoming message against a registered output root.
    ProveMessage {
        nonce: u64,
        sender: [u8; 20],
        data: Vec<u8>,
        proof: Vec<[u8; 32]>,
        message_hash: [u8; 32],
        block_number: u64,
    },
    /// Execute a proven incoming message.
    RelayMessage,
}

/// Instruction data of the relayer program.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum RelayerInstruction {
    /// Fund destination-side execution of an outgoing message.
    PayForRelay {
        salt: [u8; 32],
        gas_limit: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that outgoing accounts round-trip through Borsh
    /// Why: initiation re-fetches and decodes the account it just created
    #[test]
    fn test_outgoing_account_round_trip() {
        let account = OutgoingMessageAccount {
            nonce: 42,
            sender: Pubkey::new_from_array([5u8; 32]),
            gas_limit: 200_000,
            payload: OutgoingPayload::Transfer {
                transfer: StoredTransfer {
                    local_token: Pubkey::new_from_array([6u8; 32]),
                    remote_token: [7u8; 32],
                    to: [8u8; 32],
                    amount: 1_000_000,
                },
                call: Some(StoredCall {
                    call_type: 0,
                    to: [9u8; 32],
                    value: 0,
                    data: vec![0xd0, 0x9d, 0xe0, 0x8a],
                }),
            },
        };
        let bytes = borsh::to_vec(&account).unwrap();
        let decoded = OutgoingMessageAccount::try_from_slice(&bytes).unwrap();
        assert_eq!(decoded, account);
    }

    /// Test that the instruction enum keeps its variant tags stable
    /// Why: the on-chain program dispatches on the leading byte
    #[test]
    fn test_instruction_variant_tags() {
        let relay = borsh::to_vec(&BridgeInstruction::RelayMessage).unwrap();
        assert_eq!(relay, vec![6u8]);

        let sol = borsh::to_vec(&BridgeInstruction::BridgeSol {
            salt: [0u8; 32],
            to: [0u8; 32],
            amount: 1,
            gas_limit: 1,
            call: None,
        })
        .unwrap();
        assert_eq!(sol[0], 0u8);

        let prove = borsh::to_vec(&BridgeInstruction::ProveMessage {
            nonce: 0,
            sender: [0u8; 20],
            data: vec![],
            proof: vec![],
            message_hash: [0u8; 32],
            block_number: 0,
        })
        .unwrap();
        assert_eq!(prove[0], 5u8);
    }

    /// Test that incoming accounts with nested instructions round-trip
    #[test]
    fn test_incoming_account_round_trip() {
        let account = IncomingMessageAccount {
            sender: [1u8; 20],
            message: IncomingPayload::Transfer {
                transfer: IncomingTransfer::Spl(FinalizeSpl {
                    remote_token: [2u8; 20],
                    local_token: Pubkey::new_from_array([3u8; 32]),
                    to: Pubkey::new_from_array([4u8; 32]),
                    amount: 9,
                }),
                ixs: vec![StoredIx {
                    program_id: Pubkey::new_from_array([5u8; 32]),
                    accounts: vec![StoredIxAccount {
                        pubkey: Pubkey::new_from_array([6u8; 32]),
                        is_signer: false,
                        is_writable: true,
                    }],
                    data: vec![1, 2, 3],
                }],
            },
            executed: false,
        };
        let bytes = borsh::to_vec(&account).unwrap();
        let decoded = IncomingMessageAccount::try_from_slice(&bytes).unwrap();
        assert_eq!(decoded, account);
    }
}
