//! EVM-side ABI surface
//!
//! Typed declarations of the bridge contract functions, the validator read,
//! the initiation event and the tuple layouts the identity derivation
//! encodes. Generated call types are used both for `eth_call` data and for
//! signed write transactions.

use alloy_sol_types::sol;

sol! {
    /// 32-byte Solana public key as seen by the EVM contracts.
    type SvmPubkey is bytes32;

    /// Token transfer tuple (EVM-relative field naming).
    #[derive(Debug, PartialEq, Eq)]
    struct TokenTransfer {
        address localToken;
        bytes32 remoteToken;
        bytes32 to;
        uint64 remoteAmount;
    }

    /// Arbitrary-call tuple.
    #[derive(Debug, PartialEq, Eq)]
    struct CallPayload {
        uint8 callType;
        address to;
        uint128 value;
        bytes data;
    }

    /// The message body emitted with `MessageInitiated`.
    #[derive(Debug, PartialEq, Eq)]
    struct Message {
        uint64 nonce;
        bytes32 sender;
        uint8 ty;
        bytes data;
    }

    /// A Solana-bound instruction forwarded through the EVM bridge.
    #[derive(Debug, PartialEq, Eq)]
    struct Ix {
        bytes32 programId;
        IxAccount[] accounts;
        bytes data;
    }

    /// Account row of a forwarded instruction.
    #[derive(Debug, PartialEq, Eq)]
    struct IxAccount {
        bytes32 pubkey;
        bool isSigner;
        bool isWritable;
    }

    /// A source message as relayed into the EVM bridge.
    #[derive(Debug, PartialEq, Eq)]
    struct IncomingMessage {
        uint64 nonce;
        bytes32 outgoingMessagePubkey;
        bytes32 sender;
        uint64 gasLimit;
        uint8 ty;
        bytes data;
    }

    event MessageInitiated(bytes32 indexed messageHash, bytes32 mmrRoot, Message message);

    function BRIDGE_VALIDATOR() external view returns (address);
    function successes(bytes32 messageHash) external view returns (bool);
    function failures(bytes32 messageHash) external view returns (bool);
    function getMessageHash(IncomingMessage memory message) external view returns (bytes32);
    function generateProof(uint64 nonce) external view returns (bytes32[] memory);

    function validMessages(bytes32 messageHash) external view returns (bool);

    function bridgeCall(Ix[] memory ixs) external;
    function bridgeToken(TokenTransfer memory transfer, Ix[] memory ixs) external;
    function relayMessages(IncomingMessage[] memory messages) external;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, B256, U256};
    use alloy_sol_types::{SolCall, SolEvent, SolValue};

    /// Test that view-call encoding carries the selector plus one word
    #[test]
    fn test_successes_call_encoding() {
        let call = successesCall {
            messageHash: B256::from([0xab; 32]),
        };
        let encoded = call.abi_encode();
        assert_eq!(encoded.len(), 4 + 32);
        assert_eq!(&encoded[4..], [0xab; 32]);
    }

    /// Test that the event signature hash is stable
    /// Why: receipt logs are filtered by topic0
    #[test]
    fn test_event_signature() {
        assert_eq!(
            MessageInitiated::SIGNATURE,
            "MessageInitiated(bytes32,bytes32,(uint64,bytes32,uint8,bytes))"
        );
        assert_ne!(MessageInitiated::SIGNATURE_HASH, B256::ZERO);
    }

    /// Test that transfer tuples encode as four static words
    /// Why: the inner-hash preimage depends on this exact layout
    #[test]
    fn test_transfer_tuple_layout() {
        let transfer = TokenTransfer {
            localToken: address!("0x1111111111111111111111111111111111111111"),
            remoteToken: B256::from([0x22; 32]),
            to: B256::from([0x33; 32]),
            remoteAmount: 7,
        };
        let encoded = transfer.abi_encode();
        assert_eq!(encoded.len(), 4 * 32);
        // address occupies the low 20 bytes of the first word
        assert_eq!(&encoded[12..32], [0x11; 20]);
        assert_eq!(&encoded[32..64], [0x22; 32]);
        assert_eq!(&encoded[64..96], [0x33; 32]);
        assert_eq!(U256::from_be_slice(&encoded[96..128]), U256::from(7u64));
    }
}
