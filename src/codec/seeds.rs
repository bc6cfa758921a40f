//! PDA seed table and derivations
//!
//! The seed constants are a compile-time table shared with the on-chain
//! programs; the derivation helpers compose them with message-specific data
//! the way the programs do.

use solana_sdk::pubkey::Pubkey;

/// Seed of the main bridge state PDA.
pub const BRIDGE_SEED: &[u8] = b"bridge";

/// Seed of the native SOL vault PDA.
pub const SOL_VAULT_SEED: &[u8] = b"sol_vault";

/// Seed of per-token SPL vault PDAs; composed with the mint and the remote
/// token bytes.
pub const TOKEN_VAULT_SEED: &[u8] = b"token_vault";

/// Seed of outgoing message PDAs; composed with the per-message salt.
pub const OUTGOING_MESSAGE_SEED: &[u8] = b"outgoing_message";

/// Seed of incoming message PDAs; composed with the 32-byte message hash.
pub const INCOMING_MESSAGE_SEED: &[u8] = b"incoming_message";

/// Seed of output-root PDAs; composed with the little-endian block number.
pub const OUTPUT_ROOT_SEED: &[u8] = b"output_root";

/// Seed of wrapped-token mint PDAs; composed with the decimals byte and the
/// keccak hash of the metadata blob.
pub const WRAPPED_TOKEN_SEED: &[u8] = b"wrapped_token";

/// Seed of the bridge CPI authority PDA signing nested relays.
pub const BRIDGE_CPI_AUTHORITY_SEED: &[u8] = b"bridge_cpi_authority";

/// Seed of the relayer program's config PDA.
pub const CFG_SEED: &[u8] = b"cfg";

/// Seed of the relayer program's per-message meter PDA; composed with a
/// fresh salt.
pub const MTR_SEED: &[u8] = b"mtr";

/// Bridge state PDA.
pub fn bridge_state_pda(bridge_program: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[BRIDGE_SEED], bridge_program).0
}

/// SOL vault PDA.
pub fn sol_vault_pda(bridge_program: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[SOL_VAULT_SEED], bridge_program).0
}

/// SPL token vault PDA for a `(mint, remote token)` pair.
pub fn token_vault_pda(bridge_program: &Pubkey, mint: &Pubkey, remote_token: &[u8]) -> Pubkey {
    Pubkey::find_program_address(
        &[TOKEN_VAULT_SEED, mint.as_ref(), remote_token],
        bridge_program,
    )
    .0
}

/// Outgoing message PDA for a per-message salt.
pub fn outgoing_message_pda(bridge_program: &Pubkey, salt: &[u8; 32]) -> Pubkey {
    Pubkey::find_program_address(&[OUTGOING_MESSAGE_SEED, salt], bridge_program).0
}

/// Incoming message PDA for a destination message hash.
pub fn incoming_message_pda(bridge_program: &Pubkey, message_hash: &[u8; 32]) -> Pubkey {
    Pubkey::find_program_address(&[INCOMING_MESSAGE_SEED, message_hash], bridge_program).0
}

/// Output-root PDA for a hub block number.
pub fn output_root_pda(bridge_program: &Pubkey, block_number: u64) -> Pubkey {
    Pubkey::find_program_address(
        &[OUTPUT_ROOT_SEED, &block_number.to_le_bytes()],
        bridge_program,
    )
    .0
}

/// Wrapped-token mint PDA for `(decimals, keccak(metadata blob))`.
pub fn wrapped_mint_pda(bridge_program: &Pubkey, decimals: u8, metadata_hash: &[u8; 32]) -> Pubkey {
    Pubkey::find_program_address(
        &[WRAPPED_TOKEN_SEED, &[decimals], metadata_hash],
        bridge_program,
    )
    .0
}

/// Bridge CPI authority PDA.
pub fn bridge_cpi_authority_pda(bridge_program: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[BRIDGE_CPI_AUTHORITY_SEED], bridge_program).0
}

/// Relayer config PDA.
pub fn relayer_config_pda(relayer_program: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[CFG_SEED], relayer_program).0
}

/// Relayer meter PDA for a fresh salt.
pub fn relayer_meter_pda(relayer_program: &Pubkey, salt: &[u8; 32]) -> Pubkey {
    Pubkey::find_program_address(&[MTR_SEED, salt], relayer_program).0
}
