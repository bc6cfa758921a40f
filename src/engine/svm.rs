//! SVM engine
//!
//! Builds and submits the SVM-originated bridge operations (native, SPL,
//! wrapped-token, arbitrary call, wrap-token metadata) and drives the
//! destination side of EVM -> SVM messages (prove, execute).
//!
//! Every send follows the same skeleton: derive the per-message salt and
//! the outgoing PDA, resolve the payer, build the operation-specific
//! instruction rows, optionally append the pay-for-relay instruction, then
//! submit with confirmed commitment and return the outgoing PDA.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;
use borsh::BorshDeserialize;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk_ids::system_program;
use tracing::{debug, info};

use crate::chains::svm::SvmChainAdapter;
use crate::codec::accounts::{
    BridgeInstruction, BridgeStateAccount, IncomingMessageAccount, IncomingPayload,
    IncomingTransfer, OutgoingMessageAccount, RelayerInstruction, StoredCall,
};
use crate::codec::hash::{
    b256_hex, random_salt, salt_from_idempotency_key, wrapped_token_metadata_hash,
};
use crate::codec::seeds;
use crate::error::BridgeError;

/// Associated token program id, from the Solana program registry.
const ASSOCIATED_TOKEN_PROGRAM_ID: &str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";

/// Default destination gas limit when the caller does not pass one.
pub const DEFAULT_GAS_LIMIT: u64 = 200_000;

/// Default account-existence polling budget.
pub const ACCOUNT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default account-existence polling cadence.
pub const ACCOUNT_WAIT_INTERVAL: Duration = Duration::from_secs(5);

/// Options shared by every SVM-originated send.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Attach the relayer-program pay-for-relay instruction.
    pub pay_for_relay: bool,
    /// Call to run on the destination after crediting funds.
    pub nested_call: Option<StoredCall>,
    /// Destination gas limit; defaults to [`DEFAULT_GAS_LIMIT`].
    pub gas_limit: Option<u64>,
    /// Deterministic salt seed; retries with the same key reuse the PDA.
    pub idempotency_key: Option<String>,
}

impl SendOptions {
    fn salt(&self) -> [u8; 32] {
        match &self.idempotency_key {
            Some(key) => salt_from_idempotency_key(key),
            None => random_salt(),
        }
    }

    fn gas_limit(&self) -> u64 {
        self.gas_limit.unwrap_or(DEFAULT_GAS_LIMIT)
    }
}

/// Result of an SVM-originated send.
#[derive(Debug, Clone)]
pub struct SvmInitiation {
    pub outgoing_message: Pubkey,
    /// Absent when a retried submission was deduplicated by the cluster.
    pub signature: Option<Signature>,
}

/// Result of proving an incoming message.
#[derive(Debug, Clone)]
pub struct SvmProveResult {
    /// Absent when the incoming PDA already existed.
    pub signature: Option<Signature>,
    pub message_hash: [u8; 32],
}

pub struct SvmEngine {
    adapter: Arc<SvmChainAdapter>,
    bridge_program: Pubkey,
    relayer_program: Pubkey,
}

impl SvmEngine {
    pub fn new(
        adapter: Arc<SvmChainAdapter>,
        bridge_program: &str,
        relayer_program: &str,
    ) -> Result<Self, BridgeError> {
        let bridge_program = Pubkey::from_str(bridge_program)
            .map_err(|e| BridgeError::config(format!("invalid bridge program id: {e}")))?;
        let relayer_program = Pubkey::from_str(relayer_program)
            .map_err(|e| BridgeError::config(format!("invalid relayer program id: {e}")))?;
        Ok(Self {
            adapter,
            bridge_program,
            relayer_program,
        })
    }

    pub fn adapter(&self) -> &Arc<SvmChainAdapter> {
        &self.adapter
    }

    pub fn bridge_program(&self) -> &Pubkey {
        &self.bridge_program
    }

    /// Derives the incoming-message PDA for a destination message hash.
    pub fn incoming_message_pda(&self, message_hash: &[u8; 32]) -> Pubkey {
        seeds::incoming_message_pda(&self.bridge_program, message_hash)
    }

    /// Bridges native SOL to an EVM recipient.
    pub async fn bridge_native(
        &self,
        to: [u8; 32],
        amount: u64,
        options: &SendOptions,
    ) -> Result<SvmInitiation, BridgeError> {
        let salt = options.salt();
        let outgoing = seeds::outgoing_message_pda(&self.bridge_program, &salt);
        let payer = self.adapter.payer_pubkey()?;

        let instruction = Instruction {
            program_id: self.bridge_program,
            accounts: vec![
                AccountMeta::new(payer, true),
                AccountMeta::new(seeds::bridge_state_pda(&self.bridge_program), false),
                AccountMeta::new(seeds::sol_vault_pda(&self.bridge_program), false),
                AccountMeta::new(outgoing, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data: encode_instruction(&BridgeInstruction::BridgeSol {
                salt,
                to,
                amount,
                gas_limit: options.gas_limit(),
                call: options.nested_call.clone(),
            })?,
        };

        self.submit_send(vec![instruction], outgoing, options)
            .await
    }

    /// Bridges an SPL token out of its vault to an EVM recipient.
    pub async fn bridge_token(
        &self,
        to: [u8; 32],
        mint: &Pubkey,
        remote_token: [u8; 32],
        amount: u64,
        options: &SendOptions,
    ) -> Result<SvmInitiation, BridgeError> {
        let salt = options.salt();
        let outgoing = seeds::outgoing_message_pda(&self.bridge_program, &salt);
        let payer = self.adapter.payer_pubkey()?;
        let vault = seeds::token_vault_pda(&self.bridge_program, mint, &remote_token[..20]);
        let from_token_account = get_associated_token_address(&payer, mint)?;

        let instruction = Instruction {
            program_id: self.bridge_program,
            accounts: vec![
                AccountMeta::new(payer, true),
                AccountMeta::new(seeds::bridge_state_pda(&self.bridge_program), false),
                AccountMeta::new_readonly(*mint, false),
                AccountMeta::new(from_token_account, false),
                AccountMeta::new(vault, false),
                AccountMeta::new(outgoing, false),
                AccountMeta::new_readonly(spl_token::id(), false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data: encode_instruction(&BridgeInstruction::BridgeSpl {
                salt,
                to,
                remote_token,
                amount,
                gas_limit: options.gas_limit(),
                call: options.nested_call.clone(),
            })?,
        };

        self.submit_send(vec![instruction], outgoing, options)
            .await
    }

    /// Burns a wrapped token back toward its EVM origin.
    pub async fn bridge_wrapped(
        &self,
        to: [u8; 32],
        mint: &Pubkey,
        amount: u64,
        options: &SendOptions,
    ) -> Result<SvmInitiation, BridgeError> {
        let salt = options.salt();
        let outgoing = seeds::outgoing_message_pda(&self.bridge_program, &salt);
        let payer = self.adapter.payer_pubkey()?;
        let from_token_account = get_associated_token_address(&payer, mint)?;

        let instruction = Instruction {
            program_id: self.bridge_program,
            accounts: vec![
                AccountMeta::new(payer, true),
                AccountMeta::new(seeds::bridge_state_pda(&self.bridge_program), false),
                AccountMeta::new(*mint, false),
                AccountMeta::new(from_token_account, false),
                AccountMeta::new(outgoing, false),
                AccountMeta::new_readonly(spl_token::id(), false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data: encode_instruction(&BridgeInstruction::BridgeWrappedToken {
                salt,
                to,
                amount,
                gas_limit: options.gas_limit(),
                call: options.nested_call.clone(),
            })?,
        };

        self.submit_send(vec![instruction], outgoing, options)
            .await
    }

    /// Sends an arbitrary call to the EVM side.
    pub async fn bridge_call(
        &self,
        call: StoredCall,
        options: &SendOptions,
    ) -> Result<SvmInitiation, BridgeError> {
        let salt = options.salt();
        let outgoing = seeds::outgoing_message_pda(&self.bridge_program, &salt);
        let payer = self.adapter.payer_pubkey()?;

        let instruction = Instruction {
            program_id: self.bridge_program,
            accounts: vec![
                AccountMeta::new(payer, true),
                AccountMeta::new(seeds::bridge_state_pda(&self.bridge_program), false),
                AccountMeta::new(outgoing, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data: encode_instruction(&BridgeInstruction::BridgeCall {
                salt,
                call,
                gas_limit: options.gas_limit(),
            })?,
        };

        self.submit_send(vec![instruction], outgoing, options)
            .await
    }

    /// Registers wrapped-token metadata, creating the deterministic mint
    /// and emitting the registration message toward the EVM side.
    pub async fn wrap_token_metadata(
        &self,
        remote_token: [u8; 20],
        name: &str,
        symbol: &str,
        decimals: u8,
        scaler_exponent: u8,
        options: &SendOptions,
    ) -> Result<SvmInitiation, BridgeError> {
        let salt = options.salt();
        let outgoing = seeds::outgoing_message_pda(&self.bridge_program, &salt);
        let payer = self.adapter.payer_pubkey()?;
        let metadata_hash =
            wrapped_token_metadata_hash(name, symbol, &remote_token, scaler_exponent);
        let mint = seeds::wrapped_mint_pda(&self.bridge_program, decimals, &metadata_hash.0);

        let instruction = Instruction {
            program_id: self.bridge_program,
            accounts: vec![
                AccountMeta::new(payer, true),
                AccountMeta::new(seeds::bridge_state_pda(&self.bridge_program), false),
                AccountMeta::new(mint, false),
                AccountMeta::new(outgoing, false),
                AccountMeta::new_readonly(spl_token::id(), false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data: encode_instruction(&BridgeInstruction::WrapToken {
                salt,
                decimals,
                name: name.to_string(),
                symbol: symbol.to_string(),
                remote_token,
                scaler_exponent,
                gas_limit: options.gas_limit(),
            })?,
        };

        info!(mint = %mint, name, symbol, decimals, "registering wrapped token metadata");
        self.submit_send(vec![instruction], outgoing, options)
            .await
    }

    /// Fetches and decodes an outgoing message, polling until the account
    /// exists or the default budget elapses.
    pub async fn get_outgoing_message(
        &self,
        outgoing: &Pubkey,
    ) -> Result<OutgoingMessageAccount, BridgeError> {
        let account = self
            .adapter
            .wait_for_account(outgoing, ACCOUNT_WAIT_TIMEOUT, ACCOUNT_WAIT_INTERVAL)
            .await?;
        OutgoingMessageAccount::try_from_slice(&account.data).map_err(|e| {
            BridgeError::invariant(format!("undecodable outgoing message {outgoing}: {e}"))
        })
    }

    /// Latest hub block height recorded in the bridge state account, used
    /// to decide prove readiness.
    pub async fn latest_destination_block_number(&self) -> Result<u64, BridgeError> {
        let state_pda = seeds::bridge_state_pda(&self.bridge_program);
        let account = self
            .adapter
            .get_account(&state_pda)
            .await?
            .ok_or_else(|| {
                BridgeError::config(format!("bridge state account {state_pda} does not exist"))
            })?;
        let state = BridgeStateAccount::try_from_slice(&account.data)
            .map_err(|e| BridgeError::invariant(format!("undecodable bridge state: {e}")))?;
        Ok(state.base_block_number)
    }

    /// Proves an incoming message against a registered output root.
    ///
    /// Idempotent: when the incoming PDA already exists the submission is
    /// skipped and only the message hash is returned.
    pub async fn prove_incoming_message(
        &self,
        message_hash: B256,
        nonce: u64,
        sender: [u8; 20],
        data: &[u8],
        proof: &[[u8; 32]],
        block_number: u64,
    ) -> Result<SvmProveResult, BridgeError> {
        let incoming = self.incoming_message_pda(&message_hash.0);
        if self.adapter.get_account(&incoming).await?.is_some() {
            debug!(message_hash = %b256_hex(&message_hash), "incoming message already proven");
            return Ok(SvmProveResult {
                signature: None,
                message_hash: message_hash.0,
            });
        }

        let payer = self.adapter.payer_pubkey()?;
        let instruction = Instruction {
            program_id: self.bridge_program,
            accounts: vec![
                AccountMeta::new(payer, true),
                AccountMeta::new_readonly(seeds::bridge_state_pda(&self.bridge_program), false),
                AccountMeta::new_readonly(
                    seeds::output_root_pda(&self.bridge_program, block_number),
                    false,
                ),
                AccountMeta::new(incoming, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data: encode_instruction(&BridgeInstruction::ProveMessage {
                nonce,
                sender,
                data: data.to_vec(),
                proof: proof.to_vec(),
                message_hash: message_hash.0,
                block_number,
            })?,
        };

        let signature = self.adapter.send_instructions(&[instruction], &[]).await?;
        info!(
            message_hash = %b256_hex(&message_hash),
            %signature,
            block_number,
            "proved incoming message"
        );
        Ok(SvmProveResult {
            signature: Some(signature),
            message_hash: message_hash.0,
        })
    }

    /// Executes a proven incoming message by submitting `relayMessage` with
    /// the remaining accounts the stored payload requires.
    pub async fn execute_incoming_message(
        &self,
        message_hash: &[u8; 32],
    ) -> Result<Signature, BridgeError> {
        let incoming = self.incoming_message_pda(message_hash);
        let hash_hex = format!("0x{}", hex::encode(message_hash));

        let account = self
            .adapter
            .get_account(&incoming)
            .await?
            .ok_or(BridgeError::NotProven {
                message_hash: hash_hex.clone(),
            })?;
        let stored = IncomingMessageAccount::try_from_slice(&account.data).map_err(|e| {
            BridgeError::invariant(format!("undecodable incoming message {incoming}: {e}"))
        })?;
        if stored.executed {
            return Err(BridgeError::AlreadyExecuted { id: hash_hex });
        }

        let payer = self.adapter.payer_pubkey()?;
        let cpi_authority = seeds::bridge_cpi_authority_pda(&self.bridge_program);
        let mut accounts = vec![
            AccountMeta::new(payer, true),
            AccountMeta::new(incoming, false),
            AccountMeta::new_readonly(cpi_authority, false),
        ];
        accounts.extend(self.relay_remaining_accounts(&stored.message, &cpi_authority)?);

        let instruction = Instruction {
            program_id: self.bridge_program,
            accounts,
            data: encode_instruction(&BridgeInstruction::RelayMessage)?,
        };

        let signature = self
            .adapter
            .send_instructions(&[instruction], &[])
            .await
            .map_err(|e| map_execute_error(e, &hash_hex))?;
        info!(message_hash = %hash_hex, %signature, "executed incoming message");
        Ok(signature)
    }

    /// Fetches the stored incoming message, if proven.
    pub async fn get_incoming_message(
        &self,
        message_hash: &[u8; 32],
    ) -> Result<Option<IncomingMessageAccount>, BridgeError> {
        let incoming = self.incoming_message_pda(message_hash);
        let Some(account) = self.adapter.get_account(&incoming).await? else {
            return Ok(None);
        };
        IncomingMessageAccount::try_from_slice(&account.data)
            .map(Some)
            .map_err(|e| {
                BridgeError::invariant(format!("undecodable incoming message {incoming}: {e}"))
            })
    }

    /// Remaining-accounts list for `relayMessage`: transfer settlement rows
    /// first, then every nested instruction's program and accounts. Any
    /// write flag on the bridge CPI authority is downgraded to read-only.
    fn relay_remaining_accounts(
        &self,
        payload: &IncomingPayload,
        cpi_authority: &Pubkey,
    ) -> Result<Vec<AccountMeta>, BridgeError> {
        let mut accounts = Vec::new();
        let ixs = match payload {
            IncomingPayload::Call(ixs) => ixs,
            IncomingPayload::Transfer { transfer, ixs } => {
                match transfer {
                    IncomingTransfer::Sol(sol) => {
                        accounts.push(AccountMeta::new(
                            seeds::sol_vault_pda(&self.bridge_program),
                            false,
                        ));
                        accounts.push(AccountMeta::new(sol.to, false));
                        accounts.push(AccountMeta::new_readonly(system_program::id(), false));
                    }
                    IncomingTransfer::Spl(spl) => {
                        let vault = seeds::token_vault_pda(
                            &self.bridge_program,
                            &spl.local_token,
                            &spl.remote_token,
                        );
                        accounts.push(AccountMeta::new(vault, false));
                        accounts.push(AccountMeta::new_readonly(spl.local_token, false));
                        accounts.push(AccountMeta::new(
                            get_associated_token_address(&spl.to, &spl.local_token)?,
                            false,
                        ));
                        accounts.push(AccountMeta::new_readonly(spl_token::id(), false));
                    }
                    IncomingTransfer::Wrapped(wrapped) => {
                        accounts.push(AccountMeta::new(wrapped.local_token, false));
                        accounts.push(AccountMeta::new(
                            get_associated_token_address(&wrapped.to, &wrapped.local_token)?,
                            false,
                        ));
                        accounts.push(AccountMeta::new_readonly(spl_token::id(), false));
                    }
                }
                ixs
            }
        };

        for ix in ixs {
            accounts.push(AccountMeta::new_readonly(ix.program_id, false));
            for row in &ix.accounts {
                let writable = row.is_writable && row.pubkey != *cpi_authority;
                accounts.push(AccountMeta {
                    pubkey: row.pubkey,
                    is_signer: false,
                    is_writable: writable,
                });
            }
        }
        Ok(accounts)
    }

    /// Submits a send, appending pay-for-relay when requested, and folds
    /// cluster-level duplicate detection into idempotent success.
    async fn submit_send(
        &self,
        mut instructions: Vec<Instruction>,
        outgoing: Pubkey,
        options: &SendOptions,
    ) -> Result<SvmInitiation, BridgeError> {
        if options.pay_for_relay {
            instructions.push(self.pay_for_relay_instruction(&outgoing, options.gas_limit())?);
        }

        match self.adapter.send_instructions(&instructions, &[]).await {
            Ok(signature) => Ok(SvmInitiation {
                outgoing_message: outgoing,
                signature: Some(signature),
            }),
            Err(err) => {
                // A retried idempotent send can race its earlier submission;
                // the cluster reports a duplicate but the PDA is live.
                let duplicate = matches!(&err, BridgeError::Rpc { message, .. }
                    if message.contains("already been processed")
                        || message.contains("AlreadyProcessed"));
                if duplicate
                    && options.idempotency_key.is_some()
                    && self.adapter.get_account(&outgoing).await?.is_some()
                {
                    debug!(%outgoing, "duplicate submission, outgoing message exists");
                    return Ok(SvmInitiation {
                        outgoing_message: outgoing,
                        signature: None,
                    });
                }
                Err(err)
            }
        }
    }

    /// Pay-for-relay side instruction: a relayer-program meter PDA funded
    /// from a fresh salt, referencing the outgoing message.
    fn pay_for_relay_instruction(
        &self,
        outgoing: &Pubkey,
        gas_limit: u64,
    ) -> Result<Instruction, BridgeError> {
        let payer = self.adapter.payer_pubkey()?;
        let relay_salt = random_salt();
        let meter = seeds::relayer_meter_pda(&self.relayer_program, &relay_salt);
        Ok(Instruction {
            program_id: self.relayer_program,
            accounts: vec![
                AccountMeta::new(payer, true),
                AccountMeta::new_readonly(seeds::relayer_config_pda(&self.relayer_program), false),
                AccountMeta::new(meter, false),
                AccountMeta::new_readonly(*outgoing, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data: encode_instruction(&RelayerInstruction::PayForRelay {
                salt: relay_salt,
                gas_limit,
            })?,
        })
    }
}

fn encode_instruction<T: borsh::BorshSerialize>(value: &T) -> Result<Vec<u8>, BridgeError> {
    borsh::to_vec(value)
        .map_err(|e| BridgeError::invariant(format!("failed to serialize instruction: {e}")))
}

/// Re-tags ambiguous chain-level execution failures.
fn map_execute_error(err: BridgeError, message_hash: &str) -> BridgeError {
    if let BridgeError::Rpc { message, .. } = &err {
        if message.contains("already been executed") || message.contains("AlreadyExecuted") {
            return BridgeError::AlreadyExecuted {
                id: message_hash.to_string(),
            };
        }
        if message.contains("not proven") || message.contains("NotProven") {
            return BridgeError::NotProven {
                message_hash: message_hash.to_string(),
            };
        }
    }
    err
}

/// Derives the associated token account for an owner and mint.
fn get_associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey, BridgeError> {
    let program_id = Pubkey::from_str(ASSOCIATED_TOKEN_PROGRAM_ID)
        .map_err(|e| BridgeError::config(format!("invalid associated token program id: {e}")))?;
    Ok(Pubkey::find_program_address(
        &[owner.as_ref(), spl_token::id().as_ref(), mint.as_ref()],
        &program_id,
    )
    .0)
}
