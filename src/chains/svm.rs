//! SVM chain adapter
//!
//! Wraps a Solana RPC endpoint and a keypair source. Exposes the reads and
//! the signed-submission path the engines need, plus the process-local
//! keypair cache keyed by filesystem path. No cross-chain awareness.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::signer::keypair::read_keypair_file;
use solana_sdk::transaction::Transaction;
use tokio::time::sleep;
use tracing::debug;

use crate::error::BridgeError;
use crate::types::ChainId;

/// Process-local keypair cache, keyed by path. Immutable after insert.
static KEYPAIR_CACHE: OnceLock<Mutex<HashMap<PathBuf, Arc<Keypair>>>> = OnceLock::new();

fn keypair_cache() -> &'static Mutex<HashMap<PathBuf, Arc<Keypair>>> {
    KEYPAIR_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Loads a keypair from a file, caching by path.
pub fn load_keypair(path: &Path) -> Result<Arc<Keypair>, BridgeError> {
    let mut cache = keypair_cache()
        .lock()
        .expect("keypair cache lock poisoned");
    if let Some(cached) = cache.get(path) {
        return Ok(cached.clone());
    }
    let keypair = read_keypair_file(path).map_err(|e| {
        BridgeError::config(format!("failed to read keypair {}: {e}", path.display()))
    })?;
    let keypair = Arc::new(keypair);
    cache.insert(path.to_path_buf(), keypair.clone());
    Ok(keypair)
}

/// Where the adapter's payer keypair comes from.
pub enum SvmSigner {
    /// Filesystem path; loaded lazily and cached process-wide.
    KeypairPath(PathBuf),
    /// A keypair the caller already holds.
    Keypair(Arc<Keypair>),
}

pub struct SvmChainAdapter {
    chain_id: ChainId,
    rpc: RpcClient,
    signer: SvmSigner,
}

impl SvmChainAdapter {
    pub fn new(chain_id: ChainId, rpc_url: &str, signer: SvmSigner) -> Self {
        let rpc = RpcClient::new_with_commitment(
            rpc_url.to_string(),
            CommitmentConfig::confirmed(),
        );
        Self {
            chain_id,
            rpc,
            signer,
        }
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    /// Resolves the payer keypair from the configured source.
    pub fn payer(&self) -> Result<Arc<Keypair>, BridgeError> {
        match &self.signer {
            SvmSigner::Keypair(keypair) => Ok(keypair.clone()),
            SvmSigner::KeypairPath(path) => load_keypair(path),
        }
    }

    pub fn payer_pubkey(&self) -> Result<Pubkey, BridgeError> {
        Ok(self.payer()?.pubkey())
    }

    /// Latest blockhash at confirmed commitment.
    pub async fn latest_blockhash(&self) -> Result<Hash, BridgeError> {
        self.rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| BridgeError::rpc(self.chain_id.as_str(), e))
    }

    /// Fetches an account, returning `None` when it does not exist.
    pub async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, BridgeError> {
        let response = self
            .rpc
            .get_account_with_commitment(pubkey, CommitmentConfig::confirmed())
            .await
            .map_err(|e| BridgeError::rpc(self.chain_id.as_str(), e))?;
        Ok(response.value)
    }

    /// Polls for an account until it exists or the timeout elapses.
    pub async fn wait_for_account(
        &self,
        pubkey: &Pubkey,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Account, BridgeError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(account) = self.get_account(pubkey).await? {
                return Ok(account);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BridgeError::Timeout {
                    stage: crate::error::ErrorStage::Initiate,
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            sleep(poll_interval).await;
        }
    }

    /// Builds, signs and submits a transaction with the adapter payer and
    /// any additional signers, waiting for confirmed commitment.
    pub async fn send_instructions(
        &self,
        instructions: &[Instruction],
        extra_signers: &[&Keypair],
    ) -> Result<Signature, BridgeError> {
        let payer = self.payer()?;
        let blockhash = self.latest_blockhash().await?;

        let mut signers: Vec<&Keypair> = vec![payer.as_ref()];
        signers.extend_from_slice(extra_signers);
        let transaction = Transaction::new_signed_with_payer(
            instructions,
            Some(&payer.pubkey()),
            &signers,
            blockhash,
        );

        debug!(
            chain = %self.chain_id,
            instructions = instructions.len(),
            payer = %payer.pubkey(),
            "submitting SVM transaction"
        );

        self.rpc
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(|e| BridgeError::rpc(self.chain_id.as_str(), e))
    }

    /// Program-derived address helper.
    pub fn find_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(seeds, program_id).0
    }

    /// Health check: fetches the latest blockhash.
    pub async fn ping(&self) -> Result<(), BridgeError> {
        self.latest_blockhash().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the keypair cache resolves the same instance per path
    /// Why: the cache is process-local and immutable after insert
    #[test]
    fn test_keypair_cache_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payer.json");
        let keypair = Keypair::new();
        let bytes: Vec<u8> = keypair.to_bytes().to_vec();
        std::fs::write(&path, serde_json::to_string(&bytes).unwrap()).unwrap();

        let first = load_keypair(&path).unwrap();
        let second = load_keypair(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.pubkey(), keypair.pubkey());
    }

    /// Test that a missing keypair file is a config error
    #[test]
    fn test_missing_keypair_file() {
        let err = load_keypair(Path::new("/nonexistent/payer.json")).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    /// Test payer resolution from a pre-bound keypair
    #[test]
    fn test_payer_from_bound_keypair() {
        let keypair = Arc::new(Keypair::new());
        let adapter = SvmChainAdapter::new(
            ChainId::parse("solana:devnet").unwrap(),
            "http://127.0.0.1:1",
            SvmSigner::Keypair(keypair.clone()),
        );
        assert_eq!(adapter.payer_pubkey().unwrap(), keypair.pubkey());
    }
}
