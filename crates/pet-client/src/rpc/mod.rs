//! Ledger access
//!
//! Everything the engine needs from the ledger, behind one async trait so the
//! engine runs unchanged against a JSON-RPC node or the in-process ledger.

pub mod json;

use crate::error::{RpcError, TransactionFailure};
use async_trait::async_trait;
use pet_program::PetError;
use serde_json::Value;
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};
use tokio::sync::mpsc;

pub use json::JsonRpcLedger;

/// Raw account as read from the ledger
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountSnapshot {
    /// Slot the data is current as of: the read's context slot, or the slot the
    /// account was last written in
    pub slot: u64,
    pub lamports: u64,
    pub owner: Pubkey,
    pub data: Vec<u8>,
}

/// Processing status of a submitted transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmation: CommitmentLevel,
    pub err: Option<TransactionFailure>,
}

/// Logs of one transaction that mentioned the program
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogNotification {
    pub slot: u64,
    pub signature: String,
    /// The transaction failed; its logs describe no state change
    pub failed: bool,
    pub logs: Vec<String>,
}

/// Stream of log notifications. Dropping it ends the subscription.
pub type LogReceiver = mpsc::Receiver<LogNotification>;

/// Buffer between transport and reconciler
pub const LOG_CHANNEL_CAPACITY: usize = 64;

#[async_trait]
pub trait LedgerRpc: Send + Sync + 'static {
    /// Read an account. `Ok(None)` when it does not exist.
    async fn get_account(
        &self,
        address: &Pubkey,
        commitment: CommitmentConfig,
    ) -> Result<Option<AccountSnapshot>, RpcError>;

    /// Lamport balance of an identity
    async fn get_balance(&self, owner: &Pubkey, commitment: CommitmentConfig) -> Result<u64, RpcError>;

    async fn latest_blockhash(&self, commitment: CommitmentConfig) -> Result<Hash, RpcError>;

    /// Submit a signed transaction, returning its signature
    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError>;

    /// `Ok(None)` while the ledger has not seen the signature
    async fn signature_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>, RpcError>;

    /// Developer faucet
    async fn request_airdrop(&self, to: &Pubkey, lamports: u64) -> Result<Signature, RpcError>;

    /// Push channel of transactions mentioning `program_id`
    async fn subscribe_logs(
        &self,
        program_id: &Pubkey,
        commitment: CommitmentConfig,
    ) -> Result<LogReceiver, RpcError>;
}

fn commitment_rank(level: CommitmentLevel) -> u8 {
    match level {
        CommitmentLevel::Processed => 0,
        CommitmentLevel::Confirmed => 1,
        CommitmentLevel::Finalized => 2,
    }
}

/// Whether `reached` is at least as strong as `required`
pub fn commitment_satisfied(reached: CommitmentLevel, required: CommitmentLevel) -> bool {
    commitment_rank(reached) >= commitment_rank(required)
}

/// Interpret the `err` field of a signature status,
/// e.g. `{"InstructionError":[0,{"Custom":6000}]}`
pub fn parse_transaction_error(err: &Value) -> TransactionFailure {
    let custom = err
        .get("InstructionError")
        .and_then(|v| v.get(1))
        .and_then(|v| v.get("Custom"))
        .and_then(Value::as_u64);

    match custom
        .and_then(|code| u32::try_from(code).ok())
        .and_then(PetError::from_code)
    {
        Some(e) => TransactionFailure::Program(e),
        None => TransactionFailure::Other(err.to_string()),
    }
}
