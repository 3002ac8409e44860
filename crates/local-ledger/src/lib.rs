//! Local Ledger - in-process ledger running the pet program
//!
//! Speaks the same [`LedgerRpc`] surface as a JSON-RPC node, so the client
//! engine runs against it unchanged:
//! - Account storage and transaction processing with the pet program's rules
//! - Slot production loop that settles submitted transactions
//! - `logsSubscribe`-style push notifications that can be switched off
//! - A decay cranker standing in for the external apply_decay bot

pub mod account_store;
pub mod chain;
pub mod processor;
pub mod slot_producer;
pub mod subscriptions;

#[cfg(test)]
mod tests;

pub use account_store::AccountStore;
pub use chain::{ChainState, TransactionStatus};
pub use processor::{PetProcessor, TransactionResult};
pub use slot_producer::{SlotProducer, SlotProducerConfig, SlotUpdate, TransactionSender};
pub use subscriptions::{SubscriptionId, SubscriptionManager};

use async_trait::async_trait;
use parking_lot::Mutex;
use pet_client::{
    rpc::{AccountSnapshot, LogReceiver, SignatureStatus},
    Clock, LedgerRpc, RpcError, TransactionFailure,
};
use pet_program::{Pet, PetError, PetInstruction};
use solana_sdk::{
    account::{AccountSharedData, ReadableAccount, WritableAccount},
    clock::Slot,
    commitment_config::CommitmentConfig,
    hash::Hash,
    instruction::InstructionError,
    pubkey::Pubkey,
    sanitize::Sanitize,
    signature::{Keypair, Signature, Signer},
    system_program,
    transaction::{Transaction, TransactionError},
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Slot time in milliseconds
pub const DEFAULT_SLOT_TIME_MS: u64 = 400;

/// Maximum transactions settled per slot
pub const MAX_TXS_PER_SLOT: usize = 64;

/// JSON-RPC code for a transaction whose signatures do not verify
const SIGNATURE_FAILURE_CODE: i64 = -32003;

/// JSON-RPC code for a transaction that fails to sanitize
const INVALID_PARAMS_CODE: i64 = -32602;

/// JSON-RPC code for a rejected preflight
const PREFLIGHT_FAILURE_CODE: i64 = -32002;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Transaction queue unavailable: {0}")]
    QueueClosed(String),
    #[error("Cannot derive pet address for program {0}")]
    InvalidProgram(Pubkey),
}

#[derive(Clone, Debug)]
pub struct LedgerConfig {
    pub slot_time_ms: u64,
    /// Identity allowed to init and withdraw
    pub owner: Pubkey,
    pub program_id: Pubkey,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            slot_time_ms: DEFAULT_SLOT_TIME_MS,
            owner: pet_program::OWNER,
            program_id: pet_program::id(),
        }
    }
}

pub struct LocalLedger {
    store: AccountStore,
    chain: Arc<ChainState>,
    subscriptions: Arc<SubscriptionManager>,
    tx_sender: TransactionSender,
    program_id: Pubkey,
    pet_address: Pubkey,
    cranker: Keypair,
    cancel: CancellationToken,
    producer: Mutex<Option<JoinHandle<()>>>,
}

impl LocalLedger {
    /// Start the slot producer. Must be called inside a tokio runtime.
    pub fn start(config: LedgerConfig, clock: Arc<dyn Clock>) -> Result<Arc<Self>, LedgerError> {
        let pet_address = pet_program::derive_pet_pda(pet_program::constants::PET_SEED, &config.program_id)
            .map(|(address, _)| address)
            .ok_or(LedgerError::InvalidProgram(config.program_id))?;

        let store = AccountStore::new();
        let chain = Arc::new(ChainState::new());
        let subscriptions = Arc::new(SubscriptionManager::new());
        let processor = PetProcessor::new(store.clone(), clock, config.program_id, config.owner);

        let producer = SlotProducer::new(
            processor,
            chain.clone(),
            subscriptions.clone(),
            SlotProducerConfig {
                slot_time_ms: config.slot_time_ms,
                ..Default::default()
            },
        );
        let tx_sender = producer.transaction_sender();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(producer.run_async(cancel.clone()));

        tracing::info!(
            "Local ledger started: program {}, pet {}, owner {}",
            config.program_id,
            pet_address,
            config.owner
        );

        Ok(Arc::new(Self {
            store,
            chain,
            subscriptions,
            tx_sender,
            program_id: config.program_id,
            pet_address,
            cranker: Keypair::new(),
            cancel,
            producer: Mutex::new(Some(handle)),
        }))
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn pet_address(&self) -> &Pubkey {
        &self.pet_address
    }

    pub fn current_slot(&self) -> Slot {
        self.chain.current_slot()
    }

    /// Credit lamports to an account, creating it if needed
    pub fn fund(&self, pubkey: &Pubkey, lamports: u64) {
        let mut account = self
            .store
            .get_account(pubkey)
            .unwrap_or_else(|| AccountSharedData::new(0, 0, &system_program::id()));
        if let Err(e) = account.checked_add_lamports(lamports) {
            tracing::warn!("Cannot fund {}: {}", pubkey, e);
        }
        self.store.store_account(*pubkey, account, self.current_slot());
    }

    /// The pet record as currently stored
    pub fn pet(&self) -> Option<Pet> {
        let account = self.store.get_account(&self.pet_address)?;
        Pet::try_from_account_data(account.data()).ok()
    }

    /// Drop log notifications while disabled, as a flaky node would
    pub fn set_event_delivery(&self, enabled: bool) {
        tracing::info!("Event delivery {}", if enabled { "enabled" } else { "disabled" });
        self.subscriptions.set_delivery(enabled);
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.subscription_count()
    }

    /// Submit an apply_decay transaction signed by the built-in cranker
    pub fn crank_decay(&self) -> Result<Signature, LedgerError> {
        let ix = PetInstruction::ApplyDecay.to_instruction(
            &self.program_id,
            &self.pet_address,
            &self.cranker.pubkey(),
        );
        let tx = Transaction::new_signed_with_payer(
            &[ix],
            Some(&self.cranker.pubkey()),
            &[&self.cranker],
            self.chain.latest_blockhash(),
        );
        let signature = tx.signatures[0];
        self.tx_sender.send(tx).map_err(LedgerError::QueueClosed)?;
        tracing::debug!("Queued decay crank {}", signature);
        Ok(signature)
    }

    /// Stop producing slots
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.producer.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("Slot producer ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for LocalLedger {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Map a settled transaction error onto what a client sees
fn transaction_failure(error: &TransactionError) -> TransactionFailure {
    match error {
        TransactionError::InstructionError(_, InstructionError::Custom(code)) => {
            match PetError::from_code(*code) {
                Some(e) => TransactionFailure::Program(e),
                None => TransactionFailure::Other(error.to_string()),
            }
        }
        other => TransactionFailure::Other(other.to_string()),
    }
}

#[async_trait]
impl LedgerRpc for LocalLedger {
    async fn get_account(
        &self,
        address: &Pubkey,
        _commitment: CommitmentConfig,
    ) -> Result<Option<AccountSnapshot>, RpcError> {
        Ok(self
            .store
            .get_account_with_slot(address)
            .filter(|(account, _)| account.lamports() > 0)
            .map(|(account, slot)| AccountSnapshot {
                slot,
                lamports: account.lamports(),
                owner: *account.owner(),
                data: account.data().to_vec(),
            }))
    }

    async fn get_balance(&self, owner: &Pubkey, _commitment: CommitmentConfig) -> Result<u64, RpcError> {
        Ok(self.store.get_lamports(owner))
    }

    async fn latest_blockhash(&self, _commitment: CommitmentConfig) -> Result<Hash, RpcError> {
        Ok(self.chain.latest_blockhash())
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
        if let Err(e) = transaction.sanitize() {
            return Err(RpcError::Server {
                code: INVALID_PARAMS_CODE,
                message: format!("invalid transaction: {}", e),
            });
        }
        if transaction.verify().is_err() {
            return Err(RpcError::Server {
                code: SIGNATURE_FAILURE_CODE,
                message: "Transaction signature verification failure".to_string(),
            });
        }
        if !self.chain.is_recent_blockhash(&transaction.message.recent_blockhash) {
            return Err(RpcError::Server {
                code: PREFLIGHT_FAILURE_CODE,
                message: "Transaction simulation failed: Blockhash not found".to_string(),
            });
        }

        let signature = transaction.signatures.first().copied().unwrap_or_default();
        self.tx_sender
            .send(transaction.clone())
            .map_err(RpcError::Transport)?;
        tracing::trace!("Queued transaction {}", signature);
        Ok(signature)
    }

    async fn signature_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>, RpcError> {
        Ok(self.chain.status(signature).map(|(status, confirmation)| SignatureStatus {
            slot: status.slot,
            confirmation,
            err: status.error.as_ref().map(transaction_failure),
        }))
    }

    async fn request_airdrop(&self, to: &Pubkey, lamports: u64) -> Result<Signature, RpcError> {
        self.fund(to, lamports);
        let signature = Signature::new_unique();
        self.chain.record_status(
            signature,
            TransactionStatus {
                slot: self.current_slot(),
                error: None,
            },
        );
        tracing::info!("Airdropped {} lamports to {}", lamports, to);
        Ok(signature)
    }

    async fn subscribe_logs(
        &self,
        program_id: &Pubkey,
        _commitment: CommitmentConfig,
    ) -> Result<LogReceiver, RpcError> {
        let (_, receiver) = self.subscriptions.subscribe_logs(*program_id);
        Ok(receiver)
    }
}
