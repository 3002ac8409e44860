//! Scriptable ledger for engine tests

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use pet_program::{Pet, PetEvent};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};
use tokio::sync::mpsc;

use crate::{
    address::RecordAddress,
    client::PetClient,
    config::ClientSettings,
    error::RpcError,
    rpc::{AccountSnapshot, LedgerRpc, LogNotification, LogReceiver, SignatureStatus, LOG_CHANNEL_CAPACITY},
};

#[derive(Default)]
pub struct MockLedger {
    account: Mutex<Option<AccountSnapshot>>,
    status: Mutex<Option<SignatureStatus>>,
    subscribers: Mutex<Vec<mpsc::Sender<LogNotification>>>,
    sent: Mutex<Vec<Transaction>>,
    fetches: AtomicUsize,
    fail_reads: AtomicBool,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_pet(&self, pet: &Pet, slot: u64) {
        *self.account.lock() = Some(AccountSnapshot {
            slot,
            lamports: 1_000_000,
            owner: pet_program::id(),
            data: pet.to_account_data(),
        });
    }

    pub fn set_raw(&self, data: Vec<u8>, slot: u64) {
        *self.account.lock() = Some(AccountSnapshot {
            slot,
            lamports: 1_000_000,
            owner: pet_program::id(),
            data,
        });
    }

    pub fn set_status(&self, status: Option<SignatureStatus>) {
        *self.status.lock() = status;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn last_payer(&self) -> Option<Pubkey> {
        self.sent.lock().last().map(|tx| tx.message.account_keys[0])
    }

    /// Deliver to every live subscriber. Returns how many accepted it.
    pub fn push(&self, notification: LogNotification) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers
            .iter()
            .filter(|tx| tx.try_send(notification.clone()).is_ok())
            .count()
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn get_account(
        &self,
        _address: &Pubkey,
        _commitment: CommitmentConfig,
    ) -> Result<Option<AccountSnapshot>, RpcError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RpcError::Transport("connection refused".to_string()));
        }
        Ok(self.account.lock().clone())
    }

    async fn get_balance(&self, _owner: &Pubkey, _commitment: CommitmentConfig) -> Result<u64, RpcError> {
        Ok(5_000_000_000)
    }

    async fn latest_blockhash(&self, _commitment: CommitmentConfig) -> Result<Hash, RpcError> {
        Ok(Hash::new_unique())
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
        self.sent.lock().push(transaction.clone());
        Ok(transaction.signatures[0])
    }

    async fn signature_status(&self, _signature: &Signature) -> Result<Option<SignatureStatus>, RpcError> {
        Ok(self.status.lock().clone())
    }

    async fn request_airdrop(&self, _to: &Pubkey, _lamports: u64) -> Result<Signature, RpcError> {
        Err(RpcError::Server {
            code: -32601,
            message: "faucet disabled".to_string(),
        })
    }

    async fn subscribe_logs(
        &self,
        _program_id: &Pubkey,
        _commitment: CommitmentConfig,
    ) -> Result<LogReceiver, RpcError> {
        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        self.subscribers.lock().push(tx);
        Ok(rx)
    }
}

pub fn client(ledger: &Arc<MockLedger>) -> PetClient {
    let address = RecordAddress::resolve("maya", &pet_program::id()).unwrap();
    PetClient::new(
        ledger.clone(),
        address,
        pet_program::OWNER,
        ClientSettings::default(),
    )
}

pub fn pet(hunger: u8, happiness: u8, last_update: i64) -> Pet {
    Pet {
        name: "maya".to_string(),
        hunger,
        happiness,
        alive: true,
        food_queue: 0,
        last_update,
        total_sol_received: 0,
        last_feeder: Pubkey::default(),
    }
}

pub fn notification(slot: u64, lines: Vec<String>) -> LogNotification {
    let program = pet_program::id();
    let mut logs = vec![format!("Program {} invoke [1]", program)];
    logs.extend(lines);
    logs.push(format!("Program {} success", program));
    LogNotification {
        slot,
        signature: Signature::new_unique().to_string(),
        failed: false,
        logs,
    }
}

pub fn event_notification(slot: u64, event: &PetEvent) -> LogNotification {
    notification(slot, vec![event.to_log_line()])
}
