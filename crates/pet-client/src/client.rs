//! Pet Client
//!
//! Pull path and mutation path. Every successful read lands in the shared
//! [`RecordCache`]; every confirmed mutation is followed by a fresh read.

use crate::{
    address::RecordAddress,
    cache::RecordCache,
    config::{ClientConfig, ClientSettings},
    error::{ClientError, ConfigError},
    reconciler::{self, SubscriptionHandle},
    record::{FetchOutcome, Record},
    rpc::{commitment_satisfied, LedgerRpc, SignatureStatus},
};
use pet_program::{Pet, PetInstruction};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use std::sync::Arc;
use tokio::time::{sleep, Instant};

/// Handle to one pet record on one ledger
#[derive(Clone)]
pub struct PetClient {
    rpc: Arc<dyn LedgerRpc>,
    address: RecordAddress,
    owner: Pubkey,
    identity: Option<Arc<Keypair>>,
    cache: Arc<RecordCache>,
    settings: ClientSettings,
}

impl PetClient {
    pub fn new(
        rpc: Arc<dyn LedgerRpc>,
        address: RecordAddress,
        owner: Pubkey,
        settings: ClientSettings,
    ) -> Self {
        Self {
            rpc,
            address,
            owner,
            identity: None,
            cache: Arc::new(RecordCache::new()),
            settings,
        }
    }

    /// Build from configuration. Fails only on static configuration errors.
    pub fn from_config(rpc: Arc<dyn LedgerRpc>, config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(
            rpc,
            config.resolve_address()?,
            config.owner()?,
            config.client_settings()?,
        ))
    }

    /// Same record and cache, signing as `identity` (or read-only when `None`)
    pub fn with_identity(mut self, identity: Option<Arc<Keypair>>) -> Self {
        let changed = self.identity.as_ref().map(|k| k.pubkey()) != identity.as_ref().map(|k| k.pubkey());
        if changed {
            self.cache.clear_balance();
        }
        self.identity = identity;
        self
    }

    pub fn address(&self) -> &RecordAddress {
        &self.address
    }

    pub fn cache(&self) -> &Arc<RecordCache> {
        &self.cache
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub(crate) fn rpc(&self) -> &Arc<dyn LedgerRpc> {
        &self.rpc
    }

    pub fn identity(&self) -> Option<Pubkey> {
        self.identity.as_ref().map(|k| k.pubkey())
    }

    /// Whether the local identity is the configured owner
    pub fn is_owner(&self) -> bool {
        self.identity() == Some(self.owner)
    }

    /// Cached record, if any
    pub fn record(&self) -> Option<Record> {
        self.cache.get()
    }

    /// Last fetched balance of the local identity
    pub fn balance(&self) -> Option<u64> {
        self.cache.balance()
    }

    /// Pull the record and merge it into the cache.
    ///
    /// Also refreshes the identity's balance. A failure leaves the cache as it was.
    pub async fn fetch_record(&self) -> Result<FetchOutcome, ClientError> {
        let commitment = self.settings.commitment;

        if let Some(identity) = self.identity() {
            match self.rpc.get_balance(&identity, commitment).await {
                Ok(lamports) => self.cache.set_balance(lamports),
                Err(e) => tracing::warn!("Failed to fetch balance of {}: {}", identity, e),
            }
        }

        let account = self
            .rpc
            .get_account(self.address.pubkey(), commitment)
            .await
            .inspect_err(|e| tracing::warn!("Failed to fetch pet record: {}", e))?;

        let Some(account) = account else {
            tracing::debug!("Pet record {} not initialized", self.address);
            self.cache.apply_snapshot(&FetchOutcome::NotFound, 0);
            return Ok(FetchOutcome::NotFound);
        };

        if account.owner != *self.address.program_id() {
            return Err(ClientError::Decode(format!(
                "account {} is owned by {}, not the pet program",
                self.address, account.owner
            )));
        }
        let record = Record::decode(&account.data).map_err(|e| {
            tracing::warn!("Undecodable pet record at slot {}: {}", account.slot, e);
            ClientError::Decode(e.to_string())
        })?;

        let outcome = FetchOutcome::Found(record);
        if self.cache.apply_snapshot(&outcome, account.slot) {
            tracing::debug!("Cached pet record from slot {}", account.slot);
        }
        Ok(outcome)
    }

    /// Alias of [`Self::fetch_record`]
    pub async fn refresh(&self) -> Result<FetchOutcome, ClientError> {
        self.fetch_record().await
    }

    /// Open the push channel. Dropping the handle closes it.
    pub async fn subscribe(&self) -> Result<SubscriptionHandle, ClientError> {
        reconciler::spawn(self.clone()).await
    }

    /// Create the record. The name defaults to "maya" on the ledger side.
    pub async fn init(&self, name: Option<&str>) -> Result<Option<Signature>, ClientError> {
        if let Some(name) = name {
            if name.len() > Pet::MAX_NAME_LEN {
                return Err(ClientError::InvalidName(name.len()));
            }
        }
        self.submit(PetInstruction::InitPet {
            name: name.map(str::to_string),
        })
        .await
    }

    pub async fn feed(&self) -> Result<Option<Signature>, ClientError> {
        self.submit(PetInstruction::FeedPet).await
    }

    pub async fn play(&self) -> Result<Option<Signature>, ClientError> {
        self.submit(PetInstruction::PlayPet).await
    }

    /// Move collected food payments to the owner
    pub async fn withdraw(&self) -> Result<Option<Signature>, ClientError> {
        self.submit(PetInstruction::Withdraw).await
    }

    /// Developer faucet for the local identity
    pub async fn request_airdrop(&self, lamports: u64) -> Result<Option<Signature>, ClientError> {
        let Some(identity) = self.identity() else {
            tracing::debug!("No identity configured, skipping airdrop");
            return Ok(None);
        };
        let signature = self.rpc.request_airdrop(&identity, lamports).await?;
        tracing::info!("Requested airdrop of {} lamports to {}: {}", lamports, identity, signature);

        self.await_confirmation(&signature, CommitmentConfig::confirmed())
            .await?;

        match self.rpc.get_balance(&identity, CommitmentConfig::confirmed()).await {
            Ok(lamports) => self.cache.set_balance(lamports),
            Err(e) => tracing::warn!("Failed to refresh balance: {}", e),
        }
        Ok(Some(signature))
    }

    async fn submit(&self, instruction: PetInstruction) -> Result<Option<Signature>, ClientError> {
        let Some(identity) = self.identity.clone() else {
            tracing::debug!("No identity configured, skipping {}", instruction.method_name());
            return Ok(None);
        };

        let ix = instruction.to_instruction(
            self.address.program_id(),
            self.address.pubkey(),
            &identity.pubkey(),
        );
        let blockhash = self.rpc.latest_blockhash(self.settings.commitment).await?;
        let transaction = Transaction::new_signed_with_payer(
            &[ix],
            Some(&identity.pubkey()),
            &[identity.as_ref()],
            blockhash,
        );

        let signature = self.rpc.send_transaction(&transaction).await?;
        tracing::info!("Sent {} ({})", instruction.method_name(), signature);

        self.await_confirmation(&signature, self.settings.commitment)
            .await
            .inspect_err(|e| tracing::warn!("{} failed: {}", instruction.method_name(), e))?;
        tracing::info!("Confirmed {} ({})", instruction.method_name(), signature);

        if let Err(e) = self.fetch_record().await {
            tracing::warn!("Post-confirmation fetch failed: {}", e);
        }
        Ok(Some(signature))
    }

    /// Poll the signature status until `commitment` is reached or the timeout expires
    async fn await_confirmation(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<(), ClientError> {
        let started = Instant::now();

        loop {
            match self.rpc.signature_status(signature).await? {
                Some(SignatureStatus {
                    err: Some(reason), ..
                }) => {
                    return Err(ClientError::TransactionFailed {
                        signature: *signature,
                        reason,
                    });
                }
                Some(status) if commitment_satisfied(status.confirmation, commitment.commitment) => {
                    return Ok(());
                }
                _ => {}
            }

            let waited = started.elapsed();
            if waited >= self.settings.confirm_timeout {
                return Err(ClientError::ConfirmationTimeout {
                    signature: *signature,
                    waited,
                });
            }
            sleep(self.settings.confirm_poll).await;
        }
    }
}
