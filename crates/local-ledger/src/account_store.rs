//! In-memory account storage using DashMap for concurrent access

use dashmap::DashMap;
use solana_sdk::{
    account::{AccountSharedData, ReadableAccount},
    clock::Slot,
    pubkey::Pubkey,
};
use std::{collections::HashMap, sync::Arc};

/// Thread-safe in-memory account storage
///
/// Readers (RPC calls) and the slot producer touch it concurrently. Each
/// account remembers the slot it was last written in.
#[derive(Clone, Default)]
pub struct AccountStore {
    accounts: Arc<DashMap<Pubkey, (AccountSharedData, Slot)>>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_account(&self, pubkey: &Pubkey) -> Option<AccountSharedData> {
        self.accounts.get(pubkey).map(|r| r.value().0.clone())
    }

    /// Get an account with the slot it was last modified
    pub fn get_account_with_slot(&self, pubkey: &Pubkey) -> Option<(AccountSharedData, Slot)> {
        self.accounts.get(pubkey).map(|r| r.value().clone())
    }

    pub fn store_account(&self, pubkey: Pubkey, account: AccountSharedData, slot: Slot) {
        self.accounts.insert(pubkey, (account, slot));
    }

    /// Write back the accounts a transaction touched. Emptied accounts are removed.
    pub fn commit(&self, accounts: HashMap<Pubkey, AccountSharedData>, slot: Slot) {
        for (pubkey, account) in accounts {
            if account.lamports() == 0 && account.data().is_empty() {
                self.accounts.remove(&pubkey);
            } else {
                self.store_account(pubkey, account, slot);
            }
        }
    }

    pub fn account_exists(&self, pubkey: &Pubkey) -> bool {
        self.accounts.contains_key(pubkey)
    }

    /// Lamports held by `pubkey` (0 if the account doesn't exist)
    pub fn get_lamports(&self, pubkey: &Pubkey) -> u64 {
        self.accounts
            .get(pubkey)
            .map(|a| a.value().0.lamports())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
