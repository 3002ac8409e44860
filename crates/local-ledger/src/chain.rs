//! Chain state shared between the slot producer and RPC calls

use dashmap::DashMap;
use parking_lot::RwLock;
use solana_sdk::{
    clock::Slot,
    commitment_config::CommitmentLevel,
    hash::Hash,
    signature::Signature,
    transaction::TransactionError,
};
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
};

/// Blockhashes older than this many slots are rejected
pub const MAX_RECENT_BLOCKHASHES: usize = 150;

/// Slots after which a transaction counts as finalized
pub const FINALITY_DEPTH: u64 = 32;

/// Where and how a transaction landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStatus {
    pub slot: Slot,
    pub error: Option<TransactionError>,
}

pub struct ChainState {
    slot: AtomicU64,
    blockhashes: RwLock<VecDeque<Hash>>,
    statuses: DashMap<Signature, TransactionStatus>,
}

impl ChainState {
    pub fn new() -> Self {
        let mut blockhashes = VecDeque::with_capacity(MAX_RECENT_BLOCKHASHES);
        blockhashes.push_back(Hash::new_unique());
        Self {
            slot: AtomicU64::new(0),
            blockhashes: RwLock::new(blockhashes),
            statuses: DashMap::new(),
        }
    }

    pub fn current_slot(&self) -> Slot {
        self.slot.load(Ordering::SeqCst)
    }

    pub fn latest_blockhash(&self) -> Hash {
        self.blockhashes.read().back().copied().unwrap_or_default()
    }

    pub fn is_recent_blockhash(&self, hash: &Hash) -> bool {
        self.blockhashes.read().contains(hash)
    }

    /// Move to the next slot with a fresh blockhash
    pub fn advance(&self) -> (Slot, Hash) {
        let blockhash = Hash::new_unique();
        {
            let mut hashes = self.blockhashes.write();
            hashes.push_back(blockhash);
            while hashes.len() > MAX_RECENT_BLOCKHASHES {
                hashes.pop_front();
            }
        }
        let slot = self.slot.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!("Advanced to slot {}", slot);
        (slot, blockhash)
    }

    pub fn record_status(&self, signature: Signature, status: TransactionStatus) {
        self.statuses.insert(signature, status);
    }

    /// Status and commitment reached, derived from the depth below the current slot
    pub fn status(&self, signature: &Signature) -> Option<(TransactionStatus, CommitmentLevel)> {
        let status = self.statuses.get(signature)?.clone();
        let depth = self.current_slot().saturating_sub(status.slot);
        let level = if depth >= FINALITY_DEPTH {
            CommitmentLevel::Finalized
        } else if depth >= 1 {
            CommitmentLevel::Confirmed
        } else {
            CommitmentLevel::Processed
        };
        Some((status, level))
    }
}

impl Default for ChainState {
    fn default() -> Self {
        Self::new()
    }
}
