//! Slot Producer
//!
//! Drains submitted transactions once per slot, runs them through the pet
//! processor, records their statuses, notifies log subscribers and advances
//! the chain.

use crate::{
    chain::{ChainState, TransactionStatus},
    processor::{PetProcessor, TransactionResult},
    subscriptions::SubscriptionManager,
    DEFAULT_SLOT_TIME_MS, MAX_TXS_PER_SLOT,
};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use solana_sdk::{clock::Slot, hash::Hash, transaction::Transaction};
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Summary of one produced slot
#[derive(Clone, Debug)]
pub struct SlotUpdate {
    /// Slot the transactions were processed in
    pub slot: Slot,
    /// Blockhash of the next slot
    pub blockhash: Hash,
    pub transaction_count: usize,
}

#[derive(Clone, Debug)]
pub struct SlotProducerConfig {
    pub slot_time_ms: u64,
    pub max_txs_per_slot: usize,
}

impl Default for SlotProducerConfig {
    fn default() -> Self {
        Self {
            slot_time_ms: DEFAULT_SLOT_TIME_MS,
            max_txs_per_slot: MAX_TXS_PER_SLOT,
        }
    }
}

/// Handle for submitting transactions to the slot producer
#[derive(Clone)]
pub struct TransactionSender {
    sender: Sender<Transaction>,
}

impl TransactionSender {
    pub fn send(&self, tx: Transaction) -> Result<(), String> {
        self.sender
            .try_send(tx)
            .map_err(|e| format!("Failed to submit transaction: {}", e))
    }
}

pub struct SlotProducer {
    processor: PetProcessor,
    chain: Arc<ChainState>,
    subscriptions: Arc<SubscriptionManager>,
    tx_receiver: Receiver<Transaction>,
    tx_sender: Sender<Transaction>,
    config: SlotProducerConfig,
}

impl SlotProducer {
    pub fn new(
        processor: PetProcessor,
        chain: Arc<ChainState>,
        subscriptions: Arc<SubscriptionManager>,
        config: SlotProducerConfig,
    ) -> Self {
        let (tx_sender, tx_receiver) = bounded(1024);

        Self {
            processor,
            chain,
            subscriptions,
            tx_receiver,
            tx_sender,
            config,
        }
    }

    pub fn transaction_sender(&self) -> TransactionSender {
        TransactionSender {
            sender: self.tx_sender.clone(),
        }
    }

    /// Process whatever is queued and close the current slot
    pub fn produce_slot(&mut self) -> SlotUpdate {
        let slot = self.chain.current_slot();

        let mut pending = Vec::new();
        loop {
            match self.tx_receiver.try_recv() {
                Ok(tx) => {
                    pending.push(tx);
                    if pending.len() >= self.config.max_txs_per_slot {
                        break;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        let results: Vec<TransactionResult> = pending
            .iter()
            .map(|tx| self.processor.process_transaction(tx, slot))
            .collect();

        for result in &results {
            if !result.success() {
                tracing::debug!("Transaction {} failed: {:?}", result.signature, result.error);
            }
            self.chain.record_status(
                result.signature,
                TransactionStatus {
                    slot,
                    error: result.error.clone(),
                },
            );
        }
        self.subscriptions.notify(&results);

        let (_, blockhash) = self.chain.advance();
        SlotUpdate {
            slot,
            blockhash,
            transaction_count: results.len(),
        }
    }

    /// Produce slots until cancelled
    pub async fn run_async(mut self, cancel: CancellationToken) {
        let slot_duration = Duration::from_millis(self.config.slot_time_ms.max(1));
        let mut interval = tokio::time::interval(slot_duration);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!("Slot producer started ({}ms slots)", self.config.slot_time_ms);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            let tick_start = Instant::now();
            let update = self.produce_slot();

            if update.transaction_count > 0 {
                tracing::debug!("Slot {} | {} txs", update.slot, update.transaction_count);
            }

            let processing_time = tick_start.elapsed();
            if processing_time > slot_duration {
                tracing::warn!(
                    "Slot {} took {:.2}ms (target: {}ms)",
                    update.slot,
                    processing_time.as_secs_f64() * 1000.0,
                    self.config.slot_time_ms
                );
            }
        }

        tracing::info!("Slot producer stopped at slot {}", self.chain.current_slot());
    }
}
