//! Subscription Manager - log subscriptions keyed by mentioned account
//!
//! Mirrors `logsSubscribe` with a `mentions` filter: a subscriber receives the
//! logs of every processed transaction naming its account.

use crate::processor::TransactionResult;
use dashmap::DashMap;
use pet_client::{rpc::LOG_CHANNEL_CAPACITY, LogNotification};
use solana_sdk::pubkey::Pubkey;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;

pub type SubscriptionId = u64;

#[derive(Debug)]
struct Subscription {
    mentions: Pubkey,
    sender: mpsc::Sender<LogNotification>,
}

pub struct SubscriptionManager {
    subscriptions: DashMap<SubscriptionId, Subscription>,
    next_id: AtomicU64,
    /// When false notifications are dropped, as an unreliable node would
    delivery_enabled: AtomicBool,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            subscriptions: DashMap::new(),
            next_id: AtomicU64::new(1),
            delivery_enabled: AtomicBool::new(true),
        }
    }

    /// Subscribe to logs of transactions mentioning `mentions`
    pub fn subscribe_logs(&self, mentions: Pubkey) -> (SubscriptionId, mpsc::Receiver<LogNotification>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel(LOG_CHANNEL_CAPACITY);

        self.subscriptions.insert(id, Subscription { mentions, sender });
        tracing::debug!("Created log subscription {} for {}", id, mentions);

        (id, receiver)
    }

    pub fn set_delivery(&self, enabled: bool) {
        self.delivery_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Notify subscribers of processed transactions
    pub fn notify(&self, results: &[TransactionResult]) {
        self.prune_closed();
        if !self.delivery_enabled.load(Ordering::SeqCst) {
            return;
        }

        for result in results {
            for sub in self.subscriptions.iter() {
                if !result.mentions(&sub.mentions) {
                    continue;
                }
                let notification = LogNotification {
                    slot: result.slot,
                    signature: result.signature.to_string(),
                    failed: !result.success(),
                    logs: result.logs.clone(),
                };
                // A full or closed channel loses the notification; delivery is best-effort
                if let Err(e) = sub.sender.try_send(notification) {
                    tracing::debug!("Dropped notification for subscription {}: {}", sub.key(), e);
                }
            }
        }
    }

    /// Live subscriptions. Subscribers that went away are removed first.
    pub fn subscription_count(&self) -> usize {
        self.prune_closed();
        self.subscriptions.len()
    }

    fn prune_closed(&self) {
        self.subscriptions.retain(|id, sub| {
            let open = !sub.sender.is_closed();
            if !open {
                tracing::debug!("Log subscription {} closed by subscriber", id);
            }
            open
        });
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
