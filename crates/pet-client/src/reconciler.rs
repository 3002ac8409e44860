//! Event Reconciler
//!
//! Consumes program log notifications, merges decoded events into the cache
//! and follows every event with an authoritative fetch. Events are a latency
//! optimization: the fetch is what guarantees convergence.

use crate::{
    client::PetClient,
    error::ClientError,
    record::RecordPatch,
    rpc::LogNotification,
};
use pet_program::PetEvent;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Live push subscription. Dropping it tears the subscription down.
#[derive(Debug)]
pub struct SubscriptionHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Tear down and wait until the reconciler task has exited
    pub async fn unsubscribe(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Reconciler task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub(crate) async fn spawn(client: PetClient) -> Result<SubscriptionHandle, ClientError> {
    let program_id = *client.address().program_id();
    let mut logs = client
        .rpc()
        .subscribe_logs(&program_id, client.settings().commitment)
        .await?;

    let token = CancellationToken::new();
    let cancelled = token.clone();

    let task = tokio::spawn(async move {
        tracing::info!("Subscribed to pet events of {}", program_id);
        loop {
            tokio::select! {
                biased;

                _ = cancelled.cancelled() => break,

                notification = logs.recv() => match notification {
                    Some(notification) => handle_notification(&client, notification),
                    None => {
                        tracing::warn!("Event stream closed by the ledger");
                        break;
                    }
                },
            }
        }
        // Dropping `logs` releases the remote subscription
        tracing::info!("Unsubscribed from pet events of {}", program_id);
    });

    Ok(SubscriptionHandle {
        token,
        task: Some(task),
    })
}

fn handle_notification(client: &PetClient, notification: LogNotification) {
    if notification.failed {
        tracing::debug!("Skipping failed transaction {}", notification.signature);
        return;
    }

    for line in &notification.logs {
        match PetEvent::from_log_line(line) {
            None => {}
            Some(Ok(event)) => {
                let patch = RecordPatch::from(&event);
                if client.cache().apply_patch(&patch, notification.slot) {
                    tracing::debug!(
                        "Applied {:?} from {} at slot {}",
                        event,
                        notification.signature,
                        notification.slot
                    );
                }
            }
            Some(Err(e)) => {
                tracing::warn!("Malformed event in {}: {}", notification.signature, e);
            }
        }
    }

    // Fetch even when the logs carried no event (withdraw, truncated logs).
    // Not bound to the token: an in-flight fetch still lands after teardown
    let client = client.clone();
    tokio::spawn(async move {
        if let Err(e) = client.fetch_record().await {
            tracing::warn!("Confirmatory fetch failed: {}", e);
        }
    });
}
