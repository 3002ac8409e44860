//! Pet Session
//!
//! Wires one client binding together: view loop, push subscription and the
//! initial fetch. At most one subscription is live per session.

use crate::{
    client::PetClient,
    clock::Clock,
    reconciler::SubscriptionHandle,
    view::{spawn_view, Scene, ViewHandle, ViewSettings},
};
use solana_sdk::signature::Keypair;
use std::sync::Arc;
use tokio::sync::watch;

pub struct PetSession {
    client: PetClient,
    view: ViewHandle,
    subscription: Option<SubscriptionHandle>,
}

impl PetSession {
    /// Start the view loop, subscribe and load the record.
    ///
    /// Ledger failures here are logged, not returned: the session keeps
    /// showing `Loading` until a later refresh succeeds.
    pub async fn start(client: PetClient, clock: Arc<dyn Clock>, settings: ViewSettings) -> Self {
        let view = spawn_view(client.cache(), clock, settings);
        let mut session = Self {
            client,
            view,
            subscription: None,
        };
        session.bind().await;
        session
    }

    /// Tear down the current subscription, open a new one and refetch
    pub async fn bind(&mut self) {
        if let Some(previous) = self.subscription.take() {
            previous.unsubscribe().await;
        }

        match self.client.subscribe().await {
            Ok(handle) => self.subscription = Some(handle),
            Err(e) => tracing::warn!("Push channel unavailable, relying on fetches: {}", e),
        }

        if let Err(e) = self.client.fetch_record().await {
            tracing::warn!("Initial fetch failed: {}", e);
        }
    }

    /// Switch the signing identity and rebind
    pub async fn set_identity(&mut self, identity: Option<Arc<Keypair>>) {
        self.client = self.client.clone().with_identity(identity);
        tracing::info!(
            "Identity switched to {}",
            self.client
                .identity()
                .map_or_else(|| "none".to_string(), |k| k.to_string())
        );
        self.bind().await;
    }

    pub fn client(&self) -> &PetClient {
        &self.client
    }

    pub fn scene(&self) -> Scene {
        self.view.scene()
    }

    pub fn watch(&self) -> watch::Receiver<Scene> {
        self.view.watch()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(SubscriptionHandle::is_active)
    }

    /// Cancel the subscription and the view loop. In-flight calls still land in the cache.
    pub async fn shutdown(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe().await;
        }
        self.view.shutdown().await;
    }
}
