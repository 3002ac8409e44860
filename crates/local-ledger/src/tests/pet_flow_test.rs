//! Pet Flow Integration Tests
//!
//! Runs the client engine end to end against the in-process ledger:
//! - Owner-only init and the uninitialized scene before it
//! - Overlapping feeds from two clients converging on the ledger state
//! - Cross-client events animating a passive viewer
//! - Convergence by refresh when push delivery is lost
//! - Decay crank killing the pet
//! - Session teardown releasing the subscription
//! - Malformed submissions rejected without stalling slot production

use std::{sync::Arc, time::Duration};

use pet_client::{
    ClientSettings, LedgerRpc, ManualClock, PetClient, PetSession, PresentationState, Record,
    RecordAddress, RpcError, Scene, ViewSettings,
};
use pet_program::{constants::FOOD_COST_LAMPORTS, PetError, PetInstruction};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    message::Message,
    signature::{Keypair, Signer},
    transaction::Transaction,
};
use tokio::sync::watch;

use crate::{LedgerConfig, LocalLedger};

const T: i64 = 1_700_000_000;
const SOL: u64 = 1_000_000_000;

struct Harness {
    ledger: Arc<LocalLedger>,
    clock: Arc<ManualClock>,
    owner: Arc<Keypair>,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(T));
    let owner = Arc::new(Keypair::new());
    let ledger = LocalLedger::start(
        LedgerConfig {
            owner: owner.pubkey(),
            ..Default::default()
        },
        clock.clone(),
    )
    .unwrap();
    ledger.fund(&owner.pubkey(), 10 * SOL);

    Harness { ledger, clock, owner }
}

impl Harness {
    fn client(&self, identity: Option<Arc<Keypair>>) -> PetClient {
        let rpc: Arc<dyn LedgerRpc> = self.ledger.clone();
        let address = RecordAddress::resolve(pet_program::constants::PET_SEED, &pet_program::id()).unwrap();
        PetClient::new(rpc, address, self.owner.pubkey(), ClientSettings::default()).with_identity(identity)
    }

    /// A funded identity other than the owner
    fn stranger(&self) -> Arc<Keypair> {
        let keypair = Arc::new(Keypair::new());
        self.ledger.fund(&keypair.pubkey(), SOL);
        keypair
    }

    async fn session(&self, identity: Option<Arc<Keypair>>) -> PetSession {
        PetSession::start(self.client(identity), self.clock.clone(), ViewSettings::default()).await
    }

    fn ledger_record(&self) -> Option<Record> {
        self.ledger.pet().map(Record::from)
    }
}

async fn wait_for_scene(scene: &mut watch::Receiver<Scene>, what: impl FnMut(&Scene) -> bool) {
    tokio::time::timeout(Duration::from_secs(30), scene.wait_for(what))
        .await
        .expect("scene not reached")
        .expect("view loop stopped");
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(30), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("condition not reached");
}

// ============================================================================
// Initialization
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_owner_initializes_pet() {
    let h = harness();
    let session = h.session(Some(h.owner.clone())).await;
    let mut scene = session.watch();
    wait_for_scene(&mut scene, |s| matches!(s, Scene::Uninitialized)).await;

    let signature = session.client().init(None).await.unwrap();
    assert!(signature.is_some());

    let record = session.client().record().unwrap();
    assert_eq!(record.name, "maya");
    assert_eq!((record.hunger, record.happiness, record.alive), (100, 100, true));
    assert_eq!(record.last_update, T);
    assert!(session.client().balance().unwrap() < 10 * SOL);

    wait_for_scene(&mut scene, |s| s.state() == Some(PresentationState::Idle)).await;
    session.shutdown().await;
    h.ledger.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_non_owner_cannot_initialize() {
    let h = harness();
    let client = h.client(Some(h.stranger()));

    let err = client.init(Some("Mochi")).await.unwrap_err();
    assert_eq!(err.program_error(), Some(PetError::Unauthorized));
    assert!(h.ledger.pet().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_actions_without_identity_are_skipped() {
    let h = harness();
    h.client(Some(h.owner.clone())).init(None).await.unwrap();

    let reader = h.client(None);
    assert_eq!(reader.feed().await.unwrap(), None);
    assert_eq!(reader.play().await.unwrap(), None);
    assert_eq!(reader.request_airdrop(SOL).await.unwrap(), None);

    // Nothing was submitted, so the record is untouched
    reader.refresh().await.unwrap();
    assert_eq!(reader.record(), h.ledger_record());
    assert_eq!(reader.record().unwrap().total_received, 0);
}

// ============================================================================
// Convergence
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_overlapping_feeds_converge() {
    let h = harness();
    h.client(Some(h.owner.clone())).init(None).await.unwrap();
    h.clock.advance(120);

    let alice = h.session(Some(h.owner.clone())).await;
    let bob = h.session(Some(h.stranger())).await;

    let (a, b) = tokio::join!(alice.client().feed(), bob.client().feed());
    assert!(a.unwrap().is_some());
    assert!(b.unwrap().is_some());

    let expected = h.ledger_record().unwrap();
    assert_eq!(expected.total_received, 2 * FOOD_COST_LAMPORTS);
    wait_until(|| alice.client().record().as_ref() == Some(&expected)).await;
    wait_until(|| bob.client().record().as_ref() == Some(&expected)).await;

    alice.shutdown().await;
    bob.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_lost_events_recovered_by_refresh() {
    let h = harness();
    h.client(Some(h.owner.clone())).init(None).await.unwrap();
    let viewer = h.session(None).await;
    wait_until(|| viewer.client().record().is_some()).await;

    h.ledger.set_event_delivery(false);
    h.clock.advance(60);
    h.client(Some(h.stranger())).play().await.unwrap();

    // Give a push notification every chance to arrive
    tokio::time::sleep(Duration::from_secs(2)).await;
    let stale = viewer.client().record().unwrap();
    assert_eq!(stale.last_update, T);

    viewer.client().refresh().await.unwrap();
    assert_eq!(viewer.client().record(), h.ledger_record());
    assert_eq!(viewer.client().record().unwrap().last_update, T + 60);

    viewer.shutdown().await;
}

// ============================================================================
// Presentation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_feed_from_another_client_animates_viewer() {
    let h = harness();
    h.client(Some(h.owner.clone())).init(None).await.unwrap();
    let viewer = h.session(None).await;
    let mut scene = viewer.watch();
    wait_for_scene(&mut scene, |s| s.state() == Some(PresentationState::Idle)).await;

    // Three decay periods pass; let the view tick so it shows the decayed vitals
    h.clock.advance(90);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let shown = viewer.scene().pet().unwrap().vitals;
    assert_eq!((shown.hunger, shown.happiness), (97.0, 94.0));

    h.client(Some(h.stranger())).feed().await.unwrap();

    wait_for_scene(&mut scene, |s| s.state() == Some(PresentationState::Eating)).await;
    let eating = viewer.scene();
    assert_eq!(eating.pet().unwrap().record.hunger, 99);

    wait_for_scene(&mut scene, |s| s.state() == Some(PresentationState::Idle)).await;
    viewer.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_decay_crank_kills_pet() {
    let h = harness();
    h.client(Some(h.owner.clone())).init(None).await.unwrap();
    let viewer = h.session(None).await;
    let mut scene = viewer.watch();
    wait_for_scene(&mut scene, |s| s.state() == Some(PresentationState::Idle)).await;

    // Happiness runs out after 50 periods
    h.clock.advance(51 * 30);
    h.ledger.crank_decay().unwrap();

    wait_for_scene(&mut scene, |s| s.state() == Some(PresentationState::Dead)).await;
    wait_until(|| viewer.client().record().is_some_and(|r| !r.alive)).await;
    assert!(!h.ledger.pet().unwrap().alive);

    // A dead pet refuses food
    let err = h.client(Some(h.stranger())).feed().await.unwrap_err();
    assert_eq!(err.program_error(), Some(PetError::PetIsDead));
    assert_eq!(viewer.scene().state(), Some(PresentationState::Dead));

    viewer.shutdown().await;
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_session_teardown_releases_subscription() {
    let h = harness();
    let mut session = h.session(None).await;
    assert!(session.is_subscribed());
    assert_eq!(h.ledger.subscription_count(), 1);

    // Rebinding replaces the subscription instead of stacking one
    session.set_identity(Some(h.owner.clone())).await;
    wait_until(|| h.ledger.subscription_count() == 1).await;
    assert!(session.is_subscribed());

    session.shutdown().await;
    wait_until(|| h.ledger.subscription_count() == 0).await;
}

#[tokio::test(start_paused = true)]
async fn test_airdrop_updates_balance() {
    let h = harness();
    let keypair = Arc::new(Keypair::new());
    let client = h.client(Some(keypair.clone()));

    let signature = client.request_airdrop(2 * SOL).await.unwrap();
    assert!(signature.is_some());
    assert_eq!(client.balance(), Some(2 * SOL));
    assert_eq!(h.ledger.get_balance(&keypair.pubkey(), Default::default()).await.unwrap(), 2 * SOL);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_slot_is_last_write() {
    let h = harness();
    let client = h.client(Some(h.owner.clone()));
    let signature = client.init(None).await.unwrap().unwrap();
    let written = h.ledger.signature_status(&signature).await.unwrap().unwrap().slot;

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.ledger.current_slot() > written);

    let snapshot = h
        .ledger
        .get_account(h.ledger.pet_address(), CommitmentConfig::confirmed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.slot, written);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_account_index_rejected() {
    let h = harness();
    h.client(Some(h.owner.clone())).init(None).await.unwrap();

    let feeder = h.stranger();
    let ix = PetInstruction::FeedPet.to_instruction(&pet_program::id(), h.ledger.pet_address(), &feeder.pubkey());
    let mut tx = Transaction::new_unsigned(Message::new(&[ix], Some(&feeder.pubkey())));
    tx.message.instructions[0].accounts = vec![0, 99];
    let blockhash = h.ledger.latest_blockhash(CommitmentConfig::confirmed()).await.unwrap();
    tx.sign(&[feeder.as_ref()], blockhash);
    assert!(tx.verify().is_ok());

    let err = h.ledger.send_transaction(&tx).await.unwrap_err();
    assert!(matches!(err, RpcError::Server { code: -32602, .. }), "{:?}", err);

    // Slot production carries on and well-formed feeds still land
    let slot = h.ledger.current_slot();
    h.client(Some(feeder)).feed().await.unwrap();
    assert!(h.ledger.current_slot() > slot);
    assert_eq!(h.ledger_record().unwrap().total_received, FOOD_COST_LAMPORTS);
}
