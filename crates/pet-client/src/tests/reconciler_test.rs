//! Event Reconciler Tests
//!
//! Push notifications against a scripted ledger:
//! - events merge into the cache and every notification triggers a confirmatory fetch
//! - a lagging fetch does not undo a newer event
//! - teardown stops all mutation

use std::time::Duration;

use pet_program::{PetDied, PetEvent, PetUpdated};
use solana_sdk::pubkey::Pubkey;

use super::mock::{client, event_notification, notification, pet, MockLedger};

const T: i64 = 1_700_000_000;

fn updated(hunger: u8, happiness: u8, last_update: i64) -> PetEvent {
    PetEvent::Updated(PetUpdated {
        hunger,
        happiness,
        alive: true,
        last_update,
        total_sol_received: 100_000_000,
        last_feeder: Pubkey::new_unique(),
    })
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test]
async fn test_event_merges_then_fetches() {
    let ledger = MockLedger::new();
    ledger.set_pet(&pet(80, 80, T), 10);
    let client = client(&ledger);
    client.fetch_record().await.unwrap();
    assert_eq!(ledger.fetches(), 1);

    let _handle = client.subscribe().await.unwrap();

    // The node serving fetches lags: it still returns the old record
    assert_eq!(ledger.push(event_notification(11, &updated(82, 85, T + 5))), 1);
    wait_until(|| ledger.fetches() == 2).await;

    let cached = client.record().unwrap();
    assert_eq!((cached.hunger, cached.happiness, cached.last_update), (82, 85, T + 5));
    assert_eq!(cached.name, "maya");

    // Once the node catches up the fetch agrees with the event
    ledger.set_pet(&pet(82, 85, T + 5), 11);
    client.refresh().await.unwrap();
    assert_eq!(client.record().unwrap().hunger, 82);
}

#[tokio::test]
async fn test_died_event_keeps_last_update() {
    let ledger = MockLedger::new();
    ledger.set_pet(&pet(3, 40, T), 10);
    let client = client(&ledger);
    client.fetch_record().await.unwrap();
    let _handle = client.subscribe().await.unwrap();

    ledger.push(event_notification(12, &PetEvent::Died(PetDied { timestamp: T + 999 })));
    wait_until(|| client.record().is_some_and(|r| !r.alive)).await;

    let cached = client.record().unwrap();
    assert_eq!((cached.hunger, cached.happiness), (0, 0));
    assert_eq!(cached.last_update, T);
}

#[tokio::test]
async fn test_event_before_first_fetch_is_ignored() {
    let ledger = MockLedger::new();
    let client = client(&ledger);
    let _handle = client.subscribe().await.unwrap();

    ledger.set_pet(&pet(90, 90, T), 20);
    ledger.push(event_notification(20, &updated(1, 1, T)));

    // Only the confirmatory fetch populates the cache
    wait_until(|| ledger.fetches() == 1).await;
    wait_until(|| client.record().is_some()).await;
    assert_eq!(client.record().unwrap().hunger, 90);
}

#[tokio::test]
async fn test_failed_logs_skipped_and_eventless_logs_fetch() {
    let ledger = MockLedger::new();
    ledger.set_pet(&pet(80, 80, T), 10);
    let client = client(&ledger);
    client.fetch_record().await.unwrap();
    let _handle = client.subscribe().await.unwrap();

    let mut failed = event_notification(11, &updated(10, 10, T + 50));
    failed.failed = true;
    ledger.push(failed);
    ledger.push(notification(12, vec!["Program log: Instruction: Withdraw".to_string()]));
    ledger.push(event_notification(13, &updated(81, 80, T + 10)));

    // Notifications are handled in order, so the last one landing means the others were seen.
    // The failed transaction fetches nothing; the withdraw and the event each fetch once.
    wait_until(|| client.record().is_some_and(|r| r.hunger == 81)).await;
    wait_until(|| ledger.fetches() == 3).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ledger.fetches(), 3);
}

#[tokio::test]
async fn test_eventless_notification_catches_up() {
    let ledger = MockLedger::new();
    ledger.set_pet(&pet(80, 80, T), 10);
    let client = client(&ledger);
    client.fetch_record().await.unwrap();
    let _handle = client.subscribe().await.unwrap();

    // The node truncated the logs before the event line
    ledger.set_pet(&pet(82, 85, T + 4), 14);
    ledger.push(notification(14, vec!["Log truncated".to_string()]));

    wait_until(|| ledger.fetches() == 2).await;
    wait_until(|| client.record().is_some_and(|r| r.last_update == T + 4)).await;
}

#[tokio::test]
async fn test_malformed_event_still_fetches() {
    let ledger = MockLedger::new();
    ledger.set_pet(&pet(80, 80, T), 10);
    let client = client(&ledger);
    client.fetch_record().await.unwrap();
    let _handle = client.subscribe().await.unwrap();

    ledger.set_pet(&pet(82, 85, T + 3), 11);
    ledger.push(notification(11, vec!["Program data: %%%not-base64%%%".to_string()]));

    wait_until(|| ledger.fetches() == 2).await;
    wait_until(|| client.record().is_some_and(|r| r.hunger == 82)).await;
}

#[tokio::test]
async fn test_notification_after_unsubscribe_is_inert() {
    let ledger = MockLedger::new();
    ledger.set_pet(&pet(80, 80, T), 10);
    let client = client(&ledger);
    client.fetch_record().await.unwrap();

    let handle = client.subscribe().await.unwrap();
    assert!(handle.is_active());
    handle.unsubscribe().await;

    ledger.set_pet(&pet(82, 85, T + 5), 11);
    assert_eq!(ledger.push(event_notification(11, &updated(82, 85, T + 5))), 0);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(client.record().unwrap().last_update, T);
    assert_eq!(ledger.fetches(), 1);
}

#[tokio::test]
async fn test_drop_tears_down() {
    let ledger = MockLedger::new();
    ledger.set_pet(&pet(80, 80, T), 10);
    let client = client(&ledger);
    client.fetch_record().await.unwrap();

    drop(client.subscribe().await.unwrap());
    wait_until(|| ledger.push(event_notification(11, &updated(82, 85, T + 5))) == 0).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.record().unwrap().last_update, T);
}
