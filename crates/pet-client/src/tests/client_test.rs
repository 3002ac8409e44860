//! Pet Client Tests
//!
//! Pull path and mutation path against a scripted ledger.

use std::{sync::Arc, time::Duration};

use pet_program::PetError;
use solana_sdk::{commitment_config::CommitmentLevel, signature::Keypair, signer::Signer};

use super::mock::{client, pet, MockLedger};
use crate::{
    error::{ClientError, TransactionFailure},
    record::FetchOutcome,
    rpc::SignatureStatus,
};

const T: i64 = 1_700_000_000;

#[tokio::test]
async fn test_absence_is_a_value() {
    let ledger = MockLedger::new();
    let client = client(&ledger);
    assert!(!client.cache().is_loaded());

    assert_eq!(client.fetch_record().await.unwrap(), FetchOutcome::NotFound);
    assert!(client.cache().is_loaded());
    assert!(client.record().is_none());
}

#[tokio::test]
async fn test_transport_failure_keeps_cache() {
    let ledger = MockLedger::new();
    ledger.set_pet(&pet(80, 70, T), 5);
    let client = client(&ledger);
    client.fetch_record().await.unwrap();

    ledger.fail_reads(true);
    assert!(matches!(client.fetch_record().await, Err(ClientError::Rpc(_))));
    assert_eq!(client.record().unwrap().hunger, 80);
}

#[tokio::test]
async fn test_undecodable_record_keeps_cache() {
    let ledger = MockLedger::new();
    ledger.set_pet(&pet(80, 70, T), 5);
    let client = client(&ledger);
    client.fetch_record().await.unwrap();

    ledger.set_raw(vec![0xde, 0xad, 0xbe, 0xef], 6);
    assert!(matches!(client.fetch_record().await, Err(ClientError::Decode(_))));
    assert_eq!(client.record().unwrap().last_update, T);
}

#[tokio::test]
async fn test_balance_refreshed_with_identity() {
    let ledger = MockLedger::new();
    let reader = client(&ledger);
    reader.fetch_record().await.unwrap();
    assert_eq!(reader.balance(), None);

    let signer = reader.with_identity(Some(Arc::new(Keypair::new())));
    signer.fetch_record().await.unwrap();
    assert_eq!(signer.balance(), Some(5_000_000_000));
}

#[tokio::test]
async fn test_mutations_without_identity_are_noops() {
    let ledger = MockLedger::new();
    let client = client(&ledger);

    assert_eq!(client.feed().await.unwrap(), None);
    assert_eq!(client.play().await.unwrap(), None);
    assert_eq!(client.init(None).await.unwrap(), None);
    assert_eq!(client.withdraw().await.unwrap(), None);
    assert_eq!(client.request_airdrop(1).await.unwrap(), None);
    assert_eq!(ledger.sent(), 0);
    assert_eq!(ledger.fetches(), 0);
}

#[tokio::test]
async fn test_confirmed_mutation_refetches() {
    let ledger = MockLedger::new();
    ledger.set_pet(&pet(80, 80, T), 5);
    ledger.set_status(Some(SignatureStatus {
        slot: 6,
        confirmation: CommitmentLevel::Confirmed,
        err: None,
    }));
    let identity = Arc::new(Keypair::new());
    let client = client(&ledger).with_identity(Some(identity.clone()));

    let signature = client.feed().await.unwrap().unwrap();
    assert_eq!(ledger.sent(), 1);
    assert_eq!(ledger.fetches(), 1);
    assert_eq!(client.record().unwrap().hunger, 80);
    assert_eq!(ledger.last_payer(), Some(identity.pubkey()));
    assert_ne!(signature, Default::default());
}

#[tokio::test]
async fn test_program_error_is_mapped() {
    let ledger = MockLedger::new();
    ledger.set_status(Some(SignatureStatus {
        slot: 6,
        confirmation: CommitmentLevel::Processed,
        err: Some(TransactionFailure::Program(PetError::PetIsDead)),
    }));
    let client = client(&ledger).with_identity(Some(Arc::new(Keypair::new())));

    let err = client.feed().await.unwrap_err();
    assert_eq!(err.program_error(), Some(PetError::PetIsDead));
    // No fetch after a rejected transaction
    assert_eq!(ledger.fetches(), 0);
    assert!(client.record().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_timeout() {
    let ledger = MockLedger::new();
    let client = client(&ledger).with_identity(Some(Arc::new(Keypair::new())));

    let err = client.play().await.unwrap_err();
    match err {
        ClientError::ConfirmationTimeout { waited, .. } => {
            assert!(waited >= Duration::from_secs(30));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_long_name_rejected_locally() {
    let ledger = MockLedger::new();
    let client = client(&ledger).with_identity(Some(Arc::new(Keypair::new())));

    let err = client.init(Some(&"x".repeat(33))).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidName(33)));
    assert_eq!(ledger.sent(), 0);
}

#[tokio::test]
async fn test_owner_check() {
    let ledger = MockLedger::new();
    let client = client(&ledger);
    assert!(!client.is_owner());
    let stranger = client.with_identity(Some(Arc::new(Keypair::new())));
    assert!(!stranger.is_owner());
}
