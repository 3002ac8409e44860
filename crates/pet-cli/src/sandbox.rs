//! Sandbox: the pet on an in-process ledger
//!
//! Creates the pet, then lets simulated visitors feed and play with it while a
//! decay crank runs, rendering the owner's view as it changes.

use crate::render;
use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use local_ledger::{LedgerConfig, LocalLedger};
use pet_client::{
    ClientSettings, Clock, LedgerRpc, PetClient, PetSession, RecordAddress, SystemClock,
    ViewSettings,
};
use pet_program::constants::PET_SEED;
use solana_sdk::{
    native_token::LAMPORTS_PER_SOL,
    signature::{Keypair, Signer},
};
use std::{sync::Arc, time::Duration};
use tokio::time::{interval, sleep, MissedTickBehavior};

#[derive(ClapArgs, Debug)]
pub struct SandboxArgs {
    /// Slot time in milliseconds
    #[arg(long, default_value = "400")]
    slot_time_ms: u64,

    /// Number of simulated visitors
    #[arg(long, default_value = "2")]
    visitors: usize,

    /// Seconds between visits
    #[arg(long, default_value = "5")]
    visit_every: u64,

    /// Seconds between decay cranks
    #[arg(long, default_value = "30")]
    crank_every: u64,

    /// Drop push notifications; the view then catches up by refreshing
    #[arg(long)]
    no_events: bool,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,
}

pub async fn run(args: &SandboxArgs) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let owner = Arc::new(Keypair::new());
    let ledger = LocalLedger::start(
        LedgerConfig {
            slot_time_ms: args.slot_time_ms,
            owner: owner.pubkey(),
            program_id: pet_program::id(),
        },
        clock.clone(),
    )?;
    ledger.fund(&owner.pubkey(), 10 * LAMPORTS_PER_SOL);
    ledger.set_event_delivery(!args.no_events);

    let rpc: Arc<dyn LedgerRpc> = ledger.clone();
    let address = RecordAddress::resolve(PET_SEED, ledger.program_id())?;
    let client_for = |identity: Arc<Keypair>| {
        PetClient::new(rpc.clone(), address, owner.pubkey(), ClientSettings::default())
            .with_identity(Some(identity))
    };

    let keeper = client_for(owner.clone());
    keeper.init(None).await.context("Creating the pet")?;
    println!("sandbox pet at {} (owner {})", address.pubkey(), owner.pubkey());

    let visitors: Vec<PetClient> = (0..args.visitors.max(1))
        .map(|_| {
            let keypair = Arc::new(Keypair::new());
            ledger.fund(&keypair.pubkey(), 5 * LAMPORTS_PER_SOL);
            client_for(keypair)
        })
        .collect();

    let session = PetSession::start(keeper, clock, ViewSettings::default()).await;
    let mut scenes = session.watch();
    println!("{}", render::scene_line(&scenes.borrow_and_update()));

    let mut visits = interval(Duration::from_secs(args.visit_every.max(1)));
    visits.set_missed_tick_behavior(MissedTickBehavior::Skip);
    visits.tick().await;
    let mut cranks = interval(Duration::from_secs(args.crank_every.max(1)));
    cranks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    cranks.tick().await;

    let deadline = sleep(Duration::from_secs(args.duration.unwrap_or(u64::MAX / 4)));
    tokio::pin!(deadline);
    let mut visit = 0usize;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,

            changed = scenes.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", render::scene_line(&scenes.borrow_and_update()));
            }

            _ = visits.tick() => {
                let visitor = visitors[visit % visitors.len()].clone();
                let feeding = visit % 2 == 0;
                visit += 1;
                tokio::spawn(async move {
                    let result = if feeding { visitor.feed().await } else { visitor.play().await };
                    if let Err(e) = result {
                        tracing::warn!("Visitor {} was turned away: {}", visitor.identity().unwrap_or_default(), e);
                    }
                });

                if args.no_events {
                    if let Err(e) = session.client().refresh().await {
                        tracing::warn!("Refresh failed: {}", e);
                    }
                }
            }

            _ = cranks.tick() => {
                if let Err(e) = ledger.crank_decay() {
                    tracing::warn!("Decay crank failed: {}", e);
                }
            }
        }
    }

    tracing::info!("Shutting down sandbox at slot {}", ledger.current_slot());
    session.shutdown().await;
    ledger.shutdown().await;
    Ok(())
}
