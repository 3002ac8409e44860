//! Maya pet CLI
//!
//! Inspect, watch and interact with the pet record on a JSON-RPC node, or run
//! the whole thing against an in-process ledger with `sandbox`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pet_client::{
    extrapolate, ClientConfig, Clock, JsonRpcLedger, PetClient, PetSession, SystemClock,
};
use solana_sdk::{native_token::LAMPORTS_PER_SOL, signature::Signature};
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod identity;
mod render;
mod sandbox;

/// Maya pet client
#[derive(Parser, Debug)]
#[command(name = "pet")]
#[command(about = "Watch and care for the Maya pet", long_about = None)]
struct Args {
    /// JSON config file; flags and environment override its fields
    #[arg(long, env = "PET_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP JSON-RPC endpoint
    #[arg(long, env = "PET_RPC_URL")]
    rpc_url: Option<String>,

    /// WebSocket pubsub endpoint
    #[arg(long, env = "PET_WS_URL")]
    ws_url: Option<String>,

    /// Pet program id
    #[arg(long, env = "PET_PROGRAM_ID")]
    program_id: Option<String>,

    /// Identity allowed to initialize the pet
    #[arg(long, env = "PET_OWNER")]
    owner: Option<String>,

    /// Commitment for reads and confirmations (processed, confirmed, finalized)
    #[arg(long, env = "PET_COMMITMENT")]
    commitment: Option<String>,

    /// Signing identity: keypair file path or base58 secret key
    #[arg(long, env = "PET_KEYPAIR")]
    keypair: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the derived record address
    Address,
    /// Fetch the record once and print it
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Follow the record live until interrupted
    Watch,
    /// Create the pet (owner only)
    Init {
        /// Pet name, "maya" when omitted
        name: Option<String>,
    },
    /// Feed the pet (costs 0.1 SOL)
    Feed,
    /// Play with the pet
    Play,
    /// Move food payments to the owner (owner only)
    Withdraw,
    /// Request devnet/localnet SOL for the identity
    Airdrop {
        #[arg(long, default_value = "1.0")]
        sol: f64,
    },
    /// Run an in-process ledger with simulated visitors
    Sandbox(sandbox::SandboxArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is kept for command output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Command::Sandbox(sandbox_args) = &args.command {
        return sandbox::run(sandbox_args).await;
    }

    let config = load_config(&args)?;
    let identity = args
        .keypair
        .as_deref()
        .map(identity::load)
        .transpose()?
        .map(Arc::new);

    let rpc = Arc::new(
        JsonRpcLedger::new(&config.rpc_url, &config.ws_url())
            .with_context(|| format!("Connecting to {}", config.rpc_url))?,
    );
    let client = PetClient::from_config(rpc, &config)
        .context("Invalid client configuration")?
        .with_identity(identity);

    tracing::debug!(
        "Using {} (ws {}), record {}",
        config.rpc_url,
        config.ws_url(),
        client.address()
    );

    match args.command {
        Command::Address => {
            let address = client.address();
            println!("program  {}", address.program_id());
            println!("record   {} (bump {})", address.pubkey(), address.bump());
            println!("owner    {}", config.owner);
        }
        Command::Status { json } => status(&client, json).await?,
        Command::Watch => watch(client, &config).await?,
        Command::Init { name } => report("init", client.init(name.as_deref()).await?),
        Command::Feed => report("feed", client.feed().await?),
        Command::Play => report("play", client.play().await?),
        Command::Withdraw => report("withdraw", client.withdraw().await?),
        Command::Airdrop { sol } => {
            let lamports = (sol * LAMPORTS_PER_SOL as f64) as u64;
            report("airdrop", client.request_airdrop(lamports).await?);
            if let Some(balance) = client.balance() {
                println!("balance  {}", render::sol(balance));
            }
        }
        Command::Sandbox(_) => {}
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("Loading config {}", path.display()))?,
        None => ClientConfig::default(),
    };

    if let Some(rpc_url) = &args.rpc_url {
        config.rpc_url = rpc_url.clone();
    }
    if let Some(ws_url) = &args.ws_url {
        config.ws_url = Some(ws_url.clone());
    }
    if let Some(program_id) = &args.program_id {
        config.program_id = program_id.clone();
    }
    if let Some(owner) = &args.owner {
        config.owner = owner.clone();
    }
    if let Some(commitment) = &args.commitment {
        config.commitment = commitment.clone();
    }

    config.validate()?;
    Ok(config)
}

fn report(action: &str, signature: Option<Signature>) {
    match signature {
        Some(signature) => println!("{} confirmed: {}", action, signature),
        None => println!("{} skipped: no keypair configured (--keypair)", action),
    }
}

async fn status(client: &PetClient, json: bool) -> Result<()> {
    let outcome = client.fetch_record().await?;
    let now = SystemClock.unix_timestamp();

    let Some(record) = outcome.record() else {
        if json {
            println!("{}", serde_json::json!({ "initialized": false }));
        } else {
            println!("No pet yet. The owner can create one with `pet init`.");
        }
        return Ok(());
    };

    let vitals = extrapolate(record, now);
    if json {
        let value = serde_json::json!({
            "initialized": true,
            "name": record.name,
            "alive": record.alive,
            "hunger": record.hunger,
            "happiness": record.happiness,
            "last_update": record.last_update,
            "total_received": record.total_received,
            "last_feeder": record.last_feeder.to_string(),
            "now": { "hunger": vitals.hunger, "happiness": vitals.happiness },
            "balance": client.balance(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{}", render::record_summary(record, &vitals, now));
        if let (Some(identity), Some(balance)) = (client.identity(), client.balance()) {
            println!("wallet     {} ({})", identity, render::sol(balance));
        }
    }
    Ok(())
}

async fn watch(client: PetClient, config: &ClientConfig) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let session = PetSession::start(client, clock, config.view_settings()).await;
    if !session.is_subscribed() {
        tracing::warn!("Live updates unavailable, showing the last fetched state only");
    }

    let mut scenes = session.watch();
    println!("{}", render::scene_line(&scenes.borrow_and_update()));

    loop {
        tokio::select! {
            changed = scenes.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", render::scene_line(&scenes.borrow_and_update()));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("Shutting down...");
    session.shutdown().await;
    Ok(())
}
