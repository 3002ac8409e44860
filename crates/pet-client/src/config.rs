//! Client Configuration

use crate::{address::RecordAddress, error::ConfigError, view::ViewSettings};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    pubkey::Pubkey,
};
use std::{path::Path, str::FromStr, time::Duration};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// HTTP JSON-RPC endpoint
    pub rpc_url: String,
    /// WebSocket pubsub endpoint (derived from `rpc_url` when unset)
    pub ws_url: Option<String>,
    /// Pet program id (base58)
    pub program_id: String,
    /// Identity allowed to initialize the pet (base58)
    pub owner: String,
    /// PDA seed of the pet record
    pub seed: String,
    /// Commitment for reads and confirmations
    pub commitment: String,
    /// Extrapolation tick period in milliseconds
    pub tick_period_ms: u64,
    /// How long eating/playing stays on screen, in milliseconds
    pub display_window_ms: u64,
    /// Give up waiting for confirmation after this many milliseconds
    pub confirm_timeout_ms: u64,
    /// Signature status polling period in milliseconds
    pub confirm_poll_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8899".to_string(),
            ws_url: None,
            program_id: pet_program::id().to_string(),
            owner: pet_program::OWNER.to_string(),
            seed: pet_program::constants::PET_SEED.to_string(),
            commitment: "processed".to_string(),
            tick_period_ms: 1000,
            display_window_ms: 3000,
            confirm_timeout_ms: 30_000,
            confirm_poll_ms: 400,
        }
    }
}

/// Settings consumed by [`crate::PetClient`]
#[derive(Debug, Clone, Copy)]
pub struct ClientSettings {
    pub commitment: CommitmentConfig,
    pub confirm_timeout: Duration,
    pub confirm_poll: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            commitment: CommitmentConfig::processed(),
            confirm_timeout: Duration::from_secs(30),
            confirm_poll: Duration::from_millis(400),
        }
    }
}

impl ClientConfig {
    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Pubsub endpoint, following the validator convention of RPC port + 1
    pub fn ws_url(&self) -> String {
        if let Some(url) = &self.ws_url {
            return url.clone();
        }
        let url = if let Some(rest) = self.rpc_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.rpc_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.rpc_url.clone()
        };
        url.replace(":8899", ":8900")
    }

    pub fn program_id(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("program_id", &self.program_id)
    }

    pub fn owner(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("owner", &self.owner)
    }

    pub fn commitment(&self) -> Result<CommitmentConfig, ConfigError> {
        let commitment = match self.commitment.to_ascii_lowercase().as_str() {
            "processed" => CommitmentLevel::Processed,
            "confirmed" => CommitmentLevel::Confirmed,
            "finalized" => CommitmentLevel::Finalized,
            other => return Err(ConfigError::InvalidCommitment(other.to_string())),
        };
        Ok(CommitmentConfig { commitment })
    }

    /// Derive the record address. Called once at startup.
    pub fn resolve_address(&self) -> Result<RecordAddress, ConfigError> {
        RecordAddress::resolve(&self.seed, &self.program_id()?)
    }

    pub fn client_settings(&self) -> Result<ClientSettings, ConfigError> {
        Ok(ClientSettings {
            commitment: self.commitment()?,
            confirm_timeout: Duration::from_millis(self.confirm_timeout_ms),
            confirm_poll: Duration::from_millis(self.confirm_poll_ms.max(1)),
        })
    }

    pub fn view_settings(&self) -> ViewSettings {
        ViewSettings {
            tick_period: Duration::from_millis(self.tick_period_ms.max(1)),
            display_window: Duration::from_millis(self.display_window_ms),
        }
    }

    /// Check every field that is parsed later, so bad config fails at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.owner()?;
        self.commitment()?;
        self.resolve_address()?;
        Ok(())
    }
}

fn parse_pubkey(field: &'static str, value: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(value).map_err(|_| ConfigError::InvalidPubkey {
        field,
        value: value.to_string(),
    })
}
