//! Client error types

use pet_program::PetError;
use solana_sdk::signature::Signature;
use std::{fmt, time::Duration};

/// Transport level failures talking to the ledger
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Server error {code}: {message}")]
    Server { code: i64, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<jsonrpsee::core::ClientError> for RpcError {
    fn from(e: jsonrpsee::core::ClientError) -> Self {
        match e {
            jsonrpsee::core::ClientError::Call(err) => RpcError::Server {
                code: err.code() as i64,
                message: err.message().to_string(),
            },
            jsonrpsee::core::ClientError::ParseError(err) => {
                RpcError::InvalidResponse(err.to_string())
            }
            other => RpcError::Transport(other.to_string()),
        }
    }
}

/// Why the ledger rejected a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionFailure {
    /// The pet program returned one of its own errors
    Program(PetError),
    /// Anything else (signature, funds, unknown program error)
    Other(String),
}

impl fmt::Display for TransactionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionFailure::Program(e) => write!(f, "program error {}: {}", e.code(), e),
            TransactionFailure::Other(reason) => write!(f, "{}", reason),
        }
    }
}

/// Static configuration problems. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {field} pubkey: {value}")]
    InvalidPubkey { field: &'static str, value: String },
    #[error("Cannot derive record address from seed {0:?}")]
    InvalidSeed(String),
    #[error("Unknown commitment level: {0}")]
    InvalidCommitment(String),
    #[error("Cannot read keypair {path}: {reason}")]
    Keypair { path: String, reason: String },
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors surfaced by [`crate::PetClient`]
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("Cannot decode pet record: {0}")]
    Decode(String),

    #[error("Transaction {signature} failed: {reason}")]
    TransactionFailed {
        signature: Signature,
        reason: TransactionFailure,
    },

    #[error("Transaction {signature} not confirmed after {waited:?}")]
    ConfirmationTimeout { signature: Signature, waited: Duration },

    #[error("Pet name is {0} bytes, the limit is 32")]
    InvalidName(usize),
}

impl ClientError {
    /// Program error carried by a rejected transaction, if any
    pub fn program_error(&self) -> Option<PetError> {
        match self {
            ClientError::TransactionFailed {
                reason: TransactionFailure::Program(e),
                ..
            } => Some(*e),
            _ => None,
        }
    }
}
