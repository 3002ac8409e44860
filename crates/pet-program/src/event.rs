//! Pet Program Events
//!
//! Events are emitted Anchor-style as `Program data: <base64>` log lines where
//! the payload is `sha256("event:<Name>")[..8]` followed by the Borsh fields.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

use crate::{discriminator, state::Pet};

/// Log prefix carrying event payloads
pub const PROGRAM_DATA_PREFIX: &str = "Program data: ";

/// Emitted after every successful mutation. Does not carry the name.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct PetUpdated {
    pub hunger: u8,
    pub happiness: u8,
    pub alive: bool,
    pub last_update: i64,
    pub total_sol_received: u64,
    pub last_feeder: Pubkey,
}

impl From<&Pet> for PetUpdated {
    fn from(pet: &Pet) -> Self {
        Self {
            hunger: pet.hunger,
            happiness: pet.happiness,
            alive: pet.alive,
            last_update: pet.last_update,
            total_sol_received: pet.total_sol_received,
            last_feeder: pet.last_feeder,
        }
    }
}

/// Emitted when decay kills the pet
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct PetDied {
    pub timestamp: i64,
}

/// Any event the pet program emits
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PetEvent {
    Updated(PetUpdated),
    Died(PetDied),
}

/// Why a `Program data:` line could not be decoded
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EventDecodeError {
    #[error("invalid base64 payload")]
    InvalidBase64,
    #[error("payload shorter than a discriminator")]
    TooShort,
    #[error("unknown event discriminator")]
    UnknownEvent,
    #[error("malformed {0} payload")]
    Malformed(&'static str),
}

impl PetEvent {
    fn name(&self) -> &'static str {
        match self {
            PetEvent::Updated(_) => "PetUpdated",
            PetEvent::Died(_) => "PetDied",
        }
    }

    /// Encode as discriminator + Borsh payload
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = discriminator("event", self.name()).to_vec();
        // Writing into a Vec cannot fail
        let _ = match self {
            PetEvent::Updated(ev) => borsh::to_writer(&mut data, ev),
            PetEvent::Died(ev) => borsh::to_writer(&mut data, ev),
        };
        data
    }

    /// Decode a discriminator + Borsh payload
    pub fn from_bytes(data: &[u8]) -> Result<Self, EventDecodeError> {
        if data.len() < 8 {
            return Err(EventDecodeError::TooShort);
        }
        let (tag, mut body) = data.split_at(8);

        if tag == discriminator("event", "PetUpdated") {
            PetUpdated::deserialize(&mut body)
                .map(PetEvent::Updated)
                .map_err(|_| EventDecodeError::Malformed("PetUpdated"))
        } else if tag == discriminator("event", "PetDied") {
            PetDied::deserialize(&mut body)
                .map(PetEvent::Died)
                .map_err(|_| EventDecodeError::Malformed("PetDied"))
        } else {
            Err(EventDecodeError::UnknownEvent)
        }
    }

    /// Render as the log line the program would emit
    pub fn to_log_line(&self) -> String {
        format!("{}{}", PROGRAM_DATA_PREFIX, BASE64.encode(self.to_bytes()))
    }

    /// Decode one log line. Returns `None` for lines that carry no event data.
    pub fn from_log_line(line: &str) -> Option<Result<Self, EventDecodeError>> {
        let payload = line.strip_prefix(PROGRAM_DATA_PREFIX)?;
        Some(
            BASE64
                .decode(payload.trim())
                .map_err(|_| EventDecodeError::InvalidBase64)
                .and_then(|bytes| Self::from_bytes(&bytes)),
        )
    }
}
