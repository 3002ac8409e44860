//! Client-side view of the pet record

use pet_program::{Pet, PetError, PetEvent};
use solana_sdk::pubkey::Pubkey;

/// Read-only copy of the authoritative pet record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub hunger: u8,
    pub happiness: u8,
    pub alive: bool,
    pub last_update: i64,
    pub total_received: u64,
    pub last_feeder: Pubkey,
}

impl Record {
    /// Decode raw account data
    pub fn decode(data: &[u8]) -> Result<Self, PetError> {
        Pet::try_from_account_data(data).map(Record::from)
    }
}

impl From<Pet> for Record {
    fn from(pet: Pet) -> Self {
        Self {
            name: pet.name,
            hunger: pet.hunger,
            happiness: pet.happiness,
            alive: pet.alive,
            last_update: pet.last_update,
            total_received: pet.total_sol_received,
            last_feeder: pet.last_feeder,
        }
    }
}

/// Result of a pull. Absence is a normal state before `init`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Found(Record),
    NotFound,
}

impl FetchOutcome {
    pub fn record(&self) -> Option<&Record> {
        match self {
            FetchOutcome::Found(record) => Some(record),
            FetchOutcome::NotFound => None,
        }
    }
}

/// Partial update carried by a push notification.
/// `None` fields keep the cached value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub hunger: Option<u8>,
    pub happiness: Option<u8>,
    pub alive: Option<bool>,
    pub last_update: Option<i64>,
    pub total_received: Option<u64>,
    pub last_feeder: Option<Pubkey>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }

    /// Overlay this patch on a cached record
    pub fn apply_to(&self, base: &Record) -> Record {
        Record {
            name: self.name.clone().unwrap_or_else(|| base.name.clone()),
            hunger: self.hunger.unwrap_or(base.hunger),
            happiness: self.happiness.unwrap_or(base.happiness),
            alive: self.alive.unwrap_or(base.alive),
            last_update: self.last_update.unwrap_or(base.last_update),
            total_received: self.total_received.unwrap_or(base.total_received),
            last_feeder: self.last_feeder.unwrap_or(base.last_feeder),
        }
    }
}

impl From<&PetEvent> for RecordPatch {
    fn from(event: &PetEvent) -> Self {
        match event {
            PetEvent::Updated(ev) => RecordPatch {
                hunger: Some(ev.hunger),
                happiness: Some(ev.happiness),
                alive: Some(ev.alive),
                last_update: Some(ev.last_update),
                total_received: Some(ev.total_sol_received),
                last_feeder: Some(ev.last_feeder),
                ..Default::default()
            },
            // The death timestamp is wall-clock, not the record's last_update
            PetEvent::Died(_) => RecordPatch {
                hunger: Some(0),
                happiness: Some(0),
                alive: Some(false),
                ..Default::default()
            },
        }
    }
}
