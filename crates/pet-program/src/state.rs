//! Pet Program State
//!
//! The single global pet record, stored with Anchor's account layout:
//! 8 byte discriminator followed by the Borsh encoded fields.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

use crate::{constants::*, discriminator, error::PetError};

/// Pet record - singleton at the PDA derived from [`PET_SEED`]
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Pet {
    /// Display name (max 32 bytes)
    pub name: String,
    /// Fullness, 0-100
    pub hunger: u8,
    /// Happiness, 0-100
    pub happiness: u8,
    /// Dead pets stay on the ledger with `alive = false`
    pub alive: bool,
    /// Reserved by the program, always 0 today
    pub food_queue: u32,
    /// Unix timestamp of the last applied decay period or interaction
    pub last_update: i64,
    /// Lamports received from feeders over the pet's lifetime
    pub total_sol_received: u64,
    /// Most recent identity that mutated the pet
    pub last_feeder: Pubkey,
}

/// Result of applying ledger-side decay
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecayOutcome {
    /// Whole decay periods applied
    pub periods: u8,
    /// Whether this decay killed the pet
    pub died: bool,
}

impl Pet {
    /// Maximum name length in bytes
    pub const MAX_NAME_LEN: usize = 32;

    /// Account size including the discriminator
    pub const LEN: usize = 8
        + 4 + Self::MAX_NAME_LEN // name
        + 1 // hunger
        + 1 // happiness
        + 1 // alive
        + 4 // food_queue
        + 8 // last_update
        + 8 // total_sol_received
        + 32; // last_feeder

    /// Account discriminator (`sha256("account:Pet")[..8]`)
    pub fn account_discriminator() -> [u8; 8] {
        discriminator("account", "Pet")
    }

    /// Freshly initialized pet
    pub fn new(name: Option<String>, authority: Pubkey, now: i64) -> Result<Self, PetError> {
        let name = name.unwrap_or_else(|| DEFAULT_PET_NAME.to_string());
        if name.len() > Self::MAX_NAME_LEN {
            return Err(PetError::NameTooLong);
        }

        Ok(Self {
            name,
            hunger: MAX_FEED_AMT,
            happiness: MAX_HAPPINESS_AMT,
            alive: true,
            food_queue: 0,
            last_update: now,
            total_sol_received: 0,
            last_feeder: authority,
        })
    }

    /// Decode from raw account data, checking the discriminator.
    /// Trailing allocated space is ignored.
    pub fn try_from_account_data(data: &[u8]) -> Result<Self, PetError> {
        if data.len() < 8 || data[..8] != Self::account_discriminator() {
            return Err(PetError::InvalidAccountData);
        }
        let mut body = &data[8..];
        Pet::deserialize(&mut body).map_err(|_| PetError::InvalidAccountData)
    }

    /// Encode to raw account data, padded to [`Pet::LEN`]
    pub fn to_account_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(Self::LEN);
        data.extend_from_slice(&Self::account_discriminator());
        // Writing into a Vec cannot fail
        let _ = self.serialize(&mut data);
        if data.len() < Self::LEN {
            data.resize(Self::LEN, 0);
        }
        data
    }

    /// Apply whole elapsed decay periods.
    ///
    /// `last_update` moves forward by the periods applied, so partial periods
    /// carry over to the next call.
    pub fn apply_decay(&mut self, now: i64) -> DecayOutcome {
        let elapsed = now.saturating_sub(self.last_update);
        // A pet dies long before 255 periods of decay
        let periods = (elapsed / DECAY_TIME).clamp(0, u8::MAX as i64) as u8;

        if periods == 0 || !self.alive {
            return DecayOutcome::default();
        }

        self.hunger = self
            .hunger
            .saturating_sub(periods.saturating_mul(HUNGER_DECAY_AMT));
        self.happiness = self
            .happiness
            .saturating_sub(periods.saturating_mul(HAPPINESS_DECAY_AMT));
        self.last_update += periods as i64 * DECAY_TIME;

        let died = self.hunger == 0 || self.happiness == 0;
        if died {
            self.alive = false;
            self.hunger = 0;
            self.happiness = 0;
        }

        DecayOutcome { periods, died }
    }

    /// Feed the pet: hunger +2 and happiness +5, both capped at 100
    pub fn feed(&mut self, feeder: Pubkey, now: i64) -> Result<(), PetError> {
        if !self.alive {
            return Err(PetError::PetIsDead);
        }

        let hunger = self.hunger.saturating_add(HUNGER_GAIN_AMT);
        if hunger <= MAX_FEED_AMT {
            self.hunger = hunger;
            let happiness = self.happiness.saturating_add(HAPPINESS_GAIN_AMT);
            if happiness <= MAX_HAPPINESS_AMT {
                self.happiness = happiness;
            }
        } else {
            self.hunger = MAX_FEED_AMT;
            self.happiness = MAX_HAPPINESS_AMT;
        }

        self.total_sol_received = self
            .total_sol_received
            .checked_add(FOOD_COST_LAMPORTS)
            .ok_or(PetError::Overflow)?;
        self.last_feeder = feeder;
        self.last_update = self.last_update.max(now);
        Ok(())
    }

    /// Play with the pet: happiness +5, capped at 100
    pub fn play(&mut self, player: Pubkey, now: i64) -> Result<(), PetError> {
        if !self.alive {
            return Err(PetError::PetIsDead);
        }

        self.happiness = self
            .happiness
            .saturating_add(HAPPINESS_GAIN_AMT)
            .min(MAX_HAPPINESS_AMT);
        self.last_feeder = player;
        self.last_update = self.last_update.max(now);
        Ok(())
    }
}
