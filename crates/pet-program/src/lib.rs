//! Pet Program - on-ledger interface
//!
//! The pet program itself runs on the ledger; this crate mirrors what a client
//! (or the in-process ledger) needs to talk to it:
//! - Pet: the single global record (Anchor account layout)
//! - PetInstruction: init_pet, feed_pet, play_pet, apply_decay, withdraw
//! - PetEvent: PetUpdated / PetDied, emitted as `Program data:` log lines
//! - PetError: custom program error codes

use solana_program::{hash::hash, pubkey::Pubkey};

pub mod error;
pub mod event;
pub mod instruction;
pub mod state;

pub use error::PetError;
pub use event::{PetDied, PetEvent, PetUpdated};
pub use instruction::PetInstruction;
pub use state::{DecayOutcome, Pet};

// Pet Program ID as deployed on localnet/devnet
solana_program::declare_id!("JSkdjZGLt8gKvFsQCB2Kzd7ERgUEk1FXNJEeUiw9PWM");

/// Identity allowed to initialize the pet and withdraw its earnings
pub const OWNER: Pubkey = solana_program::pubkey!("9Yz1ZHg1SFzrhHgVXKnLSBSUBtzo8uTsmwHpkzcbmNzv");

/// Constants
pub mod constants {
    // Vitals
    /// Hunger gained per feed
    pub const HUNGER_GAIN_AMT: u8 = 2;
    /// Hunger lost per decay period
    pub const HUNGER_DECAY_AMT: u8 = 1;
    /// Happiness lost per decay period
    pub const HAPPINESS_DECAY_AMT: u8 = 2;
    /// Happiness gained per feed or play
    pub const HAPPINESS_GAIN_AMT: u8 = 5;
    /// Hunger ceiling
    pub const MAX_FEED_AMT: u8 = 100;
    /// Happiness ceiling
    pub const MAX_HAPPINESS_AMT: u8 = 100;

    // Time
    /// Seconds per decay period
    pub const DECAY_TIME: i64 = 30;

    // Economy
    /// Price of one feed (0.1 SOL)
    pub const FOOD_COST_LAMPORTS: u64 = 100_000_000;

    // PDA seeds
    /// Pet record seed
    pub const PET_SEED: &str = "maya";

    /// Name used when init_pet is given none
    pub const DEFAULT_PET_NAME: &str = "maya";
}

/// Anchor-style 8 byte discriminator: `sha256("<namespace>:<name>")[..8]`
pub fn discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let preimage = format!("{namespace}:{name}");
    let digest = hash(preimage.as_bytes()).to_bytes();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Derive the pet record PDA
pub fn derive_pet_pda(seed: &str, program_id: &Pubkey) -> Option<(Pubkey, u8)> {
    Pubkey::try_find_program_address(&[seed.as_bytes()], program_id)
}
