//! Pet Program Instructions
//!
//! Wire format follows Anchor: 8 byte `sha256("global:<name>")` sighash, then
//! the Borsh encoded arguments.

use borsh::BorshDeserialize;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

use crate::{discriminator, error::PetError};

/// Pet program instructions
///
/// All instructions take the same accounts:
/// 0. `[writable]` Pet account (PDA)
/// 1. `[signer, writable]` Authority (pays for init and food)
/// 2. `[]` System program
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PetInstruction {
    /// Create the pet (owner only)
    InitPet {
        /// Pet name, defaults to "maya"
        name: Option<String>,
    },

    /// Feed the pet, paying the food cost into the pet account
    FeedPet,

    /// Play with the pet
    PlayPet,

    /// Apply elapsed decay periods (driven by an external crank)
    ApplyDecay,

    /// Move accumulated food payments to the owner (owner only)
    Withdraw,
}

impl PetInstruction {
    /// Anchor method name of this instruction
    pub fn method_name(&self) -> &'static str {
        match self {
            PetInstruction::InitPet { .. } => "init_pet",
            PetInstruction::FeedPet => "feed_pet",
            PetInstruction::PlayPet => "play_pet",
            PetInstruction::ApplyDecay => "apply_decay",
            PetInstruction::Withdraw => "withdraw",
        }
    }

    /// Serialize into instruction data
    pub fn pack(&self) -> Vec<u8> {
        let mut data = discriminator("global", self.method_name()).to_vec();
        if let PetInstruction::InitPet { name } = self {
            // Writing into a Vec cannot fail
            let _ = borsh::to_writer(&mut data, name);
        }
        data
    }

    /// Parse instruction data
    pub fn unpack(data: &[u8]) -> Result<Self, PetError> {
        if data.len() < 8 {
            return Err(PetError::InvalidInstructionData);
        }
        let (tag, mut args) = data.split_at(8);

        let candidates = [
            PetInstruction::InitPet { name: None },
            PetInstruction::FeedPet,
            PetInstruction::PlayPet,
            PetInstruction::ApplyDecay,
            PetInstruction::Withdraw,
        ];

        let matched = candidates
            .into_iter()
            .find(|ix| discriminator("global", ix.method_name()) == tag)
            .ok_or(PetError::InvalidInstructionData)?;

        match matched {
            PetInstruction::InitPet { .. } => {
                let name = Option::<String>::deserialize(&mut args)
                    .map_err(|_| PetError::InvalidInstructionData)?;
                Ok(PetInstruction::InitPet { name })
            }
            other => Ok(other),
        }
    }

    /// Build the instruction against a pet account
    pub fn to_instruction(&self, program_id: &Pubkey, pet: &Pubkey, authority: &Pubkey) -> Instruction {
        Instruction {
            program_id: *program_id,
            accounts: vec![
                AccountMeta::new(*pet, false),
                AccountMeta::new(*authority, true),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data: self.pack(),
        }
    }
}
