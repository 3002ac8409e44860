//! Address Resolver
//!
//! The pet record lives at a PDA derived from a fixed seed and the program id,
//! the same derivation the program uses. Computed once, immutable afterwards.

use crate::error::ConfigError;
use solana_sdk::pubkey::Pubkey;
use std::fmt;

/// Resolved location of the pet record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordAddress {
    pubkey: Pubkey,
    bump: u8,
    program_id: Pubkey,
}

impl RecordAddress {
    /// Derive the record PDA. An empty or oversized seed is a configuration error.
    pub fn resolve(seed: &str, program_id: &Pubkey) -> Result<Self, ConfigError> {
        if seed.is_empty() {
            return Err(ConfigError::InvalidSeed(seed.to_string()));
        }
        let (pubkey, bump) = pet_program::derive_pet_pda(seed, program_id)
            .ok_or_else(|| ConfigError::InvalidSeed(seed.to_string()))?;

        tracing::debug!("Resolved pet record {} (bump {})", pubkey, bump);

        Ok(Self {
            pubkey,
            bump,
            program_id: *program_id,
        })
    }

    pub fn pubkey(&self) -> &Pubkey {
        &self.pubkey
    }

    pub fn bump(&self) -> u8 {
        self.bump
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }
}

impl fmt::Display for RecordAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pubkey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_program_derivation() {
        let program_id = pet_program::id();
        let address = RecordAddress::resolve("maya", &program_id).unwrap();
        let (expected, bump) = Pubkey::find_program_address(&[b"maya"], &program_id);
        assert_eq!(*address.pubkey(), expected);
        assert_eq!(address.bump(), bump);
        assert_eq!(*address.program_id(), program_id);
    }

    #[test]
    fn test_different_programs_differ() {
        let a = RecordAddress::resolve("maya", &Pubkey::new_unique()).unwrap();
        let b = RecordAddress::resolve("maya", &Pubkey::new_unique()).unwrap();
        assert_ne!(a.pubkey(), b.pubkey());
    }

    #[test]
    fn test_malformed_seed() {
        assert!(RecordAddress::resolve("", &pet_program::id()).is_err());
        assert!(RecordAddress::resolve(&"m".repeat(33), &pet_program::id()).is_err());
    }
}
