//! Pet Program Errors

use solana_program::program_error::ProgramError;
use thiserror::Error;

/// Pet program errors
///
/// Codes are offset by [`PetError::CODE_OFFSET`] the way Anchor numbers
/// custom errors, so `Custom(6000)` is `PetIsDead`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PetError {
    #[error("Pet is dead and cannot be interacted with")]
    PetIsDead,

    #[error("Nothing to decay yet")]
    NoDecayNeeded,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Signer is not the pet owner")]
    Unauthorized,

    #[error("Pet name is longer than 32 bytes")]
    NameTooLong,

    #[error("Pet already initialized")]
    AlreadyInitialized,

    #[error("Pet account not initialized")]
    NotInitialized,

    #[error("Invalid pet account data")]
    InvalidAccountData,

    #[error("Invalid instruction data")]
    InvalidInstructionData,

    #[error("Insufficient funds")]
    InsufficientFunds,
}

impl PetError {
    /// First custom error code
    pub const CODE_OFFSET: u32 = 6000;

    const ALL: [PetError; 10] = [
        PetError::PetIsDead,
        PetError::NoDecayNeeded,
        PetError::Overflow,
        PetError::Unauthorized,
        PetError::NameTooLong,
        PetError::AlreadyInitialized,
        PetError::NotInitialized,
        PetError::InvalidAccountData,
        PetError::InvalidInstructionData,
        PetError::InsufficientFunds,
    ];

    /// Custom error code as reported in transaction status
    pub fn code(self) -> u32 {
        Self::CODE_OFFSET + self as u32
    }

    /// Map a `Custom(n)` code back to the error
    pub fn from_code(code: u32) -> Option<Self> {
        let index = code.checked_sub(Self::CODE_OFFSET)? as usize;
        Self::ALL.get(index).copied()
    }
}

impl From<PetError> for ProgramError {
    fn from(e: PetError) -> Self {
        ProgramError::Custom(e.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        assert_eq!(PetError::PetIsDead.code(), 6000);
        assert_eq!(PetError::from_code(6003), Some(PetError::Unauthorized));
        assert_eq!(PetError::from_code(42), None);
        assert_eq!(PetError::from_code(6999), None);
    }
}
