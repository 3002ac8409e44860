//! Pet Processor
//!
//! Executes transactions against the account store with the pet program's
//! semantics. Each transaction runs on a private copy of the accounts it names
//! and is committed only if every instruction succeeds.

use crate::account_store::AccountStore;
use pet_client::Clock;
use pet_program::{
    constants::{FOOD_COST_LAMPORTS, PET_SEED},
    Pet, PetDied, PetError, PetEvent, PetInstruction, PetUpdated,
};
use solana_sdk::{
    account::{AccountSharedData, ReadableAccount, WritableAccount},
    clock::Slot,
    instruction::{CompiledInstruction, InstructionError},
    message::Message,
    pubkey::Pubkey,
    rent::Rent,
    sanitize::Sanitize,
    signature::Signature,
    transaction::{Transaction, TransactionError},
};
use std::{collections::HashMap, sync::Arc};

/// Result of processing a single transaction
#[derive(Debug, Clone)]
pub struct TransactionResult {
    pub signature: Signature,
    pub slot: Slot,
    pub error: Option<TransactionError>,
    pub logs: Vec<String>,
    /// Every account the transaction names
    pub account_keys: Vec<Pubkey>,
}

impl TransactionResult {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn mentions(&self, pubkey: &Pubkey) -> bool {
        self.account_keys.contains(pubkey)
    }
}

/// Accounts loaded for one transaction
type WorkingSet = HashMap<Pubkey, AccountSharedData>;

pub struct PetProcessor {
    store: AccountStore,
    clock: Arc<dyn Clock>,
    program_id: Pubkey,
    owner: Pubkey,
    pet_address: Pubkey,
    rent: Rent,
}

impl PetProcessor {
    pub fn new(store: AccountStore, clock: Arc<dyn Clock>, program_id: Pubkey, owner: Pubkey) -> Self {
        let pet_address = pet_program::derive_pet_pda(PET_SEED, &program_id)
            .map(|(address, _)| address)
            .unwrap_or_default();

        Self {
            store,
            clock,
            program_id,
            owner,
            pet_address,
            rent: Rent::default(),
        }
    }

    pub fn pet_address(&self) -> &Pubkey {
        &self.pet_address
    }

    pub fn rent_exempt_minimum(&self) -> u64 {
        self.rent.minimum_balance(Pet::LEN)
    }

    pub fn process_transaction(&self, tx: &Transaction, slot: Slot) -> TransactionResult {
        let message = &tx.message;
        let mut result = TransactionResult {
            signature: tx.signatures.first().copied().unwrap_or_default(),
            slot,
            error: None,
            logs: Vec::new(),
            account_keys: message.account_keys.clone(),
        };

        if tx.sanitize().is_err() {
            result.error = Some(TransactionError::SanitizeFailure);
            return result;
        }
        if tx.verify().is_err() {
            result.error = Some(TransactionError::SignatureFailure);
            return result;
        }

        let mut accounts: WorkingSet = message
            .account_keys
            .iter()
            .map(|key| (*key, self.store.get_account(key).unwrap_or_default()))
            .collect();

        for (index, ix) in message.instructions.iter().enumerate() {
            let index = index as u8;
            let Some(program_id) = message.account_keys.get(usize::from(ix.program_id_index)).copied() else {
                result.error = Some(TransactionError::InstructionError(
                    index,
                    InstructionError::NotEnoughAccountKeys,
                ));
                return result;
            };

            if program_id != self.program_id {
                tracing::debug!("Rejecting instruction for unsupported program {}", program_id);
                result.error = Some(TransactionError::InstructionError(
                    index,
                    InstructionError::UnsupportedProgramId,
                ));
                return result;
            }

            result.logs.push(format!("Program {} invoke [1]", program_id));
            match self.process_instruction(ix, message, &mut accounts, &mut result.logs) {
                Ok(()) => {
                    result.logs.push(format!("Program {} success", program_id));
                }
                Err(e) => {
                    result.logs.push(format!(
                        "Program {} failed: custom program error: {:#x}",
                        program_id,
                        e.code()
                    ));
                    tracing::debug!("Transaction {} failed: {}", result.signature, e);
                    result.error = Some(TransactionError::InstructionError(
                        index,
                        InstructionError::Custom(e.code()),
                    ));
                    return result;
                }
            }
        }

        self.store.commit(accounts, slot);
        result
    }

    fn process_instruction(
        &self,
        ix: &CompiledInstruction,
        message: &Message,
        accounts: &mut WorkingSet,
        logs: &mut Vec<String>,
    ) -> Result<(), PetError> {
        let instruction = PetInstruction::unpack(&ix.data)?;

        let (pet_index, authority_index) = match ix.accounts.as_slice() {
            [pet, authority, ..] => (usize::from(*pet), usize::from(*authority)),
            _ => return Err(PetError::InvalidInstructionData),
        };
        let (Some(&pet_key), Some(&authority)) = (
            message.account_keys.get(pet_index),
            message.account_keys.get(authority_index),
        ) else {
            return Err(PetError::InvalidInstructionData);
        };

        if !message.is_signer(authority_index) {
            return Err(PetError::Unauthorized);
        }
        if pet_key != self.pet_address {
            return Err(PetError::InvalidAccountData);
        }

        logs.push(format!("Program log: Instruction: {}", instruction_label(&instruction)));
        let now = self.clock.unix_timestamp();

        match instruction {
            PetInstruction::InitPet { name } => {
                if authority != self.owner {
                    return Err(PetError::Unauthorized);
                }
                if is_initialized(accounts, &pet_key) {
                    return Err(PetError::AlreadyInitialized);
                }
                let pet = Pet::new(name, authority, now)?;
                let rent = self.rent_exempt_minimum();
                debit(accounts, &authority, rent)?;

                let mut account = AccountSharedData::new(rent, Pet::LEN, &self.program_id);
                account.set_data_from_slice(&pet.to_account_data());
                accounts.insert(pet_key, account);

                logs.push(format!("Program log: Welcome home {}", pet.name));
                emit(logs, PetEvent::Updated(PetUpdated::from(&pet)));
            }
            PetInstruction::FeedPet => {
                let mut pet = load_pet(accounts, &pet_key)?;
                if self.decay_before_interaction(&mut pet, now, logs) {
                    store_pet(accounts, &pet_key, &pet)?;
                    return Ok(());
                }
                pet.feed(authority, now)?;
                debit(accounts, &authority, FOOD_COST_LAMPORTS)?;
                credit(accounts, &pet_key, FOOD_COST_LAMPORTS)?;
                store_pet(accounts, &pet_key, &pet)?;

                logs.push(format!("Program log: Now hunger is {}", pet.hunger));
                emit(logs, PetEvent::Updated(PetUpdated::from(&pet)));
            }
            PetInstruction::PlayPet => {
                let mut pet = load_pet(accounts, &pet_key)?;
                if self.decay_before_interaction(&mut pet, now, logs) {
                    store_pet(accounts, &pet_key, &pet)?;
                    return Ok(());
                }
                pet.play(authority, now)?;
                store_pet(accounts, &pet_key, &pet)?;
                emit(logs, PetEvent::Updated(PetUpdated::from(&pet)));
            }
            PetInstruction::ApplyDecay => {
                let mut pet = load_pet(accounts, &pet_key)?;
                if !pet.alive {
                    return Err(PetError::PetIsDead);
                }
                let outcome = pet.apply_decay(now);
                if outcome.periods == 0 {
                    return Err(PetError::NoDecayNeeded);
                }
                store_pet(accounts, &pet_key, &pet)?;

                logs.push(format!("Program log: Decay ticks: {}", outcome.periods));
                if outcome.died {
                    emit(logs, PetEvent::Died(PetDied { timestamp: now }));
                }
                emit(logs, PetEvent::Updated(PetUpdated::from(&pet)));
            }
            PetInstruction::Withdraw => {
                if authority != self.owner {
                    return Err(PetError::Unauthorized);
                }
                load_pet(accounts, &pet_key)?;
                let available = accounts
                    .get(&pet_key)
                    .map(|a| a.lamports())
                    .unwrap_or(0)
                    .saturating_sub(self.rent_exempt_minimum());
                debit(accounts, &pet_key, available)?;
                credit(accounts, &authority, available)?;
                logs.push(format!("Program log: Withdrew {} lamports", available));
            }
        }

        Ok(())
    }

    /// Catch up on decay before an interaction.
    /// Returns true when the decay killed the pet; the interaction is then skipped.
    fn decay_before_interaction(&self, pet: &mut Pet, now: i64, logs: &mut Vec<String>) -> bool {
        let outcome = pet.apply_decay(now);
        if outcome.periods > 0 {
            logs.push(format!("Program log: Decay ticks: {}", outcome.periods));
        }
        if outcome.died {
            logs.push("Program log: Pet starved before the interaction".to_string());
            emit(logs, PetEvent::Died(PetDied { timestamp: now }));
            emit(logs, PetEvent::Updated(PetUpdated::from(&*pet)));
        }
        outcome.died
    }
}

fn instruction_label(instruction: &PetInstruction) -> &'static str {
    match instruction {
        PetInstruction::InitPet { .. } => "InitPet",
        PetInstruction::FeedPet => "FeedPet",
        PetInstruction::PlayPet => "PlayPet",
        PetInstruction::ApplyDecay => "ApplyDecay",
        PetInstruction::Withdraw => "Withdraw",
    }
}

fn emit(logs: &mut Vec<String>, event: PetEvent) {
    logs.push(event.to_log_line());
}

fn is_initialized(accounts: &WorkingSet, pet_key: &Pubkey) -> bool {
    accounts
        .get(pet_key)
        .is_some_and(|a| a.lamports() > 0 || !a.data().is_empty())
}

fn load_pet(accounts: &WorkingSet, pet_key: &Pubkey) -> Result<Pet, PetError> {
    let account = accounts
        .get(pet_key)
        .filter(|a| a.lamports() > 0)
        .ok_or(PetError::NotInitialized)?;
    Pet::try_from_account_data(account.data())
}

fn store_pet(accounts: &mut WorkingSet, pet_key: &Pubkey, pet: &Pet) -> Result<(), PetError> {
    let account = accounts.get_mut(pet_key).ok_or(PetError::NotInitialized)?;
    account.set_data_from_slice(&pet.to_account_data());
    Ok(())
}

fn debit(accounts: &mut WorkingSet, key: &Pubkey, lamports: u64) -> Result<(), PetError> {
    let account = accounts.entry(*key).or_default();
    let remaining = account
        .lamports()
        .checked_sub(lamports)
        .ok_or(PetError::InsufficientFunds)?;
    account.set_lamports(remaining);
    Ok(())
}

fn credit(accounts: &mut WorkingSet, key: &Pubkey, lamports: u64) -> Result<(), PetError> {
    let account = accounts.entry(*key).or_default();
    let total = account
        .lamports()
        .checked_add(lamports)
        .ok_or(PetError::Overflow)?;
    account.set_lamports(total);
    Ok(())
}
