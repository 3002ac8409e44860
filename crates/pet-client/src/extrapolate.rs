//! Decay Extrapolator
//!
//! Projects the record's vitals forward in time between authoritative updates.
//! The rates approximate the program's decay continuously instead of in whole
//! periods, so displayed numbers drift smoothly. Nothing here is written back.

use crate::record::Record;
use pet_program::constants::{DECAY_TIME, HAPPINESS_DECAY_AMT, HUNGER_DECAY_AMT};

/// Locally extrapolated stats
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vitals {
    pub hunger: f64,
    pub happiness: f64,
}

impl Vitals {
    /// The record's own values, no elapsed time
    pub fn of(record: &Record) -> Self {
        Self {
            hunger: f64::from(record.hunger),
            happiness: f64::from(record.happiness),
        }
    }

    pub fn is_starved(&self) -> bool {
        self.hunger <= 0.0
    }
}

/// Vitals of `record` at Unix time `now`
pub fn extrapolate(record: &Record, now: i64) -> Vitals {
    let elapsed = now.saturating_sub(record.last_update).max(0) as f64;
    let periods = elapsed / DECAY_TIME as f64;

    Vitals {
        hunger: (f64::from(record.hunger) - periods * f64::from(HUNGER_DECAY_AMT)).max(0.0),
        happiness: (f64::from(record.happiness) - periods * f64::from(HAPPINESS_DECAY_AMT)).max(0.0),
    }
}

/// Stateful extrapolation for a tick loop. Freezes once the record is dead.
#[derive(Debug, Default)]
pub struct DecayExtrapolator {
    last: Option<Vitals>,
}

impl DecayExtrapolator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, record: &Record, now: i64) -> Vitals {
        let vitals = if record.alive {
            extrapolate(record, now)
        } else {
            self.last.unwrap_or_else(|| Vitals::of(record))
        };
        self.last = Some(vitals);
        vitals
    }

    /// Last produced value
    pub fn last(&self) -> Option<Vitals> {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
