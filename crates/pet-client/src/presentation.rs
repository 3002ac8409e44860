//! Presentation State Derivor

use crate::{extrapolate::Vitals, record::Record};
use std::{fmt, time::Duration};
use tokio::time::Instant;

/// What the pet is visibly doing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PresentationState {
    #[default]
    Idle,
    Eating,
    Playing,
    Dead,
}

impl fmt::Display for PresentationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PresentationState::Idle => "idle",
            PresentationState::Eating => "eating",
            PresentationState::Playing => "playing",
            PresentationState::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// Presentation state machine.
///
/// The ledger reports results, not which action produced them, so the
/// animation is a heuristic: a record whose `last_update` advanced and whose
/// hunger rose above what was on screen is shown as eating, otherwise rising
/// happiness is shown as playing. A transaction that raised both reads as
/// eating.
///
/// The ledger decays in whole periods while the screen decays continuously, so
/// a record written by a decay crank usually sits a fraction above the shown
/// vitals with a newer `last_update`. Such a record animates as eating too; the
/// heuristic cannot tell it from a feed.
///
/// `Dead` holds until a record arrives that is alive, not starved, and whose
/// `last_update` moved past the one seen at death.
#[derive(Debug)]
pub struct Presenter {
    state: PresentationState,
    window: Duration,
    expires_at: Option<Instant>,
    last_seen_update: Option<i64>,
    death_update: Option<i64>,
}

impl Presenter {
    pub fn new(window: Duration) -> Self {
        Self {
            state: PresentationState::Idle,
            window,
            expires_at: None,
            last_seen_update: None,
            death_update: None,
        }
    }

    pub fn state(&self) -> PresentationState {
        self.state
    }

    /// When the current animation ends, if one is running
    pub fn deadline(&self) -> Option<Instant> {
        self.expires_at
    }

    /// A record newer than the last one was observed.
    ///
    /// `displayed` is what was on screen just before; `current` is the record
    /// extrapolated to now.
    pub fn observe_record(
        &mut self,
        record: &Record,
        displayed: Option<Vitals>,
        current: Vitals,
        now: Instant,
    ) -> PresentationState {
        let previous_update = self.last_seen_update.replace(record.last_update);

        if self.state == PresentationState::Dead {
            let revived = record.alive
                && !current.is_starved()
                && self.death_update.map_or(true, |at| record.last_update > at);
            if revived {
                tracing::debug!("Pet revived at {}", record.last_update);
                self.state = PresentationState::Idle;
                self.death_update = None;
            }
            return self.state;
        }

        if !record.alive || current.is_starved() {
            self.die(record.last_update);
            return self.state;
        }

        let advanced = previous_update.is_some_and(|prev| record.last_update > prev);
        if let (true, Some(shown)) = (advanced, displayed) {
            if f64::from(record.hunger) > shown.hunger {
                self.animate(PresentationState::Eating, now);
            } else if f64::from(record.happiness) > shown.happiness {
                self.animate(PresentationState::Playing, now);
            }
        }
        self.state
    }

    /// A tick produced new vitals without a new record
    pub fn observe_vitals(&mut self, current: Vitals) -> PresentationState {
        if self.state != PresentationState::Dead && current.is_starved() {
            self.die(self.last_seen_update.unwrap_or_default());
        }
        self.state
    }

    /// End the running animation once its window has passed
    pub fn expire(&mut self, now: Instant) -> PresentationState {
        if let Some(deadline) = self.expires_at {
            if now >= deadline {
                self.expires_at = None;
                if matches!(self.state, PresentationState::Eating | PresentationState::Playing) {
                    self.state = PresentationState::Idle;
                }
            }
        }
        self.state
    }

    /// Forget everything, as if no record had been seen
    pub fn reset(&mut self) {
        *self = Self::new(self.window);
    }

    fn animate(&mut self, state: PresentationState, now: Instant) {
        tracing::debug!("Presenting {}", state);
        self.state = state;
        self.expires_at = Some(now + self.window);
    }

    fn die(&mut self, at: i64) {
        tracing::debug!("Pet presented as dead (last_update {})", at);
        self.state = PresentationState::Dead;
        self.death_update = Some(at);
        self.expires_at = None;
    }
}
