//! View loop
//!
//! Turns cache changes and timer ticks into a [`Scene`] published on a watch
//! channel. The loop owns the extrapolator and presenter; nothing else
//! touches them.

use crate::{
    cache::{CacheState, RecordCache},
    clock::Clock,
    extrapolate::{DecayExtrapolator, Vitals},
    presentation::{PresentationState, Presenter},
    record::Record,
};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, sleep_until, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSettings {
    /// Extrapolation period
    pub tick_period: Duration,
    /// How long eating/playing stays on screen
    pub display_window: Duration,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
            display_window: Duration::from_secs(3),
        }
    }
}

/// The pet as it should be drawn right now
#[derive(Debug, Clone, PartialEq)]
pub struct PetView {
    pub name: String,
    pub state: PresentationState,
    pub vitals: Vitals,
    pub record: Record,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Scene {
    /// First fetch still in flight
    #[default]
    Loading,
    /// No record on the ledger yet
    Uninitialized,
    Pet(PetView),
}

impl Scene {
    pub fn pet(&self) -> Option<&PetView> {
        match self {
            Scene::Pet(view) => Some(view),
            _ => None,
        }
    }

    pub fn state(&self) -> Option<PresentationState> {
        self.pet().map(|view| view.state)
    }
}

/// Derivation state owned by the loop
struct Derivor {
    presenter: Presenter,
    extrapolator: DecayExtrapolator,
    record: Option<Record>,
    loaded: bool,
}

impl Derivor {
    fn new(settings: &ViewSettings) -> Self {
        Self {
            presenter: Presenter::new(settings.display_window),
            extrapolator: DecayExtrapolator::new(),
            record: None,
            loaded: false,
        }
    }

    fn on_cache(&mut self, state: &CacheState, unix_now: i64, now: Instant) {
        self.loaded = state.loaded;

        let Some(record) = &state.record else {
            if self.record.take().is_some() {
                self.presenter.reset();
                self.extrapolator.reset();
            }
            return;
        };
        if self.record.as_ref() == Some(record) {
            return;
        }

        let displayed = self.extrapolator.last();
        let current = self.extrapolator.tick(record, unix_now);
        self.presenter.observe_record(record, displayed, current, now);
        self.record = Some(record.clone());
    }

    fn on_tick(&mut self, unix_now: i64, now: Instant) {
        if let Some(record) = &self.record {
            let vitals = self.extrapolator.tick(record, unix_now);
            self.presenter.observe_vitals(vitals);
        }
        self.presenter.expire(now);
    }

    fn on_deadline(&mut self, now: Instant) {
        self.presenter.expire(now);
    }

    fn scene(&self) -> Scene {
        match &self.record {
            None if !self.loaded => Scene::Loading,
            None => Scene::Uninitialized,
            Some(record) => Scene::Pet(PetView {
                name: record.name.clone(),
                state: self.presenter.state(),
                vitals: self.extrapolator.last().unwrap_or_else(|| Vitals::of(record)),
                record: record.clone(),
            }),
        }
    }
}

/// Running view loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct ViewHandle {
    scene: watch::Receiver<Scene>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ViewHandle {
    /// Latest scene
    pub fn scene(&self) -> Scene {
        self.scene.borrow().clone()
    }

    /// Receiver woken on every scene change
    pub fn watch(&self) -> watch::Receiver<Scene> {
        self.scene.clone()
    }

    /// Stop the loop and wait for it to exit
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("View loop ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ViewHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Start deriving scenes from `cache`
pub fn spawn_view(cache: &RecordCache, clock: Arc<dyn Clock>, settings: ViewSettings) -> ViewHandle {
    let mut cache_rx = cache.subscribe();
    let mut derivor = Derivor::new(&settings);
    derivor.on_cache(&cache_rx.borrow_and_update(), clock.unix_timestamp(), Instant::now());

    let (scene_tx, scene_rx) = watch::channel(derivor.scene());
    let token = CancellationToken::new();
    let cancelled = token.clone();

    let task = tokio::spawn(async move {
        let mut ticker = interval(settings.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let deadline = derivor.presenter.deadline();

            tokio::select! {
                biased;

                _ = cancelled.cancelled() => break,

                changed = cache_rx.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Record cache dropped, stopping view loop");
                        break;
                    }
                    let state = cache_rx.borrow_and_update().clone();
                    derivor.on_cache(&state, clock.unix_timestamp(), Instant::now());
                }

                _ = wait_deadline(deadline) => {
                    derivor.on_deadline(Instant::now());
                }

                _ = ticker.tick() => {
                    derivor.on_tick(clock.unix_timestamp(), Instant::now());
                }
            }

            let scene = derivor.scene();
            scene_tx.send_if_modified(|current| {
                if *current == scene {
                    return false;
                }
                if current.state() != scene.state() {
                    tracing::debug!("Scene state {:?} -> {:?}", current.state(), scene.state());
                }
                *current = scene;
                true
            });
        }
    });

    ViewHandle {
        scene: scene_rx,
        token,
        task: Some(task),
    }
}
