//! Text rendering of the pet

use chrono::{DateTime, Utc};
use pet_client::{PresentationState, Record, Scene, Vitals};
use solana_sdk::native_token::lamports_to_sol;
use std::fmt::Write;

const BAR_WIDTH: usize = 20;

pub fn sol(lamports: u64) -> String {
    format!("{:.3} SOL", lamports_to_sol(lamports))
}

fn bar(value: f64) -> String {
    let filled = ((value.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}] {:>5.1}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled), value)
}

fn face(state: PresentationState) -> &'static str {
    match state {
        PresentationState::Idle => "(o.o)",
        PresentationState::Eating => "(^o^)~*",
        PresentationState::Playing => "\\(^v^)/",
        PresentationState::Dead => "(x_x)",
    }
}

fn timestamp(unix: i64) -> String {
    DateTime::<Utc>::from_timestamp(unix, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| unix.to_string())
}

/// One status line per scene change
pub fn scene_line(scene: &Scene) -> String {
    match scene {
        Scene::Loading => "loading...".to_string(),
        Scene::Uninitialized => "no pet yet, waiting for the owner to create one".to_string(),
        Scene::Pet(view) => format!(
            "{} {:<8} {:<8} hunger {} happiness {}",
            face(view.state),
            view.name,
            view.state,
            bar(view.vitals.hunger),
            bar(view.vitals.happiness),
        ),
    }
}

/// Multi-line description of a fetched record
pub fn record_summary(record: &Record, vitals: &Vitals, now: i64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "name       {}", record.name);
    let _ = writeln!(out, "alive      {}", record.alive);
    let _ = writeln!(out, "hunger     {} (on ledger {})", bar(vitals.hunger), record.hunger);
    let _ = writeln!(out, "happiness  {} (on ledger {})", bar(vitals.happiness), record.happiness);
    let _ = writeln!(
        out,
        "updated    {} ({}s ago)",
        timestamp(record.last_update),
        now.saturating_sub(record.last_update)
    );
    let _ = writeln!(out, "received   {}", sol(record.total_received));
    let _ = writeln!(out, "last fed   {}", record.last_feeder);
    out
}
