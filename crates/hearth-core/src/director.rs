//! Homeostatic director: a band controller that watches recent conflict and
//! cooperation frequency and asks the orchestrator to nudge the world back
//! toward the interesting middle. Decides only; never mutates.

use contracts::{Event, EventKind, SimConfig};
use serde::Serialize;

use crate::{mix_seed, sample_range_f64};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerturbationField {
    Temperature,
    Light,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Perturbation {
    pub room_id: String,
    pub field: PerturbationField,
    pub amount: f64,
}

/// One assessment's worth of requested interventions. Mutually compatible;
/// the orchestrator applies whichever are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DirectorPlan {
    /// Exactly one seeded room nudge when the window was too quiet.
    pub perturbation: Option<Perturbation>,
    /// Ease every room toward neutral when conflicts run hot.
    pub calming: bool,
    /// Hint the mediator toward a cooperation bonus when teamwork is scarce.
    pub cooperation_hint: bool,
    pub conflicts_in_window: usize,
    pub cooperation_in_window: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Director {
    interval: u64,
    window_secs: u64,
    conflict_band_min: usize,
    conflict_band_max: usize,
    cooperation_min: usize,
    seed: u64,
}

impl Director {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            interval: config.director_interval.max(1),
            window_secs: config.director_window_secs,
            conflict_band_min: config.conflict_band_min,
            conflict_band_max: config.conflict_band_max,
            cooperation_min: config.cooperation_min,
            seed: config.seed,
        }
    }

    pub fn is_due(&self, tick: u64) -> bool {
        tick % self.interval == 0
    }

    /// Pure band controller: no integral or derivative state, the same
    /// inputs always yield the same plan.
    pub fn assess(
        &self,
        events: &[Event],
        room_ids: &[String],
        tick: u64,
        now_secs: u64,
    ) -> DirectorPlan {
        let window_start = now_secs.saturating_sub(self.window_secs);
        let mut conflicts = 0usize;
        let mut cooperation = 0usize;
        for event in events {
            if event.at_secs < window_start {
                continue;
            }
            match event.kind {
                EventKind::ConflictDetected => conflicts += 1,
                EventKind::CooperationObserved => cooperation += 1,
                _ => {}
            }
        }

        let mut plan = DirectorPlan {
            conflicts_in_window: conflicts,
            cooperation_in_window: cooperation,
            ..DirectorPlan::default()
        };

        if conflicts < self.conflict_band_min {
            plan.perturbation = self.pick_perturbation(room_ids, tick);
        } else if conflicts > self.conflict_band_max {
            plan.calming = true;
        }
        if cooperation < self.cooperation_min {
            plan.cooperation_hint = true;
        }
        plan
    }

    fn pick_perturbation(&self, room_ids: &[String], tick: u64) -> Option<Perturbation> {
        if room_ids.is_empty() {
            return None;
        }
        let stream = mix_seed(self.seed, tick);
        let room_index = (stream % room_ids.len() as u64) as usize;
        let (field, amount) = if mix_seed(stream, 1) % 2 == 0 {
            (
                PerturbationField::Temperature,
                sample_range_f64(stream, 2, -3.0, 3.0),
            )
        } else {
            (
                PerturbationField::Light,
                sample_range_f64(stream, 3, -0.4, 0.4),
            )
        };
        Some(Perturbation {
            room_id: room_ids[room_index].clone(),
            field,
            amount,
        })
    }
}
