//! Physical action application and the passive fallback physics. All rate
//! limits live here.

use contracts::{Action, ThermalChange};

use crate::agent::{MEM_FIRMNESS, MEM_SIZE};
use crate::sample_range_f64;

use super::*;

/// Degrees a thermal action may move a room in one tick.
pub const TEMP_RATE_LIMIT_C: f64 = 0.5;
pub const TEMP_MIN_C: f64 = 18.0;
pub const TEMP_MAX_C: f64 = 28.0;
/// Brightness moves 30% of the way to its target per tick.
pub const BRIGHTNESS_EASE: f64 = 0.3;
pub const SIZE_RATE_LIMIT: f64 = 10.0;
const DEFAULT_SIZE: f64 = 100.0;

const HUMIDITY_MIN: f64 = 0.3;
const HUMIDITY_MAX: f64 = 0.7;
const LIGHT_DECAY: f64 = 0.85;
const NOISE_DECAY: f64 = 0.8;

impl WorldState {
    /// Applies one mediated action for one agent, clamped to the physical
    /// rate limits, and records an `action_applied` event. The caller has
    /// already validated agent and room lookups.
    pub fn apply_action(&mut self, agent_id: &str, action: &Action) {
        let Some(room_id) = self.agents.get(agent_id).map(|a| a.room_id.clone()) else {
            return;
        };
        match action {
            Action::Heat { change } => {
                if let Some(room) = self.rooms.get_mut(&room_id) {
                    let wanted = resolve_thermal(*change, room.temperature_c, 1.0);
                    let step = wanted.clamp(0.0, TEMP_RATE_LIMIT_C);
                    room.temperature_c =
                        (room.temperature_c + step).clamp(TEMP_MIN_C, TEMP_MAX_C);
                }
            }
            Action::Cool { change } => {
                if let Some(room) = self.rooms.get_mut(&room_id) {
                    let wanted = resolve_thermal(*change, room.temperature_c, -1.0);
                    let step = wanted.clamp(0.0, TEMP_RATE_LIMIT_C);
                    room.temperature_c =
                        (room.temperature_c - step).clamp(TEMP_MIN_C, TEMP_MAX_C);
                }
            }
            Action::SetBrightness { target } => {
                if let Some(room) = self.rooms.get_mut(&room_id) {
                    let target = target.clamp(0.0, 1.0);
                    room.light =
                        (room.light + BRIGHTNESS_EASE * (target - room.light)).clamp(0.0, 1.0);
                }
            }
            Action::SetFirmness { level } => {
                if let Some(agent) = self.agents.get_mut(agent_id) {
                    agent.set_preference(MEM_FIRMNESS, serde_json::json!(level));
                }
            }
            Action::SetSize { target } => {
                if let Some(agent) = self.agents.get_mut(agent_id) {
                    let current = agent.preference_number(MEM_SIZE).unwrap_or(DEFAULT_SIZE);
                    let step = (target - current).clamp(-SIZE_RATE_LIMIT, SIZE_RATE_LIMIT);
                    agent.set_preference(MEM_SIZE, serde_json::json!(current + step));
                }
            }
        }
        let data = serde_json::to_value(action).ok();
        self.push_event(
            EventKind::ActionApplied,
            room_id,
            Some(agent_id.to_string()),
            data,
        );
    }

    /// Fallback physics for a tick whose pipeline failed: rooms ease toward
    /// the outside world instead of following agent intent. Deterministic
    /// per (seed, tick).
    pub fn apply_passive_drift(&mut self, tick: u64) {
        let outside = outside_temperature_c(self.world_secs());
        let seed = self.config.seed;
        for (index, room) in self.rooms.values_mut().enumerate() {
            room.temperature_c += 0.1 * (outside - room.temperature_c);
            room.light *= LIGHT_DECAY;
            room.noise *= NOISE_DECAY;
            let stream = tick.wrapping_mul(31).wrapping_add(index as u64);
            let walk = sample_range_f64(seed, stream, -0.02, 0.02);
            room.humidity = (room.humidity + walk).clamp(HUMIDITY_MIN, HUMIDITY_MAX);
        }
    }
}

fn resolve_thermal(change: ThermalChange, current_c: f64, direction: f64) -> f64 {
    match change {
        ThermalChange::Delta(delta) => delta.abs(),
        // A set-point below the current temperature asks a heater for
        // nothing, and symmetrically for coolers.
        ThermalChange::Target(target) => (direction * (target - current_c)).max(0.0),
    }
}

/// Diurnal outside curve: coldest near 04:00, warmest near 16:00.
fn outside_temperature_c(world_secs: u64) -> f64 {
    let hour = (world_secs as f64 / 3_600.0) % 24.0;
    let phase = (hour - 10.0) / 24.0 * std::f64::consts::TAU;
    16.0 + 6.0 * phase.sin()
}
