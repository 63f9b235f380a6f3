//! Seeded demo home: three rooms, four device agents covering every action
//! kind, planning phases staggered so round-robin admission spreads load.

use contracts::CapabilitySpec;

use crate::sample_range_f64;

use super::*;

pub(crate) fn seed_home(
    config: &SimConfig,
) -> (BTreeMap<String, RoomState>, BTreeMap<String, AgentRuntime>) {
    let mut rooms = BTreeMap::new();
    for (index, room_id) in ["living_room", "bedroom", "kitchen"].iter().enumerate() {
        let jitter = sample_range_f64(config.seed, index as u64, -0.5, 0.5);
        rooms.insert(
            room_id.to_string(),
            RoomState {
                temperature_c: 21.0 + jitter,
                ..RoomState::default()
            },
        );
    }

    let mut agents = BTreeMap::new();
    let specs: [(&str, &str, &[&str], &[(&str, f64)]); 4] = [
        (
            "thermostat_1",
            "living_room",
            &["heat", "cool"],
            &[("temperature_stability", 1.0), ("comfort", 0.6)],
        ),
        (
            "lamp_1",
            "bedroom",
            &["set_brightness"],
            &[("comfort", 0.8), ("energy", 0.4)],
        ),
        (
            "vent_1",
            "kitchen",
            &["cool", "set_size"],
            &[("air_quality", 0.7)],
        ),
        (
            "bed_1",
            "bedroom",
            &["set_firmness", "set_size"],
            &[("comfort", 0.9)],
        ),
    ];
    for (phase, (agent_id, room_id, actions, goals)) in specs.into_iter().enumerate() {
        let capabilities = CapabilitySpec {
            actions: actions.iter().map(|a| a.to_string()).collect(),
            goal_weights: goals
                .iter()
                .map(|(goal, weight)| (goal.to_string(), *weight))
                .collect(),
        };
        agents.insert(
            agent_id.to_string(),
            AgentRuntime::new(agent_id, room_id, capabilities, Some(phase as u8)),
        );
    }
    (rooms, agents)
}
