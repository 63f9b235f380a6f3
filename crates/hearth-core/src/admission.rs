//! Per-agent per-tick admission: decides whether an agent earns a fresh
//! inference attempt or plans heuristically at zero cost.

use contracts::AgentStatus;
use serde::Serialize;

use crate::agent::AgentRuntime;
use crate::context::PlanningContext;

/// Message substrings that signal contention and justify fresh planning.
pub const CONFLICT_KEYWORDS: [&str; 4] = ["conflict", "compete", "contention", "override"];

/// Phase modulus for the round-robin guarantee. Every agent with a planning
/// phase gets at least one admission per four ticks regardless of drift.
pub const ROUND_ROBIN_MODULUS: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionReason {
    ConflictStatus,
    TemperatureDrift,
    ConflictMessage,
    DeepThink,
    RoundRobin,
}

#[derive(Debug, Clone, Copy)]
pub struct AdmissionPolicy {
    pub deep_think_interval: u64,
    pub temp_drift_threshold: f64,
}

impl AdmissionPolicy {
    pub fn new(deep_think_interval: u64, temp_drift_threshold: f64) -> Self {
        Self {
            deep_think_interval,
            temp_drift_threshold,
        }
    }

    /// `Some(reason)` admits the agent to the scheduler; `None` sends it
    /// straight to the heuristic planner. Reasons are checked in priority
    /// order so event data names the strongest trigger.
    pub fn assess(
        &self,
        agent: &AgentRuntime,
        ctx: &PlanningContext,
        tick: u64,
    ) -> Option<AdmissionReason> {
        if ctx.status == AgentStatus::Conflict {
            return Some(AdmissionReason::ConflictStatus);
        }
        if let Some(last) = agent.last_inferred_temp() {
            if (ctx.room.temperature_c - last).abs() > self.temp_drift_threshold {
                return Some(AdmissionReason::TemperatureDrift);
            }
        }
        if ctx
            .inbound
            .iter()
            .any(|message| mentions_conflict(&message.content))
        {
            return Some(AdmissionReason::ConflictMessage);
        }
        if self.deep_think_interval > 0 && tick % self.deep_think_interval == 0 {
            return Some(AdmissionReason::DeepThink);
        }
        if let Some(phase) = agent.planning_phase {
            if tick % ROUND_ROBIN_MODULUS == u64::from(phase) % ROUND_ROBIN_MODULUS {
                return Some(AdmissionReason::RoundRobin);
            }
        }
        None
    }
}

pub fn mentions_conflict(content: &str) -> bool {
    let lowered = content.to_lowercase();
    CONFLICT_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::build_context;
    use crate::world::testutil::demo_world;

    fn policy() -> AdmissionPolicy {
        AdmissionPolicy::new(6, 1.0)
    }

    #[test]
    fn conflict_status_always_admits() {
        let mut world = demo_world();
        world.agents.get_mut("thermostat_1").unwrap().status = AgentStatus::Conflict;
        let ctx = build_context("thermostat_1", &world).unwrap();
        let agent = world.agents.get("thermostat_1").unwrap();
        // Tick 1 defeats deep-think and the thermostat's round-robin phase.
        assert_eq!(
            policy().assess(agent, &ctx, 1),
            Some(AdmissionReason::ConflictStatus)
        );
    }

    #[test]
    fn temperature_drift_beyond_threshold_admits() {
        let mut world = demo_world();
        world
            .agents
            .get_mut("thermostat_1")
            .unwrap()
            .note_inferred_temp(21.0);
        world.rooms.get_mut("living_room").unwrap().temperature_c = 22.5;
        let ctx = build_context("thermostat_1", &world).unwrap();
        let agent = world.agents.get("thermostat_1").unwrap();
        assert_eq!(
            policy().assess(agent, &ctx, 1),
            Some(AdmissionReason::TemperatureDrift)
        );
    }

    #[test]
    fn drift_exactly_at_threshold_does_not_admit() {
        let mut world = demo_world();
        world
            .agents
            .get_mut("thermostat_1")
            .unwrap()
            .note_inferred_temp(21.0);
        world.rooms.get_mut("living_room").unwrap().temperature_c = 22.0;
        let ctx = build_context("thermostat_1", &world).unwrap();
        let agent = world.agents.get("thermostat_1").unwrap();
        assert_ne!(
            policy().assess(agent, &ctx, 1),
            Some(AdmissionReason::TemperatureDrift)
        );
    }

    #[test]
    fn conflict_keyword_in_message_admits() {
        let mut world = demo_world();
        world.append_message_event("lamp_1", "thermostat_1", "we COMPETE for the vents");
        let ctx = build_context("thermostat_1", &world).unwrap();
        let agent = world.agents.get("thermostat_1").unwrap();
        assert_eq!(
            policy().assess(agent, &ctx, 1),
            Some(AdmissionReason::ConflictMessage)
        );
    }

    #[test]
    fn deep_think_interval_admits_everyone() {
        let world = demo_world();
        let ctx = build_context("thermostat_1", &world).unwrap();
        let agent = world.agents.get("thermostat_1").unwrap();
        assert_eq!(
            policy().assess(agent, &ctx, 12),
            Some(AdmissionReason::DeepThink)
        );
    }

    #[test]
    fn every_phased_agent_is_admitted_within_four_ticks() {
        let world = demo_world();
        for agent in world.agents.values() {
            if agent.planning_phase.is_none() {
                continue;
            }
            let ctx = build_context(&agent.agent_id, &world).unwrap();
            let admitted = (1..=4)
                .filter(|tick| tick % 6 != 0)
                .any(|tick| policy().assess(agent, &ctx, tick).is_some());
            assert!(admitted, "agent {} starved", agent.agent_id);
        }
    }

    #[test]
    fn quiet_tick_is_not_admitted() {
        let world = demo_world();
        let agent = world.agents.get("thermostat_1").unwrap();
        let ctx = build_context("thermostat_1", &world).unwrap();
        let phase = u64::from(agent.planning_phase.unwrap());
        let tick = (1..100)
            .find(|t| t % 6 != 0 && t % ROUND_ROBIN_MODULUS != phase % ROUND_ROBIN_MODULUS)
            .unwrap();
        assert_eq!(policy().assess(agent, &ctx, tick), None);
    }
}
