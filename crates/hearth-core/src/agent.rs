//! Runtime state for one device agent.

use std::collections::BTreeMap;

use contracts::{AgentSnapshot, AgentStatus, CapabilitySpec};
use serde_json::Value;

/// Memory key holding the room temperature observed at the agent's most
/// recent adopted inference. Admission uses it to detect material drift.
pub const MEM_LAST_INFERRED_TEMP: &str = "last_inferred_temp_c";
pub const MEM_FIRMNESS: &str = "firmness";
pub const MEM_SIZE: &str = "size";

#[derive(Debug, Clone)]
pub struct AgentRuntime {
    pub agent_id: String,
    pub room_id: String,
    pub status: AgentStatus,
    pub capabilities: CapabilitySpec,
    /// Private memory blob: last-known preferences and planning residue.
    /// Never exposed to sibling agents.
    pub memory: BTreeMap<String, Value>,
    /// Round-robin planning phase in `[0, planning_phases)`.
    pub planning_phase: Option<u8>,
}

impl AgentRuntime {
    pub fn new(
        agent_id: impl Into<String>,
        room_id: impl Into<String>,
        capabilities: CapabilitySpec,
        planning_phase: Option<u8>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            room_id: room_id.into(),
            status: AgentStatus::Idle,
            capabilities,
            memory: BTreeMap::new(),
            planning_phase,
        }
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            agent_id: self.agent_id.clone(),
            room_id: self.room_id.clone(),
            status: self.status,
            capabilities: self.capabilities.clone(),
            planning_phase: self.planning_phase,
        }
    }

    pub fn last_inferred_temp(&self) -> Option<f64> {
        self.memory.get(MEM_LAST_INFERRED_TEMP).and_then(Value::as_f64)
    }

    pub fn note_inferred_temp(&mut self, temperature_c: f64) {
        if let Some(value) = serde_json::Number::from_f64(temperature_c) {
            self.memory
                .insert(MEM_LAST_INFERRED_TEMP.to_string(), Value::Number(value));
        }
    }

    pub fn preference_number(&self, key: &str) -> Option<f64> {
        self.memory.get(key).and_then(Value::as_f64)
    }

    pub fn set_preference(&mut self, key: &str, value: Value) {
        self.memory.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_omits_private_memory() {
        let mut agent = AgentRuntime::new("ac_1", "bedroom", CapabilitySpec::default(), Some(2));
        agent.note_inferred_temp(23.5);
        let snapshot = agent.snapshot();
        assert_eq!(snapshot.agent_id, "ac_1");
        assert_eq!(snapshot.planning_phase, Some(2));
        let raw = serde_json::to_string(&snapshot).expect("serialize");
        assert!(!raw.contains(MEM_LAST_INFERRED_TEMP));
    }

    #[test]
    fn inferred_temp_round_trips_through_memory() {
        let mut agent = AgentRuntime::new("t_1", "kitchen", CapabilitySpec::default(), None);
        assert_eq!(agent.last_inferred_temp(), None);
        agent.note_inferred_temp(21.25);
        assert_eq!(agent.last_inferred_temp(), Some(21.25));
    }
}
