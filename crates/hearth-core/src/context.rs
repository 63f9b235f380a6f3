//! Planning context assembly: the immutable per-agent view of the world
//! handed to admission, the cache fingerprint, the scheduler, and both
//! planners.

use std::fmt;

use contracts::{AgentStatus, CapabilitySpec, EventKind, PolicyConfig, RoomState};
use serde::Serialize;
use serde_json::Value;

use crate::world::WorldState;

/// How many inbound messages a context retains (most recent last).
pub const INBOUND_MESSAGE_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundMessage {
    pub from: String,
    pub content: String,
    pub at_secs: u64,
}

/// Sibling agents are summarized to (id, room, status) only; private memory
/// never crosses agent boundaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiblingSummary {
    pub agent_id: String,
    pub room_id: String,
    pub status: AgentStatus,
}

/// Read-only view built once per agent per planning attempt. Never mutated
/// after construction; the cache fingerprint is derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanningContext {
    pub agent_id: String,
    pub tick: u64,
    pub world_secs: u64,
    pub status: AgentStatus,
    pub capabilities: CapabilitySpec,
    pub room_id: String,
    pub room: RoomState,
    pub inbound: Vec<InboundMessage>,
    pub siblings: Vec<SiblingSummary>,
    pub policy: PolicyConfig,
}

impl PlanningContext {
    pub fn hour_of_day(&self) -> u8 {
        ((self.world_secs / 3_600) % 24) as u8
    }

    pub fn last_message(&self) -> Option<&InboundMessage> {
        self.inbound.last()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    UnknownAgent(String),
    UnknownRoom { agent_id: String, room_id: String },
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAgent(agent_id) => write!(f, "unknown agent: {agent_id}"),
            Self::UnknownRoom { agent_id, room_id } => {
                write!(f, "agent {agent_id} references unknown room {room_id}")
            }
        }
    }
}

impl std::error::Error for ContextError {}

/// Pure snapshot: no I/O, no mutation. Fails only on missing lookups, which
/// the orchestrator treats as "skip this agent this tick".
pub fn build_context(agent_id: &str, world: &WorldState) -> Result<PlanningContext, ContextError> {
    let agent = world
        .agents
        .get(agent_id)
        .ok_or_else(|| ContextError::UnknownAgent(agent_id.to_string()))?;
    let room = world
        .rooms
        .get(&agent.room_id)
        .ok_or_else(|| ContextError::UnknownRoom {
            agent_id: agent_id.to_string(),
            room_id: agent.room_id.clone(),
        })?;

    let mut inbound = world
        .event_log
        .iter()
        .rev()
        .filter(|event| event.kind == EventKind::AgentMessage)
        .filter_map(|event| {
            let data = event.data.as_ref()?;
            let to = data.get("to").and_then(Value::as_str)?;
            if to != agent_id && to != "*" {
                return None;
            }
            Some(InboundMessage {
                from: data
                    .get("from")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                content: data
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                at_secs: event.at_secs,
            })
        })
        .take(INBOUND_MESSAGE_LIMIT)
        .collect::<Vec<_>>();
    inbound.reverse();

    let siblings = world
        .agents
        .values()
        .filter(|sibling| sibling.agent_id != agent_id)
        .map(|sibling| SiblingSummary {
            agent_id: sibling.agent_id.clone(),
            room_id: sibling.room_id.clone(),
            status: sibling.status,
        })
        .collect::<Vec<_>>();

    Ok(PlanningContext {
        agent_id: agent_id.to_string(),
        tick: world.status.current_tick,
        world_secs: world.config.world_secs(world.status.current_tick),
        status: agent.status,
        capabilities: agent.capabilities.clone(),
        room_id: agent.room_id.clone(),
        room: room.clone(),
        inbound,
        siblings,
        policy: world.config.policy.clone(),
    })
}
