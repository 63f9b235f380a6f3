//! Planning-focused contract re-exports.

pub use crate::{
    AgentPlan, AgentSnapshot, CapabilitySpec, OutboundMessage, PolicyConfig, ProposedAction,
};
