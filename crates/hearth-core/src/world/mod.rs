//! World state and the tick orchestrator. `WorldState` has exactly one
//! writer; collaborators (scheduler, director, mediator) return decisions
//! and the orchestrator applies them.

use std::collections::BTreeMap;
use std::fmt;

use contracts::{
    Event, EventKind, RoomState, RunMode, RunStatus, SimConfig, SCHEMA_VERSION_V1,
};
use serde::Serialize;
use serde_json::json;

use crate::admission::AdmissionPolicy;
use crate::agent::AgentRuntime;
use crate::director::Director;
use crate::inference::InferenceBackend;
use crate::mediator::Mediator;
use crate::scheduler::BatchScheduler;

mod apply;
mod events;
mod init;
mod step;
#[cfg(test)]
pub(crate) mod testutil;

pub use apply::{BRIGHTNESS_EASE, SIZE_RATE_LIMIT, TEMP_MAX_C, TEMP_MIN_C, TEMP_RATE_LIMIT_C};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub acting_agents: usize,
    /// Acting agents over total agents, in [0, 1].
    pub load: f64,
}

/// One tick's worth of observability, also emitted as the
/// `performance_stats` event.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StepMetrics {
    pub tick: u64,
    pub agents_planned: usize,
    pub agents_skipped: usize,
    pub cache_hits: u64,
    pub inference_dispatched: u64,
    pub heuristic_fallbacks: u64,
    pub deferred: u64,
    pub backend_errors: u64,
    pub conflicts: usize,
    pub cooperation: usize,
    pub harmony: f64,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickError {
    UnknownMediationAgent(String),
    UnknownMediationRoom { agent_id: String, room_id: String },
}

impl fmt::Display for TickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMediationAgent(agent_id) => {
                write!(f, "mediation verdict names unknown agent {agent_id}")
            }
            Self::UnknownMediationRoom { agent_id, room_id } => {
                write!(
                    f,
                    "mediation verdict for {agent_id} targets unknown room {room_id}"
                )
            }
        }
    }
}

impl std::error::Error for TickError {}

#[derive(Debug)]
pub struct WorldState {
    pub config: SimConfig,
    pub status: RunStatus,
    pub rooms: BTreeMap<String, RoomState>,
    pub agents: BTreeMap<String, AgentRuntime>,
    pub event_log: Vec<Event>,
    pub harmony: f64,
    pub resource_usage: ResourceUsage,
    pub(crate) sequence_in_tick: u64,
}

impl WorldState {
    /// Seeds the demo home for the given config. Deterministic per seed.
    pub fn new(config: SimConfig) -> Self {
        let (rooms, agents) = init::seed_home(&config);
        let status = RunStatus {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: config.run_id.clone(),
            current_tick: 0,
            max_ticks: config.max_ticks,
            mode: RunMode::Paused,
            pending_requests: 0,
        };
        Self {
            config,
            status,
            rooms,
            agents,
            event_log: Vec::new(),
            harmony: 0.5,
            resource_usage: ResourceUsage::default(),
            sequence_in_tick: 0,
        }
    }

    pub fn world_secs(&self) -> u64 {
        self.config.world_secs(self.status.current_tick)
    }

    pub fn room_snapshots(&self) -> BTreeMap<String, RoomState> {
        self.rooms.clone()
    }

    pub fn agent_snapshots(&self) -> Vec<contracts::AgentSnapshot> {
        self.agents.values().map(AgentRuntime::snapshot).collect()
    }
}

/// The simulation engine: world plus its injected collaborators. The
/// scheduler and mediator are constructor arguments so tests and the CLI
/// pick their own backends.
pub struct SimWorld {
    pub(crate) state: WorldState,
    pub(crate) admission: AdmissionPolicy,
    pub(crate) scheduler: BatchScheduler,
    pub(crate) director: Director,
    pub(crate) mediator: Box<dyn Mediator>,
    pub(crate) last_step_metrics: Option<StepMetrics>,
}

impl SimWorld {
    pub fn new(
        config: SimConfig,
        backend: Box<dyn InferenceBackend>,
        mediator: Box<dyn Mediator>,
    ) -> Self {
        let admission = AdmissionPolicy::new(
            config.deep_think_interval,
            config.temp_drift_threshold,
        );
        let scheduler = BatchScheduler::new(backend, &config);
        let director = Director::new(&config);
        Self {
            state: WorldState::new(config),
            admission,
            scheduler,
            director,
            mediator,
            last_step_metrics: None,
        }
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn status(&self) -> &RunStatus {
        &self.state.status
    }

    pub fn last_step_metrics(&self) -> Option<&StepMetrics> {
        self.last_step_metrics.as_ref()
    }

    pub fn cache_hit_rate(&self) -> f64 {
        self.scheduler.cache_hit_rate()
    }

    pub fn start(&mut self) {
        self.state.status.mode = RunMode::Running;
    }

    pub fn pause(&mut self) {
        self.state.status.mode = RunMode::Paused;
    }
}
