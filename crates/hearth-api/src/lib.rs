//! In-process API facade over the simulation engine, plus the HTTP control
//! surface.

mod server;

use std::fmt;

use contracts::{AgentSnapshot, Event, RoomState, RunStatus, SimConfig};
use hearth_core::inference::{HttpBackend, InferenceBackend, InferenceError};
use hearth_core::mediator::{Mediator, PassThroughMediator};
use hearth_core::world::{ResourceUsage, SimWorld, StepMetrics};
use std::collections::BTreeMap;

pub use server::{serve, ServerError};

#[derive(Debug)]
pub enum EngineSetupError {
    Inference(InferenceError),
}

impl fmt::Display for EngineSetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inference(err) => write!(f, "inference backend setup failed: {err}"),
        }
    }
}

impl std::error::Error for EngineSetupError {}

impl From<InferenceError> for EngineSetupError {
    fn from(value: InferenceError) -> Self {
        Self::Inference(value)
    }
}

/// One engine per process; the HTTP layer serializes access behind a mutex.
pub struct EngineApi {
    engine: SimWorld,
}

impl fmt::Debug for EngineApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineApi").finish_non_exhaustive()
    }
}

impl EngineApi {
    /// Production wiring: HTTP inference backend from the environment and
    /// the pass-through mediator.
    pub fn from_config(config: SimConfig) -> Result<Self, EngineSetupError> {
        let backend = HttpBackend::from_env()?;
        Ok(Self::with_collaborators(
            config,
            Box::new(backend),
            Box::new(PassThroughMediator),
        ))
    }

    pub fn with_collaborators(
        config: SimConfig,
        backend: Box<dyn InferenceBackend>,
        mediator: Box<dyn Mediator>,
    ) -> Self {
        Self {
            engine: SimWorld::new(config, backend, mediator),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.engine.status().run_id
    }

    pub fn config(&self) -> &SimConfig {
        &self.engine.state().config
    }

    pub fn status(&self) -> &RunStatus {
        self.engine.status()
    }

    pub fn start(&mut self) -> RunStatus {
        self.engine.start();
        self.engine.status().clone()
    }

    pub fn pause(&mut self) -> RunStatus {
        self.engine.pause();
        self.engine.status().clone()
    }

    /// Executes up to `ticks` ticks and reports how many actually ran.
    pub async fn step(&mut self, ticks: u64) -> (RunStatus, u64) {
        let executed = self.engine.step_n(ticks).await;
        (self.engine.status().clone(), executed)
    }

    pub async fn run_to_tick(&mut self, target: u64) -> (RunStatus, u64) {
        let before = self.engine.status().current_tick;
        self.engine.run_to_tick(target).await;
        let status = self.engine.status().clone();
        let executed = status.current_tick.saturating_sub(before);
        (status, executed)
    }

    pub fn events(&self) -> &[Event] {
        &self.engine.state().event_log
    }

    pub fn rooms(&self) -> BTreeMap<String, RoomState> {
        self.engine.state().room_snapshots()
    }

    pub fn agents(&self) -> Vec<AgentSnapshot> {
        self.engine.state().agent_snapshots()
    }

    pub fn harmony(&self) -> f64 {
        self.engine.state().harmony
    }

    pub fn resource_usage(&self) -> ResourceUsage {
        self.engine.state().resource_usage
    }

    pub fn last_step_metrics(&self) -> Option<&StepMetrics> {
        self.engine.last_step_metrics()
    }

    pub fn cache_hit_rate(&self) -> f64 {
        self.engine.cache_hit_rate()
    }
}
