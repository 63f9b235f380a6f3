//! v1 cross-boundary contracts for the Hearth kernel, API, and CLI.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod planning;
pub mod scheduler;

pub const SCHEMA_VERSION_V1: &str = "1.0";
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Run configuration and status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimConfig {
    pub schema_version: String,
    pub run_id: String,
    pub seed: u64,
    pub max_ticks: u64,
    /// Simulated seconds that elapse per tick.
    pub tick_interval_secs: u64,
    /// Hard ceiling on inference calls dispatched within one tick.
    pub inference_call_cap: u32,
    /// Wall-clock window after which a partial batch is flushed anyway.
    pub flush_window_ms: u64,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    /// Forced fresh-inference cadence ("deep think").
    pub deep_think_interval: u64,
    /// Round-robin planning phase modulus.
    pub planning_phases: u8,
    /// Room temperature drift (degrees) that counts as a material change.
    pub temp_drift_threshold: f64,
    pub director_interval: u64,
    pub director_window_secs: u64,
    pub conflict_band_min: usize,
    pub conflict_band_max: usize,
    pub cooperation_min: usize,
    pub event_log_max: usize,
    pub event_log_retain: usize,
    pub policy: PolicyConfig,
    pub notes: Option<String>,
}

impl SimConfig {
    /// Simulated world time, in seconds, at the given tick.
    pub fn world_secs(&self, tick: u64) -> u64 {
        tick.saturating_mul(self.tick_interval_secs)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: "run_local_001".to_string(),
            seed: 1337,
            max_ticks: 720,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            inference_call_cap: 2,
            flush_window_ms: 1_000,
            cache_ttl_secs: 300,
            cache_max_entries: 256,
            deep_think_interval: 6,
            planning_phases: 4,
            temp_drift_threshold: 1.0,
            director_interval: 8,
            director_window_secs: 300,
            conflict_band_min: 1,
            conflict_band_max: 3,
            cooperation_min: 2,
            event_log_max: 200,
            event_log_retain: 100,
            policy: PolicyConfig::default(),
            notes: None,
        }
    }
}

/// Shared household policy handed to every planning context. The ordered
/// priority list is part of the cache fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyConfig {
    pub priorities: Vec<String>,
    pub comfort_min_c: f64,
    pub comfort_max_c: f64,
    /// Quiet hours as [start, end) in whole hours of the simulated day.
    pub quiet_hours_start: u8,
    pub quiet_hours_end: u8,
    pub quiet_light_ceiling: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            priorities: vec![
                "safety".to_string(),
                "comfort".to_string(),
                "energy".to_string(),
            ],
            comfort_min_c: 19.0,
            comfort_max_c: 26.0,
            quiet_hours_start: 22,
            quiet_hours_end: 7,
            quiet_light_ceiling: 0.2,
        }
    }
}

impl PolicyConfig {
    pub fn in_quiet_hours(&self, hour_of_day: u8) -> bool {
        if self.quiet_hours_start <= self.quiet_hours_end {
            (self.quiet_hours_start..self.quiet_hours_end).contains(&hour_of_day)
        } else {
            hour_of_day >= self.quiet_hours_start || hour_of_day < self.quiet_hours_end
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Running,
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunStatus {
    pub schema_version: String,
    pub run_id: String,
    pub current_tick: u64,
    pub max_ticks: u64,
    pub mode: RunMode,
    /// Planning requests still queued inside the current scheduling window.
    pub pending_requests: usize,
}

impl RunStatus {
    pub fn is_complete(&self) -> bool {
        self.current_tick >= self.max_ticks
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={} tick={}/{} mode={:?} pending={}",
            self.run_id, self.current_tick, self.max_ticks, self.mode, self.pending_requests
        )
    }
}

// ---------------------------------------------------------------------------
// Rooms and agents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomState {
    pub temperature_c: f64,
    pub light: f64,
    pub noise: f64,
    pub humidity: f64,
}

impl Default for RoomState {
    fn default() -> Self {
        Self {
            temperature_c: 21.0,
            light: 0.5,
            noise: 0.2,
            humidity: 0.45,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Acting,
    Conflict,
}

/// What a device agent can do and what it cares about.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CapabilitySpec {
    pub actions: Vec<String>,
    pub goal_weights: BTreeMap<String, f64>,
}

impl CapabilitySpec {
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.iter().any(|action| action == name)
    }
}

/// Public projection of one agent for API consumers. Private memory is
/// deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub room_id: String,
    pub status: AgentStatus,
    pub capabilities: CapabilitySpec,
    pub planning_phase: Option<u8>,
}

// ---------------------------------------------------------------------------
// Plans and actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundMessage {
    pub to: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposedAction {
    pub name: String,
    #[serde(default)]
    pub args: BTreeMap<String, Value>,
}

/// The unit of planner output. Plans are proposals; they become effective
/// only after mediation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentPlan {
    #[serde(default)]
    pub actions: Vec<ProposedAction>,
    #[serde(default)]
    pub messages: Vec<OutboundMessage>,
    #[serde(default)]
    pub rationale: String,
}

impl AgentPlan {
    pub fn empty(rationale: impl Into<String>) -> Self {
        Self {
            actions: Vec::new(),
            messages: Vec::new(),
            rationale: rationale.into(),
        }
    }
}

/// How far a thermal action wants to move the room: either an explicit
/// per-call delta or an absolute set-point the applier resolves against the
/// current temperature. Exactly one form per action; no mixed arithmetic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ThermalChange {
    Delta(f64),
    Target(f64),
}

/// Closed set of effective action kinds. Proposed actions are parsed into
/// this enum before application, so an unknown kind is rejected up front
/// instead of silently no-opping at apply time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Action {
    Heat { change: ThermalChange },
    Cool { change: ThermalChange },
    SetBrightness { target: f64 },
    SetFirmness { level: String },
    SetSize { target: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionParseError {
    UnknownKind(String),
    MissingArg { action: String, arg: &'static str },
}

impl fmt::Display for ActionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKind(name) => write!(f, "unknown action kind: {name}"),
            Self::MissingArg { action, arg } => {
                write!(f, "action {action} missing argument {arg}")
            }
        }
    }
}

impl std::error::Error for ActionParseError {}

fn number_arg(proposed: &ProposedAction, key: &str) -> Option<f64> {
    proposed.args.get(key).and_then(Value::as_f64)
}

fn thermal_change(proposed: &ProposedAction) -> Result<ThermalChange, ActionParseError> {
    if let Some(delta) = number_arg(proposed, "delta_c").filter(|delta| *delta != 0.0) {
        return Ok(ThermalChange::Delta(delta.abs()));
    }
    if let Some(target) = number_arg(proposed, "target") {
        return Ok(ThermalChange::Target(target));
    }
    Err(ActionParseError::MissingArg {
        action: proposed.name.clone(),
        arg: "delta_c",
    })
}

impl TryFrom<&ProposedAction> for Action {
    type Error = ActionParseError;

    /// An explicit non-zero `delta_c` wins over `target`; an action carrying
    /// neither is rejected here rather than guessed at.
    fn try_from(proposed: &ProposedAction) -> Result<Self, Self::Error> {
        match proposed.name.as_str() {
            "heat" => thermal_change(proposed).map(|change| Action::Heat { change }),
            "cool" => thermal_change(proposed).map(|change| Action::Cool { change }),
            "set_brightness" => number_arg(proposed, "target")
                .or_else(|| number_arg(proposed, "level"))
                .map(|target| Action::SetBrightness { target })
                .ok_or(ActionParseError::MissingArg {
                    action: proposed.name.clone(),
                    arg: "target",
                }),
            "set_firmness" => proposed
                .args
                .get("level")
                .and_then(Value::as_str)
                .map(|level| Action::SetFirmness {
                    level: level.to_string(),
                })
                .ok_or(ActionParseError::MissingArg {
                    action: proposed.name.clone(),
                    arg: "level",
                }),
            "set_size" => number_arg(proposed, "target")
                .map(|target| Action::SetSize { target })
                .ok_or(ActionParseError::MissingArg {
                    action: proposed.name.clone(),
                    arg: "target",
                }),
            other => Err(ActionParseError::UnknownKind(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Mediation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictPair {
    pub winner: String,
    pub loser: String,
}

/// Log entry produced by a collaborator before the orchestrator stamps it
/// with tick/time/sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventDraft {
    pub kind: EventKind,
    pub room_id: String,
    pub device_id: Option<String>,
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediationOutcome {
    pub actions: Vec<(String, Action)>,
    pub conflicts: Vec<ConflictPair>,
    pub logs: Vec<EventDraft>,
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PerformanceStats,
    AgentLoopError,
    InferenceWarning,
    DirectorEvent,
    Perturbation,
    CooperationOpportunity,
    ConflictDetected,
    CooperationObserved,
    ActionApplied,
    AgentMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub schema_version: String,
    pub run_id: String,
    pub tick: u64,
    pub sequence_in_tick: u64,
    pub event_id: String,
    /// Simulated time of emission, in seconds since run start.
    pub at_secs: u64,
    pub kind: EventKind,
    pub room_id: String,
    pub device_id: Option<String>,
    pub data: Option<Value>,
}

// ---------------------------------------------------------------------------
// API error envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    RunNotFound,
    InvalidQuery,
    InvalidCommand,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiError {
    pub schema_version: String,
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            code,
            message: message.into(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sim_config_round_trips() {
        let config = SimConfig::default();
        let raw = serde_json::to_string(&config).expect("serialize");
        let decoded: SimConfig = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(config, decoded);
    }

    #[test]
    fn quiet_hours_wrap_midnight() {
        let policy = PolicyConfig::default();
        assert!(policy.in_quiet_hours(23));
        assert!(policy.in_quiet_hours(3));
        assert!(!policy.in_quiet_hours(12));
    }

    #[test]
    fn heat_action_prefers_explicit_delta() {
        let proposed = ProposedAction {
            name: "heat".to_string(),
            args: BTreeMap::from([
                ("delta_c".to_string(), json!(0.7)),
                ("target".to_string(), json!(25.0)),
            ]),
        };
        assert_eq!(
            Action::try_from(&proposed),
            Ok(Action::Heat {
                change: ThermalChange::Delta(0.7)
            })
        );
    }

    #[test]
    fn thermal_action_falls_back_to_target() {
        let proposed = ProposedAction {
            name: "cool".to_string(),
            args: BTreeMap::from([("target".to_string(), json!(20.0))]),
        };
        assert_eq!(
            Action::try_from(&proposed),
            Ok(Action::Cool {
                change: ThermalChange::Target(20.0)
            })
        );
    }

    #[test]
    fn thermal_action_without_delta_or_target_is_rejected() {
        let proposed = ProposedAction {
            name: "cool".to_string(),
            args: BTreeMap::new(),
        };
        assert!(Action::try_from(&proposed).is_err());
    }

    #[test]
    fn unknown_action_kind_is_rejected() {
        let proposed = ProposedAction {
            name: "launch_fireworks".to_string(),
            args: BTreeMap::new(),
        };
        assert_eq!(
            Action::try_from(&proposed),
            Err(ActionParseError::UnknownKind("launch_fireworks".to_string()))
        );
    }

    #[test]
    fn event_kind_serializes_snake_case() {
        let raw = serde_json::to_string(&EventKind::PerformanceStats).expect("serialize");
        assert_eq!(raw, "\"performance_stats\"");
    }
}
