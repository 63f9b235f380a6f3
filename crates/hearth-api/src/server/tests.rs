use super::*;
use futures::future::BoxFuture;
use hearth_core::inference::{InferenceBackend, InferenceError, InferenceRequest};
use hearth_core::mediator::PassThroughMediator;

struct OfflineBackend;

impl InferenceBackend for OfflineBackend {
    fn complete(&self, _request: InferenceRequest) -> BoxFuture<'_, Result<String, InferenceError>> {
        Box::pin(async { Err(InferenceError::Transport("offline".to_string())) })
    }

    fn model(&self) -> &str {
        "offline"
    }
}

fn offline_engine(config: SimConfig) -> EngineApi {
    EngineApi::with_collaborators(config, Box::new(OfflineBackend), Box::new(PassThroughMediator))
}

#[test]
fn pagination_enforces_max_bounds() {
    let (start, end, next_cursor) = paginate(100, Some(10), Some(20)).expect("page should work");
    assert_eq!(start, 10);
    assert_eq!(end, 30);
    assert_eq!(next_cursor, Some(30));

    let out_of_range = paginate(5, Some(10), Some(1));
    assert!(out_of_range.is_err());
}

#[test]
fn event_kind_filter_accepts_known_and_rejects_unknown_kinds() {
    let filter = parse_event_kind_filter(&[
        "perturbation".to_string(),
        "agent_message".to_string(),
    ])
    .expect("known kinds parse")
    .expect("non-empty filter");
    assert!(filter.contains(&EventKind::Perturbation));
    assert!(filter.contains(&EventKind::AgentMessage));

    assert!(parse_event_kind_filter(&["meteor_strike".to_string()]).is_err());
    assert!(parse_event_kind_filter(&[]).expect("empty is fine").is_none());
}

#[test]
fn require_run_rejects_mismatched_run_ids() {
    let mut inner = ServerInner::default();
    assert!(require_run(&inner, "run_x").is_err());

    inner.engine = Some(offline_engine(SimConfig::default()));
    assert!(require_run(&inner, "run_local_001").is_ok());
    let err = require_run(&inner, "run_other").unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
    assert_eq!(err.error.code, ErrorCode::RunNotFound);
}

#[tokio::test]
async fn facade_steps_and_reports_status_and_metrics() {
    let mut engine = offline_engine(SimConfig::default());
    let (status, executed) = engine.step(3).await;
    assert_eq!(executed, 3);
    assert_eq!(status.current_tick, 3);
    assert!(engine.last_step_metrics().is_some());
    assert!(!engine.events().is_empty());
    assert_eq!(engine.agents().len(), 4);
    assert_eq!(engine.rooms().len(), 3);
}

#[tokio::test]
async fn run_to_tick_reports_executed_delta() {
    let mut engine = offline_engine(SimConfig {
        max_ticks: 10,
        ..SimConfig::default()
    });
    let (status, executed) = engine.run_to_tick(4).await;
    assert_eq!(executed, 4);
    assert_eq!(status.current_tick, 4);

    // Target past max_ticks stops at the run boundary.
    let (status, executed) = engine.run_to_tick(99).await;
    assert_eq!(status.current_tick, 10);
    assert_eq!(executed, 6);
}
