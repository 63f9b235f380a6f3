#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CreateRunRequest {
    Config(SimConfig),
    WithOptions(CreateRunOptions),
}

#[derive(Debug, Deserialize)]
struct CreateRunOptions {
    config: SimConfig,
    auto_start: Option<bool>,
}

#[derive(Debug, Serialize)]
struct CreateRunResponse {
    schema_version: String,
    run_id: String,
    status: RunStatus,
    replaced_existing_run: bool,
    started: bool,
}

async fn create_run(
    State(state): State<AppState>,
    Json(request): Json<CreateRunRequest>,
) -> Result<Json<CreateRunResponse>, HttpApiError> {
    let (config, auto_start) = match request {
        CreateRunRequest::Config(config) => (config, false),
        CreateRunRequest::WithOptions(options) => {
            (options.config, options.auto_start.unwrap_or(false))
        }
    };

    let mut inner = state.inner.lock().await;
    let replaced_existing_run = inner.engine.is_some();

    let mut engine = EngineApi::from_config(config)
        .map_err(|err| HttpApiError::internal("engine setup failed", Some(err.to_string())))?;
    if auto_start {
        engine.start();
    }

    let status = engine.status().clone();
    let run_id = status.run_id.clone();
    inner.engine = Some(engine);

    Ok(Json(CreateRunResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        run_id,
        status,
        replaced_existing_run,
        started: auto_start,
    }))
}

#[derive(Debug, Serialize)]
struct ModeChangeResponse {
    schema_version: String,
    run_id: String,
    status: RunStatus,
}

async fn start_run(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ModeChangeResponse>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let engine = require_run_mut(&mut inner, &run_id)?;
    let status = engine.start();
    Ok(Json(ModeChangeResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        run_id,
        status,
    }))
}

async fn pause_run(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ModeChangeResponse>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let engine = require_run_mut(&mut inner, &run_id)?;
    let status = engine.pause();
    Ok(Json(ModeChangeResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        run_id,
        status,
    }))
}

#[derive(Debug, Deserialize, Default)]
struct StepRequest {
    ticks: Option<u64>,
}

#[derive(Debug, Serialize)]
struct StepResponse {
    schema_version: String,
    run_id: String,
    ticks_requested: u64,
    ticks_executed: u64,
    status: RunStatus,
}

async fn step_run(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
    request: Option<Json<StepRequest>>,
) -> Result<Json<StepResponse>, HttpApiError> {
    let ticks = request
        .map(|Json(body)| body.ticks.unwrap_or(1))
        .unwrap_or(1);
    if ticks == 0 {
        return Err(HttpApiError::invalid_command(
            "ticks must be at least 1",
            None,
        ));
    }

    let mut inner = state.inner.lock().await;
    let engine = require_run_mut(&mut inner, &run_id)?;
    let (status, executed) = engine.step(ticks).await;
    Ok(Json(StepResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        run_id,
        ticks_requested: ticks,
        ticks_executed: executed,
        status,
    }))
}

#[derive(Debug, Deserialize)]
struct RunToTickRequest {
    target_tick: u64,
}

async fn run_to_tick(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<RunToTickRequest>,
) -> Result<Json<StepResponse>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let engine = require_run_mut(&mut inner, &run_id)?;
    let current = engine.status().current_tick;
    if request.target_tick < current {
        return Err(HttpApiError::invalid_command(
            "target_tick is behind the current tick",
            Some(format!(
                "target_tick={} current_tick={current}",
                request.target_tick
            )),
        ));
    }

    let requested = request.target_tick - current;
    let (status, executed) = engine.run_to_tick(request.target_tick).await;
    Ok(Json(StepResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        run_id,
        ticks_requested: requested,
        ticks_executed: executed,
        status,
    }))
}
