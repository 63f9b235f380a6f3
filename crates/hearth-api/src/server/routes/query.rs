#[derive(Debug, Serialize)]
struct StatusResponse {
    schema_version: String,
    status: RunStatus,
    harmony: f64,
    cache_hit_rate: f64,
    last_step_metrics: Option<hearth_core::world::StepMetrics>,
}

async fn get_status(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, HttpApiError> {
    let inner = state.inner.lock().await;
    let engine = require_run(&inner, &run_id)?;
    Ok(Json(StatusResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        status: engine.status().clone(),
        harmony: engine.harmony(),
        cache_hit_rate: engine.cache_hit_rate(),
        last_step_metrics: engine.last_step_metrics().cloned(),
    }))
}

#[derive(Debug, Deserialize, Default)]
struct TimelineQuery {
    from_tick: Option<u64>,
    to_tick: Option<u64>,
    #[serde(default)]
    kinds: Vec<String>,
    #[serde(rename = "kinds[]", default)]
    kinds_bracket: Vec<String>,
    room_id: Option<String>,
    device_id: Option<String>,
    cursor: Option<usize>,
    page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
struct TimelinePage {
    schema_version: String,
    run_id: String,
    cursor: usize,
    next_cursor: Option<usize>,
    total: usize,
    events: Vec<Event>,
}

async fn get_timeline(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<TimelinePage>, HttpApiError> {
    let inner = state.inner.lock().await;
    let engine = require_run(&inner, &run_id)?;

    let from_tick = query.from_tick.unwrap_or(0);
    let to_tick = query.to_tick.unwrap_or(engine.status().current_tick);
    if to_tick < from_tick {
        return Err(HttpApiError::invalid_query(
            "to_tick must be >= from_tick",
            Some(format!("from_tick={from_tick} to_tick={to_tick}")),
        ));
    }

    let mut requested_kinds = query.kinds;
    requested_kinds.extend(query.kinds_bracket);
    let kind_filter = parse_event_kind_filter(&requested_kinds)?;

    let filtered: Vec<&Event> = engine
        .events()
        .iter()
        .filter(|event| event.tick >= from_tick && event.tick <= to_tick)
        .filter(|event| {
            kind_filter
                .as_ref()
                .map(|filter| filter.contains(&event.kind))
                .unwrap_or(true)
        })
        .filter(|event| {
            query
                .room_id
                .as_ref()
                .map(|room_id| &event.room_id == room_id)
                .unwrap_or(true)
        })
        .filter(|event| {
            query
                .device_id
                .as_ref()
                .map(|device_id| event.device_id.as_ref() == Some(device_id))
                .unwrap_or(true)
        })
        .collect();

    let (start, end, next_cursor) = paginate(filtered.len(), query.cursor, query.page_size)?;
    let events = filtered[start..end].iter().map(|event| (*event).clone()).collect();

    Ok(Json(TimelinePage {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        run_id,
        cursor: start,
        next_cursor,
        total: filtered.len(),
        events,
    }))
}

#[derive(Debug, Serialize)]
struct RoomsResponse {
    schema_version: String,
    run_id: String,
    tick: u64,
    rooms: std::collections::BTreeMap<String, RoomState>,
    harmony: f64,
    resource_usage: hearth_core::world::ResourceUsage,
}

async fn get_rooms(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RoomsResponse>, HttpApiError> {
    let inner = state.inner.lock().await;
    let engine = require_run(&inner, &run_id)?;
    Ok(Json(RoomsResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        run_id,
        tick: engine.status().current_tick,
        rooms: engine.rooms(),
        harmony: engine.harmony(),
        resource_usage: engine.resource_usage(),
    }))
}

#[derive(Debug, Serialize)]
struct AgentsResponse {
    schema_version: String,
    run_id: String,
    tick: u64,
    agents: Vec<AgentSnapshot>,
}

async fn get_agents(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AgentsResponse>, HttpApiError> {
    let inner = state.inner.lock().await;
    let engine = require_run(&inner, &run_id)?;
    Ok(Json(AgentsResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        run_id,
        tick: engine.status().current_tick,
        agents: engine.agents(),
    }))
}
