fn apply_cors_headers(headers: &mut axum::http::HeaderMap) {
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-max-age"),
        HeaderValue::from_static("3600"),
    );
}

fn paginate(
    total: usize,
    cursor: Option<usize>,
    page_size: Option<usize>,
) -> Result<(usize, usize, Option<usize>), HttpApiError> {
    let start = cursor.unwrap_or(0);
    if start > total {
        return Err(HttpApiError::invalid_query(
            "cursor is out of bounds",
            Some(format!("cursor={start} total={total}")),
        ));
    }

    let size = page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .max(1)
        .min(MAX_PAGE_SIZE);
    let end = start.saturating_add(size).min(total);
    let next_cursor = if end < total { Some(end) } else { None };

    Ok((start, end, next_cursor))
}

fn parse_event_kind_filter(
    requested_kinds: &[String],
) -> Result<Option<HashSet<EventKind>>, HttpApiError> {
    if requested_kinds.is_empty() {
        return Ok(None);
    }

    let mut filter = HashSet::new();

    for value in requested_kinds {
        let normalized = value.trim().to_lowercase();
        let kind = match normalized.as_str() {
            "performance_stats" | "performancestats" => EventKind::PerformanceStats,
            "agent_loop_error" | "agentlooperror" => EventKind::AgentLoopError,
            "inference_warning" | "inferencewarning" => EventKind::InferenceWarning,
            "director_event" | "directorevent" => EventKind::DirectorEvent,
            "perturbation" => EventKind::Perturbation,
            "cooperation_opportunity" | "cooperationopportunity" => {
                EventKind::CooperationOpportunity
            }
            "conflict_detected" | "conflictdetected" => EventKind::ConflictDetected,
            "cooperation_observed" | "cooperationobserved" => EventKind::CooperationObserved,
            "action_applied" | "actionapplied" => EventKind::ActionApplied,
            "agent_message" | "agentmessage" => EventKind::AgentMessage,
            other => {
                return Err(HttpApiError::invalid_query(
                    "unknown event kind in filter",
                    Some(format!("kind={other}")),
                ));
            }
        };
        filter.insert(kind);
    }

    Ok(Some(filter))
}
