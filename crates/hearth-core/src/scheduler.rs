//! Budgeted batch scheduler for inference calls. Owns the response cache,
//! the tick-local pending queue, and the per-tick dispatch counter. Built
//! explicitly and injected into the orchestrator; there is no global
//! instance.

use std::time::{Duration, Instant};

use contracts::{AgentPlan, SimConfig};
use futures::future::join_all;
use serde::Serialize;

use crate::admission::mentions_conflict;
use crate::cache::{fingerprint, PlanCache};
use crate::context::PlanningContext;
use crate::heuristic::heuristic_plan;
use crate::inference::{render_prompt, InferenceBackend, InferenceRequest, SamplingOptions};

/// Window, in sim-seconds, within which an inbound message still counts as
/// recent for priority scoring.
const RECENT_MESSAGE_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackCause {
    OverBudget,
    Deferred,
    BackendError,
}

/// How one admitted request resolved. Every variant carries a complete plan;
/// the caller never has to re-plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Cached(AgentPlan),
    Inferred(AgentPlan),
    Heuristic(AgentPlan, FallbackCause),
}

impl PlanOutcome {
    pub fn plan(&self) -> &AgentPlan {
        match self {
            Self::Cached(plan) | Self::Inferred(plan) | Self::Heuristic(plan, _) => plan,
        }
    }

    pub fn into_plan(self) -> AgentPlan {
        match self {
            Self::Cached(plan) | Self::Inferred(plan) | Self::Heuristic(plan, _) => plan,
        }
    }
}

#[derive(Debug)]
struct PendingRequest {
    request_id: u64,
    context: PlanningContext,
    priority: u32,
}

/// Per-tick counters, reset by `begin_tick`, folded into the orchestrator's
/// `performance_stats` event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub cache_hits: u64,
    pub dispatched: u64,
    pub heuristic_fallbacks: u64,
    pub deferred: u64,
    pub backend_errors: u64,
}

pub struct BatchScheduler {
    backend: Box<dyn InferenceBackend>,
    cache: PlanCache,
    pending: Vec<PendingRequest>,
    dispatched_this_tick: u32,
    call_cap: u32,
    flush_window: Duration,
    last_flush: Instant,
    next_request_id: u64,
    stats: SchedulerStats,
}

impl BatchScheduler {
    pub fn new(backend: Box<dyn InferenceBackend>, config: &SimConfig) -> Self {
        Self {
            backend,
            cache: PlanCache::new(config.cache_ttl_secs, config.cache_max_entries),
            pending: Vec::new(),
            dispatched_this_tick: 0,
            call_cap: config.inference_call_cap,
            flush_window: Duration::from_millis(config.flush_window_ms),
            last_flush: Instant::now(),
            next_request_id: 0,
            stats: SchedulerStats::default(),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn cache_hit_rate(&self) -> f64 {
        self.cache.hit_rate()
    }

    pub fn tick_stats(&self) -> SchedulerStats {
        self.stats
    }

    fn remaining_budget(&self) -> usize {
        self.call_cap.saturating_sub(self.dispatched_this_tick) as usize
    }

    /// Resets the dispatch counter, drops any stale queue, and restarts the
    /// flush window.
    pub fn begin_tick(&mut self) {
        self.dispatched_this_tick = 0;
        self.pending.clear();
        self.last_flush = Instant::now();
        self.stats = SchedulerStats::default();
    }

    /// Conflict signal dominates, safety-adjacent goals outrank routine
    /// traffic, recent chatter breaks ties.
    pub fn priority(ctx: &PlanningContext) -> u32 {
        let mut score = 0u32;
        let conflict_signal = ctx.status == contracts::AgentStatus::Conflict
            || ctx
                .inbound
                .iter()
                .any(|message| mentions_conflict(&message.content));
        if conflict_signal {
            score += 100;
        }
        let safety_goals = ctx
            .capabilities
            .goal_weights
            .keys()
            .filter(|goal| goal.contains("safety") || goal.contains("temperature"))
            .count() as u32;
        score += 50 * safety_goals;
        let recent_messages = ctx
            .inbound
            .iter()
            .filter(|message| ctx.world_secs.saturating_sub(message.at_secs) <= RECENT_MESSAGE_SECS)
            .count() as u32;
        score + 10 * recent_messages
    }

    /// Resolves one admitted request. Never blocks on the flush window: a
    /// request that cannot ride the current batch gets its heuristic plan
    /// immediately and stays queued so `finish_tick` can still cache its
    /// inferred result for later ticks.
    pub async fn plan(&mut self, ctx: PlanningContext) -> PlanOutcome {
        let key = fingerprint(&ctx);
        if let Some(plan) = self.cache.get(key, ctx.world_secs) {
            self.stats.cache_hits += 1;
            return PlanOutcome::Cached(plan);
        }
        if self.remaining_budget() == 0 {
            self.stats.heuristic_fallbacks += 1;
            return PlanOutcome::Heuristic(heuristic_plan(&ctx), FallbackCause::OverBudget);
        }

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let priority = Self::priority(&ctx);
        let fallback = heuristic_plan(&ctx);
        self.pending.push(PendingRequest {
            request_id,
            context: ctx,
            priority,
        });

        let batch_ready = self.pending.len() >= self.remaining_budget()
            || self.last_flush.elapsed() >= self.flush_window;
        if batch_ready {
            let results = self.flush().await;
            if let Some((_, result)) = results.into_iter().find(|(id, _)| *id == request_id) {
                return match result {
                    Ok(plan) => PlanOutcome::Inferred(plan),
                    Err(_) => {
                        self.stats.heuristic_fallbacks += 1;
                        PlanOutcome::Heuristic(fallback, FallbackCause::BackendError)
                    }
                };
            }
            // Outprioritized inside a full batch: same deal as deferred.
        }
        self.stats.deferred += 1;
        self.stats.heuristic_fallbacks += 1;
        PlanOutcome::Heuristic(fallback, FallbackCause::Deferred)
    }

    /// Dispatches up to the remaining budget, highest priority first, all
    /// calls concurrently. Successes are cached under their own fingerprint.
    /// Requests that do not fit remain queued.
    async fn flush(&mut self) -> Vec<(u64, Result<AgentPlan, crate::inference::InferenceError>)> {
        self.last_flush = Instant::now();
        let budget = self.remaining_budget();
        if budget == 0 || self.pending.is_empty() {
            return Vec::new();
        }
        self.pending
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.request_id.cmp(&b.request_id)));
        let take = budget.min(self.pending.len());
        let batch: Vec<PendingRequest> = self.pending.drain(..take).collect();
        self.dispatched_this_tick += batch.len() as u32;
        self.stats.dispatched += batch.len() as u64;

        let backend = self.backend.as_ref();
        let model = backend.model().to_string();
        let calls = batch.iter().map(|request| {
            let (system, prompt) = render_prompt(&request.context);
            backend.complete(InferenceRequest {
                model: model.clone(),
                prompt,
                system,
                options: SamplingOptions::default(),
                stream: false,
            })
        });
        let raw_results = join_all(calls).await;

        let mut results = Vec::with_capacity(batch.len());
        for (request, raw) in batch.into_iter().zip(raw_results) {
            match raw {
                Ok(text) => {
                    let plan = crate::inference::parse_plan(&text);
                    self.cache.insert(
                        fingerprint(&request.context),
                        plan.clone(),
                        request.context.world_secs,
                    );
                    results.push((request.request_id, Ok(plan)));
                }
                Err(err) => {
                    self.stats.backend_errors += 1;
                    results.push((request.request_id, Err(err)));
                }
            }
        }
        results
    }

    /// End-of-tick drain: leftover queued requests are dispatched within the
    /// remaining budget purely to warm the cache. Their results are never
    /// substituted into the finished tick. Whatever still does not fit is
    /// dropped.
    pub async fn finish_tick(&mut self) {
        if !self.pending.is_empty() && self.remaining_budget() > 0 {
            let _ = self.flush().await;
        }
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::build_context;
    use crate::world::testutil::demo_world;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedBackend {
        calls: Arc<AtomicUsize>,
        response: Result<String, crate::inference::InferenceError>,
    }

    impl InferenceBackend for ScriptedBackend {
        fn complete(
            &self,
            _request: InferenceRequest,
        ) -> futures::future::BoxFuture<'_, Result<String, crate::inference::InferenceError>>
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = self.response.clone();
            Box::pin(async move { response })
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn scheduler_with(
        response: Result<String, crate::inference::InferenceError>,
        flush_window_ms: u64,
    ) -> (BatchScheduler, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = ScriptedBackend {
            calls: Arc::clone(&calls),
            response,
        };
        let config = SimConfig {
            flush_window_ms,
            ..SimConfig::default()
        };
        (BatchScheduler::new(Box::new(backend), &config), calls)
    }

    fn ok_response() -> Result<String, crate::inference::InferenceError> {
        Ok("{\"actions\": [], \"explain\": \"holding steady\"}".to_string())
    }

    #[tokio::test]
    async fn full_batch_dispatches_and_returns_inferred() {
        let (mut scheduler, calls) = scheduler_with(ok_response(), 60_000);
        scheduler.begin_tick();
        let world = demo_world();
        let a = build_context("thermostat_1", &world).unwrap();
        let b = build_context("lamp_1", &world).unwrap();

        let first = scheduler.plan(a).await;
        assert!(matches!(first, PlanOutcome::Heuristic(_, FallbackCause::Deferred)));
        assert_eq!(calls.load(Ordering::SeqCst), 0, "no dispatch before batch fills");

        let second = scheduler.plan(b).await;
        assert!(matches!(second, PlanOutcome::Inferred(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dispatch_never_exceeds_the_cap() {
        let (mut scheduler, calls) = scheduler_with(ok_response(), 0);
        scheduler.begin_tick();
        let mut world = demo_world();
        for index in 0..5 {
            // Distinct room temperatures force distinct fingerprints.
            world.rooms.get_mut("living_room").unwrap().temperature_c = 21.0 + index as f64;
            let ctx = build_context("thermostat_1", &world).unwrap();
            scheduler.plan(ctx).await;
        }
        scheduler.finish_tick().await;
        assert!(calls.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn over_budget_requests_fall_back_without_queueing() {
        let (mut scheduler, _) = scheduler_with(ok_response(), 0);
        scheduler.begin_tick();
        let mut world = demo_world();
        for index in 0..2 {
            world.rooms.get_mut("living_room").unwrap().temperature_c = 25.0 + index as f64;
            let ctx = build_context("thermostat_1", &world).unwrap();
            scheduler.plan(ctx).await;
        }
        world.rooms.get_mut("living_room").unwrap().temperature_c = 29.5;
        let ctx = build_context("thermostat_1", &world).unwrap();
        let outcome = scheduler.plan(ctx).await;
        assert!(matches!(
            outcome,
            PlanOutcome::Heuristic(_, FallbackCause::OverBudget)
        ));
        assert_eq!(scheduler.pending_len(), 0);
    }

    #[tokio::test]
    async fn backend_error_degrades_each_request_individually() {
        let (mut scheduler, _) = scheduler_with(
            Err(crate::inference::InferenceError::Status(500)),
            60_000,
        );
        scheduler.begin_tick();
        let world = demo_world();
        let a = build_context("thermostat_1", &world).unwrap();
        let b = build_context("lamp_1", &world).unwrap();
        scheduler.plan(a).await;
        let outcome = scheduler.plan(b).await;
        assert!(matches!(
            outcome,
            PlanOutcome::Heuristic(_, FallbackCause::BackendError)
        ));
        let plan = outcome.plan();
        assert!(plan.rationale.starts_with("heuristic:"));
        assert_eq!(scheduler.tick_stats().backend_errors, 2);
    }

    #[tokio::test]
    async fn cached_plan_short_circuits_without_dispatch() {
        let (mut scheduler, calls) = scheduler_with(ok_response(), 0);
        scheduler.begin_tick();
        let world = demo_world();
        let ctx = build_context("thermostat_1", &world).unwrap();
        let first = scheduler.plan(ctx.clone()).await;
        assert!(matches!(first, PlanOutcome::Inferred(_)));
        let before = calls.load(Ordering::SeqCst);

        scheduler.begin_tick();
        let second = scheduler.plan(ctx).await;
        assert!(matches!(second, PlanOutcome::Cached(_)));
        assert_eq!(calls.load(Ordering::SeqCst), before);
        assert!(scheduler.cache_hit_rate() > 0.0);
    }

    #[tokio::test]
    async fn deferred_result_is_cached_not_substituted() {
        let (mut scheduler, calls) = scheduler_with(ok_response(), 60_000);
        scheduler.begin_tick();
        let world = demo_world();
        let ctx = build_context("thermostat_1", &world).unwrap();

        let outcome = scheduler.plan(ctx.clone()).await;
        assert!(matches!(outcome, PlanOutcome::Heuristic(_, FallbackCause::Deferred)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        scheduler.finish_tick().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_len(), 0);

        scheduler.begin_tick();
        let next = scheduler.plan(ctx).await;
        assert!(matches!(next, PlanOutcome::Cached(_)));
    }

    #[test]
    fn priority_ranks_conflict_over_safety_goals_over_chatter() {
        let mut world = demo_world();
        world.append_message_event("lamp_1", "thermostat_1", "hello");
        let routine = build_context("lamp_1", &world).unwrap();
        let safety = build_context("thermostat_1", &world).unwrap();
        world.agents.get_mut("lamp_1").unwrap().status = contracts::AgentStatus::Conflict;
        let conflicted = build_context("lamp_1", &world).unwrap();

        let routine_score = BatchScheduler::priority(&routine);
        let safety_score = BatchScheduler::priority(&safety);
        let conflict_score = BatchScheduler::priority(&conflicted);
        assert!(conflict_score >= 100);
        assert!(safety_score >= 50);
        assert!(conflict_score > safety_score);
        assert!(safety_score > routine_score);
        assert!(routine_score < 50);
    }
}
