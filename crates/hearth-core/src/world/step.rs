//! The tick pipeline. Fixed intra-tick order: contexts, scheduling,
//! mediation, application, bookkeeping, director. Ticks never overlap and
//! always complete, degraded if need be.

use contracts::AgentPlan;

use crate::context::build_context;
use crate::director::PerturbationField;
use crate::heuristic::heuristic_plan;
use crate::scheduler::{FallbackCause, PlanOutcome};

use super::*;

const HARMONY_COOPERATION_GAIN: f64 = 0.05;
const HARMONY_CONFLICT_LOSS: f64 = 0.10;
const HARMONY_RECOVERY: f64 = 0.01;
const CALMING_EASE: f64 = 0.1;
const CALMING_TEMP_C: f64 = 22.0;
const CALMING_LIGHT: f64 = 0.5;

impl SimWorld {
    /// Executes one tick. Returns false once the run is complete.
    pub async fn step(&mut self) -> bool {
        if self.state.status.is_complete() {
            return false;
        }
        self.state.sequence_in_tick = 0;
        let tick = self.state.status.current_tick;

        match self.tick_pipeline(tick).await {
            Ok(metrics) => {
                self.last_step_metrics = Some(metrics);
            }
            Err(err) => {
                self.state.status.pending_requests = self.scheduler.pending_len();
                self.state.apply_passive_drift(tick);
                self.state.push_event(
                    EventKind::AgentLoopError,
                    "home",
                    None,
                    Some(json!({ "error": err.to_string() })),
                );
                self.last_step_metrics = Some(StepMetrics {
                    tick,
                    agents_planned: 0,
                    agents_skipped: 0,
                    cache_hits: 0,
                    inference_dispatched: 0,
                    heuristic_fallbacks: 0,
                    deferred: 0,
                    backend_errors: 0,
                    conflicts: 0,
                    cooperation: 0,
                    harmony: self.state.harmony,
                    degraded: true,
                });
            }
        }

        if self.director.is_due(tick) {
            self.run_director(tick);
        }
        self.state.trim_event_log();

        self.state.status.current_tick = tick + 1;
        !self.state.status.is_complete()
    }

    pub async fn step_n(&mut self, ticks: u64) -> u64 {
        let mut done = 0;
        for _ in 0..ticks {
            if !self.step().await {
                break;
            }
            done += 1;
        }
        done
    }

    pub async fn run_to_tick(&mut self, target: u64) {
        while self.state.status.current_tick < target && self.step().await {}
    }

    async fn tick_pipeline(&mut self, tick: u64) -> Result<StepMetrics, TickError> {
        self.scheduler.begin_tick();

        let plannable: Vec<String> = self
            .state
            .agents
            .values()
            .filter(|agent| !agent.capabilities.actions.is_empty())
            .map(|agent| agent.agent_id.clone())
            .collect();

        let mut proposals: Vec<(String, AgentPlan)> = Vec::new();
        let mut skipped = 0usize;
        for agent_id in &plannable {
            let ctx = match build_context(agent_id, &self.state) {
                Ok(ctx) => ctx,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            let agent = match self.state.agents.get(agent_id) {
                Some(agent) => agent,
                None => {
                    skipped += 1;
                    continue;
                }
            };
            let plan = match self.admission.assess(agent, &ctx, tick) {
                Some(_reason) => {
                    let room_temp = ctx.room.temperature_c;
                    let room_id = ctx.room_id.clone();
                    let outcome = self.scheduler.plan(ctx).await;
                    if matches!(outcome, PlanOutcome::Inferred(_)) {
                        if let Some(agent) = self.state.agents.get_mut(agent_id) {
                            agent.note_inferred_temp(room_temp);
                        }
                    }
                    // Warning-grade record; the heuristic substitution itself
                    // keeps the tick non-fatal.
                    if matches!(outcome, PlanOutcome::Heuristic(_, FallbackCause::BackendError)) {
                        self.state.push_event(
                            EventKind::InferenceWarning,
                            room_id,
                            Some(agent_id.clone()),
                            Some(json!({
                                "warning": "inference dispatch failed",
                                "fallback": "heuristic",
                            })),
                        );
                    }
                    outcome.into_plan()
                }
                None => heuristic_plan(&ctx),
            };
            proposals.push((agent_id.clone(), plan));
        }

        let verdict = self.mediator.mediate(&proposals, &self.state);
        for (agent_id, _) in &verdict.actions {
            let agent = self
                .state
                .agents
                .get(agent_id)
                .ok_or_else(|| TickError::UnknownMediationAgent(agent_id.clone()))?;
            if !self.state.rooms.contains_key(&agent.room_id) {
                return Err(TickError::UnknownMediationRoom {
                    agent_id: agent_id.clone(),
                    room_id: agent.room_id.clone(),
                });
            }
        }

        // One effective action per agent per tick; first verdict entry wins.
        let mut winners: Vec<String> = Vec::new();
        for (agent_id, action) in &verdict.actions {
            if winners.iter().any(|winner| winner == agent_id) {
                continue;
            }
            self.state.apply_action(agent_id, action);
            winners.push(agent_id.clone());
        }

        let conflicts = verdict.conflicts.len();
        let cooperation = verdict
            .logs
            .iter()
            .filter(|draft| draft.kind == EventKind::CooperationObserved)
            .count();

        for conflict in &verdict.conflicts {
            let room_id = self
                .state
                .agents
                .get(&conflict.loser)
                .map(|agent| agent.room_id.clone())
                .unwrap_or_default();
            self.state.push_event(
                EventKind::ConflictDetected,
                room_id,
                Some(conflict.loser.clone()),
                Some(json!({ "winner": conflict.winner, "loser": conflict.loser })),
            );
        }
        for draft in verdict.logs {
            self.state.push_draft(draft);
        }
        for (agent_id, plan) in &proposals {
            for message in &plan.messages {
                let from = agent_id.clone();
                self.state
                    .append_message_event(&from, &message.to, &message.content);
            }
        }
        self.state.trim_event_log();

        self.state.harmony = (self.state.harmony
            + HARMONY_COOPERATION_GAIN * cooperation as f64
            - HARMONY_CONFLICT_LOSS * conflicts as f64
            + HARMONY_RECOVERY)
            .clamp(0.0, 1.0);

        let total_agents = self.state.agents.len().max(1);
        self.state.resource_usage = ResourceUsage {
            acting_agents: winners.len(),
            load: winners.len() as f64 / total_agents as f64,
        };

        for agent in self.state.agents.values_mut() {
            agent.status = contracts::AgentStatus::Idle;
        }
        for winner in &winners {
            if let Some(agent) = self.state.agents.get_mut(winner) {
                agent.status = contracts::AgentStatus::Acting;
            }
        }
        for conflict in &verdict.conflicts {
            if !winners.iter().any(|winner| winner == &conflict.loser) {
                if let Some(agent) = self.state.agents.get_mut(&conflict.loser) {
                    agent.status = contracts::AgentStatus::Conflict;
                }
            }
        }

        let stats = self.scheduler.tick_stats();
        let metrics = StepMetrics {
            tick,
            agents_planned: proposals.len(),
            agents_skipped: skipped,
            cache_hits: stats.cache_hits,
            inference_dispatched: stats.dispatched,
            heuristic_fallbacks: stats.heuristic_fallbacks,
            deferred: stats.deferred,
            backend_errors: stats.backend_errors,
            conflicts,
            cooperation,
            harmony: self.state.harmony,
            degraded: false,
        };
        self.state.push_event(
            EventKind::PerformanceStats,
            "home",
            None,
            serde_json::to_value(&metrics).ok(),
        );

        // Queue depth is reported pre-drain; the drain below always empties it.
        self.state.status.pending_requests = self.scheduler.pending_len();

        // Cache-warming drain of deferred requests; results never feed back
        // into this tick.
        self.scheduler.finish_tick().await;

        Ok(metrics)
    }

    fn run_director(&mut self, tick: u64) {
        let room_ids: Vec<String> = self.state.rooms.keys().cloned().collect();
        let plan = self.director.assess(
            &self.state.event_log,
            &room_ids,
            tick,
            self.state.config.world_secs(tick),
        );

        if let Some(perturbation) = &plan.perturbation {
            if let Some(room) = self.state.rooms.get_mut(&perturbation.room_id) {
                match perturbation.field {
                    PerturbationField::Temperature => {
                        room.temperature_c =
                            (room.temperature_c + perturbation.amount).clamp(TEMP_MIN_C, TEMP_MAX_C);
                    }
                    PerturbationField::Light => {
                        room.light = (room.light + perturbation.amount).clamp(0.0, 1.0);
                    }
                }
            }
            let data = serde_json::to_value(perturbation).ok();
            self.state
                .push_event(EventKind::Perturbation, perturbation.room_id.clone(), None, data);
        }

        if plan.calming {
            for room in self.state.rooms.values_mut() {
                room.temperature_c += CALMING_EASE * (CALMING_TEMP_C - room.temperature_c);
                room.light += CALMING_EASE * (CALMING_LIGHT - room.light);
            }
            self.state.push_event(
                EventKind::DirectorEvent,
                "home",
                None,
                Some(json!({
                    "intervention": "calming",
                    "conflicts_in_window": plan.conflicts_in_window,
                })),
            );
        }

        if plan.cooperation_hint {
            self.state.push_event(
                EventKind::CooperationOpportunity,
                "home",
                None,
                Some(json!({
                    "bonus_hint": true,
                    "cooperation_in_window": plan.cooperation_in_window,
                })),
            );
        }
    }
}
