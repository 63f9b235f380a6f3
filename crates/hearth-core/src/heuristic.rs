//! Deterministic fallback planner. Total over every context: whatever the
//! scheduler cannot or will not infer still yields a plan.

use std::collections::BTreeMap;

use contracts::planning::{AgentPlan, OutboundMessage, ProposedAction};
use serde_json::json;

use crate::context::PlanningContext;

const MIN_THERMAL_DELTA: f64 = 0.5;
const MAX_THERMAL_DELTA: f64 = 1.0;
const QUIET_BRIGHTNESS_TARGET: f64 = 0.1;

/// Stateless and side-effect-free. The same context always produces the
/// same plan, so cached heuristic output is indistinguishable from a fresh
/// call.
pub fn heuristic_plan(ctx: &PlanningContext) -> AgentPlan {
    let mut actions = Vec::new();
    let mut messages = Vec::new();

    let temp = ctx.room.temperature_c;
    if ctx.capabilities.has_action("heat") && temp < ctx.policy.comfort_min_c {
        let delta = (ctx.policy.comfort_min_c - temp).clamp(MIN_THERMAL_DELTA, MAX_THERMAL_DELTA);
        actions.push(thermal_action("heat", delta));
    } else if ctx.capabilities.has_action("cool") && temp > ctx.policy.comfort_max_c {
        let delta = (temp - ctx.policy.comfort_max_c).clamp(MIN_THERMAL_DELTA, MAX_THERMAL_DELTA);
        actions.push(thermal_action("cool", delta));
    }

    if ctx.capabilities.has_action("set_brightness")
        && ctx.policy.in_quiet_hours(ctx.hour_of_day())
        && ctx.room.light > ctx.policy.quiet_light_ceiling
    {
        actions.push(ProposedAction {
            name: "set_brightness".to_string(),
            args: BTreeMap::from([("target".to_string(), json!(QUIET_BRIGHTNESS_TARGET))]),
        });
        messages.push(OutboundMessage {
            to: "*".to_string(),
            content: format!("{} dimming {} for quiet hours", ctx.agent_id, ctx.room_id),
        });
    }

    let rationale = format!("heuristic: {} action(s)", actions.len());
    AgentPlan {
        actions,
        messages,
        rationale,
    }
}

fn thermal_action(name: &str, delta: f64) -> ProposedAction {
    ProposedAction {
        name: name.to_string(),
        args: BTreeMap::from([("delta_c".to_string(), json!(delta))]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::build_context;
    use crate::world::testutil::demo_world;

    #[test]
    fn cold_room_gets_a_bounded_heat_delta() {
        let mut world = demo_world();
        world.rooms.get_mut("living_room").unwrap().temperature_c = 16.0;
        let ctx = build_context("thermostat_1", &world).unwrap();
        let plan = heuristic_plan(&ctx);
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].name, "heat");
        let delta = plan.actions[0].args["delta_c"].as_f64().unwrap();
        assert!((MIN_THERMAL_DELTA..=MAX_THERMAL_DELTA).contains(&delta));
        assert_eq!(plan.rationale, "heuristic: 1 action(s)");
    }

    #[test]
    fn hot_room_gets_a_cool_action() {
        let mut world = demo_world();
        world.rooms.get_mut("living_room").unwrap().temperature_c = 29.0;
        let ctx = build_context("thermostat_1", &world).unwrap();
        let plan = heuristic_plan(&ctx);
        assert_eq!(plan.actions[0].name, "cool");
    }

    #[test]
    fn slightly_cold_room_still_gets_minimum_delta() {
        let mut world = demo_world();
        world.rooms.get_mut("living_room").unwrap().temperature_c = 18.9;
        let ctx = build_context("thermostat_1", &world).unwrap();
        let plan = heuristic_plan(&ctx);
        let delta = plan.actions[0].args["delta_c"].as_f64().unwrap();
        assert!((delta - MIN_THERMAL_DELTA).abs() < f64::EPSILON);
    }

    #[test]
    fn bright_room_in_quiet_hours_is_dimmed_with_broadcast() {
        let mut world = demo_world();
        // 23:00 simulated: tick such that world_secs/3600 % 24 == 23.
        world.status.current_tick = 23 * 360;
        world.rooms.get_mut("bedroom").unwrap().light = 0.8;
        let ctx = build_context("lamp_1", &world).unwrap();
        assert!(ctx.policy.in_quiet_hours(ctx.hour_of_day()));
        let plan = heuristic_plan(&ctx);
        assert!(plan.actions.iter().any(|a| a.name == "set_brightness"));
        assert_eq!(plan.messages.len(), 1);
        assert_eq!(plan.messages[0].to, "*");
    }

    #[test]
    fn comfortable_room_yields_no_actions() {
        let world = demo_world();
        let ctx = build_context("thermostat_1", &world).unwrap();
        let plan = heuristic_plan(&ctx);
        assert!(plan.actions.is_empty());
        assert_eq!(plan.rationale, "heuristic: 0 action(s)");
    }

    #[test]
    fn same_context_always_yields_same_plan() {
        let mut world = demo_world();
        world.rooms.get_mut("living_room").unwrap().temperature_c = 17.0;
        let ctx = build_context("thermostat_1", &world).unwrap();
        assert_eq!(heuristic_plan(&ctx), heuristic_plan(&ctx));
    }
}
