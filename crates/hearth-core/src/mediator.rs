//! Mediation boundary. The kernel consumes a mediator verdict; it never
//! implements conflict-resolution policy itself.

use contracts::planning::AgentPlan;
use contracts::scheduler::{Action, MediationOutcome};

use crate::world::WorldState;

/// Synchronous total function from proposed plans to a verdict. The
/// orchestrator owns all world mutation; implementations only read the
/// state they are shown.
pub trait Mediator: Send {
    fn mediate(&self, proposals: &[(String, AgentPlan)], world: &WorldState) -> MediationOutcome;
}

/// Demo mediator: adopts the first parseable action of every plan and
/// reports no conflicts. Unparseable proposals are dropped silently, which
/// keeps the outcome total over arbitrary planner output.
pub struct PassThroughMediator;

impl Mediator for PassThroughMediator {
    fn mediate(&self, proposals: &[(String, AgentPlan)], _world: &WorldState) -> MediationOutcome {
        let mut outcome = MediationOutcome::default();
        for (agent_id, plan) in proposals {
            let action = plan
                .actions
                .iter()
                .find_map(|proposed| Action::try_from(proposed).ok());
            if let Some(action) = action {
                outcome.actions.push((agent_id.clone(), action));
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::testutil::demo_world;
    use contracts::{ProposedAction, ThermalChange};
    use std::collections::BTreeMap;
    use serde_json::json;

    #[test]
    fn pass_through_adopts_first_parseable_action_per_agent() {
        let world = demo_world();
        let plan = AgentPlan {
            actions: vec![
                ProposedAction {
                    name: "dance".to_string(),
                    args: BTreeMap::new(),
                },
                ProposedAction {
                    name: "heat".to_string(),
                    args: BTreeMap::from([("delta_c".to_string(), json!(0.5))]),
                },
            ],
            messages: Vec::new(),
            rationale: String::new(),
        };
        let outcome =
            PassThroughMediator.mediate(&[("thermostat_1".to_string(), plan)], &world);
        assert_eq!(outcome.actions.len(), 1);
        assert_eq!(
            outcome.actions[0],
            (
                "thermostat_1".to_string(),
                Action::Heat {
                    change: ThermalChange::Delta(0.5)
                }
            )
        );
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn plan_without_parseable_actions_is_dropped() {
        let world = demo_world();
        let plan = AgentPlan {
            actions: vec![ProposedAction {
                name: "sing".to_string(),
                args: BTreeMap::new(),
            }],
            messages: Vec::new(),
            rationale: String::new(),
        };
        let outcome = PassThroughMediator.mediate(&[("lamp_1".to_string(), plan)], &world);
        assert!(outcome.actions.is_empty());
    }
}
