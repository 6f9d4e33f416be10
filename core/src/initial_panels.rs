//! The multiplicative-weights initial-panel generator of spec §4.3.
//!
//! Seeds column generation with a set of feasible panels that covers
//! every coverable agent at least once, so the master LP in maximin,
//! leximin and Nash welfare all start from a non-degenerate column set.

use crate::feasibility::{solve_panel, weighted_objective, FeasibilityModel, FeasibilityOutcome};
use crate::log::DiagnosticLog;
use crate::model::{AgentId, Panel};
use crate::variables::Var;
use sortition_ilp::solvers::MipSolver;
use sortition_ilp::{LinExpr, ObjectiveSense};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct InitialPanels {
    pub panels: Vec<Panel>,
    pub uncoverable: Vec<AgentId>,
}

/// Runs `rounds` iterations of the weighted-maximization / weight-decay
/// loop, then a per-agent coverage sweep (spec §4.3). `rounds` is
/// `|pool|` for Nash/leximin and `|pool|/2` for maximin, per the caller.
pub fn generate(
    model: &FeasibilityModel<'_>,
    rounds: usize,
    solver: &dyn MipSolver<Var, String>,
    log: &mut DiagnosticLog,
) -> InitialPanels {
    let ids: Vec<AgentId> = model.pool.ids().cloned().collect();
    let mut weights: BTreeMap<AgentId, f64> = ids.iter().map(|id| (id.clone(), 1.0)).collect();

    let mut panels: Vec<Panel> = Vec::new();
    let mut seen: BTreeSet<Panel> = BTreeSet::new();
    let problem = model.build_plain();

    for round in 0..rounds {
        let objective = weighted_objective(&weights);
        let round_problem = problem
            .clone()
            .into_builder()
            .set_objective_function(objective, ObjectiveSense::Maximize)
            .build()
            .expect("objective only references declared agent variables");

        let panel = match solve_panel(&round_problem, solver) {
            FeasibilityOutcome::Feasible(panel) => panel,
            FeasibilityOutcome::Infeasible => {
                log.push(format!(
                    "initial panel round {round}: base problem became infeasible, stopping early"
                ));
                break;
            }
            FeasibilityOutcome::SolverFailure => {
                log.push(format!("initial panel round {round}: solver failure, stopping early"));
                break;
            }
        };

        if seen.insert(panel.clone()) {
            panels.push(panel.clone());
            for id in &panel {
                if let Some(w) = weights.get_mut(id) {
                    *w *= 0.8;
                }
            }
        } else {
            for w in weights.values_mut() {
                *w = 0.9 * *w + 0.1;
            }
        }

        let total: f64 = weights.values().sum();
        if total > 0.0 {
            let scale = ids.len() as f64 / total;
            for w in weights.values_mut() {
                *w *= scale;
            }
        }
    }

    let covered: BTreeSet<AgentId> = panels.iter().flatten().cloned().collect();
    let mut uncoverable = Vec::new();

    for id in &ids {
        if covered.contains(id) {
            continue;
        }

        let objective = LinExpr::var(Var::Agent(id.clone()));
        let single_problem = problem
            .clone()
            .into_builder()
            .set_objective_function(objective, ObjectiveSense::Maximize)
            .build()
            .expect("the agent variable is always declared");

        match solve_panel(&single_problem, solver) {
            FeasibilityOutcome::Feasible(panel) if panel.contains(id) => {
                if seen.insert(panel.clone()) {
                    panels.push(panel);
                }
            }
            _ => {
                log.push(format!("agent {id} cannot appear on any feasible panel"));
                uncoverable.push(id.clone());
            }
        }
    }

    InitialPanels { panels, uncoverable }
}
