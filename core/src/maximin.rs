//! The maximin optimizer of spec §4.4: column generation between a
//! continuous dual master LP over per-agent prices `yᵢ` and a 0/1
//! subproblem that proposes the panel maximizing the current price sum.

use crate::feasibility::{solve_panel, FeasibilityModel, FeasibilityOutcome};
use crate::log::DiagnosticLog;
use crate::model::{AgentId, Panel, PanelDistribution};
use crate::variables::{Problem, ProblemBuilder, Var};
use sortition_ilp::solvers::{LpSolver, MipSolver};
use sortition_ilp::{LinExpr, ObjectiveSense, Variable};
use std::collections::BTreeSet;

/// Numerical tolerance for the column-generation stopping test (spec §4.4).
pub const EPS: f64 = 5e-4;

/// Up to this many rescue-heuristic passes after a new column is added.
const RESCUE_ATTEMPTS: usize = 10;

pub struct MaximinResult {
    pub distribution: PanelDistribution,
    pub panels: Vec<Panel>,
}

/// Runs column generation to (approximate) convergence, then recovers the
/// primal distribution on the final column set.
pub fn optimize(
    model: &FeasibilityModel<'_>,
    mut panels: Vec<Panel>,
    coverable: &BTreeSet<AgentId>,
    mip_solver: &dyn MipSolver<Var, String>,
    lp_solver: &dyn LpSolver<Var, String>,
    log: &mut DiagnosticLog,
) -> MaximinResult {
    let mut seen: BTreeSet<Panel> = panels.iter().cloned().collect();
    let base_problem = model.build_plain();

    loop {
        let (status, solution) = lp_solver.solve(&dual_master(coverable, &panels));
        let solution = match (status, solution) {
            (sortition_ilp::solvers::SolveStatus::Optimal, Some(s)) => s,
            _ => {
                log.push("maximin: dual master LP failed to solve, stopping column generation".to_string());
                break;
            }
        };

        let z = solution.value_of(Var::Z);
        let weights: std::collections::BTreeMap<AgentId, f64> = coverable
            .iter()
            .map(|id| (id.clone(), solution.value_of(Var::Y(id.clone()))))
            .collect();

        let (new_panel, value) = match best_response(&base_problem, &weights, mip_solver) {
            Some(result) => result,
            None => {
                log.push("maximin: subproblem infeasible, stopping column generation".to_string());
                break;
            }
        };

        if value <= z + EPS {
            log.push(format!(
                "maximin: column generation converged at z = {z:.6}"
            ));
            break;
        }

        add_panel_rescued(&mut panels, &mut seen, new_panel, z, value, &base_problem, &weights, mip_solver, log);
    }

    let distribution = recover_primal(coverable, &panels, lp_solver, log);
    MaximinResult { distribution, panels }
}

fn add_panel_rescued(
    panels: &mut Vec<Panel>,
    seen: &mut BTreeSet<Panel>,
    new_panel: Panel,
    z: f64,
    value: f64,
    base_problem: &Problem,
    weights: &std::collections::BTreeMap<AgentId, f64>,
    mip_solver: &dyn MipSolver<Var, String>,
    log: &mut DiagnosticLog,
) {
    if seen.insert(new_panel.clone()) {
        panels.push(new_panel.clone());
    }

    let mut scaled = weights.clone();
    let mut last_value = value;
    for _ in 0..RESCUE_ATTEMPTS {
        if last_value <= 0.0 {
            break;
        }
        let factor = (z / last_value).clamp(0.0, 1.0);
        for (id, w) in scaled.iter_mut() {
            if new_panel.contains(id) {
                *w *= factor;
            }
        }
        let total: f64 = scaled.values().sum();
        if total <= 0.0 {
            break;
        }
        for w in scaled.values_mut() {
            *w /= total;
        }

        let (panel, value) = match best_response(base_problem, &scaled, mip_solver) {
            Some(r) => r,
            None => break,
        };
        last_value = value;

        if seen.insert(panel.clone()) {
            panels.push(panel);
            log.push("maximin: rescue heuristic discovered an additional column".to_string());
        }
    }
}

/// Solves the ILP subproblem `max Σ yᵢ xᵢ`, returning the panel and its
/// achieved weighted sum.
fn best_response(
    base_problem: &Problem,
    weights: &std::collections::BTreeMap<AgentId, f64>,
    solver: &dyn MipSolver<Var, String>,
) -> Option<(Panel, f64)> {
    let objective = LinExpr::weighted_sum(
        weights
            .iter()
            .map(|(id, w)| (Var::Agent(id.clone()), *w)),
    );
    let problem = base_problem
        .clone()
        .into_builder()
        .set_objective_function(objective, ObjectiveSense::Maximize)
        .build()
        .expect("weights only reference declared agent variables");

    match solve_panel(&problem, solver) {
        FeasibilityOutcome::Feasible(panel) => {
            let value: f64 = panel
                .iter()
                .filter_map(|id| weights.get(id))
                .sum();
            Some((panel, value))
        }
        _ => None,
    }
}

/// The dual master LP: `min z` s.t. `Σ_{i∈P} yᵢ ≤ z` for every known
/// panel, `Σᵢ yᵢ = 1`, `y, z ≥ 0`.
fn dual_master(coverable: &BTreeSet<AgentId>, panels: &[Panel]) -> Problem {
    let mut builder = ProblemBuilder::new();
    for id in coverable {
        builder = builder.set_variable(Var::Y(id.clone()), Variable::continuous().min(0.0));
    }
    builder = builder.set_variable(Var::Z, Variable::continuous().min(0.0));

    for (p, panel) in panels.iter().enumerate() {
        let sum: LinExpr<Var> = LinExpr::weighted_sum(
            panel
                .iter()
                .filter(|id| coverable.contains(*id))
                .map(|id| (Var::Y(id.clone()), 1.0)),
        );
        builder = builder.add_constraint(
            sum.leq(&LinExpr::var(Var::Z)),
            format!("panel {p} price sum bounded by z"),
        );
    }

    let sum_to_one: LinExpr<Var> =
        LinExpr::weighted_sum(coverable.iter().map(|id| (Var::Y(id.clone()), 1.0)));
    builder = builder.add_constraint(
        sum_to_one.eq(&LinExpr::constant(1.0)),
        "dual prices sum to one".to_string(),
    );

    builder
        .set_objective_function(LinExpr::var(Var::Z), ObjectiveSense::Minimize)
        .build()
        .expect("all variables declared")
}

/// The primal maximin LP on the final column set: `max z` s.t.
/// `Σ_{P∋i} λ_P ≥ z` for every coverable agent, `Σλ_P = 1`, `λ ≥ 0`.
/// Negative solver noise is clipped and the result renormalized.
fn recover_primal(
    coverable: &BTreeSet<AgentId>,
    panels: &[Panel],
    lp_solver: &dyn LpSolver<Var, String>,
    log: &mut DiagnosticLog,
) -> PanelDistribution {
    let mut builder = ProblemBuilder::new();
    for p in 0..panels.len() {
        builder = builder.set_variable(Var::Lambda(p), Variable::continuous().min(0.0));
    }
    builder = builder.set_variable(Var::Z, Variable::continuous().min(0.0));

    for id in coverable {
        let coverage: LinExpr<Var> = LinExpr::weighted_sum(
            panels
                .iter()
                .enumerate()
                .filter(|(_, panel)| panel.contains(id))
                .map(|(p, _)| (Var::Lambda(p), 1.0)),
        );
        builder = builder.add_constraint(
            LinExpr::var(Var::Z).leq(&coverage),
            format!("{id} marginal probability at least z"),
        );
    }

    let sum_to_one: LinExpr<Var> =
        LinExpr::weighted_sum((0..panels.len()).map(|p| (Var::Lambda(p), 1.0)));
    builder = builder.add_constraint(
        sum_to_one.eq(&LinExpr::constant(1.0)),
        "panel probabilities sum to one".to_string(),
    );

    let problem = builder
        .set_objective_function(LinExpr::var(Var::Z), ObjectiveSense::Maximize)
        .build()
        .expect("all variables declared");

    let (status, solution) = lp_solver.solve(&problem);
    let solution = match (status, solution) {
        (sortition_ilp::solvers::SolveStatus::Optimal, Some(s)) => s,
        _ => {
            log.push("maximin: primal recovery LP failed, falling back to a uniform lottery".to_string());
            let n = panels.len().max(1);
            let uniform = vec![1.0 / n as f64; panels.len()];
            return PanelDistribution::new(panels.to_vec(), uniform);
        }
    };

    let mut probabilities: Vec<f64> = (0..panels.len())
        .map(|p| solution.value_of(Var::Lambda(p)).max(0.0))
        .collect();
    let total: f64 = probabilities.iter().sum();
    if total > 0.0 {
        for p in probabilities.iter_mut() {
            *p /= total;
        }
    }

    PanelDistribution::new(panels.to_vec(), probabilities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dual_master_is_well_formed() {
        let mut panel = Panel::new();
        panel.insert(AgentId::from("a"));
        let coverable: BTreeSet<AgentId> = [AgentId::from("a"), AgentId::from("b")]
            .into_iter()
            .collect();
        let problem = dual_master(&coverable, &[panel]);
        assert_eq!(problem.get_variables().len(), 3);
    }
}
