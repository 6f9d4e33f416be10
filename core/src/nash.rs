//! The Nash-welfare optimizer of spec §4.6.
//!
//! The master convex program (`max Σ log pᵢ` over the probability
//! simplex) is solved by Frank-Wolfe / conditional gradient directly on
//! the growing column set: at each inner step the steepest-ascent vertex
//! is just the already-discovered panel with the largest `Σ_{i∈P} 1/pᵢ`,
//! a plain arithmetic scan, no conic solver required. Outer column
//! generation reuses the same `1/pᵢ`-weighted ILP subproblem the spec
//! names to decide whether a panel outside the current set would improve
//! on that further.

use crate::feasibility::{solve_panel, FeasibilityModel, FeasibilityOutcome};
use crate::log::DiagnosticLog;
use crate::model::{AgentId, Panel, PanelDistribution};
use sortition_ilp::solvers::MipSolver;
use sortition_ilp::{ObjectiveSense, Problem as RawProblem};
use crate::variables::Var;
use std::collections::BTreeSet;

/// Numerical tolerance for the Nash column-generation stopping test
/// (spec §4.6).
pub const EPS_NASH: f64 = 0.1;

const FRANK_WOLFE_ITERS: usize = 500;
const MAX_OUTER_ITERS: usize = 300;

/// Floor applied to a marginal probability before inverting it, so an
/// agent who is momentarily uncovered during Frank-Wolfe warm-up does not
/// produce an infinite weight.
const MIN_PROBABILITY: f64 = 1e-9;

pub struct NashResult {
    pub distribution: PanelDistribution,
    pub panels: Vec<Panel>,
    pub scaled_nash_welfare: f64,
}

pub fn optimize(
    model: &FeasibilityModel<'_>,
    mut panels: Vec<Panel>,
    coverable: &BTreeSet<AgentId>,
    mip_solver: &dyn MipSolver<Var, String>,
    log: &mut DiagnosticLog,
) -> NashResult {
    let mut seen: BTreeSet<Panel> = panels.iter().cloned().collect();
    let base_problem = model.build_plain();
    let mut lambda = uniform(panels.len());

    for outer in 0..MAX_OUTER_ITERS {
        lambda = frank_wolfe(&panels, coverable, lambda);

        let marginals = marginals_of(&panels, coverable, &lambda);
        let weights: std::collections::BTreeMap<AgentId, f64> = marginals
            .iter()
            .map(|(id, p)| (id.clone(), 1.0 / p.max(MIN_PROBABILITY)))
            .collect();

        let current_best = panels
            .iter()
            .map(|panel| column_value(panel, &weights))
            .fold(f64::NEG_INFINITY, f64::max);

        let (candidate, value) = match best_response(&base_problem, &weights, mip_solver) {
            Some(r) => r,
            None => {
                log.push("nash: subproblem infeasible, stopping column generation".to_string());
                break;
            }
        };

        if value <= current_best + EPS_NASH {
            log.push(format!("nash: column generation converged after {outer} outer iterations"));
            break;
        }

        if seen.insert(candidate.clone()) {
            panels.push(candidate);
            lambda.push(0.0);
        }
    }

    let marginals = marginals_of(&panels, coverable, &lambda);
    let n = coverable.len().max(1) as f64;
    let nash_welfare: f64 = marginals.values().map(|p| p.max(MIN_PROBABILITY).ln()).sum();
    let scaled_nash_welfare = nash_welfare - n * (model.k as f64 / n).ln();
    log.push(format!("nash: scaled Nash welfare = {scaled_nash_welfare:.6}"));

    let distribution = PanelDistribution::new(panels.clone(), lambda);
    NashResult {
        distribution,
        panels,
        scaled_nash_welfare,
    }
}

fn uniform(n: usize) -> Vec<f64> {
    if n == 0 {
        Vec::new()
    } else {
        vec![1.0 / n as f64; n]
    }
}

fn marginals_of(
    panels: &[Panel],
    coverable: &BTreeSet<AgentId>,
    lambda: &[f64],
) -> std::collections::BTreeMap<AgentId, f64> {
    let mut out: std::collections::BTreeMap<AgentId, f64> =
        coverable.iter().map(|id| (id.clone(), 0.0)).collect();
    for (panel, p) in panels.iter().zip(lambda.iter()) {
        for id in panel {
            if let Some(slot) = out.get_mut(id) {
                *slot += p;
            }
        }
    }
    out
}

fn column_value(panel: &Panel, weights: &std::collections::BTreeMap<AgentId, f64>) -> f64 {
    panel.iter().filter_map(|id| weights.get(id)).sum()
}

/// Runs Frank-Wolfe on the probability simplex over `panels.len()`
/// columns, maximizing `Σᵢ log(pᵢ)`. `lambda` is the warm-started
/// starting point (extended with a trailing `0.0` for any newly added
/// column by the caller).
fn frank_wolfe(panels: &[Panel], coverable: &BTreeSet<AgentId>, mut lambda: Vec<f64>) -> Vec<f64> {
    if panels.is_empty() {
        return lambda;
    }

    for t in 0..FRANK_WOLFE_ITERS {
        let marginals = marginals_of(panels, coverable, &lambda);
        let weights: std::collections::BTreeMap<AgentId, f64> = marginals
            .iter()
            .map(|(id, p)| (id.clone(), 1.0 / p.max(MIN_PROBABILITY)))
            .collect();

        let (best_index, _) = panels
            .iter()
            .map(|panel| column_value(panel, &weights))
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, v)| if v > acc.1 { (i, v) } else { acc });

        let step = 2.0 / (t as f64 + 2.0);
        for (p, l) in lambda.iter_mut().enumerate() {
            *l *= 1.0 - step;
            if p == best_index {
                *l += step;
            }
        }
    }

    lambda
}

fn best_response(
    base_problem: &crate::variables::Problem,
    weights: &std::collections::BTreeMap<AgentId, f64>,
    solver: &dyn MipSolver<Var, String>,
) -> Option<(Panel, f64)> {
    let objective = sortition_ilp::LinExpr::weighted_sum(
        weights.iter().map(|(id, w)| (Var::Agent(id.clone()), *w)),
    );
    let problem: RawProblem<Var, String> = base_problem
        .clone()
        .into_builder()
        .set_objective_function(objective, ObjectiveSense::Maximize)
        .build()
        .expect("weights only reference declared agent variables");

    match solve_panel(&problem, solver) {
        FeasibilityOutcome::Feasible(panel) => {
            let value = column_value(&panel, weights);
            Some((panel, value))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frank_wolfe_favors_the_more_covering_panel() {
        let a = AgentId::from("a");
        let b = AgentId::from("b");
        let mut p1 = Panel::new();
        p1.insert(a.clone());
        let mut p2 = Panel::new();
        p2.insert(a.clone());
        p2.insert(b.clone());

        let coverable: BTreeSet<AgentId> = [a, b].into_iter().collect();
        let lambda = frank_wolfe(&[p1, p2], &coverable, uniform(2));
        assert!(lambda[1] > lambda[0]);
    }
}
