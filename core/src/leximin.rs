//! The leximin optimizer of spec §4.5: lexicographically maximizes the
//! sorted vector of per-agent marginal probabilities by repeatedly
//! solving maximin-like LPs while progressively freezing agents whose
//! probability is pinned at the optimum.
//!
//! Freezing an agent correctly requires the per-iteration dual LP to
//! return a *strictly complementary* optimal solution — an ordinary
//! simplex solver can return a degenerate vertex where `y_i = 0` even
//! though agent `i`'s primal constraint is tight, which would freeze the
//! wrong value. [`BarrierGuarantee`] lets this module require a solver
//! that rules that out at the type level; callers without one should use
//! [`crate::maximin`] instead (spec §4.5's availability fallback).

use crate::feasibility::{solve_panel, FeasibilityModel, FeasibilityOutcome};
use crate::log::DiagnosticLog;
use crate::maximin::EPS;
use crate::model::{AgentId, Panel, PanelDistribution};
use crate::variables::{Problem, ProblemBuilder, Var};
use sortition_ilp::solvers::{BarrierGuarantee, LpSolver, MipSolver, SolveStatus};
use sortition_ilp::{LinExpr, ObjectiveSense, Variable};
use std::collections::{BTreeMap, BTreeSet};

const MAX_NUMERICAL_RETRIES: usize = 10;
const RETRY_SHRINK: f64 = 1e-4;

pub struct LeximinResult {
    pub distribution: PanelDistribution,
    pub panels: Vec<Panel>,
    pub fixed: BTreeMap<AgentId, f64>,
}

/// Runs the outer freezing loop to completion, then extracts a
/// distribution on the final column set consistent with every frozen
/// probability.
pub fn optimize<S: LpSolver<Var, String> + BarrierGuarantee>(
    model: &FeasibilityModel<'_>,
    mut panels: Vec<Panel>,
    coverable: &BTreeSet<AgentId>,
    mip_solver: &dyn MipSolver<Var, String>,
    lp_solver: &S,
    log: &mut DiagnosticLog,
) -> LeximinResult {
    let mut seen: BTreeSet<Panel> = panels.iter().cloned().collect();
    let base_problem = model.build_plain();
    let mut fixed: BTreeMap<AgentId, f64> = BTreeMap::new();

    while fixed.len() < coverable.len() {
        let free: BTreeSet<AgentId> = coverable.difference(&fixed_keys(&fixed)).cloned().collect();

        let (solution, z_hat) = match column_generate(
            &base_problem,
            &mut panels,
            &mut seen,
            coverable,
            &free,
            &fixed,
            mip_solver,
            lp_solver,
            log,
        ) {
            Some(r) => r,
            None => {
                log.push("leximin: column generation did not converge, stopping".to_string());
                break;
            }
        };

        let mut froze_any = false;
        for id in &free {
            let y = solution.value_of(Var::Y(id.clone()));
            if y > EPS {
                fixed.insert(id.clone(), z_hat);
                froze_any = true;
            }
        }

        if !froze_any {
            // Degenerate round: freeze every still-free agent at the
            // current value to guarantee progress.
            for id in &free {
                fixed.insert(id.clone(), z_hat);
            }
            log.push(
                "leximin: no agent had a strictly positive dual price this round, freezing all remaining agents"
                    .to_string(),
            );
        }
    }

    let distribution = terminal_extraction(&fixed, &panels, coverable, lp_solver, log);
    LeximinResult {
        distribution,
        panels,
        fixed,
    }
}

fn fixed_keys(fixed: &BTreeMap<AgentId, f64>) -> BTreeSet<AgentId> {
    fixed.keys().cloned().collect()
}

/// Column-generates the extended dual LP (spec §4.5 step 1-2) for the
/// current fixed set, retrying with shrunk fixed probabilities on
/// numerical infeasibility.
#[allow(clippy::too_many_arguments)]
fn column_generate<S: LpSolver<Var, String> + BarrierGuarantee>(
    base_problem: &Problem,
    panels: &mut Vec<Panel>,
    seen: &mut BTreeSet<Panel>,
    coverable: &BTreeSet<AgentId>,
    free: &BTreeSet<AgentId>,
    fixed: &BTreeMap<AgentId, f64>,
    mip_solver: &dyn MipSolver<Var, String>,
    lp_solver: &S,
    log: &mut DiagnosticLog,
) -> Option<(sortition_ilp::solvers::Solution<Var>, f64)> {
    let mut shrink = 0.0;

    for attempt in 0..=MAX_NUMERICAL_RETRIES {
        let shrunk_fixed: BTreeMap<AgentId, f64> = fixed
            .iter()
            .map(|(id, v)| (id.clone(), (v - shrink).max(0.0)))
            .collect();

        loop {
            let problem = extended_dual_master(coverable, free, &shrunk_fixed, panels);
            let (status, solution) = lp_solver.solve(&problem);
            let solution = match (status, solution) {
                (SolveStatus::Optimal, Some(s)) => s,
                _ => break,
            };

            let z_hat = solution.value_of(Var::Z);
            let weights: BTreeMap<AgentId, f64> = coverable
                .iter()
                .map(|id| (id.clone(), solution.value_of(Var::Y(id.clone()))))
                .collect();

            let (panel, value) = match best_response(base_problem, &weights, mip_solver) {
                Some(r) => r,
                None => return None,
            };

            if value <= z_hat + EPS {
                return Some((solution, z_hat));
            }

            if seen.insert(panel.clone()) {
                panels.push(panel);
            } else {
                // No new column found but the test did not pass: avoid an
                // infinite loop by accepting the current solution.
                return Some((solution, z_hat));
            }
        }

        shrink += RETRY_SHRINK;
        if attempt < MAX_NUMERICAL_RETRIES {
            log.push(format!(
                "leximin: numerical infeasibility, retrying with fixed probabilities shrunk by {shrink:.1e}"
            ));
        }
    }

    None
}

fn best_response(
    base_problem: &Problem,
    weights: &BTreeMap<AgentId, f64>,
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
            let value: f64 = panel.iter().filter_map(|id| weights.get(id)).sum();
            Some((panel, value))
        }
        _ => None,
    }
}

/// `min ẑ - Σ_{i∈F} F[i]·yᵢ` s.t. `Σ_{i∈P} yᵢ ≤ ẑ` ∀P, `Σ_{i∉F} yᵢ = 1`,
/// `y, ẑ ≥ 0`.
fn extended_dual_master(
    coverable: &BTreeSet<AgentId>,
    free: &BTreeSet<AgentId>,
    fixed: &BTreeMap<AgentId, f64>,
    panels: &[Panel],
) -> Problem {
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
            format!("panel {p} price sum bounded by z_hat"),
        );
    }

    let sum_free: LinExpr<Var> = LinExpr::weighted_sum(free.iter().map(|id| (Var::Y(id.clone()), 1.0)));
    builder = builder.add_constraint(
        sum_free.eq(&LinExpr::constant(1.0)),
        "dual prices over free agents sum to one".to_string(),
    );

    let mut objective = LinExpr::var(Var::Z);
    for (id, f) in fixed {
        objective = objective - LinExpr::var(Var::Y(id.clone())) * *f;
    }

    builder
        .set_objective_function(objective, ObjectiveSense::Minimize)
        .build()
        .expect("all variables declared")
}

/// Terminal step (spec §4.5): `min ε` s.t. `Σ_{P∋i} λ_P ≥ F[i] − ε` for
/// every coverable agent, `Σλ_P = 1`, `λ ≥ 0`.
fn terminal_extraction<S: LpSolver<Var, String> + BarrierGuarantee>(
    fixed: &BTreeMap<AgentId, f64>,
    panels: &[Panel],
    coverable: &BTreeSet<AgentId>,
    lp_solver: &S,
    log: &mut DiagnosticLog,
) -> PanelDistribution {
    let mut builder = ProblemBuilder::new();
    for p in 0..panels.len() {
        builder = builder.set_variable(Var::Lambda(p), Variable::continuous().min(0.0));
    }
    builder = builder.set_variable(Var::Epsilon, Variable::continuous());

    for id in coverable {
        let target = fixed.get(id).copied().unwrap_or(0.0);
        let coverage: LinExpr<Var> = LinExpr::weighted_sum(
            panels
                .iter()
                .enumerate()
                .filter(|(_, panel)| panel.contains(id))
                .map(|(p, _)| (Var::Lambda(p), 1.0)),
        );
        let rhs = LinExpr::constant(target) - LinExpr::var(Var::Epsilon);
        builder = builder.add_constraint(
            rhs.leq(&coverage),
            format!("{id} marginal within epsilon of its frozen probability"),
        );
    }

    let sum_to_one: LinExpr<Var> =
        LinExpr::weighted_sum((0..panels.len()).map(|p| (Var::Lambda(p), 1.0)));
    builder = builder.add_constraint(
        sum_to_one.eq(&LinExpr::constant(1.0)),
        "panel probabilities sum to one".to_string(),
    );

    let problem = builder
        .set_objective_function(LinExpr::var(Var::Epsilon), ObjectiveSense::Minimize)
        .build()
        .expect("all variables declared");

    let (status, solution) = lp_solver.solve(&problem);
    let solution = match (status, solution) {
        (SolveStatus::Optimal, Some(s)) => s,
        _ => {
            log.push("leximin: terminal extraction LP failed, falling back to a uniform lottery".to_string());
            let n = panels.len().max(1);
            return PanelDistribution::new(panels.to_vec(), vec![1.0 / n as f64; panels.len()]);
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
