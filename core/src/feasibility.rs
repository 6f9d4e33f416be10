//! The feasibility ILP of spec §4.1.
//!
//! `FeasibilityModel` builds the shared skeleton — one binary variable per
//! agent, the panel-size constraint, one quota constraint per (feature,
//! value), and (if enabled) one at-most-one-per-household constraint —
//! that every algorithm in this crate starts from. Column generation and
//! the multiplicative-weights seeder reuse this builder and only replace
//! the objective function.

use crate::households::Households;
use crate::model::{AgentId, Categories, FeatureValue, Panel, Pool};
use crate::variables::{Problem, ProblemBuilder, Var};
use sortition_ilp::solvers::{MipSolver, SolveStatus};
use sortition_ilp::{LinExpr, Variable};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct FeasibilityModel<'a> {
    pub pool: &'a Pool,
    pub categories: &'a Categories,
    pub households: &'a Households,
    pub k: u32,
}

impl<'a> FeasibilityModel<'a> {
    pub fn new(
        pool: &'a Pool,
        categories: &'a Categories,
        households: &'a Households,
        k: u32,
    ) -> Self {
        FeasibilityModel {
            pool,
            categories,
            households,
            k,
        }
    }

    /// Agents that hold value `fv`.
    pub fn agents_with(&self, fv: &FeatureValue) -> Vec<&AgentId> {
        self.pool
            .agents
            .values()
            .filter(|agent| agent.features.get(&fv.feature) == Some(&fv.value))
            .map(|agent| &agent.id)
            .collect()
    }

    /// The base builder: agent variables plus panel-size, quota and
    /// household constraints. No objective function is set; callers add
    /// one (maximize coverage weight, maximize a dual price, or nothing
    /// at all for a plain feasibility check) before solving.
    pub fn base_builder(&self) -> ProblemBuilder {
        let mut builder = ProblemBuilder::new();

        for id in self.pool.ids() {
            builder = builder.set_variable(Var::Agent(id.clone()), Variable::binary());
        }

        let size: LinExpr<Var> =
            LinExpr::weighted_sum(self.pool.ids().map(|id| (Var::Agent(id.clone()), 1.0)));
        builder = builder.add_constraint(
            size.eq(&LinExpr::constant(self.k as f64)),
            format!("panel has exactly {} members", self.k),
        );

        for (fv, quota) in &self.categories.quotas {
            builder = self.add_quota_constraint(builder, fv, quota.min, quota.max);
        }

        for group in self.households.groups() {
            let sum: LinExpr<Var> =
                LinExpr::weighted_sum(group.iter().map(|id| (Var::Agent(id.clone()), 1.0)));
            builder = builder.add_constraint(
                sum.leq(&LinExpr::constant(1.0)),
                format!("at most one member of household {{{}}}", group_label(group)),
            );
        }

        builder
    }

    fn add_quota_constraint(
        &self,
        builder: ProblemBuilder,
        fv: &FeatureValue,
        min: u32,
        max: u32,
    ) -> ProblemBuilder {
        let members: LinExpr<Var> = LinExpr::weighted_sum(
            self.agents_with(fv)
                .into_iter()
                .map(|id| (Var::Agent(id.clone()), 1.0)),
        );
        builder
            .add_constraint(
                members.geq(&LinExpr::constant(min as f64)),
                format!("{fv} lower quota {min}"),
            )
            .add_constraint(
                members.leq(&LinExpr::constant(max as f64)),
                format!("{fv} upper quota {max}"),
            )
    }

    /// Finds any single feasible panel, or `None` if the ILP is
    /// infeasible. Used both by `test_selection` (spec §15) and by the
    /// quota relaxer's final sanity check.
    pub fn find_any_panel(&self, solver: &dyn MipSolver<Var, String>) -> FeasibilityOutcome {
        let problem = self.base_builder().build().expect("all variables declared");
        solve_panel(&problem, solver)
    }

    /// The built problem with no objective, for callers that want to
    /// attach their own (column generation, multiplicative weights).
    pub fn build_plain(&self) -> Problem {
        self.base_builder().build().expect("all variables declared")
    }
}

#[derive(Debug, Clone)]
pub enum FeasibilityOutcome {
    Feasible(Panel),
    Infeasible,
    SolverFailure,
}

/// Solves `problem` (which must use [`Var::Agent`] variables for the
/// panel membership) and extracts the panel from any variable whose value
/// is above 0.5, per spec §4.1.
pub fn solve_panel(problem: &Problem, solver: &dyn MipSolver<Var, String>) -> FeasibilityOutcome {
    let (status, solution) = solver.solve(problem);
    match status {
        SolveStatus::Optimal => {
            let solution = solution.expect("optimal solve always returns a solution");
            let panel: Panel = problem
                .get_variables()
                .keys()
                .filter_map(|v| match v {
                    Var::Agent(id) if solution.is_selected(v.clone()) => Some(id.clone()),
                    _ => None,
                })
                .collect();
            FeasibilityOutcome::Feasible(panel)
        }
        SolveStatus::Infeasible => FeasibilityOutcome::Infeasible,
        SolveStatus::Other => FeasibilityOutcome::SolverFailure,
    }
}

/// Builds a weighted-maximization objective over agent variables (used by
/// the initial-panel generator and every column-generation subproblem).
pub fn weighted_objective(weights: &BTreeMap<AgentId, f64>) -> LinExpr<Var> {
    LinExpr::weighted_sum(
        weights
            .iter()
            .map(|(id, w)| (Var::Agent(id.clone()), *w)),
    )
}

fn group_label(group: &[AgentId]) -> String {
    group
        .iter()
        .map(|id| id.0.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
