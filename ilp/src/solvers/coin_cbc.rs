//! COIN-CBC backed [`MipSolver`].
//!
//! This module implements a solver which uses the [coin_cbc] crate as a
//! backend. It is an interface to the COIN-CBC solver, a fast open-source
//! MIP solver, and is the default backend for every ILP subproblem the
//! sortition core solves (feasibility, quota relaxation, column
//! generation).

use super::{MipSolver, SolveStatus, Solution};
use crate::{linexpr::EqSymbol, ObjectiveSense, Problem, UsableData, VariableType};

/// Coin-cbc solver.
///
/// Build one with [`CbcSolver::new`]; logging is disabled by default since
/// cbc otherwise writes progress to stdout on every solve, which would
/// drown out the sortition core's own diagnostic log.
#[derive(Debug, Clone)]
pub struct CbcSolver {
    disable_logging: bool,
}

impl Default for CbcSolver {
    fn default() -> Self {
        CbcSolver::new()
    }
}

impl CbcSolver {
    pub fn new() -> Self {
        CbcSolver {
            disable_logging: true,
        }
    }

    pub fn with_disable_logging(disable_logging: bool) -> Self {
        CbcSolver { disable_logging }
    }
}

struct CbcModel<V: UsableData> {
    model: coin_cbc::Model,
    cols: std::collections::BTreeMap<V, coin_cbc::Col>,
}

impl<V: UsableData, C: UsableData> MipSolver<V, C> for CbcSolver {
    fn solve(&self, problem: &Problem<V, C>) -> (SolveStatus, Option<Solution<V>>) {
        // cbc does not respect `log`/`slog` for every message, block stdout directly.
        let stdout_gag = gag::Gag::stdout();
        if !self.disable_logging {
            if let Ok(gag) = stdout_gag {
                drop(gag);
            }
        }

        let mut cbc_model = self.build_model(problem);
        Self::add_objective_func(&mut cbc_model, problem);

        let solution = cbc_model.model.solve();
        Self::reconstruct(problem, &solution, &cbc_model.cols)
    }
}

impl CbcSolver {
    fn build_model<V: UsableData, C: UsableData>(&self, problem: &Problem<V, C>) -> CbcModel<V> {
        use coin_cbc::Model;
        use std::collections::BTreeMap;

        let mut model = Model::default();

        let cols: BTreeMap<_, _> = problem
            .get_variables()
            .iter()
            .map(|(var, desc)| {
                let col = match desc.get_type() {
                    VariableType::Integer | VariableType::Binary => model.add_integer(),
                    VariableType::Continuous => model.add_col(),
                };

                model.set_col_lower(col, desc.get_min().unwrap_or(-f64::INFINITY));
                model.set_col_upper(col, desc.get_max().unwrap_or(f64::INFINITY));

                (var.clone(), col)
            })
            .collect();

        for (constraint, _desc) in problem.get_constraints() {
            let row = model.add_row();
            for (v, w) in constraint.coefficients() {
                model.set_weight(row, cols[v], w);
            }
            match constraint.get_symbol() {
                EqSymbol::Equals => model.set_row_equal(row, -constraint.get_constant()),
                EqSymbol::LessThan => model.set_row_upper(row, -constraint.get_constant()),
            }
        }

        if self.disable_logging {
            model.set_parameter("log", "0");
            model.set_parameter("slog", "0");
        }

        CbcModel { model, cols }
    }

    fn add_objective_func<V: UsableData, C: UsableData>(
        cbc_model: &mut CbcModel<V>,
        problem: &Problem<V, C>,
    ) {
        use coin_cbc::Sense;
        cbc_model
            .model
            .set_obj_sense(match problem.get_objective_sense() {
                ObjectiveSense::Maximize => Sense::Maximize,
                ObjectiveSense::Minimize => Sense::Minimize,
            });

        for (var, coef) in problem.get_objective_function().coefficients() {
            cbc_model.model.set_obj_coeff(cbc_model.cols[var], coef);
        }
    }

    fn reconstruct<V: UsableData, C: UsableData>(
        problem: &Problem<V, C>,
        sol: &coin_cbc::Solution,
        cols: &std::collections::BTreeMap<V, coin_cbc::Col>,
    ) -> (SolveStatus, Option<Solution<V>>) {
        let raw = sol.raw();

        let status = if raw.is_proven_optimal() {
            SolveStatus::Optimal
        } else if raw.is_proven_infeasible() {
            SolveStatus::Infeasible
        } else {
            SolveStatus::Other
        };

        if status != SolveStatus::Optimal {
            return (status, None);
        }

        let values: std::collections::BTreeMap<_, _> =
            cols.iter().map(|(v, col)| (v.clone(), sol.col(*col))).collect();

        let objective_value = problem
            .get_objective_function()
            .coefficients()
            .map(|(v, c)| c * values.get(v).copied().unwrap_or(0.0))
            .sum::<f64>()
            + problem.get_objective_function().get_constant();

        (
            status,
            Some(Solution {
                values,
                objective_value,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LinExpr, ProblemBuilder, Variable};

    #[test]
    fn simple_feasibility() {
        let a = LinExpr::<String>::var("a");
        let b = LinExpr::<String>::var("b");
        let one = LinExpr::constant(1.0);

        let problem = ProblemBuilder::<String, String>::new()
            .set_variable("a", Variable::binary())
            .set_variable("b", Variable::binary())
            .add_constraint((&a + &b).leq(&one), "at most one")
            .set_objective_function(a.clone() + b.clone(), ObjectiveSense::Maximize)
            .build()
            .unwrap();

        let solver = CbcSolver::new();
        let (status, solution) = MipSolver::<String, String>::solve(&solver, &problem);
        assert_eq!(status, SolveStatus::Optimal);
        let solution = solution.unwrap();
        assert_eq!(solution.value_of("a") + solution.value_of("b"), 1.0);
    }

    #[test]
    fn infeasible_problem() {
        let a = LinExpr::<String>::var("a");
        let two = LinExpr::constant(2.0);

        let problem = ProblemBuilder::<String, String>::new()
            .set_variable("a", Variable::binary())
            .add_constraint(a.geq(&two), "a >= 2")
            .build()
            .unwrap();

        let solver = CbcSolver::new();
        let (status, _) = MipSolver::<String, String>::solve(&solver, &problem);
        assert_eq!(status, SolveStatus::Infeasible);
    }
}
