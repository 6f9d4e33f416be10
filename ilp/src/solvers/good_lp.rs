//! [good_lp] backed [`LpSolver`], used for the continuous master LPs.
//!
//! `good_lp` can target several backends; this crate pins it to the
//! `clarabel` interior-point solver because interior-point methods
//! converge to a strictly complementary vertex of the optimal face, which
//! is the barrier-solver guarantee leximin's outer loop depends on (spec
//! §4.5, §9). A simplex-based LP solver would also find an optimal
//! solution but offers no such guarantee, which is why leximin falls back
//! to maximin when this backend is unavailable (see
//! `sortition_core::leximin`).

use super::{BarrierGuarantee, LpSolver, SolveStatus, Solution};
use crate::{linexpr::EqSymbol, ObjectiveSense, Problem, UsableData};

/// `good_lp` + Clarabel solver.
#[derive(Debug, Clone, Default)]
pub struct ClarabelSolver {}

impl BarrierGuarantee for ClarabelSolver {}

impl ClarabelSolver {
    pub fn new() -> Self {
        ClarabelSolver {}
    }
}

impl<V: UsableData, C: UsableData> LpSolver<V, C> for ClarabelSolver {
    fn solve(&self, problem: &Problem<V, C>) -> (SolveStatus, Option<Solution<V>>) {
        use good_lp::{variable, Expression, ProblemVariables, SolverModel};
        use std::collections::BTreeMap;

        let mut pb_vars = ProblemVariables::new();
        let vars: BTreeMap<_, _> = problem
            .get_variables()
            .iter()
            .map(|(var, desc)| {
                let mut def = variable();
                if let Some(m) = desc.get_min() {
                    def = def.min(m);
                }
                if let Some(m) = desc.get_max() {
                    def = def.max(m);
                }
                (var.clone(), pb_vars.add(def))
            })
            .collect();

        let mut objective = Expression::with_capacity(problem.get_objective_function().variables().len());
        for (v, c) in problem.get_objective_function().coefficients() {
            objective.add_mul(c, vars[v]);
        }

        let unsolved = match problem.get_objective_sense() {
            ObjectiveSense::Maximize => pb_vars.maximise(objective),
            ObjectiveSense::Minimize => pb_vars.minimise(objective),
        };

        let mut model = unsolved.using(good_lp::clarabel);

        for (constraint, _desc) in problem.get_constraints() {
            let mut expr = Expression::from_other_affine(constraint.get_constant());
            for (v, c) in constraint.coefficients() {
                expr.add_mul(c, vars[v]);
            }
            model = model.with(match constraint.get_symbol() {
                EqSymbol::Equals => expr.eq(0.0),
                EqSymbol::LessThan => expr.leq(0.0),
            });
        }

        let solution = match model.solve() {
            Ok(s) => s,
            Err(_) => return (SolveStatus::Other, None),
        };

        let values: BTreeMap<_, _> = vars
            .iter()
            .map(|(v, col)| (v.clone(), good_lp::Solution::value(&solution, *col)))
            .collect();

        let objective_value = problem
            .get_objective_function()
            .coefficients()
            .map(|(v, c)| c * values.get(v).copied().unwrap_or(0.0))
            .sum::<f64>()
            + problem.get_objective_function().get_constant();

        (
            SolveStatus::Optimal,
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
    fn solves_a_trivial_lp() {
        let y1 = LinExpr::<String>::var("y1");
        let y2 = LinExpr::<String>::var("y2");
        let one = LinExpr::constant(1.0);

        let problem = ProblemBuilder::<String, String>::new()
            .set_variable("y1", Variable::continuous().min(0.0))
            .set_variable("y2", Variable::continuous().min(0.0))
            .add_constraint((&y1 + &y2).eq(&one), "sum to one")
            .set_objective_function(y1.clone(), ObjectiveSense::Maximize)
            .build()
            .unwrap();

        let solver = ClarabelSolver::new();
        let (status, solution) = LpSolver::<String, String>::solve(&solver, &problem);
        assert_eq!(status, SolveStatus::Optimal);
        let solution = solution.unwrap();
        assert!((solution.value_of("y1") - 1.0).abs() < 1e-4);
        assert!(solution.value_of("y2").abs() < 1e-4);
    }
}
