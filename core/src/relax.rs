//! The quota relaxer of spec §4.2.
//!
//! When the base feasibility ILP (§4.1) is infeasible, this finds the
//! minimum-weight adjustment of lower/upper quotas, within each
//! category's `[min_flex, max_flex]` band, that restores feasibility. It
//! can additionally be asked to guarantee that each of several
//! "must-include" agent sets can still appear in *some* feasible panel,
//! by replicating the agent variables once per scenario and sharing only
//! the slack variables across scenarios.

use crate::households::Households;
use crate::model::{AgentId, Categories, FeatureValue, Pool, Quota};
use crate::variables::{ProblemBuilder, Var};
use sortition_ilp::solvers::{MipSolver, SolveStatus};
use sortition_ilp::{LinExpr, ObjectiveSense, Variable};
use std::collections::BTreeMap;

/// The proposed new `(min, max)` for one (feature, value), alongside the
/// original bounds, for a human-readable diff.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaRelaxation {
    pub feature_value: FeatureValue,
    pub old_min: u32,
    pub old_max: u32,
    pub new_min: u32,
    pub new_max: u32,
}

impl QuotaRelaxation {
    pub fn changed(&self) -> bool {
        self.new_min != self.old_min || self.new_max != self.old_max
    }
}

impl std::fmt::Display for QuotaRelaxation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: [{}, {}] -> [{}, {}]",
            self.feature_value, self.old_min, self.old_max, self.new_min, self.new_max
        )
    }
}

/// The relaxer's output: every quota's new bounds, plus a rendered diff
/// list, carried verbatim on [`crate::error::CoreError::InfeasibleQuotas`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelaxationSuggestion {
    pub relaxations: Vec<QuotaRelaxation>,
}

impl RelaxationSuggestion {
    /// Only the entries that actually moved a bound.
    pub fn changes(&self) -> impl Iterator<Item = &QuotaRelaxation> {
        self.relaxations.iter().filter(|r| r.changed())
    }

    pub fn diff_lines(&self) -> Vec<String> {
        self.changes().map(|r| r.to_string()).collect()
    }

    pub fn new_categories(&self, original: &Categories) -> Categories {
        let mut quotas = original.quotas.clone();
        for r in &self.relaxations {
            if let Some(q) = quotas.get_mut(&r.feature_value) {
                q.min = r.new_min;
                q.max = r.new_max;
            }
        }
        Categories { quotas }
    }
}

fn lower_weight(min: u32) -> f64 {
    if min > 0 {
        1.0 + 2.0 / min as f64
    } else {
        0.0
    }
}

/// Runs the relaxer. `must_include` is a list of agent sets (possibly
/// empty) each of which must be coverable by some feasible panel under
/// the relaxed quotas; every scenario shares the same slack variables, so
/// the objective charges for the single relaxation that covers all of
/// them at once.
pub fn relax(
    pool: &Pool,
    categories: &Categories,
    households: &Households,
    k: u32,
    must_include: &[Vec<AgentId>],
    solver: &dyn MipSolver<Var, String>,
) -> Option<RelaxationSuggestion> {
    let scenarios = if must_include.is_empty() {
        vec![Vec::new()]
    } else {
        must_include.to_vec()
    };

    let mut builder = ProblemBuilder::new();

    for (s, required) in scenarios.iter().enumerate() {
        for id in pool.ids() {
            builder = builder.set_variable(Var::ScenarioAgent(s, id.clone()), Variable::binary());
        }

        let size: LinExpr<Var> = LinExpr::weighted_sum(
            pool.ids()
                .map(|id| (Var::ScenarioAgent(s, id.clone()), 1.0)),
        );
        builder = builder.add_constraint(
            size.eq(&LinExpr::constant(k as f64)),
            format!("scenario {s}: panel has exactly {k} members"),
        );

        for group in households.groups() {
            let sum: LinExpr<Var> = LinExpr::weighted_sum(
                group
                    .iter()
                    .map(|id| (Var::ScenarioAgent(s, id.clone()), 1.0)),
            );
            builder = builder.add_constraint(
                sum.leq(&LinExpr::constant(1.0)),
                format!("scenario {s}: household exclusivity"),
            );
        }

        for id in required {
            builder = builder.add_constraint(
                LinExpr::var(Var::ScenarioAgent(s, id.clone()))
                    .eq(&LinExpr::constant(1.0)),
                format!("scenario {s}: {id} is required on the panel"),
            );
        }
    }

    let mut objective = LinExpr::constant(0.0);

    for (fv, quota) in &categories.quotas {
        if !quota.is_consistent() {
            continue;
        }

        builder = builder
            .set_variable(
                Var::SlackLow(fv.clone()),
                Variable::integer().min(0.0).max((quota.min - quota.min_flex) as f64),
            )
            .set_variable(
                Var::SlackHigh(fv.clone()),
                Variable::integer().min(0.0).max((quota.max_flex - quota.max) as f64),
            );

        objective = objective
            + LinExpr::var(Var::SlackLow(fv.clone())) * lower_weight(quota.min)
            + LinExpr::var(Var::SlackHigh(fv.clone()));

        for (s, _) in scenarios.iter().enumerate() {
            let members: LinExpr<Var> = LinExpr::weighted_sum(
                agents_with(pool, fv)
                    .into_iter()
                    .map(|id| (Var::ScenarioAgent(s, id.clone()), 1.0)),
            );

            // members - (min - d_low) >= 0  <=>  min - d_low - members <= 0
            builder = builder.add_constraint(
                (LinExpr::constant(quota.min as f64) - LinExpr::var(Var::SlackLow(fv.clone())))
                    .leq(&members),
                format!("scenario {s}: relaxed lower quota for {fv}"),
            );
            // members + d_high - max <= 0
            builder = builder.add_constraint(
                (members + LinExpr::var(Var::SlackHigh(fv.clone())))
                    .leq(&LinExpr::constant(quota.max as f64)),
                format!("scenario {s}: relaxed upper quota for {fv}"),
            );
        }
    }

    let problem = builder
        .set_objective_function(objective, ObjectiveSense::Minimize)
        .build()
        .expect("all variables declared");

    let (status, solution) = solver.solve(&problem);
    let solution = match status {
        SolveStatus::Optimal => solution?,
        _ => return None,
    };

    let mut relaxations = Vec::new();
    for (fv, quota) in &categories.quotas {
        let d_low = solution.value_of(Var::SlackLow(fv.clone())).round() as u32;
        let d_high = solution.value_of(Var::SlackHigh(fv.clone())).round() as u32;
        relaxations.push(QuotaRelaxation {
            feature_value: fv.clone(),
            old_min: quota.min,
            old_max: quota.max,
            new_min: quota.min.saturating_sub(d_low),
            new_max: quota.max + d_high,
        });
    }

    Some(RelaxationSuggestion { relaxations })
}

fn agents_with<'a>(pool: &'a Pool, fv: &FeatureValue) -> Vec<&'a AgentId> {
    pool.agents
        .values()
        .filter(|agent| agent.features.get(&fv.feature) == Some(&fv.value))
        .map(|agent| &agent.id)
        .collect()
}

/// Bounds-only sanity check before a relaxation is attempted: a quota
/// whose declared `[min, max]` is already inconsistent with its own
/// `[min_flex, max_flex]` band can never be fixed by this relaxer.
pub fn flex_bounds_consistent(quota: &Quota) -> bool {
    quota.is_consistent()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Agent, ValueName, FeatureName};
    use std::collections::BTreeMap as Map;

    fn agent(id: &str, value: &str) -> Agent {
        let mut features = Map::new();
        features.insert(FeatureName::from("gender"), ValueName::from(value));
        Agent {
            id: AgentId::from(id),
            features,
            address_columns: Vec::new(),
            kept_columns: Map::new(),
        }
    }

    #[test]
    fn relaxation_widens_an_overtight_quota() {
        let mut pool = Pool::default();
        for (id, v) in [("a", "m"), ("b", "m"), ("c", "f")] {
            let agent = agent(id, v);
            pool.agents.insert(agent.id.clone(), agent);
        }

        let mut categories = Categories::default();
        categories.quotas.insert(
            FeatureValue {
                feature: FeatureName::from("gender"),
                value: ValueName::from("m"),
            },
            Quota {
                min: 1,
                max: 1,
                min_flex: 0,
                max_flex: 2,
            },
        );
        categories.quotas.insert(
            FeatureValue {
                feature: FeatureName::from("gender"),
                value: ValueName::from("f"),
            },
            Quota {
                min: 1,
                max: 1,
                min_flex: 0,
                max_flex: 1,
            },
        );

        let households = Households::compute(&pool, false);
        let solver = sortition_ilp::solvers::coin_cbc::CbcSolver::default();

        // k=3 with both genders capped at max=1 needs 2 from "m" to fill
        // the panel alongside "f", which the base max=1 forbids: relaxing
        // the "m" upper quota to 2 is the minimum-weight fix.
        let suggestion = relax(&pool, &categories, &households, 3, &[], &solver)
            .expect("relaxed ILP is feasible");
        let m_fv = FeatureValue {
            feature: FeatureName::from("gender"),
            value: ValueName::from("m"),
        };
        let m = suggestion
            .relaxations
            .iter()
            .find(|r| r.feature_value == m_fv)
            .unwrap();
        assert_eq!(m.new_max, 2);
    }
}
