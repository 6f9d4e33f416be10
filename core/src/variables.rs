//! Variable and constraint-description names shared by every ILP/LP this
//! crate builds (spec §4.1-§4.6). Keeping them in one place means the
//! feasibility builder, the quota relaxer and every column-generation
//! subproblem agree on how an agent's selection variable is named.

use crate::model::{AgentId, FeatureValue};
use std::fmt;

/// A variable name usable in any of this crate's linear programs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Var {
    /// Whether `agent` is on the panel (the base case, one scenario).
    Agent(AgentId),
    /// The same, but for must-include scenario `scenario` in the quota
    /// relaxer (spec §4.2): each scenario gets its own copy of every
    /// agent variable, sharing only the slack variables.
    ScenarioAgent(usize, AgentId),
    /// Amount by which `fv`'s lower quota is relaxed (`d-`, spec §4.2).
    SlackLow(FeatureValue),
    /// Amount by which `fv`'s upper quota is relaxed (`d+`, spec §4.2).
    SlackHigh(FeatureValue),
    /// The maximin/leximin dual master LP's per-agent dual price.
    Y(AgentId),
    /// The maximin/leximin dual master LP's objective value.
    Z,
    /// Probability assigned to panel number `usize` (an index into the
    /// column set), used by every primal master LP (maximin recovery,
    /// leximin's terminal extraction, Nash welfare).
    Lambda(usize),
    /// Slack used by leximin's terminal extraction LP to find the
    /// smallest uniform shortfall against the frozen probabilities.
    Epsilon,
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Var::Agent(id) => write!(f, "x[{id}]"),
            Var::ScenarioAgent(s, id) => write!(f, "x[{s}][{id}]"),
            Var::SlackLow(fv) => write!(f, "d_low[{fv}]"),
            Var::SlackHigh(fv) => write!(f, "d_high[{fv}]"),
            Var::Y(id) => write!(f, "y[{id}]"),
            Var::Z => write!(f, "z"),
            Var::Lambda(p) => write!(f, "lambda[{p}]"),
            Var::Epsilon => write!(f, "epsilon"),
        }
    }
}

pub type Desc = String;
pub type Problem = sortition_ilp::Problem<Var, Desc>;
pub type ProblemBuilder = sortition_ilp::ProblemBuilder<Var, Desc>;
