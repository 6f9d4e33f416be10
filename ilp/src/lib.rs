//! Generic representation of 0/1 (and mixed continuous) linear programs.
//!
//! This crate factors out the parts of the sortition core that are purely
//! about *describing* a linear program — variables, linear expressions,
//! constraints, an objective — from the concerns of the sortition domain
//! itself (quotas, households, panels). The domain crate builds a
//! [`Problem`] through a [`ProblemBuilder`] and hands it to a [`MipSolver`]
//! or [`LpSolver`] implementation.
//!
//! Two goals shaped this split, mirrored from the ILP crate this workspace
//! is grounded on:
//! - an internal representation with generic variable/constraint names that
//!   is easier to juggle from the domain code than raw solver handles.
//! - the ability to check whether a candidate assignment actually satisfies
//!   a [`Problem`] without invoking a solver, and to report which
//!   constraints fail when it does not.

pub mod linexpr;
pub mod solvers;

use std::collections::BTreeMap;
use thiserror::Error;

pub use linexpr::{Constraint, EqSymbol, LinExpr};
pub use linexpr::VariableName as UsableData;

/// The kind of value a variable is allowed to take.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum VariableType {
    /// Represented as f64 but restricted to integer values.
    Integer,
    /// Represented as f64 and restricted to {0, 1}.
    #[default]
    Binary,
    /// Unrestricted real value (used for the master LPs).
    Continuous,
}

/// Full description of the allowed range for one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Variable {
    var_type: VariableType,
    min: Option<ordered_float::OrderedFloat<f64>>,
    max: Option<ordered_float::OrderedFloat<f64>>,
}

impl Default for Variable {
    fn default() -> Self {
        Variable {
            var_type: VariableType::default(),
            min: None,
            max: None,
        }
    }
}

impl Variable {
    pub fn binary() -> Self {
        Variable {
            var_type: VariableType::Binary,
            min: None,
            max: None,
        }
    }

    pub fn integer() -> Self {
        Variable {
            var_type: VariableType::Integer,
            min: None,
            max: None,
        }
    }

    pub fn continuous() -> Self {
        Variable {
            var_type: VariableType::Continuous,
            min: None,
            max: None,
        }
    }

    pub fn min(mut self, m: f64) -> Self {
        self.min = Some(ordered_float::OrderedFloat(m));
        self
    }

    pub fn max(mut self, m: f64) -> Self {
        self.max = Some(ordered_float::OrderedFloat(m));
        self
    }

    pub fn get_type(&self) -> VariableType {
        self.var_type
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.var_type, VariableType::Integer | VariableType::Binary)
    }

    pub fn get_min(&self) -> Option<f64> {
        match self.var_type {
            VariableType::Binary => Some(self.min.map_or(0.0, |m| m.into_inner())),
            _ => self.min.map(|x| x.into_inner()),
        }
    }

    pub fn get_max(&self) -> Option<f64> {
        match self.var_type {
            VariableType::Binary => Some(self.max.map_or(1.0, |m| m.into_inner())),
            _ => self.max.map(|x| x.into_inner()),
        }
    }
}

/// Direction of optimization for the objective function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ObjectiveSense {
    #[default]
    Minimize,
    Maximize,
}

/// Builder for a [`Problem`].
///
/// Variables must be declared with [`ProblemBuilder::set_variable`] (or
/// [`ProblemBuilder::set_variables`]) before they can be used in a
/// constraint or the objective function; [`ProblemBuilder::build`] checks
/// this and fails loudly otherwise, rather than silently solving a problem
/// with a forgotten variable.
#[derive(Debug, Clone)]
pub struct ProblemBuilder<V: UsableData, C: UsableData> {
    constraints: Vec<(Constraint<V>, C)>,
    variables: BTreeMap<V, Variable>,
    objective_func: LinExpr<V>,
    objective_sense: ObjectiveSense,
}

impl<V: UsableData, C: UsableData> Default for ProblemBuilder<V, C> {
    fn default() -> Self {
        ProblemBuilder {
            constraints: Vec::default(),
            variables: BTreeMap::default(),
            objective_func: LinExpr::default(),
            objective_sense: ObjectiveSense::default(),
        }
    }
}

impl<V: UsableData, C: UsableData> ProblemBuilder<V, C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_variable<T: Into<V>>(mut self, name: T, var: Variable) -> Self {
        self.variables.insert(name.into(), var);
        self
    }

    pub fn set_variables<U: Into<V>, T: IntoIterator<Item = (U, Variable)>>(
        mut self,
        vars: T,
    ) -> Self {
        for (name, var) in vars {
            self.variables.insert(name.into(), var);
        }
        self
    }

    pub fn add_constraint<T: Into<C>>(mut self, constraint: Constraint<V>, desc: T) -> Self {
        self.constraints.push((constraint, desc.into()));
        self
    }

    pub fn add_constraints<U: Into<C>, T: IntoIterator<Item = (Constraint<V>, U)>>(
        mut self,
        constraints: T,
    ) -> Self {
        for (constraint, desc) in constraints {
            self.constraints.push((constraint, desc.into()));
        }
        self
    }

    pub fn set_objective_function(mut self, obj_fn: LinExpr<V>, obj_sense: ObjectiveSense) -> Self {
        self.objective_func = obj_fn;
        self.objective_sense = obj_sense;
        self
    }

    pub fn build(self) -> BuildResult<Problem<V, C>, V, C> {
        for (constraint, desc) in &self.constraints {
            if let Some(var) = self.first_undeclared(constraint.get_lhs()) {
                return Err(BuildError::UndeclaredVariableInConstraint(
                    var,
                    constraint.clone(),
                    desc.clone(),
                ));
            }
        }

        if let Some(var) = self.first_undeclared(&self.objective_func) {
            return Err(BuildError::UndeclaredVariableInObjFunc(
                var,
                self.objective_func.clone(),
            ));
        }

        Ok(Problem {
            constraints: self.constraints,
            variables: self.variables,
            objective_func: self.objective_func,
            objective_sense: self.objective_sense,
        })
    }

    fn first_undeclared(&self, expr: &LinExpr<V>) -> Option<V> {
        expr.variables()
            .into_iter()
            .find(|var| !self.variables.contains_key(var))
    }
}

/// Errors raised by [`ProblemBuilder::build`].
///
/// Both variants correspond to a variable used somewhere (a constraint or
/// the objective function) without having been declared with
/// [`ProblemBuilder::set_variable`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError<V: UsableData, C: UsableData> {
    #[error("Variable {0} is used in constraint {2} ({1}) but not explicitly declared")]
    UndeclaredVariableInConstraint(V, Constraint<V>, C),
    #[error("Variable {0} is used in objective function ({1}) but not explicitly declared")]
    UndeclaredVariableInObjFunc(V, LinExpr<V>),
}

pub type BuildResult<T, V, C> = std::result::Result<T, BuildError<V, C>>;

/// A fully-specified linear (or integer-linear) program.
///
/// Built exclusively through [`ProblemBuilder::build`].
#[derive(Debug, Clone)]
pub struct Problem<V: UsableData, C: UsableData> {
    constraints: Vec<(Constraint<V>, C)>,
    variables: BTreeMap<V, Variable>,
    objective_func: LinExpr<V>,
    objective_sense: ObjectiveSense,
}

impl<V: UsableData, C: UsableData> Problem<V, C> {
    pub fn into_builder(self) -> ProblemBuilder<V, C> {
        ProblemBuilder {
            constraints: self.constraints,
            variables: self.variables,
            objective_func: self.objective_func,
            objective_sense: self.objective_sense,
        }
    }

    pub fn get_constraints(&self) -> &[(Constraint<V>, C)] {
        &self.constraints[..]
    }

    pub fn get_variables(&self) -> &BTreeMap<V, Variable> {
        &self.variables
    }

    pub fn get_objective_function(&self) -> &LinExpr<V> {
        &self.objective_func
    }

    pub fn get_objective_sense(&self) -> ObjectiveSense {
        self.objective_sense
    }

    /// Checks a candidate assignment against every constraint without
    /// calling a solver, returning the indices (into
    /// [`Problem::get_constraints`]) of the constraints that are violated.
    ///
    /// Used by the legacy sampler and by tests to validate a solver's
    /// output independently of the solver itself.
    pub fn unsatisfied_constraints(&self, assignment: &BTreeMap<V, f64>) -> Vec<usize> {
        let value_of = |expr: &LinExpr<V>| -> f64 {
            expr.coefficients()
                .map(|(v, c)| c * assignment.get(v).copied().unwrap_or(0.0))
                .sum::<f64>()
                + expr.get_constant()
        };

        self.constraints
            .iter()
            .enumerate()
            .filter_map(|(i, (c, _))| {
                let v = value_of(c.get_lhs());
                let violated = match c.get_symbol() {
                    EqSymbol::Equals => v.abs() > 1e-6,
                    EqSymbol::LessThan => v > 1e-6,
                };
                violated.then_some(i)
            })
            .collect()
    }
}
