//! The error taxonomy of spec §7.
//!
//! One `thiserror` variant per failure mode, each carrying the data the
//! spec says callers need. Legacy `SelectionError` is the only variant the
//! driver retries internally (spec §7: "Legacy failures are the only ones
//! retried; all others propagate immediately").

use crate::model::FeatureValue;
use crate::relax::RelaxationSuggestion;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("input error: {0}")]
    InputError(String),

    #[error("no feasible panel exists for the given quotas")]
    InfeasibleQuotas {
        suggestion: RelaxationSuggestion,
    },

    #[error("no feasible panel exists even after relaxing quotas to their flex bounds")]
    InfeasibleQuotasCantRelax,

    #[error("solver returned a non-optimal, non-infeasible status")]
    SolverFailure,

    #[error("unknown selection algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("legacy selection failed: {0}")]
    SelectionError(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn missing_quota(fv: &FeatureValue) -> Self {
        CoreError::InputError(format!("no quota declared for {fv}"))
    }
}
