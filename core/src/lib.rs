//! Stratified random panel sortition: feasibility modeling, quota
//! relaxation diagnostics, three fairness-optimal lottery algorithms
//! (maximin, leximin, Nash welfare), pipage rounding, and a legacy greedy
//! sampler kept for backward compatibility.
//!
//! [`driver::run`] is the single entry point a caller needs; the other
//! modules are exposed for callers (and tests) that want to drive a
//! specific stage directly.

pub mod driver;
pub mod error;
pub mod feasibility;
pub mod households;
pub mod initial_panels;
pub mod legacy;
pub mod leximin;
pub mod log;
pub mod lottery;
pub mod maximin;
pub mod model;
pub mod nash;
pub mod relax;
pub mod rng;
pub mod settings;
pub mod variables;

pub use driver::{run, RunOutput};
pub use error::{CoreError, CoreResult};
pub use log::DiagnosticLog;
pub use model::{
    Agent, AgentId, Categories, FeatureName, FeatureValue, Panel, PanelDistribution, Pool, Quota,
    ValueName,
};
pub use settings::{Algorithm, Settings};
