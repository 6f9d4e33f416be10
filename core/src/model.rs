//! The data model described in spec §3: features/quotas, agents,
//! households, panels and panel distributions.
//!
//! Mirrors the domain-state crates this workspace is grounded on
//! (`state-colloscopes`): plain, serde-derived structs with no hidden
//! mutable state, collected into maps keyed by newtype identifiers.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifies one respondent in the pool.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        AgentId(s.to_string())
    }
}

/// Identifies a categorical feature (e.g. "age").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureName(pub String);

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FeatureName {
    fn from(s: &str) -> Self {
        FeatureName(s.to_string())
    }
}

/// Identifies one value of a feature (e.g. "18-24").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValueName(pub String);

impl fmt::Display for ValueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ValueName {
    fn from(s: &str) -> Self {
        ValueName(s.to_string())
    }
}

/// A (feature, value) pair, used as the key of the quota table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureValue {
    pub feature: FeatureName,
    pub value: ValueName,
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.feature, self.value)
    }
}

/// Hard and flex quota bounds for one (feature, value) pair (spec §3).
///
/// Invariant: `0 <= min_flex <= min <= max <= max_flex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub min: u32,
    pub max: u32,
    pub min_flex: u32,
    pub max_flex: u32,
}

impl Quota {
    pub fn is_consistent(&self) -> bool {
        self.min_flex <= self.min && self.min <= self.max && self.max <= self.max_flex
    }
}

/// The full categories table: quotas for every (feature, value) pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Categories {
    pub quotas: BTreeMap<FeatureValue, Quota>,
}

impl Categories {
    /// All distinct feature names, in the order their first value appears.
    pub fn features(&self) -> BTreeSet<FeatureName> {
        self.quotas.keys().map(|fv| fv.feature.clone()).collect()
    }
}

/// One respondent in the pool.
///
/// `features` must contain exactly one value for every feature named in
/// the categories table (spec §6.1's "unknown feature values ... rejected"
/// is enforced by the caller building this struct, not here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub features: BTreeMap<FeatureName, ValueName>,
    /// Address-match column values, used to compute households. Empty if
    /// household-exclusivity is disabled.
    pub address_columns: Vec<String>,
    /// Opaque passthrough payload (`columns_to_keep`), never interpreted
    /// by the core.
    pub kept_columns: BTreeMap<String, String>,
}

/// The full people table, keyed by agent id for O(1) lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pool {
    pub agents: BTreeMap<AgentId, Agent>,
}

impl Pool {
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &AgentId> {
        self.agents.keys()
    }
}

/// An unordered set of exactly `k` agent ids satisfying every quota and
/// (if enabled) household constraint.
pub type Panel = BTreeSet<AgentId>;

/// A finite mapping from panels to probabilities summing to 1.
#[derive(Debug, Clone, Default)]
pub struct PanelDistribution {
    pub panels: Vec<Panel>,
    pub probabilities: Vec<f64>,
}

impl PanelDistribution {
    pub fn new(panels: Vec<Panel>, probabilities: Vec<f64>) -> Self {
        assert_eq!(panels.len(), probabilities.len());
        PanelDistribution {
            panels,
            probabilities,
        }
    }

    /// Sum over panels containing `agent` of that panel's probability.
    pub fn marginal(&self, agent: &AgentId) -> f64 {
        self.panels
            .iter()
            .zip(self.probabilities.iter())
            .filter(|(panel, _)| panel.contains(agent))
            .map(|(_, p)| p)
            .sum()
    }

    /// Marginal probability for every agent appearing in at least one panel.
    pub fn marginals(&self) -> BTreeMap<AgentId, f64> {
        let mut out: BTreeMap<AgentId, f64> = BTreeMap::new();
        for (panel, p) in self.panels.iter().zip(self.probabilities.iter()) {
            for agent in panel {
                *out.entry(agent.clone()).or_insert(0.0) += p;
            }
        }
        out
    }
}
