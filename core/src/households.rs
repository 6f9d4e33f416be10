//! Household grouping.
//!
//! Two agents are in the same household iff every configured
//! address-match column compares equal. The original implementation did
//! this pairwise (`O(pool^2)`); per spec §9 this rewrite instead hashes
//! the concatenated address columns and groups by hash, which is the same
//! equivalence relation computed in linear time.

use crate::model::{AgentId, Pool};
use std::collections::BTreeMap;

/// A partition of agent ids by identical address-column tuples.
#[derive(Debug, Clone, Default)]
pub struct Households {
    /// Only households with >= 2 members are kept: singletons never
    /// constrain anything (spec §4.1: "for each household H with |H|>=2").
    groups: Vec<Vec<AgentId>>,
}

impl Households {
    /// Groups every agent in `pool` by its address-column tuple.
    ///
    /// When `enabled` is false, returns an empty partition (no
    /// constraints will be generated), matching `check_same_address =
    /// false`.
    pub fn compute(pool: &Pool, enabled: bool) -> Self {
        if !enabled {
            return Households { groups: Vec::new() };
        }

        let mut by_key: BTreeMap<Vec<String>, Vec<AgentId>> = BTreeMap::new();
        for agent in pool.agents.values() {
            by_key
                .entry(agent.address_columns.clone())
                .or_default()
                .push(agent.id.clone());
        }

        let groups = by_key
            .into_values()
            .filter(|members| members.len() >= 2)
            .collect();

        Households { groups }
    }

    pub fn groups(&self) -> &[Vec<AgentId>] {
        &self.groups[..]
    }

    /// True iff `panel` contains at most one agent from every household.
    pub fn respects(&self, panel: &std::collections::BTreeSet<AgentId>) -> bool {
        self.groups
            .iter()
            .all(|group| group.iter().filter(|id| panel.contains(*id)).count() <= 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Agent;
    use std::collections::BTreeMap as Map;

    fn agent(id: &str, address: &str) -> Agent {
        Agent {
            id: AgentId::from(id),
            features: Map::new(),
            address_columns: vec![address.to_string()],
            kept_columns: Map::new(),
        }
    }

    #[test]
    fn groups_by_identical_address() {
        let mut pool = Pool::default();
        for a in [
            agent("lisa", "742 Evergreen Terrace"),
            agent("scrooge", "742 Evergreen Terrace"),
            agent("louie", "Money Bin"),
            agent("dewey", "Money Bin"),
            agent("marge", "742 Evergreen Terrace... almost"),
        ] {
            pool.agents.insert(a.id.clone(), a);
        }

        let households = Households::compute(&pool, true);
        assert_eq!(households.groups().len(), 2);

        let mut panel = std::collections::BTreeSet::new();
        panel.insert(AgentId::from("lisa"));
        panel.insert(AgentId::from("scrooge"));
        assert!(!households.respects(&panel));

        let mut panel2 = std::collections::BTreeSet::new();
        panel2.insert(AgentId::from("lisa"));
        panel2.insert(AgentId::from("louie"));
        assert!(households.respects(&panel2));
    }

    #[test]
    fn disabled_check_produces_no_groups() {
        let pool = Pool::default();
        let households = Households::compute(&pool, false);
        assert!(households.groups().is_empty());
    }
}
