//! The legacy greedy sampler of spec §4.7: builds a single panel directly
//! without any distribution, by repeatedly filling the (feature, value)
//! under the most selection pressure. Retained for compatibility with
//! runs that pin `selection_algorithm = "legacy"`.

use crate::error::{CoreError, CoreResult};
use crate::households::Households;
use crate::model::{AgentId, Categories, FeatureValue, Panel, Pool, Quota};
use rand::seq::IteratorRandom;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};

struct QuotaState {
    quota: Quota,
    selected: u32,
    remaining: u32,
}

struct State<'a> {
    pool: &'a Pool,
    households: &'a Households,
    remaining_agents: BTreeSet<AgentId>,
    by_feature_value: BTreeMap<FeatureValue, BTreeSet<AgentId>>,
    quotas: BTreeMap<FeatureValue, QuotaState>,
    panel: Panel,
}

impl<'a> State<'a> {
    fn new(pool: &'a Pool, categories: &Categories, households: &'a Households) -> Self {
        let remaining_agents: BTreeSet<AgentId> = pool.ids().cloned().collect();

        let mut by_feature_value: BTreeMap<FeatureValue, BTreeSet<AgentId>> = BTreeMap::new();
        for agent in pool.agents.values() {
            for (feature, value) in &agent.features {
                by_feature_value
                    .entry(FeatureValue {
                        feature: feature.clone(),
                        value: value.clone(),
                    })
                    .or_default()
                    .insert(agent.id.clone());
            }
        }

        let quotas = categories
            .quotas
            .iter()
            .map(|(fv, quota)| {
                let remaining = by_feature_value.get(fv).map_or(0, |s| s.len() as u32);
                (
                    fv.clone(),
                    QuotaState {
                        quota: *quota,
                        selected: 0,
                        remaining,
                    },
                )
            })
            .collect();

        State {
            pool,
            households,
            remaining_agents,
            by_feature_value,
            quotas,
            panel: Panel::new(),
        }
    }

    /// The (feature, value) under the most pressure, or `None` if every
    /// quota's minimum is already met (in which case any remaining agent
    /// may be picked).
    fn most_pressing(&self) -> CoreResult<Option<FeatureValue>> {
        let mut best: Option<(FeatureValue, f64)> = None;

        for (fv, state) in &self.quotas {
            if state.selected >= state.quota.min {
                continue;
            }

            let needed = state.quota.min - state.selected;
            if state.remaining < needed {
                return Err(CoreError::SelectionError(format!(
                    "{fv} needs {needed} more but only {} remain",
                    state.remaining
                )));
            }

            let ratio = needed as f64 / state.remaining as f64;
            if ratio > 1.0 {
                return Err(CoreError::SelectionError(format!(
                    "{fv} pressure ratio {ratio} exceeds 1, which should be impossible"
                )));
            }

            if best.as_ref().map_or(true, |(_, b)| ratio > *b) {
                best = Some((fv.clone(), ratio));
            }
        }

        Ok(best.map(|(fv, _)| fv))
    }

    fn pick_agent(&self, fv: Option<&FeatureValue>, rng: &mut impl Rng) -> CoreResult<AgentId> {
        let candidates: Vec<&AgentId> = match fv {
            Some(fv) => self
                .by_feature_value
                .get(fv)
                .into_iter()
                .flatten()
                .filter(|id| self.remaining_agents.contains(*id))
                .collect(),
            None => self.remaining_agents.iter().collect(),
        };

        candidates
            .into_iter()
            .choose(rng)
            .cloned()
            .ok_or_else(|| CoreError::SelectionError("no remaining agent to choose from".to_string()))
    }

    /// Removes `id` from the remaining pool, decrementing every quota's
    /// `remaining` count it contributed to. Does not touch `selected`.
    fn remove_from_pool(&mut self, id: &AgentId) -> CoreResult<()> {
        if !self.remaining_agents.remove(id) {
            return Ok(());
        }

        let Some(agent) = self.pool.agents.get(id) else {
            return Ok(());
        };

        for (feature, value) in &agent.features {
            let fv = FeatureValue {
                feature: feature.clone(),
                value: value.clone(),
            };
            if let Some(state) = self.quotas.get_mut(&fv) {
                state.remaining = state.remaining.saturating_sub(1);
                if state.remaining == 0 && state.selected < state.quota.min {
                    return Err(CoreError::SelectionError(format!(
                        "{fv} ran out of remaining agents before meeting its minimum"
                    )));
                }
            }
        }

        Ok(())
    }

    fn select(&mut self, id: AgentId) -> CoreResult<()> {
        let household_members: Vec<AgentId> = self
            .households
            .groups()
            .iter()
            .find(|group| group.contains(&id))
            .map(|group| group.iter().filter(|m| **m != id).cloned().collect())
            .unwrap_or_default();

        if let Some(agent) = self.pool.agents.get(&id) {
            for (feature, value) in &agent.features {
                let fv = FeatureValue {
                    feature: feature.clone(),
                    value: value.clone(),
                };
                if let Some(state) = self.quotas.get_mut(&fv) {
                    state.selected += 1;
                }
            }
        }

        self.panel.insert(id.clone());
        self.remove_from_pool(&id)?;

        for member in household_members {
            self.remove_from_pool(&member)?;
        }

        let maxed: Vec<FeatureValue> = self
            .quotas
            .iter()
            .filter(|(_, s)| s.selected == s.quota.max && s.quota.max > 0)
            .map(|(fv, _)| fv.clone())
            .collect();

        for fv in maxed {
            let others: Vec<AgentId> = self
                .by_feature_value
                .get(&fv)
                .into_iter()
                .flatten()
                .filter(|other| self.remaining_agents.contains(*other))
                .cloned()
                .collect();
            for other in others {
                self.remove_from_pool(&other)?;
            }
        }

        Ok(())
    }

    fn all_minimums_met(&self) -> bool {
        self.quotas.values().all(|s| s.selected >= s.quota.min)
    }
}

/// Attempts one pass of the greedy sampler, filling exactly `k` seats.
fn sample_once(
    pool: &Pool,
    categories: &Categories,
    households: &Households,
    k: u32,
    rng: &mut impl Rng,
) -> CoreResult<Panel> {
    let mut state = State::new(pool, categories, households);

    for _ in 0..k {
        let pressing = state.most_pressing()?;
        let agent = state.pick_agent(pressing.as_ref(), rng)?;
        state.select(agent)?;
    }

    if !state.all_minimums_met() {
        return Err(CoreError::SelectionError(
            "final panel does not meet every lower quota".to_string(),
        ));
    }

    Ok(state.panel)
}

/// Runs [`sample_once`] up to `max_attempts` times, returning the first
/// successful panel.
pub fn sample(
    pool: &Pool,
    categories: &Categories,
    households: &Households,
    k: u32,
    max_attempts: u32,
    rng: &mut impl Rng,
) -> CoreResult<Panel> {
    let mut last_error = CoreError::SelectionError("max_attempts was zero".to_string());

    for _ in 0..max_attempts.max(1) {
        match sample_once(pool, categories, households, k, rng) {
            Ok(panel) => return Ok(panel),
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Agent, FeatureName, ValueName};
    use rand::SeedableRng;
    use std::collections::BTreeMap as Map;

    fn agent(id: &str, gender: &str) -> Agent {
        let mut features = Map::new();
        features.insert(FeatureName::from("gender"), ValueName::from(gender));
        Agent {
            id: AgentId::from(id),
            features,
            address_columns: Vec::new(),
            kept_columns: Map::new(),
        }
    }

    #[test]
    fn fills_a_simple_panel() {
        let mut pool = Pool::default();
        for (id, g) in [("a", "m"), ("b", "m"), ("c", "f"), ("d", "f")] {
            let a = agent(id, g);
            pool.agents.insert(a.id.clone(), a);
        }

        let mut categories = Categories::default();
        categories.quotas.insert(
            FeatureValue {
                feature: FeatureName::from("gender"),
                value: ValueName::from("m"),
            },
            Quota { min: 1, max: 2, min_flex: 0, max_flex: 2 },
        );
        categories.quotas.insert(
            FeatureValue {
                feature: FeatureName::from("gender"),
                value: ValueName::from("f"),
            },
            Quota { min: 1, max: 2, min_flex: 0, max_flex: 2 },
        );

        let households = Households::compute(&pool, false);
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let panel = sample(&pool, &categories, &households, 2, 10, &mut rng).unwrap();
        assert_eq!(panel.len(), 2);
    }
}
