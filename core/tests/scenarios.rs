//! End-to-end scenarios (spec §8): concrete inputs with known-correct
//! maximin outputs, an infeasible-quota case, and pipage rounding's
//! statistical guarantee.

use rand::SeedableRng;
use sortition_core::feasibility::FeasibilityModel;
use sortition_core::households::Households;
use sortition_core::log::DiagnosticLog;
use sortition_core::model::{Agent, AgentId, Categories, FeatureName, FeatureValue, Panel, Pool, Quota, ValueName};
use sortition_core::{driver, initial_panels, maximin, Algorithm, Settings};
use sortition_ilp::solvers::coin_cbc::CbcSolver;
use sortition_ilp::solvers::good_lp::ClarabelSolver;
use std::collections::BTreeMap;

const MARGIN: f64 = 1e-4;

fn feature_value(feature: &str, value: &str) -> FeatureValue {
    FeatureValue {
        feature: FeatureName::from(feature),
        value: ValueName::from(value),
    }
}

fn agent(id: &str, pairs: &[(&str, &str)]) -> Agent {
    let mut features = BTreeMap::new();
    for (f, v) in pairs {
        features.insert(FeatureName::from(*f), ValueName::from(*v));
    }
    Agent {
        id: AgentId::from(id),
        features,
        address_columns: Vec::new(),
        kept_columns: BTreeMap::new(),
    }
}

fn pool(agents: Vec<Agent>) -> Pool {
    let mut pool = Pool::default();
    for a in agents {
        pool.agents.insert(a.id.clone(), a);
    }
    pool
}

fn quota(min: u32, max: u32) -> Quota {
    Quota {
        min,
        max,
        min_flex: 0,
        max_flex: max.max(10),
    }
}

fn panel(ids: &[&str]) -> Panel {
    ids.iter().map(|s| AgentId::from(*s)).collect()
}

fn settings(algorithm: Algorithm, number_selections: u32, seed: u64) -> Settings {
    Settings {
        selection_algorithm: algorithm,
        number_selections,
        random_number_seed: seed,
        ..Settings::default()
    }
}

/// Runs maximin column generation directly on a pool/categories pair,
/// bypassing `driver::run` so the test can assert on the underlying
/// [`sortition_core::model::PanelDistribution`] (exact probabilities and
/// marginals) rather than just a single rounded panel.
fn run_maximin(pool: &Pool, categories: &Categories, panel_size: u32) -> sortition_core::model::PanelDistribution {
    let households = Households::compute(pool, false);
    let model = FeasibilityModel::new(pool, categories, &households, panel_size);
    let mip_solver = CbcSolver::default();
    let mut log = DiagnosticLog::new();

    let seed_rounds = (pool.len() / 2).max(1);
    let seed = initial_panels::generate(&model, seed_rounds, &mip_solver, &mut log);
    let excluded: std::collections::BTreeSet<_> = seed.uncoverable.iter().cloned().collect();
    let coverable: std::collections::BTreeSet<_> = pool.ids().filter(|id| !excluded.contains(*id)).cloned().collect();

    let lp_solver = ClarabelSolver::new();
    let result = maximin::optimize(&model, seed.panels, &coverable, &mip_solver, &lp_solver, &mut log);
    result.distribution
}

#[test]
fn scenario_a_two_features_maximin() {
    let pool = pool(vec![
        agent("lisa", &[("age", "child"), ("franchise", "simpsons")]),
        agent("marge", &[("age", "adult"), ("franchise", "simpsons")]),
        agent("louie", &[("age", "child"), ("franchise", "ducktales")]),
        agent("dewey", &[("age", "child"), ("franchise", "ducktales")]),
        agent("scrooge", &[("age", "adult"), ("franchise", "ducktales")]),
    ]);

    let mut categories = Categories::default();
    categories.quotas.insert(feature_value("age", "child"), quota(1, 2));
    categories.quotas.insert(feature_value("age", "adult"), quota(1, 2));
    categories.quotas.insert(feature_value("franchise", "simpsons"), quota(1, 2));
    categories.quotas.insert(feature_value("franchise", "ducktales"), quota(1, 2));

    let distribution = run_maximin(&pool, &categories, 2);

    let possible = [
        panel(&["lisa", "scrooge"]),
        panel(&["marge", "louie"]),
        panel(&["marge", "dewey"]),
    ];
    let mut mass_per_panel: BTreeMap<Panel, f64> = BTreeMap::new();
    for (p, prob) in distribution.panels.iter().zip(distribution.probabilities.iter()) {
        assert!(possible.contains(p), "panel {p:?} is not one of the expected maximin panels");
        *mass_per_panel.entry(p.clone()).or_insert(0.0) += prob;
    }
    for p in &possible {
        let mass = mass_per_panel.get(p).copied().unwrap_or(0.0);
        assert!((mass - 1.0 / 3.0).abs() < MARGIN, "expected panel {p:?} at probability 1/3, got {mass}");
    }

    assert!((distribution.marginal(&AgentId::from("lisa")) - 1.0 / 3.0).abs() < MARGIN);
    assert!((distribution.marginal(&AgentId::from("scrooge")) - 1.0 / 3.0).abs() < MARGIN);
    assert!((distribution.marginal(&AgentId::from("louie")) - 1.0 / 3.0).abs() < MARGIN);
    assert!((distribution.marginal(&AgentId::from("dewey")) - 1.0 / 3.0).abs() < MARGIN);
    assert!((distribution.marginal(&AgentId::from("marge")) - 2.0 / 3.0).abs() < MARGIN);
}

#[test]
fn scenario_b_households_zero_out_marginals() {
    let mut pool = pool(vec![
        agent("lisa", &[("age", "child"), ("franchise", "simpsons")]),
        agent("marge", &[("age", "adult"), ("franchise", "simpsons")]),
        agent("louie", &[("age", "child"), ("franchise", "ducktales")]),
        agent("dewey", &[("age", "child"), ("franchise", "ducktales")]),
        agent("scrooge", &[("age", "adult"), ("franchise", "ducktales")]),
    ]);
    for (id, addr) in [("lisa", "house1"), ("scrooge", "house1"), ("louie", "house2"), ("dewey", "house2")] {
        pool.agents.get_mut(&AgentId::from(id)).unwrap().address_columns = vec![addr.to_string()];
    }
    pool.agents.get_mut(&AgentId::from("marge")).unwrap().address_columns = vec!["house3".to_string()];

    let mut categories = Categories::default();
    categories.quotas.insert(feature_value("age", "child"), quota(1, 2));
    categories.quotas.insert(feature_value("age", "adult"), quota(1, 2));
    categories.quotas.insert(feature_value("franchise", "simpsons"), quota(1, 2));
    categories.quotas.insert(feature_value("franchise", "ducktales"), quota(1, 2));

    let households = Households::compute(&pool, true);
    let model = FeasibilityModel::new(&pool, &categories, &households, 2);
    let mip_solver = CbcSolver::default();
    let mut log = DiagnosticLog::new();

    let seed_rounds = (pool.len() / 2).max(1);
    let seed = initial_panels::generate(&model, seed_rounds, &mip_solver, &mut log);
    let excluded: std::collections::BTreeSet<_> = seed.uncoverable.iter().cloned().collect();
    let coverable: std::collections::BTreeSet<_> = pool.ids().filter(|id| !excluded.contains(*id)).cloned().collect();

    let lp_solver = ClarabelSolver::new();
    let result = maximin::optimize(&model, seed.panels, &coverable, &mip_solver, &lp_solver, &mut log);

    assert!(result.distribution.marginal(&AgentId::from("lisa")) < MARGIN);
    assert!(result.distribution.marginal(&AgentId::from("scrooge")) < MARGIN);
}

#[test]
fn scenario_c_forced_inclusion() {
    let pool = pool(vec![
        agent("a", &[("f1", "v1"), ("f2", "v1"), ("f3", "v1")]),
        agent("b", &[("f1", "v1"), ("f2", "v2"), ("f3", "v2")]),
        agent("c", &[("f1", "v2"), ("f2", "v1"), ("f3", "v2")]),
        agent("d", &[("f1", "v2"), ("f2", "v2"), ("f3", "v1")]),
    ]);

    let mut categories = Categories::default();
    for f in ["f1", "f2", "f3"] {
        categories.quotas.insert(feature_value(f, "v1"), quota(1, 2));
        categories.quotas.insert(feature_value(f, "v2"), quota(0, 2));
    }

    let output = driver::run(&pool, &categories, 2, &settings(Algorithm::Maximin, 1, 7)).unwrap();
    assert!(output.panels[0].contains(&AgentId::from("a")));
}

#[test]
fn scenario_d_infeasible_quotas_suggest_a_relaxation() {
    let pool = pool(vec![
        agent("a", &[("f1", "v1"), ("f2", "v1"), ("f3", "v1")]),
        agent("b", &[("f1", "v1"), ("f2", "v2"), ("f3", "v2")]),
        agent("c", &[("f1", "v2"), ("f2", "v1"), ("f3", "v2")]),
        agent("d", &[("f1", "v2"), ("f2", "v2"), ("f3", "v1")]),
    ]);

    let mut categories = Categories::default();
    for f in ["f1", "f2", "f3"] {
        categories.quotas.insert(feature_value(f, "v1"), quota(1, 1));
        categories.quotas.insert(feature_value(f, "v2"), quota(0, 2));
    }

    let err = driver::run(&pool, &categories, 2, &settings(Algorithm::Maximin, 1, 7)).unwrap_err();
    match err {
        sortition_core::CoreError::InfeasibleQuotas { suggestion } => {
            assert!(!suggestion.relaxations.is_empty());
        }
        other => panic!("expected InfeasibleQuotas, got {other:?}"),
    }
}

#[test]
fn scenario_f_pipage_rounding_resolves_integer_fractions() {
    let distribution = sortition_core::PanelDistribution::new(
        vec![panel(&["a", "b"]), panel(&["c", "d"])],
        vec![0.3, 0.7],
    );
    let mut rng = rand::rngs::StdRng::seed_from_u64(99);
    let rounded = sortition_core::lottery::round(&distribution, 10, &mut rng);

    let p1_count = rounded.iter().filter(|p| **p == panel(&["a", "b"])).count();
    let p2_count = rounded.iter().filter(|p| **p == panel(&["c", "d"])).count();
    assert_eq!(p1_count, 3);
    assert_eq!(p2_count, 7);
}

#[test]
fn universal_property_panel_size_and_probabilities() {
    let pool = pool(vec![
        agent("lisa", &[("age", "child"), ("franchise", "simpsons")]),
        agent("marge", &[("age", "adult"), ("franchise", "simpsons")]),
        agent("louie", &[("age", "child"), ("franchise", "ducktales")]),
        agent("dewey", &[("age", "child"), ("franchise", "ducktales")]),
        agent("scrooge", &[("age", "adult"), ("franchise", "ducktales")]),
    ]);

    let mut categories = Categories::default();
    categories.quotas.insert(feature_value("age", "child"), quota(1, 2));
    categories.quotas.insert(feature_value("age", "adult"), quota(1, 2));
    categories.quotas.insert(feature_value("franchise", "simpsons"), quota(1, 2));
    categories.quotas.insert(feature_value("franchise", "ducktales"), quota(1, 2));

    let output = driver::run(&pool, &categories, 2, &settings(Algorithm::Maximin, 5, 5)).unwrap();
    assert_eq!(output.panels.len(), 5);
    for p in &output.panels {
        assert_eq!(p.len(), 2);
    }
}
