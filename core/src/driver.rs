//! Top-level dispatch (spec §6, §9): validates settings, builds the
//! feasibility model, runs the requested algorithm, and rounds the
//! resulting distribution into concrete panels.

use crate::error::{CoreError, CoreResult};
use crate::feasibility::FeasibilityModel;
use crate::households::Households;
use crate::log::DiagnosticLog;
use crate::model::{Categories, Panel, Pool};
use crate::settings::{Algorithm, Settings};
use crate::variables::Var;
use crate::{initial_panels, legacy, leximin, lottery, maximin, nash, relax, rng};
use sortition_ilp::solvers::coin_cbc::CbcSolver;
use sortition_ilp::solvers::good_lp::ClarabelSolver;
use sortition_ilp::solvers::MipSolver;
use std::collections::BTreeSet;

pub struct RunOutput {
    pub panels: Vec<Panel>,
    pub log: DiagnosticLog,
}

/// Runs a full selection: feasibility check, (on infeasibility) quota
/// relaxation, algorithm dispatch, and lottery rounding.
///
/// `panel_size` is the target panel size k (spec §1's input (c)); it is
/// not part of [`Settings`] because it is a per-run parameter of the
/// selection, not a persisted configuration value.
pub fn run(pool: &Pool, categories: &Categories, panel_size: u32, settings: &Settings) -> CoreResult<RunOutput> {
    settings.validate()?;

    let mut log = DiagnosticLog::new();
    let households = Households::compute(pool, settings.check_same_address);
    let mip_solver = CbcSolver::default();
    let model = FeasibilityModel::new(pool, categories, &households, panel_size);

    ensure_feasible(&model, &mip_solver, &mut log)?;

    if settings.test_selection {
        log.push("test_selection: returning the first feasible panel with no optimization".to_string());
        let panel = match crate::feasibility::solve_panel(&model.build_plain(), &mip_solver) {
            crate::feasibility::FeasibilityOutcome::Feasible(panel) => panel,
            _ => return Err(CoreError::SolverFailure),
        };
        return Ok(RunOutput {
            panels: vec![panel],
            log,
        });
    }

    let mut rng = rng::rng_from_seed(settings.random_number_seed);

    let panels = match settings.selection_algorithm {
        Algorithm::Legacy => {
            let mut panels = Vec::with_capacity(settings.number_selections as usize);
            for _ in 0..settings.number_selections {
                let panel = legacy::sample(
                    pool,
                    categories,
                    &households,
                    panel_size,
                    settings.max_attempts,
                    &mut rng,
                )?;
                panels.push(panel);
            }
            panels
        }
        Algorithm::Maximin => {
            let seed_rounds = (pool.len() / 2).max(1);
            let seed = initial_panels::generate(&model, seed_rounds, &mip_solver, &mut log);
            log_uncoverable(&seed.uncoverable, &mut log);
            let coverable = coverable_set(pool, &seed.uncoverable);

            let lp_solver = ClarabelSolver::new();
            let result = maximin::optimize(&model, seed.panels, &coverable, &mip_solver, &lp_solver, &mut log);
            lottery::round(&result.distribution, settings.number_selections, &mut rng)
        }
        Algorithm::Leximin => {
            let seed_rounds = pool.len().max(1);
            let seed = initial_panels::generate(&model, seed_rounds, &mip_solver, &mut log);
            log_uncoverable(&seed.uncoverable, &mut log);
            let coverable = coverable_set(pool, &seed.uncoverable);

            let lp_solver = ClarabelSolver::new();
            let result = leximin::optimize(&model, seed.panels, &coverable, &mip_solver, &lp_solver, &mut log);
            lottery::round(&result.distribution, settings.number_selections, &mut rng)
        }
        Algorithm::Nash => {
            let seed_rounds = pool.len().max(1);
            let seed = initial_panels::generate(&model, seed_rounds, &mip_solver, &mut log);
            log_uncoverable(&seed.uncoverable, &mut log);
            let coverable = coverable_set(pool, &seed.uncoverable);

            let result = nash::optimize(&model, seed.panels, &coverable, &mip_solver, &mut log);
            lottery::round(&result.distribution, settings.number_selections, &mut rng)
        }
    };

    Ok(RunOutput { panels, log })
}

fn coverable_set(pool: &Pool, uncoverable: &[crate::model::AgentId]) -> BTreeSet<crate::model::AgentId> {
    let excluded: BTreeSet<_> = uncoverable.iter().cloned().collect();
    pool.ids().filter(|id| !excluded.contains(*id)).cloned().collect()
}

fn log_uncoverable(uncoverable: &[crate::model::AgentId], log: &mut DiagnosticLog) {
    if !uncoverable.is_empty() {
        log.push(format!(
            "{} agent(s) cannot appear on any feasible panel and will receive probability 0",
            uncoverable.len()
        ));
    }
}

/// Checks the base feasibility ILP; on infeasibility, runs the quota
/// relaxer and surfaces its suggestion, per spec §4.1's error semantics.
fn ensure_feasible(
    model: &FeasibilityModel<'_>,
    mip_solver: &dyn MipSolver<Var, String>,
    log: &mut DiagnosticLog,
) -> CoreResult<()> {
    match model.find_any_panel(mip_solver) {
        crate::feasibility::FeasibilityOutcome::Feasible(_) => Ok(()),
        crate::feasibility::FeasibilityOutcome::SolverFailure => Err(CoreError::SolverFailure),
        crate::feasibility::FeasibilityOutcome::Infeasible => {
            log.push("base feasibility ILP is infeasible, invoking the quota relaxer".to_string());
            let suggestion = relax::relax(
                model.pool,
                model.categories,
                model.households,
                model.k,
                &[],
                mip_solver,
            );
            match suggestion {
                Some(suggestion) => Err(CoreError::InfeasibleQuotas { suggestion }),
                None => Err(CoreError::InfeasibleQuotasCantRelax),
            }
        }
    }
}
