//! Pipage lottery rounding (spec §4.8), plus the `number_selections == 1`
//! fast path supplemented from the original implementation (spec §15):
//! when only one panel is ever needed there is no point building the
//! fractional-slot machinery just to round a single weighted draw.

use crate::model::{Panel, PanelDistribution};
use rand::Rng;

/// Guards against division by zero and spurious pipage branches (spec
/// §6.3): anything within this tolerance of 0 or 1 is treated as exact.
pub const EPS2: f64 = 1e-8;

/// Rounds `distribution` down to exactly `n` concrete panels, preserving
/// each panel's marginal inclusion probability exactly (pipage rounding).
///
/// `n == 1` takes the fast path: a single draw weighted by probability,
/// skipping the fractional-slot bookkeeping entirely.
pub fn round(distribution: &PanelDistribution, n: u32, rng: &mut impl Rng) -> Vec<Panel> {
    assert!(n >= 1, "number_selections must be >= 1");

    if n == 1 {
        return vec![weighted_single_draw(distribution, rng)];
    }

    let n = n as usize;
    let mut output = Vec::with_capacity(n);
    let mut fractional: Vec<(Panel, f64)> = Vec::new();

    for (panel, p) in distribution.panels.iter().zip(distribution.probabilities.iter()) {
        let scaled = n as f64 * p;
        let whole = scaled.floor();
        let frac = scaled - whole;
        for _ in 0..(whole as usize) {
            output.push(panel.clone());
        }
        if frac > EPS2 {
            fractional.push((panel.clone(), frac));
        }
    }

    output.extend(pipage(fractional, rng));

    // Floating-point slack can leave the output one short or one over;
    // spec guarantees length n exactly, so trim or pad from the input
    // distribution itself as a last resort.
    while output.len() < n {
        output.push(weighted_single_draw(distribution, rng));
    }
    output.truncate(n);

    output
}

fn weighted_single_draw(distribution: &PanelDistribution, rng: &mut impl Rng) -> Panel {
    let total: f64 = distribution.probabilities.iter().sum();
    let mut target = rng.gen_range(0.0..total.max(f64::MIN_POSITIVE));
    for (panel, p) in distribution.panels.iter().zip(distribution.probabilities.iter()) {
        if target < *p {
            return panel.clone();
        }
        target -= p;
    }
    distribution
        .panels
        .last()
        .cloned()
        .unwrap_or_default()
}

/// The pipage procedure itself: repeatedly picks the first two
/// still-fractional items and randomly moves probability mass between
/// them until one of the two becomes integral, finalizing it.
fn pipage(mut items: Vec<(Panel, f64)>, rng: &mut impl Rng) -> Vec<Panel> {
    let mut finalized = Vec::new();

    while items.len() >= 2 {
        let (panel0, mut q0) = items.remove(0);
        let (panel1, mut q1) = items.remove(0);

        loop {
            let a = (1.0 - q0).min(q1);
            let b = q0.min(1.0 - q1);

            if a + b <= EPS2 {
                // Degenerate: both already at an integral value. Each
                // finalizes independently on its own rounded side.
                if q0 >= 1.0 - EPS2 {
                    finalized.push(panel0.clone());
                }
                if q1 >= 1.0 - EPS2 {
                    finalized.push(panel1.clone());
                }
                break;
            }

            if rng.gen_bool(b / (a + b)) {
                q0 += a;
                q1 -= a;
            } else {
                q0 -= b;
                q1 += b;
            }

            if q0 <= EPS2 || q0 >= 1.0 - EPS2 {
                if q0 >= 1.0 - EPS2 {
                    finalized.push(panel0.clone());
                }
                if q1 > EPS2 {
                    items.insert(0, (panel1.clone(), q1));
                }
                break;
            }
            if q1 <= EPS2 || q1 >= 1.0 - EPS2 {
                if q1 >= 1.0 - EPS2 {
                    finalized.push(panel1.clone());
                }
                if q0 > EPS2 {
                    items.insert(0, (panel0.clone(), q0));
                }
                break;
            }
        }
    }

    if let Some((panel, q)) = items.into_iter().next() {
        if rng.gen_bool(q.clamp(0.0, 1.0)) {
            finalized.push(panel);
        }
    }

    finalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AgentId;
    use rand::SeedableRng;

    fn panel(ids: &[&str]) -> Panel {
        ids.iter().map(|s| AgentId::from(*s)).collect()
    }

    #[test]
    fn rounds_to_exactly_n_panels() {
        let distribution = PanelDistribution::new(
            vec![panel(&["a", "b"]), panel(&["a", "c"]), panel(&["b", "c"])],
            vec![0.5, 0.3, 0.2],
        );
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let rounded = round(&distribution, 10, &mut rng);
        assert_eq!(rounded.len(), 10);
    }

    #[test]
    fn single_selection_is_a_weighted_draw() {
        let distribution = PanelDistribution::new(vec![panel(&["a"]), panel(&["b"])], vec![1.0, 0.0]);
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let rounded = round(&distribution, 1, &mut rng);
        assert_eq!(rounded, vec![panel(&["a"])]);
    }
}
