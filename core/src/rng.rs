//! Seeded randomness (spec §5, §13): a zero seed draws from entropy, any
//! other seed is reproduced deterministically via `StdRng`.

use rand::rngs::StdRng;
use rand::SeedableRng;

pub fn rng_from_seed(seed: u64) -> StdRng {
    if seed == 0 {
        StdRng::from_entropy()
    } else {
        StdRng::seed_from_u64(seed)
    }
}
