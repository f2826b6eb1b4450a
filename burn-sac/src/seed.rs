//! Derives every random stream of a run from one root seed.

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Hands out seeds for the backend, environments, replay buffers and loops.
///
/// Two sources built from the same root seed hand out the same sequence.
#[derive(Debug, Clone)]
pub struct SeedSource {
    rng: StdRng,
}

impl SeedSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_seed(&mut self) -> u64 {
        self.rng.gen()
    }

    /// A generator seeded with [`SeedSource::next_seed`].
    pub fn next_rng(&mut self) -> StdRng {
        StdRng::seed_from_u64(self.next_seed())
    }
}
