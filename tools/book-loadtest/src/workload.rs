use std::ops::RangeInclusive;

use clap::ValueEnum;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// How virtual users pick the book id for an iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// every VU draws from the whole range, so VUs race on the same books
    #[default]
    Shared,
    /// each VU owns a disjoint slice of the range
    Partitioned,
}

#[derive(Debug)]
pub struct IdGenerator {
    range: RangeInclusive<u32>,
    rng: StdRng,
}

impl IdGenerator {
    /// `vus` must not exceed `max_id` for [`IdStrategy::Partitioned`], config
    /// validation guarantees it.
    pub fn for_vu(
        strategy: IdStrategy,
        max_id: u32,
        vus: usize,
        vu_index: usize,
        seed: Option<u64>,
    ) -> Self {
        let range = id_range(strategy, max_id, vus, vu_index);
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(mix(seed, vu_index as u64)),
            None => StdRng::from_entropy(),
        };
        Self { range, rng }
    }

    pub fn range(&self) -> RangeInclusive<u32> {
        self.range.clone()
    }

    pub fn next_id(&mut self) -> u32 {
        self.rng.gen_range(self.range.clone())
    }
}

pub fn id_range(
    strategy: IdStrategy,
    max_id: u32,
    vus: usize,
    vu_index: usize,
) -> RangeInclusive<u32> {
    match strategy {
        IdStrategy::Shared => 1..=max_id,
        IdStrategy::Partitioned => {
            let max = max_id as u64;
            let vus = vus.max(1) as u64;
            let index = vu_index as u64 % vus;
            let lo = index * max / vus + 1;
            let hi = (index + 1) * max / vus;
            // hi >= lo whenever vus <= max_id
            (lo as u32)..=(hi.max(lo) as u32)
        }
    }
}

fn mix(seed: u64, vu_index: u64) -> u64 {
    vu_index.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ seed.rotate_left(17)
}
