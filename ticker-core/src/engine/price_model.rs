//! Price perturbation models for scheduler ticks
//!
//! A model only proposes the next price. The store clamps the proposal to
//! the allowed price range and skips non-finite proposals.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::constants::MAX_PRICE_CHANGE_PCT;

/// Proposes the next price of an instrument on each tick
pub trait PriceModel: Send {
    fn next_price(&mut self, symbol: &str, current: f64) -> f64;

    /// Model name for logging
    fn name(&self) -> &'static str;
}

/// Uniform random walk: `current + current × U(-pct, +pct)`
#[derive(Debug, Clone)]
pub struct RandomWalk {
    rng: StdRng,
    max_change_pct: f64,
}

impl RandomWalk {
    /// Seeded when `seed` is given, otherwise from OS entropy
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            max_change_pct: MAX_PRICE_CHANGE_PCT,
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Some(seed))
    }

    pub fn with_max_change(mut self, pct: f64) -> Self {
        self.max_change_pct = pct.abs();
        self
    }

    pub fn max_change_pct(&self) -> f64 {
        self.max_change_pct
    }
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PriceModel for RandomWalk {
    fn next_price(&mut self, _symbol: &str, current: f64) -> f64 {
        if self.max_change_pct == 0.0 {
            return current;
        }
        let change = self.rng.gen_range(-self.max_change_pct..=self.max_change_pct);
        current + current * change
    }

    fn name(&self) -> &'static str {
        "RandomWalk"
    }
}
