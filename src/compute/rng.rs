//! Shared random number source for breeding and selection.
//!
//! Every stochastic decision in the engine draws from a [`SharedRng`]. The
//! generator is wrapped in a lock so one instance can be handed to every
//! breeder and selector of every solver thread.

use parking_lot::Mutex;
use rand::prelude::*;

/// Magnitude bound (exclusive) for [`SharedRng::small_int`].
pub const SMALL_INT_BOUND: i64 = 10_000;

/// Thread-safe random number generator wrapper.
pub struct SharedRng {
    rng: Mutex<StdRng>,
}

impl SharedRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Create with random seed.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Uniform non-negative integer.
    pub fn int(&self) -> u64 {
        self.rng.lock().gen_range(0..=i64::MAX as u64)
    }

    /// Uniform integer in `[0, bound)`. Returns 0 when `bound` is 0.
    pub fn below(&self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        self.rng.lock().gen_range(0..bound)
    }

    /// Signed integer with magnitude below [`SMALL_INT_BOUND`].
    pub fn small_int(&self) -> i64 {
        let mut rng = self.rng.lock();
        let value = rng.gen_range(0..SMALL_INT_BOUND);
        if rng.r#gen::<f64>() < 0.5 { -value } else { value }
    }

    /// Float in `[0, 1)`.
    pub fn float(&self) -> f64 {
        self.rng.lock().r#gen()
    }

    /// True with probability `p`.
    pub fn chance(&self, p: f64) -> bool {
        self.float() < p
    }

    /// Pick one element uniformly.
    pub fn pick<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut *self.rng.lock())
    }
}

impl Default for SharedRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl std::fmt::Debug for SharedRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRng").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_seeded_replay() {
        let a = SharedRng::new(42);
        let b = SharedRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.int(), b.int());
        }
    }

    #[test]
    fn test_small_int_bounds() {
        let rng = SharedRng::new(7);
        let mut saw_negative = false;
        for _ in 0..1000 {
            let v = rng.small_int();
            assert!(v.abs() < SMALL_INT_BOUND);
            saw_negative |= v < 0;
        }
        assert!(saw_negative);
    }

    #[test]
    fn test_below_zero_bound() {
        let rng = SharedRng::new(1);
        assert_eq!(rng.below(0), 0);
        for _ in 0..100 {
            assert!(rng.below(3) < 3);
        }
    }

    #[test]
    fn test_float_range() {
        let rng = SharedRng::new(3);
        for _ in 0..1000 {
            let f = rng.float();
            assert!((0.0..1.0).contains(&f));
        }
    }

    #[test]
    fn test_concurrent_use() {
        let rng = Arc::new(SharedRng::new(9));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rng = Arc::clone(&rng);
                std::thread::spawn(move || (0..1000).map(|_| rng.below(10)).sum::<usize>())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap() < 10_000);
        }
    }
}
