//! Random Sources
//!
//! All randomness used by wildcards and template functions goes through the
//! [`RandomSource`] trait so renders can be made reproducible (seeded) or
//! fully scripted in tests.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Largest value `random_seed()` may return.
pub const MAX_SEED: i64 = 1_125_899_906_842_624;

/// Uniform random draws used by the rendering pipeline.
pub trait RandomSource: Send + Sync {
    /// Integer in `[min, max]`. Callers guarantee `min <= max`.
    fn int_between(&self, min: i64, max: i64) -> i64;

    /// Float in `[min, max]`. Callers guarantee `min <= max`.
    fn float_between(&self, min: f64, max: f64) -> f64;

    /// Index in `[0, len)`. Callers guarantee `len > 0`.
    fn index(&self, len: usize) -> usize;
}

/// [`RandomSource`] backed by a locked [`StdRng`].
pub struct StdRandom {
    rng: Mutex<StdRng>,
}

impl StdRandom {
    /// Seeds from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for StdRandom {
    fn int_between(&self, min: i64, max: i64) -> i64 {
        self.with_rng(|rng| rng.random_range(min..=max))
    }

    fn float_between(&self, min: f64, max: f64) -> f64 {
        self.with_rng(|rng| rng.random_range(min..=max))
    }

    fn index(&self, len: usize) -> usize {
        self.with_rng(|rng| rng.random_range(0..len))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Scripted source: replays queued values and records every request.
    #[derive(Default)]
    pub(crate) struct ScriptedRandom {
        ints: Mutex<Vec<i64>>,
        floats: Mutex<Vec<f64>>,
        indices: Mutex<Vec<usize>>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl ScriptedRandom {
        pub(crate) fn with_ints(ints: Vec<i64>) -> Self {
            Self {
                ints: Mutex::new(ints),
                ..Self::default()
            }
        }

        pub(crate) fn with_floats(floats: Vec<f64>) -> Self {
            Self {
                floats: Mutex::new(floats),
                ..Self::default()
            }
        }

        pub(crate) fn with_indices(indices: Vec<usize>) -> Self {
            Self {
                indices: Mutex::new(indices),
                ..Self::default()
            }
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl RandomSource for ScriptedRandom {
        fn int_between(&self, min: i64, max: i64) -> i64 {
            self.record(format!("int({}, {})", min, max));
            let mut ints = self.ints.lock().unwrap();
            if ints.is_empty() { min } else { ints.remove(0) }
        }

        fn float_between(&self, min: f64, max: f64) -> f64 {
            self.record(format!("float({}, {})", min, max));
            let mut floats = self.floats.lock().unwrap();
            if floats.is_empty() { min } else { floats.remove(0) }
        }

        fn index(&self, len: usize) -> usize {
            self.record(format!("index({})", len));
            let mut indices = self.indices.lock().unwrap();
            if indices.is_empty() { 0 } else { indices.remove(0).min(len - 1) }
        }
    }
}
