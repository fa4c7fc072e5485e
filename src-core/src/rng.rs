//! Process-wide pseudo-random source.
//!
//! Every stochastic component (population seeding, velocity draws, poll
//! direction spans) draws from one logical generator so that a single
//! `seed` call at the start of a run makes the whole run reproducible.
//! The generator lives behind a mutex; the methods only touch it from the
//! driver thread, so the lock is uncontended in practice.

use rand::prelude::*;
use rand::rngs::StdRng;
use std::sync::{LazyLock, Mutex};

static SOURCE: LazyLock<Mutex<StdRng>> = LazyLock::new(|| Mutex::new(StdRng::seed_from_u64(1)));

/// Reseed the process-wide generator.  Call once before the driver starts
/// for a deterministic run.
pub fn seed(s: u64) {
    *SOURCE.lock().unwrap() = StdRng::seed_from_u64(s);
}

/// Uniform sample in `[0, 1)`.
pub fn random_f64() -> f64 {
    SOURCE.lock().unwrap().random::<f64>()
}

/// Uniform sample in `[low, up)`.
pub fn uniform(low: f64, up: f64) -> f64 {
    low + random_f64() * (up - low)
}

/// Uniform integer in `[0, n)`.
pub fn below(n: usize) -> usize {
    SOURCE.lock().unwrap().random_range(0..n)
}

/// A random permutation of `0..n`.
pub fn perm(n: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..n).collect();
    idx.shuffle(&mut *SOURCE.lock().unwrap());
    idx
}
