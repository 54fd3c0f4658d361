// ============================================================
// Layer 4: Seeded Shuffle and Train/Validation Split
// ============================================================
// The pair list arrives sorted by breed name. It is shuffled
// with a fixed seed, then the LAST `val_samples` pairs are held
// out for validation:
//
//   [p0 p1 p2 ... p(n-v-1) | p(n-v) ... p(n-1)]
//    └────── training ─────┘ └── validation ──┘
//
// The same seed always yields the same permutation, so the
// predict command can rebuild the exact validation set that
// training used.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom over a
// seeded StdRng.

use anyhow::{ensure, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Default seed for the pair shuffle
pub const DEFAULT_SPLIT_SEED: u64 = 1822;

/// Deterministically shuffle `items` with the given seed.
pub fn shuffle_pairs<T>(mut items: Vec<T>, seed: u64) -> Vec<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);
    items
}

/// Split `items` into (train, validation), moving the last
/// `val_samples` items into the validation set.
///
/// # Errors
/// Fails when the validation set would leave nothing to train on.
pub fn split_train_val<T>(mut items: Vec<T>, val_samples: usize) -> Result<(Vec<T>, Vec<T>)> {
    let total = items.len();
    ensure!(
        val_samples < total,
        "val_samples ({}) must be smaller than the number of samples ({})",
        val_samples,
        total
    );

    // split_off(n) removes elements [n..] from the Vec and returns them
    let val = items.split_off(total - val_samples);

    tracing::debug!(
        "Dataset split: {} training, {} validation ({}% / {}%)",
        items.len(),
        val.len(),
        (items.len() * 100) / total,
        (val.len()   * 100) / total,
    );

    Ok((items, val))
}
