//! Choosing which streamlines a command works on.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

/// A request for a subset of streamline indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    /// The first `n` streamlines, clamped to the collection size.
    First(usize),
    /// `count` indices drawn uniformly at random.
    Sample {
        count: usize,
        seed: Option<u64>,
        replace: bool,
    },
}

impl Selection {
    /// Resolve to concrete indices for a collection of `len` streamlines.
    pub fn resolve(&self, len: usize) -> Vec<usize> {
        match *self {
            Selection::All => (0..len).collect(),
            Selection::First(n) => (0..n.min(len)).collect(),
            Selection::Sample {
                count,
                seed,
                replace,
            } => {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                sample(&mut rng, len, count, replace)
            }
        }
    }
}

fn sample(rng: &mut StdRng, len: usize, count: usize, replace: bool) -> Vec<usize> {
    if len == 0 {
        if count > 0 {
            warn!(count, "cannot sample from an empty tractogram");
        }
        return Vec::new();
    }
    if replace || count > len {
        if !replace {
            warn!(count, len, "sample exceeds streamline count, sampling with replacement");
        }
        return (0..count).map(|_| rng.gen_range(0..len)).collect();
    }
    rand::seq::index::sample(rng, len, count).into_vec()
}
