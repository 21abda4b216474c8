use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// One pass over every symbol, in a fixed shuffled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    index: usize,
    order: Vec<usize>,
    cursor: usize,
}

impl Run {
    pub fn new(index: usize, order: Vec<usize>) -> Self {
        Self {
            index,
            order,
            cursor: 0,
        }
    }

    /// Zero-based run index within the session.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.order.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.order.len()
    }

    /// Dequeues the next target as `(trial number from 1, symbol index)`.
    pub fn next_trial(&mut self) -> Option<(usize, usize)> {
        let target = *self.order.get(self.cursor)?;
        self.cursor += 1;
        Some((self.cursor, target))
    }
}

/// Produces runs as uniform random permutations of the symbol indices.
#[derive(Debug, Clone)]
pub struct TrialScheduler<R: Rng> {
    rng: R,
    symbols: usize,
    runs: usize,
}

impl TrialScheduler<StdRng> {
    /// Reproducible schedule.
    pub fn seeded(symbols: usize, seed: u64) -> Self {
        Self::new(symbols, StdRng::seed_from_u64(seed))
    }

    /// Schedule seeded from operating-system entropy.
    pub fn from_entropy(symbols: usize) -> Self {
        Self::new(symbols, StdRng::from_os_rng())
    }
}

impl<R: Rng> TrialScheduler<R> {
    pub fn new(symbols: usize, rng: R) -> Self {
        Self {
            rng,
            symbols,
            runs: 0,
        }
    }

    pub fn symbols(&self) -> usize {
        self.symbols
    }

    /// A fresh permutation; earlier runs have no influence beyond the RNG state.
    pub fn next_run(&mut self) -> Run {
        let mut order: Vec<usize> = (0..self.symbols).collect();
        order.shuffle(&mut self.rng);
        let run = Run::new(self.runs, order);
        self.runs += 1;
        run
    }
}
