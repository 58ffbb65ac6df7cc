//! Fan-out of a sample budget over short-lived worker threads.
//!
//! Every query spawns its own scoped workers. Each worker owns a [`StdRng`] seeded from the
//! aggregator's base seed plus its index, and fills a private [`Histogram`]; the caller joins them
//! all and sums the histograms elementwise. Nothing mutable is shared while workers run.

use std::thread;

use once_cell::sync::Lazy;
use rand::{rngs::StdRng, SeedableRng};

use crate::error::CredenceError;

/// Hardware parallelism minus one (for the calling thread), at least 1.
pub static DEFAULT_WORKERS: Lazy<usize> = Lazy::new(|| {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
});

/// Draw a base seed from the operating system.
pub fn entropy_seed() -> Result<u64, CredenceError> {
    let mut bytes = [0u8; 8];
    getrandom::getrandom(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

/// Split `budget` into `workers` shares; the first share takes the remainder.
pub fn partition(budget: usize, workers: usize) -> Vec<usize> {
    let workers = workers.max(1);
    let mut shares = vec![budget / workers; workers];
    shares[0] += budget % workers;
    shares
}

/// Weighted counts over the states of one variable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Histogram {
    bins: Vec<f64>,
    drawn: u64,
}

impl Histogram {
    pub fn new(bins: usize) -> Self {
        Histogram {
            bins: vec![0.0; bins],
            drawn: 0,
        }
    }

    pub fn add(&mut self, bin: usize, weight: f64) {
        self.bins[bin] += weight;
    }

    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    pub fn total(&self) -> f64 {
        self.bins.iter().sum()
    }

    /// Number of samples drawn into this histogram, accepted or not.
    pub fn drawn(&self) -> u64 {
        self.drawn
    }

    pub fn merge(&mut self, other: &Histogram) {
        for (acc, value) in self.bins.iter_mut().zip(&other.bins) {
            *acc += value;
        }
        self.drawn += other.drawn;
    }

    /// Bins divided by their total, or `None` when nothing was accumulated.
    pub fn normalized(&self) -> Option<Vec<f64>> {
        let total = self.total();
        if total > 0.0 {
            Some(self.bins.iter().map(|value| value / total).collect())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelAggregator {
    workers: usize,
    base_seed: u64,
}

impl ParallelAggregator {
    pub fn new(workers: usize, base_seed: u64) -> Self {
        ParallelAggregator {
            workers: workers.max(1),
            base_seed,
        }
    }

    /// Aggregator with an OS-provided base seed.
    pub fn from_entropy(workers: usize) -> Result<Self, CredenceError> {
        Ok(ParallelAggregator::new(workers, entropy_seed()?))
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Run `step` `budget` times spread over the workers and reduce their histograms.
    ///
    /// `init` builds per-worker scratch state (for example a reusable assignment buffer) on the
    /// worker's own thread. Never starts more workers than there are samples.
    pub fn run<S, I, F>(
        &self,
        budget: usize,
        bins: usize,
        init: I,
        step: F,
    ) -> Result<Histogram, CredenceError>
    where
        I: Fn() -> S + Sync,
        F: Fn(&mut S, &mut StdRng, &mut Histogram) + Sync,
    {
        let shares = partition(budget, self.workers.min(budget.max(1)));
        tracing::debug!(
            "[ParallelAggregator::run] {} samples over {} workers (seed {})",
            budget,
            shares.len(),
            self.base_seed
        );

        let (init, step) = (&init, &step);
        let joined: Vec<thread::Result<Histogram>> = thread::scope(|scope| {
            let handles: Vec<_> = shares
                .iter()
                .enumerate()
                .map(|(idx, &share)| {
                    let seed = self.base_seed.wrapping_add(idx as u64);
                    scope.spawn(move || {
                        let mut rng = StdRng::seed_from_u64(seed);
                        let mut scratch = init();
                        let mut local = Histogram::new(bins);
                        for _ in 0..share {
                            step(&mut scratch, &mut rng, &mut local);
                            local.drawn += 1;
                        }
                        local
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join()).collect()
        });

        let mut total = Histogram::new(bins);
        for (idx, result) in joined.into_iter().enumerate() {
            match result {
                Ok(local) => total.merge(&local),
                Err(_) => {
                    return Err(CredenceError::Worker(format!(
                        "sampling worker {idx} panicked"
                    )))
                }
            }
        }
        Ok(total)
    }
}
