// src/data_loader/options.rs
//!
//! Loader knobs for the few-shot data loaders.
//!
//! Builder helpers are provided so callers can write a fluent style:
//!
//! let opts = LoaderOptions::default()
//!     .with_batch_size(4)
//!     .drop_last(false)
//!     .shuffle(true, 42)
//!     .num_workers(8)
//!     .pin_memory(true);
//!

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Number of samples per batch. Ignored when a batch sampler drives the loader.
    pub batch_size: usize,
    /// Whether to drop the final, possibly incomplete batch.
    pub drop_last: bool,
    /// If true, use a shuffled sampler (deterministic with `seed`).
    pub shuffle: bool,
    /// Base shuffle seed; epoch `e` uses `seed + e`.
    pub seed: u64,
    /// Number of items fetched concurrently per batch. `0` fetches one at a time.
    pub num_workers: usize,
    /// Hint for consumers that copy batches to an accelerator. Recorded only.
    pub pin_memory: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            batch_size: 1,
            drop_last: false,
            shuffle: false,
            seed: 0,
            num_workers: 0,
            pin_memory: false,
        }
    }
}

impl LoaderOptions {
    /// Builder-style helper: change the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Builder-style helper: set `drop_last`.
    pub fn drop_last(mut self, yes: bool) -> Self {
        self.drop_last = yes;
        self
    }

    /// Enable/disable shuffling and set seed.
    ///
    /// When `on` is false, the seed is left unchanged but ignored for index
    /// order.
    pub fn shuffle(mut self, on: bool, seed: u64) -> Self {
        self.shuffle = on;
        if on {
            self.seed = seed;
        }
        self
    }

    /// Set the seed without touching `shuffle`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of concurrent fetches per batch.
    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    /// Enable/disable memory pinning
    pub fn pin_memory(mut self, pin: bool) -> Self {
        self.pin_memory = pin;
        self
    }

    /// Concurrency actually used when fetching a batch.
    pub fn fetch_concurrency(&self) -> usize {
        self.num_workers.max(1)
    }
}
