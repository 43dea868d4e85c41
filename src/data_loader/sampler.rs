//! src/data_loader/sampler.rs
//! Samplers for the data loader.
//!
//! A `Sampler` produces a stream of indices into a map-style dataset.
//!  * `SequentialSampler` – yields 0..end in order.
//!  * `ShuffleSampler`    – yields 0..len in a deterministic shuffled order.
//!
//! A `BatchSampler` produces whole index groups instead.  The one shipped
//! here, `PrototypicalBatchSampler`, builds episodic groups: every batch
//! holds `classes_per_it` distinct classes with `num_samples` indices each.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::{RngCore, SeedableRng};

use crate::data_loader::dataset::DatasetError;

/// Trait for index producers.
pub trait Sampler {
    /// Return the next index to fetch, or `None` when exhausted.
    fn next_index(&mut self) -> Option<usize>;
    /// (Optional) remaining items hint.
    fn remaining(&self) -> Option<usize> { None }
}

/// In-place Fisher–Yates shuffle driven by a ChaCha20 stream.
pub(crate) fn shuffle_in_place<T>(items: &mut [T], rng: &mut ChaCha20Rng) {
    for i in (1..items.len()).rev() {
        // generate a u32 and reduce to [0..=i]
        let j = (rng.next_u32() as usize) % (i + 1);
        items.swap(i, j);
    }
}

/// Pick `k` distinct positions out of `0..n` (partial Fisher–Yates).
/// Returns fewer than `k` only when `n < k`.
pub(crate) fn choose_distinct(n: usize, k: usize, rng: &mut ChaCha20Rng) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..n).collect();
    let take = k.min(n);
    for i in 0..take {
        let j = i + (rng.next_u32() as usize) % (n - i);
        pool.swap(i, j);
    }
    pool.truncate(take);
    pool
}

/// Yields `0, 1, 2, …, end-1` once.
#[derive(Debug, Clone)]
pub struct SequentialSampler {
    curr: usize,
    end: usize,
}

impl SequentialSampler {
    /// Create a sequential sampler over `[0, end)`.
    pub fn new(end: usize) -> Self {
        Self { curr: 0, end }
    }
}

impl Sampler for SequentialSampler {
    fn next_index(&mut self) -> Option<usize> {
        if self.curr < self.end {
            let i = self.curr;
            self.curr += 1;
            Some(i)
        } else {
            None
        }
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.end.saturating_sub(self.curr))
    }
}

/// Yields all indices `0..len` in a deterministic shuffled order.
#[derive(Debug, Clone)]
pub struct ShuffleSampler {
    indices: Vec<usize>,
    pos: usize,
}

impl ShuffleSampler {
    /// Create a shuffled sampler for `len` items, using `seed`.
    pub fn new(len: usize, seed: u64) -> Self {
        let mut indices: Vec<usize> = (0..len).collect();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        shuffle_in_place(&mut indices, &mut rng);
        Self { indices, pos: 0 }
    }
}

impl Sampler for ShuffleSampler {
    fn next_index(&mut self) -> Option<usize> {
        if self.pos < self.indices.len() {
            let i = self.indices[self.pos];
            self.pos += 1;
            Some(i)
        } else {
            None
        }
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.indices.len().saturating_sub(self.pos))
    }
}

/// Producer of whole index groups, restartable once per epoch.
pub trait BatchSampler: Send + Sync + std::fmt::Debug {
    /// Number of groups yielded per epoch.
    fn num_batches(&self) -> usize;

    /// Number of indices in every group.
    fn batch_len(&self) -> usize;

    /// Fresh, lazy iterator over the groups of epoch `epoch`.
    fn epoch_batches(&self, epoch: u64) -> Box<dyn Iterator<Item = Vec<usize>> + Send>;
}

/// Episodic batch sampler over a label array.
///
/// Each of the `iterations` groups is built by choosing `classes_per_it`
/// distinct classes, drawing `num_samples` distinct indices from each, and
/// shuffling the result.
#[derive(Debug, Clone)]
pub struct PrototypicalBatchSampler {
    classes: Arc<Vec<usize>>,
    indexes: Arc<Vec<Vec<usize>>>,
    classes_per_it: usize,
    num_samples: usize,
    iterations: usize,
    seed: u64,
}

impl PrototypicalBatchSampler {
    /// Index `labels` by class and validate the requested group shape.
    pub fn new(
        labels: &[usize],
        classes_per_it: usize,
        num_samples: usize,
        iterations: usize,
    ) -> Result<Self, DatasetError> {
        if classes_per_it == 0 || num_samples == 0 {
            return Err(DatasetError::Sampler(format!(
                "classes_per_it ({}) and num_samples ({}) must both be positive",
                classes_per_it, num_samples
            )));
        }

        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in labels.iter().enumerate() {
            by_class.entry(label).or_default().push(idx);
        }

        if by_class.len() < classes_per_it {
            return Err(DatasetError::Sampler(format!(
                "{} classes requested per iteration but only {} present",
                classes_per_it,
                by_class.len()
            )));
        }
        if let Some((class, members)) = by_class.iter().find(|(_, v)| v.len() < num_samples) {
            return Err(DatasetError::Sampler(format!(
                "class {} has {} samples, {} needed per iteration",
                class,
                members.len(),
                num_samples
            )));
        }

        let (classes, indexes): (Vec<_>, Vec<_>) = by_class.into_iter().unzip();
        Ok(Self {
            classes: Arc::new(classes),
            indexes: Arc::new(indexes),
            classes_per_it,
            num_samples,
            iterations,
            seed: 0,
        })
    }

    /// Builder-style helper: set the base seed (epoch `e` uses `seed + e`).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Distinct class labels, ascending.
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    pub fn classes_per_it(&self) -> usize {
        self.classes_per_it
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Concrete iterator for epoch `epoch`.
    pub fn iter_epoch(&self, epoch: u64) -> PrototypicalBatches {
        PrototypicalBatches {
            indexes: Arc::clone(&self.indexes),
            classes_per_it: self.classes_per_it,
            num_samples: self.num_samples,
            left: self.iterations,
            rng: ChaCha20Rng::seed_from_u64(self.seed.wrapping_add(epoch)),
        }
    }
}

impl BatchSampler for PrototypicalBatchSampler {
    fn num_batches(&self) -> usize {
        self.iterations
    }

    fn batch_len(&self) -> usize {
        self.classes_per_it * self.num_samples
    }

    fn epoch_batches(&self, epoch: u64) -> Box<dyn Iterator<Item = Vec<usize>> + Send> {
        Box::new(self.iter_epoch(epoch))
    }
}

/// Lazy sequence of episodic index groups for one epoch.
#[derive(Debug)]
pub struct PrototypicalBatches {
    indexes: Arc<Vec<Vec<usize>>>,
    classes_per_it: usize,
    num_samples: usize,
    left: usize,
    rng: ChaCha20Rng,
}

impl Iterator for PrototypicalBatches {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.left == 0 {
            return None;
        }
        self.left -= 1;

        let picked = choose_distinct(self.indexes.len(), self.classes_per_it, &mut self.rng);
        let mut batch = Vec::with_capacity(self.classes_per_it * self.num_samples);
        for class_pos in picked {
            let members = &self.indexes[class_pos];
            for m in choose_distinct(members.len(), self.num_samples, &mut self.rng) {
                batch.push(members[m]);
            }
        }
        shuffle_in_place(&mut batch, &mut self.rng);
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.left, Some(self.left))
    }
}
