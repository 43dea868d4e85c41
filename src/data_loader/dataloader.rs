//! Restartable, batched `DataLoader`.
//!
//! * Index groups come either from a sequential/shuffled sampler chunked
//!   by `batch_size`, or from a [`BatchSampler`] (episodic groups).
//! * Yields `Result<Vec<Item>, DatasetError>` where each `Vec` is a batch.
//! * Every call to [`DataLoader::stream`] starts a new epoch.

use crate::data_loader::dataset::{Dataset, DatasetError};
use crate::data_loader::options::LoaderOptions;
use crate::data_loader::sampler::{BatchSampler, Sampler, SequentialSampler, ShuffleSampler};

use async_stream::try_stream;
use futures::stream::{self, StreamExt, TryStreamExt};
use futures_core::stream::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Boxed stream of batches returned by [`DataLoader::stream`].
pub type BatchStream<T> =
    Pin<Box<dyn Stream<Item = Result<Vec<T>, DatasetError>> + Send + 'static>>;

type IndexPlan = Box<dyn Iterator<Item = Vec<usize>> + Send>;

/// High-level iterator that produces batched samples from a dataset.
pub struct DataLoader<D>
where
    D: Dataset,
{
    dataset: Arc<D>,
    opts: LoaderOptions,
    batch_sampler: Option<Arc<dyn BatchSampler>>,
    epoch: AtomicU64,
}

impl<D> DataLoader<D>
where
    D: Dataset,
{
    /// Create a loader that batches by `opts.batch_size`.
    pub fn new(dataset: D, opts: LoaderOptions) -> Self {
        Self {
            dataset: Arc::new(dataset),
            opts,
            batch_sampler: None,
            epoch: AtomicU64::new(0),
        }
    }

    /// Create a loader whose index groups come from `sampler`.
    pub fn with_batch_sampler<S>(dataset: D, sampler: S, opts: LoaderOptions) -> Self
    where
        S: BatchSampler + 'static,
    {
        Self {
            dataset: Arc::new(dataset),
            opts,
            batch_sampler: Some(Arc::new(sampler)),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.opts
    }

    pub fn batch_sampler(&self) -> Option<&dyn BatchSampler> {
        self.batch_sampler.as_deref()
    }

    /// Number of epochs started so far (calls to `stream`).
    pub fn epochs_started(&self) -> u64 {
        self.epoch.load(Ordering::Relaxed)
    }

    /// Batches per epoch, when the dataset length is known.
    pub fn num_batches(&self) -> Option<usize> {
        if let Some(s) = &self.batch_sampler {
            return Some(s.num_batches());
        }
        let total = self.dataset.len()?;
        let bs = self.opts.batch_size.max(1);
        Some(if self.opts.drop_last { total / bs } else { total.div_ceil(bs) })
    }

    /// Return an **async stream** over one epoch of batches.
    ///
    /// ```ignore
    /// # use fewshot_loader::{DataLoader, LoaderOptions};
    /// # async fn demo<D: fewshot_loader::Dataset>(ds: D) -> anyhow::Result<()> {
    /// let loader = DataLoader::new(ds, LoaderOptions::default());
    /// for _epoch in 0..3 {
    ///     let mut batches = loader.stream();
    ///     while let Some(batch) = batches.next().await {
    ///         let data = batch?; // Vec<D::Item>
    ///         // training step ...
    ///     }
    /// }
    /// # Ok(()) }
    /// ```
    pub fn stream(&self) -> BatchStream<D::Item> {
        let epoch = self.epoch.fetch_add(1, Ordering::Relaxed);
        let ds = Arc::clone(&self.dataset);
        let opts = self.opts.clone();
        let workers = opts.fetch_concurrency();

        let plan: Option<IndexPlan> = match (&self.batch_sampler, ds.len()) {
            (Some(sampler), _) => Some(sampler.epoch_batches(epoch)),
            (None, Some(total)) => Some(index_batches(total, &opts, epoch)),
            (None, None) => None,
        };
        tracing::debug!(epoch, workers, episodic = self.batch_sampler.is_some(), "starting loader epoch");

        Box::pin(try_stream! {
            match plan {
                Some(batches) => {
                    for indices in batches {
                        let batch = fetch_batch(&ds, indices, workers).await?;
                        yield batch;
                    }
                }
                None => {
                    // Unknown length – keep reading until we hit the end.
                    let bs = opts.batch_size.max(1);
                    let mut index = 0usize;
                    loop {
                        let mut batch = Vec::with_capacity(bs);
                        for _ in 0..bs {
                            match ds.get(index).await {
                                Ok(item) => batch.push(item),
                                Err(DatasetError::IndexOutOfRange(_)) => {
                                    if !batch.is_empty() && !opts.drop_last {
                                        yield batch;
                                    }
                                    return;
                                }
                                Err(e) => Err(e)?,
                            }
                            index += 1;
                        }
                        yield batch;
                    }
                }
            }
        })
    }
}

/// Chunk a sequential or shuffled index order into batches.
fn index_batches(total: usize, opts: &LoaderOptions, epoch: u64) -> IndexPlan {
    let mut sampler: Box<dyn Sampler + Send> = if opts.shuffle {
        Box::new(ShuffleSampler::new(total, opts.seed.wrapping_add(epoch)))
    } else {
        Box::new(SequentialSampler::new(total))
    };
    let bs = opts.batch_size.max(1);
    let drop_last = opts.drop_last;

    Box::new(std::iter::from_fn(move || {
        let mut batch = Vec::with_capacity(bs);
        while batch.len() < bs {
            match sampler.next_index() {
                Some(i) => batch.push(i),
                None => break,
            }
        }
        if batch.is_empty() || (drop_last && batch.len() < bs) {
            None
        } else {
            Some(batch)
        }
    }))
}

/// Fetch `indices` with at most `workers` gets in flight, keeping order.
async fn fetch_batch<D: Dataset>(
    ds: &Arc<D>,
    indices: Vec<usize>,
    workers: usize,
) -> Result<Vec<D::Item>, DatasetError> {
    stream::iter(indices)
        .map(|i| {
            let ds = Arc::clone(ds);
            async move { ds.get(i).await }
        })
        .buffered(workers)
        .try_collect()
        .await
}

impl<D> std::fmt::Debug for DataLoader<D>
where
    D: Dataset,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLoader")
            .field("batch_size", &self.opts.batch_size)
            .field("num_workers", &self.opts.num_workers)
            .field("shuffle", &self.opts.shuffle)
            .field("pin_memory", &self.opts.pin_memory)
            .field("batch_sampler", &self.batch_sampler)
            .finish()
    }
}
