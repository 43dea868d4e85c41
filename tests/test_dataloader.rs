//! Integration tests for the batched DataLoader.
//!
//! We use small, in-memory mock datasets so the tests are deterministic
//! and do not need any dataset files on disk.

use std::collections::BTreeSet;

use fewshot_loader::{
    DataLoader, Dataset, DatasetError, LoaderOptions, PrototypicalBatchSampler,
};

use async_trait::async_trait;
use futures_util::StreamExt; // for `next()`

// ────────────────────────────────────────────────────────────────────────────
// Helper 1: Map-style dataset with a backing Vec<T>
// ────────────────────────────────────────────────────────────────────────────
#[derive(Clone)]
struct VecDataset {
    data: Vec<i32>,
}

#[async_trait]
impl Dataset for VecDataset {
    type Item = i32;

    fn len(&self) -> Option<usize> {
        Some(self.data.len())
    }

    async fn get(&self, index: usize) -> Result<Self::Item, DatasetError> {
        self.data
            .get(index)
            .copied()
            .ok_or(DatasetError::IndexOutOfRange(index))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helper 2: Unknown-length map dataset (no `len`, but supports `get`)
// ────────────────────────────────────────────────────────────────────────────
struct UnknownLenDataset {
    n: usize,
}

#[async_trait]
impl Dataset for UnknownLenDataset {
    type Item = usize;

    fn len(&self) -> Option<usize> {
        None
    }

    async fn get(&self, index: usize) -> Result<Self::Item, DatasetError> {
        if index < self.n {
            Ok(index)
        } else {
            Err(DatasetError::IndexOutOfRange(index))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helper 3: Labelled dataset, item = (index, label)
// ────────────────────────────────────────────────────────────────────────────
struct LabelledDataset {
    labels: Vec<usize>,
}

#[async_trait]
impl Dataset for LabelledDataset {
    type Item = (usize, usize);

    fn len(&self) -> Option<usize> {
        Some(self.labels.len())
    }

    async fn get(&self, index: usize) -> Result<Self::Item, DatasetError> {
        self.labels
            .get(index)
            .map(|&y| (index, y))
            .ok_or(DatasetError::IndexOutOfRange(index))
    }

    fn labels(&self) -> Option<&[usize]> {
        Some(&self.labels)
    }
}

async fn flatten<T: Send + 'static>(loader: &DataLoader<impl Dataset<Item = T>>) -> Vec<T> {
    loader
        .stream()
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flat_map(Result::unwrap)
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Batching
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn map_dataset_batches() {
    let ds = VecDataset {
        data: (0..100).collect(),
    };
    let opts = LoaderOptions::default().with_batch_size(32);
    let loader = DataLoader::new(ds, opts);
    assert_eq!(loader.num_batches(), Some(4));

    let mut batches = loader.stream();
    let mut flat = Vec::new();
    while let Some(batch) = batches.next().await {
        flat.extend(batch.expect("no error"));
    }

    assert_eq!(flat.len(), 100);
    assert_eq!(flat, (0..100).collect::<Vec<_>>());
}

#[tokio::test]
async fn map_dataset_drop_last() {
    let ds = VecDataset {
        data: (0..100).collect(),
    };
    let opts = LoaderOptions::default()
        .with_batch_size(32)
        .drop_last(true);
    let loader = DataLoader::new(ds, opts);
    assert_eq!(loader.num_batches(), Some(3));

    let batches: Vec<_> = loader
        .stream()
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(batches.len(), 3); // 3 * 32 = 96; last 4 items dropped
    assert_eq!(batches[0].len(), 32);
    assert_eq!(batches[2][31], 95);
}

#[tokio::test]
async fn unknown_len_dataset() {
    let ds = UnknownLenDataset { n: 10 };

    let opts = LoaderOptions::default()
        .with_batch_size(3)
        .drop_last(false)
        .shuffle(false, 0)
        .num_workers(0);

    let loader = DataLoader::new(ds, opts);
    assert_eq!(loader.num_batches(), None);

    assert_eq!(flatten(&loader).await, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn empty_dataset() {
    let ds = VecDataset { data: vec![] };
    let loader = DataLoader::new(ds, LoaderOptions::default());

    let mut stream = loader.stream();
    assert!(stream.next().await.is_none(), "stream should be empty");
}

// ────────────────────────────────────────────────────────────────────────────
// Shuffling, workers and epochs
// ────────────────────────────────────────────────────────────────────────────

/// Two runs with the same shuffle seed must produce identical sequences,
/// and that sequence must differ from the unshuffled order.
#[tokio::test]
async fn shuffle_determinism() {
    let base = VecDataset { data: (0..50).collect() };

    let uns = DataLoader::new(base.clone(), LoaderOptions::default().shuffle(false, 123));
    let shuf_opt = LoaderOptions::default().with_batch_size(4).shuffle(true, 42);
    let shuf1 = DataLoader::new(base.clone(), shuf_opt.clone());
    let shuf2 = DataLoader::new(base, shuf_opt);

    let uns = flatten(&uns).await;
    let shuf1 = flatten(&shuf1).await;
    let shuf2 = flatten(&shuf2).await;

    assert_eq!(shuf1, shuf2, "shuffled outputs with same seed must match");
    assert_ne!(uns, shuf1, "shuffled sequence must differ from unshuffled");

    let mut sorted = shuf1.clone();
    sorted.sort();
    assert_eq!(sorted, uns, "shuffle must be a permutation");
}

/// Parallel workers must not change the output compared to the default
/// (sequential fetch) loader.
#[tokio::test]
async fn parallel_fetch_equivalence() {
    let ds = VecDataset { data: (0..100).collect() };

    let default_loader = DataLoader::new(ds.clone(), LoaderOptions::default().with_batch_size(10));
    let parallel_opts = LoaderOptions::default()
        .with_batch_size(10)
        .num_workers(8);
    let parallel_loader = DataLoader::new(ds, parallel_opts);

    assert_eq!(
        flatten(&default_loader).await,
        flatten(&parallel_loader).await,
        "parallel loader output must match default"
    );
}

/// Each `stream()` call is a new epoch; shuffled epochs use fresh orders.
#[tokio::test]
async fn loader_restarts_every_epoch() {
    let ds = VecDataset { data: (0..40).collect() };
    let loader = DataLoader::new(ds, LoaderOptions::default().with_batch_size(8).shuffle(true, 5));
    assert_eq!(loader.epochs_started(), 0);

    let first = flatten(&loader).await;
    let second = flatten(&loader).await;
    assert_eq!(loader.epochs_started(), 2);
    assert_eq!(first.len(), 40);
    assert_eq!(second.len(), 40);
    assert_ne!(first, second, "epochs should not repeat the same order");

    // a fresh loader with the same seed replays the same epochs
    let replay = DataLoader::new(
        VecDataset { data: (0..40).collect() },
        LoaderOptions::default().with_batch_size(8).shuffle(true, 5),
    );
    assert_eq!(flatten(&replay).await, first);
    assert_eq!(flatten(&replay).await, second);
}

#[tokio::test]
async fn errors_are_yielded_not_swallowed() {
    struct Broken;

    #[async_trait]
    impl Dataset for Broken {
        type Item = u8;

        fn len(&self) -> Option<usize> {
            Some(3)
        }

        async fn get(&self, index: usize) -> Result<u8, DatasetError> {
            if index == 1 {
                Err(DatasetError::from("corrupt record"))
            } else {
                Ok(index as u8)
            }
        }
    }

    let loader = DataLoader::new(Broken, LoaderOptions::default());
    let results: Vec<_> = loader.stream().collect().await;
    assert_eq!(results.len(), 2, "stream ends after the first error");
    assert_eq!(results[0].as_ref().unwrap(), &vec![0]);
    assert!(results[1].is_err());
}

// ────────────────────────────────────────────────────────────────────────────
// Batch-sampler driven loaders
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_sampler_drives_episodes() {
    let labels: Vec<usize> = (0..6).flat_map(|c| std::iter::repeat(c).take(4)).collect();
    let sampler = PrototypicalBatchSampler::new(&labels, 3, 2, 7)
        .unwrap()
        .with_seed(11);
    let loader = DataLoader::with_batch_sampler(
        LabelledDataset { labels },
        sampler,
        LoaderOptions::default().num_workers(0),
    );
    assert_eq!(loader.num_batches(), Some(7));
    assert_eq!(loader.batch_sampler().map(|s| s.batch_len()), Some(6));

    let batches: Vec<_> = loader
        .stream()
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(batches.len(), 7);

    for batch in &batches {
        assert_eq!(batch.len(), 6);
        let indices: BTreeSet<_> = batch.iter().map(|&(i, _)| i).collect();
        assert_eq!(indices.len(), 6, "no index repeats inside an episode");

        let classes: BTreeSet<_> = batch.iter().map(|&(_, y)| y).collect();
        assert_eq!(classes.len(), 3);
        for c in &classes {
            assert_eq!(batch.iter().filter(|&&(_, y)| y == *c).count(), 2);
        }
    }
}

#[tokio::test]
async fn batch_sampler_epochs_are_reproducible() {
    let labels: Vec<usize> = (0..5).flat_map(|c| std::iter::repeat(c).take(3)).collect();
    let make = || {
        let sampler = PrototypicalBatchSampler::new(&labels, 2, 3, 4).unwrap().with_seed(3);
        DataLoader::with_batch_sampler(LabelledDataset { labels: labels.clone() }, sampler, LoaderOptions::default())
    };

    let a = make();
    let b = make();
    let a0 = flatten(&a).await;
    let a1 = flatten(&a).await;
    assert_eq!(a0, flatten(&b).await);
    assert_eq!(a1, flatten(&b).await);
    assert_ne!(a0, a1);
}
