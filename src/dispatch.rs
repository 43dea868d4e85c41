// src/dispatch.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Dataset dispatcher: turn an [`Opts`] record into the four split loaders
//! a meta-learning run consumes.
//!
//! * `mini-imagenet` / `tier-imagenet` – episodic adapters, batched by
//!   `batch_sz`, shuffled, 8 fetch workers for train and 2 for val.
//! * `omniglot` – labelled images, grouped into episodes by a
//!   [`PrototypicalBatchSampler`] per split.
//!
//! Splits a dataset does not provide come back as [`SplitLoader::Empty`].

use std::collections::BTreeSet;

use crate::config::{DatasetKind, Opts, Split, TieredInterface};
use crate::constants::{SAMPLER_WORKERS, TRAIN_WORKERS, VAL_WORKERS};
use crate::data_loader::{DataLoader, LoaderOptions, PrototypicalBatchSampler};
use crate::datasets::{
    EpisodeShape, EpisodicParams, FewShotDataset, MiniImagenet, Omniglot, TieredImagenet,
    TieredImagenetLegacy,
};
use crate::error::BuildError;
use crate::log_sink::LogSink;

/// Loader for one split, or a placeholder when the split has no data.
#[derive(Debug, Default)]
pub enum SplitLoader {
    #[default]
    Empty,
    Ready(DataLoader<FewShotDataset>),
}

impl SplitLoader {
    pub fn is_empty(&self) -> bool {
        matches!(self, SplitLoader::Empty)
    }

    pub fn loader(&self) -> Option<&DataLoader<FewShotDataset>> {
        match self {
            SplitLoader::Ready(l) => Some(l),
            SplitLoader::Empty => None,
        }
    }

    pub fn into_loader(self) -> Option<DataLoader<FewShotDataset>> {
        match self {
            SplitLoader::Ready(l) => Some(l),
            SplitLoader::Empty => None,
        }
    }
}

/// The four split loaders produced by [`build_loaders`].
#[derive(Debug, Default)]
pub struct Loaders {
    pub train: SplitLoader,
    pub val: SplitLoader,
    pub test: SplitLoader,
    pub trainval: SplitLoader,
}

impl Loaders {
    /// `(train, val, test, trainval)`
    pub fn into_tuple(self) -> (SplitLoader, SplitLoader, SplitLoader, SplitLoader) {
        (self.train, self.val, self.test, self.trainval)
    }

    pub fn get(&self, split: Split) -> &SplitLoader {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
            Split::TrainVal => &self.trainval,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Split, &SplitLoader)> {
        [Split::Train, Split::Val, Split::Test, Split::TrainVal]
            .into_iter()
            .map(move |s| (s, self.get(s)))
    }
}

/// Loader settings for the episodic (ImageNet-style) splits.
pub fn episodic_loader_options(opts: &Opts, workers: usize) -> LoaderOptions {
    LoaderOptions::default()
        .with_batch_size(opts.batch_sz)
        .shuffle(true, opts.seed)
        .num_workers(workers)
        .pin_memory(true)
}

/// Loader settings for batch-sampler driven splits.
pub fn sampler_loader_options(opts: &Opts) -> LoaderOptions {
    LoaderOptions::default()
        .with_seed(opts.seed)
        .num_workers(SAMPLER_WORKERS)
}

/// Episodic batch sampler for one split's label array.
///
/// Training splits draw `k_shot + k_query` samples from
/// `classes_per_it_tr` classes; every other split draws
/// `num_support_val + num_query_val` from `classes_per_it_val`.
pub fn make_sampler(
    opts: &Opts,
    labels: &[usize],
    mode: Split,
) -> Result<PrototypicalBatchSampler, BuildError> {
    let (classes_per_it, num_samples) = if mode.is_training() {
        (opts.classes_per_it_tr, opts.k_shot + opts.k_query)
    } else {
        (opts.classes_per_it_val, opts.num_support_val + opts.num_query_val)
    };

    let sampler = PrototypicalBatchSampler::new(labels, classes_per_it, num_samples, opts.iterations)?
        .with_seed(opts.seed);
    Ok(sampler)
}

/// Build `(train, val, test, trainval)` loaders for `opts.dataset`.
pub fn build_loaders(opts: &Opts, log: &LogSink) -> Result<Loaders, BuildError> {
    log.print_log(&format!("Preparing datasets: [{}] ...", opts.dataset));

    match opts.dataset_kind()? {
        DatasetKind::MiniImagenet => build_mini_imagenet(opts, log),
        DatasetKind::TieredImagenet => build_tiered_imagenet(opts, log),
        DatasetKind::Omniglot => build_omniglot(opts, log),
    }
}

fn episodic_params(opts: &Opts, split: Split) -> EpisodicParams {
    let (episodes, seed) = match split {
        Split::Train => (opts.meta_batchsz_train, opts.seed),
        _ => (opts.meta_batchsz_test, opts.seed.wrapping_add(1)),
    };
    EpisodicParams {
        shape: EpisodeShape { n_way: opts.n_way, k_shot: opts.k_shot, k_query: opts.k_query },
        episodes,
        resize: opts.im_size,
        seed,
        method: opts.method.clone(),
    }
}

fn episodic_loaders(opts: &Opts, train: FewShotDataset, val: FewShotDataset) -> Loaders {
    Loaders {
        train: SplitLoader::Ready(DataLoader::new(train, episodic_loader_options(opts, TRAIN_WORKERS))),
        val: SplitLoader::Ready(DataLoader::new(val, episodic_loader_options(opts, VAL_WORKERS))),
        ..Loaders::default()
    }
}

fn build_mini_imagenet(opts: &Opts, log: &LogSink) -> Result<Loaders, BuildError> {
    let root = opts.dataset_dir(DatasetKind::MiniImagenet);
    let train = MiniImagenet::new(&root, Split::Train, &episodic_params(opts, Split::Train), log)?;
    let val = MiniImagenet::new(&root, Split::Val, &episodic_params(opts, Split::Val), log)?;

    Ok(episodic_loaders(
        opts,
        FewShotDataset::MiniImagenet(train),
        FewShotDataset::MiniImagenet(val),
    ))
}

fn build_tiered_imagenet(opts: &Opts, log: &LogSink) -> Result<Loaders, BuildError> {
    let root = opts.dataset_dir(DatasetKind::TieredImagenet);
    tracing::debug!(interface = %opts.tiered_interface, "selecting tiered-imagenet adapter");

    let (train, val) = match opts.tiered_interface {
        TieredInterface::Simple => (
            FewShotDataset::TieredImagenet(TieredImagenet::new(
                &root,
                Split::Train,
                &episodic_params(opts, Split::Train),
                log,
            )?),
            FewShotDataset::TieredImagenet(TieredImagenet::new(
                &root,
                Split::Val,
                &episodic_params(opts, Split::Val),
                log,
            )?),
        ),
        TieredInterface::Legacy => (
            FewShotDataset::TieredImagenetLegacy(
                TieredImagenetLegacy::new(&root, Split::Train, opts.n_way, opts.k_shot, opts.im_size, log, &opts.method)?
                    .reseed(opts.seed)?,
            ),
            // validation episodes take their shot count from k_query
            FewShotDataset::TieredImagenetLegacy(
                TieredImagenetLegacy::new(&root, Split::Val, opts.n_way, opts.k_query, opts.im_size, log, &opts.method)?
                    .reseed(opts.seed.wrapping_add(1))?,
            ),
        ),
    };

    Ok(episodic_loaders(opts, train, val))
}

fn check_class_count(n_classes: usize, option: &'static str, wanted: usize) -> Result<(), BuildError> {
    if n_classes < wanted {
        return Err(BuildError::Configuration {
            option,
            message: format!(
                "there are not enough classes in the dataset ({}) to satisfy {} = {}; \
                 decrease the {} option and try again",
                n_classes, option, wanted, option
            ),
        });
    }
    Ok(())
}

fn sampler_loader(opts: &Opts, data: Omniglot, split: Split) -> Result<SplitLoader, BuildError> {
    let sampler = make_sampler(opts, data.labels(), split)?;
    Ok(SplitLoader::Ready(DataLoader::with_batch_sampler(
        FewShotDataset::Omniglot(data),
        sampler,
        sampler_loader_options(opts),
    )))
}

fn build_omniglot(opts: &Opts, log: &LogSink) -> Result<Loaders, BuildError> {
    let root = opts.dataset_dir(DatasetKind::Omniglot);

    log.print_log("train data ...");
    let train = Omniglot::new(&root, Split::Train, log)?;
    let n_classes = train.labels().iter().collect::<BTreeSet<_>>().len();
    check_class_count(n_classes, "classes_per_it_tr", opts.classes_per_it_tr)?;
    check_class_count(n_classes, "classes_per_it_val", opts.classes_per_it_val)?;
    let train = sampler_loader(opts, train, Split::Train)?;

    log.print_log("val data ...");
    let val = sampler_loader(opts, Omniglot::new(&root, Split::Val, log)?, Split::Val)?;

    log.print_log("test data ...");
    let test = sampler_loader(opts, Omniglot::new(&root, Split::Test, log)?, Split::Test)?;

    Ok(Loaders { train, val, test, trainval: SplitLoader::Empty })
}
