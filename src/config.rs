//! Configuration record shared by the dispatcher, the adapters and the CLI.
//!
//! `Opts` can be filled from command-line flags (`clap`) or from a JSON file
//! (`serde`); missing JSON fields take the same defaults as the flags.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::BuildError;

/// Which tiered-ImageNet adapter backs the `tier-imagenet` dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieredInterface {
    /// Directory-per-class images, episodes planned from `meta_batchsz_*`.
    #[default]
    Simple,
    /// In-memory npz archives, fixed episode and query counts.
    Legacy,
}

impl fmt::Display for TieredInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TieredInterface::Simple => f.write_str("simple"),
            TieredInterface::Legacy => f.write_str("legacy"),
        }
    }
}

/// Recognised dataset names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatasetKind {
    MiniImagenet,
    TieredImagenet,
    Omniglot,
}

impl DatasetKind {
    pub fn name(&self) -> &'static str {
        match self {
            DatasetKind::MiniImagenet => "mini-imagenet",
            DatasetKind::TieredImagenet => "tier-imagenet",
            DatasetKind::Omniglot => "omniglot",
        }
    }

    /// Sub-directory of the data root holding this dataset.
    pub fn dir_name(&self) -> &'static str {
        match self {
            DatasetKind::MiniImagenet => MINI_IMAGENET_DIR,
            DatasetKind::TieredImagenet => TIERED_IMAGENET_DIR,
            DatasetKind::Omniglot => OMNIGLOT_DIR,
        }
    }
}

impl FromStr for DatasetKind {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mini-imagenet" => Ok(DatasetKind::MiniImagenet),
            "tier-imagenet" => Ok(DatasetKind::TieredImagenet),
            "omniglot" => Ok(DatasetKind::Omniglot),
            other => Err(BuildError::UnknownDataset(other.to_string())),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named partition of a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Val,
    Test,
    TrainVal,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
            Split::TrainVal => "trainval",
        }
    }

    /// `train` and `trainval` both feed the training iteration config.
    pub fn is_training(&self) -> bool {
        matches!(self, Split::Train | Split::TrainVal)
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime parameters for one training run.
#[derive(Args, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Opts {
    /// Dataset to load: mini-imagenet, tier-imagenet or omniglot
    #[arg(long, default_value = DEFAULT_DATASET)]
    pub dataset: String,

    /// Directory holding miniImagenet/, tier_imagenet/ and omniglot/
    #[arg(long, env = "FEWSHOT_DATA_ROOT", default_value = DEFAULT_DATA_ROOT)]
    pub data_root: PathBuf,

    /// Side length images are resized to (ImageNet variants)
    #[arg(long, default_value_t = DEFAULT_IM_SIZE)]
    pub im_size: u32,

    /// Classes per episode
    #[arg(long, default_value_t = DEFAULT_N_WAY)]
    pub n_way: usize,

    /// Support images per class
    #[arg(long, default_value_t = DEFAULT_K_SHOT)]
    pub k_shot: usize,

    /// Query images per class
    #[arg(long, default_value_t = DEFAULT_K_QUERY)]
    pub k_query: usize,

    /// Episodes in the training split
    #[arg(long, default_value_t = DEFAULT_META_BATCHSZ_TRAIN)]
    pub meta_batchsz_train: usize,

    /// Episodes in the validation split
    #[arg(long, default_value_t = DEFAULT_META_BATCHSZ_TEST)]
    pub meta_batchsz_test: usize,

    /// Episodes per loader batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SZ)]
    pub batch_sz: usize,

    /// Meta-learning method name, forwarded to the adapters
    #[arg(long, default_value = DEFAULT_METHOD)]
    pub method: String,

    /// Classes per training iteration (batch-sampler datasets)
    #[arg(long, default_value_t = DEFAULT_CLASSES_PER_IT_TR)]
    pub classes_per_it_tr: usize,

    /// Classes per validation/test iteration (batch-sampler datasets)
    #[arg(long, default_value_t = DEFAULT_CLASSES_PER_IT_VAL)]
    pub classes_per_it_val: usize,

    /// Support samples per class outside training
    #[arg(long, default_value_t = DEFAULT_NUM_SUPPORT_VAL)]
    pub num_support_val: usize,

    /// Query samples per class outside training
    #[arg(long, default_value_t = DEFAULT_NUM_QUERY_VAL)]
    pub num_query_val: usize,

    /// Batches per epoch for batch-sampler datasets
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: usize,

    /// Adapter backing tier-imagenet
    #[arg(long, value_enum, default_value_t = TieredInterface::Simple)]
    pub tiered_interface: TieredInterface,

    /// Append run log lines to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Seed for episode planning, shuffling and batch sampling
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            dataset: DEFAULT_DATASET.to_string(),
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            im_size: DEFAULT_IM_SIZE,
            n_way: DEFAULT_N_WAY,
            k_shot: DEFAULT_K_SHOT,
            k_query: DEFAULT_K_QUERY,
            meta_batchsz_train: DEFAULT_META_BATCHSZ_TRAIN,
            meta_batchsz_test: DEFAULT_META_BATCHSZ_TEST,
            batch_sz: DEFAULT_BATCH_SZ,
            method: DEFAULT_METHOD.to_string(),
            classes_per_it_tr: DEFAULT_CLASSES_PER_IT_TR,
            classes_per_it_val: DEFAULT_CLASSES_PER_IT_VAL,
            num_support_val: DEFAULT_NUM_SUPPORT_VAL,
            num_query_val: DEFAULT_NUM_QUERY_VAL,
            iterations: DEFAULT_ITERATIONS,
            tiered_interface: TieredInterface::default(),
            log_file: None,
            seed: DEFAULT_SEED,
        }
    }
}

impl Opts {
    /// Load options from a JSON file; absent fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Parse the `dataset` field.
    pub fn dataset_kind(&self) -> Result<DatasetKind, BuildError> {
        self.dataset.parse()
    }

    /// Root directory of one dataset under `data_root`.
    pub fn dataset_dir(&self, kind: DatasetKind) -> PathBuf {
        self.data_root.join(kind.dir_name())
    }
}
