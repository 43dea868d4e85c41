// src/constants.rs
//
// Centralized constants for the few-shot loaders to avoid hardcoded values throughout the codebase

/// Concurrent fetches for the episodic training loaders
pub const TRAIN_WORKERS: usize = 8;

/// Concurrent fetches for the episodic validation loaders
pub const VAL_WORKERS: usize = 2;

/// Concurrent fetches for batch-sampler driven loaders (one at a time)
pub const SAMPLER_WORKERS: usize = 0;

/// Sub-directory of the data root holding mini-ImageNet
pub const MINI_IMAGENET_DIR: &str = "miniImagenet";

/// Sub-directory of the data root holding tiered-ImageNet
pub const TIERED_IMAGENET_DIR: &str = "tier_imagenet";

/// Sub-directory of the data root holding Omniglot
pub const OMNIGLOT_DIR: &str = "omniglot";

/// Omniglot images are always resized to this side length
pub const OMNIGLOT_IMAGE_SIZE: u32 = 28;

/// Query images per class in legacy tiered-ImageNet episodes
pub const LEGACY_QUERY_PER_CLASS: usize = 15;

/// Episodes per split for the legacy tiered-ImageNet adapter
pub const LEGACY_EPISODES: usize = 600;

// ── configuration defaults ──────────────────────────────────────────────────

pub const DEFAULT_DATASET: &str = "mini-imagenet";
pub const DEFAULT_DATA_ROOT: &str = "dataset";
pub const DEFAULT_IM_SIZE: u32 = 84;
pub const DEFAULT_N_WAY: usize = 5;
pub const DEFAULT_K_SHOT: usize = 1;
pub const DEFAULT_K_QUERY: usize = 15;
pub const DEFAULT_META_BATCHSZ_TRAIN: usize = 10_000;
pub const DEFAULT_META_BATCHSZ_TEST: usize = 200;
pub const DEFAULT_BATCH_SZ: usize = 4;
pub const DEFAULT_METHOD: &str = "maml";
pub const DEFAULT_CLASSES_PER_IT_TR: usize = 60;
pub const DEFAULT_CLASSES_PER_IT_VAL: usize = 5;
pub const DEFAULT_NUM_SUPPORT_VAL: usize = 5;
pub const DEFAULT_NUM_QUERY_VAL: usize = 15;
pub const DEFAULT_ITERATIONS: usize = 100;
pub const DEFAULT_SEED: u64 = 0;
