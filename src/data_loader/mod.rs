// src/data_loader/mod.rs

//! Public API surface for the loader layer.
/// expose the `dataloader` module (file dataloader.rs)
pub mod dataloader;

/// expose the `dataset` module (file dataset.rs)
pub mod dataset;

/// expose the `options` module (file options.rs)
pub mod options;

/// index and batch samplers
pub mod sampler;

// Re‐export the key types at this level:
pub use dataset::{Dataset, DatasetError};
pub use dataloader::{BatchStream, DataLoader};
pub use options::LoaderOptions;
pub use sampler::{BatchSampler, PrototypicalBatchSampler, Sampler};
