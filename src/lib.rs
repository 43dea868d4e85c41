// src/lib.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Crate root: public re-exports.

pub mod config;
pub mod constants;
pub mod data_loader;
pub mod datasets;
pub mod dispatch;
pub mod error;
pub mod log_sink;

// ===== Re-exports used by tests/ and src/bin/cli.rs at the crate root =====
// Types:
pub use crate::config::{DatasetKind, Opts, Split, TieredInterface};
pub use crate::data_loader::dataloader::{BatchStream, DataLoader};
pub use crate::data_loader::dataset::{Dataset, DatasetError};
pub use crate::data_loader::options::LoaderOptions;
pub use crate::data_loader::sampler::{BatchSampler, PrototypicalBatchSampler};
pub use crate::datasets::{Episode, FewShotDataset, Sample};
pub use crate::error::BuildError;
pub use crate::log_sink::LogSink;

// Dispatcher entry points:
pub use crate::dispatch::{build_loaders, make_sampler, Loaders, SplitLoader};
