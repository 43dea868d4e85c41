// src/error.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.

use thiserror::Error;

use crate::data_loader::DatasetError;

/// Errors raised while turning a configuration into loaders.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Unknown dataset: {0:?} (expected mini-imagenet, tier-imagenet or omniglot)")]
    UnknownDataset(String),

    /// A configuration option cannot be satisfied by the data on disk.
    #[error("invalid option {option}: {message}")]
    Configuration {
        option: &'static str,
        message: String,
    },

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("failed to open log file: {0}")]
    LogFile(#[from] std::io::Error),
}

impl BuildError {
    /// Name of the offending option for `Configuration` errors.
    pub fn option(&self) -> Option<&'static str> {
        match self {
            BuildError::Configuration { option, .. } => Some(*option),
            _ => None,
        }
    }
}
