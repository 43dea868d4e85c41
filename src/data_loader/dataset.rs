// src/data_loader/dataset.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Core dataset abstractions shared by every few-shot adapter.
//!
//! A dataset is map-style: it knows its length and can fetch a sample at a
//! random index.  Datasets that index a labelled image collection also
//! expose the per-image label array, which is what the episodic batch
//! sampler draws from.

use async_trait::async_trait;
use thiserror::Error;
use anyhow::Error as AnyError;

/// Item-level error type for dataset, sampler & loader operations.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("index out of range: {0}")]
    IndexOutOfRange(usize),

    #[error("operation not supported for this dataset type")]
    Unsupported,

    #[error("failed to decode image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to read npz archive {path}: {source}")]
    Npz {
        path: String,
        #[source]
        source: ndarray_npy::ReadNpzError,
    },

    #[error("failed to parse csv index {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("invalid batch sampler configuration: {0}")]
    Sampler(String),

    // generic backend error (I/O, task join, malformed index files)
    #[error(transparent)]
    Backend(#[from] AnyError),
}

impl From<String> for DatasetError {
    fn from(s: String) -> Self {
        DatasetError::Backend(AnyError::msg(s))
    }
}

impl From<&str> for DatasetError {
    fn from(s: &str) -> Self {
        DatasetError::Backend(AnyError::msg(s.to_string()))
    }
}

/// A logical collection of **samples** (episodes, labelled images).
#[async_trait]
pub trait Dataset: Send + Sync + 'static {
    /// Concrete Rust type produced for each sample.
    type Item: Send + 'static;

    /// Total number of samples if known *a priori*; otherwise `None`.
    fn len(&self) -> Option<usize>;

    /// Retrieve a sample by zero-based index.
    async fn get(&self, index: usize) -> Result<Self::Item, DatasetError>;

    /// Class label of every underlying image, if the dataset has one.
    fn labels(&self) -> Option<&[usize]> {
        None
    }

    /// Convenience helper.
    fn is_empty(&self) -> bool {
        self.len().map(|n| n == 0).unwrap_or(false)
    }
}
