// src/datasets/mod.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Dataset adapters, one per supported few-shot benchmark, behind a single
//! tagged enum so loaders of every split share one type.

pub mod episode;
pub mod image;
pub mod mini_imagenet;
pub mod omniglot;
pub mod tiered_imagenet;
pub mod tiered_legacy;

use async_trait::async_trait;
use ndarray::Array3;

use crate::data_loader::{Dataset, DatasetError};

pub use episode::{Episode, EpisodeShape, EpisodicParams};
pub use mini_imagenet::MiniImagenet;
pub use omniglot::Omniglot;
pub use tiered_imagenet::TieredImagenet;
pub use tiered_legacy::TieredImagenetLegacy;

/// One item produced by a [`FewShotDataset`].
#[derive(Debug, Clone)]
pub enum Sample {
    /// A whole few-shot task (episodic adapters).
    Episode(Episode),
    /// A single labelled image (batch-sampler adapters).
    Image { image: Array3<f32>, label: usize },
}

impl Sample {
    pub fn as_episode(&self) -> Option<&Episode> {
        match self {
            Sample::Episode(e) => Some(e),
            Sample::Image { .. } => None,
        }
    }

    pub fn label(&self) -> Option<usize> {
        match self {
            Sample::Image { label, .. } => Some(*label),
            Sample::Episode(_) => None,
        }
    }
}

/// Every adapter the dispatcher can build.
#[derive(Debug, Clone)]
pub enum FewShotDataset {
    MiniImagenet(MiniImagenet),
    TieredImagenet(TieredImagenet),
    TieredImagenetLegacy(TieredImagenetLegacy),
    Omniglot(Omniglot),
}

impl FewShotDataset {
    /// Short adapter name, for logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            FewShotDataset::MiniImagenet(_) => "mini-imagenet",
            FewShotDataset::TieredImagenet(_) => "tier-imagenet",
            FewShotDataset::TieredImagenetLegacy(_) => "tier-imagenet-legacy",
            FewShotDataset::Omniglot(_) => "omniglot",
        }
    }

    fn label_slice(&self) -> &[usize] {
        match self {
            FewShotDataset::MiniImagenet(d) => d.labels(),
            FewShotDataset::TieredImagenet(d) => d.labels(),
            FewShotDataset::TieredImagenetLegacy(d) => d.labels(),
            FewShotDataset::Omniglot(d) => d.labels(),
        }
    }
}

#[async_trait]
impl Dataset for FewShotDataset {
    type Item = Sample;

    fn len(&self) -> Option<usize> {
        Some(match self {
            FewShotDataset::MiniImagenet(d) => d.len(),
            FewShotDataset::TieredImagenet(d) => d.len(),
            FewShotDataset::TieredImagenetLegacy(d) => d.len(),
            FewShotDataset::Omniglot(d) => d.len(),
        })
    }

    async fn get(&self, index: usize) -> Result<Self::Item, DatasetError> {
        match self {
            FewShotDataset::MiniImagenet(d) => d.get(index).await.map(Sample::Episode),
            FewShotDataset::TieredImagenet(d) => d.get(index).await.map(Sample::Episode),
            FewShotDataset::TieredImagenetLegacy(d) => d.get(index).await.map(Sample::Episode),
            FewShotDataset::Omniglot(d) => {
                let (image, label) = d.get(index).await?;
                Ok(Sample::Image { image, label })
            }
        }
    }

    fn labels(&self) -> Option<&[usize]> {
        Some(self.label_slice())
    }
}
