//! tiered-ImageNet adapter, directory layout.
//!
//! Layout: `root/<mode>/<class_dir>/<image>`.  Class directories and the
//! files inside them are sorted so ids are stable across runs.

use std::path::{Path, PathBuf};

use crate::config::Split;
use crate::data_loader::DatasetError;
use crate::datasets::episode::{Episode, EpisodicImages, EpisodicParams};
use crate::log_sink::LogSink;

#[derive(Debug, Clone)]
pub struct TieredImagenet {
    mode: Split,
    method: String,
    inner: EpisodicImages,
}

impl TieredImagenet {
    pub fn new(
        root: &Path,
        mode: Split,
        params: &EpisodicParams,
        log: &LogSink,
    ) -> Result<Self, DatasetError> {
        let split_dir = root.join(mode.as_str());
        let (images, labels, class_names) = scan_class_dirs(&split_dir)?;
        let inner = EpisodicImages::new(images, labels, class_names, params)?;

        let shape = inner.shape();
        log.print_log(&format!(
            "tier-imagenet {}: {} images, {} classes, {} episodes of {}-way {}-shot {}-query, resize:{}",
            mode,
            inner.num_images(),
            inner.class_names().len(),
            inner.len(),
            shape.n_way,
            shape.k_shot,
            shape.k_query,
            params.resize
        ));

        Ok(Self { mode, method: params.method.clone(), inner })
    }

    pub fn mode(&self) -> Split {
        self.mode
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn images(&self) -> &EpisodicImages {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn labels(&self) -> &[usize] {
        self.inner.labels()
    }

    pub async fn get(&self, index: usize) -> Result<Episode, DatasetError> {
        self.inner.episode(index).await
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| DatasetError::from(format!("Failed to read directory {}: {}", dir.display(), e)))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| DatasetError::from(format!("Failed to read directory entry: {}", e)))?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

/// Collect images under one directory per class.
fn scan_class_dirs(split_dir: &Path) -> Result<(Vec<PathBuf>, Vec<usize>, Vec<String>), DatasetError> {
    if !split_dir.is_dir() {
        return Err(DatasetError::from(format!("Split directory does not exist: {}", split_dir.display())));
    }

    let mut images = Vec::new();
    let mut labels = Vec::new();
    let mut class_names = Vec::new();
    for class_dir in sorted_entries(split_dir)?.into_iter().filter(|p| p.is_dir()) {
        let id = class_names.len();
        let name = class_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        for file in sorted_entries(&class_dir)?.into_iter().filter(|p| p.is_file()) {
            images.push(file);
            labels.push(id);
        }
        class_names.push(name);
    }
    Ok((images, labels, class_names))
}
