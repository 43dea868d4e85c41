//! mini-ImageNet adapter.
//!
//! Layout: `root/images/<filename>` plus one index per split,
//! `root/<mode>.csv`, with a `filename,label` header.  Class ids follow the
//! order in which labels first appear in the index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::Split;
use crate::data_loader::DatasetError;
use crate::datasets::episode::{Episode, EpisodicImages, EpisodicParams};
use crate::log_sink::LogSink;

#[derive(Debug, Clone)]
pub struct MiniImagenet {
    mode: Split,
    method: String,
    inner: EpisodicImages,
}

impl MiniImagenet {
    pub fn new(
        root: &Path,
        mode: Split,
        params: &EpisodicParams,
        log: &LogSink,
    ) -> Result<Self, DatasetError> {
        let index = root.join(format!("{}.csv", mode));
        let (files, labels, class_names) = read_index(&index)?;
        let images_dir = root.join("images");
        let images: Vec<PathBuf> = files.iter().map(|f| images_dir.join(f)).collect();

        let inner = EpisodicImages::new(images, labels, class_names, params)?;
        let shape = inner.shape();
        log.print_log(&format!(
            "shuffle DB :{}, b:{}, {}-way, {}-shot, {}-query, resize:{}",
            mode, params.episodes, shape.n_way, shape.k_shot, shape.k_query, params.resize
        ));
        tracing::debug!(
            method = %params.method,
            images = inner.num_images(),
            classes = inner.class_names().len(),
            "mini-imagenet {} index loaded",
            mode
        );

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

/// Read `filename,label` rows; returns files, class ids and class names.
fn read_index(path: &Path) -> Result<(Vec<String>, Vec<usize>, Vec<String>), DatasetError> {
    let csv_err = |source| DatasetError::Csv { path: path.display().to_string(), source };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;

    let mut files = Vec::new();
    let mut labels = Vec::new();
    let mut class_names: Vec<String> = Vec::new();
    let mut class_ids: HashMap<String, usize> = HashMap::new();

    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let (Some(file), Some(label)) = (record.get(0), record.get(1)) else {
            return Err(DatasetError::from(format!(
                "{}: expected `filename,label` rows, got {:?}",
                path.display(),
                record
            )));
        };
        let id = *class_ids.entry(label.to_string()).or_insert_with(|| {
            class_names.push(label.to_string());
            class_names.len() - 1
        });
        files.push(file.to_string());
        labels.push(id);
    }
    Ok((files, labels, class_names))
}
