//! tiered-ImageNet adapter, archive layout.
//!
//! Reads `root/<mode>_images.npz` holding `images` (`u8 [N, H, W, 3]`) and
//! `labels` (`i64 [N]`) fully into memory.  Episodes have `nshot` support
//! and [`LEGACY_QUERY_PER_CLASS`] query images per class, and every split
//! plans [`LEGACY_EPISODES`] of them.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use ndarray::{Array1, Array3, Array4, Axis};
use ndarray_npy::{NpzReader, ReadNpzError};

use crate::config::Split;
use crate::constants::{LEGACY_EPISODES, LEGACY_QUERY_PER_CLASS};
use crate::data_loader::DatasetError;
use crate::datasets::episode::{
    assemble, group_by_class, plan_episodes, Episode, EpisodePlan, EpisodeShape,
};
use crate::datasets::image::{from_raw_rgb, ImageSpec};
use crate::log_sink::LogSink;

#[derive(Debug, Clone)]
pub struct TieredImagenetLegacy {
    mode: Split,
    method: String,
    images: Arc<Array4<u8>>,
    labels: Vec<usize>,
    num_classes: usize,
    shape: EpisodeShape,
    plans: Vec<EpisodePlan>,
    spec: ImageSpec,
}

impl TieredImagenetLegacy {
    /// Episodes are planned with seed 0; see [`TieredImagenetLegacy::reseed`].
    pub fn new(
        root: &Path,
        mode: Split,
        nway: usize,
        nshot: usize,
        resize: u32,
        log: &LogSink,
        method: &str,
    ) -> Result<Self, DatasetError> {
        let path = root.join(format!("{}_images.npz", mode));
        let (images, raw_labels) = read_archive(&path)?;
        let (labels, num_classes) = dense_labels(&raw_labels);

        let shape = EpisodeShape { n_way: nway, k_shot: nshot, k_query: LEGACY_QUERY_PER_CLASS };
        let plans = plan_episodes(&group_by_class(&labels, num_classes), shape, LEGACY_EPISODES, 0)?;

        log.print_log(&format!(
            "tier-imagenet (legacy) {}: {} images of {}x{}, {} classes, {}-way {}-shot",
            mode,
            labels.len(),
            images.len_of(Axis(1)),
            images.len_of(Axis(2)),
            num_classes,
            nway,
            nshot
        ));

        Ok(Self {
            mode,
            method: method.to_string(),
            images: Arc::new(images),
            labels,
            num_classes,
            shape,
            plans,
            spec: ImageSpec::imagenet(resize),
        })
    }

    /// Re-plan the episodes from `seed`.
    pub fn reseed(mut self, seed: u64) -> Result<Self, DatasetError> {
        let by_class = group_by_class(&self.labels, self.num_classes);
        self.plans = plan_episodes(&by_class, self.shape, self.plans.len(), seed)?;
        Ok(self)
    }

    pub fn mode(&self) -> Split {
        self.mode
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn shape(&self) -> EpisodeShape {
        self.shape
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub async fn get(&self, index: usize) -> Result<Episode, DatasetError> {
        let plan = self.plans.get(index).ok_or(DatasetError::IndexOutOfRange(index))?.clone();
        let images = Arc::clone(&self.images);
        let (shape, spec) = (self.shape, self.spec);

        tokio::task::spawn_blocking(move || {
            let convert = |positions: &[usize]| {
                positions
                    .iter()
                    .map(|&p| raw_to_tensor(&images, p, &spec))
                    .collect::<Result<Vec<_>, _>>()
            };
            let support = convert(&plan.support)?;
            let query = convert(&plan.query)?;
            assemble(&plan, shape, support, query, &spec)
        })
        .await
        .map_err(|e| DatasetError::Backend(e.into()))?
    }
}

fn raw_to_tensor(images: &Array4<u8>, pos: usize, spec: &ImageSpec) -> Result<Array3<f32>, DatasetError> {
    let img = images.index_axis(Axis(0), pos);
    let (h, w) = (img.len_of(Axis(0)) as u32, img.len_of(Axis(1)) as u32);
    from_raw_rgb(h, w, img.iter().copied().collect(), spec)
}

fn array_name(names: &[String], stem: &str) -> Option<String> {
    let with_ext = format!("{}.npy", stem);
    names.iter().find(|n| *n == stem || **n == with_ext).cloned()
}

fn read_archive(path: &Path) -> Result<(Array4<u8>, Array1<i64>), DatasetError> {
    let npz_err = |source: ReadNpzError| DatasetError::Npz { path: path.display().to_string(), source };
    let file = File::open(path)
        .map_err(|e| DatasetError::from(format!("Failed to open {}: {}", path.display(), e)))?;
    let mut npz = NpzReader::new(file).map_err(npz_err)?;
    let names = npz.names().map_err(npz_err)?;

    let missing = |stem: &str| DatasetError::from(format!("{}: no `{}` array", path.display(), stem));
    let images_name = array_name(&names, "images").ok_or_else(|| missing("images"))?;
    let labels_name = array_name(&names, "labels").ok_or_else(|| missing("labels"))?;

    let images: Array4<u8> = npz.by_name(&images_name).map_err(npz_err)?;
    let labels: Array1<i64> = npz.by_name(&labels_name).map_err(npz_err)?;

    if images.len_of(Axis(0)) != labels.len() {
        return Err(DatasetError::from(format!(
            "{}: {} images but {} labels",
            path.display(),
            images.len_of(Axis(0)),
            labels.len()
        )));
    }
    if images.len_of(Axis(3)) != 3 {
        return Err(DatasetError::from(format!(
            "{}: expected RGB images [N, H, W, 3], got shape {:?}",
            path.display(),
            images.shape()
        )));
    }
    Ok((images, labels))
}

/// Map arbitrary label values onto `0..num_classes`, ascending.
fn dense_labels(raw: &Array1<i64>) -> (Vec<usize>, usize) {
    let ids: BTreeMap<i64, usize> = raw
        .iter()
        .copied()
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(i, v)| (v, i))
        .collect();
    (raw.iter().map(|v| ids[v]).collect(), ids.len())
}
