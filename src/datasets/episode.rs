//! Episode planning and assembly for the episodic (ImageNet-style) adapters.
//!
//! Episodes are planned once, at construction, from a seeded RNG: every
//! episode picks `n_way` distinct classes and `k_shot + k_query` distinct
//! images per class.  The first `k_shot` images of each class form the
//! support set, the rest the query set.  Images are only decoded when the
//! episode is fetched.

use std::path::PathBuf;

use futures::future::try_join_all;
use ndarray::{Array3, Array4, ArrayView3, Axis};
use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::SeedableRng;

use crate::data_loader::DatasetError;
use crate::data_loader::sampler::choose_distinct;
use crate::datasets::image::{self, ImageSpec, Rotation};

/// Shape of the episodes an adapter produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeShape {
    pub n_way: usize,
    pub k_shot: usize,
    pub k_query: usize,
}

impl EpisodeShape {
    pub fn per_class(&self) -> usize {
        self.k_shot + self.k_query
    }
}

/// Image positions chosen for one episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodePlan {
    /// Absolute class ids, in pick order (relative label = position).
    pub classes: Vec<usize>,
    /// Support image positions, grouped by class.
    pub support: Vec<usize>,
    /// Query image positions, grouped by class.
    pub query: Vec<usize>,
}

impl EpisodePlan {
    pub fn support_labels(&self, k_shot: usize) -> Vec<usize> {
        relative_labels(self.classes.len(), k_shot)
    }

    pub fn query_labels(&self, k_query: usize) -> Vec<usize> {
        relative_labels(self.classes.len(), k_query)
    }
}

fn relative_labels(n_way: usize, per_class: usize) -> Vec<usize> {
    (0..n_way).flat_map(|c| std::iter::repeat(c).take(per_class)).collect()
}

/// One few-shot task.
#[derive(Debug, Clone)]
pub struct Episode {
    /// Support images `[n_way * k_shot, C, H, W]`
    pub support_x: Array4<f32>,
    /// Relative support labels in `0..n_way`
    pub support_y: Vec<usize>,
    /// Query images `[n_way * k_query, C, H, W]`
    pub query_x: Array4<f32>,
    /// Relative query labels in `0..n_way`
    pub query_y: Vec<usize>,
    /// Absolute class ids in this episode
    pub classes: Vec<usize>,
}

impl Episode {
    pub fn n_way(&self) -> usize {
        self.classes.len()
    }

    pub fn k_shot(&self) -> usize {
        self.support_y.len() / self.classes.len().max(1)
    }

    pub fn k_query(&self) -> usize {
        self.query_y.len() / self.classes.len().max(1)
    }
}

/// Group image positions by their class label.
pub fn group_by_class(labels: &[usize], num_classes: usize) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); num_classes];
    for (pos, &label) in labels.iter().enumerate() {
        if let Some(g) = groups.get_mut(label) {
            g.push(pos);
        }
    }
    groups
}

/// Plan `episodes` episodes over images grouped by class.
pub fn plan_episodes(
    by_class: &[Vec<usize>],
    shape: EpisodeShape,
    episodes: usize,
    seed: u64,
) -> Result<Vec<EpisodePlan>, DatasetError> {
    if shape.n_way == 0 {
        return Err(DatasetError::from("n_way must be positive"));
    }
    if by_class.len() < shape.n_way {
        return Err(DatasetError::from(format!(
            "{}-way episodes need at least {} classes, found {}",
            shape.n_way,
            shape.n_way,
            by_class.len()
        )));
    }
    let needed = shape.per_class();
    if let Some((class, imgs)) = by_class.iter().enumerate().find(|(_, v)| v.len() < needed) {
        return Err(DatasetError::from(format!(
            "class {} has {} images, each episode needs {} (k_shot + k_query)",
            class,
            imgs.len(),
            needed
        )));
    }

    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut plans = Vec::with_capacity(episodes);
    for _ in 0..episodes {
        let classes = choose_distinct(by_class.len(), shape.n_way, &mut rng);
        let mut support = Vec::with_capacity(shape.n_way * shape.k_shot);
        let mut query = Vec::with_capacity(shape.n_way * shape.k_query);
        for &class in &classes {
            let members = &by_class[class];
            let picked = choose_distinct(members.len(), needed, &mut rng);
            let (s, q) = picked.split_at(shape.k_shot);
            support.extend(s.iter().map(|&m| members[m]));
            query.extend(q.iter().map(|&m| members[m]));
        }
        plans.push(EpisodePlan { classes, support, query });
    }
    Ok(plans)
}

/// Stack CHW images into an NCHW batch.  An empty slice gives `[0, C, H, W]`.
pub fn stack_images(images: &[Array3<f32>], spec: &ImageSpec) -> Result<Array4<f32>, DatasetError> {
    if images.is_empty() {
        let side = spec.size as usize;
        return Ok(Array4::zeros((0, spec.channels(), side, side)));
    }
    let views: Vec<ArrayView3<f32>> = images.iter().map(|a| a.view()).collect();
    ndarray::stack(Axis(0), &views).map_err(|e| DatasetError::Backend(e.into()))
}

/// Assemble a decoded episode.
pub fn assemble(
    plan: &EpisodePlan,
    shape: EpisodeShape,
    support: Vec<Array3<f32>>,
    query: Vec<Array3<f32>>,
    spec: &ImageSpec,
) -> Result<Episode, DatasetError> {
    Ok(Episode {
        support_x: stack_images(&support, spec)?,
        support_y: plan.support_labels(shape.k_shot),
        query_x: stack_images(&query, spec)?,
        query_y: plan.query_labels(shape.k_query),
        classes: plan.classes.clone(),
    })
}

/// Episode parameters shared by the file-backed episodic adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodicParams {
    pub shape: EpisodeShape,
    /// Number of episodes planned for the split
    pub episodes: usize,
    /// Side length images are resized to
    pub resize: u32,
    pub seed: u64,
    pub method: String,
}

/// Image files with class labels plus the episodes planned over them.
#[derive(Debug, Clone)]
pub struct EpisodicImages {
    images: Vec<PathBuf>,
    labels: Vec<usize>,
    class_names: Vec<String>,
    shape: EpisodeShape,
    plans: Vec<EpisodePlan>,
    spec: ImageSpec,
}

impl EpisodicImages {
    /// `labels[i]` is the class of `images[i]`, an index into `class_names`.
    pub fn new(
        images: Vec<PathBuf>,
        labels: Vec<usize>,
        class_names: Vec<String>,
        params: &EpisodicParams,
    ) -> Result<Self, DatasetError> {
        let by_class = group_by_class(&labels, class_names.len());
        let plans = plan_episodes(&by_class, params.shape, params.episodes, params.seed)?;
        Ok(Self {
            images,
            labels,
            class_names,
            shape: params.shape,
            plans,
            spec: ImageSpec::imagenet(params.resize),
        })
    }

    /// Number of planned episodes.
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn num_images(&self) -> usize {
        self.images.len()
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn shape(&self) -> EpisodeShape {
        self.shape
    }

    pub fn plan(&self, index: usize) -> Option<&EpisodePlan> {
        self.plans.get(index)
    }

    /// Decode the images of episode `index`.
    pub async fn episode(&self, index: usize) -> Result<Episode, DatasetError> {
        let plan = self.plans.get(index).ok_or(DatasetError::IndexOutOfRange(index))?;
        let load_all = |positions: &[usize]| {
            try_join_all(
                positions
                    .iter()
                    .map(|&p| image::load(self.images[p].clone(), self.spec, Rotation::Deg0)),
            )
        };
        let support = load_all(&plan.support).await?;
        let query = load_all(&plan.query).await?;
        assemble(plan, self.shape, support, query, &self.spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grouped(classes: usize, per_class: usize) -> Vec<Vec<usize>> {
        let labels: Vec<usize> = (0..classes)
            .flat_map(|c| std::iter::repeat(c).take(per_class))
            .collect();
        group_by_class(&labels, classes)
    }

    #[test]
    fn plans_respect_shape() {
        let by_class = grouped(6, 5);
        let shape = EpisodeShape { n_way: 3, k_shot: 1, k_query: 2 };
        let plans = plan_episodes(&by_class, shape, 4, 9).unwrap();
        assert_eq!(plans.len(), 4);
        for p in &plans {
            assert_eq!(p.classes.len(), 3);
            assert_eq!(p.support.len(), 3);
            assert_eq!(p.query.len(), 6);
            for (i, &class) in p.classes.iter().enumerate() {
                assert!(by_class[class].contains(&p.support[i]));
                assert!(by_class[class].contains(&p.query[2 * i]));
                assert!(by_class[class].contains(&p.query[2 * i + 1]));
            }
            assert_eq!(p.query_labels(2), vec![0, 0, 1, 1, 2, 2]);
        }
        assert_eq!(plans, plan_episodes(&by_class, shape, 4, 9).unwrap());
    }

    #[test]
    fn too_few_images_per_class_is_an_error() {
        let by_class = grouped(5, 2);
        let shape = EpisodeShape { n_way: 2, k_shot: 1, k_query: 2 };
        let err = plan_episodes(&by_class, shape, 1, 0).unwrap_err();
        assert!(err.to_string().contains("k_shot + k_query"));
    }

    #[test]
    fn too_few_classes_is_an_error() {
        let by_class = grouped(2, 5);
        let shape = EpisodeShape { n_way: 5, k_shot: 1, k_query: 1 };
        assert!(plan_episodes(&by_class, shape, 1, 0).is_err());
    }

    #[test]
    fn empty_stack_keeps_geometry() {
        let spec = ImageSpec::imagenet(8);
        let a = stack_images(&[], &spec).unwrap();
        assert_eq!(a.shape(), &[0, 3, 8, 8]);
    }
}
