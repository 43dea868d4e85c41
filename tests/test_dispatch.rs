//! Integration tests for the dataset dispatcher.
//!
//! Every dataset layout is written into a temporary directory by the
//! builders in `common`, so no real benchmark data is needed.

mod common;

use std::collections::BTreeSet;

use anyhow::Result;
use fewshot_loader::{
    build_loaders, BuildError, Dataset, FewShotDataset, LogSink, Sample, Split, SplitLoader,
    TieredInterface,
};
use futures_util::StreamExt;
use tempfile::TempDir;

fn assert_episodic_shape(train: &SplitLoader, val: &SplitLoader, batch_sz: usize) {
    let train = train.loader().expect("train loader");
    let val = val.loader().expect("val loader");
    assert_eq!(train.options().batch_size, batch_sz);
    assert_eq!(train.options().num_workers, 8);
    assert_eq!(val.options().num_workers, 2);
    for l in [train, val] {
        assert!(l.options().shuffle);
        assert!(l.options().pin_memory);
        assert!(l.batch_sampler().is_none());
    }
}

#[tokio::test]
async fn mini_imagenet_builds_train_and_val_only() -> Result<()> {
    let tmp = TempDir::new()?;
    common::mini_imagenet(tmp.path(), 3, 3);
    let opts = common::small_opts(tmp.path(), "mini-imagenet");

    let loaders = build_loaders(&opts, &LogSink::tracing_only())?;
    assert_episodic_shape(&loaders.train, &loaders.val, 2);
    assert!(loaders.test.is_empty());
    assert!(loaders.trainval.is_empty());

    let train = loaders.train.loader().unwrap();
    assert_eq!(train.dataset().len(), Some(6));
    assert_eq!(train.num_batches(), Some(3));
    assert_eq!(loaders.val.loader().unwrap().dataset().len(), Some(4));

    let batch = train.stream().next().await.expect("one batch")?;
    assert_eq!(batch.len(), 2);
    let episode = batch[0].as_episode().expect("episodic sample");
    assert_eq!(episode.support_x.shape(), &[2, 3, 8, 8]);
    assert_eq!(episode.query_x.shape(), &[2, 3, 8, 8]);
    assert_eq!(episode.support_y, vec![0, 1]);
    assert_eq!(episode.n_way(), 2);
    Ok(())
}

#[tokio::test]
async fn tiered_interfaces_produce_the_same_loader_shape() -> Result<()> {
    let tmp = TempDir::new()?;
    common::tiered_simple(tmp.path(), 3, 4);
    // legacy episodes need nshot + 15 query images per class
    common::tiered_legacy(tmp.path(), 2, 18);

    let mut opts = common::small_opts(tmp.path(), "tier-imagenet");
    opts.k_query = 2;

    opts.tiered_interface = TieredInterface::Simple;
    let simple = build_loaders(&opts, &LogSink::tracing_only())?;
    opts.tiered_interface = TieredInterface::Legacy;
    let legacy = build_loaders(&opts, &LogSink::tracing_only())?;

    for loaders in [&simple, &legacy] {
        assert_episodic_shape(&loaders.train, &loaders.val, 2);
        assert!(loaders.test.is_empty());
        assert!(loaders.trainval.is_empty());
    }

    let simple_train = simple.train.loader().unwrap().dataset();
    let legacy_train = legacy.train.loader().unwrap().dataset();
    assert!(matches!(simple_train, FewShotDataset::TieredImagenet(_)));
    assert!(matches!(legacy_train, FewShotDataset::TieredImagenetLegacy(_)));
    assert_eq!(simple_train.len(), Some(6));

    // legacy validation episodes take their shot count from k_query
    let FewShotDataset::TieredImagenetLegacy(legacy_val) = legacy.val.loader().unwrap().dataset() else {
        panic!("legacy val adapter expected");
    };
    assert_eq!(legacy_val.shape().k_shot, 2);
    assert_eq!(legacy_val.num_classes(), 2);

    let batch = legacy.val.loader().unwrap().stream().next().await.expect("one batch")?;
    let episode = batch[0].as_episode().unwrap();
    assert_eq!(episode.support_x.shape(), &[4, 3, 8, 8]);
    assert_eq!(episode.query_x.shape(), &[30, 3, 8, 8]);
    Ok(())
}

#[test]
fn omniglot_rejects_too_many_training_classes() -> Result<()> {
    let tmp = TempDir::new()?;
    common::omniglot(tmp.path(), [4, 2, 2], 3);
    let mut opts = common::small_opts(tmp.path(), "omniglot");
    opts.classes_per_it_tr = 10;

    let err = build_loaders(&opts, &LogSink::tracing_only()).unwrap_err();
    assert!(matches!(err, BuildError::Configuration { option: "classes_per_it_tr", .. }));
    assert!(err.to_string().contains("classes_per_it_tr"));
    Ok(())
}

#[test]
fn omniglot_checks_validation_classes_against_training_split() -> Result<()> {
    let tmp = TempDir::new()?;
    common::omniglot(tmp.path(), [4, 2, 2], 3);
    let mut opts = common::small_opts(tmp.path(), "omniglot");
    opts.classes_per_it_val = 5;

    let err = build_loaders(&opts, &LogSink::tracing_only()).unwrap_err();
    assert_eq!(err.option(), Some("classes_per_it_val"));
    Ok(())
}

#[tokio::test]
async fn omniglot_builds_sampler_driven_loaders() -> Result<()> {
    let tmp = TempDir::new()?;
    common::omniglot(tmp.path(), [4, 2, 2], 3);
    let opts = common::small_opts(tmp.path(), "omniglot");
    let log_path = tmp.path().join("run.log");
    let log = LogSink::to_file(&log_path)?;

    let loaders = build_loaders(&opts, &log)?;
    assert!(loaders.trainval.is_empty());
    for split in [Split::Train, Split::Val, Split::Test] {
        let loader = loaders.get(split).loader().expect("populated split");
        let sampler = loader.batch_sampler().expect("batch sampler");
        assert_eq!(sampler.num_batches(), 5);
        assert_eq!(loader.options().num_workers, 0);
        assert!(!loader.options().shuffle);
    }
    assert_eq!(loaders.train.loader().unwrap().batch_sampler().unwrap().batch_len(), 6);
    assert_eq!(loaders.val.loader().unwrap().batch_sampler().unwrap().batch_len(), 4);

    let train = loaders.train.loader().unwrap();
    let batch = train.stream().next().await.expect("one batch")?;
    assert_eq!(batch.len(), 6);
    let classes: BTreeSet<_> = batch.iter().filter_map(Sample::label).collect();
    assert_eq!(classes.len(), 3);
    let Sample::Image { image, .. } = &batch[0] else { panic!("image sample expected") };
    assert_eq!(image.shape(), &[1, 28, 28]);

    let text = std::fs::read_to_string(&log_path)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Preparing datasets: [omniglot] ...");
    assert!(lines.contains(&"train data ..."));
    assert!(lines.contains(&"val data ..."));
    assert!(lines.contains(&"test data ..."));
    Ok(())
}

#[test]
fn unknown_dataset_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let opts = common::small_opts(tmp.path(), "unknown-foo");
    let err = build_loaders(&opts, &LogSink::tracing_only()).unwrap_err();
    assert!(matches!(err, BuildError::UnknownDataset(ref name) if name == "unknown-foo"));
}

#[test]
fn missing_files_surface_as_dataset_errors() {
    let tmp = TempDir::new().unwrap();
    let opts = common::small_opts(tmp.path(), "mini-imagenet");
    let err = build_loaders(&opts, &LogSink::tracing_only()).unwrap_err();
    assert!(matches!(err, BuildError::Dataset(_)));
}

#[test]
fn identical_configs_give_identical_loader_settings() -> Result<()> {
    let tmp = TempDir::new()?;
    common::mini_imagenet(tmp.path(), 3, 3);
    let opts = common::small_opts(tmp.path(), "mini-imagenet");

    let a = build_loaders(&opts, &LogSink::tracing_only())?;
    let b = build_loaders(&opts, &LogSink::tracing_only())?;
    for ((split, x), (_, y)) in a.iter().zip(b.iter()) {
        match (x.loader(), y.loader()) {
            (Some(x), Some(y)) => {
                assert_eq!(x.options(), y.options(), "{} options differ", split);
                assert_eq!(x.num_batches(), y.num_batches());
            }
            (None, None) => {}
            _ => panic!("{} populated in only one build", split),
        }
    }
    Ok(())
}
