// tests/common/mod.rs
//
// Common fixture builders: tiny on-disk copies of every dataset layout.

#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fewshot_loader::Opts;
use image::{GrayImage, Luma, Rgb, RgbImage};
use ndarray::{Array1, Array4};
use ndarray_npy::NpzWriter;

/// Options small enough for the fixtures below.
pub fn small_opts(root: &Path, dataset: &str) -> Opts {
    Opts {
        dataset: dataset.to_string(),
        data_root: root.to_path_buf(),
        im_size: 8,
        n_way: 2,
        k_shot: 1,
        k_query: 1,
        meta_batchsz_train: 6,
        meta_batchsz_test: 4,
        batch_sz: 2,
        classes_per_it_tr: 3,
        classes_per_it_val: 2,
        num_support_val: 1,
        num_query_val: 1,
        iterations: 5,
        seed: 7,
        ..Opts::default()
    }
}

fn shade(class: usize, i: usize) -> u8 {
    (class * 40 + i * 3).min(255) as u8
}

fn write_rgb(path: &Path, value: u8) {
    RgbImage::from_pixel(6, 5, Rgb([value, 255 - value, value / 2]))
        .save(path)
        .unwrap();
}

/// `miniImagenet/images/*.jpg` plus `train.csv` and `val.csv`.
pub fn mini_imagenet(root: &Path, classes: usize, per_class: usize) -> PathBuf {
    let dir = root.join("miniImagenet");
    let images = dir.join("images");
    fs::create_dir_all(&images).unwrap();

    for mode in ["train", "val"] {
        let mut index = String::from("filename,label\n");
        for c in 0..classes {
            for i in 0..per_class {
                let name = format!("{}_n{:02}_{:03}.jpg", mode, c, i);
                write_rgb(&images.join(&name), shade(c, i));
                index.push_str(&format!("{},n{:02}\n", name, c));
            }
        }
        fs::write(dir.join(format!("{}.csv", mode)), index).unwrap();
    }
    dir
}

/// `tier_imagenet/<mode>/<class>/*.png`
pub fn tiered_simple(root: &Path, classes: usize, per_class: usize) -> PathBuf {
    let dir = root.join("tier_imagenet");
    for mode in ["train", "val"] {
        for c in 0..classes {
            let class_dir = dir.join(mode).join(format!("n{:02}", c));
            fs::create_dir_all(&class_dir).unwrap();
            for i in 0..per_class {
                write_rgb(&class_dir.join(format!("{:03}.png", i)), shade(c, i));
            }
        }
    }
    dir
}

/// `tier_imagenet/<mode>_images.npz` with `images` and `labels`.
pub fn tiered_legacy(root: &Path, classes: usize, per_class: usize) -> PathBuf {
    let dir = root.join("tier_imagenet");
    fs::create_dir_all(&dir).unwrap();
    let n = classes * per_class;
    for mode in ["train", "val"] {
        let images = Array4::from_shape_fn((n, 4, 4, 3), |(i, y, x, ch)| {
            ((i * 7 + y * 5 + x * 3 + ch) % 256) as u8
        });
        // sparse label values, as in the original hierarchy ids
        let labels = Array1::from_shape_fn(n, |i| ((i / per_class) * 100 + 3) as i64);

        let mut npz = NpzWriter::new(File::create(dir.join(format!("{}_images.npz", mode))).unwrap());
        npz.add_array("images", &images).unwrap();
        npz.add_array("labels", &labels).unwrap();
        npz.finish().unwrap();
    }
    dir
}

/// `omniglot/splits/vinyals/<mode>.txt` and `omniglot/data/...png`.
///
/// `classes` gives the number of classes per split (train, val, test); each
/// character appears with rotation 0 and 90, so one character gives two classes.
pub fn omniglot(root: &Path, classes: [usize; 3], per_class: usize) -> PathBuf {
    let dir = root.join("omniglot");
    let splits = dir.join("splits").join("vinyals");
    fs::create_dir_all(&splits).unwrap();

    for (mode, count) in ["train", "val", "test"].into_iter().zip(classes) {
        let mut lines = String::new();
        for c in 0..count {
            let character = format!("Alphabet_{}/character{:02}", mode, c / 2);
            let rot = if c % 2 == 0 { "rot000" } else { "rot090" };
            lines.push_str(&format!("{}/{}\n", character, rot));

            let char_dir = dir.join("data").join(&character);
            fs::create_dir_all(&char_dir).unwrap();
            for i in 0..per_class {
                let path = char_dir.join(format!("{:02}.png", i));
                if !path.exists() {
                    GrayImage::from_pixel(10, 10, Luma([shade(c, i)])).save(&path).unwrap();
                }
            }
        }
        fs::write(splits.join(format!("{}.txt", mode)), lines).unwrap();
    }
    dir
}
