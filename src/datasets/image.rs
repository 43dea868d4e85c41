// src/datasets/image.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Image decoding shared by the adapters: read, decode off the async
//! executor, rotate, resize and lay out as a CHW `f32` tensor.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use ndarray::Array3;

use crate::data_loader::DatasetError;

/// Per-channel mean used for ImageNet-style normalisation.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Per-channel standard deviation used for ImageNet-style normalisation.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Counter-clockwise rotation applied before resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(deg: u32) -> Option<Self> {
        match deg {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    fn apply(self, img: DynamicImage) -> DynamicImage {
        // image's rotate* helpers turn clockwise
        match self {
            Rotation::Deg0 => img,
            Rotation::Deg90 => img.rotate270(),
            Rotation::Deg180 => img.rotate180(),
            Rotation::Deg270 => img.rotate90(),
        }
    }
}

/// Pixel conversion applied after resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preprocess {
    /// RGB, scaled to `[0, 1]` then normalised with ImageNet mean/std.
    ImageNet,
    /// Single channel, `1 - x / 255` (ink becomes high values).
    InvertedGray,
}

/// Target geometry and pixel conversion for one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpec {
    pub size: u32,
    pub preprocess: Preprocess,
}

impl ImageSpec {
    pub fn imagenet(size: u32) -> Self {
        Self { size: size.max(1), preprocess: Preprocess::ImageNet }
    }

    pub fn inverted_gray(size: u32) -> Self {
        Self { size: size.max(1), preprocess: Preprocess::InvertedGray }
    }

    pub fn channels(&self) -> usize {
        match self.preprocess {
            Preprocess::ImageNet => 3,
            Preprocess::InvertedGray => 1,
        }
    }
}

/// Resize and convert an already decoded image.
pub fn to_tensor(img: DynamicImage, spec: &ImageSpec) -> Array3<f32> {
    let side = spec.size as usize;
    let resized = img.resize_exact(spec.size, spec.size, FilterType::Lanczos3);
    match spec.preprocess {
        Preprocess::ImageNet => {
            let rgb = resized.to_rgb8();
            Array3::from_shape_fn((3, side, side), |(c, y, x)| {
                let v = rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
                (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c]
            })
        }
        Preprocess::InvertedGray => {
            let gray = resized.to_luma8();
            Array3::from_shape_fn((1, side, side), |(_, y, x)| {
                1.0 - gray.get_pixel(x as u32, y as u32)[0] as f32 / 255.0
            })
        }
    }
}

/// Decode encoded bytes (png/jpeg) into a tensor.
pub fn decode(
    bytes: &[u8],
    path: &Path,
    spec: &ImageSpec,
    rotation: Rotation,
) -> Result<Array3<f32>, DatasetError> {
    let img = image::load_from_memory(bytes).map_err(|source| DatasetError::Image {
        path: path.display().to_string(),
        source,
    })?;
    Ok(to_tensor(rotation.apply(img), spec))
}

/// Build a tensor from a raw interleaved RGB buffer of `height x width`.
pub fn from_raw_rgb(
    height: u32,
    width: u32,
    pixels: Vec<u8>,
    spec: &ImageSpec,
) -> Result<Array3<f32>, DatasetError> {
    let img = RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
        DatasetError::from(format!("raw buffer does not hold a {}x{} RGB image", height, width))
    })?;
    Ok(to_tensor(DynamicImage::ImageRgb8(img), spec))
}

/// Read and decode one image file.
pub async fn load(
    path: PathBuf,
    spec: ImageSpec,
    rotation: Rotation,
) -> Result<Array3<f32>, DatasetError> {
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| DatasetError::from(format!("Failed to read image {}: {}", path.display(), e)))?;

    tokio::task::spawn_blocking(move || decode(&bytes, &path, &spec, rotation))
        .await
        .map_err(|e| DatasetError::Backend(e.into()))?
}
