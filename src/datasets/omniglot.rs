//! Omniglot adapter (Vinyals splits).
//!
//! Layout:
//!   root/splits/vinyals/<mode>.txt   one class per line, `<alphabet>/<character>/rot<deg>`
//!   root/data/<alphabet>/<character>/*.png
//!
//! Every line is its own class (the same character under another rotation
//! is a different class); the label is the line's position in the file.

use std::path::{Path, PathBuf};

use ndarray::Array3;

use crate::config::Split;
use crate::constants::OMNIGLOT_IMAGE_SIZE;
use crate::data_loader::DatasetError;
use crate::datasets::image::{self, ImageSpec, Rotation};
use crate::log_sink::LogSink;

#[derive(Debug, Clone)]
struct Item {
    path: PathBuf,
    rotation: Rotation,
}

#[derive(Debug, Clone)]
pub struct Omniglot {
    mode: Split,
    items: Vec<Item>,
    y: Vec<usize>,
    class_names: Vec<String>,
    spec: ImageSpec,
}

impl Omniglot {
    pub fn new(root: &Path, mode: Split, log: &LogSink) -> Result<Self, DatasetError> {
        let split_file = root.join("splits").join("vinyals").join(format!("{}.txt", mode));
        let classes = read_split(&split_file)?;

        let data_dir = root.join("data");
        let mut items = Vec::new();
        let mut y = Vec::new();
        let mut class_names = Vec::with_capacity(classes.len());
        for (label, (character, rotation, name)) in classes.into_iter().enumerate() {
            for path in png_files(&data_dir.join(&character))? {
                items.push(Item { path, rotation });
                y.push(label);
            }
            class_names.push(name);
        }

        log.print_log(&format!(
            "omniglot {}: {} items in {} classes",
            mode,
            items.len(),
            class_names.len()
        ));
        Ok(Self {
            mode,
            items,
            y,
            class_names,
            spec: ImageSpec::inverted_gray(OMNIGLOT_IMAGE_SIZE),
        })
    }

    pub fn mode(&self) -> Split {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Class label of every item.
    pub fn labels(&self) -> &[usize] {
        &self.y
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub async fn get(&self, index: usize) -> Result<(Array3<f32>, usize), DatasetError> {
        let item = self.items.get(index).ok_or(DatasetError::IndexOutOfRange(index))?;
        let x = image::load(item.path.clone(), self.spec, item.rotation).await?;
        Ok((x, self.y[index]))
    }
}

/// Parse split lines into `(character path, rotation, class name)`.
fn read_split(path: &Path) -> Result<Vec<(String, Rotation, String)>, DatasetError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| DatasetError::from(format!("Failed to read split file {}: {}", path.display(), e)))?;

    let mut classes = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let rotation = line
            .rsplit_once('/')
            .and_then(|(character, rot)| {
                let deg = rot.strip_prefix("rot")?.parse::<u32>().ok()?;
                Some((character, Rotation::from_degrees(deg)?))
            });
        let Some((character, rotation)) = rotation else {
            return Err(DatasetError::from(format!(
                "{}:{}: expected `<alphabet>/<character>/rot<0|90|180|270>`, got {:?}",
                path.display(),
                lineno + 1,
                line
            )));
        };
        classes.push((character.to_string(), rotation, line.to_string()));
    }
    Ok(classes)
}

fn png_files(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| DatasetError::from(format!("Failed to read directory {}: {}", dir.display(), e)))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| DatasetError::from(format!("Failed to read directory entry: {}", e)))?
            .path();
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png")) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
