use std::fs;
use std::path::{Path, PathBuf};

use crate::dataset::transform::load_training_image;
use crate::error::Error;
use crate::math::Tensor;

/// One labeled, preprocessed training sample.
#[derive(Debug, Clone)]
pub struct Sample {
    pub image: Tensor,
    pub class_index: usize,
}

/// A dataset discovered from a directory whose immediate children are
/// class-name subdirectories of image files. Class identity is the
/// subdirectory name; class index is sorted enumeration order.
#[derive(Debug, Clone)]
pub struct FolderDataset {
    pub classes: Vec<String>,
    pub samples: Vec<Sample>,
}

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

impl FolderDataset {
    /// Scans `root`, validates its layout, and eagerly decodes every image
    /// through the training transform.
    ///
    /// Validation rules:
    /// - an empty root, or a root with any plain-file child, is `Error::Dataset`
    /// - classes beyond the first `max_classes` (sorted order) are dropped
    ///   entirely: their names and all of their samples
    /// - files without a recognized image extension are skipped
    ///
    /// All decoding happens before this returns, so a failure leaves no
    /// partial state anywhere.
    pub fn load(root: &Path, max_classes: usize) -> Result<FolderDataset, Error> {
        let mut class_dirs: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                return Err(Error::Dataset(format!(
                    "'{}' is not a class folder; dataset directories must contain only class subdirectories",
                    path.display()
                )));
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            class_dirs.push((name, path));
        }

        if class_dirs.is_empty() {
            return Err(Error::Dataset(format!(
                "'{}' contains no class folders",
                root.display()
            )));
        }

        class_dirs.sort_by(|a, b| a.0.cmp(&b.0));
        // Excess classes are dropped outright, never padded: the model's
        // output width caps how many the dataset may contribute.
        class_dirs.truncate(max_classes);

        let mut classes = Vec::with_capacity(class_dirs.len());
        let mut samples = Vec::new();
        for (class_index, (name, dir)) in class_dirs.into_iter().enumerate() {
            let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .map(|e| e.path())
                .filter(|p| has_image_extension(p))
                .collect();
            files.sort();

            for file in files {
                samples.push(Sample {
                    image: load_training_image(&file)?,
                    class_index,
                });
            }
            classes.push(name);
        }

        Ok(FolderDataset { classes, samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(has_image_extension(Path::new("a/b/c.PNG")));
        assert!(has_image_extension(Path::new("x.jpeg")));
        assert!(!has_image_extension(Path::new("notes.txt")));
        assert!(!has_image_extension(Path::new("no_extension")));
    }
}
