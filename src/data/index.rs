// ============================================================
// Layer 4: Dataset Indexer
// ============================================================
// Lists the Oxford-IIIT Pet directories and pairs every photo
// with its trimap.
//
// Directory layout expected:
//   images/images/           Abyssinian_1.jpg, Abyssinian_10.jpg, ...
//   annotations/.../trimaps/ Abyssinian_1.png, Abyssinian_10.png, ...
//
// Filtering rules:
//   - inputs:  names ending in ".jpg"
//   - targets: names ending in ".png" and not starting with "."
//              (the archive ships "._Abyssinian_1.png" resource forks)
//
// Both lists are sorted by full path, then zipped. The lists must
// have the same length and every pair must share its file stem.

use anyhow::{bail, Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::sample::SamplePair;
use crate::domain::traits::SampleSource;

/// Indexes a directory of .jpg photos against a directory of .png trimaps.
pub struct PetsIndex {
    input_dir:  PathBuf,
    target_dir: PathBuf,
}

impl PetsIndex {
    pub fn new(input_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir:  input_dir.into(),
            target_dir: target_dir.into(),
        }
    }
}

impl SampleSource for PetsIndex {
    fn load_all(&self) -> Result<Vec<SamplePair>> {
        let inputs = list_sorted(&self.input_dir, |name| name.ends_with(".jpg"))?;
        let targets = list_sorted(&self.target_dir, |name| {
            name.ends_with(".png") && !name.starts_with('.')
        })?;

        if inputs.len() != targets.len() {
            bail!(
                "Found {} images in '{}' but {} masks in '{}'",
                inputs.len(),
                self.input_dir.display(),
                targets.len(),
                self.target_dir.display()
            );
        }

        let pairs: Vec<SamplePair> = inputs
            .into_iter()
            .zip(targets)
            .map(|(image, mask)| SamplePair::new(image, mask))
            .collect();

        if let Some(bad) = pairs.iter().find(|p| p.stem().is_none()) {
            bail!(
                "Image '{}' is paired with mask '{}': file names do not match",
                bad.image.display(),
                bad.mask.display()
            );
        }

        tracing::info!("Number of samples: {}", pairs.len());
        Ok(pairs)
    }
}

/// Return the sorted paths of all files in `dir` whose name passes `keep`.
fn list_sorted(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for entry in fs::read_dir(dir)
        .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
    {
        let entry = entry?;
        let name  = entry.file_name();
        let Some(name) = name.to_str() else {
            tracing::debug!("Skipping non UTF-8 file name {:?}", name);
            continue;
        };
        if keep(name) {
            paths.push(entry.path());
        }
    }

    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn touch(dir: &Path, name: &str) {
        File::create(dir.join(name)).unwrap();
    }

    fn fixture(images: &[&str], masks: &[&str]) -> (tempfile::TempDir, PetsIndex) {
        let root = tempfile::tempdir().unwrap();
        let img_dir  = root.path().join("images");
        let mask_dir = root.path().join("trimaps");
        fs::create_dir_all(&img_dir).unwrap();
        fs::create_dir_all(&mask_dir).unwrap();
        images.iter().for_each(|n| touch(&img_dir, n));
        masks.iter().for_each(|n| touch(&mask_dir, n));
        let index = PetsIndex::new(img_dir, mask_dir);
        (root, index)
    }

    #[test]
    fn test_pairs_are_filtered_and_sorted() {
        let (_root, index) = fixture(
            &["pug_2.jpg", "beagle_1.jpg", "notes.mat"],
            &["pug_2.png", "._pug_2.png", "beagle_1.png", "README.txt"],
        );
        let pairs = index.load_all().unwrap();

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].stem(), Some("beagle_1"));
        assert_eq!(pairs[1].stem(), Some("pug_2"));
    }

    #[test]
    fn test_count_mismatch_is_an_error() {
        let (_root, index) = fixture(&["a.jpg", "b.jpg"], &["a.png"]);
        assert!(index.load_all().is_err());
    }

    #[test]
    fn test_stem_mismatch_is_an_error() {
        let (_root, index) = fixture(&["a.jpg", "b.jpg"], &["a.png", "c.png"]);
        assert!(index.load_all().is_err());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let index = PetsIndex::new("/definitely/not/here", "/nor/here");
        assert!(index.load_all().is_err());
    }
}
