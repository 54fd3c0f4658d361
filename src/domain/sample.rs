// ============================================================
// Layer 3: SamplePair Domain Type
// ============================================================
// One training example on disk: a .jpg photo and the .png
// trimap that labels every pixel of it.
//
// The two paths travel together in one struct, so shuffling
// or splitting a Vec<SamplePair> can never break the
// image ↔ mask correspondence.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An input image and its ground-truth trimap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePair {
    /// Path to the RGB photo (.jpg)
    pub image: PathBuf,

    /// Path to the trimap label mask (.png)
    pub mask: PathBuf,
}

impl SamplePair {
    /// Create a new SamplePair from anything path-like
    pub fn new(image: impl Into<PathBuf>, mask: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            mask:  mask.into(),
        }
    }

    /// File stem shared by the image and the mask, e.g. "Abyssinian_1".
    /// Returns None when the two stems disagree.
    pub fn stem(&self) -> Option<&str> {
        let image_stem = file_stem(&self.image)?;
        let mask_stem  = file_stem(&self.mask)?;
        (image_stem == mask_stem).then_some(image_stem)
    }
}

fn file_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}
