use burn::data::dataset::Dataset;

use crate::data::decoder::{load_image, load_mask, ImageSize};
use crate::domain::sample::SamplePair;

/// One decoded sample. Pixels are HWC with raw 0..=255 values,
/// labels are HW class indices.
#[derive(Debug, Clone)]
pub struct SegmentationItem {
    pub pixels: Vec<f32>,
    pub labels: Vec<u8>,
    pub size:   ImageSize,
}

/// Batch-indexed view over image/mask pairs. Files are decoded
/// lazily on `get`, and only whole batches are exposed: a trailing
/// remainder smaller than `batch_size` is dropped.
pub struct PetsDataset {
    pairs:       Vec<SamplePair>,
    batch_size:  usize,
    img_size:    ImageSize,
    num_classes: usize,
}

impl PetsDataset {
    pub fn new(
        mut pairs:   Vec<SamplePair>,
        batch_size:  usize,
        img_size:    ImageSize,
        num_classes: usize,
    ) -> Self {
        let full = (pairs.len() / batch_size.max(1)) * batch_size;
        if full < pairs.len() {
            tracing::debug!("Dropping {} samples that do not fill a batch", pairs.len() - full);
        }
        pairs.truncate(full);
        Self { pairs, batch_size, img_size, num_classes }
    }

    pub fn batch_count(&self) -> usize {
        self.pairs.len() / self.batch_size.max(1)
    }

    pub fn pairs(&self) -> &[SamplePair] {
        &self.pairs
    }

    pub fn img_size(&self) -> ImageSize {
        self.img_size
    }

    /// Decode pair `index`, surfacing the error instead of logging it.
    pub fn load(&self, index: usize) -> anyhow::Result<SegmentationItem> {
        let pair = self
            .pairs
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("Sample index {index} out of range ({})", self.pairs.len()))?;
        Ok(SegmentationItem {
            pixels: load_image(&pair.image, self.img_size)?,
            labels: load_mask(&pair.mask, self.img_size, self.num_classes)?,
            size:   self.img_size,
        })
    }
}

impl Dataset<SegmentationItem> for PetsDataset {
    fn get(&self, index: usize) -> Option<SegmentationItem> {
        match self.load(index) {
            Ok(item) => Some(item),
            Err(e) => {
                if index < self.pairs.len() {
                    tracing::error!("Failed to load sample {index}: {e:#}");
                }
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use std::path::Path;

    fn write_pair(dir: &Path, name: &str) -> SamplePair {
        let image = dir.join(format!("{name}.jpg"));
        let mask  = dir.join(format!("{name}.png"));
        RgbImage::from_pixel(8, 8, Rgb([50, 60, 70])).save(&image).unwrap();
        GrayImage::from_pixel(8, 8, Luma([1])).save(&mask).unwrap();
        SamplePair::new(image, mask)
    }

    #[test]
    fn test_only_full_batches_are_exposed() {
        let pairs: Vec<SamplePair> = (0..10)
            .map(|i| SamplePair::new(format!("{i}.jpg"), format!("{i}.png")))
            .collect();
        let ds = PetsDataset::new(pairs, 4, ImageSize::square(16), 3);
        assert_eq!(ds.batch_count(), 2);
        assert_eq!(ds.len(), 8);
    }

    #[test]
    fn test_get_decodes_pair() {
        let dir  = tempfile::tempdir().unwrap();
        let pair = write_pair(dir.path(), "pug_1");
        let ds   = PetsDataset::new(vec![pair], 1, ImageSize::square(16), 3);

        let item = ds.get(0).unwrap();
        assert_eq!(item.pixels.len(), 16 * 16 * 3);
        assert_eq!(item.labels.len(), 16 * 16);
        assert!(item.labels.iter().all(|&l| l == 0));
        assert!(ds.get(1).is_none());
    }

    #[test]
    fn test_unreadable_pair_yields_none() {
        let pair = SamplePair::new("/missing/a.jpg", "/missing/a.png");
        let ds   = PetsDataset::new(vec![pair], 1, ImageSize::square(16), 3);
        assert!(ds.get(0).is_none());
        assert!(ds.load(0).is_err());
    }
}
