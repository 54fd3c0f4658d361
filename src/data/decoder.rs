// ============================================================
// Layer 4: Image Decoder
// ============================================================
// Turns one file on disk into flat numeric buffers:
//
//   photo (.jpg) → RGB → resize → Vec<f32>  [height * width * 3]
//   trimap (.png) → gray → resize → Vec<u8> [height * width]
//
// Both use nearest-neighbour resizing. For the trimap this is a
// hard requirement: any smoothing filter would invent values
// between 1, 2 and 3 that are not valid labels.
//
// Pixel values are kept in 0..=255; the first batch-norm layer
// of the model takes care of scale.

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::trimap::label_from_raw;

/// Target spatial size every sample is resized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub height: usize,
    pub width:  usize,
}

impl ImageSize {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    pub fn square(side: usize) -> Self {
        Self::new(side, side)
    }

    /// Number of pixels per channel
    pub fn area(&self) -> usize {
        self.height * self.width
    }
}

/// Decode a photo and return its resized RGB pixels in HWC order.
pub fn load_image(path: &Path, size: ImageSize) -> Result<Vec<f32>> {
    let img = image::open(path)
        .with_context(|| format!("Cannot decode image '{}'", path.display()))?
        .to_rgb8();

    let resized = imageops::resize(&img, size.width as u32, size.height as u32, FilterType::Nearest);
    Ok(resized.into_raw().into_iter().map(f32::from).collect())
}

/// Decode a trimap and return one zero-based class index per pixel.
///
/// # Errors
/// Fails when the file cannot be decoded or when a pixel holds a
/// value outside 1..=num_classes.
pub fn load_mask(path: &Path, size: ImageSize, num_classes: usize) -> Result<Vec<u8>> {
    let img = image::open(path)
        .with_context(|| format!("Cannot decode mask '{}'", path.display()))?
        .to_luma8();

    let resized = imageops::resize(&img, size.width as u32, size.height as u32, FilterType::Nearest);

    resized
        .into_raw()
        .into_iter()
        .map(|raw| {
            label_from_raw(raw, num_classes).with_context(|| {
                format!(
                    "Mask '{}' holds value {} outside 1..={}",
                    path.display(),
                    raw,
                    num_classes
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn test_image_is_resized_to_hwc() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.png");
        RgbImage::from_pixel(20, 10, Rgb([10, 20, 30])).save(&path).unwrap();

        let pixels = load_image(&path, ImageSize::square(16)).unwrap();
        assert_eq!(pixels.len(), 16 * 16 * 3);
        assert_eq!(&pixels[..3], &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_jpeg_decodes() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("dog.jpg");
        RgbImage::from_pixel(8, 8, Rgb([200, 200, 200])).save(&path).unwrap();

        let pixels = load_image(&path, ImageSize::new(4, 6)).unwrap();
        assert_eq!(pixels.len(), 4 * 6 * 3);
    }

    #[test]
    fn test_mask_values_shift_to_zero_based() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.png");
        let mut mask = GrayImage::from_pixel(4, 4, Luma([2]));
        mask.put_pixel(0, 0, Luma([1]));
        mask.put_pixel(3, 3, Luma([3]));
        mask.save(&path).unwrap();

        let labels = load_mask(&path, ImageSize::square(4), 3).unwrap();
        assert_eq!(labels.len(), 16);
        assert_eq!(labels[0],  0);
        assert_eq!(labels[1],  1);
        assert_eq!(labels[15], 2);
    }

    #[test]
    fn test_mask_with_zero_is_rejected() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.png");
        GrayImage::from_pixel(4, 4, Luma([0])).save(&path).unwrap();

        assert!(load_mask(&path, ImageSize::square(4), 3).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_image(Path::new("/no/such/file.jpg"), ImageSize::square(4)).is_err());
    }
}
