// ============================================================
// Layer 4: Segmentation Batcher
// ============================================================
// Implements Burn's Batcher trait to stack decoded samples into
// tensors for the model.
//
//   Input:  Vec of N SegmentationItems, each H×W
//   Output: SegmentationBatch with
//             images  [N, 3, H, W]   (float)
//             targets [N, H, W]      (int class indices)
//
// Pixels are stored HWC in each item, so the stacked buffer is
// NHWC and gets permuted to the NCHW layout burn's conv layers use.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::SegmentationItem;

// ─── SegmentationBatch ────────────────────────────────────────────────────────
/// A batch of images and their per-pixel targets.
#[derive(Debug, Clone)]
pub struct SegmentationBatch<B: Backend> {
    /// Shape: [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,

    /// Shape: [batch_size, height, width]
    pub targets: Tensor<B, 3, Int>,
}

// ─── SegmentationBatcher ──────────────────────────────────────────────────────
/// Holds the target device so tensors are created on the correct GPU/CPU.
#[derive(Clone, Debug)]
pub struct SegmentationBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SegmentationBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<SegmentationItem, SegmentationBatch<B>> for SegmentationBatcher<B> {
    fn batch(&self, items: Vec<SegmentationItem>) -> SegmentationBatch<B> {
        let batch_size = items.len();
        // Every item is resized to the same shape by the dataset
        let size = items[0].size;

        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|s| s.pixels.iter().copied())
            .collect();

        let labels: Vec<i64> = items
            .iter()
            .flat_map(|s| s.labels.iter().map(|&l| l as i64))
            .collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch_size, size.height, size.width, 3]),
            &self.device,
        )
        .permute([0, 3, 1, 2]);

        let targets = Tensor::<B, 3, Int>::from_data(
            TensorData::new(labels, [batch_size, size.height, size.width]),
            &self.device,
        );

        SegmentationBatch { images, targets }
    }
}
