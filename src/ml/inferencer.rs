// ============================================================
// Layer 5: Inferencer
// ============================================================
use anyhow::{ensure, Result};
use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::{
    batcher::SegmentationBatcher,
    dataset::{PetsDataset, SegmentationItem},
    decoder::ImageSize,
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::SegmentationModel;

pub type InferBackend = burn::backend::Wgpu;

/// A trained model plus the input size it was trained at.
pub struct Predictor<B: Backend> {
    model:    SegmentationModel<B>,
    img_size: ImageSize,
    device:   B::Device,
}

impl<B: Backend> Predictor<B> {
    /// Rebuild the model from the saved config and load the best weights.
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, device: B::Device) -> Result<Self> {
        let cfg   = ckpt_manager.load_config()?;
        let model = cfg.model_config().init::<B>(&device);
        let model = ckpt_manager.load_model(model, &device)?;
        tracing::info!("Model loaded from checkpoint ({} parameters)", model.num_params());
        Ok(Self { model, img_size: cfg.image_size(), device })
    }

    pub fn img_size(&self) -> ImageSize {
        self.img_size
    }

    /// Predict the class of every pixel of one decoded image.
    ///
    /// `pixels` is HWC at the model's input size; the result is HW.
    pub fn predict_mask(&self, pixels: Vec<f32>) -> Result<Vec<u8>> {
        ensure!(
            pixels.len() == self.img_size.area() * 3,
            "Expected {} pixel values, got {}",
            self.img_size.area() * 3,
            pixels.len()
        );
        let item = SegmentationItem {
            labels: vec![0; self.img_size.area()],
            pixels,
            size:   self.img_size,
        };
        let mut masks = self.predict_items(vec![item])?;
        Ok(masks.remove(0))
    }

    /// Predict every sample of `dataset`, one batch at a time.
    /// Output order follows dataset order.
    pub fn predict_dataset(&self, dataset: &PetsDataset, batch_size: usize) -> Result<Vec<Vec<u8>>> {
        let indices: Vec<usize> = (0..dataset.pairs().len()).collect();
        let mut masks = Vec::with_capacity(indices.len());

        for chunk in indices.chunks(batch_size.max(1)) {
            let items = chunk
                .iter()
                .map(|&i| dataset.load(i))
                .collect::<Result<Vec<_>>>()?;
            masks.extend(self.predict_items(items)?);
        }

        tracing::info!("Predicted {} masks", masks.len());
        Ok(masks)
    }

    fn predict_items(&self, items: Vec<SegmentationItem>) -> Result<Vec<Vec<u8>>> {
        let count   = items.len();
        let batcher = SegmentationBatcher::<B>::new(self.device.clone());
        let batch   = batcher.batch(items);

        let classes: Vec<i64> = self
            .model
            .predict_classes(batch.images)
            .into_data()
            .convert::<i64>()
            .to_vec()
            .map_err(|e| anyhow::anyhow!("Cannot read predictions: {e:?}"))?;

        let area = classes.len() / count;
        Ok(classes
            .chunks(area)
            .map(|mask| mask.iter().map(|&c| c as u8).collect())
            .collect())
    }
}
