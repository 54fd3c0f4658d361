// ============================================================
// Layer 2: PredictUseCase
// ============================================================
// Loads the best checkpoint and writes predicted masks as
// grayscale PNGs, contrast-stretched so the classes are visible:
//
//   --image <path>      one arbitrary photo
//   --val-index <i>     the i-th validation sample of the training
//                       split (rebuilt from the saved config)
//   --all-val <dir>     every validation sample, one PNG per stem

use anyhow::{Context, Result};
use burn::prelude::Backend;
use image::GrayImage;
use std::{fs, path::{Path, PathBuf}};

use crate::application::train_use_case::{build_split, TrainConfig};
use crate::data::{dataset::PetsDataset, decoder::{load_image, ImageSize}};
use crate::domain::trimap::{autocontrast, class_fractions};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::{InferBackend, Predictor};

/// What to predict.
#[derive(Debug, Clone)]
pub enum PredictTarget {
    Image(PathBuf),
    ValIndex(usize),
    AllVal,
}

pub struct PredictUseCase<B: Backend = InferBackend> {
    config:    TrainConfig,
    predictor: Predictor<B>,
}

impl PredictUseCase<InferBackend> {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_device(checkpoint_dir, burn::backend::wgpu::WgpuDevice::default())
    }
}

impl<B: Backend> PredictUseCase<B> {
    pub fn with_device(checkpoint_dir: impl Into<PathBuf>, device: B::Device) -> Result<Self> {
        let ckpt_manager = CheckpointManager::open(checkpoint_dir);
        let config       = ckpt_manager.load_config()?;
        let predictor    = Predictor::from_checkpoint(&ckpt_manager, device)?;
        Ok(Self { config, predictor })
    }

    /// Run the prediction and return the paths of the written masks.
    pub fn execute(&self, target: PredictTarget, output: &Path) -> Result<Vec<PathBuf>> {
        match target {
            PredictTarget::Image(path) => {
                self.predict_file(&path, output)?;
                Ok(vec![output.to_path_buf()])
            }
            PredictTarget::ValIndex(i) => {
                let dataset = self.validation_dataset()?;
                let pair = dataset.pairs().get(i).with_context(|| {
                    format!("Validation index {} out of range ({} samples)", i, dataset.pairs().len())
                })?;
                tracing::info!(
                    "Validation sample {}: image '{}', mask '{}'",
                    i,
                    pair.image.display(),
                    pair.mask.display()
                );
                self.predict_file(&pair.image, output)?;
                Ok(vec![output.to_path_buf()])
            }
            PredictTarget::AllVal => {
                let dataset = self.validation_dataset()?;
                fs::create_dir_all(output)
                    .with_context(|| format!("Cannot create '{}'", output.display()))?;

                let masks = self.predictor.predict_dataset(&dataset, self.config.batch_size)?;
                let mut written = Vec::with_capacity(masks.len());
                for (pair, mask) in dataset.pairs().iter().zip(masks) {
                    let stem = pair.stem().unwrap_or("sample");
                    let path = output.join(format!("{stem}.png"));
                    save_mask(&mask, dataset.img_size(), &path)?;
                    written.push(path);
                }
                Ok(written)
            }
        }
    }

    fn predict_file(&self, image: &Path, output: &Path) -> Result<()> {
        let size   = self.predictor.img_size();
        let pixels = load_image(image, size)?;
        let mask   = self.predictor.predict_mask(pixels)?;

        if self.config.num_classes == 3 {
            for (class, share) in class_fractions(&mask) {
                tracing::info!("{:>10}: {:.1}% of pixels", class.name(), share * 100.0);
            }
        }
        save_mask(&mask, size, output)
    }

    /// The validation split exactly as training built it.
    fn validation_dataset(&self) -> Result<PetsDataset> {
        let (_, val_pairs) = build_split(&self.config)?;
        Ok(self.config.dataset(val_pairs))
    }
}

/// Write a class mask as an autocontrasted grayscale PNG.
pub fn save_mask(mask: &[u8], size: ImageSize, path: &Path) -> Result<()> {
    let img = GrayImage::from_raw(size.width as u32, size.height as u32, autocontrast(mask))
        .with_context(|| format!("Mask has {} pixels, expected {}", mask.len(), size.area()))?;
    img.save(path)
        .with_context(|| format!("Cannot write mask '{}'", path.display()))?;
    tracing::info!("Wrote predicted mask '{}'", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainUseCase;
    use crate::ml::trainer::train_loop;
    use burn::backend::{Autodiff, NdArray};
    use image::{Luma, Rgb, RgbImage};

    /// `count` photo/trimap pairs in the on-disk layout the indexer expects,
    /// plus a config small enough to train in a test.
    fn pets_fixture(root: &Path, count: usize) -> TrainConfig {
        let images   = root.join("images");
        let trimaps  = root.join("trimaps");
        fs::create_dir_all(&images).unwrap();
        fs::create_dir_all(&trimaps).unwrap();

        for i in 0..count {
            RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, (i * 20) as u8]))
                .save(images.join(format!("pet_{i:02}.jpg")))
                .unwrap();
            GrayImage::from_fn(16, 16, |x, y| Luma([if x + y < 12 { 1 } else if x + y < 18 { 3 } else { 2 }]))
                .save(trimaps.join(format!("pet_{i:02}.png")))
                .unwrap();
        }

        TrainConfig {
            input_dir:      images.display().to_string(),
            target_dir:     trimaps.display().to_string(),
            checkpoint_dir: root.join("ckpt").display().to_string(),
            img_size:       16,
            batch_size:     2,
            epochs:         1,
            val_samples:    5,
            base_filters:   2,
            num_workers:    0,
            ..TrainConfig::default()
        }
    }

    fn train_fixture(cfg: &TrainConfig) {
        let history = TrainUseCase::new(cfg.clone())
            .execute_with(|cfg, train, val, ckpt| {
                train_loop::<Autodiff<NdArray>>(cfg, train, val, ckpt, Default::default())
            })
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_predict_rebuilds_the_training_split() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = pets_fixture(dir.path(), 11);
        train_fixture(&cfg);

        let (train_pairs, val_pairs) = build_split(&cfg).unwrap();
        assert_eq!(train_pairs.len(), 6);
        assert_eq!(val_pairs.len(), 5);
        assert!(val_pairs.iter().all(|p| !train_pairs.contains(p)));

        let use_case = PredictUseCase::<NdArray>::with_device(cfg.checkpoint_dir.as_str(), Default::default())
            .unwrap();
        let dataset = use_case.validation_dataset().unwrap();

        // Only full batches: 5 held-out pairs at batch size 2 leave 4
        assert_eq!(dataset.pairs(), &val_pairs[..4]);
    }

    #[test]
    fn test_predict_val_index_and_all_val() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = pets_fixture(dir.path(), 11);
        train_fixture(&cfg);

        let (_, val_pairs) = build_split(&cfg).unwrap();
        let use_case = PredictUseCase::<NdArray>::with_device(cfg.checkpoint_dir.as_str(), Default::default())
            .unwrap();

        let single  = dir.path().join("val_1.png");
        let written = use_case.execute(PredictTarget::ValIndex(1), &single).unwrap();
        assert_eq!(written, vec![single.clone()]);
        let img = image::open(&single).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (16, 16));

        // Index 4 is the dropped remainder of the validation split
        assert!(use_case.execute(PredictTarget::ValIndex(4), &dir.path().join("x.png")).is_err());

        let out_dir = dir.path().join("all_val");
        let written = use_case.execute(PredictTarget::AllVal, &out_dir).unwrap();
        let expected: Vec<PathBuf> = val_pairs[..4]
            .iter()
            .map(|p| out_dir.join(format!("{}.png", p.stem().unwrap())))
            .collect();
        assert_eq!(written, expected);
        assert!(written.iter().all(|p| p.is_file()));
        assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 4);
    }

    #[test]
    fn test_predict_arbitrary_image() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = pets_fixture(dir.path(), 11);
        train_fixture(&cfg);

        let use_case = PredictUseCase::<NdArray>::with_device(cfg.checkpoint_dir.as_str(), Default::default())
            .unwrap();

        let photo = dir.path().join("photo.jpg");
        RgbImage::from_fn(40, 24, |x, _| Rgb([(x * 6) as u8, 40, 200])).save(&photo).unwrap();

        let output = dir.path().join("photo_mask.png");
        use_case.execute(PredictTarget::Image(photo), &output).unwrap();
        assert_eq!(image::open(&output).unwrap().to_luma8().dimensions(), (16, 16));
    }

    #[test]
    fn test_predict_without_training_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PredictUseCase::<NdArray>::with_device(dir.path(), Default::default()).is_err());
    }

    #[test]
    fn test_saved_mask_is_stretched() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        save_mask(&[0, 1, 2, 2], ImageSize::new(2, 2), &path).unwrap();

        let img = image::open(&path).unwrap().to_luma8();
        assert_eq!(img.into_raw(), vec![0, 127, 255, 255]);
    }

    #[test]
    fn test_wrong_mask_length_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(save_mask(&[0, 1], ImageSize::new(2, 2), &dir.path().join("m.png")).is_err());
    }
}
