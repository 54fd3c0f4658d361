// ============================================================
// Layer 5: Training Loop
// ============================================================
// Full train + validation loop using Burn's DataLoader.
//
// Per epoch:
//   1. shuffled pass over the training batches: forward, per-pixel
//      cross-entropy, backward, optimiser step
//   2. pass over the validation batches on the inner backend
//      (model.valid(), no autodiff graph)
//   3. log + CSV row
//   4. save the weights if the monitored loss improved
//
// Optimisers default to the Keras settings: RMSprop with rho=0.9,
// epsilon=1e-7, or Adam with epsilon=1e-7.

use anyhow::{bail, ensure, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer, RmsPropConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::sync::Arc;

use crate::application::train_use_case::{OptimizerKind, TrainConfig};
use crate::data::{
    batcher::{SegmentationBatch, SegmentationBatcher},
    dataset::PetsDataset,
};
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::{correct_pixels, SegmentationModel};

type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: PetsDataset,
    val_dataset:   PetsDataset,
    ckpt_manager:  &CheckpointManager,
) -> Result<Vec<EpochMetrics>> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train_loop::<MyBackend>(cfg, train_dataset, val_dataset, ckpt_manager, device)
}

/// Build the model and optimiser on backend `B`, then train.
pub fn train_loop<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    train_dataset: PetsDataset,
    val_dataset:   PetsDataset,
    ckpt_manager:  &CheckpointManager,
    device:        B::Device,
) -> Result<Vec<EpochMetrics>> {
    ensure!(
        train_dataset.batch_count() > 0,
        "Training set has {} samples, fewer than one batch of {}",
        train_dataset.pairs().len(),
        cfg.batch_size
    );

    let model: SegmentationModel<B> = cfg.model_config().init(&device);
    tracing::info!(
        "Model ready: {} parameters, base_filters={}",
        model.num_params(),
        cfg.base_filters
    );

    match cfg.optimizer {
        OptimizerKind::RmsProp => {
            let optim = RmsPropConfig::new()
                .with_alpha(0.9)
                .with_epsilon(1e-7)
                .init::<B, SegmentationModel<B>>();
            fit(cfg, model, optim, train_dataset, val_dataset, ckpt_manager, device)
        }
        OptimizerKind::Adam => {
            let optim = AdamConfig::new()
                .with_epsilon(1e-7)
                .init::<B, SegmentationModel<B>>();
            fit(cfg, model, optim, train_dataset, val_dataset, ckpt_manager, device)
        }
    }
}

fn build_loader<B: Backend>(
    cfg:     &TrainConfig,
    dataset: PetsDataset,
    shuffle: Option<u64>,
    device:  B::Device,
) -> Arc<dyn DataLoader<SegmentationBatch<B>>> {
    let workers = aligned_workers(dataset.batch_count(), cfg.num_workers);
    if workers != cfg.num_workers && cfg.num_workers > 1 {
        tracing::debug!(
            "Using {} loader workers instead of {} so every worker gets whole batches",
            workers,
            cfg.num_workers
        );
    }

    let mut builder = DataLoaderBuilder::new(SegmentationBatcher::<B>::new(device))
        .batch_size(cfg.batch_size);
    if let Some(seed) = shuffle {
        builder = builder.shuffle(seed);
    }
    if workers > 1 {
        builder = builder.num_workers(workers);
    }
    builder.build(dataset)
}

/// Largest worker count `<= requested` that divides `batch_count`.
///
/// burn's multi-worker loader hands each worker `len / workers` items and
/// every worker batches its own share, so a share that is not a whole
/// number of batches ends in a short batch.
fn aligned_workers(batch_count: usize, requested: usize) -> usize {
    (1..=requested.min(batch_count))
        .rev()
        .find(|w| batch_count % w == 0)
        .unwrap_or(1)
}

/// Running sums for one pass over a loader.
#[derive(Default)]
struct PassTotals {
    loss_sum: f64,
    batches:  usize,
    correct:  usize,
    pixels:   usize,
}

impl PassTotals {
    fn add(&mut self, loss: f64, correct: usize, pixels: usize) {
        self.loss_sum += loss;
        self.batches  += 1;
        self.correct  += correct;
        self.pixels   += pixels;
    }

    fn mean_loss(&self) -> f64 {
        if self.batches > 0 { self.loss_sum / self.batches as f64 } else { f64::NAN }
    }

    fn accuracy(&self) -> f64 {
        if self.pixels > 0 { self.correct as f64 / self.pixels as f64 } else { 0.0 }
    }
}

/// A loader stops at the first item that fails to decode, so a short pass
/// means part of the split was never seen.
fn ensure_complete(split: &str, epoch: usize, seen: usize, expected: usize) -> Result<()> {
    if seen < expected {
        bail!(
            "{} pass of epoch {} stopped after {} of {} batches; a sample failed to decode",
            split,
            epoch,
            seen,
            expected
        );
    }
    Ok(())
}

fn fit<B, O>(
    cfg:           &TrainConfig,
    mut model:     SegmentationModel<B>,
    mut optim:     O,
    train_dataset: PetsDataset,
    val_dataset:   PetsDataset,
    ckpt_manager:  &CheckpointManager,
    device:        B::Device,
) -> Result<Vec<EpochMetrics>>
where
    B: AutodiffBackend,
    O: Optimizer<SegmentationModel<B>, B>,
{
    // ── Data loaders ──────────────────────────────────────────────────────────
    // Validation runs on the inner backend, without autodiff overhead
    let train_batches = train_dataset.batch_count();
    let val_batches   = val_dataset.batch_count();
    let train_loader = build_loader::<B>(cfg, train_dataset, Some(cfg.shuffle_seed), device.clone());
    let val_loader   = build_loader::<B::InnerBackend>(cfg, val_dataset, None, device);
    if val_batches == 0 {
        tracing::warn!("Validation set is smaller than one batch; monitoring training loss instead");
    }

    let metrics_log = MetricsLogger::create(ckpt_manager.dir())?;
    tracing::info!("Writing metrics to '{}'", metrics_log.csv_path().display());
    let mut history = Vec::with_capacity(cfg.epochs);
    let mut best    = f64::INFINITY;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train = PassTotals::default();

        for batch in train_loader.iter() {
            let [n, h, w] = batch.targets.dims();
            ensure!(
                n == cfg.batch_size,
                "Training batch has {} samples, expected {}; a sample failed to decode",
                n,
                cfg.batch_size
            );
            let (loss, logits) = model.forward_loss(batch.images, batch.targets.clone());

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            train.add(loss_val, correct_pixels(logits.detach(), batch.targets), n * h * w);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }
        ensure_complete("Training", epoch, train.batches, train_batches)?;

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();
        let mut val = PassTotals::default();

        for batch in val_loader.iter() {
            let [n, h, w] = batch.targets.dims();
            ensure!(
                n == cfg.batch_size,
                "Validation batch has {} samples, expected {}; a sample failed to decode",
                n,
                cfg.batch_size
            );
            let (loss, logits) = model_valid.forward_loss(batch.images, batch.targets.clone());
            val.add(
                loss.into_scalar().elem::<f64>(),
                correct_pixels(logits, batch.targets),
                n * h * w,
            );
        }
        ensure_complete("Validation", epoch, val.batches, val_batches)?;

        let metrics = EpochMetrics::new(
            epoch,
            train.mean_loss(),
            train.accuracy(),
            val.mean_loss(),
            val.accuracy(),
        );

        println!(
            "Epoch {:>3}/{} | loss={:.4} | accuracy={:.1}% | val_loss={:.4} | val_accuracy={:.1}%",
            epoch, cfg.epochs,
            metrics.train_loss, metrics.train_acc * 100.0,
            metrics.val_loss,   metrics.val_acc   * 100.0,
        );
        metrics_log.log(&metrics)?;

        // ── Save best only ────────────────────────────────────────────────────
        if metrics.is_improvement(best) {
            tracing::info!(
                "Epoch {}: monitored loss improved from {:.4} to {:.4}, saving model",
                epoch,
                best,
                metrics.monitor()
            );
            best = metrics.monitor();
            ckpt_manager.save_best(&model_valid, epoch, best)?;
        } else {
            tracing::info!("Epoch {}: monitored loss did not improve from {:.4}", epoch, best);
        }

        history.push(metrics);
    }

    tracing::info!("Training complete!");
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::SamplePair;
    use burn::backend::{Autodiff, NdArray};
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use std::path::Path;

    fn write_pairs(dir: &Path, count: usize) -> Vec<SamplePair> {
        (0..count)
            .map(|i| {
                let image = dir.join(format!("pet_{i}.jpg"));
                let mask  = dir.join(format!("pet_{i}.png"));
                RgbImage::from_fn(16, 16, |x, _| Rgb([(x * 16) as u8, 90, 180]))
                    .save(&image)
                    .unwrap();
                GrayImage::from_fn(16, 16, |x, _| Luma([if x < 8 { 1 } else { 2 }]))
                    .save(&mask)
                    .unwrap();
                SamplePair::new(image, mask)
            })
            .collect()
    }

    fn tiny_config(checkpoint_dir: &Path) -> TrainConfig {
        TrainConfig {
            checkpoint_dir: checkpoint_dir.display().to_string(),
            img_size:       16,
            batch_size:     2,
            epochs:         2,
            val_samples:    2,
            base_filters:   2,
            num_workers:    0,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_smoke_training_writes_history_and_checkpoint() {
        let dir   = tempfile::tempdir().unwrap();
        let pairs = write_pairs(dir.path(), 6);
        let cfg   = tiny_config(&dir.path().join("ckpt"));
        let ckpt  = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();

        let train = cfg.dataset(pairs[..4].to_vec());
        let val   = cfg.dataset(pairs[4..].to_vec());

        let history = train_loop::<Autodiff<NdArray>>(&cfg, train, val, &ckpt, Default::default())
            .unwrap();

        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|m| m.train_loss.is_finite() && m.val_loss.is_finite()));
        assert!(history.iter().all(|m| (0.0..=1.0).contains(&m.val_acc)));

        let best = ckpt.best().unwrap();
        assert!((1..=2).contains(&best.epoch));

        let csv = std::fs::read_to_string(ckpt.dir().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_worker_count_divides_batch_count() {
        assert_eq!(aligned_workers(69, 2), 1);
        assert_eq!(aligned_workers(70, 2), 2);
        assert_eq!(aligned_workers(12, 5), 4);
        assert_eq!(aligned_workers(3, 8), 3);
        assert_eq!(aligned_workers(0, 2), 1);
        assert_eq!(aligned_workers(5, 0), 1);
    }

    #[test]
    fn test_multi_worker_loader_yields_full_batches_only() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { num_workers: 2, ..tiny_config(&dir.path().join("ckpt")) };

        for count in [6, 8, 9] {
            let pairs   = write_pairs(dir.path(), count);
            let dataset = cfg.dataset(pairs);
            let expected = dataset.batch_count();

            let loader = build_loader::<NdArray>(&cfg, dataset, Some(cfg.shuffle_seed), Default::default());
            let sizes: Vec<usize> = loader.iter().map(|b| b.images.dims()[0]).collect();

            assert_eq!(sizes.len(), expected, "{count} pairs gave batches {sizes:?}");
            assert!(sizes.iter().all(|&n| n == cfg.batch_size), "{count} pairs gave batches {sizes:?}");
        }
    }

    #[test]
    fn test_corrupt_mask_fails_training() {
        let dir   = tempfile::tempdir().unwrap();
        let pairs = write_pairs(dir.path(), 6);
        let cfg   = TrainConfig { epochs: 1, ..tiny_config(&dir.path().join("ckpt")) };
        let ckpt  = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();

        std::fs::write(&pairs[0].mask, b"not a png").unwrap();

        let train = cfg.dataset(pairs[..4].to_vec());
        let val   = cfg.dataset(pairs[4..].to_vec());

        let result = train_loop::<Autodiff<NdArray>>(&cfg, train, val, &ckpt, Default::default());
        assert!(result.is_err());
        assert!(ckpt.best().is_err());
    }

    #[test]
    fn test_corrupt_validation_mask_fails_training() {
        let dir   = tempfile::tempdir().unwrap();
        let pairs = write_pairs(dir.path(), 6);
        let cfg   = TrainConfig { epochs: 1, ..tiny_config(&dir.path().join("ckpt")) };
        let ckpt  = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();

        std::fs::write(&pairs[5].mask, b"not a png").unwrap();

        let train = cfg.dataset(pairs[..4].to_vec());
        let val   = cfg.dataset(pairs[4..].to_vec());

        assert!(train_loop::<Autodiff<NdArray>>(&cfg, train, val, &ckpt, Default::default()).is_err());
    }

    #[test]
    fn test_training_needs_one_full_batch() {
        let dir   = tempfile::tempdir().unwrap();
        let pairs = write_pairs(dir.path(), 1);
        let cfg   = tiny_config(&dir.path().join("ckpt"));
        let ckpt  = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();

        let train = cfg.dataset(pairs);
        let val   = cfg.dataset(Vec::new());

        assert!(train_loop::<Autodiff<NdArray>>(&cfg, train, val, &ckpt, Default::default()).is_err());
    }
}
