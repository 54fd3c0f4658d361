// ============================================================
// Layer 2: TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the configuration
//   Step 2: Index image/trimap pairs      (Layer 4 - data)
//   Step 3: Seeded shuffle + split        (Layer 4 - data)
//   Step 4: Build datasets                (Layer 4 - data)
//   Step 5: Save config                   (Layer 6 - infra)
//   Step 6: Run training loop             (Layer 5 - ml)

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::PetsDataset,
    decoder::ImageSize,
    index::PetsIndex,
    splitter::{shuffle_pairs, split_train_val, DEFAULT_SPLIT_SEED},
};
use crate::domain::{sample::SamplePair, traits::SampleSource};
use crate::infra::{checkpoint::CheckpointManager, metrics::EpochMetrics};
use crate::ml::model::{SegmentationModelConfig, SIZE_DIVISOR};
use crate::ml::trainer::run_training;

/// Which optimiser updates the weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    RmsProp,
    Adam,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything a run needs. Serialised next to the checkpoint so the
// predict command can rebuild the same model and validation split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub input_dir:      String,
    pub target_dir:     String,
    pub checkpoint_dir: String,
    /// Side length images and masks are resized to (square)
    pub img_size:       usize,
    pub num_classes:    usize,
    pub batch_size:     usize,
    pub epochs:         usize,
    /// Number of shuffled pairs held out for validation
    pub val_samples:    usize,
    /// Seed for the pair shuffle before splitting
    pub split_seed:     u64,
    /// Seed for the per-epoch batch order of the training loader
    pub shuffle_seed:   u64,
    pub lr:             f64,
    pub optimizer:      OptimizerKind,
    pub base_filters:   usize,
    pub num_workers:    usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            input_dir:      "../input/oxford-pets/images/images".to_string(),
            target_dir:     "../input/oxford-pets/annotations/annotations/trimaps".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            img_size:       160,
            num_classes:    3,
            batch_size:     16,
            epochs:         30,
            val_samples:    1108,
            split_seed:     DEFAULT_SPLIT_SEED,
            shuffle_seed:   42,
            lr:             1e-3,
            optimizer:      OptimizerKind::RmsProp,
            base_filters:   32,
            num_workers:    2,
        }
    }
}

impl TrainConfig {
    /// Reject settings the model or the data pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.img_size > 0, "img_size must be positive");
        ensure!(
            self.img_size % SIZE_DIVISOR == 0,
            "img_size ({}) must be a multiple of {}",
            self.img_size,
            SIZE_DIVISOR
        );
        ensure!(
            (1..=255).contains(&self.num_classes),
            "num_classes ({}) must be within 1..=255",
            self.num_classes
        );
        ensure!(self.batch_size > 0, "batch_size must be positive");
        ensure!(self.epochs > 0, "epochs must be positive");
        ensure!(self.base_filters > 0, "base_filters must be positive");
        ensure!(self.lr > 0.0, "lr must be positive");
        Ok(())
    }

    pub fn image_size(&self) -> ImageSize {
        ImageSize::square(self.img_size)
    }

    pub fn model_config(&self) -> SegmentationModelConfig {
        SegmentationModelConfig::new(self.num_classes).with_base_filters(self.base_filters)
    }

    pub fn dataset(&self, pairs: Vec<SamplePair>) -> PetsDataset {
        PetsDataset::new(pairs, self.batch_size, self.image_size(), self.num_classes)
    }
}

/// Index, shuffle and split the pairs exactly the way training does.
pub fn build_split(cfg: &TrainConfig) -> Result<(Vec<SamplePair>, Vec<SamplePair>)> {
    let index = PetsIndex::new(&cfg.input_dir, &cfg.target_dir);
    let pairs = index.load_all()?;
    let pairs = shuffle_pairs(pairs, cfg.split_seed);
    split_train_val(pairs, cfg.val_samples)
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        self.execute_with(run_training).map(|_| ())
    }

    /// Same pipeline, with the training loop supplied by the caller.
    pub fn execute_with<F>(&self, train: F) -> Result<Vec<EpochMetrics>>
    where
        F: FnOnce(&TrainConfig, PetsDataset, PetsDataset, &CheckpointManager) -> Result<Vec<EpochMetrics>>,
    {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate()?;

        // ── Steps 2–3: Index, shuffle, split ──────────────────────────────────
        tracing::info!("Indexing '{}' against '{}'", cfg.input_dir, cfg.target_dir);
        let (train_pairs, val_pairs) = build_split(cfg)?;
        tracing::info!(
            "Split: {} train, {} validation",
            train_pairs.len(),
            val_pairs.len()
        );

        // ── Step 4: Build Burn datasets ───────────────────────────────────────
        let train_dataset = cfg.dataset(train_pairs);
        let val_dataset   = cfg.dataset(val_pairs);
        tracing::info!(
            "Batches per epoch: {} train, {} validation",
            train_dataset.batch_count(),
            val_dataset.batch_count()
        );

        // ── Step 5: Save config for prediction ────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(cfg)?;

        // ── Step 6: Run training loop (Layer 5) ───────────────────────────────
        let history = train(cfg, train_dataset, val_dataset, &ckpt_manager)?;

        if let Ok(best) = ckpt_manager.best() {
            tracing::info!(
                "Best epoch {} of {} (monitored loss {:.4})",
                best.epoch,
                history.len(),
                best.monitor
            );
        }
        Ok(history)
    }
}
