// ============================================================
// Layer 6: Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// File layout:
//   checkpoints/
//     train_config.json         ← data + model settings of the run
//     pets_segmentation.mpk.gz  ← weights of the best epoch so far
//     best_checkpoint.json      ← {"epoch": 7, "monitor": 0.3412}
//     metrics.csv               ← written by MetricsLogger
//
// Only the best epoch is kept: the weights file is overwritten
// whenever the monitored loss improves.

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::SegmentationModel;

/// Base name of the weights file (the recorder appends ".mpk.gz")
pub const MODEL_FILE: &str = "pets_segmentation";

/// Which epoch the saved weights come from, and its monitored loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestCheckpoint {
    pub epoch:   usize,
    pub monitor: f64,
}

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing checkpoint directory without creating it.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Overwrite the stored weights with `model` and record which
    /// epoch they came from.
    pub fn save_best<B: Backend>(
        &self,
        model:   &SegmentationModel<B>,
        epoch:   usize,
        monitor: f64,
    ) -> Result<()> {
        let path = self.dir.join(MODEL_FILE);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", path.display())
            })?;

        let best = BestCheckpoint { epoch, monitor };
        let best_path = self.dir.join("best_checkpoint.json");
        fs::write(&best_path, serde_json::to_string_pretty(&best)?)
            .with_context(|| format!("Cannot write '{}'", best_path.display()))?;

        tracing::debug!("Saved checkpoint: epoch {} (monitor={:.4})", epoch, monitor);
        Ok(())
    }

    /// Load the best saved weights into `model`.
    ///
    /// The model must have the architecture the checkpoint was
    /// written with, or loading fails.
    pub fn load_model<B: Backend>(
        &self,
        model:  SegmentationModel<B>,
        device: &B::Device,
    ) -> Result<SegmentationModel<B>> {
        let best = self.best()?;
        let path = self.dir.join(MODEL_FILE);

        tracing::info!("Loading checkpoint from epoch {}", best.epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// Read best_checkpoint.json.
    pub fn best(&self) -> Result<BestCheckpoint> {
        let path = self.dir.join("best_checkpoint.json");

        let s = fs::read_to_string(&path)
            .with_context(|| {
                format!("Cannot find '{}'. Have you run 'train' first?", path.display())
            })?;

        Ok(serde_json::from_str(&s)?)
    }

    /// Save the training configuration to JSON so prediction can
    /// rebuild the same model and the same data split.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| {
                format!("Cannot write config to '{}'", path.display())
            })?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");

        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train' before 'predict'.",
                    path.display()
                )
            })?;

        Ok(serde_json::from_str(&json)?)
    }
}
