// ============================================================
// Layer 1: CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `predict`, and their
// flags. Defaults reproduce the original notebook constants.

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::predict_use_case::PredictTarget;
use crate::application::train_use_case::{OptimizerKind, TrainConfig};
use crate::data::splitter::DEFAULT_SPLIT_SEED;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the segmentation model on images and trimaps
    Train(TrainArgs),

    /// Predict masks with a trained checkpoint
    Predict(PredictArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OptimizerArg {
    Rmsprop,
    Adam,
}

impl From<OptimizerArg> for OptimizerKind {
    fn from(a: OptimizerArg) -> Self {
        match a {
            OptimizerArg::Rmsprop => OptimizerKind::RmsProp,
            OptimizerArg::Adam    => OptimizerKind::Adam,
        }
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory containing the .jpg photos
    #[arg(long, default_value = "../input/oxford-pets/images/images")]
    pub input_dir: String,

    /// Directory containing the .png trimaps
    #[arg(long, default_value = "../input/oxford-pets/annotations/annotations/trimaps")]
    pub target_dir: String,

    /// Directory to save the config, best weights and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Side length images and masks are resized to (multiple of 16)
    #[arg(long, default_value_t = 160)]
    pub img_size: usize,

    /// Number of label classes in the masks
    #[arg(long, default_value_t = 3)]
    pub num_classes: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 30)]
    pub epochs: usize,

    /// Number of shuffled samples held out for validation
    #[arg(long, default_value_t = 1108)]
    pub val_samples: usize,

    /// Seed for shuffling the pairs before the split
    #[arg(long, default_value_t = DEFAULT_SPLIT_SEED)]
    pub split_seed: u64,

    /// Seed for the per-epoch training batch order
    #[arg(long, default_value_t = 42)]
    pub shuffle_seed: u64,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    #[arg(long, value_enum, default_value_t = OptimizerArg::Rmsprop)]
    pub optimizer: OptimizerArg,

    /// Width of the first conv layer; deeper layers scale from it
    #[arg(long, default_value_t = 32)]
    pub base_filters: usize,

    /// Data loader worker threads (0 = load on the training thread).
    /// Lowered to a count that splits the batches evenly.
    #[arg(long, default_value_t = 2)]
    pub num_workers: usize,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            input_dir:      a.input_dir,
            target_dir:     a.target_dir,
            checkpoint_dir: a.checkpoint_dir,
            img_size:       a.img_size,
            num_classes:    a.num_classes,
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            val_samples:    a.val_samples,
            split_seed:     a.split_seed,
            shuffle_seed:   a.shuffle_seed,
            lr:             a.lr,
            optimizer:      a.optimizer.into(),
            base_filters:   a.base_filters,
            num_workers:    a.num_workers,
        }
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Directory where training saved its checkpoint
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Photo to segment
    #[arg(long, conflicts_with_all = ["val_index", "all_val"])]
    pub image: Option<PathBuf>,

    /// Index into the validation split used during training
    #[arg(long, conflicts_with = "all_val")]
    pub val_index: Option<usize>,

    /// Predict every validation sample into the --output directory
    #[arg(long)]
    pub all_val: bool,

    /// Output PNG (or directory with --all-val)
    #[arg(long, default_value = "predicted_mask.png")]
    pub output: PathBuf,
}

impl PredictArgs {
    /// Which prediction was asked for; a lone `predict` means `--val-index 0`.
    pub fn target(&self) -> PredictTarget {
        match (&self.image, self.val_index, self.all_val) {
            (Some(path), _, _) => PredictTarget::Image(path.clone()),
            (None, _, true)    => PredictTarget::AllVal,
            (None, Some(i), _) => PredictTarget::ValIndex(i),
            (None, None, _)    => PredictTarget::ValIndex(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["pet-segmentation", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        let def = TrainConfig::default();

        assert_eq!(cfg.input_dir, def.input_dir);
        assert_eq!(cfg.target_dir, def.target_dir);
        assert_eq!(cfg.img_size, 160);
        assert_eq!(cfg.batch_size, 16);
        assert_eq!(cfg.val_samples, 1108);
        assert_eq!(cfg.split_seed, 1822);
        assert_eq!(cfg.optimizer, OptimizerKind::RmsProp);
    }

    #[test]
    fn test_optimizer_flag() {
        let cli = Cli::try_parse_from(["pet-segmentation", "train", "--optimizer", "adam"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        assert_eq!(TrainConfig::from(args).optimizer, OptimizerKind::Adam);
    }

    #[test]
    fn test_predict_targets() {
        let parse = |args: &[&str]| {
            let cli = Cli::try_parse_from(args).unwrap();
            let Commands::Predict(p) = cli.command else { panic!("expected predict") };
            p.target()
        };

        assert!(matches!(parse(&["x", "predict"]), PredictTarget::ValIndex(0)));
        assert!(matches!(parse(&["x", "predict", "--val-index", "120"]), PredictTarget::ValIndex(120)));
        assert!(matches!(parse(&["x", "predict", "--all-val"]), PredictTarget::AllVal));
        assert!(matches!(parse(&["x", "predict", "--image", "cat.jpg"]), PredictTarget::Image(_)));
    }

    #[test]
    fn test_image_conflicts_with_val_index() {
        let res = Cli::try_parse_from(["x", "predict", "--image", "a.jpg", "--val-index", "3"]);
        assert!(res.is_err());
    }
}
