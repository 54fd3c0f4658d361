// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// Parses command line arguments with clap and delegates all work
// to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`    trains the model on images + trimaps
//   2. `predict`  loads the best checkpoint and writes masks

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PredictArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "pet-segmentation",
    version = "0.1.0",
    about = "Train an encoder-decoder CNN on pet trimaps, then predict masks."
)]
pub struct Cli {
    /// The subcommand to run (train or predict)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on images in: {}", args.input_dir);
    let checkpoint_dir = args.checkpoint_dir.clone();

    TrainUseCase::new(args.into()).execute()?;

    println!("Training complete. Best checkpoint saved in '{}'.", checkpoint_dir);
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let use_case = PredictUseCase::new(&args.checkpoint_dir)?;
    let written  = use_case.execute(args.target(), &args.output)?;

    println!("Wrote {} predicted mask(s)", written.len());
    for path in written.iter().take(5) {
        println!("  {}", path.display());
    }
    Ok(())
}
