// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes to Layer 2. Nothing here
// computes; it converts args into configs and prints results.
//
//   1. `train`     - joint generator/discriminator training
//   2. `translate` - greedy translation with a trained run
//
// Reference: Rust Book §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, TrainArgs, TranslateArgs};

#[derive(Parser, Debug)]
#[command(
    name = "adversarial-nmt",
    version = "0.1.0",
    about = "Adversarial / variational joint training for neural machine translation."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)     => run_train(args),
            Commands::Translate(args) => run_translate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting joint training on corpus in: {}", args.data);
    let summary = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Training complete: {} updates, best valid loss {:.3}. Checkpoints in {}",
        summary.num_updates,
        summary.best_loss,
        summary.run_dir.display()
    );
    Ok(())
}

fn run_translate(args: TranslateArgs) -> Result<()> {
    use crate::application::translate_use_case::TranslateUseCase;

    let report = TranslateUseCase::new(args.into()).execute()?;
    println!(
        "Translated {} sentences: {} (references: {})",
        report.sentences,
        report.predictions.display(),
        report.references.display()
    );
    Ok(())
}
