// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the command line with clap and hands each subcommand to
// its use case in Layer 2. Results are printed here and nowhere
// else.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{BuildLmArgs, Commands, DecodeArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "morph-transducer",
    version,
    about = "Train and run per-tag character transducers for morphological inflection."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Decode(args)  => run_decode(args),
            Commands::BuildLm(args) => run_build_lm(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on '{}'", args.train_data);
    let output_dir = args.output_dir.clone();
    let best = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Training complete. Best accuracy {:.4}, checkpoint in '{}'.",
        best.best().unwrap_or_default(),
        output_dir
    );
    Ok(())
}

fn run_decode(args: DecodeArgs) -> Result<()> {
    use crate::application::decode_use_case::DecodeUseCase;

    let outcome = DecodeUseCase::new(args.into()).execute()?;
    for line in &outcome.lines {
        println!("{line}");
    }
    println!(
        "Accuracy: {:.4} ({}/{})",
        outcome.report.accuracy(),
        outcome.report.correct,
        outcome.report.total
    );
    Ok(())
}

fn run_build_lm(args: BuildLmArgs) -> Result<()> {
    use crate::application::lm_use_case::BuildLmUseCase;

    let output = args.output.clone();
    let summary = BuildLmUseCase::new(args.into()).execute()?;
    println!("Language model over {} sequences written to '{output}'.", summary.sequences);
    if let Some(perplexity) = summary.perplexity {
        println!("Corpus perplexity: {perplexity:.3}");
    }
    Ok(())
}
