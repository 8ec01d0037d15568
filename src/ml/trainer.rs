// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Per-example training over the tag bank, then held-out
// evaluation and best-accuracy checkpointing once per epoch:
//
//   for epoch in 1..=epochs:
//     shuffle the training set (seeded RNG)
//     for each example: step the (network, optimiser) of its tag
//     decode the evaluation set with the current networks,
//       fused with any frozen ensemble members
//     if accuracy > best so far: overwrite the checkpoint
//
// Training runs on Autodiff<NdArray>; evaluation decodes a
// valid() snapshot on the inner NdArray backend, so no autodiff
// graph is built while decoding.

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;
use rand::{rngs::StdRng, SeedableRng};

use crate::data::dataset::ExampleSet;
use crate::domain::{example::Example, traits::CharLanguageModel};
use crate::infra::{
    checkpoint::{CheckpointManager, CheckpointManifest},
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    decoder::{ensemble_decode, DecodeConfig},
    evaluator::{evaluate, BestScore, EvalReport},
    model::TransducerBank,
    tag_bank::TagBank,
};

pub type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;
pub type InferBackend = burn::backend::NdArray;

/// Loss totals of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochLoss {
    /// Summed example loss per tag id.
    pub per_tag:  Vec<f64>,
    pub examples: usize,
}

impl EpochLoss {
    fn new(tag_count: usize) -> Self {
        Self { per_tag: vec![0.0; tag_count], examples: 0 }
    }

    pub fn total(&self) -> f64 {
        self.per_tag.iter().sum()
    }

    /// Mean loss per example, 0 for an empty epoch.
    pub fn mean(&self) -> f64 {
        if self.examples == 0 {
            0.0
        } else {
            self.total() / self.examples as f64
        }
    }
}

pub struct Trainer<'a, B: AutodiffBackend> {
    bank:     TagBank<B>,
    lm:       &'a dyn CharLanguageModel,
    decode:   DecodeConfig,
    ensemble: Vec<TransducerBank<B::InnerBackend>>,
    rng:      StdRng,
}

impl<'a, B: AutodiffBackend> Trainer<'a, B> {
    /// `ensemble` holds extra frozen networks fused into every evaluation
    /// decode alongside the ones being trained.
    pub fn new(
        bank:     TagBank<B>,
        lm:       &'a dyn CharLanguageModel,
        decode:   DecodeConfig,
        ensemble: Vec<TransducerBank<B::InnerBackend>>,
        seed:     u64,
    ) -> Self {
        Self { bank, lm, decode, ensemble, rng: StdRng::seed_from_u64(seed) }
    }

    pub fn bank(&self) -> &TagBank<B> {
        &self.bank
    }

    /// One pass over `train` in a fresh random order.
    pub fn train_epoch(&mut self, train: &mut ExampleSet) -> Result<EpochLoss> {
        train.shuffle(&mut self.rng);

        let mut loss = EpochLoss::new(self.bank.tag_count());
        for (i, ex) in train.examples().iter().enumerate() {
            let value = self.bank.train_example(ex.tag(), ex.input(), ex.target(), self.lm)?;
            loss.per_tag[ex.tag()] += f64::from(value);
            loss.examples += 1;
            tracing::trace!("example {} (tag {}): loss {:.4}", i, ex.tag(), value);
        }
        Ok(loss)
    }

    /// Exact-match accuracy of the current networks (plus the ensemble)
    /// on `examples`, decoded in file order.
    pub fn evaluate(&self, examples: &[Example]) -> Result<EvalReport> {
        let mut models = Vec::with_capacity(1 + self.ensemble.len());
        models.push(self.bank.snapshot());
        models.extend(self.ensemble.iter().cloned());

        evaluate(examples, |ex| {
            ensemble_decode(ex.tag(), ex.input(), &models, self.lm, &self.decode)
        })
    }
}

/// Train for `epochs` epochs, checkpointing on every strict accuracy
/// improvement. Returns the best accuracy reached.
pub fn run_training<B: AutodiffBackend>(
    trainer: &mut Trainer<'_, B>,
    train:   &mut ExampleSet,
    eval:    &ExampleSet,
    epochs:  usize,
    ckpt:    &CheckpointManager,
    metrics: &MetricsLogger,
) -> Result<BestScore> {
    let mut best = BestScore::default();

    for epoch in 1..=epochs {
        let loss   = trainer.train_epoch(train)?;
        let report = trainer.evaluate(eval.examples())?;
        let accuracy = report.accuracy();

        let checkpointed = best.update(accuracy);
        if checkpointed {
            let manifest = CheckpointManifest {
                model:     trainer.bank().config().clone(),
                tag_count: trainer.bank().tag_count(),
                epoch,
                accuracy,
            };
            ckpt.save_best(&trainer.bank().snapshot(), &manifest)?;
        }
        let best_accuracy = best.best().unwrap_or(accuracy);

        for (tag, total) in loss.per_tag.iter().enumerate().filter(|(_, t)| **t > 0.0) {
            tracing::debug!("epoch {} tag {}: loss {:.4}", epoch, tag, total);
        }

        println!(
            "Epoch {:>3}/{} | loss={:.4} | accuracy={:.1}% ({}/{}) | best={:.1}%{}",
            epoch,
            epochs,
            loss.mean(),
            accuracy * 100.0,
            report.correct,
            report.total,
            best_accuracy * 100.0,
            if checkpointed { " | saved" } else { "" },
        );

        metrics.log(&EpochMetrics {
            epoch,
            train_loss: loss.mean(),
            accuracy,
            best_accuracy,
            checkpointed,
        })?;
    }

    tracing::info!(
        "Training complete: best accuracy {:.4}, metrics in '{}'",
        best.best().unwrap_or_default(),
        metrics.csv_path().display()
    );
    Ok(best)
}
