// ============================================================
// Layer 2 — Decode Use Case
// ============================================================
// Decode a data file with one or more trained checkpoints:
//
//   1. Load vocabularies and the data file
//   2. Load the base language model
//   3. Load every checkpoint as an ensemble member
//   4. Ensemble-decode each record, in file order, with the output
//      limit given or else the one the first model was trained with
//   5. Report "input|prediction|tag" lines and exact-match accuracy

use anyhow::{ensure, Result};
use std::path::Path;

use crate::application::train_use_case::{load_examples, load_member, load_vocabularies};
use crate::data::parser::DataPolicy;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    base_lm::NgramLm,
    decoder::{ensemble_decode, DecodeConfig, DEFAULT_MAX_OUTPUT_LEN},
    evaluator::{evaluate, EvalReport},
};

#[derive(Debug, Clone)]
pub struct DecodeRequest {
    pub char_vocab:     String,
    pub tag_vocab:      String,
    pub data:           String,
    pub lm_path:        String,
    /// Checkpoint directories; more than one decodes as an ensemble
    pub models:         Vec<String>,
    pub max_output_len: Option<usize>,
    pub strict_data:    bool,
}

pub struct DecodeOutcome {
    /// One `input|prediction|tag` line per record
    pub lines:  Vec<String>,
    pub report: EvalReport,
}

pub struct DecodeUseCase {
    request: DecodeRequest,
}

impl DecodeUseCase {
    pub fn new(request: DecodeRequest) -> Self {
        Self { request }
    }

    /// Output limit: the request's, else the first model's
    /// `train_config.json`, else the default.
    fn max_output_len(&self) -> usize {
        if let Some(n) = self.request.max_output_len {
            return n;
        }
        let Some(first) = self.request.models.first() else {
            return DEFAULT_MAX_OUTPUT_LEN;
        };
        match CheckpointManager::open(first).load_config() {
            Ok(cfg) => cfg.max_output_len,
            Err(e) => {
                tracing::warn!(
                    "No training config for '{}' ({e:#}); max output length {}",
                    first,
                    DEFAULT_MAX_OUTPUT_LEN
                );
                DEFAULT_MAX_OUTPUT_LEN
            }
        }
    }

    pub fn execute(&self) -> Result<DecodeOutcome> {
        let req = &self.request;
        ensure!(!req.models.is_empty(), "at least one --model directory is required");
        let max_output_len = self.max_output_len();
        ensure!(max_output_len > 0, "maximum output length must be positive");

        let vocabs = load_vocabularies(&req.char_vocab, &req.tag_vocab)?;
        let policy = if req.strict_data { DataPolicy::Strict } else { DataPolicy::Skip };
        let examples = load_examples(&req.data, &vocabs, policy)?;
        let lm = NgramLm::load(Path::new(&req.lm_path), &vocabs.chars)?;

        let device = Default::default();
        let models = req
            .models
            .iter()
            .map(|dir| load_member(dir, &vocabs, &device))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!("Decoding {} records with {} model(s)", examples.len(), models.len());

        let config = DecodeConfig::new(vocabs.bos_id, vocabs.eos_id)
            .with_max_output_len(max_output_len);

        let mut lines = Vec::with_capacity(examples.len());
        let report = evaluate(examples.examples(), |ex| {
            let predicted = ensemble_decode(ex.tag(), ex.input(), &models, &lm, &config)?;
            lines.push(format!(
                "{}|{}|{}",
                vocabs.chars.render(ex.input())?,
                vocabs.chars.render(&predicted)?,
                vocabs.tags.token(ex.tag())?,
            ));
            Ok(predicted)
        })?;

        Ok(DecodeOutcome { lines, report })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{tests::write_fixture, TrainConfig, TrainUseCase};

    fn request(cfg: &TrainConfig, models: Vec<String>) -> DecodeRequest {
        DecodeRequest {
            char_vocab:     cfg.char_vocab.clone(),
            tag_vocab:      cfg.tag_vocab.clone(),
            data:           cfg.eval_data.clone(),
            lm_path:        cfg.lm_path.clone(),
            models,
            max_output_len: Some(cfg.max_output_len),
            strict_data:    false,
        }
    }

    #[test]
    fn test_decode_reproduces_best_checkpoint_accuracy() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = write_fixture(dir.path());
        let best = TrainUseCase::new(cfg.clone()).execute().unwrap();

        let outcome = DecodeUseCase::new(request(&cfg, vec![cfg.output_dir.clone()]))
            .execute()
            .unwrap();
        assert_eq!(outcome.lines.len(), 2);
        assert_eq!(outcome.report.total, 2);
        assert_eq!(Some(outcome.report.accuracy()), best.best());

        for line in &outcome.lines {
            let fields: Vec<&str> = line.split('|').collect();
            assert_eq!(fields.len(), 3);
            assert_eq!(fields[2], "NN");
        }
        assert!(outcome.lines[0].starts_with("c a t|"));
    }

    #[test]
    fn test_ensemble_of_identical_checkpoints_decodes_like_one() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = write_fixture(dir.path());
        TrainUseCase::new(cfg.clone()).execute().unwrap();

        let single = DecodeUseCase::new(request(&cfg, vec![cfg.output_dir.clone()]))
            .execute()
            .unwrap();
        let double = DecodeUseCase::new(request(
            &cfg,
            vec![cfg.output_dir.clone(), cfg.output_dir.clone()],
        ))
        .execute()
        .unwrap();
        assert_eq!(single.lines, double.lines);
    }

    #[test]
    fn test_output_limit_falls_back_to_training_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { epochs: 1, max_output_len: 3, ..write_fixture(dir.path()) };
        TrainUseCase::new(cfg.clone()).execute().unwrap();

        let mut req = request(&cfg, vec![cfg.output_dir.clone()]);
        req.max_output_len = Some(7);
        assert_eq!(DecodeUseCase::new(req.clone()).max_output_len(), 7);

        req.max_output_len = None;
        assert_eq!(DecodeUseCase::new(req.clone()).max_output_len(), 3);

        req.models = vec![dir.path().join("missing").to_string_lossy().into_owned()];
        assert_eq!(DecodeUseCase::new(req).max_output_len(), DEFAULT_MAX_OUTPUT_LEN);
    }

    #[test]
    fn test_no_models_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = write_fixture(dir.path());
        assert!(DecodeUseCase::new(request(&cfg, Vec::new())).execute().is_err());
    }
}
