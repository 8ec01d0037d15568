// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Validate the configuration            (this layer)
//   Step 2: Load char and tag vocabularies        (Layer 4 - data)
//   Step 3: Parse training and evaluation data    (Layer 4 - data)
//   Step 4: Load the frozen base language model   (Layer 5 - ml)
//   Step 5: Load extra ensemble members, if any   (Layer 6 - infra)
//   Step 6: Save config, open metrics log         (Layer 6 - infra)
//   Step 7: Build one network + optimiser per tag (Layer 5 - ml)
//   Step 8: Run the epoch loop                    (Layer 5 - ml)
//
// Everything that can be wrong with the inputs is found before
// the first training step.

use anyhow::{ensure, Result};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::{
    dataset::ExampleSet,
    loader::{read_lines, read_vocab},
    parser::{parse_examples, DataPolicy},
};
use crate::domain::{
    example::CharId,
    vocab::{Vocabulary, BOS, EOS},
};
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::{
    base_lm::NgramLm,
    decoder::{DecodeConfig, DEFAULT_MAX_OUTPUT_LEN},
    evaluator::{BestScore, EvalError},
    model::{TransducerBank, TransducerConfig},
    optim::AdadeltaConfig,
    tag_bank::TagBank,
    trainer::{run_training, InferBackend, TrainBackend, Trainer},
};

// ─── Training Configuration ──────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub char_vocab:     String,
    pub tag_vocab:      String,
    pub train_data:     String,
    pub eval_data:      String,
    pub hidden_size:    usize,
    pub epochs:         usize,
    /// L2 weight decay applied by every tag's optimiser
    pub reg_strength:   f64,
    pub layers:         usize,
    pub lm_path:        String,
    pub output_dir:     String,
    /// Char embedding size; the hidden size when unset
    pub char_dim:       Option<usize>,
    pub seed:           u64,
    pub max_output_len: usize,
    pub strict_data:    bool,
    /// Checkpoint directories fused into evaluation decoding
    pub ensemble_with:  Vec<String>,
    pub rho:            f64,
    pub epsilon:        f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            char_vocab:     "chars.txt".to_string(),
            tag_vocab:      "tags.txt".to_string(),
            train_data:     "train.txt".to_string(),
            eval_data:      "dev.txt".to_string(),
            hidden_size:    100,
            epochs:         20,
            reg_strength:   0.0,
            layers:         1,
            lm_path:        "lm.json".to_string(),
            output_dir:     "checkpoints".to_string(),
            char_dim:       None,
            seed:           42,
            max_output_len: DEFAULT_MAX_OUTPUT_LEN,
            strict_data:    false,
            ensemble_with:  Vec::new(),
            rho:            0.95,
            epsilon:        1e-6,
        }
    }
}

impl TrainConfig {
    /// Reject hyperparameters no run could use.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.hidden_size > 0, "hidden size must be a positive integer");
        ensure!(self.epochs > 0, "epochs must be a positive integer");
        ensure!(self.layers > 0, "layers must be a positive integer");
        ensure!(
            self.reg_strength.is_finite()
                && self.reg_strength >= 0.0
                && self.reg_strength <= f32::MAX as f64,
            "regularisation strength must be a non-negative f32-representable number, got {}",
            self.reg_strength
        );
        ensure!(self.char_dim != Some(0), "char embedding size must be positive");
        ensure!(self.max_output_len > 0, "maximum output length must be positive");
        ensure!(self.rho > 0.0 && self.rho < 1.0, "rho must lie in (0, 1), got {}", self.rho);
        ensure!(self.epsilon > 0.0, "epsilon must be positive, got {}", self.epsilon);
        Ok(())
    }

    pub fn data_policy(&self) -> DataPolicy {
        if self.strict_data {
            DataPolicy::Strict
        } else {
            DataPolicy::Skip
        }
    }
}

// ─── Shared by train and decode ───────────────────────────────────────────────
pub struct Vocabularies {
    pub chars:  Vocabulary,
    pub tags:   Vocabulary,
    pub bos_id: CharId,
    pub eos_id: CharId,
}

/// Both vocabularies, with the char vocabulary's `<s>` / `</s>` resolved.
pub fn load_vocabularies(char_path: &str, tag_path: &str) -> Result<Vocabularies> {
    let chars = read_vocab(char_path, "character")?;
    let bos_id = chars.marker(BOS)?;
    let eos_id = chars.marker(EOS)?;
    let tags = read_vocab(tag_path, "tag")?;
    ensure!(!tags.is_empty(), "tag vocabulary '{}' is empty", tag_path);

    tracing::info!("Vocabularies: {} chars, {} tags", chars.len(), tags.len());
    Ok(Vocabularies { chars, tags, bos_id, eos_id })
}

/// Parse one data file against the vocabularies.
pub fn load_examples(path: &str, vocabs: &Vocabularies, policy: DataPolicy) -> Result<ExampleSet> {
    let lines = read_lines(path)?;
    let examples = parse_examples(&lines, &vocabs.chars, &vocabs.tags, policy)?;
    tracing::info!("Loaded {} examples from '{}'", examples.len(), path);
    Ok(ExampleSet::new(examples))
}

/// Load a checkpoint as a frozen ensemble member and check it fits the
/// vocabularies of this run.
pub fn load_member(
    dir:    &str,
    vocabs: &Vocabularies,
    device: &<InferBackend as Backend>::Device,
) -> Result<TransducerBank<InferBackend>> {
    let (bank, manifest) = CheckpointManager::open(dir).load_bank::<InferBackend>(device)?;
    ensure!(
        manifest.model.vocab_size == vocabs.chars.len(),
        "model '{}' was trained on {} chars, the vocabulary has {}",
        dir,
        manifest.model.vocab_size,
        vocabs.chars.len()
    );
    ensure!(
        bank.tag_count() == vocabs.tags.len(),
        "model '{}' was trained on {} tags, the vocabulary has {}",
        dir,
        bank.tag_count(),
        vocabs.tags.len()
    );
    ensure!(
        manifest.model.bos_id == vocabs.bos_id && manifest.model.eos_id == vocabs.eos_id,
        "model '{}' places <s>/</s> at {}/{}, the vocabulary at {}/{}",
        dir,
        manifest.model.bos_id,
        manifest.model.eos_id,
        vocabs.bos_id,
        vocabs.eos_id
    );
    Ok(bank)
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run training end to end; returns the best held-out accuracy.
    pub fn execute(&self) -> Result<BestScore> {
        let cfg = &self.config;

        // ── Step 1: Validate ─────────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Vocabularies ──────────────────────────────────────────────
        let vocabs = load_vocabularies(&cfg.char_vocab, &cfg.tag_vocab)?;

        // ── Step 3: Data ──────────────────────────────────────────────────────
        let policy = cfg.data_policy();
        let mut train = load_examples(&cfg.train_data, &vocabs, policy)?;
        let eval = load_examples(&cfg.eval_data, &vocabs, policy)?;
        if eval.is_empty() {
            return Err(EvalError::EmptyEvaluationSet.into());
        }
        if train.is_empty() {
            tracing::warn!("Training set '{}' has no usable examples", cfg.train_data);
        }
        for (tag, n) in train.tag_counts(vocabs.tags.len()).iter().enumerate() {
            tracing::debug!("tag {} ({}): {} training examples", tag, vocabs.tags.token(tag)?, n);
        }

        // ── Step 4: Base language model ───────────────────────────────────────
        let lm = NgramLm::load(Path::new(&cfg.lm_path), &vocabs.chars)?;

        // ── Step 5: Ensemble members ──────────────────────────────────────────
        let device = Default::default();
        let ensemble = cfg
            .ensemble_with
            .iter()
            .map(|dir| load_member(dir, &vocabs, &device))
            .collect::<Result<Vec<_>>>()?;

        // ── Step 6: Output directory ──────────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.output_dir)?;
        ckpt.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.output_dir)?;

        // ── Step 7: Tag bank ──────────────────────────────────────────────────
        TrainBackend::seed(cfg.seed);
        let model_cfg = TransducerConfig::new(
            vocabs.chars.len(),
            cfg.char_dim.unwrap_or(cfg.hidden_size),
            cfg.hidden_size,
            cfg.layers,
            vocabs.bos_id,
            vocabs.eos_id,
        );
        let optim_cfg = AdadeltaConfig::new()
            .with_rho(cfg.rho)
            .with_epsilon(cfg.epsilon)
            .with_weight_decay(cfg.reg_strength);
        let bank = TagBank::<TrainBackend>::new(model_cfg, &optim_cfg, vocabs.tags.len(), &device);
        tracing::info!(
            "Model ready: {} tag networks, hidden={}, layers={}",
            bank.tag_count(),
            cfg.hidden_size,
            cfg.layers
        );

        // ── Step 8: Epoch loop ────────────────────────────────────────────────
        let decode = DecodeConfig::new(vocabs.bos_id, vocabs.eos_id)
            .with_max_output_len(cfg.max_output_len);
        let mut trainer = Trainer::new(bank, &lm, decode, ensemble, cfg.seed);
        run_training(&mut trainer, &mut train, &eval, cfg.epochs, &ckpt, &metrics)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::traits::Persistable;
    use crate::ml::base_lm::NgramCounts;
    use std::fs;

    /// Vocabularies, data and a base LM for a tiny run inside `dir`.
    pub(crate) fn write_fixture(dir: &Path) -> TrainConfig {
        let p = |name: &str| dir.join(name).to_string_lossy().into_owned();

        fs::write(dir.join("chars.txt"), "<s>\n</s>\nc\na\nt\ns\nd\no\ng\n").unwrap();
        fs::write(dir.join("tags.txt"), "NN\nVB\n").unwrap();
        fs::write(dir.join("train.txt"), "c a t | c a t s | NN\nd o g | d o g s | NN\n").unwrap();
        fs::write(dir.join("dev.txt"), "c a t | c a t s | NN\nd o g | d o g | NN\n").unwrap();

        let corpus = vec![vec!["c", "a", "t", "s"], vec!["d", "o", "g", "s"]];
        NgramCounts::fit(&corpus, 3).unwrap().save(&dir.join("lm.json")).unwrap();

        TrainConfig {
            char_vocab:     p("chars.txt"),
            tag_vocab:      p("tags.txt"),
            train_data:     p("train.txt"),
            eval_data:      p("dev.txt"),
            hidden_size:    8,
            epochs:         2,
            reg_strength:   0.0,
            layers:         1,
            lm_path:        p("lm.json"),
            output_dir:     p("out"),
            char_dim:       Some(4),
            max_output_len: 10,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bad_hyperparameters_are_rejected() {
        let bad = [
            TrainConfig { hidden_size: 0, ..TrainConfig::default() },
            TrainConfig { epochs: 0, ..TrainConfig::default() },
            TrainConfig { layers: 0, ..TrainConfig::default() },
            TrainConfig { reg_strength: -0.1, ..TrainConfig::default() },
            TrainConfig { reg_strength: f64::NAN, ..TrainConfig::default() },
            TrainConfig { reg_strength: 1e39, ..TrainConfig::default() },
            TrainConfig { rho: 1.0, ..TrainConfig::default() },
        ];
        for cfg in bad {
            assert!(cfg.validate().is_err(), "{cfg:?}");
        }
    }

    #[test]
    fn test_run_writes_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = write_fixture(dir.path());

        let best = TrainUseCase::new(cfg.clone()).execute().unwrap();
        assert!(best.best().is_some());

        let out = Path::new(&cfg.output_dir);
        assert!(out.join("best_model.mpk").exists());
        assert!(out.join("checkpoint.json").exists());
        assert!(out.join("metrics.csv").exists());

        let saved = CheckpointManager::open(out).load_config().unwrap();
        assert_eq!(saved.hidden_size, 8);
    }

    #[test]
    fn test_missing_marker_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = write_fixture(dir.path());
        fs::write(&cfg.char_vocab, "c\na\nt\n").unwrap();
        assert!(TrainUseCase::new(cfg).execute().is_err());
    }

    #[test]
    fn test_strict_data_rejects_unknown_chars() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = write_fixture(dir.path());
        fs::write(&cfg.train_data, "c a t | c a t s | NN\nc a x | c a x | NN\n").unwrap();

        cfg.strict_data = true;
        assert!(TrainUseCase::new(cfg.clone()).execute().is_err());

        cfg.strict_data = false;
        cfg.epochs = 1;
        assert!(TrainUseCase::new(cfg).execute().is_ok());
    }

    #[test]
    fn test_member_with_other_marker_ids_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = write_fixture(dir.path());
        TrainUseCase::new(TrainConfig { epochs: 1, ..cfg.clone() }).execute().unwrap();
        let device = Default::default();

        let vocabs = load_vocabularies(&cfg.char_vocab, &cfg.tag_vocab).unwrap();
        assert!(load_member(&cfg.output_dir, &vocabs, &device).is_ok());

        // same size, markers swapped
        fs::write(&cfg.char_vocab, "</s>\n<s>\nc\na\nt\ns\nd\no\ng\n").unwrap();
        let swapped = load_vocabularies(&cfg.char_vocab, &cfg.tag_vocab).unwrap();
        let err = load_member(&cfg.output_dir, &swapped, &device).unwrap_err();
        assert!(err.to_string().contains("<s>/</s>"), "{err}");
    }

    #[test]
    fn test_empty_evaluation_set_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = write_fixture(dir.path());
        fs::write(&cfg.eval_data, "\n").unwrap();

        let err = TrainUseCase::new(cfg).execute().unwrap_err();
        assert_eq!(err.downcast_ref::<EvalError>(), Some(&EvalError::EmptyEvaluationSet));
    }
}
