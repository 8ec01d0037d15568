// ============================================================
// Layer 5 — Ensemble Decoder
// ============================================================
// Greedy, step-synchronised generation over one or more models:
//
//   history = [<s>]
//   loop (at most max_output_len times):
//     every model scores the next char given the same history
//     fused[c] = mean over models of log p_m(c)
//     next     = argmax fused   (lowest id wins a tie)
//     stop if next == </s>, else commit next to the history
//
// With a single model the mean is that model's own log-distribution,
// so a one-model ensemble is exactly plain greedy decoding. Nothing
// is sampled: the same weights and input always give the same output.

use anyhow::{ensure, Result};

use crate::domain::{
    example::{CharId, TagId},
    traits::{CharLanguageModel, StepScorer},
};

/// Upper bound on generated characters, mirroring the usual inflection
/// length limit.
pub const DEFAULT_MAX_OUTPUT_LEN: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct DecodeConfig {
    pub bos_id:         CharId,
    pub eos_id:         CharId,
    pub max_output_len: usize,
}

impl DecodeConfig {
    pub fn new(bos_id: CharId, eos_id: CharId) -> Self {
        Self { bos_id, eos_id, max_output_len: DEFAULT_MAX_OUTPUT_LEN }
    }

    pub fn with_max_output_len(mut self, max_output_len: usize) -> Self {
        self.max_output_len = max_output_len;
        self
    }
}

/// Fused log-score per char: the arithmetic mean of the models' log-probabilities.
pub fn fuse_log_probs(per_model: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = per_model.first() else {
        return Vec::new();
    };
    let scale = 1.0 / per_model.len() as f32;
    let mut fused = vec![0.0f32; first.len()];
    for dist in per_model {
        for (acc, &lp) in fused.iter_mut().zip(dist) {
            *acc += lp;
        }
    }
    fused.iter_mut().for_each(|v| *v *= scale);
    fused
}

/// Index of the highest score; on equal scores the lowest index.
pub fn argmax_lowest(scores: &[f32]) -> Option<CharId> {
    let mut best: Option<(CharId, f32)> = None;
    for (id, &s) in scores.iter().enumerate() {
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((id, s)),
        }
    }
    best.map(|(id, _)| id)
}

/// Decode `input` under `tag` with every model in `models`.
///
/// Returns the committed characters without the `<s>` / `</s>` markers;
/// never more than `config.max_output_len` of them.
pub fn ensemble_decode<M: StepScorer>(
    tag:    TagId,
    input:  &[CharId],
    models: &[M],
    lm:     &dyn CharLanguageModel,
    config: &DecodeConfig,
) -> Result<Vec<CharId>> {
    ensure!(!models.is_empty(), "ensemble decoding needs at least one model");
    let vocab_size = models[0].vocab_size();
    ensure!(
        models.iter().all(|m| m.vocab_size() == vocab_size),
        "ensemble members disagree on the vocabulary size"
    );

    let mut states = models
        .iter()
        .map(|m| m.begin(tag, input))
        .collect::<Result<Vec<_>>>()?;

    let mut history = vec![config.bos_id];
    let mut output  = Vec::new();

    while output.len() < config.max_output_len {
        let per_model = models
            .iter()
            .zip(states.iter_mut())
            .map(|(m, s)| m.next_log_probs(tag, s, &history, lm))
            .collect::<Result<Vec<_>>>()?;

        let fused = fuse_log_probs(&per_model);
        let next = match argmax_lowest(&fused) {
            Some(id) => id,
            None => break,
        };
        if next == config.eos_id {
            break;
        }
        output.push(next);
        history.push(next);
    }

    tracing::trace!("Decoded {} chars for tag {} with {} model(s)", output.len(), tag, models.len());
    Ok(output)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::TransducerBank;
    use crate::ml::test_support::{tiny_config, ScriptedScorer, UniformLm};
    use burn::backend::NdArray;

    const BOS: CharId = 0;
    const EOS: CharId = 1;

    fn cfg(max: usize) -> DecodeConfig {
        DecodeConfig::new(BOS, EOS).with_max_output_len(max)
    }

    #[test]
    fn test_fuse_is_mean_of_log_probs() {
        let fused = fuse_log_probs(&[vec![-1.0, -3.0], vec![-3.0, -1.0], vec![-2.0, -2.0]]);
        assert_eq!(fused, vec![-2.0, -2.0]);
        assert!(fuse_log_probs(&[]).is_empty());
    }

    #[test]
    fn test_ties_go_to_the_lowest_id() {
        assert_eq!(argmax_lowest(&[-1.0, -0.5, -0.5, -2.0]), Some(1));
        assert_eq!(argmax_lowest(&[-0.5, -0.5]), Some(0));
        assert_eq!(argmax_lowest(&[]), None);
    }

    #[test]
    fn test_stops_at_eos_without_emitting_it() {
        // a b </s>
        let model = ScriptedScorer::new(6, vec![2, 3, EOS]);
        let out = ensemble_decode(0, &[2], &[model], &UniformLm::new(6), &cfg(10)).unwrap();
        assert_eq!(out, vec![2, 3]);
    }

    #[test]
    fn test_never_exceeds_max_len() {
        // a model that never predicts </s>
        let model = ScriptedScorer::repeating(6, 4);
        let out = ensemble_decode(0, &[2], &[model], &UniformLm::new(6), &cfg(7)).unwrap();
        assert_eq!(out, vec![4; 7]);

        let out = ensemble_decode(0, &[2], &[ScriptedScorer::repeating(6, 4)], &UniformLm::new(6), &cfg(0))
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_fused_score_decides_disagreement() {
        // Model A mildly prefers 2, model B strongly prefers 3: the mean picks 3
        // even though A's top choice is 2.
        let a = ScriptedScorer::with_dist(6, vec![-9.0, -9.0, -0.5, -1.0, -9.0, -9.0]);
        let b = ScriptedScorer::with_dist(6, vec![-9.0, -9.0, -5.0, -0.1, -9.0, -9.0]);
        let out = ensemble_decode(0, &[2], &[a, b], &UniformLm::new(6), &cfg(1)).unwrap();
        assert_eq!(out, vec![3]);
    }

    #[test]
    fn test_fused_tie_breaks_to_lowest_id() {
        let a = ScriptedScorer::with_dist(6, vec![-9.0, -9.0, -1.0, -2.0, -9.0, -9.0]);
        let b = ScriptedScorer::with_dist(6, vec![-9.0, -9.0, -2.0, -1.0, -9.0, -9.0]);
        let out = ensemble_decode(0, &[2], &[a, b], &UniformLm::new(6), &cfg(1)).unwrap();
        assert_eq!(out, vec![2]);
    }

    #[test]
    fn test_empty_ensemble_is_an_error() {
        let models: Vec<ScriptedScorer> = Vec::new();
        assert!(ensemble_decode(0, &[2], &models, &UniformLm::new(6), &cfg(5)).is_err());
    }

    #[test]
    fn test_single_model_ensemble_equals_plain_greedy() {
        let device = Default::default();
        let bank: TransducerBank<NdArray> = tiny_config().init_bank(2, &device);
        let lm = UniformLm::new(tiny_config().vocab_size);
        let config = cfg(12);
        let input = [2, 3, 4];

        // plain greedy decode written out directly against the model
        let mut state = bank.begin(1, &input).unwrap();
        let mut history = vec![BOS];
        let mut greedy = Vec::new();
        while greedy.len() < config.max_output_len {
            let dist = bank.next_log_probs(1, &mut state, &history, &lm).unwrap();
            let next = argmax_lowest(&dist).unwrap();
            if next == EOS {
                break;
            }
            greedy.push(next);
            history.push(next);
        }

        let ensembled = ensemble_decode(1, &input, std::slice::from_ref(&bank), &lm, &config).unwrap();
        assert_eq!(ensembled, greedy);
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let device = Default::default();
        let bank: TransducerBank<NdArray> = tiny_config().init_bank(1, &device);
        let lm = UniformLm::new(tiny_config().vocab_size);
        let models = [bank.clone(), bank];

        let first  = ensemble_decode(0, &[2, 5], &models, &lm, &cfg(12)).unwrap();
        let second = ensemble_decode(0, &[2, 5], &models, &lm, &cfg(12)).unwrap();
        assert_eq!(first, second);
    }
}
