use anyhow::{anyhow, Result};
use burn::{
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
    tensor::{activation::log_softmax, TensorData},
};

use crate::domain::{
    example::{CharId, TagId},
    traits::{CharLanguageModel, StepScorer},
};
use crate::ml::error::{check_sequence, TransducerError};
use crate::ml::lstm::{CellState, StackedBiLstm, StackedLstm};
use crate::ml::numeric::ensure_all_finite;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally, so do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct TransducerConfig {
    pub vocab_size:  usize,
    pub char_dim:    usize,
    pub hidden_size: usize,
    pub layers:      usize,
    pub bos_id:      usize,
    pub eos_id:      usize,
}

impl TransducerConfig {
    /// One tag's network, freshly initialised.
    pub fn init<B: Backend>(&self, device: &B::Device) -> TransducerModel<B> {
        let h = self.hidden_size;
        TransducerModel {
            char_embedding: EmbeddingConfig::new(self.vocab_size, self.char_dim).init(device),
            encoder:        StackedBiLstm::new(self.char_dim, h, self.layers, device),
            // decoder input: [embedding of previous char ; encoder summary]
            decoder:        StackedLstm::new(self.char_dim + 2 * h, h, self.layers, device),
            output:         LinearConfig::new(h, self.vocab_size).init(device),
            lm_gate:        LinearConfig::new(h, 1).init(device),
            vocab_size:     self.vocab_size,
            bos_id:         self.bos_id,
            eos_id:         self.eos_id,
        }
    }

    /// One independent network for every tag id in `0..tag_count`.
    pub fn init_bank<B: Backend>(&self, tag_count: usize, device: &B::Device) -> TransducerBank<B> {
        TransducerBank {
            tags:       (0..tag_count).map(|_| self.init(device)).collect(),
            vocab_size: self.vocab_size,
        }
    }
}

// ─── Per-tag network ──────────────────────────────────────────────────────────
// Encoder: bidirectional stacked LSTM over "<s> input </s>"; the last
// forward and last backward hidden states form the input summary.
//
// Decoder step t:
//   h_t      = LSTM([emb(y_{t-1}) ; summary])
//   logits_t = W·h_t + b + gate(h_t) · log P_lm(· | <s> y_0 .. y_{t-1})
//
// The LM term enters as constant data, so no gradient ever reaches
// the base language model.
#[derive(Module, Debug)]
pub struct TransducerModel<B: Backend> {
    pub char_embedding: Embedding<B>,
    pub encoder:        StackedBiLstm<B>,
    pub decoder:        StackedLstm<B>,
    pub output:         Linear<B>,
    pub lm_gate:        Linear<B>,
    pub vocab_size:     usize,
    pub bos_id:         usize,
    pub eos_id:         usize,
}

/// Everything a partially decoded sequence needs to take its next step.
#[derive(Debug, Clone)]
pub struct DecoderState<B: Backend> {
    summary: Tensor<B, 2>,
    lstm:    Vec<CellState<B>>,
}

/// Teacher-forced pass: per-step log-distributions, [steps, vocab].
/// Row t is the distribution for target position t, the last row the one
/// that should put its mass on `</s>`.
#[derive(Debug)]
pub struct TransducerOutput<B: Backend> {
    pub log_probs: Tensor<B, 2>,
}

impl<B: Backend> TransducerModel<B> {
    fn device(&self) -> B::Device {
        self.output.weight.val().device()
    }

    /// ids → [len, char_dim]
    fn embed(&self, ids: &[CharId]) -> Tensor<B, 2> {
        let n = ids.len();
        let data = TensorData::new(ids.iter().map(|&i| i as i64).collect::<Vec<_>>(), [1, n]);
        let ids = Tensor::<B, 2, Int>::from_data(data, &self.device());
        let emb = self.char_embedding.forward(ids);
        let [_, _, dim] = emb.dims();
        emb.reshape([n, dim])
    }

    /// Input summary, [1, 2 * hidden].
    pub fn encode(&self, input: &[CharId]) -> Result<Tensor<B, 2>, TransducerError> {
        check_sequence("input", input, self.vocab_size)?;

        let mut seq = Vec::with_capacity(input.len() + 2);
        seq.push(self.bos_id);
        seq.extend_from_slice(input);
        seq.push(self.eos_id);

        Ok(self.encoder.encode(self.embed(&seq).unsqueeze()))
    }

    pub fn begin(&self, input: &[CharId]) -> Result<DecoderState<B>, TransducerError> {
        let summary = self.encode(input)?;
        let lstm = self.decoder.zero_state(&self.device());
        Ok(DecoderState { summary, lstm })
    }

    /// Feed `prev` and return unnormalised scores for the next char, [1, vocab].
    pub fn step(
        &self,
        state:        &mut DecoderState<B>,
        prev:         CharId,
        lm_log_probs: &[f32],
    ) -> Result<Tensor<B, 2>, TransducerError> {
        if prev >= self.vocab_size {
            return Err(TransducerError::CharOutOfRange { id: prev, vocab_size: self.vocab_size });
        }
        if lm_log_probs.len() != self.vocab_size {
            return Err(TransducerError::LmVocabMismatch {
                lm:    lm_log_probs.len(),
                model: self.vocab_size,
            });
        }

        let device = self.device();
        let x = Tensor::cat(vec![self.embed(&[prev]), state.summary.clone()], 1);
        let h = self.decoder.step(x, &mut state.lstm);

        let lm = Tensor::<B, 2>::from_data(
            TensorData::new(lm_log_probs.to_vec(), [1, self.vocab_size]),
            &device,
        );
        let gate = self.lm_gate.forward(h.clone()).expand([1, self.vocab_size]);
        Ok(self.output.forward(h) + gate * lm)
    }

    /// Teacher forcing: the true previous char, never the model's own
    /// guess, feeds each step. Returns Σ −log p(y_t) over the target and
    /// the final `</s>`, plus the per-step distributions.
    pub fn forward_loss(
        &self,
        input:  &[CharId],
        target: &[CharId],
        lm:     &dyn CharLanguageModel,
    ) -> Result<(Tensor<B, 1>, TransducerOutput<B>)> {
        check_sequence("target", target, self.vocab_size)?;
        if lm.vocab_size() != self.vocab_size {
            return Err(TransducerError::LmVocabMismatch {
                lm:    lm.vocab_size(),
                model: self.vocab_size,
            }
            .into());
        }

        let mut state = self.begin(input)?;
        let mut labels = target.to_vec();
        labels.push(self.eos_id);

        let mut history = vec![self.bos_id];
        let mut steps   = Vec::with_capacity(labels.len());
        for &label in &labels {
            let prev  = history[history.len() - 1];
            let lm_lp = lm.next_log_probs(&history);
            ensure_all_finite("base language model", &lm_lp)?;
            steps.push(self.step(&mut state, prev, &lm_lp)?);
            history.push(label);
        }

        let n = labels.len();
        let log_probs = log_softmax(Tensor::cat(steps, 0), 1);
        let labels = Tensor::<B, 2, Int>::from_data(
            TensorData::new(labels.iter().map(|&l| l as i64).collect::<Vec<_>>(), [n, 1]),
            &self.device(),
        );
        let loss = log_probs.clone().gather(1, labels).sum().neg();

        Ok((loss, TransducerOutput { log_probs }))
    }
}

// ─── All tags ─────────────────────────────────────────────────────────────────
/// The networks of every tag, indexed by tag id. This is the unit that
/// gets checkpointed and that the ensemble decoder fuses.
#[derive(Module, Debug)]
pub struct TransducerBank<B: Backend> {
    pub tags:       Vec<TransducerModel<B>>,
    pub vocab_size: usize,
}

impl<B: Backend> TransducerBank<B> {
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn tag(&self, tag: TagId) -> Result<&TransducerModel<B>, TransducerError> {
        self.tags.get(tag).ok_or(TransducerError::UnknownTag {
            tag,
            tag_count: self.tags.len(),
        })
    }
}

impl<B: Backend> StepScorer for TransducerBank<B> {
    type State = DecoderState<B>;

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn begin(&self, tag: TagId, input: &[CharId]) -> Result<Self::State> {
        Ok(self.tag(tag)?.begin(input)?)
    }

    fn next_log_probs(
        &self,
        tag:     TagId,
        state:   &mut Self::State,
        history: &[CharId],
        lm:      &dyn CharLanguageModel,
    ) -> Result<Vec<f32>> {
        let model = self.tag(tag)?;
        let prev = *history.last().ok_or(TransducerError::EmptySequence("history"))?;

        let lm_lp = lm.next_log_probs(history);
        ensure_all_finite("base language model", &lm_lp)?;

        let logits = model.step(state, prev, &lm_lp)?;
        let values = to_f32_vec(log_softmax(logits, 1))?;
        ensure_all_finite("decoder distribution", &values)?;
        Ok(values)
    }
}

/// Host copy of a tensor's values.
pub fn to_f32_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read tensor values: {e:?}"))
}
