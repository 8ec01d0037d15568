// Fixtures shared by the unit tests of the ml layer.

use anyhow::Result;

use crate::domain::{
    example::{CharId, TagId},
    traits::{CharLanguageModel, StepScorer},
};
use crate::ml::model::TransducerConfig;

/// `<s>`=0, `</s>`=1 and four letters 2..=5.
pub fn tiny_config() -> TransducerConfig {
    TransducerConfig::new(6, 4, 6, 1, 0, 1)
}

/// Every char equally likely, whatever the context.
pub struct UniformLm {
    vocab_size: usize,
}

impl UniformLm {
    pub fn new(vocab_size: usize) -> Self {
        Self { vocab_size }
    }
}

impl CharLanguageModel for UniformLm {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn next_log_probs(&self, _context: &[CharId]) -> Vec<f32> {
        vec![-(self.vocab_size as f32).ln(); self.vocab_size]
    }
}

enum Script {
    /// Emit these ids in order, then `</s>` (id 1) forever.
    Sequence(Vec<CharId>),
    /// The same id at every step.
    Repeat(CharId),
    /// The same log-distribution at every step.
    Fixed(Vec<f32>),
}

/// A scorer with a hard-wired answer, for exercising the decoder alone.
pub struct ScriptedScorer {
    vocab_size: usize,
    script:     Script,
}

impl ScriptedScorer {
    pub fn new(vocab_size: usize, ids: Vec<CharId>) -> Self {
        Self { vocab_size, script: Script::Sequence(ids) }
    }

    pub fn repeating(vocab_size: usize, id: CharId) -> Self {
        Self { vocab_size, script: Script::Repeat(id) }
    }

    pub fn with_dist(vocab_size: usize, dist: Vec<f32>) -> Self {
        assert_eq!(dist.len(), vocab_size);
        Self { vocab_size, script: Script::Fixed(dist) }
    }

    fn peaked(&self, id: CharId) -> Vec<f32> {
        let mut dist = vec![-10.0; self.vocab_size];
        dist[id] = -0.01;
        dist
    }
}

impl StepScorer for ScriptedScorer {
    /// Steps taken so far.
    type State = usize;

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn begin(&self, _tag: TagId, _input: &[CharId]) -> Result<usize> {
        Ok(0)
    }

    fn next_log_probs(
        &self,
        _tag:     TagId,
        step:     &mut usize,
        _history: &[CharId],
        _lm:      &dyn CharLanguageModel,
    ) -> Result<Vec<f32>> {
        let dist = match &self.script {
            Script::Sequence(ids) => self.peaked(ids.get(*step).copied().unwrap_or(1)),
            Script::Repeat(id) => self.peaked(*id),
            Script::Fixed(dist) => dist.clone(),
        };
        *step += 1;
        Ok(dist)
    }
}
